use super::{HedgePosition, RollHistory};
use crate::errors::{HedgeError, HedgeResult};
use crate::feeds::ChainContract;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

pub const POSITIONS_FILE: &str = "positions.json";
pub const HISTORY_FILE: &str = "roll_history.json";
pub const CHAIN_CACHE_FILE: &str = "chain_cache.json";

const READ_RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(25);

/// Last good spot + chain for one (ticker, right), kept for stale fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedChain {
    pub spot: f64,
    pub contracts: Vec<ChainContract>,
    pub fetched_at: DateTime<Utc>,
}

/// Keyed by `"<TICKER>:<right>"`.
pub type ChainCache = BTreeMap<String, CachedChain>;

/// File-backed position and roll-history collections.
///
/// Writes go to `<file>.tmp` and are renamed into place, so a reader sees
/// either the old or the new contents. Missing files read as empty. A file
/// that fails to parse is copied aside to `<file>.corrupt`, logged, and read
/// as empty.
#[derive(Debug, Clone)]
pub struct PositionStore {
    dir: PathBuf,
}

impl PositionStore {
    pub fn open(dir: impl Into<PathBuf>) -> HedgeResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .map_err(|e| HedgeError::Io(format!("create store dir {}: {e}", dir.display())))?;
        Ok(Self { dir })
    }

    pub fn load_positions(&self) -> Vec<HedgePosition> {
        read_collection(&self.dir.join(POSITIONS_FILE))
    }

    pub fn save_positions(&self, positions: &[HedgePosition]) -> HedgeResult<()> {
        write_atomic(&self.dir.join(POSITIONS_FILE), positions)
    }

    pub fn load_history(&self) -> RollHistory {
        read_collection(&self.dir.join(HISTORY_FILE))
    }

    pub fn save_history(&self, history: &RollHistory) -> HedgeResult<()> {
        write_atomic(&self.dir.join(HISTORY_FILE), history)
    }

    pub fn load_chain_cache(&self) -> ChainCache {
        read_collection(&self.dir.join(CHAIN_CACHE_FILE))
    }

    pub fn save_chain_cache(&self, cache: &ChainCache) -> HedgeResult<()> {
        write_atomic(&self.dir.join(CHAIN_CACHE_FILE), cache)
    }
}

fn read_with_retry(path: &Path) -> io::Result<Option<Vec<u8>>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(bytes)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(first) => {
            // A concurrent rename can briefly make the file unreadable
            tracing::debug!(path = %path.display(), error = %first, "store read failed, retrying");
            std::thread::sleep(READ_RETRY_DELAY);
            match fs::read(path) {
                Ok(bytes) => Ok(Some(bytes)),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e),
            }
        }
    }
}

fn read_collection<T: DeserializeOwned + Default>(path: &Path) -> T {
    let bytes = match read_with_retry(path) {
        Ok(Some(bytes)) => bytes,
        Ok(None) => return T::default(),
        Err(e) => {
            let err = HedgeError::CorruptPersistedState {
                path: path.display().to_string(),
                reason: e.to_string(),
            };
            tracing::warn!(error = %err, "store file unreadable, using empty collection");
            return T::default();
        }
    };

    if bytes.iter().all(u8::is_ascii_whitespace) {
        return T::default();
    }

    match serde_json::from_slice(&bytes) {
        Ok(v) => v,
        Err(e) => {
            let err = HedgeError::CorruptPersistedState {
                path: path.display().to_string(),
                reason: e.to_string(),
            };
            let backup = sibling(path, "corrupt");
            if let Err(copy_err) = fs::copy(path, &backup) {
                tracing::warn!(error = %copy_err, "could not preserve corrupt store file");
            }
            tracing::warn!(
                error = %err,
                backup = %backup.display(),
                "store file corrupt, using empty collection"
            );
            T::default()
        }
    }
}

fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> HedgeResult<()> {
    let tmp = sibling(path, "tmp");
    {
        let file = File::create(&tmp)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        writer
            .into_inner()
            .map_err(|e| HedgeError::Io(e.to_string()))?
            .sync_all()?;
    }
    fs::rename(&tmp, path)?;
    Ok(())
}

/// `positions.json` -> `positions.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
