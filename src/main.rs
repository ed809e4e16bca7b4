use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use hedge_lab::compare::{InstrumentParams, OptionLeg};
use hedge_lab::feeds::{MarketData, QuoteApiClient};
use hedge_lab::models::early_exercise::price_adjustable;
use hedge_lab::models::volatility::CalibrationTable;
use hedge_lab::models::{black_scholes, OptionPricer};
use hedge_lab::positions::{Instrument, NewPositionSpec, PositionStore, RollManager, RollSettings};
use hedge_lab::risk::budget::{contracts_within_capital, BudgetAllocator};
use hedge_lab::sim::LeveragedInstrument;
use hedge_lab::{HedgeConfig, HedgeError, HedgeResult, OptionRight, OptionSpec, ScenarioInput};
use serde::Serialize;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "hedge_lab")]
#[command(about = "Compare leveraged-inverse and put hedges, manage put rolls")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Leveraged fund vs put across drop scenarios
    Compare {
        #[arg(long, default_value = "QQQ")]
        ticker: String,
        /// Comma-separated cumulative drops, e.g. -0.05,-0.10,-0.20
        #[arg(long, default_value = "-0.05,-0.10,-0.20,-0.35", allow_hyphen_values = true)]
        drops: String,
        /// Holding horizon in trading days
        #[arg(long, default_value_t = 30)]
        horizon: u32,
        #[arg(long, default_value_t = 0.015)]
        daily_vol: f64,
        /// Fetched from market data when omitted
        #[arg(long)]
        spot: Option<f64>,
        /// Defaults to spot x target moneyness
        #[arg(long)]
        strike: Option<f64>,
        /// Option calendar days to expiry (defaults to target DTE)
        #[arg(long)]
        dte: Option<u32>,
        /// Baseline option volatility (defaults to DEFAULT_VOLATILITY)
        #[arg(long)]
        vol: Option<f64>,
        /// Current stress-index level
        #[arg(long, default_value_t = 16.0)]
        stress_index: f64,
        /// Capital in each hedge (defaults to the ticker's monthly allocation)
        #[arg(long)]
        capital: Option<f64>,
    },
    /// Price one option with the intrinsic floor
    Price {
        #[arg(long)]
        spot: f64,
        #[arg(long)]
        strike: f64,
        /// Calendar days to expiry
        #[arg(long)]
        days: f64,
        #[arg(long)]
        vol: f64,
        #[arg(long, default_value = "put")]
        right: OptionRight,
        #[arg(long)]
        rate: Option<f64>,
        #[arg(long, default_value_t = 0.0)]
        dividend_yield: f64,
    },
    /// Held positions with DTE and urgency; archives expired ones
    Status {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Ranked replacement contracts for positions inside the roll window
    Suggest {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Record a new position
    Add {
        #[arg(long)]
        ticker: String,
        /// Omit for a leveraged fund position
        #[arg(long)]
        strike: Option<f64>,
        #[arg(long)]
        expiry: Option<NaiveDate>,
        #[arg(long, default_value = "put")]
        right: OptionRight,
        #[arg(long)]
        quantity: f64,
        #[arg(long)]
        cost: f64,
        #[arg(long)]
        note: Option<String>,
    },
    /// Close a position into history and open its replacement
    Roll {
        #[arg(long)]
        old_id: String,
        #[arg(long)]
        strike: f64,
        #[arg(long)]
        expiry: NaiveDate,
        #[arg(long)]
        cost: f64,
        #[arg(long)]
        close_price: Option<f64>,
    },
}

#[tokio::main]
async fn main() {
    // Logs to stderr; stdout carries JSON only
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let cfg = match HedgeConfig::from_env() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("config error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(cli.command, &cfg).await {
        tracing::error!("{e}");
        std::process::exit(1);
    }
}

fn print_json<T: Serialize>(value: &T) -> HedgeResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn market_client(cfg: &HedgeConfig) -> QuoteApiClient {
    QuoteApiClient::new(&cfg.market_data_url, cfg.market_data_key.clone())
}

fn roll_manager(cfg: &HedgeConfig) -> HedgeResult<RollManager<QuoteApiClient>> {
    let store = PositionStore::open(&cfg.store_dir)?;
    Ok(RollManager::new(market_client(cfg), store, RollSettings::from_config(cfg)))
}

fn parse_drops(raw: &str) -> HedgeResult<Vec<f64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<f64>()
                .map_err(|e| HedgeError::invalid("drops", format!("{s:?}: {e}")))
        })
        .collect()
}

async fn run(command: Command, cfg: &HedgeConfig) -> HedgeResult<()> {
    let today = Local::now().date_naive();

    match command {
        Command::Compare {
            ticker,
            drops,
            horizon,
            daily_vol,
            spot,
            strike,
            dte,
            vol,
            stress_index,
            capital,
        } => {
            let spot = match spot {
                Some(s) => s,
                None => {
                    let client = market_client(cfg);
                    let timeout = Duration::from_secs(cfg.data_timeout_secs);
                    tokio::time::timeout(timeout, client.get_spot(&ticker))
                        .await
                        .map_err(|_| {
                            HedgeError::ExternalUnavailable(format!("spot for {ticker} timed out"))
                        })??
                }
            };

            let allocator = BudgetAllocator::new(cfg.monthly_budget, &cfg.weights)?;
            let capital = capital.unwrap_or_else(|| allocator.allocation_for(&ticker).amount);
            let strike = strike.unwrap_or((spot * cfg.target_moneyness).round());
            let dte = dte.unwrap_or(cfg.target_dte);
            let vol = vol.unwrap_or(cfg.default_volatility);

            // Spend the same capital on puts as on the fund
            let entry = price_adjustable(&OptionSpec::new(
                spot,
                strike,
                dte as f64 / 365.0,
                vol,
                cfg.risk_free_rate,
                OptionRight::Put,
            ))?;
            let contracts =
                contracts_within_capital(capital, entry.price, cfg.contract_multiplier)?;

            let scenarios = parse_drops(&drops)?
                .into_iter()
                .map(|d| ScenarioInput::new(d, horizon, daily_vol))
                .collect::<HedgeResult<Vec<_>>>()?;

            let params = InstrumentParams {
                leveraged: LeveragedInstrument {
                    ticker: cfg.leveraged_ticker.clone(),
                    leverage: cfg.leverage,
                    annual_expense_ratio: cfg.leveraged_expense_ratio,
                    capital,
                },
                option: OptionLeg {
                    ticker,
                    right: OptionRight::Put,
                    spot,
                    strike,
                    days_to_expiry: dte,
                    baseline_volatility: vol,
                    baseline_stress_index: stress_index,
                    rate: cfg.risk_free_rate,
                    dividend_yield: 0.0,
                    contracts: contracts as f64,
                    multiplier: cfg.contract_multiplier,
                },
            };

            let table = CalibrationTable::historical();
            print_json(&hedge_lab::compare(&scenarios, &params, &table)?)
        }
        Command::Price {
            spot,
            strike,
            days,
            vol,
            right,
            rate,
            dividend_yield,
        } => {
            let spec = OptionSpec::new(
                spot,
                strike,
                days / 365.0,
                vol,
                rate.unwrap_or(cfg.risk_free_rate),
                right,
            )
            .with_dividend_yield(dividend_yield);
            let pricer = black_scholes::BlackScholes::new();

            #[derive(Serialize)]
            struct PriceReport {
                model: &'static str,
                spec: OptionSpec,
                raw: hedge_lab::PricingOutcome,
                adjusted: hedge_lab::AdjustedPrice,
            }
            print_json(&PriceReport {
                model: pricer.name(),
                spec,
                raw: pricer.price(&spec)?,
                adjusted: price_adjustable(&spec)?,
            })
        }
        Command::Status { as_of } => {
            let mgr = roll_manager(cfg)?;
            print_json(&mgr.get_status(as_of.unwrap_or(today))?)
        }
        Command::Suggest { as_of } => {
            let mgr = roll_manager(cfg)?;
            print_json(&mgr.suggest_rolls(as_of.unwrap_or(today)).await?)
        }
        Command::Add {
            ticker,
            strike,
            expiry,
            right,
            quantity,
            cost,
            note,
        } => {
            let instrument = match (strike, expiry) {
                (Some(strike), Some(expiry)) => Instrument::Option {
                    ticker: ticker.to_ascii_uppercase(),
                    right,
                    strike,
                    expiry,
                },
                (None, None) => Instrument::Leveraged {
                    ticker: ticker.to_ascii_uppercase(),
                },
                _ => {
                    return Err(HedgeError::invalid(
                        "expiry",
                        "an option needs both --strike and --expiry",
                    ))
                }
            };
            let mgr = roll_manager(cfg)?;
            let position = mgr.add_position(
                NewPositionSpec {
                    instrument,
                    cost_basis: cost,
                    entry_date: today,
                    note,
                },
                quantity,
            )?;
            print_json(&position)
        }
        Command::Roll {
            old_id,
            strike,
            expiry,
            cost,
            close_price,
        } => {
            let mgr = roll_manager(cfg)?;
            let old = mgr
                .store()
                .load_positions()
                .into_iter()
                .find(|p| p.id == old_id)
                .ok_or_else(|| {
                    HedgeError::invalid("old_id", format!("no active position with id {old_id}"))
                })?;

            let instrument = Instrument::Option {
                ticker: old.instrument.ticker().to_string(),
                right: old.instrument.right().unwrap_or(OptionRight::Put),
                strike,
                expiry,
            };
            let record = mgr.log_roll(
                &old_id,
                NewPositionSpec {
                    instrument,
                    cost_basis: cost,
                    entry_date: today,
                    note: old.note,
                },
                close_price,
                today,
            )?;
            print_json(&record)
        }
    }
}
