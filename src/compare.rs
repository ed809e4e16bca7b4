use crate::errors::{ensure_positive, HedgeError, HedgeResult};
use crate::models::early_exercise::EarlyExercise;
use crate::models::volatility::{CalibrationTable, Confidence, StressRegime, VolRegimeModel};
use crate::risk::breakeven::{find_breakeven_leveraged, find_breakeven_option, Breakeven};
use crate::sim::leveraged::{LeveragedInstrument, TRADING_DAYS_PER_YEAR};
use crate::sim::paths::{generate_paths, PathKind};
use crate::state::{OptionRight, OptionSpec, ScenarioInput, SimulationResult};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

const CALENDAR_DAYS_PER_YEAR: f64 = 365.0;

const DISCLAIMERS: [&str; 4] = [
    "Leveraged fund results are path dependent: the same cumulative drop delivered \
     through a different daily path produces a different ending value.",
    "Post-drop option volatility comes from an approximate stress-index table, not a \
     calibrated surface; treat option values after the move as estimates.",
    "Options are valued with a closed-form European model floored at intrinsic value; \
     no early-exercise premium beyond that floor is included.",
    "The noisy path is one seeded draw for illustration, not a probability-weighted forecast.",
];

// ── Inputs ──

/// The listed option leg of the comparison (normally a put).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionLeg {
    pub ticker: String,
    pub right: OptionRight,
    pub spot: f64,
    pub strike: f64,
    /// Calendar days to expiry at entry
    pub days_to_expiry: u32,
    pub baseline_volatility: f64,
    pub baseline_stress_index: f64,
    pub rate: f64,
    #[serde(default)]
    pub dividend_yield: f64,
    pub contracts: f64,
    pub multiplier: f64,
}

impl OptionLeg {
    fn entry_spec(&self) -> OptionSpec {
        OptionSpec::new(
            self.spot,
            self.strike,
            self.days_to_expiry as f64 / CALENDAR_DAYS_PER_YEAR,
            self.baseline_volatility,
            self.rate,
            self.right,
        )
        .with_dividend_yield(self.dividend_yield)
    }

    /// Years left after holding for `horizon_days` trading days.
    fn remaining_years(&self, horizon_days: u32) -> f64 {
        let elapsed = horizon_days as f64 * CALENDAR_DAYS_PER_YEAR / TRADING_DAYS_PER_YEAR;
        (self.days_to_expiry as f64 - elapsed).max(0.0) / CALENDAR_DAYS_PER_YEAR
    }

    fn validate(&self) -> HedgeResult<()> {
        ensure_positive("multiplier", self.multiplier)?;
        if !self.contracts.is_finite() || self.contracts < 0.0 {
            return Err(HedgeError::invalid(
                "contracts",
                format!("must be >= 0 (got {})", self.contracts),
            ));
        }
        ensure_positive("baseline_stress_index", self.baseline_stress_index)?;
        self.entry_spec().validate()
    }
}

/// Both hedge instruments being compared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentParams {
    /// Instrument A
    pub leveraged: LeveragedInstrument,
    /// Instrument B
    pub option: OptionLeg,
}

// ── Outputs ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Winner {
    InstrumentA,
    InstrumentB,
    Neither,
}

impl Winner {
    /// Strictly larger currency P&L wins; equal (or NaN) is a tie.
    pub fn decide(pnl_a: f64, pnl_b: f64) -> Self {
        match pnl_a.partial_cmp(&pnl_b) {
            Some(Ordering::Greater) => Winner::InstrumentA,
            Some(Ordering::Less) => Winner::InstrumentB,
            _ => Winner::Neither,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PathOutcome {
    pub kind: PathKind,
    pub compounded_value: f64,
    pub decay: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeveragedOutcome {
    /// Gradual-path point estimate
    pub simulation: SimulationResult,
    pub paths: Vec<PathOutcome>,
    /// Gradual minus noisy compounded value: erosion from daily volatility alone
    pub path_drag: f64,
    pub pnl: f64,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct OptionOutcome {
    pub premium_per_share: f64,
    pub premium_paid: f64,
    pub contracts: f64,
    pub price_after: f64,
    pub value_after: f64,
    pub pnl: f64,
    pub vol_before: f64,
    pub vol_after: f64,
    pub stress_index: f64,
    pub vol_confidence: Confidence,
    pub regime: StressRegime,
    pub intrinsic_floor_applied: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonRow {
    pub label: String,
    pub market_drop: f64,
    pub horizon_days: u32,
    pub leveraged: LeveragedOutcome,
    pub option: OptionOutcome,
    pub winner: Winner,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonOutput {
    pub rows: Vec<ComparisonRow>,
    pub leveraged_breakeven: Breakeven,
    pub option_breakeven: Breakeven,
    pub disclaimers: Vec<String>,
}

// ── Orchestration ──

/// Runs every scenario through the simulator, regime model and pricer.
pub struct HedgeComparator<'a> {
    pricer: EarlyExercise,
    vol_model: VolRegimeModel<'a>,
}

impl<'a> HedgeComparator<'a> {
    pub fn new(table: &'a CalibrationTable) -> Self {
        Self {
            pricer: EarlyExercise::default(),
            vol_model: VolRegimeModel::new(table),
        }
    }

    /// Breakevens are solved once per instrument, using the first scenario's
    /// horizon and volatility for the leveraged leg.
    pub fn compare(
        &self,
        scenarios: &[ScenarioInput],
        params: &InstrumentParams,
    ) -> HedgeResult<ComparisonOutput> {
        let first = scenarios
            .first()
            .ok_or_else(|| HedgeError::invalid("scenarios", "at least one scenario is required"))?;
        for s in scenarios {
            s.validate()?;
        }
        params.leveraged.validate()?;
        params.option.validate()?;

        let leg = &params.option;
        let entry = self.pricer.price_adjustable(&leg.entry_spec())?;
        let premium_paid = entry.price * leg.contracts * leg.multiplier;

        let mut rows = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            let leveraged = self.leveraged_outcome(scenario, &params.leveraged)?;
            let option = self.option_outcome(scenario, leg, entry.price, premium_paid)?;
            let winner = Winner::decide(leveraged.pnl, option.pnl);

            tracing::debug!(
                scenario = %scenario.display_label(),
                leveraged_pnl = leveraged.pnl,
                option_pnl = option.pnl,
                decay = leveraged.simulation.decay,
                vol_after = option.vol_after,
                winner = ?winner,
                "scenario compared"
            );

            rows.push(ComparisonRow {
                label: scenario.display_label(),
                market_drop: scenario.market_drop,
                horizon_days: scenario.horizon_days,
                leveraged,
                option,
                winner,
            });
        }

        let leveraged_breakeven = find_breakeven_leveraged(
            &params.leveraged,
            first.horizon_days,
            first.daily_volatility,
        )?;
        let option_breakeven = find_breakeven_option(entry.price, leg.spot, leg.strike)?;

        tracing::info!(
            scenarios = rows.len(),
            leveraged_breakeven = ?leveraged_breakeven.drop_value(),
            option_breakeven = ?option_breakeven.drop_value(),
            "hedge comparison complete"
        );

        Ok(ComparisonOutput {
            rows,
            leveraged_breakeven,
            option_breakeven,
            disclaimers: DISCLAIMERS.iter().map(|d| d.to_string()).collect(),
        })
    }

    fn leveraged_outcome(
        &self,
        scenario: &ScenarioInput,
        instrument: &LeveragedInstrument,
    ) -> HedgeResult<LeveragedOutcome> {
        let paths = generate_paths(
            scenario.market_drop,
            scenario.horizon_days,
            scenario.daily_volatility,
        )?;

        let mut outcomes = Vec::with_capacity(paths.len());
        for path in paths.iter() {
            let res = instrument.simulate(&path.returns)?;
            outcomes.push(PathOutcome {
                kind: path.kind,
                compounded_value: res.compounded_value,
                decay: res.decay,
            });
        }

        let simulation = instrument.simulate(&paths.gradual().returns)?;
        let noisy = instrument.simulate(&paths.noisy().returns)?;

        Ok(LeveragedOutcome {
            pnl: simulation.compounded_value - simulation.initial_value,
            path_drag: simulation.compounded_value - noisy.compounded_value,
            simulation,
            paths: outcomes,
        })
    }

    fn option_outcome(
        &self,
        scenario: &ScenarioInput,
        leg: &OptionLeg,
        premium_per_share: f64,
        premium_paid: f64,
    ) -> HedgeResult<OptionOutcome> {
        let vol = self.vol_model.estimate_volatility(
            leg.baseline_volatility,
            leg.baseline_stress_index,
            scenario.market_drop,
        )?;

        let after_spec = OptionSpec {
            spot: leg.spot * (1.0 + scenario.market_drop),
            time_to_expiry: leg.remaining_years(scenario.horizon_days),
            volatility: vol.adjusted_volatility,
            ..leg.entry_spec()
        };
        let after = self.pricer.price_adjustable(&after_spec)?;
        let value_after = after.price * leg.contracts * leg.multiplier;

        Ok(OptionOutcome {
            premium_per_share,
            premium_paid,
            contracts: leg.contracts,
            price_after: after.price,
            value_after,
            pnl: value_after - premium_paid,
            vol_before: leg.baseline_volatility,
            vol_after: vol.adjusted_volatility,
            stress_index: vol.stress_index,
            vol_confidence: vol.confidence,
            regime: vol.regime,
            intrinsic_floor_applied: after.is_floored(),
        })
    }
}

/// Compare with a default pricer over `table`.
pub fn compare(
    scenarios: &[ScenarioInput],
    params: &InstrumentParams,
    table: &CalibrationTable,
) -> HedgeResult<ComparisonOutput> {
    HedgeComparator::new(table).compare(scenarios, params)
}
