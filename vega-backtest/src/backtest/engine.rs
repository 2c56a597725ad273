//! Core backtesting engine.
//!
//! A run is an explicit state machine stepped one calendar day at a time:
//! 1. Fetch the underlying close (missing days are held, though legs
//!    expiring on them settle at the last known close)
//! 2. Open every leg on the first priced day
//! 3. Settle legs expiring on or before the day
//! 4. Reprice legs on reprice days, decay them by theta otherwise
//! 5. Settle legs that meet the early-exercise rule
//! 6. Record daily equity and portfolio Greeks

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::data::{Greeks, OptionContract, PriceProvider};
use crate::math::{to_decimal, to_f64, PRICE_DP};
use crate::metrics::MetricsCalculator;
use crate::pricing::{PricingEngine, PricingMethod};
use crate::risk::PortfolioGreeks;
use crate::strategy::{Strategy, StrategyValidator};

use super::commission::CommissionModel;
use super::lifecycle::{calculate_time_decay, handle_early_exercise, simulate_option_expiry, EarlyExercisePolicy};
use super::result::{BacktestError, BacktestFailure, BacktestResult, EquityPoint};
use super::trade::{ActiveLeg, Trade, TradeAction};

/// Configuration for backtest execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    /// Starting capital.
    pub initial_capital: Decimal,

    /// Continuously compounded risk-free rate used by the models.
    pub risk_free_rate: f64,

    /// Units of underlying per contract.
    pub contract_multiplier: Decimal,

    /// Model used on full-reprice days.
    pub pricing_method: PricingMethod,

    /// Days between full reprices; theta decay in between.
    pub reprice_interval_days: u32,

    pub early_exercise: EarlyExercisePolicy,

    pub commission: CommissionModel,

    /// Base seed for Monte Carlo valuations.
    pub seed: u64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: Decimal::from(100_000),
            risk_free_rate: 0.05,
            contract_multiplier: Decimal::from(100),
            pricing_method: PricingMethod::ClosedForm,
            reprice_interval_days: 1,
            early_exercise: EarlyExercisePolicy::default(),
            commission: CommissionModel::zero(),
            seed: 42,
        }
    }
}

impl BacktestConfig {
    pub fn validate(&self) -> Result<(), BacktestError> {
        let invalid = |msg: String| Err(BacktestError::InvalidConfig(msg));

        if self.initial_capital <= Decimal::ZERO {
            return invalid(format!("initial capital must be positive, got {}", self.initial_capital));
        }
        if self.contract_multiplier <= Decimal::ZERO {
            return invalid(format!(
                "contract multiplier must be positive, got {}",
                self.contract_multiplier
            ));
        }
        if !self.risk_free_rate.is_finite() {
            return invalid(format!("risk-free rate must be finite, got {}", self.risk_free_rate));
        }
        if self.reprice_interval_days == 0 {
            return invalid("reprice interval must be at least one day".to_string());
        }

        let policy = &self.early_exercise;
        if !(policy.deep_itm_threshold >= 0.0 && policy.time_value_threshold >= 0.0) {
            return invalid(format!(
                "early exercise thresholds must be non-negative, got {} and {}",
                policy.deep_itm_threshold, policy.time_value_threshold
            ));
        }

        let commission = &self.commission;
        if commission.per_contract < Decimal::ZERO
            || commission.min_per_order < Decimal::ZERO
            || commission.max_per_order < Decimal::ZERO
        {
            return invalid("commission amounts must be non-negative".to_string());
        }

        match self.pricing_method {
            PricingMethod::Lattice { steps: 0, .. } => invalid("lattice needs at least one step".to_string()),
            PricingMethod::MonteCarlo { paths: 0, .. } => invalid("Monte Carlo needs at least one path".to_string()),
            _ => Ok(()),
        }
    }

    /// Parse and validate. Missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, BacktestError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| BacktestError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacktestState {
    Initialized,
    Running,
    Completed,
    Failed,
}

/// What happened to a leg on a given day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum LegEvent {
    Open { leg: usize, price: Decimal },
    Expire { leg: usize, settlement: Decimal },
    Exercise { leg: usize, settlement: Decimal },
    /// Carried value moved by theta.
    Decay { leg: usize, value: Decimal },
    /// Fully repriced by the model.
    Hold { leg: usize, value: Decimal },
    /// Every model failed; the leg is carried at zero.
    Fallback { leg: usize },
}

/// Outcome of one transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DayStep {
    pub date: NaiveDate,
    /// `None` when the provider had no price and the day was held.
    pub underlying_price: Option<Decimal>,
    pub events: Vec<LegEvent>,
    pub portfolio_value: Option<Decimal>,
}

struct Valuation {
    price: Decimal,
    greeks: Greeks,
    fallback: bool,
}

#[derive(Default)]
struct DayTally {
    valued: bool,
    anomaly: bool,
}

impl DayTally {
    fn record(&mut self, valuation: &Valuation) {
        self.valued = true;
        self.anomaly |= valuation.fallback;
    }
}

/// The main backtesting engine.
#[derive(Debug, Clone, Default)]
pub struct BacktestEngine {
    config: BacktestConfig,
}

impl BacktestEngine {
    pub fn new(config: BacktestConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Validate everything up front and return a run ready to step.
    pub fn start<'a, P>(
        &self,
        strategy: &'a Strategy,
        provider: &'a P,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BacktestRun<'a, P>, BacktestError>
    where
        P: PriceProvider + ?Sized,
    {
        self.config.validate()?;
        if end < start {
            return Err(BacktestError::InvalidConfig(format!(
                "end date {end} precedes start date {start}"
            )));
        }
        StrategyValidator::validate(strategy)?;

        for (index, leg) in strategy.legs.iter().enumerate() {
            leg.contract
                .validate()
                .map_err(|source| BacktestError::InvalidContract { leg: index, source })?;
            if leg.contract.expiration() < start {
                return Err(BacktestError::InvalidConfig(format!(
                    "leg {index} expires on {} before the start date {start}",
                    leg.contract.expiration()
                )));
            }
        }

        Ok(BacktestRun {
            config: self.config.clone(),
            strategy,
            provider,
            start,
            end,
            next: Some(start),
            state: BacktestState::Initialized,
            opened: false,
            cash: self.config.initial_capital,
            active: Vec::new(),
            trades: Vec::new(),
            equity_curve: Vec::new(),
            last_date: None,
            last_spot: None,
            priced_days: 0,
            valued_days: 0,
            anomaly_days: 0,
            failure: None,
        })
    }

    /// Run the whole horizon.
    pub fn run<P>(
        &self,
        strategy: &Strategy,
        provider: &P,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BacktestResult, BacktestFailure>
    where
        P: PriceProvider + ?Sized,
    {
        let run = self.start(strategy, provider, start, end).map_err(|error| {
            error!(strategy = %strategy.name, %error, "backtest rejected");
            BacktestFailure {
                error,
                trades: Vec::new(),
                equity_curve: Vec::new(),
                failed_on: None,
            }
        })?;
        run.finish()
    }
}

/// A single backtest in progress. Owns its ledger and equity curve.
pub struct BacktestRun<'a, P: PriceProvider + ?Sized> {
    config: BacktestConfig,
    strategy: &'a Strategy,
    provider: &'a P,
    start: NaiveDate,
    end: NaiveDate,
    next: Option<NaiveDate>,
    state: BacktestState,
    opened: bool,
    cash: Decimal,
    active: Vec<ActiveLeg>,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    last_date: Option<NaiveDate>,
    /// Most recent underlying close seen by the run.
    last_spot: Option<Decimal>,
    priced_days: usize,
    valued_days: usize,
    anomaly_days: usize,
    failure: Option<BacktestError>,
}

impl<'a, P: PriceProvider + ?Sized> BacktestRun<'a, P> {
    pub fn state(&self) -> BacktestState {
        self.state
    }

    /// Next date `step` will process.
    pub fn next_date(&self) -> Option<NaiveDate> {
        self.next
    }

    pub fn cash(&self) -> Decimal {
        self.cash
    }

    pub fn active_legs(&self) -> &[ActiveLeg] {
        &self.active
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    /// Process exactly one date.
    ///
    /// Returns `Ok(None)` once the horizon is exhausted and the run has
    /// completed. The transition into `Failed` returns the error; later
    /// calls return `Ok(None)`.
    pub fn step(&mut self) -> Result<Option<DayStep>, BacktestError> {
        match self.state {
            BacktestState::Completed | BacktestState::Failed => return Ok(None),
            BacktestState::Initialized => {
                info!(
                    strategy = %self.strategy.name,
                    start = %self.start,
                    end = %self.end,
                    method = self.config.pricing_method.name(),
                    "backtest started"
                );
                self.state = BacktestState::Running;
            }
            BacktestState::Running => {}
        }

        let Some(date) = self.next else {
            self.finalize()?;
            return Ok(None);
        };
        self.next = date.succ_opt().filter(|d| *d <= self.end);
        Ok(Some(self.process_day(date)))
    }

    /// Drive the remaining days and assemble the result.
    pub fn finish(mut self) -> Result<BacktestResult, BacktestFailure> {
        loop {
            match self.step() {
                Ok(Some(_)) => {}
                Ok(None) => break,
                Err(error) => return Err(self.into_failure(error)),
            }
        }
        if let Some(error) = self.failure.take() {
            return Err(self.into_failure(error));
        }
        Ok(self.into_result())
    }

    fn process_day(&mut self, date: NaiveDate) -> DayStep {
        self.last_date = Some(date);

        let spot = match self.provider.price_on(date) {
            Ok(price) => price,
            Err(err) => {
                warn!(%date, error = %err, "no underlying price, holding positions");
                return self.hold_day(date);
            }
        };
        self.priced_days += 1;
        self.last_spot = Some(spot);

        let day_offset = (date - self.start).num_days();
        let mut events = Vec::new();
        let mut tally = DayTally::default();

        if !self.opened {
            self.open_legs(date, spot, day_offset, &mut events, &mut tally);
            self.opened = true;
        }
        self.settle_expired(date, spot, &mut events);
        self.value_active(date, spot, day_offset, &mut events, &mut tally);
        self.exercise_early(date, spot, &mut events);

        if tally.valued {
            self.valued_days += 1;
            if tally.anomaly {
                self.anomaly_days += 1;
            }
        }

        let portfolio_value = self.record_equity(date);
        debug!(
            %date,
            underlying = %spot,
            portfolio_value = %portfolio_value,
            active_legs = self.active.len(),
            events = events.len(),
            "day processed"
        );

        DayStep {
            date,
            underlying_price: Some(spot),
            events,
            portfolio_value: Some(portfolio_value),
        }
    }

    /// A day without a price. Legs expiring on it still settle, at the last
    /// known close, and the changed book gets an equity point.
    fn hold_day(&mut self, date: NaiveDate) -> DayStep {
        let mut events = Vec::new();
        let portfolio_value = match self.last_spot {
            Some(spot) if self.active.iter().any(|leg| leg.contract().is_expired(date)) => {
                warn!(%date, last_spot = %spot, "settling expired legs at the last known price");
                self.settle_expired(date, spot, &mut events);
                Some(self.record_equity(date))
            }
            _ => None,
        };

        DayStep {
            date,
            underlying_price: None,
            events,
            portfolio_value,
        }
    }

    fn open_legs(
        &mut self,
        date: NaiveDate,
        spot: Decimal,
        day_offset: i64,
        events: &mut Vec<LegEvent>,
        tally: &mut DayTally,
    ) {
        let strategy = self.strategy;
        let multiplier = self.config.contract_multiplier;

        for (index, leg) in strategy.legs.iter().enumerate() {
            let valuation = self.value_leg(&leg.contract, spot, date, index, day_offset);
            tally.record(&valuation);

            let entry_price = if leg.contract.current_price > Decimal::ZERO {
                leg.contract.current_price
            } else {
                valuation.price
            };
            let action = TradeAction::from(leg.action);
            let commission = self.config.commission.for_action(action, leg.quantity());

            let mut active = ActiveLeg::open(index, leg.clone(), entry_price, commission, date);
            active.leg.contract.greeks = valuation.greeks;
            self.cash += active.opening_cash_flow(multiplier) - commission;
            self.active.push(active);

            let portfolio_value = self.portfolio_value();
            self.trades.push(Trade {
                date,
                action,
                instrument_id: leg.contract.id.clone(),
                leg_index: index,
                quantity: leg.quantity(),
                price: entry_price,
                commission,
                realized_pnl: None,
                portfolio_value,
            });
            events.push(LegEvent::Open {
                leg: index,
                price: entry_price,
            });
        }
    }

    fn settle_expired(&mut self, date: NaiveDate, spot: Decimal, events: &mut Vec<LegEvent>) {
        let (expired, remaining): (Vec<ActiveLeg>, Vec<ActiveLeg>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|leg| leg.contract().is_expired(date));
        self.active = remaining;

        for leg in expired {
            let settlement = simulate_option_expiry(leg.contract(), spot);
            events.push(LegEvent::Expire {
                leg: leg.index,
                settlement,
            });
            self.settle(leg, date, TradeAction::Expire, settlement);
        }
    }

    fn value_active(
        &mut self,
        date: NaiveDate,
        spot: Decimal,
        day_offset: i64,
        events: &mut Vec<LegEvent>,
        tally: &mut DayTally,
    ) {
        let interval = i64::from(self.config.reprice_interval_days);

        for i in 0..self.active.len() {
            let elapsed = (date - self.active[i].last_valued).num_days();
            if elapsed <= 0 {
                continue;
            }

            if (date - self.active[i].last_repriced).num_days() >= interval {
                let valuation = self.value_leg(self.active[i].contract(), spot, date, self.active[i].index, day_offset);
                tally.record(&valuation);

                let leg = &mut self.active[i];
                leg.leg.contract.update_mark(valuation.price, valuation.greeks);
                leg.last_repriced = date;
                events.push(if valuation.fallback {
                    LegEvent::Fallback { leg: leg.index }
                } else {
                    LegEvent::Hold {
                        leg: leg.index,
                        value: valuation.price,
                    }
                });
            } else {
                let leg = &mut self.active[i];
                let decay = calculate_time_decay(leg.contract(), elapsed);
                let value = (leg.carried_value() + decay).max(Decimal::ZERO);
                leg.leg.contract.current_price = value;
                events.push(LegEvent::Decay { leg: leg.index, value });
            }
            self.active[i].last_valued = date;
        }
    }

    fn exercise_early(&mut self, date: NaiveDate, spot: Decimal, events: &mut Vec<LegEvent>) {
        let policy = self.config.early_exercise;
        let (exercised, remaining): (Vec<ActiveLeg>, Vec<ActiveLeg>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|leg| handle_early_exercise(leg.contract(), spot, &policy));
        self.active = remaining;

        for leg in exercised {
            let settlement = leg.contract().intrinsic_value(spot);
            events.push(LegEvent::Exercise {
                leg: leg.index,
                settlement,
            });
            self.settle(leg, date, TradeAction::Exercise, settlement);
        }
    }

    /// Close a leg that has already left the active set.
    fn settle(&mut self, leg: ActiveLeg, date: NaiveDate, action: TradeAction, price: Decimal) {
        let multiplier = self.config.contract_multiplier;
        let commission = self.config.commission.for_action(action, leg.quantity());
        self.cash += leg.settlement_cash_flow(price, multiplier) - commission;
        let realized_pnl = leg.settlement_pnl(price, commission, multiplier);

        let portfolio_value = self.portfolio_value();
        self.trades.push(Trade {
            date,
            action,
            instrument_id: leg.contract().id.clone(),
            leg_index: leg.index,
            quantity: leg.quantity(),
            price,
            commission,
            realized_pnl: Some(realized_pnl),
            portfolio_value,
        });
    }

    /// Model value of a contract, falling back to the closed form and
    /// then to zero.
    fn value_leg(
        &self,
        contract: &OptionContract,
        spot: Decimal,
        date: NaiveDate,
        leg_index: usize,
        day_offset: i64,
    ) -> Valuation {
        let inputs = contract.pricing_inputs(to_f64(spot), date, self.config.risk_free_rate);
        let method = self
            .config
            .pricing_method
            .reseeded(self.leg_seed(day_offset, leg_index));

        let price = PricingEngine::price(&inputs, method).or_else(|err| {
            if method == PricingMethod::ClosedForm {
                return Err(err);
            }
            warn!(%date, leg = leg_index, method = method.name(), error = %err, "pricing failed, retrying closed form");
            PricingEngine::price(&inputs, PricingMethod::ClosedForm)
        });

        match price.and_then(|p| PricingEngine::greeks(&inputs).map(|g| (p, g))) {
            Ok((price, greeks)) => Valuation {
                price: to_decimal(price.max(0.0), PRICE_DP),
                greeks,
                fallback: false,
            },
            Err(err) => {
                warn!(%date, leg = leg_index, instrument = %contract.id, error = %err, "leg valued at zero");
                Valuation {
                    price: Decimal::ZERO,
                    greeks: Greeks::default(),
                    fallback: true,
                }
            }
        }
    }

    /// Per-valuation seed mixing the run seed, the method's own seed, the
    /// day and the leg.
    fn leg_seed(&self, day_offset: i64, leg_index: usize) -> u64 {
        let method_seed = match self.config.pricing_method {
            PricingMethod::MonteCarlo { seed, .. } => seed,
            _ => 0,
        };
        (self.config.seed ^ method_seed)
            .wrapping_add((day_offset as u64).wrapping_mul(7_919))
            .wrapping_add((leg_index as u64).wrapping_mul(104_729))
    }

    fn positions_value(&self) -> Decimal {
        let multiplier = self.config.contract_multiplier;
        self.active.iter().map(|leg| leg.market_value(multiplier)).sum()
    }

    fn portfolio_value(&self) -> Decimal {
        self.cash + self.positions_value()
    }

    fn record_equity(&mut self, date: NaiveDate) -> Decimal {
        let positions_value = self.positions_value();
        let portfolio_value = self.cash + positions_value;
        let previous = self
            .equity_curve
            .last()
            .map(|p| p.portfolio_value)
            .unwrap_or(self.config.initial_capital);

        self.equity_curve.push(EquityPoint {
            date,
            portfolio_value,
            cash: self.cash,
            positions_value,
            active_legs: self.active.len(),
            daily_pnl: portfolio_value - previous,
            greeks: PortfolioGreeks::from_legs(&self.active, self.config.contract_multiplier),
        });
        portfolio_value
    }

    fn finalize(&mut self) -> Result<(), BacktestError> {
        let outcome = if self.priced_days == 0 {
            Err(BacktestError::MissingPriceData {
                start: self.start,
                end: self.end,
            })
        } else if self.valued_days > 0 && self.anomaly_days == self.valued_days {
            Err(BacktestError::SystemicPricingFailure {
                days: self.anomaly_days,
            })
        } else {
            Ok(())
        };

        match outcome {
            Ok(()) => {
                self.state = BacktestState::Completed;
                info!(
                    strategy = %self.strategy.name,
                    trades = self.trades.len(),
                    days = self.equity_curve.len(),
                    final_value = %self.portfolio_value(),
                    "backtest completed"
                );
                Ok(())
            }
            Err(err) => {
                self.state = BacktestState::Failed;
                error!(strategy = %self.strategy.name, error = %err, "backtest failed");
                self.failure = Some(err.clone());
                Err(err)
            }
        }
    }

    fn into_failure(self, error: BacktestError) -> BacktestFailure {
        BacktestFailure {
            error,
            trades: self.trades,
            equity_curve: self.equity_curve,
            failed_on: self.last_date,
        }
    }

    fn into_result(self) -> BacktestResult {
        let metrics = MetricsCalculator::analyze(self.config.initial_capital, &self.equity_curve, &self.trades);
        let final_capital = self
            .equity_curve
            .last()
            .map(|p| p.portfolio_value)
            .unwrap_or(self.cash);

        BacktestResult {
            strategy_name: self.strategy.name.clone(),
            start_date: self.start,
            end_date: self.end,
            initial_capital: self.config.initial_capital,
            final_capital,
            trades: self.trades,
            equity_curve: self.equity_curve,
            metrics,
            open_legs: self.active.len(),
            anomaly_days: self.anomaly_days,
            config: self.config,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{FnPriceProvider, GbmPriceGenerator, HistoricalPrices, OptionType};
    use crate::strategy::{LegAction, StrategyBuilder, StrategyError};
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn contract(option_type: OptionType, strike: Decimal, expiry: NaiveDate, price: Decimal) -> OptionContract {
        OptionContract::new(
            format!("SPY{}{}{}", expiry.format("%y%m%d"), option_type.as_str(), strike),
            "SPY",
            option_type,
            strike,
            expiry,
        )
        .unwrap()
        .with_price(price)
        .with_implied_volatility(0.2)
    }

    fn flat(price: Decimal) -> FnPriceProvider<impl Fn(NaiveDate) -> Option<Decimal>> {
        FnPriceProvider::new(move |_| Some(price))
    }

    fn long_call() -> Strategy {
        StrategyBuilder::single(
            contract(OptionType::Call, dec!(100), date(2, 1), dec!(3.00)),
            LegAction::Buy,
            1,
        )
        .unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = BacktestConfig::default();
        assert_eq!(config.initial_capital, dec!(100_000));
        assert_eq!(config.contract_multiplier, dec!(100));
        assert_eq!(config.pricing_method, PricingMethod::ClosedForm);
        assert_eq!(config.reprice_interval_days, 1);
        assert_eq!(config.commission, CommissionModel::zero());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = BacktestConfig::from_json(
            r#"{"initial_capital": "50000", "pricing_method": {"method": "monte_carlo", "paths": 2000, "seed": 7}}"#,
        )
        .unwrap();
        assert_eq!(config.initial_capital, dec!(50000));
        assert_eq!(config.pricing_method, PricingMethod::MonteCarlo { paths: 2000, seed: 7 });
        assert_eq!(config.risk_free_rate, 0.05);

        let round_trip = BacktestConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(round_trip, config);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = BacktestConfig {
            initial_capital: dec!(0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(BacktestError::InvalidConfig(_))));

        let config = BacktestConfig {
            reprice_interval_days: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(BacktestConfig::from_json(r#"{"pricing_method": {"method": "lattice", "steps": 0}}"#).is_err());
    }

    #[test]
    fn test_long_call_held_to_expiry() {
        let _ = tracing_subscriber::fmt().with_test_writer().try_init();

        let engine = BacktestEngine::default();
        let strategy = long_call();
        let result = engine.run(&strategy, &flat(dec!(105)), date(1, 2), date(2, 1)).unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[0].action, TradeAction::Buy);
        assert_eq!(result.trades[0].price, dec!(3.00));
        assert_eq!(result.trades[0].realized_pnl, None);
        assert_eq!(result.trades[1].action, TradeAction::Expire);
        assert_eq!(result.trades[1].price, dec!(5));
        assert_eq!(result.trades[1].realized_pnl, Some(dec!(200)));

        assert_eq!(result.equity_curve.len(), 31);
        assert_eq!(result.equity_curve[0].portfolio_value, dec!(100_000));
        assert_eq!(result.equity_curve[0].cash, dec!(99_700));
        assert_eq!(result.final_capital, dec!(100_200));
        assert_eq!(result.open_legs, 0);
        assert_eq!(result.metrics.closing_trades, 1);
        assert_eq!(result.metrics.win_rate, 1.0);
        assert!(result.metrics.total_return > 0.0);
    }

    #[test]
    fn test_portfolio_value_is_cash_plus_positions() {
        let strategy = StrategyBuilder::strangle(
            contract(OptionType::Put, dec!(95), date(3, 15), dec!(2.10)),
            contract(OptionType::Call, dec!(105), date(3, 15), dec!(1.90)),
            LegAction::Sell,
            2,
        )
        .unwrap();
        let prices = GbmPriceGenerator::new(dec!(100), 0.0, 0.10, 9).generate(date(1, 2), date(2, 29));
        let result = BacktestEngine::default()
            .run(&strategy, &prices, date(1, 2), date(2, 29))
            .unwrap();

        assert_eq!(result.trades[0].action, TradeAction::Sell);
        assert_eq!(result.equity_curve[0].cash, dec!(100_800));
        for point in &result.equity_curve {
            assert_eq!(point.portfolio_value, point.cash + point.positions_value);
        }
        // Legs expire after the end date and stay open.
        assert_eq!(result.open_legs, 2);
        assert_eq!(result.equity_curve.last().map(|p| p.active_legs), Some(2));
    }

    #[test]
    fn test_runs_are_deterministic() {
        let config = BacktestConfig {
            pricing_method: PricingMethod::MonteCarlo { paths: 2_000, seed: 0 },
            ..Default::default()
        };
        let strategy = StrategyBuilder::straddle(
            contract(OptionType::Call, dec!(100), date(2, 16), dec!(0)),
            contract(OptionType::Put, dec!(100), date(2, 16), dec!(0)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let prices = GbmPriceGenerator::new(dec!(100), 0.05, 0.2, 3).generate(date(1, 2), date(2, 16));
        let engine = BacktestEngine::new(config);

        let a = engine.run(&strategy, &prices, date(1, 2), date(2, 16)).unwrap();
        let b = engine.run(&strategy, &prices, date(1, 2), date(2, 16)).unwrap();
        assert_eq!(a, b);
        // Contracts without a mark open at the model price.
        assert!(a.trades[0].price > Decimal::ZERO);
    }

    #[test]
    fn test_missing_days_are_held() {
        use chrono::{Datelike, Weekday};
        let weekdays = FnPriceProvider::new(|d: NaiveDate| match d.weekday() {
            Weekday::Sat | Weekday::Sun => None,
            _ => Some(dec!(101)),
        });
        let result = BacktestEngine::default()
            .run(&long_call(), &weekdays, date(1, 8), date(1, 21))
            .unwrap();
        assert_eq!(result.equity_curve.len(), 10);
        assert!(result
            .equity_curve
            .iter()
            .all(|p| !matches!(p.date.weekday(), Weekday::Sat | Weekday::Sun)));
    }

    #[test]
    fn test_no_prices_at_all_fails() {
        let none = FnPriceProvider::new(|_| None);
        let failure = BacktestEngine::default()
            .run(&long_call(), &none, date(1, 2), date(1, 10))
            .unwrap_err();
        assert_eq!(
            failure.error,
            BacktestError::MissingPriceData {
                start: date(1, 2),
                end: date(1, 10)
            }
        );
        assert!(failure.trades.is_empty());
        assert_eq!(failure.failed_on, Some(date(1, 10)));
    }

    #[test]
    fn test_empty_strategy_rejected_before_running() {
        let empty = Strategy::new("e", "empty", crate::strategy::StrategyType::SingleLeg);
        let err = BacktestEngine::default()
            .start(&empty, &flat(dec!(100)), date(1, 2), date(1, 5))
            .err();
        assert_eq!(err, Some(BacktestError::StrategyStructure(StrategyError::Empty)));
    }

    #[test]
    fn test_bad_dates_rejected() {
        let engine = BacktestEngine::default();
        let failure = engine
            .run(&long_call(), &flat(dec!(100)), date(1, 10), date(1, 2))
            .unwrap_err();
        assert!(matches!(failure.error, BacktestError::InvalidConfig(_)));

        // Leg expires before the run starts.
        let failure = engine
            .run(&long_call(), &flat(dec!(100)), date(2, 5), date(2, 10))
            .unwrap_err();
        assert!(matches!(failure.error, BacktestError::InvalidConfig(_)));
    }

    #[test]
    fn test_deep_itm_leg_exercised_early() {
        let strategy = StrategyBuilder::single(
            contract(OptionType::Put, dec!(100), date(3, 15), dec!(20.05)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let result = BacktestEngine::default()
            .run(&strategy, &flat(dec!(80)), date(1, 2), date(1, 6))
            .unwrap();

        assert_eq!(result.trades.len(), 2);
        assert_eq!(result.trades[1].action, TradeAction::Exercise);
        assert_eq!(result.trades[1].date, date(1, 2));
        assert_eq!(result.trades[1].price, dec!(20));
        assert_eq!(result.trades[1].realized_pnl, Some(dec!(-5.00)));
        assert_eq!(result.final_capital, dec!(99_995));
        assert_eq!(result.equity_curve.len(), 5);
    }

    #[test]
    fn test_stepping_exposes_each_transition() {
        let config = BacktestConfig {
            reprice_interval_days: 5,
            ..Default::default()
        };
        let engine = BacktestEngine::new(config);
        let strategy = long_call();
        let provider = flat(dec!(98));
        let mut run = engine.start(&strategy, &provider, date(1, 2), date(1, 12)).unwrap();
        assert_eq!(run.state(), BacktestState::Initialized);

        let first = run.step().unwrap().unwrap();
        assert_eq!(run.state(), BacktestState::Running);
        assert_eq!(first.events, vec![LegEvent::Open { leg: 0, price: dec!(3.00) }]);
        assert_eq!(first.underlying_price, Some(dec!(98)));

        let second = run.step().unwrap().unwrap();
        assert_eq!(second.date, date(1, 3));
        assert!(matches!(second.events[..], [LegEvent::Decay { leg: 0, .. }]));
        // Theta is negative for a long call, so the carried value shrinks.
        assert!(run.active_legs()[0].carried_value() < dec!(3.00));

        for _ in 0..4 {
            run.step().unwrap();
        }
        assert_eq!(run.equity_curve().last().map(|p| p.date), Some(date(1, 7)));
        assert_eq!(run.active_legs()[0].last_repriced, date(1, 7));

        let result = run.finish().unwrap();
        assert_eq!(result.equity_curve.len(), 11);
        assert_eq!(result.open_legs, 1);
    }

    #[test]
    fn test_systemic_pricing_failure() {
        // A hugely negative rate overflows the discount factor, so even the
        // closed form returns a non-finite price on every valuation.
        let config = BacktestConfig {
            risk_free_rate: -1e300,
            ..Default::default()
        };
        let strategy = StrategyBuilder::single(
            contract(OptionType::Put, dec!(100), date(2, 1), dec!(3.00)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let provider = flat(dec!(100));
        let engine = BacktestEngine::new(config);
        let mut run = engine.start(&strategy, &provider, date(1, 2), date(1, 4)).unwrap();

        run.step().unwrap();
        let second = run.step().unwrap().unwrap();
        assert_eq!(second.events, vec![LegEvent::Fallback { leg: 0 }]);
        assert_eq!(run.active_legs()[0].carried_value(), Decimal::ZERO);

        let failure = run.finish().unwrap_err();
        assert_eq!(failure.error, BacktestError::SystemicPricingFailure { days: 3 });
        assert_eq!(failure.trades.len(), 1);
        assert_eq!(failure.equity_curve.len(), 3);
        assert_eq!(failure.failed_on, Some(date(1, 4)));
    }

    #[test]
    fn test_lattice_failure_falls_back_to_closed_form() {
        // One step with a large rate and tiny vol puts the up probability
        // above one, so the lattice refuses every valuation.
        let config = BacktestConfig {
            risk_free_rate: 2.0,
            pricing_method: PricingMethod::Lattice {
                steps: 1,
                exercise: crate::pricing::ExerciseStyle::European,
            },
            ..Default::default()
        };
        let call = contract(OptionType::Call, dec!(100), date(2, 1), dec!(0)).with_implied_volatility(0.01);
        let strategy = StrategyBuilder::single(call.clone(), LegAction::Buy, 1).unwrap();

        let closed_form = |on: NaiveDate| {
            let inputs = call.pricing_inputs(100.0, on, 2.0);
            assert!(PricingEngine::price(&inputs, config.pricing_method).is_err());
            to_decimal(PricingEngine::price(&inputs, PricingMethod::ClosedForm).unwrap().max(0.0), PRICE_DP)
        };

        let result = BacktestEngine::new(config.clone())
            .run(&strategy, &flat(dec!(100)), date(1, 2), date(1, 10))
            .unwrap();

        assert_eq!(result.anomaly_days, 0);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].price, closed_form(date(1, 2)));
        assert!(result.trades[0].price > Decimal::ZERO);
        let last = result.equity_curve.last().unwrap();
        assert_eq!(last.positions_value, closed_form(date(1, 10)) * dec!(100));
    }

    #[test]
    fn test_method_seed_changes_monte_carlo_runs() {
        let strategy = StrategyBuilder::straddle(
            contract(OptionType::Call, dec!(100), date(2, 16), dec!(0)),
            contract(OptionType::Put, dec!(100), date(2, 16), dec!(0)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let prices = GbmPriceGenerator::new(dec!(100), 0.05, 0.2, 3).generate(date(1, 2), date(1, 31));
        let run_with = |seed: u64| {
            let config = BacktestConfig {
                pricing_method: PricingMethod::MonteCarlo { paths: 2_000, seed },
                ..Default::default()
            };
            BacktestEngine::new(config)
                .run(&strategy, &prices, date(1, 2), date(1, 31))
                .unwrap()
        };

        let a = run_with(1);
        let b = run_with(999_999);
        assert_ne!(a.trades[0].price, b.trades[0].price);
        assert_ne!(a.equity_curve, b.equity_curve);
        assert_eq!(run_with(1), a);
    }

    #[test]
    fn test_weekend_expiry_settles_at_last_close() {
        use chrono::{Datelike, Weekday};
        let weekdays = FnPriceProvider::new(|d: NaiveDate| match d.weekday() {
            Weekday::Sat | Weekday::Sun => None,
            _ => Some(dec!(102)),
        });
        // Expires Saturday 2024-01-06; the horizon ends on the Sunday.
        let strategy = StrategyBuilder::single(
            contract(OptionType::Call, dec!(100), date(1, 6), dec!(3.00)),
            LegAction::Buy,
            1,
        )
        .unwrap();
        let result = BacktestEngine::default()
            .run(&strategy, &weekdays, date(1, 2), date(1, 7))
            .unwrap();

        assert_eq!(result.open_legs, 0);
        assert_eq!(result.trades.len(), 2);
        let expiry = &result.trades[1];
        assert_eq!(expiry.action, TradeAction::Expire);
        assert_eq!(expiry.date, date(1, 6));
        assert_eq!(expiry.price, dec!(2));
        assert_eq!(expiry.realized_pnl, Some(dec!(-100)));

        // Four weekdays plus the Saturday settlement.
        assert_eq!(result.equity_curve.len(), 5);
        assert_eq!(result.final_capital, dec!(99_900));
    }

    #[test]
    fn test_commissions_reduce_cash_and_pnl() {
        let config = BacktestConfig {
            commission: CommissionModel::new(dec!(0.65)),
            ..Default::default()
        };
        let result = BacktestEngine::new(config)
            .run(&long_call(), &flat(dec!(105)), date(1, 2), date(2, 1))
            .unwrap();
        assert_eq!(result.trades[0].commission, dec!(0.65));
        assert_eq!(result.trades[1].commission, dec!(0));
        assert_eq!(result.trades[1].realized_pnl, Some(dec!(199.35)));
        assert_eq!(result.final_capital, dec!(100_199.35));
        assert_eq!(result.metrics.total_commission, dec!(0.65));
    }

    #[test]
    fn test_result_json_round_trip() {
        let result = BacktestEngine::default()
            .run(&long_call(), &flat(dec!(105)), date(1, 2), date(1, 12))
            .unwrap();
        let json = result.to_json().unwrap();
        let parsed = BacktestResult::from_json(&json).unwrap();
        assert_eq!(parsed.trades, result.trades);
        assert_eq!(parsed.final_capital, result.final_capital);
        assert!(result.summary().contains("Final Capital"));
    }

    #[test]
    fn test_historical_series_provider() {
        let prices: HistoricalPrices = (2..=5).map(|d| (date(1, d), dec!(104))).collect();
        let result = BacktestEngine::default()
            .run(&long_call(), &prices, date(1, 2), date(1, 5))
            .unwrap();
        assert_eq!(result.equity_curve.len(), 4);
        assert_eq!(result.trades.len(), 1);
    }
}
