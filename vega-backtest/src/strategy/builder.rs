//! Builders for the common strategy structures.
//!
//! The presets assemble legs in a fixed order and run the validator, so
//! a built strategy is always structurally sound.

use crate::data::OptionContract;

use super::types::{LegAction, Strategy, StrategyLeg, StrategyType};
use super::validator::{StrategyError, StrategyValidator};

pub struct StrategyBuilder {
    id: String,
    name: String,
    description: String,
    strategy_type: StrategyType,
    legs: Vec<(OptionContract, LegAction, u32)>,
}

impl StrategyBuilder {
    pub fn new(strategy_type: StrategyType) -> Self {
        Self {
            id: String::new(),
            name: strategy_type.to_string(),
            description: String::new(),
            strategy_type,
            legs: Vec::new(),
        }
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn leg(mut self, contract: OptionContract, action: LegAction, quantity: u32) -> Self {
        self.legs.push((contract, action, quantity));
        self
    }

    pub fn buy(self, contract: OptionContract, quantity: u32) -> Self {
        self.leg(contract, LegAction::Buy, quantity)
    }

    pub fn sell(self, contract: OptionContract, quantity: u32) -> Self {
        self.leg(contract, LegAction::Sell, quantity)
    }

    /// Assemble and validate.
    pub fn build(self) -> Result<Strategy, StrategyError> {
        let id = if self.id.is_empty() {
            self.legs
                .iter()
                .map(|(contract, _, _)| contract.id.as_str())
                .collect::<Vec<_>>()
                .join("/")
        } else {
            self.id
        };

        let mut strategy = Strategy::new(id, self.name, self.strategy_type).with_description(self.description);
        for (contract, action, quantity) in self.legs {
            strategy.add_leg(StrategyLeg::new(contract, action, quantity)?);
        }
        StrategyValidator::validate(&strategy)?;
        Ok(strategy)
    }

    pub fn single(contract: OptionContract, action: LegAction, quantity: u32) -> Result<Strategy, StrategyError> {
        Self::new(StrategyType::SingleLeg)
            .leg(contract, action, quantity)
            .build()
    }

    /// Call and put at the same strike, same side.
    pub fn straddle(
        call: OptionContract,
        put: OptionContract,
        action: LegAction,
        quantity: u32,
    ) -> Result<Strategy, StrategyError> {
        Self::new(StrategyType::Straddle)
            .leg(call, action, quantity)
            .leg(put, action, quantity)
            .build()
    }

    /// Put and call at different strikes, same side.
    pub fn strangle(
        put: OptionContract,
        call: OptionContract,
        action: LegAction,
        quantity: u32,
    ) -> Result<Strategy, StrategyError> {
        Self::new(StrategyType::Strangle)
            .leg(put, action, quantity)
            .leg(call, action, quantity)
            .build()
    }

    /// Short iron condor: short the inner strikes, long the wings.
    pub fn iron_condor(
        long_put: OptionContract,
        short_put: OptionContract,
        short_call: OptionContract,
        long_call: OptionContract,
        quantity: u32,
    ) -> Result<Strategy, StrategyError> {
        Self::new(StrategyType::IronCondor)
            .buy(long_put, quantity)
            .sell(short_put, quantity)
            .sell(short_call, quantity)
            .buy(long_call, quantity)
            .build()
    }

    /// Long butterfly: long the wings, short twice the body.
    pub fn butterfly(
        lower: OptionContract,
        body: OptionContract,
        upper: OptionContract,
        quantity: u32,
    ) -> Result<Strategy, StrategyError> {
        Self::new(StrategyType::Butterfly)
            .buy(lower, quantity)
            .sell(body, quantity.saturating_mul(2))
            .buy(upper, quantity)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::OptionType;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn contract(option_type: OptionType, strike: Decimal, price: Decimal) -> OptionContract {
        let exp = NaiveDate::from_ymd_opt(2024, 2, 16).unwrap();
        OptionContract::new(format!("SPY{}{}", option_type.as_str(), strike), "SPY", option_type, strike, exp)
            .unwrap()
            .with_price(price)
    }

    #[test]
    fn test_iron_condor_builder() {
        let condor = StrategyBuilder::iron_condor(
            contract(OptionType::Put, dec!(455), dec!(1.10)),
            contract(OptionType::Put, dec!(465), dec!(2.30)),
            contract(OptionType::Call, dec!(485), dec!(2.10)),
            contract(OptionType::Call, dec!(495), dec!(0.90)),
            2,
        )
        .unwrap();

        assert_eq!(condor.strategy_type, StrategyType::IronCondor);
        assert_eq!(condor.num_legs(), 4);
        assert_eq!(condor.name, "iron condor");
        // (1.10 - 2.30 - 2.10 + 0.90) * 2
        assert_eq!(condor.net_premium(), dec!(-4.80));
        assert_eq!(condor.id, "SPYP455/SPYP465/SPYC485/SPYC495");
    }

    #[test]
    fn test_butterfly_builder_doubles_body() {
        let fly = StrategyBuilder::butterfly(
            contract(OptionType::Call, dec!(460), dec!(14)),
            contract(OptionType::Call, dec!(470), dec!(8)),
            contract(OptionType::Call, dec!(480), dec!(4)),
            1,
        )
        .unwrap();
        assert_eq!(fly.legs[1].quantity(), 2);
        assert_eq!(fly.legs[1].action, LegAction::Sell);
        assert_eq!(fly.net_premium(), dec!(2));
    }

    #[test]
    fn test_builder_rejects_wrong_shape() {
        let result = StrategyBuilder::straddle(
            contract(OptionType::Call, dec!(470), dec!(5)),
            contract(OptionType::Put, dec!(460), dec!(3)),
            LegAction::Buy,
            1,
        );
        assert!(matches!(result, Err(StrategyError::InvalidShape { .. })));
    }

    #[test]
    fn test_custom_builder() {
        let strategy = StrategyBuilder::new(StrategyType::SingleLeg)
            .id("covered-put")
            .name("Short put")
            .description("cash secured")
            .sell(contract(OptionType::Put, dec!(450), dec!(3.20)), 5)
            .build()
            .unwrap();
        assert_eq!(strategy.id, "covered-put");
        assert_eq!(strategy.description, "cash secured");
        assert!(strategy.is_credit());
    }

    #[test]
    fn test_zero_quantity_leg_fails_build() {
        let result = StrategyBuilder::single(contract(OptionType::Call, dec!(470), dec!(5)), LegAction::Buy, 0);
        assert!(matches!(result, Err(StrategyError::InvalidQuantity { .. })));
    }
}
