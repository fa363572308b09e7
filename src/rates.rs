// 9.1 rates.rs: interest-rate-model boundary. utilization -> per-second borrow
// rate, consumed as a pure function. calibration is an external concern; the
// two models here cover tests and the common kinked-curve shape.

use crate::types::{MarketId, Rate, Wei};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

pub trait InterestRateModel {
    /// Per-second borrow rate given the market's current totals.
    fn interest_rate(&self, market: MarketId, borrow_wei: Wei, supply_wei: Wei) -> Rate;
}

/// Flat rate regardless of utilization. test workhorse.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FixedRateModel {
    pub per_second: Decimal,
}

impl FixedRateModel {
    pub fn new(per_second: Decimal) -> Self {
        Self { per_second }
    }

    pub fn zero() -> Self {
        Self::new(Decimal::ZERO)
    }
}

impl InterestRateModel for FixedRateModel {
    fn interest_rate(&self, _market: MarketId, _borrow_wei: Wei, _supply_wei: Wei) -> Rate {
        Rate::new(self.per_second).unwrap_or_else(Rate::zero)
    }
}

/// Two-slope curve: gentle below the kink utilization, steep above it.
/// Rates are annualized fractions; conversion to per-second happens here.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct KinkedRateModel {
    /// Utilization where the slope changes (e.g. 0.8)
    pub kink: Decimal,
    /// Annual rate at zero utilization
    pub base_apr: Decimal,
    /// Annual rate added between 0 and the kink
    pub slope_apr: Decimal,
    /// Annual rate added between the kink and full utilization
    pub jump_apr: Decimal,
}

const SECONDS_PER_YEAR: Decimal = dec!(31_536_000);

impl KinkedRateModel {
    pub fn new(kink: Decimal, base_apr: Decimal, slope_apr: Decimal, jump_apr: Decimal) -> Self {
        Self {
            kink,
            base_apr,
            slope_apr,
            jump_apr,
        }
    }

    fn utilization(borrow_wei: Wei, supply_wei: Wei) -> Decimal {
        if supply_wei.value() <= Decimal::ZERO {
            // borrows with no supply pin the curve to its maximum
            return if borrow_wei.value() > Decimal::ZERO {
                Decimal::ONE
            } else {
                Decimal::ZERO
            };
        }
        (borrow_wei.value() / supply_wei.value()).min(Decimal::ONE)
    }
}

impl Default for KinkedRateModel {
    fn default() -> Self {
        Self {
            kink: dec!(0.80),
            base_apr: dec!(0.00),
            slope_apr: dec!(0.04),  // 4% APR at the kink
            jump_apr: dec!(0.75),   // +75% APR from kink to full
        }
    }
}

impl InterestRateModel for KinkedRateModel {
    fn interest_rate(&self, _market: MarketId, borrow_wei: Wei, supply_wei: Wei) -> Rate {
        let util = Self::utilization(borrow_wei, supply_wei);
        let apr = if util <= self.kink {
            let progress = if self.kink.is_zero() {
                Decimal::ONE
            } else {
                util / self.kink
            };
            self.base_apr + self.slope_apr * progress
        } else {
            let overshoot = (util - self.kink) / (Decimal::ONE - self.kink);
            self.base_apr + self.slope_apr + self.jump_apr * overshoot
        };
        Rate::new(apr / SECONDS_PER_YEAR).unwrap_or_else(Rate::zero)
    }
}
