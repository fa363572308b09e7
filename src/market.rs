//! Market configuration and state.
//!
//! A market is one interchangeable asset tracked by the ledger: its token
//! identity, accrual indices, running Par totals, and risk premiums. Market
//! ids are dense, monotonically assigned, and never reused; markets are never
//! deleted, only flagged (closing, recycled).

use crate::index::InterestIndex;
use crate::types::{MarketId, Timestamp, Wei};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Static market configuration supplied at listing time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Token symbol (e.g. "WETH"). unique across the registry
    pub token: String,
    /// Extra collateral requirement for this market, as a fraction (0 = none)
    pub margin_premium: Decimal,
    /// Extra liquidation discount for this market, as a fraction (0 = none)
    pub spread_premium: Decimal,
    /// Supply cap in Wei. zero = unlimited
    pub max_wei: Decimal,
    /// Borrow-only unwind mode: no new borrows may be opened
    pub is_closing: bool,
    /// Single-use market that can be recycled after an absolute expiration
    pub is_recyclable: bool,
    /// Absolute expiration for recyclable markets
    pub expiration: Option<Timestamp>,
    /// Isolation mode: the token only enters/exits via trusted converters
    pub is_isolation_mode: bool,
}

impl MarketConfig {
    pub fn standard(token: &str) -> Self {
        Self {
            token: token.to_string(),
            margin_premium: Decimal::ZERO,
            spread_premium: Decimal::ZERO,
            max_wei: Decimal::ZERO,
            is_closing: false,
            is_recyclable: false,
            expiration: None,
            is_isolation_mode: false,
        }
    }

    pub fn isolation_mode(token: &str) -> Self {
        Self {
            is_isolation_mode: true,
            ..Self::standard(token)
        }
    }

    pub fn recyclable(token: &str, expiration: Timestamp) -> Self {
        Self {
            is_recyclable: true,
            expiration: Some(expiration),
            ..Self::standard(token)
        }
    }
}

/// Live state for one market. Totals are Par magnitudes and never negative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketState {
    pub id: MarketId,
    pub config: MarketConfig,
    pub index: InterestIndex,
    /// Total Par supplied across all accounts (magnitude)
    pub total_supply_par: Decimal,
    /// Total Par borrowed across all accounts (magnitude)
    pub total_borrow_par: Decimal,
    /// One-way flag: set after a recyclable market expires and is retired
    pub recycled: bool,
}

impl MarketState {
    pub fn new(id: MarketId, config: MarketConfig, timestamp: Timestamp) -> Self {
        Self {
            id,
            config,
            index: InterestIndex::new(timestamp),
            total_supply_par: Decimal::ZERO,
            total_borrow_par: Decimal::ZERO,
            recycled: false,
        }
    }

    /// Current total supplied value. Raw multiplication; per-account rounding
    /// bias lives in balance.rs, totals stay exact.
    pub fn total_supply_wei(&self) -> Wei {
        Wei::new(self.total_supply_par * self.index.supply)
    }

    /// Current total borrowed value (positive magnitude).
    pub fn total_borrow_wei(&self) -> Wei {
        Wei::new(self.total_borrow_par * self.index.borrow)
    }

    /// Excess supply held by the market: what suppliers are owed less what
    /// borrowers owe. The insurance pool vaporization draws from.
    pub fn excess_wei(&self) -> Wei {
        let excess = self.total_supply_wei().value() - self.total_borrow_wei().value();
        Wei::new(excess.max(Decimal::ZERO))
    }

    /// Move the running totals for one account's Par change. Caller passes the
    /// old and new signed Par; both sides of a flip are handled.
    pub fn apply_par_transition(
        &mut self,
        old_par: Decimal,
        new_par: Decimal,
    ) -> Result<(), MarketError> {
        if old_par > Decimal::ZERO {
            self.total_supply_par -= old_par;
        } else if old_par < Decimal::ZERO {
            self.total_borrow_par -= -old_par;
        }
        if new_par > Decimal::ZERO {
            self.total_supply_par += new_par;
        } else if new_par < Decimal::ZERO {
            self.total_borrow_par += -new_par;
        }
        if self.total_supply_par < Decimal::ZERO || self.total_borrow_par < Decimal::ZERO {
            return Err(MarketError::NegativeTotal {
                market: self.id,
                supply: self.total_supply_par,
                borrow: self.total_borrow_par,
            });
        }
        Ok(())
    }

    /// Flag checks for a proposed Par transition. Closing markets refuse debt
    /// growth; recycled markets only allow balances to move toward zero.
    pub fn validate_par_transition(
        &self,
        old_par: Decimal,
        new_par: Decimal,
    ) -> Result<(), MarketError> {
        if new_par == old_par {
            return Ok(());
        }
        let borrow_grew = new_par < old_par.min(Decimal::ZERO);
        if self.config.is_closing && borrow_grew {
            return Err(MarketError::MarketClosing(self.id));
        }
        if self.recycled {
            let shrinks = new_par.abs() < old_par.abs();
            let same_side = (new_par > Decimal::ZERO) == (old_par > Decimal::ZERO);
            if !(new_par.is_zero() || (shrinks && same_side)) {
                return Err(MarketError::MarketRecycled(self.id));
            }
        }
        Ok(())
    }

    /// Supply cap check, evaluated after a deposit's totals update.
    pub fn validate_supply_cap(&self) -> Result<(), MarketError> {
        if self.config.max_wei.is_zero() {
            return Ok(());
        }
        let total = self.total_supply_wei().value();
        if total > self.config.max_wei {
            return Err(MarketError::ExceedsSupplyCap {
                market: self.id,
                total,
                cap: self.config.max_wei,
            });
        }
        Ok(())
    }

    /// One-way recycle transition. Only valid for recyclable markets whose
    /// expiration has passed.
    pub fn set_recycled(&mut self, now: Timestamp) -> Result<(), MarketError> {
        if !self.config.is_recyclable {
            return Err(MarketError::NotRecyclable(self.id));
        }
        if self.recycled {
            return Err(MarketError::AlreadyRecycled(self.id));
        }
        let expiration = self
            .config
            .expiration
            .ok_or(MarketError::NotRecyclable(self.id))?;
        if now < expiration {
            return Err(MarketError::RecycleBeforeExpiration {
                market: self.id,
                expiration,
                now,
            });
        }
        self.recycled = true;
        Ok(())
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MarketError {
    #[error("Market {0} not found")]
    MarketNotFound(MarketId),

    #[error("A market for token {0} already exists")]
    DuplicateToken(String),

    #[error("Market {0} is closing; borrows cannot grow")]
    MarketClosing(MarketId),

    #[error("Market {0} is recycled; only withdrawals toward zero allowed")]
    MarketRecycled(MarketId),

    #[error("Market {0} is not recyclable")]
    NotRecyclable(MarketId),

    #[error("Market {0} already recycled")]
    AlreadyRecycled(MarketId),

    #[error("Market {market} cannot recycle before expiration {expiration:?} (now {now:?})")]
    RecycleBeforeExpiration {
        market: MarketId,
        expiration: Timestamp,
        now: Timestamp,
    },

    #[error("Market {market} supply {total} exceeds cap {cap}")]
    ExceedsSupplyCap {
        market: MarketId,
        total: Decimal,
        cap: Decimal,
    },

    #[error("Market {market} totals went negative (supply {supply}, borrow {borrow})")]
    NegativeTotal {
        market: MarketId,
        supply: Decimal,
        borrow: Decimal,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn market(config: MarketConfig) -> MarketState {
        MarketState::new(MarketId(0), config, Timestamp::from_millis(0))
    }

    #[test]
    fn par_transition_updates_totals() {
        let mut m = market(MarketConfig::standard("WETH"));

        m.apply_par_transition(dec!(0), dec!(100)).unwrap();
        assert_eq!(m.total_supply_par, dec!(100));

        // flip from +100 to -50
        m.apply_par_transition(dec!(100), dec!(-50)).unwrap();
        assert_eq!(m.total_supply_par, dec!(0));
        assert_eq!(m.total_borrow_par, dec!(50));

        m.apply_par_transition(dec!(-50), dec!(0)).unwrap();
        assert_eq!(m.total_borrow_par, dec!(0));
    }

    #[test]
    fn totals_never_negative() {
        let mut m = market(MarketConfig::standard("WETH"));
        let result = m.apply_par_transition(dec!(100), dec!(0));
        assert!(matches!(result, Err(MarketError::NegativeTotal { .. })));
    }

    #[test]
    fn closing_market_blocks_new_borrows() {
        let mut config = MarketConfig::standard("WETH");
        config.is_closing = true;
        let m = market(config);

        // opening debt is blocked
        assert!(matches!(
            m.validate_par_transition(dec!(0), dec!(-10)),
            Err(MarketError::MarketClosing(_))
        ));
        // growing existing debt is blocked
        assert!(matches!(
            m.validate_par_transition(dec!(-10), dec!(-20)),
            Err(MarketError::MarketClosing(_))
        ));
        // repaying is fine
        assert!(m.validate_par_transition(dec!(-10), dec!(-5)).is_ok());
        // supplying is fine
        assert!(m.validate_par_transition(dec!(0), dec!(10)).is_ok());
    }

    #[test]
    fn recycled_market_allows_only_unwind() {
        let expiration = Timestamp::from_millis(1_000);
        let mut m = market(MarketConfig::recyclable("STK", expiration));
        m.set_recycled(Timestamp::from_millis(2_000)).unwrap();

        assert!(matches!(
            m.validate_par_transition(dec!(0), dec!(10)),
            Err(MarketError::MarketRecycled(_))
        ));
        assert!(m.validate_par_transition(dec!(10), dec!(0)).is_ok());
        assert!(m.validate_par_transition(dec!(10), dec!(4)).is_ok());
        assert!(m.validate_par_transition(dec!(-10), dec!(-4)).is_ok());

        // crossing zero is not an unwind
        assert!(matches!(
            m.validate_par_transition(dec!(10), dec!(-4)),
            Err(MarketError::MarketRecycled(_))
        ));
        assert!(matches!(
            m.validate_par_transition(dec!(-10), dec!(4)),
            Err(MarketError::MarketRecycled(_))
        ));
    }

    #[test]
    fn recycle_is_one_way_and_gated_on_expiration() {
        let expiration = Timestamp::from_millis(1_000);
        let mut m = market(MarketConfig::recyclable("STK", expiration));

        assert!(matches!(
            m.set_recycled(Timestamp::from_millis(500)),
            Err(MarketError::RecycleBeforeExpiration { .. })
        ));

        m.set_recycled(Timestamp::from_millis(1_000)).unwrap();
        assert!(matches!(
            m.set_recycled(Timestamp::from_millis(2_000)),
            Err(MarketError::AlreadyRecycled(_))
        ));
    }

    #[test]
    fn non_recyclable_market_cannot_recycle() {
        let mut m = market(MarketConfig::standard("WETH"));
        assert!(matches!(
            m.set_recycled(Timestamp::from_millis(0)),
            Err(MarketError::NotRecyclable(_))
        ));
    }

    #[test]
    fn supply_cap_enforced() {
        let mut config = MarketConfig::standard("USDC");
        config.max_wei = dec!(1000);
        let mut m = market(config);

        m.apply_par_transition(dec!(0), dec!(1000)).unwrap();
        assert!(m.validate_supply_cap().is_ok());

        m.apply_par_transition(dec!(1000), dec!(1001)).unwrap();
        assert!(matches!(
            m.validate_supply_cap(),
            Err(MarketError::ExceedsSupplyCap { .. })
        ));
    }

    #[test]
    fn excess_wei_floors_at_zero() {
        let mut m = market(MarketConfig::standard("WETH"));
        m.apply_par_transition(dec!(0), dec!(-100)).unwrap();
        assert_eq!(m.excess_wei(), Wei::zero());

        m.apply_par_transition(dec!(0), dec!(150)).unwrap();
        assert_eq!(m.excess_wei().value(), dec!(50));
    }
}
