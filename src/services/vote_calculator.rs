//! Vote value estimation
//!
//! `steem_value = r * p * 100 * rb_prc` where
//! - `r` is the voter's stake in VESTS (`sp / steem_per_vests`)
//! - `p = (voting_power * weight / 10000 + 49) / 50`
//! - `rb_prc = reward_balance / recent_claims`
//!
//! and `sbd_value = steem_value * median_price`.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::vote_value::{FormulaTerms, VoteValueResult};
use crate::services::steem_api::{ChainApi, ChainError, MedianPrice, RewardFund, VestingTotals};

pub const DEFAULT_VOTING_POWER: u16 = 9200;
pub const FULL_WEIGHT: i32 = 10000;
pub const REWARD_FUND_NAME: &str = "post";

const OUTPUT_DECIMALS: u32 = 4;

/// Error types for vote value calculation
#[derive(Debug, Clone, PartialEq)]
pub enum CalculationError {
    Input(ChainError),
    DivisionByZero(&'static str),
    Overflow(&'static str),
}

impl std::fmt::Display for CalculationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CalculationError::Input(e) => write!(f, "Input unavailable: {}", e),
            CalculationError::DivisionByZero(term) => write!(f, "Division by zero computing {}", term),
            CalculationError::Overflow(term) => write!(f, "Arithmetic overflow computing {}", term),
        }
    }
}

impl std::error::Error for CalculationError {}

impl From<ChainError> for CalculationError {
    fn from(err: ChainError) -> Self {
        CalculationError::Input(err)
    }
}

/// Chain state the formula needs
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaInputs {
    pub totals: VestingTotals,
    pub stake_vests: Decimal,
    pub fund: RewardFund,
    pub median: MedianPrice,
}

fn div(numerator: Decimal, denominator: Decimal, term: &'static str) -> Result<Decimal, CalculationError> {
    if denominator.is_zero() {
        return Err(CalculationError::DivisionByZero(term));
    }
    numerator
        .checked_div(denominator)
        .ok_or(CalculationError::Overflow(term))
}

fn mul(a: Decimal, b: Decimal, term: &'static str) -> Result<Decimal, CalculationError> {
    a.checked_mul(b).ok_or(CalculationError::Overflow(term))
}

/// Pure formula step, no I/O
pub fn apply_formula(
    inputs: &FormulaInputs,
    weight: i32,
    voting_power: u16,
) -> Result<VoteValueResult, CalculationError> {
    let steem_per_vests = div(
        inputs.totals.total_vesting_fund_steem,
        inputs.totals.total_vesting_shares,
        "steem_per_vests",
    )?;
    let sp = mul(inputs.stake_vests, steem_per_vests, "sp")?;
    let r = div(sp, steem_per_vests, "r")?;

    let power_weight = div(
        Decimal::from(voting_power) * Decimal::from(weight),
        Decimal::from(FULL_WEIGHT),
        "p",
    )?;
    let p = div(power_weight + Decimal::from(49), Decimal::from(50), "p")?;

    let rb_prc = div(inputs.fund.reward_balance, inputs.fund.recent_claims, "rb_prc")?;
    let median = div(inputs.median.base, inputs.median.quote, "median")?;

    let steem_value = mul(
        mul(mul(r, p, "steem_value")?, Decimal::ONE_HUNDRED, "steem_value")?,
        rb_prc,
        "steem_value",
    )?;
    let sbd_value = mul(steem_value, median, "sbd_value")?;

    Ok(VoteValueResult {
        steem_value: steem_value.round_dp(OUTPUT_DECIMALS),
        sbd_value: sbd_value.round_dp(OUTPUT_DECIMALS),
        formula: Some(FormulaTerms {
            steem_per_vests,
            sp,
            r,
            p,
            rb_prc,
            median,
        }),
        error: None,
    })
}

#[derive(Clone)]
pub struct VoteCalculator {
    chain: Arc<dyn ChainApi>,
    default_voting_power: u16,
}

impl VoteCalculator {
    pub fn new(chain: Arc<dyn ChainApi>, default_voting_power: u16) -> Self {
        Self {
            chain,
            default_voting_power,
        }
    }

    pub fn default_voting_power(&self) -> u16 {
        self.default_voting_power
    }

    /// Fetch the formula inputs concurrently. A supplied `effective_vests`
    /// skips the account lookup.
    pub async fn fetch_inputs(
        &self,
        curator: &str,
        effective_vests: Option<Decimal>,
    ) -> Result<FormulaInputs, CalculationError> {
        let stake = async {
            match effective_vests {
                Some(vests) => Ok(vests),
                None => self
                    .chain
                    .account_stake(curator)
                    .await
                    .map(|stake| stake.effective_vests()),
            }
        };

        let (totals, stake_vests, fund, median) = tokio::try_join!(
            self.chain.vesting_totals(),
            stake,
            self.chain.reward_fund(REWARD_FUND_NAME),
            self.chain.median_price(),
        )?;

        Ok(FormulaInputs {
            totals,
            stake_vests,
            fund,
            median,
        })
    }

    /// Estimate the value of one vote. Never fails: on any error the result
    /// carries zero values and the error text.
    pub async fn calculate_vote_value(
        &self,
        curator: &str,
        weight: i32,
        effective_vests: Option<Decimal>,
        voting_power: Option<u16>,
    ) -> VoteValueResult {
        let voting_power = voting_power.unwrap_or(self.default_voting_power);

        let outcome = match self.fetch_inputs(curator, effective_vests).await {
            Ok(inputs) => apply_formula(&inputs, weight, voting_power),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(result) => {
                info!(
                    curator = %curator,
                    weight = weight,
                    voting_power = voting_power,
                    steem_value = %result.steem_value,
                    sbd_value = %result.sbd_value,
                    "Vote value calculated"
                );
                if let Some(terms) = &result.formula {
                    debug!(
                        steem_per_vests = %terms.steem_per_vests,
                        sp = %terms.sp,
                        r = %terms.r,
                        p = %terms.p,
                        rb_prc = %terms.rb_prc,
                        median = %terms.median,
                        "Vote value terms"
                    );
                }
                result
            }
            Err(e) => {
                warn!(curator = %curator, weight = weight, error = %e, "Vote value calculation failed");
                VoteValueResult::failed(e.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::StubChain;
    use rust_decimal_macros::dec;

    fn inputs() -> FormulaInputs {
        FormulaInputs {
            totals: VestingTotals {
                total_vesting_fund_steem: dec!(500),
                total_vesting_shares: dec!(1000),
            },
            stake_vests: dec!(1000),
            fund: RewardFund {
                name: "post".to_string(),
                recent_claims: dec!(1000),
                reward_balance: dec!(20),
            },
            median: MedianPrice {
                base: dec!(1),
                base_symbol: Some("SBD".to_string()),
                quote: dec!(1),
                quote_symbol: Some("STEEM".to_string()),
            },
        }
    }

    #[test]
    fn test_formula_regression() {
        let result = apply_formula(&inputs(), 10000, 9200).unwrap();
        let terms = result.formula.clone().unwrap();

        assert_eq!(terms.steem_per_vests, dec!(0.5));
        assert_eq!(terms.sp, dec!(500));
        assert_eq!(terms.r, dec!(1000));
        assert_eq!(terms.p, dec!(184.98));
        assert_eq!(terms.rb_prc, dec!(0.02));
        assert_eq!(result.steem_value, dec!(369960));
        assert_eq!(result.sbd_value, dec!(369960));
        assert!(result.is_ok());
    }

    #[test]
    fn test_formula_scales_with_weight_and_price() {
        let mut inputs = inputs();
        inputs.median.base = dec!(0.25);

        let result = apply_formula(&inputs, 5000, 10000).unwrap();
        // p = (10000 * 5000 / 10000 + 49) / 50 = 100.98
        assert_eq!(result.formula.unwrap().p, dec!(100.98));
        assert_eq!(result.steem_value, dec!(201960));
        assert_eq!(result.sbd_value, dec!(50490));
    }

    #[test]
    fn test_outputs_rounded_to_four_places() {
        let mut inputs = inputs();
        inputs.fund.recent_claims = dec!(3);
        inputs.fund.reward_balance = dec!(0.00001);
        inputs.stake_vests = dec!(1);

        let result = apply_formula(&inputs, 10000, 9200).unwrap();
        assert!(result.steem_value.scale() <= 4);
        assert_eq!(result.steem_value, dec!(0.0617));
    }

    #[test]
    fn test_zero_denominators_are_errors() {
        let mut no_claims = inputs();
        no_claims.fund.recent_claims = Decimal::ZERO;
        assert_eq!(
            apply_formula(&no_claims, 10000, 9200).unwrap_err(),
            CalculationError::DivisionByZero("rb_prc")
        );

        let mut no_shares = inputs();
        no_shares.totals.total_vesting_shares = Decimal::ZERO;
        assert_eq!(
            apply_formula(&no_shares, 10000, 9200).unwrap_err(),
            CalculationError::DivisionByZero("steem_per_vests")
        );
    }

    fn network_chain() -> StubChain {
        StubChain::new()
            .with_network(dec!(500), dec!(1000), dec!(20), dec!(1000), dec!(1))
            .with_stake("alice", dec!(1200), dec!(300), dec!(100))
    }

    #[tokio::test]
    async fn test_calculate_uses_account_stake() {
        let calculator = VoteCalculator::new(Arc::new(network_chain()), DEFAULT_VOTING_POWER);

        // 1200 - 300 + 100 = 1000 VESTS, same as the regression case
        let result = calculator.calculate_vote_value("alice", 10000, None, None).await;
        assert!(result.is_ok());
        assert_eq!(result.steem_value, dec!(369960));
    }

    #[tokio::test]
    async fn test_supplied_vests_skip_account_lookup() {
        let calculator = VoteCalculator::new(Arc::new(network_chain()), DEFAULT_VOTING_POWER);

        let result = calculator
            .calculate_vote_value("nobody", 10000, Some(dec!(2000)), Some(9200))
            .await;
        assert_eq!(result.steem_value, dec!(739920));
    }

    #[tokio::test]
    async fn test_failure_yields_zeroed_result() {
        let calculator = VoteCalculator::new(Arc::new(network_chain()), DEFAULT_VOTING_POWER);
        let result = calculator.calculate_vote_value("ghost", 10000, None, None).await;

        assert!(!result.is_ok());
        assert_eq!(result.steem_value, Decimal::ZERO);
        assert_eq!(result.sbd_value, Decimal::ZERO);
        assert!(result.formula.is_none());
        assert!(result.error.unwrap().contains("ghost"));

        let unreachable = VoteCalculator::new(Arc::new(network_chain().unreachable()), DEFAULT_VOTING_POWER);
        let result = unreachable.calculate_vote_value("alice", 10000, None, None).await;
        assert_eq!(result.steem_value, Decimal::ZERO);
        assert!(result.error.is_some());
    }
}
