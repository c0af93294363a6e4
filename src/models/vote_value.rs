use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Intermediate terms of the vote value formula, kept unrounded for auditing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormulaTerms {
    pub steem_per_vests: Decimal,
    pub sp: Decimal,
    pub r: Decimal,
    pub p: Decimal,
    pub rb_prc: Decimal,
    pub median: Decimal,
}

/// Estimated value of a single vote.
///
/// A failed calculation still produces a result: both values are zero and
/// `error` says why, so callers valuing many votes never have to abort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoteValueResult {
    pub steem_value: Decimal, // 4 dp
    pub sbd_value: Decimal,   // 4 dp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formula: Option<FormulaTerms>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl VoteValueResult {
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            steem_value: Decimal::ZERO,
            sbd_value: Decimal::ZERO,
            formula: None,
            error: Some(error.into()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Query parameters for GET /api/vote-value
#[derive(Debug, Clone, Deserialize)]
pub struct VoteValueQuery {
    pub curator: String,
    pub weight: Option<i32>,          // Default: 10000 (100%)
    pub effective_vests: Option<Decimal>,
    pub voting_power: Option<u16>,    // Default: configured voting power
}
