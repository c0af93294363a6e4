use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Steem account names: 3-16 chars of lowercase letters, digits, dots and dashes
    static ref USERNAME_REGEX: Regex = Regex::new(r"^[a-z0-9.-]{3,16}$").unwrap();
}

pub const MIN_DAYS_BACK: u32 = 1;
pub const MAX_DAYS_BACK: u32 = 365;
pub const DEFAULT_DAYS_BACK: u32 = 7;
pub const MAX_VOTE_WEIGHT: i32 = 10000;
pub const MAX_VOTING_POWER: u16 = 10000;

#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    Username(String),
    DaysBack(u32),
    VoteWeight(i32),
    VotingPower(u16),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Username(raw) => write!(f, "Invalid username format: '{}'", raw),
            ValidationError::DaysBack(days) => write!(
                f,
                "days_back must be between {} and {}, got {}",
                MIN_DAYS_BACK, MAX_DAYS_BACK, days
            ),
            ValidationError::VoteWeight(weight) => write!(
                f,
                "weight must be between -{} and {}, got {}",
                MAX_VOTE_WEIGHT, MAX_VOTE_WEIGHT, weight
            ),
            ValidationError::VotingPower(power) => write!(
                f,
                "voting_power must be between 0 and {}, got {}",
                MAX_VOTING_POWER, power
            ),
        }
    }
}

impl std::error::Error for ValidationError {}

pub fn is_valid_username(username: &str) -> bool {
    USERNAME_REGEX.is_match(username)
}

/// Trim, lowercase and strip a leading `@`, then validate
pub fn sanitize_username(raw: &str) -> Result<String, ValidationError> {
    let clean = raw.trim().to_lowercase();
    let clean = clean.trim_start_matches('@');

    if is_valid_username(clean) {
        Ok(clean.to_string())
    } else {
        Err(ValidationError::Username(raw.to_string()))
    }
}

/// Resolve an optional days_back, applying the default
pub fn validate_days_back(days: Option<u32>) -> Result<u32, ValidationError> {
    let days = days.unwrap_or(DEFAULT_DAYS_BACK);
    if (MIN_DAYS_BACK..=MAX_DAYS_BACK).contains(&days) {
        Ok(days)
    } else {
        Err(ValidationError::DaysBack(days))
    }
}

pub fn validate_vote_weight(weight: i32) -> Result<i32, ValidationError> {
    if (-MAX_VOTE_WEIGHT..=MAX_VOTE_WEIGHT).contains(&weight) {
        Ok(weight)
    } else {
        Err(ValidationError::VoteWeight(weight))
    }
}

pub fn validate_voting_power(power: u16) -> Result<u16, ValidationError> {
    if power <= MAX_VOTING_POWER {
        Ok(power)
    } else {
        Err(ValidationError::VotingPower(power))
    }
}
