//! Asset amounts as reported by Steem nodes.
//!
//! Nodes report amounts in two shapes depending on the API flavour:
//! legacy condenser strings (`"123.456 STEEM"`) and structured objects
//! (`{"amount": "123456", "precision": 3, "nai": "@@000000021"}` or the
//! already-scaled `{"amount": 123.456}`). Both are parsed into one `Decimal`.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::str::FromStr;

/// Amount payload in either wire shape
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Amount {
    StringAmount(String),
    StructuredAmount(StructuredAmount),
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StructuredAmount {
    pub amount: Value, // JSON number or numeric string
    #[serde(default)]
    pub precision: Option<u32>,
    #[serde(default)]
    pub nai: Option<String>,
}

/// Raised when an amount has an unrecognized shape or a non-numeric value
#[derive(Debug, Clone, PartialEq)]
pub struct AmountError(pub String);

impl std::fmt::Display for AmountError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid amount: {}", self.0)
    }
}

impl std::error::Error for AmountError {}

impl Amount {
    /// Decode an amount from a raw JSON value. Anything other than a string
    /// or an object carrying an `amount` field is rejected.
    pub fn from_value(value: &Value) -> Result<Self, AmountError> {
        serde_json::from_value(value.clone())
            .map_err(|_| AmountError(format!("unrecognized amount shape: {}", value)))
    }

    /// Canonical numeric value of this amount
    pub fn to_decimal(&self) -> Result<Decimal, AmountError> {
        match self {
            Amount::StringAmount(raw) => parse_amount_string(raw).map(|(value, _)| value),
            Amount::StructuredAmount(structured) => structured.to_decimal(),
        }
    }

    /// Asset symbol when the payload carries one ("STEEM", "SBD", "VESTS")
    pub fn symbol(&self) -> Option<String> {
        match self {
            Amount::StringAmount(raw) => parse_amount_string(raw).ok().and_then(|(_, symbol)| symbol),
            Amount::StructuredAmount(structured) => structured.nai.as_deref().and_then(nai_symbol),
        }
    }
}

impl StructuredAmount {
    fn to_decimal(&self) -> Result<Decimal, AmountError> {
        let text = match &self.amount {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => n.to_string(),
            other => return Err(AmountError(format!("amount field is not numeric: {}", other))),
        };

        // Integer satoshi-style amounts are scaled by their precision
        if let Some(precision) = self.precision {
            if !text.contains('.') && !text.contains('e') && !text.contains('E') {
                let units = text
                    .parse::<i128>()
                    .map_err(|e| AmountError(format!("'{}': {}", text, e)))?;
                return Decimal::try_from_i128_with_scale(units, precision)
                    .map_err(|e| AmountError(format!("'{}' @ precision {}: {}", text, precision, e)));
            }
        }

        parse_decimal(&text)
    }
}

/// Parse `"<number> [SYMBOL]"` into its value and optional symbol
pub fn parse_amount_string(raw: &str) -> Result<(Decimal, Option<String>), AmountError> {
    let mut parts = raw.split_whitespace();
    let number = parts
        .next()
        .ok_or_else(|| AmountError("empty amount string".to_string()))?;
    let symbol = parts.next().map(|s| s.to_string());

    if parts.next().is_some() {
        return Err(AmountError(format!("unexpected trailing data in '{}'", raw)));
    }

    Ok((parse_decimal(number)?, symbol))
}

fn parse_decimal(text: &str) -> Result<Decimal, AmountError> {
    Decimal::from_str(text)
        .or_else(|_| Decimal::from_scientific(text))
        .map_err(|e| AmountError(format!("'{}': {}", text, e)))
}

fn nai_symbol(nai: &str) -> Option<String> {
    match nai {
        "@@000000021" => Some("STEEM".to_string()),
        "@@000000013" => Some("SBD".to_string()),
        "@@000000037" => Some("VESTS".to_string()),
        _ => None,
    }
}
