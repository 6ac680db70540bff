//! Counter values carried as decimal text.
//!
//! Values are kept as normalised digit strings so there is no upper bound:
//! incrementing `18446744073709551615` yields `18446744073709551616`.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[cfg(test)]
#[path = "counter_tests.rs"]
mod tests;

/// Text that does not encode a non-negative base-10 integer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("not a non-negative decimal integer: {input:?}")]
pub struct InvalidCounterValue {
    pub input: String,
}

/// Non-negative integer of arbitrary size
///
/// Parsing trims surrounding ASCII whitespace and drops leading zeros, so
/// `" 007\n"` parses to `7`. Signs, separators and fractions are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CounterValue(String);

impl CounterValue {
    pub fn zero() -> Self {
        Self("0".to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The value as `u64`, if it fits
    pub fn to_u64(&self) -> Option<u64> {
        self.0.parse().ok()
    }

    /// Return `self + 1`
    pub fn increment(&self) -> Self {
        let mut digits = self.0.clone().into_bytes();
        for digit in digits.iter_mut().rev() {
            if *digit == b'9' {
                *digit = b'0';
            } else {
                *digit += 1;
                return Self(String::from_utf8_lossy(&digits).into_owned());
            }
        }

        // Every digit carried over
        let mut result = String::with_capacity(digits.len() + 1);
        result.push('1');
        result.push_str(&String::from_utf8_lossy(&digits));
        Self(result)
    }
}

impl FromStr for CounterValue {
    type Err = InvalidCounterValue;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim_matches(|c: char| c.is_ascii_whitespace());
        if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
            return Err(InvalidCounterValue {
                input: s.to_string(),
            });
        }

        let significant = trimmed.trim_start_matches('0');
        if significant.is_empty() {
            Ok(Self::zero())
        } else {
            Ok(Self(significant.to_string()))
        }
    }
}

impl TryFrom<String> for CounterValue {
    type Error = InvalidCounterValue;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CounterValue> for String {
    fn from(value: CounterValue) -> Self {
        value.0
    }
}

impl From<u64> for CounterValue {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for CounterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Ord for CounterValue {
    fn cmp(&self, other: &Self) -> Ordering {
        // Normalised, so a longer digit string is a larger number
        self.0
            .len()
            .cmp(&other.0.len())
            .then_with(|| self.0.cmp(&other.0))
    }
}

impl PartialOrd for CounterValue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
