use std::fmt;
use std::str::FromStr;

use borsh::{BorshDeserialize, BorshSerialize};
use thiserror::Error;

const FRACTIONAL_DIGITS: u32 = 18;
const SCALE: u128 = 10u128.pow(FRACTIONAL_DIGITS);

/// A non-negative fixed-point number with 18 fractional digits.
///
/// Serialized as a decimal string (`"0.5"`) in JSON and as the raw scaled
/// integer in borsh.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, BorshSerialize, BorshDeserialize,
)]
pub struct Decimal(u128);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecimalParseError {
    #[error("empty decimal")]
    Empty,
    #[error("invalid decimal {0:?}")]
    Invalid(String),
    #[error("decimal {0:?} has more than 18 fractional digits")]
    TooPrecise(String),
    #[error("decimal {0:?} is out of range")]
    Overflow(String),
}

impl Decimal {
    pub const ZERO: Decimal = Decimal(0);
    pub const ONE: Decimal = Decimal(SCALE);

    /// `numerator / denominator`, rounded down. A zero denominator yields zero.
    pub const fn from_ratio(numerator: u64, denominator: u64) -> Self {
        if denominator == 0 {
            return Self::ZERO;
        }
        Self(numerator as u128 * SCALE / denominator as u128)
    }

    pub const fn percent(percent: u64) -> Self {
        Self::from_ratio(percent, 100)
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Multiplies an integer amount by this decimal, rounding down.
    pub fn mul_floor(&self, amount: u64) -> u64 {
        let product = (amount as u128).saturating_mul(self.0) / SCALE;
        u64::try_from(product).unwrap_or(u64::MAX)
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let integer = self.0 / SCALE;
        let fraction = self.0 % SCALE;
        if fraction == 0 {
            return write!(f, "{integer}");
        }
        let digits = format!("{:018}", fraction);
        write!(f, "{integer}.{}", digits.trim_end_matches('0'))
    }
}

impl FromStr for Decimal {
    type Err = DecimalParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(DecimalParseError::Empty);
        }
        let (integer, fraction) = s.split_once('.').unwrap_or((s, ""));
        let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());
        if integer.is_empty() || !all_digits(integer) || !all_digits(fraction) {
            return Err(DecimalParseError::Invalid(s.to_owned()));
        }
        if fraction.len() > FRACTIONAL_DIGITS as usize {
            return Err(DecimalParseError::TooPrecise(s.to_owned()));
        }

        let overflow = || DecimalParseError::Overflow(s.to_owned());
        let integer: u128 = integer.parse().map_err(|_| overflow())?;
        let fraction_value: u128 = if fraction.is_empty() {
            0
        } else {
            let padding = FRACTIONAL_DIGITS - fraction.len() as u32;
            fraction.parse::<u128>().map_err(|_| overflow())? * 10u128.pow(padding)
        };

        integer
            .checked_mul(SCALE)
            .and_then(|scaled| scaled.checked_add(fraction_value))
            .map(Decimal)
            .ok_or_else(overflow)
    }
}

impl serde::Serialize for Decimal {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Decimal {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = <String as serde::Deserialize>::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "native")]
impl schemars::JsonSchema for Decimal {
    fn schema_name() -> String {
        "Decimal".to_owned()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <String as schemars::JsonSchema>::json_schema(gen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_displays() {
        for (text, expected) in [
            ("0.5", "0.5"),
            ("0.01", "0.01"),
            ("1", "1"),
            ("1.000", "1"),
            ("12.340", "12.34"),
            ("0.000000000000000001", "0.000000000000000001"),
        ] {
            assert_eq!(Decimal::from_str(text).unwrap().to_string(), expected);
        }
    }

    #[test]
    fn rejects_malformed_input() {
        assert_eq!(Decimal::from_str(""), Err(DecimalParseError::Empty));
        assert!(matches!(
            Decimal::from_str("-1"),
            Err(DecimalParseError::Invalid(_))
        ));
        assert!(matches!(
            Decimal::from_str(".5"),
            Err(DecimalParseError::Invalid(_))
        ));
        assert!(matches!(
            Decimal::from_str("0.0000000000000000001"),
            Err(DecimalParseError::TooPrecise(_))
        ));
    }

    #[test]
    fn mul_floor_rounds_down() {
        assert_eq!(Decimal::percent(1).mul_floor(1_050), 10);
        assert_eq!(Decimal::from_ratio(1, 2).mul_floor(7), 3);
        assert_eq!(Decimal::ONE.mul_floor(u64::MAX), u64::MAX);
        assert_eq!(Decimal::ZERO.mul_floor(100), 0);
    }

    #[test]
    fn serde_uses_strings() {
        let json = serde_json::to_string(&Decimal::percent(50)).unwrap();
        assert_eq!(json, "\"0.5\"");
        let back: Decimal = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Decimal::percent(50));
    }
}
