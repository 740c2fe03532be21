//! Fixed-point currency amounts
//!
//! Every amount is held as a signed count of base units (satoshis), so all
//! arithmetic is integer arithmetic. Main-unit strings use a fixed scale of
//! [`DECIMALS`] places. Subtraction may go negative; whether that is an error
//! is up to the caller.

use core::fmt::{self, Display, Formatter};
use core::iter::Sum;
use core::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use core::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::AmountError;

/// Number of decimal places of the main unit.
pub const DECIMALS: u32 = 8;

/// Base units in one main unit.
pub const BASE_PER_MAIN: i64 = 100_000_000;

/// Display name of the main unit.
pub const MAIN_NAME: &str = "BTC";

/// Display name of the base unit.
pub const BASE_NAME: &str = "SATS";

/// Unit an amount is expressed in when entering or leaving the wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(rename_all = "lowercase"))]
pub enum Denomination {
    /// Smallest indivisible unit.
    Base,
    /// Display unit, `10^8` base units.
    Main,
}

impl Denomination {
    pub fn name(&self) -> &'static str {
        match self {
            Denomination::Base => BASE_NAME,
            Denomination::Main => MAIN_NAME,
        }
    }
}

impl FromStr for Denomination {
    type Err = AmountError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "base" | "sat" | "sats" => Ok(Denomination::Base),
            "main" | "btc" => Ok(Denomination::Main),
            _ => Err(AmountError::UnknownDenomination(s.to_string())),
        }
    }
}

/// A currency value in base units.
///
/// There is a single currency per wallet, so mixing currencies is a type
/// error at compile time rather than a runtime failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct Amount {
    sat: i64,
}

impl Amount {
    pub const ZERO: Amount = Amount {
        sat: 0,
    };

    /// Create an amount from base units.
    pub const fn from_sat(sat: i64) -> Self {
        Self {
            sat,
        }
    }

    /// Parse a main-unit decimal string such as `"0.00012"`.
    pub fn from_main(value: &str) -> Result<Self, AmountError> {
        parse_main(value).map(Self::from_sat)
    }

    /// Parse a value given in the specified denomination.
    pub fn parse(value: &str, denomination: Denomination) -> Result<Self, AmountError> {
        match denomination {
            Denomination::Main => Self::from_main(value),
            Denomination::Base => {
                let trimmed = value.trim();
                let digits = trimmed.strip_prefix('-').unwrap_or(trimmed);
                if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                    return Err(AmountError::Invalid(value.to_string()));
                }
                trimmed
                    .parse::<i64>()
                    .map(Self::from_sat)
                    .map_err(|_| AmountError::Overflow(value.to_string()))
            }
        }
    }

    /// Value in base units.
    pub const fn to_sat(self) -> i64 {
        self.sat
    }

    pub fn checked_add(self, other: Amount) -> Option<Amount> {
        self.sat.checked_add(other.sat).map(Self::from_sat)
    }

    pub fn checked_sub(self, other: Amount) -> Option<Amount> {
        self.sat.checked_sub(other.sat).map(Self::from_sat)
    }

    /// Subtract `other`, allowing the result to go negative.
    pub fn minus(self, other: Amount) -> Amount {
        self - other
    }

    pub fn abs(self) -> Amount {
        Self::from_sat(self.sat.abs())
    }

    pub fn is_negative(self) -> bool {
        self.sat < 0
    }

    pub fn is_zero(self) -> bool {
        self.sat == 0
    }

    /// Base-unit integer string.
    pub fn to_base_unit(self) -> String {
        self.sat.to_string()
    }

    /// Main-unit decimal string with trailing zeros removed.
    pub fn to_main_unit(self) -> String {
        let sign = if self.sat < 0 {
            "-"
        } else {
            ""
        };
        let abs = self.sat.unsigned_abs();
        let whole = abs / BASE_PER_MAIN as u64;
        let frac = abs % BASE_PER_MAIN as u64;
        if frac == 0 {
            return format!("{}{}", sign, whole);
        }
        let frac = format!("{:08}", frac);
        format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
    }

    /// Lossy conversion to main units. For display only.
    pub fn to_f64(self) -> f64 {
        self.sat as f64 / BASE_PER_MAIN as f64
    }
}

fn parse_main(value: &str) -> Result<i64, AmountError> {
    let trimmed = value.trim();
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));

    let all_digits = |s: &str| s.chars().all(|c| c.is_ascii_digit());
    if (whole.is_empty() && frac.is_empty()) || !all_digits(whole) || !all_digits(frac) {
        return Err(AmountError::Invalid(value.to_string()));
    }
    if frac.len() > DECIMALS as usize {
        return Err(AmountError::TooPrecise(value.to_string()));
    }

    let overflow = || AmountError::Overflow(value.to_string());
    let whole: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| overflow())?
    };
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        let scale = 10i64.pow(DECIMALS - frac.len() as u32);
        frac.parse::<i64>().map_err(|_| overflow())? * scale
    };

    let sat = whole.checked_mul(BASE_PER_MAIN).and_then(|w| w.checked_add(frac)).ok_or_else(overflow)?;
    Ok(if negative {
        -sat
    } else {
        sat
    })
}

impl Display for Amount {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.to_main_unit(), MAIN_NAME)
    }
}

impl Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Amount) -> Amount {
        Self::from_sat(self.sat + rhs.sat)
    }
}

impl Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Amount) -> Amount {
        Self::from_sat(self.sat - rhs.sat)
    }
}

impl AddAssign for Amount {
    fn add_assign(&mut self, rhs: Amount) {
        self.sat += rhs.sat;
    }
}

impl SubAssign for Amount {
    fn sub_assign(&mut self, rhs: Amount) {
        self.sat -= rhs.sat;
    }
}

impl Neg for Amount {
    type Output = Amount;

    fn neg(self) -> Amount {
        Self::from_sat(-self.sat)
    }
}

impl Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + a)
    }
}

impl<'a> Sum<&'a Amount> for Amount {
    fn sum<I: Iterator<Item = &'a Amount>>(iter: I) -> Amount {
        iter.fold(Amount::ZERO, |acc, a| acc + *a)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case("1", 100_000_000 ; "whole")]
    #[test_case("0.00000001", 1 ; "one sat")]
    #[test_case("3.00000001", 300_000_001 ; "mixed")]
    #[test_case(".5", 50_000_000 ; "leading dot")]
    #[test_case("-0.1", -10_000_000 ; "negative")]
    fn test_from_main(input: &str, sat: i64) {
        assert_eq!(Amount::from_main(input).unwrap().to_sat(), sat);
    }

    #[test_case("" ; "empty")]
    #[test_case("1.2.3" ; "two dots")]
    #[test_case("abc" ; "letters")]
    #[test_case("." ; "bare dot")]
    fn test_from_main_invalid(input: &str) {
        assert!(matches!(Amount::from_main(input), Err(AmountError::Invalid(_))));
    }

    #[test]
    fn test_from_main_too_precise() {
        assert_eq!(
            Amount::from_main("0.000000001"),
            Err(AmountError::TooPrecise("0.000000001".to_string()))
        );
    }

    #[test]
    fn test_to_main_unit_trims_zeros() {
        assert_eq!(Amount::from_sat(300_000_001).to_main_unit(), "3.00000001");
        assert_eq!(Amount::from_sat(150_000_000).to_main_unit(), "1.5");
        assert_eq!(Amount::from_sat(200_000_000).to_main_unit(), "2");
        assert_eq!(Amount::from_sat(-5_000).to_main_unit(), "-0.00005");
        assert_eq!(Amount::ZERO.to_main_unit(), "0");
    }

    #[test]
    fn test_arithmetic_in_base_units() {
        let a = Amount::from_main("0.1").unwrap();
        let b = Amount::from_main("0.2").unwrap();
        assert_eq!((a + b).to_main_unit(), "0.3");
        assert_eq!(a.minus(b).to_sat(), -10_000_000);
        assert!(a.minus(b).is_negative());
        assert_eq!(a.minus(b).abs(), a);
        assert!(a <= b);
        assert!(b >= a);
    }

    #[test]
    fn test_parse_denominations() {
        assert_eq!(Amount::parse("546", Denomination::Base).unwrap().to_sat(), 546);
        assert_eq!(Amount::parse("0.00000546", Denomination::Main).unwrap().to_sat(), 546);
        assert!(Amount::parse("5.5", Denomination::Base).is_err());
        assert_eq!("sats".parse::<Denomination>().unwrap(), Denomination::Base);
        assert_eq!("BTC".parse::<Denomination>().unwrap(), Denomination::Main);
        assert!("eth".parse::<Denomination>().is_err());
    }

    #[test]
    fn test_sum_and_display() {
        let total: Amount = [1, 2, 3].iter().map(|v| Amount::from_sat(*v)).sum();
        assert_eq!(total.to_base_unit(), "6");
        assert_eq!(total.to_string(), "0.00000006 BTC");
        assert!((Amount::from_sat(50_000_000).to_f64() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&Amount::from_sat(1234)).unwrap();
        assert_eq!(json, "1234");
        let back: Amount = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Amount::from_sat(1234));
    }
}
