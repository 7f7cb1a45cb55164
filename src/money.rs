//! Money value object and price math
//!
//! All amounts are integers in minor currency units; floating point never
//! touches stored money. Division only happens for display.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// An amount in minor currency units.
///
/// Serializes as a string of minor units, the encoding the remote service
/// uses on the wire, and accepts plain integers when deserializing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Amount(i64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    pub fn new(minor_units: i64) -> Self {
        Self(minor_units)
    }

    pub fn minor_units(self) -> i64 {
        self.0
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn plus(self, other: Amount) -> Amount {
        Amount(self.0.saturating_add(other.0))
    }

    pub fn subtract(self, other: Amount) -> Option<Amount> {
        if other.0 > self.0 {
            None
        } else {
            Some(Amount(self.0 - other.0))
        }
    }

    /// Line total for `qty` units priced at `self`.
    pub fn times(self, qty: u32) -> Amount {
        Amount(self.0.saturating_mul(qty as i64))
    }

    /// Display value: whole units (integer division by 100) with thousands
    /// grouping. Rounds for display only, never for storage.
    pub fn to_display(self) -> String {
        group_thousands(self.0 / 100)
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_display())
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct AmountVisitor;

        impl Visitor<'_> for AmountVisitor {
            type Value = Amount;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "an amount in minor units, as a string or integer")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<Amount, E> {
                v.parse::<i64>().map(Amount).map_err(de::Error::custom)
            }

            fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<Amount, E> {
                Ok(Amount(v))
            }

            fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<Amount, E> {
                i64::try_from(v).map(Amount).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_any(AmountVisitor)
    }
}

/// The original price implied by a discounted current price:
/// `current / (1 - discount/100)`, rounded. Defined only for
/// `0 < discount < 100`.
pub fn implied_original_price(current: Amount, discount_percent: u8) -> Option<Amount> {
    if discount_percent == 0 || discount_percent >= 100 {
        return None;
    }
    let remainder = 100 - discount_percent as i64;
    Some(Amount((current.0 * 100 + remainder / 2) / remainder))
}

/// What the buyer saves against the original price. `None` unless the
/// original is strictly greater; savings are never negative.
pub fn savings(original: Amount, current: Amount) -> Option<Amount> {
    if original > current {
        Some(Amount(original.0 - current.0))
    } else {
        None
    }
}

fn group_thousands(n: i64) -> String {
    let digits = n.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if n < 0 {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
