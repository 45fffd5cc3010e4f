use derive_more::{Add, AddAssign, Sub, SubAssign, Sum};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub type ResourceUnits = u64;
pub type ResourceFractions = u32;

pub const FRACTIONS_PER_UNIT: ResourceFractions = 10_000;
pub const FRACTIONS_MAX_DIGITS: usize = 4; // = log10(FRACTIONS_PER_UNIT)

/// Fixed-point amount of a single resource.
///
/// Quota capacities, requests and reservations are all expressed in this
/// type. For countable resources (cpu) one unit is one core; for memory one
/// unit is one byte.
#[derive(
    Debug,
    Serialize,
    Clone,
    Copy,
    Hash,
    Eq,
    Deserialize,
    PartialEq,
    Ord,
    PartialOrd,
    AddAssign,
    SubAssign,
    Sub,
    Add,
    Sum,
)]
pub struct ResourceAmount(u64);

impl ResourceAmount {
    pub const ZERO: ResourceAmount = ResourceAmount(0);

    pub fn new(units: ResourceUnits, fractions: ResourceFractions) -> Self {
        assert!(fractions < FRACTIONS_PER_UNIT);
        ResourceAmount(units * FRACTIONS_PER_UNIT as u64 + fractions as u64)
    }

    pub fn new_units(units: ResourceUnits) -> Self {
        ResourceAmount(units * FRACTIONS_PER_UNIT as u64)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn units(&self) -> ResourceUnits {
        self.0 / FRACTIONS_PER_UNIT as u64
    }

    pub fn fractions(&self) -> ResourceFractions {
        (self.0 % FRACTIONS_PER_UNIT as u64) as ResourceFractions
    }

    pub fn total_fractions(&self) -> u64 {
        self.0
    }

    /// Subtraction clamped at zero; quota arithmetic never underflows.
    pub fn saturating_sub(&self, other: ResourceAmount) -> ResourceAmount {
        ResourceAmount(self.0.saturating_sub(other.0))
    }
}

impl std::fmt::Display for ResourceAmount {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let fractions = self.fractions();
        write!(f, "{}", self.units())?;
        if fractions != 0 {
            let num = format!("{:01$}", fractions, FRACTIONS_MAX_DIGITS);
            write!(f, ".{}", num.trim_end_matches("0"))?;
        }
        Ok(())
    }
}

/// Multipliers expressed in fractions, so that "500m" and "20Mi" parse
/// without floating point.
fn suffix_fractions(suffix: &str) -> Option<u128> {
    const F: u128 = FRACTIONS_PER_UNIT as u128;
    Some(match suffix {
        "" => F,
        "m" => F / 1_000,
        "k" => F * 1_000,
        "M" => F * 1_000_000,
        "G" => F * 1_000_000_000,
        "T" => F * 1_000_000_000_000,
        "Ki" => F * 1_024,
        "Mi" => F * 1_024 * 1_024,
        "Gi" => F * 1_024 * 1_024 * 1_024,
        "Ti" => F * 1_024 * 1_024 * 1_024 * 1_024,
        _ => return None,
    })
}

impl FromStr for ResourceAmount {
    type Err = crate::Error;

    /// Parses quantity strings as they appear in quota configuration and job
    /// resource requests: "1", "0.5", "500m", "20Mi", "36Gi", ...
    fn from_str(s: &str) -> crate::Result<Self> {
        let s = s.trim();
        let split = s
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(s.len());
        let (number, suffix) = s.split_at(split);
        let multiplier = suffix_fractions(suffix)
            .ok_or_else(|| format!("Invalid quantity suffix '{suffix}' in '{s}'"))?;

        let (int_part, frac_part) = match number.split_once('.') {
            Some((i, f)) => (i, f),
            None => (number, ""),
        };
        if int_part.is_empty() && frac_part.is_empty() {
            return Err(format!("Invalid quantity '{s}'").into());
        }
        let int_value: u128 = if int_part.is_empty() {
            0
        } else {
            int_part
                .parse()
                .map_err(|_| format!("Invalid quantity '{s}'"))?
        };
        let frac_value: u128 = if frac_part.is_empty() {
            0
        } else {
            frac_part
                .parse()
                .map_err(|_| format!("Invalid quantity '{s}'"))?
        };
        let scale = 10u128.pow(frac_part.len() as u32);
        let total = int_value
            .checked_mul(scale)
            .and_then(|v| v.checked_add(frac_value))
            .and_then(|v| v.checked_mul(multiplier))
            .ok_or_else(|| format!("Quantity '{s}' is out of range"))?;
        if total % scale != 0 {
            return Err(format!("Quantity '{s}' cannot be represented").into());
        }
        let fractions = total / scale;
        if fractions > u64::MAX as u128 {
            return Err(format!("Quantity '{s}' is out of range").into());
        }
        Ok(ResourceAmount(fractions as u64))
    }
}
