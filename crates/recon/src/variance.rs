//! Variance and match classification

use std::fmt;

use rust_decimal::Decimal;

/// Largest absolute variance that still counts as a match (exclusive)
pub const DEFAULT_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MatchStatus {
    Match,
    Variance,
    DataMissing,
}

impl MatchStatus {
    /// `DataMissing` without a variance, `Match` when `|variance| <
    /// tolerance`, otherwise `Variance`
    pub fn classify(variance: Option<Decimal>, tolerance: Decimal) -> Self {
        match variance {
            None => MatchStatus::DataMissing,
            Some(v) if v.abs() < tolerance => MatchStatus::Match,
            Some(_) => MatchStatus::Variance,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Match => "Match",
            MatchStatus::Variance => "Variance",
            MatchStatus::DataMissing => "DataMissing",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `api - web`, or nothing when either side is absent
pub fn variance(api: Option<Decimal>, web: Option<Decimal>) -> Option<Decimal> {
    Some(api? - web?)
}
