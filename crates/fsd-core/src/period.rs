//! Fiscal period codes of submissions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fiscal period code of a submission (`fp` in the submissions table).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FiscalPeriod {
    /// Full fiscal year.
    #[default]
    FY,
    /// First quarter.
    Q1,
    /// Second quarter.
    Q2,
    /// Third quarter.
    Q3,
    /// Fourth quarter.
    Q4,
    /// First half year.
    H1,
    /// Second half year.
    H2,
    /// Any other code (e.g. transition periods).
    Other,
}

impl FiscalPeriod {
    /// Returns the code as it appears in the submissions table.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::FY => "FY",
            Self::Q1 => "Q1",
            Self::Q2 => "Q2",
            Self::Q3 => "Q3",
            Self::Q4 => "Q4",
            Self::H1 => "H1",
            Self::H2 => "H2",
            Self::Other => "",
        }
    }
}

impl FromStr for FiscalPeriod {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_uppercase().as_str() {
            "FY" => Self::FY,
            "Q1" => Self::Q1,
            "Q2" => Self::Q2,
            "Q3" => Self::Q3,
            "Q4" => Self::Q4,
            "H1" => Self::H1,
            "H2" => Self::H2,
            _ => Self::Other,
        })
    }
}

impl fmt::Display for FiscalPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fiscal_period_parse() {
        assert_eq!("q2".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::Q2);
        assert_eq!("FY".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::FY);
        assert_eq!("xx".parse::<FiscalPeriod>().unwrap(), FiscalPeriod::Other);
        assert_eq!(FiscalPeriod::Q3.to_string(), "Q3");
    }
}
