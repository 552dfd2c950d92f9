use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    #[default]
    Sar,
    Usd,
}

impl Currency {
    pub fn code(&self) -> &'static str {
        match self {
            Currency::Sar => "SAR",
            Currency::Usd => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SAR" => Ok(Currency::Sar),
            "USD" => Ok(Currency::Usd),
            other => Err(CoreError::Validation(format!("unsupported currency '{}'", other))),
        }
    }
}

/// An amount quoted in both riyals and dollars.
///
/// Bookings capture one at creation time; payments and refunds mirror it. The two
/// figures are stored side by side, never converted into one another.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceSnapshot {
    pub sar: Decimal,
    pub usd: Decimal,
}

impl PriceSnapshot {
    pub fn new(sar: Decimal, usd: Decimal) -> Self {
        Self { sar, usd }
    }

    pub fn ensure_positive(&self, what: &str) -> CoreResult<()> {
        if self.sar <= Decimal::ZERO || self.usd <= Decimal::ZERO {
            return Err(CoreError::Validation(format!("{} must be positive in SAR and USD", what)));
        }
        Ok(())
    }

    /// True when neither figure exceeds the corresponding figure of `limit`.
    pub fn fits_within(&self, limit: &PriceSnapshot) -> bool {
        self.sar <= limit.sar && self.usd <= limit.usd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_fits_within() {
        let paid = PriceSnapshot::new(dec("1500.00"), dec("400.00"));
        assert!(PriceSnapshot::new(dec("1500.00"), dec("400.00")).fits_within(&paid));
        assert!(PriceSnapshot::new(dec("750.00"), dec("200.00")).fits_within(&paid));
        assert!(!PriceSnapshot::new(dec("750.00"), dec("400.01")).fits_within(&paid));
    }

    #[test]
    fn test_positive_check() {
        assert!(PriceSnapshot::new(dec("10"), dec("2.67")).ensure_positive("price").is_ok());
        assert!(PriceSnapshot::new(dec("0"), dec("2.67")).ensure_positive("price").is_err());
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::Usd);
        assert_eq!(Currency::default(), Currency::Sar);
    }
}
