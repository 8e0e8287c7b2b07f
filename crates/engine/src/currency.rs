use serde::{Deserialize, Serialize};

use crate::EngineError;

/// ISO-4217 numeric currency code of a card and its transactions.
///
/// The engine never converts between currencies: the code is carried through
/// from the provider (or the user, for manual cards) and only compared for
/// equality.
///
/// ## Minor units
///
/// Monetary values are stored as an `i64` number of **minor units**, as the
/// provider reports them. Example: UAH has 2 minor units, so `10.50 UAH` ⇄
/// `1050`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Currency(u16);

impl Currency {
    pub const UAH: Currency = Currency(980);
    pub const USD: Currency = Currency(840);
    pub const EUR: Currency = Currency(978);

    /// Numeric ISO-4217 code.
    #[must_use]
    pub const fn code(self) -> u16 {
        self.0
    }

    /// Alphabetic code for the currencies the provider commonly reports.
    #[must_use]
    pub const fn alpha(self) -> Option<&'static str> {
        match self.0 {
            980 => Some("UAH"),
            840 => Some("USD"),
            978 => Some("EUR"),
            826 => Some("GBP"),
            985 => Some("PLN"),
            _ => None,
        }
    }
}

impl Default for Currency {
    fn default() -> Self {
        Self::UAH
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self.alpha() {
            Some(alpha) => f.write_str(alpha),
            None => write!(f, "{:03}", self.0),
        }
    }
}

impl TryFrom<i32> for Currency {
    type Error = EngineError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match u16::try_from(value) {
            Ok(code @ 1..=999) => Ok(Currency(code)),
            _ => Err(EngineError::InvalidCard(format!(
                "invalid currency code: {value}"
            ))),
        }
    }
}

impl From<Currency> for i32 {
    fn from(value: Currency) -> Self {
        i32::from(value.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_codes_outside_iso_range() {
        assert!(Currency::try_from(0).is_err());
        assert!(Currency::try_from(-980).is_err());
        assert!(Currency::try_from(1000).is_err());
        assert_eq!(Currency::try_from(980).unwrap(), Currency::UAH);
    }

    #[test]
    fn display_falls_back_to_numeric_code() {
        assert_eq!(Currency::UAH.to_string(), "UAH");
        assert_eq!(Currency::try_from(36).unwrap().to_string(), "036");
    }
}
