//! Pricing Types
//!
//! Exchange-rate snapshots and currency conversions as returned by the
//! price service REST API. All amounts use `Decimal` and travel as JSON
//! numbers on the wire.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A currency code such as `USD` or `BTC`.
pub type CurrencyCode = String;

// =============================================================================
// Price
// =============================================================================

/// Exchange rate snapshot between two currencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Base currency.
    pub base: CurrencyCode,
    /// Quote currency.
    pub quote: CurrencyCode,
    /// Amount of `quote` per unit of `base`.
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>, value: Decimal) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            value,
        }
    }

    /// Currency pair in `BASE/QUOTE` form.
    #[must_use]
    pub fn pair(&self) -> String {
        format!("{}/{}", self.base, self.quote)
    }
}

/// Lookup key for a single price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuery {
    /// Base currency.
    pub base: CurrencyCode,
    /// Quote currency.
    pub quote: CurrencyCode,
    /// Optional price source (exchange or oracle name).
    pub source: Option<String>,
}

impl PriceQuery {
    /// Query a pair without naming a source.
    #[must_use]
    pub fn new(base: impl Into<String>, quote: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            quote: quote.into(),
            source: None,
        }
    }

    /// Restrict the query to a specific source.
    #[must_use]
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

// =============================================================================
// Conversion
// =============================================================================

/// One side of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionAmount {
    /// Currency of this side.
    pub currency: CurrencyCode,
    /// Amount in that currency.
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
}

/// Result of converting an amount of one currency into another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversion {
    /// Input side.
    pub base: ConversionAmount,
    /// Output side.
    pub quote: ConversionAmount,
    /// When the service priced the conversion.
    pub timestamp: DateTime<Utc>,
}

impl Conversion {
    /// Effective rate (`quote.value / base.value`), if the base is non-zero.
    #[must_use]
    pub fn rate(&self) -> Option<Decimal> {
        self.quote.value.checked_div(self.base.value)
    }
}

/// Input to a conversion request.
///
/// Serialized as the POST body of `/api/conversions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionRequest {
    /// Currency being converted from.
    pub base: CurrencyCode,
    /// Amount of `base` to convert.
    #[serde(with = "rust_decimal::serde::float")]
    pub value: Decimal,
    /// Currency being converted to.
    pub quote: CurrencyCode,
}

impl ConversionRequest {
    /// Create a conversion request, rejecting non-positive amounts.
    pub fn new(
        base: impl Into<String>,
        value: Decimal,
        quote: impl Into<String>,
    ) -> Result<Self, InvalidConversion> {
        let request = Self {
            base: base.into(),
            value,
            quote: quote.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Check that the amount is strictly positive.
    ///
    /// `base == quote` is accepted; the service decides what to do with it.
    pub fn validate(&self) -> Result<(), InvalidConversion> {
        if self.value <= Decimal::ZERO {
            return Err(InvalidConversion::NonPositiveValue(self.value));
        }
        Ok(())
    }
}

/// Rejected conversion input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InvalidConversion {
    /// Amount was zero or negative.
    #[error("conversion value must be positive, got {0}")]
    NonPositiveValue(Decimal),
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use test_case::test_case;

    #[test]
    fn price_decodes_integer_and_float_values() {
        let price: Price =
            serde_json::from_str(r#"{"base":"USD","quote":"BTC","value":42000}"#).unwrap();
        assert_eq!(price.value, Decimal::from(42000));

        let price: Price =
            serde_json::from_str(r#"{"base":"BTC","quote":"USD","value":0.5}"#).unwrap();
        assert_eq!(price.value, Decimal::new(5, 1));
        assert_eq!(price.pair(), "BTC/USD");
    }

    #[test]
    fn price_missing_field_is_rejected() {
        let result = serde_json::from_str::<Price>(r#"{"base":"USD","value":1}"#);
        assert!(result.is_err());
    }

    #[test]
    fn conversion_decodes_timestamp() {
        let conversion: Conversion = serde_json::from_str(
            r#"{
                "base": {"currency": "USD", "value": 1000},
                "quote": {"currency": "BTC", "value": 0.025},
                "timestamp": "2024-01-01T00:00:00Z"
            }"#,
        )
        .unwrap();

        assert_eq!(conversion.base.currency, "USD");
        assert_eq!(conversion.quote.value, Decimal::new(25, 3));
        assert_eq!(conversion.timestamp.to_rfc3339(), "2024-01-01T00:00:00+00:00");
        assert_eq!(conversion.rate(), Some(Decimal::new(25, 6)));
    }

    #[test]
    fn conversion_rate_with_zero_base_is_none() {
        let conversion = Conversion {
            base: ConversionAmount {
                currency: "USD".to_string(),
                value: Decimal::ZERO,
            },
            quote: ConversionAmount {
                currency: "BTC".to_string(),
                value: Decimal::ONE,
            },
            timestamp: Utc::now(),
        };
        assert_eq!(conversion.rate(), None);
    }

    #[test]
    fn conversion_request_serializes_value_as_number() {
        let request = ConversionRequest::new("USD", Decimal::from(1000), "BTC").unwrap();
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"base": "USD", "value": 1000.0, "quote": "BTC"})
        );
    }

    #[test_case(Decimal::ZERO ; "zero")]
    #[test_case(Decimal::from(-1) ; "negative")]
    #[test_case(Decimal::new(-1, 8) ; "tiny negative")]
    fn conversion_request_rejects_non_positive(value: Decimal) {
        assert_eq!(
            ConversionRequest::new("USD", value, "BTC"),
            Err(InvalidConversion::NonPositiveValue(value))
        );
    }

    #[test]
    fn conversion_request_allows_same_currency() {
        assert!(ConversionRequest::new("USD", Decimal::ONE, "USD").is_ok());
    }

    #[test]
    fn price_query_builder() {
        let query = PriceQuery::new("USD", "BTC").with_source("kraken");
        assert_eq!(query.base, "USD");
        assert_eq!(query.quote, "BTC");
        assert_eq!(query.source.as_deref(), Some("kraken"));
    }

    proptest! {
        #[test]
        fn positive_values_are_accepted(mantissa in 1i64..i64::MAX, scale in 0u32..10) {
            let value = Decimal::new(mantissa, scale);
            let request = ConversionRequest::new("USD", value, "BTC");
            prop_assert!(request.is_ok());
            prop_assert!(request.unwrap().value > Decimal::ZERO);
        }
    }
}
