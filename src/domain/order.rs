use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{BotError, Result};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = String;

    fn from_str(raw: &str) -> std::result::Result<Self, Self::Err> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(Self::Buy),
            "SELL" => Ok(Self::Sell),
            other => Err(format!("invalid side '{other}'; expected BUY|SELL")),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderType {
    Market,
    Limit,
    StopLimit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            OrderType::StopLimit => "STOP_LIMIT",
        }
    }

    pub fn requires_price(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::StopLimit)
    }

    pub fn requires_stop_price(&self) -> bool {
        matches!(self, OrderType::StopLimit)
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    /// Accepted by the exchange, resting or in flight
    Submitted,
    /// Order partially filled
    PartiallyFilled,
    /// Order fully filled
    Filled,
    /// Order cancelled
    Cancelled,
    /// Order rejected by exchange
    Rejected,
    /// Order expired
    Expired,
    /// Status could not be determined
    Error,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled
                | OrderStatus::Cancelled
                | OrderStatus::Rejected
                | OrderStatus::Expired
                | OrderStatus::Error
        )
    }

    pub fn is_active(&self) -> bool {
        matches!(self, OrderStatus::Submitted | OrderStatus::PartiallyFilled)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            OrderStatus::Submitted => "SUBMITTED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Error => "ERROR",
        };
        write!(f, "{s}")
    }
}

/// Order request (what we want to do)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    /// Idempotency key sent as `newClientOrderId`. Set once per step so
    /// retries of the same step cannot open a second order.
    #[serde(default)]
    pub client_order_id: Option<String>,
}

impl OrderRequest {
    pub fn market(symbol: &str, side: OrderSide, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Market,
            price: None,
            stop_price: None,
            client_order_id: None,
        }
    }

    pub fn limit(symbol: &str, side: OrderSide, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Limit,
            price: Some(price),
            stop_price: None,
            client_order_id: None,
        }
    }

    pub fn stop_limit(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::StopLimit,
            price: Some(limit_price),
            stop_price: Some(stop_price),
            client_order_id: None,
        }
    }

    pub fn with_client_order_id(mut self, client_order_id: impl Into<String>) -> Self {
        self.client_order_id = Some(client_order_id.into());
        self
    }

    /// Check the static invariants of a request. No I/O.
    pub fn validate(&self) -> Result<()> {
        if self.symbol.trim().is_empty() {
            return Err(BotError::InvalidRequest("symbol cannot be empty".into()));
        }

        if self.quantity <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "quantity must be positive, got {}",
                self.quantity
            )));
        }

        match (self.order_type.requires_price(), self.price) {
            (true, None) => {
                return Err(BotError::InvalidRequest(format!(
                    "{} order requires a price",
                    self.order_type
                )))
            }
            (false, Some(_)) => {
                return Err(BotError::InvalidRequest(format!(
                    "{} order must not carry a price",
                    self.order_type
                )))
            }
            (true, Some(p)) if p <= Decimal::ZERO => {
                return Err(BotError::InvalidRequest(format!(
                    "price must be positive, got {p}"
                )))
            }
            _ => {}
        }

        match (self.order_type.requires_stop_price(), self.stop_price) {
            (true, None) => Err(BotError::InvalidRequest(format!(
                "{} order requires a stop price",
                self.order_type
            ))),
            (false, Some(_)) => Err(BotError::InvalidRequest(format!(
                "{} order must not carry a stop price",
                self.order_type
            ))),
            (true, Some(sp)) if sp <= Decimal::ZERO => Err(BotError::InvalidRequest(format!(
                "stop price must be positive, got {sp}"
            ))),
            _ => Ok(()),
        }
    }

    /// Notional value at the request's limit price, if it has one
    pub fn notional(&self) -> Option<Decimal> {
        self.price.map(|p| p * self.quantity)
    }
}

/// Outcome of one submission attempt as reported by the exchange
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderResult {
    pub request: OrderRequest,
    pub exchange_order_id: String,
    pub client_order_id: String,
    pub status: OrderStatus,
    pub raw_response: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn side_parses_case_insensitively() {
        assert_eq!("buy".parse::<OrderSide>().unwrap(), OrderSide::Buy);
        assert_eq!(" SELL ".parse::<OrderSide>().unwrap(), OrderSide::Sell);
        assert!("hold".parse::<OrderSide>().is_err());
    }

    #[test]
    fn valid_requests_pass() {
        assert!(OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.001))
            .validate()
            .is_ok());
        assert!(
            OrderRequest::limit("BTCUSDT", OrderSide::Sell, dec!(0.01), dec!(65000))
                .validate()
                .is_ok()
        );
        assert!(OrderRequest::stop_limit(
            "BTCUSDT",
            OrderSide::Buy,
            dec!(0.01),
            dec!(60000),
            dec!(60100)
        )
        .validate()
        .is_ok());
    }

    #[test]
    fn missing_or_extra_prices_are_invalid() {
        let mut limit = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(10));
        limit.price = None;
        assert!(matches!(limit.validate(), Err(BotError::InvalidRequest(_))));

        let mut stop = OrderRequest::stop_limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(9), dec!(10));
        stop.stop_price = None;
        assert!(matches!(stop.validate(), Err(BotError::InvalidRequest(_))));

        let mut market = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(1));
        market.price = Some(dec!(10));
        assert!(matches!(market.validate(), Err(BotError::InvalidRequest(_))));
    }

    #[test]
    fn non_positive_values_are_invalid() {
        let zero = OrderRequest::market("BTCUSDT", OrderSide::Buy, Decimal::ZERO);
        assert!(zero.validate().is_err());

        let negative_price = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(1), dec!(-5));
        assert!(negative_price.validate().is_err());

        let empty_symbol = OrderRequest::market("  ", OrderSide::Sell, dec!(1));
        assert!(empty_symbol.validate().is_err());
    }

    #[test]
    fn status_lifecycle_helpers() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Submitted.is_active());
        assert!(!OrderStatus::PartiallyFilled.is_terminal());
    }
}
