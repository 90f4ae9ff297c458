//! Dry-run gateway.
//!
//! Keeps an in-memory order book of everything "submitted". Market orders
//! fill immediately; resting orders fill when a status query sees the mark
//! price cross them. Prices come from a fixed value or from a public price
//! source (the live ticker), so dry runs never need API keys.

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::json;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::info;
use uuid::Uuid;

use crate::domain::{OrderRequest, OrderResult, OrderSide, OrderStatus, OrderType, SymbolFilters};
use crate::error::{BotError, Result};
use crate::exchange::{ExchangeGateway, ExchangeKind};

enum PriceSource {
    Fixed(RwLock<Decimal>),
    Live(Arc<dyn ExchangeGateway>),
}

#[derive(Debug, Clone)]
struct PaperOrder {
    request: OrderRequest,
    status: OrderStatus,
}

pub struct PaperGateway {
    prices: PriceSource,
    orders: Mutex<HashMap<String, PaperOrder>>,
    next_id: AtomicU64,
}

impl PaperGateway {
    /// Paper trading against a fixed mark price
    pub fn with_fixed_price(price: Decimal) -> Self {
        Self {
            prices: PriceSource::Fixed(RwLock::new(price)),
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Paper trading against the live ticker of another gateway
    pub fn with_live_prices(source: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            prices: PriceSource::Live(source),
            orders: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Move the fixed mark price (no-op for live prices)
    pub async fn set_price(&self, price: Decimal) {
        if let PriceSource::Fixed(lock) = &self.prices {
            *lock.write().await = price;
        }
    }

    pub async fn order_count(&self) -> usize {
        self.orders.lock().await.len()
    }

    fn crosses(request: &OrderRequest, mark: Decimal) -> bool {
        match (request.order_type, request.side) {
            (OrderType::Market, _) => true,
            (OrderType::Limit, OrderSide::Buy) => request.price.is_some_and(|p| mark <= p),
            (OrderType::Limit, OrderSide::Sell) => request.price.is_some_and(|p| mark >= p),
            // Stop triggers, then the limit is assumed to fill
            (OrderType::StopLimit, OrderSide::Buy) => request.stop_price.is_some_and(|s| mark >= s),
            (OrderType::StopLimit, OrderSide::Sell) => {
                request.stop_price.is_some_and(|s| mark <= s)
            }
        }
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Paper
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        let client_order_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());

        let mut orders = self.orders.lock().await;
        if orders
            .values()
            .any(|o| o.request.client_order_id.as_deref() == Some(client_order_id.as_str()))
        {
            return Err(BotError::Rejected {
                code: -4116,
                message: format!("ClientOrderId {client_order_id} is duplicated"),
            });
        }

        let order_id = format!("paper-{}", self.next_id.fetch_add(1, Ordering::SeqCst));

        let status = if request.order_type == OrderType::Market {
            OrderStatus::Filled
        } else {
            OrderStatus::Submitted
        };

        orders.insert(
            order_id.clone(),
            PaperOrder {
                request: request.clone(),
                status,
            },
        );
        drop(orders);

        info!(
            order_id = %order_id,
            symbol = %request.symbol,
            side = %request.side,
            order_type = %request.order_type,
            quantity = %request.quantity,
            "[DRY RUN] order accepted"
        );

        Ok(OrderResult {
            request: request.clone(),
            exchange_order_id: order_id.clone(),
            client_order_id,
            status,
            raw_response: json!({
                "orderId": order_id,
                "status": status.to_string(),
                "dryRun": true,
                "updateTime": Utc::now().timestamp_millis(),
            }),
        })
    }

    async fn get_order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let mark = self.get_price(symbol).await?;
        let mut orders = self.orders.lock().await;
        let order = orders.get_mut(order_id).ok_or_else(|| BotError::Rejected {
            code: -2013,
            message: format!("Order {order_id} does not exist"),
        })?;

        if order.status.is_active() && Self::crosses(&order.request, mark) {
            order.status = OrderStatus::Filled;
        }
        Ok(order.status)
    }

    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        match &self.prices {
            PriceSource::Fixed(lock) => Ok(*lock.read().await),
            PriceSource::Live(source) => source.get_price(symbol).await,
        }
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
        let mut orders = self.orders.lock().await;
        match orders.get_mut(order_id) {
            Some(order) if order.status.is_active() => {
                order.status = OrderStatus::Cancelled;
                Ok(())
            }
            Some(order) => Err(BotError::Rejected {
                code: -2011,
                message: format!("Order {order_id} is already {}", order.status),
            }),
            None => Err(BotError::Rejected {
                code: -2011,
                message: format!("Unknown order {order_id}"),
            }),
        }
    }

    async fn ping(&self) -> Result<()> {
        match &self.prices {
            PriceSource::Fixed(_) => Ok(()),
            PriceSource::Live(source) => source.ping().await,
        }
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<Option<SymbolFilters>> {
        match &self.prices {
            PriceSource::Fixed(_) => Ok(None),
            PriceSource::Live(source) => source.symbol_filters(symbol).await,
        }
    }
}
