use std::sync::Arc;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::domain::{OrderRequest, OrderResult, SymbolFilters};
use crate::error::Result;
use crate::exchange::ExchangeGateway;

/// Validates a single order and hands it to the gateway exactly once.
///
/// No retries happen here; retry policy belongs to the calling strategy.
#[derive(Clone)]
pub struct OrderSubmitter {
    gateway: Arc<dyn ExchangeGateway>,
    filters: Option<SymbolFilters>,
}

impl OrderSubmitter {
    pub fn new(gateway: Arc<dyn ExchangeGateway>) -> Self {
        Self {
            gateway,
            filters: None,
        }
    }

    /// Also check requests against the symbol's exchange rules
    pub fn with_filters(mut self, filters: Option<SymbolFilters>) -> Self {
        self.filters = filters;
        self
    }

    pub fn gateway(&self) -> &Arc<dyn ExchangeGateway> {
        &self.gateway
    }

    pub fn filters(&self) -> Option<&SymbolFilters> {
        self.filters.as_ref()
    }

    fn precheck(&self, request: &OrderRequest) -> Result<()> {
        request.validate()?;
        match &self.filters {
            Some(filters) => filters.check(request),
            None => Ok(()),
        }
    }

    pub async fn submit(&self, request: &OrderRequest) -> Result<OrderResult> {
        if let Err(e) = self.precheck(request) {
            warn!(
                symbol = %request.symbol,
                side = %request.side,
                order_type = %request.order_type,
                quantity = %request.quantity,
                error = %e,
                "order rejected before submission"
            );
            return Err(e);
        }

        let start = Instant::now();
        match self.gateway.submit_order(request).await {
            Ok(result) => {
                info!(
                    symbol = %request.symbol,
                    side = %request.side,
                    order_type = %request.order_type,
                    quantity = %request.quantity,
                    price = ?request.price,
                    stop_price = ?request.stop_price,
                    client_order_id = ?request.client_order_id,
                    order_id = %result.exchange_order_id,
                    status = %result.status,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "order submitted"
                );
                Ok(result)
            }
            Err(e) => {
                warn!(
                    symbol = %request.symbol,
                    side = %request.side,
                    order_type = %request.order_type,
                    quantity = %request.quantity,
                    kind = %e.kind(),
                    error = %e,
                    elapsed_ms = start.elapsed().as_millis() as u64,
                    "order submission failed"
                );
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{OrderSide, OrderStatus};
    use crate::error::{BotError, ErrorKind};
    use crate::exchange::MockExchangeGateway;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn accepted(request: &OrderRequest, id: u64) -> OrderResult {
        OrderResult {
            request: request.clone(),
            exchange_order_id: id.to_string(),
            client_order_id: format!("cid-{id}"),
            status: OrderStatus::Submitted,
            raw_response: serde_json::json!({ "orderId": id }),
        }
    }

    #[tokio::test]
    async fn invalid_requests_never_reach_the_gateway() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_submit_order().times(0);
        let submitter = OrderSubmitter::new(Arc::new(mock));

        let mut limit_without_price =
            OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.01), dec!(50000));
        limit_without_price.price = None;

        let mut stop_without_stop = OrderRequest::stop_limit(
            "BTCUSDT",
            OrderSide::Sell,
            dec!(0.01),
            dec!(49000),
            dec!(48900),
        );
        stop_without_stop.stop_price = None;

        let zero_qty = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0));
        let negative_qty = OrderRequest::market("BTCUSDT", OrderSide::Sell, dec!(-1));

        for request in [limit_without_price, stop_without_stop, zero_qty, negative_qty] {
            let err = submitter.submit(&request).await.expect_err("must be invalid");
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        }
    }

    #[tokio::test]
    async fn exchange_rules_are_checked_before_the_gateway() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_submit_order().times(0);
        let submitter = OrderSubmitter::new(Arc::new(mock)).with_filters(Some(SymbolFilters {
            symbol: "BTCUSDT".to_string(),
            tick_size: dec!(0.1),
            min_price: dec!(0),
            max_price: dec!(0),
            step_size: dec!(0.001),
            min_qty: dec!(0.001),
            max_qty: dec!(1000),
            min_notional: dec!(100),
        }));

        let off_step = OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.0015));
        let off_tick = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.01), dec!(50000.05));
        let tiny = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.001), dec!(50000));

        for request in [off_step, off_tick, tiny] {
            let err = submitter.submit(&request).await.expect_err("breaks a filter");
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        }
    }

    #[tokio::test]
    async fn gateway_errors_pass_through_with_their_kind() {
        let mut mock = MockExchangeGateway::new();
        mock.expect_submit_order().times(1).returning(|_| {
            Err(BotError::Rejected {
                code: -2019,
                message: "Margin is insufficient.".to_string(),
            })
        });
        let submitter = OrderSubmitter::new(Arc::new(mock));

        let err = submitter
            .submit(&OrderRequest::market("BTCUSDT", OrderSide::Buy, dec!(0.001)))
            .await
            .expect_err("rejected");
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }

    #[tokio::test]
    async fn identical_requests_are_not_deduplicated() {
        let counter = Arc::new(AtomicU64::new(0));
        let seen = counter.clone();

        let mut mock = MockExchangeGateway::new();
        mock.expect_submit_order()
            .times(2)
            .returning(move |req| Ok(accepted(req, seen.fetch_add(1, Ordering::SeqCst) + 1)));
        let submitter = OrderSubmitter::new(Arc::new(mock));

        let request = OrderRequest::limit("BTCUSDT", OrderSide::Buy, dec!(0.01), dec!(45000));
        let first = submitter.submit(&request).await.unwrap();
        let second = submitter.submit(&request).await.unwrap();

        assert_ne!(first.exchange_order_id, second.exchange_order_id);
        assert_ne!(first.client_order_id, second.client_order_id);
        assert_eq!(first.request, second.request);
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }
}
