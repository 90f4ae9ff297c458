//! One-shot strategies: MARKET, LIMIT and STOP_LIMIT.

use tracing::{error, info};

use super::OrderExecutor;
use crate::domain::{OrderRequest, OrderSide, OrderType, StrategyOutcome};
use crate::error::{BotError, ErrorKind, Result};

/// Stop-limit trigger ordering: a buy stop triggers on the way up and must
/// not sit above its limit; a sell stop is the mirror image.
pub fn check_stop_limit_prices(request: &OrderRequest) -> Result<()> {
    if request.order_type != OrderType::StopLimit {
        return Ok(());
    }
    let (Some(stop), Some(limit)) = (request.stop_price, request.price) else {
        // Missing prices are reported by `OrderRequest::validate`
        return Ok(());
    };

    let ordered = match request.side {
        OrderSide::Buy => stop <= limit,
        OrderSide::Sell => stop >= limit,
    };
    if ordered {
        Ok(())
    } else {
        Err(BotError::InvalidRequest(format!(
            "{} stop-limit needs stop {} limit (stop {}, limit {})",
            request.side,
            if request.side == OrderSide::Buy { "<=" } else { ">=" },
            stop,
            limit
        )))
    }
}

/// Submit one order through the retry policy and summarise the result
pub async fn run_single(executor: &OrderExecutor, request: &OrderRequest) -> StrategyOutcome {
    let name = request.order_type.as_str();
    let mut outcome = StrategyOutcome::new(name);

    if let Err(e) = request.validate().and_then(|_| check_stop_limit_prices(request)) {
        error!(strategy = name, error = %e, "precondition failed, nothing submitted");
        outcome.note_error(ErrorKind::InvalidRequest);
        outcome.abort();
        return outcome;
    }

    if executor.scheduler().is_cancelled() {
        info!(strategy = name, "cancelled before submission");
        outcome.cancel();
        return outcome;
    }

    match executor.execute(request).await {
        Ok(result) => {
            info!(
                strategy = name,
                order_id = %result.order.exchange_order_id,
                status = %result.order.status,
                attempts = result.attempts,
                elapsed_ms = result.elapsed_ms,
                "order placed"
            );
            outcome.record_success();
        }
        Err(e) => {
            error!(strategy = name, kind = %e.kind, attempts = e.attempts, "order failed: {}", e.source);
            outcome.record_failure(e.kind);
            if e.cancelled {
                outcome.cancel();
            }
            outcome.abort();
        }
    }

    outcome
}
