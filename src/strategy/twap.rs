//! Time-weighted execution: split a parent order into equal market chunks
//! spaced by a fixed interval.

use std::time::Duration;
use tracing::{error, info, warn};

use super::OrderExecutor;
use crate::coordination::WaitOutcome;
use crate::domain::{OrderRequest, StrategyOutcome, TwapPlan};
use crate::error::ErrorKind;

pub const STRATEGY_NAME: &str = "TWAP";

/// Runs one TWAP plan. Chunk position and the consecutive failure counter
/// live here and nowhere else.
pub struct TwapRunner<'a> {
    executor: &'a OrderExecutor,
    plan: TwapPlan,
    max_consecutive_failures: u32,
    chunk_index: u32,
    consecutive_failures: u32,
}

impl<'a> TwapRunner<'a> {
    pub fn new(executor: &'a OrderExecutor, plan: TwapPlan, max_consecutive_failures: u32) -> Self {
        Self {
            executor,
            plan,
            max_consecutive_failures: max_consecutive_failures.max(1),
            chunk_index: 0,
            consecutive_failures: 0,
        }
    }

    pub async fn run(mut self) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::new(STRATEGY_NAME);
        let quantities = self.plan.chunk_quantities();
        let interval = Duration::from_secs(self.plan.interval_seconds);
        let chunk_count = self.plan.chunk_count;

        info!(
            symbol = %self.plan.symbol,
            side = %self.plan.side,
            total = %self.plan.total_quantity,
            chunks = chunk_count,
            interval_secs = self.plan.interval_seconds,
            "TWAP started"
        );

        while self.chunk_index < chunk_count {
            if self.executor.scheduler().is_cancelled() {
                info!(chunk = self.chunk_index + 1, "TWAP cancelled");
                outcome.cancel();
                break;
            }

            let quantity = quantities[self.chunk_index as usize];
            let request = OrderRequest::market(&self.plan.symbol, self.plan.side, quantity);
            info!(
                chunk = self.chunk_index + 1,
                of = chunk_count,
                quantity = %quantity,
                "chunk start"
            );

            match self.executor.execute(&request).await {
                Ok(result) => {
                    self.consecutive_failures = 0;
                    outcome.record_success();
                    info!(
                        chunk = self.chunk_index + 1,
                        order_id = %result.order.exchange_order_id,
                        status = %result.order.status,
                        "chunk done"
                    );
                }
                Err(e) => {
                    outcome.record_failure(e.kind);
                    if e.cancelled {
                        info!(chunk = self.chunk_index + 1, "TWAP cancelled during retry");
                        outcome.cancel();
                        break;
                    }

                    match e.kind {
                        ErrorKind::Fatal | ErrorKind::InvalidRequest => {
                            error!(chunk = self.chunk_index + 1, kind = %e.kind, "TWAP aborted: {}", e.source);
                            outcome.abort();
                            break;
                        }
                        ErrorKind::Rejected | ErrorKind::Transient => {
                            self.consecutive_failures += 1;
                            warn!(
                                chunk = self.chunk_index + 1,
                                kind = %e.kind,
                                consecutive = self.consecutive_failures,
                                "chunk failed: {}",
                                e.source
                            );
                            if self.consecutive_failures >= self.max_consecutive_failures {
                                error!(
                                    consecutive = self.consecutive_failures,
                                    "TWAP aborted after consecutive chunk failures"
                                );
                                outcome.abort();
                                break;
                            }
                        }
                    }
                }
            }

            self.chunk_index += 1;

            if self.chunk_index < chunk_count
                && self.executor.scheduler().wait(interval).await == WaitOutcome::Cancelled
            {
                info!(next_chunk = self.chunk_index + 1, "TWAP cancelled while waiting");
                outcome.cancel();
                break;
            }
        }

        info!(
            succeeded = outcome.steps_succeeded,
            attempted = outcome.steps_attempted,
            aborted = outcome.aborted,
            "TWAP finished"
        );
        outcome
    }
}
