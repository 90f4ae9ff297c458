use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, warn};
use uuid::Uuid;

use super::OrderSubmitter;
use crate::config::ExecutionConfig;
use crate::coordination::{Scheduler, WaitOutcome};
use crate::domain::{OrderRequest, OrderResult, SymbolFilters};
use crate::error::{BotError, ErrorKind};

/// Successful step with attempt accounting
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    pub order: OrderResult,
    pub attempts: u8,
    pub elapsed_ms: u64,
}

/// A step that did not produce an order
#[derive(Debug, Error)]
#[error("{kind} after {attempts} attempt(s): {source}")]
pub struct ExecutionError {
    pub kind: ErrorKind,
    pub attempts: u8,
    /// Cancellation arrived while waiting to retry
    pub cancelled: bool,
    #[source]
    pub source: BotError,
}

/// Wraps the submitter with the shared transient-retry policy
#[derive(Clone)]
pub struct OrderExecutor {
    submitter: OrderSubmitter,
    config: ExecutionConfig,
    scheduler: Scheduler,
}

impl OrderExecutor {
    pub fn new(submitter: OrderSubmitter, config: ExecutionConfig, scheduler: Scheduler) -> Self {
        Self {
            submitter,
            config,
            scheduler,
        }
    }

    /// Same policy, with requests also checked against `filters`
    pub fn with_filters(&self, filters: Option<SymbolFilters>) -> Self {
        Self {
            submitter: self.submitter.clone().with_filters(filters),
            config: self.config.clone(),
            scheduler: self.scheduler.clone(),
        }
    }

    pub fn submitter(&self) -> &OrderSubmitter {
        &self.submitter
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Submit with bounded retries on transient failures.
    ///
    /// `max_retries` is the total attempt budget. Non-transient failures
    /// return after the first attempt. Every attempt carries the same
    /// client order id.
    pub async fn execute(&self, request: &OrderRequest) -> Result<ExecutionResult, ExecutionError> {
        let start = Instant::now();
        let max_attempts = self.config.max_retries.max(1);
        let backoff = Duration::from_millis(self.config.retry_backoff_ms);
        let mut attempts = 0;

        let mut request = request.clone();
        if request.client_order_id.is_none() {
            request.client_order_id = Some(Uuid::new_v4().simple().to_string());
        }
        let request = &request;

        loop {
            attempts += 1;

            match self.submitter.submit(request).await {
                Ok(order) => {
                    return Ok(ExecutionResult {
                        order,
                        attempts,
                        elapsed_ms: start.elapsed().as_millis() as u64,
                    });
                }
                Err(e) => {
                    let kind = e.kind();
                    if !e.is_retryable() {
                        return Err(ExecutionError {
                            kind,
                            attempts,
                            cancelled: false,
                            source: e,
                        });
                    }

                    if attempts >= max_attempts {
                        error!(
                            symbol = %request.symbol,
                            attempts,
                            "transient failures exhausted retry budget: {}",
                            e
                        );
                        return Err(ExecutionError {
                            kind,
                            attempts,
                            cancelled: false,
                            source: e,
                        });
                    }

                    warn!(
                        symbol = %request.symbol,
                        client_order_id = ?request.client_order_id,
                        attempt = attempts,
                        max_attempts,
                        backoff_ms = self.config.retry_backoff_ms,
                        "transient failure, retrying: {}",
                        e
                    );

                    if self.scheduler.wait(backoff).await == WaitOutcome::Cancelled {
                        return Err(ExecutionError {
                            kind,
                            attempts,
                            cancelled: true,
                            source: e,
                        });
                    }
                }
            }
        }
    }
}
