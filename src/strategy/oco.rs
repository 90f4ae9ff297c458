//! One-cancels-other exit bracket built from two plain orders.
//!
//! Binance USD-M futures has no native OCO, so the bracket is a take-profit
//! LIMIT plus a STOP_LIMIT on the same closing side, with the engine polling
//! both and cancelling the survivor once one of them completes.

use std::time::Duration;
use tracing::{error, info, warn};

use super::OrderExecutor;
use crate::coordination::WaitOutcome;
use crate::domain::{OcoPlan, OrderRequest, OrderResult, OrderStatus, StrategyOutcome};
use crate::error::ErrorKind;

pub const STRATEGY_NAME: &str = "OCO";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    TakeProfit,
    StopLoss,
}

impl Leg {
    fn as_str(&self) -> &'static str {
        match self {
            Leg::TakeProfit => "take_profit",
            Leg::StopLoss => "stop_loss",
        }
    }
}

pub struct OcoRunner<'a> {
    executor: &'a OrderExecutor,
    plan: OcoPlan,
}

impl<'a> OcoRunner<'a> {
    pub fn new(executor: &'a OrderExecutor, plan: OcoPlan) -> Self {
        Self { executor, plan }
    }

    fn legs(&self) -> (OrderRequest, OrderRequest) {
        let p = &self.plan;
        (
            OrderRequest::limit(&p.symbol, p.side, p.quantity, p.take_profit_price),
            OrderRequest::stop_limit(&p.symbol, p.side, p.quantity, p.stop_price, p.stop_price),
        )
    }

    pub async fn run(self) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::new(STRATEGY_NAME);
        let (tp_request, sl_request) = self.legs();

        info!(
            symbol = %self.plan.symbol,
            side = %self.plan.side,
            quantity = %self.plan.quantity,
            take_profit = %self.plan.take_profit_price,
            stop = %self.plan.stop_price,
            "OCO bracket started"
        );

        let Some(tp) = self.place(Leg::TakeProfit, &tp_request, &mut outcome).await else {
            if !outcome.cancelled {
                outcome.abort();
            }
            return outcome;
        };

        let Some(sl) = self.place(Leg::StopLoss, &sl_request, &mut outcome).await else {
            if outcome.cancelled {
                info!(
                    tp_order = %tp.exchange_order_id,
                    "OCO cancelled before the stop leg was placed, take-profit left resting"
                );
                return outcome;
            }
            warn!(order_id = %tp.exchange_order_id, "stop leg failed, withdrawing take-profit");
            self.cancel_leg(Leg::TakeProfit, &tp, &mut outcome).await;
            outcome.abort();
            return outcome;
        };

        let poll = Duration::from_secs(self.plan.poll_interval_seconds);
        loop {
            if self.executor.scheduler().wait(poll).await == WaitOutcome::Cancelled {
                info!(
                    tp_order = %tp.exchange_order_id,
                    sl_order = %sl.exchange_order_id,
                    "OCO cancelled, both legs left resting"
                );
                outcome.cancel();
                break;
            }

            let Some(tp_status) = self.status(&tp, &mut outcome).await else {
                if outcome.saw_fatal() {
                    outcome.abort();
                    break;
                }
                continue;
            };
            let Some(sl_status) = self.status(&sl, &mut outcome).await else {
                if outcome.saw_fatal() {
                    outcome.abort();
                    break;
                }
                continue;
            };

            match (tp_status, sl_status) {
                (OrderStatus::Filled, _) => {
                    info!(order_id = %tp.exchange_order_id, "take-profit filled");
                    self.cancel_leg(Leg::StopLoss, &sl, &mut outcome).await;
                    break;
                }
                (_, OrderStatus::Filled) => {
                    info!(order_id = %sl.exchange_order_id, "stop filled");
                    self.cancel_leg(Leg::TakeProfit, &tp, &mut outcome).await;
                    break;
                }
                (tp_status, _) if tp_status.is_terminal() => {
                    error!(leg = Leg::TakeProfit.as_str(), status = %tp_status, "leg ended without a fill");
                    self.cancel_leg(Leg::StopLoss, &sl, &mut outcome).await;
                    outcome.abort();
                    break;
                }
                (_, sl_status) if sl_status.is_terminal() => {
                    error!(leg = Leg::StopLoss.as_str(), status = %sl_status, "leg ended without a fill");
                    self.cancel_leg(Leg::TakeProfit, &tp, &mut outcome).await;
                    outcome.abort();
                    break;
                }
                _ => {}
            }
        }

        info!(
            aborted = outcome.aborted,
            cancelled = outcome.cancelled,
            "OCO bracket finished"
        );
        outcome
    }

    async fn place(
        &self,
        leg: Leg,
        request: &OrderRequest,
        outcome: &mut StrategyOutcome,
    ) -> Option<OrderResult> {
        match self.executor.execute(request).await {
            Ok(result) => {
                outcome.record_success();
                info!(
                    leg = leg.as_str(),
                    order_id = %result.order.exchange_order_id,
                    "leg placed"
                );
                Some(result.order)
            }
            Err(e) => {
                outcome.record_failure(e.kind);
                if e.cancelled {
                    outcome.cancel();
                }
                error!(leg = leg.as_str(), kind = %e.kind, "leg failed: {}", e.source);
                None
            }
        }
    }

    async fn status(&self, order: &OrderResult, outcome: &mut StrategyOutcome) -> Option<OrderStatus> {
        let gateway = self.executor.submitter().gateway();
        match gateway
            .get_order_status(&self.plan.symbol, &order.exchange_order_id)
            .await
        {
            Ok(status) => Some(status),
            Err(e) => {
                outcome.note_error(e.kind());
                warn!(order_id = %order.exchange_order_id, kind = %e.kind(), "status poll failed: {}", e);
                None
            }
        }
    }

    async fn cancel_leg(&self, leg: Leg, order: &OrderResult, outcome: &mut StrategyOutcome) {
        let gateway = self.executor.submitter().gateway();
        match gateway
            .cancel_order(&self.plan.symbol, &order.exchange_order_id)
            .await
        {
            Ok(()) => info!(leg = leg.as_str(), order_id = %order.exchange_order_id, "leg cancelled"),
            Err(e) => {
                let kind = e.kind();
                outcome.note_error(kind);
                if kind == ErrorKind::Fatal {
                    error!(leg = leg.as_str(), order_id = %order.exchange_order_id, "cancel failed: {}", e);
                } else {
                    warn!(leg = leg.as_str(), order_id = %order.exchange_order_id, "cancel failed: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExecutionConfig;
    use crate::coordination::{cancellation, Scheduler};
    use crate::domain::{OrderSide, OrderType};
    use crate::strategy::testing::{Reply, ScriptedGateway};
    use crate::strategy::OrderSubmitter;
    use rust_decimal_macros::dec;
    use std::sync::Arc;

    fn executor(gateway: Arc<ScriptedGateway>, scheduler: Scheduler) -> OrderExecutor {
        OrderExecutor::new(
            OrderSubmitter::new(gateway),
            ExecutionConfig {
                max_retries: 1,
                retry_backoff_ms: 0,
            },
            scheduler,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_while_stop_leg_backs_off_keeps_take_profit() {
        let (handle, scheduler) = cancellation();
        let gateway = Arc::new(ScriptedGateway::accepting().with_replies([
            Reply::Accept(OrderStatus::Submitted),
            Reply::Fail(ErrorKind::Transient),
        ]));
        let exec = OrderExecutor::new(
            OrderSubmitter::new(gateway.clone()),
            ExecutionConfig {
                max_retries: 3,
                retry_backoff_ms: 10_000,
            },
            scheduler,
        );

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });
        let outcome = OcoRunner::new(&exec, plan()).run().await;
        canceller.await.unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.aborted);
        assert!(gateway.cancelled().is_empty());
        assert_eq!(gateway.submitted().len(), 2);
        assert_eq!(outcome.exit_code(), 0);
    }

    fn plan() -> OcoPlan {
        OcoPlan::new("BTCUSDT", OrderSide::Sell, dec!(0.01), dec!(65000), dec!(58000), 5).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn filled_take_profit_cancels_the_stop() {
        let gateway = Arc::new(ScriptedGateway::accepting());
        gateway.script_status("1", [OrderStatus::Submitted, OrderStatus::Filled]);
        let exec = executor(gateway.clone(), Scheduler::detached());

        let outcome = OcoRunner::new(&exec, plan()).run().await;

        let submitted = gateway.submitted();
        assert_eq!(submitted.len(), 2);
        assert_eq!(submitted[0].order_type, OrderType::Limit);
        assert_eq!(submitted[0].price, Some(dec!(65000)));
        assert_eq!(submitted[1].order_type, OrderType::StopLimit);
        assert_eq!(submitted[1].stop_price, Some(dec!(58000)));

        assert_eq!(gateway.cancelled(), vec!["2".to_string()]);
        assert_eq!(outcome.steps_succeeded, 2);
        assert!(!outcome.aborted);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn filled_stop_cancels_the_take_profit() {
        let gateway = Arc::new(ScriptedGateway::accepting());
        gateway.script_status("2", [OrderStatus::Filled]);
        let exec = executor(gateway.clone(), Scheduler::detached());

        let outcome = OcoRunner::new(&exec, plan()).run().await;

        assert_eq!(gateway.cancelled(), vec!["1".to_string()]);
        assert!(!outcome.aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_stop_leg_withdraws_take_profit() {
        let gateway = Arc::new(ScriptedGateway::accepting().with_replies([
            Reply::Accept(OrderStatus::Submitted),
            Reply::Fail(ErrorKind::Rejected),
        ]));
        let exec = executor(gateway.clone(), Scheduler::detached());

        let outcome = OcoRunner::new(&exec, plan()).run().await;

        assert_eq!(gateway.cancelled(), vec!["1".to_string()]);
        assert!(outcome.aborted);
        assert_eq!(outcome.steps_attempted, 2);
        assert_eq!(outcome.steps_succeeded, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn externally_cancelled_leg_aborts_the_bracket() {
        let gateway = Arc::new(ScriptedGateway::accepting());
        gateway.script_status("2", [OrderStatus::Expired]);
        let exec = executor(gateway.clone(), Scheduler::detached());

        let outcome = OcoRunner::new(&exec, plan()).run().await;

        assert_eq!(gateway.cancelled(), vec!["1".to_string()]);
        assert!(outcome.aborted);
    }

    #[tokio::test(start_paused = true)]
    async fn operator_cancel_leaves_legs_resting() {
        let (handle, scheduler) = cancellation();
        let gateway = Arc::new(ScriptedGateway::accepting());
        let exec = executor(gateway.clone(), scheduler);

        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(12)).await;
            handle.cancel();
        });
        let outcome = OcoRunner::new(&exec, plan()).run().await;
        canceller.await.unwrap();

        assert!(outcome.cancelled);
        assert!(gateway.cancelled().is_empty());
        assert_eq!(outcome.exit_code(), 0);
    }
}
