//! Grid trading over a fixed ladder of price levels.
//!
//! Every cycle reads the mark price, frees levels whose resting order the
//! market has crossed, then places a limit order on every free level: buys
//! at or below the market, sells above it. Occupancy is a plain field of the
//! runner; there are no fill callbacks.

use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::OrderExecutor;
use crate::coordination::WaitOutcome;
use crate::domain::{GridLevel, GridPlan, LevelState, OrderRequest, OrderSide, StrategyOutcome};
use crate::error::ErrorKind;

pub const STRATEGY_NAME: &str = "GRID";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleResult {
    Continue,
    Cancelled,
    Aborted,
}

pub struct GridRunner<'a> {
    executor: &'a OrderExecutor,
    plan: GridPlan,
    levels: Vec<GridLevel>,
    cycles: u64,
}

impl<'a> GridRunner<'a> {
    pub fn new(executor: &'a OrderExecutor, plan: GridPlan) -> Self {
        let levels = plan.build_levels();
        Self {
            executor,
            plan,
            levels,
            cycles: 0,
        }
    }

    pub fn levels(&self) -> &[GridLevel] {
        &self.levels
    }

    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub async fn run(&mut self) -> StrategyOutcome {
        let mut outcome = StrategyOutcome::new(STRATEGY_NAME);
        let poll = Duration::from_secs(self.plan.poll_interval_seconds);

        if let Err(e) = self.plan.validate_levels() {
            error!(symbol = %self.plan.symbol, "grid not started: {}", e);
            outcome.note_error(e.kind());
            outcome.abort();
            return outcome;
        }

        info!(
            symbol = %self.plan.symbol,
            lower = %self.plan.lower_price,
            upper = %self.plan.upper_price,
            levels = self.levels.len(),
            spacing = %self.plan.spacing(),
            tick_size = ?self.plan.tick_size,
            qty_per_level = %self.plan.quantity_per_level,
            max_cycles = ?self.plan.max_cycles,
            "grid started"
        );

        loop {
            if self.executor.scheduler().is_cancelled() {
                outcome.cancel();
                break;
            }

            match self.run_cycle(&mut outcome).await {
                CycleResult::Continue => {}
                CycleResult::Cancelled => {
                    outcome.cancel();
                    break;
                }
                CycleResult::Aborted => {
                    outcome.abort();
                    break;
                }
            }
            self.cycles += 1;

            if self.plan.max_cycles.is_some_and(|max| self.cycles >= max) {
                info!(cycles = self.cycles, "grid reached its cycle limit");
                break;
            }

            if self.executor.scheduler().wait(poll).await == WaitOutcome::Cancelled {
                outcome.cancel();
                break;
            }
        }

        let (buys, sells) = self.occupancy();
        info!(
            cycles = self.cycles,
            placed = outcome.steps_succeeded,
            attempted = outcome.steps_attempted,
            buys,
            sells,
            cancelled = outcome.cancelled,
            aborted = outcome.aborted,
            "grid stopped"
        );
        outcome
    }

    /// One poll: read price, re-arm crossed levels, arm empty ones
    pub async fn run_cycle(&mut self, outcome: &mut StrategyOutcome) -> CycleResult {
        let executor = self.executor;
        let price = match executor.submitter().gateway().get_price(&self.plan.symbol).await {
            Ok(price) => price,
            Err(e) => {
                let kind = e.kind();
                outcome.note_error(kind);
                if kind == ErrorKind::Fatal {
                    error!(cycle = self.cycles + 1, "price read failed, stopping grid: {}", e);
                    return CycleResult::Aborted;
                }
                warn!(cycle = self.cycles + 1, kind = %kind, "price read failed, skipping cycle: {}", e);
                return CycleResult::Continue;
            }
        };

        debug!(cycle = self.cycles + 1, price = %price, "grid cycle");

        for level in self.levels.iter_mut().filter(|l| l.crossed_by(price)) {
            info!(
                level = level.index,
                level_price = %level.price,
                from = %level.state,
                price = %price,
                "level re-armed"
            );
            level.state = LevelState::Empty;
        }

        for i in 0..self.levels.len() {
            if self.levels[i].state != LevelState::Empty {
                continue;
            }
            if self.executor.scheduler().is_cancelled() {
                return CycleResult::Cancelled;
            }

            let side = self.levels[i].arming_side(price);
            let request = OrderRequest::limit(
                &self.plan.symbol,
                side,
                self.plan.quantity_per_level,
                self.levels[i].price,
            );

            match self.executor.execute(&request).await {
                Ok(result) => {
                    let level = &mut self.levels[i];
                    level.state = match side {
                        OrderSide::Buy => LevelState::BuyPlaced,
                        OrderSide::Sell => LevelState::SellPlaced,
                    };
                    outcome.record_success();
                    info!(
                        level = level.index,
                        level_price = %level.price,
                        state = %level.state,
                        order_id = %result.order.exchange_order_id,
                        "level armed"
                    );
                }
                Err(e) => {
                    outcome.record_failure(e.kind);
                    if e.cancelled {
                        return CycleResult::Cancelled;
                    }
                    if e.kind == ErrorKind::Fatal {
                        error!(level = i, kind = %e.kind, "grid aborted: {}", e.source);
                        return CycleResult::Aborted;
                    }
                    // A single level never stops the grid unless the error is fatal
                    warn!(
                        level = i,
                        level_price = %self.levels[i].price,
                        side = %side,
                        kind = %e.kind,
                        "level order failed, will retry next cycle: {}",
                        e.source
                    );
                }
            }
        }

        CycleResult::Continue
    }

    fn occupancy(&self) -> (usize, usize) {
        self.levels.iter().fold((0, 0), |(b, s), l| match l.state {
            LevelState::BuyPlaced => (b + 1, s),
            LevelState::SellPlaced => (b, s + 1),
            LevelState::Empty => (b, s),
        })
    }
}
