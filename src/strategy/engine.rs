use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, warn};

use super::grid::GridRunner;
use super::oco::OcoRunner;
use super::single::run_single;
use super::twap::TwapRunner;
use super::{OrderExecutor, OrderSubmitter};
use crate::config::AppConfig;
use crate::coordination::Scheduler;
use crate::domain::{
    GridPlan, OcoPlan, OrderRequest, OrderSide, StrategyOutcome, SymbolFilters, TwapPlan,
};
use crate::error::{ErrorKind, Result};
use crate::exchange::ExchangeGateway;

/// A strategy request, one variant per supported strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Strategy {
    Market {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
    },
    Limit {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        price: Decimal,
    },
    StopLimit {
        symbol: String,
        side: OrderSide,
        quantity: Decimal,
        stop_price: Decimal,
        limit_price: Decimal,
    },
    Twap(TwapPlan),
    Grid(GridPlan),
    Oco(OcoPlan),
}

impl Strategy {
    pub fn name(&self) -> &'static str {
        match self {
            Strategy::Market { .. } => "MARKET",
            Strategy::Limit { .. } => "LIMIT",
            Strategy::StopLimit { .. } => "STOP_LIMIT",
            Strategy::Twap(_) => super::twap::STRATEGY_NAME,
            Strategy::Grid(_) => super::grid::STRATEGY_NAME,
            Strategy::Oco(_) => super::oco::STRATEGY_NAME,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            Strategy::Market { symbol, .. }
            | Strategy::Limit { symbol, .. }
            | Strategy::StopLimit { symbol, .. } => symbol,
            Strategy::Twap(plan) => &plan.symbol,
            Strategy::Grid(plan) => &plan.symbol,
            Strategy::Oco(plan) => &plan.symbol,
        }
    }

    /// The order a single-shot strategy submits
    fn single_request(&self) -> Option<OrderRequest> {
        match self {
            Strategy::Market {
                symbol,
                side,
                quantity,
            } => Some(OrderRequest::market(symbol, *side, *quantity)),
            Strategy::Limit {
                symbol,
                side,
                quantity,
                price,
            } => Some(OrderRequest::limit(symbol, *side, *quantity, *price)),
            Strategy::StopLimit {
                symbol,
                side,
                quantity,
                stop_price,
                limit_price,
            } => Some(OrderRequest::stop_limit(
                symbol,
                *side,
                *quantity,
                *stop_price,
                *limit_price,
            )),
            _ => None,
        }
    }

    /// Fit the plan to the symbol's exchange rules. Grid levels snap to the
    /// tick size and TWAP chunks to the lot step.
    fn fit_to(self, filters: &SymbolFilters) -> Result<Self> {
        match self {
            Strategy::Twap(plan) => Ok(Strategy::Twap(plan.with_filters(filters)?)),
            Strategy::Grid(plan) if filters.tick_size > Decimal::ZERO => {
                Ok(Strategy::Grid(plan.with_tick_size(filters.tick_size)?))
            }
            other => Ok(other),
        }
    }

    /// Quantity of each market order this strategy sends, for the notional
    /// check against the current price
    fn market_quantity(&self) -> Option<Decimal> {
        match self {
            Strategy::Market { quantity, .. } => Some(*quantity),
            Strategy::Twap(plan) => plan.chunk_quantities().into_iter().min(),
            _ => None,
        }
    }
}

/// Runs one strategy at a time against a shared gateway.
///
/// All per-run state (TWAP counters, grid occupancy, OCO legs) is created
/// fresh inside [`StrategyEngine::run`] and dropped when it returns.
pub struct StrategyEngine {
    executor: OrderExecutor,
    max_consecutive_failures: u32,
}

impl StrategyEngine {
    pub fn new(gateway: Arc<dyn ExchangeGateway>, config: &AppConfig, scheduler: Scheduler) -> Self {
        let executor = OrderExecutor::new(
            OrderSubmitter::new(gateway),
            config.execution.clone(),
            scheduler,
        );
        Self {
            executor,
            max_consecutive_failures: config.twap.max_consecutive_failures,
        }
    }

    pub fn executor(&self) -> &OrderExecutor {
        &self.executor
    }

    pub async fn run(&self, strategy: Strategy) -> StrategyOutcome {
        let name = strategy.name();
        info!(
            strategy = name,
            symbol = strategy.symbol(),
            gateway = %self.executor.submitter().gateway().kind(),
            "strategy starting"
        );

        let (strategy, executor) = match self.prepare(strategy).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!(strategy = name, kind = %e.kind(), "strategy not started: {}", e);
                let mut outcome = StrategyOutcome::new(name);
                outcome.note_error(e.kind());
                outcome.abort();
                return outcome;
            }
        };

        let outcome = match strategy {
            Strategy::Twap(plan) => {
                TwapRunner::new(&executor, plan, self.max_consecutive_failures)
                    .run()
                    .await
            }
            Strategy::Grid(plan) => GridRunner::new(&executor, plan).run().await,
            Strategy::Oco(plan) => OcoRunner::new(&executor, plan).run().await,
            single => match single.single_request() {
                Some(request) => run_single(&executor, &request).await,
                None => {
                    let mut outcome = StrategyOutcome::new(name);
                    outcome.note_error(ErrorKind::InvalidRequest);
                    outcome.abort();
                    outcome
                }
            },
        };

        if outcome.exit_code() == 0 {
            info!(strategy = name, %outcome, "strategy finished");
        } else {
            error!(strategy = name, %outcome, "strategy failed");
        }
        outcome
    }

    /// Look up the symbol's exchange rules and fit the strategy to them.
    /// Gateways without exchange metadata run the strategy unchanged.
    async fn prepare(&self, strategy: Strategy) -> Result<(Strategy, OrderExecutor)> {
        let gateway = self.executor.submitter().gateway();
        let filters = match gateway.symbol_filters(strategy.symbol()).await {
            Ok(filters) => filters,
            Err(e) if e.kind() == ErrorKind::Transient => {
                warn!(symbol = strategy.symbol(), "exchange rules unavailable, continuing without them: {}", e);
                None
            }
            Err(e) => return Err(e),
        };

        let Some(filters) = filters else {
            return Ok((strategy, self.executor.clone()));
        };

        info!(
            symbol = %filters.symbol,
            tick_size = %filters.tick_size,
            step_size = %filters.step_size,
            min_qty = %filters.min_qty,
            min_notional = %filters.min_notional,
            "exchange rules loaded"
        );

        let strategy = strategy.fit_to(&filters)?;
        if let Some(quantity) = strategy.market_quantity() {
            match gateway.get_price(&filters.symbol).await {
                Ok(price) => filters.check_notional(quantity, price)?,
                Err(e) => warn!(symbol = %filters.symbol, "notional not checked, price unavailable: {}", e),
            }
        }

        Ok((strategy, self.executor.with_filters(Some(filters))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::domain::{OrderStatus, OrderType};
    use crate::strategy::testing::{Reply, ScriptedGateway};
    use rust_decimal_macros::dec;

    fn engine(gateway: Arc<ScriptedGateway>) -> StrategyEngine {
        let mut config = AppConfig::default_config(true);
        config.execution.retry_backoff_ms = 10;
        StrategyEngine::new(gateway, &config, Scheduler::detached())
    }

    #[tokio::test]
    async fn dispatches_single_shot_variants() {
        let gateway = Arc::new(ScriptedGateway::accepting());
        let engine = engine(gateway.clone());

        let outcome = engine
            .run(Strategy::StopLimit {
                symbol: "BTCUSDT".into(),
                side: OrderSide::Buy,
                quantity: dec!(0.01),
                stop_price: dec!(60000),
                limit_price: dec!(60100),
            })
            .await;

        assert_eq!(outcome.strategy_name, "STOP_LIMIT");
        assert_eq!(outcome.steps_succeeded, 1);
        let submitted = gateway.submitted();
        assert_eq!(submitted[0].order_type, OrderType::StopLimit);
        assert_eq!(submitted[0].stop_price, Some(dec!(60000)));
        assert_eq!(submitted[0].price, Some(dec!(60100)));
    }

    #[tokio::test(start_paused = true)]
    async fn runs_do_not_share_state() {
        let gateway = Arc::new(
            ScriptedGateway::new(Reply::Accept(OrderStatus::Filled))
                .with_replies([Reply::Fail(ErrorKind::Rejected), Reply::Fail(ErrorKind::Rejected)]),
        );
        let engine = engine(gateway.clone());
        let plan = TwapPlan::new("BTCUSDT", OrderSide::Buy, dec!(0.2), 2, 0).unwrap();

        let first = engine.run(Strategy::Twap(plan.clone())).await;
        assert_eq!(first.steps_succeeded, 0);
        assert!(!first.aborted);

        // A leftover failure counter would abort this run on its first chunk
        let second = engine.run(Strategy::Twap(plan)).await;
        assert_eq!(second.steps_succeeded, 2);
        assert_eq!(second.first_error, None);
    }

    fn doge_rules() -> SymbolFilters {
        SymbolFilters {
            symbol: "DOGEUSDT".to_string(),
            tick_size: dec!(0.00001),
            min_price: dec!(0.00244),
            max_price: dec!(30),
            step_size: dec!(1),
            min_qty: dec!(1),
            max_qty: dec!(50000000),
            min_notional: dec!(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn grid_levels_follow_the_exchange_tick() {
        let gateway = Arc::new(
            ScriptedGateway::accepting()
                .with_prices([dec!(0.08)])
                .with_filters(doge_rules()),
        );
        let engine = engine(gateway.clone());
        // Would collapse to three prices at the default 2 dp
        let plan = GridPlan::new("DOGEUSDT", dec!(0.07), dec!(0.09), 10, dec!(100), 60)
            .unwrap()
            .with_max_cycles(Some(1));

        let outcome = engine.run(Strategy::Grid(plan)).await;

        assert!(!outcome.aborted);
        assert_eq!(outcome.steps_succeeded, 10);
        let prices: Vec<_> = gateway.submitted().iter().filter_map(|r| r.price).collect();
        assert!(prices.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn market_order_below_min_notional_is_not_sent() {
        let gateway = Arc::new(
            ScriptedGateway::accepting()
                .with_prices([dec!(0.08)])
                .with_filters(doge_rules()),
        );
        let engine = engine(gateway.clone());

        // 50 DOGE at 0.08 is 4 USDT, under the 5 USDT minimum
        let outcome = engine
            .run(Strategy::Market {
                symbol: "DOGEUSDT".into(),
                side: OrderSide::Buy,
                quantity: dec!(50),
            })
            .await;

        assert!(outcome.aborted);
        assert_eq!(outcome.first_error, Some(ErrorKind::InvalidRequest));
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn twap_off_the_lot_step_is_not_started() {
        let gateway = Arc::new(
            ScriptedGateway::accepting()
                .with_prices([dec!(0.08)])
                .with_filters(doge_rules()),
        );
        let engine = engine(gateway.clone());
        let plan = TwapPlan::new("DOGEUSDT", OrderSide::Sell, dec!(1000.5), 4, 0).unwrap();

        let outcome = engine.run(Strategy::Twap(plan)).await;

        assert!(outcome.aborted);
        assert_eq!(outcome.steps_attempted, 0);
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn twap_chunks_use_the_exchange_lot_step() {
        let gateway = Arc::new(
            ScriptedGateway::accepting()
                .with_prices([dec!(0.08)])
                .with_filters(doge_rules()),
        );
        let engine = engine(gateway.clone());
        let plan = TwapPlan::new("DOGEUSDT", OrderSide::Sell, dec!(1000), 3, 0).unwrap();

        let outcome = engine.run(Strategy::Twap(plan)).await;

        assert_eq!(outcome.steps_succeeded, 3);
        let quantities: Vec<_> = gateway.submitted().iter().map(|r| r.quantity).collect();
        assert_eq!(quantities, vec![dec!(333), dec!(333), dec!(334)]);
    }

    #[tokio::test]
    async fn unknown_symbol_aborts_before_any_order() {
        let gateway = Arc::new(ScriptedGateway::accepting().with_filters(doge_rules()));
        let engine = engine(gateway.clone());

        let outcome = engine
            .run(Strategy::Limit {
                symbol: "NOPEUSDT".into(),
                side: OrderSide::Buy,
                quantity: dec!(1),
                price: dec!(1),
            })
            .await;

        assert!(outcome.aborted);
        assert_eq!(outcome.first_error, Some(ErrorKind::InvalidRequest));
        assert!(gateway.submitted().is_empty());
    }

    #[test]
    fn strategy_names_and_serde_tag() {
        let s = Strategy::Market {
            symbol: "ETHUSDT".into(),
            side: OrderSide::Sell,
            quantity: dec!(1),
        };
        assert_eq!(s.name(), "MARKET");
        assert_eq!(s.symbol(), "ETHUSDT");
        let json = serde_json::to_value(&s).unwrap();
        assert_eq!(json["strategy"], "MARKET");
    }
}
