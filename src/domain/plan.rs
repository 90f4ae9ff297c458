//! Multi-step strategy plans.
//!
//! Plans are built from CLI parameters, validated once, and then consumed by
//! the strategy engine. Nothing here performs I/O.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::{OrderSide, SymbolFilters};
use crate::error::{BotError, Result};

/// Default quantity precision when no exchange step size is configured
pub const DEFAULT_QUANTITY_DP: u32 = 8;

/// Default price precision for grid levels
pub const DEFAULT_PRICE_SCALE: u32 = 2;

/// Time-sliced execution of a large order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TwapPlan {
    pub symbol: String,
    pub side: OrderSide,
    pub total_quantity: Decimal,
    pub chunk_count: u32,
    pub interval_seconds: u64,
    /// Exchange lot step; chunk sizes are rounded down to a multiple of it
    pub quantity_step: Option<Decimal>,
}

impl TwapPlan {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        total_quantity: Decimal,
        chunk_count: u32,
        interval_seconds: u64,
    ) -> Result<Self> {
        Self::with_quantity_step(symbol, side, total_quantity, chunk_count, interval_seconds, None)
    }

    pub fn with_quantity_step(
        symbol: &str,
        side: OrderSide,
        total_quantity: Decimal,
        chunk_count: u32,
        interval_seconds: u64,
        quantity_step: Option<Decimal>,
    ) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(BotError::InvalidRequest("symbol cannot be empty".into()));
        }
        if total_quantity <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "total quantity must be positive, got {total_quantity}"
            )));
        }
        if chunk_count == 0 {
            return Err(BotError::InvalidRequest(
                "chunk count must be at least 1".into(),
            ));
        }
        if let Some(step) = quantity_step {
            if step <= Decimal::ZERO {
                return Err(BotError::InvalidRequest(format!(
                    "quantity step must be positive, got {step}"
                )));
            }
        }

        let plan = Self {
            symbol: symbol.to_string(),
            side,
            total_quantity,
            chunk_count,
            interval_seconds,
            quantity_step,
        };

        if plan.chunk_quantity() <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "total quantity {} is too small to split into {} chunks",
                total_quantity, chunk_count
            )));
        }

        Ok(plan)
    }

    /// Re-size the chunks to the symbol's lot rules. The exchange step
    /// replaces any configured one, and every chunk must pass LOT_SIZE.
    pub fn with_filters(self, filters: &SymbolFilters) -> Result<Self> {
        let step = if filters.step_size > Decimal::ZERO {
            Some(filters.step_size)
        } else {
            self.quantity_step
        };
        let plan = Self::with_quantity_step(
            &self.symbol,
            self.side,
            self.total_quantity,
            self.chunk_count,
            self.interval_seconds,
            step,
        )?;
        for quantity in plan.chunk_quantities() {
            filters.check_quantity(quantity)?;
        }
        Ok(plan)
    }

    /// Size of every chunk except the last
    pub fn chunk_quantity(&self) -> Decimal {
        let raw = self.total_quantity / Decimal::from(self.chunk_count);
        match self.quantity_step {
            Some(step) => (raw / step).floor() * step,
            None => raw.round_dp_with_strategy(DEFAULT_QUANTITY_DP, RoundingStrategy::ToZero),
        }
    }

    /// Quantities for every chunk, in order. The final chunk absorbs the
    /// rounding remainder so the sum equals `total_quantity` exactly.
    pub fn chunk_quantities(&self) -> Vec<Decimal> {
        let chunk = self.chunk_quantity();
        let mut remaining = self.total_quantity;
        let mut out = Vec::with_capacity(self.chunk_count as usize);

        for _ in 1..self.chunk_count {
            out.push(chunk);
            remaining -= chunk;
        }
        out.push(remaining);
        out
    }
}

/// Occupancy of a single grid level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LevelState {
    Empty,
    BuyPlaced,
    SellPlaced,
}

impl std::fmt::Display for LevelState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelState::Empty => write!(f, "EMPTY"),
            LevelState::BuyPlaced => write!(f, "BUY_PLACED"),
            LevelState::SellPlaced => write!(f, "SELL_PLACED"),
        }
    }
}

/// One fixed price point of a grid
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLevel {
    pub index: usize,
    pub price: Decimal,
    pub state: LevelState,
}

impl GridLevel {
    /// Whether the resting order on this level has been crossed by the market
    /// and the level can be armed again.
    pub fn crossed_by(&self, market_price: Decimal) -> bool {
        match self.state {
            LevelState::BuyPlaced => self.price > market_price,
            LevelState::SellPlaced => self.price < market_price,
            LevelState::Empty => false,
        }
    }

    /// Side an empty level arms with at the given market price
    pub fn arming_side(&self, market_price: Decimal) -> OrderSide {
        if self.price <= market_price {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        }
    }
}

/// Continuous grid across a price range
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridPlan {
    pub symbol: String,
    pub lower_price: Decimal,
    pub upper_price: Decimal,
    pub levels: u32,
    pub quantity_per_level: Decimal,
    pub poll_interval_seconds: u64,
    pub price_scale: u32,
    /// Exchange tick; when set, levels snap to it instead of `price_scale`
    pub tick_size: Option<Decimal>,
    /// Stop after this many cycles; `None` runs until cancelled
    pub max_cycles: Option<u64>,
}

impl GridPlan {
    pub fn new(
        symbol: &str,
        lower_price: Decimal,
        upper_price: Decimal,
        levels: u32,
        quantity_per_level: Decimal,
        poll_interval_seconds: u64,
    ) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(BotError::InvalidRequest("symbol cannot be empty".into()));
        }
        if lower_price <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "lower price must be positive, got {lower_price}"
            )));
        }
        if upper_price <= lower_price {
            return Err(BotError::InvalidRequest(format!(
                "upper price {upper_price} must be above lower price {lower_price}"
            )));
        }
        if levels < 2 {
            return Err(BotError::InvalidRequest(format!(
                "grid needs at least 2 levels, got {levels}"
            )));
        }
        if quantity_per_level <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "quantity per level must be positive, got {quantity_per_level}"
            )));
        }
        if poll_interval_seconds == 0 {
            return Err(BotError::InvalidRequest(
                "grid poll interval must be at least 1 second".into(),
            ));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            lower_price,
            upper_price,
            levels,
            quantity_per_level,
            poll_interval_seconds,
            price_scale: DEFAULT_PRICE_SCALE,
            tick_size: None,
            max_cycles: None,
        })
    }

    /// Fallback precision when the exchange tick size is unknown. Not
    /// checked here; see [`GridPlan::validate_levels`].
    pub fn with_price_scale(mut self, price_scale: u32) -> Self {
        self.price_scale = price_scale;
        self
    }

    pub fn with_tick_size(mut self, tick_size: Decimal) -> Result<Self> {
        if tick_size <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "tick size must be positive, got {tick_size}"
            )));
        }
        self.tick_size = Some(tick_size);
        self.validate_levels()?;
        Ok(self)
    }

    pub fn with_max_cycles(mut self, max_cycles: Option<u64>) -> Self {
        self.max_cycles = max_cycles;
        self
    }

    /// Distance between neighbouring levels
    pub fn spacing(&self) -> Decimal {
        (self.upper_price - self.lower_price) / Decimal::from(self.levels - 1)
    }

    /// Build the level set, all EMPTY
    pub fn build_levels(&self) -> Vec<GridLevel> {
        let span = self.upper_price - self.lower_price;
        let last = Decimal::from(self.levels - 1);

        (0..self.levels)
            .map(|i| {
                let raw = if i == self.levels - 1 {
                    self.upper_price
                } else {
                    self.lower_price + span * Decimal::from(i) / last
                };
                GridLevel {
                    index: i as usize,
                    price: self.round_level(raw, i == self.levels - 1),
                    state: LevelState::Empty,
                }
            })
            .collect()
    }

    fn round_level(&self, raw: Decimal, is_top: bool) -> Decimal {
        match self.tick_size {
            Some(tick) => {
                (raw / tick).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero) * tick
            }
            None if is_top => raw,
            None => raw.round_dp_with_strategy(self.price_scale, RoundingStrategy::MidpointAwayFromZero),
        }
    }

    /// Rounded levels must stay positive and strictly increasing. Checked by
    /// `with_tick_size` and again before a grid starts.
    pub fn validate_levels(&self) -> Result<()> {
        let levels = self.build_levels();
        if let Some(first) = levels.first() {
            if first.price <= Decimal::ZERO {
                return Err(BotError::InvalidRequest(format!(
                    "lowest grid level rounds to {}; use a finer price precision",
                    first.price
                )));
            }
        }
        if let Some(pair) = levels.windows(2).find(|w| w[0].price >= w[1].price) {
            return Err(BotError::InvalidRequest(format!(
                "grid levels {} and {} both round to {}; use fewer levels or a finer price precision",
                pair[0].index, pair[1].index, pair[1].price
            )));
        }
        Ok(())
    }
}

/// One-cancels-other exit bracket. `side` is the closing side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcoPlan {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: Decimal,
    pub take_profit_price: Decimal,
    pub stop_price: Decimal,
    pub poll_interval_seconds: u64,
}

impl OcoPlan {
    pub fn new(
        symbol: &str,
        side: OrderSide,
        quantity: Decimal,
        take_profit_price: Decimal,
        stop_price: Decimal,
        poll_interval_seconds: u64,
    ) -> Result<Self> {
        if symbol.trim().is_empty() {
            return Err(BotError::InvalidRequest("symbol cannot be empty".into()));
        }
        if quantity <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(format!(
                "quantity must be positive, got {quantity}"
            )));
        }
        if take_profit_price <= Decimal::ZERO || stop_price <= Decimal::ZERO {
            return Err(BotError::InvalidRequest(
                "take-profit and stop prices must be positive".into(),
            ));
        }

        // Closing a long sells above the market for profit and below it to stop out
        let ordered = match side {
            OrderSide::Sell => take_profit_price > stop_price,
            OrderSide::Buy => take_profit_price < stop_price,
        };
        if !ordered {
            return Err(BotError::InvalidRequest(format!(
                "{side} bracket needs take-profit {} stop ({take_profit_price} vs {stop_price})",
                if side == OrderSide::Sell { "above" } else { "below" }
            )));
        }
        if poll_interval_seconds == 0 {
            return Err(BotError::InvalidRequest(
                "OCO poll interval must be at least 1 second".into(),
            ));
        }

        Ok(Self {
            symbol: symbol.to_string(),
            side,
            quantity,
            take_profit_price,
            stop_price,
            poll_interval_seconds,
        })
    }
}
