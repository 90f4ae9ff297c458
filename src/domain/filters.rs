//! Per-symbol trading rules published by the exchange.
//!
//! Binance reports these in `exchangeInfo` as PRICE_FILTER, LOT_SIZE and
//! MIN_NOTIONAL. A zero bound or step means the rule is disabled.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::OrderRequest;
use crate::error::{BotError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub symbol: String,
    pub tick_size: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub step_size: Decimal,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub min_notional: Decimal,
}

impl SymbolFilters {
    /// Nearest price on the tick grid
    pub fn round_price(&self, price: Decimal) -> Decimal {
        if self.tick_size <= Decimal::ZERO {
            return price;
        }
        (price / self.tick_size).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            * self.tick_size
    }

    pub fn check_quantity(&self, quantity: Decimal) -> Result<()> {
        if self.min_qty > Decimal::ZERO && quantity < self.min_qty {
            return Err(BotError::InvalidRequest(format!(
                "{} quantity {quantity} is below the minimum {}",
                self.symbol, self.min_qty
            )));
        }
        if self.max_qty > Decimal::ZERO && quantity > self.max_qty {
            return Err(BotError::InvalidRequest(format!(
                "{} quantity {quantity} is above the maximum {}",
                self.symbol, self.max_qty
            )));
        }
        if self.step_size > Decimal::ZERO && !((quantity - self.min_qty) % self.step_size).is_zero() {
            return Err(BotError::InvalidRequest(format!(
                "{} quantity {quantity} is not a multiple of step {}",
                self.symbol, self.step_size
            )));
        }
        Ok(())
    }

    pub fn check_price(&self, price: Decimal) -> Result<()> {
        if self.min_price > Decimal::ZERO && price < self.min_price {
            return Err(BotError::InvalidRequest(format!(
                "{} price {price} is below the minimum {}",
                self.symbol, self.min_price
            )));
        }
        if self.max_price > Decimal::ZERO && price > self.max_price {
            return Err(BotError::InvalidRequest(format!(
                "{} price {price} is above the maximum {}",
                self.symbol, self.max_price
            )));
        }
        if self.tick_size > Decimal::ZERO && !((price - self.min_price) % self.tick_size).is_zero() {
            return Err(BotError::InvalidRequest(format!(
                "{} price {price} is not on tick {}",
                self.symbol, self.tick_size
            )));
        }
        Ok(())
    }

    pub fn check_notional(&self, quantity: Decimal, price: Decimal) -> Result<()> {
        self.check_min_notional(quantity * price)
    }

    fn check_min_notional(&self, notional: Decimal) -> Result<()> {
        if self.min_notional > Decimal::ZERO && notional < self.min_notional {
            return Err(BotError::InvalidRequest(format!(
                "{} notional {notional} is below the minimum {}",
                self.symbol, self.min_notional
            )));
        }
        Ok(())
    }

    /// Check a request against every rule it carries enough data for.
    /// Market orders have no price, so their notional is checked by the
    /// caller against a reference price.
    pub fn check(&self, request: &OrderRequest) -> Result<()> {
        if request.symbol != self.symbol {
            return Ok(());
        }
        self.check_quantity(request.quantity)?;
        if let Some(price) = request.price {
            self.check_price(price)?;
        }
        if let Some(stop) = request.stop_price {
            self.check_price(stop)?;
        }
        match request.notional() {
            Some(notional) => self.check_min_notional(notional),
            None => Ok(()),
        }
    }
}
