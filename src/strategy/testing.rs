//! Scripted gateway for strategy tests.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tokio::time::Instant;

use crate::domain::{OrderRequest, OrderResult, OrderStatus, SymbolFilters};
use crate::error::{BotError, ErrorKind, Result};
use crate::exchange::{ExchangeGateway, ExchangeKind};

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Accept(OrderStatus),
    Fail(ErrorKind),
}

pub fn error_of(kind: ErrorKind) -> BotError {
    match kind {
        ErrorKind::InvalidRequest => BotError::InvalidRequest("scripted".to_string()),
        ErrorKind::Transient => BotError::Transient("scripted timeout".to_string()),
        ErrorKind::Rejected => BotError::Rejected {
            code: -2019,
            message: "scripted rejection".to_string(),
        },
        ErrorKind::Fatal => BotError::Auth("scripted bad key".to_string()),
    }
}

pub struct ScriptedGateway {
    replies: Mutex<VecDeque<Reply>>,
    default_reply: Reply,
    prices: Mutex<VecDeque<std::result::Result<Decimal, ErrorKind>>>,
    last_price: Mutex<Decimal>,
    statuses: Mutex<HashMap<String, VecDeque<OrderStatus>>>,
    submitted: Mutex<Vec<(Instant, OrderRequest)>>,
    cancelled: Mutex<Vec<String>>,
    filters: Option<SymbolFilters>,
    next_id: AtomicU64,
}

impl ScriptedGateway {
    pub fn new(default_reply: Reply) -> Self {
        Self {
            replies: Mutex::new(VecDeque::new()),
            default_reply,
            prices: Mutex::new(VecDeque::new()),
            last_price: Mutex::new(Decimal::ZERO),
            statuses: Mutex::new(HashMap::new()),
            submitted: Mutex::new(Vec::new()),
            cancelled: Mutex::new(Vec::new()),
            filters: None,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn accepting() -> Self {
        Self::new(Reply::Accept(OrderStatus::Submitted))
    }

    pub fn with_replies(self, replies: impl IntoIterator<Item = Reply>) -> Self {
        self.replies.lock().unwrap().extend(replies);
        self
    }

    pub fn with_prices(self, prices: impl IntoIterator<Item = Decimal>) -> Self {
        self.prices.lock().unwrap().extend(prices.into_iter().map(Ok));
        self
    }

    /// Publish exchange rules; other symbols become unknown
    pub fn with_filters(mut self, filters: SymbolFilters) -> Self {
        self.filters = Some(filters);
        self
    }

    pub fn push_price_error(&self, kind: ErrorKind) {
        self.prices.lock().unwrap().push_back(Err(kind));
    }

    pub fn script_status(&self, order_id: &str, statuses: impl IntoIterator<Item = OrderStatus>) {
        self.statuses
            .lock()
            .unwrap()
            .entry(order_id.to_string())
            .or_default()
            .extend(statuses);
    }

    pub fn submitted(&self) -> Vec<OrderRequest> {
        self.submitted.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    pub fn submission_times(&self) -> Vec<Instant> {
        self.submitted.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }

    pub fn cancelled(&self) -> Vec<String> {
        self.cancelled.lock().unwrap().clone()
    }
}

#[async_trait]
impl ExchangeGateway for ScriptedGateway {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Paper
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        self.submitted
            .lock()
            .unwrap()
            .push((Instant::now(), request.clone()));

        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(self.default_reply);

        match reply {
            Reply::Accept(status) => {
                let id = self.next_id.fetch_add(1, Ordering::SeqCst);
                Ok(OrderResult {
                    request: request.clone(),
                    exchange_order_id: id.to_string(),
                    client_order_id: format!("cid-{id}"),
                    status,
                    raw_response: serde_json::json!({ "orderId": id }),
                })
            }
            Reply::Fail(kind) => Err(error_of(kind)),
        }
    }

    async fn get_order_status(&self, _symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let mut statuses = self.statuses.lock().unwrap();
        let queue = statuses.entry(order_id.to_string()).or_default();
        let status = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().copied()
        };
        Ok(status.unwrap_or(OrderStatus::Submitted))
    }

    async fn get_price(&self, _symbol: &str) -> Result<Decimal> {
        let next = self.prices.lock().unwrap().pop_front();
        match next {
            Some(Ok(price)) => {
                *self.last_price.lock().unwrap() = price;
                Ok(price)
            }
            Some(Err(kind)) => Err(error_of(kind)),
            None => Ok(*self.last_price.lock().unwrap()),
        }
    }

    async fn cancel_order(&self, _symbol: &str, order_id: &str) -> Result<()> {
        self.cancelled.lock().unwrap().push(order_id.to_string());
        Ok(())
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<Option<SymbolFilters>> {
        match &self.filters {
            Some(f) if f.symbol == symbol => Ok(Some(f.clone())),
            Some(_) => Err(BotError::InvalidRequest(format!("unknown symbol {symbol}"))),
            None => Ok(None),
        }
    }
}
