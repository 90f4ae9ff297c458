//! Binance USD-M futures REST adapter.
//!
//! Signed endpoints carry `X-MBX-APIKEY` plus a hex HMAC-SHA256 signature of
//! the full query string. Exchange error bodies (`{"code":..,"msg":..}`) are
//! mapped onto `BotError` so strategies only ever see the four error kinds.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::domain::{OrderRequest, OrderResult, OrderStatus, OrderType, SymbolFilters};
use crate::error::{BotError, Result};
use crate::exchange::{ExchangeGateway, ExchangeKind};
use crate::signing::{ApiCredentials, HmacAuth};

const ORDER_PATH: &str = "/fapi/v1/order";
const TICKER_PRICE_PATH: &str = "/fapi/v1/ticker/price";
const PING_PATH: &str = "/fapi/v1/ping";
const TIME_PATH: &str = "/fapi/v1/time";
const EXCHANGE_INFO_PATH: &str = "/fapi/v1/exchangeInfo";
const BALANCE_PATH: &str = "/fapi/v2/balance";

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderAck {
    order_id: i64,
    #[serde(default)]
    client_order_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct TickerPrice {
    price: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServerTime {
    server_time: i64,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    filters: Vec<RawFilter>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "filterType")]
enum RawFilter {
    #[serde(rename = "PRICE_FILTER", rename_all = "camelCase")]
    Price {
        tick_size: Decimal,
        min_price: Decimal,
        max_price: Decimal,
    },
    #[serde(rename = "LOT_SIZE", rename_all = "camelCase")]
    LotSize {
        step_size: Decimal,
        min_qty: Decimal,
        max_qty: Decimal,
    },
    #[serde(rename = "MIN_NOTIONAL")]
    MinNotional { notional: Decimal },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AssetBalance {
    asset: String,
    #[serde(default)]
    available_balance: Option<Decimal>,
}

#[derive(Clone)]
pub struct BinanceFuturesClient {
    http: Client,
    base_url: String,
    auth: Option<HmacAuth>,
    recv_window_ms: u64,
}

impl BinanceFuturesClient {
    pub fn new(
        base_url: &str,
        credentials: Option<ApiCredentials>,
        recv_window_ms: u64,
        request_timeout_ms: u64,
    ) -> Result<Self> {
        let http = Client::builder()
            .user_agent("futures-bot/0.1")
            .timeout(Duration::from_millis(request_timeout_ms))
            .build()
            .map_err(|e| BotError::Fatal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth: credentials.map(|c| HmacAuth::new(c, recv_window_ms)),
            recv_window_ms,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Exchange clock in epoch milliseconds
    pub async fn server_time(&self) -> Result<i64> {
        let raw = self.send(Method::GET, TIME_PATH, &[], false).await?;
        let time: ServerTime = serde_json::from_value(raw)?;
        Ok(time.server_time)
    }

    /// Pull one symbol's PRICE_FILTER, LOT_SIZE and MIN_NOTIONAL out of an
    /// `exchangeInfo` body
    pub fn parse_symbol_filters(raw: Value, symbol: &str) -> Result<SymbolFilters> {
        let info: ExchangeInfo = serde_json::from_value(raw)?;
        let entry = info
            .symbols
            .into_iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| BotError::InvalidRequest(format!("unknown symbol {symbol}")))?;

        if !entry.status.is_empty() && entry.status != "TRADING" {
            return Err(BotError::InvalidRequest(format!(
                "{symbol} is not trading (status {})",
                entry.status
            )));
        }

        let mut filters = SymbolFilters {
            symbol: entry.symbol,
            tick_size: Decimal::ZERO,
            min_price: Decimal::ZERO,
            max_price: Decimal::ZERO,
            step_size: Decimal::ZERO,
            min_qty: Decimal::ZERO,
            max_qty: Decimal::ZERO,
            min_notional: Decimal::ZERO,
        };
        for filter in entry.filters {
            match filter {
                RawFilter::Price {
                    tick_size,
                    min_price,
                    max_price,
                } => {
                    filters.tick_size = tick_size;
                    filters.min_price = min_price;
                    filters.max_price = max_price;
                }
                RawFilter::LotSize {
                    step_size,
                    min_qty,
                    max_qty,
                } => {
                    filters.step_size = step_size;
                    filters.min_qty = min_qty;
                    filters.max_qty = max_qty;
                }
                RawFilter::MinNotional { notional } => filters.min_notional = notional,
                RawFilter::Other => {}
            }
        }
        Ok(filters)
    }

    fn encode_params(params: &[(&str, String)]) -> String {
        params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }

    /// Query parameters for a new order
    fn order_params(request: &OrderRequest, client_order_id: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("symbol", request.symbol.clone()),
            ("side", request.side.as_str().to_string()),
        ];

        let exchange_type = match request.order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
            // Futures stop-limit is type STOP with price + stopPrice
            OrderType::StopLimit => "STOP",
        };
        params.push(("type", exchange_type.to_string()));
        params.push(("quantity", request.quantity.normalize().to_string()));

        if let Some(price) = request.price {
            params.push(("price", price.normalize().to_string()));
        }
        if let Some(stop) = request.stop_price {
            params.push(("stopPrice", stop.normalize().to_string()));
        }
        if request.order_type != OrderType::Market {
            params.push(("timeInForce", "GTC".to_string()));
        }
        params.push(("newClientOrderId", client_order_id.to_string()));
        params
    }

    pub fn parse_order_status(raw: &str) -> OrderStatus {
        match raw {
            "NEW" => OrderStatus::Submitted,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Cancelled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" | "EXPIRED_IN_MATCH" => OrderStatus::Expired,
            _ => OrderStatus::Error,
        }
    }

    /// Map a non-success HTTP response onto the error taxonomy
    pub fn classify_failure(status: StatusCode, body: &str) -> BotError {
        let parsed: Option<ApiErrorBody> = serde_json::from_str(body).ok();

        if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 418 {
            return BotError::Transient(format!("rate limited ({}): {}", status, body));
        }
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return BotError::Auth(format!("{}: {}", status, body));
        }
        if status.is_server_error() {
            return BotError::Transient(format!("server error ({}): {}", status, body));
        }

        match parsed {
            Some(ApiErrorBody { code, msg }) => match code {
                // Unknown / disconnected / too many requests / timeout / busy / clock drift
                -1000 | -1001 | -1003 | -1007 | -1008 | -1021 => {
                    BotError::Transient(format!("code {code}: {msg}"))
                }
                // Unauthorized / bad signature / bad key format / key rejected
                -1002 | -1022 | -2014 | -2015 => BotError::Auth(format!("code {code}: {msg}")),
                _ => BotError::Rejected { code, message: msg },
            },
            None => BotError::Rejected {
                code: i64::from(status.as_u16()),
                message: body.to_string(),
            },
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<Value> {
        let query = Self::encode_params(params);

        let mut req = if signed {
            let auth = self.auth.as_ref().ok_or_else(|| {
                BotError::Auth("API credentials are required for signed endpoints".to_string())
            })?;
            let signed_query = auth.signed_query(&query)?;
            self.http
                .request(method.clone(), format!("{}{}?{}", self.base_url, path, signed_query))
                .headers(auth.build_headers()?)
        } else if query.is_empty() {
            self.http.request(method.clone(), format!("{}{}", self.base_url, path))
        } else {
            self.http
                .request(method.clone(), format!("{}{}?{}", self.base_url, path, query))
        };

        if method == Method::POST {
            req = req.header(reqwest::header::CONTENT_LENGTH, "0");
        }

        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            debug!(%status, %path, body = %text, "binance request failed");
            return Err(Self::classify_failure(status, &text));
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesClient {
    fn kind(&self) -> ExchangeKind {
        ExchangeKind::Binance
    }

    async fn submit_order(&self, request: &OrderRequest) -> Result<OrderResult> {
        // Retries reuse the caller's id, so Binance refuses a duplicate
        // instead of opening a second order
        let client_order_id = request
            .client_order_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
        let params = Self::order_params(request, &client_order_id);

        let raw = self.send(Method::POST, ORDER_PATH, &params, true).await?;
        let ack: OrderAck = serde_json::from_value(raw.clone())?;

        Ok(OrderResult {
            request: request.clone(),
            exchange_order_id: ack.order_id.to_string(),
            client_order_id: if ack.client_order_id.is_empty() {
                client_order_id
            } else {
                ack.client_order_id
            },
            status: Self::parse_order_status(&ack.status),
            raw_response: raw,
        })
    }

    async fn get_order_status(&self, symbol: &str, order_id: &str) -> Result<OrderStatus> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        let raw = self.send(Method::GET, ORDER_PATH, &params, true).await?;
        let ack: OrderAck = serde_json::from_value(raw)?;
        Ok(Self::parse_order_status(&ack.status))
    }

    async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        let params = [("symbol", symbol.to_string())];
        let raw = self.send(Method::GET, TICKER_PRICE_PATH, &params, false).await?;
        let ticker: TickerPrice = serde_json::from_value(raw)?;
        Ok(ticker.price)
    }

    async fn cancel_order(&self, symbol: &str, order_id: &str) -> Result<()> {
        let params = [("symbol", symbol.to_string()), ("orderId", order_id.to_string())];
        self.send(Method::DELETE, ORDER_PATH, &params, true).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.send(Method::GET, PING_PATH, &[], false).await?;

        let server_ms = self.server_time().await?;
        let drift_ms = (chrono::Utc::now().timestamp_millis() - server_ms).abs();
        if drift_ms as u64 > self.recv_window_ms {
            warn!(
                drift_ms,
                recv_window_ms = self.recv_window_ms,
                "local clock is outside the recv window; signed calls will fail"
            );
        } else {
            debug!(drift_ms, "server time checked");
        }
        Ok(())
    }

    async fn symbol_filters(&self, symbol: &str) -> Result<Option<SymbolFilters>> {
        let raw = self.send(Method::GET, EXCHANGE_INFO_PATH, &[], false).await?;
        Self::parse_symbol_filters(raw, symbol).map(Some)
    }

    async fn verify_credentials(&self) -> Result<()> {
        if self.auth.is_none() {
            // Public price feed for dry runs
            return Ok(());
        }
        let raw = self.send(Method::GET, BALANCE_PATH, &[], true).await?;
        let balances: Vec<AssetBalance> = serde_json::from_value(raw)?;
        if let Some(usdt) = balances.iter().find(|b| b.asset == "USDT") {
            info!(available = ?usdt.available_balance, "credentials verified");
        } else {
            info!(assets = balances.len(), "credentials verified");
        }
        Ok(())
    }
}
