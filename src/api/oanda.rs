use async_trait::async_trait;
use chrono::{DateTime, Utc};
use governor::{Quota, RateLimiter};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::{AccountSource, CandleSource, OrderSink};
use crate::error::{BotError, Result};
use crate::models::{Account, Candle, Granularity, Order, OrderAck};

const PRACTICE_API_BASE: &str = "https://api-fxpractice.oanda.com";
const LIVE_API_BASE: &str = "https://api-fxtrade.oanda.com";
// OANDA allows 100 requests/s per connection; stay well below it
const RATE_LIMIT_PER_SECOND: u32 = 20;
const REQUEST_TIMEOUT_SECS: u64 = 15;

type OandaRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Which OANDA trading environment to talk to
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OandaEnvironment {
    Practice,
    Live,
}

impl OandaEnvironment {
    pub fn base_url(&self) -> &'static str {
        match self {
            OandaEnvironment::Practice => PRACTICE_API_BASE,
            OandaEnvironment::Live => LIVE_API_BASE,
        }
    }
}

/// Client for the OANDA v20 REST API
///
/// Serves candles, account balance and order submission. It never retries;
/// a failed call surfaces as `Transport` or `Rejected` and the execution
/// loop decides what to do.
#[derive(Clone)]
pub struct OandaClient {
    client: Client,
    base_url: String,
    api_key: String,
    price_precision: u32,
    rate_limiter: Arc<OandaRateLimiter>,
}

// ============== Response Types ==============

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<CandleRaw>,
}

#[derive(Debug, Deserialize)]
struct CandleRaw {
    complete: bool,
    time: DateTime<Utc>,
    mid: Option<MidRaw>,
}

#[derive(Debug, Deserialize)]
struct MidRaw {
    o: String,
    h: String,
    l: String,
    c: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    account: AccountRaw,
}

#[derive(Debug, Deserialize)]
struct AccountRaw {
    id: String,
    balance: String,
    #[serde(default)]
    currency: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderCreateResponse {
    #[serde(default)]
    order_fill_transaction: Option<FillTransaction>,
    #[serde(default)]
    order_cancel_transaction: Option<CancelTransaction>,
}

#[derive(Debug, Deserialize)]
struct FillTransaction {
    id: String,
    #[serde(default)]
    price: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CancelTransaction {
    reason: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    #[serde(default)]
    error_message: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    order_reject_transaction: Option<RejectTransaction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RejectTransaction {
    #[serde(default)]
    reject_reason: Option<String>,
}

impl ErrorResponse {
    fn reason(&self, status: StatusCode) -> String {
        let reject = self
            .order_reject_transaction
            .as_ref()
            .and_then(|t| t.reject_reason.clone());

        reject
            .or_else(|| self.error_code.clone())
            .or_else(|| self.error_message.clone())
            .unwrap_or_else(|| format!("HTTP {}", status))
    }
}

// ============== Request Types ==============

#[derive(Debug, Serialize)]
struct OrderRequest<'a> {
    order: MarketOrderRequest<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketOrderRequest<'a> {
    #[serde(rename = "type")]
    order_type: &'static str,
    instrument: &'a str,
    units: String,
    time_in_force: &'static str,
    position_fill: &'static str,
    stop_loss_on_fill: PriceDetails,
    take_profit_on_fill: PriceDetails,
    client_extensions: ClientExtensions,
}

#[derive(Debug, Serialize)]
struct PriceDetails {
    price: String,
}

#[derive(Debug, Serialize)]
struct ClientExtensions {
    id: String,
}

// ============== Implementation ==============

impl OandaClient {
    /// `base_url` is usually `OandaEnvironment::base_url()`
    pub fn with_base_url(
        api_key: String,
        base_url: impl Into<String>,
        price_precision: u32,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BotError::config(format!("failed to build HTTP client: {}", e)))?;

        let per_second = NonZeroU32::new(RATE_LIMIT_PER_SECOND)
            .ok_or_else(|| BotError::config("rate limit must be non-zero"))?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_second(per_second)));

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
            price_precision,
            rate_limiter,
        })
    }

    /// Rate-limited, authenticated send
    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        self.rate_limiter.until_ready().await;

        let response = request
            .bearer_auth(&self.api_key)
            .header("Accept-Datetime-Format", "RFC3339")
            .send()
            .await?;

        Ok(response)
    }

    /// Map a failed read request to a transport error
    async fn read_failure(response: Response) -> BotError {
        let status = response.status();
        let body: ErrorResponse = response.json().await.unwrap_or_default();
        BotError::Transport(format!("OANDA returned {}: {}", status, body.reason(status)))
    }

    /// Body of a 2xx order response
    async fn read_order_response(
        response: Response,
    ) -> std::result::Result<OrderCreateResponse, String> {
        let body = response.text().await.map_err(|e| e.to_string())?;
        serde_json::from_str(&body).map_err(|e| e.to_string())
    }

    fn format_price(&self, price: Decimal) -> String {
        format!(
            "{:.*}",
            self.price_precision as usize,
            price.round_dp(self.price_precision)
        )
    }

    fn order_body<'a>(&self, order: &'a Order) -> OrderRequest<'a> {
        OrderRequest {
            order: MarketOrderRequest {
                order_type: "MARKET",
                instrument: &order.instrument,
                units: order.units.to_string(),
                time_in_force: "FOK",
                position_fill: "DEFAULT",
                stop_loss_on_fill: PriceDetails {
                    price: self.format_price(order.stop_loss_price),
                },
                take_profit_on_fill: PriceDetails {
                    price: self.format_price(order.take_profit_price),
                },
                client_extensions: ClientExtensions {
                    id: order.id.to_string(),
                },
            },
        }
    }
}

fn parse_price(field: &str, value: &str) -> Result<f64> {
    value
        .parse::<f64>()
        .map_err(|_| BotError::InvalidMarketData(format!("bad {} price: {:?}", field, value)))
}

impl CandleRaw {
    fn into_candle(self) -> Result<Candle> {
        let mid = self.mid.ok_or_else(|| {
            BotError::InvalidMarketData(format!("candle at {} has no mid prices", self.time))
        })?;

        Ok(Candle {
            timestamp: self.time,
            open: parse_price("open", &mid.o)?,
            high: parse_price("high", &mid.h)?,
            low: parse_price("low", &mid.l)?,
            close: parse_price("close", &mid.c)?,
            complete: self.complete,
        })
    }
}

#[async_trait]
impl CandleSource for OandaClient {
    /// Endpoint: GET /v3/instruments/{instrument}/candles?granularity=..&count=..&price=M&dailyAlignment=0&alignmentTimezone=UTC
    async fn fetch_candles(
        &self,
        instrument: &str,
        granularity: Granularity,
        count: usize,
    ) -> Result<Vec<Candle>> {
        let url = format!("{}/v3/instruments/{}/candles", self.base_url, instrument);
        let count = count.to_string();

        let response = self
            .send(self.client.get(&url).query(&[
                ("granularity", granularity.as_str()),
                ("count", count.as_str()),
                ("price", "M"),
                // H4 and D bars close on UTC day boundaries, like `next_close_after`
                ("dailyAlignment", "0"),
                ("alignmentTimezone", "UTC"),
            ]))
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }

        let data: CandlesResponse = response.json().await?;
        let candles = data
            .candles
            .into_iter()
            .map(CandleRaw::into_candle)
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(
            instrument = %instrument,
            granularity = %granularity,
            candles = candles.len(),
            "Fetched candles"
        );

        Ok(candles)
    }
}

#[async_trait]
impl AccountSource for OandaClient {
    /// Endpoint: GET /v3/accounts/{accountId}
    async fn fetch_account(&self, account_id: &str) -> Result<Account> {
        let url = format!("{}/v3/accounts/{}", self.base_url, account_id);
        let response = self.send(self.client.get(&url)).await?;

        if !response.status().is_success() {
            return Err(Self::read_failure(response).await);
        }

        let data: AccountResponse = response.json().await?;
        let balance = Decimal::from_str(&data.account.balance).map_err(|_| {
            BotError::InvalidMarketData(format!("bad balance: {:?}", data.account.balance))
        })?;

        Ok(Account {
            id: data.account.id,
            balance,
            currency: data.account.currency,
        })
    }
}

#[async_trait]
impl OrderSink for OandaClient {
    /// Endpoint: POST /v3/accounts/{accountId}/orders
    async fn submit(&self, account_id: &str, order: &Order) -> Result<OrderAck> {
        let url = format!("{}/v3/accounts/{}/orders", self.base_url, account_id);
        let response = self
            .send(self.client.post(&url).json(&self.order_body(order)))
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
            return Err(Self::read_failure(response).await);
        }
        if !status.is_success() {
            let body: ErrorResponse = response.json().await.unwrap_or_default();
            return Err(BotError::Rejected(body.reason(status)));
        }

        // The broker has taken the order; from here on nothing is transient
        let data = match Self::read_order_response(response).await {
            Ok(data) => data,
            Err(reason) => {
                tracing::warn!(
                    order_id = %order.id,
                    status = %status,
                    "Order accepted but response unreadable: {}",
                    reason
                );
                return Ok(OrderAck::unconfirmed(order.id));
            }
        };

        if let Some(fill) = data.order_fill_transaction {
            let fill_price = fill.price.as_deref().and_then(|p| Decimal::from_str(p).ok());
            return Ok(OrderAck {
                order_id: order.id,
                broker_transaction_id: Some(fill.id),
                fill_price,
            });
        }

        if let Some(cancel) = data.order_cancel_transaction {
            return Err(BotError::Rejected(cancel.reason));
        }

        // Accepted but not filled yet (e.g. market closed, order pending)
        Ok(OrderAck::unconfirmed(order.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{OrderType, TradeSide};
    use uuid::Uuid;

    fn sample_order(units: i64, sl: &str, tp: &str) -> Order {
        Order {
            id: Uuid::new_v4(),
            instrument: "GBP_USD".to_string(),
            side: if units > 0 { TradeSide::Buy } else { TradeSide::Sell },
            units,
            order_type: OrderType::Market,
            entry_price: Decimal::from_str("1.25").unwrap(),
            stop_loss_price: Decimal::from_str(sl).unwrap(),
            take_profit_price: Decimal::from_str(tp).unwrap(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_environment_urls() {
        assert_eq!(
            OandaEnvironment::Practice.base_url(),
            "https://api-fxpractice.oanda.com"
        );
        assert_eq!(OandaEnvironment::Live.base_url(), "https://api-fxtrade.oanda.com");
    }

    #[test]
    fn test_order_body_wire_format() {
        let client = OandaClient::with_base_url("token".into(), "http://localhost/", 5).unwrap();
        let order = sample_order(-1000, "1.253", "1.2440");

        let body = serde_json::to_value(client.order_body(&order)).unwrap();
        let o = &body["order"];

        assert_eq!(o["type"], "MARKET");
        assert_eq!(o["instrument"], "GBP_USD");
        assert_eq!(o["units"], "-1000");
        assert_eq!(o["timeInForce"], "FOK");
        assert_eq!(o["positionFill"], "DEFAULT");
        assert_eq!(o["stopLossOnFill"]["price"], "1.25300");
        assert_eq!(o["takeProfitOnFill"]["price"], "1.24400");
        assert_eq!(o["clientExtensions"]["id"], order.id.to_string());
    }

    #[test]
    fn test_price_rounding() {
        let client = OandaClient::with_base_url("token".into(), "http://localhost", 3).unwrap();
        assert_eq!(
            client.format_price(Decimal::from_str("151.23456").unwrap()),
            "151.235"
        );
    }

    #[test]
    fn test_candle_without_mid_is_invalid() {
        let raw = CandleRaw {
            complete: true,
            time: Utc::now(),
            mid: None,
        };
        assert!(matches!(
            raw.into_candle(),
            Err(BotError::InvalidMarketData(_))
        ));
    }

    #[test]
    fn test_error_reason_prefers_reject_reason() {
        let body: ErrorResponse = serde_json::from_str(
            r#"{"errorMessage":"Order rejected","orderRejectTransaction":{"rejectReason":"INSUFFICIENT_MARGIN"}}"#,
        )
        .unwrap();
        assert_eq!(body.reason(StatusCode::BAD_REQUEST), "INSUFFICIENT_MARGIN");

        let empty = ErrorResponse::default();
        assert_eq!(empty.reason(StatusCode::FORBIDDEN), "HTTP 403 Forbidden");
    }
}
