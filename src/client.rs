//! Quotex HTTP client
//!
//! Thin wrapper over the broker's unofficial HTTP API. No protocol engine
//! lives here: every operation is a single request/response against the
//! session established by [`QuotexClient::connect`]. The session token is
//! cached on disk the way the upstream wrapper library does, so restarts
//! reuse a still-valid login instead of re-authenticating.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::broker::{
    Broker, BrokerError, Candle, Instrument, OrderClose, OrderRequest, OrderStatus, OrderTicket,
    TradeOutcome,
};
use crate::config::{AccountType, Config};

/// Timeout applied to every broker HTTP call
const HTTP_TIMEOUT_SECS: u64 = 30;

/// Client for the broker's unofficial HTTP API
pub struct QuotexClient {
    http: reqwest::Client,
    base_url: String,
    email: String,
    password: String,
    account: AccountType,
    session: RwLock<Option<String>>,
    session_path: PathBuf,
}

impl QuotexClient {
    pub fn new(config: &Config) -> Result<Self, BrokerError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            email: config.email.clone(),
            password: config.password.clone(),
            account: config.account,
            session: RwLock::new(None),
            session_path: default_session_path(),
        })
    }

    /// Override the session cache location (for tests).
    pub fn with_session_path(mut self, path: PathBuf) -> Self {
        self.session_path = path;
        self
    }

    pub fn account(&self) -> AccountType {
        self.account
    }

    /// Complete a login that stopped at the two-factor prompt.
    pub async fn submit_pin(&self, pin: &str) -> Result<(), BrokerError> {
        self.login(Some(pin)).await
    }

    async fn login(&self, pin: Option<&str>) -> Result<(), BrokerError> {
        let url = format!("{}/api/v1/login", self.base_url);
        let req = LoginRequest {
            email: &self.email,
            password: &self.password,
            account: self.account.as_api_str(),
            pin,
        };

        let response = self.http.post(&url).json(&req).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: LoginResponse = response.json().await?;
        match body.status.as_str() {
            "ok" => {
                let token = body.token.ok_or_else(|| BrokerError::Auth(
                    "login succeeded but no session token was returned".to_string(),
                ))?;
                info!("Authenticated with broker ({} account)", self.account.as_api_str());
                self.store_session(&token);
                *self.session.write().await = Some(token);
                Ok(())
            }
            "pin_required" => Err(BrokerError::PinRequired),
            other => Err(BrokerError::Auth(format!("unexpected login status `{other}`"))),
        }
    }

    async fn token(&self) -> Result<String, BrokerError> {
        self.session
            .read()
            .await
            .clone()
            .ok_or(BrokerError::NotConnected)
    }

    fn load_cached_session(&self) -> Option<String> {
        let raw = std::fs::read_to_string(&self.session_path).ok()?;
        let cached: CachedSession = serde_json::from_str(&raw).ok()?;
        // A token issued for the other account type is useless here.
        if cached.account != self.account {
            return None;
        }
        debug!(
            "Reusing cached broker session from {}",
            self.session_path.display()
        );
        Some(cached.token)
    }

    fn store_session(&self, token: &str) {
        let cached = CachedSession {
            token: token.to_string(),
            account: self.account,
            saved_at: Utc::now(),
        };
        if let Some(parent) = self.session_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!("Could not create session cache directory: {e}");
                return;
            }
        }
        match serde_json::to_string_pretty(&cached) {
            Ok(json) => {
                if let Err(e) = std::fs::write(&self.session_path, json) {
                    warn!("Could not write session cache: {e}");
                }
            }
            Err(e) => warn!("Could not serialize session cache: {e}"),
        }
    }
}

#[async_trait]
impl Broker for QuotexClient {
    async fn connect(&self) -> Result<(), BrokerError> {
        if self.session.read().await.is_some() {
            return Ok(());
        }
        if let Some(token) = self.load_cached_session() {
            *self.session.write().await = Some(token);
            return Ok(());
        }
        self.login(None).await
    }

    async fn balance(&self) -> Result<Decimal, BrokerError> {
        let token = self.token().await?;
        let url = format!(
            "{}/api/v1/balance?account={}",
            self.base_url,
            self.account.as_api_str()
        );

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let body: BalanceResponse = response.json().await?;
        Ok(body.balance)
    }

    async fn instruments(&self) -> Result<Vec<Instrument>, BrokerError> {
        let token = self.token().await?;
        let url = format!("{}/api/v1/instruments", self.base_url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn place_order(&self, order: &OrderRequest) -> Result<OrderTicket, BrokerError> {
        let token = self.token().await?;
        let url = format!("{}/api/v1/orders", self.base_url);

        debug!(
            "Placing {} {} for {} over {}s (request {})",
            order.direction, order.asset, order.amount, order.duration_secs, order.request_id
        );

        let req = PlaceOrderRequest {
            request_id: order.request_id.to_string(),
            asset: &order.asset,
            direction: order.direction.as_str().to_ascii_lowercase(),
            amount: order.amount,
            duration: order.duration_secs,
            account: self.account.as_api_str(),
        };

        let response = self.http.post(&url).bearer_auth(token).json(&req).send().await?;
        let status = response.status();
        if status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNPROCESSABLE_ENTITY
        {
            let message = error_message(response).await;
            return Err(BrokerError::Rejected(message));
        }
        if !status.is_success() {
            return Err(api_error(response).await);
        }

        let body: OrderPlacedResponse = response.json().await?;
        Ok(OrderTicket {
            order_id: body.id,
            request_id: order.request_id,
            asset: order.asset.clone(),
            placed_at: Utc::now(),
            duration_secs: order.duration_secs,
        })
    }

    async fn order_status(&self, order_id: &str) -> Result<OrderStatus, BrokerError> {
        let token = self.token().await?;
        let url = format!("{}/api/v1/orders/{order_id}", self.base_url);

        let response = self.http.get(&url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        let raw: serde_json::Value = response.json().await?;
        parse_order_status(raw)
    }

    async fn candles(
        &self,
        asset: &str,
        period_secs: u32,
        count: usize,
    ) -> Result<Vec<Candle>, BrokerError> {
        let token = self.token().await?;
        let url = format!("{}/api/v1/candles", self.base_url);

        let response = self
            .http
            .get(&url)
            .bearer_auth(token)
            .query(&[
                ("asset", asset.to_string()),
                ("period", period_secs.to_string()),
                ("count", count.to_string()),
            ])
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }
}

/// Interpret a raw order record from the broker.
fn parse_order_status(raw: serde_json::Value) -> Result<OrderStatus, BrokerError> {
    let dto: OrderStatusDto = serde_json::from_value(raw.clone()).map_err(|e| BrokerError::Api {
        status: 200,
        message: format!("malformed order status: {e}"),
    })?;

    match dto.status.as_str() {
        "open" | "active" => Ok(OrderStatus::Open),
        "closed" => {
            let outcome = match dto.outcome.as_deref() {
                Some("win") => TradeOutcome::Win,
                Some("loss") | Some("lost") => TradeOutcome::Loss,
                Some("draw") | Some("tie") | Some("equal") => TradeOutcome::Draw,
                _ => TradeOutcome::Error,
            };
            Ok(OrderStatus::Closed(OrderClose {
                outcome,
                profit: dto.profit.unwrap_or_default(),
                raw,
            }))
        }
        other => Err(BrokerError::Api {
            status: 200,
            message: format!("unknown order status `{other}`"),
        }),
    }
}

/// Map a non-success response, preferring the broker's `message` field.
async fn api_error(response: reqwest::Response) -> BrokerError {
    let status = response.status().as_u16();
    let message = error_message(response).await;
    match status {
        401 | 403 => BrokerError::Auth(message),
        _ => BrokerError::Api { status, message },
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let text = response.text().await.unwrap_or_default();
    serde_json::from_str::<ErrorBody>(&text)
        .map(|body| body.message)
        .unwrap_or(text)
}

fn default_session_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quotex-runner")
        .join("session.json")
}

// Request/Response types

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
    account: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pin: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    status: String,
    #[serde(default)]
    token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Decimal,
}

#[derive(Debug, Serialize)]
struct PlaceOrderRequest<'a> {
    request_id: String,
    asset: &'a str,
    direction: String,
    amount: Decimal,
    duration: u32,
    account: &'a str,
}

#[derive(Debug, Deserialize)]
struct OrderPlacedResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct OrderStatusDto {
    status: String,
    #[serde(default)]
    outcome: Option<String>,
    #[serde(default)]
    profit: Option<Decimal>,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct CachedSession {
    token: String,
    account: AccountType,
    saved_at: DateTime<Utc>,
}
