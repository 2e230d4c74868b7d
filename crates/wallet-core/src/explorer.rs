//! Block-explorer and broadcast endpoints.

use std::time::Duration;

use async_trait::async_trait;
use chain_shic::utxo::UtxoCandidate;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::WalletConfig;
use crate::error::WalletError;

/// Remote chain queries used by the wallet.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Confirmed balance of `address` in minor units.
    async fn balance(&self, address: &str) -> Result<u64, WalletError>;

    /// Last traded SHIC price in USDT.
    async fn price_usd(&self) -> Result<f64, WalletError>;

    /// Unspent outputs of `address` able to fund `amount_sat`.
    async fn unspent(&self, address: &str, amount_sat: u64)
        -> Result<Vec<UtxoCandidate>, WalletError>;

    /// Raw consensus hex of a transaction.
    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError>;

    /// Submit a signed transaction; returns its id.
    async fn broadcast(&self, raw_hex: &str) -> Result<String, WalletError>;
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    balance: Value,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    last_price_usdt: Value,
}

#[derive(Debug, Deserialize)]
struct UnspentEntry {
    txid: String,
    index: u32,
}

#[derive(Debug, Deserialize)]
struct UnspentResponse {
    #[serde(default)]
    result: Option<Vec<UnspentEntry>>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RawTransaction {
    hex: String,
}

#[derive(Debug, Deserialize)]
struct RawTransactionResponse {
    #[serde(default)]
    result: Option<RawTransaction>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct BroadcastResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

/// Server message carried in an `error` field, verbatim when it is a string.
fn error_text(error: &Value) -> String {
    match error {
        Value::String(s) => s.clone(),
        Value::Object(map) => match map.get("message") {
            Some(Value::String(s)) => s.clone(),
            _ => error.to_string(),
        },
        other => other.to_string(),
    }
}

fn is_error(error: &Option<Value>) -> bool {
    matches!(error, Some(v) if !v.is_null())
}

/// Accepts numbers and numeric strings.
fn value_as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn value_as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// [`ChainClient`] over the public Shibacoin explorer HTTP APIs.
#[derive(Debug, Clone)]
pub struct HttpExplorerClient {
    http: reqwest::Client,
    blockbook_url: String,
    explorer_url: String,
    electrum_url: String,
}

impl HttpExplorerClient {
    pub fn new(config: &WalletConfig) -> Result<Self, WalletError> {
        Self::with_urls(
            &config.blockbook_url,
            &config.explorer_url,
            &config.electrum_url,
            config.http_timeout,
        )
    }

    pub fn with_urls(
        blockbook_url: &str,
        explorer_url: &str,
        electrum_url: &str,
        timeout: Duration,
    ) -> Result<Self, WalletError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| WalletError::Config(format!("http client: {e}")))?;
        Ok(Self {
            http,
            blockbook_url: blockbook_url.trim_end_matches('/').to_string(),
            explorer_url: explorer_url.trim_end_matches('/').to_string(),
            electrum_url: electrum_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, WalletError> {
        debug!(%url, "GET");
        let response = self.http.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WalletError::NetworkError(format!(
                "GET {url} returned {status}: {body}"
            )));
        }
        response
            .json::<T>()
            .await
            .map_err(|e| WalletError::NetworkError(format!("GET {url}: unexpected body: {e}")))
    }
}

#[async_trait]
impl ChainClient for HttpExplorerClient {
    async fn balance(&self, address: &str) -> Result<u64, WalletError> {
        let url = format!("{}/api/address/{address}", self.blockbook_url);
        let body: BalanceResponse = self.get_json(&url).await?;
        value_as_u64(&body.balance).ok_or_else(|| {
            WalletError::NetworkError(format!("unparseable balance {}", body.balance))
        })
    }

    async fn price_usd(&self) -> Result<f64, WalletError> {
        let url = format!("{}/ext/getcurrentprice", self.explorer_url);
        let body: PriceResponse = self.get_json(&url).await?;
        value_as_f64(&body.last_price_usdt).ok_or_else(|| {
            WalletError::NetworkError(format!("unparseable price {}", body.last_price_usdt))
        })
    }

    async fn unspent(
        &self,
        address: &str,
        amount_sat: u64,
    ) -> Result<Vec<UtxoCandidate>, WalletError> {
        let url = format!("{}/unspent/{address}?amount={amount_sat}", self.electrum_url);
        let body: UnspentResponse = self.get_json(&url).await?;
        if is_error(&body.error) {
            let message = body.error.as_ref().map(error_text).unwrap_or_default();
            return Err(WalletError::UtxoUnavailable(message));
        }
        Ok(body
            .result
            .unwrap_or_default()
            .into_iter()
            .map(|entry| UtxoCandidate {
                txid: entry.txid,
                vout: entry.index,
            })
            .collect())
    }

    async fn raw_transaction(&self, txid: &str) -> Result<String, WalletError> {
        let url = format!("{}/transaction/{txid}", self.electrum_url);
        let body: RawTransactionResponse = self.get_json(&url).await?;
        if is_error(&body.error) {
            let message = body.error.as_ref().map(error_text).unwrap_or_default();
            return Err(WalletError::UtxoUnavailable(format!("{txid}: {message}")));
        }
        body.result
            .map(|r| r.hex)
            .ok_or_else(|| WalletError::NetworkError(format!("no raw transaction for {txid}")))
    }

    async fn broadcast(&self, raw_hex: &str) -> Result<String, WalletError> {
        let url = format!("{}/broadcast", self.electrum_url);
        info!(bytes = raw_hex.len() / 2, "broadcasting transaction");

        let response = self
            .http
            .post(&url)
            .json(&serde_json::json!({ "raw": raw_hex }))
            .send()
            .await?;
        let status = response.status();
        let text = response.text().await?;

        // The node reports rejections in the body, sometimes with a 4xx/5xx.
        if let Ok(body) = serde_json::from_str::<BroadcastResponse>(&text) {
            if is_error(&body.error) {
                let message = body.error.as_ref().map(error_text).unwrap_or_default();
                warn!(%message, "broadcast rejected");
                return Err(WalletError::BroadcastRejected(message));
            }
            if status.is_success() {
                return match body.result {
                    Some(Value::String(txid)) => Ok(txid),
                    Some(other) if !other.is_null() => Ok(other.to_string()),
                    _ => Err(WalletError::NetworkError(
                        "broadcast response carried no result".into(),
                    )),
                };
            }
        }

        if !status.is_success() {
            return Err(WalletError::NetworkError(format!(
                "POST {url} returned {status}: {text}"
            )));
        }
        Err(WalletError::NetworkError(format!(
            "unexpected broadcast response: {text}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_text_prefers_plain_strings() {
        assert_eq!(error_text(&json!("bad-txns-inputs-spent")), "bad-txns-inputs-spent");
        assert_eq!(
            error_text(&json!({"code": -26, "message": "min relay fee not met"})),
            "min relay fee not met"
        );
        assert_eq!(error_text(&json!({"code": 1})), r#"{"code":1}"#);
    }

    #[test]
    fn test_numeric_values_accept_strings() {
        assert_eq!(value_as_u64(&json!("100000000")), Some(100_000_000));
        assert_eq!(value_as_u64(&json!(5)), Some(5));
        assert_eq!(value_as_u64(&json!("1.5")), None);
        assert_eq!(value_as_f64(&json!("0.0000042")), Some(0.0000042));
        assert_eq!(value_as_f64(&json!(null)), None);
    }

    #[test]
    fn test_null_error_is_not_an_error() {
        assert!(!is_error(&Some(Value::Null)));
        assert!(!is_error(&None));
        assert!(is_error(&Some(json!("x"))));
    }

    #[test]
    fn test_base_urls_are_trimmed() {
        let client = HttpExplorerClient::with_urls(
            "https://a.example/",
            "https://b.example",
            "https://c.example//",
            Duration::from_secs(1),
        )
        .unwrap();
        assert_eq!(client.blockbook_url, "https://a.example");
        assert_eq!(client.electrum_url, "https://c.example");
    }
}
