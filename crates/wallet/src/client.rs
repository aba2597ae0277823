//! Wallet JSON-RPC client.
//!
//! Speaks the EIP-1193 provider methods a browser or embedded wallet exposes
//! over HTTP:
//!
//! - `wallet_getCapabilities` to probe atomic bundle support
//! - `wallet_sendCalls` + `wallet_getCallsStatus` for atomic bundles
//! - `eth_sendTransaction` + `eth_getTransactionReceipt` for single calls

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::time::{Instant, sleep};
use tracing::{debug, instrument, trace, warn};

use tipjar_core::error::{WalletError, WalletResult};
use tipjar_core::models::{Call, TxHash};
use tipjar_core::ports::{BundleReceipt, WalletCapabilities, WalletTransport};

/// EIP-1193 "user rejected request".
const USER_REJECTED: i64 = 4001;
/// EIP-1193 "unsupported method".
const UNSUPPORTED_METHOD: i64 = 4200;
/// JSON-RPC "method not found".
const METHOD_NOT_FOUND: i64 = -32601;
/// Execution reverted during gas estimation.
const EXECUTION_REVERTED: i64 = 3;

/// Configuration for the wallet client.
#[derive(Debug, Clone)]
pub struct JsonRpcWalletConfig {
    /// Wallet RPC endpoint (e.g., "http://127.0.0.1:8545").
    pub url: String,
    /// Payer account the wallet signs for.
    pub from: Address,
    pub chain_id: u64,
    /// Delay between status polls.
    pub poll_interval: Duration,
    /// Give up waiting for confirmation after this long.
    pub confirmation_timeout: Duration,
}

impl Default for JsonRpcWalletConfig {
    fn default() -> Self {
        Self {
            url: "http://127.0.0.1:8545".to_string(),
            from: Address::ZERO,
            chain_id: 1,
            poll_interval: Duration::from_secs(2),
            confirmation_timeout: Duration::from_secs(180),
        }
    }
}

/// Wallet adapter implementing the WalletTransport port over JSON-RPC.
pub struct JsonRpcWallet {
    http: reqwest::Client,
    config: JsonRpcWalletConfig,
    next_id: AtomicU64,
}

impl JsonRpcWallet {
    pub fn new(config: JsonRpcWalletConfig) -> WalletResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| WalletError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            config,
            next_id: AtomicU64::new(1),
        })
    }

    #[instrument(skip(self, params), level = "trace")]
    async fn rpc<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> WalletResult<T> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.config.url)
            .json(&body)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| WalletError::Transport(e.to_string()))?
            .json()
            .await
            .map_err(|e| WalletError::Transport(e.to_string()))?;

        trace!(id, "RPC response received");

        if let Some(err) = response.error {
            return Err(map_rpc_error(&err));
        }
        serde_json::from_value(response.result.unwrap_or(Value::Null))
            .map_err(|e| WalletError::Transport(format!("{} returned malformed result: {}", method, e)))
    }

    fn chain_id_hex(&self) -> String {
        format!("0x{:x}", self.config.chain_id)
    }

    fn deadline(&self) -> Instant {
        Instant::now() + self.config.confirmation_timeout
    }

    /// Poll until the bundle settles.
    ///
    /// The wallet already accepted the bundle, so anything short of a
    /// definite status is `Unconfirmed`.
    async fn wait_for_bundle(&self, bundle_id: &str) -> WalletResult<BundleReceipt> {
        let deadline = self.deadline();
        loop {
            let status = self
                .rpc::<Value>("wallet_getCallsStatus", json!([bundle_id]))
                .await
                .and_then(|status| parse_calls_status(&status))
                .map_err(|e| unconfirmed(bundle_id, e))?;
            match status {
                BundleStatus::Pending => {}
                BundleStatus::Confirmed(tx_hashes) => return Ok(BundleReceipt { tx_hashes }),
                BundleStatus::Failed(reason) => return Err(WalletError::Reverted(reason)),
            }
            if Instant::now() >= deadline {
                return Err(WalletError::Unconfirmed {
                    reference: bundle_id.to_string(),
                    reason: "timed out waiting for bundle status".into(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }

    /// Poll until the transaction is mined.
    async fn wait_for_receipt(&self, tx_hash: TxHash) -> WalletResult<TxHash> {
        let reference = tx_hash.to_string();
        let deadline = self.deadline();
        loop {
            let receipt: Option<Value> = self
                .rpc("eth_getTransactionReceipt", json!([tx_hash]))
                .await
                .map_err(|e| unconfirmed(&reference, e))?;
            if let Some(receipt) = receipt {
                return match receipt_succeeded(&receipt) {
                    Some(true) => Ok(tx_hash),
                    Some(false) => Err(WalletError::Reverted(format!(
                        "transaction {} reverted",
                        tx_hash
                    ))),
                    None => Err(WalletError::Unconfirmed {
                        reference,
                        reason: "receipt has no status".into(),
                    }),
                };
            }
            if Instant::now() >= deadline {
                return Err(WalletError::Unconfirmed {
                    reference,
                    reason: "timed out waiting for receipt".into(),
                });
            }
            sleep(self.config.poll_interval).await;
        }
    }
}

#[async_trait]
impl WalletTransport for JsonRpcWallet {
    #[instrument(skip(self), fields(url = %self.config.url))]
    async fn capabilities(&self) -> WalletResult<WalletCapabilities> {
        let result: WalletResult<Value> = self
            .rpc(
                "wallet_getCapabilities",
                json!([self.config.from, [self.chain_id_hex()]]),
            )
            .await;

        match result {
            Ok(caps) => {
                let atomic_batch = parse_atomic_support(&caps, self.config.chain_id);
                debug!(atomic_batch, "Wallet capabilities probed");
                Ok(WalletCapabilities { atomic_batch })
            }
            // Pre-EIP-5792 wallets simply do not know the method
            Err(WalletError::Unsupported(_)) => Ok(WalletCapabilities::default()),
            Err(e) => Err(e),
        }
    }

    #[instrument(skip_all, fields(calls = calls.len()))]
    async fn submit_atomic(&self, calls: &[Call]) -> WalletResult<BundleReceipt> {
        let request = json!([{
            "version": "2.0.0",
            "chainId": self.chain_id_hex(),
            "from": self.config.from,
            "atomicRequired": true,
            "calls": calls.iter().map(call_json).collect::<Vec<_>>(),
        }]);

        let response: Value = self.rpc("wallet_sendCalls", request).await?;
        let bundle_id = parse_bundle_id(&response)?;
        debug!(bundle = %bundle_id, "Bundle accepted by wallet");

        self.wait_for_bundle(&bundle_id).await
    }

    #[instrument(skip_all, fields(target = %call.target))]
    async fn submit_one(&self, call: &Call) -> WalletResult<TxHash> {
        let mut tx = call_json(call);
        tx["from"] = json!(self.config.from);

        let hash: String = self.rpc("eth_sendTransaction", json!([tx])).await?;
        let tx_hash = parse_tx_hash(&hash)?;
        debug!(tx = %tx_hash, "Transaction sent");

        self.wait_for_receipt(tx_hash).await
    }
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Debug, PartialEq, Eq)]
enum BundleStatus {
    Pending,
    Confirmed(Vec<TxHash>),
    Failed(String),
}

fn map_rpc_error(err: &RpcError) -> WalletError {
    match err.code {
        USER_REJECTED => WalletError::Rejected,
        UNSUPPORTED_METHOD | METHOD_NOT_FOUND => WalletError::Unsupported("the requested method"),
        EXECUTION_REVERTED => WalletError::Reverted(err.message.clone()),
        _ if err.message.to_lowercase().contains("revert") => {
            WalletError::Reverted(err.message.clone())
        }
        code => WalletError::Transport(format!("RPC error {}: {}", code, err.message)),
    }
}

/// A poll failure after the wallet accepted `reference`.
fn unconfirmed(reference: &str, err: WalletError) -> WalletError {
    warn!(%reference, error = %err, "⚠️  Lost track of submitted transaction");
    WalletError::Unconfirmed {
        reference: reference.to_string(),
        reason: err.to_string(),
    }
}

fn call_json(call: &Call) -> Value {
    json!({
        "to": call.target,
        "value": format!("0x{:x}", call.value),
        "data": format!("0x{}", hex::encode(&call.payload)),
    })
}

/// Read atomic support for `chain_id` from a capabilities map.
///
/// Accepts both the current `atomic.status` shape and the older
/// `atomicBatch.supported` flag.
fn parse_atomic_support(caps: &Value, chain_id: u64) -> bool {
    let key = format!("0x{:x}", chain_id);
    let Some(chain) = caps.get(&key).or_else(|| caps.get("0x0")) else {
        return false;
    };

    if let Some(status) = chain.pointer("/atomic/status").and_then(Value::as_str) {
        return matches!(status, "supported" | "ready");
    }
    chain
        .pointer("/atomicBatch/supported")
        .and_then(Value::as_bool)
        .unwrap_or(false)
}

fn parse_bundle_id(response: &Value) -> WalletResult<String> {
    response
        .as_str()
        .or_else(|| response.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .ok_or_else(|| WalletError::Transport("wallet_sendCalls returned no bundle id".into()))
}

fn parse_tx_hash(raw: &str) -> WalletResult<TxHash> {
    B256::from_str(raw).map_err(|e| WalletError::Transport(format!("bad tx hash {}: {}", raw, e)))
}

/// `Some(true)` for status 0x1, `Some(false)` for 0x0.
fn receipt_succeeded(receipt: &Value) -> Option<bool> {
    match receipt.get("status")? {
        Value::String(s) => Some(s != "0x0"),
        Value::Number(n) => Some(n.as_u64() != Some(0)),
        _ => None,
    }
}

/// Interpret a `wallet_getCallsStatus` result.
///
/// Numeric codes: 1xx pending, 200 confirmed, 4xx/5xx/6xx failed.
fn parse_calls_status(status: &Value) -> WalletResult<BundleStatus> {
    let code = match status.get("status") {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("pending") => 100,
        Some(Value::String(s)) if s.eq_ignore_ascii_case("confirmed") => 200,
        other => {
            return Err(WalletError::Transport(format!(
                "unrecognised bundle status {:?}",
                other
            )));
        }
    };

    match code {
        100..=199 => Ok(BundleStatus::Pending),
        200 => {
            let receipts = status
                .get("receipts")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default();

            if receipts.iter().any(|r| receipt_succeeded(r) == Some(false)) {
                return Ok(BundleStatus::Failed("bundle reverted on-chain".into()));
            }

            let tx_hashes = receipts
                .iter()
                .filter_map(|r| r.get("transactionHash").and_then(Value::as_str))
                .map(parse_tx_hash)
                .collect::<WalletResult<Vec<_>>>()?;
            if tx_hashes.is_empty() {
                warn!("⚠️  Confirmed bundle carried no receipts");
            }
            Ok(BundleStatus::Confirmed(tx_hashes))
        }
        400..=499 => Ok(BundleStatus::Failed("bundle was not included on-chain".into())),
        500..=599 => Ok(BundleStatus::Failed("bundle reverted on-chain".into())),
        600..=699 => Ok(BundleStatus::Failed("bundle partially reverted".into())),
        other => Err(WalletError::Transport(format!(
            "unrecognised bundle status code {}",
            other
        ))),
    }
}
