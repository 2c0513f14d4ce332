//! Ledger gateway client.
//!
//! The ledger is an external collaborator reached through a narrow contract:
//! sign-and-submit a canonical payload, then await the transaction receipt.
//! The production implementation talks JSON-RPC to a signal gateway and
//! signs payloads with the process-wide HMAC credential. Nonce selection is
//! re-read immediately before each submission under a credential-wide lock,
//! so concurrent relay attempts from the same credential serialize at the
//! nonce-acquisition point instead of colliding.

use std::time::Duration;

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::{Instant, sleep};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::payload::SignalTxPayload;

type HmacSha256 = Hmac<Sha256>;

/// Errors surfaced by the ledger client. Every variant is terminal for the
/// attempt that produced it; retry is an explicit external action.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("invalid ledger credential: {0}")]
    Credential(String),
    #[error("failed to sign transaction payload: {0}")]
    Signing(String),
    #[error("ledger rpc error: {0}")]
    Rpc(String),
    #[error("ledger rejected transaction: {0}")]
    Rejected(String),
}

/// Outcome of awaiting a transaction receipt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReceiptOutcome {
    /// The transaction confirmed with a success status.
    Success,
    /// The transaction confirmed but its execution failed.
    Failure,
    /// No receipt arrived within the timeout. The transaction may still
    /// confirm on-chain later; reconciliation is an operator action.
    Timeout,
}

/// Process-wide signing credential, zeroized on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Credential(Vec<u8>);

impl Credential {
    /// Parse a hex-encoded credential.
    pub fn from_hex(hex_str: &str) -> Result<Self, LedgerError> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| LedgerError::Credential(format!("not valid hex: {e}")))?;
        if bytes.is_empty() {
            return Err(LedgerError::Credential("credential is empty".to_string()));
        }
        Ok(Self(bytes))
    }

    /// Short public fingerprint for logs and the status endpoint.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(&self.0);
        hex::encode(&digest[..4])
    }

    /// Derived account identifier used for nonce lookups.
    pub fn account_id(&self) -> String {
        let digest = Sha256::digest(&self.0);
        format!("0x{}", hex::encode(&digest[..20]))
    }

    fn sign(&self, message: &[u8]) -> Result<String, LedgerError> {
        let mut mac = HmacSha256::new_from_slice(&self.0)
            .map_err(|e| LedgerError::Signing(e.to_string()))?;
        mac.update(message);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Credential")
            .field(&self.fingerprint())
            .finish()
    }
}

/// A signed transaction ready for submission.
#[derive(Debug, Clone, Serialize)]
pub struct SignedTx {
    pub sender: String,
    pub nonce: u64,
    pub payload: SignalTxPayload,
    pub signature: String,
}

/// Contract for the external ledger collaborator.
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Assemble, sign, and submit a transaction for the payload; returns the
    /// transaction hash once the network has accepted the submission.
    async fn sign_and_submit(&self, payload: &SignalTxPayload) -> Result<String, LedgerError>;

    /// Block until the transaction confirms, fails, or the timeout elapses.
    async fn await_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<ReceiptOutcome, LedgerError>;
}

/// JSON-RPC client for the ledger signal gateway.
pub struct JsonRpcLedger {
    client: reqwest::Client,
    endpoint: String,
    credential: Credential,
    receipt_poll: Duration,
    /// Serializes nonce acquisition + submission per credential.
    nonce_lock: Mutex<()>,
}

impl JsonRpcLedger {
    pub fn new(
        endpoint: String,
        credential: Credential,
        receipt_poll: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("watchtower/", env!("CARGO_PKG_VERSION")))
            .build()
            .expect("reqwest client builds");

        Self {
            client,
            endpoint,
            credential,
            receipt_poll,
            nonce_lock: Mutex::new(()),
        }
    }

    pub fn credential_fingerprint(&self) -> String {
        self.credential.fingerprint()
    }

    async fn rpc(&self, method: &str, params: JsonValue) -> Result<JsonValue, LedgerError> {
        let request = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| LedgerError::Rpc(format!("{method}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(LedgerError::Rpc(format!(
                "{method}: gateway returned {status}"
            )));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|e| LedgerError::Rpc(format!("{method}: malformed response: {e}")))?;

        if let Some(error) = body.error {
            return Err(LedgerError::Rejected(format!(
                "{method}: {} (code {})",
                error.message, error.code
            )));
        }

        Ok(body.result.unwrap_or(JsonValue::Null))
    }

    async fn fetch_nonce(&self) -> Result<u64, LedgerError> {
        let result = self
            .rpc("wt_getNonce", json!([self.credential.account_id()]))
            .await?;

        result
            .as_u64()
            .ok_or_else(|| LedgerError::Rpc(format!("wt_getNonce: non-numeric nonce {result}")))
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn sign_and_submit(&self, payload: &SignalTxPayload) -> Result<String, LedgerError> {
        // Nonce is re-read under the lock immediately before submission, and
        // the lock is held through the submit so a concurrent attempt cannot
        // reuse it.
        let _guard = self.nonce_lock.lock().await;

        let nonce = self.fetch_nonce().await?;

        let mut message = payload.canonical_bytes();
        message.extend_from_slice(&nonce.to_be_bytes());
        let signature = self.credential.sign(&message)?;

        let tx = SignedTx {
            sender: self.credential.account_id(),
            nonce,
            payload: payload.clone(),
            signature,
        };

        let result = self
            .rpc(
                "wt_submitSignal",
                json!([serde_json::to_value(&tx).expect("tx serializes")]),
            )
            .await?;

        let tx_hash = result
            .as_str()
            .ok_or_else(|| {
                LedgerError::Rpc(format!("wt_submitSignal: non-string tx hash {result}"))
            })?
            .to_string();

        tracing::info!(tx_hash = %tx_hash, nonce, "Signal transaction submitted");
        Ok(tx_hash)
    }

    async fn await_receipt(
        &self,
        tx_hash: &str,
        timeout: Duration,
    ) -> Result<ReceiptOutcome, LedgerError> {
        let deadline = Instant::now() + timeout;

        loop {
            let result = self.rpc("wt_getReceipt", json!([tx_hash])).await?;

            if let Some(status) = result.get("status").and_then(JsonValue::as_str) {
                match status {
                    "success" => return Ok(ReceiptOutcome::Success),
                    "failed" => return Ok(ReceiptOutcome::Failure),
                    // Anything else means still in flight.
                    _ => {}
                }
            }

            if Instant::now() + self.receipt_poll > deadline {
                return Ok(ReceiptOutcome::Timeout);
            }
            sleep(self.receipt_poll).await;
        }
    }
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    result: Option<JsonValue>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Severity;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn credential_rejects_bad_hex() {
        assert!(Credential::from_hex("not hex").is_err());
        assert!(Credential::from_hex("").is_err());
        assert!(Credential::from_hex("deadbeef").is_ok());
    }

    #[test]
    fn signatures_are_deterministic_per_credential() {
        let cred_a = Credential::from_hex("deadbeef").unwrap();
        let cred_b = Credential::from_hex("cafebabe").unwrap();

        let sig_a1 = cred_a.sign(b"message").unwrap();
        let sig_a2 = cred_a.sign(b"message").unwrap();
        let sig_b = cred_b.sign(b"message").unwrap();

        assert_eq!(sig_a1, sig_a2);
        assert_ne!(sig_a1, sig_b);
    }

    #[test]
    fn debug_output_shows_only_fingerprint() {
        let cred = Credential::from_hex("deadbeefcafebabe").unwrap();
        let debug = format!("{:?}", cred);
        assert!(!debug.contains("deadbeefcafebabe"));
        assert!(debug.contains(&cred.fingerprint()));
    }

    #[test]
    fn signed_tx_serializes_with_payload() {
        let cred = Credential::from_hex("deadbeef").unwrap();
        let payload =
            SignalTxPayload::build(Uuid::new_v4(), Severity::High, &json!({"m": 1}), 5, 1);
        let mut message = payload.canonical_bytes();
        message.extend_from_slice(&7u64.to_be_bytes());

        let tx = SignedTx {
            sender: cred.account_id(),
            nonce: 7,
            payload,
            signature: cred.sign(&message).unwrap(),
        };

        let value = serde_json::to_value(&tx).unwrap();
        assert_eq!(value["nonce"], 7);
        assert_eq!(value["payload"]["severity_level"], 3);
        assert!(value["signature"].as_str().unwrap().len() == 64);
    }
}
