use crate::error::{ProbeError, Result};
use crate::types::ProbeType;
use futures::future::BoxFuture;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use uuid::Uuid;

pub const MULTI_GET_OBJECT_COUNT: usize = 20;

const AUCTION_PACKAGE_ID: &str =
    "0x7bfe75f51565a2e03e169c85a50c490ee707692a14d5417e2b97740da0d48627";

/// Capability to issue one request against one endpoint and time it.
///
/// Implementations own their timeout; the engine only sees the elapsed time
/// or the failure.
pub trait Transport: Send + Sync {
    fn probe<'a>(
        &'a self,
        endpoint: &'a str,
        probe: ProbeType,
    ) -> BoxFuture<'a, std::result::Result<Duration, ProbeError>>;
}

pub fn millis(elapsed: Duration) -> f64 {
    elapsed.as_micros() as f64 / 1000.0
}

/// A random 32-byte Sui address, `0x` followed by 64 hex digits
pub fn random_address() -> String {
    format!(
        "0x{}{}",
        Uuid::new_v4().simple(),
        Uuid::new_v4().simple()
    )
}

pub fn request_body(probe: ProbeType) -> Value {
    match probe {
        ProbeType::MultiGetObjects => {
            let ids: Vec<String> = (0..MULTI_GET_OBJECT_COUNT)
                .map(|_| random_address())
                .collect();
            json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "sui_multiGetObjects",
                "params": [
                    ids,
                    { "showContent": true, "showType": true, "showDisplay": true }
                ]
            })
        }
        ProbeType::QueryTransactionBlocks => json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "suix_queryTransactionBlocks",
            "params": [
                {
                    "filter": {
                        "MoveFunction": {
                            "package": AUCTION_PACKAGE_ID,
                            "module": "auction",
                            "function": "admin_creates_auction"
                        }
                    },
                    "options": {
                        "showEffects": true,
                        "showObjectChanges": true,
                        "showInput": true
                    }
                },
                null,
                null,
                false
            ]
        }),
        ProbeType::Ping => json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": "sui_getLatestCheckpointSequenceNumber",
            "params": []
        }),
    }
}

pub struct JsonRpcTransport {
    client: Client,
}

impl JsonRpcTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    async fn send(
        &self,
        endpoint: &str,
        probe: ProbeType,
    ) -> std::result::Result<Duration, ProbeError> {
        let body = request_body(probe);
        let request_start = Instant::now();

        let response = self.client.post(endpoint).json(&body).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(ProbeError::Status(status.as_u16()));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|e| ProbeError::InvalidResponse(e.to_string()))?;
        let elapsed = request_start.elapsed();

        check_rpc_payload(&payload)?;
        Ok(elapsed)
    }
}

impl Transport for JsonRpcTransport {
    fn probe<'a>(
        &'a self,
        endpoint: &'a str,
        probe: ProbeType,
    ) -> BoxFuture<'a, std::result::Result<Duration, ProbeError>> {
        Box::pin(self.send(endpoint, probe))
    }
}

fn check_rpc_payload(payload: &Value) -> std::result::Result<(), ProbeError> {
    if let Some(error) = payload.get("error") {
        let code = error.get("code").and_then(Value::as_i64).unwrap_or_default();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string();
        return Err(ProbeError::Rpc { code, message });
    }

    if payload.get("result").is_none() {
        return Err(ProbeError::InvalidResponse(
            "missing result member".to_string(),
        ));
    }

    Ok(())
}
