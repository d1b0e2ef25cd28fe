//! JSON-RPC helpers for talking to an Ethereum node.

use std::time::Duration;

use anyhow::Context;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

/// Timeout for a single RPC request.
pub(crate) const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Failure of a single JSON-RPC call.
#[derive(Debug, Error)]
pub enum RpcError {
    /// The request could not be sent or its response body could not be read.
    #[error("{method} request failed: {source}")]
    Transport {
        method: String,
        #[source]
        source: reqwest::Error,
    },

    /// The node answered with a JSON-RPC `error` member.
    #[error("{method} rejected by node ({code}): {message}")]
    Node {
        method: String,
        code: i64,
        message: String,
    },

    /// The node answered, but not with what was asked for.
    #[error("unexpected {method} response: {reason}")]
    Malformed { method: String, reason: String },
}

impl RpcError {
    /// Whether the request may have reached the node before the client gave up.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Transport { source, .. } if source.is_timeout())
    }
}

/// Create an HTTP client configured for JSON-RPC requests.
pub fn create_client() -> Result<reqwest::Client, anyhow::Error> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()
        .context("Failed to create HTTP client")
}

/// Make a JSON-RPC call and deserialize its `result`.
pub async fn json_rpc_call<T: DeserializeOwned>(
    client: &reqwest::Client,
    url: &str,
    method: &str,
    params: Vec<Value>,
) -> Result<T, RpcError> {
    let transport = |source| RpcError::Transport {
        method: method.to_string(),
        source,
    };

    let response: Value = client
        .post(url)
        .json(&serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        }))
        .send()
        .await
        .map_err(transport)?
        .json()
        .await
        .map_err(transport)?;

    decode_response(method, response)
}

/// Split a JSON-RPC response into its result or its error.
///
/// A `null` result deserializes into `Option<T>` as `None`.
fn decode_response<T: DeserializeOwned>(method: &str, mut response: Value) -> Result<T, RpcError> {
    if let Some(error) = response.get("error") {
        return Err(RpcError::Node {
            method: method.to_string(),
            code: error.get("code").and_then(Value::as_i64).unwrap_or_default(),
            message: error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
        });
    }

    let result = response
        .get_mut("result")
        .map(Value::take)
        .ok_or_else(|| RpcError::Malformed {
            method: method.to_string(),
            reason: "no result member".to_string(),
        })?;

    serde_json::from_value(result).map_err(|e| RpcError::Malformed {
        method: method.to_string(),
        reason: e.to_string(),
    })
}

/// Parse a `0x`-prefixed hex quantity.
pub fn parse_quantity(value: &str) -> Result<u64, anyhow::Error> {
    u64::from_str_radix(value.trim_start_matches("0x"), 16)
        .with_context(|| format!("Invalid hex quantity: {}", value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity("0x1").unwrap(), 1);
        assert_eq!(parse_quantity("0x7a69").unwrap(), 31337);
        assert!(parse_quantity("0xzz").is_err());
    }

    #[test]
    fn test_decode_node_error_keeps_code() {
        let response = serde_json::json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": {"code": -32000, "message": "sender account not recognized"}
        });

        let err = decode_response::<String>("eth_sendTransaction", response).unwrap_err();
        assert!(!err.is_timeout());
        match err {
            RpcError::Node { code, message, .. } => {
                assert_eq!(code, -32000);
                assert_eq!(message, "sender account not recognized");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_decode_null_result() {
        let response = serde_json::json!({"jsonrpc": "2.0", "id": 1, "result": null});
        let result: Option<String> = decode_response("eth_getTransactionReceipt", response).unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_decode_missing_result() {
        let response = serde_json::json!({"jsonrpc": "2.0", "id": 1});
        let err = decode_response::<String>("eth_chainId", response).unwrap_err();
        assert!(matches!(err, RpcError::Malformed { .. }));
    }
}
