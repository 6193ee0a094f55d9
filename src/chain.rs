use crate::error::RpcError;
use alloy::primitives::Address;
use alloy::providers::{Provider, RootProvider};
use alloy::rpc::types::{TransactionInput, TransactionRequest};
use alloy::sol_types::SolCall;
use alloy::transports::http::{Client, Http};
use std::time::Duration;

/// Diagnostics kept short so a noisy provider error cannot flood the report.
const REASON_MAX_CHARS: usize = 80;

pub type HttpProvider = RootProvider<Http<Client>>;

/// Outcome of a single view call. `Unavailable` means "unknown", never zero;
/// callers must not substitute defaults for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reading<T> {
    Value(T),
    Unavailable { reason: String },
}

impl<T> Reading<T> {
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable {
            reason: truncate_reason(&reason.into()),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Reading<U> {
        match self {
            Self::Value(value) => Reading::Value(f(value)),
            Self::Unavailable { reason } => Reading::Unavailable { reason },
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(value) => Some(value),
            Self::Unavailable { .. } => None,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

pub fn truncate_reason(reason: &str) -> String {
    let cleaned = reason.replace('\n', " ");
    match cleaned.char_indices().nth(REASON_MAX_CHARS) {
        Some((idx, _)) => format!("{}…", &cleaned[..idx]),
        None => cleaned,
    }
}

/// A live connection to the first reachable endpoint from an ordered
/// candidate list. One connection per run; dropped on exit.
pub struct Connection {
    provider: HttpProvider,
    endpoint: String,
    call_timeout: Duration,
}

impl Connection {
    /// Probes candidates in order with a bounded per-endpoint timeout.
    /// Fallback is across candidates only; a candidate that fails its probe
    /// is never retried.
    pub async fn establish(
        candidates: &[String],
        probe_timeout: Duration,
    ) -> Result<Self, RpcError> {
        for url in candidates {
            let parsed = match url.parse() {
                Ok(parsed) => parsed,
                Err(err) => {
                    tracing::warn!("[RPC] Skipping malformed endpoint `{}`: {}", url, err);
                    continue;
                }
            };
            let provider = RootProvider::<Http<Client>>::new_http(parsed);
            match tokio::time::timeout(probe_timeout, provider.get_block_number()).await {
                Ok(Ok(head)) => {
                    tracing::info!("[RPC] Connected to {} (head block {})", url, head);
                    return Ok(Self {
                        provider,
                        endpoint: url.clone(),
                        call_timeout: probe_timeout,
                    });
                }
                Ok(Err(err)) => {
                    tracing::warn!(
                        "[RPC] Probe failed for {}: {}",
                        url,
                        truncate_reason(&err.to_string())
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        "[RPC] Probe timed out for {} after {:?}",
                        url,
                        probe_timeout
                    );
                }
            }
        }
        Err(RpcError::NoReachableEndpoint {
            attempted: candidates.len(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Executes a typed view call. Reverts, decode mismatches, transport
    /// errors and timeouts all fold into `Unavailable`; a contract-level
    /// failure is deterministic, so nothing here retries.
    pub async fn view_call<C: SolCall>(&self, to: Address, call: C) -> Reading<C::Return> {
        let req = TransactionRequest::default()
            .to(to)
            .input(TransactionInput::new(call.abi_encode().into()));
        match tokio::time::timeout(self.call_timeout, self.provider.call(&req)).await {
            Ok(Ok(raw)) => match C::abi_decode_returns(raw.as_ref(), true) {
                Ok(decoded) => Reading::Value(decoded),
                Err(err) => {
                    tracing::debug!("[RPC] Decode failed for {}: {}", C::SIGNATURE, err);
                    Reading::unavailable(format!("decode {}: {}", C::SIGNATURE, err))
                }
            },
            Ok(Err(err)) => {
                tracing::debug!("[RPC] Call failed for {}: {}", C::SIGNATURE, err);
                Reading::unavailable(err.to_string())
            }
            Err(_) => Reading::unavailable(format!(
                "{} timed out after {:?}",
                C::SIGNATURE,
                self.call_timeout
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_map_preserves_unavailable_reason() {
        let reading: Reading<u64> = Reading::unavailable("execution reverted");
        let mapped = reading.map(|v| v + 1);
        assert_eq!(
            mapped,
            Reading::Unavailable {
                reason: "execution reverted".to_string()
            }
        );
    }

    #[test]
    fn truncate_caps_long_diagnostics() {
        let long = "x".repeat(300);
        let truncated = truncate_reason(&long);
        assert!(truncated.chars().count() <= REASON_MAX_CHARS + 1);
        assert!(truncated.ends_with('…'));
    }

    #[test]
    fn truncate_keeps_short_diagnostics_intact() {
        assert_eq!(truncate_reason("revert"), "revert");
    }

    #[tokio::test]
    async fn establish_fails_when_no_candidate_is_reachable() {
        let candidates = vec!["not a url".to_string()];
        let err = Connection::establish(&candidates, Duration::from_millis(50))
            .await
            .err()
            .expect("no endpoint should be reachable");
        assert!(matches!(err, RpcError::NoReachableEndpoint { attempted: 1 }));
    }
}
