use std::time::Duration;

/// Public fallback endpoints appended after the configured RPC. Ordered by
/// observed reliability; the connect loop walks them sequentially.
const GNOSIS_PUBLIC_RPCS: &[&str] = &[
    "https://rpc-gate.autonolas.tech/gnosis-rpc/",
    "https://rpc.gnosis.gateway.fm",
    "https://rpc.gnosischain.com",
];

const DEFAULT_RPC_PROBE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone)]
pub struct ChainConfig {
    pub chain_id: u64,
    pub name: String,
    /// Symbol used when displaying gas-token amounts.
    pub native_symbol: String,
    /// Symbol of the staking token (deposits, bonds, rewards).
    pub staking_token_symbol: String,
    pub public_rpc_fallbacks: Vec<String>,
    pub rpc_probe_timeout: Duration,
}

impl ChainConfig {
    pub fn get(chain_id: u64) -> Self {
        match chain_id {
            100 => Self::gnosis(),
            _ => Self::gnosis(),
        }
    }

    pub fn gnosis() -> Self {
        Self {
            chain_id: 100,
            name: "Gnosis Chain".to_string(),
            native_symbol: "xDAI".to_string(),
            staking_token_symbol: "OLAS".to_string(),
            public_rpc_fallbacks: Self::default_public_rpc_urls(100),
            rpc_probe_timeout: Duration::from_millis(DEFAULT_RPC_PROBE_TIMEOUT_MS),
        }
    }

    pub fn default_public_rpc_urls(chain_id: u64) -> Vec<String> {
        let urls = match chain_id {
            100 => GNOSIS_PUBLIC_RPCS,
            _ => GNOSIS_PUBLIC_RPCS,
        };
        urls.iter().map(|url| (*url).to_string()).collect()
    }

    /// Ordered candidate list for connection: the service's configured RPCs
    /// first, then the public fallbacks, with duplicates removed.
    pub fn rpc_candidates(&self, configured: &[String]) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::new();
        for url in configured.iter().chain(self.public_rpc_fallbacks.iter()) {
            if !candidates.iter().any(|seen| seen == url) {
                candidates.push(url.clone());
            }
        }
        candidates
    }
}

pub fn rpc_probe_timeout_from_env(default: Duration) -> Duration {
    std::env::var("STAKING_REPORT_RPC_TIMEOUT_MS")
        .ok()
        .and_then(|raw| raw.trim().parse::<u64>().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gnosis_is_default_chain() {
        let config = ChainConfig::get(0);
        assert_eq!(config.chain_id, 100);
        assert_eq!(config.staking_token_symbol, "OLAS");
        assert!(!config.public_rpc_fallbacks.is_empty());
    }

    #[test]
    fn candidates_keep_configured_rpc_first_and_dedupe() {
        let config = ChainConfig::gnosis();
        let configured = vec![
            "https://example.invalid/rpc".to_string(),
            "https://rpc.gnosischain.com".to_string(),
        ];
        let candidates = config.rpc_candidates(&configured);
        assert_eq!(candidates[0], "https://example.invalid/rpc");
        assert_eq!(
            candidates
                .iter()
                .filter(|url| url.as_str() == "https://rpc.gnosischain.com")
                .count(),
            1
        );
        assert_eq!(candidates.len(), 1 + config.public_rpc_fallbacks.len());
    }
}
