//! Service descriptor resolution from locally stored operator configuration.
//!
//! A service root holds one directory per deployed service, each with a
//! `config.json`. Roots are tried in priority order; within a root the
//! most-recently-modified service directory wins.

use crate::error::ConfigError;
use alloy::primitives::Address;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::SystemTime;

pub const DEFAULT_AGENT_ID: u64 = 14;

/// Identifies one deployed service instance. Constructed once per run,
/// immutable thereafter.
#[derive(Debug, Clone)]
pub struct ServiceDescriptor {
    pub service_id: u64,
    pub multisig_address: Option<Address>,
    pub agent_address: Option<Address>,
    pub staking_contract_address: Address,
    pub staking_program_id: String,
    pub agent_id: u64,
    pub rpc_candidates: Vec<String>,
}

/// Everything the extractor could find, before required-field validation.
/// Missing keys land as `None` instead of failing the parse.
#[derive(Debug, Default)]
pub struct RawServiceFields {
    pub service_id: Option<u64>,
    pub multisig_address: Option<String>,
    pub agent_address: Option<String>,
    pub staking_contract_address: Option<String>,
    pub staking_program_id: Option<String>,
    pub agent_id: Option<u64>,
    pub rpc: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
struct UserParams {
    staking_program_id: Option<String>,
    agent_id: Option<u64>,
}

/// Candidate service roots, highest priority first. The env override takes a
/// comma-separated list; the operator home default applies otherwise.
pub fn default_service_roots() -> Vec<PathBuf> {
    if let Ok(raw) = std::env::var("STAKING_REPORT_SERVICE_ROOTS") {
        let roots: Vec<PathBuf> = raw
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(PathBuf::from)
            .collect();
        if !roots.is_empty() {
            return roots;
        }
    }
    match std::env::var_os("HOME") {
        Some(home) => vec![PathBuf::from(home).join(".operate").join("services")],
        None => Vec::new(),
    }
}

/// Resolves the active service configuration from the given roots.
pub fn resolve(roots: &[PathBuf]) -> Result<ServiceDescriptor, ConfigError> {
    for root in roots {
        let Some(service_dir) = most_recent_service_dir(root) else {
            continue;
        };
        let config_path = service_dir.join("config.json");
        if !config_path.is_file() {
            continue;
        }
        tracing::info!("[CONFIG] Loading service from {}", service_dir.display());
        let raw = std::fs::read_to_string(&config_path)
            .map_err(|err| ConfigError::InvalidConfig(format!("{}: {err}", config_path.display())))?;
        let config: Value = serde_json::from_str(&raw)
            .map_err(|err| ConfigError::InvalidConfig(format!("{}: {err}", config_path.display())))?;
        let fields = extract_fields(&config);
        return validate(fields);
    }
    Err(ConfigError::NoServiceFound {
        searched: roots.len(),
    })
}

fn most_recent_service_dir(root: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(root).ok()?;
    let mut best: Option<(SystemTime, PathBuf)> = None;
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        match &best {
            Some((current, _)) if *current >= modified => {}
            _ => best = Some((modified, path)),
        }
    }
    best.map(|(_, path)| path)
}

/// Defensive extraction: any absent key yields `None`, never an error.
pub fn extract_fields(config: &Value) -> RawServiceFields {
    let home_chain = config
        .get("home_chain")
        .and_then(Value::as_str)
        .unwrap_or("gnosis");
    let chain_config = config
        .get("chain_configs")
        .and_then(|chains| chains.get(home_chain));
    let chain_data = chain_config.and_then(|chain| chain.get("chain_data"));

    let user_params: UserParams = chain_data
        .and_then(|data| data.get("user_params"))
        .cloned()
        .and_then(|params| serde_json::from_value(params).ok())
        .unwrap_or_default();

    RawServiceFields {
        service_id: chain_data
            .and_then(|data| data.get("token"))
            .and_then(Value::as_u64),
        multisig_address: chain_data
            .and_then(|data| data.get("multisig"))
            .and_then(Value::as_str)
            .map(str::to_string),
        agent_address: config
            .get("agent_addresses")
            .and_then(Value::as_array)
            .and_then(|addrs| addrs.first())
            .and_then(Value::as_str)
            .map(str::to_string),
        staking_contract_address: config
            .get("env_variables")
            .and_then(|vars| vars.get("STAKING_CONTRACT_ADDRESS"))
            .and_then(|var| var.get("value"))
            .and_then(Value::as_str)
            .map(str::to_string),
        staking_program_id: user_params.staking_program_id,
        agent_id: user_params.agent_id,
        rpc: chain_config
            .and_then(|chain| chain.get("ledger_config"))
            .and_then(|ledger| ledger.get("rpc"))
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

/// Checks the required subset before the evaluator ever runs: service id,
/// multisig, staking contract and RPC. Absence of any one is fatal.
pub fn validate(fields: RawServiceFields) -> Result<ServiceDescriptor, ConfigError> {
    let service_id = fields
        .service_id
        .filter(|id| *id > 0)
        .ok_or(ConfigError::IncompleteConfiguration { field: "service_id" })?;
    let multisig_raw = fields
        .multisig_address
        .ok_or(ConfigError::IncompleteConfiguration { field: "multisig" })?;
    let staking_raw = fields
        .staking_contract_address
        .ok_or(ConfigError::IncompleteConfiguration {
            field: "staking_contract",
        })?;
    let rpc = fields
        .rpc
        .ok_or(ConfigError::IncompleteConfiguration { field: "rpc" })?;

    let multisig_address = parse_address("multisig", &multisig_raw)?;
    let staking_contract_address = parse_address("staking_contract", &staking_raw)?;
    let agent_address = match fields.agent_address {
        Some(raw) => Some(parse_address("agent_address", &raw)?),
        None => None,
    };

    Ok(ServiceDescriptor {
        service_id,
        multisig_address: Some(multisig_address),
        agent_address,
        staking_contract_address,
        staking_program_id: fields
            .staking_program_id
            .unwrap_or_else(|| "unknown".to_string()),
        agent_id: fields.agent_id.unwrap_or(DEFAULT_AGENT_ID),
        rpc_candidates: vec![rpc],
    })
}

fn parse_address(field: &'static str, raw: &str) -> Result<Address, ConfigError> {
    Address::from_str(raw.trim())
        .map_err(|err| ConfigError::InvalidConfig(format!("{field} `{raw}`: {err}")))
}
