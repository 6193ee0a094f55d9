//! Service-root discovery against on-disk fixtures.

use staking_report::descriptor::{self, DEFAULT_AGENT_ID};
use staking_report::error::ConfigError;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, OnceLock};
use std::time::Duration;

fn env_lock() -> &'static Mutex<()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
}

fn unique_root(prefix: &str) -> PathBuf {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::SeqCst);
    std::env::temp_dir().join(format!(
        "staking_report_{}_{}_{}",
        prefix,
        std::process::id(),
        id
    ))
}

fn complete_config(service_id: u64) -> String {
    format!(
        r#"{{
            "home_chain": "gnosis",
            "agent_addresses": ["0x52f8aC3d5A6B18bc0400fDcB7cd1316711f73b17"],
            "env_variables": {{
                "STAKING_CONTRACT_ADDRESS": {{
                    "value": "0x2540Ea7b11a557957a913E7Ef314A9aF28472c08"
                }}
            }},
            "chain_configs": {{
                "gnosis": {{
                    "ledger_config": {{ "rpc": "https://rpc.gnosischain.com" }},
                    "chain_data": {{
                        "token": {service_id},
                        "multisig": "0x77b783e911F4398D75908Cc3C9b6Eeb8974f8B64"
                    }}
                }}
            }}
        }}"#
    )
}

fn write_service(root: &PathBuf, name: &str, config: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.json"), config).unwrap();
}

#[test]
fn most_recent_service_dir_wins_within_a_root() {
    let root = unique_root("recent");
    write_service(&root, "older_service", &complete_config(1));
    // Directory mtimes order the candidates; make the second strictly newer.
    std::thread::sleep(Duration::from_millis(50));
    write_service(&root, "newer_service", &complete_config(2));

    let descriptor = descriptor::resolve(&[root.clone()]).unwrap();
    assert_eq!(descriptor.service_id, 2);
    assert_eq!(descriptor.agent_id, DEFAULT_AGENT_ID);
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn roots_are_tried_in_priority_order() {
    let primary = unique_root("primary");
    let secondary = unique_root("secondary");
    write_service(&primary, "service", &complete_config(10));
    write_service(&secondary, "service", &complete_config(20));

    let descriptor = descriptor::resolve(&[primary.clone(), secondary.clone()]).unwrap();
    assert_eq!(descriptor.service_id, 10);

    // An empty primary root falls through to the next candidate.
    let empty = unique_root("empty");
    std::fs::create_dir_all(&empty).unwrap();
    let descriptor = descriptor::resolve(&[empty.clone(), secondary.clone()]).unwrap();
    assert_eq!(descriptor.service_id, 20);

    for root in [primary, secondary, empty] {
        std::fs::remove_dir_all(&root).ok();
    }
}

#[test]
fn no_service_anywhere_is_fatal() {
    let missing = unique_root("missing");
    let err = descriptor::resolve(&[missing]).unwrap_err();
    assert!(matches!(err, ConfigError::NoServiceFound { searched: 1 }));
}

#[test]
fn incomplete_config_is_fatal() {
    let root = unique_root("incomplete");
    write_service(&root, "service", r#"{"home_chain": "gnosis"}"#);
    let err = descriptor::resolve(&[root.clone()]).unwrap_err();
    assert!(matches!(err, ConfigError::IncompleteConfiguration { .. }));
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn malformed_json_is_invalid_config() {
    let root = unique_root("malformed");
    write_service(&root, "service", "{not json");
    let err = descriptor::resolve(&[root.clone()]).unwrap_err();
    assert!(matches!(err, ConfigError::InvalidConfig(_)));
    std::fs::remove_dir_all(&root).ok();
}

#[test]
fn service_roots_env_override_is_a_comma_separated_list() {
    let _guard = env_lock().lock().unwrap();
    std::env::set_var("STAKING_REPORT_SERVICE_ROOTS", "/tmp/a, /tmp/b");
    let roots = descriptor::default_service_roots();
    std::env::remove_var("STAKING_REPORT_SERVICE_ROOTS");
    assert_eq!(roots, vec![PathBuf::from("/tmp/a"), PathBuf::from("/tmp/b")]);
}
