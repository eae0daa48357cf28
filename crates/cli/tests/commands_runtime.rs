use std::env;
use std::sync::{Mutex, OnceLock};

use safework_cli::commands::{migrate, seed};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(
        &[
            ("SAFEWORK_DATABASE_URL", "sqlite::memory:"),
            ("SAFEWORK_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = migrate::run();
            assert_eq!(result.exit_code, 0, "expected successful migrate run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "migrate");
            assert_eq!(payload["status"], "ok");
        },
    );
}

#[test]
fn migrate_returns_config_failure_when_validation_trips() {
    // Enabling the mail gateway without a URL fails config validation.
    with_env(&[("SAFEWORK_NOTIFY_ENABLED", "true")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_loads_the_demo_dataset() {
    with_env(
        &[
            ("SAFEWORK_DATABASE_URL", "sqlite::memory:"),
            ("SAFEWORK_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let result = seed::run();
            assert_eq!(result.exit_code, 0, "expected successful seed run");

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "seed");
            assert_eq!(payload["status"], "ok");

            let message = payload["message"].as_str().unwrap_or("");
            assert!(message.contains("4 users"));
            assert!(message.contains("3 approval requests"));
        },
    );
}

#[test]
fn seed_output_is_deterministic_across_runs() {
    with_env(
        &[
            ("SAFEWORK_DATABASE_URL", "sqlite::memory:"),
            ("SAFEWORK_DATABASE_MAX_CONNECTIONS", "1"),
        ],
        || {
            let first = seed::run();
            assert_eq!(first.exit_code, 0, "expected first seed invocation success");

            let second = seed::run();
            assert_eq!(second.exit_code, 0, "expected second seed invocation success");

            let first_payload = parse_payload(&first.output);
            let second_payload = parse_payload(&second.output);
            assert_eq!(first_payload["message"], second_payload["message"]);
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SAFEWORK_DATABASE_URL",
        "SAFEWORK_DATABASE_MAX_CONNECTIONS",
        "SAFEWORK_DATABASE_TIMEOUT_SECS",
        "SAFEWORK_SERVER_BIND_ADDRESS",
        "SAFEWORK_SERVER_API_PORT",
        "SAFEWORK_SERVER_HEALTH_CHECK_PORT",
        "SAFEWORK_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "SAFEWORK_NOTIFY_ENABLED",
        "SAFEWORK_NOTIFY_GATEWAY_URL",
        "SAFEWORK_NOTIFY_API_TOKEN",
        "SAFEWORK_NOTIFY_FROM_ADDRESS",
        "SAFEWORK_NOTIFY_TIMEOUT_SECS",
        "SAFEWORK_NOTIFY_MAX_RETRIES",
        "SAFEWORK_LOGGING_LEVEL",
        "SAFEWORK_LOGGING_FORMAT",
        "SAFEWORK_LOG_LEVEL",
        "SAFEWORK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
