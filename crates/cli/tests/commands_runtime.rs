use std::env;
use std::sync::{Mutex, OnceLock};

use rise_cli::commands::chat::{self, ChatArgs};
use rise_cli::commands::{config, doctor, migrate, seed};
use rise_core::config::LoadOptions;
use serde_json::Value;

const IN_MEMORY: &[(&str, &str)] =
    &[("RISE_DATABASE_URL", "sqlite::memory:"), ("RISE_DATABASE_MAX_CONNECTIONS", "1")];

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(IN_MEMORY, || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
        assert!(payload["message"].as_str().unwrap_or("").starts_with("schema up to date"));
    });
}

#[test]
fn migrate_returns_config_failure_for_hosted_provider_without_key() {
    let mut vars = IN_MEMORY.to_vec();
    vars.push(("RISE_LLM_PROVIDER", "openai"));
    with_env(&vars, || {
        let result = migrate::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn seed_reports_each_demo_table() {
    with_env(IN_MEMORY, || {
        let result = seed::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0, "expected demo seed success");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "seed");
        assert_eq!(payload["status"], "ok");

        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.starts_with("demo catalog loaded:"));
        assert!(message.contains("  - equipment: 6 row(s)"));
        assert!(message.contains("  - labour: 5 row(s)"));
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_env(IN_MEMORY, || {
        let first = seed::run(&LoadOptions::default());
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");

        let second = seed::run(&LoadOptions::default());
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");

        assert_eq!(
            parse_payload(&first.output)["message"],
            parse_payload(&second.output)["message"]
        );
    });
}

#[test]
fn config_redacts_api_key_and_attributes_env_sources() {
    let mut vars = IN_MEMORY.to_vec();
    vars.extend([("RISE_LLM_PROVIDER", "groq"), ("RISE_LLM_API_KEY", "gsk_supersecretvalue")]);
    with_env(&vars, || {
        let result = config::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("supersecretvalue"), "api key must be redacted");
        assert!(result.output.contains("- llm.api_key = gsk_*** (source: env (RISE_LLM_API_KEY))"));
        assert!(result.output.contains("- llm.provider = groq (source: env (RISE_LLM_PROVIDER))"));
        assert!(result.output.contains("- agent.max_turns = 8 (source: default)"));
    });
}

#[test]
fn doctor_json_reports_each_check() {
    with_env(IN_MEMORY, || {
        let result = doctor::run(&LoadOptions::default(), true);
        assert_eq!(result.exit_code, 0, "expected all doctor checks to pass");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .map(|checks| {
                checks.iter().filter_map(|check| check["name"].as_str()).collect::<Vec<_>>()
            })
            .unwrap_or_default();
        assert_eq!(names, vec!["config_validation", "llm_configuration", "database_connectivity"]);
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_fails() {
    let mut vars = IN_MEMORY.to_vec();
    vars.push(("RISE_AGENT_MAX_TURNS", "not-a-number"));
    with_env(&vars, || {
        let result = doctor::run(&LoadOptions::default(), false);
        assert_eq!(result.exit_code, 2);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [skip] database_connectivity"));
    });
}

#[test]
fn chat_rejects_unknown_role_before_touching_the_store() {
    with_env(IN_MEMORY, || {
        let result = chat::run(
            &LoadOptions::default(),
            ChatArgs {
                role: "guest".to_string(),
                session: None,
                message: "show me the excavators".to_string(),
            },
        );
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "unknown_role");
    });
}

#[test]
fn chat_rejects_blank_messages() {
    with_env(IN_MEMORY, || {
        let result = chat::run(
            &LoadOptions::default(),
            ChatArgs { role: "admin".to_string(), session: None, message: "   ".to_string() },
        );

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "invalid_input");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "DATABASE_URL",
        "RISE_DATABASE_URL",
        "RISE_DATABASE_MAX_CONNECTIONS",
        "RISE_DATABASE_TIMEOUT_SECS",
        "RISE_LLM_PROVIDER",
        "RISE_LLM_API_KEY",
        "RISE_LLM_BASE_URL",
        "RISE_LLM_MODEL",
        "RISE_LLM_TEMPERATURE",
        "RISE_LLM_TIMEOUT_SECS",
        "RISE_LLM_MAX_RETRIES",
        "RISE_LLM_RETRY_BASE_DELAY_MS",
        "RISE_AGENT_MAX_TURNS",
        "RISE_AGENT_DETAILS_ROW_LIMIT",
        "RISE_SERVER_BIND_ADDRESS",
        "RISE_SERVER_PORT",
        "RISE_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "RISE_LOGGING_LEVEL",
        "RISE_LOGGING_FORMAT",
        "RISE_LOG_LEVEL",
        "RISE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        match value {
            Some(value) => env::set_var(key, value),
            None => env::remove_var(key),
        }
    }
}
