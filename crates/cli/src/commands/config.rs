use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use rise_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

use crate::commands::{load_config, try_step, CommandResult};

struct Field {
    key: &'static str,
    env_keys: &'static [&'static str],
    value: String,
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let api_key = config.llm.api_key.as_ref().map(|key| redact_secret(key.expose_secret()));
    vec![
        Field {
            key: "database.url",
            env_keys: &["RISE_DATABASE_URL", "DATABASE_URL"],
            value: config.database.url.clone(),
        },
        Field {
            key: "database.max_connections",
            env_keys: &["RISE_DATABASE_MAX_CONNECTIONS"],
            value: config.database.max_connections.to_string(),
        },
        Field {
            key: "database.timeout_secs",
            env_keys: &["RISE_DATABASE_TIMEOUT_SECS"],
            value: config.database.timeout_secs.to_string(),
        },
        Field {
            key: "llm.provider",
            env_keys: &["RISE_LLM_PROVIDER"],
            value: format!("{:?}", config.llm.provider).to_ascii_lowercase(),
        },
        Field {
            key: "llm.model",
            env_keys: &["RISE_LLM_MODEL"],
            value: config.llm.model.clone(),
        },
        Field {
            key: "llm.base_url",
            env_keys: &["RISE_LLM_BASE_URL"],
            value: config.llm.endpoint_base().to_string(),
        },
        Field {
            key: "llm.api_key",
            env_keys: &["RISE_LLM_API_KEY"],
            value: api_key.unwrap_or_else(|| "<unset>".to_string()),
        },
        Field {
            key: "llm.temperature",
            env_keys: &["RISE_LLM_TEMPERATURE"],
            value: config.llm.temperature.to_string(),
        },
        Field {
            key: "llm.max_retries",
            env_keys: &["RISE_LLM_MAX_RETRIES"],
            value: config.llm.max_retries.to_string(),
        },
        Field {
            key: "agent.max_turns",
            env_keys: &["RISE_AGENT_MAX_TURNS"],
            value: config.agent.max_turns.to_string(),
        },
        Field {
            key: "agent.details_row_limit",
            env_keys: &["RISE_AGENT_DETAILS_ROW_LIMIT"],
            value: config.agent.details_row_limit.to_string(),
        },
        Field {
            key: "server.bind_address",
            env_keys: &["RISE_SERVER_BIND_ADDRESS"],
            value: config.server.bind_address.clone(),
        },
        Field {
            key: "server.port",
            env_keys: &["RISE_SERVER_PORT"],
            value: config.server.port.to_string(),
        },
        Field {
            key: "logging.level",
            env_keys: &["RISE_LOGGING_LEVEL", "RISE_LOG_LEVEL"],
            value: config.logging.level.clone(),
        },
        Field {
            key: "logging.format",
            env_keys: &["RISE_LOGGING_FORMAT", "RISE_LOG_FORMAT"],
            value: format!("{:?}", config.logging.format).to_ascii_lowercase(),
        },
    ]
}

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = try_step!(load_config("config", options));

    let file_path = detect_config_path(options.config_path.as_deref());
    let file_doc = file_path.as_deref().and_then(load_config_file_doc);

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(&field, file_doc.as_ref(), file_path.as_deref());
        lines.push(format!("- {} = {} (source: {source})", field.key, field.value));
    }

    CommandResult::plain(lines.join("\n"))
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    [PathBuf::from("rise.toml"), PathBuf::from("config/rise.toml")]
        .into_iter()
        .find(|candidate| candidate.exists())
}

fn load_config_file_doc(path: &Path) -> Option<Value> {
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(field: &Field, file_doc: Option<&Value>, file_path: Option<&Path>) -> String {
    if let Some(env_key) = field.env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = file_doc {
        if contains_path(doc, field.key) {
            let file_path = file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

/// Keeps a short recognisable prefix of provider keys (`sk-`, `gsk_`).
fn redact_secret(secret: &str) -> String {
    let trimmed = secret.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    match trimmed.find(['-', '_']) {
        Some(index) if index <= 4 => format!("{}***", &trimmed[..=index]),
        _ => "<redacted>".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use toml::Value;

    use super::{contains_path, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        assert_eq!(redact_secret("sk-live-abcdef"), "sk-***");
        assert_eq!(redact_secret("gsk_0123456789"), "gsk_***");
        assert_eq!(redact_secret("plainsecretvalue"), "<redacted>");
        assert_eq!(redact_secret("  "), "<empty>");
    }

    #[test]
    fn nested_keys_are_found_in_file_docs() {
        let doc: Value = "[llm]\nmodel = \"llama3.1\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "llm.model"));
        assert!(!contains_path(&doc, "llm.api_key"));
        assert!(!contains_path(&doc, "agent.max_turns"));
    }
}
