use rise_core::config::{AppConfig, LlmConfig, LoadOptions};
use rise_db::{connect_from_config, migrations, ping};
use serde::Serialize;

use crate::commands::{CommandResult, EXIT_CONFIG, EXIT_DATABASE};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str) -> Self {
        Self {
            name,
            status: CheckStatus::Skipped,
            details: "skipped because configuration did not load".to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
        let (overall_status, summary) = if all_pass {
            (CheckStatus::Pass, "doctor: all readiness checks passed")
        } else {
            (CheckStatus::Fail, "doctor: one or more readiness checks failed")
        };
        Self { overall_status, summary: summary.to_string(), checks }
    }

    fn exit_code(&self) -> u8 {
        let failed = |name: &str| {
            self.checks.iter().any(|check| check.name == name && check.status == CheckStatus::Fail)
        };
        if failed("config_validation") || failed("llm_configuration") {
            EXIT_CONFIG
        } else if failed("database_connectivity") {
            EXIT_DATABASE
        } else {
            0
        }
    }
}

pub fn run(options: &LoadOptions, json_output: bool) -> CommandResult {
    let report = build_report(options);
    let exit_code = report.exit_code();

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\
                 \"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report(options: &LoadOptions) -> DoctorReport {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            return DoctorReport::from_checks(vec![
                DoctorCheck::fail("config_validation", error.to_string()),
                DoctorCheck::skipped("llm_configuration"),
                DoctorCheck::skipped("database_connectivity"),
            ]);
        }
    };

    DoctorReport::from_checks(vec![
        DoctorCheck::pass("config_validation", "configuration loaded and validated"),
        check_llm_configuration(&config.llm),
        check_database_connectivity(&config),
    ])
}

fn check_llm_configuration(llm: &LlmConfig) -> DoctorCheck {
    if llm.model.trim().is_empty() {
        return DoctorCheck::fail("llm_configuration", "llm.model is empty");
    }
    if llm.provider.requires_api_key() && llm.api_key.is_none() {
        return DoctorCheck::fail(
            "llm_configuration",
            format!("{:?} requires an api key (set RISE_LLM_API_KEY)", llm.provider),
        );
    }

    DoctorCheck::pass(
        "llm_configuration",
        format!("model `{}` via {}", llm.model, llm.endpoint_base()),
    )
}

fn check_database_connectivity(config: &AppConfig) -> DoctorCheck {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| format!("failed to connect to database: {error}"))?;
        ping(&pool).await.map_err(|error| format!("database ping failed: {error}"))?;
        // A fresh database has no migration table yet.
        let applied = migrations::applied_count(&pool).await.unwrap_or(0);
        pool.close().await;
        Ok::<i64, String>(applied)
    });

    match result {
        Ok(applied) => DoctorCheck::pass(
            "database_connectivity",
            format!("connected using `{}` ({applied} migration(s) applied)", config.database.url),
        ),
        Err(error) => DoctorCheck::fail("database_connectivity", error),
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = vec![report.summary.clone()];

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use rise_core::config::{LlmConfig, LlmProvider};

    use super::{check_llm_configuration, CheckStatus, DoctorCheck, DoctorReport};
    use crate::commands::{EXIT_CONFIG, EXIT_DATABASE};

    fn llm(provider: LlmProvider) -> LlmConfig {
        LlmConfig {
            provider,
            api_key: None,
            base_url: None,
            model: "llama3.1".to_string(),
            temperature: 0.7,
            timeout_secs: 60,
            max_retries: 2,
            retry_base_delay_ms: 500,
        }
    }

    #[test]
    fn hosted_provider_without_key_fails_llm_check() {
        let check = check_llm_configuration(&llm(LlmProvider::Groq));
        assert_eq!(check.status, CheckStatus::Fail);
        assert!(check.details.contains("RISE_LLM_API_KEY"));

        let check = check_llm_configuration(&llm(LlmProvider::Ollama));
        assert_eq!(check.status, CheckStatus::Pass);
        assert!(check.details.contains("localhost:11434"));
    }

    #[test]
    fn exit_code_follows_the_first_failing_concern() {
        let report = DoctorReport::from_checks(vec![
            DoctorCheck::pass("config_validation", "ok"),
            DoctorCheck::pass("llm_configuration", "ok"),
            DoctorCheck::fail("database_connectivity", "down"),
        ]);
        assert_eq!(report.overall_status, CheckStatus::Fail);
        assert_eq!(report.exit_code(), EXIT_DATABASE);

        let report = DoctorReport::from_checks(vec![
            DoctorCheck::fail("config_validation", "bad"),
            DoctorCheck::skipped("llm_configuration"),
            DoctorCheck::skipped("database_connectivity"),
        ]);
        assert_eq!(report.exit_code(), EXIT_CONFIG);
    }
}
