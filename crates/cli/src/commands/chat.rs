use rise_agent::{policy, AgentError, AgentRuntime, TurnOutcome, TurnRequest};
use rise_core::config::LoadOptions;
use rise_db::{connect_from_config, migrations};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::commands::{
    async_runtime, load_config, try_step, CommandResult, EXIT_CONFIG, EXIT_DATABASE,
    EXIT_MIGRATION, EXIT_TURN,
};

pub struct ChatArgs {
    pub role: String,
    pub session: Option<String>,
    pub message: String,
}

type Failure = (&'static str, String, u8);

pub fn run(options: &LoadOptions, args: ChatArgs) -> CommandResult {
    if let Err(error) = policy::resolve(&args.role) {
        return CommandResult::failure("chat", "unknown_role", error.to_string(), EXIT_CONFIG);
    }
    if args.message.trim().is_empty() {
        return CommandResult::failure(
            "chat",
            "invalid_input",
            "message must not be empty",
            EXIT_CONFIG,
        );
    }

    let config = try_step!(load_config("chat", options));
    let runtime = try_step!(async_runtime("chat"));
    let session_id = args
        .session
        .filter(|session| !session.trim().is_empty())
        .unwrap_or_else(|| format!("session-{}", Uuid::new_v4()));
    let correlation_id = format!("cli-{}", Uuid::new_v4());

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let agent = AgentRuntime::from_config(&config, pool.clone())
            .map_err(|error| ("model_client", error.to_string(), EXIT_CONFIG))?;
        let cancel = CancellationToken::new();
        let request =
            TurnRequest { role: args.role, message: args.message, session_id: session_id.clone() };

        let turn = tokio::select! {
            turn = agent.submit(request, &correlation_id, &cancel) => turn,
            _ = tokio::signal::ctrl_c() => {
                cancel.cancel();
                Err(AgentError::Cancelled)
            }
        };
        pool.close().await;
        turn.map_err(classify)
    });

    match result {
        Ok(turn) if turn.outcome == TurnOutcome::Completed => CommandResult::success(
            "chat",
            format!("{}\n(session: {session_id})", turn.response),
        ),
        Ok(turn) => CommandResult::failure(
            "chat",
            outcome_class(turn.outcome),
            format!("{}\n(session: {session_id})", turn.response),
            EXIT_TURN,
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("chat", error_class, message, exit_code)
        }
    }
}

fn classify(error: AgentError) -> Failure {
    let class = match &error {
        AgentError::UnknownRole(_) => "unknown_role",
        AgentError::SessionRoleMismatch { .. } => "session_role_mismatch",
        AgentError::Cancelled => "cancelled",
        AgentError::Checkpoint(_) => "checkpoint",
        _ => "turn_failed",
    };
    (class, error.to_string(), EXIT_TURN)
}

fn outcome_class(outcome: TurnOutcome) -> &'static str {
    match outcome {
        TurnOutcome::Completed => "completed",
        TurnOutcome::LoopBoundExceeded => "loop_bound_exceeded",
        TurnOutcome::ModelUnavailable => "model_unavailable",
    }
}
