use rise_core::config::LoadOptions;
use rise_db::{connect_from_config, migrations};

use crate::commands::{
    async_runtime, load_config, try_step, CommandResult, EXIT_DATABASE, EXIT_MIGRATION,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = try_step!(load_config("migrate", options));
    let runtime = try_step!(async_runtime("migrate"));

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        let applied = migrations::applied_count(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
        pool.close().await;
        Ok::<i64, (&'static str, String, u8)>(applied)
    });

    match result {
        Ok(applied) => CommandResult::success(
            "migrate",
            format!("schema up to date ({applied} migration(s) applied)"),
        ),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("migrate", error_class, message, exit_code)
        }
    }
}
