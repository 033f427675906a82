use rise_core::config::LoadOptions;
use rise_db::{connect_from_config, migrations, DemoCatalog, SeedResult, VerificationResult};

use crate::commands::{
    async_runtime, load_config, try_step, CommandResult, EXIT_DATABASE, EXIT_MIGRATION, EXIT_SEED,
};

pub fn run(options: &LoadOptions) -> CommandResult {
    let config = try_step!(load_config("seed", options));
    let runtime = try_step!(async_runtime("seed"));

    let result = runtime.block_on(async {
        let pool = connect_from_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DATABASE))?;
        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;

        let seeded = DemoCatalog::load(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), EXIT_SEED))?;
        let verification = DemoCatalog::verify(&pool)
            .await
            .map_err(|error| ("seed_verification", error.to_string(), EXIT_SEED))?;
        pool.close().await;

        if verification.all_present {
            Ok(seeded)
        } else {
            Err(("seed_verification", verification_message(&verification), EXIT_SEED))
        }
    });

    match result {
        Ok(seeded) => CommandResult::success("seed", summary(&seeded)),
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

fn summary(seeded: &SeedResult) -> String {
    let tables = seeded
        .tables_seeded
        .iter()
        .map(|(table, rows)| format!("  - {table}: {rows} row(s)"))
        .collect::<Vec<_>>();
    format!("demo catalog loaded:\n{}", tables.join("\n"))
}

fn verification_message(verification: &VerificationResult) -> String {
    let failed = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(check.as_str()))
        .collect::<Vec<_>>();
    if failed.is_empty() {
        "some demo data failed to load".to_string()
    } else {
        format!("seed verification failed for checks: {}", failed.join(", "))
    }
}
