//! Thin wrapper around the `goose` migration CLI.
//!
//! Migrations are plain SQL files with `-- +goose Up` / `-- +goose Down` sections. The runner
//! spawns `goose -dir <migrations_dir> <driver> <dsn> <command>` and fails with the captured
//! output when goose exits non-zero.

use anyhow::{bail, Context, Result};
use tokio::process::Command;
use tracing::debug;

/// Goose subcommands used by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GooseCommand {
    Up,
    Down,
    Status,
}

impl GooseCommand {
    fn as_arg(self) -> &'static str {
        match self {
            GooseCommand::Up => "up",
            GooseCommand::Down => "down",
            GooseCommand::Status => "status",
        }
    }
}

pub struct MigrationRunner {
    /// Path to the goose binary ("goose" when it is on PATH)
    goose_binary_path: String,
    migrations_dir: String,
    /// Goose driver name, e.g. "postgres"
    driver: String,
    dsn: String,
}

impl MigrationRunner {
    pub fn new(
        goose_binary_path: String,
        migrations_dir: String,
        driver: String,
        dsn: String,
    ) -> Self {
        Self {
            goose_binary_path,
            migrations_dir,
            driver,
            dsn,
        }
    }

    /// Runner for the `postgres` driver
    pub fn postgres(goose_binary_path: String, migrations_dir: String, dsn: String) -> Self {
        Self::new(goose_binary_path, migrations_dir, "postgres".to_string(), dsn)
    }

    /// Applies all pending migrations
    pub async fn run_migrations(&self) -> Result<()> {
        debug!("running migrations from directory: {}", self.migrations_dir);
        let stdout = self.execute(GooseCommand::Up).await?;
        debug!("migrations completed successfully:\n{}", stdout);
        Ok(())
    }

    /// Rolls back the most recent migration
    pub async fn rollback_migration(&self) -> Result<()> {
        debug!("rolling back most recent migration");
        let stdout = self.execute(GooseCommand::Down).await?;
        debug!("rollback completed successfully:\n{}", stdout);
        Ok(())
    }

    /// Returns goose's status table
    pub async fn migration_status(&self) -> Result<String> {
        self.execute(GooseCommand::Status).await
    }

    fn args(&self, command: GooseCommand) -> Vec<&str> {
        vec![
            "-dir",
            &self.migrations_dir,
            &self.driver,
            &self.dsn,
            command.as_arg(),
        ]
    }

    async fn execute(&self, command: GooseCommand) -> Result<String> {
        let output = Command::new(&self.goose_binary_path)
            .args(self.args(command))
            .output()
            .await
            .with_context(|| format!("failed to spawn goose binary '{}'", self.goose_binary_path))?;

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!(
                "goose {} failed.\nstdout: {}\nstderr: {}",
                command.as_arg(),
                stdout,
                stderr
            );
        }

        Ok(stdout)
    }
}
