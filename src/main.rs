mod backup;
mod config;
mod db;
mod export;
mod models;
mod run;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    init_tracing();
    let cli = run::Cli::parse();
    let config = config::Config::resolve(cli.db.clone(), cli.resources.clone(), cli.strict_schema)?;

    let mut db = match db::Database::open(&config.db_path, config.schema_source()) {
        Ok(db) => db,
        Err(e) => {
            if let Some(schema) = e.downcast_ref::<db::SchemaError>() {
                eprintln!("{schema}");
            }
            return Err(e);
        }
    };
    run::as_cli(cli.command, &mut db, &config)
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` overrides the
/// default `info` level.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
