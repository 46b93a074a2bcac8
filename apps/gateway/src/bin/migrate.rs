//! Creates the users, meetings and emails tables the gateway reads.
//!
//! Usage:
//!   cargo run -p clover-gateway --bin clover-migrate
//!   cargo run -p clover-gateway --bin clover-migrate -- --test
//!
//! `--test` targets `<db>_test` instead of the configured database.

use std::path::Path;
use std::process;

use diesel::pg::PgConnection;
use diesel::Connection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("./migrations");

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn main() {
    if dotenvy::dotenv().is_err() {
        let env_path = Path::new(env!("CARGO_MANIFEST_DIR")).join(".env");
        let _ = dotenvy::from_path(env_path);
    }

    if let Err(e) = run() {
        eprintln!("migration failed: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), BoxError> {
    let database_url =
        std::env::var("DATABASE_URL").map_err(|_| "DATABASE_URL env var is required")?;
    let database_url = if std::env::args().any(|arg| arg == "--test") {
        test_database_url(&database_url)
    } else {
        database_url
    };

    let mut conn = PgConnection::establish(&database_url)?;
    let applied = conn.run_pending_migrations(MIGRATIONS)?;

    if applied.is_empty() {
        println!("Schema up to date.");
        return Ok(());
    }
    for version in &applied {
        println!("  applied {version}");
    }
    println!("{} migration(s) applied.", applied.len());
    Ok(())
}

/// Swap the database name for `<name>_test`, keeping any query string.
fn test_database_url(database_url: &str) -> String {
    let (base, query) = match database_url.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (database_url, None),
    };
    let Some((prefix, name)) = base.rsplit_once('/') else {
        return database_url.to_string();
    };
    if name.is_empty() || name.ends_with("_test") {
        return database_url.to_string();
    }

    match query {
        Some(query) => format!("{prefix}/{name}_test?{query}"),
        None => format!("{prefix}/{name}_test"),
    }
}
