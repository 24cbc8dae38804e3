//! salesql command line entry point
//!
//! Loads configuration from the environment, opens the row store, connects
//! the cache and runs one command, printing its result as JSON on stdout.

use std::sync::Arc;

use clap::{Parser, Subcommand};
use salesql_cache::CacheService;
use salesql_core::{QueryError, SalesqlResult};
use salesql_query::{init_tracing, QueryService, SalesqlConfig, SqliteRowStore};
use serde::Serialize;

#[derive(Parser)]
#[command(name = "salesql")]
#[command(about = "Safety-gated, cached SQL over the sales dataset", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a SELECT statement
    Query {
        /// SQL text; only SELECT statements are accepted
        sql: String,

        /// Page number (enables pagination)
        #[arg(long)]
        page: Option<i64>,

        /// Rows per page (enables pagination)
        #[arg(long)]
        page_size: Option<i64>,
    },
    /// Print aggregate dataset statistics
    Stats,
    /// Report row store reachability and cache state
    Health,
    /// Drop every cached result
    ClearCache,
    /// Create the sales table if missing
    InitDb,
}

const DEFAULT_PAGE_SIZE: i64 = 100;

#[tokio::main]
async fn main() -> SalesqlResult<()> {
    let cli = Cli::parse();

    let config = SalesqlConfig::from_env();
    init_tracing(&config.telemetry)?;
    config.validate()?;

    let store = Arc::new(SqliteRowStore::open(&config.db)?);
    let cache = Arc::new(CacheService::connect(&config.cache).await);
    let health_task = cache.spawn_health_check(config.cache.health_check_interval);

    let service = QueryService::new(store.clone(), Arc::clone(&cache), config.executor.clone());
    let outcome = run(&service, &store, cli.command).await;

    health_task.abort();
    cache.close().await;
    outcome
}

async fn run(service: &QueryService, store: &SqliteRowStore, command: Commands) -> SalesqlResult<()> {
    match command {
        Commands::Query {
            sql,
            page,
            page_size,
        } => {
            if page.is_some() || page_size.is_some() {
                let result = service
                    .query_paginated(
                        &sql,
                        page.unwrap_or(1),
                        page_size.unwrap_or(DEFAULT_PAGE_SIZE),
                    )
                    .await?;
                print_json(&result)
            } else {
                print_json(&service.ask(&sql).await?)
            }
        }
        Commands::Stats => print_json(&service.stats().await?),
        Commands::Health => print_json(&service.health().await),
        Commands::ClearCache => print_json(&serde_json::json!({
            "cleared": service.clear_cache().await
        })),
        Commands::InitDb => {
            store.create_schema().await?;
            tracing::info!("Database initialized");
            Ok(())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> SalesqlResult<()> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|e| QueryError::execution(format!("failed to render output: {}", e)))?;
    println!("{}", rendered);
    Ok(())
}
