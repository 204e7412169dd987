use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{Value as JsonValue, json};
use sqlgate::logging::init_logging;
use sqlgate::{
    BackendConfig, ChannelDispatcher, ConnectionHandle, ConnectionString, LocalBackend,
    SharedDispatcher, Statement, Value, serve,
};
use std::sync::Arc;
use tracing::Level;

#[derive(Parser)]
#[command(name = "sqlgate")]
#[command(version, about = "Run SQL through a pooled connection handle", long_about = None)]
struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a mutating statement; prints [rowsAffected, lastInsertId]
    Execute {
        /// Connection string, e.g. sqlite:app.db
        connection: String,
        sql: String,
        /// Bind values as a JSON array, e.g. '["x", 1]'
        values: Option<String>,
    },

    /// Run a query; prints the rows as JSON objects
    Select {
        connection: String,
        sql: String,
        values: Option<String>,
    },

    /// Close one connection, or every connection when none is given
    Close { connection: Option<String> },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(if cli.verbose { Level::DEBUG } else { Level::INFO })?;

    let config = BackendConfig::from_env().context("failed to load backend config")?;
    let output = smol::block_on(run(cli.command, config))?;

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(command: Commands, config: BackendConfig) -> Result<JsonValue> {
    let backend = Arc::new(LocalBackend::new(config));
    backend
        .initialize()
        .await
        .context("failed to preload connections")?;

    let (dispatcher, receiver) = ChannelDispatcher::unbounded();
    let server = smol::spawn(serve(receiver, backend.clone()));
    let dispatcher: SharedDispatcher = Arc::new(dispatcher);

    let output = match command {
        Commands::Execute {
            connection,
            sql,
            values,
        } => {
            let db = ConnectionHandle::load(parse_connection(&connection)?, dispatcher.clone())
                .await?;
            execute(db, statement(sql, values.as_deref())?).await?
        }
        Commands::Select {
            connection,
            sql,
            values,
        } => {
            let db = ConnectionHandle::load(parse_connection(&connection)?, dispatcher.clone())
                .await?;
            select(db, statement(sql, values.as_deref())?).await?
        }
        Commands::Close { connection: Some(connection) } => {
            let db = ConnectionHandle::get(parse_connection(&connection)?, dispatcher.clone());
            JsonValue::Bool(db.close().await?)
        }
        Commands::Close { connection: None } => {
            JsonValue::Bool(ConnectionHandle::close_all(&dispatcher).await?)
        }
    };

    backend.close(None).await?;
    drop(dispatcher);
    server.await;

    Ok(output)
}

async fn execute(db: ConnectionHandle, statement: Statement) -> Result<JsonValue> {
    let result = db
        .execute(statement)
        .await
        .with_context(|| format!("execute failed on {}", db.path()))?;
    Ok(json!([result.rows_affected, result.last_insert_id]))
}

async fn select(db: ConnectionHandle, statement: Statement) -> Result<JsonValue> {
    let rows = db
        .select(statement)
        .await
        .with_context(|| format!("select failed on {}", db.path()))?;
    Ok(serde_json::to_value(rows)?)
}

fn parse_connection(raw: &str) -> Result<ConnectionString> {
    Ok(raw.parse()?)
}

fn statement(sql: String, values: Option<&str>) -> Result<Statement> {
    let values: Vec<Value> = match values {
        Some(raw) => serde_json::from_str(raw)
            .context("bind values must be a JSON array of scalars")?,
        None => Vec::new(),
    };
    Ok(Statement::new(sql).with_values(values))
}
