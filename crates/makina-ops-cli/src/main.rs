//! MAKINA OPS - command line console for the internal operations API.
//!
//! Logs in once, keeps the session on disk (or in the OS keychain), and
//! runs CRUD commands against the console's resources. Expired access
//! tokens are refreshed transparently.

use std::io;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use makina_ops_core::api::ApiClient;
use makina_ops_core::{ApiError, Config, Resource, SessionStore};
use serde_json::Value;
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable supplying the login password non-interactively
const ENV_PASSWORD: &str = "MAKINA_PASSWORD";

/// MAKINA OPS console
#[derive(Parser, Debug)]
#[command(name = "makina-ops")]
#[command(version, about, long_about = None)]
struct Cli {
    /// API base URL (overrides config and MAKINA_API_URL)
    #[arg(long)]
    api_url: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Log in and store the session
    Login {
        /// Account email (defaults to the last one used)
        #[arg(long)]
        email: Option<String>,
    },

    /// Clear the stored session
    Logout,

    /// Show the current session
    Whoami,

    /// List records, optionally filtered with key=value pairs
    #[command(alias = "ls")]
    List {
        resource: Resource,
        #[arg(value_parser = parse_filter)]
        filters: Vec<(String, String)>,
    },

    /// Show one record
    Get { resource: Resource, id: String },

    /// Create a record from a JSON payload
    Create {
        resource: Resource,
        payload: String,
    },

    /// Update a record from a JSON payload
    Update {
        resource: Resource,
        id: String,
        payload: String,
    },

    /// Delete a record
    #[command(alias = "rm")]
    Delete { resource: Resource, id: String },
}

fn parse_filter(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .filter(|(k, _)| !k.is_empty())
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got '{}'", s))
}

fn parse_payload(raw: &str) -> Result<Value> {
    let payload: Value = serde_json::from_str(raw).context("Payload is not valid JSON")?;
    if !payload.is_object() {
        bail!("Payload must be a JSON object");
    }
    Ok(payload)
}

/// Initialize the tracing subscriber for logging.
///
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug). When `log_dir`
/// is set, a daily rolling file is written as well; keep the returned guard
/// alive so it gets flushed.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "makina-ops.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).with(filter).init();
            None
        }
    }
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let mut config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: failed to load config, using defaults: {}", e);
        Config::default()
    });
    config.apply_env();
    if let Some(url) = cli.api_url.clone() {
        config.api_url = url;
    }

    let _log_guard = init_tracing(config.log_dir.as_deref());
    debug!(api_url = %config.api_url, storage = ?config.storage, "Configuration loaded");

    let session = Arc::new(SessionStore::open(config.session_storage()?));
    let api = ApiClient::new(&config, session)?;

    let result = run(cli.command, &api, &mut config).await;
    if let Err(err) = &result {
        if err.downcast_ref::<ApiError>().is_some_and(ApiError::is_session_fatal) {
            eprintln!("Session expired. Run `makina-ops login` to sign in again.");
        }
    }
    result
}

async fn run(command: Commands, api: &ApiClient, config: &mut Config) -> Result<()> {
    match command {
        Commands::Login { email } => login(api, config, email).await,
        Commands::Logout => {
            api.logout();
            eprintln!("Logged out");
            Ok(())
        }
        Commands::Whoami => whoami(api),
        command => {
            // Protected commands need a token before any request goes out
            api.session().state().require_access()?;
            run_resource_command(command, api).await
        }
    }
}

async fn login(api: &ApiClient, config: &mut Config, email: Option<String>) -> Result<()> {
    let email = match email.or_else(|| config.last_email.clone()) {
        Some(email) => email,
        None => {
            eprint!("Email: ");
            let mut line = String::new();
            io::stdin().read_line(&mut line)?;
            line.trim().to_string()
        }
    };
    if email.is_empty() {
        bail!("Email required");
    }

    let password = match std::env::var(ENV_PASSWORD) {
        Ok(password) if !password.is_empty() => password,
        _ => rpassword::prompt_password(format!("Password for {}: ", email))
            .context("Failed to read password")?,
    };

    let user = api.login(&email, &password).await?;
    info!(user = %user.id, "Login complete");

    config.last_email = Some(email);
    if let Err(e) = config.save() {
        eprintln!("Warning: failed to save config: {}", e);
    }

    eprintln!("Logged in as {} ({})", user.display_name(), user.role.label());
    Ok(())
}

fn whoami(api: &ApiClient) -> Result<()> {
    let session = api.session().state();
    match (&session.user, &session.access_token) {
        (Some(user), Some(_)) => {
            println!("{} ({}) id={}", user.display_name(), user.role, user.id);
        }
        (None, Some(_)) => {
            println!("Token present but no user identity; log in again to restore it");
        }
        (_, None) => bail!(ApiError::NotLoggedIn),
    }
    Ok(())
}

async fn run_resource_command(command: Commands, api: &ApiClient) -> Result<()> {
    let value = match command {
        Commands::List { resource, filters } => api.resource(resource).list(&filters).await?,
        Commands::Get { resource, id } => api.resource(resource).get_by_id(&id).await?,
        Commands::Create { resource, payload } => {
            api.resource(resource).create(parse_payload(&payload)?).await?
        }
        Commands::Update {
            resource,
            id,
            payload,
        } => {
            api.resource(resource)
                .update(&id, parse_payload(&payload)?)
                .await?
        }
        Commands::Delete { resource, id } => api.resource(resource).remove(&id).await?,
        Commands::Login { .. } | Commands::Logout | Commands::Whoami => return Ok(()),
    };
    print_json(&value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_filter() {
        assert_eq!(
            parse_filter("status=OPEN").unwrap(),
            ("status".to_string(), "OPEN".to_string())
        );
        assert_eq!(
            parse_filter("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_filter("status").is_err());
        assert!(parse_filter("=x").is_err());
    }

    #[test]
    fn test_parse_payload_requires_object() {
        assert!(parse_payload(r#"{"name":"North"}"#).is_ok());
        assert!(parse_payload("[1]").is_err());
        assert!(parse_payload("{").is_err());
    }

    #[test]
    fn test_cli_parses_resource_commands() {
        let cli = Cli::try_parse_from(["makina-ops", "ls", "customer-users", "customerId=4"]).unwrap();
        match cli.command {
            Commands::List { resource, filters } => {
                assert_eq!(resource, Resource::CustomerUsers);
                assert_eq!(filters, vec![("customerId".to_string(), "4".to_string())]);
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["makina-ops", "get", "orders", "1"]).is_err());
    }
}
