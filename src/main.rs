// Rollcall - command-line client for the school-management API
// Main entry point

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use rollcall::auth::{CredentialStore, FileStore, LogNavigator};
use rollcall::client::{ApiClient, ApiError, ApiRequest, ApiResponse};
use rollcall::config::{load_config, load_config_from, ClientConfig};
use rollcall::errors::describe_api_error;
use tracing_subscriber::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "rollcall")]
#[command(about = "Command-line client for the school-management API", version)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Config file (default: ~/.rollcall/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long = "base-url", global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and store the session tokens
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session tokens
    Logout,
    /// Show configuration and session state
    Status,
    /// GET a resource, e.g. `rollcall get /assignments/`
    Get {
        path: String,
        /// Query parameter as key=value (repeatable)
        #[arg(long = "query", short = 'q', value_parser = parse_key_val)]
        query: Vec<(String, String)>,
    },
    /// POST a JSON body
    Post {
        path: String,
        #[arg(long)]
        data: String,
    },
    /// PUT a JSON body
    Put {
        path: String,
        #[arg(long)]
        data: String,
    },
    /// PATCH a JSON body
    Patch {
        path: String,
        #[arg(long)]
        data: String,
    },
    /// DELETE a resource
    Delete { path: String },
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{}`", raw))?;
    if key.is_empty() {
        return Err(format!("empty key in `{}`", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(base_url) = args.base_url {
        config.base_url = base_url;
        config.validate().context("Invalid --base-url")?;
    }

    let store = open_store(&config)?;
    let client = ApiClient::builder(config)
        .credential_store(store)
        .navigator(Arc::new(LogNavigator))
        .build()?;

    if let Err(e) = run(&client, args.command).await {
        match e.downcast_ref::<ApiError>() {
            Some(api_error) => eprintln!("{}", describe_api_error(api_error, client.config())),
            None => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }

    Ok(())
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_target(false);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    // Bridge log crate → tracing (for dependencies using log crate)
    let _ = tracing_log::LogTracer::init();
}

fn open_store(config: &ClientConfig) -> Result<Arc<dyn CredentialStore>> {
    let path = match &config.credentials_path {
        Some(path) => path.clone(),
        None => FileStore::default_path().context("Could not determine home directory")?,
    };
    Ok(Arc::new(FileStore::new(path)))
}

async fn run(client: &ApiClient, command: Command) -> Result<()> {
    match command {
        Command::Login { username, password } => {
            let password = match password {
                Some(password) => password,
                None => read_password()?,
            };
            client.login(&username, &password).await?;
            println!("Logged in as {}", username);
        }
        Command::Logout => {
            client.logout()?;
            println!("Logged out");
        }
        Command::Status => {
            let config = client.config();
            println!("API:           {}", config.base_url);
            println!("Timeout:       {}s", config.timeout_seconds);
            println!(
                "Session:       {}",
                if client.is_authenticated()? {
                    "signed in"
                } else {
                    "signed out"
                }
            );
        }
        Command::Get { path, query } => {
            let request = query
                .into_iter()
                .fold(ApiRequest::get(path), |request, (key, value)| {
                    request.query(key, value)
                });
            print_response(&client.send(request).await?)?;
        }
        Command::Post { path, data } => {
            let body = parse_body(&data)?;
            print_response(&client.post(&path, &body).await?)?;
        }
        Command::Put { path, data } => {
            let body = parse_body(&data)?;
            print_response(&client.put(&path, &body).await?)?;
        }
        Command::Patch { path, data } => {
            let body = parse_body(&data)?;
            print_response(&client.patch(&path, &body).await?)?;
        }
        Command::Delete { path } => {
            print_response(&client.delete(&path).await?)?;
        }
    }

    Ok(())
}

fn read_password() -> Result<String> {
    eprint!("Password: ");
    io::stderr().flush().ok();

    let mut line = String::new();
    io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        bail!("Password is required");
    }
    Ok(password)
}

fn parse_body(data: &str) -> Result<serde_json::Value> {
    serde_json::from_str(data).context("--data must be valid JSON")
}

/// Pretty-print JSON bodies, print anything else as text
fn print_response(response: &ApiResponse) -> Result<()> {
    if response.bytes().is_empty() {
        println!("{}", response.status());
        return Ok(());
    }

    match response.json::<serde_json::Value>() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
    }
    Ok(())
}
