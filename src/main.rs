//! traced-client command line.
//!
//! Sends one request through the traced client and prints the status line,
//! response headers and body.
//!
//! ```text
//! traced-client [--config FILE] [--log-level L] <METHOD> <URI>
//!               [-H 'K: V']... [-q k=v]... [--json JSON | --form k=v...]
//!               [--timeout SECS] [--no-trace]
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use traced_client::config::{load_config, ClientConfig};
use traced_client::observability::logging;
use traced_client::{Client, RequestOptions};

#[derive(Parser, Debug)]
#[command(name = "traced-client", version, about = "Send a traced RPC request")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Default log level when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// HTTP method
    method: String,

    /// Target URI, e.g. tcp://user-service:9080/users
    uri: String,

    /// Request header as 'Name: value'
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Query parameter as key=value
    #[arg(short, long = "query")]
    query: Vec<String>,

    /// JSON request body
    #[arg(long, conflicts_with = "form")]
    json: Option<String>,

    /// Form field as key=value
    #[arg(long)]
    form: Vec<String>,

    /// Request timeout in seconds
    #[arg(long)]
    timeout: Option<f64>,

    /// Skip collector reporting for this call
    #[arg(long)]
    no_trace: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => match load_config(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        },
        None => ClientConfig::default(),
    };

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.observability.log_level.clone());
    if let Err(e) = logging::init(&level) {
        eprintln!("error: failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }

    let options = match build_options(&cli) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let client = Client::new(config);
    let outcome = client.request(&cli.method, &cli.uri, options).await;
    client.shutdown().await;

    match outcome {
        Ok(response) => {
            println!("{}", response.status());
            for (name, value) in response.headers() {
                println!("{}: {}", name, value.to_str().unwrap_or("<binary>"));
            }
            println!();
            println!("{}", response.text());
            if response.status().is_success() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), error = %e, "Request failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_options(cli: &Cli) -> Result<RequestOptions, String> {
    let mut options = RequestOptions::new().no_trace(cli.no_trace);

    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("invalid header '{}', expected 'Name: value'", header))?;
        options = options.header(name.trim(), value.trim());
    }
    for pair in &cli.query {
        let (k, v) = split_pair(pair)?;
        options = options.query(k, v);
    }
    for pair in &cli.form {
        let (k, v) = split_pair(pair)?;
        options = options.form_param(k, v);
    }
    if let Some(json) = &cli.json {
        let body = serde_json::from_str(json).map_err(|e| format!("invalid --json body: {}", e))?;
        options = options.json(body);
    }
    if let Some(secs) = cli.timeout {
        if !matches!(std::time::Duration::try_from_secs_f64(secs), Ok(d) if !d.is_zero()) {
            return Err(format!("invalid --timeout {}", secs));
        }
        options = options.timeout_secs(secs);
    }
    Ok(options)
}

fn split_pair(pair: &str) -> Result<(&str, &str), String> {
    pair.split_once('=')
        .ok_or_else(|| format!("invalid pair '{}', expected key=value", pair))
}
