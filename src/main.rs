//! CLI entry point for storefront.

mod cli;

use clap::Parser;
use reqwest::Method;
use storefront_client::api::{Gateway, RequestDescriptor};
use storefront_client::auth::CredentialPair;
use storefront_client::config::{
    initialize_default_global_config, load_config, validate_config, GlobalConfigInitResult,
    LogFormat, LoggingConfig,
};
use storefront_client::error::GatewayError;
use storefront_client::session::SessionEvent;
use tokio::sync::broadcast;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let args = cli::Args::parse();

    if matches!(args.command, cli::Command::Init) {
        if let Err(msg) = run_init() {
            eprintln!("error: {msg}");
            std::process::exit(1);
        }
        return;
    }

    let mut config = match load_config(args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    // Apply CLI overrides.
    if let Some(url) = &args.base_url {
        config.api.base_url = url.clone();
        if let Err(e) = validate_config(&config) {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    }

    init_tracing(&config.logging);

    let gateway = match Gateway::from_config(&config) {
        Ok(gateway) => gateway,
        Err(e) => {
            eprintln!("error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(msg) = run_command(&gateway, args.command).await {
        eprintln!("error: {msg}");
        std::process::exit(1);
    }
}

/// Install the global subscriber. `RUST_LOG` wins over `[logging] level`.
fn init_tracing(logging: &LoggingConfig) {
    use tracing_subscriber::fmt;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let result = match logging.format {
        LogFormat::Json => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .json()
            .try_init(),
        LogFormat::Text => fmt::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .try_init(),
    };
    drop(result);
}

async fn run_command(gateway: &Gateway, command: cli::Command) -> Result<(), String> {
    match command {
        cli::Command::Login { access, refresh } => {
            let refresh = match refresh {
                Some(refresh) => refresh,
                None => rpassword::prompt_password("Refresh credential: ")
                    .map_err(|e| format!("failed to read refresh credential: {e}"))?,
            };
            let pair = CredentialPair::new(access.trim(), refresh.trim());
            if pair.access_token.is_empty() || pair.refresh_token.is_empty() {
                return Err("both credentials must be non-empty".to_string());
            }
            gateway
                .initialize_session(&pair)
                .map_err(|e| format!("failed to store credentials: {e}"))?;
            println!("logged in");
            Ok(())
        }
        cli::Command::Logout => {
            let removed = gateway
                .logout()
                .map_err(|e| format!("failed to clear credentials: {e}"))?;
            if removed {
                println!("logged out");
            } else {
                println!("no stored credentials");
            }
            Ok(())
        }
        cli::Command::Status => {
            let health = gateway
                .session_health()
                .map_err(|e| format!("failed to read credentials: {e}"))?;
            let state = if health.is_logged_in() {
                "logged in"
            } else {
                "logged out"
            };
            println!("{state}");
            println!("  access credential: {}", present(health.has_access_token));
            println!("  refresh credential: {}", present(health.has_refresh_token));
            Ok(())
        }
        cli::Command::Request {
            method,
            path,
            data,
            headers,
        } => {
            let request = build_request(&method, path, data.as_deref(), &headers)?;
            let mut events = gateway.subscribe();
            let outcome = gateway.send(&request).await;
            report_session_events(&mut events);
            let response = outcome.map_err(describe_gateway_error)?;
            eprintln!("HTTP {}", response.status);
            println!("{}", response.text());
            if response.is_success() {
                Ok(())
            } else {
                Err(format!("server responded with HTTP {}", response.status))
            }
        }
        cli::Command::Init => run_init(),
    }
}

fn run_init() -> Result<(), String> {
    match initialize_default_global_config().map_err(|e| e.to_string())? {
        GlobalConfigInitResult::Created { path } => {
            println!("wrote default config to {}", path.display());
        }
        GlobalConfigInitResult::AlreadyExists { path } => {
            println!("config already exists at {}", path.display());
        }
    }
    Ok(())
}

fn build_request(
    method: &str,
    path: String,
    data: Option<&str>,
    headers: &[String],
) -> Result<RequestDescriptor, String> {
    let method = Method::from_bytes(method.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| format!("invalid HTTP method `{method}`"))?;
    let mut request = RequestDescriptor::new(method, path);
    for raw in headers {
        let (name, value) = cli::parse_header_arg(raw)?;
        request = request.with_header(name, value);
    }
    if let Some(data) = data {
        let body: serde_json::Value =
            serde_json::from_str(data).map_err(|e| format!("--data is not valid JSON: {e}"))?;
        request = request
            .with_json(&body)
            .map_err(|e| format!("failed to encode request body: {e}"))?;
    }
    Ok(request)
}

fn report_session_events(events: &mut broadcast::Receiver<SessionEvent>) {
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::Expired { reason } => {
                eprintln!("session expired ({reason}); run `storefront login` to sign in again");
            }
        }
    }
}

fn describe_gateway_error(err: GatewayError) -> String {
    match err {
        GatewayError::Unauthorized(response) => {
            format!("request rejected with HTTP {}: {}", response.status, response.text())
        }
        other => other.to_string(),
    }
}

fn present(flag: bool) -> &'static str {
    if flag {
        "present"
    } else {
        "missing"
    }
}
