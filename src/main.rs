use std::process::ExitCode;

use clap::Parser;
use samlbridge::{
    config::{BridgeConfig, ConfigError},
    observability::init_tracing,
    saml::{ContinuationCodec, EndpointRegistrar, SamlFrontend},
};

/// CLI arguments for samlbridge
#[derive(Parser, Debug)]
#[command(version, about = "SAML2 IdP frontend tooling", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file
    #[arg(short, long, global = true, default_value = "samlbridge.toml")]
    config: String,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the routing table and published endpoints for a provider set
    Routes {
        /// Upstream provider identifier (repeatable)
        #[arg(short, long = "provider", required = true)]
        providers: Vec<String>,
    },
    /// Decode a continuation token and print its contents as JSON
    DecodeState {
        /// Token as handed to the dispatch callback
        token: String,
    },
    /// Validate the config file and exit
    Check,
}

fn main() -> ExitCode {
    let args = Args::parse();

    let config = match BridgeConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return exit_code_for(&e);
        }
    };

    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("Warning: {e}");
    }

    let result = match args.command {
        Command::Routes { providers } => run_routes(&config, &providers),
        Command::DecodeState { token } => run_decode_state(&config, &token),
        Command::Check => run_check(&config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            tracing::error!(error = %message, "Command failed");
            eprintln!("Error: {message}");
            ExitCode::FAILURE
        }
    }
}

fn exit_code_for(error: &ConfigError) -> ExitCode {
    match error {
        ConfigError::Io(..) => ExitCode::from(2),
        _ => ExitCode::FAILURE,
    }
}

fn run_routes(config: &BridgeConfig, providers: &[String]) -> Result<(), String> {
    let registration = EndpointRegistrar::new(&config.frontend)
        .register(providers)
        .map_err(|e| e.to_string())?;

    println!("Routes (relative to '{}'):", registration.routes.base_path());
    for route in registration.routes.routes() {
        println!("  {:<10} {}", route.binding, route.pattern());
    }

    println!("Endpoints:");
    for (category, endpoints) in &registration.endpoints {
        for endpoint in endpoints {
            println!("  {category:<24} {:<60} {}", endpoint.url, endpoint.function);
        }
    }
    Ok(())
}

fn run_decode_state(config: &BridgeConfig, token: &str) -> Result<(), String> {
    let codec = match &config.continuation.signing_key {
        Some(key) => ContinuationCodec::with_signing_key(key.as_bytes()),
        None => ContinuationCodec::new(),
    };
    let state = codec.decode(token).map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&state).map_err(|e| e.to_string())?;
    println!("{json}");
    Ok(())
}

fn run_check(config: &BridgeConfig) -> Result<(), String> {
    let frontend = SamlFrontend::from_config(config).map_err(|e| e.to_string())?;
    tracing::info!(
        base = %frontend.config().base,
        signed_state = frontend.codec().is_signed(),
        "Configuration is valid"
    );
    println!("Configuration OK");
    Ok(())
}
