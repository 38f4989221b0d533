use clap::Parser;
use tokio::io::BufReader;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use galaxy_agent::{
    cli::{execute_command, run_interactive, Cli, Commands},
    config::{Config, LogFormat},
    intent::KeywordIntentResolver,
    ConnectionContext, Dispatcher, McpServer,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    init_logging(&config);

    info!(version = env!("CARGO_PKG_VERSION"), "Galaxy agent starting");

    let context = ConnectionContext::new();
    let dispatcher = match Dispatcher::from_config(&config, context) {
        Ok(d) => d,
        Err(e) => {
            error!(error = %e, "Failed to initialize dispatcher");
            return Err(e.into());
        }
    };
    let resolver = KeywordIntentResolver::new();

    match cli.command {
        Commands::Serve => {
            try_connect(&dispatcher, cli.url, cli.api_key).await;
            let server = McpServer::new(dispatcher);

            info!("Server ready, waiting for requests on stdin...");
            if let Err(e) = server.run().await {
                error!(error = %e, "Server error");
                return Err(e.into());
            }
            info!("Server shutdown complete");
        }
        Commands::Interact => {
            try_connect(&dispatcher, cli.url, cli.api_key).await;
            run_interactive(
                &dispatcher,
                &resolver,
                BufReader::new(tokio::io::stdin()),
                tokio::io::stdout(),
            )
            .await?;
        }
        command => {
            if let Err(e) = dispatcher.connect(cli.url, cli.api_key).await {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }

            let result = execute_command(command, &dispatcher, &resolver).await;
            if result.exit_code == 0 {
                println!("{}", result.message.trim_end());
            } else {
                eprintln!("{}", result.message.trim_end());
                std::process::exit(result.exit_code);
            }
        }
    }

    Ok(())
}

/// Connect when credentials are available; the session can still connect later.
async fn try_connect(dispatcher: &Dispatcher, url: Option<String>, api_key: Option<String>) {
    match dispatcher.connect(url, api_key).await {
        Ok(_) => {}
        Err(e) => warn!(error = %e, "Starting without a Galaxy connection"),
    }
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
