//! FlowBridge entry point.
//!
//! Startup order mirrors the teacher's `router-api` binary: load and
//! validate the configuration first, install the logger at the level it
//! names (falling back to `info` if the file itself failed to load), then
//! either exit (`--validate-only`) or start the HTTP server with
//! `server.workers` worker threads.

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{middleware as actix_middleware, web, App, HttpServer};
use clap::Parser;
use flowbridge::middleware::RequestIdStamp;
use flowbridge::pipeline::AppState;
use flowbridge::{api, config, logging};

/// Content-aware HTTP webhook router.
#[derive(Parser, Debug)]
#[command(name = "flowbridge", version, about = "Content-aware HTTP webhook router")]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(long)]
    config: std::path::PathBuf,

    /// Load and validate the configuration, then exit without binding a
    /// socket. Exit code 0 on success, non-zero on failure.
    #[arg(long)]
    validate_only: bool,

    /// Overrides `server.host` from the configuration file.
    #[arg(long)]
    ip: Option<String>,

    /// Overrides `server.port` from the configuration file.
    #[arg(long)]
    port: Option<u16>,
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let cli = Cli::parse();
    let loaded = config::load(&cli.config);

    let log_level = loaded.as_ref().map(|c| c.server.log_level.as_str()).unwrap_or("info");
    let _log_guard = logging::init(log_level);

    if cli.validate_only {
        match loaded {
            Ok(_) => {
                println!("configuration at {} is valid", cli.config.display());
                std::process::exit(0);
            }
            Err(error) => {
                tracing::error!(category = logging::category::CONFIG_ERROR, "{error}");
                eprintln!("configuration is invalid: {error}");
                std::process::exit(error.exit_code());
            }
        }
    }

    let mut config = match loaded {
        Ok(config) => config,
        Err(error) => {
            tracing::error!(category = logging::category::CONFIG_ERROR, "{error}");
            eprintln!("failed to load configuration: {error}");
            std::process::exit(error.exit_code());
        }
    };

    if let Some(ip) = cli.ip {
        config.server.host = ip;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    let bind_address = format!("{}:{}", config.server.host, config.server.port);
    let workers = config.server.workers;
    tracing::info!(category = logging::category::RESPONSE, "starting FlowBridge on {bind_address}");

    let state = web::Data::new(AppState::new(config));

    HttpServer::new(move || {
        let cors = Cors::default()
            .allow_any_origin()
            .allowed_methods(vec!["GET", "POST"])
            .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
            .max_age(3600);

        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(api::MAX_BODY_BYTES))
            .wrap(actix_middleware::Logger::default())
            .wrap(cors)
            .wrap(RequestIdStamp)
            .configure(api::configure)
    })
    .bind(&bind_address)?
    .workers(workers)
    .run()
    .await
}
