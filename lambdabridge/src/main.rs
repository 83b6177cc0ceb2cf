//! lambdabridge - serve HTTP handlers from AWS Lambda
//!
//! Inside Lambda the demo router is fed from the Runtime API; elsewhere it is
//! served on a local port behind a stand-in API Gateway.

mod config;
mod routes;

use clap::Parser;
use std::net::SocketAddr;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "lambdabridge")]
#[command(about = "Serve HTTP handlers from AWS Lambda behind API Gateway", long_about = None)]
struct Args {
    /// Configuration file, without extension
    #[arg(short, long, default_value = "lambdabridge", env = "LAMBDABRIDGE_CONFIG")]
    config: String,

    /// Local port to listen on (0 picks a free port)
    #[arg(short, long, env = "LAMBDABRIDGE_PORT")]
    port: Option<u16>,

    /// Host to bind the local gateway to
    #[arg(long, env = "LAMBDABRIDGE_HOST")]
    host: Option<String>,

    /// Stage name reported to handlers by the local gateway
    #[arg(long, env = "LAMBDABRIDGE_STAGE")]
    stage: Option<String>,

    /// Prefix relative redirects with the stage on default API Gateway domains
    #[arg(long, env = "LAMBDABRIDGE_FIX_REDIRECTS")]
    fix_redirects: Option<bool>,

    /// Restore X-Amzn-Remapped-* request headers
    #[arg(long, env = "LAMBDABRIDGE_DEMANGLE")]
    demangle: Option<bool>,

    /// Copy reserved response headers to X-Amzn-Remapped-*
    #[arg(long, env = "LAMBDABRIDGE_MANGLE")]
    mangle: Option<bool>,

    /// Emit multiValueHeaders for repeated response headers
    #[arg(long, env = "LAMBDABRIDGE_MULTI_VALUE_HEADERS")]
    multi_value_headers: Option<bool>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info", env = "LAMBDABRIDGE_LOG_LEVEL")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "lambdabridge={0},lambdabridge_core={0},lambdabridge_runtime={0},tower_http=debug",
                    args.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut settings = config::Settings::load(&args.config)?;

    let mut bridge = settings.bridge;
    if let Some(enabled) = args.fix_redirects {
        bridge = bridge.fix_relative_redirect(enabled);
    }
    if let Some(enabled) = args.demangle {
        bridge = bridge.demangle_input_headers(enabled);
    }
    if let Some(enabled) = args.mangle {
        bridge = bridge.mangle_output_headers(enabled);
    }
    if let Some(enabled) = args.multi_value_headers {
        bridge = bridge.multi_value_headers(enabled);
    }

    if args.host.is_some() || args.port.is_some() {
        let host = args
            .host
            .unwrap_or_else(|| settings.local.addr.ip().to_string());
        let port = args.port.unwrap_or_else(|| settings.local.addr.port());
        settings.local.addr = format!("{}:{}", host, port).parse::<SocketAddr>()?;
    }
    if let Some(stage) = args.stage {
        settings.local.stage = stage;
    }

    info!("Starting lambdabridge...");
    info!(
        "  Redirect fixup: {}",
        if bridge.fix_relative_redirect { "enabled" } else { "disabled" }
    );
    info!(
        "  Header remapping: demangle={} mangle={}",
        bridge.demangle_input_headers, bridge.mangle_output_headers
    );

    lambdabridge_runtime::serve(routes::create_router(), bridge, &settings.local).await?;

    Ok(())
}
