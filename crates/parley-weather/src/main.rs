//! Weather tool server over HTTP.
//!
//! Serves the `get-forecast` and `get-alerts` tools on a single POST
//! endpoint, backed by Open-Meteo. Pairs with the `parley` relay, which
//! registers the same tools in-process, but any HTTP client works.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p parley-weather
//! cargo run -p parley-weather -- --port 8080
//! ```
//!
//! Then exercise it with curl:
//!
//! ```bash
//! curl -X POST http://localhost:8000/ -d '{"type":"schema"}'
//! curl -X POST http://localhost:8000/ \
//!   -d '{"type":"execute","tools":[{"name":"get-forecast","parameters":{"location":"Paris"}}]}'
//! ```

use std::sync::Arc;

use clap::Parser;
use parley_rs::tools::weather::WeatherClient;
use parley_weather::build_router;

/// Weather tool server.
#[derive(Parser)]
#[command(about = "HTTP server exposing the get-forecast and get-alerts tools")]
struct Args {
    /// Port to listen on.
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let weather = Arc::new(WeatherClient::new()?);
    let router = build_router(weather);

    let listener = tokio::net::TcpListener::bind(("0.0.0.0", args.port))
        .await
        .map_err(|e| format!("failed to bind port {}: {e}", args.port))?;

    println!("\n=== WEATHER TOOL SERVER ===");
    println!("Listening on port {}...", args.port);
    println!("\nTEST EXAMPLES:");
    println!(
        "  curl -X POST http://localhost:{}/ -d '{{\"type\":\"schema\"}}'",
        args.port
    );
    println!(
        "  curl -X POST http://localhost:{}/ -d '{{\"type\":\"execute\",\"tools\":[{{\"name\":\"get-forecast\",\"parameters\":{{\"location\":\"Paris\"}}}}]}}'",
        args.port
    );
    println!("\nServer is running. Press Ctrl+C to stop.\n");

    axum::serve(listener, router)
        .await
        .map_err(|e| format!("server error: {e}"))
}
