// Copyright 2025 Daniel Gehriger
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! PDF Signing Relay
//!
//! A WebSocket server that connects browser clients wanting a PDF signed
//! with the remote key holder that owns the private key. Clients use
//! `/client`, the key holder uses `/signer`.

#![allow(clippy::missing_errors_doc)]

use clap::Parser;
use pdf_remote_signer::{
    adapters::remote::server::{client_session, signer_session, validate_signer_auth, RelayState},
    infra::config::ConfigManager,
    CoordinatorConfig, SignWorkflow, SigningCoordinator,
};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use warp::Filter;

#[derive(Parser)]
#[command(name = "pdf-sign-relay")]
#[command(about = "WebSocket relay between PDF signing clients and a remote key holder")]
#[command(version)]
struct Cli {
    /// Address to bind to (overrides config, e.g. "0.0.0.0:5000")
    #[arg(short, long)]
    bind: Option<String>,

    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Seconds to wait for the remote signer (overrides config)
    #[arg(long)]
    timeout: Option<u64>,

    /// Requests the remote signer may have outstanding (overrides config)
    #[arg(long)]
    max_in_flight: Option<usize>,

    /// Bearer token the remote signer must present (or set `PDF_RELAY_SIGNER_TOKEN`)
    #[arg(long, env = "PDF_RELAY_SIGNER_TOKEN")]
    signer_token: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let manager = match &cli.config {
        Some(path) => Ok(ConfigManager::with_path(path)),
        None => ConfigManager::new(),
    };
    let mut config = match manager.and_then(|m| m.load_or_default()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Some(bind) = cli.bind {
        config.relay.bind_address = bind;
    }
    if let Some(timeout) = cli.timeout {
        config.signer_timeout_seconds = timeout;
    }
    if let Some(max_in_flight) = cli.max_in_flight {
        config.max_in_flight = max_in_flight;
    }
    if cli.signer_token.is_some() {
        config.relay.signer_token = cli.signer_token;
    }

    let workflow = match SignWorkflow::from_config(&config) {
        Ok(workflow) => workflow,
        Err(e) => {
            eprintln!("❌ Invalid configuration: {e}");
            std::process::exit(1);
        }
    };

    // Parse bind address
    let addr: SocketAddr = match config.relay.bind_address.parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("❌ Invalid bind address: {e}");
            std::process::exit(1);
        }
    };

    let coordinator = SigningCoordinator::spawn(workflow, CoordinatorConfig::from(&config));
    let state = Arc::new(RelayState::new(coordinator, config.relay.signer_token.clone()));
    let routes = build_routes(state.clone());

    println!("🚀 PDF signing relay listening on {addr}");
    println!("   Endpoints:");
    println!("     WS /client  - Sign and verify requests from browsers");
    println!("     WS /signer  - Remote key holder");
    println!(
        "   Signer timeout {}s, max in flight {}",
        config.signer_timeout_seconds,
        config.max_in_flight
    );
    if !state.requires_signer_token() {
        println!("⚠️  No signer token configured - any peer may act as the signer");
    }
    println!("⚠️  Running without TLS - use only behind a TLS-terminating proxy!");
    println!();
    println!("   Use Ctrl+C to stop the server");

    warp::serve(routes).run(addr).await;
}

/// Build all relay routes.
fn build_routes(
    state: Arc<RelayState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    let client = client_route(state.clone());
    let signer = signer_route(state);

    client.or(signer)
}

/// Browser client endpoint.
fn client_route(
    state: Arc<RelayState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("client")
        .and(warp::path::end())
        .and(warp::ws())
        .and(with_state(state))
        .map(|ws: warp::ws::Ws, state: Arc<RelayState>| {
            ws.on_upgrade(move |socket| client_session(socket, state))
        })
}

/// Remote key holder endpoint.
fn signer_route(
    state: Arc<RelayState>,
) -> impl Filter<Extract = (impl warp::Reply,), Error = warp::Rejection> + Clone {
    warp::path("signer")
        .and(warp::path::end())
        .and(warp::ws())
        .and(warp::header::optional::<String>("authorization"))
        .and(with_state(state))
        .and_then(handle_signer_upgrade)
}

/// Inject state into handlers.
fn with_state(
    state: Arc<RelayState>,
) -> impl Filter<Extract = (Arc<RelayState>,), Error = Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// Authenticate, then hand the socket to the signer session.
async fn handle_signer_upgrade(
    ws: warp::ws::Ws,
    auth: Option<String>,
    state: Arc<RelayState>,
) -> Result<Box<dyn warp::Reply>, Infallible> {
    if let Err(error) = validate_signer_auth(&state, auth.as_deref()) {
        log::warn!("Rejected signer connection: authentication failed");
        return Ok(Box::new(warp::reply::with_status(
            warp::reply::json(&error),
            warp::http::StatusCode::UNAUTHORIZED,
        )));
    }

    Ok(Box::new(
        ws.on_upgrade(move |socket| signer_session(socket, state)),
    ))
}
