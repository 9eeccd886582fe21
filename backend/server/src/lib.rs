//! Documentation of the decentralized museum backend.
//!
//! Artists upload artwork that gets pinned to IPFS, visitors buy gallery tickets, DAO members vote on
//! exhibit and event proposals. Everything chain related (minting, paying, signing) happens in the
//! browser wallet, this server only keeps the records.
//!
//!
//!
//! # General Infrastructure
//! - Single process, one [`database::Store`] built at startup and shared through [`state::AppState`]
//! - Nothing is durable, a restart starts again from the sample proposals
//! - Uploaded images go to the pinning service, or to `UPLOAD_DIR` when it is not configured
//! - JSON everywhere except the multipart upload and the image fallback
//!
//!
//!
//! # Identity
//!
//! The wallet address is the identity. It comes from the path, the body, or the `x-wallet-address`
//! header and is compared case-insensitively.
//!
//! - No signature check, any caller can claim any address
//! - Fine for the gallery flow, not fine for anything that moves value
//! - Fixing it needs a signed nonce from the wallet, which the frontend does not send yet
//!
//!
//!
//! # Routes
//!
//! | Method | Path | |
//! |---|---|---|
//! | GET | `/api/users/me/{walletAddress}` | fetch or create |
//! | POST | `/api/users` | create |
//! | GET | `/api/artworks` | newest first |
//! | GET | `/api/artworks/my/{artistAddress}` | by artist |
//! | POST | `/api/artworks/upload` | multipart, see [`uploads`] |
//! | POST | `/api/artworks/purchase` | record a purchase |
//! | GET | `/api/artworks/{id}/purchases` | purchases of one artwork |
//! | GET | `/api/images/{hash}` | locally pinned content |
//! | POST | `/api/tickets/purchase` | buy a ticket |
//! | GET | `/api/tickets/check/{visitorAddress}` | gallery access |
//! | POST | `/api/dao/join` | become a DAO member |
//! | GET/POST | `/api/proposals` | list, create |
//! | PATCH | `/api/proposals/{id}` | status, title, description, end time |
//! | GET | `/api/proposals/{id}/votes` | votes by proposal id |
//! | POST | `/api/proposals/vote` | one vote per voter per proposal |
//!
//! Anything else is a 404 `{"error": "Not found"}`. A known path with the wrong method is a 405
//! `{"error": "Method not allowed"}`.
//!
//!
//!
//! # Setup
//!
//! Run locally, no pinning credentials.
//! ```sh
//! RUST_LOG=info cargo run -p museum-backend
//! ```
//!
//! Start without the sample proposals.
//! ```sh
//! cargo run -p museum-backend -- --no-seed
//! ```
//!
//! View current docs.
//! ```sh
//! cargo doc --open
//! ```
use std::{sync::Arc, time::Duration};

use anyhow::Context;
use axum::{
    Router,
    extract::DefaultBodyLimit,
    http::{HeaderName, Method, header::CONTENT_TYPE},
    routing::{get, patch, post},
};

use signal::{
    ctrl_c,
    unix::{SignalKind, signal},
};
use tokio::{net::TcpListener, signal};
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

pub mod config;
pub mod database;
pub mod error;
pub mod models;
pub mod pinning;
pub mod routes;
pub mod state;
pub mod uploads;
pub mod utils;

use config::Config;
use routes::{
    artist_artworks_handler, artwork_purchases_handler, artworks_handler, check_ticket_handler,
    create_proposal_handler, create_user_handler, health_handler, join_dao_handler, me_handler,
    method_not_allowed_handler, not_found_handler, proposal_votes_handler, proposals_handler,
    purchase_artwork_handler, purchase_ticket_handler, update_proposal_handler, vote_handler,
};
use state::AppState;
use uploads::{image_handler, upload_handler};
use utils::WALLET_HEADER;

pub const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

/// Overrides applied on top of the environment config.
#[derive(Debug, Default, Clone)]
pub struct ServerOptions {
    pub port: Option<u16>,
    pub no_seed: bool,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(WALLET_HEADER)])
        .max_age(Duration::from_secs(60 * 60));

    let api = Router::new()
        .route("/health", get(health_handler))
        .route("/users", post(create_user_handler))
        .route("/users/me/{wallet_address}", get(me_handler))
        .route("/artworks", get(artworks_handler))
        .route("/artworks/my/{artist_address}", get(artist_artworks_handler))
        .route(
            "/artworks/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/artworks/purchase", post(purchase_artwork_handler))
        .route("/artworks/{id}/purchases", get(artwork_purchases_handler))
        .route("/images/{hash}", get(image_handler))
        .route("/tickets/purchase", post(purchase_ticket_handler))
        .route("/tickets/check/{visitor_address}", get(check_ticket_handler))
        .route("/dao/join", post(join_dao_handler))
        .route("/proposals", get(proposals_handler).post(create_proposal_handler))
        .route("/proposals/vote", post(vote_handler))
        .route("/proposals/{id}", patch(update_proposal_handler))
        .route("/proposals/{id}/votes", get(proposal_votes_handler))
        .method_not_allowed_fallback(method_not_allowed_handler);

    Router::new()
        .nest("/api", api)
        .fallback(not_found_handler)
        .layer(cors)
        .with_state(state)
}

pub async fn start_server(options: ServerOptions) -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    info!("Initializing state...");
    let mut config = Config::load()?;
    if let Some(port) = options.port {
        config.port = port;
    }
    config.seed = !options.no_seed;

    let state = AppState::new(config).context("Failed to build pinning client")?;

    info!("Starting server...");

    let app = router(state.clone());

    let address = format!("0.0.0.0:{}", state.config.port);
    info!("Binding to {address}");

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {address}"))?;
    info!("Server running on {address}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutting down...");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if ctrl_c().await.is_ok() {
            info!("Received Ctrl+C, shutting down");
        } else {
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(_) => std::future::pending::<()>().await,
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
