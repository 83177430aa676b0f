use std::{net::SocketAddr, time::Duration};

use axum::{routing::get, Router};
use tokio_graceful_shutdown::{SubsystemBuilder, SubsystemHandle, Toplevel};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod audio;
mod config;
mod credentials;
mod error;
mod extractor;
mod search;
mod state;
mod util;

pub use error::{Error, Result};

use config::Config;
use state::AppState;

type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() -> Result<()> {
  dotenv::dotenv().ok();
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info")),
    )
    .init();

  let config = Config::from_env()?;
  let addr = config.socket_addr()?;
  let state = AppState::initialize(&config).await?;
  info!(mode = ?state.stream_mode, "gateway initialized");

  Toplevel::<BoxedError>::new(move |s| async move {
    s.start(SubsystemBuilder::new("http", move |subsys| {
      serve(subsys, addr, state)
    }));
  })
  .catch_signals()
  .handle_shutdown_requests(Duration::from_secs(config.shutdown_timeout))
  .await
  .map_err(|e| Error::Server(e.to_string()))
}

pub fn router(state: AppState) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/health", get(health))
    .route("/search", get(search::search))
    .route("/stream", get(audio::missing_video_id))
    .route("/stream/", get(audio::missing_video_id))
    .route("/stream/:video_id", get(audio::get_audio))
    .fallback(not_found)
    .layer(TraceLayer::new_for_http())
    .layer(CorsLayer::permissive())
    .with_state(state)
}

async fn serve(
  subsys: SubsystemHandle,
  addr: SocketAddr,
  state: AppState,
) -> Result<()> {
  let server = axum::Server::try_bind(&addr)
    .map_err(|e| Error::Server(format!("failed to bind {addr}: {e}")))?;
  info!("listening on http://{}", addr);

  server
    .serve(router(state).into_make_service())
    .with_graceful_shutdown(subsys.on_shutdown_requested())
    .await
    .map_err(|e| Error::Server(e.to_string()))
}

async fn homepage() -> &'static str {
  concat!(env!("CARGO_PKG_NAME"), " is live")
}

async fn health() -> &'static str {
  "ok"
}

async fn not_found() -> Error {
  Error::NotFound
}
