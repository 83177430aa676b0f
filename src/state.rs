use std::sync::Arc;

use tracing::{error, info, warn};

use crate::{
  config::{Config, StreamMode},
  credentials::Credentials,
  extractor::{Extractor, Ytdlp},
  search::{SearchBackend, YtMusic},
  Result,
};

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
  AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// Everything handlers need, built once at startup and read-only afterwards.
#[derive(Clone)]
pub struct AppState {
  // None when the search client failed to initialize
  pub search: Option<Arc<dyn SearchBackend>>,
  pub extractor: Arc<dyn Extractor>,
  pub credentials: Option<Arc<Credentials>>,
  pub stream_mode: StreamMode,
}

impl AppState {
  pub async fn initialize(config: &Config) -> Result<Self> {
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;

    let credentials = match Credentials::load(&config.cookies_path).await {
      Ok(credentials) => {
        info!(
          "loaded {} cookies from {}",
          credentials.len(),
          config.cookies_path.display()
        );
        Some(Arc::new(credentials))
      }
      Err(e) => {
        warn!(
          "no cookies loaded from {} ({}), streams might fail on cloud servers",
          config.cookies_path.display(),
          e
        );
        None
      }
    };

    let search: Option<Arc<dyn SearchBackend>> =
      match YtMusic::initialize(http.clone(), &config.ytmusic_url).await {
        Ok(client) => {
          info!("YouTube Music client initialized");
          Some(Arc::new(client))
        }
        Err(e) => {
          error!("failed to initialize YouTube Music client: {}", e);
          None
        }
      };

    let extractor = Arc::new(Ytdlp::new(
      config.ytdlp_path.clone(),
      config.ytdlp_proxy.clone(),
      http,
    ));

    Ok(Self {
      search,
      extractor,
      credentials,
      stream_mode: config.stream_mode,
    })
  }
}
