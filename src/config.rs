use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::{Error, Result};

fn default_host() -> String {
  "0.0.0.0".to_string()
}

fn default_port() -> u16 {
  10000
}

fn default_cookies_path() -> PathBuf {
  PathBuf::from("cookies.json")
}

fn default_ytdlp_path() -> String {
  "yt-dlp".to_string()
}

fn default_ytmusic_url() -> String {
  "https://music.youtube.com".to_string()
}

fn default_shutdown_timeout() -> u64 {
  10
}

/// How `/stream` hands audio to the caller.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StreamMode {
  /// Respond with the upstream URL as JSON.
  Direct,
  /// Relay the upstream bytes through this server.
  #[default]
  Proxy,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
  #[serde(default = "default_host")]
  pub host: String,
  #[serde(default = "default_port")]
  pub port: u16,
  #[serde(default = "default_cookies_path")]
  pub cookies_path: PathBuf,
  #[serde(default)]
  pub stream_mode: StreamMode,
  #[serde(default = "default_ytdlp_path")]
  pub ytdlp_path: String,
  pub ytdlp_proxy: Option<String>,
  #[serde(default = "default_ytmusic_url")]
  pub ytmusic_url: String,
  #[serde(default = "default_shutdown_timeout")]
  pub shutdown_timeout: u64,
}

impl Config {
  pub fn from_env() -> Result<Self> {
    Self::from_iter(std::env::vars())
  }

  pub fn from_iter<I>(vars: I) -> Result<Self>
  where
    I: IntoIterator<Item = (String, String)>,
  {
    Ok(envy::from_iter(vars)?)
  }

  pub fn socket_addr(&self) -> Result<SocketAddr> {
    format!("{}:{}", self.host, self.port)
      .parse()
      .map_err(|e| Error::Server(format!("invalid listen address: {e}")))
  }
}
