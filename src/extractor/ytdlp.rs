use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};

use crate::{credentials::Credentials, util::redact_proxy, Error, Result};

use super::{AudioStream, Extraction, Extractor};

// used when no cookies are available; these clients are less likely to
// be asked to sign in from datacenter addresses.
const COOKIELESS_EXTRACTOR_ARGS: &str = "youtube:player_client=android,ios";

// run yt-dlp command line to get audio playback url.
// requires yt-dlp executable to be in PATH (or configured).
pub struct Ytdlp {
  program: String,
  proxy: Option<String>,
  http: reqwest::Client,
}

impl Ytdlp {
  pub fn new(
    program: impl Into<String>,
    proxy: Option<String>,
    http: reqwest::Client,
  ) -> Self {
    Self {
      program: program.into(),
      proxy,
      http,
    }
  }

  fn command(&self, video_id: &str, cookie_file: Option<&Path>) -> Command {
    let mut cmd = Command::new(&self.program);
    cmd.arg("-j").arg("--no-playlist").arg("--no-warnings");

    match cookie_file {
      Some(path) => {
        cmd.arg("--cookies").arg(path);
      }
      None => {
        cmd.arg("--extractor-args").arg(COOKIELESS_EXTRACTOR_ARGS);
      }
    }

    if let Some(proxy) = &self.proxy {
      debug!("using proxy: {}", redact_proxy(proxy));
      cmd.arg("--proxy").arg(proxy);
    }

    cmd
      .arg(format!("https://www.youtube.com/watch?v={video_id}"))
      .kill_on_drop(true);
    cmd
  }
}

#[derive(Deserialize, Debug)]
struct YtdlpOutput {
  id: String,
  title: String,
  duration: Option<f64>,
  #[serde(default)]
  formats: Vec<Format>,
}

#[derive(Deserialize, Debug, Clone, Default)]
struct Format {
  format_id: String,
  url: Option<String>,
  protocol: Option<String>,
  acodec: Option<String>,
  vcodec: Option<String>,
  abr: Option<f64>,
  quality: Option<f64>,
  #[serde(default)]
  http_headers: HashMap<String, String>,
}

impl Format {
  fn is_audio_only(&self) -> bool {
    let has_audio = matches!(self.acodec.as_deref(), Some(c) if c != "none");
    let has_video = self.vcodec.as_deref() != Some("none");
    // manifests and fragmented formats can't be relayed as one response
    let plain_http =
      matches!(self.protocol.as_deref(), None | Some("https") | Some("http"));

    has_audio && !has_video && plain_http && self.url.is_some()
  }

  fn rank(&self, other: &Self) -> Ordering {
    let key = |f: &Self| (f.abr.unwrap_or(0.0), f.quality.unwrap_or(0.0));
    let (a, b) = (key(self), key(other));
    a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1))
  }
}

fn best_audio(formats: Vec<Format>) -> Option<Format> {
  formats
    .into_iter()
    .filter(Format::is_audio_only)
    .max_by(Format::rank)
}

fn error_message(stderr: &[u8]) -> Option<String> {
  let s = String::from_utf8_lossy(stderr);
  let lines: Vec<_> = s
    .lines()
    .filter(|line| line.contains("ERROR:"))
    .map(str::trim)
    .collect();

  (!lines.is_empty()).then(|| lines.join("\n"))
}

#[async_trait]
impl Extractor for Ytdlp {
  async fn extract(
    &self,
    video_id: &str,
    credentials: Option<&Credentials>,
  ) -> Result<Extraction> {
    // yt-dlp saves its cookie jar back on exit, keep the file until then
    let cookie_file = match credentials {
      Some(credentials) => Some(credentials.cookie_file().await?),
      None => None,
    };
    let output = self
      .command(video_id, cookie_file.as_ref().map(|f| f.path()))
      .output()
      .await?;
    drop(cookie_file);

    if !output.status.success() {
      let message = error_message(&output.stderr)
        .unwrap_or_else(|| format!("yt-dlp exited with {}", output.status));
      return Err(Error::Extraction(message));
    }

    let output: YtdlpOutput = serde_json::from_slice(&output.stdout)
      .map_err(|e| Error::Extraction(format!("unreadable yt-dlp output: {e}")))?;

    let format = best_audio(output.formats)
      .ok_or_else(|| Error::NoAudioFormat(video_id.into()))?;
    info!(
      video_id,
      format = %format.format_id,
      abr = format.abr.unwrap_or_default(),
      "selected audio format"
    );

    Ok(Extraction {
      video_id: output.id,
      title: output.title,
      duration: output.duration,
      url: format.url.unwrap_or_default(),
      headers: format.http_headers.into_iter().collect(),
    })
  }

  async fn open(&self, extraction: &Extraction) -> Result<AudioStream> {
    let mut req = self.http.get(&extraction.url);
    for (name, value) in &extraction.headers {
      req = req.header(name.as_str(), value.as_str());
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(Error::UpstreamStatus(resp.status().as_u16()));
    }

    Ok(resp.bytes_stream().map_err(Error::from).boxed())
  }
}
