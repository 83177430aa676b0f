mod ytdlp;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;

use crate::{credentials::Credentials, Result};

pub use ytdlp::Ytdlp;

pub type AudioStream = BoxStream<'static, Result<Bytes>>;

/// The audio-only format picked for a video.
#[derive(Clone, Debug, Default)]
pub struct Extraction {
  pub video_id: String,
  pub title: String,
  // seconds
  pub duration: Option<f64>,
  pub url: String,
  pub headers: Vec<(String, String)>,
}

impl Extraction {
  pub fn duration_secs(&self) -> u64 {
    self.duration.map(|d| d.round() as u64).unwrap_or_default()
  }
}

#[async_trait]
pub trait Extractor: Send + Sync {
  /// Resolve `video_id` to its best audio-only format.
  async fn extract(
    &self,
    video_id: &str,
    credentials: Option<&Credentials>,
  ) -> Result<Extraction>;

  /// Open the byte stream behind an extraction.
  async fn open(&self, extraction: &Extraction) -> Result<AudioStream>;
}
