use axum::{
  body::{self, StreamBody},
  extract::{rejection::PathRejection, Path, State},
  http::{header, Response, StatusCode},
  response::IntoResponse,
  Json,
};
use serde::Serialize;
use tracing::info;

use crate::{
  config::StreamMode, extractor::Extraction, state::AppState, util::RelayStream,
  Error, Result,
};

const PROXY_CONTENT_TYPE: &str = "audio/mpeg";

#[derive(Debug, Serialize)]
pub struct DirectAudio {
  url: String,
  title: String,
  duration: u64,
}

impl From<Extraction> for DirectAudio {
  fn from(extraction: Extraction) -> Self {
    Self {
      duration: extraction.duration_secs(),
      url: extraction.url,
      title: extraction.title,
    }
  }
}

pub async fn get_audio(
  State(state): State<AppState>,
  video_id: std::result::Result<Path<String>, PathRejection>,
) -> Result<axum::response::Response> {
  let Path(video_id) =
    video_id.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
  let video_id = video_id.trim();
  if video_id.is_empty() {
    return Err(Error::MissingVideoId);
  }

  info!(video_id, mode = ?state.stream_mode, "audio requested");
  let extraction = state
    .extractor
    .extract(video_id, state.credentials.as_deref())
    .await?;

  match state.stream_mode {
    StreamMode::Direct => Ok(Json(DirectAudio::from(extraction)).into_response()),
    StreamMode::Proxy => proxy_audio(&state, extraction).await,
  }
}

pub async fn missing_video_id() -> Error {
  Error::MissingVideoId
}

async fn proxy_audio(
  state: &AppState,
  extraction: Extraction,
) -> Result<axum::response::Response> {
  let upstream = state.extractor.open(&extraction).await?;
  // nothing has been sent yet, so failures up to here still get a status
  let relay = RelayStream::start(extraction.video_id, upstream).await?;

  let resp = Response::builder()
    .status(StatusCode::OK)
    .header(header::CONTENT_TYPE, PROXY_CONTENT_TYPE)
    .header(header::TRANSFER_ENCODING, "chunked")
    .body(body::boxed(StreamBody::new(relay)))?;

  Ok(resp)
}
