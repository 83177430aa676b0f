use axum::{
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use serde_json::json;
use tracing::error;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("Query required")]
  MissingQuery,
  #[error("Video ID required")]
  MissingVideoId,
  #[error("{0}")]
  BadRequest(String),
  #[error("Not found")]
  NotFound,

  #[error("search client is not initialized")]
  SearchUnavailable,
  #[error("search failed: {0}")]
  Search(String),

  #[error("extraction failed: {0}")]
  Extraction(String),
  #[error("no audio-only format available for {0}")]
  NoAudioFormat(String),
  #[error("upstream responded with status {0}")]
  UpstreamStatus(u16),
  #[error("upstream closed before sending any audio")]
  EmptyStream,

  #[error("invalid cookie file: {0}")]
  Credentials(String),
  #[error("invalid configuration: {0}")]
  Config(#[from] envy::Error),
  #[error("server error: {0}")]
  Server(String),

  #[error(transparent)]
  Reqwest(#[from] reqwest::Error),
  #[error(transparent)]
  Response(#[from] http::Error),
  #[error(transparent)]
  IO(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  pub fn status(&self) -> StatusCode {
    match self {
      Error::MissingQuery | Error::MissingVideoId | Error::BadRequest(_) => {
        StatusCode::BAD_REQUEST
      }
      Error::NotFound => StatusCode::NOT_FOUND,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    if status.is_server_error() {
      error!("request failed: {}", self);
    }

    (status, Json(json!({ "error": self.to_string() }))).into_response()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn test_status_mapping() {
    assert_eq!(Error::MissingQuery.status(), StatusCode::BAD_REQUEST);
    assert_eq!(Error::MissingVideoId.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
      Error::BadRequest("bad path".into()).status(),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(Error::NotFound.status(), StatusCode::NOT_FOUND);
    assert_eq!(
      Error::NoAudioFormat("abc".into()).status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
    assert_eq!(
      Error::SearchUnavailable.status(),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }
}
