mod ytmusic;

use async_trait::async_trait;
use axum::{
  extract::{rejection::QueryRejection, Query, State},
  Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{state::AppState, Error, Result};

pub use ytmusic::YtMusic;

#[derive(Clone, Debug, Default, Serialize, PartialEq, Eq)]
pub struct Track {
  pub id: String,
  pub title: String,
  pub artist: String,
  pub artists: Vec<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub album: Option<String>,
  // seconds
  pub duration: Option<u64>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
}

#[async_trait]
pub trait SearchBackend: Send + Sync {
  async fn search_songs(&self, query: &str) -> Result<Vec<Track>>;
}

#[derive(Deserialize)]
pub struct SearchReq {
  q: Option<String>,
  query: Option<String>,
}

impl SearchReq {
  // `q` wins when both are given
  fn query(&self) -> Option<&str> {
    [&self.q, &self.query]
      .into_iter()
      .filter_map(|q| q.as_deref().map(str::trim))
      .find(|q| !q.is_empty())
  }
}

pub async fn search(
  State(state): State<AppState>,
  req: std::result::Result<Query<SearchReq>, QueryRejection>,
) -> Result<Json<Vec<Track>>> {
  let Query(req) =
    req.map_err(|rejection| Error::BadRequest(rejection.body_text()))?;
  let query = req.query().ok_or(Error::MissingQuery)?;

  let backend = state.search.as_ref().ok_or(Error::SearchUnavailable)?;
  let tracks = backend.search_songs(query).await?;
  info!(query, results = tracks.len(), "search");

  Ok(Json(tracks))
}

#[cfg(test)]
mod test {
  use std::sync::{atomic::Ordering, Arc};

  use axum::http::StatusCode;
  use serde_json::{json, Value};

  use crate::state::testing::{get, FakeExtractor, FakeSearch};
  use crate::state::AppState;

  fn state(search: Option<Arc<FakeSearch>>) -> AppState {
    AppState::for_test(search, Arc::new(FakeExtractor::default()))
  }

  #[tokio::test]
  async fn test_search_returns_backend_order() {
    let search = Arc::new(FakeSearch::with_titles(&["First", "Second"]));
    let resp = get(state(Some(search.clone())), "/search?q=daft%20punk").await;

    assert_eq!(resp.status, StatusCode::OK);
    let body: Value = resp.json();
    let titles: Vec<_> = body
      .as_array()
      .unwrap()
      .iter()
      .map(|t| t["title"].as_str().unwrap().to_owned())
      .collect();
    assert_eq!(titles, ["First", "Second"]);
    assert!(body[0]["id"].is_string());
    assert_eq!(*search.last_query.lock().unwrap(), "daft punk");
  }

  #[tokio::test]
  async fn test_query_alias() {
    let search = Arc::new(FakeSearch::with_titles(&["Only"]));
    let resp = get(state(Some(search)), "/search?query=abba").await;
    assert_eq!(resp.status, StatusCode::OK);
  }

  #[tokio::test]
  async fn test_both_query_params_prefer_q() {
    let search = Arc::new(FakeSearch::with_titles(&["Only"]));
    let resp =
      get(state(Some(search.clone())), "/search?q=abba&query=queen").await;

    assert_eq!(resp.status, StatusCode::OK);
    assert_eq!(*search.last_query.lock().unwrap(), "abba");
  }

  #[tokio::test]
  async fn test_repeated_query_param_is_json_400() {
    let search = Arc::new(FakeSearch::with_titles(&["Unused"]));
    let resp = get(state(Some(search.clone())), "/search?q=a&q=b").await;

    assert_eq!(resp.status, StatusCode::BAD_REQUEST);
    assert!(resp.json()["error"].is_string());
    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_missing_query_never_reaches_backend() {
    let search = Arc::new(FakeSearch::with_titles(&["Unused"]));

    for uri in ["/search", "/search?q=", "/search?q=%20%20"] {
      let resp = get(state(Some(search.clone())), uri).await;
      assert_eq!(resp.status, StatusCode::BAD_REQUEST, "{uri}");
      assert_eq!(resp.json(), json!({ "error": "Query required" }));
    }

    assert_eq!(search.calls.load(Ordering::SeqCst), 0);
  }

  #[tokio::test]
  async fn test_uninitialized_backend() {
    let resp = get(state(None), "/search?q=abba").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
      resp.json(),
      json!({ "error": "search client is not initialized" })
    );
  }

  #[tokio::test]
  async fn test_backend_failure() {
    let search = Arc::new(FakeSearch::failing("timed out"));
    let resp = get(state(Some(search)), "/search?q=abba").await;
    assert_eq!(resp.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(resp.json(), json!({ "error": "search failed: timed out" }));
  }
}
