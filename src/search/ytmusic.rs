use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use reqwest::header;
use serde_json::{json, Map, Value};

use crate::{Error, Result};

use super::{SearchBackend, Track};

// "songs" filter of the search endpoint
const SONGS_PARAMS: &str = "EgWKAQIIAWoMEA4QChADEAQQCRAF";

static YTCFG_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"ytcfg\.set\((\{.*?\})\);").unwrap());

static DURATION_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\d+(:\d{2})+$").unwrap());

#[derive(Clone, Debug, PartialEq)]
struct InnertubeConfig {
  api_key: Option<String>,
  client_version: String,
  visitor_data: Option<String>,
  hl: String,
  gl: String,
}

impl InnertubeConfig {
  fn from_html(html: &str) -> Result<Self> {
    let mut ytcfg = Map::new();
    for captures in YTCFG_REGEX.captures_iter(html) {
      if let Ok(Value::Object(map)) = serde_json::from_str(&captures[1]) {
        ytcfg.extend(map);
      }
    }

    let get = |key: &str| {
      ytcfg.get(key).and_then(Value::as_str).map(str::to_owned)
    };
    let client_version = get("INNERTUBE_CLIENT_VERSION").ok_or_else(|| {
      Error::Search("INNERTUBE_CLIENT_VERSION missing from ytcfg".into())
    })?;

    Ok(Self {
      api_key: get("INNERTUBE_API_KEY"),
      client_version,
      visitor_data: get("VISITOR_DATA"),
      hl: get("HL").unwrap_or_else(|| "en".into()),
      gl: get("GL").unwrap_or_else(|| "US".into()),
    })
  }

  fn context(&self) -> Value {
    json!({
      "client": {
        "clientName": "WEB_REMIX",
        "clientVersion": self.client_version,
        "hl": self.hl,
        "gl": self.gl,
        "visitorData": self.visitor_data,
      }
    })
  }
}

/// YouTube Music search over the InnerTube API used by its web client.
pub struct YtMusic {
  http: reqwest::Client,
  base_url: String,
  config: InnertubeConfig,
}

impl YtMusic {
  /// Scrape the client configuration from the YouTube Music homepage.
  pub async fn initialize(
    http: reqwest::Client,
    base_url: impl Into<String>,
  ) -> Result<Self> {
    let base_url = base_url.into().trim_end_matches('/').to_string();
    let html = http
      .get(&base_url)
      .header(header::ACCEPT_LANGUAGE, "en-US,en;q=0.5")
      // skip the EU consent interstitial
      .header(header::COOKIE, "CONSENT=YES+1")
      .send()
      .await?
      .error_for_status()?
      .text()
      .await?;

    let config = InnertubeConfig::from_html(&html)?;
    Ok(Self {
      http,
      base_url,
      config,
    })
  }
}

#[async_trait]
impl SearchBackend for YtMusic {
  async fn search_songs(&self, query: &str) -> Result<Vec<Track>> {
    let mut req = self
      .http
      .post(format!("{}/youtubei/v1/search", self.base_url))
      .query(&[("prettyPrint", "false")])
      .header(header::ORIGIN, &self.base_url)
      .header(header::REFERER, format!("{}/", self.base_url))
      .json(&json!({
        "context": self.config.context(),
        "query": query,
        "params": SONGS_PARAMS,
      }));

    if let Some(key) = &self.config.api_key {
      req = req.query(&[("key", key.as_str())]);
    }
    if let Some(visitor_data) = &self.config.visitor_data {
      req = req.header("X-Goog-Visitor-Id", visitor_data.as_str());
    }

    let resp = req.send().await?;
    if !resp.status().is_success() {
      return Err(Error::Search(format!(
        "YouTube Music responded with {}",
        resp.status()
      )));
    }

    let body: Value = resp.json().await?;
    Ok(parse_search_response(&body))
  }
}

fn parse_search_response(body: &Value) -> Vec<Track> {
  const SECTIONS: &str = "/contents/tabbedSearchResultsRenderer/tabs/0\
    /tabRenderer/content/sectionListRenderer/contents";

  body
    .pointer(SECTIONS)
    .and_then(Value::as_array)
    .into_iter()
    .flatten()
    .filter_map(|section| section.pointer("/musicShelfRenderer/contents"))
    .filter_map(Value::as_array)
    .flatten()
    .filter_map(|item| item.get("musicResponsiveListItemRenderer"))
    .filter_map(parse_track)
    .collect()
}

fn runs<'a>(column: Option<&'a Value>, renderer: &str) -> Vec<Run<'a>> {
  column
    .and_then(|c| c.get(renderer))
    .and_then(|c| c.pointer("/text/runs"))
    .and_then(Value::as_array)
    .map(|runs| runs.iter().filter_map(Run::parse).collect())
    .unwrap_or_default()
}

struct Run<'a> {
  text: &'a str,
  page_type: Option<&'a str>,
}

impl<'a> Run<'a> {
  fn parse(run: &'a Value) -> Option<Self> {
    const PAGE_TYPE: &str = "/navigationEndpoint/browseEndpoint\
      /browseEndpointContextSupportedConfigs\
      /browseEndpointContextMusicConfig/pageType";

    Some(Self {
      text: run.get("text")?.as_str()?,
      page_type: run.pointer(PAGE_TYPE).and_then(Value::as_str),
    })
  }

  fn is_separator(&self) -> bool {
    self.text.trim() == "•"
  }
}

fn parse_track(renderer: &Value) -> Option<Track> {
  const PLAY_VIDEO_ID: &str = "/overlay/musicItemThumbnailOverlayRenderer\
    /content/musicPlayButtonRenderer/playNavigationEndpoint\
    /watchEndpoint/videoId";
  const THUMBNAILS: &str = "/thumbnail/musicThumbnailRenderer/thumbnail\
    /thumbnails";
  const FLEX: &str = "musicResponsiveListItemFlexColumnRenderer";
  const FIXED: &str = "musicResponsiveListItemFixedColumnRenderer";

  let id = renderer
    .pointer("/playlistItemData/videoId")
    .or_else(|| renderer.pointer(PLAY_VIDEO_ID))
    .and_then(Value::as_str)?;

  let columns = renderer.get("flexColumns")?.as_array()?;
  let title = runs(columns.first(), FLEX).first()?.text.to_owned();
  let details = runs(columns.get(1), FLEX);

  let mut artists: Vec<String> = details
    .iter()
    .filter(|run| {
      matches!(
        run.page_type,
        Some("MUSIC_PAGE_TYPE_ARTIST") | Some("MUSIC_PAGE_TYPE_USER_CHANNEL")
      )
    })
    .map(|run| run.text.to_owned())
    .collect();
  if artists.is_empty() {
    // some artists are plain text without a channel link
    artists.extend(
      details
        .first()
        .filter(|run| !run.is_separator())
        .map(|run| run.text.to_owned()),
    );
  }

  let album = details
    .iter()
    .find(|run| run.page_type == Some("MUSIC_PAGE_TYPE_ALBUM"))
    .map(|run| run.text.to_owned());

  let fixed = renderer
    .get("fixedColumns")
    .and_then(Value::as_array)
    .and_then(|columns| columns.first());
  let duration = details
    .iter()
    .chain(runs(fixed, FIXED).iter())
    .rev()
    .find(|run| DURATION_REGEX.is_match(run.text))
    .and_then(|run| parse_duration(run.text));

  let thumbnail = renderer
    .pointer(THUMBNAILS)
    .and_then(Value::as_array)
    .and_then(|thumbnails| thumbnails.last())
    .and_then(|t| t.get("url"))
    .and_then(Value::as_str)
    .map(str::to_owned);

  let artist = if artists.is_empty() {
    "Unknown".to_owned()
  } else {
    artists.join(", ")
  };

  Some(Track {
    id: id.to_owned(),
    title,
    artist,
    artists,
    album,
    duration,
    thumbnail,
  })
}

// "3:45" -> 225, "1:02:03" -> 3723
fn parse_duration(text: &str) -> Option<u64> {
  text
    .split(':')
    .try_fold(0u64, |acc, part| Some(acc * 60 + part.parse::<u64>().ok()?))
}
