use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Deserialize;
use tracing::debug;

use crate::{Error, Result};

const NETSCAPE_HEADER: &str = "# Netscape HTTP Cookie File";
const HTTP_ONLY_PREFIX: &str = "#HttpOnly_";

static NEXT_COOKIE_FILE: AtomicU64 = AtomicU64::new(0);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cookie {
  pub name: String,
  pub value: String,
  pub domain: String,
  pub path: String,
  pub secure: bool,
  pub http_only: bool,
  pub host_only: bool,
  // unix seconds, None for session cookies
  pub expires: Option<i64>,
}

impl Cookie {
  // a Netscape line is tab separated, so no field may contain a tab or
  // line break, and a cookie without a domain can't be scoped at all
  fn is_renderable(&self) -> bool {
    let clean = |s: &str| !s.contains(['\t', '\n', '\r']);
    !self.domain.trim_start_matches('.').is_empty()
      && !self.name.is_empty()
      && clean(&self.name)
      && clean(&self.value)
      && clean(&self.domain)
      && clean(&self.path)
  }
}

/// Cookies loaded once at startup. The source file is never handed to the
/// extractor; each extraction gets its own copy via [`Credentials::cookie_file`].
#[derive(Debug)]
pub struct Credentials {
  cookies: Vec<Cookie>,
}

impl Credentials {
  pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let cookies = match parse_cookies(&content)? {
      CookieSource::Netscape(cookies) | CookieSource::Json(cookies) => cookies,
    };

    Ok(Self { cookies })
  }

  pub fn len(&self) -> usize {
    self.cookies.len()
  }

  pub fn is_empty(&self) -> bool {
    self.cookies.is_empty()
  }

  /// Render the cookies into a fresh Netscape file for one yt-dlp run.
  ///
  /// yt-dlp writes its cookie jar back to `--cookies` on exit, so every
  /// invocation needs a private file. It is deleted when the guard drops.
  pub async fn cookie_file(&self) -> Result<CookieFile> {
    let path = std::env::temp_dir().join(format!(
      "{}-cookies-{}-{}.txt",
      env!("CARGO_PKG_NAME"),
      std::process::id(),
      NEXT_COOKIE_FILE.fetch_add(1, Ordering::Relaxed)
    ));
    tokio::fs::write(&path, render_netscape(&self.cookies)).await?;
    debug!("rendered cookies to {}", path.display());

    Ok(CookieFile { path })
  }
}

#[derive(Debug)]
pub struct CookieFile {
  path: PathBuf,
}

impl CookieFile {
  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for CookieFile {
  fn drop(&mut self) {
    std::fs::remove_file(&self.path).ok();
  }
}

#[derive(Debug, PartialEq)]
enum CookieSource {
  Json(Vec<Cookie>),
  Netscape(Vec<Cookie>),
}

fn parse_cookies(content: &str) -> Result<CookieSource> {
  let trimmed = content.trim_start();
  let source = if trimmed.starts_with('[') || trimmed.starts_with('{') {
    CookieSource::Json(parse_json(trimmed)?)
  } else {
    CookieSource::Netscape(parse_netscape(content)?)
  };

  match &source {
    CookieSource::Json(c) | CookieSource::Netscape(c) if c.is_empty() => {
      Err(Error::Credentials("no cookies found".into()))
    }
    _ => Ok(source),
  }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonCookies {
  List(Vec<JsonCookie>),
  Wrapped { cookies: Vec<JsonCookie> },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonCookie {
  name: String,
  value: String,
  #[serde(default)]
  domain: String,
  #[serde(default = "default_cookie_path")]
  path: String,
  #[serde(default)]
  secure: bool,
  #[serde(default)]
  http_only: bool,
  #[serde(default)]
  host_only: bool,
  #[serde(alias = "expires")]
  expiration_date: Option<f64>,
}

fn default_cookie_path() -> String {
  "/".to_string()
}

impl From<JsonCookie> for Cookie {
  fn from(c: JsonCookie) -> Self {
    Self {
      name: c.name,
      value: c.value,
      domain: c.domain,
      path: c.path,
      secure: c.secure,
      http_only: c.http_only,
      host_only: c.host_only,
      expires: c.expiration_date.map(|x| x as i64).filter(|&x| x > 0),
    }
  }
}

fn parse_json(content: &str) -> Result<Vec<Cookie>> {
  let cookies = match serde_json::from_str::<JsonCookies>(content)
    .map_err(|e| Error::Credentials(e.to_string()))?
  {
    JsonCookies::List(cookies) | JsonCookies::Wrapped { cookies } => cookies,
  };

  Ok(
    cookies
      .into_iter()
      .map(Cookie::from)
      .filter(|cookie| {
        let ok = cookie.is_renderable();
        if !ok {
          debug!("skipping unusable cookie {:?}", cookie.name);
        }
        ok
      })
      .collect(),
  )
}

fn parse_netscape(content: &str) -> Result<Vec<Cookie>> {
  let mut cookies = Vec::new();

  for (lineno, line) in content.lines().enumerate() {
    let line = line.trim_end_matches('\r');
    let (line, http_only) = match line.strip_prefix(HTTP_ONLY_PREFIX) {
      Some(rest) => (rest, true),
      None => (line, false),
    };
    if line.trim().is_empty() || line.starts_with('#') {
      continue;
    }

    let fields: Vec<_> = line.split('\t').collect();
    let [domain, subdomains, path, secure, expires, name, value] =
      fields.as_slice()
    else {
      return Err(Error::Credentials(format!(
        "line {}: expected 7 tab-separated fields",
        lineno + 1
      )));
    };

    let expires = expires.parse::<i64>().map_err(|_| {
      Error::Credentials(format!("line {}: invalid expiry", lineno + 1))
    })?;

    cookies.push(Cookie {
      name: name.to_string(),
      value: value.to_string(),
      domain: domain.to_string(),
      path: path.to_string(),
      secure: secure.eq_ignore_ascii_case("TRUE"),
      http_only,
      host_only: !subdomains.eq_ignore_ascii_case("TRUE"),
      expires: (expires > 0).then_some(expires),
    });
  }

  Ok(cookies)
}

fn render_netscape(cookies: &[Cookie]) -> String {
  let bool_str = |b: bool| if b { "TRUE" } else { "FALSE" };
  let mut out = format!("{NETSCAPE_HEADER}\n\n");

  for c in cookies.iter().filter(|c| c.is_renderable()) {
    // yt-dlp rejects host-only cookies whose domain starts with a dot
    let domain = if c.host_only {
      c.domain.trim_start_matches('.').to_string()
    } else if c.domain.starts_with('.') {
      c.domain.clone()
    } else {
      format!(".{}", c.domain)
    };

    out.push_str(&format!(
      "{}{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
      if c.http_only { HTTP_ONLY_PREFIX } else { "" },
      domain,
      bool_str(!c.host_only),
      c.path,
      bool_str(c.secure),
      c.expires.unwrap_or(0),
      c.name,
      c.value,
    ));
  }

  out
}

#[cfg(test)]
mod test {
  use super::*;

  const JSON_COOKIES: &str = r#"[
    {
      "domain": ".youtube.com",
      "expirationDate": 1790000000.5,
      "hostOnly": false,
      "httpOnly": true,
      "name": "SID",
      "path": "/",
      "secure": true,
      "value": "abc"
    },
    { "domain": "www.youtube.com", "hostOnly": true, "name": "PREF", "value": "hl=en" }
  ]"#;

  const NETSCAPE_COOKIES: &str = "# Netscape HTTP Cookie File\n\
    # comment\n\
    \n\
    #HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1790000000\tSID\tabc\n\
    www.youtube.com\tFALSE\t/\tFALSE\t0\tPREF\thl=en\n";

  #[test]
  fn test_parse_json_cookies() {
    let CookieSource::Json(cookies) = parse_cookies(JSON_COOKIES).unwrap()
    else {
      panic!("expected json cookies");
    };

    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].name, "SID");
    assert!(cookies[0].http_only && cookies[0].secure);
    assert_eq!(cookies[0].expires, Some(1790000000));
    assert_eq!(cookies[1].path, "/");
    assert!(cookies[1].host_only);
    assert_eq!(cookies[1].expires, None);
  }

  #[test]
  fn test_parse_wrapped_json_cookies() {
    let wrapped = format!("{{\"cookies\": {JSON_COOKIES}}}");
    assert!(matches!(
      parse_cookies(&wrapped).unwrap(),
      CookieSource::Json(c) if c.len() == 2
    ));
  }

  #[test]
  fn test_parse_netscape_cookies() {
    let CookieSource::Netscape(cookies) =
      parse_cookies(NETSCAPE_COOKIES).unwrap()
    else {
      panic!("expected netscape cookies");
    };

    assert_eq!(cookies.len(), 2);
    assert_eq!(cookies[0].domain, ".youtube.com");
    assert!(cookies[0].http_only);
    assert!(!cookies[0].host_only);
    assert_eq!(cookies[1].value, "hl=en");
    assert!(cookies[1].host_only);
    assert_eq!(cookies[1].expires, None);
  }

  #[test]
  fn test_empty_cookie_files_are_rejected() {
    assert!(parse_cookies("[]").is_err());
    assert!(parse_cookies("# Netscape HTTP Cookie File\n").is_err());
    assert!(parse_cookies("not\ta\tcookie").is_err());
  }

  #[test]
  fn test_render_netscape_matches_parsed_json() {
    let CookieSource::Json(cookies) = parse_cookies(JSON_COOKIES).unwrap()
    else {
      panic!("expected json cookies");
    };

    let rendered = render_netscape(&cookies);
    assert!(rendered.starts_with(NETSCAPE_HEADER));
    assert!(rendered
      .contains("#HttpOnly_.youtube.com\tTRUE\t/\tTRUE\t1790000000\tSID\tabc"));
    assert!(rendered.contains("www.youtube.com\tFALSE\t/\tFALSE\t0\tPREF\thl=en"));

    assert_eq!(parse_netscape(&rendered).unwrap(), cookies);
  }

  #[tokio::test]
  async fn test_missing_file_is_an_error() {
    let res = Credentials::load("/nonexistent/cookies.json").await;
    assert!(matches!(res, Err(Error::IO(_))));
  }

  #[test]
  fn test_unusable_json_cookies_are_skipped() {
    let json = r#"[
      { "name": "NODOMAIN", "value": "x", "hostOnly": false },
      { "domain": ".youtube.com", "name": "TAB", "value": "a\tb" },
      { "domain": ".youtube.com", "name": "NL", "value": "a\nb" },
      { "domain": ".youtube.com", "name": "SID", "value": "abc" }
    ]"#;

    let CookieSource::Json(cookies) = parse_cookies(json).unwrap() else {
      panic!("expected json cookies");
    };
    assert_eq!(cookies.len(), 1);
    assert_eq!(cookies[0].name, "SID");

    let rendered = render_netscape(&cookies);
    assert_eq!(rendered.lines().filter(|l| l.contains('\t')).count(), 1);
    assert!(!rendered.contains("\t.\t"));

    let only_bad = r#"[{ "name": "NODOMAIN", "value": "x" }]"#;
    assert!(parse_cookies(only_bad).is_err());
  }

  #[tokio::test]
  async fn test_cookie_files_are_private_and_removed() {
    let path = std::env::temp_dir()
      .join(format!("ytmusic-gateway-test-{}.txt", std::process::id()));
    tokio::fs::write(&path, NETSCAPE_COOKIES).await.unwrap();

    let credentials = Credentials::load(&path).await.unwrap();
    assert_eq!(credentials.len(), 2);
    assert!(!credentials.is_empty());

    let first = credentials.cookie_file().await.unwrap();
    let second = credentials.cookie_file().await.unwrap();
    assert_ne!(first.path(), path.as_path());
    assert_ne!(first.path(), second.path());

    let rendered = tokio::fs::read_to_string(first.path()).await.unwrap();
    assert_eq!(parse_netscape(&rendered).unwrap(), credentials.cookies);

    let first_path = first.path().to_owned();
    drop(first);
    assert!(!first_path.exists());
    assert!(second.path().exists());

    drop(second);
    tokio::fs::remove_file(&path).await.unwrap();
  }
}
