use std::sync::LazyLock;

use regex::Regex;

mod relay_stream;

pub use relay_stream::RelayStream;

// used to remove cred info from proxy url before printing
static PROXY_AUTH_REGEX: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"//[^:/@]+(:[^@]+)?@").unwrap());

pub fn redact_proxy(proxy: &str) -> std::borrow::Cow<'_, str> {
  PROXY_AUTH_REGEX.replace(proxy, "//<REDACTED>@")
}
