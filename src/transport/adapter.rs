//! Declarative GET requests on top of an [`HttpGet`] primitive.

use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;
use url::{form_urlencoded, Url};

use super::http::{HttpGet, RawResponse};
use crate::error::{LoadError, LoadResult, RecoverableError};

/// Named parameter for path, query or header values.
pub type Param<'a> = (&'a str, Value);

/// Turns URL templates plus parameters into GET calls and classifies the
/// answer.
pub struct TransportAdapter<H: HttpGet> {
  http: Arc<H>,
  base_url: String,
  /// Headers sent on every call, layered over the JSON defaults
  default_headers: BTreeMap<String, String>,
}

impl<H: HttpGet> TransportAdapter<H> {
  /// Create an adapter resolving relative templates against `base_url`.
  pub fn new(http: H, base_url: impl Into<String>) -> Self {
    Self {
      http: Arc::new(http),
      base_url: base_url.into(),
      default_headers: BTreeMap::new(),
    }
  }

  /// Add a header sent with every request (e.g. authorization).
  pub fn with_default_header(mut self, name: &str, value: impl Into<String>) -> Self {
    self
      .default_headers
      .insert(name.to_ascii_lowercase(), value.into());
    self
  }

  /// Perform a GET and normalize the response.
  ///
  /// Returns `Ok(None)` for "no content" (204, or a 2xx with a blank body).
  pub async fn get(
    &self,
    template: &str,
    path_params: &[Param<'_>],
    query_params: &[Param<'_>],
    headers: &[Param<'_>],
  ) -> LoadResult<Option<Value>> {
    let url = self.resolve_url(template, path_params, query_params)?;
    let headers = self.build_headers(headers);

    debug!(%url, "GET");
    let response = self.http.get(url.as_str(), &headers).await?;
    debug!(%url, status = response.status, bytes = response.body.len(), "response");

    normalize(response)
  }

  /// Substitute path tokens, join onto the base URL and append the query.
  pub fn resolve_url(
    &self,
    template: &str,
    path_params: &[Param<'_>],
    query_params: &[Param<'_>],
  ) -> Result<Url, RecoverableError> {
    let path = substitute_path(template, path_params)?;
    let raw = if path.starts_with("http://") || path.starts_with("https://") {
      path
    } else if path.starts_with('/') {
      format!("{}{}", self.base_url.trim_end_matches('/'), path)
    } else {
      format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    };

    let mut url = Url::parse(&raw).map_err(|e| RecoverableError::InvalidUrl {
      url: raw.clone(),
      reason: e.to_string(),
    })?;

    let pairs: Vec<(&str, String)> = query_params
      .iter()
      .filter(|(_, value)| !value.is_null())
      .map(|(key, value)| (*key, stringify(value)))
      .collect();
    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }

    Ok(url)
  }

  /// JSON defaults, then adapter defaults, then per-call headers.
  pub fn build_headers(&self, headers: &[Param<'_>]) -> BTreeMap<String, String> {
    let mut merged = BTreeMap::new();
    merged.insert("content-type".to_string(), "application/json".to_string());
    merged.insert("accept".to_string(), "application/json".to_string());

    for (name, value) in &self.default_headers {
      merged.insert(name.clone(), value.clone());
    }
    for (name, value) in headers {
      merged.insert(name.to_ascii_lowercase(), stringify(value));
    }

    merged
  }
}

/// Classify a raw response by status code.
pub fn normalize(response: RawResponse) -> LoadResult<Option<Value>> {
  match response.status {
    204 => Ok(None),
    401 => Err(LoadError::NotRecoverable { status: 401 }),
    200..=299 => {
      if response.body.trim().is_empty() {
        return Ok(None);
      }
      match serde_json::from_str::<Value>(&response.body) {
        Ok(value @ (Value::Object(_) | Value::Array(_))) => Ok(Some(value)),
        Ok(_) => Err(
          RecoverableError::MalformedBody("expected a JSON object or array".to_string()).into(),
        ),
        Err(e) => Err(RecoverableError::MalformedBody(e.to_string()).into()),
      }
    }
    status => Err(RecoverableError::UnexpectedStatus { status }.into()),
  }
}

/// Replace `:name` tokens with matching parameter values.
///
/// Tokens without an entry (or whose value is null) stay literal. Values are
/// percent-encoded so each one stays a single path segment.
fn substitute_path(template: &str, params: &[Param<'_>]) -> Result<String, RecoverableError> {
  let mut out = String::with_capacity(template.len());
  let mut chars = template.char_indices().peekable();

  while let Some((_, c)) = chars.next() {
    let starts_token = c == ':'
      && chars
        .peek()
        .is_some_and(|(_, next)| next.is_ascii_alphabetic() || *next == '_');
    if !starts_token {
      out.push(c);
      continue;
    }

    let mut name = String::new();
    while let Some((_, next)) = chars.peek() {
      if next.is_ascii_alphanumeric() || *next == '_' {
        name.push(*next);
        chars.next();
      } else {
        break;
      }
    }

    match params.iter().find(|(key, _)| *key == name) {
      Some((_, value)) if !value.is_null() => {
        out.push_str(&encode_segment(template, &name, &stringify(value))?)
      }
      _ => {
        out.push(':');
        out.push_str(&name);
      }
    }
  }

  Ok(out)
}

/// Percent-encode `value` as one path segment.
///
/// Empty and dot segments can't be expressed (URL parsing resolves them
/// even when encoded), so they are rejected.
fn encode_segment(template: &str, name: &str, value: &str) -> Result<String, RecoverableError> {
  if matches!(value, "" | "." | "..") {
    return Err(RecoverableError::InvalidUrl {
      url: template.to_string(),
      reason: format!("'{}' is not a usable value for :{}", value, name),
    });
  }
  // form encoding writes spaces as '+', a literal '+' is already %2B
  Ok(form_urlencoded::byte_serialize(value.as_bytes()).collect::<String>().replace('+', "%20"))
}

fn stringify(value: &Value) -> String {
  match value {
    Value::String(s) => s.clone(),
    other => other.to_string(),
  }
}
