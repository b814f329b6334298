use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use super::Loader;
use crate::error::{LoadResult, RecoverableError};
use crate::event::EntityMapper;
use crate::transport::{HttpGet, TransportAdapter};

/// Where an entity lives on the remote side.
#[derive(Debug, Clone, PartialEq)]
pub struct Endpoint {
  /// URL template; `:id` is replaced with the lookup id
  pub template: String,
  /// Extra query parameters sent with every call
  pub query: Vec<(String, Value)>,
}

impl Endpoint {
  pub fn new(template: impl Into<String>) -> Self {
    Self {
      template: template.into(),
      query: Vec::new(),
    }
  }

  pub fn with_query(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.query.push((key.into(), value.into()));
    self
  }
}

/// Fetches an entity over HTTP and maps it.
pub struct RemoteLoader<H: HttpGet, M: EntityMapper> {
  transport: Arc<TransportAdapter<H>>,
  mapper: Arc<M>,
  endpoint: Endpoint,
}

impl<H: HttpGet, M: EntityMapper> RemoteLoader<H, M> {
  pub fn new(transport: Arc<TransportAdapter<H>>, mapper: Arc<M>, endpoint: Endpoint) -> Self {
    Self {
      transport,
      mapper,
      endpoint,
    }
  }
}

#[async_trait]
impl<H: HttpGet, M: EntityMapper> Loader for RemoteLoader<H, M> {
  type Entity = M::Entity;

  async fn load(&self, id: &str) -> LoadResult<M::Entity> {
    let path = [("id", Value::String(id.to_string()))];
    let query: Vec<(&str, Value)> = self
      .endpoint
      .query
      .iter()
      .map(|(k, v)| (k.as_str(), v.clone()))
      .collect();

    let json = self
      .transport
      .get(&self.endpoint.template, &path, &query, &[])
      .await?
      .ok_or(RecoverableError::EmptyResponse)?;

    Ok(self.mapper.to_entity(&json)?)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::error::{LoadError, MapError};
  use crate::event::EventMapper;
  use crate::transport::RawResponse;
  use std::collections::BTreeMap;
  use std::sync::Mutex;

  struct Canned {
    status: u16,
    body: String,
    urls: Arc<Mutex<Vec<String>>>,
  }

  #[async_trait]
  impl HttpGet for Canned {
    async fn get(
      &self,
      url: &str,
      _headers: &BTreeMap<String, String>,
    ) -> Result<RawResponse, RecoverableError> {
      self.urls.lock().unwrap().push(url.to_string());
      Ok(RawResponse::new(self.status, self.body.clone()))
    }
  }

  type Urls = Arc<Mutex<Vec<String>>>;

  fn loader(status: u16, body: &str) -> (RemoteLoader<Canned, EventMapper>, Urls) {
    let urls = Urls::default();
    let http = Canned {
      status,
      body: body.to_string(),
      urls: Arc::clone(&urls),
    };
    let loader = RemoteLoader::new(
      Arc::new(TransportAdapter::new(http, "http://api.test")),
      Arc::new(EventMapper),
      Endpoint::new("/events/:id").with_query("expand", "players"),
    );
    (loader, urls)
  }

  #[tokio::test]
  async fn maps_payload() {
    let (loader, urls) = loader(
      200,
      r#"{"id":"g1","title":"Five-a-side","startsAt":"2024-05-02T19:00:00Z","players":[]}"#,
    );
    let event = loader.load("g1").await.unwrap();
    assert_eq!(event.id, "g1");
    assert_eq!(
      *urls.lock().unwrap(),
      vec!["http://api.test/events/g1?expand=players".to_string()]
    );
  }

  #[tokio::test]
  async fn no_content_is_an_empty_response_error() {
    let err = loader(204, "").0.load("g1").await.unwrap_err();
    assert_eq!(err, LoadError::from(RecoverableError::EmptyResponse));
  }

  #[tokio::test]
  async fn transport_errors_propagate_unchanged() {
    let err = loader(401, "").0.load("g1").await.unwrap_err();
    assert_eq!(err, LoadError::NotRecoverable { status: 401 });
    let err = loader(503, "").0.load("g1").await.unwrap_err();
    assert_eq!(
      err,
      LoadError::from(RecoverableError::UnexpectedStatus { status: 503 })
    );
  }

  #[tokio::test]
  async fn unmappable_payload_is_recoverable() {
    let err = loader(200, r#"{"title":"x"}"#).0.load("g1").await.unwrap_err();
    assert_eq!(err, LoadError::from(MapError::MissingField("id")));
    assert!(err.is_recoverable());
  }
}
