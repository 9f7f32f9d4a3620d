use std::sync::Arc;

use reqwest::multipart::Form;
use reqwest::{Client, Method, RequestBuilder, Response, Url, header};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::io::{Chunks, EventStream, Lines};
use crate::{DustConfig, Error, Result};

/// Authenticated access to the workspace API.
///
/// Paths passed to the methods are relative to the workspace root,
/// i.e. `/api/v1/w/{workspaceId}`.
#[derive(Clone, Debug)]
pub struct Transport {
    client: Client,
    config: Arc<DustConfig>,
}

impl Transport {
    /// Creates a new `Transport` with the given configuration.
    #[inline]
    pub fn new(config: DustConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Returns the configuration this transport was created with.
    #[inline]
    pub fn config(&self) -> &DustConfig {
        &self.config
    }

    /// Sends a GET request and decodes the JSON response.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let mut url = self.url(path)?;
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        let resp = self.request(Method::GET, url).send().await?;
        read_json(check_status(resp).await?).await
    }

    /// Sends a POST request with a JSON body and decodes the JSON response.
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path)?;
        let resp = self.request(Method::POST, url).json(body).send().await?;
        read_json(check_status(resp).await?).await
    }

    /// Opens a server-sent event stream.
    ///
    /// The connection stays open until the returned stream is exhausted,
    /// fails, or is dropped.
    pub async fn get_stream(&self, path: &str) -> Result<EventStream> {
        let url = self.url(path)?;
        let resp = self
            .request(Method::GET, url)
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await?;
        let resp = check_status(resp).await?;
        trace!("opened event stream: {path}");
        Ok(EventStream::new(Lines::new(Chunks::from_response(resp))))
    }

    /// Posts a multipart form to an absolute URL handed out by the
    /// service, such as a file upload URL.
    pub async fn post_multipart<T: DeserializeOwned>(
        &self,
        url: &str,
        form: Form,
    ) -> Result<T> {
        let resp = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .multipart(form)
            .send()
            .await?;
        read_json(check_status(resp).await?).await
    }

    fn url(&self, path: &str) -> Result<Url> {
        let url = format!(
            "{}/api/v1/w/{}{}",
            self.config.base_url, self.config.workspace_id, path
        );
        Url::parse(&url)
            .map_err(|err| Error::Config(format!("invalid url {url}: {err}")))
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.config.api_key)
            .header(header::CONTENT_TYPE, "application/json")
    }
}

async fn check_status(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let url = resp.url().clone();
    let body = resp.text().await.unwrap_or_default();
    warn!("request to {url} failed with {status}");
    Err(Error::Remote { status, body })
}

async fn read_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    let text = resp.text().await?;
    serde_json::from_str(&text)
        .map_err(|err| Error::UnexpectedPayload(format!("{err}: {text}")))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::DustConfigBuilder;

    fn transport_for(server: &MockServer) -> Transport {
        let config = DustConfigBuilder::new("sk-test", server.uri(), "ws")
            .build()
            .unwrap();
        Transport::new(config)
    }

    #[tokio::test]
    async fn test_get_with_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/w/ws/assistant/agent_configurations"))
            .and(query_param("view", "all"))
            .and(query_param("q", "a b"))
            .and(header("authorization", "Bearer sk-test"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"ok": true})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let value: Value = transport
            .get(
                "/assistant/agent_configurations",
                &[("view", "all"), ("q", "a b")],
            )
            .await
            .unwrap();
        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_get_unexpected_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/w/ws/files"))
            .respond_with(ResponseTemplate::new(200).set_body_string("nope"))
            .mount(&server)
            .await;

        let transport = transport_for(&server);
        let err = transport.get::<Value>("/files", &[]).await.unwrap_err();
        assert!(matches!(err, Error::UnexpectedPayload(_)));
    }
}
