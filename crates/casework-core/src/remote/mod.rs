//! HTTP client for the case-management API.
//!
//! Requests are built separately from being sent so their shape can be
//! checked without a server.

use reqwest::{multipart, Client, Method, Request, StatusCode};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::models::BinaryBlob;
use crate::util::compact_text;
use crate::{Error, Result};

/// Header carrying the artifact's idempotency key on attach requests.
pub const IDEMPOTENCY_HEADER: &str = "Idempotency-Key";

/// Which phase of a two-phase write a request belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Upload,
    Attach,
}

impl Phase {
    fn failure(self, message: String) -> Error {
        match self {
            Self::Upload => Error::UploadFailed(message),
            Self::Attach => Error::AttachFailed(message),
        }
    }
}

/// Client for the remote API used by sync strategies and cached reads.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    upload_url: String,
    api_token: Option<String>,
    client: Client,
}

impl ApiClient {
    /// Builds a client from engine configuration.
    pub fn new(config: &EngineConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|error| Error::Config(format!("Failed to construct HTTP client: {error}")))?;

        Ok(Self {
            base_url: config.api_base_url.clone(),
            upload_url: config.upload_url.clone(),
            api_token: config.api_token.clone(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Uploads one binary and returns the URL the server stored it under.
    pub async fn upload_binary(&self, blob: &BinaryBlob) -> Result<String> {
        let request = self.build_upload_request(blob)?;
        let response = self.send(request, Phase::Upload).await?;
        let payload = response
            .json::<UploadResponse>()
            .await
            .map_err(|error| Error::UploadFailed(format!("Invalid upload response: {error}")))?;

        if payload.url.trim().is_empty() {
            return Err(Error::UploadFailed(
                "Upload response did not include a url".to_string(),
            ));
        }
        Ok(payload.url)
    }

    /// Submits a JSON record with `POST`.
    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &T,
        idempotency_key: Option<Uuid>,
    ) -> Result<()> {
        let request = self.build_json_request(Method::POST, route, body, idempotency_key)?;
        self.send(request, Phase::Attach).await?;
        Ok(())
    }

    /// Submits a JSON partial update with `PATCH`.
    pub async fn patch_json<T: Serialize + ?Sized>(
        &self,
        route: &str,
        body: &T,
        idempotency_key: Option<Uuid>,
    ) -> Result<()> {
        let request = self.build_json_request(Method::PATCH, route, body, idempotency_key)?;
        self.send(request, Phase::Attach).await?;
        Ok(())
    }

    /// Fetches `GET /{resource}` or `GET /{resource}/{id}`.
    pub async fn get_json(&self, resource: &str, id: Option<&str>) -> Result<serde_json::Value> {
        let request = self.build_get_request(resource, id)?;
        let response = self.client.execute(request).await.map_err(transport_error)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(resource_path(resource, id)));
        }
        let response = response.error_for_status()?;
        Ok(response.json::<serde_json::Value>().await?)
    }

    fn build_upload_request(&self, blob: &BinaryBlob) -> Result<Request> {
        let file_part = multipart::Part::bytes(blob.bytes.clone())
            .file_name(blob.file_name.clone())
            .mime_str(&blob.mime_type)
            .map_err(|error| {
                Error::InvalidInput(format!("Invalid MIME type {}: {error}", blob.mime_type))
            })?;
        let form = multipart::Form::new().part("file", file_part);

        self.authorize(self.client.post(&self.upload_url))
            .header("Accept", "application/json")
            .multipart(form)
            .build()
            .map_err(|error| Error::UploadFailed(format!("Failed to build upload request: {error}")))
    }

    fn build_json_request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        route: &str,
        body: &T,
        idempotency_key: Option<Uuid>,
    ) -> Result<Request> {
        let url = format!("{}/{}", self.base_url, route.trim_start_matches('/'));
        let mut request = self
            .authorize(self.client.request(method, url))
            .header("Accept", "application/json")
            .json(body);
        if let Some(key) = idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key.to_string());
        }

        request
            .build()
            .map_err(|error| Error::AttachFailed(format!("Failed to build request: {error}")))
    }

    fn build_get_request(&self, resource: &str, id: Option<&str>) -> Result<Request> {
        let url = format!("{}/{}", self.base_url, resource_path(resource, id));
        Ok(self
            .authorize(self.client.get(url))
            .header("Accept", "application/json")
            .build()?)
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: Request, phase: Phase) -> Result<reqwest::Response> {
        let method = request.method().clone();
        let url = request.url().path().to_string();
        let response = self.client.execute(request).await.map_err(|error| {
            if error.is_timeout() {
                Error::Timeout(format!("{method} {url}"))
            } else {
                phase.failure(format!("{method} {url} failed: {error}"))
            }
        })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(phase.failure(format!(
                "{method} {url} failed with HTTP {status}: {}",
                compact_text(&body)
            )));
        }
        Ok(response)
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

fn transport_error(error: reqwest::Error) -> Error {
    if error.is_timeout() {
        let target = error
            .url()
            .map_or_else(|| "request".to_string(), |url| url.path().to_string());
        Error::Timeout(target)
    } else {
        Error::Http(error)
    }
}

/// Relative path of a resource, with each segment percent-encoded.
fn resource_path(resource: &str, id: Option<&str>) -> String {
    let mut path = resource
        .trim_matches('/')
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");

    if let Some(id) = id.map(str::trim).filter(|id| !id.is_empty()) {
        path.push('/');
        path.push_str(&urlencoding::encode(id));
    }
    path
}
