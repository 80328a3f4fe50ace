//! Client for the bridge's CLIP v2 REST API.

pub mod models;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument};

use crate::auth::BridgeCredentials;
use crate::config::REQUEST_TIMEOUT;
use crate::error::ProviderError;

pub use models::{
    Color, Dimming, GamutPosition, LightGet, LightMetadata, LightPut, On, ResourceIdentifier,
    RoomArchetype, RoomGet, RoomMetadata, RoomPut,
};
use models::HueResponse;

static USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Operations the provider needs from a bridge.
#[async_trait]
pub trait HueApi: Send + Sync {
    /// List every light.
    async fn list_lights(&self) -> Result<Vec<LightGet>, ProviderError>;

    /// Fetch one light.
    async fn get_light(&self, id: &str) -> Result<LightGet, ProviderError>;

    /// Change the state of a light.
    async fn update_light(
        &self,
        id: &str,
        body: &LightPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError>;

    /// Create a room and return its identifier.
    async fn create_room(&self, body: &RoomPut) -> Result<ResourceIdentifier, ProviderError>;

    /// Fetch one room.
    async fn get_room(&self, id: &str) -> Result<RoomGet, ProviderError>;

    /// Replace a room's metadata and children.
    async fn update_room(
        &self,
        id: &str,
        body: &RoomPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError>;

    /// Delete a room.
    async fn delete_room(&self, id: &str) -> Result<(), ProviderError>;
}

/// [`HueApi`] over HTTPS.
///
/// The bridge presents a self-signed certificate, so verification is turned
/// off for this client only.
#[derive(Debug, Clone)]
pub struct HueClient {
    http: reqwest::Client,
    base_url: String,
}

impl HueClient {
    /// Build a client for the bridge in `creds`.
    pub fn new(creds: &BridgeCredentials) -> Result<Self, ProviderError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "hue-application-key",
            HeaderValue::from_str(&creds.api_key)
                .map_err(|e| ProviderError::Configuration(format!("invalid API key: {}", e)))?,
        );

        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(true)
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: format!("https://{}", creds.bridge_address),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/clip/v2/resource/{}", self.base_url, path)
    }

    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        accept: fn(StatusCode) -> bool,
    ) -> Result<Vec<T>, ProviderError> {
        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;
        debug!(status = status.as_u16(), "Bridge responded");
        decode(status, &body, accept)
    }
}

fn only_ok(status: StatusCode) -> bool {
    status == StatusCode::OK
}

fn any_success(status: StatusCode) -> bool {
    status.is_success()
}

fn ok_or_multi_status(status: StatusCode) -> bool {
    status == StatusCode::OK || status == StatusCode::MULTI_STATUS
}

/// Check the status and unwrap the response envelope.
fn decode<T: DeserializeOwned>(
    status: StatusCode,
    body: &str,
    accept: fn(StatusCode) -> bool,
) -> Result<Vec<T>, ProviderError> {
    if !accept(status) {
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let envelope: HueResponse<T> = serde_json::from_str(body)?;
    if envelope.data.is_empty() && !envelope.errors.is_empty() {
        let descriptions: Vec<_> = envelope.errors.into_iter().map(|e| e.description).collect();
        return Err(ProviderError::Api {
            status: status.as_u16(),
            body: descriptions.join("; "),
        });
    }
    Ok(envelope.data)
}

fn first<T>(data: Vec<T>, what: &str) -> Result<T, ProviderError> {
    data.into_iter()
        .next()
        .ok_or_else(|| ProviderError::NotFound(format!("no {} in response body", what)))
}

#[async_trait]
impl HueApi for HueClient {
    #[instrument(skip(self))]
    async fn list_lights(&self) -> Result<Vec<LightGet>, ProviderError> {
        self.send(self.http.get(self.url("light")), only_ok).await
    }

    #[instrument(skip(self))]
    async fn get_light(&self, id: &str) -> Result<LightGet, ProviderError> {
        let data = self
            .send(self.http.get(self.url(&format!("light/{}", id))), only_ok)
            .await?;
        first(data, "light")
    }

    #[instrument(skip(self, body))]
    async fn update_light(
        &self,
        id: &str,
        body: &LightPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError> {
        let request = self.http.put(self.url(&format!("light/{}", id))).json(body);
        self.send(request, ok_or_multi_status).await
    }

    #[instrument(skip(self, body))]
    async fn create_room(&self, body: &RoomPut) -> Result<ResourceIdentifier, ProviderError> {
        let data = self
            .send(self.http.post(self.url("room")).json(body), any_success)
            .await?;
        first(data, "room identifier")
    }

    #[instrument(skip(self))]
    async fn get_room(&self, id: &str) -> Result<RoomGet, ProviderError> {
        let data = self
            .send(self.http.get(self.url(&format!("room/{}", id))), only_ok)
            .await?;
        first(data, "room")
    }

    #[instrument(skip(self, body))]
    async fn update_room(
        &self,
        id: &str,
        body: &RoomPut,
    ) -> Result<Vec<ResourceIdentifier>, ProviderError> {
        let request = self.http.put(self.url(&format!("room/{}", id))).json(body);
        self.send(request, only_ok).await
    }

    #[instrument(skip(self))]
    async fn delete_room(&self, id: &str) -> Result<(), ProviderError> {
        let _: Vec<ResourceIdentifier> = self
            .send(self.http.delete(self.url(&format!("room/{}", id))), only_ok)
            .await?;
        Ok(())
    }
}
