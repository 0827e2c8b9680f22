//! HTTP implementation of [`AuthApi`] using `reqwest`.

use std::time::Duration;

use parcelgate_protocol::{
    Codec, Credentials, JsonCodec, LoginResponse, RefreshResponse,
    StatusResponse,
};
use reqwest::{Client, Method, header};
use serde::de::DeserializeOwned;

use crate::{ApiError, AuthApi, Endpoints, join_url};

/// An [`AuthApi`] that talks to the backend over HTTP.
///
/// The underlying `reqwest::Client` keeps a cookie jar, so the session
/// cookie set by `login` (or already present from an earlier run of the
/// same client) rides along on every later call. No bearer header is
/// ever attached.
///
/// Cloning is cheap: `reqwest::Client` is an `Arc` inside, and clones
/// share the cookie jar.
#[derive(Debug, Clone)]
pub struct HttpAuthApi {
    client: Client,
    base_url: String,
    endpoints: Endpoints,
    codec: JsonCodec,
}

impl HttpAuthApi {
    /// Builds a client with its own cookie jar and a hard per-request
    /// timeout.
    ///
    /// # Errors
    /// Returns [`ApiError::Client`] if the TLS backend can't be initialised.
    pub fn new(
        base_url: impl Into<String>,
        endpoints: Endpoints,
        request_timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .cookie_store(true)
            .timeout(request_timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self::with_client(client, base_url, endpoints))
    }

    /// Uses an existing client. The caller is responsible for enabling
    /// its cookie store.
    pub fn with_client(
        client: Client,
        base_url: impl Into<String>,
        endpoints: Endpoints,
    ) -> Self {
        let base_url = base_url.into();
        tracing::debug!(%base_url, "auth client created");
        Self {
            client,
            base_url,
            endpoints,
            codec: JsonCodec,
        }
    }

    /// A client for another set of endpoints on the same backend. Shares
    /// the connection pool and the cookie jar.
    pub fn with_endpoints(&self, endpoints: Endpoints) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            endpoints,
            codec: JsonCodec,
        }
    }

    /// The endpoint paths this client calls.
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Sends one request and returns the raw body of a 2xx response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<Vec<u8>, ApiError> {
        let url = join_url(&self.base_url, path);
        tracing::trace!(%method, %url, "auth request");

        let mut request = self
            .client
            .request(method, &url)
            .header(header::ACCEPT, "application/json");
        if let Some(body) = body {
            request = request
                .header(header::CONTENT_TYPE, "application/json")
                .body(body);
        }

        let response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            let text = String::from_utf8_lossy(&bytes).into_owned();
            tracing::debug!(%url, status = status.as_u16(), "auth request rejected");
            return Err(ApiError::from_status(status.as_u16(), text));
        }

        Ok(bytes.to_vec())
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ApiError> {
        let bytes = self.send(method, path, body).await?;
        Ok(self.codec.decode(&bytes)?)
    }
}

impl AuthApi for HttpAuthApi {
    async fn login(
        &self,
        credentials: &Credentials,
    ) -> Result<LoginResponse, ApiError> {
        let body = self.codec.encode(credentials)?;
        self.call(Method::POST, &self.endpoints.login, Some(body)).await
    }

    async fn status(&self) -> Result<StatusResponse, ApiError> {
        self.call(Method::GET, &self.endpoints.status, None).await
    }

    async fn refresh(&self) -> Result<RefreshResponse, ApiError> {
        self.call(Method::POST, &self.endpoints.refresh, None).await
    }

    async fn logout(&self) -> Result<(), ApiError> {
        // Whatever the body says, a 2xx means the cookie is gone.
        self.send(Method::POST, &self.endpoints.logout, None)
            .await
            .map(|_| ())
    }
}

fn map_reqwest_error(err: reqwest::Error) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout
    } else if err.is_builder() {
        ApiError::Client(err.to_string())
    } else if err.is_decode() {
        ApiError::Malformed(err.to_string())
    } else {
        ApiError::Network(err.to_string())
    }
}
