// API client implementation
//
// Every call goes through `dispatch`, which attaches the bearer token,
// logs the request and response with timing, and turns non-2xx statuses
// into `RequestFailure::Status`. `send` adds the 401 recovery on top.

use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use super::error::{ApiError, ApiResult, RequestFailure, SessionExpiry};
use super::refresh::{RefreshGate, RefreshOutcome, Ticket};
use super::request::{body_preview, join_url, redacted_headers, ApiRequest, ApiResponse, RequestContext};
use crate::auth::{
    CredentialPair, CredentialStore, LoginRequest, MemoryStore, Navigator, NoopNavigator,
    RefreshRequest, TokenPair,
};
use crate::config::ClientConfig;

struct Inner {
    http: Client,
    config: ClientConfig,
    store: Arc<dyn CredentialStore>,
    navigator: Arc<dyn Navigator>,
    refresh: RefreshGate,
}

/// Authenticated client for the school API
///
/// Cheap to clone; clones share the HTTP connection pool, the credential
/// store and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<Inner>,
}

/// Builder for [`ApiClient`]
pub struct ApiClientBuilder {
    config: ClientConfig,
    store: Option<Arc<dyn CredentialStore>>,
    navigator: Option<Arc<dyn Navigator>>,
}

impl ApiClientBuilder {
    /// Credential store (defaults to an empty [`MemoryStore`])
    pub fn credential_store(mut self, store: Arc<dyn CredentialStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Login redirect hook (defaults to [`NoopNavigator`])
    pub fn navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    pub fn build(self) -> ApiResult<ApiClient> {
        let http = Client::builder()
            .timeout(self.config.timeout())
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(ApiError::Client)?;

        info!(base_url = %self.config.base_url, "API client ready");

        Ok(ApiClient {
            inner: Arc::new(Inner {
                http,
                config: self.config,
                store: self.store.unwrap_or_else(|| Arc::new(MemoryStore::new())),
                navigator: self.navigator.unwrap_or_else(|| Arc::new(NoopNavigator)),
                refresh: RefreshGate::default(),
            }),
        })
    }
}

impl ApiClient {
    pub fn builder(config: ClientConfig) -> ApiClientBuilder {
        ApiClientBuilder {
            config,
            store: None,
            navigator: None,
        }
    }

    /// Client with the given store and no navigation hook
    pub fn new(config: ClientConfig, store: Arc<dyn CredentialStore>) -> ApiResult<Self> {
        Self::builder(config).credential_store(store).build()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn credential_store(&self) -> &Arc<dyn CredentialStore> {
        &self.inner.store
    }

    /// True while a token refresh is in flight
    pub fn is_refreshing(&self) -> bool {
        self.inner.refresh.is_refreshing()
    }

    /// True if an access token is stored
    pub fn is_authenticated(&self) -> ApiResult<bool> {
        Ok(self.inner.store.access_token()?.is_some())
    }

    pub async fn get(&self, path: &str) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body).map_err(ApiError::Encode)?).await
    }

    pub async fn put<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::put(path).json(body).map_err(ApiError::Encode)?).await
    }

    pub async fn patch<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::patch(path).json(body).map_err(ApiError::Encode)?).await
    }

    pub async fn delete(&self, path: &str) -> ApiResult<ApiResponse> {
        self.send(ApiRequest::delete(path)).await
    }

    /// Exchange username/password for a credential pair and store it
    ///
    /// Bypasses the 401 recovery: a rejected login is an ordinary
    /// `RequestFailed` with the backend's status and body.
    pub async fn login(&self, username: &str, password: &str) -> ApiResult<CredentialPair> {
        let request = ApiRequest::post(self.inner.config.login_path.as_str())
            .json(&LoginRequest { username, password })
            .map_err(ApiError::Encode)?;

        let response = self
            .inner
            .dispatch(&request, None, &RequestContext::new())
            .await?;
        let tokens: TokenPair = response.json()?;
        let credentials = tokens.into_credentials("");

        self.inner.store.save(&credentials)?;
        info!(username = %username, "Logged in");

        Ok(credentials)
    }

    /// Delete the stored credentials
    pub fn logout(&self) -> ApiResult<()> {
        self.inner.store.clear()?;
        info!("Logged out, credentials cleared");
        Ok(())
    }

    /// Send a request, recovering once from an expired access token
    ///
    /// On a 401 the client refreshes the token (or joins a refresh already
    /// running) and replays the request a single time. The replay's result
    /// is returned as-is, including a second 401.
    pub async fn send(&self, request: ApiRequest) -> ApiResult<ApiResponse> {
        let token = self.inner.store.access_token()?;

        match self
            .inner
            .dispatch(&request, token.as_deref(), &RequestContext::new())
            .await
        {
            Ok(response) => Ok(response),
            Err(failure) if failure.is_unauthorized() => {
                let body = failure.body().unwrap_or_default().to_string();
                self.recover(request, token, body).await
            }
            Err(failure) => Err(failure.into()),
        }
    }

    async fn recover(
        &self,
        request: ApiRequest,
        sent_token: Option<String>,
        body: String,
    ) -> ApiResult<ApiResponse> {
        if self.inner.is_refresh_request(&request) {
            let reason = SessionExpiry::RefreshRejected;
            self.inner.end_session(&reason);
            return Err(ApiError::SessionExpired { reason, body });
        }

        let fresh_token = match self.fresh_token(sent_token.as_deref()).await {
            Ok(token) => token,
            Err(reason) => return Err(ApiError::SessionExpired { reason, body }),
        };

        let ctx = RequestContext::retry();
        debug!(request_id = %ctx.id, path = %request.path, "Replaying request with refreshed token");

        self.inner
            .dispatch(&request, Some(fresh_token.as_str()), &ctx)
            .await
            .map_err(ApiError::from)
    }

    /// Token to replay with: one rotated by another request, or the result
    /// of the (shared) refresh
    async fn fresh_token(&self, sent_token: Option<&str>) -> RefreshOutcome {
        let inner = &self.inner;
        let ticket = inner.refresh.ticket(
            sent_token,
            || match inner.store.access_token() {
                Ok(token) => token,
                Err(e) => {
                    // Refresh reads the same store and reports the failure
                    warn!(error = %e, "Failed to read access token after 401");
                    None
                }
            },
            || {
                let inner = Arc::clone(&self.inner);
                async move {
                    let outcome = inner.refresh_tokens().await;
                    if let Err(reason) = &outcome {
                        inner.end_session(reason);
                    }
                    inner.refresh.finish();
                    outcome
                }
                .boxed()
            },
        );

        match ticket {
            Ticket::Current(token) => {
                debug!("Access token already rotated, reusing it");
                Ok(token)
            }
            Ticket::Wait { refresh, leader } => {
                if !leader {
                    debug!("Joining in-flight token refresh");
                }
                refresh.await
            }
        }
    }
}

impl Inner {
    fn is_refresh_request(&self, request: &ApiRequest) -> bool {
        join_url(&self.config.base_url, &request.path)
            == join_url(&self.config.base_url, &self.config.refresh_path)
    }

    /// Call the refresh endpoint and store the new pair
    async fn refresh_tokens(&self) -> RefreshOutcome {
        let refresh_token = match self.store.refresh_token() {
            Ok(Some(token)) => token,
            Ok(None) => return Err(SessionExpiry::MissingRefreshToken),
            Err(e) => return Err(SessionExpiry::RefreshFailed(e.to_string())),
        };

        let request = ApiRequest::post(self.config.refresh_path.as_str())
            .json(&RefreshRequest {
                refresh: &refresh_token,
            })
            .map_err(|e| SessionExpiry::RefreshFailed(e.to_string()))?;

        let ctx = RequestContext::new();
        info!(request_id = %ctx.id, "Refreshing access token");

        let response = match self.dispatch(&request, None, &ctx).await {
            Ok(response) => response,
            Err(failure) if failure.is_unauthorized() => {
                return Err(SessionExpiry::RefreshRejected)
            }
            Err(failure) => return Err(SessionExpiry::RefreshFailed(failure.to_string())),
        };

        let tokens: TokenPair = response
            .json()
            .map_err(|e| SessionExpiry::RefreshFailed(format!("malformed refresh response: {}", e)))?;
        let credentials = tokens.into_credentials(&refresh_token);

        self.store
            .save(&credentials)
            .map_err(|e| SessionExpiry::RefreshFailed(e.to_string()))?;

        info!(request_id = %ctx.id, "Access token refreshed");
        Ok(credentials.access_token)
    }

    /// Forget the session and send the user back to login
    fn end_session(&self, reason: &SessionExpiry) {
        warn!(reason = %reason, "Session expired, clearing stored credentials");
        if let Err(e) = self.store.clear() {
            error!(error = %e, "Failed to clear stored credentials");
        }
        self.navigator.redirect_to_login(&self.config.login_route);
    }

    /// Send one attempt of `request` with `token` as bearer credential
    async fn dispatch(
        &self,
        request: &ApiRequest,
        token: Option<&str>,
        ctx: &RequestContext,
    ) -> Result<ApiResponse, RequestFailure> {
        let url = join_url(&self.config.base_url, &request.path);

        let mut builder = self
            .http
            .request(request.method.clone(), &url)
            .headers(request.headers.clone());
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let outgoing = builder.build()?;

        let request_body = request
            .body
            .as_ref()
            .map(|b| b.to_string())
            .unwrap_or_default();
        debug!(
            request_id = %ctx.id,
            method = %request.method,
            url = %outgoing.url(),
            headers = ?redacted_headers(outgoing.headers()),
            body = %body_preview(&request_body),
            retried = ctx.retried,
            "Sending request"
        );

        let response = match self.http.execute(outgoing).await {
            Ok(response) => response,
            Err(e) => {
                log_transport_error(ctx, &request.method, &url, &e);
                return Err(e.into());
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(bytes) => bytes.to_vec(),
            Err(e) => {
                log_transport_error(ctx, &request.method, &url, &e);
                return Err(e.into());
            }
        };
        let response = ApiResponse {
            status,
            headers,
            body,
        };

        let text = response.text();
        if status.is_success() {
            debug!(
                request_id = %ctx.id,
                method = %request.method,
                url = %url,
                status = status.as_u16(),
                elapsed_ms = ctx.elapsed_ms(),
                retried = ctx.retried,
                body = %body_preview(&text),
                "Received response"
            );
            return Ok(response);
        }

        if status == StatusCode::UNAUTHORIZED {
            debug!(
                request_id = %ctx.id,
                method = %request.method,
                url = %url,
                elapsed_ms = ctx.elapsed_ms(),
                retried = ctx.retried,
                body = %body_preview(&text),
                "Request unauthorized"
            );
        } else {
            warn!(
                request_id = %ctx.id,
                method = %request.method,
                url = %url,
                status = status.as_u16(),
                elapsed_ms = ctx.elapsed_ms(),
                retried = ctx.retried,
                body = %body_preview(&text),
                "Request failed"
            );
        }

        Err(RequestFailure::Status {
            status,
            body: text.into_owned(),
        })
    }
}

fn log_transport_error(ctx: &RequestContext, method: &reqwest::Method, url: &str, e: &reqwest::Error) {
    let kind = if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connection"
    } else if e.is_request() {
        "request"
    } else if e.is_body() || e.is_decode() {
        "body"
    } else {
        "other"
    };
    error!(
        request_id = %ctx.id,
        method = %method,
        url = %url,
        elapsed_ms = ctx.elapsed_ms(),
        retried = ctx.retried,
        kind,
        error = %e,
        "HTTP request failed"
    );
}
