// Authenticated HTTP client for the school API
//
// Attaches the stored bearer token to every call, logs each request and
// response with timing, and recovers from an expired access token by
// refreshing it once and replaying the original request.

mod api_client;
mod error;
mod refresh;
mod request;

pub use api_client::{ApiClient, ApiClientBuilder};
pub use error::{ApiError, ApiResult, RequestFailure, SessionExpiry};
pub use request::{ApiRequest, ApiResponse};
