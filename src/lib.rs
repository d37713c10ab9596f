// Rollcall - authenticated client for the school-management REST API
// Library exports

pub mod auth; // Credential storage and login redirect hooks
pub mod client; // HTTP client with bearer auth and token refresh
pub mod config;
pub mod errors; // User-facing error messages
