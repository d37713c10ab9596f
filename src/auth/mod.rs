// Session credentials and the host boundaries around them
//
// Provides the credential store abstraction the client reads tokens from,
// the token payload types, and the navigator hook for expired sessions.

mod navigator;
mod store;
mod types;

pub use navigator::{LogNavigator, Navigator, NoopNavigator};
pub use store::{
    CredentialStore, FileStore, MemoryStore, StoreError, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY,
};
pub use types::{CredentialPair, LoginRequest, RefreshRequest, TokenPair};
