//! OAuth2 access token lifecycle.

pub mod token;

pub use token::{RefreshCredentials, TokenManager};
