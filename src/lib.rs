//! Client for the App Store Connect and App Store Server APIs.
//!
//! Every request goes through [`transport::AuthTransport`], which signs a fresh
//! ES256 token with the API key for each call.

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod keys;
pub mod transport;
pub mod types;

#[cfg(test)]
mod test_support;
