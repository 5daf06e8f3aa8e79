pub mod api;
pub mod auth;
pub mod client;

pub use auth::{access_token, device_login, DeviceCode, TokenInfo};
pub use client::TraktClient;
