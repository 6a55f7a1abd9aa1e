//! Transport layer for the Toolguard SDK.

pub mod http;

pub use http::HttpTransport;
