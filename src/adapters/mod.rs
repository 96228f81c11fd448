// Adapters layer: concrete implementations for external systems (HTTP API, local files).

pub mod http;
pub mod storage;

pub use http::FragmentClient;
pub use storage::LocalStorage;
