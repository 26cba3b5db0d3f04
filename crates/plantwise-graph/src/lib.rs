pub mod http;

pub use http::HttpGraphStore;
