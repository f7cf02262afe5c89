//! Typed clients for the catalog's two wire protocols.
//!
//! Both attach the API key to every call and report a missing recipe as
//! `Ok(None)` rather than as an error.
//!
//! # Example
//!
//! ```rust,no_run
//! use server::client::HttpClient;
//! use store::Recipe;
//!
//! # async fn run() -> server::client::ClientResult<()> {
//! let client = HttpClient::new("http://127.0.0.1:8080", "demo-key-12345");
//! client
//!     .add_recipe(&Recipe::new("BLT", ["Tomato", "Bacon", "Lettuce"]))
//!     .await?;
//! let blt = client.get_recipe("BLT").await?;
//! # Ok(())
//! # }
//! ```

mod grpc;
mod http;

pub use grpc::{AttachApiKey, GrpcClient};
pub use http::HttpClient;

pub type ClientResult<T> = Result<T, ClientError>;

/// Client error types
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("calling http endpoint: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with something other than 200 (or 404 on get).
    #[error("unexpected response {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("creating gRPC client: {0}")]
    Connect(#[from] tonic::transport::Error),

    #[error("calling gRPC function: {0}")]
    Rpc(#[from] tonic::Status),

    #[error("invalid API key: {0}")]
    InvalidKey(String),
}
