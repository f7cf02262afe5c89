//! Recipe server - HTTP/JSON and gRPC APIs for the recipe catalog
//!
//! This crate exposes a [`store::RecipeStore`] over the network. Depending on
//! [`ServerMode`] it runs:
//!
//! - **http**: the native HTTP/JSON API
//! - **grpc**: the `recipes.RecipeService` gRPC API
//! - **hybrid**: the gRPC API plus an HTTP facade that forwards every request
//!   to it in-process
//!
//! Every call passes through the same two interceptors: a tracer that logs
//! the call's name and duration, then an API key check that rejects the call
//! before it reaches storage.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # HTTP Endpoints (API key required)
//!
//! - `POST /recipe` - Add or replace a recipe
//! - `GET /recipe/{name}` - Get a recipe by name
//! - `GET /recipes?ingredients=a,b` - Recipes using all listed ingredients
//!
//! [`HttpClient`] and [`GrpcClient`] call either API with the key attached.

pub mod client;
pub mod config;
pub mod error;
pub mod gateway;
pub mod hybrid;
pub mod listener;
pub mod middleware;
pub mod model;
pub mod routes;
pub mod rpc;
pub mod server;
pub mod shutdown;
pub mod state;

pub use client::{ClientError, ClientResult, GrpcClient, HttpClient};
pub use config::{ServerConfig, ServerMode};
pub use error::{ServerError, ServerResult};
pub use hybrid::HybridServer;
pub use server::{build_router, start_server};
pub use shutdown::Shutdown;
pub use state::{ApiKey, ServerState};
