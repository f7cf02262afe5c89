//! Workspace umbrella crate for the recipe catalog.
//!
//! Re-exports the storage layer (`store`) and the network layer (`server`)
//! so callers can embed a catalog, or serve one, from a single dependency.
//!
//! ```rust,no_run
//! use recipebox::{BackendConfig, HybridServer, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig {
//!         api_key: "s3cret".into(),
//!         database: BackendConfig::in_memory(),
//!         ..ServerConfig::default()
//!     };
//!     let store = config.database.build().await?;
//!     let server = HybridServer::start(&config, store).await?;
//!     server.stop();
//!     server.wait().await
//! }
//! ```

pub use server::{
    ApiKey, ClientError, ClientResult, GrpcClient, HttpClient, HybridServer, ServerConfig,
    ServerError, ServerMode, ServerResult, ServerState, Shutdown, build_router, start_server,
};
pub use store::{
    BackendConfig, MemoryStore, PoolConfig, Recipe, RecipeStore, StoreError, StoreResult,
    same_ingredients,
};
#[cfg(feature = "sqlite")]
pub use store::SqlStore;

pub use server::rpc::proto;
