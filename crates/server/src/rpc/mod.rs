//! gRPC surface: wire messages, the service implementation and its call
//! pipeline.

pub mod layers;
pub mod proto;
pub mod service;

pub use layers::{authorize, traced, ApiKeyInterceptor, RpcTraceLayer};
pub use service::RecipeRpc;
