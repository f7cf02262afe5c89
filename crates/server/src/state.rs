use crate::config::ServerConfig;
use std::sync::Arc;
use store::RecipeStore;
use subtle::ConstantTimeEq;

/// The configured API key.
///
/// Comparison is exact string equality, done in constant time. An empty
/// configured key matches nothing.
#[derive(Clone)]
pub struct ApiKey(Arc<str>);

impl ApiKey {
    pub fn new(key: impl Into<Arc<str>>) -> Self {
        Self(key.into())
    }

    pub fn matches(&self, presented: &str) -> bool {
        !self.0.is_empty() && bool::from(self.0.as_bytes().ct_eq(presented.as_bytes()))
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(..)")
    }
}

/// Shared application state
#[derive(Clone)]
pub struct ServerState {
    /// Server configuration
    pub config: Arc<ServerConfig>,

    /// Recipe storage (shared across requests)
    pub store: Arc<dyn RecipeStore>,

    api_key: ApiKey,
}

impl ServerState {
    pub fn new(config: ServerConfig, store: Arc<dyn RecipeStore>) -> Self {
        let api_key = ApiKey::new(config.api_key.as_str());
        Self {
            config: Arc::new(config),
            store,
            api_key,
        }
    }

    /// Check if API key is valid
    pub fn is_valid_api_key(&self, key: &str) -> bool {
        self.api_key.matches(key)
    }
}
