use crate::{Recipe, StoreError, StoreResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

/// The storage contract shared by every backend.
///
/// Callers validate recipes before storing them; a backend accepts whatever
/// it is able to persist.
#[async_trait]
pub trait RecipeStore: Send + Sync {
    /// Create the named recipe, or replace it (ingredients included) if the
    /// name is already stored.
    async fn add_recipe(&self, recipe: Recipe) -> StoreResult<()>;
    /// Look up a recipe by its exact name. `Ok(None)` means not found.
    async fn get_recipe(&self, name: &str) -> StoreResult<Option<Recipe>>;
    /// Every stored recipe that lists all of `ingredients`, in ascending name
    /// order. Nothing matching yields an empty list.
    async fn find_recipes(&self, ingredients: &[String]) -> StoreResult<Vec<Recipe>>;
}

/// Configuration for selecting and building a backend.
///
/// # Example
/// ```
/// use store::BackendConfig;
///
/// // In-memory (for testing)
/// let config = BackendConfig::in_memory();
///
/// // SQLite, file created on first use
/// let config = BackendConfig::sqlite("sqlite:///var/lib/recipebox/recipes.db");
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    /// Keep recipes in a process-local map. Nothing survives a restart.
    #[default]
    #[serde(rename = "inmem")]
    InMemory,
    /// Use the relational schema in the SQLite database at `url`.
    ///
    /// Requires the `backend-sqlite` feature (enabled by default).
    Sqlite {
        url: String,
        #[serde(default)]
        pool: PoolConfig,
    },
}

/// Connection pool policy for the relational backend.
///
/// Bounded open connections plus a bounded connection lifetime let the pool
/// ride out database restarts without piling up dead handles.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct PoolConfig {
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub min_connections: u32,
    #[serde(default = "default_lifetime_secs")]
    pub idle_timeout_secs: u64,
    #[serde(default = "default_lifetime_secs")]
    pub max_lifetime_secs: u64,
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    /// Create the tables if they do not exist yet.
    #[serde(default = "default_true")]
    pub create_schema: bool,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: 0,
            idle_timeout_secs: default_lifetime_secs(),
            max_lifetime_secs: default_lifetime_secs(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            create_schema: true,
        }
    }
}

impl PoolConfig {
    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn max_lifetime(&self) -> Duration {
        Duration::from_secs(self.max_lifetime_secs)
    }

    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_secs(self.acquire_timeout_secs)
    }
}

fn default_max_connections() -> u32 {
    10
}

fn default_lifetime_secs() -> u64 {
    180
}

fn default_acquire_timeout_secs() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

impl BackendConfig {
    /// Create an in-memory backend configuration.
    pub fn in_memory() -> Self {
        BackendConfig::InMemory
    }

    /// Create a SQLite backend configuration with the default pool policy.
    pub fn sqlite<U: Into<String>>(url: U) -> Self {
        BackendConfig::Sqlite {
            url: url.into(),
            pool: PoolConfig::default(),
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendConfig::InMemory => "inmem",
            BackendConfig::Sqlite { .. } => "sqlite",
        }
    }

    /// Build the backend described by this configuration.
    ///
    /// The SQL backend connects (and pings) eagerly, so a bad connection
    /// string fails here rather than on the first request.
    pub async fn build(&self) -> StoreResult<Arc<dyn RecipeStore>> {
        match self {
            BackendConfig::InMemory => Ok(Arc::new(MemoryStore::new())),
            BackendConfig::Sqlite { url, pool } => {
                #[cfg(feature = "backend-sqlite")]
                {
                    let store = SqlStore::connect(url, pool).await?;
                    if pool.create_schema {
                        store.ensure_schema().await?;
                    }
                    Ok(Arc::new(store))
                }
                #[cfg(not(feature = "backend-sqlite"))]
                {
                    let _ = (url, pool);
                    Err(StoreError::Config(
                        "sqlite backend disabled at compile time".to_string(),
                    ))
                }
            }
        }
    }
}

/// An in-memory backend using a `RwLock` around a `HashMap` keyed by name.
pub struct MemoryStore {
    recipes: RwLock<HashMap<String, Recipe>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            recipes: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored recipes.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self
            .recipes
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .len())
    }

    pub fn is_empty(&self) -> StoreResult<bool> {
        self.len().map(|n| n == 0)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecipeStore for MemoryStore {
    async fn add_recipe(&self, recipe: Recipe) -> StoreResult<()> {
        let recipe = recipe.deduplicated();
        self.recipes
            .write()
            .map_err(|_| StoreError::backend("poisoned lock"))?
            .insert(recipe.name.clone(), recipe);
        Ok(())
    }

    async fn get_recipe(&self, name: &str) -> StoreResult<Option<Recipe>> {
        let guard = self
            .recipes
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;
        Ok(guard.get(name).cloned())
    }

    async fn find_recipes(&self, ingredients: &[String]) -> StoreResult<Vec<Recipe>> {
        // A read lock is held for the whole scan so the snapshot is consistent.
        let guard = self
            .recipes
            .read()
            .map_err(|_| StoreError::backend("poisoned lock"))?;

        // HashMap iteration order is arbitrary; sorting the keys is what makes
        // the listing come out in name order.
        let mut names: Vec<&String> = guard.keys().collect();
        names.sort();

        Ok(names
            .into_iter()
            .filter_map(|name| guard.get(name))
            .filter(|recipe| recipe.uses_ingredients(ingredients))
            .cloned()
            .collect())
    }
}

/// The relational backend implementation.
#[cfg(feature = "backend-sqlite")]
pub mod sql;

#[cfg(feature = "backend-sqlite")]
pub use sql::SqlStore;
