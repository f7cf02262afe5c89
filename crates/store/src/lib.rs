//! # Recipe Store
//!
//! This crate owns the recipe catalog's data: the [`Recipe`] entity, the
//! ingredient matching rule, and the storage backends that persist recipes.
//!
//! ## Core Features
//!
//! - **One storage contract**: every backend implements the async
//!   [`RecipeStore`] trait (`add_recipe`, `get_recipe`, `find_recipes`), so
//!   the protocol gateways never know which backend they are talking to.
//! - **Pluggable Backends**, selected at runtime through [`BackendConfig`]:
//!   - [`MemoryStore`], a lock-guarded `HashMap` for ephemeral catalogs and tests.
//!   - [`SqlStore`], a normalized relational schema (`recipes`, `ingredients`,
//!     `recipe_ingredients`) reached through a bounded SQLite connection pool
//!     (enabled via the `backend-sqlite` feature, on by default).
//! - **Stable listings**: `find_recipes` always returns recipes in ascending
//!   name order, whatever the backend.
//!
//! ## Matching
//!
//! A recipe matches an ingredient query when it lists every queried
//! ingredient; it may list others too. An empty query matches every recipe.
//!
//! ## Example Usage
//!
//! ```
//! use store::{MemoryStore, Recipe, RecipeStore};
//!
//! # tokio_test_block_on(async {
//! let store = MemoryStore::new();
//! store
//!     .add_recipe(Recipe::new("BLT", ["Tomato", "Bacon", "Lettuce"]))
//!     .await
//!     .unwrap();
//!
//! let found = store.find_recipes(&["Tomato".to_string()]).await.unwrap();
//! assert_eq!(found[0].name, "BLT");
//! assert!(store.get_recipe("Nonexistent").await.unwrap().is_none());
//! # });
//! # fn tokio_test_block_on<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f)
//! # }
//! ```

mod backend;
mod recipe;

pub use backend::{BackendConfig, MemoryStore, PoolConfig, RecipeStore};
#[cfg(feature = "backend-sqlite")]
pub use backend::SqlStore;
pub use recipe::{same_ingredients, Recipe};

use thiserror::Error;

pub type StoreResult<T> = Result<T, StoreError>;

/// Storage failures. A missing recipe is not an error; see
/// [`RecipeStore::get_recipe`].
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend error: {0}")]
    Backend(String),
    #[cfg(feature = "backend-sqlite")]
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("invalid backend configuration: {0}")]
    Config(String),
}

impl StoreError {
    pub fn backend<E: std::fmt::Display>(err: E) -> Self {
        Self::Backend(err.to_string())
    }
}
