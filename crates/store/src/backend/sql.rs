//! Relational backend for the recipe catalog.
//!
//! Recipes and ingredients are separate, deduplicated entities joined by a
//! many-to-many table:
//!
//! ```text
//! recipes(id, name UNIQUE)
//! ingredients(id, name UNIQUE)
//! recipe_ingredients(recipe_id, ingredient_id)
//! ```
//!
//! Ingredients are created on first use and never deleted, even when no
//! recipe references them any more.
//!
//! # Configuration Example
//! ```toml
//! [database]
//! kind = "sqlite"
//! url = "sqlite:///var/lib/recipebox/recipes.db"
//!
//! [database.pool]
//! max_connections = 10
//! max_lifetime_secs = 180
//! ```

use crate::backend::{PoolConfig, RecipeStore};
use crate::{Recipe, StoreError, StoreResult};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

const SCHEMA: [&str; 3] = [
    "CREATE TABLE IF NOT EXISTS recipes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS ingredients (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL UNIQUE
    )",
    "CREATE TABLE IF NOT EXISTS recipe_ingredients (
        recipe_id INTEGER NOT NULL REFERENCES recipes(id),
        ingredient_id INTEGER NOT NULL REFERENCES ingredients(id),
        PRIMARY KEY (recipe_id, ingredient_id)
    )",
];

const SELECT_INGREDIENTS: &str = "
    SELECT I.name FROM recipes R
    INNER JOIN recipe_ingredients RI ON RI.recipe_id = R.id
    INNER JOIN ingredients I ON I.id = RI.ingredient_id
    WHERE R.name = ?
    ORDER BY I.name";

/// SQLite-backed recipe store reached through a bounded connection pool.
///
/// Every write runs in a single transaction; a failed step rolls the whole
/// write back, so partially written recipes are never visible.
#[derive(Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Open a pool against `url` and verify the database is reachable.
    ///
    /// # Example
    /// ```no_run
    /// use store::{PoolConfig, SqlStore};
    ///
    /// # async fn open() -> store::StoreResult<()> {
    /// let store = SqlStore::connect("sqlite:///tmp/recipes.db", &PoolConfig::default()).await?;
    /// store.ensure_schema().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str, config: &PoolConfig) -> StoreResult<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .idle_timeout(config.idle_timeout())
            .max_lifetime(config.max_lifetime())
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await?;

        sqlx::query("SELECT 1").execute(&pool).await?;
        tracing::debug!(url, max_connections = config.max_connections, "sqlite pool ready");

        Ok(Self { pool })
    }

    /// Create the three tables if they are missing. Safe to call repeatedly.
    pub async fn ensure_schema(&self) -> StoreResult<()> {
        for statement in SCHEMA {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn matching_names(&self, ingredients: &[String]) -> StoreResult<Vec<String>> {
        if ingredients.is_empty() {
            return Ok(sqlx::query_scalar::<_, String>("SELECT name FROM recipes")
                .fetch_all(&self.pool)
                .await?);
        }

        // Recipes whose joined ingredient rows cover the whole query set. The
        // join rows are unique per (recipe, ingredient), so the count equals
        // the number of distinct query ingredients the recipe lists.
        let placeholders = vec!["?"; ingredients.len()].join(", ");
        let statement = format!(
            "SELECT R.name FROM recipe_ingredients RI
            INNER JOIN recipes R ON R.id = RI.recipe_id
            INNER JOIN ingredients I ON I.id = RI.ingredient_id
            WHERE I.name IN ({placeholders})
            GROUP BY RI.recipe_id, R.name
            HAVING COUNT(*) = ?"
        );

        let mut query = sqlx::query_scalar::<_, String>(&statement);
        for ingredient in ingredients {
            query = query.bind(ingredient);
        }
        let wanted = i64::try_from(ingredients.len()).map_err(StoreError::backend)?;

        Ok(query.bind(wanted).fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl RecipeStore for SqlStore {
    async fn add_recipe(&self, recipe: Recipe) -> StoreResult<()> {
        let recipe = recipe.deduplicated();
        // Dropping `tx` before commit rolls everything back.
        let mut tx = self.pool.begin().await?;

        for ingredient in &recipe.ingredients {
            sqlx::query("INSERT OR IGNORE INTO ingredients (name) VALUES (?)")
                .bind(ingredient)
                .execute(&mut *tx)
                .await?;
        }

        // Clear the old ingredient list so an overwrite replaces it.
        sqlx::query(
            "DELETE FROM recipe_ingredients
            WHERE recipe_id = (SELECT id FROM recipes WHERE name = ? LIMIT 1)",
        )
        .bind(&recipe.name)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT OR IGNORE INTO recipes (name) VALUES (?)")
            .bind(&recipe.name)
            .execute(&mut *tx)
            .await?;

        for ingredient in &recipe.ingredients {
            sqlx::query(
                "INSERT INTO recipe_ingredients (recipe_id, ingredient_id)
                SELECT (SELECT id FROM recipes WHERE name = ? LIMIT 1), id
                FROM ingredients WHERE name = ?",
            )
            .bind(&recipe.name)
            .bind(ingredient)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_recipe(&self, name: &str) -> StoreResult<Option<Recipe>> {
        let ingredients: Vec<String> = sqlx::query_scalar(SELECT_INGREDIENTS)
            .bind(name)
            .fetch_all(&self.pool)
            .await?;

        if ingredients.is_empty() {
            return Ok(None);
        }

        Ok(Some(Recipe {
            name: name.to_string(),
            ingredients,
        }))
    }

    async fn find_recipes(&self, ingredients: &[String]) -> StoreResult<Vec<Recipe>> {
        let mut query = ingredients.to_vec();
        query.sort();
        query.dedup();

        let names = self.matching_names(&query).await?;

        // One extra round trip per match to load its full ingredient list.
        let mut recipes = Vec::with_capacity(names.len());
        for name in names {
            if let Some(recipe) = self.get_recipe(&name).await? {
                recipes.push(recipe);
            }
        }

        // GROUP BY gives no ordering guarantee.
        recipes.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(recipes)
    }
}
