use crate::error::{ServerError, ServerResult};
use crate::model::{parse_ingredients, unescape_name, NewRecipe, RecipeBody, RecipesBody};
use crate::state::ServerState;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::{StatusCode, Uri};
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;

/// Query parameters for recipe search
#[derive(Debug, Deserialize)]
pub struct FindQuery {
    /// Comma separated ingredient names
    #[serde(default)]
    pub ingredients: Option<String>,
}

/// Add a recipe, replacing any recipe with the same name
///
/// The body is decoded as JSON whatever content type the client declared.
///
/// # Request
///
/// ```json
/// { "name": "BLT", "ingredients": ["Tomato", "Bacon", "Lettuce"] }
/// ```
///
/// Responds 200 with an empty body.
pub async fn add_recipe(
    State(state): State<Arc<ServerState>>,
    body: Bytes,
) -> ServerResult<StatusCode> {
    let recipe = serde_json::from_slice::<NewRecipe>(&body)?.into_recipe()?;

    state
        .store
        .add_recipe(recipe)
        .await
        .map_err(|e| ServerError::storage("error writing recipe to database", e))?;

    Ok(StatusCode::OK)
}

/// Fetch one recipe by exact name (`GET /recipe/{name}`)
pub async fn get_recipe(
    State(state): State<Arc<ServerState>>,
    uri: Uri,
) -> ServerResult<Json<RecipeBody>> {
    // The raw segment is decoded here rather than by `Path` so that `+`
    // means a space, as in the query-escaped names clients send.
    let raw = uri.path().strip_prefix("/recipe/").unwrap_or_default();
    let name = unescape_name(raw)?;

    match state.store.get_recipe(&name).await {
        Ok(Some(recipe)) => Ok(Json(recipe.into())),
        Ok(None) => Err(ServerError::NotFound(format!("recipe ({name}) not found"))),
        Err(e) => Err(ServerError::storage("error reading recipe from database", e)),
    }
}

/// Search recipes by ingredients (`GET /recipes?ingredients=a,b,c`)
///
/// # Response
///
/// ```json
/// { "recipes": [ { "name": "BLT", "ingredients": ["Tomato", "Bacon", "Lettuce"] } ] }
/// ```
pub async fn find_recipes(
    State(state): State<Arc<ServerState>>,
    query: Result<Query<FindQuery>, QueryRejection>,
) -> ServerResult<Json<RecipesBody>> {
    let Query(query) =
        query.map_err(|e| ServerError::BadRequest(format!("invalid query string: {e}")))?;
    let ingredients = parse_ingredients(query.ingredients.as_deref().unwrap_or_default())?;

    let recipes = state
        .store
        .find_recipes(&ingredients)
        .await
        .map_err(|e| ServerError::storage("error reading recipes from database", e))?;

    Ok(Json(recipes.into()))
}
