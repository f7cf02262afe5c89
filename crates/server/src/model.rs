//! JSON wire model shared by the HTTP listeners, and the request validation
//! both protocols apply before touching storage.

use crate::error::{ServerError, ServerResult};
use serde::{Deserialize, Serialize};
use store::Recipe;

/// Recipe as it appears in JSON responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeBody {
    pub name: String,
    pub ingredients: Vec<String>,
}

/// Body of `POST /recipe`. Absent and `null` fields are both treated as missing.
#[derive(Debug, Default, Deserialize)]
pub struct NewRecipe {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
}

/// Body of a search response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipesBody {
    pub recipes: Vec<RecipeBody>,
}

impl From<Recipe> for RecipeBody {
    fn from(recipe: Recipe) -> Self {
        Self {
            name: recipe.name,
            ingredients: recipe.ingredients,
        }
    }
}

impl From<RecipeBody> for Recipe {
    fn from(body: RecipeBody) -> Self {
        Recipe::new(body.name, body.ingredients)
    }
}

impl From<Vec<Recipe>> for RecipesBody {
    fn from(recipes: Vec<Recipe>) -> Self {
        Self {
            recipes: recipes.into_iter().map(RecipeBody::from).collect(),
        }
    }
}

impl NewRecipe {
    pub fn into_recipe(self) -> ServerResult<Recipe> {
        validate_recipe(
            self.name.unwrap_or_default(),
            self.ingredients.unwrap_or_default(),
        )
    }
}

/// Check that a recipe to be stored has a name and at least one ingredient.
pub fn validate_recipe(name: String, ingredients: Vec<String>) -> ServerResult<Recipe> {
    if name.is_empty() {
        return Err(ServerError::BadRequest("no name specified".to_string()));
    }
    if ingredients.is_empty() {
        return Err(ServerError::BadRequest(
            "no ingredients specified".to_string(),
        ));
    }
    Ok(Recipe::new(name, ingredients))
}

/// Split a comma separated ingredient list, dropping empty entries.
///
/// An empty result is a client error: searching for nothing is rejected
/// here even though the store itself would list every recipe.
pub fn parse_ingredients(raw: &str) -> ServerResult<Vec<String>> {
    let ingredients: Vec<String> = raw
        .split(',')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if ingredients.is_empty() {
        return Err(ServerError::BadRequest(
            "no ingredients specified".to_string(),
        ));
    }
    Ok(ingredients)
}

/// Decode a recipe name taken from a URL path with query-string rules:
/// `+` is a space, then `%XX` escapes are resolved.
pub fn unescape_name(raw: &str) -> ServerResult<String> {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|name| name.into_owned())
        .map_err(|err| ServerError::BadRequest(format!("invalid recipe name: {err}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_name_is_rejected_first() {
        let body: NewRecipe = serde_json::from_str(r#"{"ingredients":["x"]}"#).unwrap();
        let err = body.into_recipe().unwrap_err();
        assert_eq!(err.to_string(), "no name specified");

        let body: NewRecipe = serde_json::from_str(r#"{}"#).unwrap();
        assert_eq!(body.into_recipe().unwrap_err().to_string(), "no name specified");
    }

    #[test]
    fn missing_or_null_ingredients_are_rejected() {
        for json in [
            r#"{"name":"BLT"}"#,
            r#"{"name":"BLT","ingredients":null}"#,
            r#"{"name":"BLT","ingredients":[]}"#,
        ] {
            let body: NewRecipe = serde_json::from_str(json).unwrap();
            assert_eq!(
                body.into_recipe().unwrap_err().to_string(),
                "no ingredients specified",
                "{json}"
            );
        }
    }

    #[test]
    fn valid_body_becomes_a_deduplicated_recipe() {
        let body: NewRecipe =
            serde_json::from_str(r#"{"name":"BLT","ingredients":["Bacon","Bacon","Tomato"]}"#)
                .unwrap();
        let recipe = body.into_recipe().unwrap();
        assert_eq!(recipe.name, "BLT");
        assert_eq!(recipe.ingredients, vec!["Bacon", "Tomato"]);
    }

    #[test]
    fn ingredient_query_splits_on_commas() {
        assert_eq!(
            parse_ingredients("Tomato,Bacon").unwrap(),
            vec!["Tomato", "Bacon"]
        );
        assert_eq!(
            parse_ingredients("Ground Beef,,Tomato,").unwrap(),
            vec!["Ground Beef", "Tomato"]
        );
        assert!(parse_ingredients("").is_err());
        assert!(parse_ingredients(",,").is_err());
    }

    #[test]
    fn names_use_query_unescaping() {
        assert_eq!(unescape_name("BLT").unwrap(), "BLT");
        assert_eq!(unescape_name("Spaghetti+Bolognese").unwrap(), "Spaghetti Bolognese");
        assert_eq!(unescape_name("Mac%20%26%20Cheese").unwrap(), "Mac & Cheese");
        assert_eq!(unescape_name("1%2B1").unwrap(), "1+1");
        assert!(unescape_name("%FF%FE").is_err());
    }
}
