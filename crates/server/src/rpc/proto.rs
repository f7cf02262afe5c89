//! Wire messages for `recipes.RecipeService`, plus the generated client and
//! server stubs (`recipe_service_client`, `recipe_service_server`).

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Recipe {
    #[prost(string, tag = "1")]
    pub name: String,
    #[prost(string, repeated, tag = "2")]
    pub ingredients: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct RecipeRequest {
    #[prost(string, tag = "1")]
    pub name: String,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct FindRequest {
    #[prost(string, repeated, tag = "1")]
    pub ingredients: Vec<String>,
}

#[derive(Clone, PartialEq, ::prost::Message)]
pub struct Recipes {
    #[prost(message, repeated, tag = "1")]
    pub recipes: Vec<Recipe>,
}

/// Same encoding as `google.protobuf.Empty`.
#[derive(Clone, Copy, PartialEq, ::prost::Message)]
pub struct Empty {}

impl From<store::Recipe> for Recipe {
    fn from(recipe: store::Recipe) -> Self {
        Self {
            name: recipe.name,
            ingredients: recipe.ingredients,
        }
    }
}

impl From<Recipe> for store::Recipe {
    fn from(recipe: Recipe) -> Self {
        store::Recipe::new(recipe.name, recipe.ingredients)
    }
}

include!(concat!(env!("OUT_DIR"), "/recipes.RecipeService.rs"));
