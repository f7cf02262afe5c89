use crate::error::ServerError;
use crate::model::{parse_ingredients, validate_recipe};
use crate::rpc::proto::recipe_service_server::{RecipeService, RecipeServiceServer};
use crate::rpc::proto::{Empty, FindRequest, Recipe, RecipeRequest, Recipes};
use std::sync::Arc;
use store::RecipeStore;
use tonic::{Request, Response, Status};

/// Full method paths, as seen by the tracer.
pub const ADD_RECIPE: &str = "/recipes.RecipeService/AddRecipe";
pub const GET_RECIPE: &str = "/recipes.RecipeService/GetRecipe";
pub const FIND_RECIPES: &str = "/recipes.RecipeService/FindRecipes";

/// `RecipeService` implementation over a [`RecipeStore`].
#[derive(Clone)]
pub struct RecipeRpc {
    store: Arc<dyn RecipeStore>,
}

impl RecipeRpc {
    pub fn new(store: Arc<dyn RecipeStore>) -> Self {
        Self { store }
    }

    pub fn into_server(self) -> RecipeServiceServer<Self> {
        RecipeServiceServer::new(self)
    }
}

#[tonic::async_trait]
impl RecipeService for RecipeRpc {
    async fn add_recipe(&self, request: Request<Recipe>) -> Result<Response<Empty>, Status> {
        let Recipe { name, ingredients } = request.into_inner();
        let recipe = validate_recipe(name, ingredients)?;

        self.store
            .add_recipe(recipe)
            .await
            .map_err(|e| ServerError::storage("error writing recipe to database", e))?;

        Ok(Response::new(Empty {}))
    }

    async fn get_recipe(
        &self,
        request: Request<RecipeRequest>,
    ) -> Result<Response<Recipe>, Status> {
        let name = request.into_inner().name;

        match self.store.get_recipe(&name).await {
            Ok(Some(recipe)) => Ok(Response::new(recipe.into())),
            Ok(None) => Err(ServerError::NotFound(format!("recipe ({name}) not found")).into()),
            Err(e) => Err(ServerError::storage("error reading recipe from database", e).into()),
        }
    }

    async fn find_recipes(
        &self,
        request: Request<FindRequest>,
    ) -> Result<Response<Recipes>, Status> {
        let requested = request.into_inner().ingredients;

        // The HTTP facade forwards `?ingredients=a,b` as a single value.
        let ingredients: Vec<String> = if requested.len() == 1 {
            parse_ingredients(&requested[0])?
        } else {
            requested.into_iter().filter(|i| !i.is_empty()).collect()
        };
        if ingredients.is_empty() {
            return Err(ServerError::BadRequest("no ingredients specified".to_string()).into());
        }

        let recipes = self
            .store
            .find_recipes(&ingredients)
            .await
            .map_err(|e| ServerError::storage("error reading recipes from database", e))?;

        Ok(Response::new(Recipes {
            recipes: recipes.into_iter().map(Recipe::from).collect(),
        }))
    }
}
