use super::{ClientError, ClientResult};
use crate::middleware::API_KEY_HEADER;
use crate::rpc::proto::recipe_service_client::RecipeServiceClient;
use crate::rpc::proto::{self, FindRequest, RecipeRequest};
use store::Recipe;
use tonic::codegen::InterceptedService;
use tonic::metadata::AsciiMetadataValue;
use tonic::service::Interceptor;
use tonic::transport::{Channel, Endpoint};
use tonic::{Code, Request, Status};

/// Adds `x-api-key` metadata to every outgoing call.
#[derive(Debug, Clone)]
pub struct AttachApiKey(AsciiMetadataValue);

impl AttachApiKey {
    pub fn new(api_key: &str) -> ClientResult<Self> {
        api_key
            .parse()
            .map(Self)
            .map_err(|_| ClientError::InvalidKey("must be visible ASCII".to_string()))
    }
}

impl Interceptor for AttachApiKey {
    fn call(&mut self, mut request: Request<()>) -> Result<Request<()>, Status> {
        request
            .metadata_mut()
            .insert(API_KEY_HEADER, self.0.clone());
        Ok(request)
    }
}

/// Client for `recipes.RecipeService`.
///
/// Cheap to clone; clones share one connection.
#[derive(Clone)]
pub struct GrpcClient {
    inner: RecipeServiceClient<InterceptedService<Channel, AttachApiKey>>,
}

impl GrpcClient {
    /// Connect to `endpoint`, e.g. `http://127.0.0.1:50051`.
    pub async fn connect(endpoint: impl Into<String>, api_key: &str) -> ClientResult<Self> {
        let interceptor = AttachApiKey::new(api_key)?;
        let channel = Endpoint::from_shared(endpoint.into())?.connect().await?;
        Ok(Self {
            inner: RecipeServiceClient::with_interceptor(channel, interceptor),
        })
    }

    pub async fn add_recipe(&self, recipe: &Recipe) -> ClientResult<()> {
        self.inner
            .clone()
            .add_recipe(proto::Recipe::from(recipe.clone()))
            .await?;
        Ok(())
    }

    /// NOT_FOUND is `Ok(None)`.
    pub async fn get_recipe(&self, name: &str) -> ClientResult<Option<Recipe>> {
        let request = RecipeRequest {
            name: name.to_string(),
        };
        match self.inner.clone().get_recipe(request).await {
            Ok(response) => Ok(Some(response.into_inner().into())),
            Err(status) if status.code() == Code::NotFound => Ok(None),
            Err(status) => Err(status.into()),
        }
    }

    pub async fn find_recipes(&self, ingredients: &[String]) -> ClientResult<Vec<Recipe>> {
        let request = FindRequest {
            ingredients: ingredients.to_vec(),
        };
        let found = self.inner.clone().find_recipes(request).await?.into_inner();
        Ok(found.recipes.into_iter().map(Recipe::from).collect())
    }
}
