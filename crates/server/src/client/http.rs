use super::{ClientError, ClientResult};
use crate::middleware::API_KEY_HEADER;
use crate::model::{RecipeBody, RecipesBody};
use reqwest::{RequestBuilder, Response, StatusCode};
use store::Recipe;

/// Client for the HTTP/JSON API, native or HTTP-over-RPC.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpClient {
    /// `base_url` is the scheme, host and port, e.g. `http://127.0.0.1:8080`.
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// `POST /recipe`
    pub async fn add_recipe(&self, recipe: &Recipe) -> ClientResult<()> {
        let request = self
            .client
            .post(format!("{}/recipe", self.base_url))
            .json(recipe);
        expect_ok(self.send(request).await?).await?;
        Ok(())
    }

    /// `GET /recipe/{name}`. The name is query-escaped.
    pub async fn get_recipe(&self, name: &str) -> ClientResult<Option<Recipe>> {
        let url = format!("{}/recipe/{}", self.base_url, urlencoding::encode(name));
        let response = self.send(self.client.get(url)).await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let body: RecipeBody = expect_ok(response).await?.json().await?;
        Ok(Some(body.into()))
    }

    /// `GET /recipes?ingredients=a,b`
    pub async fn find_recipes(&self, ingredients: &[String]) -> ClientResult<Vec<Recipe>> {
        let url = format!(
            "{}/recipes?ingredients={}",
            self.base_url,
            urlencoding::encode(&ingredients.join(","))
        );
        let response = self.send(self.client.get(url)).await?;

        let body: RecipesBody = expect_ok(response).await?.json().await?;
        Ok(body.recipes.into_iter().map(Recipe::from).collect())
    }

    async fn send(&self, request: RequestBuilder) -> ClientResult<Response> {
        Ok(request.header(API_KEY_HEADER, &self.api_key).send().await?)
    }
}

async fn expect_ok(response: Response) -> ClientResult<Response> {
    let status = response.status();
    if status == StatusCode::OK {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status { status, body })
}
