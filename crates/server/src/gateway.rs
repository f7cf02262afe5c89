//! HTTP facade over the gRPC service.
//!
//! Serves the same routes as the native HTTP API, but every request is
//! turned into an RPC call and dispatched in-process through the RPC call
//! pipeline: tracer keyed by the method path, then metadata auth. The API
//! key travels as `x-api-key` metadata rather than as an HTTP header.

use crate::middleware::{json_content_type, request_id, API_KEY_HEADER};
use crate::model::{unescape_name, NewRecipe, RecipeBody, RecipesBody};
use crate::rpc::proto::recipe_service_server::RecipeService;
use crate::rpc::proto::{self, FindRequest, RecipeRequest};
use crate::rpc::service::{ADD_RECIPE, FIND_RECIPES, GET_RECIPE};
use crate::rpc::{authorize, traced, RecipeRpc};
use crate::state::ApiKey;
use crate::ServerError;
use axum::body::Bytes;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, HeaderValue, StatusCode, Uri};
use axum::middleware::from_fn;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tonic::metadata::MetadataMap;
use tonic::{Code, Request, Status};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Error body written for any non-OK status other than UNAUTHENTICATED.
#[derive(Debug, Serialize, Deserialize)]
pub struct RpcErrorBody {
    pub code: i32,
    pub message: String,
}

/// Shared state of the facade: the service it forwards to and the key the
/// RPC pipeline checks.
#[derive(Clone)]
pub struct Gateway {
    rpc: RecipeRpc,
    api_key: ApiKey,
}

impl Gateway {
    pub fn new(rpc: RecipeRpc, api_key: ApiKey) -> Self {
        Self { rpc, api_key }
    }

    /// Run one RPC through the call pipeline.
    ///
    /// `message` is only unwrapped after authentication so that a caller
    /// without a key learns nothing about its request body.
    async fn invoke<T, R, F, Fut>(
        &self,
        method: &'static str,
        headers: &HeaderMap,
        message: Result<T, Status>,
        call: F,
    ) -> Result<R, Status>
    where
        F: FnOnce(RecipeRpc, Request<T>) -> Fut,
        Fut: Future<Output = Result<tonic::Response<R>, Status>>,
    {
        let metadata = forwarded_metadata(headers);

        traced(method, async move {
            authorize(&metadata, &self.api_key)?;

            let mut request = Request::new(message?);
            *request.metadata_mut() = metadata;
            call(self.rpc.clone(), request)
                .await
                .map(tonic::Response::into_inner)
        })
        .await
    }
}

/// Copy every `X-Api-Key` header into RPC metadata. Nothing else is forwarded.
fn forwarded_metadata(headers: &HeaderMap) -> MetadataMap {
    let mut forwarded = HeaderMap::new();
    for value in headers.get_all(API_KEY_HEADER) {
        forwarded.append(API_KEY_HEADER, value.clone());
    }
    MetadataMap::from_headers(forwarded)
}

/// HTTP status for an RPC status code.
pub fn http_status(code: Code) -> StatusCode {
    match code {
        Code::Ok => StatusCode::OK,
        Code::InvalidArgument => StatusCode::BAD_REQUEST,
        Code::Unauthenticated => StatusCode::UNAUTHORIZED,
        Code::NotFound => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn status_response(status: Status) -> Response {
    let code = http_status(status.code());

    let mut response = if code == StatusCode::UNAUTHORIZED {
        code.into_response()
    } else {
        let body = RpcErrorBody {
            code: status.code() as i32,
            message: status.message().to_string(),
        };
        (code, Json(body)).into_response()
    };

    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}

fn respond<T: IntoResponse>(result: Result<T, Status>) -> Response {
    match result {
        Ok(body) => body.into_response(),
        Err(status) => status_response(status),
    }
}

async fn add_recipe(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let message = serde_json::from_slice::<NewRecipe>(&body)
        .map(|recipe| proto::Recipe {
            name: recipe.name.unwrap_or_default(),
            ingredients: recipe.ingredients.unwrap_or_default(),
        })
        .map_err(|e| Status::from(ServerError::from(e)));

    let result = gateway
        .invoke(ADD_RECIPE, &headers, message, |rpc, request| async move {
            rpc.add_recipe(request).await
        })
        .await;

    respond(result.map(|_| StatusCode::OK))
}

async fn get_recipe(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    uri: Uri,
) -> Response {
    let raw = uri.path().strip_prefix("/recipe/").unwrap_or_default();
    let message = unescape_name(raw)
        .map(|name| RecipeRequest { name })
        .map_err(Status::from);

    let result = gateway
        .invoke(GET_RECIPE, &headers, message, |rpc, request| async move {
            rpc.get_recipe(request).await
        })
        .await;

    respond(result.map(|recipe| {
        Json(RecipeBody {
            name: recipe.name,
            ingredients: recipe.ingredients,
        })
    }))
}

async fn find_recipes(
    State(gateway): State<Arc<Gateway>>,
    headers: HeaderMap,
    query: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Response {
    // An unparseable query string is forwarded as an empty search, which the
    // service rejects.
    let ingredients = query
        .map(|Query(pairs)| {
            pairs
                .into_iter()
                .filter(|(key, _)| key == "ingredients")
                .map(|(_, value)| value)
                .collect()
        })
        .unwrap_or_default();

    let result = gateway
        .invoke(
            FIND_RECIPES,
            &headers,
            Ok(FindRequest { ingredients }),
            |rpc, request| async move { rpc.find_recipes(request).await },
        )
        .await;

    respond(result.map(|found| {
        Json(RecipesBody {
            recipes: found
                .recipes
                .into_iter()
                .map(|recipe| RecipeBody {
                    name: recipe.name,
                    ingredients: recipe.ingredients,
                })
                .collect(),
        })
    }))
}

async fn unknown_route(State(gateway): State<Arc<Gateway>>, headers: HeaderMap) -> Response {
    let result = authorize(&forwarded_metadata(&headers), &gateway.api_key)
        .and_then(|()| Err::<(), _>(Status::not_found("route not found")));
    respond(result)
}

/// Build the HTTP-over-RPC router.
pub fn build_gateway_router(gateway: Arc<Gateway>, timeout: Duration) -> Router {
    Router::new()
        .route("/recipe", post(add_recipe))
        .route("/recipe/{name}", get(get_recipe))
        .route("/recipes", get(find_recipes))
        .fallback(unknown_route)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(from_fn(json_content_type))
        .layer(from_fn(request_id))
        .layer(TraceLayer::new_for_http())
        .with_state(gateway)
}
