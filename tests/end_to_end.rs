//! End-to-end tests: real listeners on ephemeral ports, real clients.

use async_trait::async_trait;
use recipebox::proto::recipe_service_client::RecipeServiceClient;
use recipebox::proto::{FindRequest, Recipe, RecipeRequest};
use recipebox::{
    BackendConfig, ClientError, GrpcClient, HttpClient, HybridServer, MemoryStore, RecipeStore,
    ServerConfig, ServerMode, StoreResult,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Notify;
use tonic::{Code, Request};

const API_KEY: &str = "e2e-key";

fn config(mode: ServerMode) -> ServerConfig {
    ServerConfig {
        mode,
        http_port: 0,
        grpc_port: 0,
        api_key: API_KEY.into(),
        shutdown_grace_secs: 1,
        ..ServerConfig::default()
    }
}

async fn start(config: &ServerConfig) -> HybridServer {
    let store = config.database.build().await.expect("backend");
    HybridServer::start(config, store).await.expect("start")
}

fn authed<T>(message: T) -> Request<T> {
    let mut request = Request::new(message);
    request
        .metadata_mut()
        .insert("x-api-key", API_KEY.parse().unwrap());
    request
}

async fn grpc_client(addr: SocketAddr) -> RecipeServiceClient<tonic::transport::Channel> {
    RecipeServiceClient::connect(format!("http://{addr}"))
        .await
        .expect("grpc connect")
}

async fn stop(server: HybridServer) {
    server.stop();
    tokio::time::timeout(Duration::from_secs(10), server.wait())
        .await
        .expect("listeners stop in time")
        .expect("listeners stop cleanly");
}

#[tokio::test]
async fn hybrid_mode_serves_both_protocols_over_one_store() {
    let server = start(&config(ServerMode::Hybrid)).await;
    let http = format!("http://{}", server.http_addr().expect("http listener"));
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{http}/recipe"))
        .header("x-api-key", API_KEY)
        .json(&json!({"name": "BLT", "ingredients": ["Tomato", "Bacon", "Lettuce"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);

    // Written over HTTP, read over gRPC.
    let mut grpc = grpc_client(server.grpc_addr().expect("grpc listener")).await;
    let blt = grpc
        .get_recipe(authed(RecipeRequest { name: "BLT".into() }))
        .await
        .unwrap()
        .into_inner();
    assert_eq!(blt.ingredients, vec!["Tomato", "Bacon", "Lettuce"]);

    // Written over gRPC, found over HTTP.
    grpc.add_recipe(authed(Recipe {
        name: "Meatballs".into(),
        ingredients: vec!["Ground Beef".into(), "Tomato".into()],
    }))
    .await
    .unwrap();

    let found: Value = client
        .get(format!("{http}/recipes?ingredients=Tomato"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let names: Vec<&str> = found["recipes"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["BLT", "Meatballs"]);

    let response = client
        .get(format!("{http}/recipe/Nonexistent"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    stop(server).await;
}

#[tokio::test]
async fn grpc_calls_need_the_api_key() {
    let server = start(&config(ServerMode::Grpc)).await;
    assert!(server.http_addr().is_none());
    let mut grpc = grpc_client(server.grpc_addr().unwrap()).await;

    let status = grpc
        .get_recipe(Request::new(RecipeRequest { name: "BLT".into() }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let mut wrong = Request::new(FindRequest {
        ingredients: vec!["Tomato".into()],
    });
    wrong
        .metadata_mut()
        .insert("x-api-key", "wrong".parse().unwrap());
    let status = grpc.find_recipes(wrong).await.unwrap_err();
    assert_eq!(status.code(), Code::Unauthenticated);

    let status = grpc
        .get_recipe(authed(RecipeRequest { name: "BLT".into() }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::NotFound);

    let status = grpc
        .find_recipes(authed(FindRequest { ingredients: vec![] }))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);

    stop(server).await;
}

#[tokio::test]
async fn http_mode_serves_the_native_api() {
    let server = start(&config(ServerMode::Http)).await;
    assert!(server.grpc_addr().is_none());
    let http = format!("http://{}", server.http_addr().unwrap());
    let client = reqwest::Client::new();

    let response = client
        .post(format!("{http}/recipe"))
        .header("x-api-key", API_KEY)
        .body(r#"{"name":"BLT","ingredients":["Tomato","Bacon","Lettuce"]}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(response.headers()["content-type"], "application/json");

    let response = client
        .get(format!("{http}/recipe/BLT"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let body: Value = response.json().await.unwrap();
    assert_eq!(
        body,
        json!({"name": "BLT", "ingredients": ["Tomato", "Bacon", "Lettuce"]})
    );

    let response = client
        .post(format!("{http}/recipe"))
        .header("x-api-key", API_KEY)
        .json(&json!({"ingredients": ["x"]}))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["error"]["message"], "no name specified");

    let response = client
        .get(format!("{http}/recipe/BLT"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    stop(server).await;
}

#[cfg(feature = "sqlite")]
#[tokio::test]
async fn hybrid_mode_over_sqlite() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("recipes.db").display());
    let config = ServerConfig {
        database: BackendConfig::sqlite(url),
        ..config(ServerMode::Hybrid)
    };
    let server = start(&config).await;
    let http = format!("http://{}", server.http_addr().unwrap());
    let client = reqwest::Client::new();

    for (name, ingredients) in [
        ("SpagBol", vec!["Spaghetti", "Ground Beef", "Tomato"]),
        ("Meatballs", vec!["Ground Beef", "Tomato"]),
        ("BLT", vec!["Tomato", "Bacon", "Lettuce"]),
    ] {
        let response = client
            .post(format!("{http}/recipe"))
            .header("x-api-key", API_KEY)
            .json(&json!({"name": name, "ingredients": ingredients}))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), 200);
    }

    let found: Value = client
        .get(format!("{http}/recipes?ingredients=Ground+Beef,Tomato"))
        .header("x-api-key", API_KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(found["recipes"][0]["name"], "Meatballs");
    assert_eq!(found["recipes"][1]["name"], "SpagBol");
    assert_eq!(found["recipes"].as_array().unwrap().len(), 2);

    stop(server).await;
}

#[tokio::test]
async fn bind_failures_are_reported_together() {
    let http_taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let grpc_taken = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();

    let config = ServerConfig {
        http_port: http_taken.local_addr().unwrap().port(),
        grpc_port: grpc_taken.local_addr().unwrap().port(),
        ..config(ServerMode::Hybrid)
    };
    let store = BackendConfig::in_memory().build().await.unwrap();
    let err = HybridServer::start(&config, store).await.err().expect("bind must fail");

    let message = format!("{err:#}");
    assert!(message.contains("http listener"), "{message}");
    assert!(message.contains("grpc listener"), "{message}");
}

#[tokio::test]
async fn stopped_listeners_refuse_connections() {
    let server = start(&config(ServerMode::Hybrid)).await;
    let http_addr = server.http_addr().unwrap();
    let grpc_addr = server.grpc_addr().unwrap();

    stop(server).await;

    assert!(tokio::net::TcpStream::connect(http_addr).await.is_err());
    assert!(tokio::net::TcpStream::connect(grpc_addr).await.is_err());
}

/// Holds every write for `delay` before storing it. Reads go straight through.
struct SlowStore {
    inner: MemoryStore,
    delay: Duration,
    entered: Notify,
    cancelled: AtomicBool,
}

impl SlowStore {
    fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner: MemoryStore::new(),
            delay,
            entered: Notify::new(),
            cancelled: AtomicBool::new(false),
        })
    }
}

/// Marks the write cancelled if it is dropped before completing.
struct WriteGuard<'a>(&'a AtomicBool, bool);

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        if !self.1 {
            self.0.store(true, Ordering::SeqCst);
        }
    }
}

#[async_trait]
impl RecipeStore for SlowStore {
    async fn add_recipe(&self, recipe: recipebox::Recipe) -> StoreResult<()> {
        let mut guard = WriteGuard(&self.cancelled, false);
        self.entered.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.add_recipe(recipe).await?;
        guard.1 = true;
        Ok(())
    }

    async fn get_recipe(&self, name: &str) -> StoreResult<Option<recipebox::Recipe>> {
        self.inner.get_recipe(name).await
    }

    async fn find_recipes(&self, ingredients: &[String]) -> StoreResult<Vec<recipebox::Recipe>> {
        self.inner.find_recipes(ingredients).await
    }
}

fn blt() -> recipebox::Recipe {
    recipebox::Recipe::new("BLT", ["Tomato", "Bacon", "Lettuce"])
}

async fn start_slow(config: &ServerConfig, store: &Arc<SlowStore>) -> HybridServer {
    HybridServer::start(config, store.clone()).await.expect("start")
}

#[tokio::test]
async fn grpc_stop_without_drain_cancels_in_flight_calls() {
    let store = SlowStore::new(Duration::from_secs(60));
    let config = ServerConfig {
        grpc_drain_secs: 0,
        ..config(ServerMode::Grpc)
    };
    let server = start_slow(&config, &store).await;
    let client = GrpcClient::connect(format!("http://{}", server.grpc_addr().unwrap()), API_KEY)
        .await
        .unwrap();

    let call = tokio::spawn(async move { client.add_recipe(&blt()).await });
    store.entered.notified().await;

    tokio::time::timeout(Duration::from_secs(1), async {
        server.stop();
        server.wait().await
    })
    .await
    .expect("a zero drain stops at once")
    .expect("listeners stop cleanly");

    assert!(store.cancelled.load(Ordering::SeqCst));
    assert!(call.await.unwrap().is_err());
    assert!(store.get_recipe("BLT").await.unwrap().is_none());
}

#[tokio::test]
async fn http_stop_lets_requests_finish_within_the_grace() {
    let store = SlowStore::new(Duration::from_millis(200));
    let server = start_slow(&config(ServerMode::Http), &store).await;
    let client = HttpClient::new(format!("http://{}", server.http_addr().unwrap()), API_KEY);

    let call = tokio::spawn(async move { client.add_recipe(&blt()).await });
    store.entered.notified().await;
    stop(server).await;

    call.await.unwrap().expect("the write completes during the grace period");
    assert!(!store.cancelled.load(Ordering::SeqCst));
    assert_eq!(store.get_recipe("BLT").await.unwrap(), Some(blt()));
}

#[tokio::test]
async fn http_stop_cancels_requests_outliving_the_grace() {
    let store = SlowStore::new(Duration::from_secs(60));
    let server = start_slow(&config(ServerMode::Http), &store).await;
    let client = HttpClient::new(format!("http://{}", server.http_addr().unwrap()), API_KEY);

    let call = tokio::spawn(async move { client.add_recipe(&blt()).await });
    store.entered.notified().await;

    // The grace is one second; the write would take a minute.
    tokio::time::timeout(Duration::from_secs(5), async {
        server.stop();
        server.wait().await
    })
    .await
    .expect("listeners stop once the grace runs out")
    .expect("listeners stop cleanly");

    assert!(store.cancelled.load(Ordering::SeqCst));
    assert!(call.await.unwrap().is_err());
    assert!(store.get_recipe("BLT").await.unwrap().is_none());
}

#[tokio::test]
async fn typed_clients_share_one_catalog() {
    let server = start(&config(ServerMode::Hybrid)).await;
    let http = HttpClient::new(format!("http://{}", server.http_addr().unwrap()), API_KEY);
    let grpc = GrpcClient::connect(format!("http://{}", server.grpc_addr().unwrap()), API_KEY)
        .await
        .unwrap();

    http.add_recipe(&blt()).await.unwrap();
    grpc.add_recipe(&recipebox::Recipe::new("Tomato Soup", ["Tomato", "Basil"]))
        .await
        .unwrap();

    assert_eq!(grpc.get_recipe("BLT").await.unwrap(), Some(blt()));
    let soup = http.get_recipe("Tomato Soup").await.unwrap().expect("escaped name");
    assert_eq!(soup.ingredients, vec!["Tomato", "Basil"]);

    assert_eq!(http.get_recipe("Nonexistent").await.unwrap(), None);
    assert_eq!(grpc.get_recipe("Nonexistent").await.unwrap(), None);

    let tomato = vec!["Tomato".to_string()];
    let names = |recipes: Vec<recipebox::Recipe>| -> Vec<String> {
        recipes.into_iter().map(|r| r.name).collect()
    };
    assert_eq!(names(http.find_recipes(&tomato).await.unwrap()), ["BLT", "Tomato Soup"]);
    assert_eq!(names(grpc.find_recipes(&tomato).await.unwrap()), ["BLT", "Tomato Soup"]);

    let both = vec!["Tomato".to_string(), "Basil".to_string()];
    assert_eq!(names(http.find_recipes(&both).await.unwrap()), ["Tomato Soup"]);

    stop(server).await;
}

#[tokio::test]
async fn typed_clients_surface_rejections() {
    let server = start(&config(ServerMode::Hybrid)).await;
    let http_addr = format!("http://{}", server.http_addr().unwrap());
    let grpc_addr = format!("http://{}", server.grpc_addr().unwrap());

    let err = HttpClient::new(&http_addr, "wrong").get_recipe("BLT").await.unwrap_err();
    assert!(
        matches!(err, ClientError::Status { status, .. } if status == 401),
        "{err}"
    );

    let err = GrpcClient::connect(&grpc_addr, "wrong")
        .await
        .unwrap()
        .find_recipes(&["Tomato".to_string()])
        .await
        .unwrap_err();
    assert!(
        matches!(&err, ClientError::Rpc(status) if status.code() == Code::Unauthenticated),
        "{err}"
    );

    let err = HttpClient::new(&http_addr, API_KEY).find_recipes(&[]).await.unwrap_err();
    assert!(
        matches!(err, ClientError::Status { status, .. } if status == 400),
        "{err}"
    );

    assert!(matches!(
        GrpcClient::connect(&grpc_addr, "bad\nkey").await,
        Err(ClientError::InvalidKey(_))
    ));

    stop(server).await;
}
