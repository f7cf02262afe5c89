//! Listener supervision.
//!
//! [`HybridServer`] owns every listener the configured [`ServerMode`] needs,
//! runs each as its own task and shares one [`Shutdown`] between them.

use crate::config::{ServerConfig, ServerMode};
use crate::error::ServerError;
use crate::gateway::{build_gateway_router, Gateway};
use crate::listener::serve_connections;
use crate::rpc::{ApiKeyInterceptor, RecipeRpc, RpcTraceLayer};
use crate::server::build_router;
use crate::shutdown::Shutdown;
use crate::state::{ApiKey, ServerState};
use anyhow::Context;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use store::RecipeStore;
use tokio::net::TcpListener;
use tokio::task::{Id, JoinSet};
use tower::ServiceBuilder;

const HTTP: &str = "http";
const GATEWAY: &str = "http-gateway";
const GRPC: &str = "grpc";

/// Running set of listeners.
pub struct HybridServer {
    shutdown: Shutdown,
    tasks: JoinSet<(&'static str, anyhow::Result<()>)>,
    names: HashMap<Id, &'static str>,
    http_addr: Option<SocketAddr>,
    grpc_addr: Option<SocketAddr>,
}

impl HybridServer {
    /// Bind and start the listeners for `config.mode`.
    ///
    /// Every bind is attempted before anything is served; if any of them
    /// fails, all failures are reported together and nothing is started.
    /// An empty API key is refused, since it would let through any caller
    /// sending an empty key.
    pub async fn start(config: &ServerConfig, store: Arc<dyn RecipeStore>) -> anyhow::Result<Self> {
        if config.api_key.is_empty() {
            return Err(ServerError::Config("no API key configured".to_string()).into());
        }

        let (wants_http, wants_grpc) = match config.mode {
            ServerMode::Http => (true, false),
            ServerMode::Grpc => (false, true),
            ServerMode::Hybrid => (true, true),
        };

        let (http, grpc) = tokio::join!(
            bind_if(wants_http, HTTP, config.http_addr()),
            bind_if(wants_grpc, GRPC, config.grpc_addr()),
        );

        let failures: Vec<String> = [&http, &grpc]
            .into_iter()
            .filter_map(|bound| bound.as_ref().err().map(|e| format!("{e:#}")))
            .collect();
        if !failures.is_empty() {
            anyhow::bail!("failed to start listeners: {}", failures.join("; "));
        }
        let (http, grpc) = (http?, grpc?);

        let mut server = Self {
            shutdown: Shutdown::new(),
            tasks: JoinSet::new(),
            names: HashMap::new(),
            http_addr: None,
            grpc_addr: None,
        };

        let api_key = ApiKey::new(config.api_key.as_str());
        let rpc = RecipeRpc::new(store.clone());

        if let Some(listener) = grpc {
            server.grpc_addr = Some(listener.local_addr()?);
            let shutdown = server.shutdown.clone();
            let drain = config.grpc_drain();
            let (rpc, api_key) = (rpc.clone(), api_key.clone());
            server.spawn(GRPC, async move {
                serve_grpc(listener, rpc, api_key, shutdown, drain).await
            });
        }

        if let Some(listener) = http {
            server.http_addr = Some(listener.local_addr()?);
            let (name, router) = match config.mode {
                ServerMode::Hybrid => {
                    let gateway = Arc::new(Gateway::new(rpc, api_key));
                    (GATEWAY, build_gateway_router(gateway, config.timeout()))
                }
                _ => {
                    let state = Arc::new(ServerState::new(config.clone(), store));
                    (HTTP, build_router(state))
                }
            };
            let shutdown = server.shutdown.clone();
            let grace = config.shutdown_grace();
            server.spawn(name, async move {
                serve_connections(name, listener, router, shutdown, grace).await
            });
        }

        tracing::info!(
            mode = ?config.mode,
            http_addr = ?server.http_addr,
            grpc_addr = ?server.grpc_addr,
            "Listeners started"
        );

        Ok(server)
    }

    fn spawn<F>(&mut self, name: &'static str, listener: F)
    where
        F: std::future::Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let handle = self.tasks.spawn(async move { (name, listener.await) });
        self.names.insert(handle.id(), name);
    }

    /// Address of the HTTP listener (native or gateway), if one is running.
    pub fn http_addr(&self) -> Option<SocketAddr> {
        self.http_addr
    }

    pub fn grpc_addr(&self) -> Option<SocketAddr> {
        self.grpc_addr
    }

    /// Ask every listener to stop.
    pub fn stop(&self) {
        self.shutdown.trigger();
    }

    /// Wait for the next listener to exit and log how it ended.
    ///
    /// A listener that ends before [`stop`](Self::stop) was called is
    /// reported as a failure even when it returned cleanly. Returns `None`
    /// once every listener has exited. The others keep serving.
    ///
    /// Cancel safe: dropping the future before it resolves loses no exit.
    pub async fn next_exit(&mut self) -> Option<(&'static str, anyhow::Result<()>)> {
        let (name, result) = match self.tasks.join_next_with_id().await? {
            Ok((_, exit)) => exit,
            Err(e) => {
                let name = self.names.get(&e.id()).copied().unwrap_or("unknown");
                let cause = if e.is_panic() { "panicked" } else { "was cancelled" };
                (name, Err(ServerError::Internal(format!("{name} listener task {cause}")).into()))
            }
        };

        let result = match result {
            Ok(()) if !self.shutdown.is_triggered() => {
                Err(anyhow::anyhow!("{name} listener exited before shutdown"))
            }
            other => other,
        };

        match &result {
            Ok(()) => tracing::info!(listener = name, "Listener stopped"),
            Err(e) => tracing::error!(listener = name, error = %format!("{e:#}"), "Listener failed"),
        }
        Some((name, result))
    }

    /// Wait for every listener to exit.
    ///
    /// Returns an error naming each listener that failed or panicked. One
    /// listener failing does not stop the others; call [`stop`](Self::stop)
    /// to end them.
    pub async fn wait(mut self) -> anyhow::Result<()> {
        let mut failures = Vec::new();
        while let Some((name, result)) = self.next_exit().await {
            if let Err(e) = result {
                failures.push(format!("{name}: {e:#}"));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            anyhow::bail!("listeners failed: {}", failures.join("; "))
        }
    }
}

async fn bind_if(
    wanted: bool,
    name: &'static str,
    addr: anyhow::Result<SocketAddr>,
) -> anyhow::Result<Option<TcpListener>> {
    if !wanted {
        return Ok(None);
    }
    let addr = addr.with_context(|| format!("{name} listener has an invalid address"))?;
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| ServerError::listener(name, format!("could not bind {addr}"), e))?;
    Ok(Some(listener))
}

/// The tracer sits outside the API key check, so rejected calls are traced.
async fn serve_grpc(
    listener: TcpListener,
    rpc: RecipeRpc,
    api_key: ApiKey,
    shutdown: Shutdown,
    drain: Duration,
) -> anyhow::Result<()> {
    let service = ServiceBuilder::new()
        .layer(RpcTraceLayer)
        .layer(tonic::service::interceptor(ApiKeyInterceptor::new(api_key)))
        .service(rpc.into_server());

    serve_connections(GRPC, listener, service, shutdown, drain).await
}
