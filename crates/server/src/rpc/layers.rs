//! Call pipeline for the gRPC listener: a tracer around every call and an
//! API key check in front of the service.

use crate::middleware::API_KEY_HEADER;
use crate::state::ApiKey;
use futures::future::BoxFuture;
use std::future::Future;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tonic::codegen::http;
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Code, Request, Status};
use tower::{Layer, Service};

/// Reject a call unless its first `x-api-key` value equals `key`.
pub fn authorize(metadata: &MetadataMap, key: &ApiKey) -> Result<(), Status> {
    let authorized = metadata
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|presented| key.matches(presented));

    if authorized {
        Ok(())
    } else {
        Err(Status::unauthenticated("missing or invalid API key"))
    }
}

/// API key check for the gRPC server, run before the service is invoked.
#[derive(Debug, Clone)]
pub struct ApiKeyInterceptor {
    key: ApiKey,
}

impl ApiKeyInterceptor {
    pub fn new(key: ApiKey) -> Self {
        Self { key }
    }
}

impl Interceptor for ApiKeyInterceptor {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        authorize(request.metadata(), &self.key)?;
        Ok(request)
    }
}

fn log_call(operation: &str, code: Code, elapsed: Duration) {
    tracing::info!(
        operation = %operation,
        status = ?code,
        duration_us = elapsed.as_micros() as u64,
        "RPC completed"
    );
}

/// Time `call` and log it under `operation`, whatever its outcome.
pub async fn traced<T, F>(operation: &str, call: F) -> Result<T, Status>
where
    F: Future<Output = Result<T, Status>>,
{
    let start = Instant::now();
    let result = call.await;
    let code = match &result {
        Ok(_) => Code::Ok,
        Err(status) => status.code(),
    };
    log_call(operation, code, start.elapsed());
    result
}

/// Tower layer installing [`RpcTrace`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RpcTraceLayer;

impl<S> Layer<S> for RpcTraceLayer {
    type Service = RpcTrace<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RpcTrace { inner }
    }
}

/// Logs each gRPC call's full method name and duration.
///
/// Sits outside authentication, so rejected calls are traced too.
#[derive(Debug, Clone)]
pub struct RpcTrace<S> {
    inner: S,
}

impl<S, B, R> Service<http::Request<B>> for RpcTrace<S>
where
    S: Service<http::Request<B>, Response = http::Response<R>>,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: http::Request<B>) -> Self::Future {
        let operation = request.uri().path().to_string();
        let start = Instant::now();
        let call = self.inner.call(request);

        Box::pin(async move {
            let result = call.await;
            // Failures are sent trailers-only, so their status is in the
            // headers. A successful call carries its status in trailers.
            let code = match &result {
                Ok(response) => response
                    .headers()
                    .get("grpc-status")
                    .map(|v| Code::from_bytes(v.as_bytes()))
                    .unwrap_or(Code::Ok),
                Err(_) => Code::Unknown,
            };
            log_call(&operation, code, start.elapsed());
            result
        })
    }
}
