//! Connection serving with a bounded shutdown.
//!
//! Every accepted connection, and every HTTP/2 stream hyper spawns for one,
//! runs on the listener's [`TaskTracker`]. On shutdown the listener stops
//! accepting and asks each connection to finish gracefully. Whatever is still
//! running when the grace period ends is cancelled, which drops the request
//! futures it owns, and [`serve_connections`] only returns once all of it is
//! gone.

use crate::error::ServerError;
use crate::shutdown::Shutdown;
use hyper::body::{Body, Incoming};
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::future::Future;
use std::io;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::task::TaskTracker;
use tower::Service;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Runs hyper's background work on the listener's tracker, so it is waited
/// for and cancelled together with the connections.
#[derive(Clone)]
struct TrackedExecutor {
    tracker: TaskTracker,
    abort: Shutdown,
}

impl<F> hyper::rt::Executor<F> for TrackedExecutor
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    fn execute(&self, future: F) {
        let abort = self.abort.clone();
        self.tracker.spawn(async move {
            tokio::select! {
                _ = future => {}
                _ = abort.wait() => {}
            }
        });
    }
}

/// Serve `service` on every connection accepted from `listener` until
/// `shutdown` fires.
///
/// Open connections then get `grace` to finish the requests they carry;
/// anything still running afterwards is cancelled. A zero grace cancels
/// in-flight requests at once.
///
/// Fails if the listener stops accepting connections for a reason other
/// than a single aborted connection.
pub async fn serve_connections<S, B>(
    name: &'static str,
    listener: TcpListener,
    service: S,
    shutdown: Shutdown,
    grace: Duration,
) -> anyhow::Result<()>
where
    S: Service<hyper::Request<Incoming>, Response = hyper::Response<B>> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Into<BoxError>,
    B: Body + Send + 'static,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    let tracker = TaskTracker::new();
    let abort = Shutdown::new();
    let executor = TrackedExecutor {
        tracker: tracker.clone(),
        abort: abort.clone(),
    };

    let accepted = loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(accepted) => accepted,
                Err(e) if is_connection_error(&e) => continue,
                Err(e) => break Err(e),
            },
            _ = shutdown.wait() => break Ok(()),
        };

        let service = TowerToHyperService::new(service.clone());
        let executor = executor.clone();
        let draining = shutdown.clone();
        let abort = abort.clone();

        tracker.spawn(async move {
            let builder = auto::Builder::new(executor);
            let connection = builder.serve_connection(TokioIo::new(stream), service);
            tokio::pin!(connection);

            let result = tokio::select! {
                result = connection.as_mut() => result,
                _ = abort.wait() => return,
                _ = draining.wait() => {
                    connection.as_mut().graceful_shutdown();
                    tokio::select! {
                        result = connection.as_mut() => result,
                        _ = abort.wait() => return,
                    }
                }
            };

            if let Err(e) = result {
                tracing::debug!(listener = name, %peer, error = %e, "Connection closed with an error");
            }
        });
    };

    drop(listener);
    tracker.close();

    if let Err(e) = accepted {
        abort.trigger();
        tracker.wait().await;
        return Err(ServerError::listener(name, "stopped accepting connections", e).into());
    }

    if tokio::time::timeout(grace, tracker.wait()).await.is_err() {
        tracing::warn!(
            listener = name,
            grace_ms = grace.as_millis() as u64,
            in_flight = tracker.len(),
            "Shutdown grace period elapsed, cancelling in-flight requests"
        );
        abort.trigger();
        tracker.wait().await;
    }

    Ok(())
}

fn is_connection_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
    )
}
