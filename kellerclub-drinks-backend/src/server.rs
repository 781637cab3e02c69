use std::convert::Infallible;
use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use futures_util::pin_mut;
use headers::{ContentType, HeaderMapExt as _};
use http::request::Parts;
use http::{Request, StatusCode};
use http_body_util::{BodyExt as _, Full};
use hyper::body::Incoming;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;
use tracing_subscriber::{EnvFilter, Layer as _};

use crate::error::AppError;
use crate::handlers::AppState;
use crate::router::route;

const DEFAULT_LOG_LEVEL: &str =
    "info,kellerclub_drinks_backend=debug,kellerclub_drinks_database=debug,hyper=info";

/// Logs to stdout, filtered by `RUST_LOG` if set.
pub fn setup_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer().with_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into()),
            ),
        )
        .init();
}

/// Routes and handles one request whose body was already read.
///
/// Errors the handler could not turn into a page are logged and answered
/// with a vague `500`.
pub fn dispatch(state: &AppState, parts: &Parts, body: &[u8]) -> http::Response<Full<Bytes>> {
    let handler = route(parts, body);
    debug!(method = %parts.method, path = parts.uri.path(), ?handler, "dispatching");
    match handler.handle(state) {
        Ok(response) => response.serve(&state.settings),
        Err(handler_error) => {
            error!(
                method = %parts.method,
                path = parts.uri.path(),
                "request failed: {handler_error}"
            );
            internal_server_error()
        }
    }
}

fn internal_server_error() -> http::Response<Full<Bytes>> {
    let mut response = http::Response::new(Full::new(Bytes::from_static(
        b"Internal Server Error, consult logs",
    )));
    *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
    response.headers_mut().typed_insert(ContentType::text_utf8());
    response
}

async fn handle_request(
    state: AppState,
    request: Request<Incoming>,
) -> Result<http::Response<Full<Bytes>>, Infallible> {
    let (parts, body) = request.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(hyper_error) => {
            warn!("failed to read request body: {hyper_error}");
            let mut response = http::Response::new(Full::new(Bytes::new()));
            *response.status_mut() = StatusCode::BAD_REQUEST;
            return Ok(response);
        }
    };
    // handlers and the datastore block
    let response = tokio::task::spawn_blocking(move || dispatch(&state, &parts, &body)).await;
    Ok(response.unwrap_or_else(|join_error| {
        error!("request handler panicked: {join_error}");
        internal_server_error()
    }))
}

async fn serve_connection(
    socket: TcpStream,
    state: AppState,
    shutdown_tx: Arc<watch::Sender<()>>,
) {
    let service = hyper::service::service_fn(move |request: Request<Incoming>| {
        handle_request(state.clone(), request)
    });
    let builder = hyper_util::server::conn::auto::Builder::new(TokioExecutor::new());
    let connection = builder.serve_connection(TokioIo::new(socket), service);
    pin_mut!(connection);

    let mut shutting_down = false;
    loop {
        select! {
            connection_result = connection.as_mut() => {
                if let Err(connection_error) = connection_result {
                    debug!("failed to serve connection: {connection_error:#}");
                }
                break;
            }
            () = shutdown_tx.closed(), if !shutting_down => {
                shutting_down = true;
                connection.as_mut().graceful_shutdown();
            }
        }
    }
}

/// Accepts connections on `listener` until `shutdown` completes, then waits
/// for the open connections to finish.
pub async fn serve(
    listener: TcpListener,
    state: AppState,
    shutdown: impl Future<Output = ()>,
) -> Result<(), AppError> {
    // connections are told to shut down once every receiver is gone
    let (shutdown_tx, shutdown_rx) = watch::channel(());
    let shutdown_tx = Arc::new(shutdown_tx);
    // and the server waits until every connection dropped its receiver
    let (closed_tx, closed_rx) = watch::channel(());

    info!(address = %listener.local_addr()?, "listening");
    pin_mut!(shutdown);

    loop {
        select! {
            accept = listener.accept() => {
                let (socket, remote_addr) = match accept {
                    Ok(accepted) => accepted,
                    Err(accept_error) => {
                        warn!("failed to accept connection: {accept_error}");
                        continue;
                    }
                };
                debug!(%remote_addr, "accepted connection");
                let state = state.clone();
                let shutdown_tx = Arc::clone(&shutdown_tx);
                let closed_rx = closed_rx.clone();
                tokio::spawn(async move {
                    serve_connection(socket, state, shutdown_tx).await;
                    drop(closed_rx);
                });
            }
            () = shutdown.as_mut() => {
                info!("shutting down");
                break;
            }
        }
    }

    drop(listener);
    drop(shutdown_rx);
    drop(closed_rx);
    closed_tx.closed().await;
    Ok(())
}

/// Serves on the configured address until Ctrl+C or `SIGTERM`.
pub async fn run_server(state: AppState) -> Result<(), AppError> {
    let listener = TcpListener::bind(state.settings.listen).await?;
    serve(listener, state, shutdown_signal()).await
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(signal_error) = tokio::signal::ctrl_c().await {
            error!("failed to install Ctrl+C handler: {signal_error}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut terminate) => {
                terminate.recv().await;
            }
            Err(signal_error) => {
                error!("failed to install SIGTERM handler: {signal_error}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
