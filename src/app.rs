use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, Response},
    routing::get,
    Router,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{field, Span};

use crate::state::AppState;
use crate::{auth, users};

pub fn build_app(state: AppState) -> Router {
    let routes = Router::new()
        .merge(auth::router())
        .merge(users::router())
        .route("/health", get(|| async { "ok" }));

    let http_trace = TraceLayer::new_for_http()
        .make_span_with(request_span)
        .on_response(record_status);

    routes
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(http_trace)
}

fn request_span(req: &Request<Body>) -> Span {
    tracing::info_span!(
        "http_request",
        method = %req.method(),
        path = %req.uri().path(),
        status = field::Empty,
    )
}

fn record_status(res: &Response<Body>, latency: Duration, span: &Span) {
    let status = res.status();
    span.record("status", field::display(status));
    let latency_ms = latency.as_millis() as u64;
    if status.is_server_error() {
        tracing::error!(%status, latency_ms, "request failed");
    } else {
        tracing::info!(%status, latency_ms, "request served");
    }
}

/// Serves until SIGINT or SIGTERM, then lets in-flight requests finish.
pub async fn serve(app: Router, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "keygate listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("keygate stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "cannot listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "cannot listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
