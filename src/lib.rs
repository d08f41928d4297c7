//! Bridges Gitea pull requests to Plane issues.
//!
//! Every issue referenced by a pull request (by link or by identifier) gets a
//! comment when the pull request is opened, edited, closed or merged. Edits
//! only notify references that were not notified before.

use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    http::Request,
    routing::{get, post},
};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub mod comment;
pub mod config;
pub mod dispatch;
pub mod gitea;
pub mod handlers;
pub mod history;
pub mod plane;
pub mod policy;
pub mod references;
mod utils;

#[cfg(test)]
mod tests;

/// Builds the service context from the configuration.
pub fn context_from_config(config: &config::Config) -> anyhow::Result<handlers::Context> {
    let tracker = plane::PlaneClient::new(
        config.plane_token.clone(),
        config.plane_api_url.clone(),
        config.plane_timeout,
    )?;
    Ok(handlers::Context {
        tracker: Arc::new(tracker),
        workspace: config.workspace.clone(),
        references: references::ReferenceExtractor::new(&config.plane_url, &config.workspace)?,
        history: history::NotificationHistory::new(),
        webhook_secret: config.webhook_secret.clone(),
    })
}

pub fn app(ctx: Arc<handlers::Context>) -> Router {
    Router::new()
        .route("/", get(|| async { Json(serde_json::json!({ "status": "ok" })) }))
        .route("/gitea-webhook", post(gitea::webhook::webhook))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                    let request_id = req
                        .headers()
                        .get("x-request-id")
                        .and_then(|id| id.to_str().ok())
                        .unwrap_or_default();
                    tracing::info_span!(
                        "request",
                        method = %req.method(),
                        uri = %req.uri(),
                        request_id,
                    )
                }))
                .layer(PropagateRequestIdLayer::x_request_id())
                .layer(CatchPanicLayer::new()),
        )
        .with_state(ctx)
}
