use std::{fmt, sync::Arc};

use anyhow::Context as _;
use axum::{
    Json,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
};
use bytes::Bytes;
use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use tracing::debug;

use super::PullRequestPayload;
use crate::handlers::{self, HandleOutcome};

/// The name of a webhook event, from the `X-Gitea-Event` header.
#[derive(Debug, PartialEq, Eq)]
pub enum EventName {
    /// Pull request activity.
    ///
    /// <https://docs.gitea.com/usage/webhooks#event-information>
    PullRequest,
    /// All other unhandled webhooks.
    Other(String),
}

impl std::str::FromStr for EventName {
    type Err = std::convert::Infallible;
    fn from_str(s: &str) -> Result<EventName, Self::Err> {
        Ok(match s {
            "pull_request" => EventName::PullRequest,
            other => EventName::Other(other.to_string()),
        })
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EventName::PullRequest => f.write_str("pull_request"),
            EventName::Other(name) => f.write_str(name),
        }
    }
}

pub fn deserialize_payload<T: serde::de::DeserializeOwned>(v: &str) -> anyhow::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(v);
    let res: Result<T, _> = serde_path_to_error::deserialize(&mut deserializer);
    match res {
        Ok(r) => Ok(r),
        Err(e) => {
            let ctx = format!("at {}", e.path());
            Err(e.into_inner()).context(ctx)
        }
    }
}

pub async fn webhook(
    headers: HeaderMap,
    State(ctx): State<Arc<handlers::Context>>,
    body: Bytes,
) -> axum::response::Response {
    let event = match headers.get("X-Gitea-Event") {
        None => None,
        Some(ev) => {
            let Ok(ev) = ev.to_str() else {
                tracing::error!("X-Gitea-Event header must be UTF-8 encoded");
                return (
                    StatusCode::BAD_REQUEST,
                    "X-Gitea-Event header must be UTF-8 encoded",
                )
                    .into_response();
            };
            let Ok(event) = ev.parse::<EventName>();
            Some(event)
        }
    };

    debug!("event={event:?}");

    if let Some(secret) = &ctx.webhook_secret {
        let Some(sig) = headers.get("X-Gitea-Signature") else {
            tracing::error!("X-Gitea-Signature header must be set");
            return (StatusCode::FORBIDDEN, "X-Gitea-Signature header must be set")
                .into_response();
        };
        let Ok(signature) = sig.to_str() else {
            tracing::error!("X-Gitea-Signature header must be UTF-8 encoded");
            return (
                StatusCode::BAD_REQUEST,
                "X-Gitea-Signature header must be UTF-8 encoded",
            )
                .into_response();
        };
        if let Err(err) = check_payload_signed(secret, signature, &body) {
            tracing::error!("check_payload_signed: {err}");
            return (StatusCode::FORBIDDEN, "Wrong signature").into_response();
        }
    }

    if let Some(event @ EventName::Other(_)) = event {
        debug!("ignoring {event} event");
        return Json(HandleOutcome::success(format!("ignored {event} event"))).into_response();
    }

    let Ok(payload) = std::str::from_utf8(&body) else {
        tracing::error!("payload not utf-8");
        return (StatusCode::BAD_REQUEST, "Payload must be UTF-8").into_response();
    };

    let payload = match deserialize_payload::<PullRequestPayload>(payload) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::error!("failed to deserialize pull request payload: {err:?}");
            return (StatusCode::BAD_REQUEST, format!("Invalid payload: {err:#}")).into_response();
        }
    };

    // Detached so that a dropped connection cannot stop the history update
    // that follows posting the comments.
    let task = tokio::spawn(async move { handlers::handle(&ctx, payload).await });
    match task.await {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => {
            tracing::error!("webhook handler task failed: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(HandleOutcome::error(format!("Unexpected error: {e}"))),
            )
                .into_response()
        }
    }
}

#[derive(Debug)]
pub struct SignedPayloadError;

impl fmt::Display for SignedPayloadError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "failed to validate payload")
    }
}

impl std::error::Error for SignedPayloadError {}

/// Checks a hex encoded HMAC-SHA256 of `payload`, as sent by Gitea.
pub fn check_payload_signed(
    secret: &SecretString,
    signature: &str,
    payload: &[u8],
) -> Result<(), SignedPayloadError> {
    let signature = signature.trim();
    let signature = signature.strip_prefix("sha256=").unwrap_or(signature);
    let signature = match hex::decode(signature) {
        Ok(e) => e,
        Err(e) => {
            tracing::trace!("hex decode failed for {signature:?}: {e:?}");
            return Err(SignedPayloadError);
        }
    };

    let mut mac = Hmac::<Sha256>::new_from_slice(secret.expose_secret().as_bytes())
        .map_err(|_| SignedPayloadError)?;
    mac.update(payload);
    mac.verify_slice(&signature).map_err(|_| SignedPayloadError)
}
