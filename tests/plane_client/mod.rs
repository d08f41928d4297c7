//! `PlaneClient` tests.
//!
//! These tests exercise the behavior of `PlaneClient` against a local HTTP
//! server that stands in for the Plane API. Each test registers handlers
//! with a [`TestBuilder`], calls `build_client` to get a client
//! pointed at that server, executes some action, and validates both the
//! result and the requests that were made.

use super::common::{Events, HttpServer, HttpServerHandle, Method::*, Response, TestBuilder};
use gitea_plane_bridge::plane::{IssueTracker, PlaneClient, ResolvedIssue, TrackerError};
use gitea_plane_bridge::references::IssueId;
use secrecy::SecretString;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const TOKEN: &str = "plane_api_test_token";

/// A context used for running a test.
struct PlaneTestCtx {
    plane: PlaneClient,
    events: Events,
    #[allow(dead_code)] // held for drop
    server: HttpServerHandle,
}

impl TestBuilder {
    fn build_client(self) -> PlaneTestCtx {
        self.maybe_enable_logging();
        let events = Events::new();
        let server = HttpServer::new(self.api_handlers, events.clone());
        let plane = PlaneClient::new(
            SecretString::from(TOKEN.to_string()),
            format!("http://{}/", server.addr),
            Duration::from_secs(5),
        )
        .unwrap();
        PlaneTestCtx {
            plane,
            events,
            server,
        }
    }
}

#[tokio::test]
async fn resolve_issue() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/issues/{issue}/", |req| {
            assert_eq!(req.components["issue"], "WEB-28");
            Response::new().json(serde_json::json!({
                "id": "6f1d0b1e-issue",
                "project": "0c5e5a7a-project",
                "sequence_id": 28,
                "name": "Login page is slow"
            }))
        })
        .build_client();

    let resolved = ctx
        .plane
        .resolve_issue("aoc", &IssueId::new("WEB-28"))
        .await
        .unwrap();
    assert_eq!(
        resolved,
        ResolvedIssue {
            issue_uuid: "6f1d0b1e-issue".to_string(),
            project_id: "0c5e5a7a-project".to_string(),
        }
    );
    ctx.events
        .assert_eq(&[(GET, "/api/v1/workspaces/aoc/issues/WEB-28/")]);
}

#[tokio::test]
async fn resolve_unknown_issue() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/issues/{issue}/", |_req| {
            Response::new()
                .code(404)
                .json(serde_json::json!({"error": "Issue not found"}))
        })
        .build_client();

    let err = ctx
        .plane
        .resolve_issue("aoc", &IssueId::new("WEB-404"))
        .await
        .unwrap_err();
    assert!(matches!(err, TrackerError::NotFound), "{err:?}");
}

#[tokio::test]
async fn resolve_issue_without_project() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/issues/{issue}/", |_req| {
            Response::new().json(serde_json::json!({"id": "6f1d0b1e-issue", "project": null}))
        })
        .build_client();

    let err = ctx
        .plane
        .resolve_issue("aoc", &IssueId::new("WEB-28"))
        .await
        .unwrap_err();
    assert!(
        matches!(err, TrackerError::IncompleteIssue("project")),
        "{err:?}"
    );
}

#[tokio::test]
async fn resolve_server_error() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/issues/{issue}/", |_req| {
            Response::new().code(500).body(b"database unavailable")
        })
        .build_client();

    let err = ctx
        .plane
        .resolve_issue("aoc", &IssueId::new("WEB-28"))
        .await
        .unwrap_err();
    match err {
        TrackerError::Status { status, body } => {
            assert_eq!(status.as_u16(), 500);
            assert_eq!(body, "database unavailable");
        }
        e => panic!("unexpected error {e:?}"),
    }
}

#[tokio::test]
async fn requests_carry_api_key() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let seen2 = seen.clone();
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/issues/{issue}/", move |req| {
            seen2
                .lock()
                .unwrap()
                .push(req.header("X-API-Key").map(str::to_string));
            Response::new().json(serde_json::json!({"id": "i", "project": "p"}))
        })
        .build_client();

    ctx.plane
        .resolve_issue("aoc", &IssueId::new("WEB-1"))
        .await
        .unwrap();
    assert_eq!(*seen.lock().unwrap(), vec![Some(TOKEN.to_string())]);
}

#[tokio::test]
async fn post_comment() {
    let bodies = Arc::new(Mutex::new(Vec::new()));
    let bodies2 = bodies.clone();
    let ctx = TestBuilder::default()
        .api_handler(
            POST,
            "api/v1/workspaces/aoc/projects/{project}/issues/{issue}/comments/",
            move |req| {
                assert_eq!(req.components["project"], "proj-1");
                assert_eq!(req.components["issue"], "issue-1");
                bodies2.lock().unwrap().push(req.json());
                Response::new()
                    .code(201)
                    .json(serde_json::json!({"id": "comment-1"}))
            },
        )
        .build_client();

    ctx.plane
        .post_comment("aoc", "proj-1", "issue-1", "<p>hello</p>")
        .await
        .unwrap();
    assert_eq!(
        *bodies.lock().unwrap(),
        vec![serde_json::json!({"comment_html": "<p>hello</p>"})]
    );
    ctx.events.assert_eq(&[(
        POST,
        "/api/v1/workspaces/aoc/projects/proj-1/issues/issue-1/comments/",
    )]);
}

#[tokio::test]
async fn post_comment_requires_created() {
    let ctx = TestBuilder::default()
        .api_handler(
            POST,
            "api/v1/workspaces/aoc/projects/{project}/issues/{issue}/comments/",
            |_req| Response::new().json(serde_json::json!({"id": "comment-1"})),
        )
        .build_client();

    let err = ctx
        .plane
        .post_comment("aoc", "proj-1", "issue-1", "<p>hello</p>")
        .await
        .unwrap_err();
    assert!(
        matches!(&err, TrackerError::Status { status, .. } if status.as_u16() == 200),
        "{err:?}"
    );
}

#[tokio::test]
async fn post_comment_forbidden() {
    let ctx = TestBuilder::default()
        .api_handler(
            POST,
            "api/v1/workspaces/aoc/projects/{project}/issues/{issue}/comments/",
            |_req| {
                Response::new()
                    .code(403)
                    .json(serde_json::json!({"detail": "forbidden"}))
            },
        )
        .build_client();

    let err = ctx
        .plane
        .post_comment("aoc", "proj-1", "issue-1", "<p>hello</p>")
        .await
        .unwrap_err();
    assert!(
        err.to_string().starts_with("unexpected response 403 Forbidden"),
        "{err}"
    );
}

#[tokio::test]
async fn list_projects() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/projects/", |_req| {
            Response::new().json(serde_json::json!({
                "results": [{"id": "proj-1", "identifier": "WEB", "name": "Website"}]
            }))
        })
        .build_client();

    let projects = ctx.plane.projects("aoc").await.unwrap();
    assert_eq!(projects["results"][0]["identifier"], "WEB");
    ctx.events
        .assert_eq(&[(GET, "/api/v1/workspaces/aoc/projects/")]);
}

#[tokio::test]
async fn list_projects_unauthorized() {
    let ctx = TestBuilder::default()
        .api_handler(GET, "api/v1/workspaces/aoc/projects/", |_req| {
            Response::new()
                .code(401)
                .json(serde_json::json!({"detail": "Invalid API key"}))
        })
        .build_client();

    let err = ctx.plane.projects("aoc").await.unwrap_err();
    assert!(
        matches!(&err, TrackerError::Status { status, .. } if status.as_u16() == 401),
        "{err:?}"
    );
}

#[tokio::test]
async fn unresponsive_server_times_out() {
    // Connections are queued by the OS but never read from or answered.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let plane = PlaneClient::new(
        SecretString::from(TOKEN.to_string()),
        format!("http://{}", listener.local_addr().unwrap()),
        Duration::from_millis(300),
    )
    .unwrap();

    let started = Instant::now();
    let err = tokio::time::timeout(
        Duration::from_secs(5),
        plane.resolve_issue("aoc", &IssueId::new("WEB-1")),
    )
    .await
    .expect("the client timeout should fire first")
    .unwrap_err();
    assert!(matches!(err, TrackerError::Request(_)), "{err:?}");
    assert!(started.elapsed() < Duration::from_secs(5));
    drop(listener);
}
