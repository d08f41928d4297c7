use std::process::ExitCode;

use clap::{Parser, Subcommand};
use gitea_plane_bridge::config::Config;
use gitea_plane_bridge::plane::{IssueTracker, PlaneClient, TrackerError};
use gitea_plane_bridge::references::IssueId;
use reqwest::StatusCode;

/// Maintenance commands for the Plane side of the bridge.
///
/// Reads the same environment variables as the server.
#[derive(Parser, Debug)]
struct Opt {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Checks that the API token can list the projects of the workspace.
    CheckToken,
    /// Posts a comment on one issue.
    Comment {
        /// Issue identifier, like `WEB-28`.
        issue: String,
        /// Comment text (HTML).
        text: String,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt::init();

    let opt = Opt::parse();
    let config = Config::from_env()?;
    let plane = PlaneClient::new(
        config.plane_token.clone(),
        config.plane_api_url.clone(),
        config.plane_timeout,
    )?;

    match opt.command {
        Command::CheckToken => check_token(&plane, &config.workspace).await,
        Command::Comment { issue, text } => {
            let issue = IssueId::new(issue);
            let resolved = plane.resolve_issue(&config.workspace, &issue).await?;
            println!("Issue UUID: {}", resolved.issue_uuid);
            println!("Project ID: {}", resolved.project_id);
            plane
                .post_comment(
                    &config.workspace,
                    &resolved.project_id,
                    &resolved.issue_uuid,
                    &text,
                )
                .await?;
            println!("Comment posted to {issue}");
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn check_token(plane: &PlaneClient, workspace: &str) -> anyhow::Result<ExitCode> {
    match plane.projects(workspace).await {
        Ok(projects) => {
            println!("Token is valid for workspace `{workspace}`.");
            println!("{}", serde_json::to_string_pretty(&projects)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(TrackerError::Status { status, .. }) if status == StatusCode::UNAUTHORIZED => {
            eprintln!("Unauthorized. Check your token.");
            Ok(ExitCode::FAILURE)
        }
        Err(TrackerError::NotFound) => {
            eprintln!("Not found. Check the workspace slug `{workspace}`.");
            Ok(ExitCode::FAILURE)
        }
        Err(e) => {
            eprintln!("Something went wrong: {e}");
            Ok(ExitCode::FAILURE)
        }
    }
}
