//! Service configuration, read from the environment.
//!
//! | variable | default |
//! |---|---|
//! | `PLANE_API_TOKEN` | required |
//! | `PLANE_URL` | `https://plane.loolootest.com` |
//! | `PLANE_API_URL` | value of `PLANE_URL` |
//! | `PLANE_WORKSPACE` | `aoc` |
//! | `GITEA_WEBHOOK_SECRET` | unset, signatures are not checked |
//! | `PLANE_TIMEOUT_SECS` | `5` |
//! | `PORT` | `8000` |

use std::fmt;
use std::time::Duration;

use anyhow::Context as _;
use secrecy::SecretString;

const DEFAULT_PLANE_URL: &str = "https://plane.loolootest.com";
const DEFAULT_WORKSPACE: &str = "aoc";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_PLANE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct Config {
    /// Base URL of the Plane web UI, as it appears in links in pull requests.
    pub plane_url: String,
    /// Base URL used for API calls.
    pub plane_api_url: String,
    pub workspace: String,
    pub plane_token: SecretString,
    pub webhook_secret: Option<SecretString>,
    /// Limit on each Plane API call. Events for a pull request wait on the
    /// previous one, so a stuck call must not hang forever.
    pub plane_timeout: Duration,
    pub port: u16,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("plane_url", &self.plane_url)
            .field("plane_api_url", &self.plane_api_url)
            .field("workspace", &self.workspace)
            .field("webhook_secret", &self.webhook_secret.is_some())
            .field("plane_timeout", &self.plane_timeout)
            .field("port", &self.port)
            .finish_non_exhaustive()
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Config> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    ///
    /// Empty values are treated like unset ones.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Config> {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let plane_url = normalize_url(
            "PLANE_URL",
            var("PLANE_URL").unwrap_or_else(|| DEFAULT_PLANE_URL.to_string()),
        )?;
        let plane_api_url = match var("PLANE_API_URL") {
            Some(url) => normalize_url("PLANE_API_URL", url)?,
            None => plane_url.clone(),
        };
        let workspace = var("PLANE_WORKSPACE").unwrap_or_else(|| DEFAULT_WORKSPACE.to_string());
        let plane_token = var("PLANE_API_TOKEN")
            .map(SecretString::from)
            .context("PLANE_API_TOKEN must be set")?;
        let webhook_secret = var("GITEA_WEBHOOK_SECRET").map(SecretString::from);
        let plane_timeout = match var("PLANE_TIMEOUT_SECS") {
            Some(secs) => {
                let secs = secs.trim().parse::<u64>().ok().filter(|s| *s > 0).with_context(|| {
                    format!("PLANE_TIMEOUT_SECS must be a positive number of seconds: {secs:?}")
                })?;
                Duration::from_secs(secs)
            }
            None => DEFAULT_PLANE_TIMEOUT,
        };
        let port = match var("PORT") {
            Some(port) => port
                .trim()
                .parse::<u16>()
                .with_context(|| format!("PORT is not a valid port number: {port:?}"))?,
            None => DEFAULT_PORT,
        };

        Ok(Config {
            plane_url,
            plane_api_url,
            workspace,
            plane_token,
            webhook_secret,
            plane_timeout,
            port,
        })
    }
}

fn normalize_url(name: &str, value: String) -> anyhow::Result<String> {
    let value = value.trim().trim_end_matches('/').to_string();
    url::Url::parse(&value).with_context(|| format!("{name} is not a valid URL: {value:?}"))?;
    Ok(value)
}
