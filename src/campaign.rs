//! Remote preference bundles ("campaigns").
//!
//! A campaign server hands out a versioned preference bundle. The agent
//! fetches it once in the background and offers it to the version gate.
//! There is no retry: a network or parse failure is logged and the local
//! preferences stay as they were.

use crate::preferences::{BundleOutcome, PreferenceBundle, PreferenceError, Preferences};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Default connect timeout for campaign fetches.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

/// Overall request timeout, so a stalled body cannot hang the task forever.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Campaign fetch configuration.
#[derive(Debug, Clone)]
pub struct CampaignConfig {
    /// URL of the bundle document
    pub url: String,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl CampaignConfig {
    /// Create a configuration with the default one-second connect timeout.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// HTTP client for campaign bundles.
pub struct CampaignClient {
    config: CampaignConfig,
    client: reqwest::Client,
}

impl CampaignClient {
    /// Create a new campaign client.
    pub fn new(config: CampaignConfig) -> Result<Self, PreferenceError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| PreferenceError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Fetch and parse the bundle. Single attempt.
    pub async fn fetch_bundle(&self) -> Result<PreferenceBundle, PreferenceError> {
        let response = self
            .client
            .get(&self.config.url)
            .send()
            .await
            .map_err(|e| PreferenceError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PreferenceError::Network(format!(
                "campaign server returned {status}"
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| PreferenceError::Network(e.to_string()))?;

        PreferenceBundle::parse(&body)
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

/// Handle to a background campaign fetch.
///
/// Dropping the handle detaches the task; it still runs to completion.
pub struct CampaignFetch {
    handle: JoinHandle<Result<BundleOutcome, PreferenceError>>,
}

impl CampaignFetch {
    /// Spawn the fetch on the current Tokio runtime.
    pub fn spawn(prefs: Preferences, config: CampaignConfig) -> Result<Self, PreferenceError> {
        let runtime =
            tokio::runtime::Handle::try_current().map_err(|_| PreferenceError::NoRuntime)?;
        let handle = runtime.spawn(async move {
            let url = config.url.clone();
            let result = fetch_and_apply(&prefs, config).await;
            match &result {
                Ok(BundleOutcome::Applied { version, keys }) => {
                    tracing::info!(
                        "Applied campaign preferences v{} ({} keys) from {}",
                        version,
                        keys,
                        url
                    );
                }
                Ok(BundleOutcome::Stale { offered, stored }) => {
                    tracing::info!(
                        "Campaign preferences from {} are not newer (v{} <= v{})",
                        url,
                        offered,
                        stored
                    );
                }
                Err(e) => tracing::warn!("Loading campaign preferences from {} failed: {}", url, e),
            }
            result
        });

        Ok(Self { handle })
    }

    /// Abort the fetch. Keys already written by an in-flight merge stay written.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the fetch to complete.
    pub async fn wait(self) -> Result<BundleOutcome, PreferenceError> {
        match self.handle.await {
            Ok(result) => result,
            Err(e) if e.is_cancelled() => Err(PreferenceError::Cancelled),
            Err(e) => Err(PreferenceError::Network(format!("fetch task failed: {e}"))),
        }
    }
}

/// Campaign loader for synchronous contexts such as the CLI.
pub struct BlockingCampaignLoader {
    config: CampaignConfig,
    runtime: tokio::runtime::Runtime,
}

impl BlockingCampaignLoader {
    pub fn new(config: CampaignConfig) -> Result<Self, PreferenceError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| PreferenceError::Io(format!("Failed to create runtime: {e}")))?;

        Ok(Self { config, runtime })
    }

    /// Fetch the bundle and offer it to the version gate, waiting for the result.
    pub fn load(&self, prefs: &Preferences) -> Result<BundleOutcome, PreferenceError> {
        self.runtime.block_on(async {
            CampaignFetch::spawn(prefs.clone(), self.config.clone())?
                .wait()
                .await
        })
    }
}

async fn fetch_and_apply(
    prefs: &Preferences,
    config: CampaignConfig,
) -> Result<BundleOutcome, PreferenceError> {
    let client = CampaignClient::new(config)?;
    let bundle = client.fetch_bundle().await?;
    prefs.apply_bundle(&bundle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::PREFERENCES_VERSION;

    #[test]
    fn test_campaign_config_defaults() {
        let config = CampaignConfig::new("http://127.0.0.1:8080/prefs.json");
        assert_eq!(config.connect_timeout, Duration::from_secs(1));

        let config = config.with_connect_timeout(Duration::from_millis(250));
        assert_eq!(config.connect_timeout, Duration::from_millis(250));
    }

    #[tokio::test]
    async fn test_unreachable_server_leaves_prefs_untouched() {
        let prefs = Preferences::in_memory();
        prefs.put_int(PREFERENCES_VERSION, 3).unwrap();

        // Port 9 on localhost is closed on any sane test machine.
        let fetch = prefs
            .load_campaign_preferences(CampaignConfig::new("http://127.0.0.1:9/"))
            .unwrap();
        let result = fetch.wait().await;

        assert!(matches!(result, Err(PreferenceError::Network(_))));
        assert_eq!(prefs.stored_version(), 3);
    }

    #[test]
    fn test_fetch_outside_runtime_is_an_error() {
        let prefs = Preferences::in_memory();
        let result = prefs.load_campaign_preferences(CampaignConfig::new("http://127.0.0.1:9/"));
        assert!(matches!(result, Err(PreferenceError::NoRuntime)));
        assert_eq!(prefs.stored_version(), 0);
    }
}
