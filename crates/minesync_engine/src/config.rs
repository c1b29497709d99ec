//! Configuration for the sync engine.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// One of the three logical MineSync endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Serves the remote save listing.
    Manifest,
    /// Accepts uploaded archives.
    Upload,
    /// Serves archives on request.
    Download,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Endpoint::Manifest => "manifest",
            Endpoint::Upload => "upload",
            Endpoint::Download => "download",
        };
        f.write_str(name)
    }
}

/// Network addresses (`host:port`) of the three endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    /// Manifest endpoint address.
    pub manifest: String,
    /// Upload endpoint address.
    pub upload: String,
    /// Download endpoint address.
    pub download: String,
}

impl Endpoints {
    /// Creates an endpoint set from three addresses.
    pub fn new(
        manifest: impl Into<String>,
        upload: impl Into<String>,
        download: impl Into<String>,
    ) -> Self {
        Self {
            manifest: manifest.into(),
            upload: upload.into(),
            download: download.into(),
        }
    }

    /// Returns the address of the given endpoint.
    pub fn address(&self, endpoint: Endpoint) -> &str {
        match endpoint {
            Endpoint::Manifest => &self.manifest,
            Endpoint::Upload => &self.upload,
            Endpoint::Download => &self.download,
        }
    }
}

impl Default for Endpoints {
    fn default() -> Self {
        Self::new("127.0.0.1:9998", "127.0.0.1:9999", "127.0.0.1:9997")
    }
}

/// Configuration for sync operations.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Endpoint addresses.
    pub endpoints: Endpoints,
    /// Explicit save-games root. Resolved per platform when unset.
    pub save_root: Option<PathBuf>,
    /// Directory for temporary archives. The system temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Read/write timeout on an established connection. `None` blocks.
    pub io_timeout: Option<Duration>,
    /// Retry configuration for connection failures.
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Creates a configuration for the given endpoints.
    pub fn new(endpoints: Endpoints) -> Self {
        Self {
            endpoints,
            save_root: None,
            temp_dir: None,
            connect_timeout: Duration::from_secs(10),
            io_timeout: Some(Duration::from_secs(60)),
            retry: RetryConfig::default(),
        }
    }

    /// Sets an explicit save-games root.
    pub fn with_save_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.save_root = Some(root.into());
        self
    }

    /// Sets the directory used for temporary archives.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Sets the connect timeout.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Sets the read/write timeout.
    pub fn with_io_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.io_timeout = timeout;
        self
    }

    /// Sets the retry configuration.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::new(Endpoints::default())
    }
}

/// Configuration for retry behavior.
///
/// Only connection failures and timeouts are retried.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Multiplier for exponential backoff.
    pub backoff_multiplier: f64,
}

impl RetryConfig {
    /// Creates a new retry configuration.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            initial_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }

    /// Creates a configuration with no retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
        }
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff multiplier.
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Calculates the delay before a given attempt (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let exponent = i32::try_from(attempt - 1).unwrap_or(i32::MAX);
        let delay_secs =
            self.initial_delay.as_secs_f64() * self.backoff_multiplier.powi(exponent);

        // Negative or NaN products collapse to no delay.
        let capped = delay_secs.max(0.0).min(self.max_delay.as_secs_f64());
        Duration::try_from_secs_f64(capped).unwrap_or(self.max_delay)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self::new(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_endpoints() {
        let endpoints = Endpoints::default();
        assert_eq!(endpoints.address(Endpoint::Manifest), "127.0.0.1:9998");
        assert_eq!(endpoints.address(Endpoint::Upload), "127.0.0.1:9999");
        assert_eq!(endpoints.address(Endpoint::Download), "127.0.0.1:9997");
    }

    #[test]
    fn sync_config_builder() {
        let config = SyncConfig::new(Endpoints::new("a:1", "b:2", "c:3"))
            .with_save_root("/saves")
            .with_connect_timeout(Duration::from_secs(3))
            .with_io_timeout(None)
            .with_retry(RetryConfig::no_retry());

        assert_eq!(config.endpoints.upload, "b:2");
        assert_eq!(config.save_root, Some(PathBuf::from("/saves")));
        assert_eq!(config.connect_timeout, Duration::from_secs(3));
        assert_eq!(config.io_timeout, None);
        assert_eq!(config.retry.max_attempts, 1);
    }

    #[test]
    fn endpoints_deserialize_with_defaults() {
        let endpoints: Endpoints =
            serde_json::from_str(r#"{"upload": "10.0.0.2:9999"}"#).unwrap();
        assert_eq!(endpoints.upload, "10.0.0.2:9999");
        assert_eq!(endpoints.manifest, "127.0.0.1:9998");
    }

    #[test]
    fn retry_delay_calculation() {
        let config = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0);

        assert_eq!(config.delay_for_attempt(0), Duration::ZERO);
        assert_eq!(config.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(config.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(config.delay_for_attempt(3), Duration::from_millis(400));
    }

    #[test]
    fn retry_delay_respects_max() {
        let config = RetryConfig::new(10)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0);

        assert_eq!(config.delay_for_attempt(5), Duration::from_secs(5));
    }

    #[test]
    fn odd_multipliers_never_panic() {
        let negative = RetryConfig::new(5)
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(-2.0);
        assert_eq!(negative.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(negative.delay_for_attempt(2), Duration::ZERO);
        assert_eq!(negative.delay_for_attempt(3), Duration::from_millis(400));

        let nan = RetryConfig::new(5).with_backoff_multiplier(f64::NAN);
        assert_eq!(nan.delay_for_attempt(2), Duration::ZERO);

        let unbounded = RetryConfig::new(5)
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::MAX)
            .with_backoff_multiplier(f64::INFINITY);
        assert_eq!(unbounded.delay_for_attempt(2), Duration::MAX);
    }

    #[test]
    fn zero_attempts_still_tries_once() {
        assert_eq!(RetryConfig::new(0).max_attempts, 1);
    }

    #[test]
    fn endpoint_display() {
        assert_eq!(Endpoint::Manifest.to_string(), "manifest");
        assert_eq!(Endpoint::Download.to_string(), "download");
    }
}
