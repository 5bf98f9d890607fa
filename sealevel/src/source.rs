//! Upstream elevation tile sources.
//!
//! The pipeline pulls raw Terrarium PNGs through the [`ElevationSource`]
//! trait. The production implementation, [`TerrariumSource`], is only
//! available when the `download` feature is enabled.
//!
//! # Data Sources
//!
//! Terrarium tiles are published by the AWS Open Data "Terrain Tiles"
//! project at `https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png`.
//! Any mirror serving the same layout works via a custom URL template.

use std::future::Future;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;
use crate::key::TileCoord;

/// Default upstream URL template.
pub const DEFAULT_URL_TEMPLATE: &str =
    "https://s3.amazonaws.com/elevation-tiles-prod/terrarium/{z}/{x}/{y}.png";

/// Default client identifier sent upstream.
pub const DEFAULT_USER_AGENT: &str = concat!(
    "sealevel/",
    env!("CARGO_PKG_VERSION"),
    " (https://github.com/jes/sea-level-map)"
);

/// Default upstream deadline in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// A remote store of Terrarium elevation tiles.
pub trait ElevationSource: Send + Sync {
    /// Retrieve the raw PNG payload for one tile.
    ///
    /// Called once per generation; no retries are expected.
    fn fetch(&self, coord: TileCoord) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Configuration for fetching tiles upstream.
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// URL template with `{z}`, `{x}` and `{y}` placeholders.
    pub url_template: String,
    /// Value of the `User-Agent` header.
    pub user_agent: String,
    /// Deadline for one tile request.
    pub timeout: Duration,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url_template: DEFAULT_URL_TEMPLATE.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

impl SourceConfig {
    /// Create a configuration for a custom URL template.
    ///
    /// # Example
    ///
    /// ```
    /// use sealevel::source::SourceConfig;
    ///
    /// let config = SourceConfig::with_url_template("https://tiles.example.com/{z}/{x}/{y}.png");
    /// assert!(config.url_template.contains("example.com"));
    /// ```
    pub fn with_url_template(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
            ..Default::default()
        }
    }

    /// Set the request deadline.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the client identifier.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Build the request URL for a tile.
    ///
    /// # Example
    ///
    /// ```
    /// use sealevel::key::TileCoord;
    /// use sealevel::source::SourceConfig;
    ///
    /// let url = SourceConfig::default().tile_url(TileCoord::new(3, 4, 5));
    /// assert!(url.ends_with("/terrarium/3/4/5.png"));
    /// ```
    pub fn tile_url(&self, coord: TileCoord) -> String {
        self.url_template
            .replace("{z}", &coord.zoom.to_string())
            .replace("{x}", &coord.x.to_string())
            .replace("{y}", &coord.y.to_string())
    }
}

#[cfg(feature = "download")]
pub use self::http::TerrariumSource;

#[cfg(feature = "download")]
mod http {
    use std::future::Future;

    use bytes::Bytes;
    use reqwest::{Client, StatusCode};

    use super::{ElevationSource, SourceConfig};
    use crate::error::{Result, TileError};
    use crate::key::TileCoord;

    /// Fetches Terrarium tiles over HTTP.
    pub struct TerrariumSource {
        client: Client,
        config: SourceConfig,
    }

    impl TerrariumSource {
        /// Create a source with the given configuration.
        pub fn new(config: SourceConfig) -> Result<Self> {
            let client = Client::builder()
                .timeout(config.timeout)
                .user_agent(config.user_agent.clone())
                .build()
                .map_err(|e| TileError::Config {
                    reason: format!("Failed to create HTTP client: {}", e),
                })?;

            Ok(Self { client, config })
        }

        /// The configuration this source was built with.
        pub fn config(&self) -> &SourceConfig {
            &self.config
        }
    }

    impl ElevationSource for TerrariumSource {
        fn fetch(&self, coord: TileCoord) -> impl Future<Output = Result<Bytes>> + Send {
            let request = self.client.get(self.config.tile_url(coord));
            let timeout_ms = self.config.timeout.as_millis() as u64;

            async move {
                let map_err = |e: reqwest::Error| {
                    if e.is_timeout() {
                        TileError::FetchTimeout { coord, timeout_ms }
                    } else {
                        TileError::Fetch {
                            coord,
                            reason: e.to_string(),
                        }
                    }
                };

                let response = request.send().await.map_err(map_err)?;

                if response.status() != StatusCode::OK {
                    return Err(TileError::UpstreamStatus {
                        coord,
                        status: response.status().as_u16(),
                    });
                }

                response.bytes().await.map_err(map_err)
            }
        }
    }
}
