use std::env;
use std::fmt::Debug;
use std::time::Duration;

use crate::{Error, Result};

const DEFAULT_USERNAME: &str = "dust-cli-user";
const DEFAULT_TIMEZONE: &str = "Europe/Paris";
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(300);

/// Builder for [`DustConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DustConfigBuilder {
    api_key: String,
    base_url: String,
    workspace_id: String,
    space_id: Option<String>,
    data_source_id: Option<String>,
    username: Option<String>,
    timezone: Option<String>,
    stream_timeout: Option<Duration>,
}

impl DustConfigBuilder {
    /// Creates a builder with the mandatory settings.
    #[inline]
    pub fn new<K, U, W>(api_key: K, base_url: U, workspace_id: W) -> Self
    where
        K: Into<String>,
        U: Into<String>,
        W: Into<String>,
    {
        Self {
            api_key: api_key.into(),
            base_url: base_url.into(),
            workspace_id: workspace_id.into(),
            space_id: None,
            data_source_id: None,
            username: None,
            timezone: None,
            stream_timeout: None,
        }
    }

    /// Sets the space to work in.
    #[inline]
    pub fn with_space_id<S: Into<String>>(mut self, space_id: S) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    /// Sets the data source to work with.
    #[inline]
    pub fn with_data_source_id<S: Into<String>>(
        mut self,
        data_source_id: S,
    ) -> Self {
        self.data_source_id = Some(data_source_id.into());
        self
    }

    /// Sets the username reported in the message context.
    #[inline]
    pub fn with_username<S: Into<String>>(mut self, username: S) -> Self {
        self.username = Some(username.into());
        self
    }

    /// Sets the timezone reported in the message context.
    #[inline]
    pub fn with_timezone<S: Into<String>>(mut self, timezone: S) -> Self {
        self.timezone = Some(timezone.into());
        self
    }

    /// Sets how long to wait for the agent to finish a reply.
    #[inline]
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }

    /// Builds the configuration.
    pub fn build(self) -> Result<DustConfig> {
        if self.api_key.is_empty() {
            return Err(Error::Config("api key is empty".to_owned()));
        }
        let base_url = self.base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            return Err(Error::Config("base url is empty".to_owned()));
        }
        if self.workspace_id.is_empty() {
            return Err(Error::Config("workspace id is empty".to_owned()));
        }

        Ok(DustConfig {
            api_key: self.api_key,
            base_url,
            workspace_id: self.workspace_id,
            space_id: self.space_id,
            data_source_id: self.data_source_id,
            username: self
                .username
                .unwrap_or_else(|| DEFAULT_USERNAME.to_owned()),
            timezone: self
                .timezone
                .unwrap_or_else(|| DEFAULT_TIMEZONE.to_owned()),
            stream_timeout: self
                .stream_timeout
                .unwrap_or(DEFAULT_STREAM_TIMEOUT),
        })
    }
}

impl Debug for DustConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DustConfigBuilder")
            .field("api_key", &"<deducted>")
            .field("base_url", &self.base_url)
            .field("workspace_id", &self.workspace_id)
            .field("space_id", &self.space_id)
            .field("data_source_id", &self.data_source_id)
            .field("username", &self.username)
            .field("timezone", &self.timezone)
            .field("stream_timeout", &self.stream_timeout)
            .finish()
    }
}

/// Configuration for the Dust client.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct DustConfig {
    pub(crate) api_key: String,
    pub(crate) base_url: String,
    pub(crate) workspace_id: String,
    pub(crate) space_id: Option<String>,
    pub(crate) data_source_id: Option<String>,
    pub(crate) username: String,
    pub(crate) timezone: String,
    pub(crate) stream_timeout: Duration,
}

impl DustConfig {
    /// Reads the configuration from the process environment.
    ///
    /// `DUST_TOKEN`, `DUST_URL` and `DUST_WORKSPACE_ID` (or the legacy
    /// `WLD`) are required. `DUST_SPACE_ID`, `DUST_DATA_SOURCE_ID` and
    /// `DUST_STREAM_TIMEOUT_SECS` are optional.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| Error::Config(format!("{key} is not set")))
        };
        let api_key = required("DUST_TOKEN")?;
        let base_url = required("DUST_URL")?;
        let workspace_id = required("DUST_WORKSPACE_ID")
            .or_else(|_| required("WLD"))?;

        let mut builder =
            DustConfigBuilder::new(api_key, base_url, workspace_id);
        if let Some(space_id) = lookup("DUST_SPACE_ID") {
            builder = builder.with_space_id(space_id);
        }
        if let Some(data_source_id) = lookup("DUST_DATA_SOURCE_ID") {
            builder = builder.with_data_source_id(data_source_id);
        }
        if let Some(secs) = lookup("DUST_STREAM_TIMEOUT_SECS") {
            let secs = secs.parse::<u64>().map_err(|err| {
                Error::Config(format!("DUST_STREAM_TIMEOUT_SECS: {err}"))
            })?;
            builder = builder.with_stream_timeout(Duration::from_secs(secs));
        }
        builder.build()
    }

    /// Returns the base URL of the service, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Returns the workspace id.
    #[inline]
    pub fn workspace_id(&self) -> &str {
        &self.workspace_id
    }

    /// Returns the space id, if configured.
    #[inline]
    pub fn space_id(&self) -> Option<&str> {
        self.space_id.as_deref()
    }

    /// Returns the data source id, if configured.
    #[inline]
    pub fn data_source_id(&self) -> Option<&str> {
        self.data_source_id.as_deref()
    }

    /// Returns the stream timeout.
    #[inline]
    pub fn stream_timeout(&self) -> Duration {
        self.stream_timeout
    }
}

impl Debug for DustConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DustConfig")
            .field("api_key", &"<deducted>")
            .field("base_url", &self.base_url)
            .field("workspace_id", &self.workspace_id)
            .field("space_id", &self.space_id)
            .field("data_source_id", &self.data_source_id)
            .field("username", &self.username)
            .field("timezone", &self.timezone)
            .field("stream_timeout", &self.stream_timeout)
            .finish()
    }
}
