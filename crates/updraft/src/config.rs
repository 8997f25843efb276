#![forbid(unsafe_code)]

//! Configuration for [`LoaderTask`](crate::LoaderTask).

use std::{path::PathBuf, str::FromStr, sync::Arc, time::Duration};

use thiserror::Error;
use updraft_core::{CoreError, scope_key_from_url};
use updraft_loader::{DownloaderConfig, FatalErrorLog};
use updraft_net::{Headers, NetOptions};
use updraft_protocol::ParserOptions;
use updraft_signing::{CodeSigningConfiguration, CodeSigningMetadata, SigningError};
use url::Url;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("updates are disabled")]
    Disabled,

    #[error("no update URL configured")]
    MissingUpdateUrl,

    #[error("cannot derive scope key: {0}")]
    ScopeKey(#[from] CoreError),

    #[error("invalid code signing configuration: {0}")]
    InvalidCodeSigning(#[source] SigningError),

    #[error("unknown check-on-launch value {0:?}")]
    UnknownCheckOnLaunch(String),
}

/// When to ask the server for a newer update during launch.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CheckOnLaunch {
    #[default]
    Always,
    Never,
    /// Checks are driven by the owner's error recovery; at launch this
    /// behaves like [`CheckOnLaunch::Never`].
    ErrorRecoveryOnly,
}

impl FromStr for CheckOnLaunch {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ALWAYS" => Ok(Self::Always),
            "NEVER" => Ok(Self::Never),
            "ERROR_RECOVERY_ONLY" => Ok(Self::ErrorRecoveryOnly),
            other => Err(ConfigError::UnknownCheckOnLaunch(other.to_string())),
        }
    }
}

/// Trust anchor used to verify manifest responses.
#[derive(Clone, Debug)]
pub struct CodeSigningSettings {
    pub certificate_pem: String,
    pub metadata: CodeSigningMetadata,
    /// Treat `certificate_pem` as a root CA and expect the signing chain in
    /// a `certificate_chain` response part.
    pub include_manifest_response_certificate_chain: bool,
    pub allow_unsigned_manifests: bool,
}

impl CodeSigningSettings {
    pub fn new(certificate_pem: impl Into<String>) -> Self {
        Self {
            certificate_pem: certificate_pem.into(),
            metadata: CodeSigningMetadata::default(),
            include_manifest_response_certificate_chain: false,
            allow_unsigned_manifests: false,
        }
    }

    pub fn with_metadata(mut self, metadata: CodeSigningMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_certificate_chain(mut self, enabled: bool) -> Self {
        self.include_manifest_response_certificate_chain = enabled;
        self
    }

    pub fn with_allow_unsigned_manifests(mut self, allow: bool) -> Self {
        self.allow_unsigned_manifests = allow;
        self
    }

    fn build(&self) -> Result<CodeSigningConfiguration, ConfigError> {
        CodeSigningConfiguration::new(
            &self.certificate_pem,
            self.metadata.clone(),
            self.include_manifest_response_certificate_chain,
            self.allow_unsigned_manifests,
        )
        .map_err(ConfigError::InvalidCodeSigning)
    }
}

/// Update client configuration.
///
/// # Example
///
/// ```ignore
/// use updraft::{CheckOnLaunch, UpdatesConfig};
///
/// let config = UpdatesConfig::new("https://u.example.com/manifest".parse()?)
///     .with_runtime_version("2.1")
///     .with_launch_wait(Duration::from_secs(3))
///     .with_check_on_launch(CheckOnLaunch::Always);
/// ```
#[derive(Clone, Debug)]
pub struct UpdatesConfig {
    /// Master switch. A disabled config is rejected at task start.
    pub enabled: bool,
    pub update_url: Option<Url>,
    /// Tenant scope stored on every update. Defaults to the origin of
    /// `update_url`.
    pub scope_key: Option<String>,
    pub runtime_version: String,
    pub platform: String,
    /// How long launch waits for the remote check before falling back to a
    /// cached update.
    pub launch_wait: Duration,
    pub check_on_launch: CheckOnLaunch,
    /// Sent on every request, after caller headers.
    pub request_headers: Headers,
    pub code_signing: Option<CodeSigningSettings>,
    /// Accept protocol 0 servers: manifest part required, directives ignored.
    pub v0_compatible: bool,
    pub updates_dir: PathBuf,
    /// Sent as `EAS-Client-ID`.
    pub client_id: String,
    pub net: NetOptions,
    pub event_channel_capacity: usize,
}

impl Default for UpdatesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            update_url: None,
            scope_key: None,
            runtime_version: "1".to_string(),
            platform: std::env::consts::OS.to_string(),
            launch_wait: Duration::ZERO,
            check_on_launch: CheckOnLaunch::default(),
            request_headers: Headers::new(),
            code_signing: None,
            v0_compatible: false,
            updates_dir: std::env::temp_dir().join("updraft"),
            client_id: Uuid::new_v4().to_string(),
            net: NetOptions::default(),
            event_channel_capacity: 32,
        }
    }
}

impl UpdatesConfig {
    pub fn new(update_url: Url) -> Self {
        Self {
            update_url: Some(update_url),
            ..Self::default()
        }
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_scope_key(mut self, scope_key: impl Into<String>) -> Self {
        self.scope_key = Some(scope_key.into());
        self
    }

    pub fn with_runtime_version(mut self, runtime_version: impl Into<String>) -> Self {
        self.runtime_version = runtime_version.into();
        self
    }

    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }

    pub fn with_launch_wait(mut self, launch_wait: Duration) -> Self {
        self.launch_wait = launch_wait;
        self
    }

    pub fn with_check_on_launch(mut self, check_on_launch: CheckOnLaunch) -> Self {
        self.check_on_launch = check_on_launch;
        self
    }

    /// Add a header sent on every request.
    pub fn with_request_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.request_headers.insert(name, value);
        self
    }

    pub fn with_code_signing(mut self, code_signing: CodeSigningSettings) -> Self {
        self.code_signing = Some(code_signing);
        self
    }

    pub fn with_v0_compatible(mut self, v0_compatible: bool) -> Self {
        self.v0_compatible = v0_compatible;
        self
    }

    pub fn with_updates_dir(mut self, updates_dir: impl Into<PathBuf>) -> Self {
        self.updates_dir = updates_dir.into();
        self
    }

    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    pub fn with_net(mut self, net: NetOptions) -> Self {
        self.net = net;
        self
    }

    pub fn with_event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Check the preconditions for running a launch task.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Disabled`], [`ConfigError::MissingUpdateUrl`], or an
    /// error building the scope key or code signing configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.update_url()?;
        self.resolved_scope_key()?;
        self.code_signing_configuration()?;
        Ok(())
    }

    pub(crate) fn update_url(&self) -> Result<&Url, ConfigError> {
        if !self.enabled {
            return Err(ConfigError::Disabled);
        }
        self.update_url.as_ref().ok_or(ConfigError::MissingUpdateUrl)
    }

    /// Explicit scope key, or the origin of the update URL.
    pub fn resolved_scope_key(&self) -> Result<String, ConfigError> {
        match &self.scope_key {
            Some(scope_key) => Ok(scope_key.clone()),
            None => Ok(scope_key_from_url(self.update_url()?)?),
        }
    }

    pub fn code_signing_configuration(
        &self,
    ) -> Result<Option<Arc<CodeSigningConfiguration>>, ConfigError> {
        self.code_signing
            .as_ref()
            .map(|settings| settings.build().map(Arc::new))
            .transpose()
    }

    /// Log an unrecovered fatal error for the next manifest request.
    pub fn fatal_error_log(&self) -> FatalErrorLog {
        FatalErrorLog::new(&self.updates_dir)
    }

    pub(crate) fn downloader_config(
        &self,
        code_signing: Option<Arc<CodeSigningConfiguration>>,
    ) -> DownloaderConfig {
        DownloaderConfig {
            platform: self.platform.clone(),
            client_id: self.client_id.clone(),
            runtime_version: self.runtime_version.clone(),
            request_headers: self.request_headers.clone(),
            code_signing,
        }
    }

    pub(crate) fn parser_options(
        &self,
        scope_key: String,
        code_signing: Option<Arc<CodeSigningConfiguration>>,
    ) -> ParserOptions {
        ParserOptions {
            scope_key,
            runtime_version: self.runtime_version.clone(),
            v0_compatible: self.v0_compatible,
            code_signing,
        }
    }
}
