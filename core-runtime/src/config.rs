//! # Media Configuration Module
//!
//! Provides configuration management for the media session core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `MediaConfig`
//! instance that holds the host capabilities and settings every session needs.
//! It enforces fail-fast validation so a missing bridge is reported when the
//! host wires the core, not when the first track is played.
//!
//! ## Required Dependencies
//!
//! - `MediaResourceFactory` - Allocates native decode/output handles
//!
//! ## Optional Dependencies (with defaults)
//!
//! - `HostEnvironment` - Volume-key routing and audio focus (default: no-op)
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::MediaConfig;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let config = MediaConfig::builder()
//!     .resource_factory(Arc::new(MyPlayerFactory))
//!     .environment(Arc::new(MyAndroidEnvironment))
//!     .prepare_timeout(Duration::from_secs(30))
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::MediaConfig;
//!
//! // This will panic with an actionable error message
//! let config = MediaConfig::builder()
//!     .build()
//!     .expect("Should fail - missing resource factory");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{HostEnvironment, MediaResourceFactory, NoopEnvironment};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Marker that identifies media bundled with the host application.
pub const DEFAULT_ASSET_PREFIX: &str = "/android_asset/";

/// Media core configuration.
///
/// Use [`MediaConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct MediaConfig {
    /// Allocates native resources for sessions (required)
    pub resource_factory: Arc<dyn MediaResourceFactory>,

    /// Host side effects: volume-key routing and audio focus requests
    pub environment: Arc<dyn HostEnvironment>,

    /// Upper bound on a pending prepare. `None` waits forever.
    pub prepare_timeout: Option<Duration>,

    /// Reserved location prefix of bundled assets
    pub asset_prefix: String,

    /// Root that relative local paths are resolved against
    pub storage_root: Option<PathBuf>,

    pub features: FeatureFlags,
}

impl std::fmt::Debug for MediaConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaConfig")
            .field("resource_factory", &"MediaResourceFactory { ... }")
            .field("environment", &"HostEnvironment { ... }")
            .field("prepare_timeout", &self.prepare_timeout)
            .field("asset_prefix", &self.asset_prefix)
            .field("storage_root", &self.storage_root)
            .field("features", &self.features)
            .finish()
    }
}

/// Feature flags control optional host integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureFlags {
    /// Ask the host for audio focus whenever playback is requested
    pub request_focus_on_play: bool,

    /// Pause running sessions while a call is ringing or active
    pub pause_on_telephony: bool,

    /// Pause running sessions when another application takes audio focus
    pub pause_on_focus_loss: bool,
}

impl Default for FeatureFlags {
    fn default() -> Self {
        Self {
            request_focus_on_play: true,
            pause_on_telephony: true,
            pause_on_focus_loss: true,
        }
    }
}

impl MediaConfig {
    /// Creates a new configuration builder.
    pub fn builder() -> MediaConfigBuilder {
        MediaConfigBuilder::default()
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the asset prefix is empty or the prepare timeout is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.asset_prefix.is_empty() {
            return Err(Error::Config(
                "Asset prefix cannot be empty. Omit .asset_prefix() to use the default."
                    .to_string(),
            ));
        }

        if let Some(timeout) = self.prepare_timeout {
            if timeout.is_zero() {
                return Err(Error::Config(
                    "Prepare timeout must be greater than zero. Omit .prepare_timeout() to wait indefinitely."
                        .to_string(),
                ));
            }
        }

        Ok(())
    }
}

fn resource_factory_missing_error() -> Error {
    Error::CapabilityMissing {
        capability: "MediaResourceFactory".to_string(),
        message: "A MediaResourceFactory implementation is required to allocate native players. \
                  Inject the platform media adapter with .resource_factory()."
            .to_string(),
    }
}

/// Builder for [`MediaConfig`].
#[derive(Default)]
pub struct MediaConfigBuilder {
    resource_factory: Option<Arc<dyn MediaResourceFactory>>,
    environment: Option<Arc<dyn HostEnvironment>>,
    prepare_timeout: Option<Duration>,
    asset_prefix: Option<String>,
    storage_root: Option<PathBuf>,
    features: FeatureFlags,
}

impl MediaConfigBuilder {
    /// Sets the resource factory (required).
    pub fn resource_factory(mut self, factory: Arc<dyn MediaResourceFactory>) -> Self {
        self.resource_factory = Some(factory);
        self
    }

    /// Sets the host environment (optional).
    pub fn environment(mut self, environment: Arc<dyn HostEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Bounds how long a session may stay in `Preparing`.
    pub fn prepare_timeout(mut self, timeout: Duration) -> Self {
        self.prepare_timeout = Some(timeout);
        self
    }

    /// Overrides the bundled-asset prefix (default `/android_asset/`).
    pub fn asset_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.asset_prefix = Some(prefix.into());
        self
    }

    pub fn storage_root<P: Into<PathBuf>>(mut self, root: P) -> Self {
        self.storage_root = Some(root.into());
        self
    }

    pub fn request_focus_on_play(mut self, enabled: bool) -> Self {
        self.features.request_focus_on_play = enabled;
        self
    }

    pub fn pause_on_telephony(mut self, enabled: bool) -> Self {
        self.features.pause_on_telephony = enabled;
        self
    }

    pub fn pause_on_focus_loss(mut self, enabled: bool) -> Self {
        self.features.pause_on_focus_loss = enabled;
        self
    }

    pub fn features(mut self, features: FeatureFlags) -> Self {
        self.features = features;
        self
    }

    /// Builds the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CapabilityMissing`] when no resource factory was
    /// provided, or [`Error::Config`] when validation fails.
    pub fn build(self) -> Result<MediaConfig> {
        let resource_factory = self
            .resource_factory
            .ok_or_else(resource_factory_missing_error)?;

        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(NoopEnvironment) as Arc<dyn HostEnvironment>);

        let config = MediaConfig {
            resource_factory,
            environment,
            prepare_timeout: self.prepare_timeout,
            asset_prefix: self
                .asset_prefix
                .unwrap_or_else(|| DEFAULT_ASSET_PREFIX.to_string()),
            storage_root: self.storage_root,
            features: self.features,
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::{BridgeError, MediaResource, ResourceListener};

    // Mock implementations for testing
    struct MockFactory;

    impl MediaResourceFactory for MockFactory {
        fn create(
            &self,
            _listener: Arc<dyn ResourceListener>,
        ) -> BridgeResult<Box<dyn MediaResource>> {
            Err(BridgeError::NotAvailable("mock".to_string()))
        }
    }

    #[test]
    fn test_builder_requires_resource_factory() {
        let result = MediaConfig::builder().build();

        assert!(result.is_err());
        let err_msg = result.unwrap_err().to_string();
        assert!(err_msg.contains("MediaResourceFactory"));
        assert!(err_msg.contains("Capability missing"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = MediaConfig::builder()
            .resource_factory(Arc::new(MockFactory))
            .build()
            .unwrap();

        assert_eq!(config.asset_prefix, DEFAULT_ASSET_PREFIX);
        assert_eq!(config.prepare_timeout, None);
        assert_eq!(config.storage_root, None);
        assert_eq!(config.features, FeatureFlags::default());
        assert!(config.environment.request_audio_focus().is_ok());
    }

    #[test]
    fn test_builder_overrides() {
        let config = MediaConfig::builder()
            .resource_factory(Arc::new(MockFactory))
            .prepare_timeout(Duration::from_secs(15))
            .asset_prefix("/bundle/")
            .storage_root("/data/media")
            .pause_on_telephony(false)
            .build()
            .unwrap();

        assert_eq!(config.prepare_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.asset_prefix, "/bundle/");
        assert_eq!(config.storage_root, Some(PathBuf::from("/data/media")));
        assert!(!config.features.pause_on_telephony);
        assert!(config.features.pause_on_focus_loss);
    }

    #[test]
    fn test_validate_rejects_empty_asset_prefix() {
        let result = MediaConfig::builder()
            .resource_factory(Arc::new(MockFactory))
            .asset_prefix("")
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Asset prefix cannot be empty"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = MediaConfig::builder()
            .resource_factory(Arc::new(MockFactory))
            .prepare_timeout(Duration::ZERO)
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("greater than zero"));
    }

    #[test]
    fn test_feature_flags_default() {
        let flags = FeatureFlags::default();
        assert!(flags.request_focus_on_play);
        assert!(flags.pause_on_telephony);
        assert!(flags.pause_on_focus_loss);
    }

    #[test]
    fn test_debug_hides_trait_objects() {
        let config = MediaConfig::builder()
            .resource_factory(Arc::new(MockFactory))
            .build()
            .unwrap();

        let debug = format!("{:?}", config);
        assert!(debug.contains("MediaResourceFactory { ... }"));
        assert!(debug.contains("/android_asset/"));
    }
}
