//! Remote message selection
//!
//! A remote configuration document lists messages and the rules that decide
//! who sees them. [`RemoteMessagingConfigProcessor`] decodes a document and
//! hands the resulting [`RemoteConfigModel`] to a
//! [`RemoteMessagingConfigMatcher`], which picks at most one message.
//!
//! Rules evaluate to one of three outcomes ([`EvaluationResult`]): a match, a
//! failure, or "skip this message" when a rule references something this
//! version cannot resolve. Staged rollouts use a [`PercentileStore`] that
//! assigns each message a stable random value per user.
//!
//! # Example
//!
//! ```
//! use browser_services_kit::remote_messaging::{
//!     AppAttributeMatcher, AppFacts, DeviceAttributeMatcher, DeviceFacts,
//!     InMemoryPercentileStore, RemoteMessagingConfigMatcher, RemoteMessagingConfigProcessor,
//!     UserAttributeMatcher, UserFacts,
//! };
//! use std::sync::Arc;
//!
//! let matcher = RemoteMessagingConfigMatcher::new(
//!     AppAttributeMatcher::new(AppFacts::builder().app_version("7.140.0").build()),
//!     DeviceAttributeMatcher::new(DeviceFacts::new(Some("en_US"), Some("17.4"), Some("phone"))),
//!     UserAttributeMatcher::new(UserFacts::default()),
//!     Arc::new(InMemoryPercentileStore::new()),
//!     Vec::new(),
//! );
//! let processor = RemoteMessagingConfigProcessor::new(matcher, Some("en-US".to_string()));
//!
//! let json = r#"{"version": 2, "messages": [], "rules": []}"#;
//! let result = processor.process(json, 1, false).unwrap();
//! assert_eq!(result.map(|r| r.version), Some(2));
//! ```

mod attributes;
mod config_matcher;
mod json;
mod matchers;
mod model;
mod percentile;
mod processor;
mod version;

pub use attributes::{
    BoolMatchingAttribute, EvaluationResult, IntRangeMatchingAttribute, MatchingAttribute,
    StringMatchingAttribute, StringSetMatchingAttribute, VersionRangeMatchingAttribute,
};
pub use config_matcher::RemoteMessagingConfigMatcher;
pub use json::{ConfigError, JsonRemoteMessagingConfig, map_attribute, map_config};
pub use matchers::{
    AppAttributeMatcher, AppFacts, AttributeMatcher, DeviceAttributeMatcher, DeviceFacts,
    UserAttributeMatcher, UserFacts, normalize_locale,
};
pub use model::{
    RemoteAction, RemoteConfigModel, RemoteConfigRule, RemoteMessageContent, RemoteMessageModel,
    RemotePlaceholder, RemoteTargetPercentile,
};
pub use percentile::{InMemoryPercentileStore, PercentileStore};
pub use processor::{ProcessorResult, RemoteMessagingConfigProcessor};
pub use version::{compare_versions, is_valid_version};
