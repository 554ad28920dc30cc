//! Processing of freshly fetched configuration documents

use super::config_matcher::RemoteMessagingConfigMatcher;
use super::json::{ConfigError, JsonRemoteMessagingConfig, map_config};
use super::model::RemoteMessageModel;

/// Outcome of processing a newer or re-processed configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorResult {
    /// Version of the processed document
    pub version: i64,
    /// Message selected for display, if any
    pub message: Option<RemoteMessageModel>,
}

/// Decodes a configuration document and selects its message
#[derive(Debug)]
pub struct RemoteMessagingConfigProcessor {
    matcher: RemoteMessagingConfigMatcher,
    locale: Option<String>,
}

impl RemoteMessagingConfigProcessor {
    /// Create a processor
    ///
    /// `locale` picks message translations.
    #[must_use]
    pub fn new(matcher: RemoteMessagingConfigMatcher, locale: Option<String>) -> Self {
        Self { matcher, locale }
    }

    /// Process `json` if it is newer than `current_version`
    ///
    /// Returns `Ok(None)` when the document is not newer and
    /// `should_reprocess` is false. Reprocessing is for when the stored
    /// result went stale, for example after app facts changed.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the document cannot be decoded at all.
    /// Individual bad messages or rules are dropped instead.
    pub fn process(
        &self,
        json: &str,
        current_version: i64,
        should_reprocess: bool,
    ) -> Result<Option<ProcessorResult>, ConfigError> {
        let document = JsonRemoteMessagingConfig::parse(json)?;
        let version = document.version;

        if version <= current_version && !should_reprocess {
            tracing::debug!(version, current_version, "Remote messaging config is up to date");
            return Ok(None);
        }

        let config = map_config(document, self.locale.as_deref());
        let message = self.matcher.evaluate(&config);
        tracing::debug!(
            version,
            messages = config.messages.len(),
            selected = message.as_ref().map(|m| m.id.as_str()),
            "Processed remote messaging config"
        );

        Ok(Some(ProcessorResult { version, message }))
    }
}
