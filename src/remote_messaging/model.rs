//! Remote messaging configuration model
//!
//! Built fresh from every processed configuration document and never mutated
//! afterwards.

use std::collections::HashMap;

use super::attributes::MatchingAttribute;

/// A parsed remote messaging configuration
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteConfigModel {
    /// Document version
    pub version: i64,
    /// Messages in document order
    pub messages: Vec<RemoteMessageModel>,
    /// Rules keyed by id
    pub rules: HashMap<i64, RemoteConfigRule>,
}

impl RemoteConfigModel {
    /// Look up a rule by id
    #[must_use]
    pub fn rule(&self, id: i64) -> Option<&RemoteConfigRule> {
        self.rules.get(&id)
    }
}

/// A message that may be presented to the user
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteMessageModel {
    /// Message id, also the key for dismissal and percentile assignment
    pub id: String,
    /// What to show
    pub content: RemoteMessageContent,
    /// Rules that must match
    pub matching_rules: Vec<i64>,
    /// Rules that must not match
    pub exclusion_rules: Vec<i64>,
}

impl RemoteMessageModel {
    /// Whether the message has neither matching nor exclusion rules
    #[must_use]
    pub fn is_unconditional(&self) -> bool {
        self.matching_rules.is_empty() && self.exclusion_rules.is_empty()
    }
}

/// Layout and text of a message
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteMessageContent {
    /// Title and description only
    Small {
        /// Title
        title_text: String,
        /// Body
        description_text: String,
    },
    /// Text with an image
    Medium {
        /// Title
        title_text: String,
        /// Body
        description_text: String,
        /// Image
        placeholder: RemotePlaceholder,
    },
    /// Text, image and one button
    BigSingleAction {
        /// Title
        title_text: String,
        /// Body
        description_text: String,
        /// Image
        placeholder: RemotePlaceholder,
        /// Button label
        primary_action_text: String,
        /// Button action
        primary_action: RemoteAction,
    },
    /// Text, image and two buttons
    BigTwoAction {
        /// Title
        title_text: String,
        /// Body
        description_text: String,
        /// Image
        placeholder: RemotePlaceholder,
        /// First button label
        primary_action_text: String,
        /// First button action
        primary_action: RemoteAction,
        /// Second button label
        secondary_action_text: String,
        /// Second button action
        secondary_action: RemoteAction,
    },
    /// Promotional card with one action
    PromoSingleAction {
        /// Title
        title_text: String,
        /// Body
        description_text: String,
        /// Image
        placeholder: RemotePlaceholder,
        /// Action label
        action_text: String,
        /// Action
        action: RemoteAction,
    },
}

impl RemoteMessageContent {
    /// Title of any content variant
    #[must_use]
    pub fn title_text(&self) -> &str {
        match self {
            Self::Small { title_text, .. }
            | Self::Medium { title_text, .. }
            | Self::BigSingleAction { title_text, .. }
            | Self::BigTwoAction { title_text, .. }
            | Self::PromoSingleAction { title_text, .. } => title_text,
        }
    }

    /// Description of any content variant
    #[must_use]
    pub fn description_text(&self) -> &str {
        match self {
            Self::Small {
                description_text, ..
            }
            | Self::Medium {
                description_text, ..
            }
            | Self::BigSingleAction {
                description_text, ..
            }
            | Self::BigTwoAction {
                description_text, ..
            }
            | Self::PromoSingleAction {
                description_text, ..
            } => description_text,
        }
    }
}

/// What a message button does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteAction {
    /// Open a URL
    Url {
        /// Target URL
        value: String,
    },
    /// Open the app store page
    AppStore,
    /// Dismiss the message
    Dismiss,
    /// Open the share sheet
    Share {
        /// Shared value
        value: String,
        /// Share sheet title
        title: Option<String>,
    },
    /// Navigate to an in-app destination
    Navigation {
        /// Destination identifier
        value: String,
    },
    /// Open a survey URL
    Survey {
        /// Survey URL
        value: String,
    },
}

/// Image shown with a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemotePlaceholder {
    /// `Announce`
    Announce,
    /// `DDGAnnounce`
    DdgAnnounce,
    /// `CriticalUpdate`
    CriticalUpdate,
    /// `AppUpdate`
    AppUpdate,
    /// `NewForMacAndWindows`
    MacAndWindows,
    /// `PrivacyShield`
    PrivacyShield,
    /// `VPNAnnounce`
    VpnAnnounce,
    /// `PIRAnnounce`
    PirAnnounce,
    /// `Subscription`
    Subscription,
    /// `Duck.ai`
    AiChat,
}

impl RemotePlaceholder {
    /// Parse the document's placeholder name
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        Some(match name {
            "Announce" => Self::Announce,
            "DDGAnnounce" => Self::DdgAnnounce,
            "CriticalUpdate" => Self::CriticalUpdate,
            "AppUpdate" => Self::AppUpdate,
            "NewForMacAndWindows" => Self::MacAndWindows,
            "PrivacyShield" => Self::PrivacyShield,
            "VPNAnnounce" => Self::VpnAnnounce,
            "PIRAnnounce" => Self::PirAnnounce,
            "Subscription" => Self::Subscription,
            "Duck.ai" => Self::AiChat,
            _ => return None,
        })
    }
}

/// A named set of attributes, optionally behind a rollout gate
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteConfigRule {
    /// Rule id referenced by messages
    pub id: i64,
    /// Rollout gate
    pub target_percentile: Option<RemoteTargetPercentile>,
    /// Conditions, all of which must match
    pub attributes: Vec<MatchingAttribute>,
}

/// Staged rollout gate
///
/// A user whose percentile for the message is above `before` does not see it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemoteTargetPercentile {
    /// Inclusive threshold in `[0, 1]`
    pub before: Option<f32>,
}
