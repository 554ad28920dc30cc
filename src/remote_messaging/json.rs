//! Remote messaging configuration document
//!
//! Decoding is lenient: a message whose content cannot be mapped is dropped,
//! a rule that cannot be decoded is dropped, and an attribute with an
//! unrecognised key or malformed value becomes [`MatchingAttribute::Unknown`]
//! carrying its `fallback`.

use std::collections::HashMap;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::attributes::MatchingAttribute;
use super::model::{
    RemoteAction, RemoteConfigModel, RemoteConfigRule, RemoteMessageContent, RemoteMessageModel,
    RemotePlaceholder, RemoteTargetPercentile,
};

/// Error decoding a configuration document
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document is not valid JSON or lacks required top-level fields
    #[error("Invalid remote messaging config: {0}")]
    Json(#[from] serde_json::Error),
}

/// Top level of the configuration document
///
/// Messages and rules stay as raw JSON until mapping so that one bad entry
/// does not reject the whole document.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRemoteMessagingConfig {
    /// Document version
    pub version: i64,
    /// Raw messages
    #[serde(default)]
    pub messages: Vec<Value>,
    /// Raw rules
    #[serde(default)]
    pub rules: Vec<Value>,
}

impl JsonRemoteMessagingConfig {
    /// Parse a document
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Json`] if the text is not a JSON object with a
    /// numeric `version`.
    pub fn parse(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonRemoteMessage {
    id: String,
    content: JsonContent,
    #[serde(default)]
    translations: HashMap<String, JsonContentTranslation>,
    #[serde(default)]
    matching_rules: Vec<i64>,
    #[serde(default)]
    exclusion_rules: Vec<i64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonContent {
    message_type: String,
    title_text: String,
    description_text: String,
    placeholder: Option<String>,
    action_text: Option<String>,
    action: Option<JsonMessageAction>,
    primary_action_text: Option<String>,
    primary_action: Option<JsonMessageAction>,
    secondary_action_text: Option<String>,
    secondary_action: Option<JsonMessageAction>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonMessageAction {
    #[serde(rename = "type")]
    action_type: String,
    #[serde(default)]
    value: String,
    #[serde(default)]
    additional_parameters: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonContentTranslation {
    title_text: Option<String>,
    description_text: Option<String>,
    primary_action_text: Option<String>,
    secondary_action_text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JsonMatchingRule {
    id: i64,
    target_percentile: Option<JsonTargetPercentile>,
    #[serde(default)]
    attributes: serde_json::Map<String, Value>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct JsonTargetPercentile {
    before: Option<f32>,
}

/// Map a decoded document to the model
///
/// `locale` selects content translations, `en-US` first and then `en`.
#[must_use]
pub fn map_config(config: JsonRemoteMessagingConfig, locale: Option<&str>) -> RemoteConfigModel {
    let messages = config
        .messages
        .into_iter()
        .filter_map(|raw| map_message(raw, locale))
        .collect();

    let rules = config
        .rules
        .into_iter()
        .filter_map(map_rule)
        .map(|rule| (rule.id, rule))
        .collect();

    RemoteConfigModel {
        version: config.version,
        messages,
        rules,
    }
}

fn map_message(raw: Value, locale: Option<&str>) -> Option<RemoteMessageModel> {
    let message: JsonRemoteMessage = match serde_json::from_value(raw) {
        Ok(message) => message,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable remote message");
            return None;
        }
    };

    let mut content = message.content;
    if let Some(translation) = locale.and_then(|l| find_translation(&message.translations, l)) {
        apply_translation(&mut content, translation);
    }

    let Some(content) = map_content(&content) else {
        tracing::warn!(message_id = %message.id, "Dropping remote message with invalid content");
        return None;
    };

    Some(RemoteMessageModel {
        id: message.id,
        content,
        matching_rules: message.matching_rules,
        exclusion_rules: message.exclusion_rules,
    })
}

fn find_translation<'a>(
    translations: &'a HashMap<String, JsonContentTranslation>,
    locale: &str,
) -> Option<&'a JsonContentTranslation> {
    let locale = locale.replace('_', "-");
    translations.get(&locale).or_else(|| {
        let language = locale.split('-').next()?;
        translations.get(language)
    })
}

fn apply_translation(content: &mut JsonContent, translation: &JsonContentTranslation) {
    fn overlay(target: &mut String, source: Option<&String>) {
        if let Some(text) = source.filter(|t| !t.is_empty()) {
            target.clone_from(text);
        }
    }

    overlay(&mut content.title_text, translation.title_text.as_ref());
    overlay(
        &mut content.description_text,
        translation.description_text.as_ref(),
    );
    if let Some(text) = translation.primary_action_text.as_ref().filter(|t| !t.is_empty()) {
        content.primary_action_text = Some(text.clone());
        // Single-action promos label their only action with `actionText`
        if content.action_text.is_some() {
            content.action_text = Some(text.clone());
        }
    }
    if let Some(text) = translation.secondary_action_text.as_ref().filter(|t| !t.is_empty()) {
        content.secondary_action_text = Some(text.clone());
    }
}

fn map_content(content: &JsonContent) -> Option<RemoteMessageContent> {
    if content.title_text.is_empty() || content.description_text.is_empty() {
        return None;
    }
    let title_text = content.title_text.clone();
    let description_text = content.description_text.clone();

    let placeholder = || content.placeholder.as_deref().and_then(RemotePlaceholder::parse);
    let labelled = |text: &Option<String>, action: &Option<JsonMessageAction>| {
        let text = text.as_deref().filter(|t| !t.is_empty())?;
        Some((text.to_string(), map_action(action.as_ref()?)?))
    };

    Some(match content.message_type.as_str() {
        "small" => RemoteMessageContent::Small {
            title_text,
            description_text,
        },
        "medium" => RemoteMessageContent::Medium {
            title_text,
            description_text,
            placeholder: placeholder()?,
        },
        "big_single_action" => {
            let (primary_action_text, primary_action) =
                labelled(&content.primary_action_text, &content.primary_action)?;
            RemoteMessageContent::BigSingleAction {
                title_text,
                description_text,
                placeholder: placeholder()?,
                primary_action_text,
                primary_action,
            }
        }
        "big_two_action" => {
            let (primary_action_text, primary_action) =
                labelled(&content.primary_action_text, &content.primary_action)?;
            let (secondary_action_text, secondary_action) =
                labelled(&content.secondary_action_text, &content.secondary_action)?;
            RemoteMessageContent::BigTwoAction {
                title_text,
                description_text,
                placeholder: placeholder()?,
                primary_action_text,
                primary_action,
                secondary_action_text,
                secondary_action,
            }
        }
        "promo_single_action" => {
            let (action_text, action) = labelled(&content.action_text, &content.action)?;
            RemoteMessageContent::PromoSingleAction {
                title_text,
                description_text,
                placeholder: placeholder()?,
                action_text,
                action,
            }
        }
        _ => return None,
    })
}

fn map_action(action: &JsonMessageAction) -> Option<RemoteAction> {
    let value = action.value.clone();
    Some(match action.action_type.as_str() {
        "url" => RemoteAction::Url { value },
        "appstore" => RemoteAction::AppStore,
        "dismiss" => RemoteAction::Dismiss,
        "share" => RemoteAction::Share {
            value,
            title: action.additional_parameters.get("title").cloned(),
        },
        "navigation" => RemoteAction::Navigation { value },
        "survey" => RemoteAction::Survey { value },
        _ => return None,
    })
}

fn map_rule(raw: Value) -> Option<RemoteConfigRule> {
    let rule: JsonMatchingRule = match serde_json::from_value(raw) {
        Ok(rule) => rule,
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable remote messaging rule");
            return None;
        }
    };

    Some(RemoteConfigRule {
        id: rule.id,
        target_percentile: rule
            .target_percentile
            .map(|p| RemoteTargetPercentile { before: p.before }),
        attributes: rule
            .attributes
            .iter()
            .map(|(key, value)| map_attribute(key, value))
            .collect(),
    })
}

/// Map one `key: {value, fallback}` entry of a rule to an attribute
#[must_use]
pub fn map_attribute(key: &str, value: &Value) -> MatchingAttribute {
    use MatchingAttribute as A;

    let attribute = match key {
        "isInternalUser" => decode(value, A::IsInternalUser),
        "appId" => decode(value, A::AppId),
        "appVersion" => decode(value, A::AppVersion),
        "atb" => decode(value, A::Atb),
        "appAtb" => decode(value, A::AppAtb),
        "searchAtb" => decode(value, A::SearchAtb),
        "expVariant" => decode(value, A::ExpVariant),
        "locale" => decode(value, A::Locale),
        "osApi" => decode(value, A::OsApi),
        "formFactor" => decode(value, A::FormFactor),
        "appTheme" => decode(value, A::AppTheme),
        "bookmarks" => decode(value, A::Bookmarks),
        "favorites" => decode(value, A::Favorites),
        "daysSinceInstalled" => decode(value, A::DaysSinceInstalled),
        "emailEnabled" => decode(value, A::EmailEnabled),
        "widgetAdded" => decode(value, A::WidgetAdded),
        "pproEligible" => decode(value, A::PrivacyProEligible),
        "pproSubscriber" => decode(value, A::PrivacyProSubscriber),
        "pproDaysSinceSubscribed" => decode(value, A::PrivacyProDaysSinceSubscribed),
        "pproDaysUntilExpiryOrRenewal" => decode(value, A::PrivacyProDaysUntilExpiry),
        "pproPurchasePlatform" => decode(value, A::PrivacyProPurchasePlatform),
        "pproSubscriptionStatus" => decode(value, A::PrivacyProSubscriptionStatus),
        "isCurrentPProSubscriber" => decode(value, A::IsCurrentPrivacyProSubscriber),
        "messageShown" => decode(value, A::MessageShown),
        _ => None,
    };

    attribute.unwrap_or_else(|| {
        tracing::debug!(key, "Unknown or malformed matching attribute");
        A::Unknown {
            fallback: value.get("fallback").and_then(Value::as_bool),
        }
    })
}

fn decode<T: DeserializeOwned>(
    value: &Value,
    wrap: fn(T) -> MatchingAttribute,
) -> Option<MatchingAttribute> {
    T::deserialize(value).ok().map(wrap)
}
