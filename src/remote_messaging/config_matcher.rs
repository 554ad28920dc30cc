//! Selection of the message to show from a remote configuration

use std::collections::HashSet;
use std::sync::Arc;

use super::attributes::{EvaluationResult, MatchingAttribute};
use super::matchers::{
    AppAttributeMatcher, AttributeMatcher, DeviceAttributeMatcher, UserAttributeMatcher,
};
use super::model::{RemoteConfigModel, RemoteConfigRule, RemoteMessageModel};
use super::percentile::PercentileStore;

/// Picks at most one message for the current app, device and user
///
/// Messages are considered in document order and the first eligible one
/// wins. A message is eligible when it has not been dismissed and either has
/// no rules at all, or its matching rules yield [`EvaluationResult::Match`]
/// while its exclusion rules yield [`EvaluationResult::Fail`].
pub struct RemoteMessagingConfigMatcher {
    matchers: [Box<dyn AttributeMatcher>; 3],
    percentile_store: Arc<dyn PercentileStore>,
    dismissed_message_ids: HashSet<String>,
}

impl std::fmt::Debug for RemoteMessagingConfigMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteMessagingConfigMatcher")
            .field("dismissed_message_ids", &self.dismissed_message_ids)
            .finish_non_exhaustive()
    }
}

impl RemoteMessagingConfigMatcher {
    /// Create a matcher
    ///
    /// Attributes are offered to the app, device and user matchers in that
    /// order.
    pub fn new(
        app: AppAttributeMatcher,
        device: DeviceAttributeMatcher,
        user: UserAttributeMatcher,
        percentile_store: Arc<dyn PercentileStore>,
        dismissed_message_ids: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            matchers: [Box::new(app), Box::new(device), Box::new(user)],
            percentile_store,
            dismissed_message_ids: dismissed_message_ids.into_iter().collect(),
        }
    }

    /// Return the first message eligible for display, if any
    #[must_use]
    pub fn evaluate(&self, config: &RemoteConfigModel) -> Option<RemoteMessageModel> {
        for message in &config.messages {
            if self.dismissed_message_ids.contains(&message.id) {
                tracing::debug!(message_id = %message.id, "Skipping dismissed message");
                continue;
            }

            if message.is_unconditional() {
                return Some(message.clone());
            }

            let matching = self.evaluate_matching_rules(&message.matching_rules, &message.id, config);
            let exclusion =
                self.evaluate_exclusion_rules(&message.exclusion_rules, &message.id, config);
            tracing::debug!(
                message_id = %message.id,
                ?matching,
                ?exclusion,
                "Evaluated message rules"
            );

            if matching == EvaluationResult::Match && exclusion == EvaluationResult::Fail {
                return Some(message.clone());
            }
        }
        None
    }

    /// Evaluate a message's matching rules
    ///
    /// An empty list matches.
    #[must_use]
    pub fn evaluate_matching_rules(
        &self,
        rule_ids: &[i64],
        message_id: &str,
        config: &RemoteConfigModel,
    ) -> EvaluationResult {
        self.evaluate_rules(rule_ids, message_id, config, EvaluationResult::Match)
    }

    /// Evaluate a message's exclusion rules
    ///
    /// An empty list does not exclude.
    #[must_use]
    pub fn evaluate_exclusion_rules(
        &self,
        rule_ids: &[i64],
        message_id: &str,
        config: &RemoteConfigModel,
    ) -> EvaluationResult {
        self.evaluate_rules(rule_ids, message_id, config, EvaluationResult::Fail)
    }

    fn evaluate_rules(
        &self,
        rule_ids: &[i64],
        message_id: &str,
        config: &RemoteConfigModel,
        empty: EvaluationResult,
    ) -> EvaluationResult {
        let mut result = empty;
        for &rule_id in rule_ids {
            let Some(rule) = config.rule(rule_id) else {
                tracing::debug!(message_id, rule_id, "Unknown rule id");
                return EvaluationResult::NextMessage;
            };

            // A user outside a rule's rollout fails the whole list
            if !self.in_rollout(rule, message_id) {
                return EvaluationResult::Fail;
            }

            result = self.evaluate_rule(rule);
            if matches!(
                result,
                EvaluationResult::NextMessage | EvaluationResult::Match
            ) {
                return result;
            }
        }
        result
    }

    fn in_rollout(&self, rule: &RemoteConfigRule, message_id: &str) -> bool {
        let Some(before) = rule.target_percentile.and_then(|p| p.before) else {
            return true;
        };
        let percentile = self.percentile_store.percentile(message_id);
        if percentile > before {
            tracing::debug!(message_id, rule_id = rule.id, percentile, before, "Outside rollout");
            return false;
        }
        true
    }

    fn evaluate_rule(&self, rule: &RemoteConfigRule) -> EvaluationResult {
        let mut result = EvaluationResult::Match;
        for attribute in &rule.attributes {
            result = self.evaluate_attribute(attribute);
            if result != EvaluationResult::Match {
                break;
            }
        }
        result
    }

    /// Evaluate one attribute against the available facts
    ///
    /// `Unknown` attributes resolve to their fallback; attributes no matcher
    /// recognises yield [`EvaluationResult::NextMessage`].
    #[must_use]
    pub fn evaluate_attribute(&self, attribute: &MatchingAttribute) -> EvaluationResult {
        if let MatchingAttribute::Unknown { fallback } = attribute {
            return EvaluationResult::from_fallback(*fallback);
        }

        self.matchers
            .iter()
            .find_map(|matcher| matcher.evaluate(attribute))
            .unwrap_or(EvaluationResult::NextMessage)
    }
}
