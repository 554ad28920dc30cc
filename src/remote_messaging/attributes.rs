//! Matching attributes and their value semantics
//!
//! A rule is a list of [`MatchingAttribute`]s. Each variant wraps one of a
//! handful of typed value matchers; the attribute matchers in
//! [`super::matchers`] pair them with runtime facts.

use serde::Deserialize;

use super::version::{compare_versions, is_valid_version};

/// Three-valued outcome of evaluating an attribute, rule or rule list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EvaluationResult {
    /// The condition holds
    Match,
    /// The condition does not hold
    Fail,
    /// The condition cannot be resolved, skip to the next message
    NextMessage,
}

impl EvaluationResult {
    /// `Match` for `true`, `Fail` for `false`
    #[must_use]
    pub fn from_bool(value: bool) -> Self {
        if value { Self::Match } else { Self::Fail }
    }

    /// Outcome for an attribute that cannot be checked against facts
    #[must_use]
    pub fn from_fallback(fallback: Option<bool>) -> Self {
        Self::from_bool(fallback.unwrap_or(false))
    }
}

/// Exact boolean match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BoolMatchingAttribute {
    /// Expected value
    pub value: bool,
    /// Result used when the fact is unavailable
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl BoolMatchingAttribute {
    /// Evaluate against a fact, if known
    #[must_use]
    pub fn evaluate(&self, fact: Option<bool>) -> EvaluationResult {
        match fact {
            Some(fact) => EvaluationResult::from_bool(self.value == fact),
            None => EvaluationResult::from_fallback(self.fallback),
        }
    }
}

/// Case-insensitive string match
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StringMatchingAttribute {
    /// Expected value
    pub value: String,
    /// Result used when the fact is unavailable
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl StringMatchingAttribute {
    /// Evaluate against a fact, if known
    #[must_use]
    pub fn evaluate(&self, fact: Option<&str>) -> EvaluationResult {
        match fact {
            Some(fact) => EvaluationResult::from_bool(self.value.to_lowercase() == fact.to_lowercase()),
            None => EvaluationResult::from_fallback(self.fallback),
        }
    }
}

/// Membership in a set of strings, case-insensitive
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StringSetMatchingAttribute {
    /// Accepted values
    pub value: Vec<String>,
    /// Result used when the fact is unavailable
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl StringSetMatchingAttribute {
    /// Whether `candidate` is in the set
    #[must_use]
    pub fn contains(&self, candidate: &str) -> bool {
        let candidate = candidate.to_lowercase();
        self.value.iter().any(|v| v.to_lowercase() == candidate)
    }

    /// Evaluate against a single fact, if known
    #[must_use]
    pub fn evaluate(&self, fact: Option<&str>) -> EvaluationResult {
        match fact {
            Some(fact) => EvaluationResult::from_bool(self.contains(fact)),
            None => EvaluationResult::from_fallback(self.fallback),
        }
    }

    /// Match when any of `facts` is in the set
    #[must_use]
    pub fn evaluate_any(&self, facts: Option<&[String]>) -> EvaluationResult {
        match facts {
            Some(facts) => EvaluationResult::from_bool(facts.iter().any(|f| self.contains(f))),
            None => EvaluationResult::from_fallback(self.fallback),
        }
    }
}

/// Integer equality or inclusive range
///
/// An exact `value` takes precedence over `min`/`max`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct IntRangeMatchingAttribute {
    /// Exact value
    #[serde(default)]
    pub value: Option<i64>,
    /// Inclusive lower bound
    #[serde(default)]
    pub min: Option<i64>,
    /// Inclusive upper bound
    #[serde(default)]
    pub max: Option<i64>,
    /// Result used when the fact is unavailable
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl IntRangeMatchingAttribute {
    /// Evaluate against a fact, if known
    #[must_use]
    pub fn evaluate(&self, fact: Option<i64>) -> EvaluationResult {
        let Some(fact) = fact else {
            return EvaluationResult::from_fallback(self.fallback);
        };
        if let Some(value) = self.value {
            return EvaluationResult::from_bool(value == fact);
        }
        let above_min = self.min.is_none_or(|min| fact >= min);
        let below_max = self.max.is_none_or(|max| fact <= max);
        EvaluationResult::from_bool(above_min && below_max)
    }
}

/// Dotted version equality or inclusive range, compared numerically
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct VersionRangeMatchingAttribute {
    /// Exact version
    #[serde(default)]
    pub value: Option<String>,
    /// Inclusive lower bound, `"0"` when absent
    #[serde(default)]
    pub min: Option<String>,
    /// Inclusive upper bound, unbounded when absent
    #[serde(default)]
    pub max: Option<String>,
    /// Result used when the fact is unavailable
    #[serde(default)]
    pub fallback: Option<bool>,
}

impl VersionRangeMatchingAttribute {
    /// Evaluate against a version fact, if known
    ///
    /// A fact that is not a dotted numeric version always fails, as does a
    /// malformed bound.
    #[must_use]
    pub fn evaluate(&self, fact: Option<&str>) -> EvaluationResult {
        let Some(fact) = fact else {
            return EvaluationResult::from_fallback(self.fallback);
        };
        if !is_valid_version(fact) {
            return EvaluationResult::Fail;
        }

        if let Some(value) = self.value.as_deref().filter(|v| !v.is_empty()) {
            return EvaluationResult::from_bool(
                compare_versions(fact, value) == Some(std::cmp::Ordering::Equal),
            );
        }

        let min = self.min.as_deref().filter(|v| !v.is_empty()).unwrap_or("0");
        let above_min = compare_versions(fact, min).is_some_and(|o| o.is_ge());
        let below_max = match self.max.as_deref().filter(|v| !v.is_empty()) {
            Some(max) => compare_versions(fact, max).is_some_and(|o| o.is_le()),
            None => true,
        };
        EvaluationResult::from_bool(above_min && below_max)
    }
}

/// A typed condition on an app, device or user fact
#[derive(Debug, Clone, PartialEq)]
pub enum MatchingAttribute {
    // App
    /// `isInternalUser`
    IsInternalUser(BoolMatchingAttribute),
    /// `appId`
    AppId(StringMatchingAttribute),
    /// `appVersion`
    AppVersion(VersionRangeMatchingAttribute),
    /// `atb`
    Atb(StringMatchingAttribute),
    /// `appAtb`
    AppAtb(StringMatchingAttribute),
    /// `searchAtb`
    SearchAtb(StringMatchingAttribute),
    /// `expVariant`
    ExpVariant(StringMatchingAttribute),

    // Device
    /// `locale`
    Locale(StringSetMatchingAttribute),
    /// `osApi`
    OsApi(VersionRangeMatchingAttribute),
    /// `formFactor`
    FormFactor(StringSetMatchingAttribute),

    // User
    /// `appTheme`
    AppTheme(StringMatchingAttribute),
    /// `bookmarks`
    Bookmarks(IntRangeMatchingAttribute),
    /// `favorites`
    Favorites(IntRangeMatchingAttribute),
    /// `daysSinceInstalled`
    DaysSinceInstalled(IntRangeMatchingAttribute),
    /// `emailEnabled`
    EmailEnabled(BoolMatchingAttribute),
    /// `widgetAdded`
    WidgetAdded(BoolMatchingAttribute),
    /// `pproEligible`
    PrivacyProEligible(BoolMatchingAttribute),
    /// `pproSubscriber`
    PrivacyProSubscriber(BoolMatchingAttribute),
    /// `pproDaysSinceSubscribed`
    PrivacyProDaysSinceSubscribed(IntRangeMatchingAttribute),
    /// `pproDaysUntilExpiryOrRenewal`
    PrivacyProDaysUntilExpiry(IntRangeMatchingAttribute),
    /// `pproPurchasePlatform`
    PrivacyProPurchasePlatform(StringSetMatchingAttribute),
    /// `pproSubscriptionStatus`
    PrivacyProSubscriptionStatus(StringSetMatchingAttribute),
    /// `isCurrentPProSubscriber`
    IsCurrentPrivacyProSubscriber(BoolMatchingAttribute),
    /// `messageShown`: any of the listed message ids was already shown
    MessageShown(StringSetMatchingAttribute),

    /// Attribute this version does not understand or could not decode
    Unknown {
        /// Result to use in place of evaluation
        fallback: Option<bool>,
    },
}
