//! Attribute matchers for app, device and user facts
//!
//! Each matcher recognises its own group of [`MatchingAttribute`] variants and
//! returns `None` for the rest, so the config matcher can ask them in turn.

use typed_builder::TypedBuilder;

use super::attributes::{EvaluationResult, MatchingAttribute};

/// Evaluates the attributes of one fact group
pub trait AttributeMatcher: Send + Sync {
    /// Evaluate `attribute`, or `None` if it belongs to another group
    fn evaluate(&self, attribute: &MatchingAttribute) -> Option<EvaluationResult>;
}

/// Facts about the running application
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for AppFacts"),
    builder_type(doc = "Builder for AppFacts", vis = "pub"),
    build_method(doc = "Build the AppFacts")
)]
pub struct AppFacts {
    /// Bundle or package identifier
    #[builder(default, setter(strip_option, into))]
    pub app_id: Option<String>,
    /// Marketing version, dotted numeric
    #[builder(default, setter(strip_option, into))]
    pub app_version: Option<String>,
    /// Internal build or internal user
    #[builder(default, setter(strip_option))]
    pub is_internal_user: Option<bool>,
    /// Install cohort
    #[builder(default, setter(strip_option, into))]
    pub atb: Option<String>,
    /// App usage cohort
    #[builder(default, setter(strip_option, into))]
    pub app_atb: Option<String>,
    /// Search cohort
    #[builder(default, setter(strip_option, into))]
    pub search_atb: Option<String>,
    /// Experiment variant
    #[builder(default, setter(strip_option, into))]
    pub exp_variant: Option<String>,
}

/// Matcher for app attributes
#[derive(Debug, Clone, Default)]
pub struct AppAttributeMatcher {
    facts: AppFacts,
}

impl AppAttributeMatcher {
    /// Create a matcher over `facts`
    #[must_use]
    pub fn new(facts: AppFacts) -> Self {
        Self { facts }
    }
}

impl AttributeMatcher for AppAttributeMatcher {
    fn evaluate(&self, attribute: &MatchingAttribute) -> Option<EvaluationResult> {
        let facts = &self.facts;
        let result = match attribute {
            MatchingAttribute::IsInternalUser(a) => a.evaluate(facts.is_internal_user),
            MatchingAttribute::AppId(a) => a.evaluate(facts.app_id.as_deref()),
            MatchingAttribute::AppVersion(a) => a.evaluate(facts.app_version.as_deref()),
            MatchingAttribute::Atb(a) => a.evaluate(facts.atb.as_deref()),
            MatchingAttribute::AppAtb(a) => a.evaluate(facts.app_atb.as_deref()),
            MatchingAttribute::SearchAtb(a) => a.evaluate(facts.search_atb.as_deref()),
            MatchingAttribute::ExpVariant(a) => a.evaluate(facts.exp_variant.as_deref()),
            _ => return None,
        };
        Some(result)
    }
}

/// Facts about the device
#[derive(Debug, Clone, Default)]
pub struct DeviceFacts {
    /// Locale identifier, normalised to `en-US` form
    pub locale: Option<String>,
    /// OS version, dotted numeric
    pub os_version: Option<String>,
    /// Form factor such as `phone`, `tablet` or `desktop`
    pub form_factor: Option<String>,
}

impl DeviceFacts {
    /// Facts from raw platform values
    ///
    /// `locale` may use either `_` or `-` as separator.
    #[must_use]
    pub fn new(locale: Option<&str>, os_version: Option<&str>, form_factor: Option<&str>) -> Self {
        Self {
            locale: locale.map(normalize_locale),
            os_version: os_version.map(str::to_string),
            form_factor: form_factor.map(str::to_string),
        }
    }
}

/// Rewrite `en_US` style identifiers as `en-US`
#[must_use]
pub fn normalize_locale(locale: &str) -> String {
    locale.replace('_', "-")
}

/// Matcher for device attributes
#[derive(Debug, Clone, Default)]
pub struct DeviceAttributeMatcher {
    facts: DeviceFacts,
}

impl DeviceAttributeMatcher {
    /// Create a matcher over `facts`
    #[must_use]
    pub fn new(facts: DeviceFacts) -> Self {
        Self { facts }
    }
}

impl AttributeMatcher for DeviceAttributeMatcher {
    fn evaluate(&self, attribute: &MatchingAttribute) -> Option<EvaluationResult> {
        let facts = &self.facts;
        let result = match attribute {
            MatchingAttribute::Locale(a) => a.evaluate(facts.locale.as_deref()),
            MatchingAttribute::OsApi(a) => a.evaluate(facts.os_version.as_deref()),
            MatchingAttribute::FormFactor(a) => a.evaluate(facts.form_factor.as_deref()),
            _ => return None,
        };
        Some(result)
    }
}

/// Facts about the user and their subscription
#[derive(Debug, Clone, Default, TypedBuilder)]
#[builder(
    builder_method(doc = "Create a new builder for UserFacts"),
    builder_type(doc = "Builder for UserFacts", vis = "pub"),
    build_method(doc = "Build the UserFacts")
)]
pub struct UserFacts {
    /// Current theme name
    #[builder(default, setter(strip_option, into))]
    pub app_theme: Option<String>,
    /// Number of bookmarks
    #[builder(default, setter(strip_option))]
    pub bookmarks_count: Option<i64>,
    /// Number of favorites
    #[builder(default, setter(strip_option))]
    pub favorites_count: Option<i64>,
    /// Days since the app was installed
    #[builder(default, setter(strip_option))]
    pub days_since_installed: Option<i64>,
    /// Email protection is enabled
    #[builder(default, setter(strip_option))]
    pub is_email_enabled: Option<bool>,
    /// A home screen widget is installed
    #[builder(default, setter(strip_option))]
    pub is_widget_installed: Option<bool>,
    /// The user may purchase a subscription
    #[builder(default, setter(strip_option))]
    pub is_privacy_pro_eligible: Option<bool>,
    /// The user has ever subscribed
    #[builder(default, setter(strip_option))]
    pub is_privacy_pro_subscriber: Option<bool>,
    /// Days since the subscription started
    #[builder(default, setter(strip_option))]
    pub privacy_pro_days_since_subscribed: Option<i64>,
    /// Days until the subscription expires or renews
    #[builder(default, setter(strip_option))]
    pub privacy_pro_days_until_expiry: Option<i64>,
    /// Store the subscription was bought from
    #[builder(default, setter(strip_option, into))]
    pub privacy_pro_purchase_platform: Option<String>,
    /// Subscription status such as `active` or `expired`
    #[builder(default, setter(strip_option, into))]
    pub privacy_pro_subscription_status: Option<String>,
    /// The user has an active subscription right now
    #[builder(default, setter(strip_option))]
    pub is_current_privacy_pro_subscriber: Option<bool>,
    /// Ids of messages already shown
    #[builder(default, setter(strip_option))]
    pub shown_message_ids: Option<Vec<String>>,
}

/// Matcher for user attributes
#[derive(Debug, Clone, Default)]
pub struct UserAttributeMatcher {
    facts: UserFacts,
}

impl UserAttributeMatcher {
    /// Create a matcher over `facts`
    #[must_use]
    pub fn new(facts: UserFacts) -> Self {
        Self { facts }
    }
}

impl AttributeMatcher for UserAttributeMatcher {
    fn evaluate(&self, attribute: &MatchingAttribute) -> Option<EvaluationResult> {
        let facts = &self.facts;
        let result = match attribute {
            MatchingAttribute::AppTheme(a) => a.evaluate(facts.app_theme.as_deref()),
            MatchingAttribute::Bookmarks(a) => a.evaluate(facts.bookmarks_count),
            MatchingAttribute::Favorites(a) => a.evaluate(facts.favorites_count),
            MatchingAttribute::DaysSinceInstalled(a) => a.evaluate(facts.days_since_installed),
            MatchingAttribute::EmailEnabled(a) => a.evaluate(facts.is_email_enabled),
            MatchingAttribute::WidgetAdded(a) => a.evaluate(facts.is_widget_installed),
            MatchingAttribute::PrivacyProEligible(a) => a.evaluate(facts.is_privacy_pro_eligible),
            MatchingAttribute::PrivacyProSubscriber(a) => {
                a.evaluate(facts.is_privacy_pro_subscriber)
            }
            MatchingAttribute::PrivacyProDaysSinceSubscribed(a) => {
                a.evaluate(facts.privacy_pro_days_since_subscribed)
            }
            MatchingAttribute::PrivacyProDaysUntilExpiry(a) => {
                a.evaluate(facts.privacy_pro_days_until_expiry)
            }
            MatchingAttribute::PrivacyProPurchasePlatform(a) => {
                a.evaluate(facts.privacy_pro_purchase_platform.as_deref())
            }
            MatchingAttribute::PrivacyProSubscriptionStatus(a) => {
                a.evaluate(facts.privacy_pro_subscription_status.as_deref())
            }
            MatchingAttribute::IsCurrentPrivacyProSubscriber(a) => {
                a.evaluate(facts.is_current_privacy_pro_subscriber)
            }
            MatchingAttribute::MessageShown(a) => a.evaluate_any(facts.shown_message_ids.as_deref()),
            _ => return None,
        };
        Some(result)
    }
}
