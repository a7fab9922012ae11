//! Engagement rate calculation.
//!
//! An engagement rate is the share of some user population meeting a
//! criterion, expressed as a percentage. Where the counts come from is up to
//! the [`EngagementSource`] handed to the [`EngagementCalculator`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::error::Result;

/// How far back a user's previous visit may be for them to count as returning.
pub const RETENTION_WINDOW: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Actions that mark a user as engaged for [`EngagementMethod::ActivityBased`].
pub const ENGAGEMENT_ACTIONS: [EngagementAction; 3] = [
    EngagementAction::SubmittedFeedback,
    EngagementAction::CreatedProfile,
    EngagementAction::UploadedContent,
];

/// `part / whole * 100`, or `0` when `whole` is zero.
pub fn engagement_rate(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    (part as f64 / whole as f64) * 100.0
}

/// Formula used to compute an engagement rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementMethod {
    /// Sessions in the last hour against daily active users.
    SessionBased,
    /// Users who performed a meaningful action against all active users.
    ActivityBased,
    /// Users returning within [`RETENTION_WINDOW`] against all users.
    RetentionBased,
}

impl EngagementMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementMethod::SessionBased => "session_based",
            EngagementMethod::ActivityBased => "activity_based",
            EngagementMethod::RetentionBased => "retention_based",
        }
    }
}

impl fmt::Display for EngagementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing a name that is not an [`EngagementMethod`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown engagement method '{0}'")]
pub struct UnknownEngagementMethod(pub String);

impl FromStr for EngagementMethod {
    type Err = UnknownEngagementMethod;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "session_based" => Ok(EngagementMethod::SessionBased),
            "activity_based" => Ok(EngagementMethod::ActivityBased),
            "retention_based" => Ok(EngagementMethod::RetentionBased),
            other => Err(UnknownEngagementMethod(other.to_string())),
        }
    }
}

/// A user action that counts towards activity-based engagement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngagementAction {
    SubmittedFeedback,
    CreatedProfile,
    UploadedContent,
}

impl EngagementAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngagementAction::SubmittedFeedback => "submitted_feedback",
            EngagementAction::CreatedProfile => "created_profile",
            EngagementAction::UploadedContent => "uploaded_content",
        }
    }
}

/// Supplies the user counts the engagement formulas are built from.
#[async_trait]
pub trait EngagementSource: Send + Sync {
    /// Distinct sessions active during the last hour.
    async fn fetch_active_sessions_last_hour(&self) -> Result<u64>;

    /// Distinct users active today.
    async fn fetch_daily_active_users(&self) -> Result<u64>;

    /// Users who performed at least one of `actions`.
    async fn fetch_users_with_actions(&self, actions: &[EngagementAction]) -> Result<u64>;

    async fn fetch_total_active_users(&self) -> Result<u64>;

    /// Users who came back within `window` of a previous visit.
    async fn fetch_returning_users(&self, window: Duration) -> Result<u64>;

    async fn fetch_total_users(&self) -> Result<u64>;
}

/// Source used until a real data store is wired in. Every count is zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderSource;

#[async_trait]
impl EngagementSource for PlaceholderSource {
    async fn fetch_active_sessions_last_hour(&self) -> Result<u64> {
        Ok(0)
    }

    async fn fetch_daily_active_users(&self) -> Result<u64> {
        Ok(0)
    }

    async fn fetch_users_with_actions(&self, _actions: &[EngagementAction]) -> Result<u64> {
        Ok(0)
    }

    async fn fetch_total_active_users(&self) -> Result<u64> {
        Ok(0)
    }

    async fn fetch_returning_users(&self, _window: Duration) -> Result<u64> {
        Ok(0)
    }

    async fn fetch_total_users(&self) -> Result<u64> {
        Ok(0)
    }
}

/// Computes engagement rates from an [`EngagementSource`].
#[derive(Clone)]
pub struct EngagementCalculator {
    source: Arc<dyn EngagementSource>,
}

impl fmt::Debug for EngagementCalculator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngagementCalculator").finish_non_exhaustive()
    }
}

impl Default for EngagementCalculator {
    fn default() -> Self {
        Self::new(Arc::new(PlaceholderSource))
    }
}

impl EngagementCalculator {
    pub fn new(source: Arc<dyn EngagementSource>) -> Self {
        Self { source }
    }

    /// Compute the engagement rate for `method`, as a percentage.
    ///
    /// A zero reference population yields `0`.
    #[instrument(skip(self))]
    pub async fn calculate(&self, method: EngagementMethod) -> Result<f64> {
        let (part, whole) = match method {
            EngagementMethod::SessionBased => tokio::try_join!(
                self.source.fetch_active_sessions_last_hour(),
                self.source.fetch_daily_active_users()
            )?,
            EngagementMethod::ActivityBased => tokio::try_join!(
                self.source.fetch_users_with_actions(&ENGAGEMENT_ACTIONS),
                self.source.fetch_total_active_users()
            )?,
            EngagementMethod::RetentionBased => tokio::try_join!(
                self.source.fetch_returning_users(RETENTION_WINDOW),
                self.source.fetch_total_users()
            )?,
        };

        let rate = engagement_rate(part, whole);
        debug!(part, whole, rate, "Computed engagement rate");
        Ok(rate)
    }

    /// Like [`calculate`](Self::calculate), but takes the method by name.
    ///
    /// Unrecognised names yield `0`.
    pub async fn calculate_named(&self, method: &str) -> Result<f64> {
        match method.parse::<EngagementMethod>() {
            Ok(method) => self.calculate(method).await,
            Err(e) => {
                debug!("{e}, reporting zero engagement");
                Ok(0.0)
            }
        }
    }
}
