//! Locally persisted user data models.

use crate::payment::PaymentRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::str::FromStr;
use thiserror::Error;

/// Subscription plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Kickstarter,
    #[default]
    Basic,
    Pro,
    Enterprise,
}

impl Plan {
    /// All plans, cheapest first.
    pub const ALL: [Plan; 4] = [Plan::Kickstarter, Plan::Basic, Plan::Pro, Plan::Enterprise];

    /// Monthly list price in USD.
    pub fn price(self) -> f64 {
        match self {
            Plan::Kickstarter => 29.0,
            Plan::Basic => 49.0,
            Plan::Pro => 99.0,
            Plan::Enterprise => 199.0,
        }
    }

    /// Whether the plan includes priority support.
    pub fn has_priority_support(self) -> bool {
        matches!(self, Plan::Pro | Plan::Enterprise)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Plan::Kickstarter => "kickstarter",
            Plan::Basic => "basic",
            Plan::Pro => "pro",
            Plan::Enterprise => "enterprise",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unrecognized plan name
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown plan: {0}")]
pub struct UnknownPlan(pub String);

impl FromStr for Plan {
    type Err = UnknownPlan;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "kickstarter" => Ok(Plan::Kickstarter),
            "basic" => Ok(Plan::Basic),
            "pro" => Ok(Plan::Pro),
            "enterprise" => Ok(Plan::Enterprise),
            _ => Err(UnknownPlan(s.to_string())),
        }
    }
}

/// Subscription status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionStatus {
    Active,
    Inactive,
    #[default]
    Trial,
    Expired,
}

impl std::fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Active => write!(f, "active"),
            SubscriptionStatus::Inactive => write!(f, "inactive"),
            SubscriptionStatus::Trial => write!(f, "trial"),
            SubscriptionStatus::Expired => write!(f, "expired"),
        }
    }
}

/// UI-owned dashboard state. The core only round-trips it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DashboardData {
    pub trades: Vec<Value>,
    pub analytics: Value,
    pub preferences: Value,
    pub chat_history: Vec<Value>,
}

impl Default for DashboardData {
    fn default() -> Self {
        Self {
            trades: Vec::new(),
            analytics: Value::Object(Default::default()),
            preferences: Value::Object(Default::default()),
            chat_history: Vec::new(),
        }
    }
}

/// Local mirror of a user's account and subscription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserData {
    pub user_id: String,
    pub username: String,
    pub email: String,
    pub plan: Plan,
    pub subscription_status: SubscriptionStatus,
    pub join_date: DateTime<Utc>,
    pub last_login: DateTime<Utc>,
    #[serde(default)]
    pub dashboard_data: DashboardData,
    #[serde(default)]
    pub payment_history: Vec<PaymentRecord>,
    #[serde(default = "empty_object")]
    pub profile_data: Value,
}

fn empty_object() -> Value {
    Value::Object(Default::default())
}

impl UserData {
    /// Look up a payment by its provider reference.
    pub fn payment(&self, payment_id: &str) -> Option<&PaymentRecord> {
        self.payment_history
            .iter()
            .find(|p| p.payment_id == payment_id)
    }
}

/// Shallow partial update of a [`UserData`] record.
///
/// `last_login` is owned by the session manager and `payment_history` is
/// append-only, so neither can be patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserDataPatch {
    pub user_id: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub plan: Option<Plan>,
    pub subscription_status: Option<SubscriptionStatus>,
    pub dashboard_data: Option<DashboardData>,
    pub profile_data: Option<Value>,
}

impl UserDataPatch {
    /// Merge the set fields into `user`.
    pub fn apply_to(self, user: &mut UserData) {
        if let Some(user_id) = self.user_id {
            user.user_id = user_id;
        }
        if let Some(username) = self.username {
            user.username = username;
        }
        if let Some(email) = self.email {
            user.email = email;
        }
        if let Some(plan) = self.plan {
            user.plan = plan;
        }
        if let Some(status) = self.subscription_status {
            user.subscription_status = status;
        }
        if let Some(dashboard) = self.dashboard_data {
            user.dashboard_data = dashboard;
        }
        if let Some(profile) = self.profile_data {
            user.profile_data = profile;
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Input for creating a fresh local record
#[derive(Debug, Clone, Default)]
pub struct NewUserData {
    /// Generated when absent
    pub user_id: Option<String>,
    pub username: String,
    pub email: String,
    /// Defaults to `basic`
    pub plan: Option<Plan>,
    /// Defaults to `trial`
    pub subscription_status: Option<SubscriptionStatus>,
    pub profile_data: Option<Value>,
}

/// Result of appending a payment to the history
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// New entry written
    Appended,
    /// An entry with the same `paymentId` already existed; history unchanged
    AlreadyRecorded,
}
