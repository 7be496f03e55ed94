//! Subscriber state snapshot and entitlement details.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::model::{millis, nullable};

/// Kind of period an entitlement is currently in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum PeriodType {
    #[default]
    Normal,
    Intro,
    Trial,
    Unknown,
}

impl From<String> for PeriodType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "NORMAL" => PeriodType::Normal,
            "INTRO" => PeriodType::Intro,
            "TRIAL" => PeriodType::Trial,
            _ => PeriodType::Unknown,
        }
    }
}

/// Store an entitlement was unlocked from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum Store {
    AppStore,
    MacAppStore,
    PlayStore,
    Stripe,
    Promotional,
    #[default]
    UnknownStore,
}

impl From<String> for Store {
    fn from(value: String) -> Self {
        match value.as_str() {
            "APP_STORE" => Store::AppStore,
            "MAC_APP_STORE" => Store::MacAppStore,
            "PLAY_STORE" => Store::PlayStore,
            "STRIPE" => Store::Stripe,
            "PROMOTIONAL" => Store::Promotional,
            _ => Store::UnknownStore,
        }
    }
}

/// A single entitlement and its purchase metadata.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntitlementInfo {
    #[serde(deserialize_with = "nullable::deserialize")]
    pub identifier: String,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub is_active: bool,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub will_renew: bool,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub period_type: PeriodType,
    #[serde(rename = "latestPurchaseDateMillis", with = "millis::option")]
    pub latest_purchase_date: Option<OffsetDateTime>,
    #[serde(rename = "originalPurchaseDateMillis", with = "millis::option")]
    pub original_purchase_date: Option<OffsetDateTime>,
    #[serde(rename = "expirationDateMillis", with = "millis::option")]
    pub expiration_date: Option<OffsetDateTime>,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub store: Store,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub product_identifier: String,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub is_sandbox: bool,
    #[serde(rename = "unsubscribeDetectedAtMillis", with = "millis::option")]
    pub unsubscribe_detected_at: Option<OffsetDateTime>,
    #[serde(rename = "billingIssueDetectedAtMillis", with = "millis::option")]
    pub billing_issue_detected_at: Option<OffsetDateTime>,
}

/// Every entitlement the subscriber ever had, and the active subset.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntitlementInfos {
    #[serde(deserialize_with = "nullable::deserialize")]
    pub all: HashMap<String, EntitlementInfo>,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub active: HashMap<String, EntitlementInfo>,
}

/// Immutable snapshot of the subscriber's purchase state.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PurchaserInfo {
    #[serde(deserialize_with = "nullable::deserialize")]
    pub entitlements: EntitlementInfos,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub active_subscriptions: BTreeSet<String>,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub all_purchased_product_identifiers: BTreeSet<String>,
    #[serde(rename = "latestExpirationDateMillis", with = "millis::option")]
    pub latest_expiration_date: Option<OffsetDateTime>,
    #[serde(rename = "firstSeenMillis", with = "millis::option")]
    pub first_seen: Option<OffsetDateTime>,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub original_app_user_id: String,
    #[serde(rename = "requestDateMillis", with = "millis::option")]
    pub request_date: Option<OffsetDateTime>,
    #[serde(rename = "allExpirationDatesMillis", with = "millis::map")]
    pub all_expiration_dates: HashMap<String, Option<OffsetDateTime>>,
    #[serde(rename = "allPurchaseDatesMillis", with = "millis::map")]
    pub all_purchase_dates: HashMap<String, Option<OffsetDateTime>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_application_version: Option<String>,
    #[serde(rename = "managementURL", skip_serializing_if = "Option::is_none")]
    pub management_url: Option<String>,
    #[serde(rename = "originalPurchaseDateMillis", with = "millis::option")]
    pub original_purchase_date: Option<OffsetDateTime>,
}

impl PurchaserInfo {
    /// Identifiers of the currently active entitlements.
    pub fn active_entitlements(&self) -> BTreeSet<String> {
        self.entitlements.active.keys().cloned().collect()
    }

    pub fn is_entitlement_active(&self, identifier: &str) -> bool {
        self.entitlements.active.contains_key(identifier)
    }

    pub fn expiration_date_for_entitlement(&self, identifier: &str) -> Option<OffsetDateTime> {
        self.entitlements
            .all
            .get(identifier)
            .and_then(|entitlement| entitlement.expiration_date)
    }

    pub fn purchase_date_for_entitlement(&self, identifier: &str) -> Option<OffsetDateTime> {
        self.entitlements
            .all
            .get(identifier)
            .and_then(|entitlement| entitlement.latest_purchase_date)
    }

    pub fn expiration_date_for_product(&self, product_identifier: &str) -> Option<OffsetDateTime> {
        self.all_expiration_dates
            .get(product_identifier)
            .copied()
            .flatten()
    }

    pub fn purchase_date_for_product(&self, product_identifier: &str) -> Option<OffsetDateTime> {
        self.all_purchase_dates
            .get(product_identifier)
            .copied()
            .flatten()
    }
}
