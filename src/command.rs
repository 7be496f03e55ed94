//! Commands sent to the native boundary and the keys used to correlate their
//! completions.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Category of asynchronous command, used as the correlation key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    Products,
    Purchase,
    Restore,
    CreateAlias,
    Identify,
    Reset,
    PurchaserInfo,
    Offerings,
    TrialEligibility,
}

impl OperationKind {
    pub const ALL: [OperationKind; 9] = [
        OperationKind::Products,
        OperationKind::Purchase,
        OperationKind::Restore,
        OperationKind::CreateAlias,
        OperationKind::Identify,
        OperationKind::Reset,
        OperationKind::PurchaserInfo,
        OperationKind::Offerings,
        OperationKind::TrialEligibility,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Products => "products",
            OperationKind::Purchase => "purchase",
            OperationKind::Restore => "restore",
            OperationKind::CreateAlias => "createAlias",
            OperationKind::Identify => "identify",
            OperationKind::Reset => "reset",
            OperationKind::PurchaserInfo => "purchaserInfo",
            OperationKind::Offerings => "offerings",
            OperationKind::TrialEligibility => "trialEligibility",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifier assigned to every registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "req_{}", self.0)
    }
}

/// Store product category passed to product and purchase commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProductType {
    #[default]
    Subs,
    Inapp,
}

impl ProductType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductType::Subs => "subs",
            ProductType::Inapp => "inapp",
        }
    }
}

/// Upgrade/downgrade policy for replacing an existing subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "i32", from = "i32")]
pub enum ProrationMode {
    #[default]
    UnknownSubscriptionUpgradeDowngradePolicy,
    ImmediateWithTimeProration,
    ImmediateAndChargeProratedPrice,
    ImmediateWithoutProration,
    Deferred,
}

impl From<ProrationMode> for i32 {
    fn from(mode: ProrationMode) -> Self {
        match mode {
            ProrationMode::UnknownSubscriptionUpgradeDowngradePolicy => 0,
            ProrationMode::ImmediateWithTimeProration => 1,
            ProrationMode::ImmediateAndChargeProratedPrice => 2,
            ProrationMode::ImmediateWithoutProration => 3,
            ProrationMode::Deferred => 4,
        }
    }
}

impl From<i32> for ProrationMode {
    fn from(value: i32) -> Self {
        match value {
            1 => ProrationMode::ImmediateWithTimeProration,
            2 => ProrationMode::ImmediateAndChargeProratedPrice,
            3 => ProrationMode::ImmediateWithoutProration,
            4 => ProrationMode::Deferred,
            _ => ProrationMode::UnknownSubscriptionUpgradeDowngradePolicy,
        }
    }
}

/// Reserved subscriber attributes with dedicated native setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SubscriberAttribute {
    Email,
    PhoneNumber,
    DisplayName,
    PushToken,
    AdjustId,
    AppsflyerId,
    FbAnonymousId,
    MparticleId,
    OnesignalId,
    MediaSource,
    Campaign,
    AdGroup,
    Ad,
    Keyword,
    Creative,
}

/// One command understood by the native boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    Setup {
        api_key: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        app_user_id: Option<String>,
        observer_mode: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        user_defaults_suite_name: Option<String>,
    },
    SetProxyUrl {
        proxy_url: String,
    },
    GetProducts {
        product_identifiers: Vec<String>,
        product_type: ProductType,
    },
    PurchaseProduct {
        product_identifier: String,
        product_type: ProductType,
        #[serde(skip_serializing_if = "Option::is_none")]
        old_sku: Option<String>,
        proration_mode: ProrationMode,
    },
    PurchasePackage {
        package_identifier: String,
        offering_identifier: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        old_sku: Option<String>,
        proration_mode: ProrationMode,
    },
    RestoreTransactions,
    CreateAlias {
        new_app_user_id: String,
    },
    Identify {
        app_user_id: String,
    },
    Reset,
    GetPurchaserInfo,
    GetOfferings,
    CheckTrialOrIntroductoryPriceEligibility {
        product_identifiers: Vec<String>,
    },
    SyncPurchases,
    InvalidatePurchaserInfoCache,
    PresentCodeRedemptionSheet,
    SetFinishTransactions {
        finish_transactions: bool,
    },
    SetAllowSharingStoreAccount {
        allow: bool,
    },
    SetDebugLogsEnabled {
        enabled: bool,
    },
    SetSimulatesAskToBuyInSandbox {
        enabled: bool,
    },
    SetAutomaticAppleSearchAdsAttributionCollection {
        enabled: bool,
    },
    SetAttributes {
        attributes: Map<String, Value>,
    },
    SetSubscriberAttribute {
        attribute: SubscriberAttribute,
        value: Option<String>,
    },
    CollectDeviceIdentifiers,
}

impl Command {
    /// Operation kind whose completion answers this command, if any.
    pub fn kind(&self) -> Option<OperationKind> {
        match self {
            Command::GetProducts { .. } => Some(OperationKind::Products),
            Command::PurchaseProduct { .. } | Command::PurchasePackage { .. } => {
                Some(OperationKind::Purchase)
            }
            Command::RestoreTransactions => Some(OperationKind::Restore),
            Command::CreateAlias { .. } => Some(OperationKind::CreateAlias),
            Command::Identify { .. } => Some(OperationKind::Identify),
            Command::Reset => Some(OperationKind::Reset),
            Command::GetPurchaserInfo => Some(OperationKind::PurchaserInfo),
            Command::GetOfferings => Some(OperationKind::Offerings),
            Command::CheckTrialOrIntroductoryPriceEligibility { .. } => {
                Some(OperationKind::TrialEligibility)
            }
            _ => None,
        }
    }
}

/// Command plus the request id the native layer may echo back.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<RequestId>,
    #[serde(flatten)]
    pub command: Command,
}

impl CommandEnvelope {
    /// Envelope for a command that expects a correlated completion.
    pub fn correlated(request_id: RequestId, command: Command) -> Self {
        Self {
            request_id: Some(request_id),
            command,
        }
    }

    /// Envelope for a fire-and-forget command.
    pub fn uncorrelated(command: Command) -> Self {
        Self {
            request_id: None,
            command,
        }
    }

    pub fn to_json(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}
