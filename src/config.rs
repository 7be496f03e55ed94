//! Configuration applied when the bridge is set up.

use serde::{Deserialize, Serialize};

use crate::command::ProductType;

const DEFAULT_UPDATE_BUFFER: usize = 16;

/// How inbound completions are matched to registered callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CorrelationPolicy {
    /// One pending callback per operation kind; a newer registration discards
    /// the older one.
    #[default]
    LatestWins,
    /// Any number of pending callbacks per kind, keyed by request id.
    PerRequest,
}

/// Options for configuring the purchases bridge.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PurchasesConfig {
    pub api_key: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_user_id: Option<String>,
    pub observer_mode: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_defaults_suite_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub product_identifiers: Vec<String>,
    pub product_type: ProductType,
    pub correlation: CorrelationPolicy,
    pub update_buffer: usize,
}

impl Default for PurchasesConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            app_user_id: None,
            observer_mode: false,
            user_defaults_suite_name: None,
            proxy_url: None,
            product_identifiers: Vec::new(),
            product_type: ProductType::default(),
            correlation: CorrelationPolicy::default(),
            update_buffer: DEFAULT_UPDATE_BUFFER,
        }
    }
}

impl PurchasesConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Default::default()
        }
    }

    pub fn with_app_user_id(mut self, app_user_id: impl Into<String>) -> Self {
        self.app_user_id = Some(app_user_id.into());
        self
    }

    pub fn with_correlation(mut self, correlation: CorrelationPolicy) -> Self {
        self.correlation = correlation;
        self
    }

    /// App user id to send at setup; blank ids let the backend generate one.
    pub fn effective_app_user_id(&self) -> Option<&str> {
        self.app_user_id
            .as_deref()
            .filter(|id| !id.trim().is_empty())
    }

    pub fn effective_proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref().filter(|url| !url.is_empty())
    }
}

impl std::fmt::Debug for PurchasesConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PurchasesConfig")
            .field("has_api_key", &!self.api_key.is_empty())
            .field("app_user_id", &self.app_user_id)
            .field("observer_mode", &self.observer_mode)
            .field("user_defaults_suite_name", &self.user_defaults_suite_name)
            .field("proxy_url", &self.proxy_url)
            .field("product_identifiers", &self.product_identifiers)
            .field("product_type", &self.product_type)
            .field("correlation", &self.correlation)
            .field("update_buffer", &self.update_buffer)
            .finish()
    }
}
