//! Store products.

use serde::{Deserialize, Serialize};

use crate::model::nullable;

/// Product as listed by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub identifier: String,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub description: String,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub title: String,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub price: f64,
    #[serde(default, alias = "price_string", deserialize_with = "nullable::deserialize")]
    pub price_string: String,
    #[serde(default, alias = "currency_code", deserialize_with = "nullable::deserialize")]
    pub currency_code: String,
    #[serde(default, alias = "intro_price", skip_serializing_if = "Option::is_none")]
    pub intro_price: Option<IntroPrice>,
}

/// Introductory price terms attached to a product.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntroPrice {
    #[serde(deserialize_with = "nullable::deserialize")]
    pub price: f64,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub price_string: String,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub period: String,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub cycles: u32,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub period_unit: String,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub period_number_of_units: u32,
}

impl Product {
    pub fn has_intro_price(&self) -> bool {
        self.intro_price.is_some()
    }
}
