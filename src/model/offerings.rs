//! Offerings, their packages and the current-offering reference.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::nullable;
use crate::model::product::Product;

/// Duration-style classification of a package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE", from = "String")]
pub enum PackageType {
    #[default]
    Unknown,
    Custom,
    Lifetime,
    Annual,
    SixMonth,
    ThreeMonth,
    TwoMonth,
    Monthly,
    Weekly,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::Unknown => "UNKNOWN",
            PackageType::Custom => "CUSTOM",
            PackageType::Lifetime => "LIFETIME",
            PackageType::Annual => "ANNUAL",
            PackageType::SixMonth => "SIX_MONTH",
            PackageType::ThreeMonth => "THREE_MONTH",
            PackageType::TwoMonth => "TWO_MONTH",
            PackageType::Monthly => "MONTHLY",
            PackageType::Weekly => "WEEKLY",
        }
    }
}

impl From<String> for PackageType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "CUSTOM" => PackageType::Custom,
            "LIFETIME" => PackageType::Lifetime,
            "ANNUAL" => PackageType::Annual,
            "SIX_MONTH" => PackageType::SixMonth,
            "THREE_MONTH" => PackageType::ThreeMonth,
            "TWO_MONTH" => PackageType::TwoMonth,
            "MONTHLY" => PackageType::Monthly,
            "WEEKLY" => PackageType::Weekly,
            _ => PackageType::Unknown,
        }
    }
}

/// A purchasable product presented as part of an offering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub identifier: String,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub package_type: PackageType,
    pub product: Product,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub offering_identifier: String,
}

/// Ordered group of packages shown together.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "OfferingWire")]
pub struct Offering {
    pub identifier: String,
    pub description: String,
    pub packages: Vec<Package>,
}

#[derive(Deserialize)]
struct OfferingWire {
    identifier: String,
    #[serde(default, alias = "serverDescription", deserialize_with = "nullable::deserialize")]
    description: String,
    #[serde(default, alias = "availablePackages", deserialize_with = "nullable::deserialize")]
    packages: Vec<Package>,
}

impl From<OfferingWire> for Offering {
    fn from(wire: OfferingWire) -> Self {
        let OfferingWire {
            identifier,
            description,
            mut packages,
        } = wire;

        for package in packages.iter_mut() {
            if package.offering_identifier.is_empty() {
                package.offering_identifier = identifier.clone();
            }
        }

        Self {
            identifier,
            description,
            packages,
        }
    }
}

impl Offering {
    pub fn package(&self, identifier: &str) -> Option<&Package> {
        self.packages
            .iter()
            .find(|package| package.identifier == identifier)
    }

    /// First package of the given type, in presentation order.
    pub fn package_of_type(&self, package_type: PackageType) -> Option<&Package> {
        self.packages
            .iter()
            .find(|package| package.package_type == package_type)
    }

    pub fn lifetime(&self) -> Option<&Package> {
        self.package_of_type(PackageType::Lifetime)
    }

    pub fn annual(&self) -> Option<&Package> {
        self.package_of_type(PackageType::Annual)
    }

    pub fn six_month(&self) -> Option<&Package> {
        self.package_of_type(PackageType::SixMonth)
    }

    pub fn three_month(&self) -> Option<&Package> {
        self.package_of_type(PackageType::ThreeMonth)
    }

    pub fn two_month(&self) -> Option<&Package> {
        self.package_of_type(PackageType::TwoMonth)
    }

    pub fn monthly(&self) -> Option<&Package> {
        self.package_of_type(PackageType::Monthly)
    }

    pub fn weekly(&self) -> Option<&Package> {
        self.package_of_type(PackageType::Weekly)
    }
}

/// All offerings keyed by identifier plus the current one.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "OfferingsWire")]
pub struct Offerings {
    #[serde(rename = "current", skip_serializing_if = "Option::is_none")]
    pub current_identifier: Option<String>,
    pub all: HashMap<String, Offering>,
}

#[derive(Deserialize)]
struct OfferingsWire {
    #[serde(default)]
    current: Option<CurrentOffering>,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    all: HashMap<String, Offering>,
}

/// Native layers send the current offering either by id or inline.
#[derive(Deserialize)]
#[serde(untagged)]
enum CurrentOffering {
    Identifier(String),
    Offering(Offering),
}

impl From<OfferingsWire> for Offerings {
    fn from(wire: OfferingsWire) -> Self {
        let mut all = wire.all;
        let current_identifier = match wire.current {
            Some(CurrentOffering::Identifier(id)) => Some(id),
            Some(CurrentOffering::Offering(offering)) => {
                let id = offering.identifier.clone();
                all.entry(id.clone()).or_insert(offering);
                Some(id)
            }
            None => None,
        };

        Self {
            current_identifier,
            all,
        }
    }
}

impl Offerings {
    pub fn current(&self) -> Option<&Offering> {
        self.current_identifier
            .as_deref()
            .and_then(|id| self.all.get(id))
    }

    pub fn get(&self, identifier: &str) -> Option<&Offering> {
        self.all.get(identifier)
    }

    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}
