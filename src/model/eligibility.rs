//! Trial and introductory price eligibility.

use serde::{Deserialize, Serialize};

use crate::model::nullable;

/// Eligibility of a product's trial or introductory price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", from = "i64")]
pub enum IntroEligibilityStatus {
    #[default]
    Unknown,
    Ineligible,
    Eligible,
}

impl From<i64> for IntroEligibilityStatus {
    fn from(value: i64) -> Self {
        match value {
            1 => IntroEligibilityStatus::Ineligible,
            2 => IntroEligibilityStatus::Eligible,
            _ => IntroEligibilityStatus::Unknown,
        }
    }
}

impl From<IntroEligibilityStatus> for i64 {
    fn from(status: IntroEligibilityStatus) -> Self {
        match status {
            IntroEligibilityStatus::Unknown => 0,
            IntroEligibilityStatus::Ineligible => 1,
            IntroEligibilityStatus::Eligible => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IntroEligibility {
    #[serde(deserialize_with = "nullable::deserialize")]
    pub status: IntroEligibilityStatus,
    #[serde(deserialize_with = "nullable::deserialize")]
    pub description: String,
}

impl IntroEligibility {
    pub fn is_eligible(&self) -> bool {
        self.status == IntroEligibilityStatus::Eligible
    }
}
