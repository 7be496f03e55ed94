//! Outcome of a purchase command.

use thiserror::Error;

use crate::error::SdkError;
use crate::model::purchaser_info::PurchaserInfo;

/// Successful purchase of a product or package.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseResult {
    pub product_identifier: String,
    pub purchaser_info: PurchaserInfo,
}

/// Failed purchase; `user_cancelled` is reported whatever the error.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct PurchaseFailure {
    pub user_cancelled: bool,
    #[source]
    pub error: SdkError,
}

impl PurchaseFailure {
    pub fn new(error: SdkError, user_cancelled: bool) -> Self {
        Self {
            user_cancelled,
            error,
        }
    }
}

impl From<SdkError> for PurchaseFailure {
    fn from(error: SdkError) -> Self {
        Self::new(error, false)
    }
}
