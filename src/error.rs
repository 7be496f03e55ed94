//! Error types exposed by the Rust SDK.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::command::OperationKind;
use crate::model::nullable;

/// Top-level error type for all SDK operations.
#[derive(Debug, Error)]
pub enum SdkError {
    /// Generic error message.
    #[error("{0}")]
    Message(String),

    /// Raised before dispatch when an argument cannot be shaped into a command.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Backend or store error reported by the native layer.
    #[error(transparent)]
    Purchases(#[from] PurchasesError),

    /// Raised when a completion payload does not have the expected shape.
    #[error(transparent)]
    ResponseDecode(#[from] ResponseDecodeError),

    /// Raised when an inbound completion string is not valid JSON.
    #[error(transparent)]
    InboundJson(#[from] InboundJsonError),

    /// Raised when the native boundary refuses a command.
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The pending callback was discarded before a completion arrived.
    #[error("pending {0} request was superseded before it completed")]
    Superseded(OperationKind),

    /// The SDK was closed while the request was pending.
    #[error("purchases bridge closed")]
    Closed,
}

impl SdkError {
    /// Express any failure as the error entity application code receives.
    pub fn to_purchases_error(&self) -> PurchasesError {
        match self {
            SdkError::Purchases(err) => err.clone(),
            SdkError::ResponseDecode(_) | SdkError::InboundJson(_) => {
                PurchasesError::new(
                    ErrorCode::UnexpectedBackendResponse.code(),
                    self.to_string(),
                )
            }
            other => PurchasesError::new(ErrorCode::Unknown.code(), other.to_string()),
        }
    }
}

/// Error entity decoded from the `error` object of a completion.
#[derive(Debug, Error, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[error("{message} (code {code})")]
#[serde(rename_all = "camelCase")]
pub struct PurchasesError {
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub code: i64,
    #[serde(default, deserialize_with = "nullable::deserialize")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underlying_error_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readable_error_code: Option<String>,
}

impl PurchasesError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            underlying_error_message: None,
            readable_error_code: None,
        }
    }

    pub fn with_underlying_message(mut self, message: impl Into<String>) -> Self {
        self.underlying_error_message = Some(message.into());
        self
    }

    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self.code)
    }
}

/// Known error codes reported by the native layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Unknown,
    PurchaseCancelled,
    StoreProblem,
    PurchaseNotAllowed,
    PurchaseInvalid,
    ProductNotAvailableForPurchase,
    ProductAlreadyPurchased,
    ReceiptAlreadyInUse,
    InvalidReceipt,
    MissingReceiptFile,
    Network,
    InvalidCredentials,
    UnexpectedBackendResponse,
    ReceiptInUseByOtherSubscriber,
    InvalidAppUserId,
    OperationAlreadyInProgress,
    UnknownBackend,
    InvalidAppleSubscriptionKey,
    Ineligible,
    InsufficientPermissions,
    PaymentPending,
    InvalidSubscriberAttributes,
    Other(i64),
}

impl ErrorCode {
    pub fn code(&self) -> i64 {
        match self {
            ErrorCode::Unknown => 0,
            ErrorCode::PurchaseCancelled => 1,
            ErrorCode::StoreProblem => 2,
            ErrorCode::PurchaseNotAllowed => 3,
            ErrorCode::PurchaseInvalid => 4,
            ErrorCode::ProductNotAvailableForPurchase => 5,
            ErrorCode::ProductAlreadyPurchased => 6,
            ErrorCode::ReceiptAlreadyInUse => 7,
            ErrorCode::InvalidReceipt => 8,
            ErrorCode::MissingReceiptFile => 9,
            ErrorCode::Network => 10,
            ErrorCode::InvalidCredentials => 11,
            ErrorCode::UnexpectedBackendResponse => 12,
            ErrorCode::ReceiptInUseByOtherSubscriber => 13,
            ErrorCode::InvalidAppUserId => 14,
            ErrorCode::OperationAlreadyInProgress => 15,
            ErrorCode::UnknownBackend => 16,
            ErrorCode::InvalidAppleSubscriptionKey => 17,
            ErrorCode::Ineligible => 18,
            ErrorCode::InsufficientPermissions => 19,
            ErrorCode::PaymentPending => 20,
            ErrorCode::InvalidSubscriberAttributes => 21,
            ErrorCode::Other(code) => *code,
        }
    }
}

impl From<i64> for ErrorCode {
    fn from(code: i64) -> Self {
        match code {
            0 => ErrorCode::Unknown,
            1 => ErrorCode::PurchaseCancelled,
            2 => ErrorCode::StoreProblem,
            3 => ErrorCode::PurchaseNotAllowed,
            4 => ErrorCode::PurchaseInvalid,
            5 => ErrorCode::ProductNotAvailableForPurchase,
            6 => ErrorCode::ProductAlreadyPurchased,
            7 => ErrorCode::ReceiptAlreadyInUse,
            8 => ErrorCode::InvalidReceipt,
            9 => ErrorCode::MissingReceiptFile,
            10 => ErrorCode::Network,
            11 => ErrorCode::InvalidCredentials,
            12 => ErrorCode::UnexpectedBackendResponse,
            13 => ErrorCode::ReceiptInUseByOtherSubscriber,
            14 => ErrorCode::InvalidAppUserId,
            15 => ErrorCode::OperationAlreadyInProgress,
            16 => ErrorCode::UnknownBackend,
            17 => ErrorCode::InvalidAppleSubscriptionKey,
            18 => ErrorCode::Ineligible,
            19 => ErrorCode::InsufficientPermissions,
            20 => ErrorCode::PaymentPending,
            21 => ErrorCode::InvalidSubscriberAttributes,
            other => ErrorCode::Other(other),
        }
    }
}

/// Raised when the native boundary cannot accept a command.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct BridgeError {
    message: String,
}

impl BridgeError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Raised when an inbound completion string cannot be parsed as JSON.
#[derive(Debug, Error)]
#[error("Failed to decode JSON: {snippet}...")]
pub struct InboundJsonError {
    payload: String,
    #[source]
    source: serde_json::Error,
    snippet: String,
}

impl InboundJsonError {
    pub fn new(payload: impl Into<String>, source: serde_json::Error) -> Self {
        let payload = payload.into();
        let snippet = payload.chars().take(100).collect::<String>();
        Self {
            payload,
            source,
            snippet,
        }
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }
}

/// Raised when a completion payload cannot be decoded into a typed model.
#[derive(Debug, Error, Clone)]
#[error("{message}")]
pub struct ResponseDecodeError {
    message: String,
    data: Option<Value>,
}

impl ResponseDecodeError {
    pub fn new(message: impl Into<String>, data: Option<Value>) -> Self {
        Self {
            message: message.into(),
            data,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_ref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
