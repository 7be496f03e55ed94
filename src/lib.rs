//! Rust bridge for a cross-platform in-app purchase SDK.
//!
//! Application code issues commands through [`Purchases`]; a platform layer
//! behind a [`bridge::NativeBridge`] runs them against the store and answers
//! with JSON completion messages. Each completion is correlated back to the
//! pending callback for its operation kind and decoded into typed models.

pub mod bridge;
pub mod command;
pub mod config;
pub mod env;
pub mod error;
pub mod internal;
pub mod model;
pub mod purchases;

pub use command::{OperationKind, RequestId};
pub use config::{CorrelationPolicy, PurchasesConfig};
pub use error::{PurchasesError, SdkError};
pub use purchases::{PurchaseOptions, Purchases};
