//! Boundary between the SDK core and the platform's native purchase layer.

use std::sync::Arc;

use crate::command::{CommandEnvelope, OperationKind};
use crate::error::SdkError;

pub mod channel;
pub mod noop;

/// Capability implemented once per platform to execute store commands.
///
/// `send` must return without waiting for the store; the outcome arrives later
/// as an [`InboundMessage`] on the SDK's inbound path.
pub trait NativeBridge: Send + Sync {
    /// Hand a command to the native layer.
    fn send(&self, envelope: &CommandEnvelope) -> Result<(), SdkError>;

    /// App user id the native layer is currently identified as.
    fn app_user_id(&self) -> Option<String>;

    /// Whether the current app user id was generated anonymously.
    fn is_anonymous(&self) -> bool;
}

/// Convenience alias for trait-object bridges.
pub type DynBridge = Arc<dyn NativeBridge>;

/// Message delivered by the native layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundMessage {
    /// Completion of a correlated command.
    Completion {
        kind: OperationKind,
        payload: String,
    },
    /// Unsolicited purchaser info pushed by the native layer.
    PurchaserInfoUpdated { payload: String },
}

/// Source of inbound messages, drained on the SDK's single dispatch task.
#[async_trait::async_trait]
pub trait InboundSource: Send + Sync {
    /// Next inbound message, or `None` once the native layer has shut down.
    async fn next_message(&self) -> Option<InboundMessage>;
}
