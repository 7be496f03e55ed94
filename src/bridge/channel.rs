//! In-process bridge backed by tokio channels.
//!
//! The platform host owns the [`NativeEndpoint`]: it pulls commands, runs them
//! against the store on whatever thread it likes, and pushes completions back.
//! Completions are queued to [`ChannelInbound`], so they reach the SDK on its
//! own dispatch task.

use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::{mpsc, Mutex};

use crate::bridge::{InboundMessage, InboundSource, NativeBridge};
use crate::command::{CommandEnvelope, OperationKind};
use crate::error::{BridgeError, SdkError};

#[derive(Debug, Clone)]
struct Identity {
    app_user_id: Option<String>,
    is_anonymous: bool,
}

impl Default for Identity {
    fn default() -> Self {
        Self {
            app_user_id: None,
            is_anonymous: true,
        }
    }
}

/// Create a connected bridge, inbound source and native endpoint.
pub fn pair() -> (ChannelBridge, ChannelInbound, NativeEndpoint) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let identity = Arc::new(RwLock::new(Identity::default()));

    let bridge = ChannelBridge {
        commands: command_tx,
        identity: Arc::clone(&identity),
    };
    let inbound = ChannelInbound {
        receiver: Mutex::new(inbound_rx),
    };
    let endpoint = NativeEndpoint {
        commands: Mutex::new(command_rx),
        inbound: inbound_tx,
        identity,
    };

    (bridge, inbound, endpoint)
}

/// SDK-side half that forwards commands to the native endpoint.
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    commands: mpsc::UnboundedSender<CommandEnvelope>,
    identity: Arc<RwLock<Identity>>,
}

impl NativeBridge for ChannelBridge {
    fn send(&self, envelope: &CommandEnvelope) -> Result<(), SdkError> {
        self.commands
            .send(envelope.clone())
            .map_err(|_| BridgeError::new("native endpoint is no longer receiving commands"))?;
        Ok(())
    }

    fn app_user_id(&self) -> Option<String> {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .app_user_id
            .clone()
    }

    fn is_anonymous(&self) -> bool {
        self.identity
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_anonymous
    }
}

/// Inbound queue drained by [`crate::Purchases::start`].
#[derive(Debug)]
pub struct ChannelInbound {
    receiver: Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
}

#[async_trait::async_trait]
impl InboundSource for ChannelInbound {
    async fn next_message(&self) -> Option<InboundMessage> {
        let mut receiver = self.receiver.lock().await;
        receiver.recv().await
    }
}

/// Native-side half held by the platform host.
#[derive(Debug)]
pub struct NativeEndpoint {
    commands: Mutex<mpsc::UnboundedReceiver<CommandEnvelope>>,
    inbound: mpsc::UnboundedSender<InboundMessage>,
    identity: Arc<RwLock<Identity>>,
}

impl NativeEndpoint {
    /// Next command sent by the SDK, or `None` once every bridge is dropped.
    pub async fn next_command(&self) -> Option<CommandEnvelope> {
        let mut commands = self.commands.lock().await;
        commands.recv().await
    }

    /// Report the completion of a correlated command.
    pub fn complete(&self, kind: OperationKind, payload: impl Into<String>) -> Result<(), SdkError> {
        self.push(InboundMessage::Completion {
            kind,
            payload: payload.into(),
        })
    }

    /// Push purchaser info that changed outside of any command.
    pub fn push_purchaser_info(&self, payload: impl Into<String>) -> Result<(), SdkError> {
        self.push(InboundMessage::PurchaserInfoUpdated {
            payload: payload.into(),
        })
    }

    /// Update the identity reported through [`NativeBridge::app_user_id`].
    pub fn report_identity(&self, app_user_id: Option<String>, is_anonymous: bool) {
        let mut identity = self
            .identity
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        identity.app_user_id = app_user_id;
        identity.is_anonymous = is_anonymous;
    }

    fn push(&self, message: InboundMessage) -> Result<(), SdkError> {
        self.inbound
            .send(message)
            .map_err(|_| BridgeError::new("SDK inbound queue is closed").into())
    }
}
