use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex as AsyncMutex};

use sdk_purchases_rust::bridge::{InboundMessage, InboundSource, NativeBridge};
use sdk_purchases_rust::command::{Command, CommandEnvelope, OperationKind, RequestId};
use sdk_purchases_rust::error::{BridgeError, SdkError};

#[derive(Default)]
struct MockBridgeState {
    sent: Vec<CommandEnvelope>,
    responses: HashMap<OperationKind, Value>,
    app_user_id: Option<String>,
    is_anonymous: bool,
}

/// Native bridge stub that records commands and answers scripted completions.
///
/// Scripted responses are queued on the bridge's own inbound source with the
/// command's request id echoed back, the way a platform host would.
pub struct MockBridge {
    state: Mutex<MockBridgeState>,
    fail_sends: AtomicBool,
    inbound_tx: mpsc::UnboundedSender<InboundMessage>,
    inbound_rx: AsyncMutex<mpsc::UnboundedReceiver<InboundMessage>>,
}

#[allow(dead_code)]
impl MockBridge {
    pub fn new() -> Arc<Self> {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            state: Mutex::new(MockBridgeState {
                is_anonymous: true,
                ..Default::default()
            }),
            fail_sends: AtomicBool::new(false),
            inbound_tx,
            inbound_rx: AsyncMutex::new(inbound_rx),
        })
    }

    pub fn with_responses<T>(responses: T) -> Arc<Self>
    where
        T: IntoIterator<Item = (OperationKind, Value)>,
    {
        let bridge = Self::new();
        bridge.state.lock().unwrap().responses = responses.into_iter().collect();
        bridge
    }

    pub fn respond(&self, kind: OperationKind, payload: Value) {
        self.state.lock().unwrap().responses.insert(kind, payload);
    }

    /// Queue an inbound completion as if the native layer produced it.
    pub fn complete(&self, kind: OperationKind, payload: impl Into<String>) {
        self.inbound_tx
            .send(InboundMessage::Completion {
                kind,
                payload: payload.into(),
            })
            .unwrap();
    }

    pub fn push_purchaser_info(&self, payload: impl Into<String>) {
        self.inbound_tx
            .send(InboundMessage::PurchaserInfoUpdated {
                payload: payload.into(),
            })
            .unwrap();
    }

    pub fn set_identity(&self, app_user_id: Option<&str>, is_anonymous: bool) {
        let mut state = self.state.lock().unwrap();
        state.app_user_id = app_user_id.map(str::to_string);
        state.is_anonymous = is_anonymous;
    }

    pub fn set_fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<CommandEnvelope> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn commands(&self) -> Vec<Command> {
        self.sent().into_iter().map(|envelope| envelope.command).collect()
    }

    pub fn last_request_id(&self, kind: OperationKind) -> Option<RequestId> {
        self.sent()
            .into_iter()
            .rev()
            .find(|envelope| envelope.command.kind() == Some(kind))
            .and_then(|envelope| envelope.request_id)
    }
}

impl NativeBridge for MockBridge {
    fn send(&self, envelope: &CommandEnvelope) -> Result<(), SdkError> {
        if self.fail_sends.load(Ordering::SeqCst) {
            return Err(BridgeError::new("mock bridge rejected command").into());
        }

        let mut state = self.state.lock().unwrap();
        state.sent.push(envelope.clone());

        let Some(kind) = envelope.command.kind() else {
            return Ok(());
        };
        if let Some(mut response) = state.responses.get(&kind).cloned() {
            if let (Some(object), Some(request_id)) = (response.as_object_mut(), envelope.request_id)
            {
                object.insert("requestId".into(), Value::from(request_id.get()));
            }
            let _ = self.inbound_tx.send(InboundMessage::Completion {
                kind,
                payload: response.to_string(),
            });
        }
        Ok(())
    }

    fn app_user_id(&self) -> Option<String> {
        self.state.lock().unwrap().app_user_id.clone()
    }

    fn is_anonymous(&self) -> bool {
        self.state.lock().unwrap().is_anonymous
    }
}

#[async_trait]
impl InboundSource for MockBridge {
    async fn next_message(&self) -> Option<InboundMessage> {
        let mut receiver = self.inbound_rx.lock().await;
        receiver.recv().await
    }
}
