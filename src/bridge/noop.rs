//! Bridge used where no store is available, such as desktop builds and tests.

use crate::bridge::NativeBridge;
use crate::command::CommandEnvelope;
use crate::error::SdkError;

/// Accepts every command and never answers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBridge;

impl NativeBridge for NoopBridge {
    fn send(&self, envelope: &CommandEnvelope) -> Result<(), SdkError> {
        log::debug!(
            "[noop bridge] dropping command {:?} (request {:?})",
            envelope.command,
            envelope.request_id
        );
        Ok(())
    }

    fn app_user_id(&self) -> Option<String> {
        None
    }

    fn is_anonymous(&self) -> bool {
        true
    }
}
