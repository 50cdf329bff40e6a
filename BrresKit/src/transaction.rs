//! Diagnostics sink for partially-successful decodes.
//!
//! A read reports recoverable problems through a [`TransactionSink`] instead
//! of failing outright. The sink collects messages and tracks a terminal
//! [`TransactionState`] that only ever escalates during one read.

use serde::Serialize;

/// Severity of a reported message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum MessageClass {
    Error,
    Warning,
}

/// Terminal state of a transaction.
///
/// Ordered by severity: `Success < FailureToSave < Failure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize)]
pub enum TransactionState {
    /// Everything decoded.
    #[default]
    Success,
    /// Decoded, but writing the model back is blocked.
    FailureToSave,
    /// At least one section failed to decode.
    Failure,
}

/// Consumer-provided diagnostics interface.
pub trait TransactionSink {
    /// Report a message for the given logical path (e.g. `MDL0/Meshes/body`).
    fn callback(&mut self, class: MessageClass, path: &str, message: &str);

    /// Current terminal state.
    fn state(&self) -> TransactionState;

    /// Overwrite the terminal state.
    fn set_state(&mut self, state: TransactionState);

    /// Raise the state to `state` unless it is already more severe.
    fn escalate(&mut self, state: TransactionState) {
        if state > self.state() {
            self.set_state(state);
        }
    }
}

/// A single collected diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IoMessage {
    pub class: MessageClass,
    pub path: String,
    pub message: String,
}

/// Collecting sink that also forwards every message to `tracing`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct IoTransaction {
    messages: Vec<IoMessage>,
    state: TransactionState,
}

impl IoTransaction {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages in report order.
    #[must_use]
    pub fn messages(&self) -> &[IoMessage] {
        &self.messages
    }

    /// Number of messages of the given class.
    #[must_use]
    pub fn count(&self, class: MessageClass) -> usize {
        self.messages.iter().filter(|m| m.class == class).count()
    }

    /// True when the model may be written back.
    #[must_use]
    pub fn can_save(&self) -> bool {
        self.state == TransactionState::Success
    }
}

impl TransactionSink for IoTransaction {
    fn callback(&mut self, class: MessageClass, path: &str, message: &str) {
        match class {
            MessageClass::Error => tracing::error!("{}: {}", path, message),
            MessageClass::Warning => tracing::warn!("{}: {}", path, message),
        }
        self.messages.push(IoMessage {
            class,
            path: path.to_string(),
            message: message.to_string(),
        });
    }

    fn state(&self) -> TransactionState {
        self.state
    }

    fn set_state(&mut self, state: TransactionState) {
        self.state = state;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escalate_never_downgrades() {
        let mut tx = IoTransaction::new();
        tx.escalate(TransactionState::Failure);
        tx.escalate(TransactionState::FailureToSave);
        assert_eq!(tx.state(), TransactionState::Failure);
        assert!(!tx.can_save());
    }

    #[test]
    fn test_messages_are_collected() {
        let mut tx = IoTransaction::new();
        tx.callback(MessageClass::Warning, "MDL0", "first");
        tx.callback(MessageClass::Error, "MDL0/Bones", "second");
        assert_eq!(tx.messages().len(), 2);
        assert_eq!(tx.count(MessageClass::Error), 1);
        assert_eq!(tx.messages()[1].path, "MDL0/Bones");
        assert_eq!(tx.state(), TransactionState::Success);
    }
}
