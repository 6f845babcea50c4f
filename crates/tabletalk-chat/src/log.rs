//! Per-session conversation log.

use tabletalk_core::ConversationTurn;

/// Ordered, append-only record of one session's turns.
///
/// There is no removal. A host that wants a fresh conversation replaces the
/// whole log (see [`ChatSession::reset`](crate::session::ChatSession::reset)).
#[derive(Debug, Clone, Default)]
pub struct ConversationLog {
    turns: Vec<ConversationTurn>,
}

impl ConversationLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, turn: ConversationTurn) {
        self.turns.push(turn);
    }

    /// Read-only view of every turn in order.
    pub fn all(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Owned copy for callers that outlive the session lock.
    pub fn snapshot(&self) -> Vec<ConversationTurn> {
        self.turns.clone()
    }

    pub fn last(&self) -> Option<&ConversationTurn> {
        self.turns.last()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
