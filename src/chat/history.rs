/// One completed turn of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub user: String,
    pub assistant: String,
}

/// Every exchange of the current session, oldest first. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    exchanges: Vec<Exchange>,
}

impl ConversationHistory {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn push(&mut self, user: impl Into<String>, assistant: impl Into<String>) {
        self.exchanges.push(Exchange {
            user: user.into(),
            assistant: assistant.into(),
        });
    }

    /// The last `n` exchanges, oldest first
    #[inline]
    pub fn recent(&self, n: usize) -> &[Exchange] {
        let start = self.exchanges.len().saturating_sub(n);
        &self.exchanges[start..]
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}
