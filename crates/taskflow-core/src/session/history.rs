use crate::models::ChatMessage;

/// Default number of messages kept per session.
pub const DEFAULT_HISTORY_CAP: usize = 1000;

/// Bounded chat log.
///
/// Once a push takes the log past its cap, only the newest
/// `floor(cap * 0.8)` messages are kept.
#[derive(Debug, Clone)]
pub struct ChatHistory {
    messages: Vec<ChatMessage>,
    cap: usize,
}

impl Default for ChatHistory {
    fn default() -> Self {
        Self::with_cap(DEFAULT_HISTORY_CAP)
    }
}

impl ChatHistory {
    pub fn with_cap(cap: usize) -> Self {
        Self {
            messages: Vec::new(),
            cap,
        }
    }

    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
        if self.messages.len() > self.cap {
            let keep = self.cap * 8 / 10;
            let drop = self.messages.len() - keep;
            self.messages.drain(..drop);
            log::info!("Chat history pruned to the newest {keep} messages");
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Page counted back from the newest message.
    ///
    /// `offset` skips that many of the newest messages; the page holds up
    /// to `limit` messages before them, oldest first.
    pub fn page(&self, offset: usize, limit: usize) -> &[ChatMessage] {
        let n = self.messages.len();
        let Some(end) = n.checked_sub(offset).filter(|end| *end > 0) else {
            return &[];
        };
        let start = end.saturating_sub(limit);
        &self.messages[start..end]
    }

    pub fn recent(&self, limit: usize) -> &[ChatMessage] {
        self.page(0, limit)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled(cap: usize, count: usize) -> ChatHistory {
        let mut history = ChatHistory::with_cap(cap);
        for i in 0..count {
            history.push(ChatMessage::user(format!("m{i}")));
        }
        history
    }

    fn contents(messages: &[ChatMessage]) -> Vec<&str> {
        messages.iter().map(|m| m.content.as_str()).collect()
    }

    #[test]
    fn test_prunes_to_eighty_percent() {
        let history = filled(10, 11);
        assert_eq!(history.len(), 8);
        assert_eq!(history.recent(1)[0].content, "m10");
        assert_eq!(history.page(7, 1)[0].content, "m3");
    }

    #[test]
    fn test_default_cap_prunes_to_800() {
        let history = filled(DEFAULT_HISTORY_CAP, DEFAULT_HISTORY_CAP + 1);
        assert_eq!(history.len(), 800);
        assert_eq!(history.recent(1)[0].content, "m1000");
    }

    #[test]
    fn test_paging_from_newest() {
        let history = filled(100, 10);
        assert_eq!(contents(history.page(0, 3)), vec!["m7", "m8", "m9"]);
        assert_eq!(contents(history.page(3, 3)), vec!["m4", "m5", "m6"]);
        assert_eq!(contents(history.page(8, 5)), vec!["m0", "m1"]);
        assert!(history.page(10, 5).is_empty());
        assert!(history.page(25, 5).is_empty());
        assert!(history.page(0, 0).is_empty());
    }
}
