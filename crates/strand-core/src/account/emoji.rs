use crate::constants::EMOJI_HISTORY_LIMIT;

/// Recently used emoji, most recent first.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmojiHistory {
    entries: Vec<String>,
}

impl EmojiHistory {
    pub fn from_vec(mut entries: Vec<String>) -> Self {
        let mut seen = std::collections::HashSet::new();
        entries.retain(|e| seen.insert(e.clone()));
        entries.truncate(EMOJI_HISTORY_LIMIT);
        Self { entries }
    }

    /// Move `emoji` to the front. Returns `false` if it already was there.
    pub fn record(&mut self, emoji: &str) -> bool {
        if self.entries.first().map(String::as_str) == Some(emoji) {
            return false;
        }
        self.entries.retain(|e| e != emoji);
        self.entries.insert(0, emoji.to_string());
        self.entries.truncate(EMOJI_HISTORY_LIMIT);
        true
    }

    pub fn as_slice(&self) -> &[String] {
        &self.entries
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.entries.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_moves_to_front() {
        let mut history = EmojiHistory::default();
        assert!(history.record("🤙"));
        assert!(history.record("🔥"));
        assert!(!history.record("🔥"));
        assert!(history.record("🤙"));
        assert_eq!(history.as_slice(), ["🤙".to_string(), "🔥".to_string()]);
    }

    #[test]
    fn test_history_is_capped() {
        let mut history = EmojiHistory::default();
        for i in 0..EMOJI_HISTORY_LIMIT + 5 {
            history.record(&format!(":e{}:", i));
        }
        assert_eq!(history.as_slice().len(), EMOJI_HISTORY_LIMIT);
        assert_eq!(history.as_slice()[0], format!(":e{}:", EMOJI_HISTORY_LIMIT + 4));
    }

    #[test]
    fn test_from_vec_dedups_and_caps() {
        let mut raw: Vec<String> = (0..50).map(|i| i.to_string()).collect();
        raw.insert(1, "0".to_string());
        let history = EmojiHistory::from_vec(raw);
        assert_eq!(history.as_slice().len(), EMOJI_HISTORY_LIMIT);
        assert_eq!(history.as_slice()[1], "1");
    }
}
