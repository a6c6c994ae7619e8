//! Session-scoped conversation memory.
//!
//! Each chat session owns one [`ConversationMemory`]: a FIFO window of the
//! most recent turns, capped so long conversations shed their oldest context
//! first. Recency, not access frequency, decides relevance in dialogue, so
//! eviction is FIFO rather than LRU. The [`SessionRegistry`] keys memories by
//! session id; nothing is shared between sessions and nothing is persisted.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;

use crate::text::clip_chars;

/// Default turn cap per session (five exchanges).
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Turns rendered into the prompt context window.
pub const CONTEXT_TURNS: usize = 10;

const USER_CLIP_CHARS: usize = 200;
const ASSISTANT_CLIP_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One utterance in a conversation.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    /// Monotonic within a session; survives eviction, so ids keep climbing.
    pub turn_id: u64,
    pub role: Role,
    pub text: String,
    /// Unix seconds.
    pub timestamp: u64,
    /// For assistant turns, a one-line description of the evidence used.
    pub evidence_summary: Option<String>,
}

/// Externally observable memory state.
#[derive(Debug, Clone, Serialize)]
pub struct MemoryStatus {
    pub conversation_length: usize,
    pub memory_enabled: bool,
}

/// FIFO turn window for one session.
#[derive(Debug)]
pub struct ConversationMemory {
    turns: VecDeque<ConversationTurn>,
    cap: usize,
    next_turn_id: u64,
}

impl ConversationMemory {
    pub fn new(cap: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(cap),
            cap,
            next_turn_id: 0,
        }
    }

    /// Append one turn, evicting the oldest first when the window is full so
    /// the cap holds at every point in between. A zero cap stores nothing.
    pub fn append(
        &mut self,
        role: Role,
        text: impl Into<String>,
        evidence_summary: Option<String>,
    ) -> Option<u64> {
        if self.cap == 0 {
            return None;
        }
        while self.turns.len() >= self.cap {
            self.turns.pop_front();
        }
        let turn_id = self.next_turn_id;
        self.next_turn_id += 1;
        self.turns.push_back(ConversationTurn {
            turn_id,
            role,
            text: text.into(),
            timestamp: unix_now(),
            evidence_summary,
        });
        Some(turn_id)
    }

    /// Record a full question/answer exchange as one step, so a cancelled
    /// request can never leave a dangling user turn behind.
    pub fn commit_exchange(
        &mut self,
        user_text: &str,
        assistant_text: &str,
        evidence_summary: Option<String>,
    ) {
        self.append(Role::User, user_text, None);
        self.append(Role::Assistant, assistant_text, evidence_summary);
    }

    /// The last `max_turns` turns, oldest first.
    pub fn get_context(&self, max_turns: usize) -> Vec<ConversationTurn> {
        let skip = self.turns.len().saturating_sub(max_turns);
        self.turns.iter().skip(skip).cloned().collect()
    }

    /// Render recent turns as a prompt context block, or `None` when there is
    /// nothing to carry over. Turn texts are clipped so a verbose exchange
    /// cannot crowd the rest of the prompt out.
    pub fn render_context(&self, max_turns: usize) -> Option<String> {
        if self.turns.is_empty() || max_turns == 0 {
            return None;
        }
        let skip = self.turns.len().saturating_sub(max_turns);
        let mut out = String::from("[Previous Conversation Context]\n");
        let mut exchange = 0usize;
        let mut open = false;
        for turn in self.turns.iter().skip(skip) {
            match turn.role {
                Role::User => {
                    exchange += 1;
                    out.push_str(&format!("Exchange {exchange}:\n"));
                    out.push_str(&format!(
                        "User: {}...\n",
                        clip_chars(&turn.text, USER_CLIP_CHARS)
                    ));
                    open = true;
                }
                Role::Assistant => {
                    if !open {
                        exchange += 1;
                        out.push_str(&format!("Exchange {exchange}:\n"));
                        open = true;
                    }
                    out.push_str(&format!(
                        "Assistant: {}...\n",
                        clip_chars(&turn.text, ASSISTANT_CLIP_CHARS)
                    ));
                }
            }
        }
        Some(out)
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn cap(&self) -> usize {
        self.cap
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

// ---------------------------------------------------------------------------
// Session registry
// ---------------------------------------------------------------------------

/// Per-session memories keyed by session id. Each memory sits behind its own
/// mutex; concurrent sessions never contend with each other.
pub struct SessionRegistry {
    sessions: DashMap<String, Arc<Mutex<ConversationMemory>>>,
    cap: usize,
}

impl SessionRegistry {
    pub fn new(cap: usize) -> Self {
        Self {
            sessions: DashMap::new(),
            cap,
        }
    }

    /// The memory for `session_id`, created on first use.
    pub fn session(&self, session_id: &str) -> Arc<Mutex<ConversationMemory>> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(ConversationMemory::new(self.cap))))
            .clone()
    }

    /// Clear a session's turns. Returns false when the session was never seen.
    pub fn clear(&self, session_id: &str) -> bool {
        match self.sessions.get(session_id) {
            Some(memory) => {
                memory.lock().expect("session memory lock poisoned").clear();
                true
            }
            None => false,
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cap_holds_after_every_append() {
        let mut memory = ConversationMemory::new(DEFAULT_MAX_TURNS);
        for i in 0..25 {
            memory.append(Role::User, format!("question {i}"), None);
            assert!(memory.len() <= DEFAULT_MAX_TURNS);
        }
        assert_eq!(memory.len(), DEFAULT_MAX_TURNS);
    }

    #[test]
    fn eviction_is_fifo() {
        let mut memory = ConversationMemory::new(3);
        for text in ["a", "b", "c", "d"] {
            memory.append(Role::User, text, None);
        }
        let context = memory.get_context(10);
        let texts: Vec<&str> = context.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["b", "c", "d"]);
    }

    #[test]
    fn turn_ids_survive_eviction() {
        let mut memory = ConversationMemory::new(2);
        for text in ["a", "b", "c"] {
            memory.append(Role::User, text, None);
        }
        let ids: Vec<u64> = memory.get_context(10).iter().map(|t| t.turn_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn get_context_returns_last_n_oldest_first() {
        let mut memory = ConversationMemory::new(10);
        for text in ["a", "b", "c", "d", "e"] {
            memory.append(Role::User, text, None);
        }
        let context = memory.get_context(3);
        let texts: Vec<&str> = context.iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);
    }

    #[test]
    fn commit_exchange_appends_both_roles() {
        let mut memory = ConversationMemory::new(10);
        memory.commit_exchange("how?", "like this", Some("2 relationships".to_string()));

        assert_eq!(memory.len(), 2);
        let turns = memory.get_context(10);
        assert_eq!(turns[0].role, Role::User);
        assert_eq!(turns[1].role, Role::Assistant);
        assert_eq!(turns[1].evidence_summary.as_deref(), Some("2 relationships"));
    }

    #[test]
    fn render_groups_turns_into_exchanges() {
        let mut memory = ConversationMemory::new(10);
        memory.commit_exchange("What is microgravity?", "Near-weightlessness in orbit.", None);
        memory.commit_exchange("Does it weaken bone?", "Yes, density drops.", None);

        let rendered = memory.render_context(CONTEXT_TURNS).unwrap();
        assert!(rendered.starts_with("[Previous Conversation Context]\n"));
        assert!(rendered.contains("Exchange 1:\nUser: What is microgravity?...\n"));
        assert!(rendered.contains("Assistant: Near-weightlessness in orbit....\n"));
        assert!(rendered.contains("Exchange 2:"));
    }

    #[test]
    fn render_clips_long_turns() {
        let mut memory = ConversationMemory::new(10);
        let long_question = "q".repeat(500);
        memory.commit_exchange(&long_question, "short answer", None);

        let rendered = memory.render_context(CONTEXT_TURNS).unwrap();
        assert!(rendered.contains(&format!("User: {}...", "q".repeat(200))));
        assert!(!rendered.contains(&"q".repeat(201)));
    }

    #[test]
    fn empty_memory_renders_no_context() {
        let memory = ConversationMemory::new(10);
        assert!(memory.render_context(CONTEXT_TURNS).is_none());
    }

    #[test]
    fn clear_resets_conversation_length() {
        let mut memory = ConversationMemory::new(10);
        memory.commit_exchange("a", "b", None);
        assert_eq!(memory.len(), 2);

        memory.clear();
        assert_eq!(memory.len(), 0);
        assert!(memory.is_empty());
    }

    #[test]
    fn zero_cap_stores_nothing() {
        let mut memory = ConversationMemory::new(0);
        assert_eq!(memory.append(Role::User, "dropped", None), None);
        assert!(memory.is_empty());
    }

    #[test]
    fn registry_isolates_sessions() {
        let registry = SessionRegistry::new(10);
        registry
            .session("alpha")
            .lock()
            .unwrap()
            .commit_exchange("q", "a", None);

        assert_eq!(registry.session("alpha").lock().unwrap().len(), 2);
        assert_eq!(registry.session("beta").lock().unwrap().len(), 0);
        assert_eq!(registry.session_count(), 2);
    }

    #[test]
    fn registry_clear_only_touches_named_session() {
        let registry = SessionRegistry::new(10);
        registry
            .session("alpha")
            .lock()
            .unwrap()
            .commit_exchange("q", "a", None);
        registry
            .session("beta")
            .lock()
            .unwrap()
            .commit_exchange("q2", "a2", None);

        assert!(registry.clear("alpha"));
        assert_eq!(registry.session("alpha").lock().unwrap().len(), 0);
        assert_eq!(registry.session("beta").lock().unwrap().len(), 2);
        assert!(!registry.clear("never-seen"));
    }
}
