//! Composable two-part prompts.
//!
//! A [`Prompt`] carries primary instructions and reminders. Reminders are
//! re-stated near the end of context at send time to counter
//! instruction-forgetting in long conversations. Prompts compose with
//! [`Prompt::and_then`], which is associative, de-duplicates, and has
//! [`Prompt::empty`] as identity.

use std::fmt;
use std::sync::Arc;

use crate::conversation::Conversation;

/// Separator between rendered prompt sections.
pub const SECTION_SEPARATOR: &str = "\n\n---\n\n";

// ─────────────────────────────────────────────────────────────────────────────
// Segments
// ─────────────────────────────────────────────────────────────────────────────

/// One unit of prompt text, evaluated lazily against the conversation.
#[derive(Clone)]
pub enum Segment {
    /// Fixed text.
    Text(String),
    /// Text computed from the current conversation (e.g. live status).
    Dynamic(Arc<dyn Fn(&Conversation) -> String + Send + Sync>),
}

impl Segment {
    /// Render this segment against the conversation.
    pub fn render(&self, conversation: &Conversation) -> String {
        match self {
            Segment::Text(text) => text.clone(),
            Segment::Dynamic(f) => f(conversation),
        }
    }
}

impl PartialEq for Segment {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Segment::Text(a), Segment::Text(b)) => a == b,
            // Closures compare by identity; distinct closures are distinct
            // segments even if they render identically.
            (Segment::Dynamic(a), Segment::Dynamic(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Segment::Text(text) => f.debug_tuple("Text").field(text).finish(),
            Segment::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Prompt
// ─────────────────────────────────────────────────────────────────────────────

/// A composable pair of (primary instructions, reminders).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    primary: Vec<Segment>,
    reminders: Vec<Segment>,
}

impl Prompt {
    /// The identity prompt: nothing to say, nothing to remind.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A prompt with primary instructions only.
    pub fn new(primary: impl Into<String>) -> Self {
        let text = primary.into();
        let mut prompt = Self::default();
        if !text.trim().is_empty() {
            prompt.primary.push(Segment::Text(text));
        }
        prompt
    }

    /// A prompt whose primary text is computed from the conversation.
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn(&Conversation) -> String + Send + Sync + 'static,
    {
        Self {
            primary: vec![Segment::Dynamic(Arc::new(f))],
            reminders: Vec::new(),
        }
    }

    /// Add a reminder, returning the extended prompt.
    pub fn with_reminder(mut self, reminder: impl Into<String>) -> Self {
        let text = reminder.into();
        if !text.trim().is_empty() {
            self.reminders.push(Segment::Text(text));
        }
        self
    }

    /// Add a conversation-dependent reminder.
    pub fn with_dynamic_reminder<F>(mut self, f: F) -> Self
    where
        F: Fn(&Conversation) -> String + Send + Sync + 'static,
    {
        self.reminders.push(Segment::Dynamic(Arc::new(f)));
        self
    }

    /// True if this prompt carries no segments.
    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.reminders.is_empty()
    }

    /// Compose with another prompt.
    ///
    /// Segment lists concatenate as ordered-set unions (duplicates from
    /// `other` are skipped), which makes composition associative with
    /// [`Prompt::empty`] as both left and right identity.
    pub fn and_then(mut self, other: Prompt) -> Prompt {
        for segment in other.primary {
            if !self.primary.contains(&segment) {
                self.primary.push(segment);
            }
        }
        for segment in other.reminders {
            if !self.reminders.contains(&segment) {
                self.reminders.push(segment);
            }
        }
        self
    }

    /// Render primary segments: evaluated, blanks dropped, first occurrence
    /// of each rendered value kept.
    pub fn render_primary(&self, conversation: &Conversation) -> Vec<String> {
        render(&self.primary, conversation)
    }

    /// Render reminder segments, with the same de-duplication.
    pub fn render_reminders(&self, conversation: &Conversation) -> Vec<String> {
        render(&self.reminders, conversation)
    }
}

fn render(segments: &[Segment], conversation: &Conversation) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    for segment in segments {
        let text = segment.render(conversation);
        if text.trim().is_empty() || seen.contains(&text) {
            continue;
        }
        seen.push(text);
    }
    seen
}

/// Join rendered sections with the visible separator, omitting the whole
/// block when no section survived.
pub fn join_sections(sections: Vec<String>) -> Option<String> {
    if sections.is_empty() {
        None
    } else {
        Some(sections.join(SECTION_SEPARATOR))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn convo() -> Conversation {
        Conversation::new()
    }

    #[test]
    fn test_empty_is_identity() {
        let p = Prompt::new("be kind").with_reminder("stay kind");
        assert_eq!(Prompt::empty().and_then(p.clone()), p);
        assert_eq!(p.clone().and_then(Prompt::empty()), p);
    }

    #[test]
    fn test_and_then_associative() {
        let a = Prompt::new("alpha").with_reminder("ra");
        let b = Prompt::new("beta").with_reminder("rb");
        let c = Prompt::new("gamma").with_reminder("rc");

        let left = a.clone().and_then(b.clone()).and_then(c.clone());
        let right = a.and_then(b.and_then(c));
        assert_eq!(left, right);
    }

    #[test]
    fn test_and_then_dedupes_by_value() {
        let a = Prompt::new("same").with_reminder("remember");
        let b = Prompt::new("same").with_reminder("remember");

        let merged = a.and_then(b);
        assert_eq!(merged.render_primary(&convo()), vec!["same"]);
        assert_eq!(merged.render_reminders(&convo()), vec!["remember"]);
    }

    #[test]
    fn test_and_then_never_drops_reminders() {
        let a = Prompt::new("one").with_reminder("r1").with_reminder("r2");
        let b = Prompt::new("two").with_reminder("r3");

        let merged = a.clone().and_then(b.clone());
        let merged_count = merged.render_reminders(&convo()).len();
        let a_count = a.render_reminders(&convo()).len();
        let b_count = b.render_reminders(&convo()).len();
        assert!(merged_count >= a_count.max(b_count));
        assert_eq!(merged_count, 3);
    }

    #[test]
    fn test_blank_primary_omitted() {
        let p = Prompt::new("   ").with_reminder("");
        assert!(p.is_empty());
        assert!(p.render_primary(&convo()).is_empty());
    }

    #[test]
    fn test_dynamic_segment_sees_conversation() {
        let p = Prompt::dynamic(|c| format!("history: {} messages", c.len()));
        let convo = Conversation::new().user("hi").assistant("hello");
        assert_eq!(p.render_primary(&convo), vec!["history: 2 messages"]);
    }

    #[test]
    fn test_distinct_dynamic_segments_both_kept() {
        let p = Prompt::dynamic(|_| "x".to_string()).and_then(Prompt::dynamic(|_| "y".to_string()));
        let rendered = p.render_primary(&convo());
        assert_eq!(rendered, vec!["x", "y"]);
    }

    #[test]
    fn test_identical_renders_deduped_at_render() {
        // Two distinct closures rendering the same text: one section.
        let p = Prompt::dynamic(|_| "same".to_string())
            .and_then(Prompt::dynamic(|_| "same".to_string()));
        assert_eq!(p.render_primary(&convo()), vec!["same"]);
    }

    #[test]
    fn test_join_sections() {
        assert_eq!(join_sections(vec![]), None);
        assert_eq!(join_sections(vec!["a".into()]), Some("a".to_string()));
        assert_eq!(
            join_sections(vec!["a".into(), "b".into()]),
            Some(format!("a{}b", SECTION_SEPARATOR))
        );
    }
}
