//! Transcript rendering for the terminal
//!
//! Keeps track of what has already been printed so only new lines go out. When a
//! refetch rewrites earlier history the whole transcript is printed again.

use agent_chat_core::{DeliveryStatus, Message, Role};
use chrono::Local;

/// Incremental transcript printer
#[derive(Debug, Default)]
pub struct TranscriptView {
    rendered: Vec<Message>,
}

impl TranscriptView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lines to print to bring the terminal up to date with `messages`.
    pub fn update(&mut self, messages: &[Message]) -> Vec<String> {
        let keeps_prefix = self.rendered.len() <= messages.len()
            && self
                .rendered
                .iter()
                .zip(messages)
                .all(|(old, new)| old.same_utterance(new));

        let mut lines = Vec::new();
        let start = if keeps_prefix {
            for (old, new) in self.rendered.iter().zip(messages) {
                if new.is_orphaned() && !old.is_orphaned() {
                    lines.push(format!("  ! not delivered: {}", snippet(&new.content)));
                }
            }
            self.rendered.len()
        } else {
            lines.push("-- transcript refreshed --".to_string());
            0
        };

        lines.extend(messages[start..].iter().map(render_message));
        self.rendered = messages.to_vec();
        lines
    }
}

/// One transcript line
pub fn render_message(message: &Message) -> String {
    let speaker = match message.role {
        Role::User => "you",
        Role::Assistant => "agent",
    };
    let suffix = match message.delivery {
        DeliveryStatus::Pending => " …",
        DeliveryStatus::Confirmed => "",
        DeliveryStatus::Orphaned => " (not delivered)",
    };
    let time = message.timestamp.with_timezone(&Local).format("%H:%M:%S");

    format!("[{}] {}: {}{}", time, speaker, message.content, suffix)
}

fn snippet(content: &str) -> String {
    const MAX: usize = 40;
    if content.chars().count() > MAX {
        format!("{}...", content.chars().take(MAX).collect::<String>())
    } else {
        content.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_new_messages_are_printed() {
        let mut view = TranscriptView::new();
        let mut messages = vec![Message::new(Role::User, "Hello")];

        let first = view.update(&messages);
        assert_eq!(first.len(), 1);
        assert!(first[0].ends_with("you: Hello"));

        messages.push(Message::assistant("Hi there"));
        let second = view.update(&messages);
        assert_eq!(second.len(), 1);
        assert!(second[0].ends_with("agent: Hi there"));
    }

    #[test]
    fn test_identical_refetch_prints_nothing() {
        let mut view = TranscriptView::new();
        view.update(&[Message::new(Role::User, "Hello"), Message::assistant("Hi")]);

        // Server copies carry different timestamps and ids.
        let refetched = vec![Message::new(Role::User, "Hello"), Message::assistant("Hi")];
        assert!(view.update(&refetched).is_empty());
    }

    #[test]
    fn test_rewritten_history_reprints_everything() {
        let mut view = TranscriptView::new();
        view.update(&[Message::new(Role::User, "from a1")]);

        let lines = view.update(&[Message::new(Role::User, "from a2")]);
        assert_eq!(lines[0], "-- transcript refreshed --");
        assert!(lines[1].ends_with("you: from a2"));
    }

    #[test]
    fn test_orphaned_message_is_flagged() {
        let mut view = TranscriptView::new();
        let mut message = Message::optimistic_user("Hello");
        let pending = view.update(std::slice::from_ref(&message));
        assert!(pending[0].ends_with("you: Hello …"));

        message.delivery = DeliveryStatus::Orphaned;
        let lines = view.update(&[message]);
        assert_eq!(lines, vec!["  ! not delivered: Hello".to_string()]);
    }
}
