use std::collections::HashSet;
use std::sync::Mutex;

use serde::Serialize;

use crate::error::SendError;

/// One outgoing notification. The sender address belongs to the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Delivery transport. A returned error affects only that one row.
pub trait Notifier: Send + Sync {
    fn send(&self, message: &Message) -> Result<(), SendError>;
}

/// Subject and body text; `{name}` is replaced with the recipient's name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Template {
    pub subject: String,
    pub body: String,
}

pub const NAME_PLACEHOLDER: &str = "{name}";

impl Default for Template {
    fn default() -> Self {
        Self {
            subject: "感謝您喜愛我們的產品！".to_string(),
            body: "Hi {name},\n\n感謝您喜歡我們的某項產品！我們很高興能為您服務。\n\nBest regards,\nYanwun"
                .to_string(),
        }
    }
}

impl Template {
    pub fn render(&self, to: &str, name: &str) -> Message {
        Message {
            to: to.to_string(),
            subject: self.subject.replace(NAME_PLACEHOLDER, name),
            body: self.body.replace(NAME_PLACEHOLDER, name),
        }
    }
}

/// In-memory [`Notifier`] that records every delivered message and fails
/// for configured recipients.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Message>>,
    attempts: Mutex<Vec<String>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every send to `recipient` fails from now on.
    pub fn fail_for(&self, recipient: impl Into<String>) {
        self.failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(recipient.into());
    }

    /// Successfully delivered messages, in order.
    pub fn sent(&self) -> Vec<Message> {
        self.sent.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    /// Recipients of every attempt, including failed ones.
    pub fn attempts(&self) -> Vec<String> {
        self.attempts.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn send(&self, message: &Message) -> Result<(), SendError> {
        self.attempts
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(message.to.clone());

        if self
            .failing
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&message.to)
        {
            return Err(SendError(format!("recipient {} refused", message.to)));
        }

        self.sent
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn render_substitutes_name_everywhere() {
        let t = Template {
            subject: "Hello {name}".into(),
            body: "{name}, thanks. -- {name}'s team".into(),
        };
        let m = t.render("a@x.com", "Alice");
        assert_eq!(m.to, "a@x.com");
        assert_eq!(m.subject, "Hello Alice");
        assert_eq!(m.body, "Alice, thanks. -- Alice's team");
    }

    #[test]
    fn default_template_greets_by_name() {
        let m = Template::default().render("b@x.com", "Bob");
        assert!(m.body.starts_with("Hi Bob,"));
        assert!(!m.subject.contains(NAME_PLACEHOLDER));
    }

    #[test]
    fn recording_notifier_failures() {
        let n = RecordingNotifier::new();
        n.fail_for("bad@x.com");
        let t = Template::default();
        assert!(n.send(&t.render("ok@x.com", "A")).is_ok());
        assert!(n.send(&t.render("bad@x.com", "B")).is_err());
        assert_eq!(n.sent().len(), 1);
        assert_eq!(n.attempts(), vec!["ok@x.com", "bad@x.com"]);
    }
}
