use chrono::{DateTime, Utc};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;

const PREVIEW_CHARS: usize = 40;

/// A message obtained through a peek
///
/// Carries enough identity (the sequence number) to be targeted by a later
/// remove or resend without peeking again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHandle {
    pub sequence_number: i64,
    pub body: Vec<u8>,
    pub properties: BTreeMap<String, String>,
    pub enqueued_time: DateTime<Utc>,
    pub delivery_count: u32,
}

impl fmt::Display for MessageHandle {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "#{} {} - {}",
            self.sequence_number,
            self.enqueued_time.format("%Y-%m-%d %H:%M:%S"),
            self.preview()
        )
    }
}

impl MessageHandle {
    /// Body decoded as UTF-8, invalid sequences replaced
    pub fn body_text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }

    /// First characters of the body on a single line
    pub fn preview(&self) -> String {
        let text = self.body_text();
        let mut preview: String = text
            .chars()
            .take(PREVIEW_CHARS)
            .map(|c| if c.is_control() { ' ' } else { c })
            .collect();
        if text.chars().count() > PREVIEW_CHARS {
            preview.push('…');
        }
        preview
    }

    pub fn render(&self) -> String {
        let mut out = format!(
            "{} #{} (delivered {}x)\n",
            self.enqueued_time.to_rfc3339(),
            self.sequence_number,
            self.delivery_count
        );
        for (key, value) in &self.properties {
            out.push_str(&format!("{}: {}\n", key, value));
        }
        out.push_str(&self.body_text());
        out
    }
}

/// Payload of a message that is about to be sent
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutgoingMessage {
    pub body: Vec<u8>,
    pub properties: BTreeMap<String, String>,
}

impl OutgoingMessage {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

impl From<&MessageHandle> for OutgoingMessage {
    fn from(message: &MessageHandle) -> Self {
        Self {
            body: message.body.clone(),
            properties: message.properties.clone(),
        }
    }
}
