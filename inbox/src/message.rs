use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One unit of inbox activity as cached by the client.
///
/// Only the fields the updater reasons about are typed. Everything else the
/// server sends (author, body, timestamps...) rides along in `extra` and is
/// carried through every patch untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Key of the message inside one partition.
    pub reference_id: String,
    #[serde(default)]
    pub read: bool,
    #[serde(default = "default_active")]
    pub active: bool,
    /// `None` means the message carries no importance classification.
    #[serde(default)]
    pub important: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_active() -> bool {
    true
}

impl Message {
    pub fn new(reference_id: impl Into<String>) -> Self {
        Self {
            reference_id: reference_id.into(),
            read: false,
            active: true,
            important: None,
            extra: Map::new(),
        }
    }

    pub fn with_important(mut self, important: Option<bool>) -> Self {
        self.important = important;
        self
    }

    pub fn with_read(mut self, read: bool) -> Self {
        self.read = read;
        self
    }

    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Copy of this message with `read` and `active` replaced.
    pub fn with_status(&self, read: bool, active: bool) -> Self {
        Self {
            read,
            active,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_keeps_extra_fields() {
        let json = r#"{
            "referenceId": "m1",
            "read": false,
            "active": true,
            "important": true,
            "body": "hello",
            "author": { "name": "admin" }
        }"#;

        let message: Message = serde_json::from_str(json).unwrap();
        assert_eq!(message.reference_id, "m1");
        assert_eq!(message.important, Some(true));
        assert_eq!(message.extra["body"], "hello");
        assert_eq!(message.extra["author"]["name"], "admin");

        let back = serde_json::to_value(&message).unwrap();
        assert_eq!(back["referenceId"], "m1");
        assert_eq!(back["body"], "hello");
    }

    #[test]
    fn test_deserialize_defaults() {
        let message: Message = serde_json::from_str(r#"{"referenceId":"m2"}"#).unwrap();
        assert!(!message.read);
        assert!(message.active);
        assert_eq!(message.important, None);
    }

    #[test]
    fn test_with_status_only_touches_flags() {
        let mut original = Message::new("m1").with_important(Some(false));
        original
            .extra
            .insert("body".to_string(), Value::from("keep me"));

        let patched = original.with_status(true, false);
        assert!(patched.read);
        assert!(!patched.active);
        assert_eq!(patched.important, Some(false));
        assert_eq!(patched.extra, original.extra);
        assert_eq!(patched.reference_id, original.reference_id);
    }
}
