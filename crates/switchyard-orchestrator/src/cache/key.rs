//! Deterministic cache key derivation.

use crate::routing::TaskType;
use sha2::{Digest, Sha256};
use switchyard_abstraction::Message;

// Field separators that cannot appear in a role name.
const FIELD_SEP: u8 = 0x1f;
const RECORD_SEP: u8 = 0x1e;

/// Hex SHA-256 over the normalised messages, task type and model.
///
/// Roles are lower-cased and content is trimmed, so requests that differ only
/// in incidental formatting hash identically.
pub fn digest(messages: &[Message], task_type: &TaskType, model: &str) -> String {
    let mut hasher = Sha256::new();
    for message in messages {
        hasher.update(message.role.as_str().to_lowercase().as_bytes());
        hasher.update([FIELD_SEP]);
        hasher.update(message.content.trim().as_bytes());
        hasher.update([RECORD_SEP]);
    }
    hasher.update([RECORD_SEP]);
    hasher.update(task_type.as_str().as_bytes());
    hasher.update([FIELD_SEP]);
    hasher.update(model.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Full store key: `{namespace}:{task_type}:{model}:{digest}`.
pub fn cache_key(namespace: &str, messages: &[Message], task_type: &TaskType, model: &str) -> String {
    format!("{namespace}:{task_type}:{model}:{}", digest(messages, task_type, model))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> TaskType {
        TaskType::new("simple")
    }

    #[test]
    fn test_key_is_stable() {
        let messages = vec![Message::user("What is Rust?")];
        let first = cache_key("ns", &messages, &task(), "gpt-4o-mini");
        let second = cache_key("ns", &messages, &task(), "gpt-4o-mini");
        assert_eq!(first, second);
        assert!(first.starts_with("ns:simple:gpt-4o-mini:"));
        assert_eq!(first.rsplit(':').next().unwrap().len(), 64);
    }

    #[test]
    fn test_whitespace_and_role_case_collide() {
        let plain: Vec<Message> = serde_json::from_str(r#"[{"role": "user", "content": "What is Rust?"}]"#).unwrap();
        let noisy: Vec<Message> =
            serde_json::from_str(r#"[{"role": "USER", "content": "  What is Rust?\n"}]"#).unwrap();
        assert_eq!(digest(&plain, &task(), "m"), digest(&noisy, &task(), "m"));
    }

    #[test]
    fn test_inputs_are_distinguished() {
        let messages = vec![Message::user("hello")];
        let base = digest(&messages, &task(), "m");
        assert_ne!(base, digest(&messages, &TaskType::new("complex"), "m"));
        assert_ne!(base, digest(&messages, &task(), "other"));
        assert_ne!(base, digest(&[Message::system("hello")], &task(), "m"));
        assert_ne!(
            digest(&[Message::user("ab"), Message::user("c")], &task(), "m"),
            digest(&[Message::user("a"), Message::user("bc")], &task(), "m")
        );
    }
}
