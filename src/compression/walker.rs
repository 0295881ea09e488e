//! Content-tree traversal: candidate collection and locator write-back
//!
//! The walker visits `messages[*].content` only. Locators are plain indices
//! into the payload, which stays structurally untouched between collection
//! and write-back, so every locator remains valid while cache misses resolve
//! concurrently.

use crate::compression::tokens::TokenCounter;
use crate::payload::{coerce_to_text, ContentItem, ContentNode, KnownItem, MessagesPayload};
use serde_json::Value;

/// A text leaf eligible for compression
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub locator: Locator,
    pub text: String,
}

/// Stable address of a text leaf inside the payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    pub message: usize,
    pub slot: Slot,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot {
    /// `content` was a plain string
    WholeContent,
    /// `text` field of a text item
    ItemText(usize),
    /// `content` field of a tool_result item
    ToolResultContent(usize),
    /// `text` field of an unrecognized object item
    OtherText(usize),
    /// An entire non-object list item, coerced to text
    OpaqueItem(usize),
}

/// Collect every compression candidate at or above `min_tokens`
pub fn collect_candidates(
    payload: &MessagesPayload,
    counter: &TokenCounter,
    min_tokens: usize,
) -> Vec<Candidate> {
    let mut candidates = Vec::new();

    for (message, msg) in payload.messages.iter().enumerate() {
        match &msg.content {
            ContentNode::Text(text) => {
                push_eligible(
                    &mut candidates,
                    counter,
                    min_tokens,
                    message,
                    Slot::WholeContent,
                    text.clone(),
                );
            }
            ContentNode::Items(items) => {
                for (index, item) in items.iter().enumerate() {
                    let (slot, text) = match item {
                        ContentItem::Known(KnownItem::Text { text, .. }) => {
                            (Slot::ItemText(index), text.clone())
                        }
                        // Structural invocation, never compressed
                        ContentItem::Known(KnownItem::ToolUse { .. }) => continue,
                        ContentItem::Known(KnownItem::ToolResult { content, .. }) => {
                            (Slot::ToolResultContent(index), coerce_to_text(content))
                        }
                        ContentItem::Other(value) => {
                            if value.is_object() {
                                match value.get("text").and_then(Value::as_str) {
                                    Some(text) => (Slot::OtherText(index), text.to_string()),
                                    None => continue,
                                }
                            } else {
                                (Slot::OpaqueItem(index), coerce_to_text(value))
                            }
                        }
                    };
                    push_eligible(&mut candidates, counter, min_tokens, message, slot, text);
                }
            }
            ContentNode::Unknown(_) => {}
        }
    }

    candidates
}

fn push_eligible(
    candidates: &mut Vec<Candidate>,
    counter: &TokenCounter,
    min_tokens: usize,
    message: usize,
    slot: Slot,
    text: String,
) {
    if counter.count(&text) >= min_tokens {
        candidates.push(Candidate {
            locator: Locator { message, slot },
            text,
        });
    }
}

/// Write one resolved replacement back into the payload. Returns false when
/// the locator no longer matches the payload shape; the leaf is then left
/// untouched rather than corrupted.
pub fn apply_replacement(
    payload: &mut MessagesPayload,
    locator: &Locator,
    replacement: String,
) -> bool {
    let Some(msg) = payload.messages.get_mut(locator.message) else {
        return false;
    };

    match (&locator.slot, &mut msg.content) {
        (Slot::WholeContent, content @ ContentNode::Text(_)) => {
            *content = ContentNode::Text(replacement);
            true
        }
        (Slot::ItemText(index), ContentNode::Items(items)) => match items.get_mut(*index) {
            Some(ContentItem::Known(KnownItem::Text { text, .. })) => {
                *text = replacement;
                true
            }
            _ => false,
        },
        (Slot::ToolResultContent(index), ContentNode::Items(items)) => {
            match items.get_mut(*index) {
                Some(ContentItem::Known(KnownItem::ToolResult { content, .. })) => {
                    *content = Value::String(replacement);
                    true
                }
                _ => false,
            }
        }
        (Slot::OtherText(index), ContentNode::Items(items)) => match items.get_mut(*index) {
            Some(ContentItem::Other(value)) if value.is_object() => {
                value["text"] = Value::String(replacement);
                true
            }
            _ => false,
        },
        (Slot::OpaqueItem(index), ContentNode::Items(items)) => match items.get_mut(*index) {
            Some(item @ ContentItem::Other(_)) => {
                *item = ContentItem::Other(Value::String(replacement));
                true
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> MessagesPayload {
        serde_json::from_value(value).unwrap()
    }

    fn counter() -> TokenCounter {
        TokenCounter::new()
    }

    const LONG: &str = "This is a deliberately repetitive block of prose that easily clears any \
        reasonable minimum token threshold because it keeps going on and on about nothing at all.";

    #[test]
    fn plain_string_content_is_one_candidate() {
        let payload = payload(json!({
            "messages": [{"role": "user", "content": LONG}]
        }));
        let candidates = collect_candidates(&payload, &counter(), 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].locator.slot, Slot::WholeContent);
        assert_eq!(candidates[0].text, LONG);
    }

    #[test]
    fn text_below_threshold_is_never_a_candidate() {
        let payload = payload(json!({
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(collect_candidates(&payload, &counter(), 48).is_empty());
    }

    #[test]
    fn tool_use_is_never_a_candidate_even_with_a_long_input() {
        let payload = payload(json!({
            "messages": [{
                "role": "assistant",
                "content": [
                    {"type": "tool_use", "id": "tu_1", "name": "bash",
                     "input": {"command": LONG.repeat(4)}},
                    {"type": "text", "text": LONG}
                ]
            }]
        }));
        let candidates = collect_candidates(&payload, &counter(), 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].locator.slot, Slot::ItemText(1));
    }

    #[test]
    fn tool_result_content_is_coerced_to_text() {
        let payload = payload(json!({
            "messages": [{
                "role": "user",
                "content": [{
                    "type": "tool_result",
                    "tool_use_id": "tu_1",
                    "content": [{"type": "text", "text": LONG}]
                }]
            }]
        }));
        let candidates = collect_candidates(&payload, &counter(), 1);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].locator.slot, Slot::ToolResultContent(0));
        assert!(candidates[0].text.contains("deliberately repetitive"));
        assert!(candidates[0].text.starts_with('['));
    }

    #[rstest]
    #[case(json!({"type": "reminder", "text": LONG}), Some(Slot::OtherText(0)))]
    #[case(json!({"type": "image", "source": {"data": "abcd"}}), None)]
    #[case(json!(LONG), Some(Slot::OpaqueItem(0)))]
    fn unrecognized_items_follow_the_text_field_rule(
        #[case] item: serde_json::Value,
        #[case] expected: Option<Slot>,
    ) {
        let payload = payload(json!({
            "messages": [{"role": "user", "content": [item]}]
        }));
        let candidates = collect_candidates(&payload, &counter(), 1);
        match expected {
            Some(slot) => {
                assert_eq!(candidates.len(), 1);
                assert_eq!(candidates[0].locator.slot, slot);
            }
            None => assert!(candidates.is_empty()),
        }
    }

    #[test]
    fn nothing_outside_message_content_is_visited() {
        let payload = payload(json!({
            "model": LONG,
            "system": LONG,
            "messages": [{"role": "user", "content": "hi"}]
        }));
        assert!(collect_candidates(&payload, &counter(), 1).is_empty());
    }

    #[test]
    fn replacements_land_on_their_own_locators() {
        let mut payload = payload(json!({
            "messages": [
                {"role": "user", "content": LONG},
                {"role": "user", "content": [
                    {"type": "text", "text": LONG},
                    {"type": "tool_result", "tool_use_id": "t", "content": LONG},
                    {"type": "note", "text": LONG},
                    12345
                ]}
            ]
        }));
        let candidates = collect_candidates(&payload, &counter(), 1);
        assert_eq!(candidates.len(), 5);

        for (i, candidate) in candidates.iter().enumerate() {
            assert!(apply_replacement(
                &mut payload,
                &candidate.locator,
                format!("r{i}")
            ));
        }

        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["messages"][0]["content"], json!("r0"));
        assert_eq!(value["messages"][1]["content"][0]["text"], json!("r1"));
        assert_eq!(value["messages"][1]["content"][1]["content"], json!("r2"));
        assert_eq!(value["messages"][1]["content"][2]["text"], json!("r3"));
        assert_eq!(value["messages"][1]["content"][3], json!("r4"));
    }

    #[test]
    fn stale_locator_is_rejected_not_corrupting() {
        let mut payload = payload(json!({
            "messages": [{"role": "user", "content": "hi"}]
        }));
        let locator = Locator {
            message: 3,
            slot: Slot::WholeContent,
        };
        assert!(!apply_replacement(&mut payload, &locator, "x".into()));
    }
}
