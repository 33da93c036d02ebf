use serde::{Deserialize, Serialize};

// Gmail REST wire types, limited to the fields this tool consumes.

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageListResponse {
    #[serde(default)]
    pub messages: Vec<MessageRef>,
    #[serde(default)]
    #[allow(dead_code)]
    pub next_page_token: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub result_size_estimate: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    #[allow(dead_code)]
    pub thread_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub label_ids: Vec<String>,
    #[serde(default)]
    pub snippet: Option<String>,
    /// Epoch milliseconds, sent by the API as a decimal string.
    #[serde(default)]
    pub internal_date: Option<String>,
    #[serde(default)]
    pub payload: Option<MessagePart>,
}

impl Message {
    /// Case-insensitive header lookup on the top-level payload.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.payload.as_ref().and_then(|p| {
            p.headers
                .iter()
                .find(|h| h.name.eq_ignore_ascii_case(name))
                .map(|h| h.value.as_str())
        })
    }

    /// Received time as unix seconds, from the millisecond `internalDate`.
    pub fn received_at_secs(&self) -> Option<i64> {
        self.internal_date
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .map(|millis| millis / 1000)
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct MessagePart {
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub headers: Vec<Header>,
    #[serde(default)]
    pub body: Option<PartBody>,
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct PartBody {
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    #[allow(dead_code)]
    pub size: Option<u64>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Label {
    pub id: String,
    pub name: String,
    #[serde(default, rename = "type")]
    #[allow(dead_code)]
    pub label_type: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct LabelListResponse {
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModifyRequest<'a> {
    pub add_label_ids: &'a [String],
    pub remove_label_ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub struct CreateLabelRequest<'a> {
    pub name: &'a str,
}

/// Truncate a string for log output without splitting a UTF-8 boundary.
pub fn truncate_str(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_message_and_header_lookup() {
        let json = r#"{
            "id": "m1",
            "threadId": "t1",
            "labelIds": ["INBOX", "UNREAD"],
            "snippet": "Hello there",
            "internalDate": "1750932000000",
            "payload": {
                "mimeType": "text/plain",
                "headers": [
                    {"name": "From", "value": "hr@happyfox.com"},
                    {"name": "Subject", "value": "Assignment"}
                ],
                "body": {"data": "SGVsbG8=", "size": 5}
            }
        }"#;
        let msg: Message = serde_json::from_str(json).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.header("from"), Some("hr@happyfox.com"));
        assert_eq!(msg.header("SUBJECT"), Some("Assignment"));
        assert_eq!(msg.header("To"), None);
        assert_eq!(msg.received_at_secs(), Some(1750932000));
    }

    #[test]
    fn test_parse_empty_message_list() {
        let list: MessageListResponse = serde_json::from_str("{}").unwrap();
        assert!(list.messages.is_empty());
    }

    #[test]
    fn test_truncate_str_respects_char_boundary() {
        assert_eq!(truncate_str("hello", 10), "hello");
        assert_eq!(truncate_str("hello", 3), "hel");
        // 'é' is two bytes; truncating mid-char backs off
        assert_eq!(truncate_str("é", 1), "");
    }
}
