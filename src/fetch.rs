use crate::gmail::client::GmailClient;
use crate::gmail::types::{Message, MessagePart};
use crate::store::{MailRecord, RecordStore};
use base64::Engine;

/// Pull up to `max_results` messages from the provider and upsert them into
/// the store. Existing records are updated in place by id; their
/// `processed_at` is untouched.
pub fn fetch_and_store(
    client: &GmailClient,
    store: &RecordStore,
    max_results: u32,
) -> Result<usize, String> {
    let refs = client
        .list_messages(max_results)
        .map_err(|e| e.to_string())?;
    log_info!("[Fetch] Listed {} message id(s)", refs.len());

    let mut records = Vec::with_capacity(refs.len());
    for msg_ref in &refs {
        let message = client
            .get_message(&msg_ref.id, "full")
            .map_err(|e| format!("fetching message {}: {}", msg_ref.id, e))?;
        records.push(record_from_message(&message));
    }

    store.upsert(&records)?;
    log_info!("[Fetch] Stored {} record(s)", records.len());
    Ok(records.len())
}

fn record_from_message(message: &Message) -> MailRecord {
    let body = message
        .payload
        .as_ref()
        .and_then(extract_body_text)
        .or_else(|| message.snippet.clone())
        .unwrap_or_default();

    MailRecord {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        from_address: message.header("From").unwrap_or("").to_string(),
        to_address: message.header("To").unwrap_or("").to_string(),
        subject: message.header("Subject").unwrap_or("").to_string(),
        snippet: body,
        received_at: message.received_at_secs().unwrap_or(0),
        processed_at: None,
    }
}

/// Walk the MIME tree depth-first for the first text/plain part; fall back
/// to the first text/html part rendered as plain text.
fn extract_body_text(payload: &MessagePart) -> Option<String> {
    if let Some(text) = find_part_text(payload, "text/plain") {
        return Some(text);
    }
    if let Some(html) = find_part_text(payload, "text/html") {
        return html2text::from_read(html.as_bytes(), 80).ok();
    }
    None
}

fn find_part_text(part: &MessagePart, mime_type: &str) -> Option<String> {
    for child in &part.parts {
        if let Some(text) = find_part_text(child, mime_type) {
            return Some(text);
        }
    }
    if part.mime_type.as_deref() == Some(mime_type) {
        let data = part.body.as_ref()?.data.as_deref()?;
        let bytes = decode_body_data(data)?;
        return Some(String::from_utf8_lossy(&bytes).into_owned());
    }
    None
}

/// Body data is base64url; padding is inconsistent across parts, so try
/// both engines.
fn decode_body_data(data: &str) -> Option<Vec<u8>> {
    base64::engine::general_purpose::URL_SAFE
        .decode(data)
        .or_else(|_| base64::engine::general_purpose::URL_SAFE_NO_PAD.decode(data))
        .ok()
}
