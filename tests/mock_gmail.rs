use serde_json::{json, Value};
use std::collections::HashSet;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;

/// A recorded messages.modify call.
#[derive(Debug, Clone, PartialEq)]
pub struct ModifyCall {
    pub message_id: String,
    pub add: Vec<String>,
    pub remove: Vec<String>,
}

#[derive(Default)]
struct ServerState {
    messages: Vec<Value>,
    labels: Vec<(String, String)>, // (id, name)
    modify_calls: Vec<ModifyCall>,
    label_list_calls: usize,
    label_create_calls: usize,
    fail_modify_for: HashSet<String>,
    next_label_seq: usize,
}

pub struct MockGmailServer {
    port: u16,
    state: Arc<Mutex<ServerState>>,
    shutdown: Arc<AtomicBool>,
    handle: Option<thread::JoinHandle<()>>,
}

impl MockGmailServer {
    pub fn start(messages: Vec<Value>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().unwrap().port();
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let state = Arc::new(Mutex::new(ServerState {
            messages,
            next_label_seq: 1,
            ..ServerState::default()
        }));
        let state_clone = state.clone();

        listener
            .set_nonblocking(true)
            .expect("set_nonblocking on listener");

        let handle = thread::spawn(move || {
            Self::serve(listener, state_clone, shutdown_clone);
        });

        MockGmailServer {
            port,
            state,
            shutdown,
            handle: Some(handle),
        }
    }

    /// Base URL to use as the client's api_url.
    pub fn api_url(&self) -> String {
        format!("http://127.0.0.1:{}/gmail/v1", self.port)
    }

    pub fn add_label(&self, id: &str, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.labels.push((id.to_string(), name.to_string()));
    }

    pub fn fail_modify_for(&self, message_id: &str) {
        let mut state = self.state.lock().unwrap();
        state.fail_modify_for.insert(message_id.to_string());
    }

    pub fn clear_modify_failures(&self) {
        let mut state = self.state.lock().unwrap();
        state.fail_modify_for.clear();
    }

    pub fn modify_calls(&self) -> Vec<ModifyCall> {
        self.state.lock().unwrap().modify_calls.clone()
    }

    pub fn label_list_calls(&self) -> usize {
        self.state.lock().unwrap().label_list_calls
    }

    pub fn label_create_calls(&self) -> usize {
        self.state.lock().unwrap().label_create_calls
    }

    pub fn labels(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().labels.clone()
    }

    fn serve(listener: TcpListener, state: Arc<Mutex<ServerState>>, shutdown: Arc<AtomicBool>) {
        while !shutdown.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((stream, _)) => {
                    stream
                        .set_nonblocking(false)
                        .expect("set blocking on stream");
                    stream
                        .set_read_timeout(Some(std::time::Duration::from_secs(5)))
                        .ok();
                    Self::handle_connection(stream, &state);
                }
                Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    thread::sleep(std::time::Duration::from_millis(10));
                    continue;
                }
                Err(_) => break,
            }
        }
    }

    fn handle_connection(mut stream: std::net::TcpStream, state: &Arc<Mutex<ServerState>>) {
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));

        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }

        let mut content_length: usize = 0;
        loop {
            let mut header = String::new();
            if reader.read_line(&mut header).is_err() {
                return;
            }
            let trimmed = header.trim();
            if trimmed.is_empty() {
                break;
            }
            let lower = trimmed.to_lowercase();
            if let Some(val) = lower.strip_prefix("content-length:") {
                if let Ok(len) = val.trim().parse() {
                    content_length = len;
                }
            }
        }

        let body = if content_length > 0 {
            let mut buf = vec![0u8; content_length];
            if reader.read_exact(&mut buf).is_err() {
                return;
            }
            String::from_utf8_lossy(&buf).to_string()
        } else {
            String::new()
        };

        let parts: Vec<&str> = request_line.split_whitespace().collect();
        if parts.len() < 2 {
            return;
        }
        let method = parts[0];
        let path = parts[1].split('?').next().unwrap_or("");

        let (status, response_body) = Self::route(method, path, &body, state);

        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            response_body.len(),
            response_body
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.flush();
    }

    fn route(
        method: &str,
        path: &str,
        body: &str,
        state: &Arc<Mutex<ServerState>>,
    ) -> (String, String) {
        // Paths look like /gmail/v1/users/me/messages/<id>/modify
        let rest = match path.strip_prefix("/gmail/v1/users/") {
            Some(rest) => rest,
            None => {
                return (
                    "404 Not Found".to_string(),
                    json!({"error": "not found"}).to_string(),
                );
            }
        };
        let segments: Vec<&str> = rest.splitn(2, '/').collect();
        let resource = segments.get(1).copied().unwrap_or("");

        let mut state = state.lock().unwrap();

        match (method, resource) {
            ("GET", "messages") => {
                let refs: Vec<Value> = state
                    .messages
                    .iter()
                    .map(|m| {
                        json!({
                            "id": m["id"],
                            "threadId": m["threadId"]
                        })
                    })
                    .collect();
                let count = refs.len();
                (
                    "200 OK".to_string(),
                    json!({"messages": refs, "resultSizeEstimate": count}).to_string(),
                )
            }
            ("GET", "labels") => {
                state.label_list_calls += 1;
                let labels: Vec<Value> = state
                    .labels
                    .iter()
                    .map(|(id, name)| json!({"id": id, "name": name, "type": "user"}))
                    .collect();
                ("200 OK".to_string(), json!({"labels": labels}).to_string())
            }
            ("POST", "labels") => {
                state.label_create_calls += 1;
                let request: Value = match serde_json::from_str(body) {
                    Ok(v) => v,
                    Err(_) => {
                        return (
                            "400 Bad Request".to_string(),
                            json!({"error": "invalid JSON"}).to_string(),
                        );
                    }
                };
                let name = request["name"].as_str().unwrap_or("").to_string();
                let id = format!("Label_{}", state.next_label_seq);
                state.next_label_seq += 1;
                state.labels.push((id.clone(), name.clone()));
                (
                    "200 OK".to_string(),
                    json!({"id": id, "name": name, "type": "user"}).to_string(),
                )
            }
            ("GET", single) if single.starts_with("messages/") => {
                let id = &single["messages/".len()..];
                match state
                    .messages
                    .iter()
                    .find(|m| m["id"].as_str() == Some(id))
                {
                    Some(message) => ("200 OK".to_string(), message.to_string()),
                    None => (
                        "404 Not Found".to_string(),
                        json!({"error": "message not found"}).to_string(),
                    ),
                }
            }
            ("POST", modify) if modify.starts_with("messages/") && modify.ends_with("/modify") => {
                let id = modify["messages/".len()..modify.len() - "/modify".len()].to_string();
                if state.fail_modify_for.contains(&id) {
                    return (
                        "500 Internal Server Error".to_string(),
                        json!({"error": "backend unavailable"}).to_string(),
                    );
                }
                let request: Value = match serde_json::from_str(body) {
                    Ok(v) => v,
                    Err(_) => {
                        return (
                            "400 Bad Request".to_string(),
                            json!({"error": "invalid JSON"}).to_string(),
                        );
                    }
                };
                let to_vec = |key: &str| -> Vec<String> {
                    request[key]
                        .as_array()
                        .map(|arr| {
                            arr.iter()
                                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                                .collect()
                        })
                        .unwrap_or_default()
                };
                let call = ModifyCall {
                    message_id: id.clone(),
                    add: to_vec("addLabelIds"),
                    remove: to_vec("removeLabelIds"),
                };
                state.modify_calls.push(call);
                (
                    "200 OK".to_string(),
                    json!({"id": id, "labelIds": []}).to_string(),
                )
            }
            _ => (
                "404 Not Found".to_string(),
                json!({"error": "not found"}).to_string(),
            ),
        }
    }
}

impl Drop for MockGmailServer {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        if let Some(h) = self.handle.take() {
            let _ = h.join();
        }
    }
}

/// Build a full message JSON body with a single text/plain part.
pub fn test_message(
    id: &str,
    from: &str,
    to: &str,
    subject: &str,
    body_text: &str,
    received_at_secs: i64,
) -> Value {
    use base64::Engine;
    let data = base64::engine::general_purpose::URL_SAFE.encode(body_text);

    json!({
        "id": id,
        "threadId": format!("thread-{}", id),
        "labelIds": ["INBOX", "UNREAD"],
        "snippet": &body_text[..body_text.len().min(100)],
        "internalDate": (received_at_secs * 1000).to_string(),
        "payload": {
            "mimeType": "text/plain",
            "headers": [
                {"name": "From", "value": from},
                {"name": "To", "value": to},
                {"name": "Subject", "value": subject}
            ],
            "body": {"data": data, "size": body_text.len()}
        }
    })
}
