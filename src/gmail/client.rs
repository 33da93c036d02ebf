use super::types::*;

/// Thin blocking client for the subset of the Gmail REST API this tool
/// consumes: message listing/fetching, label modification, label
/// listing/creation. Token acquisition happens outside (see config
/// `token_command`); the client only attaches the bearer header.
pub struct GmailClient {
    api_url: String,
    user_id: String,
    access_token: String,
}

#[derive(Debug)]
pub enum GmailError {
    Http(String),
    Parse(String),
    Api(String),
}

impl std::fmt::Display for GmailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GmailError::Http(e) => write!(f, "HTTP error: {}", e),
            GmailError::Parse(e) => write!(f, "Parse error: {}", e),
            GmailError::Api(e) => write!(f, "API error: {}", e),
        }
    }
}

fn api_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value["error"]["message"].as_str().map(|s| s.to_string())
}

impl GmailClient {
    pub fn new(api_url: &str, user_id: &str, access_token: &str) -> Self {
        GmailClient {
            api_url: api_url.trim_end_matches('/').to_string(),
            user_id: user_id.to_string(),
            access_token: access_token.to_string(),
        }
    }

    fn user_url(&self, suffix: &str) -> String {
        format!("{}/users/{}/{}", self.api_url, self.user_id, suffix)
    }

    fn auth_header(&self) -> String {
        format!("Bearer {}", self.access_token)
    }

    fn read_response(response: ureq::Response) -> Result<String, GmailError> {
        response
            .into_string()
            .map_err(|e| GmailError::Parse(format!("Failed to read response: {}", e)))
    }

    fn map_http_error(err: ureq::Error) -> GmailError {
        match err {
            ureq::Error::Status(401, _) => {
                GmailError::Http("Authentication failed (401 Unauthorized)".to_string())
            }
            ureq::Error::Status(code, resp) => {
                let body = resp.into_string().unwrap_or_default();
                log_error!("[Gmail] HTTP error {}: {}", code, truncate_str(&body, 200));
                // Error responses carry {"error": {"message": ...}} when the
                // API itself rejected the request.
                if let Some(message) = api_error_message(&body) {
                    return GmailError::Api(format!("HTTP {}: {}", code, message));
                }
                GmailError::Http(format!(
                    "HTTP {} error: {}",
                    code,
                    if body.is_empty() {
                        "(empty response)".to_string()
                    } else {
                        truncate_str(&body, 200).to_string()
                    }
                ))
            }
            e => {
                log_error!("[Gmail] Connection error: {}", e);
                GmailError::Http(e.to_string())
            }
        }
    }

    fn get(&self, url: &str) -> Result<String, GmailError> {
        log_debug!("[Gmail] GET {}", url);
        let response = ureq::get(url)
            .set("Authorization", &self.auth_header())
            .call()
            .map_err(Self::map_http_error)?;
        Self::read_response(response)
    }

    fn post_json(
        &self,
        url: &str,
        body: &impl serde::Serialize,
    ) -> Result<String, GmailError> {
        log_debug!("[Gmail] POST {}", url);
        let response = ureq::post(url)
            .set("Authorization", &self.auth_header())
            .send_json(body)
            .map_err(Self::map_http_error)?;
        Self::read_response(response)
    }

    fn parse<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, GmailError> {
        serde_json::from_str(text).map_err(|e| {
            GmailError::Parse(format!(
                "Failed to parse response: {}. Response was: {}",
                e,
                truncate_str(text, 500)
            ))
        })
    }

    /// List up to `max_results` message ids for the account.
    pub fn list_messages(&self, max_results: u32) -> Result<Vec<MessageRef>, GmailError> {
        let url = self.user_url(&format!("messages?maxResults={}", max_results));
        let text = self.get(&url)?;
        let list: MessageListResponse = Self::parse(&text)?;
        log_info!("[Gmail] messages.list returned {} id(s)", list.messages.len());
        Ok(list.messages)
    }

    /// Fetch a single message. `format` is the API detail level
    /// ("full", "metadata", "minimal").
    pub fn get_message(&self, id: &str, format: &str) -> Result<Message, GmailError> {
        let url = self.user_url(&format!("messages/{}?format={}", id, format));
        let text = self.get(&url)?;
        Self::parse(&text)
    }

    /// Add and remove label ids on a message in one call.
    pub fn modify_message(
        &self,
        id: &str,
        add_label_ids: &[String],
        remove_label_ids: &[String],
    ) -> Result<(), GmailError> {
        let url = self.user_url(&format!("messages/{}/modify", id));
        let body = ModifyRequest {
            add_label_ids,
            remove_label_ids,
        };
        self.post_json(&url, &body)?;
        log_debug!(
            "[Gmail] messages.modify {} add={:?} remove={:?}",
            id,
            add_label_ids,
            remove_label_ids
        );
        Ok(())
    }

    pub fn list_labels(&self) -> Result<Vec<Label>, GmailError> {
        let url = self.user_url("labels");
        let text = self.get(&url)?;
        let list: LabelListResponse = Self::parse(&text)?;
        log_info!("[Gmail] labels.list returned {} label(s)", list.labels.len());
        Ok(list.labels)
    }

    pub fn create_label(&self, name: &str) -> Result<Label, GmailError> {
        let url = self.user_url("labels");
        let text = self.post_json(&url, &CreateLabelRequest { name })?;
        let label: Label = Self::parse(&text)?;
        log_info!("[Gmail] created label '{}' -> {}", label.name, label.id);
        Ok(label)
    }
}
