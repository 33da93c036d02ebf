use crate::gmail::client::{GmailClient, GmailError};
use crate::rules::{format_action, Action, RuleSet};
use crate::store::RecordStore;
use std::collections::HashMap;
use std::time::SystemTime;

const UNREAD: &str = "UNREAD";
const INBOX: &str = "INBOX";

/// Run-scoped label name -> provider label id memo. Created empty for each
/// processing run and handed to the dispatcher explicitly; never persisted.
#[derive(Default)]
pub struct LabelCache {
    ids_by_name: HashMap<String, String>,
}

impl LabelCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn get(&self, name: &str) -> Option<&str> {
        self.ids_by_name.get(name).map(|s| s.as_str())
    }

    fn insert(&mut self, name: String, id: String) {
        self.ids_by_name.insert(name, id);
    }

    fn extend_from_labels(&mut self, labels: Vec<crate::gmail::types::Label>) {
        for label in labels {
            self.ids_by_name.insert(label.name, label.id);
        }
    }
}

#[derive(Debug)]
pub enum ProcessError {
    Store(String),
    Gmail(GmailError),
}

impl std::fmt::Display for ProcessError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessError::Store(e) => write!(f, "store error: {}", e),
            ProcessError::Gmail(e) => write!(f, "provider error: {}", e),
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct ProcessSummary {
    pub scanned: usize,
    pub matched: usize,
    pub processed: usize,
}

fn unix_now() -> i64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

/// Resolve a label name to its provider id: cache first, then one
/// labels.list to fill the cache, then labels.create if still missing.
fn resolve_label_id(
    client: &GmailClient,
    name: &str,
    cache: &mut LabelCache,
) -> Result<String, GmailError> {
    if let Some(id) = cache.get(name) {
        return Ok(id.to_string());
    }

    log_debug!("[Process] Label '{}' not cached, listing labels", name);
    cache.extend_from_labels(client.list_labels()?);
    if let Some(id) = cache.get(name) {
        return Ok(id.to_string());
    }

    log_info!("[Process] Label '{}' does not exist, creating it", name);
    let label = client.create_label(name)?;
    let id = label.id.clone();
    cache.insert(label.name, label.id);
    Ok(id)
}

/// Execute one rule set's action list against a single message, in order.
/// Remote side effects are not transactional: if an action fails, earlier
/// actions in the list have already taken effect and are not rolled back.
pub fn dispatch_actions(
    client: &GmailClient,
    message_id: &str,
    actions: &[Action],
    cache: &mut LabelCache,
) -> Result<(), GmailError> {
    for action in actions {
        log_debug!(
            "[Process] Applying {} to message {}",
            format_action(action),
            message_id
        );
        match action {
            Action::MarkRead => {
                client.modify_message(message_id, &[], &[UNREAD.to_string()])?;
            }
            Action::MarkUnread => {
                client.modify_message(message_id, &[UNREAD.to_string()], &[])?;
            }
            Action::MoveToLabel(name) => {
                if name.eq_ignore_ascii_case(INBOX) {
                    // The system inbox label is re-added as-is; nothing is
                    // removed and no lookup happens.
                    client.modify_message(message_id, &[INBOX.to_string()], &[])?;
                } else {
                    let label_id = resolve_label_id(client, name, cache)?;
                    client.modify_message(message_id, &[label_id], &[INBOX.to_string()])?;
                }
            }
        }
    }
    Ok(())
}

/// Apply one rule set to every unprocessed record in the store.
///
/// Each matched record is a unit of work: dispatch the full action list,
/// then stamp `processed_at` and commit before moving on, so a crash leaves
/// earlier records durably marked and later ones untouched. A provider or
/// store error aborts the whole run; the failing record keeps
/// `processed_at = None` and is retried from the top of its action list on
/// the next run.
pub fn process(
    store: &RecordStore,
    client: &GmailClient,
    rule_set: &RuleSet,
) -> Result<ProcessSummary, ProcessError> {
    let now = unix_now();
    let records = store.unprocessed().map_err(ProcessError::Store)?;
    log_info!(
        "[Process] Loaded {} unprocessed record(s) from the store",
        records.len()
    );

    let mut cache = LabelCache::new();
    let mut summary = ProcessSummary {
        scanned: records.len(),
        ..ProcessSummary::default()
    };

    for record in &records {
        if !rule_set.matches(record, now) {
            log_debug!("[Process] Record {} did not match", record.id);
            continue;
        }
        summary.matched += 1;

        dispatch_actions(client, &record.id, &rule_set.actions, &mut cache)
            .map_err(ProcessError::Gmail)?;

        store
            .mark_processed(&record.id, unix_now())
            .map_err(ProcessError::Store)?;
        summary.processed += 1;

        let action_names = rule_set
            .actions
            .iter()
            .map(format_action)
            .collect::<Vec<_>>()
            .join(", ");
        log_info!(
            "[Process] Applied rules to {} (from='{}' subject='{}'); actions: [{}]",
            record.id,
            record.from_address,
            record.subject,
            action_names
        );
    }

    log_info!(
        "[Process] Run complete: {} scanned, {} matched, {} processed",
        summary.scanned,
        summary.matched,
        summary.processed
    );
    Ok(summary)
}
