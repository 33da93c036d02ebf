use crate::store::MailRecord;
use serde::Deserialize;
use std::path::Path;

// --- JSON deserialization types ---

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSetDef {
    #[serde(default)]
    pub predicate: Option<String>,
    pub rules: Vec<ConditionDef>,
    pub actions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConditionDef {
    pub field: String,
    pub predicate: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub unit: Option<String>,
}

// --- Compiled types ---

/// A fully parsed rule set: aggregation over an ordered condition list,
/// plus the ordered actions to run on a match. Built once per run from the
/// JSON definition; malformed entries are rejected at load time, never
/// during evaluation.
#[derive(Debug)]
pub struct RuleSet {
    pub aggregation: Aggregation,
    pub conditions: Vec<Condition>,
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Aggregation {
    All,
    Any,
}

#[derive(Debug, PartialEq)]
pub enum Condition {
    Text {
        field: TextField,
        predicate: TextPredicate,
        value: String,
    },
    Age {
        predicate: AgePredicate,
        count: i64,
        unit: AgeUnit,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextField {
    From,
    To,
    Subject,
    Snippet,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TextPredicate {
    Contains,
    NotContains,
    Equals,
    NotEquals,
}

/// The names follow the rule tokens, not intuition: "older than N days"
/// ("less than" in legacy rule files) matches mail received *within* the
/// last N days, and "newer than" ("greater than") matches mail received
/// more than N days ago. See `older_than`/`newer_than` below.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgePredicate {
    OlderThan,
    NewerThan,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AgeUnit {
    Days,
    Months,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    MarkRead,
    MarkUnread,
    MoveToLabel(String),
}

#[derive(Debug)]
pub enum RuleError {
    Io(String),
    Parse(String),
    UnsupportedField(String),
    UnsupportedPredicate(String),
    InvalidValue(String),
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleError::Io(e) => write!(f, "failed to read rules file: {}", e),
            RuleError::Parse(e) => write!(f, "failed to parse rules file: {}", e),
            RuleError::UnsupportedField(t) => write!(f, "unsupported field in rule: '{}'", t),
            RuleError::UnsupportedPredicate(t) => {
                write!(f, "unsupported predicate in rule: '{}'", t)
            }
            RuleError::InvalidValue(e) => write!(f, "invalid rule value: {}", e),
        }
    }
}

// --- Loading and compilation ---

pub fn load_rule_set(path: &Path) -> Result<RuleSet, RuleError> {
    let content = std::fs::read_to_string(path).map_err(|e| RuleError::Io(e.to_string()))?;
    parse_rule_set(&content)
}

pub fn parse_rule_set(content: &str) -> Result<RuleSet, RuleError> {
    let def: RuleSetDef =
        serde_json::from_str(content).map_err(|e| RuleError::Parse(e.to_string()))?;
    compile_rule_set(def)
}

fn compile_rule_set(def: RuleSetDef) -> Result<RuleSet, RuleError> {
    let aggregation = match def.predicate.as_deref() {
        None => Aggregation::All,
        Some(s) => match s.to_lowercase().as_str() {
            "all" => Aggregation::All,
            "any" => Aggregation::Any,
            other => {
                return Err(RuleError::UnsupportedPredicate(other.to_string()));
            }
        },
    };

    let conditions = def
        .rules
        .into_iter()
        .map(compile_condition)
        .collect::<Result<Vec<_>, _>>()?;

    let actions = compile_actions(&def.actions);

    Ok(RuleSet {
        aggregation,
        conditions,
        actions,
    })
}

fn compile_condition(def: ConditionDef) -> Result<Condition, RuleError> {
    let field = def.field.to_lowercase();
    let predicate = def.predicate.to_lowercase();

    let is_date_field = matches!(field.as_str(), "date" | "received" | "received_at");

    if is_date_field {
        let age_predicate = match predicate.as_str() {
            "less than" | "older than" => AgePredicate::OlderThan,
            "greater than" | "newer than" => AgePredicate::NewerThan,
            _ => return Err(RuleError::UnsupportedPredicate(def.predicate)),
        };
        let count = match &def.value {
            serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| {
                RuleError::InvalidValue(format!("'{}' is not an integer count", n))
            })?,
            serde_json::Value::String(s) => s.parse::<i64>().map_err(|_| {
                RuleError::InvalidValue(format!("'{}' is not an integer count", s))
            })?,
            other => {
                return Err(RuleError::InvalidValue(format!(
                    "expected an integer count for '{}', got {}",
                    def.field, other
                )));
            }
        };
        if count < 0 {
            return Err(RuleError::InvalidValue(format!(
                "count must not be negative, got {}",
                count
            )));
        }
        let unit = match def.unit.as_deref() {
            None => AgeUnit::Days,
            Some(u) => match u.to_lowercase().as_str() {
                "days" => AgeUnit::Days,
                "months" => AgeUnit::Months,
                other => {
                    return Err(RuleError::InvalidValue(format!(
                        "unknown time unit '{}'",
                        other
                    )));
                }
            },
        };
        return Ok(Condition::Age {
            predicate: age_predicate,
            count,
            unit,
        });
    }

    let text_field = match field.as_str() {
        "from" => TextField::From,
        "to" => TextField::To,
        "subject" => TextField::Subject,
        "message" | "snippet" => TextField::Snippet,
        _ => return Err(RuleError::UnsupportedField(def.field)),
    };
    let text_predicate = match predicate.as_str() {
        "contains" => TextPredicate::Contains,
        "does not contain" | "not contains" => TextPredicate::NotContains,
        "equals" => TextPredicate::Equals,
        "does not equal" | "not equals" => TextPredicate::NotEquals,
        "less than" | "older than" | "greater than" | "newer than" => {
            return Err(RuleError::InvalidValue(format!(
                "date predicate '{}' is not valid on text field '{}'",
                def.predicate, def.field
            )));
        }
        _ => return Err(RuleError::UnsupportedPredicate(def.predicate)),
    };
    let value = match def.value {
        serde_json::Value::String(s) => s,
        other => {
            return Err(RuleError::InvalidValue(format!(
                "expected a string value for '{}', got {}",
                def.field, other
            )));
        }
    };

    Ok(Condition::Text {
        field: text_field,
        predicate: text_predicate,
        value,
    })
}

/// Unrecognized action tokens are skipped with a warning, not fatal.
fn compile_actions(tokens: &[String]) -> Vec<Action> {
    let mut actions = Vec::new();
    for token in tokens {
        match token.as_str() {
            "mark_as_read" => actions.push(Action::MarkRead),
            "mark_as_unread" => actions.push(Action::MarkUnread),
            _ => {
                if let Some(label) = token.strip_prefix("move_to:") {
                    if label.is_empty() {
                        log_warn!("[Rules] Skipping move_to action with empty label name");
                    } else {
                        actions.push(Action::MoveToLabel(label.to_string()));
                    }
                } else {
                    log_warn!("[Rules] Unsupported action '{}', skipping", token);
                }
            }
        }
    }
    actions
}

pub fn format_rule_set_for_display(rule_set: &RuleSet) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Aggregation: {}\n",
        match rule_set.aggregation {
            Aggregation::All => "all",
            Aggregation::Any => "any",
        }
    ));
    out.push_str(&format!("Conditions ({}):\n", rule_set.conditions.len()));
    for condition in &rule_set.conditions {
        out.push_str(&format!("  {}\n", format_condition(condition)));
    }
    out.push_str(&format!("Actions ({}):\n", rule_set.actions.len()));
    for action in &rule_set.actions {
        out.push_str(&format!("  {}\n", format_action(action)));
    }
    out
}

fn format_condition(condition: &Condition) -> String {
    match condition {
        Condition::Text {
            field,
            predicate,
            value,
        } => {
            let field = match field {
                TextField::From => "from",
                TextField::To => "to",
                TextField::Subject => "subject",
                TextField::Snippet => "snippet",
            };
            let predicate = match predicate {
                TextPredicate::Contains => "contains",
                TextPredicate::NotContains => "does not contain",
                TextPredicate::Equals => "equals",
                TextPredicate::NotEquals => "does not equal",
            };
            format!("{} {} '{}'", field, predicate, value)
        }
        Condition::Age {
            predicate,
            count,
            unit,
        } => {
            let (predicate, gloss) = match predicate {
                AgePredicate::OlderThan => ("older than", "received within the last"),
                AgePredicate::NewerThan => ("newer than", "received more than"),
            };
            let unit = match unit {
                AgeUnit::Days => "day(s)",
                AgeUnit::Months => "month(s)",
            };
            format!("received {} {} {} ({} {} {})", predicate, count, unit, gloss, count, unit)
        }
    }
}

pub fn format_action(action: &Action) -> String {
    match action {
        Action::MarkRead => "mark_as_read".to_string(),
        Action::MarkUnread => "mark_as_unread".to_string(),
        Action::MoveToLabel(label) => format!("move_to:{}", label),
    }
}

// --- Predicate evaluation ---

pub fn contains(value: &str, needle: &str) -> bool {
    value.to_lowercase().contains(&needle.to_lowercase())
}

pub fn not_contains(value: &str, needle: &str) -> bool {
    !contains(value, needle)
}

pub fn equals(value: &str, other: &str) -> bool {
    value.to_lowercase() == other.to_lowercase()
}

pub fn not_equals(value: &str, other: &str) -> bool {
    !equals(value, other)
}

const SECS_PER_DAY: i64 = 86_400;

fn age_span_secs(count: i64, unit: AgeUnit) -> i64 {
    // A month is approximated as 30 days, not calendar-accurate. Saturating
    // arithmetic keeps absurd counts from a rule file well-defined: the
    // cutoff pins to the far past instead of overflowing.
    let days = match unit {
        AgeUnit::Days => count,
        AgeUnit::Months => count.saturating_mul(30),
    };
    days.saturating_mul(SECS_PER_DAY)
}

/// True iff the record arrived *within* the last `count` units: the
/// timestamp is strictly more recent than `now - count * unit`. The token
/// this predicate answers to is "older than"/"less than"; the semantics
/// are the inherited ones, kept exactly.
pub fn older_than(received_at: i64, count: i64, unit: AgeUnit, now: i64) -> bool {
    received_at > now.saturating_sub(age_span_secs(count, unit))
}

/// True iff the record arrived *more than* `count` units ago: the
/// timestamp is strictly older than `now - count * unit`.
pub fn newer_than(received_at: i64, count: i64, unit: AgeUnit, now: i64) -> bool {
    received_at < now.saturating_sub(age_span_secs(count, unit))
}

pub fn evaluate_condition(condition: &Condition, record: &MailRecord, now: i64) -> bool {
    match condition {
        Condition::Text {
            field,
            predicate,
            value,
        } => {
            let target = match field {
                TextField::From => record.from_address.as_str(),
                TextField::To => record.to_address.as_str(),
                TextField::Subject => record.subject.as_str(),
                TextField::Snippet => record.snippet.as_str(),
            };
            match predicate {
                TextPredicate::Contains => contains(target, value),
                TextPredicate::NotContains => not_contains(target, value),
                TextPredicate::Equals => equals(target, value),
                TextPredicate::NotEquals => not_equals(target, value),
            }
        }
        Condition::Age {
            predicate,
            count,
            unit,
        } => match predicate {
            AgePredicate::OlderThan => older_than(record.received_at, *count, *unit, now),
            AgePredicate::NewerThan => newer_than(record.received_at, *count, *unit, now),
        },
    }
}

impl RuleSet {
    /// Evaluate every condition against the record and combine. `now` is
    /// captured once by the caller and threaded through so conditions in
    /// one pass never see skewed clocks. With no conditions, `All` is
    /// vacuously true and `Any` is vacuously false.
    pub fn matches(&self, record: &MailRecord, now: i64) -> bool {
        match self.aggregation {
            Aggregation::All => self
                .conditions
                .iter()
                .all(|c| evaluate_condition(c, record, now)),
            Aggregation::Any => self
                .conditions
                .iter()
                .any(|c| evaluate_condition(c, record, now)),
        }
    }
}
