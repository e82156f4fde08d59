//! User-defined noise rules for console output.
//!
//! A rule hides log entries whose fields all match its spec. Rules apply at
//! read time, so removing one brings the entries back.

use super::LogEntry;
use chrono::{SecondsFormat, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use thiserror::Error;

pub const MAX_NOISE_RULES: usize = 100;

/// Fields a rule matches on. Every non-empty field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NoiseMatchSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url_regex: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
}

impl NoiseMatchSpec {
    /// Blank fields count as absent.
    fn normalized(self) -> Self {
        let keep = |field: Option<String>| field.filter(|f| !f.trim().is_empty());
        Self {
            message_regex: keep(self.message_regex),
            source_regex: keep(self.source_regex),
            url_regex: keep(self.url_regex),
            level: keep(self.level),
        }
    }

    fn is_empty(&self) -> bool {
        self.message_regex.is_none()
            && self.source_regex.is_none()
            && self.url_regex.is_none()
            && self.level.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NoiseRule {
    pub id: String,
    pub classification: String,
    pub match_spec: NoiseMatchSpec,
    pub created_at: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum NoiseRuleError {
    #[error("a noise rule needs at least one of message_regex, source_regex, url_regex or level")]
    EmptySpec,
    #[error("invalid {field}: {message}")]
    InvalidPattern { field: &'static str, message: String },
    #[error("noise rule limit reached ({MAX_NOISE_RULES} rules)")]
    TooManyRules,
    #[error("noise rule not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NoiseStatistics {
    pub total_filtered: u64,
    pub per_rule: BTreeMap<String, u64>,
}

#[derive(Debug)]
struct CompiledRule {
    rule: NoiseRule,
    message: Option<Regex>,
    source: Option<Regex>,
    url: Option<Regex>,
}

impl CompiledRule {
    fn matches(&self, entry: &LogEntry) -> bool {
        if let Some(level) = &self.rule.match_spec.level
            && entry.level().is_none_or(|l| !l.as_ref().eq_ignore_ascii_case(level))
        {
            return false;
        }
        let hit = |pattern: Option<&Regex>, text: &str| pattern.is_none_or(|re| re.is_match(text));
        hit(self.message.as_ref(), entry.message())
            && hit(self.source.as_ref(), entry.source())
            && hit(self.url.as_ref(), entry.url())
    }
}

#[derive(Debug, Default)]
struct NoiseState {
    rules: Vec<CompiledRule>,
    next_id: u64,
    stats: NoiseStatistics,
}

#[derive(Debug, Default)]
pub struct NoiseRules {
    state: Mutex<NoiseState>,
}

fn compile(field: &'static str, pattern: Option<&String>) -> Result<Option<Regex>, NoiseRuleError> {
    pattern
        .map(|p| {
            Regex::new(p).map_err(|e| NoiseRuleError::InvalidPattern {
                field,
                message: e.to_string(),
            })
        })
        .transpose()
}

impl NoiseRules {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, NoiseState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Validate and store a rule. Returns its id.
    pub fn add(&self, classification: &str, spec: NoiseMatchSpec) -> Result<String, NoiseRuleError> {
        let spec = spec.normalized();
        if spec.is_empty() {
            return Err(NoiseRuleError::EmptySpec);
        }
        let message = compile("message_regex", spec.message_regex.as_ref())?;
        let source = compile("source_regex", spec.source_regex.as_ref())?;
        let url = compile("url_regex", spec.url_regex.as_ref())?;

        let mut state = self.lock();
        if state.rules.len() >= MAX_NOISE_RULES {
            return Err(NoiseRuleError::TooManyRules);
        }
        state.next_id += 1;
        let id = format!("user_{}", state.next_id);
        state.rules.push(CompiledRule {
            rule: NoiseRule {
                id: id.clone(),
                classification: classification.to_string(),
                match_spec: spec,
                created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            message,
            source,
            url,
        });
        tracing::debug!(rule = %id, "noise rule added");
        Ok(id)
    }

    pub fn remove(&self, id: &str) -> Result<(), NoiseRuleError> {
        let mut state = self.lock();
        let before = state.rules.len();
        state.rules.retain(|r| r.rule.id != id);
        if state.rules.len() == before {
            return Err(NoiseRuleError::NotFound(id.to_string()));
        }
        state.stats.per_rule.remove(id);
        Ok(())
    }

    /// Drop every rule and reset statistics.
    pub fn reset(&self) -> usize {
        let mut state = self.lock();
        let removed = state.rules.len();
        *state = NoiseState::default();
        removed
    }

    pub fn list(&self) -> Vec<NoiseRule> {
        self.lock().rules.iter().map(|r| r.rule.clone()).collect()
    }

    pub fn statistics(&self) -> NoiseStatistics {
        self.lock().stats.clone()
    }

    pub fn len(&self) -> usize {
        self.lock().rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when any rule matches `entry`. Matches are counted per rule.
    pub fn is_noise(&self, entry: &LogEntry) -> bool {
        let mut state = self.lock();
        let Some(id) = state
            .rules
            .iter()
            .find(|r| r.matches(entry))
            .map(|r| r.rule.id.clone())
        else {
            return false;
        };
        state.stats.total_filtered += 1;
        *state.stats.per_rule.entry(id).or_default() += 1;
        true
    }
}
