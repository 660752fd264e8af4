use std::fmt;

use serde::{Deserialize, Serialize};

/// Sentinel status for documents without a recognized status.
pub const UNKNOWN_STATUS: &str = "unknown";

/// Glyph shown for names the catalog cannot resolve.
pub const FALLBACK_ICON: &str = "❓";

const SCOPE_SEPARATOR: char = ':';

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub name: String,
    pub icon: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_id: Option<String>,
}

impl Status {
    pub fn new(name: impl Into<String>, icon: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            icon: icon.into(),
            color: None,
            description: None,
            template_id: None,
        }
    }

    pub fn with_color(mut self, color: impl Into<String>) -> Self {
        self.color = Some(color.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_template(mut self, template_id: impl Into<String>) -> Self {
        self.template_id = Some(template_id.into());
        self
    }

    /// Case-insensitive match key.
    pub fn key(&self) -> String {
        status_key(&self.name)
    }

    /// `template:name` for template statuses, the bare name otherwise.
    pub fn scoped_name(&self) -> String {
        match self.template_id.as_deref() {
            Some(template_id) => format!("{template_id}{SCOPE_SEPARATOR}{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn matches(&self, raw: &str) -> bool {
        let reference = StatusRef::parse(raw);
        if reference.name != self.key() {
            return false;
        }
        match reference.template_id.as_deref() {
            Some(template_id) => self
                .template_id
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(template_id)),
            None => true,
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.icon, self.name)
    }
}

/// A parsed status reference, either `name` or `template:name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRef {
    pub template_id: Option<String>,
    pub name: String,
}

impl StatusRef {
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        match trimmed.split_once(SCOPE_SEPARATOR) {
            Some((scope, name)) if !scope.trim().is_empty() && !name.trim().is_empty() => Self {
                template_id: Some(scope.trim().to_ascii_lowercase()),
                name: status_key(name),
            },
            _ => Self {
                template_id: None,
                name: status_key(trimmed),
            },
        }
    }
}

pub fn status_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_unknown(raw: &str) -> bool {
    status_key(raw) == UNKNOWN_STATUS
}

pub fn unknown_floor() -> Vec<String> {
    vec![UNKNOWN_STATUS.to_string()]
}

/// True when the list is exactly the `unknown` floor.
pub fn is_unknown_only(statuses: &[String]) -> bool {
    statuses.len() == 1 && is_unknown(&statuses[0])
}

/// Comma-joined names, the clipboard serialization.
pub fn join_statuses(statuses: &[String]) -> String {
    statuses.join(", ")
}

pub fn split_statuses(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(str::to_string)
        .collect()
}
