use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::status::{status_key, Status, UNKNOWN_STATUS};

const TEMPLATES_TOML: &str = include_str!("templates.toml");

/// A named set of statuses that can be enabled as a block.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub statuses: Vec<Status>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTemplateFile {
    #[serde(default)]
    templates: Vec<RawTemplateDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTemplateDefinition {
    id: String,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    statuses: Vec<RawTemplateStatus>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawTemplateStatus {
    name: String,
    icon: String,
    #[serde(default)]
    color: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("invalid template TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid template definition: {0}")]
    InvalidDefinition(String),
    #[error("unknown template '{0}'")]
    UnknownTemplate(String),
}

#[derive(Debug, Clone)]
pub struct TemplateRegistry {
    templates: HashMap<String, StatusTemplate>,
    order: Vec<String>,
}

impl TemplateRegistry {
    pub fn load() -> Result<Self, TemplateError> {
        Self::from_toml(TEMPLATES_TOML)
    }

    pub(crate) fn from_toml(raw: &str) -> Result<Self, TemplateError> {
        let file: RawTemplateFile = toml::from_str(raw)?;
        let mut templates = HashMap::new();
        let mut order = Vec::new();

        for raw_template in file.templates {
            let template = normalize_template(raw_template)?;
            if templates.contains_key(&template.id) {
                return Err(TemplateError::InvalidDefinition(format!(
                    "duplicate template id '{}'",
                    template.id
                )));
            }
            order.push(template.id.clone());
            templates.insert(template.id.clone(), template);
        }

        Ok(Self { templates, order })
    }

    /// Templates in definition order.
    pub fn list(&self) -> Vec<&StatusTemplate> {
        self.order
            .iter()
            .filter_map(|id| self.templates.get(id))
            .collect()
    }

    pub fn get(&self, id: &str) -> Option<&StatusTemplate> {
        self.templates.get(&normalize_template_id(id)?)
    }

    pub fn require(&self, id: &str) -> Result<&StatusTemplate, TemplateError> {
        self.get(id)
            .ok_or_else(|| TemplateError::UnknownTemplate(id.trim().to_string()))
    }
}

pub fn normalize_template_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_ascii_lowercase())
    }
}

fn normalize_template(raw: RawTemplateDefinition) -> Result<StatusTemplate, TemplateError> {
    let id = normalize_template_id(&raw.id)
        .ok_or_else(|| TemplateError::InvalidDefinition("template id is required".to_string()))?;
    if raw.statuses.is_empty() {
        return Err(TemplateError::InvalidDefinition(format!(
            "template '{id}' defines no statuses"
        )));
    }

    let mut seen = Vec::new();
    let mut statuses = Vec::with_capacity(raw.statuses.len());
    for raw_status in raw.statuses {
        let key = status_key(&raw_status.name);
        if key.is_empty() || key == UNKNOWN_STATUS {
            return Err(TemplateError::InvalidDefinition(format!(
                "template '{id}' has invalid status name '{}'",
                raw_status.name
            )));
        }
        if seen.contains(&key) {
            return Err(TemplateError::InvalidDefinition(format!(
                "template '{id}' repeats status '{}'",
                raw_status.name
            )));
        }
        seen.push(key);
        statuses.push(Status {
            name: raw_status.name.trim().to_string(),
            icon: raw_status.icon,
            color: raw_status.color,
            description: raw_status.description,
            template_id: Some(id.clone()),
        });
    }

    Ok(StatusTemplate {
        id,
        name: raw.name.trim().to_string(),
        description: raw.description,
        statuses,
    })
}
