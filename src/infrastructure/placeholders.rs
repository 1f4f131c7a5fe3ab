use crate::domain::models::{ContactId, TaskId};
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;

const CONTACT_TOKEN: &str = "{contact}";
const TASK_TOKEN: &str = "{task}";

/// Resolves text placeholders in titles, descriptions and custom calendar
/// text. Without an attached contact the text passes through unchanged.
pub trait PlaceholderResolver: Send + Sync {
    fn resolve(
        &self,
        text: &str,
        task_id: Option<TaskId>,
        contact_id: Option<ContactId>,
    ) -> Result<String, InfraError>;
}

/// Token-substituting resolver backed by a contact-name table. An unknown
/// contact id leaves the token in place rather than failing the edit.
#[derive(Debug, Default)]
pub struct TemplatePlaceholderResolver {
    contacts: HashMap<ContactId, String>,
    task_titles: HashMap<TaskId, String>,
}

impl TemplatePlaceholderResolver {
    pub fn new(contacts: HashMap<ContactId, String>) -> Self {
        Self {
            contacts,
            task_titles: HashMap::new(),
        }
    }

    pub fn with_task_titles(mut self, task_titles: HashMap<TaskId, String>) -> Self {
        self.task_titles = task_titles;
        self
    }
}

impl PlaceholderResolver for TemplatePlaceholderResolver {
    fn resolve(
        &self,
        text: &str,
        task_id: Option<TaskId>,
        contact_id: Option<ContactId>,
    ) -> Result<String, InfraError> {
        let mut resolved = text.to_string();
        if let Some(name) = contact_id.and_then(|id| self.contacts.get(&id)) {
            resolved = resolved.replace(CONTACT_TOKEN, name);
        }
        if let Some(title) = task_id.and_then(|id| self.task_titles.get(&id)) {
            resolved = resolved.replace(TASK_TOKEN, title);
        }
        Ok(resolved)
    }
}
