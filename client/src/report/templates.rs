//! Saved category templates and the local list mirroring them.

use serde::{Deserialize, Serialize};

use super::categories::{Category, SchoolLevel};

pub type TemplateId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Template {
    pub id: TemplateId,
    pub name: String,
    #[serde(default)]
    pub categories: Vec<Category>,
    pub school_level: SchoolLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Body for create and update calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateDraft {
    pub name: String,
    pub categories: Vec<Category>,
    pub school_level: SchoolLevel,
}

impl TemplateDraft {
    /// Capture a student's categories as a template, without their selections.
    #[must_use]
    pub fn from_categories(name: &str, level: SchoolLevel, categories: &[Category]) -> Self {
        Self { name: name.to_owned(), categories: categories.iter().map(Category::blank).collect(), school_level: level }
    }
}

/// Local copy of the template list. Mutated only after the backend accepted the change.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TemplateBook {
    templates: Vec<Template>,
}

impl TemplateBook {
    #[must_use]
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    #[must_use]
    pub fn get(&self, id: TemplateId) -> Option<&Template> {
        self.templates.iter().find(|t| t.id == id)
    }

    pub fn replace_all(&mut self, templates: Vec<Template>) {
        self.templates = templates;
    }

    pub(crate) fn insert(&mut self, template: Template) {
        self.templates.push(template);
    }

    pub(crate) fn replace(&mut self, template: Template) {
        match self.templates.iter_mut().find(|t| t.id == template.id) {
            Some(slot) => *slot = template,
            None => self.templates.push(template),
        }
    }

    pub(crate) fn remove(&mut self, id: TemplateId) {
        self.templates.retain(|t| t.id != id);
    }
}

#[cfg(test)]
#[path = "templates_test.rs"]
mod tests;
