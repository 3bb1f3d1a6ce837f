//! Multi-student report form state.
//!
//! DESIGN
//! ======
//! Every category carries its own stable `key` from creation time, and the
//! submitted payload is keyed by it. Categories whose key is empty or repeats
//! an earlier one in the same student are sent as `customCategory{index}` so
//! no assessment is silently overwritten.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::categories::{Category, SchoolLevel, default_categories};
use super::templates::{Template, TemplateId};

pub const UNNAMED_STUDENT: &str = "Unnamed Student";
const ADDED_CATEGORY_OPTIONS: [&str; 3] = ["Struggling", "Meets Expectations", "Excelling"];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormError {
    #[error("no student at index {0}")]
    NoStudent(usize),
    #[error("student {student} has no category at index {category}")]
    NoCategory { student: usize, category: usize },
    #[error("the form must keep at least one student")]
    LastStudent,
    #[error("no template with id {0}")]
    NoTemplate(TemplateId),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub school_level: SchoolLevel,
    #[serde(default)]
    pub categories: Vec<Category>,
}

impl Student {
    #[must_use]
    pub fn blank(level: SchoolLevel) -> Self {
        Self { name: String::new(), school_level: level, categories: default_categories(level) }
    }
}

/// A form as loaded from a draft file: level plus optional students.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormDraft {
    #[serde(default)]
    pub school_level: SchoolLevel,
    #[serde(default)]
    pub students: Vec<DraftStudent>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DraftStudent {
    #[serde(default)]
    pub name: String,
    /// Missing categories mean the level's defaults.
    pub categories: Option<Vec<Category>>,
}

// =============================================================================
// PAYLOAD
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GenerateRequest {
    pub students: Vec<StudentPayload>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPayload {
    pub name: String,
    pub school_level: SchoolLevel,
    pub categories: BTreeMap<String, Assessment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assessment {
    pub value: String,
    pub comments: String,
}

impl StudentPayload {
    #[must_use]
    pub fn from_student(student: &Student) -> Self {
        let mut categories = BTreeMap::new();
        let mut seen = HashSet::new();
        for (index, category) in student.categories.iter().enumerate() {
            let key = if category.key.is_empty() || !seen.insert(category.key.as_str()) {
                format!("customCategory{index}")
            } else {
                category.key.clone()
            };
            categories.insert(key, Assessment { value: category.value.clone(), comments: category.comments.clone() });
        }
        let name = if student.name.trim().is_empty() { UNNAMED_STUDENT.to_owned() } else { student.name.clone() };
        Self { name, school_level: student.school_level, categories }
    }
}

// =============================================================================
// FORM
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportForm {
    school_level: SchoolLevel,
    students: Vec<Student>,
}

impl Default for ReportForm {
    fn default() -> Self {
        Self::new(SchoolLevel::default())
    }
}

impl ReportForm {
    /// A form with one blank student at `level`.
    #[must_use]
    pub fn new(level: SchoolLevel) -> Self {
        Self { school_level: level, students: vec![Student::blank(level)] }
    }

    #[must_use]
    pub fn from_draft(draft: FormDraft) -> Self {
        let level = draft.school_level;
        let students: Vec<Student> = draft
            .students
            .into_iter()
            .map(|s| Student {
                name: s.name,
                school_level: level,
                categories: s.categories.unwrap_or_else(|| default_categories(level)),
            })
            .collect();
        if students.is_empty() {
            return Self::new(level);
        }
        Self { school_level: level, students }
    }

    #[must_use]
    pub fn school_level(&self) -> SchoolLevel {
        self.school_level
    }

    #[must_use]
    pub fn students(&self) -> &[Student] {
        &self.students
    }

    /// Switch level; every student's categories reset to the new defaults.
    pub fn set_school_level(&mut self, level: SchoolLevel) {
        self.school_level = level;
        for student in &mut self.students {
            student.school_level = level;
            student.categories = default_categories(level);
        }
    }

    /// # Errors
    ///
    /// Returns `NoStudent` for an out-of-range index.
    pub fn set_student_name(&mut self, student: usize, name: &str) -> Result<(), FormError> {
        self.student_mut(student)?.name = name.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NoStudent` / `NoCategory` for out-of-range indices.
    pub fn set_category_value(&mut self, student: usize, category: usize, value: &str) -> Result<(), FormError> {
        self.category_mut(student, category)?.value = value.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NoStudent` / `NoCategory` for out-of-range indices.
    pub fn set_category_comments(&mut self, student: usize, category: usize, comments: &str) -> Result<(), FormError> {
        self.category_mut(student, category)?.comments = comments.to_owned();
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `NoStudent` / `NoCategory` for out-of-range indices.
    pub fn set_category_label(&mut self, student: usize, category: usize, label: &str) -> Result<(), FormError> {
        self.category_mut(student, category)?.label = label.to_owned();
        Ok(())
    }

    /// Remove one category; later categories shift down by one.
    ///
    /// # Errors
    ///
    /// Returns `NoStudent` / `NoCategory` for out-of-range indices.
    pub fn remove_category(&mut self, student: usize, category: usize) -> Result<Category, FormError> {
        let categories = &mut self.student_mut(student)?.categories;
        if category >= categories.len() {
            return Err(FormError::NoCategory { student, category });
        }
        Ok(categories.remove(category))
    }

    /// Append a blank custom category and return its index.
    ///
    /// # Errors
    ///
    /// Returns `NoStudent` for an out-of-range index.
    pub fn add_category(&mut self, student: usize) -> Result<usize, FormError> {
        let categories = &mut self.student_mut(student)?.categories;
        let n = categories.len() + 1;
        categories.push(Category {
            key: format!("newCategory{n}"),
            label: format!("New Category {n}"),
            value: String::new(),
            comments: String::new(),
            options: ADDED_CATEGORY_OPTIONS.iter().map(|o| (*o).to_owned()).collect(),
        });
        Ok(n - 1)
    }

    /// Append a blank student with the current level's default categories.
    pub fn add_student(&mut self) -> usize {
        self.students.push(Student::blank(self.school_level));
        self.students.len() - 1
    }

    /// # Errors
    ///
    /// Returns `NoStudent` for an out-of-range index, `LastStudent` when only one remains.
    pub fn remove_student(&mut self, student: usize) -> Result<Student, FormError> {
        if student >= self.students.len() {
            return Err(FormError::NoStudent(student));
        }
        if self.students.len() == 1 {
            return Err(FormError::LastStudent);
        }
        Ok(self.students.remove(student))
    }

    /// Replace one student's categories with blank copies of the template's.
    ///
    /// # Errors
    ///
    /// Returns `NoStudent` for an out-of-range index.
    pub fn apply_template(&mut self, student: usize, template: &Template) -> Result<(), FormError> {
        tracing::debug!(student, template = %template.name, "applying template");
        self.student_mut(student)?.categories = template.categories.iter().map(Category::blank).collect();
        Ok(())
    }

    /// Build the generate request for every student on the form.
    #[must_use]
    pub fn payload(&self) -> GenerateRequest {
        GenerateRequest { students: self.students.iter().map(StudentPayload::from_student).collect() }
    }

    fn student_mut(&mut self, student: usize) -> Result<&mut Student, FormError> {
        self.students.get_mut(student).ok_or(FormError::NoStudent(student))
    }

    fn category_mut(&mut self, student: usize, category: usize) -> Result<&mut Category, FormError> {
        self.student_mut(student)?
            .categories
            .get_mut(category)
            .ok_or(FormError::NoCategory { student, category })
    }
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
