//! Report and template calls, plus the form-level generator built on them.
//!
//! ERROR HANDLING
//! ==============
//! `ReportService` returns `ApiError`s unchanged. `ReportGenerator` is the form
//! boundary: generation failures become a user-facing message in its state
//! and are never rethrown. Template loading degrades to an empty list; the
//! template mutations propagate so the caller can report them.

use std::sync::{Mutex, PoisonError};

use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use super::categories::SchoolLevel;
use super::form::{FormError, GenerateRequest, ReportForm, StudentPayload};
use super::response::{self, ReportEntry};
use super::templates::{Template, TemplateBook, TemplateDraft, TemplateId};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};

pub const GENERATE_BULK_PATH: &str = "/reports/generate-bulk";
pub const GENERATE_FAILED: &str = "An error occurred while generating the report.";

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateList {
    Wrapped { templates: Vec<Template> },
    Bare(Vec<Template>),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TemplateReply {
    Wrapped { template: Template },
    Bare(Template),
}

impl TemplateReply {
    fn into_template(self) -> Template {
        match self {
            Self::Wrapped { template } | Self::Bare(template) => template,
        }
    }
}

// =============================================================================
// SERVICE
// =============================================================================

#[derive(Clone)]
pub struct ReportService {
    client: ApiClient,
    generate_path: String,
    templates_path: String,
}

impl ReportService {
    #[must_use]
    pub fn new(client: ApiClient, config: &ClientConfig) -> Self {
        Self { client, generate_path: config.generate_path.clone(), templates_path: config.templates_path.clone() }
    }

    /// # Errors
    ///
    /// Returns the request failure or `Decode` for a scalar response body.
    pub async fn generate(&self, request: &GenerateRequest, cancel: &CancellationToken) -> Result<Vec<ReportEntry>, ApiError> {
        tracing::info!(students = request.students.len(), "generating reports");
        let body = self.client.post(&self.generate_path, request, cancel).await?;
        response::normalize(body)
    }

    /// # Errors
    ///
    /// Same as [`ReportService::generate`].
    pub async fn generate_bulk(
        &self,
        students: &[StudentPayload],
        cancel: &CancellationToken,
    ) -> Result<Vec<ReportEntry>, ApiError> {
        tracing::info!(students = students.len(), "generating bulk reports");
        let body = self.client.post(GENERATE_BULK_PATH, &json!({ "students": students }), cancel).await?;
        response::normalize(body)
    }

    /// Templates for `level`. Failures are logged and yield an empty list.
    pub async fn list_templates(&self, level: SchoolLevel, cancel: &CancellationToken) -> Vec<Template> {
        let request = ApiRequest::get(&self.templates_path).query("schoolLevel", level.as_str());
        match self.client.send_json::<TemplateList>(request, cancel).await {
            Ok(TemplateList::Wrapped { templates } | TemplateList::Bare(templates)) => templates,
            Err(e) => {
                tracing::warn!(error = %e, school_level = %level, "failed to load templates");
                Vec::new()
            }
        }
    }

    /// # Errors
    ///
    /// Returns the request failure or `Decode` if no template comes back.
    pub async fn create_template(&self, draft: &TemplateDraft, cancel: &CancellationToken) -> Result<Template, ApiError> {
        let body = self.client.post(&self.templates_path, draft, cancel).await?;
        decode_template(body)
    }

    /// # Errors
    ///
    /// Returns the request failure or `Decode` if no template comes back.
    pub async fn update_template(
        &self,
        id: TemplateId,
        draft: &TemplateDraft,
        cancel: &CancellationToken,
    ) -> Result<Template, ApiError> {
        let body = self.client.put(&self.template_path(id), draft, cancel).await?;
        decode_template(body)
    }

    /// # Errors
    ///
    /// Returns the request failure.
    pub async fn delete_template(&self, id: TemplateId, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.client.delete(&self.template_path(id), cancel).await?;
        Ok(())
    }

    fn template_path(&self, id: TemplateId) -> String {
        format!("{}/{id}", self.templates_path)
    }
}

fn decode_template(body: Value) -> Result<Template, ApiError> {
    serde_json::from_value::<TemplateReply>(body)
        .map(TemplateReply::into_template)
        .map_err(|e| ApiError::Decode(format!("unexpected template response: {e}")))
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Snapshot of everything a report page renders.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeneratorState {
    pub form: ReportForm,
    pub templates: TemplateBook,
    pub reports: Vec<ReportEntry>,
    pub loading: bool,
    pub error: Option<String>,
}

pub struct ReportGenerator {
    service: ReportService,
    state: Mutex<GeneratorState>,
}

impl ReportGenerator {
    #[must_use]
    pub fn new(service: ReportService, form: ReportForm) -> Self {
        Self { service, state: Mutex::new(GeneratorState { form, ..GeneratorState::default() }) }
    }

    #[must_use]
    pub fn state(&self) -> GeneratorState {
        self.lock().clone()
    }

    /// Apply a mutation to the form.
    pub fn edit_form<R>(&self, f: impl FnOnce(&mut ReportForm) -> R) -> R {
        f(&mut self.lock().form)
    }

    /// Generate reports for every student on the form.
    ///
    /// # Errors
    ///
    /// Returns the user-facing failure message, also kept in the state.
    pub async fn generate(&self, cancel: &CancellationToken) -> Result<Vec<ReportEntry>, String> {
        let request = self.begin();
        let outcome = self.service.generate(&request, cancel).await;
        self.settle(outcome)
    }

    /// Generate reports through the bulk endpoint.
    ///
    /// # Errors
    ///
    /// Returns the user-facing failure message, also kept in the state.
    pub async fn generate_bulk(&self, cancel: &CancellationToken) -> Result<Vec<ReportEntry>, String> {
        let request = self.begin();
        let outcome = self.service.generate_bulk(&request.students, cancel).await;
        self.settle(outcome)
    }

    /// Reload the template list for the form's school level.
    pub async fn load_templates(&self, cancel: &CancellationToken) -> usize {
        let level = self.lock().form.school_level();
        let templates = self.service.list_templates(level, cancel).await;
        let count = templates.len();
        self.lock().templates.replace_all(templates);
        count
    }

    /// Capture `student`'s categories as a template draft.
    ///
    /// # Errors
    ///
    /// Returns `NoStudent` for an out-of-range index.
    pub fn draft_from_student(&self, name: &str, student: usize) -> Result<TemplateDraft, FormError> {
        let state = self.lock();
        let source = state.form.students().get(student).ok_or(FormError::NoStudent(student))?;
        Ok(TemplateDraft::from_categories(name, state.form.school_level(), &source.categories))
    }

    /// # Errors
    ///
    /// Returns the request failure; the local list is left untouched.
    pub async fn create_template(&self, draft: &TemplateDraft, cancel: &CancellationToken) -> Result<Template, ApiError> {
        let created = self.service.create_template(draft, cancel).await.inspect_err(|e| {
            tracing::error!(error = %e, "failed to create template");
        })?;
        self.lock().templates.insert(created.clone());
        Ok(created)
    }

    /// # Errors
    ///
    /// Returns the request failure; the local list is left untouched.
    pub async fn update_template(
        &self,
        id: TemplateId,
        draft: &TemplateDraft,
        cancel: &CancellationToken,
    ) -> Result<Template, ApiError> {
        let updated = self.service.update_template(id, draft, cancel).await.inspect_err(|e| {
            tracing::error!(error = %e, template_id = id, "failed to update template");
        })?;
        self.lock().templates.replace(updated.clone());
        Ok(updated)
    }

    /// # Errors
    ///
    /// Returns the request failure; the local list is left untouched.
    pub async fn delete_template(&self, id: TemplateId, cancel: &CancellationToken) -> Result<(), ApiError> {
        self.service.delete_template(id, cancel).await.inspect_err(|e| {
            tracing::error!(error = %e, template_id = id, "failed to delete template");
        })?;
        self.lock().templates.remove(id);
        Ok(())
    }

    /// Replace `student`'s categories with a loaded template's.
    ///
    /// # Errors
    ///
    /// Returns `NoTemplate` if the id is not in the local list, or `NoStudent`.
    pub fn apply_template(&self, id: TemplateId, student: usize) -> Result<(), FormError> {
        let mut state = self.lock();
        let template = state.templates.get(id).cloned().ok_or(FormError::NoTemplate(id))?;
        state.form.apply_template(student, &template)
    }

    fn begin(&self) -> GenerateRequest {
        let mut state = self.lock();
        state.loading = true;
        state.error = None;
        state.form.payload()
    }

    fn settle(&self, outcome: Result<Vec<ReportEntry>, ApiError>) -> Result<Vec<ReportEntry>, String> {
        let mut state = self.lock();
        state.loading = false;
        match outcome {
            Ok(reports) => {
                state.reports.clone_from(&reports);
                Ok(reports)
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.error_code(), "failed to generate report");
                state.error = Some(GENERATE_FAILED.to_owned());
                Err(GENERATE_FAILED.to_owned())
            }
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, GeneratorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
#[path = "service_test.rs"]
mod tests;
