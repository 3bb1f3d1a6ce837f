//! Report building: category tables, form state, backend calls and
//! response normalization.
//!
//! SYSTEM CONTEXT
//! ==============
//! `form` owns the in-memory students a teacher is editing, `service` turns
//! them into backend requests, `response` reconciles whatever shape the
//! backend answers with, and `templates` mirrors saved category sets.

pub mod categories;
pub mod form;
pub mod response;
pub mod service;
pub mod templates;
