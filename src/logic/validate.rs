use serde::{Deserialize, Serialize};

use crate::logic::cascade::CascadeResolver;
use crate::model::{ResourceRef, StageId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    pub stage: StageId,
    pub error_type: ValidationErrorType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationErrorType {
    /// Nothing chosen yet (or still loading)
    NotSelected,
    /// The stage resolved to its "not found" entry
    NotFound,
    /// The chosen target exists but cannot be migrated to right now
    TargetUnavailable,
}

impl ValidationResult {
    /// All messages, one per line, in stage order
    pub fn message(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.message.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub struct TargetValidator;

impl TargetValidator {
    /// Check every stage of the cascade before the selection can be committed
    pub fn validate(resolver: &CascadeResolver) -> ValidationResult {
        let kind = resolver.target_kind();

        let errors: Vec<ValidationError> = resolver
            .stages()
            .iter()
            .filter_map(|stage| {
                let error_type = match &stage.selected {
                    None if stage.has_only_sentinel() => ValidationErrorType::NotFound,
                    None => ValidationErrorType::NotSelected,
                    Some(ResourceRef::Instance(instance)) if !instance.is_ready() => {
                        ValidationErrorType::TargetUnavailable
                    }
                    Some(_) => return None,
                };

                let message = match error_type {
                    ValidationErrorType::TargetUnavailable => format!(
                        "{} is not ready for migration. {}",
                        stage
                            .selected
                            .as_ref()
                            .map(ResourceRef::display_name)
                            .unwrap_or_default(),
                        stage.id.invalid_selection_message(kind)
                    ),
                    _ => stage.id.invalid_selection_message(kind).to_string(),
                };

                Some(ValidationError {
                    stage: stage.id,
                    error_type,
                    message,
                })
            })
            .collect();

        ValidationResult {
            valid: errors.is_empty(),
            errors,
        }
    }
}
