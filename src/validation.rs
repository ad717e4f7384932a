//! Index rules for surface elements.
//!
//! Element records reference points of the batch they were read with, by
//! 1-based index. A [`Validate`] implementation checks one record against the
//! batch size and reports every violated rule at once, so the fatal error
//! names all of them.
//!
//! Only the rules below are checked. Watertightness, minimum point separation
//! and containment in the simulation box are not.
//!
//! # Example
//!
//! ```
//! use surfread::validation::{Validate, ValidationResult, combine_validations, validators};
//!
//! struct Edge { p1: i64, p2: i64 }
//!
//! impl Validate for Edge {
//!     fn validate(&self, npoint: usize) -> ValidationResult {
//!         combine_validations(vec![
//!             validators::index_in_range("p1", self.p1, npoint),
//!             validators::index_in_range("p2", self.p2, npoint),
//!             validators::distinct("p1", self.p1, "p2", self.p2),
//!         ])
//!     }
//! }
//!
//! assert!(Edge { p1: 1, p2: 2 }.validate(2).is_ok());
//! assert_eq!(Edge { p1: 0, p2: 0 }.validate(2).unwrap_err().len(), 3);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Result type for validation operations.
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// A record whose point indices can be checked against the batch size.
pub trait Validate {
    /// Check this record against `npoint` points added in the same call.
    fn validate(&self, npoint: usize) -> ValidationResult;
}

/// A single violated rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    /// The field that failed validation (optional)
    pub field: Option<String>,
    /// Human-readable error message
    pub message: String,
}

impl ValidationError {
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            field: None,
            message: message.into(),
        }
    }

    pub fn field<S: Into<String>, M: Into<String>>(field: S, message: M) -> Self {
        Self {
            field: Some(field.into()),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            Some(ref field) => write!(f, "[{}] {}", field, self.message),
            None => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Join errors into one line.
pub fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Validation helpers for point indices.
pub mod validators {
    use super::{ValidationError, ValidationResult};

    /// `value` must lie in `[1, npoint]`.
    pub fn index_in_range(field: &str, value: i64, npoint: usize) -> ValidationResult {
        match usize::try_from(value) {
            Ok(v) if (1..=npoint).contains(&v) => Ok(()),
            _ => Err(vec![ValidationError::field(
                field,
                format!("index {value} outside 1..={npoint}"),
            )]),
        }
    }

    /// Two indices of the same element must differ.
    pub fn distinct(a_field: &str, a: i64, b_field: &str, b: i64) -> ValidationResult {
        if a != b {
            Ok(())
        } else {
            Err(vec![ValidationError::new(format!(
                "{a_field} and {b_field} are both {a}"
            ))])
        }
    }
}

/// Combine multiple validation results.
pub fn combine_validations(results: Vec<ValidationResult>) -> ValidationResult {
    let mut all_errors = Vec::new();
    for result in results {
        if let Err(mut errors) = result {
            all_errors.append(&mut errors);
        }
    }
    if all_errors.is_empty() {
        Ok(())
    } else {
        Err(all_errors)
    }
}
