//! The module contains the error the engine can throw.
//!
//! The errors are split along the boundaries the caller has to react to:
//!
//! - [`InvalidCode`] a malformed outline code on a directly parsed value.
//! - [`Validation`] the collected per-row report for a submitted sheet set.
//! - [`Conflict`] a removal blocked by rows that still reference the sheet.
//! - [`KeyNotFound`] an unknown owner, group or sheet reference.
//! - [`Database`] any storage failure, propagated unchanged.
//!
//! [`InvalidCode`]: EngineError::InvalidCode
//! [`Validation`]: EngineError::Validation
//! [`Conflict`]: EngineError::Conflict
//! [`KeyNotFound`]: EngineError::KeyNotFound
//! [`Database`]: EngineError::Database
use sea_orm::DbErr;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::validate::ValidationReport;

/// A removal refused because other rows still reference the sheet.
///
/// `label` is human readable (`"code (name)"`) so callers can present
/// "these items are in use" messaging directly.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedRemoval {
    pub sheet_id: i64,
    pub label: String,
}

/// Engine custom errors.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("invalid code: {0}")]
    InvalidCode(String),
    #[error("{0}")]
    Validation(ValidationReport),
    #[error("sheets still in use: {}", format_blocked(.0))]
    Conflict(Vec<BlockedRemoval>),
    #[error("\"{0}\" key not found!")]
    KeyNotFound(String),
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error(transparent)]
    Database(#[from] DbErr),
}

fn format_blocked(blocked: &[BlockedRemoval]) -> String {
    blocked
        .iter()
        .map(|b| b.label.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

impl PartialEq for EngineError {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::InvalidCode(a), Self::InvalidCode(b)) => a == b,
            (Self::Validation(a), Self::Validation(b)) => a == b,
            (Self::Conflict(a), Self::Conflict(b)) => a == b,
            (Self::KeyNotFound(a), Self::KeyNotFound(b)) => a == b,
            (Self::InvalidAmount(a), Self::InvalidAmount(b)) => a == b,
            (Self::Database(a), Self::Database(b)) => a.to_string() == b.to_string(),
            _ => false,
        }
    }
}
