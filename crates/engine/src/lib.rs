//! Reconciliation and aggregation engine for outline-coded budget sheets.
//!
//! A *contract* owns a hierarchical breakdown of budgeted line items
//! ("sheets") addressed by dot-delimited outline codes (`"A"`, `"A.1"`,
//! `"A.1.2"`); *orders* record consumption drawn against contract leaves.
//! Clients always submit the full desired sheet set for one owner; the
//! engine normalizes the codes, derives the parent/child structure and the
//! header roll-ups, validates the set, and persists the diff against the
//! previously stored rows as one transaction, preserving the identity of
//! matched rows and refusing (or soft-deleting) removals that other records
//! still reference.
//!
//! The pure passes ([`code`], [`hierarchy`], [`aggregate`], [`validate`],
//! [`plan`]) run on in-memory sets and are usable without a database; the
//! [`Engine`] ops layer wires them to storage.

pub use aggregate::BalanceRow;
pub use error::{BlockedRemoval, EngineError};
pub use groups::{GroupKind, SheetGroup};
pub use ops::{Engine, EngineBuilder, ReconcileOutcome};
pub use plan::{DeleteMode, ReconcilePlan};
pub use sheets::{Sheet, SheetId, SheetKind, SheetRole, SubmittedSheet};
pub use validate::{RowValidation, ValidationReport};

pub mod aggregate;
pub mod code;
mod error;
pub mod groups;
pub mod hierarchy;
mod money;
mod ops;
pub mod plan;
pub mod sheets;
pub mod validate;

type ResultEngine<T> = Result<T, EngineError>;
