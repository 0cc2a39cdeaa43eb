use std::collections::HashMap;

use chrono::Utc;
use sea_orm::{
    ActiveValue, ConnectionTrait, DatabaseConnection, DatabaseTransaction, QueryFilter,
    QueryOrder, TransactionTrait, prelude::*,
};
use serde::{Deserialize, Serialize};

use crate::{
    EngineError, ResultEngine, aggregate, code, groups,
    groups::SheetGroup,
    hierarchy,
    plan::{DeleteMode, ReconcilePlan, plan},
    sheets,
    sheets::{Sheet, SheetId, SheetKind, SubmittedSheet},
    validate::ValidationReport,
};

mod balances;
mod contract_sheets;
mod order_sheets;
mod read;

/// Run a block inside a DB transaction, committing on success and rolling back on error.
macro_rules! with_tx {
    ($self:expr, |$tx:ident| $body:expr) => {{
        let $tx = $self.database.begin().await?;
        let result = $body;
        match result {
            Ok(value) => {
                $tx.commit().await?;
                Ok(value)
            }
            Err(err) => Err(err),
        }
    }};
}

pub(crate) use with_tx;

/// What one reconciliation changed, plus the resulting fully-derived active
/// set (roles, parent links and header amounts recomputed after the writes).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub updated: usize,
    pub soft_deleted: usize,
    pub hard_deleted: usize,
    pub sheets: Vec<Sheet>,
}

#[derive(Debug)]
pub struct Engine {
    database: DatabaseConnection,
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Shared reconcile tail: plans the diff against the persisted set and
    /// applies it as one transaction, then re-derives the resulting set.
    ///
    /// `submitted` must already be normalized, hierarchy-annotated and
    /// validated by the context-specific caller.
    async fn reconcile_set(
        &self,
        kind: SheetKind,
        owner_id: i64,
        persisted: &[Sheet],
        submitted: Vec<Sheet>,
        dependents: &HashMap<i64, u64>,
        mode: DeleteMode,
        groups: &HashMap<i64, SheetGroup>,
    ) -> ResultEngine<ReconcileOutcome> {
        let plan = plan(persisted, submitted, dependents, mode)?;
        let (created, updated, soft_deleted, hard_deleted) = (
            plan.creates.len(),
            plan.updates.len(),
            plan.soft_deletes.len(),
            plan.hard_deletes.len(),
        );

        let mut sheets = with_tx!(self, |db_tx| {
            async {
                apply_plan(&db_tx, plan).await?;
                load_owner_sheets(&db_tx, kind, owner_id, true).await
            }
            .await
        })?;

        derive(&mut sheets, groups);
        tracing::info!(
            kind = kind.as_str(),
            owner_id,
            created,
            updated,
            soft_deleted,
            hard_deleted,
            "sheet set reconciled"
        );

        Ok(ReconcileOutcome {
            created,
            updated,
            soft_deleted,
            hard_deleted,
            sheets,
        })
    }
}

/// Applies a reconcile plan on an open transaction.
///
/// Creates run first, in depth order, building the pending-token map so
/// children (created or updated) link to the ids their new parents were just
/// assigned. Deletes run last.
async fn apply_plan(db_tx: &DatabaseTransaction, plan: ReconcilePlan) -> ResultEngine<()> {
    let mut assigned: HashMap<SheetId, i64> = HashMap::new();

    for sheet in &plan.creates {
        let parent = resolve_parent(sheet.parent_id, &assigned)?;
        let model = sheet.to_active_model(parent)?.insert(db_tx).await?;
        assigned.insert(sheet.id, model.id);
    }

    for sheet in &plan.updates {
        let parent = resolve_parent(sheet.parent_id, &assigned)?;
        sheet.to_active_model(parent)?.update(db_tx).await?;
    }

    for id in &plan.soft_deletes {
        let model = sheets::ActiveModel {
            id: ActiveValue::Set(*id),
            is_active: ActiveValue::Set(false),
            updated_at: ActiveValue::Set(Utc::now()),
            ..Default::default()
        };
        model.update(db_tx).await?;
    }

    if !plan.hard_deletes.is_empty() {
        sheets::Entity::delete_many()
            .filter(sheets::Column::Id.is_in(plan.hard_deletes.clone()))
            .exec(db_tx)
            .await?;
    }

    Ok(())
}

fn resolve_parent(
    parent: Option<SheetId>,
    assigned: &HashMap<SheetId, i64>,
) -> ResultEngine<Option<i64>> {
    match parent {
        None => Ok(None),
        Some(SheetId::Persisted(id)) => Ok(Some(id)),
        Some(pending) => assigned.get(&pending).copied().map(Some).ok_or_else(|| {
            EngineError::KeyNotFound("parent sheet not created yet".to_string())
        }),
    }
}

/// Loads one owner's sheet set, ordered by global sequence.
async fn load_owner_sheets<C: ConnectionTrait>(
    conn: &C,
    kind: SheetKind,
    owner_id: i64,
    active_only: bool,
) -> ResultEngine<Vec<Sheet>> {
    let mut query = sheets::Entity::find()
        .filter(sheets::Column::OwnerKind.eq(kind.as_str()))
        .filter(sheets::Column::OwnerId.eq(owner_id))
        .order_by_asc(sheets::Column::SequenceGlobal)
        .order_by_asc(sheets::Column::Id);
    if active_only {
        query = query.filter(sheets::Column::IsActive.eq(true));
    }

    let models = query.all(conn).await?;
    models.into_iter().map(Sheet::try_from).collect()
}

/// Loads the group reference data as an id-indexed lookup.
async fn load_groups<C: ConnectionTrait>(conn: &C) -> ResultEngine<HashMap<i64, SheetGroup>> {
    let models = groups::Entity::find().all(conn).await?;
    models
        .into_iter()
        .map(|model| SheetGroup::try_from(model).map(|group| (group.id, group)))
        .collect()
}

/// Turns a submitted set into working sheets: blank-code rows dropped,
/// codes normalized, leaf amounts computed.
fn prepare_submitted(
    kind: SheetKind,
    owner_id: i64,
    submitted: Vec<SubmittedSheet>,
) -> ResultEngine<Vec<Sheet>> {
    submitted
        .into_iter()
        .filter(|row| !code::is_blank(&row.code))
        .map(|row| {
            let parsed = code::parse(&row.code)?;
            Ok(Sheet::from_submitted(kind, owner_id, &parsed, row))
        })
        .collect()
}

/// Hierarchy + aggregation in one pass, the order every caller needs.
fn derive(sheets: &mut [Sheet], groups: &HashMap<i64, SheetGroup>) {
    hierarchy::build(sheets, groups);
    aggregate::roll_up(sheets);
}

fn reject_invalid(report: ValidationReport) -> ResultEngine<ValidationReport> {
    if report.is_valid() {
        Ok(report)
    } else {
        Err(EngineError::Validation(report))
    }
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    database: DatabaseConnection,
}

impl EngineBuilder {
    /// Pass the required database
    pub fn database(mut self, db: DatabaseConnection) -> EngineBuilder {
        self.database = db;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> Engine {
        Engine {
            database: self.database,
        }
    }
}
