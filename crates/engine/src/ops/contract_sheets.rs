use std::collections::{HashMap, HashSet};

use sea_orm::{ConnectionTrait, QueryFilter, prelude::*};

use crate::{
    EngineError, ResultEngine,
    error::BlockedRemoval,
    plan::DeleteMode,
    sheets,
    sheets::{Sheet, SheetKind, SheetRole, SubmittedSheet},
    validate,
};

use super::{
    Engine, ReconcileOutcome, derive, load_groups, load_owner_sheets, prepare_submitted,
    reject_invalid,
};

impl Engine {
    /// Reconciles a contract's full budget sheet set against the submitted
    /// one.
    ///
    /// The submitted rows are the complete desired state for the contract:
    /// rows carrying a recognized id are updated in place, rows without one
    /// are created, persisted rows missing from the submission are removed.
    /// A removal still drawn on by active order sheets either aborts the
    /// whole call with [`EngineError::Conflict`] (`DeleteMode::Strict`) or is
    /// retired with `is_active = false` (`DeleteMode::SoftDeleteInUse`).
    /// A kept row whose derived role turns header while orders draw on it
    /// conflicts in either mode: orders fund leaves only, and the submission
    /// still contains the row, so there is nothing to retire.
    /// Nothing is written unless the entire set validates.
    pub async fn reconcile_contract_sheets(
        &self,
        contract_id: i64,
        submitted: Vec<SubmittedSheet>,
        mode: DeleteMode,
    ) -> ResultEngine<ReconcileOutcome> {
        let groups = load_groups(&self.database).await?;
        let mut sheets = prepare_submitted(SheetKind::Contract, contract_id, submitted)?;
        ensure_known_groups(&sheets, &groups)?;
        derive(&mut sheets, &groups);
        reject_invalid(validate::validate(&sheets, None))?;

        let persisted =
            load_owner_sheets(&self.database, SheetKind::Contract, contract_id, false).await?;
        let mut watched = removal_candidates(&persisted, &sheets);
        watched.extend(kept_header_ids(&sheets));
        let dependents = count_order_dependents(&self.database, watched).await?;
        reject_drawn_on_headers(&sheets, &dependents)?;

        self.reconcile_set(
            SheetKind::Contract,
            contract_id,
            &persisted,
            sheets,
            &dependents,
            mode,
            &groups,
        )
        .await
    }
}

pub(super) fn ensure_known_groups(
    sheets: &[Sheet],
    groups: &HashMap<i64, crate::groups::SheetGroup>,
) -> ResultEngine<()> {
    for sheet in sheets {
        if !groups.contains_key(&sheet.group_id) {
            return Err(EngineError::KeyNotFound(format!(
                "sheet group {}",
                sheet.group_id
            )));
        }
    }
    Ok(())
}

/// Persisted ids the submission keeps but re-derives as headers. Orders fund
/// leaves only, so these need their dependent counts checked too.
fn kept_header_ids(submitted: &[Sheet]) -> Vec<i64> {
    submitted
        .iter()
        .filter(|s| s.role == SheetRole::Header)
        .filter_map(|s| s.id.persisted())
        .collect()
}

/// Refuses the reconciliation when a row drawn on by active orders would
/// stop being a leaf. The committed consumption has nowhere to roll up to
/// under a header, so the role change blocks like a removal.
fn reject_drawn_on_headers(
    submitted: &[Sheet],
    dependents: &HashMap<i64, u64>,
) -> ResultEngine<()> {
    let blocked: Vec<BlockedRemoval> = submitted
        .iter()
        .filter(|s| s.role == SheetRole::Header)
        .filter_map(|s| s.id.persisted().map(|id| (id, s)))
        .filter(|(id, _)| dependents.get(id).copied().unwrap_or(0) > 0)
        .map(|(id, sheet)| BlockedRemoval {
            sheet_id: id,
            label: format!("{} ({})", sheet.code, sheet.name),
        })
        .collect();

    if blocked.is_empty() {
        Ok(())
    } else {
        Err(EngineError::Conflict(blocked))
    }
}

/// Persisted active ids the submission no longer contains.
pub(super) fn removal_candidates(persisted: &[Sheet], submitted: &[Sheet]) -> Vec<i64> {
    let submitted_ids: HashSet<i64> = submitted.iter().filter_map(|s| s.id.persisted()).collect();
    persisted
        .iter()
        .filter(|row| row.is_active)
        .filter_map(|row| row.id.persisted())
        .filter(|id| !submitted_ids.contains(id))
        .collect()
}

/// Counts active order sheets drawing on each removal candidate.
async fn count_order_dependents<C: ConnectionTrait>(
    conn: &C,
    candidate_ids: Vec<i64>,
) -> ResultEngine<HashMap<i64, u64>> {
    if candidate_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sheets::Entity::find()
        .filter(sheets::Column::OwnerKind.eq(SheetKind::Order.as_str()))
        .filter(sheets::Column::IsActive.eq(true))
        .filter(sheets::Column::SourceSheetId.is_in(candidate_ids))
        .all(conn)
        .await?;

    let mut counts: HashMap<i64, u64> = HashMap::new();
    for row in rows {
        if let Some(source) = row.source_sheet_id {
            *counts.entry(source).or_default() += 1;
        }
    }
    Ok(counts)
}
