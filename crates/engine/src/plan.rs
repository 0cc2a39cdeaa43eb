//! The module classifies a submitted sheet set against the persisted one.
//!
//! Planning is pure: given the persisted rows, the derived submitted rows and
//! a dependent count per removal candidate, it decides create / update /
//! hard-delete / soft-delete per record without touching storage. The ops
//! layer applies the resulting plan inside one database transaction, which
//! keeps the referential-integrity decision testable on its own.

use std::collections::{HashMap, HashSet};

use crate::{
    EngineError,
    code,
    error::BlockedRemoval,
    sheets::{Sheet, SheetId},
};

/// What to do with persisted rows the submission no longer contains but other
/// records still reference.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeleteMode {
    /// Refuse the whole reconciliation with a conflict listing the blockers.
    Strict,
    /// Mark blocked rows `is_active = false` and keep them for history.
    SoftDeleteInUse,
}

/// The decided diff for one owner's sheet set.
#[derive(Clone, Debug, Default)]
pub struct ReconcilePlan {
    /// New rows, ordered by code depth so parents insert before children.
    /// Their ids and parent references may still be pending tokens.
    pub creates: Vec<Sheet>,
    /// Rows matched to a persisted id, updated in place.
    pub updates: Vec<Sheet>,
    /// Persisted ids with no dependents, removed outright.
    pub hard_deletes: Vec<i64>,
    /// Persisted ids still referenced, retired instead of removed.
    pub soft_deletes: Vec<i64>,
}

/// Builds the reconcile plan.
///
/// A submitted id is recognized only when it exists in the persisted set;
/// unrecognized ids are treated as creates with a fresh pending token (and
/// any children pointing at the stale id are re-pointed). `dependents` maps
/// removal-candidate ids to their live reference count; missing entries mean
/// zero.
pub fn plan(
    persisted: &[Sheet],
    mut submitted: Vec<Sheet>,
    dependents: &HashMap<i64, u64>,
    mode: DeleteMode,
) -> Result<ReconcilePlan, EngineError> {
    let known: HashSet<i64> = persisted.iter().filter_map(|s| s.id.persisted()).collect();

    // Re-tag rows carrying an id the persisted set does not know. Children
    // resolved their parent link against the stale id, so remap those too.
    let mut remapped: HashMap<SheetId, SheetId> = HashMap::new();
    for sheet in submitted.iter_mut() {
        if let Some(id) = sheet.id.persisted()
            && !known.contains(&id)
        {
            let fresh = SheetId::pending();
            remapped.insert(sheet.id, fresh);
            sheet.id = fresh;
        }
    }
    if !remapped.is_empty() {
        for sheet in submitted.iter_mut() {
            if let Some(parent) = sheet.parent_id
                && let Some(fresh) = remapped.get(&parent)
            {
                sheet.parent_id = Some(*fresh);
            }
        }
    }

    let submitted_ids: HashSet<i64> = submitted.iter().filter_map(|s| s.id.persisted()).collect();

    let mut hard_deletes = Vec::new();
    let mut soft_deletes = Vec::new();
    let mut blocked = Vec::new();
    for row in persisted {
        let Some(id) = row.id.persisted() else {
            continue;
        };
        if !row.is_active || submitted_ids.contains(&id) {
            continue;
        }
        let dependent_count = dependents.get(&id).copied().unwrap_or(0);
        if dependent_count == 0 {
            hard_deletes.push(id);
        } else {
            match mode {
                DeleteMode::Strict => blocked.push(BlockedRemoval {
                    sheet_id: id,
                    label: format!("{} ({})", row.code, row.name),
                }),
                DeleteMode::SoftDeleteInUse => soft_deletes.push(id),
            }
        }
    }
    if !blocked.is_empty() {
        return Err(EngineError::Conflict(blocked));
    }

    let (mut creates, updates): (Vec<Sheet>, Vec<Sheet>) = submitted
        .into_iter()
        .partition(|sheet| sheet.id.persisted().is_none());

    // Parents insert before children: sort creates by depth, stable on
    // submission order within one depth.
    creates.sort_by_key(|sheet| code_depth(&sheet.code));

    Ok(ReconcilePlan {
        creates,
        updates,
        hard_deletes,
        soft_deletes,
    })
}

fn code_depth(normalized: &str) -> usize {
    code::parse(normalized).map_or(1, |parsed| parsed.depth)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use crate::{
        code,
        groups::{GroupKind, SheetGroup},
        hierarchy,
        sheets::{Sheet, SheetKind, SubmittedSheet},
    };

    use super::*;

    fn groups_fixture() -> HashMap<i64, SheetGroup> {
        HashMap::from([(
            1,
            SheetGroup {
                id: 1,
                name: "Works".to_string(),
                kind: GroupKind::Work,
                sequence: 1,
            },
        )])
    }

    fn make(raw_code: &str, id: Option<i64>) -> Sheet {
        let parsed = code::parse(raw_code).unwrap();
        let mut submitted = SubmittedSheet::new(1, raw_code, raw_code)
            .priced(Decimal::ONE, Decimal::new(100, 0));
        submitted.id = id;
        Sheet::from_submitted(SheetKind::Contract, 1, &parsed, submitted)
    }

    fn derived(mut sheets: Vec<Sheet>) -> Vec<Sheet> {
        hierarchy::build(&mut sheets, &groups_fixture());
        sheets
    }

    #[test]
    fn partitions_creates_updates_and_removals() {
        let persisted = derived(vec![make("A.1", Some(101)), make("A.2", Some(102))]);
        let submitted = derived(vec![make("A.1", Some(101)), make("A.3", None)]);

        let plan = plan(&persisted, submitted, &HashMap::new(), DeleteMode::Strict).unwrap();
        assert_eq!(plan.updates.len(), 1);
        assert_eq!(plan.updates[0].id.persisted(), Some(101));
        assert_eq!(plan.creates.len(), 1);
        assert!(plan.creates[0].id.persisted().is_none());
        assert_eq!(plan.hard_deletes, vec![102]);
        assert!(plan.soft_deletes.is_empty());
    }

    #[test]
    fn removal_with_dependents_conflicts_in_strict_mode() {
        let persisted = derived(vec![make("A.1", Some(101))]);
        let dependents = HashMap::from([(101i64, 2u64)]);

        let err = plan(&persisted, vec![], &dependents, DeleteMode::Strict).unwrap_err();
        match err {
            EngineError::Conflict(blocked) => {
                assert_eq!(blocked.len(), 1);
                assert_eq!(blocked[0].sheet_id, 101);
                assert_eq!(blocked[0].label, "A.1 (A.1)");
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn removal_with_dependents_soft_deletes_when_opted_in() {
        let persisted = derived(vec![make("A.1", Some(101)), make("A.2", Some(102))]);
        let dependents = HashMap::from([(101i64, 1u64)]);

        let plan = plan(&persisted, vec![], &dependents, DeleteMode::SoftDeleteInUse).unwrap();
        assert_eq!(plan.soft_deletes, vec![101]);
        assert_eq!(plan.hard_deletes, vec![102]);
    }

    #[test]
    fn already_inactive_rows_are_left_alone() {
        let mut retired = make("A.1", Some(101));
        retired.is_active = false;
        let persisted = derived(vec![retired]);

        let plan = plan(&persisted, vec![], &HashMap::new(), DeleteMode::Strict).unwrap();
        assert!(plan.hard_deletes.is_empty());
        assert!(plan.soft_deletes.is_empty());
    }

    #[test]
    fn unrecognized_ids_become_creates_with_repointed_children() {
        let persisted: Vec<Sheet> = vec![];
        // Client invented id 999 for a new header and its child resolved the
        // parent link against it.
        let submitted = derived(vec![make("A", Some(999)), make("A.1", None)]);
        let stale_parent = submitted[1].parent_id.unwrap();

        let plan = plan(&persisted, submitted, &HashMap::new(), DeleteMode::Strict).unwrap();
        assert_eq!(plan.creates.len(), 2);
        assert!(plan.updates.is_empty());

        let header = plan.creates.iter().find(|s| s.code == "A").unwrap();
        let child = plan.creates.iter().find(|s| s.code == "A.1").unwrap();
        assert!(header.id.persisted().is_none());
        assert_ne!(child.parent_id.unwrap(), stale_parent);
        assert_eq!(child.parent_id.unwrap(), header.id);
    }

    #[test]
    fn creates_are_depth_ordered() {
        let submitted = derived(vec![make("A.1.2", None), make("A", None), make("A.1", None)]);
        let plan = plan(&[], submitted, &HashMap::new(), DeleteMode::Strict).unwrap();

        let depths: Vec<usize> = plan
            .creates
            .iter()
            .map(|s| s.code.split('.').count())
            .collect();
        assert_eq!(depths, vec![1, 2, 3]);
    }
}
