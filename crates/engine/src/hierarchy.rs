//! The module derives the parent/child structure of one owner's sheet set.
//!
//! Hierarchy is carried entirely by outline codes: `"A.1.2"` is a child of
//! whatever row carries `"A.1"`. One pass builds a code-indexed arena and
//! annotates every sheet in place with its role, parent link and global
//! sequence. Duplicate codes and missing intermediate ancestors are left for
//! the validator to flag; this pass never drops or rejects rows.

use std::collections::{HashMap, HashSet};

use crate::{
    groups::SheetGroup,
    sheets::{Sheet, SheetId, SheetRole},
};

/// Annotates `sheets` with derived `role`, `parent_id`, `sequence_in_group`
/// and `sequence_global`.
///
/// Codes must already be normalized. The pass is deterministic and free of
/// hidden state: running it twice yields identical annotations, and the
/// global sequence depends only on (group sequence, within-group sequence or
/// submission position).
pub fn build(sheets: &mut [Sheet], groups: &HashMap<i64, SheetGroup>) {
    // Arena: one hash lookup per parent resolution instead of rescanning the
    // set per row. On duplicate codes the first occurrence wins here; the
    // validator flags every duplicate row anyway.
    let mut arena: HashMap<&str, SheetId> = HashMap::with_capacity(sheets.len());
    let mut parents: HashSet<String> = HashSet::with_capacity(sheets.len());
    for sheet in sheets.iter() {
        arena.entry(sheet.code.as_str()).or_insert(sheet.id);
        if let Some(pos) = sheet.code.rfind('.') {
            parents.insert(sheet.code[..pos].to_string());
        }
    }

    let resolved: Vec<(SheetRole, Option<SheetId>)> = sheets
        .iter()
        .map(|sheet| {
            let role = if parents.contains(&sheet.code) {
                SheetRole::Header
            } else {
                SheetRole::Leaf
            };
            let parent = sheet
                .code
                .rfind('.')
                .and_then(|pos| arena.get(&sheet.code[..pos]))
                .copied();
            (role, parent)
        })
        .collect();

    for (sheet, (role, parent)) in sheets.iter_mut().zip(resolved) {
        sheet.role = role;
        sheet.parent_id = parent;
        if role == SheetRole::Header {
            // Headers never carry independent pricing; amounts come from the
            // aggregator.
            sheet.quantity = None;
            sheet.unit_price = None;
        }
    }

    assign_sequences(sheets, groups);
}

/// Ranks sheets by (group sequence, within-group sequence or submission
/// position) and writes 1-based `sequence_global` plus any missing
/// `sequence_in_group`.
fn assign_sequences(sheets: &mut [Sheet], groups: &HashMap<i64, SheetGroup>) {
    let mut order: Vec<usize> = (0..sheets.len()).collect();
    order.sort_by_key(|&i| {
        let sheet = &sheets[i];
        let group_seq = groups.get(&sheet.group_id).map_or(i32::MAX, |g| g.sequence);
        let in_group = sheet.sequence_in_group.map_or(i as i64, i64::from);
        (group_seq, in_group, i)
    });

    let mut per_group: HashMap<i64, i32> = HashMap::new();
    for (rank, &i) in order.iter().enumerate() {
        let sheet = &mut sheets[i];
        sheet.sequence_global = rank as i32 + 1;
        let counter = per_group.entry(sheet.group_id).or_insert(0);
        *counter += 1;
        if sheet.sequence_in_group.is_none() {
            sheet.sequence_in_group = Some(*counter);
        }
    }
}

/// Returns the codes of sheets whose parent code is missing from the set
/// while claiming ancestry deeper than top level.
///
/// A top-level code with no dot never gaps; only codes whose parent itself
/// contains a `.` require that ancestor to exist.
#[must_use]
pub fn parent_gaps(sheets: &[Sheet]) -> HashSet<String> {
    let codes: HashSet<&str> = sheets.iter().map(|s| s.code.as_str()).collect();
    sheets
        .iter()
        .filter_map(|sheet| {
            let pos = sheet.code.rfind('.')?;
            let parent = &sheet.code[..pos];
            (parent.contains('.') && !codes.contains(parent)).then(|| sheet.code.clone())
        })
        .collect()
}
