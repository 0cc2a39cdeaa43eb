use sea_orm::{QueryOrder, TransactionTrait, prelude::*};

use crate::{
    ResultEngine, groups,
    groups::SheetGroup,
    sheets::{Sheet, SheetKind},
};

use super::{Engine, derive, load_groups, load_owner_sheets, with_tx};

impl Engine {
    /// Returns one owner's active sheet set with roles, parent links and
    /// header amounts freshly derived.
    pub async fn sheet_set(&self, kind: SheetKind, owner_id: i64) -> ResultEngine<Vec<Sheet>> {
        let groups = load_groups(&self.database).await?;
        let mut sheets = load_owner_sheets(&self.database, kind, owner_id, true).await?;
        derive(&mut sheets, &groups);
        Ok(sheets)
    }

    /// Returns the group reference data, ordered by display sequence.
    pub async fn sheet_groups(&self) -> ResultEngine<Vec<SheetGroup>> {
        let models = groups::Entity::find()
            .order_by_asc(groups::Column::Sequence)
            .all(&self.database)
            .await?;
        models.into_iter().map(SheetGroup::try_from).collect()
    }

    /// Recomputes and stores the derived columns (role, parent link,
    /// sequences, header amounts) for one owner from its persisted rows.
    ///
    /// Reconciliation keeps these up to date on its own; this is for sets
    /// touched outside the engine, e.g. after a bulk import.
    pub async fn recompute_derived(&self, kind: SheetKind, owner_id: i64) -> ResultEngine<()> {
        let groups = load_groups(&self.database).await?;

        with_tx!(self, |db_tx| {
            async {
                let mut sheets = load_owner_sheets(&db_tx, kind, owner_id, true).await?;
                derive(&mut sheets, &groups);
                for sheet in &sheets {
                    let parent_id = sheet.parent_id.and_then(|p| p.persisted());
                    sheet.to_active_model(parent_id)?.update(&db_tx).await?;
                }
                tracing::debug!(
                    kind = kind.as_str(),
                    owner_id,
                    rows = sheets.len(),
                    "derived columns recomputed"
                );
                Ok(())
            }
            .await
        })
    }
}
