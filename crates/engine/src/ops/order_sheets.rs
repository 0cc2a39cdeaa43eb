use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    ResultEngine,
    plan::DeleteMode,
    sheets::{SheetKind, SheetRole, SubmittedSheet},
    validate::{self, OrderContext},
};

use super::{
    Engine, ReconcileOutcome, contract_sheets::ensure_known_groups, derive, load_groups,
    load_owner_sheets, prepare_submitted, reject_invalid,
};

impl Engine {
    /// Reconciles an order's full consumption sheet set against the
    /// submitted one.
    ///
    /// `contract_id` is the contract the order draws against. Every
    /// submitted leaf must match an eligible (active, leaf) contract sheet by
    /// code; its funding link (`source_sheet_id`) is resolved server side
    /// from that match. The budget check runs against the contract's balance
    /// view with this order's own previous consumption excluded, so editing
    /// an order does not count against itself.
    ///
    /// The over-budget check and the commit are separate steps with no lock
    /// on the contract leaf; two concurrent submissions against the same
    /// leaf can both pass validation.
    pub async fn reconcile_order_sheets(
        &self,
        order_id: i64,
        contract_id: i64,
        submitted: Vec<SubmittedSheet>,
        mode: DeleteMode,
    ) -> ResultEngine<ReconcileOutcome> {
        let groups = load_groups(&self.database).await?;
        let mut sheets = prepare_submitted(SheetKind::Order, order_id, submitted)?;
        ensure_known_groups(&sheets, &groups)?;
        derive(&mut sheets, &groups);

        let mut contract_sheets =
            load_owner_sheets(&self.database, SheetKind::Contract, contract_id, true).await?;
        derive(&mut contract_sheets, &groups);

        let eligible: HashMap<String, i64> = contract_sheets
            .iter()
            .filter(|s| s.role == SheetRole::Leaf && s.is_active)
            .filter_map(|s| Some((s.code.clone(), s.id.persisted()?)))
            .collect();

        let consumption = self
            .sum_consumption_by_leaf(contract_id, Some(order_id))
            .await?;
        let available: HashMap<i64, Decimal> =
            crate::aggregate::balance_rows(&contract_sheets, &consumption)
                .into_iter()
                .map(|row| (row.sheet_id, row.available_amount))
                .collect();

        let ctx = OrderContext {
            eligible: &eligible,
            available: Some(&available),
        };
        reject_invalid(validate::validate(&sheets, Some(&ctx)))?;

        // Funding links follow the code match; headers draw on nothing.
        for sheet in sheets.iter_mut() {
            sheet.source_sheet_id = match sheet.role {
                SheetRole::Leaf => eligible.get(&sheet.code).copied(),
                SheetRole::Header => None,
            };
        }

        let persisted =
            load_owner_sheets(&self.database, SheetKind::Order, order_id, false).await?;
        // Order sheets have no dependent records of their own; removals are
        // always hard deletes.
        let dependents = HashMap::new();

        self.reconcile_set(
            SheetKind::Order,
            order_id,
            &persisted,
            sheets,
            &dependents,
            mode,
            &groups,
        )
        .await
    }
}
