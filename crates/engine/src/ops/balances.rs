use std::collections::HashMap;

use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, Statement, Value};

use crate::{
    ResultEngine,
    aggregate::{self, BalanceRow},
    money::amount_from_minor,
    sheets::SheetKind,
};

use super::{Engine, derive, load_groups, load_owner_sheets};

impl Engine {
    /// Returns the budget balance per contract leaf: budgeted net amount,
    /// consumption summed over active order sheets drawing on the leaf, and
    /// what remains.
    ///
    /// Pass `exclude_order_id` when validating an edit of an existing order,
    /// so that order's previously committed consumption does not count
    /// against its own resubmission.
    pub async fn balance_view(
        &self,
        contract_id: i64,
        exclude_order_id: Option<i64>,
    ) -> ResultEngine<Vec<BalanceRow>> {
        let groups = load_groups(&self.database).await?;
        let mut sheets =
            load_owner_sheets(&self.database, SheetKind::Contract, contract_id, true).await?;
        derive(&mut sheets, &groups);

        let consumption = self
            .sum_consumption_by_leaf(contract_id, exclude_order_id)
            .await?;
        let rows = aggregate::balance_rows(&sheets, &consumption);
        tracing::debug!(contract_id, leaves = rows.len(), "balance view computed");
        Ok(rows)
    }

    /// Sums active order consumption (net amount) grouped by the contract
    /// leaf it draws on.
    pub(super) async fn sum_consumption_by_leaf(
        &self,
        contract_id: i64,
        exclude_order_id: Option<i64>,
    ) -> ResultEngine<HashMap<i64, Decimal>> {
        let backend = self.database.get_database_backend();
        let exclude_cond = if exclude_order_id.is_some() {
            " AND owner_id <> ?"
        } else {
            ""
        };

        let stmt = Statement::from_sql_and_values(
            backend,
            format!(
                "SELECT source_sheet_id, COALESCE(SUM(net_amount_minor), 0) AS consumed \
                 FROM sheets \
                 WHERE owner_kind = ? AND is_active = 1 AND source_sheet_id IN \
                 (SELECT id FROM sheets WHERE owner_kind = ? AND owner_id = ?)\
                 {exclude_cond} \
                 GROUP BY source_sheet_id"
            ),
            {
                let mut values: Vec<Value> = vec![
                    SheetKind::Order.as_str().into(),
                    SheetKind::Contract.as_str().into(),
                    contract_id.into(),
                ];
                if let Some(order_id) = exclude_order_id {
                    values.push(order_id.into());
                }
                values
            },
        );

        let rows = self.database.query_all(stmt).await?;
        let mut sums = HashMap::with_capacity(rows.len());
        for row in rows {
            let leaf_id: i64 = row.try_get("", "source_sheet_id")?;
            let consumed_minor: i64 = row.try_get("", "consumed")?;
            sums.insert(leaf_id, amount_from_minor(consumed_minor));
        }
        Ok(sums)
    }
}
