//! The module rolls leaf amounts up into header sheets and derives budget
//! balances.
//!
//! Header amounts are the sum of their **leaf** descendants only;
//! intermediate headers are skipped so nothing is counted twice. Sums run at
//! full `Decimal` precision and are rounded once, at the stored figure, which
//! makes them independent of submission order.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    money::round_amount,
    sheets::{Sheet, SheetRole},
};

/// Overwrites every header's gross/net amounts with its leaf-descendant sums.
///
/// Headers with no leaf descendants (only possible alongside structural
/// errors the validator reports) end up at zero.
pub fn roll_up(sheets: &mut [Sheet]) {
    let mut sums: HashMap<String, (Decimal, Decimal)> = HashMap::new();

    for sheet in sheets.iter() {
        if sheet.role != SheetRole::Leaf {
            continue;
        }
        // Credit every ancestor prefix of the leaf's code.
        let code = sheet.code.as_str();
        for (pos, _) in code.match_indices('.') {
            let entry = sums.entry(code[..pos].to_string()).or_default();
            entry.0 += sheet.gross_amount;
            entry.1 += sheet.net_amount;
        }
    }

    for sheet in sheets.iter_mut() {
        if sheet.role != SheetRole::Header {
            continue;
        }
        let (gross, net) = sums.get(&sheet.code).copied().unwrap_or_default();
        sheet.gross_amount = round_amount(gross);
        sheet.net_amount = round_amount(net);
    }
}

/// One row of the balance view: how much of a contract leaf's budget the
/// active orders have consumed, and what remains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BalanceRow {
    pub sheet_id: i64,
    pub sheet_code: String,
    pub sheet_name: String,
    pub group_id: i64,
    pub budget_amount: Decimal,
    pub consumed_amount: Decimal,
    pub available_amount: Decimal,
}

/// Joins contract leaves with an already-aggregated consumption map
/// (leaf id -> summed order net amount).
///
/// Sheets without a persisted id or without leaf role are skipped; the
/// consumption map is whatever the caller queried, typically with one order
/// excluded when that order is being edited.
#[must_use]
pub fn balance_rows(sheets: &[Sheet], consumption: &HashMap<i64, Decimal>) -> Vec<BalanceRow> {
    sheets
        .iter()
        .filter(|sheet| sheet.role == SheetRole::Leaf && sheet.is_active)
        .filter_map(|sheet| {
            let sheet_id = sheet.id.persisted()?;
            let consumed = consumption.get(&sheet_id).copied().unwrap_or_default();
            Some(BalanceRow {
                sheet_id,
                sheet_code: sheet.code.clone(),
                sheet_name: sheet.name.clone(),
                group_id: sheet.group_id,
                budget_amount: sheet.net_amount,
                consumed_amount: round_amount(consumed),
                available_amount: round_amount(sheet.net_amount - consumed),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use rust_decimal::Decimal;

    use crate::{
        code,
        groups::{GroupKind, SheetGroup},
        hierarchy,
        sheets::{Sheet, SheetId, SheetKind, SubmittedSheet},
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

    fn priced(raw_code: &str, quantity: i64, price_cents: i64) -> Sheet {
        let parsed = code::parse(raw_code).unwrap();
        Sheet::from_submitted(
            SheetKind::Contract,
            1,
            &parsed,
            SubmittedSheet::new(1, raw_code, raw_code)
                .priced(Decimal::from(quantity), Decimal::new(price_cents, 2)),
        )
    }

    #[test]
    fn headers_sum_leaf_descendants_only() {
        let mut sheets = vec![
            priced("A", 1, 1),      // header, pricing discarded
            priced("A.1", 1, 1),    // intermediate header, pricing discarded
            priced("A.1.1", 2, 10_00),
            priced("A.1.2", 3, 5_00),
            priced("A.2", 1, 7_50),
        ];
        hierarchy::build(&mut sheets, &groups_fixture());
        roll_up(&mut sheets);

        // A.1 = 20.00 + 15.00; A = 35.00 + 7.50. The header's own discarded
        // pricing never contributes.
        assert_eq!(sheets[1].gross_amount, Decimal::new(35_00, 2));
        assert_eq!(sheets[0].gross_amount, Decimal::new(42_50, 2));
        assert_eq!(sheets[0].net_amount, Decimal::new(42_50, 2));
    }

    #[test]
    fn sums_are_order_independent() {
        let build_total = |codes: &[(&str, i64, i64)]| {
            let mut sheets: Vec<Sheet> =
                codes.iter().map(|(c, q, p)| priced(c, *q, *p)).collect();
            hierarchy::build(&mut sheets, &groups_fixture());
            roll_up(&mut sheets);
            sheets
                .iter()
                .find(|s| s.code == "A")
                .map(|s| s.gross_amount)
                .unwrap()
        };

        let forward = build_total(&[("A", 0, 0), ("A.1", 2, 333), ("A.2", 3, 333)]);
        let backward = build_total(&[("A.2", 3, 333), ("A.1", 2, 333), ("A", 0, 0)]);
        assert_eq!(forward, backward);
    }

    #[test]
    fn discounted_leaves_roll_up_net_separately() {
        let parsed = code::parse("A.1").unwrap();
        let discounted = Sheet::from_submitted(
            SheetKind::Contract,
            1,
            &parsed,
            SubmittedSheet::new(1, "A.1", "A.1")
                .priced(Decimal::from(10), Decimal::new(100_00, 2))
                .discount_rate(Decimal::new(10, 2)), // 10%
        );
        let mut sheets = vec![priced("A", 0, 0), discounted];
        hierarchy::build(&mut sheets, &groups_fixture());
        roll_up(&mut sheets);

        assert_eq!(sheets[0].gross_amount, Decimal::new(1000_00, 2));
        assert_eq!(sheets[0].net_amount, Decimal::new(900_00, 2));
    }

    #[test]
    fn balance_rows_compute_available() {
        let mut sheets = vec![priced("A", 0, 0), priced("A.1", 1, 1000_00), priced("A.2", 1, 500_00)];
        hierarchy::build(&mut sheets, &groups_fixture());
        roll_up(&mut sheets);
        for (i, sheet) in sheets.iter_mut().enumerate() {
            sheet.id = SheetId::Persisted(i as i64 + 100);
        }

        let leaf_id = sheets
            .iter()
            .find(|s| s.code == "A.1")
            .and_then(|s| s.id.persisted())
            .unwrap();
        let consumption = HashMap::from([(leaf_id, Decimal::new(550_00, 2))]);

        let rows = balance_rows(&sheets, &consumption);
        assert_eq!(rows.len(), 2);
        let row = rows.iter().find(|r| r.sheet_id == leaf_id).unwrap();
        assert_eq!(row.budget_amount, Decimal::new(1000_00, 2));
        assert_eq!(row.consumed_amount, Decimal::new(550_00, 2));
        assert_eq!(row.available_amount, Decimal::new(450_00, 2));
        let other = rows.iter().find(|r| r.sheet_code == "A.2").unwrap();
        assert_eq!(other.consumed_amount, Decimal::ZERO.round_dp(2));
        assert_eq!(other.available_amount, Decimal::new(500_00, 2));
    }
}
