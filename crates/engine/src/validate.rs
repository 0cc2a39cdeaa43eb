//! The module collects per-row validation errors for a submitted sheet set.
//!
//! Nothing short-circuits: every rule runs over every row so the caller can
//! hand the client the full picture in one round trip. The report is
//! advisory; the ops layer refuses persistence whenever any row has errors.

use std::collections::HashMap;
use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{
    hierarchy,
    sheets::{Sheet, SheetRole},
};

/// Errors attached to one submitted row, addressed by submission position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowValidation {
    pub index: usize,
    pub code: String,
    pub errors: Vec<String>,
}

/// The collected outcome of validating one owner's submitted set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub rows: Vec<RowValidation>,
}

impl ValidationReport {
    /// `true` when no row carries an error.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.rows.iter().all(|row| row.errors.is_empty())
    }

    /// Rows that actually carry errors.
    pub fn invalid_rows(&self) -> impl Iterator<Item = &RowValidation> {
        self.rows.iter().filter(|row| !row.errors.is_empty())
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let invalid = self.invalid_rows().count();
        write!(f, "validation failed for {invalid} row(s)")
    }
}

/// Order-context lookups: which contract leaves an order may draw on and how
/// much budget each still has.
pub struct OrderContext<'a> {
    /// Eligible (active, leaf) contract sheet id by normalized code.
    pub eligible: &'a HashMap<String, i64>,
    /// Remaining budget by contract leaf id, already computed with the
    /// edited order excluded. `None` skips the budget rule.
    pub available: Option<&'a HashMap<i64, Decimal>>,
}

/// Validates a derived sheet set (hierarchy already built).
///
/// With `order` supplied the order-context rules run as well: required
/// fields on leaves, existence of the drawn-on contract leaf, and the
/// over-budget check.
#[must_use]
pub fn validate(sheets: &[Sheet], order: Option<&OrderContext>) -> ValidationReport {
    let mut code_counts: HashMap<&str, usize> = HashMap::new();
    for sheet in sheets.iter().filter(|s| s.is_active) {
        *code_counts.entry(sheet.code.as_str()).or_default() += 1;
    }
    let gaps = hierarchy::parent_gaps(sheets);

    let rows = sheets
        .iter()
        .enumerate()
        .map(|(index, sheet)| {
            let mut errors = Vec::new();

            if sheet.is_active && code_counts.get(sheet.code.as_str()).copied().unwrap_or(0) > 1 {
                errors.push(format!("duplicate code {}", sheet.code));
            }

            if gaps.contains(&sheet.code) {
                // Safe: gap rows always have a dot in their code.
                let parent = &sheet.code[..sheet.code.rfind('.').unwrap_or(0)];
                errors.push(format!("intermediate parent {parent} not found"));
            }

            if let Some(ctx) = order
                && sheet.role == SheetRole::Leaf
            {
                validate_order_leaf(sheet, ctx, &mut errors);
            }

            RowValidation {
                index,
                code: sheet.code.clone(),
                errors,
            }
        })
        .collect();

    ValidationReport { rows }
}

fn validate_order_leaf(sheet: &Sheet, ctx: &OrderContext, errors: &mut Vec<String>) {
    required_text(sheet.reference_type.as_deref(), "reference type", errors);
    required_text(sheet.reference_number.as_deref(), "reference number", errors);
    required_text(sheet.unit_of_measure.as_deref(), "unit of measure", errors);
    if sheet.counterparty_id.is_none() {
        errors.push("counterparty is required".to_string());
    }
    required_positive(sheet.quantity, "quantity", errors);
    required_positive(sheet.unit_price, "unit price", errors);
    if sheet.gross_amount <= Decimal::ZERO {
        errors.push("gross amount must be positive".to_string());
    }

    let Some(leaf_id) = ctx.eligible.get(&sheet.code) else {
        errors.push(format!(
            "code {} does not match any contract sheet",
            sheet.code
        ));
        return;
    };

    if let Some(available) = ctx.available
        && let Some(remaining) = available.get(leaf_id)
        && sheet.net_amount > *remaining
    {
        errors.push(format!(
            "amount {} exceeds available budget {remaining}",
            sheet.net_amount
        ));
    }
}

fn required_text(value: Option<&str>, label: &str, errors: &mut Vec<String>) {
    if value.map_or(true, |v| v.trim().is_empty()) {
        errors.push(format!("{label} is required"));
    }
}

fn required_positive(value: Option<Decimal>, label: &str, errors: &mut Vec<String>) {
    if value.map_or(true, |v| v <= Decimal::ZERO) {
        errors.push(format!("{label} must be positive"));
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use chrono::NaiveDate;
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

    fn contract_sheet(raw_code: &str) -> Sheet {
        let parsed = code::parse(raw_code).unwrap();
        Sheet::from_submitted(
            SheetKind::Contract,
            1,
            &parsed,
            SubmittedSheet::new(1, raw_code, raw_code)
                .priced(Decimal::ONE, Decimal::new(100, 0)),
        )
    }

    fn order_sheet(raw_code: &str, net_cents: i64) -> Sheet {
        let parsed = code::parse(raw_code).unwrap();
        Sheet::from_submitted(
            SheetKind::Order,
            7,
            &parsed,
            SubmittedSheet::new(1, raw_code, raw_code)
                .priced(Decimal::ONE, Decimal::new(net_cents, 2))
                .reference("invoice", "2026/042", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
                .counterparty(5)
                .unit_of_measure("pcs"),
        )
    }

    fn derived(mut sheets: Vec<Sheet>) -> Vec<Sheet> {
        hierarchy::build(&mut sheets, &groups_fixture());
        sheets
    }

    #[test]
    fn whitespace_variants_are_duplicates() {
        let sheets = derived(vec![contract_sheet("A.1"), contract_sheet("A. 1")]);
        let report = validate(&sheets, None);

        assert!(!report.is_valid());
        assert_eq!(report.invalid_rows().count(), 2);
        for row in report.invalid_rows() {
            assert!(row.errors[0].contains("duplicate code A.1"));
        }
    }

    #[test]
    fn gap_detection_flags_only_deep_ancestry() {
        let sheets = derived(vec![contract_sheet("A"), contract_sheet("A.1.2")]);
        let report = validate(&sheets, None);

        let flagged: Vec<_> = report.invalid_rows().collect();
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].code, "A.1.2");
        assert!(flagged[0].errors[0].contains("intermediate parent A.1 not found"));

        // Missing top-level parent is allowed.
        let sheets = derived(vec![contract_sheet("B.1")]);
        assert!(validate(&sheets, None).is_valid());
    }

    #[test]
    fn order_leaves_need_reference_fields() {
        let parsed = code::parse("A.1").unwrap();
        let bare = Sheet::from_submitted(
            SheetKind::Order,
            7,
            &parsed,
            SubmittedSheet::new(1, "A.1", "A.1"),
        );
        let sheets = derived(vec![bare]);
        let eligible = HashMap::from([("A.1".to_string(), 100i64)]);
        let ctx = OrderContext {
            eligible: &eligible,
            available: None,
        };

        let report = validate(&sheets, Some(&ctx));
        let errors = &report.rows[0].errors;
        for needle in [
            "reference type is required",
            "reference number is required",
            "unit of measure is required",
            "counterparty is required",
            "quantity must be positive",
            "unit price must be positive",
            "gross amount must be positive",
        ] {
            assert!(errors.iter().any(|e| e == needle), "missing: {needle}");
        }
    }

    #[test]
    fn order_code_must_match_contract_leaf() {
        let sheets = derived(vec![order_sheet("Z.9", 100_00)]);
        let eligible = HashMap::from([("A.1".to_string(), 100i64)]);
        let ctx = OrderContext {
            eligible: &eligible,
            available: None,
        };

        let report = validate(&sheets, Some(&ctx));
        assert!(report.rows[0]
            .errors
            .iter()
            .any(|e| e.contains("does not match any contract sheet")));
    }

    #[test]
    fn report_serializes_for_api_payloads() {
        let sheets = derived(vec![contract_sheet("A.1"), contract_sheet("A. 1")]);
        let report = validate(&sheets, None);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["rows"][0]["code"], "A.1");
        assert!(
            json["rows"][0]["errors"]
                .as_array()
                .is_some_and(|errors| !errors.is_empty())
        );
    }

    #[test]
    fn over_budget_is_flagged_with_available_figure() {
        let sheets = derived(vec![order_sheet("A.1", 500_00)]);
        let eligible = HashMap::from([("A.1".to_string(), 100i64)]);
        let available = HashMap::from([(100i64, Decimal::new(450_00, 2))]);
        let ctx = OrderContext {
            eligible: &eligible,
            available: Some(&available),
        };

        let report = validate(&sheets, Some(&ctx));
        assert!(report.rows[0]
            .errors
            .iter()
            .any(|e| e.contains("exceeds available budget 450.00")));

        // At exactly the available figure the order passes.
        let sheets = derived(vec![order_sheet("A.1", 450_00)]);
        assert!(validate(&sheets, Some(&ctx)).is_valid());
    }
}
