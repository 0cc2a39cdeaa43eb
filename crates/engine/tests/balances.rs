use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::Database;

use engine::{DeleteMode, Engine, SubmittedSheet};
use migration::MigratorTrait;

const WORKS_GROUP: i64 = 1;

async fn engine_with_db() -> Engine {
    let db = Database::connect("sqlite::memory:").await.unwrap();
    migration::Migrator::up(&db, None).await.unwrap();
    Engine::builder().database(db).build()
}

fn contract_row(code: &str, name: &str, price_cents: i64) -> SubmittedSheet {
    SubmittedSheet::new(WORKS_GROUP, code, name)
        .priced(Decimal::ONE, Decimal::new(price_cents, 2))
}

fn order_row(code: &str, price_cents: i64) -> SubmittedSheet {
    SubmittedSheet::new(WORKS_GROUP, code, code)
        .priced(Decimal::ONE, Decimal::new(price_cents, 2))
        .reference("invoice", "2026/042", NaiveDate::from_ymd_opt(2026, 3, 1).unwrap())
        .counterparty(5)
        .unit_of_measure("pcs")
}

#[tokio::test]
async fn balance_arithmetic_with_exclude_variant() {
    let engine = engine_with_db().await;

    engine
        .reconcile_contract_sheets(
            1,
            vec![contract_row("A.1", "Excavation", 1000_00)],
            DeleteMode::Strict,
        )
        .await
        .unwrap();
    engine
        .reconcile_order_sheets(11, 1, vec![order_row("A.1", 300_00)], DeleteMode::Strict)
        .await
        .unwrap();
    engine
        .reconcile_order_sheets(12, 1, vec![order_row("A.1", 250_00)], DeleteMode::Strict)
        .await
        .unwrap();

    let rows = engine.balance_view(1, None).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].sheet_code, "A.1");
    assert_eq!(rows[0].budget_amount, Decimal::new(1000_00, 2));
    assert_eq!(rows[0].consumed_amount, Decimal::new(550_00, 2));
    assert_eq!(rows[0].available_amount, Decimal::new(450_00, 2));

    // Excluding the order that consumed 300 frees that figure up again.
    let rows = engine.balance_view(1, Some(11)).await.unwrap();
    assert_eq!(rows[0].consumed_amount, Decimal::new(250_00, 2));
    assert_eq!(rows[0].available_amount, Decimal::new(750_00, 2));
}

#[tokio::test]
async fn editing_an_order_does_not_count_against_itself() {
    let engine = engine_with_db().await;

    engine
        .reconcile_contract_sheets(
            1,
            vec![contract_row("A.1", "Excavation", 1000_00)],
            DeleteMode::Strict,
        )
        .await
        .unwrap();
    let first = engine
        .reconcile_order_sheets(11, 1, vec![order_row("A.1", 300_00)], DeleteMode::Strict)
        .await
        .unwrap();
    engine
        .reconcile_order_sheets(12, 1, vec![order_row("A.1", 250_00)], DeleteMode::Strict)
        .await
        .unwrap();

    // Raising order 11 to 700.00 passes: available excluding itself is
    // 1000.00 - 250.00 = 750.00.
    let order_sheet_id = first.sheets[0].id.persisted().unwrap();
    engine
        .reconcile_order_sheets(
            11,
            1,
            vec![order_row("A.1", 700_00).id(order_sheet_id)],
            DeleteMode::Strict,
        )
        .await
        .unwrap();

    let rows = engine.balance_view(1, None).await.unwrap();
    assert_eq!(rows[0].consumed_amount, Decimal::new(950_00, 2));
    assert_eq!(rows[0].available_amount, Decimal::new(50_00, 2));
}

#[tokio::test]
async fn retired_orders_stop_consuming() {
    let engine = engine_with_db().await;

    engine
        .reconcile_contract_sheets(
            1,
            vec![contract_row("A.1", "Excavation", 1000_00)],
            DeleteMode::Strict,
        )
        .await
        .unwrap();
    engine
        .reconcile_order_sheets(11, 1, vec![order_row("A.1", 300_00)], DeleteMode::Strict)
        .await
        .unwrap();

    // Emptying the order's set removes its consumption.
    engine
        .reconcile_order_sheets(11, 1, vec![], DeleteMode::Strict)
        .await
        .unwrap();

    let rows = engine.balance_view(1, None).await.unwrap();
    assert_eq!(rows[0].consumed_amount, Decimal::ZERO);
    assert_eq!(rows[0].available_amount, Decimal::new(1000_00, 2));
}

#[tokio::test]
async fn headers_never_appear_in_the_balance_view() {
    let engine = engine_with_db().await;

    engine
        .reconcile_contract_sheets(
            1,
            vec![
                contract_row("A", "Earthworks", 0),
                contract_row("A.1", "Excavation", 600_00),
                contract_row("A.2", "Backfill", 400_00),
            ],
            DeleteMode::Strict,
        )
        .await
        .unwrap();

    let rows = engine.balance_view(1, None).await.unwrap();
    let codes: Vec<&str> = rows.iter().map(|r| r.sheet_code.as_str()).collect();
    assert_eq!(codes, vec!["A.1", "A.2"]);
    assert!(rows.iter().all(|r| r.group_id == WORKS_GROUP));
}
