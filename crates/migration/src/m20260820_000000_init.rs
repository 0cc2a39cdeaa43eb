//! Initial schema migration - creates all tables from scratch.
//!
//! - `sheet_groups`: reference data, the categories sheets are bucketed into
//! - `sheets`: outline-coded line items, serving both the contract (budget)
//!   and order (consumption) contexts, discriminated by `owner_kind`
//!
//! Monetary columns store scaled integers (cents, thousandths for
//! quantities, ten-thousandths for rates); the engine converts at its edge.

use sea_orm::ConnectionTrait;
use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(Iden)]
enum SheetGroups {
    Table,
    Id,
    Name,
    Kind,
    Sequence,
}

#[derive(Iden)]
enum Sheets {
    Table,
    Id,
    OwnerKind,
    OwnerId,
    GroupId,
    Code,
    Name,
    Description,
    Notes,
    Role,
    ParentId,
    QuantityMilli,
    UnitPriceMinor,
    DiscountRateScaled,
    GrossAmountMinor,
    NetAmountMinor,
    SequenceInGroup,
    SequenceGlobal,
    IsActive,
    SourceSheetId,
    UnitOfMeasure,
    CounterpartyId,
    ReferenceType,
    ReferenceNumber,
    ReferenceDate,
    CreatedAt,
    UpdatedAt,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SheetGroups::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SheetGroups::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SheetGroups::Name).string().not_null())
                    .col(ColumnDef::new(SheetGroups::Kind).string().not_null())
                    .col(ColumnDef::new(SheetGroups::Sequence).integer().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Sheets::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Sheets::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Sheets::OwnerKind).string().not_null())
                    .col(ColumnDef::new(Sheets::OwnerId).big_integer().not_null())
                    .col(ColumnDef::new(Sheets::GroupId).big_integer().not_null())
                    .col(ColumnDef::new(Sheets::Code).string().not_null())
                    .col(ColumnDef::new(Sheets::Name).string().not_null())
                    .col(ColumnDef::new(Sheets::Description).string())
                    .col(ColumnDef::new(Sheets::Notes).string())
                    .col(ColumnDef::new(Sheets::Role).string().not_null())
                    .col(ColumnDef::new(Sheets::ParentId).big_integer())
                    .col(ColumnDef::new(Sheets::QuantityMilli).big_integer())
                    .col(ColumnDef::new(Sheets::UnitPriceMinor).big_integer())
                    .col(ColumnDef::new(Sheets::DiscountRateScaled).big_integer())
                    .col(
                        ColumnDef::new(Sheets::GrossAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sheets::NetAmountMinor)
                            .big_integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sheets::SequenceInGroup)
                            .integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Sheets::SequenceGlobal).integer().not_null())
                    .col(
                        ColumnDef::new(Sheets::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(ColumnDef::new(Sheets::SourceSheetId).big_integer())
                    .col(ColumnDef::new(Sheets::UnitOfMeasure).string())
                    .col(ColumnDef::new(Sheets::CounterpartyId).big_integer())
                    .col(ColumnDef::new(Sheets::ReferenceType).string())
                    .col(ColumnDef::new(Sheets::ReferenceNumber).string())
                    .col(ColumnDef::new(Sheets::ReferenceDate).date())
                    .col(
                        ColumnDef::new(Sheets::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Sheets::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sheets_group")
                            .from(Sheets::Table, Sheets::GroupId)
                            .to(SheetGroups::Table, SheetGroups::Id)
                            .on_delete(ForeignKeyAction::NoAction)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sheets_parent")
                            .from(Sheets::Table, Sheets::ParentId)
                            .to(Sheets::Table, Sheets::Id)
                            .on_delete(ForeignKeyAction::SetNull)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_sheets_source")
                            .from(Sheets::Table, Sheets::SourceSheetId)
                            .to(Sheets::Table, Sheets::Id)
                            .on_delete(ForeignKeyAction::NoAction)
                            .on_update(ForeignKeyAction::NoAction),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sheets_owner")
                    .table(Sheets::Table)
                    .col(Sheets::OwnerKind)
                    .col(Sheets::OwnerId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_sheets_source")
                    .table(Sheets::Table)
                    .col(Sheets::SourceSheetId)
                    .to_owned(),
            )
            .await?;

        // Seed the two default groups so fresh installs can submit sheets
        // immediately.
        let db = manager.get_connection();
        let backend = db.get_database_backend();
        let stmt = Query::insert()
            .into_table(SheetGroups::Table)
            .columns([SheetGroups::Name, SheetGroups::Kind, SheetGroups::Sequence])
            .values_panic(["Works".into(), "work".into(), 1i32.into()])
            .values_panic(["Costs".into(), "cost".into(), 2i32.into()])
            .to_owned();
        db.execute(backend.build(&stmt)).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Sheets::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(SheetGroups::Table).to_owned())
            .await
    }
}
