//! The module contains the representation of a sheet.
//!
//! A sheet is one line item in an owner's outline-coded breakdown. The same
//! table serves two contexts, discriminated by `owner_kind`:
//!
//! - *contract sheets* define budget (quantity, unit price, optional
//!   discount);
//! - *order sheets* record consumption drawn against a contract leaf
//!   (`source_sheet_id`), carrying the document reference, counterparty and
//!   unit of measure the order was placed with.
//!
//! `role`, `parent_id` and the header amounts are derived by the hierarchy
//! builder and the aggregator, never taken from the client.
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::{ActiveValue, prelude::*};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    EngineError,
    code::ParsedCode,
    money::{
        amount_from_minor, amount_to_minor, quantity_from_milli, quantity_to_milli,
        rate_from_scaled, rate_to_scaled, round_amount,
    },
};

/// The owning context of a sheet set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetKind {
    Contract,
    Order,
}

impl SheetKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SheetKind::Contract => "contract",
            SheetKind::Order => "order",
        }
    }
}

impl TryFrom<&str> for SheetKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "contract" => Ok(SheetKind::Contract),
            "order" => Ok(SheetKind::Order),
            other => Err(EngineError::KeyNotFound(format!(
                "unknown sheet kind: {other}"
            ))),
        }
    }
}

/// Derived role of a sheet within its owner's set.
///
/// A sheet is a header iff some other sheet in the set carries a code under
/// it (`code + "."` prefix). Headers are never independently priced.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SheetRole {
    Header,
    Leaf,
}

impl SheetRole {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            SheetRole::Header => "header",
            SheetRole::Leaf => "leaf",
        }
    }
}

impl TryFrom<&str> for SheetRole {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "header" => Ok(SheetRole::Header),
            "leaf" => Ok(SheetRole::Leaf),
            other => Err(EngineError::KeyNotFound(format!(
                "unknown sheet role: {other}"
            ))),
        }
    }
}

/// Identity of a sheet across the reconcile pipeline.
///
/// Rows loaded from storage are `Persisted`; rows submitted without a
/// recognized id get a `Pending` token, resolved to a persisted id only after
/// their insert commits. Children created in the same submission point at
/// their new parent through the token until then.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SheetId {
    Persisted(i64),
    Pending(Uuid),
}

impl SheetId {
    /// Allocates a fresh token for a not-yet-created row.
    #[must_use]
    pub fn pending() -> Self {
        SheetId::Pending(Uuid::new_v4())
    }

    /// Returns the persisted id, if this row has one.
    #[must_use]
    pub fn persisted(self) -> Option<i64> {
        match self {
            SheetId::Persisted(id) => Some(id),
            SheetId::Pending(_) => None,
        }
    }
}

/// One client-submitted row of a full desired sheet set.
///
/// `id` is the persisted id for rows the client wants updated; absent for new
/// rows. Everything hierarchical (role, parent, header amounts) is derived
/// server side from `code`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SubmittedSheet {
    pub id: Option<i64>,
    pub group_id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
    pub sequence_in_group: Option<i32>,
    pub unit_of_measure: Option<String>,
    pub counterparty_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
    pub reference_date: Option<NaiveDate>,
}

impl SubmittedSheet {
    #[must_use]
    pub fn new(group_id: i64, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            group_id,
            code: code.into(),
            name: name.into(),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    #[must_use]
    pub fn priced(mut self, quantity: Decimal, unit_price: Decimal) -> Self {
        self.quantity = Some(quantity);
        self.unit_price = Some(unit_price);
        self
    }

    #[must_use]
    pub fn discount_rate(mut self, rate: Decimal) -> Self {
        self.discount_rate = Some(rate);
        self
    }

    #[must_use]
    pub fn reference(
        mut self,
        kind: impl Into<String>,
        number: impl Into<String>,
        date: NaiveDate,
    ) -> Self {
        self.reference_type = Some(kind.into());
        self.reference_number = Some(number.into());
        self.reference_date = Some(date);
        self
    }

    #[must_use]
    pub fn counterparty(mut self, counterparty_id: i64) -> Self {
        self.counterparty_id = Some(counterparty_id);
        self
    }

    #[must_use]
    pub fn unit_of_measure(mut self, uom: impl Into<String>) -> Self {
        self.unit_of_measure = Some(uom.into());
        self
    }
}

/// A sheet as the engine works with it: normalized code, derived hierarchy
/// fields, full-precision amounts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Sheet {
    pub id: SheetId,
    pub owner_kind: SheetKind,
    pub owner_id: i64,
    pub group_id: i64,
    /// Normalized outline code (whitespace stripped).
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub role: SheetRole,
    pub parent_id: Option<SheetId>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub discount_rate: Option<Decimal>,
    pub gross_amount: Decimal,
    pub net_amount: Decimal,
    pub sequence_in_group: Option<i32>,
    pub sequence_global: i32,
    pub is_active: bool,
    pub source_sheet_id: Option<i64>,
    pub unit_of_measure: Option<String>,
    pub counterparty_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Sheet {
    /// Builds a working sheet from a submitted row.
    ///
    /// Leaf amounts are computed here (gross = quantity x unit price, net =
    /// gross less the discount, both rounded at the stored figure); the
    /// aggregator later overwrites them on rows that turn out to be headers.
    #[must_use]
    pub fn from_submitted(
        owner_kind: SheetKind,
        owner_id: i64,
        parsed: &ParsedCode,
        submitted: SubmittedSheet,
    ) -> Self {
        let gross = match (submitted.quantity, submitted.unit_price) {
            (Some(quantity), Some(price)) => round_amount(quantity * price),
            _ => Decimal::ZERO,
        };
        let net = match (owner_kind, submitted.discount_rate) {
            (SheetKind::Contract, Some(rate)) => round_amount(gross * (Decimal::ONE - rate)),
            _ => gross,
        };
        let now = Utc::now();

        Self {
            id: submitted.id.map_or_else(SheetId::pending, SheetId::Persisted),
            owner_kind,
            owner_id,
            group_id: submitted.group_id,
            code: parsed.normalized.clone(),
            name: submitted.name,
            description: submitted.description,
            notes: submitted.notes,
            role: SheetRole::Leaf,
            parent_id: None,
            quantity: submitted.quantity,
            unit_price: submitted.unit_price,
            discount_rate: submitted.discount_rate,
            gross_amount: gross,
            net_amount: net,
            sequence_in_group: submitted.sequence_in_group,
            sequence_global: 0,
            is_active: true,
            source_sheet_id: None,
            unit_of_measure: submitted.unit_of_measure,
            counterparty_id: submitted.counterparty_id,
            reference_type: submitted.reference_type,
            reference_number: submitted.reference_number,
            reference_date: submitted.reference_date,
            created_at: now,
            updated_at: now,
        }
    }

    /// Converts to an active model for insert (pending id) or update
    /// (persisted id), with the parent reference already resolved.
    pub(crate) fn to_active_model(
        &self,
        parent_id: Option<i64>,
    ) -> Result<ActiveModel, EngineError> {
        let quantity_milli = self.quantity.map(quantity_to_milli).transpose()?;
        let unit_price_minor = self.unit_price.map(amount_to_minor).transpose()?;
        let discount_rate_scaled = self.discount_rate.map(rate_to_scaled).transpose()?;

        let (id, created_at) = match self.id {
            SheetId::Persisted(id) => (ActiveValue::Set(id), ActiveValue::NotSet),
            SheetId::Pending(_) => (ActiveValue::NotSet, ActiveValue::Set(self.created_at)),
        };

        Ok(ActiveModel {
            id,
            owner_kind: ActiveValue::Set(self.owner_kind.as_str().to_string()),
            owner_id: ActiveValue::Set(self.owner_id),
            group_id: ActiveValue::Set(self.group_id),
            code: ActiveValue::Set(self.code.clone()),
            name: ActiveValue::Set(self.name.clone()),
            description: ActiveValue::Set(self.description.clone()),
            notes: ActiveValue::Set(self.notes.clone()),
            role: ActiveValue::Set(self.role.as_str().to_string()),
            parent_id: ActiveValue::Set(parent_id),
            quantity_milli: ActiveValue::Set(quantity_milli),
            unit_price_minor: ActiveValue::Set(unit_price_minor),
            discount_rate_scaled: ActiveValue::Set(discount_rate_scaled),
            gross_amount_minor: ActiveValue::Set(amount_to_minor(self.gross_amount)?),
            net_amount_minor: ActiveValue::Set(amount_to_minor(self.net_amount)?),
            sequence_in_group: ActiveValue::Set(
                self.sequence_in_group.unwrap_or(self.sequence_global),
            ),
            sequence_global: ActiveValue::Set(self.sequence_global),
            is_active: ActiveValue::Set(self.is_active),
            source_sheet_id: ActiveValue::Set(self.source_sheet_id),
            unit_of_measure: ActiveValue::Set(self.unit_of_measure.clone()),
            counterparty_id: ActiveValue::Set(self.counterparty_id),
            reference_type: ActiveValue::Set(self.reference_type.clone()),
            reference_number: ActiveValue::Set(self.reference_number.clone()),
            reference_date: ActiveValue::Set(self.reference_date),
            created_at,
            updated_at: ActiveValue::Set(self.updated_at),
        })
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sheets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub owner_kind: String,
    pub owner_id: i64,
    pub group_id: i64,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub notes: Option<String>,
    pub role: String,
    pub parent_id: Option<i64>,
    pub quantity_milli: Option<i64>,
    pub unit_price_minor: Option<i64>,
    pub discount_rate_scaled: Option<i64>,
    pub gross_amount_minor: i64,
    pub net_amount_minor: i64,
    pub sequence_in_group: i32,
    pub sequence_global: i32,
    pub is_active: bool,
    pub source_sheet_id: Option<i64>,
    pub unit_of_measure: Option<String>,
    pub counterparty_id: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_number: Option<String>,
    pub reference_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::groups::Entity",
        from = "Column::GroupId",
        to = "super::groups::Column::Id",
        on_update = "NoAction",
        on_delete = "NoAction"
    )]
    SheetGroups,
}

impl Related<super::groups::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SheetGroups.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for Sheet {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SheetId::Persisted(model.id),
            owner_kind: SheetKind::try_from(model.owner_kind.as_str())?,
            owner_id: model.owner_id,
            group_id: model.group_id,
            code: model.code,
            name: model.name,
            description: model.description,
            notes: model.notes,
            role: SheetRole::try_from(model.role.as_str())?,
            parent_id: model.parent_id.map(SheetId::Persisted),
            quantity: model.quantity_milli.map(quantity_from_milli),
            unit_price: model.unit_price_minor.map(amount_from_minor),
            discount_rate: model.discount_rate_scaled.map(rate_from_scaled),
            gross_amount: amount_from_minor(model.gross_amount_minor),
            net_amount: amount_from_minor(model.net_amount_minor),
            sequence_in_group: Some(model.sequence_in_group),
            sequence_global: model.sequence_global,
            is_active: model.is_active,
            source_sheet_id: model.source_sheet_id,
            unit_of_measure: model.unit_of_measure,
            counterparty_id: model.counterparty_id,
            reference_type: model.reference_type,
            reference_number: model.reference_number,
            reference_date: model.reference_date,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}
