//! The module contains the representation of a sheet group.
//!
//! Groups are immutable reference data: named buckets ("Works", "Costs")
//! sheets are classified into for display and per-group subtotaling. The
//! engine only ever reads them.
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Classification flag of a group.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupKind {
    Work,
    Cost,
}

impl GroupKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            GroupKind::Work => "work",
            GroupKind::Cost => "cost",
        }
    }
}

impl TryFrom<&str> for GroupKind {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "work" => Ok(GroupKind::Work),
            "cost" => Ok(GroupKind::Cost),
            other => Err(EngineError::KeyNotFound(format!(
                "unknown group kind: {other}"
            ))),
        }
    }
}

/// A named sheet category with a display sequence.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetGroup {
    pub id: i64,
    pub name: String,
    pub kind: GroupKind,
    pub sequence: i32,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "sheet_groups")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub name: String,
    pub kind: String,
    pub sequence: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sheets::Entity")]
    Sheets,
}

impl Related<super::sheets::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sheets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl TryFrom<Model> for SheetGroup {
    type Error = EngineError;

    fn try_from(model: Model) -> Result<Self, Self::Error> {
        Ok(Self {
            id: model.id,
            name: model.name,
            kind: GroupKind::try_from(model.kind.as_str())?,
            sequence: model.sequence,
        })
    }
}
