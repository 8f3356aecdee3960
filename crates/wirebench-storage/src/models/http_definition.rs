use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "http_definition")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Vec<u8>,
    pub workspace_id: Vec<u8>,
    pub method: String,
    pub url: String,
    pub body_kind: i32,
    pub body_raw: Option<Vec<u8>>,
    pub parent_id: Option<Vec<u8>>,
    pub method_override: Option<String>,
    pub url_override: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
