use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "node_execution")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Vec<u8>,
    pub flow_id: Vec<u8>,
    pub node_id: Vec<u8>,
    pub name: String,
    pub state: i32,
    pub started_at: DateTime,
    pub completed_at: Option<DateTime>,
    pub error: Option<String>,
    #[sea_orm(column_type = "Json", nullable)]
    pub input: Option<serde_json::Value>,
    #[sea_orm(column_type = "Json", nullable)]
    pub output: Option<serde_json::Value>,
    pub response_id: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
