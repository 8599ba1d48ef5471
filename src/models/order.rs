use crate::models::LineTemplate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Construction site (external reference)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub code: String,
    #[serde(default)]
    pub name: String,
}

/// Contracted scope of the client side of a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseOrder {
    pub id: i64,
    pub site_id: i64,
    #[serde(default)]
    pub lines: Vec<LineTemplate>,
}

/// Contracted scope of one subcontractor on a site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubcontractOrder {
    pub id: i64,
    pub site_id: i64,
    pub subcontractor_id: i64,
    #[serde(default)]
    pub lines: Vec<LineTemplate>,
}

/// Seed file for the in-memory order source
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderSeed {
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub base_orders: Vec<BaseOrder>,
    #[serde(default)]
    pub subcontract_orders: Vec<SubcontractOrder>,
}
