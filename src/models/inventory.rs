use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

pub const DEFAULT_MIN_STOCK: i64 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub min_stock: i64,
    pub supplier: String,
    pub cost: f64,
    pub is_low_stock: bool,
    pub updated_at: NaiveDateTime,
}

impl InventoryItem {
    /// Carrying cost of the current stock level.
    pub fn stock_value(&self) -> f64 {
        self.cost * self.quantity as f64
    }
}

pub fn is_low_stock(quantity: i64, min_stock: i64) -> bool {
    quantity <= min_stock
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewInventoryItem {
    pub name: String,
    pub category: String,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default = "default_min_stock")]
    pub min_stock: i64,
    #[serde(default)]
    pub supplier: String,
    #[serde(default)]
    pub cost: f64,
}

fn default_min_stock() -> i64 {
    DEFAULT_MIN_STOCK
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InventoryUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_stock: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supplier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<f64>,
}
