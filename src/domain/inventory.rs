// ==========================================
// 棒材库存管理系统 - 库存领域模型
// ==========================================
// Lot: 一次入库批次，归属唯一材料
// Item: 批次下的可计数捆包，持有管理编号
// StockMovement: 每次数量变动的流水
// ==========================================

use crate::domain::types::MovementKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Lot - 入库批次
// ==========================================
// 红线: 创建后只允许修改检验/备注字段
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lot {
    pub id: i64,
    pub lot_number: String, // 批次号（唯一）
    pub material_id: i64,
    pub length_mm: f64,
    pub initial_quantity: i64,
    pub supplier: Option<String>,
    pub received_date: NaiveDate,
    pub inspected: bool,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewLot {
    pub lot_number: String,
    pub material_id: i64,
    pub length_mm: f64,
    pub initial_quantity: i64,
    pub supplier: Option<String>,
    pub received_date: NaiveDate,
}

// ==========================================
// Item - 捆包
// ==========================================
// 红线: 管理编号一次生成、永不复用；清空后停用而非删除
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Item {
    pub id: i64,
    pub lot_id: i64,
    pub location_id: i64,
    pub current_quantity: i64,
    pub management_code: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewItem {
    pub lot_id: i64,
    pub location_id: i64,
    pub current_quantity: i64,
    pub management_code: String,
}

// ==========================================
// StockMovement - 出入库流水
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockMovement {
    pub id: i64,
    pub item_id: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    pub note: Option<String>,
    pub moved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewStockMovement {
    pub item_id: i64,
    pub kind: MovementKind,
    pub quantity: i64,
    pub note: Option<String>,
}
