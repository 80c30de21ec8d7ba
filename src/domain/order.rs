// ==========================================
// 棒材库存管理系统 - 采购领域模型
// ==========================================
// PurchaseOrder: 采购单头，状态由明细派生
// PurchaseOrderItem: 采购明细，自带材料快照（下单时材料可能尚未建档）
// ==========================================

use crate::domain::material::MaterialSpec;
use crate::domain::types::{OrderItemStatus, OrderStatus, Shape};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// PurchaseOrder - 采购单
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrder {
    pub id: i64,
    pub order_number: String,
    pub supplier: Option<String>,
    pub order_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
    pub status: OrderStatus, // 派生缓存，以明细为准
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrderHeader {
    pub order_number: String,
    pub supplier: Option<String>,
    pub order_date: NaiveDate,
    pub due_date: Option<NaiveDate>,
}

// ==========================================
// MaterialSnapshot - 明细上的材料快照
// ==========================================
// 独立于 material 表，入库时用于换算与补建材料
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSnapshot {
    pub family_name: String,
    pub shape: Shape,
    pub dimension_mm: Option<f64>,
    pub density: f64,
    pub length_mm: f64,
    pub dedicated_part_number: Option<String>,
    pub spec_text: Option<String>, // 原始规格文本（别名匹配用）
}

impl MaterialSnapshot {
    pub fn to_spec(&self) -> MaterialSpec {
        MaterialSpec {
            family_name: self.family_name.clone(),
            shape: self.shape,
            dimension_mm: self.dimension_mm,
            dedicated_part_number: self.dedicated_part_number.clone(),
            remainder: None,
        }
    }
}

// ==========================================
// PurchaseOrderItem - 采购明细
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PurchaseOrderItem {
    pub id: i64,
    pub order_id: i64,
    pub line_no: i32,
    pub material_id: Option<i64>,
    pub is_new_material: bool, // 下单时材料未建档，入库时补建
    pub snapshot: MaterialSnapshot,
    pub part_number: Option<String>,
    pub ordered_quantity: Option<i64>,
    pub ordered_weight_kg: Option<f64>,
    pub management_code: String, // 下单时预留，标签可提前打印
    pub status: OrderItemStatus,
    pub received_quantity: Option<i64>,
    pub received_weight_kg: Option<f64>,
    pub received_at: Option<DateTime<Utc>>,
    pub lot_id: Option<i64>,
    pub item_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrderItem {
    pub order_id: i64,
    pub line_no: i32,
    pub material_id: Option<i64>,
    pub is_new_material: bool,
    pub snapshot: MaterialSnapshot,
    pub part_number: Option<String>,
    pub ordered_quantity: Option<i64>,
    pub ordered_weight_kg: Option<f64>,
    pub management_code: String,
}

/// 入库落账记录（数量与重量必须同时记录）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceiptRecord {
    pub received_quantity: i64,
    pub received_weight_kg: f64,
    pub received_at: DateTime<Utc>,
    pub lot_id: i64,
    pub item_id: i64,
}
