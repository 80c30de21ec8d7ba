// ==========================================
// 棒材库存管理系统 - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型
// 红线: 不含数据访问逻辑,不含引擎逻辑
// ==========================================

pub mod inventory;
pub mod material;
pub mod order;
pub mod types;

// 重导出核心类型
pub use inventory::{Item, Lot, NewItem, NewLot, NewStockMovement, StockMovement};
pub use material::{
    Material, MaterialAlias, MaterialGrade, MaterialProduct, MaterialSpec, MaterialStandard,
    NewMaterial,
};
pub use order::{
    MaterialSnapshot, NewPurchaseOrderHeader, NewPurchaseOrderItem, PurchaseOrder,
    PurchaseOrderItem, ReceiptRecord,
};
pub use types::{MovementKind, OrderItemStatus, OrderStatus, Shape, UsageType};
