// ==========================================
// 棒材库存管理系统 - 引擎层
// ==========================================
// 职责: 规格解析、单位换算、目录匹配、库存汇总、采购对账
// 红线: Engine 不拼 SQL，数据访问只经 repository::store 的 trait
// ==========================================

pub mod catalog_resolver;
pub mod error;
pub mod order_reconciler;
pub mod outcome;
pub mod spec_parser;
pub mod stock_aggregator;
pub mod stock_movement;
pub mod unit_converter;

// 重导出核心引擎
pub use catalog_resolver::{CatalogResolver, Resolution, ResolvedVia};
pub use error::{EngineError, EngineResult};
pub use order_reconciler::{
    derive_order_status, lot_number_for, NewOrderLine, NewPurchaseOrder, OrderReconciler,
    OrderWithItems, ReceivingRequest, ReceivingResult,
};
pub use outcome::{OutcomeSummary, RowOutcome, RowOutcomeKind};
pub use spec_parser::{
    normalize_alias_key, DimensionMatch, DimensionMatcher, ParseQuality, ParsedSpec, SpecParser,
};
pub use stock_aggregator::{MaterialStock, StockAggregator};
pub use stock_movement::StockMovementService;
pub use unit_converter::{ConvertedAmount, ReceivedAmount, UnitConverter};
