// ==========================================
// 棒材库存管理系统 - 核心库
// ==========================================
// 核心: 材料规格解析与入库对账引擎
// 技术栈: Rust + SQLite
// 分层: domain → repository → engine → importer
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 导入层 - 外部数据
pub mod importer;

// 配置层 - 系统配置
pub mod config;

// 数据库基础设施（连接初始化/PRAGMA/建表）
pub mod db;

// 日志系统
pub mod logging;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{MovementKind, OrderItemStatus, OrderStatus, Shape, UsageType};

// 领域实体
pub use domain::{
    Item, Lot, Material, MaterialAlias, MaterialSpec, PurchaseOrder, PurchaseOrderItem,
    StockMovement,
};

// 引擎
pub use engine::{
    CatalogResolver, EngineError, EngineResult, OrderReconciler, RowOutcome, RowOutcomeKind,
    SpecParser, StockAggregator, StockMovementService, UnitConverter,
};

// 配置
pub use config::{ConfigManager, DensityTable, EngineConfig};

// 存储
pub use repository::{RepositoryError, SqliteStore};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "棒材库存管理系统";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_engine_wiring() {
        let config = EngineConfig::default();
        let resolver = CatalogResolver::from_config(&config);
        let parsed = resolver.parser().parse("SUS303 φ8.0");
        assert_eq!(parsed.spec.shape, Shape::Round);
    }
}
