// ==========================================
// 棒材库存管理系统 - 配置层
// ==========================================
// 职责: 引擎参数（密度表、解析规则、编号前缀）的加载与覆写
// 存储: config_kv 表
// ==========================================

pub mod config_manager;
pub mod density_table;
pub mod engine_config;

// 重导出核心配置
pub use config_manager::{config_keys, ConfigManager};
pub use density_table::{DensityEntry, DensityTable, DEFAULT_STEEL_DENSITY};
pub use engine_config::{EngineConfig, SpecParserConfig};
