// ==========================================
// 棒材库存管理系统 - 引擎配置
// ==========================================
// 来源: config_kv（global scope），缺省时使用内置默认值
// ==========================================

use crate::config::density_table::DensityTable;
use serde::{Deserialize, Serialize};

/// 降级解析时牌号最大长度（字符数）
pub const DEFAULT_MAX_FAMILY_LEN: usize = 50;

/// 管理编号前缀
pub const DEFAULT_MANAGEMENT_CODE_PREFIX: &str = "BS";

// ==========================================
// SpecParserConfig - 规格解析配置
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecParserConfig {
    /// 降级解析时牌号截断长度
    pub max_family_len: usize,
    /// 牌号后缀归一规则 (变体, 标准写法)，按顺序应用于大写后的牌号
    pub family_suffix_folds: Vec<(String, String)>,
}

impl Default for SpecParserConfig {
    fn default() -> Self {
        Self {
            max_family_len: DEFAULT_MAX_FAMILY_LEN,
            family_suffix_folds: vec![
                ("-LCD".to_string(), "LCD".to_string()),
                ("_LCD".to_string(), "LCD".to_string()),
                ("-BD".to_string(), "BD".to_string()),
            ],
        }
    }
}

// ==========================================
// EngineConfig - 引擎配置汇总
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub parser: SpecParserConfig,
    pub density_table: DensityTable,
    pub management_code_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            parser: SpecParserConfig::default(),
            density_table: DensityTable::standard(),
            management_code_prefix: DEFAULT_MANAGEMENT_CODE_PREFIX.to_string(),
        }
    }
}
