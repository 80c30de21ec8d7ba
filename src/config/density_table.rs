// ==========================================
// 棒材库存管理系统 - 密度表
// ==========================================
// 用途: 新建材料时按牌号前缀估算密度（g/cm³）
// 规则: 最长前缀匹配，大小写不敏感；无匹配时使用默认钢材密度
// 注入: 作为显式配置传入 CatalogResolver，可被 config_kv 覆写
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// 普通钢材密度（g/cm³）
pub const DEFAULT_STEEL_DENSITY: f64 = 7.85;

/// 密度表条目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityEntry {
    pub prefix: String,
    pub density: f64,
}

// ==========================================
// DensityTable
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityTable {
    entries: Vec<DensityEntry>,
    default_density: f64,
}

impl DensityTable {
    pub fn new(entries: Vec<DensityEntry>, default_density: f64) -> Self {
        let entries = entries
            .into_iter()
            .map(|e| DensityEntry {
                prefix: e.prefix.trim().to_uppercase(),
                density: e.density,
            })
            .filter(|e| !e.prefix.is_empty())
            .collect();
        Self {
            entries,
            default_density,
        }
    }

    /// 内置表：不锈钢 / 黄铜 / 铜 / 铝 / 钛
    pub fn standard() -> Self {
        let entries = [
            ("SUS4", 7.75), // 马氏体/铁素体系不锈钢
            ("SUS", 7.93),
            ("C1", 8.89), // 纯铜
            ("C2", 8.53), // 黄铜
            ("C3", 8.50), // 易切削黄铜（C3602/C3604）
            ("C5", 8.80), // 磷青铜
            ("A2", 2.79),
            ("A5", 2.64),
            ("A6", 2.70),
            ("A7", 2.80),
            ("A", 2.70),
            ("TI", 4.51),
        ]
        .into_iter()
        .map(|(prefix, density)| DensityEntry {
            prefix: prefix.to_string(),
            density,
        })
        .collect();
        Self::new(entries, DEFAULT_STEEL_DENSITY)
    }

    /// 从 JSON 对象 {"前缀": 密度} 构建（覆盖内置表）
    pub fn from_json(json: &str, default_density: f64) -> Result<Self, serde_json::Error> {
        let map: BTreeMap<String, f64> = serde_json::from_str(json)?;
        let entries = map
            .into_iter()
            .map(|(prefix, density)| DensityEntry { prefix, density })
            .collect();
        Ok(Self::new(entries, default_density))
    }

    pub fn with_entry(mut self, prefix: &str, density: f64) -> Self {
        let prefix = prefix.trim().to_uppercase();
        self.entries.retain(|e| e.prefix != prefix);
        self.entries.push(DensityEntry { prefix, density });
        self
    }

    pub fn with_default_density(mut self, default_density: f64) -> Self {
        self.default_density = default_density;
        self
    }

    pub fn default_density(&self) -> f64 {
        self.default_density
    }

    /// 按牌号查密度（最长前缀优先）
    pub fn lookup(&self, family_name: &str) -> f64 {
        let family = family_name.trim().to_uppercase();
        self.entries
            .iter()
            .filter(|e| family.starts_with(&e.prefix))
            .max_by_key(|e| e.prefix.len())
            .map(|e| e.density)
            .unwrap_or(self.default_density)
    }
}

impl Default for DensityTable {
    fn default() -> Self {
        Self::standard()
    }
}
