// ==========================================
// 棒材库存管理系统 - 配置管理器
// ==========================================
// 职责: 配置加载、查询、覆写管理
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::density_table::{DensityTable, DEFAULT_STEEL_DENSITY};
use crate::config::engine_config::{EngineConfig, SpecParserConfig};
use crate::db::open_sqlite_connection;
use rusqlite::{params, Connection};
use serde_json::json;
use std::collections::HashMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tracing::warn;

// ==========================================
// 配置键
// ==========================================
pub mod config_keys {
    /// 密度表覆写（JSON: {"前缀": 密度}）
    pub const DENSITY_TABLE: &str = "density_table";
    /// 默认密度（g/cm³）
    pub const DEFAULT_DENSITY: &str = "default_density";
    /// 降级解析牌号最大长度
    pub const MAX_FAMILY_LEN: &str = "max_family_len";
    /// 牌号后缀归一规则（JSON: [["-LCD","LCD"], ...]）
    pub const FAMILY_SUFFIX_FOLDS: &str = "family_suffix_folds";
    /// 管理编号前缀
    pub const MANAGEMENT_CODE_PREFIX: &str = "management_code_prefix";
}

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> Result<Self, Box<dyn Error>> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    ///
    /// 说明：为保证连接行为一致，会对传入连接再次应用统一 PRAGMA（幂等）。
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Result<Self, Box<dyn Error>> {
        {
            let conn_guard = conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
            crate::db::configure_sqlite_connection(&conn_guard)?;
        }

        Ok(Self { conn })
    }

    /// 从 config_kv 表读取配置值（scope_id='global'）
    fn get_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let result = conn.query_row(
            "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
            |row| row.get::<_, String>(0),
        );

        match result {
            Ok(value) => Ok(Some(value)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }

    /// 读取 global scope 的配置值（公开方法，供其他模块复用）
    pub fn get_global_config_value(&self, key: &str) -> Result<Option<String>, Box<dyn Error>> {
        self.get_config_value(key)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> Result<(), Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    /// 获取所有配置的快照（JSON格式）
    pub fn get_config_snapshot(&self) -> Result<String, Box<dyn Error>> {
        let conn = self.conn.lock().map_err(|e| format!("锁获取失败: {}", e))?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;

        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        Ok(serde_json::to_string(&json!(config_map))?)
    }

    /// 组装引擎配置
    ///
    /// # 说明
    /// - 每个键独立回退：格式错误只告警并使用默认值，不阻断启动
    pub fn load_engine_config(&self) -> Result<EngineConfig, Box<dyn Error>> {
        let mut config = EngineConfig::default();

        let default_density = match self.get_config_value(config_keys::DEFAULT_DENSITY)? {
            Some(raw) => raw.trim().parse::<f64>().unwrap_or_else(|_| {
                warn!(key = config_keys::DEFAULT_DENSITY, value = %raw, "配置值格式错误，使用默认值");
                DEFAULT_STEEL_DENSITY
            }),
            None => DEFAULT_STEEL_DENSITY,
        };

        config.density_table = match self.get_config_value(config_keys::DENSITY_TABLE)? {
            Some(raw) => DensityTable::from_json(&raw, default_density).unwrap_or_else(|e| {
                warn!(key = config_keys::DENSITY_TABLE, error = %e, "密度表格式错误，使用内置表");
                DensityTable::standard().with_default_density(default_density)
            }),
            None => DensityTable::standard().with_default_density(default_density),
        };

        if let Some(raw) = self.get_config_value(config_keys::MAX_FAMILY_LEN)? {
            match raw.trim().parse::<usize>() {
                Ok(v) if v > 0 => config.parser.max_family_len = v,
                _ => warn!(key = config_keys::MAX_FAMILY_LEN, value = %raw, "配置值格式错误，使用默认值"),
            }
        }

        if let Some(raw) = self.get_config_value(config_keys::FAMILY_SUFFIX_FOLDS)? {
            match serde_json::from_str::<Vec<(String, String)>>(&raw) {
                Ok(folds) => {
                    config.parser = SpecParserConfig {
                        family_suffix_folds: folds
                            .into_iter()
                            .map(|(from, to)| (from.to_uppercase(), to.to_uppercase()))
                            .collect(),
                        ..config.parser
                    }
                }
                Err(e) => warn!(key = config_keys::FAMILY_SUFFIX_FOLDS, error = %e, "配置值格式错误，使用默认值"),
            }
        }

        if let Some(raw) = self.get_config_value(config_keys::MANAGEMENT_CODE_PREFIX)? {
            let prefix = raw.trim();
            if !prefix.is_empty() {
                config.management_code_prefix = prefix.to_uppercase();
            }
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn manager() -> ConfigManager {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        ConfigManager::from_connection(Arc::new(Mutex::new(conn))).unwrap()
    }

    #[test]
    fn test_defaults_when_empty() {
        let config = manager().load_engine_config().unwrap();
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_overrides_are_applied() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::DENSITY_TABLE, r#"{"NAK": 7.8}"#)
            .unwrap();
        mgr.set_global_config_value(config_keys::DEFAULT_DENSITY, "7.9")
            .unwrap();
        mgr.set_global_config_value(config_keys::MAX_FAMILY_LEN, "12")
            .unwrap();
        mgr.set_global_config_value(config_keys::MANAGEMENT_CODE_PREFIX, "mx")
            .unwrap();

        let config = mgr.load_engine_config().unwrap();
        assert_eq!(config.density_table.lookup("NAK80"), 7.8);
        assert_eq!(config.density_table.lookup("S45C"), 7.9);
        assert_eq!(config.parser.max_family_len, 12);
        assert_eq!(config.management_code_prefix, "MX");
    }

    #[test]
    fn test_malformed_values_fall_back() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::DENSITY_TABLE, "not json")
            .unwrap();
        mgr.set_global_config_value(config_keys::MAX_FAMILY_LEN, "-3")
            .unwrap();

        let config = mgr.load_engine_config().unwrap();
        assert_eq!(config.density_table.lookup("SUS303"), 7.93);
        assert_eq!(config.parser.max_family_len, 50);
    }

    #[test]
    fn test_default_density_applies_to_standard_table() {
        let mgr = manager();
        mgr.set_global_config_value(config_keys::DEFAULT_DENSITY, "8.0")
            .unwrap();
        let config = mgr.load_engine_config().unwrap();
        assert_eq!(config.density_table.lookup("S45C"), 8.0);
        assert_eq!(config.density_table.lookup("SUS303"), 7.93);
        assert!(mgr.get_config_snapshot().unwrap().contains("default_density"));
    }
}
