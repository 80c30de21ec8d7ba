// ==========================================
// 棒材库存管理系统 - 引擎错误类型
// ==========================================
// 工具: thiserror 派生宏
// 分级: 行级错误（记录后继续） / 存储故障（中止批处理）
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

/// 引擎错误类型
#[derive(Error, Debug)]
pub enum EngineError {
    // ===== 解析/目录 =====
    #[error("规格解析降级，无法建档: {0}")]
    ParseDegraded(String),

    #[error("目录冲突: 别名 '{alias}' 已指向材料 {existing_material_id}，拒绝改指向 {requested_material_id}")]
    CatalogConflict {
        alias: String,
        existing_material_id: i64,
        requested_material_id: i64,
    },

    // ===== 换算 =====
    #[error("换算输入无效 ({field}): {message}")]
    InvalidConversionInput { field: String, message: String },

    // ===== 查询 =====
    #[error("记录不存在: {entity} {key}")]
    NotFound { entity: String, key: String },

    // ===== 入库状态机 =====
    #[error("入库数量与重量必须二选一: {0}")]
    InconsistentReceivingInput(String),

    #[error("状态转换非法 ({entity} {id}): {from} → {to}")]
    InvalidStateTransition {
        entity: String,
        id: i64,
        from: String,
        to: String,
    },

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    // ===== 存储 =====
    #[error("存储错误: {0}")]
    Repository(#[from] RepositoryError),
}

impl EngineError {
    pub fn invalid_input(field: &str, message: impl Into<String>) -> Self {
        EngineError::InvalidConversionInput {
            field: field.to_string(),
            message: message.into(),
        }
    }

    pub fn not_found(entity: &str, key: impl ToString) -> Self {
        EngineError::NotFound {
            entity: entity.to_string(),
            key: key.to_string(),
        }
    }

    /// 行级错误: 批处理中记录为 Failed 并继续
    ///
    /// 只有存储不可用（连接/锁/繁忙/事务）时返回 false
    pub fn is_row_level(&self) -> bool {
        match self {
            EngineError::Repository(e) => !e.is_outage(),
            _ => true,
        }
    }
}

/// Result 类型别名
pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_row_level_classification() {
        assert!(EngineError::ParseDegraded("x".into()).is_row_level());
        assert!(EngineError::invalid_input("dimension_mm", "必须为正数").is_row_level());
        assert!(EngineError::Repository(RepositoryError::UniqueConstraintViolation(
            "material".into()
        ))
        .is_row_level());
        assert!(!EngineError::Repository(RepositoryError::Busy("locked".into())).is_row_level());
        assert!(
            !EngineError::Repository(RepositoryError::LockError("poisoned".into())).is_row_level()
        );
    }

    #[test]
    fn test_display_contains_context() {
        let err = EngineError::CatalogConflict {
            alias: "SUS303 φ8".into(),
            existing_material_id: 1,
            requested_material_id: 2,
        };
        let msg = err.to_string();
        assert!(msg.contains("SUS303 φ8"));
        assert!(msg.contains('1') && msg.contains('2'));
    }
}
