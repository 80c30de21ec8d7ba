// ==========================================
// 棒材库存管理系统 - 行处理结果
// ==========================================
// 职责: 批量处理时每一行都产出一条结果，失败不丢行
// ==========================================

use crate::domain::{Material, MaterialSpec};
use crate::engine::error::EngineError;
use serde::{Deserialize, Serialize};

/// 单行结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowOutcome {
    pub row_number: usize,
    pub raw_text: String,
    pub kind: RowOutcomeKind,
    /// 解析告警（如未识别尺寸），结果照常产出但需人工复核
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RowOutcomeKind {
    /// 命中或新建
    Resolved { material: Material, created: bool },
    /// 解析降级（未建档）
    DegradedParse { spec: MaterialSpec, warning: String },
    /// 只读模式下未命中
    Unmatched { spec: MaterialSpec },
    /// 行级失败
    Failed { error: String },
}

impl RowOutcome {
    pub fn new(row_number: usize, raw_text: impl Into<String>, kind: RowOutcomeKind) -> Self {
        Self {
            row_number,
            raw_text: raw_text.into(),
            kind,
            warnings: Vec::new(),
        }
    }

    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }

    pub fn failed(row_number: usize, raw_text: impl Into<String>, error: &EngineError) -> Self {
        Self::new(
            row_number,
            raw_text,
            RowOutcomeKind::Failed {
                error: error.to_string(),
            },
        )
    }

    pub fn material(&self) -> Option<&Material> {
        match &self.kind {
            RowOutcomeKind::Resolved { material, .. } => Some(material),
            _ => None,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, RowOutcomeKind::Failed { .. })
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// 批次统计
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeSummary {
    pub total: usize,
    pub resolved: usize,
    pub created: usize,
    pub degraded: usize,
    pub unmatched: usize,
    pub failed: usize,
    /// 带告警的行数（与上面的分类并存）
    pub warned: usize,
}

impl OutcomeSummary {
    pub fn from_outcomes(outcomes: &[RowOutcome]) -> Self {
        let mut summary = Self {
            total: outcomes.len(),
            ..Self::default()
        };
        for outcome in outcomes {
            if outcome.has_warnings() {
                summary.warned += 1;
            }
            match &outcome.kind {
                RowOutcomeKind::Resolved { created, .. } => {
                    summary.resolved += 1;
                    if *created {
                        summary.created += 1;
                    }
                }
                RowOutcomeKind::DegradedParse { .. } => summary.degraded += 1,
                RowOutcomeKind::Unmatched { .. } => summary.unmatched += 1,
                RowOutcomeKind::Failed { .. } => summary.failed += 1,
            }
        }
        summary
    }
}
