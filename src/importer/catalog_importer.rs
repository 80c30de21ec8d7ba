// ==========================================
// 棒材库存管理系统 - 目录批量导入器
// ==========================================
// 流程: 文件解析 → 字段映射 → 目录匹配/建档 → 别名登记 → 行结果
// 红线: 每一行都产出结果；行级失败记录后继续，仅存储故障中止
// 事务: 每行一个事务（建档与别名登记同进同退）
// 并发: 文件之间并发（spawn_blocking），文件内逐行顺序处理
// ==========================================

use crate::domain::{NewPurchaseOrderHeader, UsageType};
use crate::engine::catalog_resolver::CatalogResolver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::order_reconciler::{NewOrderLine, NewPurchaseOrder};
use crate::engine::outcome::{OutcomeSummary, RowOutcome, RowOutcomeKind};
use crate::importer::data_cleaner::QuantityCell;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::{CatalogRow, FieldMapper};
use crate::importer::file_parser::{FileParser, NumberedRow, UniversalFileParser};
use crate::repository::sqlite_store::SqliteStore;
use crate::repository::store::CatalogStore;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};

/// 单文件导入报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileImportReport {
    pub file: String,
    pub outcomes: Vec<RowOutcome>,
    pub summary: OutcomeSummary,
}

/// 采购单草稿（可直接交给 OrderReconciler::create_order）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderDraft {
    pub order: NewPurchaseOrder,
    pub rejected: Vec<RowOutcome>,
}

// ==========================================
// CatalogImport Trait
// ==========================================
#[async_trait]
pub trait CatalogImport: Send + Sync {
    /// 导入单个文件（CSV / Excel）
    ///
    /// # 返回
    /// - Ok(FileImportReport): 每个数据行一条结果
    /// - Err: 文件级错误或存储故障
    async fn import_file<P: AsRef<Path> + Send>(&self, file_path: P)
        -> ImportResult<FileImportReport>;

    /// 批量导入多个文件（文件间并发）
    ///
    /// # 返回
    /// - Ok: 与输入顺序一致的结果列表，文件级失败（缺失/格式不支持等）不影响其他文件
    /// - Err: 任一文件遇到存储故障，整批中止
    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> ImportResult<Vec<Result<FileImportReport, String>>>;
}

// ==========================================
// CatalogImporter
// ==========================================
#[derive(Clone)]
pub struct CatalogImporter {
    store: SqliteStore,
    resolver: Arc<CatalogResolver>,
    allow_create: bool,
}

impl CatalogImporter {
    /// # 参数
    /// - allow_create: false 时只读匹配，未命中行返回 Unmatched
    pub fn new(store: SqliteStore, resolver: Arc<CatalogResolver>, allow_create: bool) -> Self {
        Self {
            store,
            resolver,
            allow_create,
        }
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.resolver
    }

    /// 处理已加载的行
    pub fn import_rows(&self, rows: Vec<NumberedRow>) -> ImportResult<Vec<RowOutcome>> {
        let mapper = FieldMapper::default();
        let mut outcomes = Vec::with_capacity(rows.len());

        for (row_number, raw) in rows {
            let row = match mapper.map_catalog_row(&raw, row_number) {
                Ok(row) => row,
                Err(e) => {
                    warn!(row_number, error = %e, "字段映射失败");
                    outcomes.push(RowOutcome::new(
                        row_number,
                        mapper.spec_text_of(&raw),
                        RowOutcomeKind::Failed {
                            error: e.to_string(),
                        },
                    ));
                    continue;
                }
            };

            let result = self
                .store
                .transaction(|session| self.process_catalog_row(session, &row));
            match result {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) if e.is_row_level() => {
                    warn!(row_number, raw_text = %row.spec_text, error = %e, "行处理失败");
                    outcomes.push(RowOutcome::failed(row_number, &row.spec_text, &e));
                }
                Err(e) => {
                    error!(row_number, error = %e, "存储不可用，中止导入");
                    return Err(ImportError::Engine(e));
                }
            }
        }

        Ok(outcomes)
    }

    fn process_catalog_row<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        row: &CatalogRow,
    ) -> EngineResult<RowOutcome> {
        let part_number = row.part_number.as_deref();

        let outcome = if row.usage == Some(UsageType::Dedicated) {
            let part = part_number.ok_or_else(|| {
                EngineError::BusinessRuleViolation("专用材料必须指定品番".to_string())
            })?;
            let parsed = self.resolver.parser().parse(&row.spec_text);
            let resolution =
                self.resolver
                    .create_dedicated(store, &parsed.spec, part, row.density)?;
            let kind = RowOutcomeKind::Resolved {
                material: resolution.material,
                created: resolution.created,
            };
            RowOutcome::new(row.row_number, &row.spec_text, kind).with_warnings(parsed.warnings)
        } else if row.density.is_some() {
            self.resolve_with_density(store, row)?
        } else {
            self.resolver.resolve_text(
                store,
                row.row_number,
                &row.spec_text,
                part_number,
                self.allow_create,
            )?
        };

        if let (Some(alias), Some(material)) = (&row.alias, outcome.material()) {
            self.resolver.register_alias(store, alias, material.id)?;
        }

        Ok(outcome)
    }

    /// 带比重列的通用行: 命中则沿用已有材料，未命中按指定比重建档
    fn resolve_with_density<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        row: &CatalogRow,
    ) -> EngineResult<RowOutcome> {
        let outcome = |kind| RowOutcome::new(row.row_number, &row.spec_text, kind);
        let parsed = self.resolver.parser().parse(&row.spec_text);
        if let Some((material, _)) =
            self.resolver
                .lookup(store, Some(&row.spec_text), &parsed.spec)?
        {
            return Ok(outcome(RowOutcomeKind::Resolved {
                material,
                created: false,
            }));
        }

        if parsed.is_degraded() {
            return Ok(outcome(RowOutcomeKind::DegradedParse {
                warning: parsed.warnings.join("; "),
                spec: parsed.spec,
            }));
        }
        if !self.allow_create {
            return Ok(outcome(RowOutcomeKind::Unmatched { spec: parsed.spec })
                .with_warnings(parsed.warnings));
        }

        let resolution = self.resolver.create_general(
            store,
            Some(&row.spec_text),
            &parsed.spec,
            row.part_number.as_deref(),
            row.density,
        )?;
        Ok(outcome(RowOutcomeKind::Resolved {
            material: resolution.material,
            created: resolution.created,
        })
        .with_warnings(parsed.warnings))
    }

    /// 同步导入单个文件（在阻塞线程中执行）
    fn import_file_blocking(&self, file_path: &Path) -> ImportResult<FileImportReport> {
        let file = file_path.display().to_string();
        let rows = UniversalFileParser.parse_rows(file_path)?;
        info!(file = %file, rows = rows.len(), "文件解析完成");

        let outcomes = self.import_rows(rows)?;
        let summary = OutcomeSummary::from_outcomes(&outcomes);
        info!(
            file = %file,
            total = summary.total,
            resolved = summary.resolved,
            created = summary.created,
            degraded = summary.degraded,
            unmatched = summary.unmatched,
            failed = summary.failed,
            "文件导入完成"
        );

        Ok(FileImportReport {
            file,
            outcomes,
            summary,
        })
    }

    // ==========================================
    // 采购明细草稿
    // ==========================================

    /// 采购明细行 → 下单草稿
    ///
    /// # 规则
    /// - 映射失败、规格降级的行进入 rejected，不进入草稿
    /// - 表头未给交货期时取明细最早交货期
    pub fn draft_order(
        &self,
        mut header: NewPurchaseOrderHeader,
        rows: Vec<NumberedRow>,
    ) -> OrderDraft {
        let mapper = FieldMapper::default();
        let mut lines = Vec::new();
        let mut rejected = Vec::new();
        let mut earliest_due = None;

        for (row_number, raw) in rows {
            let line = match mapper.map_order_line(&raw, row_number) {
                Ok(line) => line,
                Err(e) => {
                    rejected.push(RowOutcome::new(
                        row_number,
                        mapper.spec_text_of(&raw),
                        RowOutcomeKind::Failed {
                            error: e.to_string(),
                        },
                    ));
                    continue;
                }
            };

            let parsed = self.resolver.parser().parse(&line.spec_text);
            if parsed.is_degraded() {
                rejected.push(RowOutcome::new(
                    row_number,
                    &line.spec_text,
                    RowOutcomeKind::DegradedParse {
                        warning: parsed.warnings.join("; "),
                        spec: parsed.spec,
                    },
                ));
                continue;
            }

            if let Some(due) = line.due_date {
                earliest_due = Some(earliest_due.map_or(due, |d: NaiveDate| d.min(due)));
            }

            let (ordered_quantity, ordered_weight_kg) = match line.amount {
                QuantityCell::Pieces(n) => (Some(n), None),
                QuantityCell::WeightKg(w) => (None, Some(w)),
            };
            lines.push(NewOrderLine {
                material_id: None,
                spec_text: Some(line.spec_text),
                length_mm: line.length_mm,
                part_number: line.part_number,
                ordered_quantity,
                ordered_weight_kg,
            });
        }

        if header.due_date.is_none() {
            header.due_date = earliest_due;
        }

        OrderDraft {
            order: NewPurchaseOrder { header, lines },
            rejected,
        }
    }
}

#[async_trait]
impl CatalogImport for CatalogImporter {
    async fn import_file<P: AsRef<Path> + Send>(
        &self,
        file_path: P,
    ) -> ImportResult<FileImportReport> {
        let path = file_path.as_ref().to_path_buf();
        let importer = self.clone();
        tokio::task::spawn_blocking(move || importer.import_file_blocking(&path))
            .await
            .map_err(|e| ImportError::InternalError(format!("导入任务异常退出: {}", e)))?
    }

    async fn batch_import<P: AsRef<Path> + Send + Sync>(
        &self,
        file_paths: Vec<P>,
    ) -> ImportResult<Vec<Result<FileImportReport, String>>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| {
            let path_str = path.as_ref().display().to_string();
            async move { (path_str, self.import_file(path).await) }
        });

        let mut results = Vec::new();
        for (path_str, result) in join_all(import_tasks).await {
            match result {
                Ok(report) => results.push(Ok(report)),
                Err(e) if e.is_outage() => {
                    error!(file = %path_str, error = %e, "存储不可用，中止批量导入");
                    return Err(e);
                }
                Err(e) => {
                    error!(file = %path_str, error = %e, "文件导入失败");
                    results.push(Err(format!("文件 {} 导入失败: {}", path_str, e)));
                }
            }
        }

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Shape;
    use std::collections::HashMap;

    fn importer(allow_create: bool) -> CatalogImporter {
        let store = SqliteStore::open_in_memory().unwrap();
        CatalogImporter::new(store, Arc::new(CatalogResolver::default()), allow_create)
    }

    fn rows(header: &[&str], data: &[&[&str]]) -> Vec<NumberedRow> {
        data.iter()
            .enumerate()
            .map(|(idx, cells)| {
                let row: HashMap<String, String> = header
                    .iter()
                    .zip(cells.iter())
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect();
                (idx + 2, row)
            })
            .collect()
    }

    #[test]
    fn test_every_row_gets_an_outcome() {
        let imp = importer(true);
        let outcomes = imp
            .import_rows(rows(
                &["規格"],
                &[&["SUS303 φ8.0"], &["SUS303 φ8.0"], &["???"], &[""]],
            ))
            .unwrap();

        assert_eq!(outcomes.len(), 4);
        assert!(matches!(outcomes[0].kind, RowOutcomeKind::Resolved { created: true, .. }));
        assert!(matches!(outcomes[1].kind, RowOutcomeKind::Resolved { created: false, .. }));
        assert_eq!(outcomes[0].material().map(|m| m.id), outcomes[1].material().map(|m| m.id));
        assert!(matches!(outcomes[2].kind, RowOutcomeKind::DegradedParse { .. }));
        assert!(outcomes[3].is_failed());
        assert_eq!(outcomes[3].row_number, 5);
    }

    #[test]
    fn test_read_only_import_reports_unmatched() {
        let imp = importer(false);
        let outcomes = imp.import_rows(rows(&["spec"], &[&["S45C 20mm"]])).unwrap();
        assert!(matches!(outcomes[0].kind, RowOutcomeKind::Unmatched { .. }));
    }

    #[test]
    fn test_dedicated_row_and_density_override() {
        let imp = importer(true);
        let outcomes = imp
            .import_rows(rows(
                &["規格", "品番", "比重", "用途"],
                &[
                    &["C3602 φ12.0", "NB5N", "", "専用"],
                    &["C3602 φ12.0", "", "8.5", ""],
                    &["S45C 20mm", "", "", "専用"],
                ],
            ))
            .unwrap();

        let dedicated = outcomes[0].material().unwrap();
        assert_eq!(dedicated.usage_type, UsageType::Dedicated);
        assert_eq!(dedicated.dedicated_part_number.as_deref(), Some("NB5N"));

        let general = outcomes[1].material().unwrap();
        assert_eq!(general.usage_type, UsageType::General);
        assert_eq!(general.density, 8.5);
        assert_eq!(general.shape, Shape::Round);

        assert!(outcomes[2].is_failed());
    }

    #[test]
    fn test_alias_conflict_rolls_back_row() {
        let imp = importer(true);
        let outcomes = imp
            .import_rows(rows(
                &["規格", "別名"],
                &[&["SUS303 φ8.0", "303-8"], &["S45C 20mm", "303-8"]],
            ))
            .unwrap();

        assert!(outcomes[0].material().is_some());
        assert!(outcomes[1].is_failed());

        // 冲突行的建档随事务回滚
        let again = imp.import_rows(rows(&["規格"], &[&["S45C 20mm"]])).unwrap();
        assert!(matches!(again[0].kind, RowOutcomeKind::Resolved { created: true, .. }));
    }

    #[test]
    fn test_draft_order() {
        let imp = importer(true);
        let header = NewPurchaseOrderHeader {
            order_number: "PO-1".to_string(),
            supplier: None,
            order_date: NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            due_date: None,
        };
        let draft = imp.draft_order(
            header,
            rows(
                &["規格", "数量", "長さ", "納期"],
                &[
                    &["SUS303 φ8.0", "20本", "2500", "2026-05-10"],
                    &["C3602 φ12.0", "12.5kg", "2500", "2026-05-01"],
                    &["φ10", "5", "1000", ""],
                    &["S45C 20mm", "", "1000", ""],
                ],
            ),
        );

        assert_eq!(draft.order.lines.len(), 2);
        assert_eq!(draft.order.lines[0].ordered_quantity, Some(20));
        assert_eq!(draft.order.lines[1].ordered_weight_kg, Some(12.5));
        assert_eq!(draft.order.header.due_date, NaiveDate::from_ymd_opt(2026, 5, 1));
        assert_eq!(draft.rejected.len(), 2);
        assert!(matches!(draft.rejected[0].kind, RowOutcomeKind::DegradedParse { .. }));
        assert!(draft.rejected[1].is_failed());
    }

    #[test]
    fn test_missing_dimension_row_keeps_warning() {
        let created = importer(true)
            .import_rows(rows(&["規格"], &[&["SUS303 丸棒"]]))
            .unwrap();
        assert!(matches!(created[0].kind, RowOutcomeKind::Resolved { created: true, .. }));
        assert_eq!(created[0].warnings, vec!["未识别尺寸: 'SUS303 丸棒'".to_string()]);
        assert_eq!(OutcomeSummary::from_outcomes(&created).warned, 1);

        let unmatched = importer(false)
            .import_rows(rows(&["規格", "比重"], &[&["SUS303 丸棒", "8.0"]]))
            .unwrap();
        assert!(matches!(unmatched[0].kind, RowOutcomeKind::Unmatched { .. }));
        assert!(unmatched[0].has_warnings());

        let dedicated = importer(true)
            .import_rows(rows(&["規格", "品番", "用途"], &[&["SUS303 丸棒", "NB5N", "専用"]]))
            .unwrap();
        assert!(dedicated[0].material().is_some());
        assert!(dedicated[0].has_warnings());
    }

    fn write_catalog_csv(lines: &[&str]) -> tempfile::NamedTempFile {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    #[tokio::test]
    async fn test_batch_keeps_file_level_failures_per_file() {
        let good = write_catalog_csv(&["規格", "SUS303 φ8.0"]);
        let imp = importer(true);

        let results = imp
            .batch_import(vec![
                good.path().to_path_buf(),
                std::path::PathBuf::from("/nonexistent/catalog.csv"),
            ])
            .await
            .unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().map(|r| r.summary.created).ok(), Some(1));
        assert!(results[1].is_err());
    }

    #[tokio::test]
    async fn test_batch_aborts_on_store_outage() {
        use rusqlite::Connection;
        use std::sync::Mutex;

        let conn = Arc::new(Mutex::new(Connection::open_in_memory().unwrap()));
        // 持锁线程 panic 使互斥锁中毒，之后每次取连接都失败
        let poisoner = Arc::clone(&conn);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison store lock");
        })
        .join();

        let store = SqliteStore::from_connection(conn);
        let imp = CatalogImporter::new(store, Arc::new(CatalogResolver::default()), true);
        let file = write_catalog_csv(&["規格", "SUS303 φ8.0"]);

        let err = imp
            .batch_import(vec![
                file.path().to_path_buf(),
                std::path::PathBuf::from("/nonexistent/catalog.csv"),
            ])
            .await
            .unwrap_err();
        assert!(err.is_outage());
    }

    #[tokio::test]
    async fn test_import_file_csv() {
        use std::io::Write;

        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        writeln!(file, "規格,品番").unwrap();
        writeln!(file, "SUS303 φ8.0CM,").unwrap();
        writeln!(file, "C3602Lcd ∅12.0 (NB5N),").unwrap();

        let imp = importer(true);
        let report = imp.import_file(file.path()).await.unwrap();
        assert_eq!(report.summary.total, 2);
        assert_eq!(report.summary.created, 2);
        assert_eq!(report.summary.failed, 0);
    }
}
