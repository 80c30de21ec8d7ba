// ==========================================
// 棒材库存管理系统 - 字段映射器实现
// ==========================================
// 职责: 源列名（日文/中文/英文表头）→ 标准字段 + 类型转换
// 约定: 每个标准字段按别名列表依次查找，取第一个非空值
// ==========================================

use crate::domain::UsageType;
use crate::importer::data_cleaner::{DataCleaner, QuantityCell};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::file_parser::RawRow;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// 列名别名
// ==========================================
const SPEC_TEXT_COLUMNS: &[&str] = &[
    "規格", "规格", "材料規格", "材料规格", "品名", "spec", "Spec", "SPEC", "material",
];
const PART_NUMBER_COLUMNS: &[&str] = &["品番", "品号", "部品番号", "part_number", "Part No", "PartNo"];
const DENSITY_COLUMNS: &[&str] = &["比重", "密度", "density"];
const USAGE_COLUMNS: &[&str] = &["用途", "区分", "usage"];
const ALIAS_COLUMNS: &[&str] = &["別名", "别名", "alias"];
const QUANTITY_COLUMNS: &[&str] = &["数量", "本数", "支数", "quantity", "qty", "Qty"];
const LENGTH_COLUMNS: &[&str] = &["長さ", "长度", "定尺", "length", "length_mm"];
const DUE_DATE_COLUMNS: &[&str] = &["納期", "交货期", "due_date", "Due"];

/// 目录导入行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRow {
    pub row_number: usize,
    pub spec_text: String,
    pub part_number: Option<String>,
    pub density: Option<f64>,
    pub usage: Option<UsageType>,
    pub alias: Option<String>,
}

/// 采购明细导入行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderLineRow {
    pub row_number: usize,
    pub spec_text: String,
    pub amount: QuantityCell,
    pub length_mm: f64,
    pub part_number: Option<String>,
    pub due_date: Option<NaiveDate>,
}

pub struct FieldMapper {
    cleaner: DataCleaner,
}

impl Default for FieldMapper {
    fn default() -> Self {
        Self {
            cleaner: DataCleaner,
        }
    }
}

impl FieldMapper {
    /// 原始行 → 目录导入行
    pub fn map_catalog_row(&self, row: &RawRow, row_number: usize) -> ImportResult<CatalogRow> {
        let spec_text = self.require(row, SPEC_TEXT_COLUMNS, "規格", row_number)?;

        let density = match self.get_string(row, DENSITY_COLUMNS) {
            None => None,
            Some(raw) => Some(self.cleaner.parse_positive_f64(&raw).ok_or_else(|| {
                ImportError::TypeConversionError {
                    row: row_number,
                    field: "比重".to_string(),
                    message: format!("无法解析为正数: {}", raw),
                }
            })?),
        };

        let usage = match self.get_string(row, USAGE_COLUMNS) {
            None => None,
            Some(raw) => Some(self.cleaner.parse_usage(&raw).ok_or_else(|| {
                ImportError::TypeConversionError {
                    row: row_number,
                    field: "用途".to_string(),
                    message: format!("未知用途区分: {}", raw),
                }
            })?),
        };

        Ok(CatalogRow {
            row_number,
            spec_text,
            part_number: self.get_string(row, PART_NUMBER_COLUMNS),
            density,
            usage,
            alias: self.get_string(row, ALIAS_COLUMNS),
        })
    }

    /// 原始行 → 采购明细导入行
    pub fn map_order_line(&self, row: &RawRow, row_number: usize) -> ImportResult<OrderLineRow> {
        let spec_text = self.require(row, SPEC_TEXT_COLUMNS, "規格", row_number)?;

        let raw_qty = self.require(row, QUANTITY_COLUMNS, "数量", row_number)?;
        let amount = self.cleaner.parse_quantity_cell(&raw_qty).ok_or_else(|| {
            ImportError::TypeConversionError {
                row: row_number,
                field: "数量".to_string(),
                message: format!("无法识别的数量: {}", raw_qty),
            }
        })?;

        let raw_len = self.require(row, LENGTH_COLUMNS, "長さ", row_number)?;
        let length_mm = self.cleaner.parse_positive_f64(&raw_len).ok_or_else(|| {
            ImportError::TypeConversionError {
                row: row_number,
                field: "長さ".to_string(),
                message: format!("无法解析为正数: {}", raw_len),
            }
        })?;

        let due_date = match self.get_string(row, DUE_DATE_COLUMNS) {
            None => None,
            Some(raw) => Some(self.cleaner.parse_date(&raw).ok_or_else(|| {
                ImportError::DateFormatError {
                    row: row_number,
                    field: "納期".to_string(),
                    value: raw.clone(),
                }
            })?),
        };

        Ok(OrderLineRow {
            row_number,
            spec_text,
            amount,
            length_mm,
            part_number: self.get_string(row, PART_NUMBER_COLUMNS),
            due_date,
        })
    }

    /// 规格文本（映射失败时用于行结果展示）
    pub fn spec_text_of(&self, row: &RawRow) -> String {
        self.get_string(row, SPEC_TEXT_COLUMNS).unwrap_or_default()
    }

    /// 按别名列表取第一个非空值
    fn get_string(&self, row: &RawRow, aliases: &[&str]) -> Option<String> {
        aliases
            .iter()
            .find_map(|alias| self.cleaner.normalize_null(row.get(*alias).map(String::as_str)))
    }

    fn require(
        &self,
        row: &RawRow,
        aliases: &[&str],
        field: &str,
        row_number: usize,
    ) -> ImportResult<String> {
        self.get_string(row, aliases)
            .ok_or_else(|| ImportError::MissingField {
                row: row_number,
                field: field.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, &str)]) -> RawRow {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_catalog_row_with_aliases() {
        let mapper = FieldMapper::default();
        let mapped = mapper
            .map_catalog_row(
                &row(&[("规格", "SUS303 φ8.0"), ("品番", "P-1"), ("比重", "7.93"), ("用途", "専用")]),
                3,
            )
            .unwrap();
        assert_eq!(mapped.row_number, 3);
        assert_eq!(mapped.spec_text, "SUS303 φ8.0");
        assert_eq!(mapped.part_number.as_deref(), Some("P-1"));
        assert_eq!(mapped.density, Some(7.93));
        assert_eq!(mapped.usage, Some(UsageType::Dedicated));
        assert_eq!(mapped.alias, None);
    }

    #[test]
    fn test_missing_spec_is_reported() {
        let mapper = FieldMapper::default();
        let err = mapper.map_catalog_row(&row(&[("品番", "P-1")]), 5).unwrap_err();
        assert!(matches!(err, ImportError::MissingField { row: 5, .. }));
    }

    #[test]
    fn test_order_line_row() {
        let mapper = FieldMapper::default();
        let mapped = mapper
            .map_order_line(
                &row(&[
                    ("Spec", "C3602 φ12.0"),
                    ("qty", "12.5kg"),
                    ("length", "2500"),
                    ("納期", "2026-05-10"),
                ]),
                2,
            )
            .unwrap();
        assert_eq!(mapped.amount, QuantityCell::WeightKg(12.5));
        assert_eq!(mapped.length_mm, 2500.0);
        assert_eq!(mapped.due_date, NaiveDate::from_ymd_opt(2026, 5, 10));
    }

    #[test]
    fn test_order_line_bad_cells() {
        let mapper = FieldMapper::default();
        let bad_qty = mapper.map_order_line(
            &row(&[("規格", "S45C 20mm"), ("数量", "多数"), ("長さ", "1000")]),
            2,
        );
        assert!(matches!(bad_qty, Err(ImportError::TypeConversionError { .. })));

        let bad_date = mapper.map_order_line(
            &row(&[("規格", "S45C 20mm"), ("数量", "3"), ("長さ", "1000"), ("納期", "来週")]),
            2,
        );
        assert!(matches!(bad_date, Err(ImportError::DateFormatError { .. })));
    }
}
