// ==========================================
// 棒材库存管理系统 - 数据清洗器实现
// ==========================================
// 职责: TRIM / NULL 标准化 / 数量单元格 / 日期 / 数值
// 约定: 全角数字与单位先折叠为半角再解析
// ==========================================

use crate::domain::UsageType;
use crate::engine::spec_parser::normalize_text;
use chrono::NaiveDate;
use once_cell::sync::OnceCell;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};

/// 数量单元格
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum QuantityCell {
    Pieces(i64),
    WeightKg(f64),
}

pub struct DataCleaner;

impl DataCleaner {
    /// 去首尾空白；可选转大写
    pub fn clean_text(&self, value: &str, uppercase: bool) -> String {
        let trimmed = value.trim();
        if uppercase {
            trimmed.to_uppercase()
        } else {
            trimmed.to_string()
        }
    }

    /// 空串 / 占位符 → None
    pub fn normalize_null(&self, value: Option<&str>) -> Option<String> {
        value.and_then(|v| {
            let trimmed = v.trim();
            match trimmed {
                "" | "-" | "—" | "N/A" | "n/a" | "NULL" | "null" => None,
                _ => Some(trimmed.to_string()),
            }
        })
    }

    /// 日期: YYYYMMDD / YYYY-MM-DD / YYYY/MM/DD
    pub fn parse_date(&self, value: &str) -> Option<NaiveDate> {
        let value = normalize_text(value);
        NaiveDate::parse_from_str(&value, "%Y%m%d")
            .or_else(|_| NaiveDate::parse_from_str(&value, "%Y-%m-%d"))
            .or_else(|_| NaiveDate::parse_from_str(&value, "%Y/%m/%d"))
            .ok()
    }

    /// 正数（允许千分位逗号）
    pub fn parse_positive_f64(&self, value: &str) -> Option<f64> {
        let cleaned = normalize_text(value).replace(',', "");
        let cleaned = cleaned
            .trim_end_matches("mm")
            .trim_end_matches("MM")
            .trim();
        cleaned
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite() && *v > 0.0)
    }

    /// 数量单元格
    ///
    /// # 规则
    /// - "20" / "20本" / "20pcs" / "20 PCS" → 支数
    /// - "12.5kg" / "12.5 KG" → 重量
    /// - 小数支数、非正数、未知单位 → None
    pub fn parse_quantity_cell(&self, value: &str) -> Option<QuantityCell> {
        static RE: OnceCell<Regex> = OnceCell::new();
        let re = RE.get_or_init(|| {
            Regex::new(r"^(\d+(?:\.\d+)?)\s*(本|支|pcs|pc|kg)?$").expect("valid quantity regex")
        });

        let normalized = normalize_text(value).replace(',', "").to_lowercase();
        let caps = re.captures(&normalized)?;
        let number = caps.get(1)?.as_str();
        match caps.get(2).map(|m| m.as_str()) {
            Some("kg") => number
                .parse::<f64>()
                .ok()
                .filter(|w| *w > 0.0)
                .map(QuantityCell::WeightKg),
            _ => number
                .parse::<i64>()
                .ok()
                .filter(|q| *q > 0)
                .map(QuantityCell::Pieces),
        }
    }

    /// 用途区分
    pub fn parse_usage(&self, value: &str) -> Option<UsageType> {
        let upper = normalize_text(value).to_uppercase();
        match upper.as_str() {
            "専用" | "专用" | "DEDICATED" | "D" => Some(UsageType::Dedicated),
            "汎用" | "通用" | "GENERAL" | "G" => Some(UsageType::General),
            _ => UsageType::parse_db(&upper),
        }
    }
}
