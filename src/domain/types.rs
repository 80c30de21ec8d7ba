// ==========================================
// 棒材库存管理系统 - 领域类型定义
// ==========================================
// 存储格式: SCREAMING_SNAKE_CASE (与数据库一致)
// 所有枚举均提供 Display / as_db_str / parse_db 三件套
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 截面形状 (Shape)
// ==========================================
// Unknown 只允许出现在降级解析结果里，不可参与重量换算
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Shape {
    Round,   // 圆棒
    Hexagon, // 六角棒（尺寸为对边距离）
    Square,  // 方棒
    Unknown, // 未识别
}

impl Shape {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Shape::Round => "ROUND",
            Shape::Hexagon => "HEXAGON",
            Shape::Square => "SQUARE",
            Shape::Unknown => "UNKNOWN",
        }
    }

    /// 从数据库/表格字符串解析（兼容小写、中文、日文写法）
    pub fn parse_db(s: &str) -> Self {
        match s.trim().to_uppercase().as_str() {
            "ROUND" | "RD" | "丸" | "圆" | "丸棒" | "圆棒" => Shape::Round,
            "HEXAGON" | "HEX" | "六角" | "六角棒" => Shape::Hexagon,
            "SQUARE" | "SQ" | "角" | "方" | "角棒" | "方棒" => Shape::Square,
            _ => Shape::Unknown,
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Shape::Unknown)
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 用途类型 (Usage Type)
// ==========================================
// GENERAL: 通用库存（共用池）
// DEDICATED: 专用库存（绑定一个专用品号）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UsageType {
    General,
    Dedicated,
}

impl UsageType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            UsageType::General => "GENERAL",
            UsageType::Dedicated => "DEDICATED",
        }
    }

    pub fn parse_db(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "GENERAL" => Some(UsageType::General),
            "DEDICATED" => Some(UsageType::Dedicated),
            _ => None,
        }
    }
}

impl fmt::Display for UsageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 出入库方向 (Movement Kind)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MovementKind {
    In,  // 入库
    Out, // 出库
}

impl MovementKind {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MovementKind::In => "IN",
            MovementKind::Out => "OUT",
        }
    }

    pub fn parse_db(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "IN" => Some(MovementKind::In),
            "OUT" => Some(MovementKind::Out),
            _ => None,
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 采购单状态 (Order Status)
// ==========================================
// 派生值: 由明细状态计算，不单独维护
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,   // 未入库
    Partial,   // 部分入库
    Completed, // 全部入库
}

impl OrderStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse_db(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(OrderStatus::Pending),
            "PARTIAL" => Some(OrderStatus::Partial),
            "COMPLETED" => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

// ==========================================
// 采购明细状态 (Order Item Status)
// ==========================================
// 状态机: PENDING → RECEIVED（终态）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    Pending,
    Received,
}

impl OrderItemStatus {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            OrderItemStatus::Pending => "PENDING",
            OrderItemStatus::Received => "RECEIVED",
        }
    }

    pub fn parse_db(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "PENDING" => Some(OrderItemStatus::Pending),
            "RECEIVED" => Some(OrderItemStatus::Received),
            _ => None,
        }
    }
}

impl fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_parse_db_variants() {
        assert_eq!(Shape::parse_db("round"), Shape::Round);
        assert_eq!(Shape::parse_db("六角"), Shape::Hexagon);
        assert_eq!(Shape::parse_db(" SQ "), Shape::Square);
        assert_eq!(Shape::parse_db("oval"), Shape::Unknown);
        assert!(!Shape::Unknown.is_known());
    }

    #[test]
    fn test_enum_db_strings_roundtrip() {
        for status in [OrderStatus::Pending, OrderStatus::Partial, OrderStatus::Completed] {
            assert_eq!(OrderStatus::parse_db(status.as_db_str()), Some(status));
        }
        assert_eq!(UsageType::parse_db("dedicated"), Some(UsageType::Dedicated));
        assert_eq!(MovementKind::parse_db("x"), None);
        assert_eq!(OrderItemStatus::Received.to_string(), "RECEIVED");
    }
}
