// ==========================================
// 棒材库存管理系统 - 材料领域模型
// ==========================================
// 层级: 标准(Standard) → 牌号(Grade) → 产品(Product) → 材料(Material)
// 别名(Alias): 自由文本 → 材料 ID 的扁平映射
// 红线: 材料只做逻辑删除（is_active=false），批次/出入库历史必须可追溯
// ==========================================

use crate::domain::types::{Shape, UsageType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// MaterialSpec - 规格解析结果
// ==========================================
// 生命周期: 仅在解析/匹配流程内，不落库
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    pub family_name: String,                   // 材质牌号（大写、已归一）
    pub shape: Shape,                          // 截面形状
    pub dimension_mm: Option<f64>,             // 主尺寸（直径/对边/边长）
    pub dedicated_part_number: Option<String>, // 括号内专用品号
    pub remainder: Option<String>,             // 剩余文本（表面处理、长度备注等）
}

impl MaterialSpec {
    pub fn new(family_name: impl Into<String>, shape: Shape, dimension_mm: Option<f64>) -> Self {
        Self {
            family_name: family_name.into(),
            shape,
            dimension_mm,
            dedicated_part_number: None,
            remainder: None,
        }
    }

    pub fn with_dedicated_part(mut self, part_number: impl Into<String>) -> Self {
        self.dedicated_part_number = Some(part_number.into());
        self
    }

    /// 是否足以在目录中建档（牌号非空且形状已识别）
    pub fn is_catalogable(&self) -> bool {
        !self.family_name.trim().is_empty() && self.shape.is_known()
    }
}

// ==========================================
// Material - 材料目录记录
// ==========================================
// 唯一性: (family_name, shape, dimension_mm, usage_type, dedicated_part_number)，仅约束有效记录
// 对齐: material 表
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub id: i64,
    pub family_name: String,
    pub shape: Shape,
    pub dimension_mm: Option<f64>,
    pub density: f64, // g/cm³
    pub usage_type: UsageType,
    pub dedicated_part_number: Option<String>, // usage_type = DEDICATED 时必填
    pub part_number: Option<String>,           // 追溯用品号
    pub product_id: Option<i64>,               // 关联 material_product（可空）
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Material {
    /// 还原为规格（订单快照使用）
    pub fn to_spec(&self) -> MaterialSpec {
        MaterialSpec {
            family_name: self.family_name.clone(),
            shape: self.shape,
            dimension_mm: self.dimension_mm,
            dedicated_part_number: self.dedicated_part_number.clone(),
            remainder: None,
        }
    }
}

/// 新建材料参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewMaterial {
    pub family_name: String,
    pub shape: Shape,
    pub dimension_mm: Option<f64>,
    pub density: f64,
    pub usage_type: UsageType,
    pub dedicated_part_number: Option<String>,
    pub part_number: Option<String>,
    pub product_id: Option<i64>,
}

// ==========================================
// 材料层级: 标准 / 牌号 / 产品
// ==========================================

/// 材料标准（如 JIS G4303、ASTM A582）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialStandard {
    pub id: i64,
    pub code: String,
    pub name: Option<String>,
}

/// 牌号（挂在标准下，可携带密度）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialGrade {
    pub id: i64,
    pub standard_id: i64,
    pub grade_code: String,
    pub density: Option<f64>,
}

/// 产品（牌号 + 形状 + 尺寸的规格品）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialProduct {
    pub id: i64,
    pub grade_id: i64,
    pub shape: Shape,
    pub dimension_mm: Option<f64>,
    pub name: Option<String>,
}

// ==========================================
// MaterialAlias - 别名
// ==========================================
// 红线: 一个别名只能指向一个材料；同名别名指向不同材料视为冲突
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialAlias {
    pub id: i64,
    pub alias_text: String, // 归一化后的文本
    pub material_id: i64,
    pub created_at: DateTime<Utc>,
}
