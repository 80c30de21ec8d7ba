// ==========================================
// 棒材库存管理系统 - 单位换算
// ==========================================
// 职责: 按截面几何计算单支重量，支数 ↔ 重量 互算
// 单位: 尺寸/长度 mm，密度 g/cm³，重量 kg
// 红线: 无状态、无副作用；非法输入直接报错，不做告警降级
// ==========================================

use crate::domain::Shape;
use crate::engine::error::{EngineError, EngineResult};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// 入库/下单数量（支数或重量二选一）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", content = "value", rename_all = "snake_case")]
pub enum ReceivedAmount {
    Quantity(i64),
    WeightKg(f64),
}

/// 换算结果（两个口径同时给出）
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConvertedAmount {
    pub quantity: i64,
    pub weight_kg: f64,
}

pub struct UnitConverter;

impl UnitConverter {
    /// 截面积（cm²）
    ///
    /// # 规则
    /// - 圆: π·(d/2)²
    /// - 六角: (3√3/2)·(d/2)²，d 为对边距离
    /// - 方: d²
    pub fn cross_section_cm2(shape: Shape, dimension_mm: f64) -> EngineResult<f64> {
        ensure_positive("dimension_mm", dimension_mm)?;
        let d_cm = dimension_mm / 10.0;
        match shape {
            Shape::Round => Ok(PI * (d_cm / 2.0).powi(2)),
            Shape::Hexagon => Ok(3.0 * 3f64.sqrt() / 2.0 * (d_cm / 2.0).powi(2)),
            Shape::Square => Ok(d_cm * d_cm),
            Shape::Unknown => Err(EngineError::invalid_input("shape", "形状未知，无法计算截面积")),
        }
    }

    /// 单支重量（kg）
    ///
    /// # 参数
    /// - shape: 截面形状
    /// - dimension_mm: 直径/对边/边长
    /// - length_mm: 单支长度
    /// - density: 密度 g/cm³
    pub fn piece_weight_kg(
        shape: Shape,
        dimension_mm: f64,
        length_mm: f64,
        density: f64,
    ) -> EngineResult<f64> {
        ensure_positive("length_mm", length_mm)?;
        ensure_positive("density", density)?;
        let area_cm2 = Self::cross_section_cm2(shape, dimension_mm)?;
        let length_cm = length_mm / 10.0;
        Ok(area_cm2 * length_cm * density / 1000.0)
    }

    /// 总重量 = 单支重量 × 支数
    pub fn total_weight_kg(piece_weight_kg: f64, quantity: i64) -> EngineResult<f64> {
        ensure_positive("piece_weight_kg", piece_weight_kg)?;
        if quantity < 0 {
            return Err(EngineError::invalid_input("quantity", format!("不能为负数: {}", quantity)));
        }
        Ok(piece_weight_kg * quantity as f64)
    }

    /// 由重量反推支数（四舍五入，至少 1 支）
    pub fn quantity_from_weight(weight_kg: f64, piece_weight_kg: f64) -> EngineResult<i64> {
        ensure_positive("weight_kg", weight_kg)?;
        ensure_positive("piece_weight_kg", piece_weight_kg)?;
        Ok(((weight_kg / piece_weight_kg).round() as i64).max(1))
    }

    /// 入库换算
    ///
    /// # 规则
    /// - 给重量: 支数由重量反推，重量原样保留
    /// - 给支数: 重量 = 单支重量 × 支数
    pub fn convert_receipt(
        piece_weight_kg: f64,
        amount: ReceivedAmount,
    ) -> EngineResult<ConvertedAmount> {
        match amount {
            ReceivedAmount::WeightKg(weight_kg) => Ok(ConvertedAmount {
                quantity: Self::quantity_from_weight(weight_kg, piece_weight_kg)?,
                weight_kg,
            }),
            ReceivedAmount::Quantity(quantity) => {
                if quantity <= 0 {
                    return Err(EngineError::invalid_input(
                        "quantity",
                        format!("必须为正数: {}", quantity),
                    ));
                }
                Ok(ConvertedAmount {
                    quantity,
                    weight_kg: Self::total_weight_kg(piece_weight_kg, quantity)?,
                })
            }
        }
    }
}

fn ensure_positive(field: &str, value: f64) -> EngineResult<()> {
    if !value.is_finite() || value <= 0.0 {
        return Err(EngineError::invalid_input(field, format!("必须为有限正数: {}", value)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SHAPES: [Shape; 3] = [Shape::Round, Shape::Hexagon, Shape::Square];

    #[test]
    fn test_round_piece_weight() {
        // φ10, 1000mm, 7.85 → π·0.25·100·7.85/1000 ≈ 0.6165kg
        let w = UnitConverter::piece_weight_kg(Shape::Round, 10.0, 1000.0, 7.85).unwrap();
        assert!((w - 0.61654).abs() < 1e-4, "got {}", w);
    }

    #[test]
    fn test_hexagon_and_square_piece_weight() {
        // d=10 → (3√3/2)·0.25 ≈ 0.6495cm² × 100cm × 7.85 / 1000
        let hex = UnitConverter::piece_weight_kg(Shape::Hexagon, 10.0, 1000.0, 7.85).unwrap();
        assert!((hex - 0.50987).abs() < 1e-4, "got {}", hex);

        let sq = UnitConverter::piece_weight_kg(Shape::Square, 10.0, 1000.0, 7.85).unwrap();
        assert!((sq - 0.785).abs() < 1e-9, "got {}", sq);
    }

    #[test]
    fn test_round_trip_within_one_piece() {
        for shape in SHAPES {
            for dim in [3.0, 8.0, 12.5, 50.0] {
                let pw = UnitConverter::piece_weight_kg(shape, dim, 2500.0, 8.5).unwrap();
                for n in [1_i64, 7, 20, 333] {
                    let total = UnitConverter::total_weight_kg(pw, n).unwrap();
                    let back = UnitConverter::quantity_from_weight(total, pw).unwrap();
                    assert!((back - n).abs() <= 1, "{:?} {} {} → {}", shape, dim, n, back);
                }
            }
        }
    }

    #[test]
    fn test_monotonic_in_dimension_and_length() {
        for shape in SHAPES {
            let mut prev = 0.0;
            for dim in [1.0, 2.0, 5.5, 10.0, 40.0] {
                let w = UnitConverter::piece_weight_kg(shape, dim, 1000.0, 7.85).unwrap();
                assert!(w > prev);
                prev = w;
            }
            let mut prev = 0.0;
            for len in [100.0, 500.0, 2500.0, 4000.0] {
                let w = UnitConverter::piece_weight_kg(shape, 10.0, len, 7.85).unwrap();
                assert!(w > prev);
                prev = w;
            }
        }
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        assert!(matches!(
            UnitConverter::piece_weight_kg(Shape::Unknown, 10.0, 1000.0, 7.85),
            Err(EngineError::InvalidConversionInput { .. })
        ));
        assert!(UnitConverter::piece_weight_kg(Shape::Round, 0.0, 1000.0, 7.85).is_err());
        assert!(UnitConverter::piece_weight_kg(Shape::Round, 10.0, -1.0, 7.85).is_err());
        assert!(UnitConverter::piece_weight_kg(Shape::Round, 10.0, 1000.0, f64::NAN).is_err());
        assert!(UnitConverter::quantity_from_weight(10.0, 0.0).is_err());
        assert!(UnitConverter::total_weight_kg(0.5, -2).is_err());
    }

    #[test]
    fn test_quantity_from_weight_minimum_one() {
        assert_eq!(UnitConverter::quantity_from_weight(0.1, 5.0).unwrap(), 1);
        assert_eq!(UnitConverter::quantity_from_weight(10.0, 0.5).unwrap(), 20);
    }

    #[test]
    fn test_convert_receipt_keeps_supplied_weight() {
        let by_weight = UnitConverter::convert_receipt(0.5, ReceivedAmount::WeightKg(10.0)).unwrap();
        assert_eq!(by_weight.quantity, 20);
        assert_eq!(by_weight.weight_kg, 10.0);

        let by_qty = UnitConverter::convert_receipt(0.5, ReceivedAmount::Quantity(3)).unwrap();
        assert_eq!(by_qty.quantity, 3);
        assert!((by_qty.weight_kg - 1.5).abs() < 1e-12);

        assert!(UnitConverter::convert_receipt(0.5, ReceivedAmount::Quantity(0)).is_err());
    }
}
