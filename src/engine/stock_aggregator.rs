// ==========================================
// 棒材库存管理系统 - 库存汇总
// ==========================================
// 职责: 按规格汇总可用支数
// 候选材料:
// - 规格带专用品号: 对应专用材料 ∪ 同牌号/形状/尺寸的通用材料
// - 否则: 仅通用材料
// 口径: 有效材料的批次下、有效捆包的 current_quantity 之和
// ==========================================

use crate::domain::{Material, MaterialSpec};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::store::{CatalogStore, InventoryStore, MaterialFilter};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// 单个材料的库存
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialStock {
    pub material: Material,
    pub quantity: i64,
}

pub struct StockAggregator;

impl StockAggregator {
    /// 候选材料（专用在前，通用在后）
    pub fn candidate_materials<S: CatalogStore + ?Sized>(
        store: &S,
        spec: &MaterialSpec,
    ) -> EngineResult<Vec<Material>> {
        if !spec.is_catalogable() {
            return Ok(Vec::new());
        }
        let geometry = MaterialFilter::geometry(&spec.family_name, spec.shape, spec.dimension_mm);

        let mut candidates = Vec::new();
        if let Some(part) = spec.dedicated_part_number.as_deref() {
            candidates.extend(store.find_materials(&geometry.clone().dedicated(part))?);
        }
        candidates.extend(store.find_materials(&geometry.general())?);
        Ok(candidates)
    }

    /// 可用支数（无匹配时为 0）
    pub fn available_quantity<S: CatalogStore + InventoryStore + ?Sized>(
        store: &S,
        spec: &MaterialSpec,
    ) -> EngineResult<i64> {
        let ids: Vec<i64> = Self::candidate_materials(store, spec)?
            .iter()
            .map(|m| m.id)
            .collect();
        let total = store.sum_item_quantity(&ids)?;
        debug!(
            family_name = %spec.family_name,
            dimension_mm = ?spec.dimension_mm,
            candidates = ids.len(),
            total,
            "库存汇总"
        );
        Ok(total)
    }

    /// 单个材料的可用支数
    pub fn available_for_material<S: CatalogStore + InventoryStore + ?Sized>(
        store: &S,
        material_id: i64,
    ) -> EngineResult<i64> {
        if store.get_material(material_id)?.is_none() {
            return Err(EngineError::not_found("material", material_id));
        }
        Ok(store.sum_item_quantity(&[material_id])?)
    }

    /// 按候选材料分别列出库存
    pub fn stock_breakdown<S: CatalogStore + InventoryStore + ?Sized>(
        store: &S,
        spec: &MaterialSpec,
    ) -> EngineResult<Vec<MaterialStock>> {
        Self::candidate_materials(store, spec)?
            .into_iter()
            .map(|material| {
                let quantity = store.sum_item_quantity(&[material.id])?;
                Ok(MaterialStock { material, quantity })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewItem, NewLot, NewMaterial, Shape, UsageType};
    use crate::repository::{SqliteStore, StoreSession};
    use chrono::NaiveDate;

    fn material(s: &StoreSession<'_>, usage: UsageType, part: Option<&str>) -> Material {
        s.create_material(&NewMaterial {
            family_name: "SUS303".to_string(),
            shape: Shape::Round,
            dimension_mm: Some(8.0),
            density: 7.93,
            usage_type: usage,
            dedicated_part_number: part.map(str::to_string),
            part_number: None,
            product_id: None,
        })
        .unwrap()
    }

    fn stock(s: &StoreSession<'_>, material_id: i64, lot_number: &str, qty: i64) -> i64 {
        let lot = s
            .create_lot(&NewLot {
                lot_number: lot_number.to_string(),
                material_id,
                length_mm: 2500.0,
                initial_quantity: qty,
                supplier: None,
                received_date: NaiveDate::from_ymd_opt(2026, 1, 10).unwrap(),
            })
            .unwrap();
        s.create_item(&NewItem {
            lot_id: lot.id,
            location_id: 1,
            current_quantity: qty,
            management_code: format!("MC-{}", lot_number),
        })
        .unwrap()
        .id
    }

    #[test]
    fn test_general_only_without_part() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .session(|s| -> EngineResult<()> {
                let general = material(s, UsageType::General, None);
                let dedicated = material(s, UsageType::Dedicated, Some("NB5N"));
                stock(s, general.id, "L1", 10);
                stock(s, dedicated.id, "L2", 4);

                let spec = MaterialSpec::new("SUS303", Shape::Round, Some(8.0));
                assert_eq!(StockAggregator::available_quantity(s, &spec)?, 10);

                let with_part = spec.clone().with_dedicated_part("NB5N");
                assert_eq!(StockAggregator::available_quantity(s, &with_part)?, 14);

                let other_part = spec.with_dedicated_part("ZZZ");
                assert_eq!(StockAggregator::available_quantity(s, &other_part)?, 10);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_inactive_items_and_materials_are_excluded() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .session(|s| -> EngineResult<()> {
                let general = material(s, UsageType::General, None);
                stock(s, general.id, "L1", 10);
                let retired = stock(s, general.id, "L2", 5);
                s.set_item_active(retired, false)?;

                let spec = MaterialSpec::new("SUS303", Shape::Round, Some(8.0));
                assert_eq!(StockAggregator::available_quantity(s, &spec)?, 10);
                assert_eq!(StockAggregator::available_for_material(s, general.id)?, 10);

                s.set_material_active(general.id, false)?;
                assert_eq!(StockAggregator::available_quantity(s, &spec)?, 0);
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_nothing_matches_is_zero() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .session(|s| -> EngineResult<()> {
                let spec = MaterialSpec::new("S45C", Shape::Square, Some(20.0));
                assert_eq!(StockAggregator::available_quantity(s, &spec)?, 0);
                let degraded = MaterialSpec::new("", Shape::Unknown, None);
                assert_eq!(StockAggregator::available_quantity(s, &degraded)?, 0);
                assert!(matches!(
                    StockAggregator::available_for_material(s, 999),
                    Err(EngineError::NotFound { .. })
                ));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_breakdown_lists_each_candidate() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .session(|s| -> EngineResult<()> {
                let general = material(s, UsageType::General, None);
                let dedicated = material(s, UsageType::Dedicated, Some("NB5N"));
                stock(s, general.id, "L1", 3);
                stock(s, dedicated.id, "L2", 7);

                let spec = MaterialSpec::new("SUS303", Shape::Round, Some(8.0)).with_dedicated_part("NB5N");
                let rows = StockAggregator::stock_breakdown(s, &spec)?;
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].material.id, dedicated.id);
                assert_eq!(rows[0].quantity, 7);
                assert_eq!(rows[1].quantity, 3);
                Ok(())
            })
            .unwrap();
    }
}
