// ==========================================
// 棒材库存管理系统 - 出入库
// ==========================================
// 职责: 捆包数量增减 + 出入库流水
// 红线: 数量变动与流水同一事务；出库守卫在 UPDATE 内完成，并发下不得出现负库存
// 红线: 捆包仅在数量为 0 时允许停用
// ==========================================

use crate::domain::{Item, Lot, MovementKind, NewStockMovement, StockMovement};
use crate::engine::error::{EngineError, EngineResult};
use crate::repository::sqlite_store::SqliteStore;
use crate::repository::store::InventoryStore;
use tracing::info;

pub struct StockMovementService;

impl StockMovementService {
    /// 出入库（独立事务）
    pub fn apply(
        store: &SqliteStore,
        item_id: i64,
        kind: MovementKind,
        quantity: i64,
        note: Option<&str>,
    ) -> EngineResult<(Item, StockMovement)> {
        store.transaction(|tx| Self::apply_in(tx, item_id, kind, quantity, note))
    }

    /// 出入库（在调用方的会话/事务内）
    ///
    /// # 返回
    /// - (更新后的捆包, 流水记录)
    pub fn apply_in<S: InventoryStore + ?Sized>(
        store: &S,
        item_id: i64,
        kind: MovementKind,
        quantity: i64,
        note: Option<&str>,
    ) -> EngineResult<(Item, StockMovement)> {
        if quantity <= 0 {
            return Err(EngineError::invalid_input(
                "quantity",
                format!("出入库数量必须为正数: {}", quantity),
            ));
        }
        let item = store
            .get_item(item_id)?
            .ok_or_else(|| EngineError::not_found("item", item_id))?;
        if !item.is_active {
            return Err(EngineError::BusinessRuleViolation(format!(
                "捆包 {} 已停用，不能出入库",
                item.management_code
            )));
        }

        let delta = match kind {
            MovementKind::In => quantity,
            MovementKind::Out => -quantity,
        };
        let updated = store.adjust_item_quantity(item_id, delta)?.ok_or_else(|| {
            EngineError::BusinessRuleViolation(format!(
                "库存不足: 捆包 {} 当前 {} 支，申请出库 {} 支",
                item.management_code, item.current_quantity, quantity
            ))
        })?;

        let movement = store.insert_movement(&NewStockMovement {
            item_id,
            kind,
            quantity,
            note: note.map(str::to_string),
        })?;

        info!(
            item_id,
            management_code = %updated.management_code,
            kind = %kind,
            quantity,
            current_quantity = updated.current_quantity,
            "出入库完成"
        );
        Ok((updated, movement))
    }

    /// 停用捆包（数量必须为 0）
    pub fn retire_item<S: InventoryStore + ?Sized>(store: &S, item_id: i64) -> EngineResult<Item> {
        let item = store
            .get_item(item_id)?
            .ok_or_else(|| EngineError::not_found("item", item_id))?;
        if item.current_quantity != 0 {
            return Err(EngineError::BusinessRuleViolation(format!(
                "捆包 {} 仍有 {} 支库存，不能停用",
                item.management_code, item.current_quantity
            )));
        }
        store.set_item_active(item_id, false)?;
        store
            .get_item(item_id)?
            .ok_or_else(|| EngineError::not_found("item", item_id))
    }

    /// 按管理编号查找捆包（含已停用）
    pub fn item_by_code<S: InventoryStore + ?Sized>(
        store: &S,
        management_code: &str,
    ) -> EngineResult<Item> {
        let code = management_code.trim();
        store
            .find_item_by_code(code)?
            .ok_or_else(|| EngineError::not_found("item", code))
    }

    /// 登记批次检验结果与备注（批次其余字段入库后不可变）
    pub fn record_inspection<S: InventoryStore + ?Sized>(
        store: &S,
        lot_id: i64,
        inspected: bool,
        notes: Option<&str>,
    ) -> EngineResult<Lot> {
        if store.get_lot(lot_id)?.is_none() {
            return Err(EngineError::not_found("lot", lot_id));
        }
        let notes = notes.map(str::trim).filter(|n| !n.is_empty());
        store.update_lot_inspection(lot_id, inspected, notes)?;
        info!(lot_id, inspected, "批次检验已登记");
        store
            .get_lot(lot_id)?
            .ok_or_else(|| EngineError::not_found("lot", lot_id))
    }

    /// 流水（按时间顺序）
    pub fn history<S: InventoryStore + ?Sized>(
        store: &S,
        item_id: i64,
    ) -> EngineResult<Vec<StockMovement>> {
        Ok(store.list_movements(item_id)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{NewItem, NewLot, NewMaterial, Shape, UsageType};
    use crate::repository::store::CatalogStore;
    use chrono::NaiveDate;

    fn seeded_item(store: &SqliteStore, qty: i64) -> i64 {
        store
            .session(|s| -> EngineResult<i64> {
                let material = s.create_material(&NewMaterial {
                    family_name: "S45C".to_string(),
                    shape: Shape::Square,
                    dimension_mm: Some(20.0),
                    density: 7.85,
                    usage_type: UsageType::General,
                    dedicated_part_number: None,
                    part_number: None,
                    product_id: None,
                })?;
                let lot = s.create_lot(&NewLot {
                    lot_number: "PO-1-01".to_string(),
                    material_id: material.id,
                    length_mm: 4000.0,
                    initial_quantity: qty,
                    supplier: Some("大同".to_string()),
                    received_date: NaiveDate::from_ymd_opt(2026, 2, 1).unwrap(),
                })?;
                Ok(s.create_item(&NewItem {
                    lot_id: lot.id,
                    location_id: 3,
                    current_quantity: qty,
                    management_code: "BS-TEST-1".to_string(),
                })?
                .id)
            })
            .unwrap()
    }

    #[test]
    fn test_out_then_in_writes_movements() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 10);

        let (item, _) =
            StockMovementService::apply(&store, item_id, MovementKind::Out, 4, Some("切断")).unwrap();
        assert_eq!(item.current_quantity, 6);
        let (item, _) = StockMovementService::apply(&store, item_id, MovementKind::In, 1, None).unwrap();
        assert_eq!(item.current_quantity, 7);

        let history = store
            .session(|s| StockMovementService::history(s, item_id))
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, MovementKind::Out);
        assert_eq!(history[0].note.as_deref(), Some("切断"));
    }

    #[test]
    fn test_out_beyond_stock_is_rejected_without_side_effects() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 3);

        let err = StockMovementService::apply(&store, item_id, MovementKind::Out, 4, None).unwrap_err();
        assert!(matches!(err, EngineError::BusinessRuleViolation(_)));

        store
            .session(|s| -> EngineResult<()> {
                assert_eq!(s.get_item(item_id)?.unwrap().current_quantity, 3);
                assert!(s.list_movements(item_id)?.is_empty());
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_invalid_quantity_and_missing_item() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 3);
        assert!(matches!(
            StockMovementService::apply(&store, item_id, MovementKind::In, 0, None),
            Err(EngineError::InvalidConversionInput { .. })
        ));
        assert!(matches!(
            StockMovementService::apply(&store, 404, MovementKind::In, 1, None),
            Err(EngineError::NotFound { .. })
        ));
    }

    #[test]
    fn test_retire_only_when_empty() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 2);

        let err = store
            .session(|s| StockMovementService::retire_item(s, item_id))
            .unwrap_err();
        assert!(matches!(err, EngineError::BusinessRuleViolation(_)));

        StockMovementService::apply(&store, item_id, MovementKind::Out, 2, None).unwrap();
        let retired = store
            .session(|s| StockMovementService::retire_item(s, item_id))
            .unwrap();
        assert!(!retired.is_active);

        // 停用后不可再入库
        assert!(StockMovementService::apply(&store, item_id, MovementKind::In, 1, None).is_err());
    }

    #[test]
    fn test_item_by_code() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 5);

        store
            .session(|s| -> EngineResult<()> {
                let item = StockMovementService::item_by_code(s, " BS-TEST-1 ")?;
                assert_eq!(item.id, item_id);
                assert!(matches!(
                    StockMovementService::item_by_code(s, "BS-NONE"),
                    Err(EngineError::NotFound { .. })
                ));
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn test_record_inspection_updates_only_inspection_fields() {
        let store = SqliteStore::open_in_memory().unwrap();
        let item_id = seeded_item(&store, 5);

        store
            .transaction(|s| -> EngineResult<()> {
                let lot_id = s.get_item(item_id)?.unwrap().lot_id;
                let before = s.get_lot(lot_id)?.unwrap();
                assert!(!before.inspected);

                let lot = StockMovementService::record_inspection(s, lot_id, true, Some(" 表面傷あり "))?;
                assert!(lot.inspected);
                assert_eq!(lot.notes.as_deref(), Some("表面傷あり"));
                assert_eq!(lot.initial_quantity, before.initial_quantity);
                assert_eq!(lot.lot_number, before.lot_number);

                let cleared = StockMovementService::record_inspection(s, lot_id, false, Some("  "))?;
                assert!(!cleared.inspected);
                assert_eq!(cleared.notes, None);

                assert!(matches!(
                    StockMovementService::record_inspection(s, 999, true, None),
                    Err(EngineError::NotFound { .. })
                ));
                Ok(())
            })
            .unwrap();
    }
}
