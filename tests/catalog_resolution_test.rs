// ==========================================
// 目录解析集成测试
// ==========================================
// 测试目标: 专用/通用优先级、别名捷径、库存汇总、重开数据库后的一致性
// ==========================================

mod test_helpers;

use bar_stock::domain::{MovementKind, NewItem, NewLot, Shape, UsageType};
use bar_stock::engine::{CatalogResolver, EngineError, ResolvedVia, StockAggregator};
use bar_stock::logging;
use bar_stock::repository::{InventoryStore, RepositoryError, SqliteStore};
use bar_stock::StockMovementService;
use chrono::NaiveDate;
use test_helpers::{create_test_store, insert_material};

fn stock_item(store: &SqliteStore, material_id: i64, lot_number: &str, quantity: i64) -> i64 {
    store
        .transaction(|s| -> Result<i64, RepositoryError> {
            let lot = s.create_lot(&NewLot {
                lot_number: lot_number.to_string(),
                material_id,
                length_mm: 2500.0,
                initial_quantity: quantity,
                supplier: None,
                received_date: NaiveDate::from_ymd_opt(2026, 3, 1).unwrap(),
            })?;
            let item = s.create_item(&NewItem {
                lot_id: lot.id,
                location_id: 1,
                current_quantity: quantity,
                management_code: format!("CODE-{}", lot_number),
            })?;
            Ok(item.id)
        })
        .unwrap()
}

#[test]
fn test_general_wins_over_unmatched_dedicated_part() {
    logging::init_test();
    let (_tmp, _path, store) = create_test_store();
    let general = insert_material(&store, "SUS303", Shape::Round, 8.0, 7.93, None);
    let dedicated = insert_material(&store, "SUS303", Shape::Round, 8.0, 7.93, Some("A"));
    let resolver = CatalogResolver::default();

    let spec_b = resolver.parser().parse("SUS303 φ8.0 (B)").spec;
    let resolved = store
        .session(|s| resolver.resolve(s, Some("SUS303 φ8.0 (B)"), &spec_b))
        .unwrap();
    assert_eq!(resolved.id, general.id);

    let spec_a = resolver.parser().parse("SUS303 φ8.0 (A)").spec;
    let resolved = store
        .session(|s| resolver.resolve(s, Some("SUS303 φ8.0 (A)"), &spec_a))
        .unwrap();
    assert_eq!(resolved.id, dedicated.id);
}

#[test]
fn test_alias_shortcut_beats_parsing() {
    logging::init_test();
    let (_tmp, _path, store) = create_test_store();
    let target = insert_material(&store, "C3604", Shape::Hexagon, 17.0, 8.5, None);
    let resolver = CatalogResolver::default();

    store
        .transaction(|s| resolver.register_alias(s, "快削黄銅 六角17", target.id))
        .unwrap();

    // 全角空白同样归一到别名键
    let text = "快削黄銅\u{3000}六角17";
    let parsed = resolver.parser().parse(text);
    let hit = store
        .session(|s| resolver.lookup(s, Some(text), &parsed.spec))
        .unwrap()
        .unwrap();
    assert_eq!(hit.0.id, target.id);
    assert_eq!(hit.1, ResolvedVia::Alias);

    // 再登记到其他材料 → 冲突
    let other = insert_material(&store, "C3604", Shape::Hexagon, 19.0, 8.5, None);
    let err = store
        .transaction(|s| resolver.register_alias(s, "快削黄銅 六角17", other.id))
        .unwrap_err();
    assert!(matches!(err, EngineError::CatalogConflict { .. }));
}

#[test]
fn test_resolve_or_create_survives_reopen() {
    logging::init_test();
    let (_tmp, path, store) = create_test_store();
    let resolver = CatalogResolver::default();
    let spec = resolver.parser().parse("S45C 20mm").spec;

    let first = store
        .transaction(|s| resolver.resolve_or_create(s, Some("S45C 20mm"), &spec, None))
        .unwrap();
    assert!(first.created);
    assert_eq!(first.via, ResolvedVia::Created);
    assert_eq!(first.material.usage_type, UsageType::General);
    drop(store);

    let reopened = SqliteStore::open(&path).unwrap();
    let second = reopened
        .transaction(|s| resolver.resolve_or_create(s, Some("S45C 20mm"), &spec, None))
        .unwrap();
    assert!(!second.created);
    assert_eq!(second.material.id, first.material.id);
}

#[test]
fn test_stock_sums_general_and_dedicated_candidates() {
    logging::init_test();
    let (_tmp, _path, store) = create_test_store();
    let general = insert_material(&store, "SUS303", Shape::Round, 8.0, 7.93, None);
    let dedicated = insert_material(&store, "SUS303", Shape::Round, 8.0, 7.93, Some("NB5N"));
    let other_part = insert_material(&store, "SUS303", Shape::Round, 8.0, 7.93, Some("X1"));

    let general_item = stock_item(&store, general.id, "L-1", 30);
    stock_item(&store, dedicated.id, "L-2", 12);
    stock_item(&store, other_part.id, "L-3", 99);

    let resolver = CatalogResolver::default();
    let with_part = resolver.parser().parse("SUS303 φ8.0 (NB5N)").spec;
    let general_only = resolver.parser().parse("SUS303 φ8.0").spec;

    let total = store
        .session(|s| StockAggregator::available_quantity(s, &with_part))
        .unwrap();
    assert_eq!(total, 42);

    let total = store
        .session(|s| StockAggregator::available_quantity(s, &general_only))
        .unwrap();
    assert_eq!(total, 30);

    // 出库后汇总随之变化
    StockMovementService::apply(&store, general_item, MovementKind::Out, 10, Some("切断"))
        .unwrap();
    let breakdown = store
        .session(|s| StockAggregator::stock_breakdown(s, &with_part))
        .unwrap();
    assert_eq!(breakdown.len(), 2);
    assert_eq!(breakdown[0].material.id, dedicated.id);
    assert_eq!(breakdown[1].quantity, 20);
}

#[test]
fn test_stock_cannot_go_negative() {
    logging::init_test();
    let (_tmp, _path, store) = create_test_store();
    let material = insert_material(&store, "S45C", Shape::Round, 20.0, 7.85, None);
    let item_id = stock_item(&store, material.id, "L-9", 5);

    let err = StockMovementService::apply(&store, item_id, MovementKind::Out, 6, None).unwrap_err();
    assert!(matches!(err, EngineError::BusinessRuleViolation(_)));

    let history = store
        .session(|s| StockMovementService::history(s, item_id))
        .unwrap();
    assert!(history.is_empty());

    StockMovementService::apply(&store, item_id, MovementKind::Out, 5, None).unwrap();
    let retired = store
        .transaction(|s| StockMovementService::retire_item(s, item_id))
        .unwrap();
    assert!(!retired.is_active);
}
