// ==========================================
// ConfigManager 集成测试
// ==========================================
// 测试目标: config_kv 覆盖值生效并贯穿到引擎
// ==========================================

mod test_helpers;

use bar_stock::config::{config_keys, ConfigManager, EngineConfig};
use bar_stock::domain::{NewPurchaseOrderHeader, Shape};
use bar_stock::engine::{CatalogResolver, NewOrderLine, NewPurchaseOrder, OrderReconciler};
use bar_stock::logging;
use chrono::NaiveDate;
use test_helpers::{create_test_db, create_test_store, insert_material};

#[test]
fn test_config_manager_creation() {
    let (_temp_file, db_path) = create_test_db().expect("Failed to create test db");
    let config_manager = ConfigManager::new(&db_path);
    assert!(config_manager.is_ok(), "ConfigManager should be created successfully");

    let config = config_manager.unwrap().load_engine_config().unwrap();
    assert_eq!(config, EngineConfig::default());
}

#[test]
fn test_density_override_reaches_resolver() {
    logging::init_test();
    let (_tmp, db_path, store) = create_test_store();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_global_config_value(config_keys::DENSITY_TABLE, r#"{"NAK": 7.8}"#)
        .unwrap();
    manager
        .set_global_config_value(config_keys::DEFAULT_DENSITY, "7.7")
        .unwrap();

    let config = manager.load_engine_config().unwrap();
    let resolver = CatalogResolver::from_config(&config);

    let nak = resolver.parser().parse("NAK80 25mm").spec;
    let created = store
        .transaction(|s| resolver.resolve_or_create(s, None, &nak, None))
        .unwrap();
    assert_eq!(created.material.density, 7.8);

    let unknown = resolver.parser().parse("ZZZ1 25mm").spec;
    let created = store
        .transaction(|s| resolver.resolve_or_create(s, None, &unknown, None))
        .unwrap();
    assert_eq!(created.material.density, 7.7);
}

#[test]
fn test_management_code_prefix_override() {
    logging::init_test();
    let (_tmp, db_path, store) = create_test_store();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_global_config_value(config_keys::MANAGEMENT_CODE_PREFIX, "ws")
        .unwrap();

    let reconciler = OrderReconciler::from_config(&manager.load_engine_config().unwrap());
    let material = insert_material(&store, "S45C", Shape::Round, 20.0, 7.85, None);
    let created = reconciler
        .create_order(
            &store,
            &NewPurchaseOrder {
                header: NewPurchaseOrderHeader {
                    order_number: "PO-CFG".to_string(),
                    supplier: None,
                    order_date: NaiveDate::from_ymd_opt(2026, 7, 9).unwrap(),
                    due_date: None,
                },
                lines: vec![NewOrderLine {
                    material_id: Some(material.id),
                    spec_text: None,
                    length_mm: 1000.0,
                    part_number: None,
                    ordered_quantity: Some(3),
                    ordered_weight_kg: None,
                }],
            },
        )
        .unwrap();
    assert!(created.items[0].management_code.starts_with("WS-260709-"));
}

#[test]
fn test_malformed_values_fall_back() {
    let (_tmp, db_path) = create_test_db().unwrap();
    let manager = ConfigManager::new(&db_path).unwrap();
    manager
        .set_global_config_value(config_keys::MAX_FAMILY_LEN, "many")
        .unwrap();
    manager
        .set_global_config_value(config_keys::FAMILY_SUFFIX_FOLDS, "not json")
        .unwrap();

    let config = manager.load_engine_config().unwrap();
    assert_eq!(config.parser, EngineConfig::default().parser);
}
