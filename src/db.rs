// ==========================================
// 棒材库存管理系统 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为（外键、busy_timeout）
// - 统一建表脚本，测试与批量导入共用一套 schema
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout（毫秒）
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明：
/// - foreign_keys 需要“每个连接”单独开启
/// - busy_timeout 需要“每个连接”单独配置；超时后以 Busy 错误返回（可重试）
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 默认数据库路径
///
/// # 规则
/// 1. 环境变量 BAR_STOCK_DB_PATH（非空）
/// 2. 用户数据目录下 bar-stock/bar_stock.db（debug 构建使用 bar-stock-dev）
/// 3. 当前目录 ./bar_stock.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var("BAR_STOCK_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let Some(data_dir) = dirs::data_dir() else {
        return "./bar_stock.db".to_string();
    };

    #[cfg(debug_assertions)]
    let dir = data_dir.join("bar-stock-dev");
    #[cfg(not(debug_assertions))]
    let dir = data_dir.join("bar-stock");

    // 目录创建失败时回退到当前目录
    if std::fs::create_dir_all(&dir).is_err() {
        return "./bar_stock.db".to_string();
    }
    dir.join("bar_stock.db").to_string_lossy().to_string()
}

/// 读取 schema_version（若表不存在则返回 None）
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化数据库 schema（幂等）
///
/// 说明：
/// - material 的唯一性由部分唯一索引保证，仅约束 is_active=1 的记录
/// - dimension_mm / dedicated_part_number 可空，索引里用 IFNULL 折叠，避免 NULL 互不相等
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS material_standard (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            code TEXT NOT NULL UNIQUE,
            name TEXT
        );

        CREATE TABLE IF NOT EXISTS material_grade (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            standard_id INTEGER NOT NULL REFERENCES material_standard(id),
            grade_code TEXT NOT NULL,
            density REAL,
            UNIQUE (standard_id, grade_code)
        );

        CREATE TABLE IF NOT EXISTS material_product (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            grade_id INTEGER NOT NULL REFERENCES material_grade(id),
            shape TEXT NOT NULL,
            dimension_mm REAL,
            name TEXT
        );

        CREATE TABLE IF NOT EXISTS material (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            family_name TEXT NOT NULL,
            shape TEXT NOT NULL,
            dimension_mm REAL,
            density REAL NOT NULL,
            usage_type TEXT NOT NULL,
            dedicated_part_number TEXT,
            part_number TEXT,
            product_id INTEGER REFERENCES material_product(id),
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            CHECK ((usage_type = 'DEDICATED') = (dedicated_part_number IS NOT NULL))
        );

        CREATE UNIQUE INDEX IF NOT EXISTS ux_material_identity ON material (
            family_name,
            shape,
            IFNULL(dimension_mm, -1),
            usage_type,
            IFNULL(dedicated_part_number, '')
        ) WHERE is_active = 1;

        CREATE TABLE IF NOT EXISTS material_alias (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            alias_text TEXT NOT NULL UNIQUE,
            material_id INTEGER NOT NULL REFERENCES material(id),
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS lot (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lot_number TEXT NOT NULL UNIQUE,
            material_id INTEGER NOT NULL REFERENCES material(id),
            length_mm REAL NOT NULL,
            initial_quantity INTEGER NOT NULL,
            supplier TEXT,
            received_date TEXT NOT NULL,
            inspected INTEGER NOT NULL DEFAULT 0,
            notes TEXT,
            created_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            lot_id INTEGER NOT NULL REFERENCES lot(id),
            location_id INTEGER NOT NULL,
            current_quantity INTEGER NOT NULL CHECK (current_quantity >= 0),
            management_code TEXT NOT NULL UNIQUE,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS stock_movement (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id INTEGER NOT NULL REFERENCES item(id),
            kind TEXT NOT NULL,
            quantity INTEGER NOT NULL CHECK (quantity > 0),
            note TEXT,
            moved_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS purchase_order (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_number TEXT NOT NULL UNIQUE,
            supplier TEXT,
            order_date TEXT NOT NULL,
            due_date TEXT,
            status TEXT NOT NULL DEFAULT 'PENDING',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS purchase_order_item (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            order_id INTEGER NOT NULL REFERENCES purchase_order(id),
            line_no INTEGER NOT NULL,
            material_id INTEGER REFERENCES material(id),
            is_new_material INTEGER NOT NULL DEFAULT 0,
            family_name TEXT NOT NULL,
            shape TEXT NOT NULL,
            dimension_mm REAL,
            density REAL NOT NULL,
            length_mm REAL NOT NULL,
            dedicated_part_number TEXT,
            spec_text TEXT,
            part_number TEXT,
            ordered_quantity INTEGER,
            ordered_weight_kg REAL,
            management_code TEXT NOT NULL UNIQUE,
            status TEXT NOT NULL DEFAULT 'PENDING',
            received_quantity INTEGER,
            received_weight_kg REAL,
            received_at TEXT,
            lot_id INTEGER REFERENCES lot(id),
            item_id INTEGER REFERENCES item(id),
            UNIQUE (order_id, line_no)
        );

        CREATE INDEX IF NOT EXISTS ix_lot_material ON lot (material_id);
        CREATE INDEX IF NOT EXISTS ix_item_lot ON item (lot_id);
        CREATE INDEX IF NOT EXISTS ix_material_geometry ON material (family_name, shape);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}
