// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的临时数据库、测试材料、导入文件等
// ==========================================

#![allow(dead_code)]

use bar_stock::domain::{Material, NewMaterial, Shape, UsageType};
use bar_stock::repository::{CatalogStore, RepositoryError, SqliteStore};
use std::error::Error;
use std::io::Write;
use tempfile::NamedTempFile;

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file
        .path()
        .to_str()
        .ok_or("临时文件路径不是合法 UTF-8")?
        .to_string();

    // 打开即建表
    SqliteStore::open(&db_path)?;

    Ok((temp_file, db_path))
}

/// 创建临时数据库并返回存储句柄
pub fn create_test_store() -> (NamedTempFile, String, SqliteStore) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let store = SqliteStore::open(&db_path).expect("打开测试数据库失败");
    (temp_file, db_path, store)
}

/// 直接写入一条材料记录（绕过解析器）
pub fn insert_material(
    store: &SqliteStore,
    family_name: &str,
    shape: Shape,
    dimension_mm: f64,
    density: f64,
    dedicated_part_number: Option<&str>,
) -> Material {
    let usage_type = if dedicated_part_number.is_some() {
        UsageType::Dedicated
    } else {
        UsageType::General
    };
    store
        .session(|s| -> Result<Material, RepositoryError> {
            s.create_material(&NewMaterial {
                family_name: family_name.to_string(),
                shape,
                dimension_mm: Some(dimension_mm),
                density,
                usage_type,
                dedicated_part_number: dedicated_part_number.map(str::to_string),
                part_number: dedicated_part_number.map(str::to_string),
                product_id: None,
            })
        })
        .expect("写入测试材料失败")
}

/// 写入临时 CSV 文件
pub fn write_csv(lines: &[&str]) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(".csv")
        .tempfile()
        .expect("创建临时 CSV 失败");
    for line in lines {
        writeln!(file, "{}", line).expect("写入临时 CSV 失败");
    }
    file
}
