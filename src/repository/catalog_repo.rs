// ==========================================
// 棒材库存管理系统 - 材料目录仓储
// ==========================================
// 表: material / material_alias / material_standard / material_grade / material_product
// 红线: Repository 不含业务逻辑，只负责数据访问
// ==========================================

use crate::domain::{
    Material, MaterialAlias, MaterialGrade, MaterialProduct, MaterialStandard, NewMaterial, Shape,
    UsageType,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite_store::{enum_column, optional_row, StoreSession};
use crate::repository::store::{CatalogStore, MaterialFilter};
use chrono::Utc;
use rusqlite::{params, Row};

const MATERIAL_COLUMNS: &str = r#"
    id, family_name, shape, dimension_mm, density, usage_type,
    dedicated_part_number, part_number, product_id, is_active,
    created_at, updated_at
"#;

fn map_material(row: &Row<'_>) -> rusqlite::Result<Material> {
    Ok(Material {
        id: row.get(0)?,
        family_name: row.get(1)?,
        shape: enum_column(row, 2, |s| Some(Shape::parse_db(s)))?,
        dimension_mm: row.get(3)?,
        density: row.get(4)?,
        usage_type: enum_column(row, 5, UsageType::parse_db)?,
        dedicated_part_number: row.get(6)?,
        part_number: row.get(7)?,
        product_id: row.get(8)?,
        is_active: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

fn map_alias(row: &Row<'_>) -> rusqlite::Result<MaterialAlias> {
    Ok(MaterialAlias {
        id: row.get(0)?,
        alias_text: row.get(1)?,
        material_id: row.get(2)?,
        created_at: row.get(3)?,
    })
}

fn map_grade(row: &Row<'_>) -> rusqlite::Result<MaterialGrade> {
    Ok(MaterialGrade {
        id: row.get(0)?,
        standard_id: row.get(1)?,
        grade_code: row.get(2)?,
        density: row.get(3)?,
    })
}

fn map_product(row: &Row<'_>) -> rusqlite::Result<MaterialProduct> {
    Ok(MaterialProduct {
        id: row.get(0)?,
        grade_id: row.get(1)?,
        shape: enum_column(row, 2, |s| Some(Shape::parse_db(s)))?,
        dimension_mm: row.get(3)?,
        name: row.get(4)?,
    })
}

impl CatalogStore for StoreSession<'_> {
    fn find_materials(&self, filter: &MaterialFilter) -> RepositoryResult<Vec<Material>> {
        // `IS ?3` 同时覆盖 NULL 与数值相等；?4/?5 为 NULL 时不过滤
        let sql = format!(
            r#"
            SELECT {} FROM material
            WHERE family_name = ?1
              AND shape = ?2
              AND dimension_mm IS ?3
              AND (?4 IS NULL OR usage_type = ?4)
              AND (?5 IS NULL OR dedicated_part_number = ?5)
              AND (?6 = 0 OR is_active = 1)
            ORDER BY id
            "#,
            MATERIAL_COLUMNS
        );

        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![
                    filter.family_name,
                    filter.shape.as_db_str(),
                    filter.dimension_mm,
                    filter.usage_type.map(|u| u.as_db_str()),
                    filter.dedicated_part_number,
                    filter.active_only,
                ],
                map_material,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn get_material(&self, id: i64) -> RepositoryResult<Option<Material>> {
        let sql = format!("SELECT {} FROM material WHERE id = ?1", MATERIAL_COLUMNS);
        optional_row(self.conn.query_row(&sql, params![id], map_material))
    }

    fn create_material(&self, new: &NewMaterial) -> RepositoryResult<Material> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO material (
                family_name, shape, dimension_mm, density, usage_type,
                dedicated_part_number, part_number, product_id, is_active,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1, ?9, ?9)
            "#,
            params![
                new.family_name,
                new.shape.as_db_str(),
                new.dimension_mm,
                new.density,
                new.usage_type.as_db_str(),
                new.dedicated_part_number,
                new.part_number,
                new.product_id,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_material(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "material".to_string(),
            id: id.to_string(),
        })
    }

    fn set_material_active(&self, id: i64, active: bool) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE material SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, active, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "material".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn find_alias(&self, alias_text: &str) -> RepositoryResult<Option<MaterialAlias>> {
        optional_row(self.conn.query_row(
            "SELECT id, alias_text, material_id, created_at FROM material_alias WHERE alias_text = ?1",
            params![alias_text],
            map_alias,
        ))
    }

    fn insert_alias(&self, alias_text: &str, material_id: i64) -> RepositoryResult<MaterialAlias> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO material_alias (alias_text, material_id, created_at) VALUES (?1, ?2, ?3)",
            params![alias_text, material_id, now],
        )?;
        Ok(MaterialAlias {
            id: self.conn.last_insert_rowid(),
            alias_text: alias_text.to_string(),
            material_id,
            created_at: now,
        })
    }

    fn list_aliases_for_material(&self, material_id: i64) -> RepositoryResult<Vec<MaterialAlias>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, alias_text, material_id, created_at FROM material_alias
             WHERE material_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![material_id], map_alias)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn create_standard(&self, code: &str, name: Option<&str>) -> RepositoryResult<MaterialStandard> {
        self.conn.execute(
            "INSERT INTO material_standard (code, name) VALUES (?1, ?2)",
            params![code, name],
        )?;
        Ok(MaterialStandard {
            id: self.conn.last_insert_rowid(),
            code: code.to_string(),
            name: name.map(str::to_string),
        })
    }

    fn create_grade(
        &self,
        standard_id: i64,
        grade_code: &str,
        density: Option<f64>,
    ) -> RepositoryResult<MaterialGrade> {
        self.conn.execute(
            "INSERT INTO material_grade (standard_id, grade_code, density) VALUES (?1, ?2, ?3)",
            params![standard_id, grade_code, density],
        )?;
        Ok(MaterialGrade {
            id: self.conn.last_insert_rowid(),
            standard_id,
            grade_code: grade_code.to_string(),
            density,
        })
    }

    fn find_grade_by_code(&self, grade_code: &str) -> RepositoryResult<Option<MaterialGrade>> {
        optional_row(self.conn.query_row(
            "SELECT id, standard_id, grade_code, density FROM material_grade
             WHERE grade_code = ?1 ORDER BY id LIMIT 1",
            params![grade_code],
            map_grade,
        ))
    }

    fn create_product(
        &self,
        grade_id: i64,
        shape: Shape,
        dimension_mm: Option<f64>,
        name: Option<&str>,
    ) -> RepositoryResult<MaterialProduct> {
        self.conn.execute(
            "INSERT INTO material_product (grade_id, shape, dimension_mm, name) VALUES (?1, ?2, ?3, ?4)",
            params![grade_id, shape.as_db_str(), dimension_mm, name],
        )?;
        Ok(MaterialProduct {
            id: self.conn.last_insert_rowid(),
            grade_id,
            shape,
            dimension_mm,
            name: name.map(str::to_string),
        })
    }

    fn find_product(
        &self,
        grade_id: i64,
        shape: Shape,
        dimension_mm: Option<f64>,
    ) -> RepositoryResult<Option<MaterialProduct>> {
        optional_row(self.conn.query_row(
            "SELECT id, grade_id, shape, dimension_mm, name FROM material_product
             WHERE grade_id = ?1 AND shape = ?2 AND dimension_mm IS ?3 ORDER BY id LIMIT 1",
            params![grade_id, shape.as_db_str(), dimension_mm],
            map_product,
        ))
    }
}
