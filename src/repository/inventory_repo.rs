// ==========================================
// 棒材库存管理系统 - 库存仓储
// ==========================================
// 表: lot / item / stock_movement
// 约束: 数量变动使用条件 UPDATE，守卫在 SQL 内完成，避免读改写竞态
// ==========================================

use crate::domain::{Item, Lot, MovementKind, NewItem, NewLot, NewStockMovement, StockMovement};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite_store::{enum_column, optional_row, StoreSession};
use crate::repository::store::InventoryStore;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Row};

fn map_lot(row: &Row<'_>) -> rusqlite::Result<Lot> {
    Ok(Lot {
        id: row.get(0)?,
        lot_number: row.get(1)?,
        material_id: row.get(2)?,
        length_mm: row.get(3)?,
        initial_quantity: row.get(4)?,
        supplier: row.get(5)?,
        received_date: row.get(6)?,
        inspected: row.get(7)?,
        notes: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn map_item(row: &Row<'_>) -> rusqlite::Result<Item> {
    Ok(Item {
        id: row.get(0)?,
        lot_id: row.get(1)?,
        location_id: row.get(2)?,
        current_quantity: row.get(3)?,
        management_code: row.get(4)?,
        is_active: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_movement(row: &Row<'_>) -> rusqlite::Result<StockMovement> {
    Ok(StockMovement {
        id: row.get(0)?,
        item_id: row.get(1)?,
        kind: enum_column(row, 2, MovementKind::parse_db)?,
        quantity: row.get(3)?,
        note: row.get(4)?,
        moved_at: row.get(5)?,
    })
}

const LOT_COLUMNS: &str = "id, lot_number, material_id, length_mm, initial_quantity, supplier, \
                           received_date, inspected, notes, created_at";
const ITEM_COLUMNS: &str = "id, lot_id, location_id, current_quantity, management_code, \
                            is_active, created_at, updated_at";

impl InventoryStore for StoreSession<'_> {
    fn sum_item_quantity(&self, material_ids: &[i64]) -> RepositoryResult<i64> {
        if material_ids.is_empty() {
            return Ok(0);
        }

        let placeholders = material_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let query = format!(
            r#"
            SELECT COALESCE(SUM(i.current_quantity), 0)
            FROM item i
            JOIN lot l ON l.id = i.lot_id
            JOIN material m ON m.id = l.material_id
            WHERE i.is_active = 1
              AND m.is_active = 1
              AND l.material_id IN ({})
            "#,
            placeholders
        );

        let total: i64 =
            self.conn
                .query_row(&query, params_from_iter(material_ids.iter()), |row| row.get(0))?;
        Ok(total)
    }

    fn create_lot(&self, new: &NewLot) -> RepositoryResult<Lot> {
        self.conn.execute(
            r#"
            INSERT INTO lot (
                lot_number, material_id, length_mm, initial_quantity,
                supplier, received_date, inspected, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, NULL, ?7)
            "#,
            params![
                new.lot_number,
                new.material_id,
                new.length_mm,
                new.initial_quantity,
                new.supplier,
                new.received_date,
                Utc::now(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_lot(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "lot".to_string(),
            id: id.to_string(),
        })
    }

    fn get_lot(&self, id: i64) -> RepositoryResult<Option<Lot>> {
        let sql = format!("SELECT {} FROM lot WHERE id = ?1", LOT_COLUMNS);
        optional_row(self.conn.query_row(&sql, params![id], map_lot))
    }

    fn update_lot_inspection(
        &self,
        id: i64,
        inspected: bool,
        notes: Option<&str>,
    ) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE lot SET inspected = ?2, notes = ?3 WHERE id = ?1",
            params![id, inspected, notes],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "lot".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn create_item(&self, new: &NewItem) -> RepositoryResult<Item> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO item (
                lot_id, location_id, current_quantity, management_code,
                is_active, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)
            "#,
            params![
                new.lot_id,
                new.location_id,
                new.current_quantity,
                new.management_code,
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_item(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "item".to_string(),
            id: id.to_string(),
        })
    }

    fn get_item(&self, id: i64) -> RepositoryResult<Option<Item>> {
        let sql = format!("SELECT {} FROM item WHERE id = ?1", ITEM_COLUMNS);
        optional_row(self.conn.query_row(&sql, params![id], map_item))
    }

    fn find_item_by_code(&self, management_code: &str) -> RepositoryResult<Option<Item>> {
        let sql = format!("SELECT {} FROM item WHERE management_code = ?1", ITEM_COLUMNS);
        optional_row(self.conn.query_row(&sql, params![management_code], map_item))
    }

    fn adjust_item_quantity(&self, id: i64, delta: i64) -> RepositoryResult<Option<Item>> {
        let affected = self.conn.execute(
            r#"
            UPDATE item
            SET current_quantity = current_quantity + ?2, updated_at = ?3
            WHERE id = ?1
              AND is_active = 1
              AND current_quantity + ?2 >= 0
            "#,
            params![id, delta, Utc::now()],
        )?;
        if affected == 0 {
            return Ok(None);
        }
        self.get_item(id)
    }

    fn set_item_active(&self, id: i64, active: bool) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE item SET is_active = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, active, Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "item".to_string(),
                id: id.to_string(),
            });
        }
        Ok(())
    }

    fn insert_movement(&self, new: &NewStockMovement) -> RepositoryResult<StockMovement> {
        let now = Utc::now();
        self.conn.execute(
            "INSERT INTO stock_movement (item_id, kind, quantity, note, moved_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![new.item_id, new.kind.as_db_str(), new.quantity, new.note, now],
        )?;
        Ok(StockMovement {
            id: self.conn.last_insert_rowid(),
            item_id: new.item_id,
            kind: new.kind,
            quantity: new.quantity,
            note: new.note.clone(),
            moved_at: now,
        })
    }

    fn list_movements(&self, item_id: i64) -> RepositoryResult<Vec<StockMovement>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, item_id, kind, quantity, note, moved_at FROM stock_movement
             WHERE item_id = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![item_id], map_movement)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn management_code_exists(&self, code: &str) -> RepositoryResult<bool> {
        let exists: bool = self.conn.query_row(
            r#"
            SELECT EXISTS (SELECT 1 FROM item WHERE management_code = ?1)
                OR EXISTS (SELECT 1 FROM purchase_order_item WHERE management_code = ?1)
            "#,
            params![code],
            |row| row.get(0),
        )?;
        Ok(exists)
    }
}
