// ==========================================
// 棒材库存管理系统 - 采购仓储
// ==========================================
// 表: purchase_order / purchase_order_item
// 红线: 状态派生规则在引擎层，这里只负责读写
// ==========================================

use crate::domain::{
    MaterialSnapshot, NewPurchaseOrderHeader, NewPurchaseOrderItem, OrderItemStatus,
    OrderStatus, PurchaseOrder, PurchaseOrderItem, ReceiptRecord, Shape,
};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::sqlite_store::{enum_column, optional_row, StoreSession};
use crate::repository::store::OrderStore;
use chrono::Utc;
use rusqlite::{params, Row};

const ORDER_ITEM_COLUMNS: &str = r#"
    id, order_id, line_no, material_id, is_new_material,
    family_name, shape, dimension_mm, density, length_mm, dedicated_part_number, spec_text,
    part_number, ordered_quantity, ordered_weight_kg, management_code, status,
    received_quantity, received_weight_kg, received_at, lot_id, item_id
"#;

fn map_order(row: &Row<'_>) -> rusqlite::Result<PurchaseOrder> {
    Ok(PurchaseOrder {
        id: row.get(0)?,
        order_number: row.get(1)?,
        supplier: row.get(2)?,
        order_date: row.get(3)?,
        due_date: row.get(4)?,
        status: enum_column(row, 5, OrderStatus::parse_db)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

fn map_order_item(row: &Row<'_>) -> rusqlite::Result<PurchaseOrderItem> {
    Ok(PurchaseOrderItem {
        id: row.get(0)?,
        order_id: row.get(1)?,
        line_no: row.get(2)?,
        material_id: row.get(3)?,
        is_new_material: row.get(4)?,
        snapshot: MaterialSnapshot {
            family_name: row.get(5)?,
            shape: enum_column(row, 6, |s| Some(Shape::parse_db(s)))?,
            dimension_mm: row.get(7)?,
            density: row.get(8)?,
            length_mm: row.get(9)?,
            dedicated_part_number: row.get(10)?,
            spec_text: row.get(11)?,
        },
        part_number: row.get(12)?,
        ordered_quantity: row.get(13)?,
        ordered_weight_kg: row.get(14)?,
        management_code: row.get(15)?,
        status: enum_column(row, 16, OrderItemStatus::parse_db)?,
        received_quantity: row.get(17)?,
        received_weight_kg: row.get(18)?,
        received_at: row.get(19)?,
        lot_id: row.get(20)?,
        item_id: row.get(21)?,
    })
}

impl OrderStore for StoreSession<'_> {
    fn create_order(&self, header: &NewPurchaseOrderHeader) -> RepositoryResult<PurchaseOrder> {
        let now = Utc::now();
        self.conn.execute(
            r#"
            INSERT INTO purchase_order (
                order_number, supplier, order_date, due_date, status, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
            "#,
            params![
                header.order_number,
                header.supplier,
                header.order_date,
                header.due_date,
                OrderStatus::Pending.as_db_str(),
                now,
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_order(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "purchase_order".to_string(),
            id: id.to_string(),
        })
    }

    fn get_order(&self, id: i64) -> RepositoryResult<Option<PurchaseOrder>> {
        optional_row(self.conn.query_row(
            "SELECT id, order_number, supplier, order_date, due_date, status, created_at, updated_at
             FROM purchase_order WHERE id = ?1",
            params![id],
            map_order,
        ))
    }

    fn create_order_item(&self, new: &NewPurchaseOrderItem) -> RepositoryResult<PurchaseOrderItem> {
        let snap = &new.snapshot;
        self.conn.execute(
            r#"
            INSERT INTO purchase_order_item (
                order_id, line_no, material_id, is_new_material,
                family_name, shape, dimension_mm, density, length_mm,
                dedicated_part_number, spec_text, part_number,
                ordered_quantity, ordered_weight_kg, management_code, status
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
            "#,
            params![
                new.order_id,
                new.line_no,
                new.material_id,
                new.is_new_material,
                snap.family_name,
                snap.shape.as_db_str(),
                snap.dimension_mm,
                snap.density,
                snap.length_mm,
                snap.dedicated_part_number,
                snap.spec_text,
                new.part_number,
                new.ordered_quantity,
                new.ordered_weight_kg,
                new.management_code,
                OrderItemStatus::Pending.as_db_str(),
            ],
        )?;
        let id = self.conn.last_insert_rowid();
        self.get_order_item(id)?.ok_or_else(|| RepositoryError::NotFound {
            entity: "purchase_order_item".to_string(),
            id: id.to_string(),
        })
    }

    fn get_order_item(&self, id: i64) -> RepositoryResult<Option<PurchaseOrderItem>> {
        let sql = format!(
            "SELECT {} FROM purchase_order_item WHERE id = ?1",
            ORDER_ITEM_COLUMNS
        );
        optional_row(self.conn.query_row(&sql, params![id], map_order_item))
    }

    fn list_order_items(&self, order_id: i64) -> RepositoryResult<Vec<PurchaseOrderItem>> {
        let sql = format!(
            "SELECT {} FROM purchase_order_item WHERE order_id = ?1 ORDER BY line_no",
            ORDER_ITEM_COLUMNS
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![order_id], map_order_item)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    fn bind_order_item_material(&self, item_id: i64, material_id: i64) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE purchase_order_item SET material_id = ?2, is_new_material = 0 WHERE id = ?1",
            params![item_id, material_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "purchase_order_item".to_string(),
                id: item_id.to_string(),
            });
        }
        Ok(())
    }

    fn mark_order_item_received(
        &self,
        item_id: i64,
        receipt: &ReceiptRecord,
    ) -> RepositoryResult<bool> {
        let affected = self.conn.execute(
            r#"
            UPDATE purchase_order_item
            SET status = ?2,
                received_quantity = ?3,
                received_weight_kg = ?4,
                received_at = ?5,
                lot_id = ?6,
                item_id = ?7
            WHERE id = ?1 AND status = ?8
            "#,
            params![
                item_id,
                OrderItemStatus::Received.as_db_str(),
                receipt.received_quantity,
                receipt.received_weight_kg,
                receipt.received_at,
                receipt.lot_id,
                receipt.item_id,
                OrderItemStatus::Pending.as_db_str(),
            ],
        )?;
        Ok(affected == 1)
    }

    fn update_order_status(&self, order_id: i64, status: OrderStatus) -> RepositoryResult<()> {
        let affected = self.conn.execute(
            "UPDATE purchase_order SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![order_id, status.as_db_str(), Utc::now()],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "purchase_order".to_string(),
                id: order_id.to_string(),
            });
        }
        Ok(())
    }
}
