// ==========================================
// 棒材库存管理系统 - 采购对账（下单 / 入库状态机）
// ==========================================
// 职责:
// - 下单: 每行绑定已有材料或标记新材料（附规格快照），预留管理编号
// - 入库: 明细 PENDING → RECEIVED，生成批次/捆包/入库流水，重算订单状态
// 红线: 下单与入库均在单一事务内完成，任一步失败整体回滚
// 红线: 订单状态由明细派生，persisted status 只是缓存
// ==========================================

use crate::config::engine_config::{EngineConfig, DEFAULT_MANAGEMENT_CODE_PREFIX};
use crate::domain::{
    Item, Lot, Material, MaterialSnapshot, MovementKind, NewItem, NewLot,
    NewPurchaseOrderHeader, NewPurchaseOrderItem, NewStockMovement, OrderItemStatus,
    OrderStatus, PurchaseOrder, PurchaseOrderItem, ReceiptRecord,
};
use crate::engine::catalog_resolver::CatalogResolver;
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::unit_converter::{ReceivedAmount, UnitConverter};
use crate::repository::sqlite_store::SqliteStore;
use crate::repository::store::{CatalogStore, InventoryStore, OrderStore};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// 管理编号冲突时的最大重试次数
const MAX_CODE_ATTEMPTS: usize = 5;

// ==========================================
// 输入 / 输出
// ==========================================

/// 下单行
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderLine {
    /// 已建档材料
    pub material_id: Option<i64>,
    /// 未建档时的规格文本
    pub spec_text: Option<String>,
    pub length_mm: f64,
    pub part_number: Option<String>,
    pub ordered_quantity: Option<i64>,
    pub ordered_weight_kg: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewPurchaseOrder {
    pub header: NewPurchaseOrderHeader,
    pub lines: Vec<NewOrderLine>,
}

/// 入库请求（支数与重量二选一）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingRequest {
    pub order_item_id: i64,
    pub quantity: Option<i64>,
    pub weight_kg: Option<f64>,
    pub location_id: i64,
    pub received_date: NaiveDate,
}

impl ReceivingRequest {
    /// 校验二选一
    pub fn amount(&self) -> EngineResult<ReceivedAmount> {
        match (self.quantity, self.weight_kg) {
            (Some(q), None) => Ok(ReceivedAmount::Quantity(q)),
            (None, Some(w)) => Ok(ReceivedAmount::WeightKg(w)),
            (Some(_), Some(_)) => Err(EngineError::InconsistentReceivingInput(
                "同时提供了支数和重量".to_string(),
            )),
            (None, None) => Err(EngineError::InconsistentReceivingInput(
                "支数和重量均未提供".to_string(),
            )),
        }
    }
}

/// 订单及其明细
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderWithItems {
    pub order: PurchaseOrder,
    pub items: Vec<PurchaseOrderItem>,
}

/// 入库结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReceivingResult {
    pub order: PurchaseOrder,
    pub order_item: PurchaseOrderItem,
    pub material: Material,
    pub material_created: bool,
    pub lot: Lot,
    pub item: Item,
}

/// 由明细状态派生订单状态
///
/// # 规则
/// - 全部 RECEIVED → COMPLETED
/// - 部分 RECEIVED → PARTIAL
/// - 否则（含无明细）→ PENDING
pub fn derive_order_status(items: &[PurchaseOrderItem]) -> OrderStatus {
    let received = items
        .iter()
        .filter(|i| i.status == OrderItemStatus::Received)
        .count();
    if received == 0 {
        OrderStatus::Pending
    } else if received == items.len() {
        OrderStatus::Completed
    } else {
        OrderStatus::Partial
    }
}

/// 批次号: {订单号}-{行号两位}
pub fn lot_number_for(order_number: &str, line_no: i32) -> String {
    format!("{}-{:02}", order_number, line_no)
}

// ==========================================
// OrderReconciler
// ==========================================
pub struct OrderReconciler {
    resolver: CatalogResolver,
    management_code_prefix: String,
}

impl Default for OrderReconciler {
    fn default() -> Self {
        Self::new(CatalogResolver::default(), DEFAULT_MANAGEMENT_CODE_PREFIX)
    }
}

impl OrderReconciler {
    pub fn new(resolver: CatalogResolver, management_code_prefix: &str) -> Self {
        Self {
            resolver,
            management_code_prefix: management_code_prefix.to_string(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            CatalogResolver::from_config(config),
            &config.management_code_prefix,
        )
    }

    pub fn resolver(&self) -> &CatalogResolver {
        &self.resolver
    }

    // ==========================================
    // 下单
    // ==========================================

    /// 创建采购订单（单一事务）
    pub fn create_order(
        &self,
        store: &SqliteStore,
        order: &NewPurchaseOrder,
    ) -> EngineResult<OrderWithItems> {
        store.transaction(|tx| self.create_order_in(tx, order))
    }

    pub fn create_order_in<S>(&self, store: &S, order: &NewPurchaseOrder) -> EngineResult<OrderWithItems>
    where
        S: CatalogStore + InventoryStore + OrderStore + ?Sized,
    {
        let header = &order.header;
        if header.order_number.trim().is_empty() {
            return Err(EngineError::BusinessRuleViolation("订单号不能为空".to_string()));
        }
        if order.lines.is_empty() {
            return Err(EngineError::BusinessRuleViolation(format!(
                "订单 {} 没有明细",
                header.order_number
            )));
        }

        let created = store.create_order(header)?;
        let mut items = Vec::with_capacity(order.lines.len());

        for (idx, line) in order.lines.iter().enumerate() {
            let line_no = (idx + 1) as i32;
            let (material_id, snapshot) = self.snapshot_for_line(store, line)?;
            let management_code = self.allocate_management_code(store, header.order_date)?;

            let item = store.create_order_item(&NewPurchaseOrderItem {
                order_id: created.id,
                line_no,
                material_id,
                is_new_material: material_id.is_none(),
                snapshot,
                part_number: line.part_number.clone(),
                ordered_quantity: line.ordered_quantity,
                ordered_weight_kg: line.ordered_weight_kg,
                management_code,
            })?;
            debug!(
                order_number = %created.order_number,
                line_no,
                management_code = %item.management_code,
                is_new_material = item.is_new_material,
                "明细已创建"
            );
            items.push(item);
        }

        info!(
            order_id = created.id,
            order_number = %created.order_number,
            lines = items.len(),
            "采购订单已创建"
        );
        Ok(OrderWithItems {
            order: created,
            items,
        })
    }

    /// 明细快照: 已建档材料取材料字段；否则解析规格文本（命中目录则直接绑定）
    fn snapshot_for_line<S>(
        &self,
        store: &S,
        line: &NewOrderLine,
    ) -> EngineResult<(Option<i64>, MaterialSnapshot)>
    where
        S: CatalogStore + ?Sized,
    {
        if line.ordered_quantity.is_some_and(|q| q <= 0) {
            return Err(EngineError::invalid_input("ordered_quantity", "必须为正数"));
        }
        if line.ordered_weight_kg.is_some_and(|w| !w.is_finite() || w <= 0.0) {
            return Err(EngineError::invalid_input("ordered_weight_kg", "必须为有限正数"));
        }

        let (material_id, snapshot) = match (line.material_id, line.spec_text.as_deref()) {
            (Some(id), _) => {
                let material = store
                    .get_material(id)?
                    .ok_or_else(|| EngineError::not_found("material", id))?;
                if !material.is_active {
                    return Err(EngineError::BusinessRuleViolation(format!(
                        "材料 {} 已停用，不能下单",
                        id
                    )));
                }
                (Some(material.id), snapshot_of(&material, line))
            }
            (None, Some(text)) => {
                let parsed = self.resolver.parser().parse(text);
                if parsed.is_degraded() {
                    return Err(EngineError::ParseDegraded(parsed.warnings.join("; ")));
                }
                match self.resolver.lookup(store, Some(text), &parsed.spec)? {
                    Some((material, _)) => (Some(material.id), snapshot_of(&material, line)),
                    None => {
                        let density = self.resolver.density_for(store, &parsed.spec.family_name)?;
                        let spec = parsed.spec;
                        (
                            None,
                            MaterialSnapshot {
                                family_name: spec.family_name,
                                shape: spec.shape,
                                dimension_mm: spec.dimension_mm,
                                density,
                                length_mm: line.length_mm,
                                dedicated_part_number: spec.dedicated_part_number,
                                spec_text: Some(text.to_string()),
                            },
                        )
                    }
                }
            }
            (None, None) => {
                return Err(EngineError::BusinessRuleViolation(
                    "明细必须指定材料或规格文本".to_string(),
                ))
            }
        };

        // 下单即校验可换算，避免入库时才暴露
        piece_weight_of(&snapshot)?;
        Ok((material_id, snapshot))
    }

    /// 预留管理编号: {前缀}-{yyMMdd}-{随机6位}
    pub fn allocate_management_code<S: InventoryStore + ?Sized>(
        &self,
        store: &S,
        date: NaiveDate,
    ) -> EngineResult<String> {
        for attempt in 1..=MAX_CODE_ATTEMPTS {
            let suffix = Uuid::new_v4().simple().to_string()[..6].to_uppercase();
            let code = format!(
                "{}-{}-{}",
                self.management_code_prefix,
                date.format("%y%m%d"),
                suffix
            );
            if !store.management_code_exists(&code)? {
                return Ok(code);
            }
            warn!(code = %code, attempt, "管理编号冲突，重新生成");
        }
        Err(EngineError::BusinessRuleViolation(format!(
            "管理编号生成失败（重试 {} 次）",
            MAX_CODE_ATTEMPTS
        )))
    }

    // ==========================================
    // 入库
    // ==========================================

    /// 入库（单一事务）
    pub fn receive(
        &self,
        store: &SqliteStore,
        request: &ReceivingRequest,
    ) -> EngineResult<ReceivingResult> {
        store.transaction(|tx| self.receive_in(tx, request))
    }

    /// 入库状态机
    ///
    /// # 步骤
    /// 1. 支数/重量二选一
    /// 2. 按明细快照换算
    /// 3. 新材料明细: 解析或建档后绑定
    /// 4. 生成批次、捆包（沿用预留管理编号）、入库流水
    /// 5. 明细 → RECEIVED
    /// 6. 重算订单状态
    pub fn receive_in<S>(&self, store: &S, request: &ReceivingRequest) -> EngineResult<ReceivingResult>
    where
        S: CatalogStore + InventoryStore + OrderStore + ?Sized,
    {
        let amount = request.amount()?;
        if request.location_id <= 0 {
            return Err(EngineError::BusinessRuleViolation(format!(
                "库位无效: {}",
                request.location_id
            )));
        }

        let order_item = store
            .get_order_item(request.order_item_id)?
            .ok_or_else(|| EngineError::not_found("purchase_order_item", request.order_item_id))?;
        if order_item.status != OrderItemStatus::Pending {
            return Err(EngineError::InvalidStateTransition {
                entity: "purchase_order_item".to_string(),
                id: order_item.id,
                from: order_item.status.to_string(),
                to: OrderItemStatus::Received.to_string(),
            });
        }
        let order = store
            .get_order(order_item.order_id)?
            .ok_or_else(|| EngineError::not_found("purchase_order", order_item.order_id))?;

        // 2. 换算
        let piece_weight = piece_weight_of(&order_item.snapshot)?;
        let converted = UnitConverter::convert_receipt(piece_weight, amount)?;

        // 3. 材料
        let (material, material_created) = match order_item.material_id {
            Some(id) if !order_item.is_new_material => {
                let material = store
                    .get_material(id)?
                    .ok_or_else(|| EngineError::not_found("material", id))?;
                // 停用材料下的库存不计入可用量，不能再入库
                if !material.is_active {
                    return Err(EngineError::BusinessRuleViolation(format!(
                        "明细 {} 绑定的材料 {} 已停用",
                        order_item.id, material.id
                    )));
                }
                (material, false)
            }
            _ => {
                let spec = order_item.snapshot.to_spec();
                let resolution = self.resolver.resolve_or_create(
                    store,
                    order_item.snapshot.spec_text.as_deref(),
                    &spec,
                    order_item.part_number.as_deref(),
                )?;
                store.bind_order_item_material(order_item.id, resolution.material.id)?;
                (resolution.material, resolution.created)
            }
        };

        // 4. 批次 / 捆包 / 流水
        let lot = store.create_lot(&NewLot {
            lot_number: lot_number_for(&order.order_number, order_item.line_no),
            material_id: material.id,
            length_mm: order_item.snapshot.length_mm,
            initial_quantity: converted.quantity,
            supplier: order.supplier.clone(),
            received_date: request.received_date,
        })?;
        let item = store.create_item(&NewItem {
            lot_id: lot.id,
            location_id: request.location_id,
            current_quantity: converted.quantity,
            management_code: order_item.management_code.clone(),
        })?;
        store.insert_movement(&NewStockMovement {
            item_id: item.id,
            kind: MovementKind::In,
            quantity: converted.quantity,
            note: Some(format!("采购入库 {}", lot.lot_number)),
        })?;

        // 5. 明细状态
        let receipt = ReceiptRecord {
            received_quantity: converted.quantity,
            received_weight_kg: converted.weight_kg,
            received_at: Utc::now(),
            lot_id: lot.id,
            item_id: item.id,
        };
        if !store.mark_order_item_received(order_item.id, &receipt)? {
            return Err(EngineError::InvalidStateTransition {
                entity: "purchase_order_item".to_string(),
                id: order_item.id,
                from: OrderItemStatus::Received.to_string(),
                to: OrderItemStatus::Received.to_string(),
            });
        }

        // 6. 订单状态
        let items = store.list_order_items(order.id)?;
        let status = derive_order_status(&items);
        store.update_order_status(order.id, status)?;

        let order = store
            .get_order(order.id)?
            .ok_or_else(|| EngineError::not_found("purchase_order", order.id))?;
        let order_item = items
            .into_iter()
            .find(|i| i.id == order_item.id)
            .ok_or_else(|| EngineError::not_found("purchase_order_item", order_item.id))?;

        info!(
            order_number = %order.order_number,
            line_no = order_item.line_no,
            management_code = %item.management_code,
            quantity = converted.quantity,
            weight_kg = converted.weight_kg,
            material_id = material.id,
            material_created,
            order_status = %order.status,
            "入库完成"
        );

        Ok(ReceivingResult {
            order,
            order_item,
            material,
            material_created,
            lot,
            item,
        })
    }

    /// 读取订单及明细
    pub fn load_order<S: OrderStore + ?Sized>(
        &self,
        store: &S,
        order_id: i64,
    ) -> EngineResult<OrderWithItems> {
        let order = store
            .get_order(order_id)?
            .ok_or_else(|| EngineError::not_found("purchase_order", order_id))?;
        let items = store.list_order_items(order_id)?;
        Ok(OrderWithItems { order, items })
    }
}

fn snapshot_of(material: &Material, line: &NewOrderLine) -> MaterialSnapshot {
    MaterialSnapshot {
        family_name: material.family_name.clone(),
        shape: material.shape,
        dimension_mm: material.dimension_mm,
        density: material.density,
        length_mm: line.length_mm,
        dedicated_part_number: material.dedicated_part_number.clone(),
        spec_text: line.spec_text.clone(),
    }
}

fn piece_weight_of(snapshot: &MaterialSnapshot) -> EngineResult<f64> {
    let dimension = snapshot
        .dimension_mm
        .ok_or_else(|| EngineError::invalid_input("dimension_mm", "规格缺少尺寸，无法换算"))?;
    UnitConverter::piece_weight_kg(snapshot.shape, dimension, snapshot.length_mm, snapshot.density)
}
