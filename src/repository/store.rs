// ==========================================
// 棒材库存管理系统 - 存储接口 Trait
// ==========================================
// 职责: 定义引擎所需的目录/库存/采购数据访问接口（不包含实现）
// 红线: Repository 不含业务规则，只做数据 CRUD
// 实现者: StoreSession（rusqlite 连接/事务之上）
// ==========================================

use crate::domain::{
    Item, Lot, Material, MaterialAlias, MaterialGrade, MaterialProduct, MaterialStandard,
    NewItem, NewLot, NewMaterial, NewPurchaseOrderHeader, NewPurchaseOrderItem,
    NewStockMovement, OrderStatus, PurchaseOrder, PurchaseOrderItem, ReceiptRecord, Shape,
    StockMovement, UsageType,
};
use crate::repository::error::RepositoryResult;

// ==========================================
// MaterialFilter - 材料查询条件
// ==========================================
// 所有字段均为精确匹配；dimension_mm 为 None 时匹配“无尺寸”的记录
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialFilter {
    pub family_name: String,
    pub shape: Shape,
    pub dimension_mm: Option<f64>,
    pub usage_type: Option<UsageType>,
    pub dedicated_part_number: Option<String>,
    pub active_only: bool,
}

impl MaterialFilter {
    /// 按 牌号/形状/尺寸 三元组构造（仅有效记录）
    pub fn geometry(family_name: &str, shape: Shape, dimension_mm: Option<f64>) -> Self {
        Self {
            family_name: family_name.to_string(),
            shape,
            dimension_mm,
            usage_type: None,
            dedicated_part_number: None,
            active_only: true,
        }
    }

    pub fn general(mut self) -> Self {
        self.usage_type = Some(UsageType::General);
        self
    }

    pub fn dedicated(mut self, part_number: &str) -> Self {
        self.usage_type = Some(UsageType::Dedicated);
        self.dedicated_part_number = Some(part_number.to_string());
        self
    }
}

// ==========================================
// CatalogStore Trait
// ==========================================
pub trait CatalogStore {
    // ===== 材料 =====

    /// 按条件查询材料（按 id 升序，保证结果确定）
    fn find_materials(&self, filter: &MaterialFilter) -> RepositoryResult<Vec<Material>>;

    fn get_material(&self, id: i64) -> RepositoryResult<Option<Material>>;

    /// 新建材料；违反唯一索引时返回 UniqueConstraintViolation
    fn create_material(&self, new: &NewMaterial) -> RepositoryResult<Material>;

    /// 逻辑删除/恢复
    fn set_material_active(&self, id: i64, active: bool) -> RepositoryResult<()>;

    // ===== 别名 =====

    fn find_alias(&self, alias_text: &str) -> RepositoryResult<Option<MaterialAlias>>;

    fn insert_alias(&self, alias_text: &str, material_id: i64) -> RepositoryResult<MaterialAlias>;

    fn list_aliases_for_material(&self, material_id: i64) -> RepositoryResult<Vec<MaterialAlias>>;

    // ===== 层级: 标准 / 牌号 / 产品 =====

    fn create_standard(&self, code: &str, name: Option<&str>) -> RepositoryResult<MaterialStandard>;

    fn create_grade(
        &self,
        standard_id: i64,
        grade_code: &str,
        density: Option<f64>,
    ) -> RepositoryResult<MaterialGrade>;

    /// 按牌号代码查找（跨标准，取 id 最小的一条）
    fn find_grade_by_code(&self, grade_code: &str) -> RepositoryResult<Option<MaterialGrade>>;

    fn create_product(
        &self,
        grade_id: i64,
        shape: Shape,
        dimension_mm: Option<f64>,
        name: Option<&str>,
    ) -> RepositoryResult<MaterialProduct>;

    fn find_product(
        &self,
        grade_id: i64,
        shape: Shape,
        dimension_mm: Option<f64>,
    ) -> RepositoryResult<Option<MaterialProduct>>;
}

// ==========================================
// InventoryStore Trait
// ==========================================
pub trait InventoryStore {
    /// 汇总有效捆包数量（有效材料 + 有效捆包）
    fn sum_item_quantity(&self, material_ids: &[i64]) -> RepositoryResult<i64>;

    fn create_lot(&self, new: &NewLot) -> RepositoryResult<Lot>;

    fn get_lot(&self, id: i64) -> RepositoryResult<Option<Lot>>;

    /// 更新检验/备注（批次唯一可变字段）
    fn update_lot_inspection(
        &self,
        id: i64,
        inspected: bool,
        notes: Option<&str>,
    ) -> RepositoryResult<()>;

    fn create_item(&self, new: &NewItem) -> RepositoryResult<Item>;

    fn get_item(&self, id: i64) -> RepositoryResult<Option<Item>>;

    fn find_item_by_code(&self, management_code: &str) -> RepositoryResult<Option<Item>>;

    /// 带守卫的数量增减: 结果不得为负、捆包必须有效
    ///
    /// # 返回
    /// - Ok(Some(Item)): 更新后的捆包
    /// - Ok(None): 守卫不满足（库存不足或已停用），未做修改
    fn adjust_item_quantity(&self, id: i64, delta: i64) -> RepositoryResult<Option<Item>>;

    fn set_item_active(&self, id: i64, active: bool) -> RepositoryResult<()>;

    fn insert_movement(&self, new: &NewStockMovement) -> RepositoryResult<StockMovement>;

    fn list_movements(&self, item_id: i64) -> RepositoryResult<Vec<StockMovement>>;

    /// 管理编号是否已被占用（捆包或采购明细预留）
    fn management_code_exists(&self, code: &str) -> RepositoryResult<bool>;
}

// ==========================================
// OrderStore Trait
// ==========================================
pub trait OrderStore {
    fn create_order(&self, header: &NewPurchaseOrderHeader) -> RepositoryResult<PurchaseOrder>;

    fn get_order(&self, id: i64) -> RepositoryResult<Option<PurchaseOrder>>;

    fn create_order_item(&self, new: &NewPurchaseOrderItem) -> RepositoryResult<PurchaseOrderItem>;

    fn get_order_item(&self, id: i64) -> RepositoryResult<Option<PurchaseOrderItem>>;

    fn list_order_items(&self, order_id: i64) -> RepositoryResult<Vec<PurchaseOrderItem>>;

    /// 绑定材料并清除“新材料”标记
    fn bind_order_item_material(&self, item_id: i64, material_id: i64) -> RepositoryResult<()>;

    /// 标记明细已入库（仅 PENDING 状态可更新）
    ///
    /// # 返回
    /// - Ok(true): 更新成功
    /// - Ok(false): 明细已不是 PENDING
    fn mark_order_item_received(
        &self,
        item_id: i64,
        receipt: &ReceiptRecord,
    ) -> RepositoryResult<bool>;

    fn update_order_status(&self, order_id: i64, status: OrderStatus) -> RepositoryResult<()>;
}
