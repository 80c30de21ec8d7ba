// ==========================================
// 棒材库存管理系统 - 目录解析器
// ==========================================
// 职责: MaterialSpec → Material（目录匹配，必要时建档）
// 优先级（首个命中生效）:
// 1. 原始文本的别名精确匹配
// 2. 有效专用材料: 牌号/形状/尺寸一致 且 专用品号一致
// 3. 有效通用材料: 牌号/形状/尺寸一致（即使规格带有未匹配的专用品号）
// 4. 新建通用材料（仅 resolve_or_create）
// 红线: resolve 只读；建档只在 resolve_or_create / create_dedicated 中发生
// 红线: 降级规格（牌号为空或形状未知）不得建档
// 并发: 依赖唯一索引，冲突时重查一次返回胜出者
// ==========================================

use crate::config::density_table::DensityTable;
use crate::config::engine_config::{EngineConfig, SpecParserConfig};
use crate::domain::{
    Material, MaterialAlias, MaterialGrade, MaterialProduct, MaterialSpec, MaterialStandard,
    NewMaterial, Shape, UsageType,
};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::outcome::{RowOutcome, RowOutcomeKind};
use crate::engine::spec_parser::{normalize_alias_key, SpecParser};
use crate::repository::error::RepositoryError;
use crate::repository::store::{CatalogStore, MaterialFilter};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 命中途径
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolvedVia {
    Alias,
    Dedicated,
    General,
    Created,
}

/// resolve_or_create 结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resolution {
    pub material: Material,
    pub created: bool,
    pub via: ResolvedVia,
}

// ==========================================
// CatalogResolver
// ==========================================
pub struct CatalogResolver {
    density_table: DensityTable,
    parser: SpecParser,
}

impl Default for CatalogResolver {
    fn default() -> Self {
        Self::new(DensityTable::standard(), SpecParserConfig::default())
    }
}

impl CatalogResolver {
    pub fn new(density_table: DensityTable, parser_config: SpecParserConfig) -> Self {
        Self {
            density_table,
            parser: SpecParser::new(parser_config),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.density_table.clone(), config.parser.clone())
    }

    pub fn parser(&self) -> &SpecParser {
        &self.parser
    }

    pub fn density_table(&self) -> &DensityTable {
        &self.density_table
    }

    // ==========================================
    // 查询
    // ==========================================

    /// 只读匹配
    ///
    /// # 返回
    /// - Ok(Some((Material, ResolvedVia))): 命中
    /// - Ok(None): 未命中
    pub fn lookup<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
    ) -> EngineResult<Option<(Material, ResolvedVia)>> {
        // 1. 别名
        if let Some(raw) = raw_text {
            let key = normalize_alias_key(raw);
            if !key.is_empty() {
                if let Some(alias) = store.find_alias(&key)? {
                    match store.get_material(alias.material_id)? {
                        Some(material) if material.is_active => {
                            debug!(alias = %key, material_id = material.id, "别名命中");
                            return Ok(Some((material, ResolvedVia::Alias)));
                        }
                        _ => {
                            warn!(alias = %key, material_id = alias.material_id, "别名指向的材料已停用，继续按规格匹配");
                        }
                    }
                }
            }
        }

        if !spec.is_catalogable() {
            return Ok(None);
        }

        let geometry = MaterialFilter::geometry(&spec.family_name, spec.shape, spec.dimension_mm);

        // 2. 专用材料
        if let Some(part) = spec.dedicated_part_number.as_deref() {
            let dedicated = store.find_materials(&geometry.clone().dedicated(part))?;
            if let Some(material) = dedicated.into_iter().next() {
                return Ok(Some((material, ResolvedVia::Dedicated)));
            }
        }

        // 3. 通用材料
        let general = store.find_materials(&geometry.general())?;
        if let Some(material) = general.into_iter().next() {
            if spec.dedicated_part_number.is_some() {
                debug!(
                    family_name = %spec.family_name,
                    dedicated_part_number = ?spec.dedicated_part_number,
                    "专用品号未匹配，采用通用材料"
                );
            }
            return Ok(Some((material, ResolvedVia::General)));
        }

        Ok(None)
    }

    /// 只读解析，未命中返回 NotFound
    pub fn resolve<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
    ) -> EngineResult<Material> {
        self.lookup(store, raw_text, spec)?
            .map(|(material, _)| material)
            .ok_or_else(|| EngineError::not_found("material", describe_spec(spec)))
    }

    /// 解析，未命中时新建通用材料
    ///
    /// # 参数
    /// - raw_text: 原始规格文本（别名匹配用）
    /// - spec: 解析后的规格
    /// - part_number: 新建时记录的追溯品号
    pub fn resolve_or_create<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
        part_number: Option<&str>,
    ) -> EngineResult<Resolution> {
        if let Some((material, via)) = self.lookup(store, raw_text, spec)? {
            return Ok(Resolution {
                material,
                created: false,
                via,
            });
        }

        self.create_general(store, raw_text, spec, part_number, None)
    }

    /// 新建通用材料（不做前置匹配）
    ///
    /// # 参数
    /// - density: 显式密度；None 时按牌号/密度表推算
    pub fn create_general<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
        part_number: Option<&str>,
        density: Option<f64>,
    ) -> EngineResult<Resolution> {
        ensure_catalogable(spec)?;
        ensure_density(density)?;

        let (derived_density, product_id) = self.density_and_product(store, spec)?;
        let new = NewMaterial {
            family_name: spec.family_name.clone(),
            shape: spec.shape,
            dimension_mm: spec.dimension_mm,
            density: density.unwrap_or(derived_density),
            usage_type: UsageType::General,
            dedicated_part_number: None,
            part_number: part_number.map(str::to_string),
            product_id,
        };

        self.create_or_adopt(store, raw_text, spec, &new)
    }

    /// 新建材料；唯一索引冲突时重查一次并返回已存在的记录
    fn create_or_adopt<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
        new: &NewMaterial,
    ) -> EngineResult<Resolution> {
        match store.create_material(new) {
            Ok(material) => {
                info!(
                    material_id = material.id,
                    family_name = %material.family_name,
                    shape = %material.shape,
                    dimension_mm = ?material.dimension_mm,
                    usage_type = %material.usage_type,
                    density = material.density,
                    "新建材料"
                );
                Ok(Resolution {
                    material,
                    created: true,
                    via: ResolvedVia::Created,
                })
            }
            Err(RepositoryError::UniqueConstraintViolation(msg)) => {
                warn!(family_name = %new.family_name, error = %msg, "材料已被并发创建，重新查询");
                match self.lookup_exact(store, raw_text, spec, new)? {
                    Some((material, via)) => Ok(Resolution {
                        material,
                        created: false,
                        via,
                    }),
                    None => Err(RepositoryError::UniqueConstraintViolation(msg).into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    fn lookup_exact<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: Option<&str>,
        spec: &MaterialSpec,
        new: &NewMaterial,
    ) -> EngineResult<Option<(Material, ResolvedVia)>> {
        match new.usage_type {
            UsageType::General => self.lookup(store, raw_text, spec),
            UsageType::Dedicated => {
                let part = new.dedicated_part_number.as_deref().unwrap_or_default();
                let filter = MaterialFilter::geometry(&new.family_name, new.shape, new.dimension_mm)
                    .dedicated(part);
                Ok(store
                    .find_materials(&filter)?
                    .into_iter()
                    .next()
                    .map(|m| (m, ResolvedVia::Dedicated)))
            }
        }
    }

    /// 新建材料密度
    ///
    /// # 规则
    /// 1. 同名牌号（grade_code == family_name）带密度 → 用牌号密度
    /// 2. 否则密度表最长前缀
    /// 3. 否则默认钢材密度
    pub fn density_for<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        family_name: &str,
    ) -> EngineResult<f64> {
        if let Some(density) = store
            .find_grade_by_code(family_name)?
            .and_then(|grade| grade.density)
        {
            return Ok(density);
        }
        Ok(self.density_table.lookup(family_name))
    }

    fn density_and_product<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        spec: &MaterialSpec,
    ) -> EngineResult<(f64, Option<i64>)> {
        let grade = store.find_grade_by_code(&spec.family_name)?;
        let density = match grade.as_ref().and_then(|g| g.density) {
            Some(d) => d,
            None => self.density_table.lookup(&spec.family_name),
        };
        let product_id = match &grade {
            Some(g) => store
                .find_product(g.id, spec.shape, spec.dimension_mm)?
                .map(|p| p.id),
            None => None,
        };
        Ok((density, product_id))
    }

    // ==========================================
    // 目录维护
    // ==========================================

    /// 登记别名
    ///
    /// # 返回
    /// - 同一别名已指向同一材料 → 返回已有记录（幂等）
    /// - 已指向其他材料 → CatalogConflict
    pub fn register_alias<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        alias_text: &str,
        material_id: i64,
    ) -> EngineResult<MaterialAlias> {
        let key = normalize_alias_key(alias_text);
        if key.is_empty() {
            return Err(EngineError::BusinessRuleViolation("别名不能为空".to_string()));
        }
        if store.get_material(material_id)?.is_none() {
            return Err(EngineError::not_found("material", material_id));
        }

        if let Some(existing) = store.find_alias(&key)? {
            return check_alias_target(existing, material_id);
        }

        match store.insert_alias(&key, material_id) {
            Ok(alias) => {
                info!(alias = %key, material_id, "登记别名");
                Ok(alias)
            }
            Err(RepositoryError::UniqueConstraintViolation(msg)) => match store.find_alias(&key)? {
                Some(existing) => check_alias_target(existing, material_id),
                None => Err(RepositoryError::UniqueConstraintViolation(msg).into()),
            },
            Err(e) => Err(e.into()),
        }
    }

    /// 材料的全部别名（按登记顺序）
    pub fn aliases_of<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        material_id: i64,
    ) -> EngineResult<Vec<MaterialAlias>> {
        if store.get_material(material_id)?.is_none() {
            return Err(EngineError::not_found("material", material_id));
        }
        Ok(store.list_aliases_for_material(material_id)?)
    }

    /// 专用材料建档（已存在则直接返回）
    ///
    /// # 参数
    /// - density: 显式密度；None 时按牌号/密度表推算
    pub fn create_dedicated<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        spec: &MaterialSpec,
        dedicated_part_number: &str,
        density: Option<f64>,
    ) -> EngineResult<Resolution> {
        ensure_catalogable(spec)?;
        let part = dedicated_part_number.trim();
        if part.is_empty() {
            return Err(EngineError::BusinessRuleViolation(
                "专用材料必须指定专用品号".to_string(),
            ));
        }
        ensure_density(density)?;

        let filter = MaterialFilter::geometry(&spec.family_name, spec.shape, spec.dimension_mm)
            .dedicated(part);
        if let Some(material) = store.find_materials(&filter)?.into_iter().next() {
            return Ok(Resolution {
                material,
                created: false,
                via: ResolvedVia::Dedicated,
            });
        }

        let (derived_density, product_id) = self.density_and_product(store, spec)?;
        let new = NewMaterial {
            family_name: spec.family_name.clone(),
            shape: spec.shape,
            dimension_mm: spec.dimension_mm,
            density: density.unwrap_or(derived_density),
            usage_type: UsageType::Dedicated,
            dedicated_part_number: Some(part.to_string()),
            part_number: Some(part.to_string()),
            product_id,
        };
        let spec = spec.clone().with_dedicated_part(part);
        self.create_or_adopt(store, None, &spec, &new)
    }

    /// 逻辑删除材料
    pub fn deactivate_material<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        material_id: i64,
    ) -> EngineResult<()> {
        let material = store
            .get_material(material_id)?
            .ok_or_else(|| EngineError::not_found("material", material_id))?;
        if !material.is_active {
            return Ok(());
        }
        store.set_material_active(material_id, false)?;
        info!(material_id, family_name = %material.family_name, "材料已停用");
        Ok(())
    }

    pub fn add_standard<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        code: &str,
        name: Option<&str>,
    ) -> EngineResult<MaterialStandard> {
        let code = code.trim();
        if code.is_empty() {
            return Err(EngineError::BusinessRuleViolation("标准代码不能为空".to_string()));
        }
        Ok(store.create_standard(code, name)?)
    }

    /// 新增牌号（代码按牌号归一为大写）
    pub fn add_grade<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        standard_id: i64,
        grade_code: &str,
        density: Option<f64>,
    ) -> EngineResult<MaterialGrade> {
        let code = grade_code.trim().to_uppercase();
        if code.is_empty() {
            return Err(EngineError::BusinessRuleViolation("牌号代码不能为空".to_string()));
        }
        ensure_density(density)?;
        Ok(store.create_grade(standard_id, &code, density)?)
    }

    pub fn add_product<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        grade_id: i64,
        shape: Shape,
        dimension_mm: Option<f64>,
        name: Option<&str>,
    ) -> EngineResult<MaterialProduct> {
        if !shape.is_known() {
            return Err(EngineError::BusinessRuleViolation("产品形状不能为未知".to_string()));
        }
        Ok(store.create_product(grade_id, shape, dimension_mm, name)?)
    }

    // ==========================================
    // 行级入口
    // ==========================================

    /// 别名 → 解析 → 匹配，产出行结果
    ///
    /// # 参数
    /// - allow_create: true 时未命中即建档，false 时返回 Unmatched
    ///
    /// # 返回
    /// - Ok(RowOutcome): 行级错误已折叠为 Failed
    /// - Err: 仅存储故障
    pub fn resolve_text<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        row_number: usize,
        raw_text: &str,
        part_number: Option<&str>,
        allow_create: bool,
    ) -> EngineResult<RowOutcome> {
        let result = self.resolve_text_inner(store, raw_text, part_number, allow_create);
        match result {
            Ok((kind, warnings)) => {
                Ok(RowOutcome::new(row_number, raw_text, kind).with_warnings(warnings))
            }
            Err(e) if e.is_row_level() => {
                warn!(row_number, raw_text, error = %e, "行处理失败");
                Ok(RowOutcome::failed(row_number, raw_text, &e))
            }
            Err(e) => Err(e),
        }
    }

    /// # 返回
    /// - (结果, 解析告警)；降级告警已写入 DegradedParse，不重复携带
    fn resolve_text_inner<S: CatalogStore + ?Sized>(
        &self,
        store: &S,
        raw_text: &str,
        part_number: Option<&str>,
        allow_create: bool,
    ) -> EngineResult<(RowOutcomeKind, Vec<String>)> {
        let parsed = self.parser.parse(raw_text);

        // 别名优先于解析结果（降级文本也可能有别名）
        if let Some((material, _)) = self.lookup(store, Some(raw_text), &parsed.spec)? {
            let kind = RowOutcomeKind::Resolved {
                material,
                created: false,
            };
            return Ok((kind, Vec::new()));
        }

        if parsed.is_degraded() {
            let kind = RowOutcomeKind::DegradedParse {
                warning: parsed.warnings.join("; "),
                spec: parsed.spec,
            };
            return Ok((kind, Vec::new()));
        }

        let kind = if allow_create {
            let resolution = self.resolve_or_create(store, Some(raw_text), &parsed.spec, part_number)?;
            RowOutcomeKind::Resolved {
                material: resolution.material,
                created: resolution.created,
            }
        } else {
            RowOutcomeKind::Unmatched { spec: parsed.spec }
        };
        Ok((kind, parsed.warnings))
    }
}

fn ensure_catalogable(spec: &MaterialSpec) -> EngineResult<()> {
    if spec.is_catalogable() {
        Ok(())
    } else {
        Err(EngineError::ParseDegraded(describe_spec(spec)))
    }
}

fn ensure_density(density: Option<f64>) -> EngineResult<()> {
    match density {
        Some(d) if !d.is_finite() || d <= 0.0 => Err(EngineError::invalid_input(
            "density",
            format!("必须为有限正数: {}", d),
        )),
        _ => Ok(()),
    }
}

fn check_alias_target(existing: MaterialAlias, material_id: i64) -> EngineResult<MaterialAlias> {
    if existing.material_id == material_id {
        Ok(existing)
    } else {
        Err(EngineError::CatalogConflict {
            alias: existing.alias_text,
            existing_material_id: existing.material_id,
            requested_material_id: material_id,
        })
    }
}

fn describe_spec(spec: &MaterialSpec) -> String {
    let dimension = spec
        .dimension_mm
        .map(|d| d.to_string())
        .unwrap_or_else(|| "-".to_string());
    match &spec.dedicated_part_number {
        Some(part) => format!("{} {} {} ({})", spec.family_name, spec.shape, dimension, part),
        None => format!("{} {} {}", spec.family_name, spec.shape, dimension),
    }
}
