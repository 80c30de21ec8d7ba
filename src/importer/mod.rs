// ==========================================
// 棒材库存管理系统 - 导入层
// ==========================================
// 职责: 外部表格行 → 引擎输入，批量产出行结果
// 支持: Excel, CSV
// 红线: 引擎不依赖本层；本层只经引擎访问目录
// ==========================================

// 模块声明
pub mod catalog_importer;
pub mod data_cleaner;
pub mod error;
pub mod field_mapper;
pub mod file_parser;

// 重导出核心类型
pub use catalog_importer::{CatalogImport, CatalogImporter, FileImportReport, OrderDraft};
pub use data_cleaner::{DataCleaner, QuantityCell};
pub use error::{ImportError, ImportResult};
pub use field_mapper::{CatalogRow, FieldMapper, OrderLineRow};
pub use file_parser::{CsvParser, ExcelParser, FileParser, NumberedRow, RawRow, UniversalFileParser};
