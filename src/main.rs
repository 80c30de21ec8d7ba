// ==========================================
// 棒材库存管理系统 - 批量导入入口
// ==========================================
// 用法:
//   bar-stock [--db PATH] [--json-log] [--read-only] FILE...
//
// 每个文件逐行解析、匹配目录（默认未命中即建档），
// 行结果与汇总以 JSON 输出到 stdout，日志走 stderr。
// ==========================================

use anyhow::{anyhow, bail, Context};
use bar_stock::config::ConfigManager;
use bar_stock::db::get_default_db_path;
use bar_stock::engine::CatalogResolver;
use bar_stock::importer::{CatalogImport, CatalogImporter};
use bar_stock::{logging, SqliteStore};
use std::path::PathBuf;
use std::sync::Arc;

struct CliArgs {
    db_path: String,
    json_log: bool,
    read_only: bool,
    files: Vec<PathBuf>,
}

fn parse_args() -> anyhow::Result<CliArgs> {
    let mut db_path = None;
    let mut json_log = false;
    let mut read_only = false;
    let mut files = Vec::new();

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--db" => {
                db_path = Some(args.next().context("--db 需要指定数据库路径")?);
            }
            "--json-log" => json_log = true,
            "--read-only" => read_only = true,
            "-h" | "--help" => {
                println!("用法: bar-stock [--db PATH] [--json-log] [--read-only] FILE...");
                std::process::exit(0);
            }
            flag if flag.starts_with("--") => bail!("未知参数: {}", flag),
            file => files.push(PathBuf::from(file)),
        }
    }

    if files.is_empty() {
        bail!("至少需要一个导入文件（.csv/.xlsx/.xls）");
    }

    Ok(CliArgs {
        db_path: db_path.unwrap_or_else(get_default_db_path),
        json_log,
        read_only,
        files,
    })
}

fn main() -> anyhow::Result<()> {
    let args = parse_args()?;
    logging::init(args.json_log);

    tracing::info!("==================================================");
    tracing::info!("{} v{}", bar_stock::APP_NAME, bar_stock::VERSION);
    tracing::info!("==================================================");
    tracing::info!(db_path = %args.db_path, files = args.files.len(), "使用数据库");

    let store = SqliteStore::open(&args.db_path)
        .with_context(|| format!("无法打开数据库: {}", args.db_path))?;
    let engine_config = ConfigManager::new(&args.db_path)
        .and_then(|manager| manager.load_engine_config())
        .map_err(|e| anyhow!("加载配置失败: {}", e))?;

    let resolver = Arc::new(CatalogResolver::from_config(&engine_config));
    let importer = CatalogImporter::new(store, resolver, !args.read_only);

    let runtime = tokio::runtime::Runtime::new().context("无法创建 tokio 运行时")?;
    let results = runtime.block_on(importer.batch_import(args.files))?;

    let mut failed_files = 0;
    for result in &results {
        match result {
            Ok(report) => println!("{}", serde_json::to_string(report)?),
            Err(message) => {
                failed_files += 1;
                println!("{}", serde_json::json!({ "error": message }));
            }
        }
    }

    if failed_files > 0 {
        bail!("{} 个文件导入失败", failed_files);
    }
    Ok(())
}
