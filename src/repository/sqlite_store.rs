// ==========================================
// 棒材库存管理系统 - SQLite 存储
// ==========================================
// 职责: 持有共享连接，提供只读会话与事务会话
// 并发: Arc<Mutex<Connection>> 串行化同进程内的写入；
//       跨进程依赖 BEGIN IMMEDIATE + busy_timeout
// ==========================================

use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{Connection, Row, Transaction, TransactionBehavior};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

// ==========================================
// SqliteStore - 共享存储句柄
// ==========================================
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// 打开数据库文件并初始化 schema
    pub fn open(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        init_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 内存数据库（测试/试算用）
    pub fn open_in_memory() -> RepositoryResult<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| RepositoryError::DatabaseConnectionError(e.to_string()))?;
        crate::db::configure_sqlite_connection(&conn)?;
        init_schema(&conn)?;
        Ok(Self::from_connection(Arc::new(Mutex::new(conn))))
    }

    /// 从已有连接创建存储实例（不做建表）
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在自动提交模式下执行一组读/写操作
    pub fn session<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreSession<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let conn = self.get_conn()?;
        let session = StoreSession::new(&conn);
        f(&session)
    }

    /// 在单个事务内执行；闭包返回 Err 时整体回滚
    pub fn transaction<T, E, F>(&self, f: F) -> Result<T, E>
    where
        F: FnOnce(&StoreSession<'_>) -> Result<T, E>,
        E: From<RepositoryError>,
    {
        let conn = self.get_conn()?;
        let tx = Transaction::new_unchecked(&conn, TransactionBehavior::Immediate)
            .map_err(RepositoryError::from)?;

        let result = {
            let session = StoreSession::new(&tx);
            f(&session)
        };

        match result {
            Ok(value) => {
                tx.commit()
                    .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
                debug!("事务已提交");
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(error = %rollback_err, "事务回滚失败");
                }
                debug!("事务已回滚");
                Err(err)
            }
        }
    }
}

// ==========================================
// StoreSession - 连接/事务上的会话
// ==========================================
// 实现 CatalogStore / InventoryStore / OrderStore
pub struct StoreSession<'c> {
    pub(crate) conn: &'c Connection,
}

impl<'c> StoreSession<'c> {
    pub fn new(conn: &'c Connection) -> Self {
        Self { conn }
    }
}

// ==========================================
// 行映射辅助函数
// ==========================================

/// 读取枚举字段，未知值转为 FromSqlConversionFailure
pub(crate) fn enum_column<T>(
    row: &Row<'_>,
    idx: usize,
    parse: impl Fn(&str) -> Option<T>,
) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    parse(&raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            format!("未知枚举值: {}", raw).into(),
        )
    })
}

/// 将 query_row 的“无记录”折叠为 None
pub(crate) fn optional_row<T>(result: rusqlite::Result<T>) -> RepositoryResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}
