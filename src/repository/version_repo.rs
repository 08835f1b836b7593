// ==========================================
// 奢品物流运营控制台 - 版本记录仓储
// ==========================================
// 红线: Repository 不含业务判断; 状态机校验在引擎层,
//       本层只负责事务原子性与并发控制 (CAS + 乐观锁)
// ==========================================

use chrono::{Local, NaiveDateTime};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::event::OpsEvent;
use crate::domain::types::{DocType, PolicyState};
use crate::domain::version::VersionRecord;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::event_repo::insert_event_with_conn;

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// VersionRepository - 版本记录仓储
// ==========================================
pub struct VersionRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VersionRepository {
    /// 创建新的 VersionRepository 实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// 获取数据库连接
    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建版本 (自动分配 version_no,避免并发下版本号冲突)
    ///
    /// 说明:
    /// - 在同一事务内查询 MAX(version_no) 并写入,保证对同一 (doc_type, scope)
    ///   的 version_no 分配原子性。
    /// - 该方法会覆盖传入的 `record.version_no`。
    pub fn create_with_next_version_no(&self, record: &mut VersionRecord) -> RepositoryResult<String> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let max_version_no: Option<i32> = tx.query_row(
            "SELECT MAX(version_no) FROM version_record WHERE doc_type = ? AND scope = ?",
            params![record.doc_type.to_db_str(), &record.scope],
            |row| row.get(0),
        )?;

        record.version_no = max_version_no.unwrap_or(0) + 1;

        tx.execute(
            r#"INSERT INTO version_record (
                version_id, doc_type, scope, version_no, state,
                effective_at, payload_json, created_by, change_reason,
                created_at, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &record.version_id,
                record.doc_type.to_db_str(),
                &record.scope,
                &record.version_no,
                record.state.to_db_str(),
                &record.effective_at.map(|t| t.format(TS_FMT).to_string()),
                &record.payload_json,
                &record.created_by,
                &record.change_reason,
                &record.created_at.format(TS_FMT).to_string(),
                &record.revision,
            ],
        )?;

        tx.commit()?;
        Ok(record.version_id.clone())
    }

    /// 按 version_id 查询版本
    pub fn find_by_id(&self, version_id: &str) -> RepositoryResult<Option<VersionRecord>> {
        let conn = self.get_conn()?;
        Self::find_by_id_with_conn(&conn, version_id)
    }

    fn find_by_id_with_conn(
        conn: &Connection,
        version_id: &str,
    ) -> RepositoryResult<Option<VersionRecord>> {
        let record = conn
            .query_row(
                &format!("{} WHERE version_id = ?", SELECT_RECORD),
                params![version_id],
                map_row,
            )
            .optional()?;
        Ok(record)
    }

    /// 查询作用域的全部版本 (新版本在前)
    pub fn list_by_scope(&self, doc_type: DocType, scope: &str) -> RepositoryResult<Vec<VersionRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE doc_type = ? AND scope = ? ORDER BY version_no DESC",
            SELECT_RECORD
        ))?;
        let records = stmt
            .query_map(params![doc_type.to_db_str(), scope], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// 读取激活指针 (当前发布版本ID)
    pub fn active_version_id(&self, doc_type: DocType, scope: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        Self::active_pointer_with_conn(&conn, doc_type, scope)
    }

    fn active_pointer_with_conn(
        conn: &Connection,
        doc_type: DocType,
        scope: &str,
    ) -> RepositoryResult<Option<String>> {
        let pointer: Option<Option<String>> = conn
            .query_row(
                "SELECT version_id FROM active_version WHERE doc_type = ? AND scope = ?",
                params![doc_type.to_db_str(), scope],
                |row| row.get(0),
            )
            .optional()?;
        Ok(pointer.flatten())
    }

    /// 查询当前发布版本记录
    pub fn find_active(&self, doc_type: DocType, scope: &str) -> RepositoryResult<Option<VersionRecord>> {
        let conn = self.get_conn()?;
        let pointer = Self::active_pointer_with_conn(&conn, doc_type, scope)?;
        match pointer {
            Some(version_id) => Self::find_by_id_with_conn(&conn, &version_id),
            None => Ok(None),
        }
    }

    /// 更新版本 (带乐观锁检查)
    ///
    /// # 并发控制
    /// 使用乐观锁 (revision 字段) 防止并发更新冲突
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配 (其他用户已更新)
    /// - `RepositoryError::NotFound`: version_id 不存在
    pub fn update(&self, record: &VersionRecord) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE version_record
               SET state = ?, effective_at = ?, payload_json = ?,
                   change_reason = ?, revision = revision + 1
               WHERE version_id = ? AND revision = ?"#,
            params![
                record.state.to_db_str(),
                &record.effective_at.map(|t| t.format(TS_FMT).to_string()),
                &record.payload_json,
                &record.change_reason,
                &record.version_id,
                &record.revision,
            ],
        )?;

        if rows_affected == 0 {
            let exists: Result<i32, _> = conn.query_row(
                "SELECT revision FROM version_record WHERE version_id = ?",
                params![&record.version_id],
                |row| row.get(0),
            );

            return match exists {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    id: record.version_id.clone(),
                    expected: record.revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "VersionRecord".to_string(),
                    id: record.version_id.clone(),
                }),
            };
        }

        Ok(())
    }

    /// 发布版本: 激活指针 CAS + 前版本让位 + 新版本置为 PUBLISHED + 事件落账
    ///
    /// # 并发控制
    /// 整个转换在单事务内完成。`expected_current` 是调用方读取守护规则时
    /// 看到的激活版本; 若事务内指针已不等于该值,说明另一个发布先行提交,
    /// 返回 `PublishConflict`,调用方可重试。
    ///
    /// # 事件次序
    /// 事件与状态转换同事务落账: 事务提交前事件已持久入队,满足
    /// "进入下一次转换前上一次事件必须已入队" 的约束。
    pub fn publish_with_event(
        &self,
        version_id: &str,
        expected_current: Option<&str>,
        event: &OpsEvent,
    ) -> RepositoryResult<()> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let record = Self::find_by_id_with_conn(&tx, version_id)?.ok_or_else(|| {
            RepositoryError::NotFound {
                entity: "VersionRecord".to_string(),
                id: version_id.to_string(),
            }
        })?;

        let doc_type = record.doc_type;
        let scope = record.scope.clone();

        // 1. 校验激活指针与调用方所见一致 (CAS 读侧)
        let actual = Self::active_pointer_with_conn(&tx, doc_type, &scope)?;
        if actual.as_deref() != expected_current {
            return Err(RepositoryError::PublishConflict {
                doc_type: doc_type.to_db_str().to_string(),
                scope,
                expected: expected_current.map(|s| s.to_string()),
                actual,
            });
        }

        let now = Local::now().naive_local().format(TS_FMT).to_string();

        // 2. CAS 写侧: 指针行存在则条件更新,否则首次插入
        let pointer_moved = match &actual {
            Some(current_id) => tx.execute(
                r#"UPDATE active_version SET version_id = ?, updated_at = ?
                   WHERE doc_type = ? AND scope = ? AND version_id = ?"#,
                params![version_id, &now, doc_type.to_db_str(), &scope, current_id],
            )?,
            None => tx.execute(
                r#"INSERT INTO active_version (doc_type, scope, version_id, updated_at)
                   VALUES (?, ?, ?, ?)
                   ON CONFLICT (doc_type, scope) DO UPDATE
                       SET version_id = excluded.version_id, updated_at = excluded.updated_at
                       WHERE active_version.version_id IS NULL"#,
                params![doc_type.to_db_str(), &scope, version_id, &now],
            )?,
        };

        if pointer_moved == 0 {
            let latest = Self::active_pointer_with_conn(&tx, doc_type, &scope)?;
            return Err(RepositoryError::PublishConflict {
                doc_type: doc_type.to_db_str().to_string(),
                scope,
                expected: expected_current.map(|s| s.to_string()),
                actual: latest,
            });
        }

        // 3. 前发布版本让位 (published -> rolled_back, 对该版本终态)
        if let Some(previous_id) = &actual {
            tx.execute(
                r#"UPDATE version_record
                   SET state = ?, revision = revision + 1
                   WHERE version_id = ? AND state = ?"#,
                params![
                    PolicyState::RolledBack.to_db_str(),
                    previous_id,
                    PolicyState::Published.to_db_str()
                ],
            )?;
        }

        // 4. 新版本置为 PUBLISHED
        tx.execute(
            r#"UPDATE version_record
               SET state = ?, revision = revision + 1
               WHERE version_id = ?"#,
            params![PolicyState::Published.to_db_str(), version_id],
        )?;

        // 5. 事件落账 (同事务)
        insert_event_with_conn(&tx, event)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(())
    }
}

// ==========================================
// 行映射
// ==========================================

const SELECT_RECORD: &str = r#"SELECT version_id, doc_type, scope, version_no, state,
       effective_at, payload_json, created_by, change_reason, created_at, revision
FROM version_record"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<VersionRecord> {
    let doc_type_str: String = row.get(1)?;
    let state_str: String = row.get(4)?;
    let effective_at: Option<String> = row.get(5)?;
    let created_at_str: String = row.get(9)?;

    Ok(VersionRecord {
        version_id: row.get(0)?,
        doc_type: DocType::from_str(&doc_type_str),
        scope: row.get(2)?,
        version_no: row.get(3)?,
        state: PolicyState::from_str(&state_str),
        effective_at: effective_at.and_then(|s| NaiveDateTime::parse_from_str(&s, TS_FMT).ok()),
        payload_json: row.get(6)?,
        created_by: row.get(7)?,
        change_reason: row.get(8)?,
        created_at: NaiveDateTime::parse_from_str(&created_at_str, TS_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
        })?,
        revision: row.get(10)?,
    })
}
