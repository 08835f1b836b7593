// ==========================================
// 奢品物流运营控制台 - 审批请求仓储
// ==========================================
// 红线: Repository 不含业务逻辑; 签署规则在 ApprovalWorkflow
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::approval::{ApprovalRequest, RoleSignoff};
use crate::domain::types::ApprovalStatus;
use crate::repository::error::{RepositoryError, RepositoryResult};

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

// ==========================================
// ApprovalRepository - 审批请求仓储
// ==========================================
pub struct ApprovalRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ApprovalRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 创建审批请求
    pub fn create(&self, request: &ApprovalRequest) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT INTO approval_request (
                request_id, doc_type, scope, version_id, requested_by,
                requested_at, reason, signoffs_json, status, rejected_by, revision
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &request.request_id,
                &request.doc_type,
                &request.scope,
                &request.version_id,
                &request.requested_by,
                &request.requested_at.format(TS_FMT).to_string(),
                &request.reason,
                serde_json::to_string(&request.signoffs)?,
                request.status.to_db_str(),
                &request.rejected_by,
                &request.revision,
            ],
        )?;
        Ok(request.request_id.clone())
    }

    /// 按 request_id 查询审批请求
    pub fn find_by_id(&self, request_id: &str) -> RepositoryResult<Option<ApprovalRequest>> {
        let conn = self.get_conn()?;
        let request = conn
            .query_row(
                &format!("{} WHERE request_id = ?", SELECT_REQUEST),
                params![request_id],
                map_row,
            )
            .optional()?;
        Ok(request)
    }

    /// 查询某版本的最近一次审批请求
    pub fn find_latest_for_version(
        &self,
        version_id: &str,
    ) -> RepositoryResult<Option<ApprovalRequest>> {
        let conn = self.get_conn()?;
        let request = conn
            .query_row(
                &format!(
                    "{} WHERE version_id = ? ORDER BY requested_at DESC, request_id LIMIT 1",
                    SELECT_REQUEST
                ),
                params![version_id],
                map_row,
            )
            .optional()?;
        Ok(request)
    }

    /// 更新审批请求 (带乐观锁检查)
    ///
    /// # 错误
    /// - `RepositoryError::OptimisticLockFailure`: revision 不匹配
    /// - `RepositoryError::NotFound`: request_id 不存在
    pub fn update(&self, request: &ApprovalRequest) -> RepositoryResult<()> {
        let conn = self.get_conn()?;

        let rows_affected = conn.execute(
            r#"UPDATE approval_request
               SET signoffs_json = ?, status = ?, rejected_by = ?, revision = revision + 1
               WHERE request_id = ? AND revision = ?"#,
            params![
                serde_json::to_string(&request.signoffs)?,
                request.status.to_db_str(),
                &request.rejected_by,
                &request.request_id,
                &request.revision,
            ],
        )?;

        if rows_affected == 0 {
            let exists: Result<i32, _> = conn.query_row(
                "SELECT revision FROM approval_request WHERE request_id = ?",
                params![&request.request_id],
                |row| row.get(0),
            );

            return match exists {
                Ok(actual_revision) => Err(RepositoryError::OptimisticLockFailure {
                    id: request.request_id.clone(),
                    expected: request.revision,
                    actual: actual_revision,
                }),
                Err(_) => Err(RepositoryError::NotFound {
                    entity: "ApprovalRequest".to_string(),
                    id: request.request_id.clone(),
                }),
            };
        }

        Ok(())
    }
}

// ==========================================
// 行映射
// ==========================================

const SELECT_REQUEST: &str = r#"SELECT request_id, doc_type, scope, version_id, requested_by,
       requested_at, reason, signoffs_json, status, rejected_by, revision
FROM approval_request"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<ApprovalRequest> {
    let requested_at_str: String = row.get(5)?;
    let signoffs_json: String = row.get(7)?;
    let status_str: String = row.get(8)?;

    let signoffs: Vec<RoleSignoff> = serde_json::from_str(&signoffs_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(ApprovalRequest {
        request_id: row.get(0)?,
        doc_type: row.get(1)?,
        scope: row.get(2)?,
        version_id: row.get(3)?,
        requested_by: row.get(4)?,
        requested_at: NaiveDateTime::parse_from_str(&requested_at_str, TS_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?,
        reason: row.get(6)?,
        signoffs,
        status: ApprovalStatus::from_str(&status_str),
        rejected_by: row.get(9)?,
        revision: row.get(10)?,
    })
}
