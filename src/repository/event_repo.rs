// ==========================================
// 奢品物流运营控制台 - 审计事件仓储
// ==========================================
// 红线: 所有状态转换必须落事件
// 幂等: request_id 上的部分唯一索引保证同一发布请求只落一条事件
// ==========================================

use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

use crate::domain::event::{OpsEvent, OpsEventType};
use crate::repository::error::{RepositoryError, RepositoryResult};

const TS_FMT: &str = "%Y-%m-%d %H:%M:%S";

/// 在给定连接 (通常为事务内) 插入事件
///
/// 幂等键冲突映射为 `DuplicateRequestId`,供上层识别重放。
pub(crate) fn insert_event_with_conn(conn: &Connection, event: &OpsEvent) -> RepositoryResult<()> {
    let result = conn.execute(
        r#"INSERT INTO ops_event (
            event_id, event_type, doc_type, scope, version_id, version_no,
            actor, effective_at, before_json, after_json,
            correlation_id, request_id, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        params![
            &event.event_id,
            event.event_type.as_str(),
            &event.doc_type,
            &event.scope,
            &event.version_id,
            &event.version_no,
            &event.actor,
            &event.effective_at.format(TS_FMT).to_string(),
            &event.before_json.as_ref().map(|v| v.to_string()),
            &event.after_json.as_ref().map(|v| v.to_string()),
            &event.correlation_id,
            &event.request_id,
            &event.created_at.format(TS_FMT).to_string(),
        ],
    );

    match result {
        Ok(_) => Ok(()),
        Err(e) => {
            let msg = e.to_string();
            if msg.contains("UNIQUE") && msg.contains("request_id") {
                Err(RepositoryError::DuplicateRequestId(
                    event.request_id.clone().unwrap_or_default(),
                ))
            } else {
                Err(e.into())
            }
        }
    }
}

// ==========================================
// EventLogRepository - 审计事件仓储
// ==========================================
pub struct EventLogRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EventLogRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 插入事件 (独立事务)
    pub fn insert(&self, event: &OpsEvent) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_event_with_conn(&conn, event)
    }

    /// 按幂等键查询事件 (发布重放识别)
    pub fn find_by_request_id(&self, request_id: &str) -> RepositoryResult<Option<OpsEvent>> {
        let conn = self.get_conn()?;
        let event = conn
            .query_row(
                &format!("{} WHERE request_id = ?", SELECT_EVENT),
                params![request_id],
                map_row,
            )
            .optional()?;
        Ok(event)
    }

    /// 查询作用域的审计轨迹 (新事件在前)
    pub fn list_by_scope(
        &self,
        doc_type: &str,
        scope: &str,
        limit: usize,
    ) -> RepositoryResult<Vec<OpsEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "{} WHERE doc_type = ? AND scope = ? ORDER BY created_at DESC, event_id LIMIT ?",
            SELECT_EVENT
        ))?;
        let events = stmt
            .query_map(params![doc_type, scope, limit as i64], map_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(events)
    }
}

// ==========================================
// 行映射
// ==========================================

const SELECT_EVENT: &str = r#"SELECT event_id, event_type, doc_type, scope, version_id, version_no,
       actor, effective_at, before_json, after_json, correlation_id, request_id, created_at
FROM ops_event"#;

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<OpsEvent> {
    let event_type_str: String = row.get(1)?;
    let effective_at_str: String = row.get(7)?;
    let before_json: Option<String> = row.get(8)?;
    let after_json: Option<String> = row.get(9)?;
    let created_at_str: String = row.get(12)?;

    Ok(OpsEvent {
        event_id: row.get(0)?,
        event_type: OpsEventType::from_str(&event_type_str).unwrap_or(OpsEventType::CapacityChanged),
        doc_type: row.get(2)?,
        scope: row.get(3)?,
        version_id: row.get(4)?,
        version_no: row.get(5)?,
        actor: row.get(6)?,
        effective_at: parse_ts(&effective_at_str, 7)?,
        before_json: before_json.and_then(|s| serde_json::from_str(&s).ok()),
        after_json: after_json.and_then(|s| serde_json::from_str(&s).ok()),
        correlation_id: row.get(10)?,
        request_id: row.get(11)?,
        created_at: parse_ts(&created_at_str, 12)?,
    })
}

fn parse_ts(s: &str, col: usize) -> rusqlite::Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FMT).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(col, rusqlite::types::Type::Text, Box::new(e))
    })
}
