// ==========================================
// 奢品物流运营控制台 - SQLite 连接初始化
// ==========================================
// 目标:
// - 统一所有 Connection::open 的 PRAGMA 行为,避免"部分模块外键开启/部分不开启"
// - 统一 busy_timeout,减少并发写入时的偶发 busy 错误
// - 提供引擎所需表的建表入口 (部署脚本与测试共用)
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// 默认 busy_timeout (毫秒)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// 当前代码所期望的 schema_version
pub const CURRENT_SCHEMA_VERSION: i64 = 1;

/// 配置 SQLite 连接的统一 PRAGMA
///
/// 说明:
/// - foreign_keys 需要"每个连接"单独开启
/// - busy_timeout 需要"每个连接"单独配置
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// 打开 SQLite 连接并应用统一配置
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// 读取 schema_version (若表不存在则返回 None)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> =
        conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

/// 初始化引擎所需的全部表结构 (幂等)
///
/// 说明:
/// - reservation 表由上游预订流程写入,这里建表仅为测试与单机部署方便
/// - ops_event.request_id 的部分唯一索引承载发布幂等键
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS version_record (
            version_id TEXT PRIMARY KEY,
            doc_type TEXT NOT NULL,
            scope TEXT NOT NULL,
            version_no INTEGER NOT NULL,
            state TEXT NOT NULL,
            effective_at TEXT,
            payload_json TEXT NOT NULL,
            created_by TEXT NOT NULL,
            change_reason TEXT NOT NULL,
            created_at TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 1,
            UNIQUE (doc_type, scope, version_no)
        );

        CREATE TABLE IF NOT EXISTS active_version (
            doc_type TEXT NOT NULL,
            scope TEXT NOT NULL,
            version_id TEXT,
            updated_at TEXT NOT NULL,
            PRIMARY KEY (doc_type, scope)
        );

        CREATE TABLE IF NOT EXISTS reservation (
            shipment_id TEXT NOT NULL,
            hub_code TEXT NOT NULL,
            lane TEXT NOT NULL,
            res_date TEXT NOT NULL,
            res_type TEXT NOT NULL,
            slots_used INTEGER NOT NULL,
            tier TEXT NOT NULL,
            priority INTEGER NOT NULL DEFAULT 100,
            PRIMARY KEY (shipment_id, lane, res_date)
        );
        CREATE INDEX IF NOT EXISTS idx_reservation_hub_lane_date
            ON reservation (hub_code, lane, res_date);

        CREATE TABLE IF NOT EXISTS approval_request (
            request_id TEXT PRIMARY KEY,
            doc_type TEXT NOT NULL,
            scope TEXT NOT NULL,
            version_id TEXT NOT NULL,
            requested_by TEXT NOT NULL,
            requested_at TEXT NOT NULL,
            reason TEXT NOT NULL,
            signoffs_json TEXT NOT NULL,
            status TEXT NOT NULL,
            rejected_by TEXT,
            revision INTEGER NOT NULL DEFAULT 1
        );
        CREATE INDEX IF NOT EXISTS idx_approval_version
            ON approval_request (version_id);

        CREATE TABLE IF NOT EXISTS ops_event (
            event_id TEXT PRIMARY KEY,
            event_type TEXT NOT NULL,
            doc_type TEXT NOT NULL,
            scope TEXT NOT NULL,
            version_id TEXT NOT NULL,
            version_no INTEGER NOT NULL,
            actor TEXT NOT NULL,
            effective_at TEXT NOT NULL,
            before_json TEXT,
            after_json TEXT,
            correlation_id TEXT NOT NULL,
            request_id TEXT,
            created_at TEXT NOT NULL
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_ops_event_request
            ON ops_event (request_id) WHERE request_id IS NOT NULL;
        CREATE INDEX IF NOT EXISTS idx_ops_event_scope
            ON ops_event (doc_type, scope, created_at);
        "#,
    )?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?)",
        [CURRENT_SCHEMA_VERSION],
    )?;

    Ok(())
}
