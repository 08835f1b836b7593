// ==========================================
// 奢品物流运营控制台 - 审计事件领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 6. 外部接口 (事件)
// 红线: 所有状态转换必须落事件 (审计追踪)
// ==========================================

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

// ==========================================
// OpsEventType - 事件类型
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpsEventType {
    CapacityChanged,  // 产能草稿变更
    CapacityPublished, // 产能档案发布
    SlaUpdated,       // SLA 目标变更
    MarginUpdated,    // 毛利阈值变更
    PolicyPublished,  // 策略发布
    PolicyRolledBack, // 策略回滚
}

impl OpsEventType {
    /// 转换为事件总线上的字符串标识
    pub fn as_str(&self) -> &'static str {
        match self {
            OpsEventType::CapacityChanged => "capacity.changed",
            OpsEventType::CapacityPublished => "capacity.published",
            OpsEventType::SlaUpdated => "sla.updated",
            OpsEventType::MarginUpdated => "margin.updated",
            OpsEventType::PolicyPublished => "policy.published",
            OpsEventType::PolicyRolledBack => "policy.rolled_back",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "capacity.changed" => Some(OpsEventType::CapacityChanged),
            "capacity.published" => Some(OpsEventType::CapacityPublished),
            "sla.updated" => Some(OpsEventType::SlaUpdated),
            "margin.updated" => Some(OpsEventType::MarginUpdated),
            "policy.published" => Some(OpsEventType::PolicyPublished),
            "policy.rolled_back" => Some(OpsEventType::PolicyRolledBack),
            _ => None,
        }
    }
}

// ==========================================
// OpsEvent - 审计事件
// ==========================================
// 投递语义: 至少一次; 引擎不等待外部确认,但必须在进入下一次
// 状态转换前完成本次事件的持久化入队 (ops_event 表)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsEvent {
    pub event_id: String,                // 事件ID (UUID)
    pub event_type: OpsEventType,        // 事件类型
    pub doc_type: String,                // 文档类型 (db 字符串)
    pub scope: String,                   // 作用域
    pub version_id: String,              // 关联版本
    pub version_no: i32,                 // 版本号
    pub actor: String,                   // 操作人
    pub effective_at: NaiveDateTime,     // 生效时间
    pub before_json: Option<JsonValue>,  // 变更前快照
    pub after_json: Option<JsonValue>,   // 变更后快照
    pub correlation_id: String,          // 会话/关联标识
    pub request_id: Option<String>,      // 幂等键 (调用方提供, 唯一约束)
    pub created_at: NaiveDateTime,       // 入队时间
}
