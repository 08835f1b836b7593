// ==========================================
// 奢品物流运营控制台 - 审批请求领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.4 审批工作流
// 规则: 保护降级变更必须由两个不同角色签署后方可发布
// ==========================================

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

use crate::domain::types::ApprovalStatus;

/// 审批请求 TTL (小时): 超时未完成签署即失效,需重新发起发布流程
pub const APPROVAL_TTL_HOURS: i64 = 72;

// ==========================================
// RoleSignoff - 角色签署
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleSignoff {
    pub role: String,                        // 要求的审批角色
    pub approver: Option<String>,            // 签署人身份 (邮箱)
    pub approved_at: Option<NaiveDateTime>,  // 签署时间
}

impl RoleSignoff {
    pub fn pending(role: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            approver: None,
            approved_at: None,
        }
    }

    pub fn is_signed(&self) -> bool {
        self.approved_at.is_some()
    }
}

// ==========================================
// ApprovalRequest - 审批请求
// ==========================================
// 仅在存在保护降级守护命中时创建; 发布在 PENDING 期间被挂起
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApprovalRequest {
    pub request_id: String,
    pub doc_type: String,               // 关联文档类型 (db 字符串)
    pub scope: String,                  // 关联作用域
    pub version_id: String,             // 待发布版本
    pub requested_by: String,
    pub requested_at: NaiveDateTime,
    pub reason: String,
    pub signoffs: Vec<RoleSignoff>,     // 要求的角色及其签署情况
    pub status: ApprovalStatus,
    pub rejected_by: Option<String>,    // 拒绝人 (status=REJECTED 时)
    pub revision: i32,                  // 乐观锁修订号
}

impl ApprovalRequest {
    /// 失效时间 = 发起时间 + TTL
    pub fn expires_at(&self) -> NaiveDateTime {
        self.requested_at + Duration::hours(APPROVAL_TTL_HOURS)
    }

    /// 按当前时间判定是否已超时 (仅对 PENDING 有意义)
    pub fn is_expired(&self, now: NaiveDateTime) -> bool {
        self.status == ApprovalStatus::Pending && now >= self.expires_at()
    }

    /// 是否全部要求角色均已签署
    pub fn all_roles_signed(&self) -> bool {
        !self.signoffs.is_empty() && self.signoffs.iter().all(RoleSignoff::is_signed)
    }

    /// 有效审批: 状态为 APPROVED 才允许发布继续
    pub fn is_granted(&self) -> bool {
        self.status == ApprovalStatus::Approved
    }
}
