// ==========================================
// 奢品物流运营控制台 - 版本记录领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.3 版本生命周期
// 用途: 产能档案与 SLA/毛利策略共用的版本化存储信封
// ==========================================

use chrono::NaiveDateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::domain::types::{DocType, PolicyState};

// ==========================================
// VersionRecord - 版本记录 (存储信封)
// ==========================================
// 不变量: 每个 (doc_type, scope) 同一时刻只能有一个 PUBLISHED 版本,
//         由 active_version 指针表的 CAS 保证
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionRecord {
    pub version_id: String,         // 版本ID (UUID)
    pub doc_type: DocType,          // 文档类型
    pub scope: String,              // 作用域 (枢纽代码 / "GLOBAL")
    pub version_no: i32,            // 版本号 (作用域内单调递增)
    pub state: PolicyState,         // 生命周期状态
    pub effective_at: Option<NaiveDateTime>, // 排期生效时间 (SCHEDULED 必填)
    pub payload_json: String,       // 文档快照 (JSON)
    pub created_by: String,         // 创建人
    pub change_reason: String,      // 变更原因 (非空)
    pub created_at: NaiveDateTime,  // 创建时间
    pub revision: i32,              // 乐观锁修订号
}

impl VersionRecord {
    pub fn is_draft(&self) -> bool {
        self.state == PolicyState::Draft
    }

    pub fn is_scheduled(&self) -> bool {
        self.state == PolicyState::Scheduled
    }

    pub fn is_published(&self) -> bool {
        self.state == PolicyState::Published
    }

    /// 反序列化文档载荷 (CapacityProfile / SlaMarginPolicy)
    pub fn decode_payload<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.payload_json)
    }
}
