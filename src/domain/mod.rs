// ==========================================
// 奢品物流运营控制台 - 领域层
// ==========================================
// 职责: 实体与类型定义,不含持久化与业务编排
// ==========================================

pub mod approval;
pub mod capacity;
pub mod event;
pub mod guard;
pub mod policy;
pub mod reservation;
pub mod types;
pub mod version;

// 重导出核心实体
pub use approval::{ApprovalRequest, RoleSignoff, APPROVAL_TTL_HOURS};
pub use capacity::{CalculationResult, CapacityProfile, DayCapacity, DayLoad};
pub use event::{OpsEvent, OpsEventType};
pub use guard::{blocking_guards, has_blocking, protection_lowering_present, Guard};
pub use policy::{
    protection_lowering_changes, MarginThresholds, ProtectedField, SlaMarginPolicy, SlaTargets,
    UnsafeDirection, PROTECTED_POLICY_FIELDS,
};
pub use reservation::Reservation;
pub use version::VersionRecord;
