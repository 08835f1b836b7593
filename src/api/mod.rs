// ==========================================
// 奢品物流运营控制台 - API 层
// ==========================================
// 职责: 提供业务 API 接口,供运营控制台前端调用
// ==========================================

pub mod capacity_api;
pub mod error;
pub mod policy_api;

// 重导出核心类型
pub use capacity_api::CapacityApi;
pub use error::{ApiError, ApiResult};
pub use policy_api::PolicyApi;
