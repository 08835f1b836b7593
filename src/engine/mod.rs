// ==========================================
// 奢品物流运营控制台 - 业务规则引擎层
// ==========================================
// 红线: 引擎层不写 SQL; 计算与校验为纯函数,
//       状态转换通过仓储的事务原语完成
// ==========================================

pub mod approval;
pub mod calculator;
pub mod events;
pub mod export;
pub mod guards;
pub mod lifecycle;
pub mod simulation;

pub use approval::{ApprovalWorkflow, DEFAULT_APPROVAL_ROLES};
pub use calculator::CapacityCalculator;
pub use events::{NoOpEventRecorder, OptionalEventRecorder, PolicyEventRecorder};
pub use export::{utilization_csv_string, write_utilization_csv};
pub use guards::{GuardValidator, OVERBOOKING_PERCENT_MAX, RUSH_BUCKET_PERCENT_MAX};
pub use lifecycle::{PolicyVersionManager, PublishCommand, PublishOutcome};
pub use simulation::{
    SampleShipment, SimulationEngine, SimulationResult, SimulationSummary, AT_RISK_MAJORITY_PERCENT,
};
