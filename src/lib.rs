// ==========================================
// 奢品物流运营控制台 - 产能与策略引擎核心库
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md
// 技术栈: Rust + SQLite
// 系统定位: 决策支持引擎 (人工最终控制权)
// ==========================================

// ==========================================
// 模块声明
// ==========================================

// 领域层 - 实体与类型
pub mod domain;

// 数据仓储层 - 数据访问
pub mod repository;

// 引擎层 - 业务规则
pub mod engine;

// 数据库基础设施 (连接初始化/PRAGMA 统一)
pub mod db;

// 日志系统
pub mod logging;

// API 层 - 业务接口
pub mod api;

// ==========================================
// 重导出核心类型
// ==========================================

// 领域类型
pub use domain::types::{
    ApprovalStatus, DocType, GuardSeverity, GuardType, Lane, PolicyState, ReservationType, Tier,
};

// 领域实体
pub use domain::{
    ApprovalRequest, CalculationResult, CapacityProfile, DayCapacity, DayLoad, Guard,
    MarginThresholds, OpsEvent, OpsEventType, Reservation, RoleSignoff, SlaMarginPolicy,
    SlaTargets, VersionRecord,
};

// 引擎
pub use engine::{
    ApprovalWorkflow, CapacityCalculator, GuardValidator, NoOpEventRecorder,
    OptionalEventRecorder, PolicyEventRecorder, PolicyVersionManager, PublishCommand,
    PublishOutcome, SampleShipment, SimulationEngine, SimulationResult, SimulationSummary,
};

// API
pub use api::{ApiError, ApiResult, CapacityApi, PolicyApi};

// ==========================================
// 常量定义
// ==========================================

// 系统版本
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

// 系统名称
pub const APP_NAME: &str = "奢品物流运营控制台 - 产能与策略引擎";

// ==========================================
// 预编译检查
// ==========================================
