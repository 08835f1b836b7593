// ==========================================
// 奢品物流运营控制台 - 领域类型定义
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 3. 数据模型
// 红线: 状态机转换必须显式,不允许隐式默认
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// 策略版本状态 (Policy State)
// ==========================================
// 状态机: draft -> {scheduled, published}
//         scheduled -> {published, draft}
//         published -> rolled_back (对该版本终态)
// 序列化格式: SCREAMING_SNAKE_CASE (与数据库一致)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyState {
    Draft,      // 草稿
    Scheduled,  // 已排期 (等待生效时间)
    Published,  // 已发布 (每个作用域同时只能有一个)
    RolledBack, // 已回滚 (终态,恢复需新建版本)
}

impl fmt::Display for PolicyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl PolicyState {
    /// 从字符串解析状态
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SCHEDULED" => PolicyState::Scheduled,
            "PUBLISHED" => PolicyState::Published,
            "ROLLED_BACK" => PolicyState::RolledBack,
            _ => PolicyState::Draft, // 默认值
        }
    }

    /// 转换为数据库存储的字符串
    pub fn to_db_str(&self) -> &'static str {
        match self {
            PolicyState::Draft => "DRAFT",
            PolicyState::Scheduled => "SCHEDULED",
            PolicyState::Published => "PUBLISHED",
            PolicyState::RolledBack => "ROLLED_BACK",
        }
    }

    /// 判断状态机是否允许 from -> to 的转换
    pub fn can_transition_to(&self, to: PolicyState) -> bool {
        matches!(
            (self, to),
            (PolicyState::Draft, PolicyState::Scheduled)
                | (PolicyState::Draft, PolicyState::Published)
                | (PolicyState::Scheduled, PolicyState::Published)
                | (PolicyState::Scheduled, PolicyState::Draft)
                | (PolicyState::Published, PolicyState::RolledBack)
        )
    }
}

// ==========================================
// 文档类型 (Document Type)
// ==========================================
// 版本仓储按 (doc_type, scope) 管理激活指针
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DocType {
    CapacityProfile, // 枢纽产能档案
    SlaMarginPolicy, // SLA/毛利策略
}

impl fmt::Display for DocType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl DocType {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "SLA_MARGIN_POLICY" => DocType::SlaMarginPolicy,
            _ => DocType::CapacityProfile,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            DocType::CapacityProfile => "CAPACITY_PROFILE",
            DocType::SlaMarginPolicy => "SLA_MARGIN_POLICY",
        }
    }
}

// ==========================================
// 工序通道 (Lane)
// ==========================================
// 枢纽内的处理工序: 鉴定 -> 工艺 -> 质检
// Ord 按工序先后排序 (BTreeMap 键/时长系数表)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Lane {
    Auth,   // 鉴定
    Sewing, // 工艺 (缝制/修复)
    Qa,     // 质检
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl Lane {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "AUTH" => Some(Lane::Auth),
            "SEWING" => Some(Lane::Sewing),
            "QA" => Some(Lane::Qa),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            Lane::Auth => "AUTH",
            Lane::Sewing => "SEWING",
            Lane::Qa => "QA",
        }
    }

    /// 全部工序通道 (遍历用)
    pub fn all() -> [Lane; 3] {
        [Lane::Auth, Lane::Sewing, Lane::Qa]
    }
}

// ==========================================
// 预约类型 (Reservation Type)
// ==========================================
// 生命周期由上游预订流程管理,引擎只读聚合
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReservationType {
    Hold,       // 占位
    Booking,    // 已预订
    InProgress, // 处理中
}

impl fmt::Display for ReservationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ReservationType {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "HOLD" => Some(ReservationType::Hold),
            "BOOKING" => Some(ReservationType::Booking),
            "IN_PROGRESS" => Some(ReservationType::InProgress),
            _ => None,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ReservationType::Hold => "HOLD",
            ReservationType::Booking => "BOOKING",
            ReservationType::InProgress => "IN_PROGRESS",
        }
    }
}

// ==========================================
// 服务等级 (Service Tier)
// ==========================================
// 决定货件经过的工序与 SLA 目标
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Tier {
    T1, // 快速通道 (仅鉴定)
    T2, // 标准 (鉴定+质检)
    T3, // 全工序 (鉴定+工艺+质检)
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::T1 => write!(f, "T1"),
            Tier::T2 => write!(f, "T2"),
            Tier::T3 => write!(f, "T3"),
        }
    }
}

impl Tier {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_uppercase().as_str() {
            "T1" => Some(Tier::T1),
            "T2" => Some(Tier::T2),
            "T3" => Some(Tier::T3),
            _ => None,
        }
    }

    /// 该服务等级货件途经的工序路径
    pub fn lanes(&self) -> &'static [Lane] {
        match self {
            Tier::T1 => &[Lane::Auth],
            Tier::T2 => &[Lane::Auth, Lane::Qa],
            Tier::T3 => &[Lane::Auth, Lane::Sewing, Lane::Qa],
        }
    }
}

// ==========================================
// 守护规则类型 (Guard Type)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardType {
    CapacityLowering, // 产能下调冲突
    OverbookingCap,   // 超订上限
    RushCap,          // 加急预留上限
    BookingConflict,  // 预订冲突
    MarginOrdering,   // 毛利阈值次序
    SlaRelaxation,    // SLA 放松
}

impl fmt::Display for GuardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl GuardType {
    pub fn to_db_str(&self) -> &'static str {
        match self {
            GuardType::CapacityLowering => "CAPACITY_LOWERING",
            GuardType::OverbookingCap => "OVERBOOKING_CAP",
            GuardType::RushCap => "RUSH_CAP",
            GuardType::BookingConflict => "BOOKING_CONFLICT",
            GuardType::MarginOrdering => "MARGIN_ORDERING",
            GuardType::SlaRelaxation => "SLA_RELAXATION",
        }
    }

    /// 是否属于"保护降级"类型 (触发双人审批)
    pub fn is_protection_lowering(&self) -> bool {
        matches!(self, GuardType::CapacityLowering | GuardType::SlaRelaxation)
    }
}

// ==========================================
// 守护规则严重度 (Guard Severity)
// ==========================================
// 顺序: Info < Warning < Error
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GuardSeverity {
    Info,    // 提示
    Warning, // 警告 (不阻断)
    Error,   // 错误 (阻断,除非可突破且已确认突破)
}

impl fmt::Display for GuardSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GuardSeverity::Info => write!(f, "INFO"),
            GuardSeverity::Warning => write!(f, "WARNING"),
            GuardSeverity::Error => write!(f, "ERROR"),
        }
    }
}

// ==========================================
// 审批状态 (Approval Status)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApprovalStatus {
    Pending,  // 等待审批
    Approved, // 全部角色已签署
    Rejected, // 任一角色拒绝 (对该次发布终态)
    Expired,  // 超时失效 (TTL 72小时)
}

impl fmt::Display for ApprovalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_db_str())
    }
}

impl ApprovalStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_uppercase().as_str() {
            "APPROVED" => ApprovalStatus::Approved,
            "REJECTED" => ApprovalStatus::Rejected,
            "EXPIRED" => ApprovalStatus::Expired,
            _ => ApprovalStatus::Pending,
        }
    }

    pub fn to_db_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "PENDING",
            ApprovalStatus::Approved => "APPROVED",
            ApprovalStatus::Rejected => "REJECTED",
            ApprovalStatus::Expired => "EXPIRED",
        }
    }
}
