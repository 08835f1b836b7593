// ==========================================
// 奢品物流运营控制台 - SLA/毛利策略领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 3. 数据模型 / 4.2 守护规则
// 红线: target_margin >= minimum_margin 必须恒成立
// ==========================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::types::{GuardType, Lane, Tier};

// ==========================================
// SlaTargets - SLA 目标
// ==========================================
// 全部字段为正数; 放松任一 *_max_hours 属于"保护降级"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaTargets {
    pub classification_max_hours: f64,      // 分类定级时限
    pub pickup_window_hours: f64,           // 揽收窗口
    pub tier1_max_hours: f64,               // T1 枢纽处理时限
    pub tier2_max_hours: f64,               // T2 枢纽处理时限
    pub tier3_max_hours: f64,               // T3 枢纽处理时限
    pub delivery_max_hours: f64,            // 末端配送时限
    pub lane_multipliers: BTreeMap<Lane, f64>, // 工序时长系数
    pub risk_buffer_hours: f64,             // 风险缓冲
    pub breach_escalation_minutes: f64,     // 破约升级时限
}

impl SlaTargets {
    /// 取某服务等级的枢纽处理时限
    pub fn tier_max_hours(&self, tier: Tier) -> f64 {
        match tier {
            Tier::T1 => self.tier1_max_hours,
            Tier::T2 => self.tier2_max_hours,
            Tier::T3 => self.tier3_max_hours,
        }
    }

    /// 某服务等级的有效处理时限 = 等级时限 × 途经工序时长系数之积 (缺省 1.0)
    pub fn effective_max_hours(&self, tier: Tier) -> f64 {
        let multiplier: f64 = tier
            .lanes()
            .iter()
            .map(|lane| self.lane_multipliers.get(lane).copied().unwrap_or(1.0))
            .product();
        self.tier_max_hours(tier) * multiplier
    }
}

// ==========================================
// MarginThresholds - 毛利阈值
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarginThresholds {
    pub minimum_margin_percent: f64, // 全局最低毛利率
    pub target_margin_percent: f64,  // 全局目标毛利率
    pub component_minimums: BTreeMap<String, f64>, // 分项最低毛利率 (鉴定/工艺/质检/运输)
    pub variance_tolerance_percent: f64, // 波动容忍度
    pub currency: String,            // 币种
    pub vat_inclusive: bool,         // 是否含增值税
}

// ==========================================
// SlaMarginPolicy - SLA/毛利策略文档
// ==========================================
// 版本化文档: 序列化后作为 version_record.payload_json 存储
// 作用域: "GLOBAL" 或区域代码
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlaMarginPolicy {
    pub scope: String,
    pub sla_targets: SlaTargets,
    pub margin_thresholds: MarginThresholds,
}

impl SlaMarginPolicy {
    /// 按字段名取数值 (供保护降级的声明式比较使用)
    ///
    /// 新增受保护字段时,仅需在此补充映射并登记 PROTECTED_POLICY_FIELDS,
    /// 不需要修改守护规则的判断逻辑。
    pub fn numeric_field(&self, name: &str) -> Option<f64> {
        let t = &self.sla_targets;
        let m = &self.margin_thresholds;
        match name {
            "classification_max_hours" => Some(t.classification_max_hours),
            "pickup_window_hours" => Some(t.pickup_window_hours),
            "tier1_max_hours" => Some(t.tier1_max_hours),
            "tier2_max_hours" => Some(t.tier2_max_hours),
            "tier3_max_hours" => Some(t.tier3_max_hours),
            "delivery_max_hours" => Some(t.delivery_max_hours),
            "risk_buffer_hours" => Some(t.risk_buffer_hours),
            "breach_escalation_minutes" => Some(t.breach_escalation_minutes),
            "minimum_margin_percent" => Some(m.minimum_margin_percent),
            "target_margin_percent" => Some(m.target_margin_percent),
            "variance_tolerance_percent" => Some(m.variance_tolerance_percent),
            _ => None,
        }
    }
}

// ==========================================
// 保护降级字段登记表
// ==========================================
// 声明式 (字段, 不安全方向) 对照表: 新策略字段通过登记加入审批门控,
// 避免散落的硬编码条件判断。
// ==========================================

/// 不安全方向: 字段朝该方向变化即视为"保护降级"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnsafeDirection {
    Decrease, // 调低不安全 (如毛利下限、风险缓冲)
    Increase, // 调高不安全 (如各 *_max_hours 时限)
}

impl fmt::Display for UnsafeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnsafeDirection::Decrease => write!(f, "DECREASE"),
            UnsafeDirection::Increase => write!(f, "INCREASE"),
        }
    }
}

/// 受保护字段登记项
#[derive(Debug, Clone, Copy)]
pub struct ProtectedField {
    pub field: &'static str,
    pub unsafe_direction: UnsafeDirection,
    pub guard_type: GuardType,
}

/// SLA/毛利策略的受保护字段
pub const PROTECTED_POLICY_FIELDS: &[ProtectedField] = &[
    ProtectedField {
        field: "classification_max_hours",
        unsafe_direction: UnsafeDirection::Increase,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "tier1_max_hours",
        unsafe_direction: UnsafeDirection::Increase,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "tier2_max_hours",
        unsafe_direction: UnsafeDirection::Increase,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "tier3_max_hours",
        unsafe_direction: UnsafeDirection::Increase,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "delivery_max_hours",
        unsafe_direction: UnsafeDirection::Increase,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "risk_buffer_hours",
        unsafe_direction: UnsafeDirection::Decrease,
        guard_type: GuardType::SlaRelaxation,
    },
    ProtectedField {
        field: "minimum_margin_percent",
        unsafe_direction: UnsafeDirection::Decrease,
        guard_type: GuardType::CapacityLowering,
    },
];

/// 逐字段比对新旧策略,返回构成保护降级的 (字段, 旧值, 新值, 守护类型)
pub fn protection_lowering_changes(
    current: &SlaMarginPolicy,
    candidate: &SlaMarginPolicy,
) -> Vec<(&'static str, f64, f64, GuardType)> {
    let mut changes = Vec::new();
    for pf in PROTECTED_POLICY_FIELDS {
        let (old_value, new_value) = match (
            current.numeric_field(pf.field),
            candidate.numeric_field(pf.field),
        ) {
            (Some(o), Some(n)) => (o, n),
            _ => continue,
        };

        let lowered = match pf.unsafe_direction {
            UnsafeDirection::Decrease => new_value < old_value,
            UnsafeDirection::Increase => new_value > old_value,
        };
        if lowered {
            changes.push((pf.field, old_value, new_value, pf.guard_type));
        }
    }
    changes
}
