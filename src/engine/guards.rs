// ==========================================
// 奢品物流运营控制台 - 守护规则校验引擎
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.2 守护规则
// 红线: 纯函数; 每条命中必须带可解释 message;
//       受保护字段通过登记表比对,不散落硬编码条件
// ==========================================

use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::domain::capacity::{CapacityProfile, DayCapacity};
use crate::domain::guard::Guard;
use crate::domain::policy::{protection_lowering_changes, SlaMarginPolicy};
use crate::domain::reservation::Reservation;
use crate::domain::types::{GuardType, Lane};

/// 超订比例上限 (超过即不可突破的错误)
pub const OVERBOOKING_PERCENT_MAX: f64 = 30.0;
/// 加急预留比例上限 (超过仅警告)
pub const RUSH_BUCKET_PERCENT_MAX: f64 = 20.0;

/// 正数校验覆盖的策略数值字段
const POLICY_NUMERIC_FIELDS: &[&str] = &[
    "classification_max_hours",
    "pickup_window_hours",
    "tier1_max_hours",
    "tier2_max_hours",
    "tier3_max_hours",
    "delivery_max_hours",
    "risk_buffer_hours",
    "breach_escalation_minutes",
    "minimum_margin_percent",
    "target_margin_percent",
    "variance_tolerance_percent",
];

// ==========================================
// GuardValidator - 守护规则校验器
// ==========================================
pub struct GuardValidator;

impl GuardValidator {
    /// 校验单工序产能调整
    ///
    /// # 规则
    /// - 产能必须为正数
    /// - 下调产能时,任一日期的 BOOKING 槽数超过新值
    ///   → capacity_lowering 错误 (可突破,附受影响货件ID)
    pub fn validate_capacity_change(
        lane: Lane,
        proposed_capacity: i64,
        current: &CapacityProfile,
        reservations: &[Reservation],
    ) -> Vec<Guard> {
        let mut guards = Vec::new();

        if proposed_capacity <= 0 {
            guards.push(Guard::error(
                GuardType::CapacityLowering,
                format!("{} 工序产能必须为正数, 当前提交值: {}", lane, proposed_capacity),
            ));
            return guards;
        }

        let current_capacity = current.base_capacity(lane);
        if proposed_capacity < current_capacity {
            // 按日期聚合该工序的 BOOKING 槽数
            let mut by_date: BTreeMap<NaiveDate, (i64, Vec<String>)> = BTreeMap::new();
            for r in reservations {
                if r.lane == lane && r.is_booking() {
                    let entry = by_date.entry(r.date).or_default();
                    entry.0 += r.slots_used;
                    entry.1.push(r.shipment_id.clone());
                }
            }

            for (date, (booked, shipment_ids)) in by_date {
                if booked > proposed_capacity {
                    guards.push(
                        Guard::error(
                            GuardType::CapacityLowering,
                            format!(
                                "{} 工序产能从 {} 下调到 {}, {} 已预订 {} 槽, 超出新产能",
                                lane, current_capacity, proposed_capacity, date, booked
                            ),
                        )
                        .with_affected(shipment_ids)
                        .with_override(),
                    );
                }
            }
        }

        guards
    }

    /// 校验整份产能档案 (草稿保存/发布前)
    ///
    /// 逐工序执行下调检查,再校验超订与加急比例上限。
    pub fn validate_capacity_profile(
        candidate: &CapacityProfile,
        current: Option<&CapacityProfile>,
        reservations: &[Reservation],
    ) -> Vec<Guard> {
        let mut guards = Vec::new();

        for lane in Lane::all() {
            match current {
                Some(cur) => guards.extend(Self::validate_capacity_change(
                    lane,
                    candidate.base_capacity(lane),
                    cur,
                    reservations,
                )),
                None => {
                    if candidate.base_capacity(lane) <= 0 {
                        guards.push(Guard::error(
                            GuardType::CapacityLowering,
                            format!(
                                "{} 工序产能必须为正数, 当前提交值: {}",
                                lane,
                                candidate.base_capacity(lane)
                            ),
                        ));
                    }
                }
            }
        }

        if candidate.overbooking_percent < 0.0
            || candidate.overbooking_percent > OVERBOOKING_PERCENT_MAX
        {
            // 不可突破
            guards.push(Guard::error(
                GuardType::OverbookingCap,
                format!(
                    "超订比例 {}% 超出允许区间 [0, {}]",
                    candidate.overbooking_percent, OVERBOOKING_PERCENT_MAX
                ),
            ));
        }

        if candidate.rush_bucket_percent < 0.0 {
            guards.push(Guard::error(
                GuardType::RushCap,
                format!("加急预留比例不能为负数: {}%", candidate.rush_bucket_percent),
            ));
        } else if candidate.rush_bucket_percent > RUSH_BUCKET_PERCENT_MAX {
            guards.push(Guard::warning(
                GuardType::RushCap,
                format!(
                    "加急预留比例 {}% 超过建议上限 {}%",
                    candidate.rush_bucket_percent, RUSH_BUCKET_PERCENT_MAX
                ),
            ));
        }

        for (month, mult) in &candidate.seasonality_multipliers {
            if *mult < 0.0 {
                guards.push(Guard::error(
                    GuardType::CapacityLowering,
                    format!("{} 月季节系数不能为负数: {}", month, mult),
                ));
            }
        }

        guards
    }

    /// 上报产能为零但存在负载的日期 (booking_conflict, 不可突破)
    pub fn utilization_conflicts(days: &[DayCapacity]) -> Vec<Guard> {
        days.iter()
            .filter(|d| d.result.zero_capacity_conflict)
            .map(|d| {
                Guard::error(
                    GuardType::BookingConflict,
                    format!(
                        "{} {} 工序有效产能为零但已有 {} 槽负载",
                        d.date,
                        d.lane,
                        d.load.total()
                    ),
                )
            })
            .collect()
    }

    /// 校验 SLA/毛利策略调整
    ///
    /// # 规则次序
    /// 1. 毛利阈值次序 (target >= minimum), 违反则直接返回, 不再执行其余校验
    /// 2. 数值字段正数校验
    /// 3. 与当前生效版本比对受保护字段 (保护降级 → 警告 + 触发审批)
    pub fn validate_policy_change(
        candidate: &SlaMarginPolicy,
        active: Option<&SlaMarginPolicy>,
    ) -> Vec<Guard> {
        let m = &candidate.margin_thresholds;
        if m.target_margin_percent < m.minimum_margin_percent {
            return vec![Guard::error(
                GuardType::MarginOrdering,
                format!(
                    "目标毛利率 {}% 不得低于最低毛利率 {}%",
                    m.target_margin_percent, m.minimum_margin_percent
                ),
            )];
        }

        let mut guards = Vec::new();

        for field in POLICY_NUMERIC_FIELDS {
            if let Some(value) = candidate.numeric_field(field) {
                if value <= 0.0 {
                    guards.push(Guard::error(
                        GuardType::SlaRelaxation,
                        format!("字段 {} 必须为正数, 当前提交值: {}", field, value),
                    ));
                }
            }
        }

        for (lane, mult) in &candidate.sla_targets.lane_multipliers {
            if *mult <= 0.0 {
                guards.push(Guard::error(
                    GuardType::SlaRelaxation,
                    format!("{} 工序时长系数必须为正数: {}", lane, mult),
                ));
            }
        }

        for (component, min) in &m.component_minimums {
            if *min <= 0.0 {
                guards.push(Guard::error(
                    GuardType::MarginOrdering,
                    format!("分项 {} 最低毛利率必须为正数: {}", component, min),
                ));
            }
        }

        if let Some(active) = active {
            for (field, old_value, new_value, guard_type) in
                protection_lowering_changes(active, candidate)
            {
                guards.push(Guard::warning(
                    guard_type,
                    format!("保护降级: {} 由 {} 调整为 {}", field, old_value, new_value),
                ));
            }
        }

        guards
    }
}
