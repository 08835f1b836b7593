// ==========================================
// 奢品物流运营控制台 - 产能计算引擎
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.1 产能计算
// 红线: 纯函数,无副作用,可并发调用
// ==========================================

use chrono::NaiveDate;

use crate::domain::capacity::{CalculationResult, CapacityProfile, DayCapacity, DayLoad};
use crate::domain::types::Lane;

// ==========================================
// CapacityCalculator - 产能计算器
// ==========================================
// 输入: (CapacityProfile, 工序, 日期, 当日负载)
// 输出: CalculationResult (纯派生值,永不落库)
pub struct CapacityCalculator;

impl CapacityCalculator {
    /// 计算单日单工序的产能指标
    ///
    /// # 计算口径
    /// - effective_base = floor(基础产能 × 季节系数)
    /// - utilization% = (held + planned + consumed)
    ///                  / (基础产能 × 季节系数 × (1 + 超订比例/100)) × 100
    /// - available_slots = max(0, effective_base − held − planned)
    /// - rush_capacity = ceil(基础产能 × 加急比例/100)
    ///
    /// # 零分母口径
    /// 基础产能 × 季节系数为 0 时:
    /// - 当日无任何负载 → 利用率按 0% 处理 (不是错误)
    /// - 当日有负载 → 视为完全饱和: 利用率置 100%,
    ///   zero_capacity_conflict 置位,由守护规则上报
    pub fn calculate(
        profile: &CapacityProfile,
        lane: Lane,
        date: NaiveDate,
        load: &DayLoad,
    ) -> CalculationResult {
        let multiplier = profile.seasonality_multiplier(date);
        let base = profile.base_capacity(lane) as f64;

        let effective_base_capacity = (base * multiplier).floor() as i64;
        let denominator = base * multiplier * (1.0 + profile.overbooking_percent / 100.0);
        let total_load = load.total();

        let mut zero_capacity_conflict = false;
        let utilization_percent = if denominator <= 0.0 {
            if total_load == 0 {
                0.0
            } else {
                zero_capacity_conflict = true;
                100.0
            }
        } else {
            total_load as f64 / denominator * 100.0
        };

        // raw_available 可为负,用于溢出判断; 对外暴露的 available_slots 不为负
        let raw_available = effective_base_capacity - load.held - load.planned;
        let available_slots = raw_available.max(0);

        let rush_capacity = (base * profile.rush_bucket_percent / 100.0).ceil() as i64;
        let rush_available = (rush_capacity - load.rush_used).max(0);

        let overflow_to_next_day = utilization_percent > 100.0
            && raw_available < 0
            && profile.overflow_allowed
            && load.sla_headroom_ok;

        CalculationResult {
            utilization_percent,
            effective_base_capacity,
            available_slots,
            rush_capacity,
            rush_available,
            qa_load_minutes: load.qa_minutes_used,
            qa_capacity_minutes: profile.qa_capacity_minutes(),
            overflow_to_next_day,
            zero_capacity_conflict,
        }
    }

    /// 组装单日产能视图 (计算 + 上下文)
    pub fn day_capacity(
        profile: &CapacityProfile,
        lane: Lane,
        date: NaiveDate,
        load: DayLoad,
    ) -> DayCapacity {
        let result = Self::calculate(profile, lane, date, &load);
        DayCapacity {
            hub_code: profile.hub_code.clone(),
            lane,
            date,
            load,
            result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn profile() -> CapacityProfile {
        CapacityProfile {
            hub_code: "HUB-PAR".to_string(),
            auth_capacity: 100,
            sewing_capacity: 60,
            qa_capacity: 80,
            overbooking_percent: 10.0,
            rush_bucket_percent: 15.0,
            seasonality_multipliers: BTreeMap::new(),
            qa_headcount: 6,
            qa_shift_minutes: 480,
            overflow_allowed: true,
        }
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 18).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        // auth=100, 超订10%, 季节系数1.0, held=50 planned=30 consumed=10
        let load = DayLoad {
            held: 50,
            planned: 30,
            consumed: 10,
            ..Default::default()
        };
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &load);

        // 90 / 110 × 100 = 81.8%
        assert!((r.utilization_percent - 81.818).abs() < 0.01);
        assert_eq!(r.available_slots, 20);
        assert_eq!(r.effective_base_capacity, 100);
        assert!(!r.overflow_to_next_day);
        assert!(!r.zero_capacity_conflict);
    }

    #[test]
    fn test_utilization_exactly_100_at_overbooked_boundary() {
        // 负载 == 基础产能 × (1 + 超订/100) 时利用率恰为 100%
        let load = DayLoad {
            held: 60,
            planned: 40,
            consumed: 10,
            ..Default::default()
        };
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &load);
        assert!((r.utilization_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_available_slots_never_negative() {
        let load = DayLoad {
            held: 90,
            planned: 40,
            consumed: 5,
            rush_used: 99,
            ..Default::default()
        };
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &load);
        assert_eq!(r.available_slots, 0);
        assert_eq!(r.rush_available, 0);
    }

    #[test]
    fn test_seasonality_floor() {
        let mut p = profile();
        p.seasonality_multipliers.insert(5, 0.85);
        let r = CapacityCalculator::calculate(&p, Lane::Auth, date(), &DayLoad::default());
        // floor(100 × 0.85) = 85
        assert_eq!(r.effective_base_capacity, 85);
        assert_eq!(r.available_slots, 85);
    }

    #[test]
    fn test_rush_capacity_ceil() {
        // sewing=60, 加急15% → ceil(9.0)=9; auth=100 → 15
        let r = CapacityCalculator::calculate(&profile(), Lane::Sewing, date(), &DayLoad::default());
        assert_eq!(r.rush_capacity, 9);
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &DayLoad::default());
        assert_eq!(r.rush_capacity, 15);
    }

    #[test]
    fn test_zero_denominator_idle_is_zero_percent() {
        let mut p = profile();
        p.seasonality_multipliers.insert(5, 0.0);
        let r = CapacityCalculator::calculate(&p, Lane::Auth, date(), &DayLoad::default());
        assert_eq!(r.utilization_percent, 0.0);
        assert!(!r.zero_capacity_conflict);
    }

    #[test]
    fn test_zero_denominator_with_load_is_conflict() {
        let mut p = profile();
        p.seasonality_multipliers.insert(5, 0.0);
        let load = DayLoad {
            held: 3,
            ..Default::default()
        };
        let r = CapacityCalculator::calculate(&p, Lane::Auth, date(), &load);
        assert!(r.zero_capacity_conflict);
        assert!((r.utilization_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_overflow_requires_all_conditions() {
        let over = DayLoad {
            held: 80,
            planned: 40,
            consumed: 10,
            sla_headroom_ok: true,
            ..Default::default()
        };
        // 利用率 130/110 > 100%, raw_available = -20 < 0, 允许溢出, SLA 有余量
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &over);
        assert!(r.overflow_to_next_day);

        // SLA 无余量 → 不溢出
        let mut no_headroom = over;
        no_headroom.sla_headroom_ok = false;
        let r = CapacityCalculator::calculate(&profile(), Lane::Auth, date(), &no_headroom);
        assert!(!r.overflow_to_next_day);

        // 档案不允许溢出 → 不溢出
        let mut p = profile();
        p.overflow_allowed = false;
        let r = CapacityCalculator::calculate(&p, Lane::Auth, date(), &over);
        assert!(!r.overflow_to_next_day);
    }

    #[test]
    fn test_qa_minutes() {
        let load = DayLoad {
            qa_minutes_used: 1200,
            ..Default::default()
        };
        let r = CapacityCalculator::calculate(&profile(), Lane::Qa, date(), &load);
        assert_eq!(r.qa_capacity_minutes, 6 * 480);
        assert_eq!(r.qa_load_minutes, 1200);
    }
}
