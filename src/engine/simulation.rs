// ==========================================
// 奢品物流运营控制台 - 试算引擎 (Dry-run)
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.5 试算引擎
// 红线: 只读; 不落库任何结果, 不改变生效策略;
//       新旧策略使用同一评分函数 (只有策略输入不同)
// ==========================================

use serde::{Deserialize, Serialize};

use crate::domain::guard::Guard;
use crate::domain::policy::SlaMarginPolicy;
use crate::domain::types::{GuardType, Tier};

/// 超过该比例的样本处于 SLA 风险时, 调用方应在发布前提示用户
pub const AT_RISK_MAJORITY_PERCENT: f64 = 50.0;

// ==========================================
// SampleShipment - 试算样本货件
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleShipment {
    pub shipment_id: String,
    pub tier: Tier,
    pub elapsed_hours: f64,  // 已进入枢纽处理的小时数
    pub margin_percent: f64, // 该货件的毛利率
}

// ==========================================
// SimulationResult - 单货件试算结果
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationResult {
    pub shipment_id: String,
    pub current_score: f64,           // 生效策略下的评分
    pub new_score: f64,               // 候选策略下的评分
    pub score_delta: f64,             // new - current
    pub guardrail_hits: Vec<Guard>,   // 该货件在候选策略下触发的守护命中
    pub sla_at_risk: bool,            // 候选策略下剩余时限是否落入风险缓冲
}

// ==========================================
// SimulationSummary - 试算汇总
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub results: Vec<SimulationResult>,
    pub sample_count: usize,
    pub at_risk_count: usize,
    pub majority_at_risk: bool, // 超半数样本处于风险 → 调用方发布前须提示
}

// ==========================================
// SimulationEngine - 试算引擎
// ==========================================
pub struct SimulationEngine;

impl SimulationEngine {
    /// 对样本货件逐一试算候选策略相对生效策略的影响
    pub fn simulate(
        candidate: &SlaMarginPolicy,
        active: &SlaMarginPolicy,
        samples: &[SampleShipment],
    ) -> SimulationSummary {
        let results: Vec<SimulationResult> = samples
            .iter()
            .map(|s| Self::simulate_shipment(candidate, active, s))
            .collect();

        let at_risk_count = results.iter().filter(|r| r.sla_at_risk).count();
        let majority_at_risk = !results.is_empty()
            && (at_risk_count as f64 / results.len() as f64) * 100.0 > AT_RISK_MAJORITY_PERCENT;

        SimulationSummary {
            sample_count: results.len(),
            at_risk_count,
            majority_at_risk,
            results,
        }
    }

    fn simulate_shipment(
        candidate: &SlaMarginPolicy,
        active: &SlaMarginPolicy,
        shipment: &SampleShipment,
    ) -> SimulationResult {
        let current_score = Self::score(active, shipment);
        let new_score = Self::score(candidate, shipment);

        SimulationResult {
            shipment_id: shipment.shipment_id.clone(),
            current_score,
            new_score,
            score_delta: new_score - current_score,
            guardrail_hits: Self::guardrail_hits(candidate, shipment),
            sla_at_risk: Self::sla_at_risk(candidate, shipment),
        }
    }

    /// 评分函数 (新旧策略共用)
    ///
    /// 0-100 分: SLA 剩余时限占比 70%, 毛利余量占比 30%。
    /// 时限为等级时限乘以途经工序的时长系数 (effective_max_hours)。
    pub fn score(policy: &SlaMarginPolicy, shipment: &SampleShipment) -> f64 {
        let deadline = policy.sla_targets.effective_max_hours(shipment.tier);
        let slack_ratio = if deadline > 0.0 {
            ((deadline - shipment.elapsed_hours) / deadline).clamp(0.0, 1.0)
        } else {
            0.0
        };

        let m = &policy.margin_thresholds;
        let margin_span = m.target_margin_percent - m.minimum_margin_percent;
        let margin_ratio = if margin_span > 0.0 {
            ((shipment.margin_percent - m.minimum_margin_percent) / margin_span).clamp(0.0, 1.0)
        } else if shipment.margin_percent >= m.minimum_margin_percent {
            1.0
        } else {
            0.0
        };

        (0.7 * slack_ratio + 0.3 * margin_ratio) * 100.0
    }

    /// 剩余时限落入风险缓冲即视为 SLA 风险
    fn sla_at_risk(policy: &SlaMarginPolicy, shipment: &SampleShipment) -> bool {
        let deadline = policy.sla_targets.effective_max_hours(shipment.tier);
        deadline - shipment.elapsed_hours <= policy.sla_targets.risk_buffer_hours
    }

    /// 该货件在候选策略下触发的守护命中 (仅提示, 不阻断)
    fn guardrail_hits(policy: &SlaMarginPolicy, shipment: &SampleShipment) -> Vec<Guard> {
        let mut hits = Vec::new();

        if shipment.margin_percent < policy.margin_thresholds.minimum_margin_percent {
            hits.push(
                Guard::warning(
                    GuardType::MarginOrdering,
                    format!(
                        "货件毛利率 {}% 低于策略下限 {}%",
                        shipment.margin_percent,
                        policy.margin_thresholds.minimum_margin_percent
                    ),
                )
                .with_affected(vec![shipment.shipment_id.clone()]),
            );
        }

        let deadline = policy.sla_targets.effective_max_hours(shipment.tier);
        if shipment.elapsed_hours > deadline {
            hits.push(
                Guard::warning(
                    GuardType::SlaRelaxation,
                    format!(
                        "货件已超出 {} 枢纽处理时限 ({} 小时 > {} 小时)",
                        shipment.tier, shipment.elapsed_hours, deadline
                    ),
                )
                .with_affected(vec![shipment.shipment_id.clone()]),
            );
        }

        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::policy::{MarginThresholds, SlaTargets};
    use std::collections::BTreeMap;

    fn policy() -> SlaMarginPolicy {
        SlaMarginPolicy {
            scope: "GLOBAL".to_string(),
            sla_targets: SlaTargets {
                classification_max_hours: 4.0,
                pickup_window_hours: 12.0,
                tier1_max_hours: 24.0,
                tier2_max_hours: 36.0,
                tier3_max_hours: 48.0,
                delivery_max_hours: 72.0,
                lane_multipliers: BTreeMap::new(),
                risk_buffer_hours: 6.0,
                breach_escalation_minutes: 30.0,
            },
            margin_thresholds: MarginThresholds {
                minimum_margin_percent: 15.0,
                target_margin_percent: 25.0,
                component_minimums: BTreeMap::new(),
                variance_tolerance_percent: 5.0,
                currency: "EUR".to_string(),
                vat_inclusive: true,
            },
        }
    }

    fn shipment(id: &str, tier: Tier, elapsed: f64, margin: f64) -> SampleShipment {
        SampleShipment {
            shipment_id: id.to_string(),
            tier,
            elapsed_hours: elapsed,
            margin_percent: margin,
        }
    }

    #[test]
    fn test_relaxing_tier3_deadline_improves_score() {
        // T3 货件已处理 40 小时, 时限 48 -> 72
        let active = policy();
        let mut candidate = active.clone();
        candidate.sla_targets.tier3_max_hours = 72.0;

        let samples = vec![shipment("SHP-001", Tier::T3, 40.0, 20.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);

        let r = &summary.results[0];
        assert!(!r.sla_at_risk);
        assert!(r.score_delta >= 0.0);
        assert!(r.guardrail_hits.is_empty());
    }

    #[test]
    fn test_at_risk_within_risk_buffer() {
        let active = policy();
        let candidate = active.clone();

        // 剩余 48 - 44 = 4 小时 <= 风险缓冲 6 小时
        let samples = vec![shipment("SHP-001", Tier::T3, 44.0, 20.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);
        assert!(summary.results[0].sla_at_risk);
        assert_eq!(summary.at_risk_count, 1);
    }

    #[test]
    fn test_majority_at_risk_flag() {
        let active = policy();
        let mut candidate = active.clone();
        // 收紧 T2 时限到 24 小时, 三个样本中两个落入风险
        candidate.sla_targets.tier2_max_hours = 24.0;

        let samples = vec![
            shipment("SHP-001", Tier::T2, 20.0, 20.0), // 剩余 4 <= 6, 风险
            shipment("SHP-002", Tier::T2, 22.0, 20.0), // 剩余 2 <= 6, 风险
            shipment("SHP-003", Tier::T2, 2.0, 20.0),  // 剩余 22, 安全
        ];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);
        assert_eq!(summary.at_risk_count, 2);
        assert!(summary.majority_at_risk);
    }

    #[test]
    fn test_exactly_half_is_not_majority() {
        let active = policy();
        let candidate = active.clone();

        let samples = vec![
            shipment("SHP-001", Tier::T3, 44.0, 20.0), // 风险
            shipment("SHP-002", Tier::T3, 2.0, 20.0),  // 安全
        ];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);
        assert_eq!(summary.at_risk_count, 1);
        assert!(!summary.majority_at_risk);
    }

    #[test]
    fn test_low_margin_shipment_hits_guardrail() {
        let active = policy();
        let candidate = active.clone();

        let samples = vec![shipment("SHP-001", Tier::T2, 10.0, 12.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);

        let hits = &summary.results[0].guardrail_hits;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].guard_type, GuardType::MarginOrdering);
        assert_eq!(hits[0].affected_entities, vec!["SHP-001"]);
    }

    #[test]
    fn test_overdue_shipment_hits_sla_guardrail() {
        let active = policy();
        let candidate = active.clone();

        let samples = vec![shipment("SHP-001", Tier::T1, 30.0, 20.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);

        let hits = &summary.results[0].guardrail_hits;
        assert!(hits
            .iter()
            .any(|g| g.guard_type == GuardType::SlaRelaxation));
    }

    #[test]
    fn test_lane_multiplier_tightens_effective_deadline() {
        use crate::domain::types::Lane;

        let active = policy();
        let mut candidate = active.clone();
        // 质检工序系数 0.5: T2 有效时限 36 -> 18
        candidate.sla_targets.lane_multipliers.insert(Lane::Qa, 0.5);

        // 剩余 18 - 14 = 4 <= 缓冲 6, 仅在候选策略下落入风险
        let samples = vec![shipment("SHP-001", Tier::T2, 14.0, 20.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &samples);

        let r = &summary.results[0];
        assert!(r.sla_at_risk);
        assert!(r.score_delta < 0.0);

        // T1 不经过质检, 不受该系数影响
        let t1 = vec![shipment("SHP-002", Tier::T1, 10.0, 20.0)];
        let summary = SimulationEngine::simulate(&candidate, &active, &t1);
        assert!((summary.results[0].score_delta).abs() < 1e-9);
    }

    #[test]
    fn test_empty_sample_set() {
        let active = policy();
        let summary = SimulationEngine::simulate(&active, &active, &[]);
        assert_eq!(summary.sample_count, 0);
        assert!(!summary.majority_at_risk);
    }

    #[test]
    fn test_identical_policies_give_zero_delta() {
        let active = policy();
        let samples = vec![
            shipment("SHP-001", Tier::T1, 10.0, 18.0),
            shipment("SHP-002", Tier::T3, 30.0, 22.0),
        ];
        let summary = SimulationEngine::simulate(&active, &active, &samples);
        for r in summary.results {
            assert!((r.score_delta).abs() < 1e-9);
        }
    }
}
