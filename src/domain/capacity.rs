// ==========================================
// 奢品物流运营控制台 - 产能档案领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 3. 数据模型 / 4.1 产能计算
// 红线: 产能约束优先于货件优先级
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::domain::types::Lane;

// ==========================================
// CapacityProfile - 枢纽产能档案
// ==========================================
// 版本化文档: 序列化后作为 version_record.payload_json 存储
// 不变量: 每个枢纽同一时刻只能有一个 PUBLISHED 档案
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CapacityProfile {
    // ===== 作用域 =====
    pub hub_code: String, // 枢纽代码

    // ===== 工序基础产能 (槽位/日, 正整数) =====
    pub auth_capacity: i64,   // 鉴定产能
    pub sewing_capacity: i64, // 工艺产能
    pub qa_capacity: i64,     // 质检产能

    // ===== 弹性参数 =====
    pub overbooking_percent: f64, // 超订比例 (0-30)
    pub rush_bucket_percent: f64, // 加急预留比例 (0-20)

    // ===== 季节系数 (月份 -> 正浮点, 缺省 1.0) =====
    pub seasonality_multipliers: BTreeMap<u32, f64>,

    // ===== 质检班次 =====
    pub qa_headcount: i64,     // 质检人数
    pub qa_shift_minutes: i64, // 单班分钟数

    // ===== 溢出许可 =====
    pub overflow_allowed: bool, // 是否允许溢出到次日
}

impl CapacityProfile {
    /// 取某工序的基础产能 (槽位/日)
    pub fn base_capacity(&self, lane: Lane) -> i64 {
        match lane {
            Lane::Auth => self.auth_capacity,
            Lane::Sewing => self.sewing_capacity,
            Lane::Qa => self.qa_capacity,
        }
    }

    /// 取某日期的季节系数 (缺省 1.0)
    pub fn seasonality_multiplier(&self, date: NaiveDate) -> f64 {
        use chrono::Datelike;
        self.seasonality_multipliers
            .get(&date.month())
            .copied()
            .unwrap_or(1.0)
    }

    /// 质检日产能 (分钟) = 人数 × 单班分钟数
    pub fn qa_capacity_minutes(&self) -> i64 {
        self.qa_headcount * self.qa_shift_minutes
    }
}

// ==========================================
// DayLoad - 单日负载聚合 (引擎输入)
// ==========================================
// 来源: ReservationRepository 按 (枢纽, 工序, 日期) 聚合
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct DayLoad {
    pub held: i64,             // 占位槽数
    pub planned: i64,          // 已预订槽数
    pub consumed: i64,         // 处理中槽数
    pub rush_used: i64,        // 已用加急槽数
    pub qa_minutes_used: i64,  // 已用质检分钟数
    pub sla_headroom_ok: bool, // 在途货件溢出到次日是否不破 SLA (调用方判定)
}

impl DayLoad {
    /// 总负载 = 占位 + 已预订 + 处理中
    pub fn total(&self) -> i64 {
        self.held + self.planned + self.consumed
    }
}

// ==========================================
// CalculationResult - 产能计算结果
// ==========================================
// 纯派生值,永不落库
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalculationResult {
    pub utilization_percent: f64,    // 利用率 (%)
    pub effective_base_capacity: i64, // floor(基础产能 × 季节系数)
    pub available_slots: i64,        // 可用槽数 (>= 0)
    pub rush_capacity: i64,          // 加急槽总数
    pub rush_available: i64,         // 加急可用槽数 (>= 0)
    pub qa_load_minutes: i64,        // 质检负载 (分钟)
    pub qa_capacity_minutes: i64,    // 质检产能 (分钟)
    pub overflow_to_next_day: bool,  // 是否溢出到次日
    pub zero_capacity_conflict: bool, // 产能为零但存在负载 (需守护规则上报)
}

// ==========================================
// DayCapacity - 单日产能视图
// ==========================================
// 按需计算: CapacityProfile + 当日 Reservation 聚合 -> DayCapacity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DayCapacity {
    pub hub_code: String,
    pub lane: Lane,
    pub date: NaiveDate,
    pub load: DayLoad,
    pub result: CalculationResult,
}
