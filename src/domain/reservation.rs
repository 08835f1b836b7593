// ==========================================
// 奢品物流运营控制台 - 预约领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 3. 数据模型
// 红线: 预约生命周期归上游预订流程,引擎只读
// ==========================================

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::types::{Lane, ReservationType, Tier};

// ==========================================
// Reservation - 预约 (只读输入)
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reservation {
    pub shipment_id: String,             // 货件ID
    pub hub_code: String,                // 枢纽代码
    pub lane: Lane,                      // 工序通道
    pub date: NaiveDate,                 // 预约日期
    pub reservation_type: ReservationType, // 类型 (占位/已预订/处理中)
    pub slots_used: i64,                 // 占用槽数
    pub tier: Tier,                      // 服务等级
    pub priority: i32,                   // 优先级 (数值越小越优先)
}

impl Reservation {
    pub fn is_booking(&self) -> bool {
        self.reservation_type == ReservationType::Booking
    }
}
