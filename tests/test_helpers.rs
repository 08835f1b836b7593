// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 提供测试所需的数据库初始化、测试数据生成等功能
// ==========================================

use chrono::NaiveDate;
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::error::Error;
use std::sync::{Arc, Mutex};
use tempfile::NamedTempFile;

use luxe_ops::db;
use luxe_ops::domain::policy::{MarginThresholds, SlaTargets};
use luxe_ops::domain::reservation::Reservation;
use luxe_ops::domain::types::{Lane, ReservationType, Tier};
use luxe_ops::{CapacityProfile, SlaMarginPolicy};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件 (需要保持存活)
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    luxe_ops::logging::init_test();
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().unwrap().to_string();

    let conn = db::open_sqlite_connection(&db_path)?;
    db::init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 打开共享连接 (Arc<Mutex<Connection>>)
pub fn open_shared(db_path: &str) -> Arc<Mutex<Connection>> {
    Arc::new(Mutex::new(db::open_sqlite_connection(db_path).unwrap()))
}

/// 标准测试产能档案: auth=100, 超订10%, 加急15%
pub fn sample_profile(hub_code: &str) -> CapacityProfile {
    CapacityProfile {
        hub_code: hub_code.to_string(),
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

/// 标准测试策略: T3 时限 48h, 毛利 15/25
pub fn sample_policy(scope: &str) -> SlaMarginPolicy {
    SlaMarginPolicy {
        scope: scope.to_string(),
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

/// 构造预约记录
pub fn reservation(
    shipment_id: &str,
    hub_code: &str,
    lane: Lane,
    date: NaiveDate,
    res_type: ReservationType,
    slots: i64,
    priority: i32,
) -> Reservation {
    Reservation {
        shipment_id: shipment_id.to_string(),
        hub_code: hub_code.to_string(),
        lane,
        date,
        reservation_type: res_type,
        slots_used: slots,
        tier: Tier::T2,
        priority,
    }
}
