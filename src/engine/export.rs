// ==========================================
// 奢品物流运营控制台 - 产能利用率导出
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 6. 外部接口 (导出)
// 用途: 按日/工序导出产能利用数据, 供离线分析
// ==========================================

use std::io::Write;

use anyhow::Context;

use crate::domain::capacity::DayCapacity;

const HEADERS: [&str; 15] = [
    "hub_code",
    "lane",
    "date",
    "held",
    "planned",
    "consumed",
    "rush_used",
    "utilization_percent",
    "effective_base_capacity",
    "available_slots",
    "rush_capacity",
    "rush_available",
    "qa_load_minutes",
    "qa_capacity_minutes",
    "overflow_to_next_day",
];

/// 将单日产能视图序列写出为 CSV
pub fn write_utilization_csv<W: Write>(writer: W, rows: &[DayCapacity]) -> anyhow::Result<()> {
    let mut w = csv::Writer::from_writer(writer);
    w.write_record(HEADERS).context("写出表头失败")?;

    for day in rows {
        let r = &day.result;
        w.write_record([
            day.hub_code.as_str(),
            day.lane.to_db_str(),
            &day.date.format("%Y-%m-%d").to_string(),
            &day.load.held.to_string(),
            &day.load.planned.to_string(),
            &day.load.consumed.to_string(),
            &day.load.rush_used.to_string(),
            &format!("{:.1}", r.utilization_percent),
            &r.effective_base_capacity.to_string(),
            &r.available_slots.to_string(),
            &r.rush_capacity.to_string(),
            &r.rush_available.to_string(),
            &r.qa_load_minutes.to_string(),
            &r.qa_capacity_minutes.to_string(),
            if r.overflow_to_next_day { "true" } else { "false" },
        ])
        .with_context(|| format!("写出 {} {} 行失败", day.hub_code, day.date))?;
    }

    w.flush().context("CSV 缓冲刷写失败")?;
    Ok(())
}

/// 导出为字符串 (接口层/测试便捷入口)
pub fn utilization_csv_string(rows: &[DayCapacity]) -> anyhow::Result<String> {
    let mut buf = Vec::new();
    write_utilization_csv(&mut buf, rows)?;
    String::from_utf8(buf).context("CSV 输出包含非 UTF-8 字节")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capacity::{CapacityProfile, DayLoad};
    use crate::domain::types::Lane;
    use crate::engine::calculator::CapacityCalculator;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;

    fn day() -> DayCapacity {
        let profile = CapacityProfile {
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
        };
        let load = DayLoad {
            held: 50,
            planned: 30,
            consumed: 10,
            ..Default::default()
        };
        CapacityCalculator::day_capacity(
            &profile,
            Lane::Auth,
            NaiveDate::from_ymd_opt(2026, 5, 18).unwrap(),
            load,
        )
    }

    #[test]
    fn test_csv_header_and_row() {
        let csv = utilization_csv_string(&[day()]).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("hub_code,lane,date"));

        let row = lines.next().unwrap();
        assert!(row.starts_with("HUB-PAR,AUTH,2026-05-18,50,30,10,0,81.8,100,20"));
        assert!(lines.next().is_none());
    }

    #[test]
    fn test_empty_export_has_header_only() {
        let csv = utilization_csv_string(&[]).unwrap();
        assert_eq!(csv.lines().count(), 1);
    }
}
