// ==========================================
// 奢品物流运营控制台 - 预约仓储 (只读聚合)
// ==========================================
// 红线: 预约生命周期归上游预订流程; 本仓储仅提供
//       按 (枢纽, 工序, 日期) 的读取与聚合,外加测试/单机用的写入
// ==========================================

use chrono::NaiveDate;
use rusqlite::{params, Connection};
use std::sync::{Arc, Mutex};

use crate::domain::reservation::Reservation;
use crate::domain::types::{Lane, ReservationType, Tier};
use crate::repository::error::{RepositoryError, RepositoryResult};

const DATE_FMT: &str = "%Y-%m-%d";

/// 计入加急预留桶的优先级上限 (priority <= 该值视为加急)
pub const RUSH_PRIORITY_MAX: i32 = 10;

// ==========================================
// DayAggregate - 单日预约聚合
// ==========================================
#[derive(Debug, Clone, Copy, Default)]
pub struct DayAggregate {
    pub held: i64,      // HOLD 槽数
    pub planned: i64,   // BOOKING 槽数
    pub consumed: i64,  // IN_PROGRESS 槽数
    pub rush_used: i64, // 加急槽数 (priority <= RUSH_PRIORITY_MAX)
    pub jobs: i64,      // 预约件数 (质检分钟换算用)
}

// ==========================================
// ReservationRepository - 预约仓储
// ==========================================
pub struct ReservationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ReservationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 写入预约 (上游同步/测试数据用)
    pub fn insert(&self, r: &Reservation) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"INSERT OR REPLACE INTO reservation (
                shipment_id, hub_code, lane, res_date, res_type,
                slots_used, tier, priority
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)"#,
            params![
                &r.shipment_id,
                &r.hub_code,
                r.lane.to_db_str(),
                r.date.format(DATE_FMT).to_string(),
                r.reservation_type.to_db_str(),
                &r.slots_used,
                r.tier.to_string(),
                &r.priority,
            ],
        )?;
        Ok(())
    }

    /// 按枢纽与日期范围查询预约 (工序可选)
    pub fn find_by_hub_and_range(
        &self,
        hub_code: &str,
        lane: Option<Lane>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> RepositoryResult<Vec<Reservation>> {
        let conn = self.get_conn()?;

        let mut sql = String::from(
            r#"SELECT shipment_id, hub_code, lane, res_date, res_type, slots_used, tier, priority
               FROM reservation
               WHERE hub_code = ?1 AND res_date >= ?2 AND res_date <= ?3"#,
        );
        if lane.is_some() {
            sql.push_str(" AND lane = ?4");
        }
        sql.push_str(" ORDER BY res_date, lane, shipment_id");

        let start_s = start.format(DATE_FMT).to_string();
        let end_s = end.format(DATE_FMT).to_string();

        let mut stmt = conn.prepare(&sql)?;
        let rows = match lane {
            Some(l) => stmt
                .query_map(params![hub_code, start_s, end_s, l.to_db_str()], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
            None => stmt
                .query_map(params![hub_code, start_s, end_s], map_row)?
                .collect::<Result<Vec<_>, _>>()?,
        };
        Ok(rows)
    }

    /// 按 (枢纽, 工序, 日期) 聚合当日负载
    pub fn aggregate_day(
        &self,
        hub_code: &str,
        lane: Lane,
        date: NaiveDate,
    ) -> RepositoryResult<DayAggregate> {
        let conn = self.get_conn()?;

        let mut stmt = conn.prepare(
            r#"SELECT res_type, slots_used, priority
               FROM reservation
               WHERE hub_code = ?1 AND lane = ?2 AND res_date = ?3"#,
        )?;

        let mut agg = DayAggregate::default();
        let rows = stmt.query_map(
            params![hub_code, lane.to_db_str(), date.format(DATE_FMT).to_string()],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i32>(2)?,
                ))
            },
        )?;

        for row in rows {
            let (res_type, slots, priority) = row?;
            match ReservationType::from_str(&res_type) {
                Some(ReservationType::Hold) => agg.held += slots,
                Some(ReservationType::Booking) => agg.planned += slots,
                Some(ReservationType::InProgress) => agg.consumed += slots,
                None => {
                    return Err(RepositoryError::ValidationError(format!(
                        "未知预约类型: {}",
                        res_type
                    )))
                }
            }
            if priority <= RUSH_PRIORITY_MAX {
                agg.rush_used += slots;
            }
            agg.jobs += 1;
        }

        Ok(agg)
    }
}

fn map_row(row: &rusqlite::Row) -> rusqlite::Result<Reservation> {
    let lane_s: String = row.get(2)?;
    let date_s: String = row.get(3)?;
    let type_s: String = row.get(4)?;
    let tier_s: String = row.get(6)?;

    Ok(Reservation {
        shipment_id: row.get(0)?,
        hub_code: row.get(1)?,
        lane: Lane::from_str(&lane_s).unwrap_or(Lane::Auth),
        date: NaiveDate::parse_from_str(&date_s, DATE_FMT).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?,
        reservation_type: ReservationType::from_str(&type_s).unwrap_or(ReservationType::Hold),
        slots_used: row.get(5)?,
        tier: Tier::from_str(&tier_s).unwrap_or(Tier::T2),
        priority: row.get(7)?,
    })
}
