// ==========================================
// 产能利用率计算与导出集成测试
// ==========================================
// 职责: 验证从预约聚合到利用率视图与 CSV 导出的全链路
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod utilization_export_test {
    use chrono::{Duration, Local, NaiveDate};
    use luxe_ops::api::CapacityApi;
    use luxe_ops::domain::types::{Lane, ReservationType};
    use luxe_ops::engine::OptionalEventRecorder;
    use luxe_ops::repository::ReservationRepository;

    use crate::test_helpers::{create_test_db, open_shared, reservation, sample_profile};

    const HUB: &str = "HUB-PAR";
    const ACTOR: &str = "ops@luxe.example";

    fn setup_with_day() -> (
        tempfile::NamedTempFile,
        CapacityApi,
        ReservationRepository,
        NaiveDate,
    ) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let conn = open_shared(&db_path);
        let api = CapacityApi::new(conn.clone(), OptionalEventRecorder::none());
        let reservations = ReservationRepository::new(conn);

        let draft = api
            .save_draft(&sample_profile(HUB), ACTOR, "初始档案", "C-000", false)
            .unwrap();
        api.publish(&draft.version_id, ACTOR, "初始档案", None, "C-000", false)
            .unwrap();

        let date = Local::now().date_naive() + Duration::days(5);
        (temp_file, api, reservations, date)
    }

    /// 鉴定工序: held=50, planned=30, consumed=10
    fn seed_auth_day(reservations: &ReservationRepository, date: NaiveDate) {
        reservations
            .insert(&reservation(
                "SHP-H1",
                HUB,
                Lane::Auth,
                date,
                ReservationType::Hold,
                50,
                50,
            ))
            .unwrap();
        reservations
            .insert(&reservation(
                "SHP-B1",
                HUB,
                Lane::Auth,
                date,
                ReservationType::Booking,
                30,
                50,
            ))
            .unwrap();
        reservations
            .insert(&reservation(
                "SHP-P1",
                HUB,
                Lane::Auth,
                date,
                ReservationType::InProgress,
                10,
                50,
            ))
            .unwrap();
    }

    #[test]
    fn test_reference_utilization_scenario() {
        let (_tmp, api, reservations, date) = setup_with_day();
        seed_auth_day(&reservations, date);

        let days = api.get_utilization(HUB, date, date, 30, true).unwrap();
        let auth = days
            .iter()
            .find(|d| d.lane == Lane::Auth && d.date == date)
            .unwrap();

        // 90 / (100 × 1.1) × 100 = 81.8%
        assert!((auth.result.utilization_percent - 81.818).abs() < 0.01);
        assert_eq!(auth.result.available_slots, 20);
        assert_eq!(auth.result.effective_base_capacity, 100);
        // 3 件 × 30 分钟
        assert_eq!(auth.load.qa_minutes_used, 90);

        // 其余工序无负载
        let sewing = days
            .iter()
            .find(|d| d.lane == Lane::Sewing && d.date == date)
            .unwrap();
        assert_eq!(sewing.result.utilization_percent, 0.0);
        assert_eq!(sewing.result.available_slots, 60);
    }

    #[test]
    fn test_rush_priority_counts_against_bucket() {
        let (_tmp, api, reservations, date) = setup_with_day();

        // priority<=10 计入加急桶: ceil(100 × 15%) = 15
        reservations
            .insert(&reservation(
                "SHP-RUSH",
                HUB,
                Lane::Auth,
                date,
                ReservationType::Booking,
                6,
                5,
            ))
            .unwrap();

        let days = api.get_utilization(HUB, date, date, 0, true).unwrap();
        let auth = days.iter().find(|d| d.lane == Lane::Auth).unwrap();
        assert_eq!(auth.load.rush_used, 6);
        assert_eq!(auth.result.rush_capacity, 15);
        assert_eq!(auth.result.rush_available, 9);
    }

    #[test]
    fn test_csv_export_roundtrip() {
        let (_tmp, api, reservations, date) = setup_with_day();
        seed_auth_day(&reservations, date);

        let csv = api.export_utilization_csv(HUB, date, date, 30, true).unwrap();
        let mut lines = csv.lines();

        let header = lines.next().unwrap();
        assert!(header.starts_with("hub_code,lane,date,held,planned,consumed"));

        // 单日 3 工序各一行
        let rows: Vec<&str> = lines.collect();
        assert_eq!(rows.len(), 3);
        let auth_row = rows.iter().find(|r| r.contains(",AUTH,")).unwrap();
        assert!(auth_row.contains("81.8"));
        assert!(auth_row.contains(",20,"));
    }

    #[test]
    fn test_zero_capacity_day_surfaces_conflict_guard() {
        use chrono::Datelike;
        use luxe_ops::domain::types::GuardType;

        let (_tmp, api, reservations, date) = setup_with_day();

        // 当月季节系数归零: 有效产能为零, 既有预订构成冲突
        let mut profile = sample_profile(HUB);
        profile.seasonality_multipliers.insert(date.month(), 0.0);
        let draft = api
            .save_draft(&profile, ACTOR, "季节停线", "C-010", false)
            .unwrap();
        api.publish(&draft.version_id, ACTOR, "季节停线", None, "C-010", false)
            .unwrap();

        reservations
            .insert(&reservation(
                "SHP-Z1",
                HUB,
                Lane::Auth,
                date,
                ReservationType::Booking,
                10,
                50,
            ))
            .unwrap();

        let guards = api.utilization_guards(HUB, date, date, 0, true).unwrap();
        assert_eq!(guards.len(), 1);
        assert_eq!(guards[0].guard_type, GuardType::BookingConflict);
    }

    #[test]
    fn test_invalid_range_rejected() {
        let (_tmp, api, _res, date) = setup_with_day();
        let result = api.get_utilization(HUB, date, date - Duration::days(1), 30, true);
        assert!(result.is_err());
    }
}
