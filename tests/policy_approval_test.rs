// ==========================================
// 策略审批工作流集成测试
// ==========================================
// 职责: 验证保护降级的审批门控、双人签署、拒绝终局与试算
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod policy_approval_test {
    use luxe_ops::api::{ApiError, PolicyApi};
    use luxe_ops::domain::types::{ApprovalStatus, GuardType, Tier};
    use luxe_ops::engine::OptionalEventRecorder;
    use luxe_ops::{PublishOutcome, SampleShipment};

    use crate::test_helpers::{create_test_db, open_shared, sample_policy};

    const SCOPE: &str = "GLOBAL";
    const ACTOR: &str = "ops@luxe.example";

    fn setup() -> (tempfile::NamedTempFile, PolicyApi) {
        let (temp_file, db_path) = create_test_db().unwrap();
        let api = PolicyApi::new(open_shared(&db_path), OptionalEventRecorder::none());
        (temp_file, api)
    }

    fn publish_baseline(api: &PolicyApi) -> String {
        let draft = api
            .save_draft(&sample_policy(SCOPE), ACTOR, "初始策略", "C-000", false)
            .unwrap();
        let outcome = api
            .publish(&draft.version_id, ACTOR, "初始策略", None, "C-000", false)
            .unwrap();
        assert!(matches!(outcome, PublishOutcome::Published(_)));
        draft.version_id
    }

    #[test]
    fn test_protection_lowering_requires_two_signoffs() {
        let (_tmp, api) = setup();
        publish_baseline(&api);

        // 放宽 T3 时限 48 -> 72: 保护降级
        let mut relaxed = sample_policy(SCOPE);
        relaxed.sla_targets.tier3_max_hours = 72.0;
        let guards = api.validate(&relaxed).unwrap();
        assert!(guards
            .iter()
            .any(|g| g.guard_type == GuardType::SlaRelaxation));

        let draft = api
            .save_draft(&relaxed, ACTOR, "淡季放宽 T3 时限", "C-001", false)
            .unwrap();

        // 第一次发布: 挂起等待审批, 版本状态不变
        let outcome = api
            .publish(&draft.version_id, ACTOR, "淡季放宽 T3 时限", None, "C-001", false)
            .unwrap();
        let PublishOutcome::ApprovalRequired(request) = outcome else {
            panic!("保护降级应要求审批");
        };
        assert_eq!(request.status, ApprovalStatus::Pending);
        assert_eq!(api.get_active_policy(SCOPE).unwrap().sla_targets.tier3_max_hours, 48.0);

        // 单人签署不足
        api.record_approval(&request.request_id, "OPS_DIRECTOR", "director@luxe.example")
            .unwrap();
        let outcome = api
            .publish(&draft.version_id, ACTOR, "淡季放宽 T3 时限", None, "C-001", false)
            .unwrap();
        assert!(matches!(outcome, PublishOutcome::ApprovalRequired(_)));

        // 双人签署后发布放行
        api.record_approval(
            &request.request_id,
            "FINANCE_CONTROLLER",
            "finance@luxe.example",
        )
        .unwrap();
        let outcome = api
            .publish(&draft.version_id, ACTOR, "淡季放宽 T3 时限", None, "C-001", false)
            .unwrap();
        assert!(matches!(outcome, PublishOutcome::Published(_)));
        assert_eq!(api.get_active_policy(SCOPE).unwrap().sla_targets.tier3_max_hours, 72.0);
    }

    #[test]
    fn test_rejection_permanently_blocks_that_version() {
        let (_tmp, api) = setup();
        publish_baseline(&api);

        let mut relaxed = sample_policy(SCOPE);
        relaxed.margin_thresholds.minimum_margin_percent = 10.0;
        let draft = api
            .save_draft(&relaxed, ACTOR, "下调毛利下限", "C-002", false)
            .unwrap();

        let PublishOutcome::ApprovalRequired(request) = api
            .publish(&draft.version_id, ACTOR, "下调毛利下限", None, "C-002", false)
            .unwrap()
        else {
            panic!("保护降级应要求审批");
        };

        api.record_rejection(&request.request_id, "FINANCE_CONTROLLER", "finance@luxe.example")
            .unwrap();

        // 拒绝后该版本的发布被终局阻断
        let result = api.publish(&draft.version_id, ACTOR, "下调毛利下限", None, "C-002", false);
        assert!(matches!(result, Err(ApiError::BusinessRuleViolation(_))));

        let stored = api.get_approval(&draft.version_id).unwrap().unwrap();
        assert_eq!(stored.status, ApprovalStatus::Rejected);

        // 生效策略保持不变
        assert_eq!(
            api.get_active_policy(SCOPE)
                .unwrap()
                .margin_thresholds
                .minimum_margin_percent,
            15.0
        );
    }

    #[test]
    fn test_margin_ordering_rejected_before_other_checks() {
        let (_tmp, api) = setup();

        let mut invalid = sample_policy(SCOPE);
        invalid.margin_thresholds.minimum_margin_percent = 15.0;
        invalid.margin_thresholds.target_margin_percent = 10.0;

        let result = api.save_draft(&invalid, ACTOR, "非法阈值", "C-003", false);
        let Err(ApiError::GuardViolation { guards }) = result else {
            panic!("毛利阈值次序应被拒");
        };
        assert_eq!(guards.len(), 1);
        assert_eq!(guards[0].guard_type, GuardType::MarginOrdering);
    }

    #[test]
    fn test_simulation_is_read_only() {
        let (_tmp, api) = setup();
        publish_baseline(&api);

        let mut candidate = sample_policy(SCOPE);
        candidate.sla_targets.tier3_max_hours = 72.0;

        let samples = vec![SampleShipment {
            shipment_id: "SHP-001".to_string(),
            tier: Tier::T3,
            elapsed_hours: 40.0,
            margin_percent: 20.0,
        }];
        let summary = api.run_simulation(&candidate, &samples).unwrap();

        assert_eq!(summary.sample_count, 1);
        let r = &summary.results[0];
        assert!(!r.sla_at_risk);
        assert!(r.score_delta >= 0.0);

        // 试算不落库: 无新版本、生效策略不变
        assert_eq!(api.list_versions(SCOPE).unwrap().len(), 1);
        assert_eq!(api.get_active_policy(SCOPE).unwrap().sla_targets.tier3_max_hours, 48.0);
    }

    #[test]
    fn test_rollback_restores_previous_policy() {
        let (_tmp, api) = setup();
        let v1 = publish_baseline(&api);

        // 收紧 T2 时限 (安全方向, 无需审批) 并发布
        let mut tightened = sample_policy(SCOPE);
        tightened.sla_targets.tier2_max_hours = 30.0;
        let v2 = api
            .save_draft(&tightened, ACTOR, "收紧 T2", "C-006", false)
            .unwrap();
        api.publish(&v2.version_id, ACTOR, "收紧 T2", None, "C-006", false)
            .unwrap();

        let outcome = api
            .rollback(&v1, ACTOR, "收紧后积压, 恢复上一版", None, "C-007", false)
            .unwrap();
        assert!(matches!(outcome, PublishOutcome::Published(_)));
        assert_eq!(
            api.get_active_policy(SCOPE).unwrap().sla_targets.tier2_max_hours,
            36.0
        );
    }

    #[test]
    fn test_rollback_revalidates_target_against_current_rules() {
        use chrono::Local;
        use luxe_ops::domain::types::{DocType, PolicyState};
        use luxe_ops::domain::version::VersionRecord;
        use luxe_ops::repository::VersionRepository;
        use uuid::Uuid;

        let (_tmp, db_path) = create_test_db().unwrap();
        let api = PolicyApi::new(open_shared(&db_path), OptionalEventRecorder::none());
        publish_baseline(&api);

        // 历史版本载荷违反当前毛利阈值次序 (以旧规则入库的存量数据)
        let mut stale = sample_policy(SCOPE);
        stale.margin_thresholds.target_margin_percent = 10.0;
        let mut record = VersionRecord {
            version_id: Uuid::new_v4().to_string(),
            doc_type: DocType::SlaMarginPolicy,
            scope: SCOPE.to_string(),
            version_no: 0,
            state: PolicyState::RolledBack,
            effective_at: None,
            payload_json: serde_json::to_string(&stale).unwrap(),
            created_by: ACTOR.to_string(),
            change_reason: "存量历史版本".to_string(),
            created_at: Local::now().naive_local(),
            revision: 1,
        };
        VersionRepository::new(open_shared(&db_path))
            .create_with_next_version_no(&mut record)
            .unwrap();

        let result = api.rollback(
            &record.version_id,
            ACTOR,
            "恢复历史版本",
            None,
            "C-008",
            false,
        );
        let Err(ApiError::GuardViolation { guards }) = result else {
            panic!("回滚目标应按当前守护规则重新校验");
        };
        assert_eq!(guards[0].guard_type, GuardType::MarginOrdering);

        // 生效策略保持不变
        assert_eq!(
            api.get_active_policy(SCOPE)
                .unwrap()
                .margin_thresholds
                .target_margin_percent,
            25.0
        );
    }

    #[test]
    fn test_draft_events_distinguish_sla_and_margin() {
        let (_tmp, api) = setup();
        publish_baseline(&api);

        let mut sla_change = sample_policy(SCOPE);
        sla_change.sla_targets.tier2_max_hours = 30.0;
        api.save_draft(&sla_change, ACTOR, "收紧 T2", "C-004", false)
            .unwrap();

        let mut margin_change = sample_policy(SCOPE);
        margin_change.margin_thresholds.target_margin_percent = 28.0;
        api.save_draft(&margin_change, ACTOR, "抬高目标毛利", "C-005", false)
            .unwrap();

        let events = api.list_events(SCOPE, 10).unwrap();
        let types: Vec<&str> = events.iter().map(|e| e.event_type.as_str()).collect();
        assert!(types.contains(&"sla.updated"));
        assert!(types.contains(&"margin.updated"));
        assert!(types.contains(&"policy.published"));
    }
}
