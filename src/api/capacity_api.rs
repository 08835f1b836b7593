// ==========================================
// 奢品物流运营控制台 - 产能档案 API
// ==========================================
// 职责: 产能档案的读取/校验/草稿/发布/排期/回滚与利用率导出
// 红线: 写操作全有或全无; 阻断守护未突破时拒绝并罗列全部命中
// ==========================================

use chrono::{Local, NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::domain::capacity::{CapacityProfile, DayCapacity, DayLoad};
use crate::domain::event::{OpsEvent, OpsEventType};
use crate::domain::guard::{blocking_guards, has_blocking, Guard};
use crate::domain::reservation::Reservation;
use crate::domain::types::{DocType, Lane};
use crate::domain::version::VersionRecord;
use crate::engine::approval::ApprovalWorkflow;
use crate::engine::calculator::CapacityCalculator;
use crate::engine::events::OptionalEventRecorder;
use crate::engine::export::utilization_csv_string;
use crate::engine::guards::GuardValidator;
use crate::engine::lifecycle::{PolicyVersionManager, PublishCommand, PublishOutcome};
use crate::repository::approval_repo::ApprovalRepository;
use crate::repository::event_repo::EventLogRepository;
use crate::repository::reservation_repo::ReservationRepository;
use crate::repository::version_repo::VersionRepository;

use super::error::{ApiError, ApiResult};

// ==========================================
// CapacityApi - 产能档案 API
// ==========================================
pub struct CapacityApi {
    manager: PolicyVersionManager,
    reservation_repo: ReservationRepository,
    event_repo: EventLogRepository,
}

impl CapacityApi {
    pub fn new(conn: Arc<Mutex<Connection>>, recorder: OptionalEventRecorder) -> Self {
        Self {
            manager: PolicyVersionManager::new(
                VersionRepository::new(Arc::clone(&conn)),
                EventLogRepository::new(Arc::clone(&conn)),
                ApprovalWorkflow::new(ApprovalRepository::new(Arc::clone(&conn))),
                recorder,
            ),
            reservation_repo: ReservationRepository::new(Arc::clone(&conn)),
            event_repo: EventLogRepository::new(conn),
        }
    }

    // ==========================================
    // 读取接口
    // ==========================================

    /// 查询枢纽当前生效的产能档案
    pub fn get_active_capacity_profile(&self, hub_code: &str) -> ApiResult<CapacityProfile> {
        let record = self
            .manager
            .active_version(DocType::CapacityProfile, hub_code)?
            .ok_or_else(|| {
                ApiError::NotFound(format!("枢纽 {} 没有生效的产能档案", hub_code))
            })?;
        decode_profile(&record)
    }

    /// 查询枢纽的预约 (工序可选)
    pub fn get_reservations(
        &self,
        hub_code: &str,
        lane: Option<Lane>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> ApiResult<Vec<Reservation>> {
        require_range(start, end)?;
        Ok(self
            .reservation_repo
            .find_by_hub_and_range(hub_code, lane, start, end)?)
    }

    /// 计算日期范围内逐日逐工序的产能利用视图
    ///
    /// # 参数
    /// - `qa_minutes_per_job`: 单件质检分钟数 (质检负载 = 件数 × 该值)
    /// - `sla_headroom_ok`: 在途货件溢出到次日是否不破 SLA (调用方判定)
    pub fn get_utilization(
        &self,
        hub_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        qa_minutes_per_job: i64,
        sla_headroom_ok: bool,
    ) -> ApiResult<Vec<DayCapacity>> {
        require_range(start, end)?;
        let profile = self.get_active_capacity_profile(hub_code)?;

        let mut days = Vec::new();
        for date in start.iter_days().take_while(|d| *d <= end) {
            for lane in Lane::all() {
                let agg = self.reservation_repo.aggregate_day(hub_code, lane, date)?;
                let load = DayLoad {
                    held: agg.held,
                    planned: agg.planned,
                    consumed: agg.consumed,
                    rush_used: agg.rush_used,
                    qa_minutes_used: agg.jobs * qa_minutes_per_job,
                    sla_headroom_ok,
                };
                days.push(CapacityCalculator::day_capacity(&profile, lane, date, load));
            }
        }
        Ok(days)
    }

    /// 上报日期范围内"产能为零但存在负载"的冲突日期
    pub fn utilization_guards(
        &self,
        hub_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        qa_minutes_per_job: i64,
        sla_headroom_ok: bool,
    ) -> ApiResult<Vec<Guard>> {
        let days =
            self.get_utilization(hub_code, start, end, qa_minutes_per_job, sla_headroom_ok)?;
        Ok(GuardValidator::utilization_conflicts(&days))
    }

    /// 导出利用率 CSV (离线分析)
    pub fn export_utilization_csv(
        &self,
        hub_code: &str,
        start: NaiveDate,
        end: NaiveDate,
        qa_minutes_per_job: i64,
        sla_headroom_ok: bool,
    ) -> ApiResult<String> {
        let days =
            self.get_utilization(hub_code, start, end, qa_minutes_per_job, sla_headroom_ok)?;
        Ok(utilization_csv_string(&days)?)
    }

    /// 查询作用域的审计事件 (新事件在前)
    pub fn list_events(&self, hub_code: &str, limit: usize) -> ApiResult<Vec<OpsEvent>> {
        Ok(self.event_repo.list_by_scope(
            DocType::CapacityProfile.to_db_str(),
            hub_code,
            limit,
        )?)
    }

    /// 查询枢纽的全部档案版本 (历史视图)
    pub fn list_versions(&self, hub_code: &str) -> ApiResult<Vec<VersionRecord>> {
        Ok(self
            .manager
            .list_versions(DocType::CapacityProfile, hub_code)?)
    }

    // ==========================================
    // 校验与写入接口
    // ==========================================

    /// 同步校验候选档案 (表单编辑时调用, 返回全部守护命中)
    pub fn validate(&self, candidate: &CapacityProfile) -> ApiResult<Vec<Guard>> {
        let current = self.active_profile_opt(&candidate.hub_code)?;
        let reservations = self.reservations_for_validation(&candidate.hub_code)?;
        Ok(GuardValidator::validate_capacity_profile(
            candidate,
            current.as_ref(),
            &reservations,
        ))
    }

    /// 保存草稿版本
    ///
    /// 阻断守护 (未突破) 存在时拒绝, 罗列全部命中; 警告不阻断。
    pub fn save_draft(
        &self,
        candidate: &CapacityProfile,
        actor: &str,
        reason: &str,
        correlation_id: &str,
        override_acknowledged: bool,
    ) -> ApiResult<VersionRecord> {
        let guards = self.validate(candidate)?;
        self.reject_if_blocking(&guards, override_acknowledged)?;

        let payload = serde_json::to_string(candidate)
            .map_err(|e| ApiError::InternalError(format!("档案序列化失败: {}", e)))?;
        let record = self.manager.save_draft(
            DocType::CapacityProfile,
            &candidate.hub_code,
            payload,
            actor,
            reason,
            OpsEventType::CapacityChanged,
            correlation_id,
            now(),
        )?;
        Ok(record)
    }

    /// 发布版本
    ///
    /// 发布前重算守护规则 (预约与生效档案可能已变化);
    /// 保护降级命中会进入审批门控, 返回 `ApprovalRequired` 而非错误。
    pub fn publish(
        &self,
        version_id: &str,
        actor: &str,
        reason: &str,
        request_id: Option<String>,
        correlation_id: &str,
        override_acknowledged: bool,
    ) -> ApiResult<PublishOutcome> {
        let guards = self.guards_for_version(version_id)?;
        self.reject_if_blocking(&guards, override_acknowledged)?;

        let outcome = self.manager.publish(PublishCommand {
            version_id: version_id.to_string(),
            actor: actor.to_string(),
            reason: reason.to_string(),
            request_id,
            correlation_id: correlation_id.to_string(),
            approval_needed: ApprovalWorkflow::requires_approval(&guards),
            now: now(),
        })?;
        Ok(outcome)
    }

    /// 排期发布 (生效时间必须严格晚于当前时间)
    pub fn schedule(
        &self,
        version_id: &str,
        effective_at: NaiveDateTime,
        actor: &str,
        reason: &str,
        override_acknowledged: bool,
    ) -> ApiResult<VersionRecord> {
        let guards = self.guards_for_version(version_id)?;
        self.reject_if_blocking(&guards, override_acknowledged)?;

        Ok(self
            .manager
            .schedule(version_id, effective_at, actor, reason, now())?)
    }

    /// 取消排期 (SCHEDULED -> DRAFT)
    pub fn cancel_schedule(
        &self,
        version_id: &str,
        actor: &str,
        reason: &str,
    ) -> ApiResult<VersionRecord> {
        Ok(self.manager.cancel_schedule(version_id, actor, reason)?)
    }

    /// 回滚到历史版本
    pub fn rollback(
        &self,
        target_version_id: &str,
        actor: &str,
        reason: &str,
        request_id: Option<String>,
        correlation_id: &str,
        override_acknowledged: bool,
    ) -> ApiResult<PublishOutcome> {
        let guards = self.guards_for_version(target_version_id)?;
        self.reject_if_blocking(&guards, override_acknowledged)?;

        Ok(self.manager.rollback(
            target_version_id,
            actor,
            reason,
            request_id,
            correlation_id,
            now(),
        )?)
    }

    /// 审批接口透传: 记录签署
    pub fn record_approval(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
    ) -> ApiResult<crate::domain::approval::ApprovalRequest> {
        Ok(self
            .manager
            .approval_workflow()
            .record_approval(request_id, approver_role, approver, now())?)
    }

    /// 审批接口透传: 记录拒绝
    pub fn record_rejection(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
    ) -> ApiResult<crate::domain::approval::ApprovalRequest> {
        Ok(self
            .manager
            .approval_workflow()
            .record_rejection(request_id, approver_role, approver, now())?)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    fn reject_if_blocking(&self, guards: &[Guard], override_acknowledged: bool) -> ApiResult<()> {
        if has_blocking(guards, override_acknowledged) {
            return Err(ApiError::guard_violation(blocking_guards(
                guards,
                override_acknowledged,
            )));
        }
        Ok(())
    }

    /// 按版本载荷重算守护规则
    fn guards_for_version(&self, version_id: &str) -> ApiResult<Vec<Guard>> {
        let record = self
            .manager
            .find_version(version_id)?
            .ok_or_else(|| ApiError::NotFound(format!("版本 {} 不存在", version_id)))?;
        let candidate = decode_profile(&record)?;
        self.validate(&candidate)
    }

    fn active_profile_opt(&self, hub_code: &str) -> ApiResult<Option<CapacityProfile>> {
        match self.manager.active_version(DocType::CapacityProfile, hub_code)? {
            Some(record) => Ok(Some(decode_profile(&record)?)),
            None => Ok(None),
        }
    }

    /// 产能下调冲突检查所需的全量预约 (按枢纽)
    fn reservations_for_validation(&self, hub_code: &str) -> ApiResult<Vec<Reservation>> {
        // 检查窗口: 从今天起 90 天内的预约
        let today = now().date();
        Ok(self.reservation_repo.find_by_hub_and_range(
            hub_code,
            None,
            today,
            today + chrono::Duration::days(90),
        )?)
    }
}

fn decode_profile(record: &VersionRecord) -> ApiResult<CapacityProfile> {
    record
        .decode_payload()
        .map_err(|e| ApiError::InternalError(format!("档案载荷解析失败: {}", e)))
}

fn require_range(start: NaiveDate, end: NaiveDate) -> ApiResult<()> {
    if start > end {
        return Err(ApiError::InvalidInput(format!(
            "日期范围非法: start={} 晚于 end={}",
            start, end
        )));
    }
    Ok(())
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
