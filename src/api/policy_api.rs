// ==========================================
// 奢品物流运营控制台 - SLA/毛利策略 API
// ==========================================
// 职责: 策略文档的读取/校验/草稿/发布/排期/回滚, 审批透传与试算
// 红线: 试算只读, 不落库、不改变生效策略
// ==========================================

use chrono::{Local, NaiveDateTime};
use rusqlite::Connection;
use std::sync::{Arc, Mutex};

use crate::domain::approval::ApprovalRequest;
use crate::domain::event::{OpsEvent, OpsEventType};
use crate::domain::guard::{blocking_guards, has_blocking, Guard};
use crate::domain::policy::SlaMarginPolicy;
use crate::domain::types::DocType;
use crate::domain::version::VersionRecord;
use crate::engine::approval::ApprovalWorkflow;
use crate::engine::events::OptionalEventRecorder;
use crate::engine::guards::GuardValidator;
use crate::engine::lifecycle::{PolicyVersionManager, PublishCommand, PublishOutcome};
use crate::engine::simulation::{SampleShipment, SimulationEngine, SimulationSummary};
use crate::repository::approval_repo::ApprovalRepository;
use crate::repository::event_repo::EventLogRepository;
use crate::repository::version_repo::VersionRepository;

use super::error::{ApiError, ApiResult};

// ==========================================
// PolicyApi - SLA/毛利策略 API
// ==========================================
pub struct PolicyApi {
    manager: PolicyVersionManager,
    event_repo: EventLogRepository,
}

impl PolicyApi {
    pub fn new(conn: Arc<Mutex<Connection>>, recorder: OptionalEventRecorder) -> Self {
        Self {
            manager: PolicyVersionManager::new(
                VersionRepository::new(Arc::clone(&conn)),
                EventLogRepository::new(Arc::clone(&conn)),
                ApprovalWorkflow::new(ApprovalRepository::new(Arc::clone(&conn))),
                recorder,
            ),
            event_repo: EventLogRepository::new(conn),
        }
    }

    // ==========================================
    // 读取接口
    // ==========================================

    /// 查询作用域当前生效的策略
    pub fn get_active_policy(&self, scope: &str) -> ApiResult<SlaMarginPolicy> {
        let record = self
            .manager
            .active_version(DocType::SlaMarginPolicy, scope)?
            .ok_or_else(|| ApiError::NotFound(format!("作用域 {} 没有生效的策略", scope)))?;
        decode_policy(&record)
    }

    /// 查询作用域的审计事件 (新事件在前)
    pub fn list_events(&self, scope: &str, limit: usize) -> ApiResult<Vec<OpsEvent>> {
        Ok(self
            .event_repo
            .list_by_scope(DocType::SlaMarginPolicy.to_db_str(), scope, limit)?)
    }

    /// 查询作用域的全部策略版本 (历史视图)
    pub fn list_versions(&self, scope: &str) -> ApiResult<Vec<VersionRecord>> {
        Ok(self
            .manager
            .list_versions(DocType::SlaMarginPolicy, scope)?)
    }

    // ==========================================
    // 校验与写入接口
    // ==========================================

    /// 同步校验候选策略 (表单编辑时调用, 返回全部守护命中)
    pub fn validate(&self, candidate: &SlaMarginPolicy) -> ApiResult<Vec<Guard>> {
        let active = self.active_policy_opt(&candidate.scope)?;
        Ok(GuardValidator::validate_policy_change(
            candidate,
            active.as_ref(),
        ))
    }

    /// 保存草稿版本
    ///
    /// 草稿事件类型按变更内容区分: 毛利阈值变化 → margin.updated,
    /// 否则 → sla.updated。
    pub fn save_draft(
        &self,
        candidate: &SlaMarginPolicy,
        actor: &str,
        reason: &str,
        correlation_id: &str,
        override_acknowledged: bool,
    ) -> ApiResult<VersionRecord> {
        let guards = self.validate(candidate)?;
        self.reject_if_blocking(&guards, override_acknowledged)?;

        let active = self.active_policy_opt(&candidate.scope)?;
        let event_type = draft_event_type(candidate, active.as_ref());

        let payload = serde_json::to_string(candidate)
            .map_err(|e| ApiError::InternalError(format!("策略序列化失败: {}", e)))?;
        let record = self.manager.save_draft(
            DocType::SlaMarginPolicy,
            &candidate.scope,
            payload,
            actor,
            reason,
            event_type,
            correlation_id,
            now(),
        )?;
        Ok(record)
    }

    /// 发布版本 (保护降级命中进入审批门控)
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

    /// 排期发布
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

    /// 取消排期
    pub fn cancel_schedule(
        &self,
        version_id: &str,
        actor: &str,
        reason: &str,
    ) -> ApiResult<VersionRecord> {
        Ok(self.manager.cancel_schedule(version_id, actor, reason)?)
    }

    /// 回滚到历史版本 (目标载荷按当前守护规则重新校验)
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

    // ==========================================
    // 审批接口
    // ==========================================

    pub fn record_approval(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
    ) -> ApiResult<ApprovalRequest> {
        Ok(self
            .manager
            .approval_workflow()
            .record_approval(request_id, approver_role, approver, now())?)
    }

    pub fn record_rejection(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
    ) -> ApiResult<ApprovalRequest> {
        Ok(self
            .manager
            .approval_workflow()
            .record_rejection(request_id, approver_role, approver, now())?)
    }

    /// 查询某版本的审批状态 (读取时执行超时判定)
    pub fn get_approval(&self, version_id: &str) -> ApiResult<Option<ApprovalRequest>> {
        Ok(self
            .manager
            .approval_workflow()
            .approval_for_version(version_id, now())?)
    }

    // ==========================================
    // 试算接口 (只读)
    // ==========================================

    /// 对样本货件试算候选策略相对生效策略的影响
    ///
    /// `majority_at_risk` 置位时调用方应在发布前提示用户 (不强制阻断)。
    pub fn run_simulation(
        &self,
        candidate: &SlaMarginPolicy,
        samples: &[SampleShipment],
    ) -> ApiResult<SimulationSummary> {
        let active = self.get_active_policy(&candidate.scope)?;
        Ok(SimulationEngine::simulate(candidate, &active, samples))
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

    fn guards_for_version(&self, version_id: &str) -> ApiResult<Vec<Guard>> {
        let record = self
            .manager
            .find_version(version_id)?
            .ok_or_else(|| ApiError::NotFound(format!("版本 {} 不存在", version_id)))?;
        let candidate = decode_policy(&record)?;
        self.validate(&candidate)
    }

    fn active_policy_opt(&self, scope: &str) -> ApiResult<Option<SlaMarginPolicy>> {
        match self.manager.active_version(DocType::SlaMarginPolicy, scope)? {
            Some(record) => Ok(Some(decode_policy(&record)?)),
            None => Ok(None),
        }
    }
}

/// 草稿事件类型: 毛利阈值变化优先记 margin.updated
fn draft_event_type(
    candidate: &SlaMarginPolicy,
    active: Option<&SlaMarginPolicy>,
) -> OpsEventType {
    match active {
        Some(active) if candidate.margin_thresholds != active.margin_thresholds => {
            OpsEventType::MarginUpdated
        }
        _ => OpsEventType::SlaUpdated,
    }
}

fn decode_policy(record: &VersionRecord) -> ApiResult<SlaMarginPolicy> {
    record
        .decode_payload()
        .map_err(|e| ApiError::InternalError(format!("策略载荷解析失败: {}", e)))
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}
