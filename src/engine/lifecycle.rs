// ==========================================
// 奢品物流运营控制台 - 版本生命周期引擎
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.3 版本生命周期
// 状态机: draft -> {scheduled, published}
//         scheduled -> {published, draft}
//         published -> rolled_back (对该版本终态)
// 红线: 每个作用域同一时刻只能有一个 PUBLISHED 版本;
//       发布必须通过激活指针 CAS 串行化;
//       幂等键重放必须返回原结果,不得产生第二个发布版本或重复事件
// ==========================================

use chrono::NaiveDateTime;
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::domain::approval::ApprovalRequest;
use crate::domain::event::{OpsEvent, OpsEventType};
use crate::domain::types::{ApprovalStatus, DocType, PolicyState};
use crate::domain::version::VersionRecord;
use crate::engine::approval::{ApprovalWorkflow, DEFAULT_APPROVAL_ROLES};
use crate::engine::events::OptionalEventRecorder;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::event_repo::EventLogRepository;
use crate::repository::version_repo::VersionRepository;

// ==========================================
// 指令与结果类型
// ==========================================

/// 发布指令 (请求级参数打包)
pub struct PublishCommand {
    pub version_id: String,
    pub actor: String,
    pub reason: String,
    pub request_id: Option<String>, // 幂等键 (调用方提供)
    pub correlation_id: String,
    pub approval_needed: bool, // 守护规则判定存在保护降级
    pub now: NaiveDateTime,
}

/// 发布结果: 三种可区分出口
#[derive(Debug)]
pub enum PublishOutcome {
    /// 发布成功,返回最新版本记录
    Published(VersionRecord),
    /// 需要审批且尚未批准: 不改变版本状态,返回挂起的审批请求
    ApprovalRequired(ApprovalRequest),
    /// 幂等重放: 该幂等键已成功提交过,返回原事件
    Replayed(OpsEvent),
}

// ==========================================
// PolicyVersionManager - 版本生命周期管理器
// ==========================================
pub struct PolicyVersionManager {
    version_repo: VersionRepository,
    event_repo: EventLogRepository,
    approval: ApprovalWorkflow,
    recorder: OptionalEventRecorder,
}

impl PolicyVersionManager {
    pub fn new(
        version_repo: VersionRepository,
        event_repo: EventLogRepository,
        approval: ApprovalWorkflow,
        recorder: OptionalEventRecorder,
    ) -> Self {
        Self {
            version_repo,
            event_repo,
            approval,
            recorder,
        }
    }

    /// 保存草稿版本
    ///
    /// 不影响当前发布版本; 版本号在作用域内由事务原子分配。
    /// 草稿事件 (capacity.changed / sla.updated / margin.updated)
    /// 随保存落账。
    pub fn save_draft(
        &self,
        doc_type: DocType,
        scope: &str,
        payload_json: String,
        actor: &str,
        reason: &str,
        draft_event_type: OpsEventType,
        correlation_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<VersionRecord> {
        require_reason(reason)?;
        require_actor(actor)?;

        let before_json = self.active_payload(doc_type, scope)?;
        let after_json: Option<JsonValue> = serde_json::from_str(&payload_json).ok();

        let mut record = VersionRecord {
            version_id: Uuid::new_v4().to_string(),
            doc_type,
            scope: scope.to_string(),
            version_no: 0, // 仓储分配
            state: PolicyState::Draft,
            effective_at: None,
            payload_json,
            created_by: actor.to_string(),
            change_reason: reason.to_string(),
            created_at: now,
            revision: 1,
        };
        self.version_repo.create_with_next_version_no(&mut record)?;

        let event = self.build_event(
            draft_event_type,
            &record,
            actor,
            now,
            before_json,
            after_json,
            correlation_id,
            None,
        );
        self.event_repo.insert(&event)?;
        self.recorder.record(&event);

        tracing::info!(
            "保存草稿: doc_type={}, scope={}, version_no={}, version_id={}",
            doc_type,
            scope,
            record.version_no,
            record.version_id
        );
        Ok(record)
    }

    /// 发布版本
    ///
    /// # 流程
    /// 1. 幂等键重放识别: 已提交过的 request_id 直接返回原事件
    /// 2. 状态机校验 (DRAFT/SCHEDULED -> PUBLISHED)
    /// 3. 审批门控: 需要审批且未批准时返回 `ApprovalRequired` (非错误)
    /// 4. 激活指针 CAS + 前版本让位 + 事件落账 (单事务)
    ///
    /// # 错误
    /// - `PublishConflict`: 并发发布落败,调用方可重试
    /// - `InvalidStateTransition`: 版本不在可发布状态
    /// - `BusinessRuleViolation`: 该版本的审批已被拒绝
    pub fn publish(&self, cmd: PublishCommand) -> RepositoryResult<PublishOutcome> {
        require_reason(&cmd.reason)?;
        require_actor(&cmd.actor)?;

        if let Some(request_id) = &cmd.request_id {
            if let Some(event) = self.event_repo.find_by_request_id(request_id)? {
                tracing::info!("幂等重放: request_id={}, 返回原事件", request_id);
                return Ok(PublishOutcome::Replayed(event));
            }
        }

        let record = self.require_version(&cmd.version_id)?;
        if !record.state.can_transition_to(PolicyState::Published) {
            return Err(RepositoryError::InvalidStateTransition {
                from: record.state.to_db_str().to_string(),
                to: PolicyState::Published.to_db_str().to_string(),
            });
        }

        if cmd.approval_needed {
            if let Some(outcome) = self.check_approval(&record, &cmd)? {
                return Ok(outcome);
            }
        }

        let expected_current = self
            .version_repo
            .active_version_id(record.doc_type, &record.scope)?;
        let before_json = match &expected_current {
            Some(id) => self.payload_of(id)?,
            None => None,
        };
        let after_json: Option<JsonValue> = serde_json::from_str(&record.payload_json).ok();

        let event = self.build_event(
            publish_event_type(record.doc_type),
            &record,
            &cmd.actor,
            cmd.now,
            before_json,
            after_json,
            &cmd.correlation_id,
            cmd.request_id.clone(),
        );

        match self
            .version_repo
            .publish_with_event(&cmd.version_id, expected_current.as_deref(), &event)
        {
            Ok(()) => {}
            // 并发重放: 另一次相同幂等键的提交先行落账
            Err(RepositoryError::DuplicateRequestId(_)) => {
                if let Some(request_id) = &cmd.request_id {
                    if let Some(original) = self.event_repo.find_by_request_id(request_id)? {
                        return Ok(PublishOutcome::Replayed(original));
                    }
                }
                return Err(RepositoryError::DuplicateRequestId(
                    cmd.request_id.unwrap_or_default(),
                ));
            }
            Err(e) => return Err(e),
        }

        self.recorder.record(&event);
        let published = self.require_version(&cmd.version_id)?;
        tracing::info!(
            "发布成功: doc_type={}, scope={}, version_no={}, actor={}",
            published.doc_type,
            published.scope,
            published.version_no,
            cmd.actor
        );
        Ok(PublishOutcome::Published(published))
    }

    /// 排期发布: 生效时间必须严格晚于当前时间
    ///
    /// 到期后由外部周期任务调用 `publish` 完成实际发布。
    pub fn schedule(
        &self,
        version_id: &str,
        effective_at: NaiveDateTime,
        actor: &str,
        reason: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<VersionRecord> {
        require_reason(reason)?;
        require_actor(actor)?;

        if effective_at <= now {
            return Err(RepositoryError::ValidationError(format!(
                "排期生效时间 {} 必须严格晚于当前时间 {}",
                effective_at, now
            )));
        }

        let mut record = self.require_version(version_id)?;
        if !record.state.can_transition_to(PolicyState::Scheduled) {
            return Err(RepositoryError::InvalidStateTransition {
                from: record.state.to_db_str().to_string(),
                to: PolicyState::Scheduled.to_db_str().to_string(),
            });
        }

        record.state = PolicyState::Scheduled;
        record.effective_at = Some(effective_at);
        record.change_reason = reason.to_string();
        self.version_repo.update(&record)?;
        record.revision += 1;

        tracing::info!(
            "排期发布: version_id={}, effective_at={}, actor={}",
            version_id,
            effective_at,
            actor
        );
        Ok(record)
    }

    /// 取消排期: SCHEDULED -> DRAFT, 清除生效时间
    pub fn cancel_schedule(
        &self,
        version_id: &str,
        actor: &str,
        reason: &str,
    ) -> RepositoryResult<VersionRecord> {
        require_reason(reason)?;
        require_actor(actor)?;

        let mut record = self.require_version(version_id)?;
        if record.state != PolicyState::Scheduled {
            return Err(RepositoryError::InvalidStateTransition {
                from: record.state.to_db_str().to_string(),
                to: PolicyState::Draft.to_db_str().to_string(),
            });
        }

        record.state = PolicyState::Draft;
        record.effective_at = None;
        record.change_reason = reason.to_string();
        self.version_repo.update(&record)?;
        record.revision += 1;

        tracing::info!("取消排期: version_id={}, actor={}", version_id, actor);
        Ok(record)
    }

    /// 回滚: 以历史版本为蓝本新建版本并立即发布
    ///
    /// 目标版本必须曾经发布过 (当前处于 ROLLED_BACK)。新版本复制目标的
    /// 文档载荷,按作用域分配新版本号,经 CAS 取代当前发布版本。
    pub fn rollback(
        &self,
        target_version_id: &str,
        actor: &str,
        reason: &str,
        request_id: Option<String>,
        correlation_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<PublishOutcome> {
        require_reason(reason)?;
        require_actor(actor)?;

        if let Some(rid) = &request_id {
            if let Some(event) = self.event_repo.find_by_request_id(rid)? {
                tracing::info!("幂等重放: request_id={}, 返回原事件", rid);
                return Ok(PublishOutcome::Replayed(event));
            }
        }

        let target = self.require_version(target_version_id)?;
        if target.state != PolicyState::RolledBack {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "回滚目标 {} 当前状态为 {}, 只能回滚到曾发布过的版本",
                target_version_id, target.state
            )));
        }

        let mut restored = VersionRecord {
            version_id: Uuid::new_v4().to_string(),
            doc_type: target.doc_type,
            scope: target.scope.clone(),
            version_no: 0, // 仓储分配
            state: PolicyState::Draft,
            effective_at: None,
            payload_json: target.payload_json.clone(),
            created_by: actor.to_string(),
            change_reason: reason.to_string(),
            created_at: now,
            revision: 1,
        };
        self.version_repo.create_with_next_version_no(&mut restored)?;

        let expected_current = self
            .version_repo
            .active_version_id(target.doc_type, &target.scope)?;
        let before_json = match &expected_current {
            Some(id) => self.payload_of(id)?,
            None => None,
        };
        let after_json: Option<JsonValue> = serde_json::from_str(&restored.payload_json).ok();

        let event = self.build_event(
            OpsEventType::PolicyRolledBack,
            &restored,
            actor,
            now,
            before_json,
            after_json,
            correlation_id,
            request_id,
        );

        self.version_repo
            .publish_with_event(&restored.version_id, expected_current.as_deref(), &event)?;
        self.recorder.record(&event);

        let published = self.require_version(&restored.version_id)?;
        tracing::info!(
            "回滚完成: target={}, 新版本 version_no={}, actor={}",
            target_version_id,
            published.version_no,
            actor
        );
        Ok(PublishOutcome::Published(published))
    }

    /// 查询作用域的当前发布版本
    pub fn active_version(
        &self,
        doc_type: DocType,
        scope: &str,
    ) -> RepositoryResult<Option<VersionRecord>> {
        self.version_repo.find_active(doc_type, scope)
    }

    /// 按版本ID查询
    pub fn find_version(&self, version_id: &str) -> RepositoryResult<Option<VersionRecord>> {
        self.version_repo.find_by_id(version_id)
    }

    /// 审批工作流访问器 (API 层透传签署/拒绝)
    pub fn approval_workflow(&self) -> &ApprovalWorkflow {
        &self.approval
    }

    /// 查询作用域的全部版本 (历史视图)
    pub fn list_versions(
        &self,
        doc_type: DocType,
        scope: &str,
    ) -> RepositoryResult<Vec<VersionRecord>> {
        self.version_repo.list_by_scope(doc_type, scope)
    }

    // ==========================================
    // 内部辅助
    // ==========================================

    /// 审批门控: 返回 Some(outcome) 表示发布不可继续
    fn check_approval(
        &self,
        record: &VersionRecord,
        cmd: &PublishCommand,
    ) -> RepositoryResult<Option<PublishOutcome>> {
        match self.approval.approval_for_version(&record.version_id, cmd.now)? {
            Some(request) if request.is_granted() => Ok(None),
            Some(request) if request.status == ApprovalStatus::Pending => {
                Ok(Some(PublishOutcome::ApprovalRequired(request)))
            }
            Some(request) if request.status == ApprovalStatus::Rejected => {
                Err(RepositoryError::BusinessRuleViolation(format!(
                    "版本 {} 的审批已被 {} 拒绝, 本次发布终止, 需重新走草稿/发布流程",
                    record.version_id,
                    request.rejected_by.as_deref().unwrap_or("未知")
                )))
            }
            // 无审批请求或已超时: 发起新请求并挂起
            _ => {
                let request = self.approval.request_approval(
                    record.doc_type.to_db_str(),
                    &record.scope,
                    &record.version_id,
                    &cmd.actor,
                    &cmd.reason,
                    &DEFAULT_APPROVAL_ROLES,
                    cmd.now,
                )?;
                Ok(Some(PublishOutcome::ApprovalRequired(request)))
            }
        }
    }

    fn require_version(&self, version_id: &str) -> RepositoryResult<VersionRecord> {
        self.version_repo
            .find_by_id(version_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "VersionRecord".to_string(),
                id: version_id.to_string(),
            })
    }

    fn active_payload(&self, doc_type: DocType, scope: &str) -> RepositoryResult<Option<JsonValue>> {
        Ok(self
            .version_repo
            .find_active(doc_type, scope)?
            .and_then(|r| serde_json::from_str(&r.payload_json).ok()))
    }

    fn payload_of(&self, version_id: &str) -> RepositoryResult<Option<JsonValue>> {
        Ok(self
            .version_repo
            .find_by_id(version_id)?
            .and_then(|r| serde_json::from_str(&r.payload_json).ok()))
    }

    #[allow(clippy::too_many_arguments)]
    fn build_event(
        &self,
        event_type: OpsEventType,
        record: &VersionRecord,
        actor: &str,
        now: NaiveDateTime,
        before_json: Option<JsonValue>,
        after_json: Option<JsonValue>,
        correlation_id: &str,
        request_id: Option<String>,
    ) -> OpsEvent {
        OpsEvent {
            event_id: Uuid::new_v4().to_string(),
            event_type,
            doc_type: record.doc_type.to_db_str().to_string(),
            scope: record.scope.clone(),
            version_id: record.version_id.clone(),
            version_no: record.version_no,
            actor: actor.to_string(),
            effective_at: record.effective_at.unwrap_or(now),
            before_json,
            after_json,
            correlation_id: correlation_id.to_string(),
            request_id,
            created_at: now,
        }
    }
}

/// 发布事件类型按文档类型区分
fn publish_event_type(doc_type: DocType) -> OpsEventType {
    match doc_type {
        DocType::CapacityProfile => OpsEventType::CapacityPublished,
        DocType::SlaMarginPolicy => OpsEventType::PolicyPublished,
    }
}

fn require_reason(reason: &str) -> RepositoryResult<()> {
    if reason.trim().is_empty() {
        return Err(RepositoryError::ValidationError(
            "变更原因不能为空".to_string(),
        ));
    }
    Ok(())
}

fn require_actor(actor: &str) -> RepositoryResult<()> {
    if actor.trim().is_empty() {
        return Err(RepositoryError::ValidationError(
            "操作人不能为空".to_string(),
        ));
    }
    Ok(())
}
