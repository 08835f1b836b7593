// ==========================================
// 奢品物流运营控制台 - 审批工作流引擎
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.4 审批工作流
// 规则: 保护降级变更必须由全部要求角色签署;
//       任一角色拒绝即对该次发布终局;
//       同一人不得代签两个角色 (双人原则);
//       PENDING 超过 TTL 即失效 (读取时判定并落库)
// ==========================================

use chrono::NaiveDateTime;
use uuid::Uuid;

use crate::domain::approval::{ApprovalRequest, RoleSignoff};
use crate::domain::guard::{protection_lowering_present, Guard};
use crate::domain::types::ApprovalStatus;
use crate::repository::approval_repo::ApprovalRepository;
use crate::repository::error::{RepositoryError, RepositoryResult};

/// 保护降级变更默认要求的审批角色
pub const DEFAULT_APPROVAL_ROLES: [&str; 2] = ["OPS_DIRECTOR", "FINANCE_CONTROLLER"];

// ==========================================
// ApprovalWorkflow - 审批工作流
// ==========================================
pub struct ApprovalWorkflow {
    approval_repo: ApprovalRepository,
}

impl ApprovalWorkflow {
    pub fn new(approval_repo: ApprovalRepository) -> Self {
        Self { approval_repo }
    }

    /// 判定是否需要审批: 任一守护命中属于保护降级类型 (与严重度无关)
    pub fn requires_approval(guards: &[Guard]) -> bool {
        protection_lowering_present(guards)
    }

    /// 发起审批请求 (PENDING),要求角色列表非空
    pub fn request_approval(
        &self,
        doc_type: &str,
        scope: &str,
        version_id: &str,
        requested_by: &str,
        reason: &str,
        required_roles: &[&str],
        now: NaiveDateTime,
    ) -> RepositoryResult<ApprovalRequest> {
        if required_roles.is_empty() {
            return Err(RepositoryError::ValidationError(
                "审批请求必须指定至少一个要求角色".to_string(),
            ));
        }
        if reason.trim().is_empty() {
            return Err(RepositoryError::ValidationError(
                "审批请求必须填写变更原因".to_string(),
            ));
        }

        let request = ApprovalRequest {
            request_id: Uuid::new_v4().to_string(),
            doc_type: doc_type.to_string(),
            scope: scope.to_string(),
            version_id: version_id.to_string(),
            requested_by: requested_by.to_string(),
            requested_at: now,
            reason: reason.to_string(),
            signoffs: required_roles
                .iter()
                .map(|r| RoleSignoff::pending(*r))
                .collect(),
            status: ApprovalStatus::Pending,
            rejected_by: None,
            revision: 1,
        };

        self.approval_repo.create(&request)?;
        tracing::info!(
            "发起审批请求: request_id={}, scope={}, version_id={}, roles={:?}",
            request.request_id,
            scope,
            version_id,
            required_roles
        );
        Ok(request)
    }

    /// 记录一个角色的签署; 全部角色签署完成后状态转为 APPROVED
    ///
    /// # 错误
    /// - 请求不存在 → NotFound
    /// - 请求非 PENDING (含已超时) → BusinessRuleViolation
    /// - 角色未在要求列表 / 已签署 / 同一人代签两个角色 → BusinessRuleViolation
    pub fn record_approval(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<ApprovalRequest> {
        let mut request = self.load_pending(request_id, now)?;

        if request
            .signoffs
            .iter()
            .any(|s| s.approver.as_deref() == Some(approver))
        {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "{} 已签署过该请求, 不得代签第二个角色",
                approver
            )));
        }

        let signoff = request
            .signoffs
            .iter_mut()
            .find(|s| s.role == approver_role)
            .ok_or_else(|| {
                RepositoryError::BusinessRuleViolation(format!(
                    "角色 {} 不在该审批请求的要求列表中",
                    approver_role
                ))
            })?;
        if signoff.is_signed() {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "角色 {} 已完成签署",
                approver_role
            )));
        }

        signoff.approver = Some(approver.to_string());
        signoff.approved_at = Some(now);

        if request.all_roles_signed() {
            request.status = ApprovalStatus::Approved;
        }

        self.approval_repo.update(&request)?;
        request.revision += 1;
        tracing::info!(
            "记录审批签署: request_id={}, role={}, status={}",
            request_id,
            approver_role,
            request.status
        );
        Ok(request)
    }

    /// 记录拒绝: 单一拒绝即对该次发布终局,需重新走草稿/发布流程
    pub fn record_rejection(
        &self,
        request_id: &str,
        approver_role: &str,
        approver: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<ApprovalRequest> {
        let mut request = self.load_pending(request_id, now)?;

        if !request.signoffs.iter().any(|s| s.role == approver_role) {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "角色 {} 不在该审批请求的要求列表中",
                approver_role
            )));
        }

        request.status = ApprovalStatus::Rejected;
        request.rejected_by = Some(approver.to_string());
        self.approval_repo.update(&request)?;
        request.revision += 1;
        tracing::info!(
            "审批被拒绝: request_id={}, role={}, rejected_by={}",
            request_id,
            approver_role,
            approver
        );
        Ok(request)
    }

    /// 查询某版本的审批状态 (读取时执行超时判定并落库)
    pub fn approval_for_version(
        &self,
        version_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<Option<ApprovalRequest>> {
        let request = match self.approval_repo.find_latest_for_version(version_id)? {
            Some(r) => r,
            None => return Ok(None),
        };
        Ok(Some(self.expire_if_due(request, now)?))
    }

    /// 取出 PENDING 请求; 超时的先落库为 EXPIRED 再报错
    fn load_pending(
        &self,
        request_id: &str,
        now: NaiveDateTime,
    ) -> RepositoryResult<ApprovalRequest> {
        let request = self
            .approval_repo
            .find_by_id(request_id)?
            .ok_or_else(|| RepositoryError::NotFound {
                entity: "ApprovalRequest".to_string(),
                id: request_id.to_string(),
            })?;

        let request = self.expire_if_due(request, now)?;
        if request.status != ApprovalStatus::Pending {
            return Err(RepositoryError::BusinessRuleViolation(format!(
                "审批请求 {} 已处于 {} 状态, 不可再签署",
                request_id, request.status
            )));
        }
        Ok(request)
    }

    fn expire_if_due(
        &self,
        mut request: ApprovalRequest,
        now: NaiveDateTime,
    ) -> RepositoryResult<ApprovalRequest> {
        if request.is_expired(now) {
            request.status = ApprovalStatus::Expired;
            self.approval_repo.update(&request)?;
            request.revision += 1;
            tracing::info!(
                "审批请求超时失效: request_id={}, requested_at={}",
                request.request_id,
                request.requested_at
            );
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::domain::approval::APPROVAL_TTL_HOURS;
    use crate::domain::types::GuardType;
    use chrono::{Duration, NaiveDate};
    use rusqlite::Connection;
    use std::sync::{Arc, Mutex};

    fn workflow() -> ApprovalWorkflow {
        let conn = Connection::open_in_memory().unwrap();
        db::init_schema(&conn).unwrap();
        ApprovalWorkflow::new(ApprovalRepository::new(Arc::new(Mutex::new(conn))))
    }

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 4, 1)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn request(wf: &ApprovalWorkflow) -> ApprovalRequest {
        wf.request_approval(
            "SLA_MARGIN_POLICY",
            "GLOBAL",
            "V-100",
            "ops@luxe.example",
            "淡季放宽 T3 时限",
            &DEFAULT_APPROVAL_ROLES,
            now(),
        )
        .unwrap()
    }

    #[test]
    fn test_requires_approval_on_protection_lowering() {
        let relax = Guard::warning(GuardType::SlaRelaxation, "tier3 时限放宽");
        let cap = Guard::error(GuardType::OverbookingCap, "超订超限");

        assert!(ApprovalWorkflow::requires_approval(&[relax]));
        assert!(!ApprovalWorkflow::requires_approval(&[cap]));
        assert!(!ApprovalWorkflow::requires_approval(&[]));
    }

    #[test]
    fn test_two_roles_must_sign() {
        let wf = workflow();
        let req = request(&wf);

        let after_first = wf
            .record_approval(&req.request_id, "OPS_DIRECTOR", "director@luxe.example", now())
            .unwrap();
        assert_eq!(after_first.status, ApprovalStatus::Pending);
        assert!(!after_first.is_granted());

        let after_second = wf
            .record_approval(
                &req.request_id,
                "FINANCE_CONTROLLER",
                "finance@luxe.example",
                now(),
            )
            .unwrap();
        assert_eq!(after_second.status, ApprovalStatus::Approved);
        assert!(after_second.is_granted());
    }

    #[test]
    fn test_same_person_cannot_sign_both_roles() {
        let wf = workflow();
        let req = request(&wf);

        wf.record_approval(&req.request_id, "OPS_DIRECTOR", "director@luxe.example", now())
            .unwrap();
        let result = wf.record_approval(
            &req.request_id,
            "FINANCE_CONTROLLER",
            "director@luxe.example",
            now(),
        );
        assert!(matches!(
            result,
            Err(RepositoryError::BusinessRuleViolation(_))
        ));
    }

    #[test]
    fn test_single_rejection_is_final() {
        let wf = workflow();
        let req = request(&wf);

        let rejected = wf
            .record_rejection(
                &req.request_id,
                "FINANCE_CONTROLLER",
                "finance@luxe.example",
                now(),
            )
            .unwrap();
        assert_eq!(rejected.status, ApprovalStatus::Rejected);
        assert_eq!(
            rejected.rejected_by.as_deref(),
            Some("finance@luxe.example")
        );

        // 拒绝后不可再签署
        let result =
            wf.record_approval(&req.request_id, "OPS_DIRECTOR", "director@luxe.example", now());
        assert!(matches!(
            result,
            Err(RepositoryError::BusinessRuleViolation(_))
        ));
    }

    #[test]
    fn test_expiry_checked_on_read() {
        let wf = workflow();
        let req = request(&wf);
        let late = now() + Duration::hours(APPROVAL_TTL_HOURS + 1);

        let loaded = wf.approval_for_version("V-100", late).unwrap().unwrap();
        assert_eq!(loaded.status, ApprovalStatus::Expired);

        // 失效后签署被拒
        let result =
            wf.record_approval(&req.request_id, "OPS_DIRECTOR", "director@luxe.example", late);
        assert!(matches!(
            result,
            Err(RepositoryError::BusinessRuleViolation(_))
        ));
    }

    #[test]
    fn test_unknown_role_rejected() {
        let wf = workflow();
        let req = request(&wf);
        let result = wf.record_approval(&req.request_id, "CEO", "ceo@luxe.example", now());
        assert!(matches!(
            result,
            Err(RepositoryError::BusinessRuleViolation(_))
        ));
    }
}
