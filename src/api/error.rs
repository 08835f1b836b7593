// ==========================================
// 奢品物流运营控制台 - API层错误类型
// ==========================================
// 职责: 定义API层错误类型, 转换Repository错误为用户友好的错误消息
// 红线: 每个拒绝必须罗列全部违规字段与守护消息 (可解释性),
//       不得静默替换非法数值
// ==========================================

use thiserror::Error;

use crate::domain::guard::Guard;
use crate::repository::error::RepositoryError;

/// API层错误类型
#[derive(Error, Debug)]
pub enum ApiError {
    // ==========================================
    // 校验与守护规则错误
    // ==========================================
    #[error("无效输入: {0}")]
    InvalidInput(String),

    /// 守护规则阻断: 携带全部命中项, 调用方据此修正后重新提交
    #[error("守护规则阻断: {}", format_guards(.guards))]
    GuardViolation { guards: Vec<Guard> },

    // ==========================================
    // 并发控制错误
    // ==========================================
    /// 并发状态转换落败 (CAS/乐观锁), 调用方可重试
    #[error("并发冲突: {0}")]
    Conflict(String),

    // ==========================================
    // 业务规则错误
    // ==========================================
    #[error("资源未找到: {0}")]
    NotFound(String),

    #[error("业务规则违反: {0}")]
    BusinessRuleViolation(String),

    #[error("无效的状态转换: from={from} to={to}")]
    InvalidStateTransition { from: String, to: String },

    // ==========================================
    // 数据访问错误
    // ==========================================
    #[error("数据库错误: {0}")]
    DatabaseError(String),

    #[error("数据库连接失败: {0}")]
    DatabaseConnectionError(String),

    #[error("数据库事务失败: {0}")]
    DatabaseTransactionError(String),

    // ==========================================
    // 通用错误
    // ==========================================
    #[error("内部错误: {0}")]
    InternalError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ApiError {
    /// 构造守护规则阻断错误 (罗列全部命中)
    pub fn guard_violation(guards: Vec<Guard>) -> Self {
        ApiError::GuardViolation { guards }
    }
}

/// 罗列全部守护命中 (类型 + 消息)
fn format_guards(guards: &[Guard]) -> String {
    guards
        .iter()
        .map(|g| format!("[{}] {}", g.guard_type, g.message))
        .collect::<Vec<_>>()
        .join("; ")
}

// ==========================================
// 从 RepositoryError 转换
// 目的: 将Repository层的技术错误转换为用户友好的业务错误
// ==========================================
impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        match err {
            // 并发控制错误
            RepositoryError::PublishConflict {
                doc_type,
                scope,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "发布冲突: {}({}) 的激活版本已被并发发布修改 (期望={:?}, 实际={:?}), 请刷新后重试",
                doc_type, scope, expected, actual
            )),
            RepositoryError::OptimisticLockFailure {
                id,
                expected,
                actual,
            } => ApiError::Conflict(format!(
                "记录{}已被其他用户修改 (期望revision={}, 实际revision={})",
                id, expected, actual
            )),
            RepositoryError::DuplicateRequestId(request_id) => ApiError::Conflict(format!(
                "幂等键 {} 已被另一请求占用",
                request_id
            )),

            // 数据库错误
            RepositoryError::NotFound { entity, id } => {
                ApiError::NotFound(format!("{}(id={})不存在", entity, id))
            }
            RepositoryError::DatabaseConnectionError(msg) => ApiError::DatabaseConnectionError(msg),
            RepositoryError::DatabaseTransactionError(msg) => {
                ApiError::DatabaseTransactionError(msg)
            }
            RepositoryError::LockError(msg) => {
                ApiError::DatabaseConnectionError(format!("数据库锁获取失败: {}", msg))
            }
            RepositoryError::DatabaseQueryError(msg) => ApiError::DatabaseError(msg),
            RepositoryError::UniqueConstraintViolation(msg) => {
                ApiError::BusinessRuleViolation(format!("唯一约束违反: {}", msg))
            }

            // 业务规则错误
            RepositoryError::BusinessRuleViolation(msg) => ApiError::BusinessRuleViolation(msg),
            RepositoryError::InvalidStateTransition { from, to } => {
                ApiError::InvalidStateTransition { from, to }
            }

            // 数据质量错误
            RepositoryError::ValidationError(msg) => ApiError::InvalidInput(msg),
            RepositoryError::PayloadError(msg) => {
                ApiError::InternalError(format!("载荷序列化失败: {}", msg))
            }

            // 通用错误
            RepositoryError::InternalError(msg) => ApiError::InternalError(msg),
            RepositoryError::Other(err) => ApiError::Other(err),
        }
    }
}

/// Result 类型别名
pub type ApiResult<T> = Result<T, ApiError>;
