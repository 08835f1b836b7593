// ==========================================
// 奢品物流运营控制台 - 引擎层事件通知
// ==========================================
// 职责: 定义运营事件通知 trait,实现依赖倒置
// 说明: Engine 层定义 trait,外部审计/遥测汇聚端实现适配器
// 语义: 至少一次投递; 事件已在状态转换的同一事务内落库,
//       本通知仅用于下游刷新,引擎不等待投递确认
// ==========================================

use std::error::Error;
use std::sync::Arc;

use crate::domain::event::OpsEvent;

// ==========================================
// 事件通知 Trait
// ==========================================

/// 运营事件通知者 Trait
///
/// Engine 层定义,外部汇聚端实现
///
/// # 实现说明
/// - 事件的持久化不依赖本 trait (ops_event 表随状态转换事务写入)
/// - 适配器将 `OpsEvent` 转发给通知/遥测管道
pub trait PolicyEventRecorder: Send + Sync {
    /// 通知一条运营事件
    ///
    /// # 返回
    /// - `Ok(delivery_id)`: 投递标识 (如果支持) 或空字符串
    /// - `Err`: 投递失败 (调用方记录日志,不回滚状态转换)
    fn record(&self, event: &OpsEvent) -> Result<String, Box<dyn Error + Send + Sync>>;
}

/// 空操作事件通知者
///
/// 用于不需要事件通知的场景 (如单元测试)
#[derive(Debug, Clone, Default)]
pub struct NoOpEventRecorder;

impl PolicyEventRecorder for NoOpEventRecorder {
    fn record(&self, event: &OpsEvent) -> Result<String, Box<dyn Error + Send + Sync>> {
        tracing::debug!(
            "NoOpEventRecorder: 跳过事件通知 - event_type={}, scope={}",
            event.event_type.as_str(),
            event.scope
        );
        Ok(String::new())
    }
}

/// 可选的事件通知者包装
///
/// 简化 Option<Arc<dyn PolicyEventRecorder>> 的使用
pub struct OptionalEventRecorder {
    inner: Option<Arc<dyn PolicyEventRecorder>>,
}

impl OptionalEventRecorder {
    /// 创建带通知者的实例
    pub fn with_recorder(recorder: Arc<dyn PolicyEventRecorder>) -> Self {
        Self {
            inner: Some(recorder),
        }
    }

    /// 创建空实例 (不通知)
    pub fn none() -> Self {
        Self { inner: None }
    }

    /// 通知事件 (如果配置了通知者); 失败仅记日志
    pub fn record(&self, event: &OpsEvent) {
        match &self.inner {
            Some(recorder) => {
                if let Err(e) = recorder.record(event) {
                    tracing::warn!(
                        "事件通知失败 (状态转换已落库) - event_type={}, scope={}, error={}",
                        event.event_type.as_str(),
                        event.scope,
                        e
                    );
                }
            }
            None => {
                tracing::debug!(
                    "OptionalEventRecorder: 未配置通知者,跳过事件 - event_type={}, scope={}",
                    event.event_type.as_str(),
                    event.scope
                );
            }
        }
    }

    /// 检查是否配置了通知者
    pub fn is_configured(&self) -> bool {
        self.inner.is_some()
    }
}

impl Default for OptionalEventRecorder {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::event::{OpsEvent, OpsEventType};
    use chrono::NaiveDate;

    fn sample_event() -> OpsEvent {
        let ts = NaiveDate::from_ymd_opt(2026, 5, 18)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        OpsEvent {
            event_id: "E001".to_string(),
            event_type: OpsEventType::PolicyPublished,
            doc_type: "SLA_MARGIN_POLICY".to_string(),
            scope: "GLOBAL".to_string(),
            version_id: "V001".to_string(),
            version_no: 3,
            actor: "ops.lead".to_string(),
            effective_at: ts,
            before_json: None,
            after_json: None,
            correlation_id: "C001".to_string(),
            request_id: None,
            created_at: ts,
        }
    }

    #[test]
    fn test_noop_recorder() {
        let recorder = NoOpEventRecorder;
        let result = recorder.record(&sample_event());
        assert!(result.is_ok());
        assert!(result.unwrap().is_empty());
    }

    #[test]
    fn test_optional_recorder_none() {
        let recorder = OptionalEventRecorder::none();
        assert!(!recorder.is_configured());
        recorder.record(&sample_event());
    }

    #[test]
    fn test_optional_recorder_with_noop() {
        let noop = Arc::new(NoOpEventRecorder) as Arc<dyn PolicyEventRecorder>;
        let recorder = OptionalEventRecorder::with_recorder(noop);
        assert!(recorder.is_configured());
        recorder.record(&sample_event());
    }
}
