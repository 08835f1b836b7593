// ==========================================
// 奢品物流运营控制台 - 守护规则领域模型
// ==========================================
// 依据: Ops_Engine_Specs_v1.0.md - 4.2 守护规则
// 红线: 所有规则必须输出 message (可解释性)
// ==========================================

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::types::{GuardSeverity, GuardType};

// ==========================================
// Guard - 守护规则命中
// ==========================================
// 阻断语义:
// - severity=ERROR 且 requires_override=false: 直接阻断
// - severity=ERROR 且 requires_override=true: 需显式突破 (留痕) 才可继续
// - WARNING / INFO: 永不阻断
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guard {
    pub id: String,
    pub guard_type: GuardType,
    pub severity: GuardSeverity,
    pub message: String,
    pub affected_entities: Vec<String>, // 受影响实体 (如货件ID)
    pub requires_override: bool,
}

impl Guard {
    /// 构造错误级守护命中
    pub fn error(guard_type: GuardType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            guard_type,
            severity: GuardSeverity::Error,
            message: message.into(),
            affected_entities: Vec::new(),
            requires_override: false,
        }
    }

    /// 构造警告级守护命中
    pub fn warning(guard_type: GuardType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            guard_type,
            severity: GuardSeverity::Warning,
            message: message.into(),
            affected_entities: Vec::new(),
            requires_override: false,
        }
    }

    /// 构造提示级守护命中
    pub fn info(guard_type: GuardType, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            guard_type,
            severity: GuardSeverity::Info,
            message: message.into(),
            affected_entities: Vec::new(),
            requires_override: false,
        }
    }

    pub fn with_affected(mut self, entities: Vec<String>) -> Self {
        self.affected_entities = entities;
        self
    }

    pub fn with_override(mut self) -> Self {
        self.requires_override = true;
        self
    }

    /// 在未突破的前提下是否阻断操作
    pub fn is_blocking(&self) -> bool {
        self.severity == GuardSeverity::Error
    }

    /// 是否属于保护降级 (触发双人审批,与严重度无关)
    pub fn is_protection_lowering(&self) -> bool {
        self.guard_type.is_protection_lowering()
    }
}

/// 判断守护命中列表是否包含阻断项
///
/// - override_acknowledged=false: 任一 ERROR 均阻断
/// - override_acknowledged=true: 仅不可突破的 ERROR 阻断
pub fn has_blocking(guards: &[Guard], override_acknowledged: bool) -> bool {
    guards.iter().any(|g| {
        g.is_blocking() && !(override_acknowledged && g.requires_override)
    })
}

/// 过滤出阻断项 (供错误消息罗列全部违规)
pub fn blocking_guards(guards: &[Guard], override_acknowledged: bool) -> Vec<Guard> {
    guards
        .iter()
        .filter(|g| g.is_blocking() && !(override_acknowledged && g.requires_override))
        .cloned()
        .collect()
}

/// 是否存在保护降级命中 (审批门控输入)
pub fn protection_lowering_present(guards: &[Guard]) -> bool {
    guards.iter().any(|g| g.is_protection_lowering())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blocking_semantics() {
        let hard = Guard::error(GuardType::OverbookingCap, "超订比例超过上限");
        let soft = Guard::error(GuardType::CapacityLowering, "产能下调冲突").with_override();
        let warn = Guard::warning(GuardType::RushCap, "加急预留偏高");

        // 未突破: 两个 ERROR 均阻断
        assert!(has_blocking(&[hard.clone(), warn.clone()], false));
        assert!(has_blocking(&[soft.clone()], false));

        // 已突破: 可突破项放行,不可突破项仍阻断
        assert!(!has_blocking(&[soft.clone(), warn.clone()], true));
        assert!(has_blocking(&[hard.clone(), soft], true));

        // 警告永不阻断
        assert!(!has_blocking(&[warn], false));
    }

    #[test]
    fn test_protection_lowering_detection() {
        let relax = Guard::warning(GuardType::SlaRelaxation, "tier3 时限放宽");
        let cap = Guard::warning(GuardType::RushCap, "加急预留偏高");

        assert!(protection_lowering_present(&[cap.clone(), relax]));
        assert!(!protection_lowering_present(&[cap]));
    }
}
