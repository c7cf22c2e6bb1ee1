// ==========================================
// 医疗设备维护管理系统 - 技师分配策略
// ==========================================
// 策略接口: 事件指派时从候选技师中选人。
// 默认实现为“第一个可用”，更智能的分配器
// (最少负载/技能匹配)可替换接入而不改调用方。
// ==========================================

use crate::domain::equipment::Technician;

// ==========================================
// AllocationStrategy - 分配策略接口
// ==========================================
pub trait AllocationStrategy: Send + Sync {
    /// 从候选列表中选出一名技师；无可用技师时返回 None
    fn select_technician<'a>(&self, candidates: &'a [Technician]) -> Option<&'a Technician>;
}

// ==========================================
// FirstAvailableAllocator - 默认分配器
// ==========================================
// 取第一个 available 的候选人
pub struct FirstAvailableAllocator;

impl AllocationStrategy for FirstAvailableAllocator {
    fn select_technician<'a>(&self, candidates: &'a [Technician]) -> Option<&'a Technician> {
        candidates.iter().find(|t| t.available)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tech(id: &str, available: bool) -> Technician {
        Technician {
            technician_id: id.to_string(),
            name: format!("技师{}", id),
            role: "TECHNICIAN".to_string(),
            available,
        }
    }

    #[test]
    fn test_first_available_skips_busy() {
        let allocator = FirstAvailableAllocator;
        let candidates = vec![tech("T-01", false), tech("T-02", true), tech("T-03", true)];

        let selected = allocator.select_technician(&candidates).unwrap();
        assert_eq!(selected.technician_id, "T-02");
    }

    #[test]
    fn test_no_available_technician() {
        let allocator = FirstAvailableAllocator;
        let candidates = vec![tech("T-01", false)];

        assert!(allocator.select_technician(&candidates).is_none());
        assert!(allocator.select_technician(&[]).is_none());
    }
}
