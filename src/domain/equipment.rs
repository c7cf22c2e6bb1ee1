// ==========================================
// 医疗设备维护管理系统 - 设备引用模型
// ==========================================
// 设备主数据归外部 CRUD 服务所有。
// 引擎只读取以下字段，并在完成维护/事件升级时
// 回写 last/next_maintenance_date 与 status。
// ==========================================

use crate::domain::types::EquipmentStatus;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ==========================================
// EquipmentRecord - 设备引用
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentRecord {
    pub equipment_id: String,                      // 设备ID
    pub name: String,                              // 设备名称
    pub maintenance_frequency_code: Option<String>, // 维护频率代码(原始字符串)
    pub last_maintenance_date: Option<NaiveDate>,  // 上次维护日期
    pub next_maintenance_date: Option<NaiveDate>,  // 下次维护日期
    pub requires_calibration: bool,                // 是否需要校准
    pub risk_class: Option<String>,                // 风险分级(I/II/III)
    pub status: EquipmentStatus,                   // 运行状态
}

impl EquipmentRecord {
    /// 是否在用
    pub fn is_operative(&self) -> bool {
        self.status == EquipmentStatus::Operative
    }
}

// ==========================================
// Technician - 技师
// ==========================================
// 来自外部技师名录服务
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Technician {
    pub technician_id: String, // 技师ID
    pub name: String,          // 姓名
    pub role: String,          // 角色(如 TECHNICIAN / BIOMEDICAL)
    pub available: bool,       // 当前是否可接单
}
