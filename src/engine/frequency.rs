// ==========================================
// 医疗设备维护管理系统 - 维护频率解析引擎
// ==========================================
// 职责: 频率代码 → 日历间隔 → 下次到期日
// 输入: 基准日期(上次完成日或任务创建日) + 频率代码
// 输出: 按日历月推进的下次到期日(月末夹取)
// ==========================================
// 纯函数引擎: 无副作用，相同输入恒定输出
// ==========================================

use crate::domain::types::FrequencyCode;
use chrono::{Months, NaiveDate};
use tracing::warn;

// ==========================================
// FrequencyResolver - 频率解析引擎
// ==========================================
pub struct FrequencyResolver {
    // 无状态引擎,不需要注入依赖
}

impl FrequencyResolver {
    /// 构造函数
    pub fn new() -> Self {
        Self {}
    }

    /// 解析频率代码；无法识别时回退到季度
    ///
    /// 回退行为沿用历史系统：脏主数据不得阻断排程。
    /// 回退时输出 warn 日志，便于数据治理发现录入错误。
    pub fn resolve_code(&self, raw_code: Option<&str>) -> FrequencyCode {
        match raw_code {
            Some(code) => FrequencyCode::parse(code).unwrap_or_else(|| {
                warn!(code = %code, "无法识别的维护频率代码，回退到 QUARTERLY");
                FrequencyCode::Quarterly
            }),
            None => {
                warn!("维护频率代码缺失，回退到 QUARTERLY");
                FrequencyCode::Quarterly
            }
        }
    }

    /// 计算下次到期日
    ///
    /// 按日历月推进，月末自动夹取（1月31日 + 1月 = 2月28/29日），
    /// 不使用固定30天块。
    pub fn next_due_date(&self, baseline: NaiveDate, code: FrequencyCode) -> NaiveDate {
        // NaiveDate + Months 仅在超出日历表示范围时为 None
        baseline
            .checked_add_months(Months::new(code.months()))
            .unwrap_or(NaiveDate::MAX)
    }

    /// 从原始代码字符串直接计算下次到期日（含回退）
    pub fn next_due_date_from_raw(&self, baseline: NaiveDate, raw_code: Option<&str>) -> NaiveDate {
        let code = self.resolve_code(raw_code);
        self.next_due_date(baseline, code)
    }
}

impl Default for FrequencyResolver {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_next_due_date_all_codes() {
        let resolver = FrequencyResolver::new();
        let baseline = d(2024, 1, 15);

        assert_eq!(resolver.next_due_date(baseline, FrequencyCode::Monthly), d(2024, 2, 15));
        assert_eq!(resolver.next_due_date(baseline, FrequencyCode::Bimonthly), d(2024, 3, 15));
        assert_eq!(resolver.next_due_date(baseline, FrequencyCode::Quarterly), d(2024, 4, 15));
        assert_eq!(resolver.next_due_date(baseline, FrequencyCode::Semiannual), d(2024, 7, 15));
        assert_eq!(resolver.next_due_date(baseline, FrequencyCode::Annual), d(2025, 1, 15));
    }

    #[test]
    fn test_end_of_month_clamping() {
        let resolver = FrequencyResolver::new();

        // 1月31日 + 1月 = 2月29日 (2024闰年)
        assert_eq!(
            resolver.next_due_date(d(2024, 1, 31), FrequencyCode::Monthly),
            d(2024, 2, 29)
        );
        // 非闰年夹取到2月28日
        assert_eq!(
            resolver.next_due_date(d(2023, 1, 31), FrequencyCode::Monthly),
            d(2023, 2, 28)
        );
        // 8月31日 + 2月 = 10月31日 (不受中间9月30天影响)
        assert_eq!(
            resolver.next_due_date(d(2024, 8, 31), FrequencyCode::Bimonthly),
            d(2024, 10, 31)
        );
        // 闰日 + 1年 = 2月28日
        assert_eq!(
            resolver.next_due_date(d(2024, 2, 29), FrequencyCode::Annual),
            d(2025, 2, 28)
        );
    }

    #[test]
    fn test_determinism_and_idempotence() {
        let resolver = FrequencyResolver::new();
        let baseline = d(2024, 3, 31);

        for code in [
            FrequencyCode::Monthly,
            FrequencyCode::Bimonthly,
            FrequencyCode::Quarterly,
            FrequencyCode::Semiannual,
            FrequencyCode::Annual,
        ] {
            let first = resolver.next_due_date(baseline, code);
            let second = resolver.next_due_date(baseline, code);
            assert_eq!(first, second, "相同输入必须得到相同输出: {}", code);
        }
    }

    #[test]
    fn test_unknown_code_falls_back_to_quarterly() {
        let resolver = FrequencyResolver::new();
        let baseline = d(2024, 1, 10);

        // 未知代码与缺失代码均按季度处理
        assert_eq!(resolver.next_due_date_from_raw(baseline, Some("weekly")), d(2024, 4, 10));
        assert_eq!(resolver.next_due_date_from_raw(baseline, None), d(2024, 4, 10));
        // 可识别代码正常解析
        assert_eq!(resolver.next_due_date_from_raw(baseline, Some("monthly")), d(2024, 2, 10));
    }
}
