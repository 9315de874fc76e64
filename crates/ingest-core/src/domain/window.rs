//! 증분 수집 윈도우 계산.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 아직 수집되지 않은 닫힌 날짜 구간 `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CoverageWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl CoverageWindow {
    /// 목표 구간과 마지막 수집 날짜로 수집할 윈도우를 계산합니다.
    ///
    /// - 수집 이력 없음: `[target_start, target_end]`
    /// - 마지막 수집일 `D < target_end`: `[D + 1, target_end]`
    ///   (`D + 1`이 `target_start`보다 앞이면 `target_start`부터)
    /// - `D >= target_end`: `None` (이미 최신)
    pub fn compute(
        last_covered: Option<NaiveDate>,
        target_start: NaiveDate,
        target_end: NaiveDate,
    ) -> Option<Self> {
        if target_start > target_end {
            return None;
        }

        let start = match last_covered {
            None => target_start,
            Some(covered) if covered >= target_end => return None,
            Some(covered) => covered.succ_opt()?.max(target_start),
        };

        Some(Self {
            start,
            end: target_end,
        })
    }

    /// 윈도우에 포함된 달력상 일수.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// 날짜가 윈도우 안에 있는지 확인.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl fmt::Display for CoverageWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}~{}", self.start.format("%Y%m%d"), self.end.format("%Y%m%d"))
    }
}
