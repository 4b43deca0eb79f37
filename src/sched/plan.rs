//! 静态速率表
//!
//! 释放规则是计数取模: tick `T` 释放所有满足 `T % period == 0` 的任务。
//! 周期只需是基准周期的正整数倍，不要求彼此整除。
//!
//! 优先级按速率单调分配: 周期越短优先级越高；
//! 周期相同的任务按任务编号排序 (编号小者优先)。

use core::fmt;

use heapless::Vec;

use super::{TaskId, Tick};
use crate::config::MAX_TASKS;

/// 速率表条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEntry {
    /// 周期 (基准 tick 数)
    pub period: Tick,
    pub task: TaskId,
}

impl RateEntry {
    pub const fn new(period: Tick, task: TaskId) -> Self {
        Self { period, task }
    }

    /// 该条目是否在 `tick` 释放
    #[inline]
    pub fn releases_at(&self, tick: Tick) -> bool {
        tick % self.period == 0
    }

    /// 释放频率 (mHz)，基准频率以 Hz 给出
    pub fn rate_millihertz(&self, base_rate_hz: u32) -> u64 {
        base_rate_hz as u64 * 1000 / self.period
    }
}

/// 速率表校验错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanError {
    /// 没有任何条目
    Empty,
    /// 条目多于任务槽
    TooManyTasks { count: usize },
    /// 周期为 0
    ZeroPeriod { task: TaskId },
    /// 同一任务出现多次
    DuplicateTask { task: TaskId },
    /// 任务编号超出任务槽范围
    TaskIdOutOfRange { task: TaskId },
}

impl fmt::Display for PlanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "Rate plan is empty"),
            Self::TooManyTasks { count } => {
                write!(f, "Rate plan has {} entries, at most {} allowed", count, MAX_TASKS)
            }
            Self::ZeroPeriod { task } => write!(f, "Task {} has a zero period", task),
            Self::DuplicateTask { task } => write!(f, "Task {} appears more than once", task),
            Self::TaskIdOutOfRange { task } => {
                write!(f, "Task id {} out of range (max {})", task, MAX_TASKS - 1)
            }
        }
    }
}

/// 已校验的速率表
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatePlan {
    entries: Vec<RateEntry, MAX_TASKS>,
}

impl RatePlan {
    /// 校验并构造速率表
    pub fn new(entries: &[RateEntry]) -> Result<Self, PlanError> {
        if entries.is_empty() {
            return Err(PlanError::Empty);
        }
        if entries.len() > MAX_TASKS {
            return Err(PlanError::TooManyTasks {
                count: entries.len(),
            });
        }

        let mut plan: Vec<RateEntry, MAX_TASKS> = Vec::new();
        for entry in entries {
            if entry.period == 0 {
                return Err(PlanError::ZeroPeriod { task: entry.task });
            }
            if entry.task >= MAX_TASKS {
                return Err(PlanError::TaskIdOutOfRange { task: entry.task });
            }
            if plan.iter().any(|e| e.task == entry.task) {
                return Err(PlanError::DuplicateTask { task: entry.task });
            }
            plan.push(*entry)
                .map_err(|_| PlanError::TooManyTasks { count: entries.len() })?;
        }

        Ok(Self { entries: plan })
    }

    pub fn entries(&self) -> &[RateEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, task: TaskId) -> Option<&RateEntry> {
        self.entries.iter().find(|e| e.task == task)
    }

    pub fn period_of(&self, task: TaskId) -> Option<Tick> {
        self.entry(task).map(|e| e.period)
    }

    /// `tick` 应释放的任务集合 (按速率表顺序)
    pub fn releases_at(&self, tick: Tick) -> Vec<TaskId, MAX_TASKS> {
        self.entries
            .iter()
            .filter(|e| e.releases_at(tick))
            .map(|e| e.task)
            .collect()
    }

    /// `0..horizon` 内任务被释放的次数，用于确定计时日志容量
    pub fn expected_releases(&self, task: TaskId, horizon: Tick) -> usize {
        match self.period_of(task) {
            Some(period) => horizon.div_ceil(period) as usize,
            None => 0,
        }
    }

    /// 速率单调优先级名次 (0 为最高)
    pub fn priority_rank(&self, task: TaskId) -> Option<usize> {
        let me = self.entry(task)?;
        let rank = self
            .entries
            .iter()
            .filter(|other| (other.period, other.task) < (me.period, me.task))
            .count();
        Some(rank)
    }

    /// 按优先级从高到低排列的任务
    pub fn by_priority(&self) -> Vec<TaskId, MAX_TASKS> {
        let mut sorted = self.entries.clone();
        sorted.sort_unstable_by_key(|e| (e.period, e.task));
        sorted.iter().map(|e| e.task).collect()
    }
}
