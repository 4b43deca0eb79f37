//! 任务计时日志
//!
//! 每个服务任务在启动时从一块静态区域 ([`SpanArena`]) 切出固定容量的
//! span 存储，运行期间只追加，永不重新分配。
//!
//! # 不变量
//! - `count <= capacity`
//! - 每个已记录 span 满足 `end >= start`
//! - `wcet == max(end - start)`，只统计已记录的 span
//!
//! 日志满后的记录不会越界写入，而是置位 `overflowed` 并返回错误。

use core::fmt;
use core::mem;

use crate::sched::Tick;

/// 一次执行的起止时间
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    pub start: Tick,
    pub end: Tick,
}

impl Span {
    pub const ZERO: Span = Span { start: 0, end: 0 };

    #[inline]
    pub const fn duration(&self) -> Tick {
        self.end - self.start
    }
}

/// 计时错误
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimingError {
    /// 日志已满，本次执行未记录
    Overflow { capacity: usize },
    /// 结束时间早于开始时间
    InvalidSpan { start: Tick, end: Tick },
    /// 区域剩余空间不足
    ArenaExhausted { requested: usize, available: usize },
}

impl fmt::Display for TimingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Overflow { capacity } => {
                write!(f, "timing log full ({} entries)", capacity)
            }
            Self::InvalidSpan { start, end } => {
                write!(f, "invalid span: end {} before start {}", end, start)
            }
            Self::ArenaExhausted {
                requested,
                available,
            } => write!(
                f,
                "span arena exhausted: requested {}, available {}",
                requested, available
            ),
        }
    }
}

// ===== 静态区域 =====

/// span 存储区域
///
/// 固件中底层数组放在 `StaticCell` 里，启动时切给各任务
pub struct SpanArena<'a> {
    free: &'a mut [Span],
}

impl<'a> SpanArena<'a> {
    pub fn new(storage: &'a mut [Span]) -> Self {
        Self { free: storage }
    }

    /// 剩余 span 数
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// 切出一个容量为 `capacity` 的日志
    ///
    /// 空间不足时不切割，区域保持原样
    pub fn carve(&mut self, capacity: usize) -> Result<TimestampLog<'a>, TimingError> {
        if capacity > self.free.len() {
            return Err(TimingError::ArenaExhausted {
                requested: capacity,
                available: self.free.len(),
            });
        }
        let free = mem::take(&mut self.free);
        let (taken, rest) = free.split_at_mut(capacity);
        self.free = rest;
        Ok(TimestampLog::new(taken))
    }
}

// ===== 计时日志 =====

/// 固定容量的执行记录
pub struct TimestampLog<'a> {
    spans: &'a mut [Span],
    count: usize,
    wcet: Tick,
    overflowed: u32,
}

impl<'a> TimestampLog<'a> {
    pub fn new(spans: &'a mut [Span]) -> Self {
        Self {
            spans,
            count: 0,
            wcet: 0,
            overflowed: 0,
        }
    }

    /// 记录一次执行
    pub fn record(&mut self, start: Tick, end: Tick) -> Result<(), TimingError> {
        if end < start {
            return Err(TimingError::InvalidSpan { start, end });
        }
        let Some(slot) = self.spans.get_mut(self.count) else {
            self.overflowed = self.overflowed.saturating_add(1);
            return Err(TimingError::Overflow {
                capacity: self.spans.len(),
            });
        };

        *slot = Span { start, end };
        self.count += 1;
        self.wcet = self.wcet.max(end - start);
        Ok(())
    }

    /// 已记录的 span
    pub fn spans(&self) -> &[Span] {
        &self.spans[..self.count]
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn capacity(&self) -> usize {
        self.spans.len()
    }

    pub fn wcet(&self) -> Tick {
        self.wcet
    }

    /// 因日志已满未能记录的执行次数
    pub fn overflowed(&self) -> u32 {
        self.overflowed
    }

    pub fn is_full(&self) -> bool {
        self.count == self.spans.len()
    }
}
