//! 同步原语封装
//!
//! 基于 embassy-sync 提供的同步原语，统一使用 CriticalSectionRawMutex
//! 以确保在 tick 中断与任务之间共享时的正确性

use embassy_sync::{
    blocking_mutex::{raw::CriticalSectionRawMutex, Mutex as BlockingMutex},
    mutex::Mutex,
    signal::Signal,
    watch::Watch,
};
use portable_atomic::{AtomicBool, AtomicU32, Ordering};

// ===== 类型别名: 简化使用 =====

/// 临界区信号量 - 用于任务间单值通知
///
/// 多次发送只保留最后一个值，因此**不能**用作周期释放信号
/// (见 [`crate::sync::release::ReleaseSignal`])
pub type CriticalSignal<T> = Signal<CriticalSectionRawMutex, T>;

/// 临界区互斥锁 - 异步互斥访问
///
/// # Example
/// ```ignore
/// static FLUSH: CriticalMutex<()> = CriticalMutex::new(());
///
/// {
///     let _guard = FLUSH.lock().await;
///     // 独占输出
/// } // 自动释放锁
/// ```
pub type CriticalMutex<T> = Mutex<CriticalSectionRawMutex, T>;

/// 阻塞式临界区锁 - 中断上下文可用
///
/// 闭包内禁止任何异步操作或长时间计算
pub type CriticalCell<T> = BlockingMutex<CriticalSectionRawMutex, T>;

/// 观察者 - 广播最新值给所有订阅者
///
/// # Type Parameters
/// * `T` - 值类型 (必须实现 Clone)
/// * `N` - 最大观察者数量
pub type CriticalWatch<T, const N: usize> = Watch<CriticalSectionRawMutex, T, N>;

// ===== 原子标志 =====

/// 停机标志
///
/// 单调: 只能从 false 变为 true，永不复位。
/// 由序列器 (中断上下文) 置位，由所属任务在每次唤醒后读取。
pub struct ShutdownFlag {
    flag: AtomicBool,
}

impl ShutdownFlag {
    pub const fn new() -> Self {
        Self {
            flag: AtomicBool::new(false),
        }
    }

    /// 置位标志，返回之前是否已置位
    #[inline(always)]
    pub fn raise(&self) -> bool {
        self.flag.swap(true, Ordering::AcqRel)
    }

    #[inline(always)]
    pub fn is_raised(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// 原子计数器 - 用于统计事件次数
pub struct AtomicCounter {
    count: AtomicU32,
}

impl AtomicCounter {
    pub const fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    /// 增加并返回新值 (饱和，不回绕)
    #[inline(always)]
    pub fn increment(&self) -> u32 {
        let prev = self
            .count
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |c| Some(c.saturating_add(1)))
            .unwrap_or_else(|c| c);
        prev.saturating_add(1)
    }

    /// 获取当前值
    #[inline(always)]
    pub fn get(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for ShutdownFlag {
    fn default() -> Self {
        Self::new()
    }
}

impl Default for AtomicCounter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_flag_is_monotonic() {
        let flag = ShutdownFlag::new();
        assert!(!flag.is_raised());
        assert!(!flag.raise());
        assert!(flag.is_raised());
        // 再次置位保持 true
        assert!(flag.raise());
        assert!(flag.is_raised());
    }

    #[test]
    fn test_counter_increment() {
        let counter = AtomicCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.get(), 2);
    }
}
