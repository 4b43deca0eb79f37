//! 命令字节邮箱
//!
//! 接收中断 (生产者) 写入最新的命令字节，服务任务 (消费者) 读取。
//! 提供两种语义:
//!
//! - [`Mailbox`]: 单槽、覆盖写、读后清除。多个消费者共享一个槽时，
//!   同一次发布只有第一个读取者能看到 `valid = true`，其余读到空。
//! - [`CommandBus`]: 广播。一个已发布值加上每个订阅者的"已见代数"，
//!   每个订阅者对每次更新恰好看到一次。
//!
//! 两者的读写都在同一个临界区域内完成，读取-清除是一个原子操作，
//! 临界区持有时间与任务负载无关 (O(1))。

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::watch;

use crate::config::MAX_TASKS;
use crate::sync::primitives::{CriticalCell, CriticalWatch};

/// 任务读取命令的方式
pub trait Inbox {
    /// 取出一个尚未被本读取者见过的命令字节
    fn take(&mut self) -> Option<u8>;
}

// ===== 单槽邮箱 =====

#[derive(Clone, Copy)]
struct Slot {
    value: u8,
    valid: bool,
    overwritten: u32,
}

/// 单槽覆盖写邮箱
pub struct Mailbox {
    slot: CriticalCell<Cell<Slot>>,
}

impl Mailbox {
    pub const fn new() -> Self {
        Self {
            slot: CriticalCell::new(Cell::new(Slot {
                value: 0,
                valid: false,
                overwritten: 0,
            })),
        }
    }

    /// 发布一个字节 (中断上下文安全)
    ///
    /// 返回 `true` 表示覆盖了一个尚未被读取的值
    pub fn publish(&self, value: u8) -> bool {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            let overwrote = slot.valid;
            if overwrote {
                slot.overwritten = slot.overwritten.saturating_add(1);
            }
            slot.value = value;
            slot.valid = true;
            cell.set(slot);
            overwrote
        })
    }

    /// 读取并清除
    ///
    /// 复制值与清除标志在同一个临界区内完成，不会读到撕裂的状态
    pub fn take(&self) -> Option<u8> {
        self.slot.lock(|cell| {
            let mut slot = cell.get();
            if !slot.valid {
                return None;
            }
            slot.valid = false;
            cell.set(slot);
            Some(slot.value)
        })
    }

    /// 是否有未读数据 (不清除)
    pub fn has_data(&self) -> bool {
        self.slot.lock(|cell| cell.get().valid)
    }

    /// 未被读取就被覆盖的值的个数
    pub fn overwritten(&self) -> u32 {
        self.slot.lock(|cell| cell.get().overwritten)
    }
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new()
    }
}

impl Inbox for &Mailbox {
    fn take(&mut self) -> Option<u8> {
        Mailbox::take(self)
    }
}

// ===== 广播总线 =====

/// 最大订阅者数量 (每个服务任务一个)
pub const MAX_SUBSCRIBERS: usize = MAX_TASKS;

/// 广播命令总线
///
/// 基于 embassy-sync `Watch`: 保存最新值和一个递增代数，
/// 每个订阅者记录自己最后看到的代数。
/// 订阅者来不及读取时被覆盖的旧值不会重放，只保证看到最新值。
pub struct CommandBus {
    watch: CriticalWatch<u8, MAX_SUBSCRIBERS>,
}

impl CommandBus {
    pub const fn new() -> Self {
        Self {
            watch: CriticalWatch::new(),
        }
    }

    /// 发布一个字节给所有订阅者 (中断上下文安全)
    pub fn publish(&self, value: u8) {
        self.watch.sender().send(value);
    }

    /// 新建订阅者，超过 [`MAX_SUBSCRIBERS`] 时返回 `None`
    pub fn subscribe(&self) -> Option<Subscriber<'_>> {
        self.watch.receiver().map(|rx| Subscriber { rx })
    }

    /// 最近一次发布的值
    pub fn latest(&self) -> Option<u8> {
        self.watch.try_get()
    }
}

impl Default for CommandBus {
    fn default() -> Self {
        Self::new()
    }
}

/// 广播总线的单个订阅者
pub struct Subscriber<'a> {
    rx: watch::Receiver<'a, CriticalSectionRawMutex, u8, MAX_SUBSCRIBERS>,
}

impl Subscriber<'_> {
    /// 取出自上次读取以来的最新值
    pub fn take(&mut self) -> Option<u8> {
        self.rx.try_changed()
    }
}

impl Inbox for Subscriber<'_> {
    fn take(&mut self) -> Option<u8> {
        Subscriber::take(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_valid() {
        let mailbox = Mailbox::new();
        assert_eq!(mailbox.take(), None);

        assert!(!mailbox.publish(0xAA));
        assert!(mailbox.has_data());
        assert_eq!(mailbox.take(), Some(0xAA));
        assert!(!mailbox.has_data());
        assert_eq!(mailbox.take(), None);
    }

    #[test]
    fn test_single_publish_is_consumed_by_one_reader() {
        let mailbox = Mailbox::new();
        mailbox.publish(0xAA);

        // 两个任务在下一次发布前各读一次: 至多一个看到数据
        let mut first = &mailbox;
        let mut second = &mailbox;
        let seen = [Inbox::take(&mut first), Inbox::take(&mut second)];
        assert_eq!(seen, [Some(0xAA), None]);
    }

    #[test]
    fn test_publish_overwrites_unread_value() {
        let mailbox = Mailbox::new();
        assert!(!mailbox.publish(0x00));
        assert!(mailbox.publish(0xAA));
        assert_eq!(mailbox.overwritten(), 1);
        assert_eq!(mailbox.take(), Some(0xAA));
    }

    #[test]
    fn test_bus_delivers_each_update_to_every_subscriber() {
        let bus = CommandBus::new();
        let mut a = bus.subscribe().unwrap();
        let mut b = bus.subscribe().unwrap();

        assert_eq!(a.take(), None);

        bus.publish(0xAA);
        assert_eq!(a.take(), Some(0xAA));
        assert_eq!(b.take(), Some(0xAA));
        // 同一次更新只看到一次
        assert_eq!(a.take(), None);
        assert_eq!(b.take(), None);

        bus.publish(0x00);
        assert_eq!(b.take(), Some(0x00));
        assert_eq!(a.take(), Some(0x00));
        assert_eq!(bus.latest(), Some(0x00));
    }

    #[test]
    fn test_bus_subscriber_limit() {
        let bus = CommandBus::new();
        let subs: [Option<Subscriber<'_>>; MAX_SUBSCRIBERS] =
            core::array::from_fn(|_| bus.subscribe());
        assert!(subs.iter().all(Option::is_some));
        assert!(bus.subscribe().is_none());
    }
}
