//! 停机协调
//!
//! 持有每个任务独占的释放信号与停机标志，以及所有任务在最终
//! 计时报告阶段共享的输出锁。
//!
//! 停机顺序: 先置位所有停机标志，再唤醒所有释放信号。
//! 任务醒来后必须自行检查停机标志，不能假设是正常调度唤醒。
//! 任务间的退出顺序只由输出锁的获取顺序决定。

use portable_atomic::{AtomicBool, AtomicUsize, Ordering};

use super::TaskId;
use crate::config::MAX_TASKS;
use crate::sync::primitives::{CriticalMutex, CriticalSignal, ShutdownFlag};
use crate::sync::release::ReleaseSignal;
use crate::{log_debug, log_info};

/// 单个任务的调度状态
///
/// 序列器只写 (释放 / 置位)，所属任务只读 (等待 / 检查)。
/// 未登记的槽位没有消费者，序列器不向它释放。
pub struct TaskSlot {
    pub release: ReleaseSignal,
    pub shutdown: ShutdownFlag,
    started: AtomicBool,
}

impl TaskSlot {
    pub const fn new() -> Self {
        Self {
            release: ReleaseSignal::new(),
            shutdown: ShutdownFlag::new(),
            started: AtomicBool::new(false),
        }
    }

    pub const fn with_bound(bound: u8) -> Self {
        Self {
            release: ReleaseSignal::with_bound(bound),
            shutdown: ShutdownFlag::new(),
            started: AtomicBool::new(false),
        }
    }

    /// 是否有服务任务在消费这个槽位
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

impl Default for TaskSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// 停机协调器
pub struct ShutdownCoordinator {
    slots: [TaskSlot; MAX_TASKS],
    /// 最终报告输出锁 (防止不同任务的报告行交错)
    flush_lock: CriticalMutex<()>,
    registered: AtomicUsize,
    exited: AtomicUsize,
    finished: CriticalSignal<usize>,
}

impl ShutdownCoordinator {
    pub const fn new() -> Self {
        // 使用 const 初始化
        #[allow(clippy::declare_interior_mutable_const)]
        const SLOT: TaskSlot = TaskSlot::new();
        Self {
            slots: [SLOT; MAX_TASKS],
            flush_lock: CriticalMutex::new(()),
            registered: AtomicUsize::new(0),
            exited: AtomicUsize::new(0),
            finished: CriticalSignal::new(),
        }
    }

    /// 指定释放信号排队上限
    pub fn with_release_bound(bound: u8) -> Self {
        Self {
            slots: core::array::from_fn(|_| TaskSlot::with_bound(bound)),
            ..Self::new()
        }
    }

    pub fn slot(&self, task: TaskId) -> Option<&TaskSlot> {
        self.slots.get(task)
    }

    pub fn flush_lock(&self) -> &CriticalMutex<()> {
        &self.flush_lock
    }

    /// 发起停机 (中断上下文安全)
    ///
    /// 返回 `false` 表示停机早已发起
    pub fn initiate(&self) -> bool {
        let mut first = false;
        for slot in &self.slots {
            first |= !slot.shutdown.raise();
        }
        for slot in &self.slots {
            slot.release.wake();
        }
        if first {
            log_info!("Shutdown initiated for {} services", self.registered());
        }
        first
    }

    pub fn is_initiated(&self) -> bool {
        self.slots.iter().all(|slot| slot.shutdown.is_raised())
    }

    /// 服务任务启动时登记
    ///
    /// 登记之后序列器才开始向该任务释放。重复登记同一任务只算一次，
    /// 越界编号返回 `false`。
    pub fn register(&self, task: TaskId) -> bool {
        let Some(slot) = self.slots.get(task) else {
            return false;
        };
        if slot.started.swap(true, Ordering::AcqRel) {
            return true;
        }
        let count = self.registered.fetch_add(1, Ordering::AcqRel) + 1;
        log_debug!("Service {} registered ({} total)", task, count);
        true
    }

    /// 已登记任务的槽位 (未登记或越界时为 `None`)
    pub fn started_slot(&self, task: TaskId) -> Option<&TaskSlot> {
        self.slot(task).filter(|slot| slot.is_started())
    }

    /// 服务任务完成报告后调用
    ///
    /// 最后一个登记的任务退出时触发 [`Self::finished`]
    pub fn task_exited(&self, task: TaskId) {
        let exited = self.exited.fetch_add(1, Ordering::AcqRel) + 1;
        log_debug!("Service {} exited ({} of {})", task, exited, self.registered());
        if exited >= self.registered() {
            self.finished.signal(exited);
        }
    }

    pub fn registered(&self) -> usize {
        self.registered.load(Ordering::Acquire)
    }

    pub fn exited(&self) -> usize {
        self.exited.load(Ordering::Acquire)
    }

    /// 等待所有登记的任务完成报告，返回退出的任务数
    pub async fn finished(&self) -> usize {
        self.finished.wait().await
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}
