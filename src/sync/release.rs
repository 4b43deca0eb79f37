//! 周期任务释放信号
//!
//! 计数型 (而非覆盖型) 信号: 序列器在任务还没消费上一次释放时再次释放，
//! 新的释放会排队而不是被吞掉。排队本身记为一次超限 (overrun)；
//! 排队数达到上限后的释放记为一次丢失 (missed release)。
//!
//! 每个任务独占一个信号: 序列器是唯一生产者，所属任务是唯一消费者。

use core::cell::RefCell;
use core::fmt;
use core::future::poll_fn;
use core::task::Poll;

use embassy_sync::waitqueue::WakerRegistration;

use crate::config::MAX_PENDING_RELEASES;
use crate::sync::primitives::CriticalCell;

/// 一次成功释放的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Release {
    /// 之前没有待处理的释放
    Fresh,
    /// 上一次释放尚未被消费，本次已排队
    Queued { pending: u8 },
}

/// 释放失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseError {
    /// 待处理释放已达上限，本次释放丢失
    Saturated { bound: u8 },
}

impl fmt::Display for ReleaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Saturated { bound } => {
                write!(f, "release dropped: {} releases already pending", bound)
            }
        }
    }
}

/// 等待结束的原因
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// 消费了一次周期释放
    Released,
    /// 被强制唤醒 (停机)，没有消费释放
    Interrupted,
}

struct State {
    pending: u8,
    woken: bool,
    overruns: u32,
    missed: u32,
    waker: WakerRegistration,
}

/// 计数型释放信号
pub struct ReleaseSignal {
    bound: u8,
    state: CriticalCell<RefCell<State>>,
}

impl ReleaseSignal {
    /// 使用默认上限 [`MAX_PENDING_RELEASES`]
    pub const fn new() -> Self {
        Self::with_bound(MAX_PENDING_RELEASES)
    }

    /// 指定待处理释放上限 (至少为 1)
    pub const fn with_bound(bound: u8) -> Self {
        let bound = if bound == 0 { 1 } else { bound };
        Self {
            bound,
            state: CriticalCell::new(RefCell::new(State {
                pending: 0,
                woken: false,
                overruns: 0,
                missed: 0,
                waker: WakerRegistration::new(),
            })),
        }
    }

    /// 释放一次 (中断上下文安全)
    pub fn give(&self) -> Result<Release, ReleaseError> {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.pending >= self.bound {
                state.missed = state.missed.saturating_add(1);
                return Err(ReleaseError::Saturated { bound: self.bound });
            }

            state.pending += 1;
            state.waker.wake();

            if state.pending == 1 {
                Ok(Release::Fresh)
            } else {
                state.overruns = state.overruns.saturating_add(1);
                Ok(Release::Queued {
                    pending: state.pending,
                })
            }
        })
    }

    /// 强制唤醒等待者，不计入释放
    ///
    /// 停机路径使用: 即使信号已饱和也保证阻塞的任务醒来检查停机标志
    pub fn wake(&self) {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            state.woken = true;
            state.waker.wake();
        });
    }

    /// 异步等待下一次释放
    ///
    /// 有待处理释放时立即返回并消费一次
    pub async fn wait(&self) -> Wake {
        poll_fn(|cx| {
            self.state.lock(|state| {
                let mut state = state.borrow_mut();
                if state.pending > 0 {
                    state.pending -= 1;
                    Poll::Ready(Wake::Released)
                } else if state.woken {
                    state.woken = false;
                    Poll::Ready(Wake::Interrupted)
                } else {
                    state.waker.register(cx.waker());
                    Poll::Pending
                }
            })
        })
        .await
    }

    /// 非阻塞消费一次释放
    pub fn try_take(&self) -> bool {
        self.state.lock(|state| {
            let mut state = state.borrow_mut();
            if state.pending > 0 {
                state.pending -= 1;
                true
            } else {
                false
            }
        })
    }

    /// 当前待处理释放数
    pub fn pending(&self) -> u8 {
        self.state.lock(|state| state.borrow().pending)
    }

    /// 释放时发现上一次尚未消费的次数
    pub fn overruns(&self) -> u32 {
        self.state.lock(|state| state.borrow().overruns)
    }

    /// 因饱和而丢失的释放次数
    pub fn missed(&self) -> u32 {
        self.state.lock(|state| state.borrow().missed)
    }

    pub fn bound(&self) -> u8 {
        self.bound
    }
}

impl Default for ReleaseSignal {
    fn default() -> Self {
        Self::new()
    }
}
