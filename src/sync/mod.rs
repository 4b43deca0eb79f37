//! 同步原语模块
//!
//! 中断与任务之间共享状态的全部手段:
//! - `primitives`: embassy-sync 类型别名、停机标志、原子计数器
//! - `release`: 计数型周期释放信号
//! - `mailbox`: 单槽邮箱与广播命令总线

pub mod mailbox;
pub mod primitives;
pub mod release;

pub use mailbox::{CommandBus, Inbox, Mailbox, Subscriber};
pub use primitives::{AtomicCounter, CriticalCell, CriticalMutex, CriticalSignal, ShutdownFlag};
pub use release::{Release, ReleaseError, ReleaseSignal, Wake};
