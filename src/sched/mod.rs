//! 循环执行器调度模块
//!
//! - `plan`: 静态速率表 (周期以基准 tick 计)
//! - `sequencer`: tick 中断处理，按速率表释放任务，到期后发起停机
//! - `shutdown`: 每任务的释放信号 / 停机标志，以及停机协调

pub mod plan;
pub mod sequencer;
pub mod shutdown;

pub use plan::{PlanError, RateEntry, RatePlan};
pub use sequencer::{Sequencer, TickOutcome};
pub use shutdown::{ShutdownCoordinator, TaskSlot};

/// 系统时间单位
///
/// 序列器每个基准 tick 加一；固件也可以用更细的时钟作为时间戳来源
pub type Tick = u64;

/// 任务编号 (速率表与任务槽的索引)
pub type TaskId = usize;

/// 时间来源
pub trait Clock: Sync {
    fn now(&self) -> Tick;
}
