//! StopBot RTOS - 停车标志小车的速率单调循环执行器
//!
//! 本库提供以下核心功能:
//! - 基准 tick 序列器 (静态速率表，计数取模释放)
//! - 计数型释放信号与协调停机
//! - 命令字节邮箱 / 广播总线
//! - 每任务 WCET 计时日志
//! - 条件编译日志系统
//!
//! 核心部分不依赖具体芯片，主机上可直接 `cargo test`；
//! ESP32-S3 固件入口见 `src/main.rs` (feature `esp32s3`)。

#![cfg_attr(not(test), no_std)]

pub mod actuate;
pub mod sched;
pub mod sync;
pub mod tasks;
pub mod util;

#[cfg(test)]
mod testing;

// ===== 重导出常用类型 =====
pub use actuate::{ActuationSink, Drive, DriveTrain, HBridge, Indicator, StatusLed};
pub use sched::{Clock, RateEntry, RatePlan, Sequencer, ShutdownCoordinator, TaskId, Tick, TickOutcome};
pub use sync::{CommandBus, Mailbox};
pub use tasks::{ServiceContext, ServiceTask, SpanArena, TaskSummary};
pub use util::{LogSink, NullSink};

// ===== 版本信息 =====
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// 系统配置常量
pub mod config {
    use crate::sched::{RateEntry, TaskId, Tick};

    /// 基准 tick 频率 (Hz)
    pub const BASE_RATE_HZ: u32 = 100;

    /// 运行时长 (基准 tick 数)，10 秒
    pub const HORIZON_TICKS: Tick = 1000;

    /// 服务任务数量上限
    pub const MAX_TASKS: usize = 4;

    /// 每个释放信号最多排队的释放数
    pub const MAX_PENDING_RELEASES: u8 = 2;

    // ===== 命令字节 =====

    /// 检测到停车标志
    pub const ALERT_BYTE: u8 = 0xAA;

    /// 道路畅通
    pub const CLEAR_BYTE: u8 = 0x00;

    // ===== 任务编号 =====

    pub const CAMERA_TASK: TaskId = 0;
    pub const MOTOR1_TASK: TaskId = 1;
    pub const MOTOR2_TASK: TaskId = 2;
    pub const DIAGNOSTICS_TASK: TaskId = 3;

    /// 追踪行中使用的任务名
    pub const TASK_NAMES: [&str; MAX_TASKS] = ["camera", "motor1", "motor2", "diagnostics"];

    /// 参考速率表: 5 Hz / 100 Hz / 100 Hz / 4 Hz
    pub const RATE_PLAN: [RateEntry; MAX_TASKS] = [
        RateEntry::new(20, CAMERA_TASK),
        RateEntry::new(1, MOTOR1_TASK),
        RateEntry::new(1, MOTOR2_TASK),
        RateEntry::new(25, DIAGNOSTICS_TASK),
    ];

    /// 周期为 `period` 的任务在 horizon 内需要的日志容量
    pub const fn log_capacity(period: Tick) -> usize {
        HORIZON_TICKS.div_ceil(period) as usize
    }

    /// 参考速率表所需的 span 总数
    pub const TOTAL_SPANS: usize = {
        let mut total = 0;
        let mut i = 0;
        while i < RATE_PLAN.len() {
            total += log_capacity(RATE_PLAN[i].period);
            i += 1;
        }
        total
    };

    /// 命令串口波特率
    pub const UART_BAUDRATE: u32 = 115_200;
}
