//! 执行器接口
//!
//! 调度核心只通过这里的 trait 驱动外设:
//! - [`ActuationSink`]: 电机驱动命令 (停止 / 前进 / 后退)
//! - [`Indicator`]: 诊断指示灯
//!
//! 所有命令都是幂等的、不会失败的调用；引脚错误在实现内部处理。

pub mod led;
pub mod motor;

pub use led::StatusLed;
pub use motor::{BridgeFault, DriveTrain, HBridge};

/// 电机驱动命令
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    Stop,
    Forward,
    Reverse,
}

impl Drive {
    /// 每个执行器两根互补控制线的目标电平 (A, B)
    pub const fn lines(self) -> (bool, bool) {
        match self {
            Drive::Stop => (false, false),
            Drive::Forward => (true, false),
            Drive::Reverse => (false, true),
        }
    }
}

/// 电机命令接收者
///
/// 序列器 (中断上下文) 与服务任务都会调用，实现必须自行互斥
pub trait ActuationSink: Sync {
    fn command(&self, drive: Drive);

    #[inline]
    fn forward(&self) {
        self.command(Drive::Forward);
    }

    #[inline]
    fn reverse(&self) {
        self.command(Drive::Reverse);
    }

    #[inline]
    fn stop(&self) {
        self.command(Drive::Stop);
    }
}

/// 开关型指示器
pub trait Indicator: Sync {
    fn set(&self, on: bool);

    fn is_on(&self) -> bool;
}
