//! 任务追踪输出
//!
//! 服务任务与序列器通过 [`LogSink`] 输出面向人的追踪行:
//! 每个事件一行，包含 tick、任务名和消息。
//! 具体格式只是可观测性细节，不属于调度契约。

use core::fmt;

use crate::sched::Tick;

/// 追踪行级别
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Warn,
    Error,
}

impl Level {
    pub const fn tag(self) -> &'static str {
        match self {
            Level::Info => "",
            Level::Warn => "Warning: ",
            Level::Error => "Error: ",
        }
    }
}

/// 单条追踪行
pub struct TraceLine<'a> {
    /// 事件发生时的 tick
    pub tick: Tick,
    /// 来源任务名
    pub task: &'a str,
    pub level: Level,
    pub message: fmt::Arguments<'a>,
}

impl fmt::Display for TraceLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] [{}] {}{}",
            self.tick,
            self.task,
            self.level.tag(),
            self.message
        )
    }
}

/// 行式、只追加的文本输出
///
/// 固件中通常是串口控制台；测试中是内存记录器。
/// 实现必须可在中断上下文调用 (序列器在 tick 中断里上报失败)。
pub trait LogSink: Sync {
    fn write_line(&self, line: &TraceLine<'_>);
}

/// 丢弃所有追踪行
pub struct NullSink;

impl LogSink for NullSink {
    fn write_line(&self, _line: &TraceLine<'_>) {}
}

/// 便捷函数: 构造并写出一行
#[inline]
pub fn emit(sink: &dyn LogSink, tick: Tick, task: &str, level: Level, message: fmt::Arguments<'_>) {
    sink.write_line(&TraceLine {
        tick,
        task,
        level,
        message,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(tick: Tick, task: &str, level: Level, message: fmt::Arguments<'_>) -> String {
        TraceLine {
            tick,
            task,
            level,
            message,
        }
        .to_string()
    }

    #[test]
    fn test_line_format() {
        assert_eq!(
            render(42, "motor1", Level::Warn, format_args!("unrecognized command 0x{:02X}", 0x7Fu8)),
            "[42] [motor1] Warning: unrecognized command 0x7F"
        );
    }

    #[test]
    fn test_info_has_no_tag() {
        assert_eq!(
            render(0, "camera", Level::Info, format_args!("started")),
            "[0] [camera] started"
        );
    }
}
