//! 工具模块
//!
//! - `log`: 条件编译的内部诊断日志宏
//! - `trace`: 任务追踪行输出接口

pub mod log;
pub mod trace;

pub use trace::{Level, LogSink, NullSink, TraceLine};
