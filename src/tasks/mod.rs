//! 服务任务模块
//!
//! - `service`: 周期服务任务主循环、停机报告
//! - `handlers`: 各任务的负载 (摄像头 / 电机 / 诊断灯)
//! - `timing`: 每任务的固定容量计时日志

pub mod handlers;
pub mod service;
pub mod timing;

pub use handlers::{CameraMonitor, Command, DiagnosticsLed, MotorService};
pub use service::{Emitter, Handler, ServiceContext, ServiceTask, StartError, TaskSummary};
pub use timing::{Span, SpanArena, TimestampLog, TimingError};
