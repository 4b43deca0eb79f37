//! 服务任务负载
//!
//! - [`CameraMonitor`]: 摄像头命令监视 (5 Hz)
//! - [`MotorService`]: 电机服务 (100 Hz，两个实例)
//! - [`DiagnosticsLed`]: 诊断指示灯 (4 Hz)
//!
//! 负载只在收到命令字节时被调用，工作量有界，不阻塞。

use crate::actuate::{ActuationSink, Indicator};
use crate::config::{ALERT_BYTE, CLEAR_BYTE};
use crate::tasks::service::{Emitter, Handler};

/// 解码后的命令字节
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// 检测到停车标志
    Alert,
    /// 道路畅通
    Clear,
    Unknown(u8),
}

impl From<u8> for Command {
    fn from(byte: u8) -> Self {
        match byte {
            ALERT_BYTE => Command::Alert,
            CLEAR_BYTE => Command::Clear,
            other => Command::Unknown(other),
        }
    }
}

impl Command {
    pub const fn byte(self) -> u8 {
        match self {
            Command::Alert => ALERT_BYTE,
            Command::Clear => CLEAR_BYTE,
            Command::Unknown(byte) => byte,
        }
    }
}

// ===== 摄像头监视 =====

/// 摄像头命令监视: 记录每个字节并驱动整车停止 / 前进
pub struct CameraMonitor<'a> {
    actuator: &'a dyn ActuationSink,
}

impl<'a> CameraMonitor<'a> {
    pub fn new(actuator: &'a dyn ActuationSink) -> Self {
        Self { actuator }
    }
}

impl Handler for CameraMonitor<'_> {
    fn handle(&mut self, command: Command, out: &mut Emitter<'_>) {
        out.info(format_args!("Received Byte: 0x{:02X}", command.byte()));
        match command {
            Command::Alert => {
                self.actuator.stop();
                out.info(format_args!("Alert: STOP sign detected - vehicle halted"));
            }
            Command::Clear => {
                self.actuator.forward();
                out.info(format_args!("Path clear - Resumed, vehicle continuing"));
            }
            Command::Unknown(byte) => unrecognized(out, byte),
        }
    }
}

// ===== 电机服务 =====

/// 电机服务: 停车标志时停止，畅通时恢复前进
pub struct MotorService<'a> {
    actuator: &'a dyn ActuationSink,
}

impl<'a> MotorService<'a> {
    pub fn new(actuator: &'a dyn ActuationSink) -> Self {
        Self { actuator }
    }
}

impl Handler for MotorService<'_> {
    fn handle(&mut self, command: Command, out: &mut Emitter<'_>) {
        match command {
            Command::Alert => {
                self.actuator.stop();
                out.info(format_args!("STOP sign detected - motor stopped"));
            }
            Command::Clear => {
                self.actuator.forward();
                out.info(format_args!("Path clear - Resumed forward"));
            }
            Command::Unknown(byte) => unrecognized(out, byte),
        }
    }
}

// ===== 诊断指示灯 =====

/// 诊断指示灯: 停车标志时点亮，畅通时熄灭
pub struct DiagnosticsLed<'a> {
    led: &'a dyn Indicator,
}

impl<'a> DiagnosticsLed<'a> {
    pub fn new(led: &'a dyn Indicator) -> Self {
        Self { led }
    }
}

impl Handler for DiagnosticsLed<'_> {
    fn handle(&mut self, command: Command, out: &mut Emitter<'_>) {
        match command {
            Command::Alert => {
                self.led.set(true);
                out.info(format_args!("Received command 0x{:02X}: LED on", ALERT_BYTE));
            }
            Command::Clear => {
                self.led.set(false);
                out.info(format_args!("Received command 0x{:02X}: LED off", CLEAR_BYTE));
            }
            Command::Unknown(byte) => unrecognized(out, byte),
        }
    }
}

fn unrecognized(out: &mut Emitter<'_>, byte: u8) {
    out.warn(format_args!("unrecognized command 0x{:02X} - no action taken", byte));
}
