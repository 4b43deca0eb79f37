//! 双 H 桥电机驱动
//!
//! 每个电机由两根互补 GPIO 控制:
//! - Forward: A 高 B 低
//! - Reverse: A 低 B 高
//! - Stop: A、B 都低
//!
//! 切换方向时先拉低当前有效线再拉高另一根，任何时刻都不会两线同高。
//! 重复当前命令不写引脚。

use core::cell::RefCell;
use core::fmt;

use embedded_hal::digital::{Error as _, ErrorKind, OutputPin};

use super::{ActuationSink, Drive};
use crate::sync::primitives::{AtomicCounter, CriticalCell};
use crate::log_error;

/// 引脚写入失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BridgeFault {
    pub kind: ErrorKind,
}

impl fmt::Display for BridgeFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "H-bridge pin write failed: {}", self.kind)
    }
}

/// 单个 H 桥 (两根控制线)
pub struct HBridge<A, B> {
    a: A,
    b: B,
    /// `None` 表示状态未知 (上电后尚未驱动，或上次写入失败)
    state: Option<Drive>,
}

impl<A: OutputPin, B: OutputPin> HBridge<A, B> {
    pub fn new(a: A, b: B) -> Self {
        Self { a, b, state: None }
    }

    pub fn state(&self) -> Option<Drive> {
        self.state
    }

    /// 驱动到目标状态，返回是否实际写了引脚
    pub fn apply(&mut self, drive: Drive) -> Result<bool, BridgeFault> {
        if self.state == Some(drive) {
            return Ok(false);
        }

        // 写入中途失败时状态未知
        self.state = None;
        // 先写变低的线，两线任何时刻都不会同时为高
        let (a, b) = drive.lines();
        if a {
            self.set_b(b)?;
            self.set_a(a)?;
        } else {
            self.set_a(a)?;
            self.set_b(b)?;
        }
        self.state = Some(drive);
        Ok(true)
    }

    fn set_a(&mut self, high: bool) -> Result<(), BridgeFault> {
        let res = if high { self.a.set_high() } else { self.a.set_low() };
        res.map_err(|e| BridgeFault { kind: e.kind() })
    }

    fn set_b(&mut self, high: bool) -> Result<(), BridgeFault> {
        let res = if high { self.b.set_high() } else { self.b.set_low() };
        res.map_err(|e| BridgeFault { kind: e.kind() })
    }
}

/// 左右两个电机组成的驱动系统
///
/// 内部用临界区互斥，可同时被序列器中断和服务任务调用
pub struct DriveTrain<P> {
    bridges: CriticalCell<RefCell<[HBridge<P, P>; 2]>>,
    faults: AtomicCounter,
}

impl<P: OutputPin + Send> DriveTrain<P> {
    pub fn new(left: HBridge<P, P>, right: HBridge<P, P>) -> Self {
        Self {
            bridges: CriticalCell::new(RefCell::new([left, right])),
            faults: AtomicCounter::new(),
        }
    }

    /// 上电启动: 先确保两个电机停止
    pub fn start(&self) {
        self.command(Drive::Stop);
    }

    /// 两个电机一致时的当前状态
    pub fn state(&self) -> Option<Drive> {
        self.bridges.lock(|bridges| {
            let bridges = bridges.borrow();
            match (bridges[0].state(), bridges[1].state()) {
                (Some(l), Some(r)) if l == r => Some(l),
                _ => None,
            }
        })
    }

    /// 引脚写入失败次数
    pub fn faults(&self) -> u32 {
        self.faults.get()
    }
}

impl<P: OutputPin + Send> ActuationSink for DriveTrain<P> {
    fn command(&self, drive: Drive) {
        self.bridges.lock(|bridges| {
            let mut bridges = bridges.borrow_mut();
            for (index, bridge) in bridges.iter_mut().enumerate() {
                if bridge.apply(drive).is_err() {
                    let count = self.faults.increment();
                    log_error!("Motor {} command failed ({} faults)", index, count);
                    // 尽力停机
                    let _ = bridge.apply(Drive::Stop);
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FailingPin, PinProbe};

    fn probed_train() -> (DriveTrain<crate::testing::FakePin>, PinProbe, PinProbe) {
        let left = PinProbe::new();
        let right = PinProbe::new();
        let train = DriveTrain::new(
            HBridge::new(left.pin(0), left.pin(1)),
            HBridge::new(right.pin(0), right.pin(1)),
        );
        (train, left, right)
    }

    #[test]
    fn test_forward_is_idempotent() {
        let (train, left, right) = probed_train();
        train.forward();
        let writes = left.writes();
        assert_eq!(left.lines(), (true, false));
        assert_eq!(right.lines(), (true, false));

        train.forward();
        assert_eq!(left.writes(), writes);
        assert_eq!(left.lines(), (true, false));
        assert_eq!(train.state(), Some(Drive::Forward));
    }

    #[test]
    fn test_stop_after_forward_drives_both_low() {
        let (train, left, right) = probed_train();
        train.forward();
        train.stop();
        assert_eq!(left.lines(), (false, false));
        assert_eq!(right.lines(), (false, false));

        let writes = left.writes();
        train.stop();
        assert_eq!(left.writes(), writes);
        assert_eq!(train.state(), Some(Drive::Stop));
    }

    #[test]
    fn test_direction_change_never_both_high() {
        let (train, left, right) = probed_train();
        train.forward();
        train.reverse();
        train.forward();
        train.reverse();
        assert_eq!(left.lines(), (false, true));
        assert!(!left.ever_both_high());
        assert!(!right.ever_both_high());
    }

    #[test]
    fn test_start_forces_stop() {
        let (train, left, _right) = probed_train();
        assert_eq!(train.state(), None);
        train.start();
        assert_eq!(train.state(), Some(Drive::Stop));
        assert_eq!(left.lines(), (false, false));
    }

    #[test]
    fn test_pin_fault_is_counted_not_propagated() {
        let train = DriveTrain::new(
            HBridge::new(FailingPin, FailingPin),
            HBridge::new(FailingPin, FailingPin),
        );
        train.forward();
        assert_eq!(train.faults(), 2);
        assert_eq!(train.state(), None);
    }
}
