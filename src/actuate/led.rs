//! 诊断指示灯

use core::cell::RefCell;

use embedded_hal::digital::OutputPin;

use super::Indicator;
use crate::log_warn;
use crate::sync::primitives::CriticalCell;

struct LedState<P> {
    pin: P,
    on: bool,
}

/// 单 GPIO 指示灯，重复设置同一状态不写引脚
pub struct StatusLed<P> {
    inner: CriticalCell<RefCell<LedState<P>>>,
}

impl<P: OutputPin + Send> StatusLed<P> {
    /// 创建并熄灭
    pub fn new(mut pin: P) -> Self {
        if pin.set_low().is_err() {
            log_warn!("Status LED init write failed");
        }
        Self {
            inner: CriticalCell::new(RefCell::new(LedState { pin, on: false })),
        }
    }
}

impl<P: OutputPin + Send> Indicator for StatusLed<P> {
    fn set(&self, on: bool) {
        self.inner.lock(|inner| {
            let mut inner = inner.borrow_mut();
            if inner.on == on {
                return;
            }
            let res = if on { inner.pin.set_high() } else { inner.pin.set_low() };
            match res {
                Ok(()) => inner.on = on,
                Err(_) => log_warn!("Status LED write failed"),
            }
        });
    }

    fn is_on(&self) -> bool {
        self.inner.lock(|inner| inner.borrow().on)
    }
}
