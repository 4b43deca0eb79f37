//! 主机测试用替身
//!
//! 只在 `cfg(test)` 下编译，可以使用 std。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use core::convert::Infallible;

use embedded_hal::digital::{self, ErrorKind, ErrorType, OutputPin};

use crate::actuate::{ActuationSink, Drive};
use crate::sched::{Clock, Tick};
use crate::util::trace::{Level, LogSink, TraceLine};

// ===== 引脚 =====

#[derive(Default)]
struct ProbeState {
    lines: [bool; 2],
    writes: usize,
    both_high: bool,
}

/// 观察一对控制线的探针
#[derive(Clone, Default)]
pub struct PinProbe {
    state: Arc<Mutex<ProbeState>>,
}

impl PinProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// 取得第 `line` 根线 (0 或 1) 的引脚
    pub fn pin(&self, line: usize) -> FakePin {
        assert!(line < 2);
        FakePin {
            state: self.state.clone(),
            line,
        }
    }

    pub fn lines(&self) -> (bool, bool) {
        let state = self.state.lock().unwrap();
        (state.lines[0], state.lines[1])
    }

    pub fn writes(&self) -> usize {
        self.state.lock().unwrap().writes
    }

    /// 两根线是否曾同时为高
    pub fn ever_both_high(&self) -> bool {
        self.state.lock().unwrap().both_high
    }
}

/// 记录电平的输出引脚
pub struct FakePin {
    state: Arc<Mutex<ProbeState>>,
    line: usize,
}

impl FakePin {
    fn write(&mut self, high: bool) {
        let mut state = self.state.lock().unwrap();
        state.lines[self.line] = high;
        state.writes += 1;
        if state.lines[0] && state.lines[1] {
            state.both_high = true;
        }
    }
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.write(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.write(true);
        Ok(())
    }
}

#[derive(Debug)]
pub struct PinFailure;

impl digital::Error for PinFailure {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// 每次写入都失败的引脚
pub struct FailingPin;

impl ErrorType for FailingPin {
    type Error = PinFailure;
}

impl OutputPin for FailingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Err(PinFailure)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Err(PinFailure)
    }
}

// ===== 追踪输出 =====

/// 把追踪行渲染成字符串并保存
#[derive(Default)]
pub struct RecordingSink {
    lines: Mutex<Vec<(Level, String)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.count(needle) > 0
    }

    pub fn count(&self, needle: &str) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, line)| line.contains(needle))
            .count()
    }

    pub fn count_level(&self, level: Level) -> usize {
        self.lines
            .lock()
            .unwrap()
            .iter()
            .filter(|(l, _)| *l == level)
            .count()
    }
}

impl LogSink for RecordingSink {
    fn write_line(&self, line: &TraceLine<'_>) {
        self.lines
            .lock()
            .unwrap()
            .push((line.level, line.to_string()));
    }
}

// ===== 时钟 =====

/// 手动推进的时钟
#[derive(Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, ticks: Tick) {
        self.now.fetch_add(ticks, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Tick {
        self.now.load(Ordering::SeqCst)
    }
}

/// 每次读取自增 `step` 的时钟，用来产生非零执行时间
pub struct SteppingClock {
    now: AtomicU64,
    step: Tick,
}

impl SteppingClock {
    pub fn new(step: Tick) -> Self {
        Self {
            now: AtomicU64::new(0),
            step,
        }
    }
}

impl Clock for SteppingClock {
    fn now(&self) -> Tick {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

// ===== 执行器 =====

/// 记录收到的电机命令
#[derive(Default)]
pub struct RecordingActuator {
    commands: Mutex<Vec<Drive>>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> Vec<Drive> {
        self.commands.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<Drive> {
        self.commands.lock().unwrap().last().copied()
    }
}

impl ActuationSink for RecordingActuator {
    fn command(&self, drive: Drive) {
        self.commands.lock().unwrap().push(drive);
    }
}
