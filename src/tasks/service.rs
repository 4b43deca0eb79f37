//! 周期服务任务
//!
//! 每个服务任务是一个 `async` 循环:
//!
//! ```text
//! WAITING --释放--> RUNNING --完成--> WAITING
//!    |
//!    +--停机标志--> DRAINING --> TERMINATED
//! ```
//!
//! 每次醒来 (无论是周期释放还是停机唤醒) 都重新检查停机标志，
//! 观察到标志后不再接受新的工作。
//!
//! 计时报告在停机输出锁下一次性写出，不同任务的报告行不会交错。

use core::fmt;

use crate::sched::shutdown::{ShutdownCoordinator, TaskSlot};
use crate::sched::{Clock, TaskId, Tick};
use crate::sync::mailbox::Inbox;
use crate::sync::release::Wake;
use crate::tasks::handlers::Command;
use crate::tasks::timing::{SpanArena, TimestampLog, TimingError};
use crate::util::trace::{emit, Level, LogSink};
use crate::{log_error, log_info};

// ===== 负载接口 =====

/// 任务负载收到命令时的输出句柄
pub struct Emitter<'a> {
    sink: &'a dyn LogSink,
    task: &'a str,
    tick: Tick,
}

impl<'a> Emitter<'a> {
    pub fn new(sink: &'a dyn LogSink, task: &'a str, tick: Tick) -> Self {
        Self { sink, task, tick }
    }

    pub fn tick(&self) -> Tick {
        self.tick
    }

    pub fn info(&mut self, message: fmt::Arguments<'_>) {
        emit(self.sink, self.tick, self.task, Level::Info, message);
    }

    pub fn warn(&mut self, message: fmt::Arguments<'_>) {
        emit(self.sink, self.tick, self.task, Level::Warn, message);
    }

    pub fn error(&mut self, message: fmt::Arguments<'_>) {
        emit(self.sink, self.tick, self.task, Level::Error, message);
    }
}

/// 任务负载
///
/// 只在本次执行取到命令字节时调用；必须有界、不阻塞
pub trait Handler {
    fn handle(&mut self, command: Command, out: &mut Emitter<'_>);
}

impl<F> Handler for F
where
    F: FnMut(Command, &mut Emitter<'_>),
{
    fn handle(&mut self, command: Command, out: &mut Emitter<'_>) {
        self(command, out)
    }
}

// ===== 任务 =====

/// 所有服务任务共享的环境
#[derive(Clone, Copy)]
pub struct ServiceContext<'a> {
    pub coordinator: &'a ShutdownCoordinator,
    pub clock: &'a dyn Clock,
    pub sink: &'a dyn LogSink,
}

/// 任务启动失败
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartError {
    /// 任务编号没有对应的任务槽
    NoSlot { task: TaskId },
    /// 计时日志分配失败
    Timing(TimingError),
}

impl fmt::Display for StartError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoSlot { task } => write!(f, "no task slot for id {}", task),
            Self::Timing(err) => write!(f, "{}", err),
        }
    }
}

impl From<TimingError> for StartError {
    fn from(err: TimingError) -> Self {
        Self::Timing(err)
    }
}

/// 任务结束时的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskSummary {
    pub id: TaskId,
    /// 执行次数 (含未能记录的)
    pub executions: u32,
    /// 日志中记录的执行次数
    pub recorded: usize,
    pub wcet: Tick,
    pub overflowed: u32,
    pub overruns: u32,
    pub missed: u32,
}

/// 周期服务任务
pub struct ServiceTask<'a, I, H> {
    id: TaskId,
    name: &'a str,
    slot: &'a TaskSlot,
    inbox: I,
    handler: H,
    log: TimestampLog<'a>,
    ctx: ServiceContext<'a>,
    executions: u32,
}

impl<'a, I: Inbox, H: Handler> ServiceTask<'a, I, H> {
    /// 用已分配的日志创建任务，并向协调器登记
    pub fn new(
        id: TaskId,
        name: &'a str,
        inbox: I,
        handler: H,
        log: TimestampLog<'a>,
        ctx: ServiceContext<'a>,
    ) -> Result<Self, StartError> {
        let slot = ctx
            .coordinator
            .slot(id)
            .ok_or(StartError::NoSlot { task: id })?;
        ctx.coordinator.register(id);
        Ok(Self {
            id,
            name,
            slot,
            inbox,
            handler,
            log,
            ctx,
            executions: 0,
        })
    }

    /// 从区域切出 `capacity` 条日志并创建任务
    ///
    /// 失败时写一条错误追踪行，该任务不启动，其他任务不受影响
    pub fn try_start(
        id: TaskId,
        name: &'a str,
        inbox: I,
        handler: H,
        arena: &mut SpanArena<'a>,
        capacity: usize,
        ctx: ServiceContext<'a>,
    ) -> Result<Self, StartError> {
        let started = arena
            .carve(capacity)
            .map_err(StartError::from)
            .and_then(|log| Self::new(id, name, inbox, handler, log, ctx));

        if let Err(err) = &started {
            emit(
                ctx.sink,
                ctx.clock.now(),
                name,
                Level::Error,
                format_args!("{} - service not started", err),
            );
            log_error!("Service {} failed to start", id);
        }
        started
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn log(&self) -> &TimestampLog<'a> {
        &self.log
    }

    /// 执行一次: 取命令、调用负载、记录起止时间
    pub fn run_once(&mut self) {
        let start = self.ctx.clock.now();

        if let Some(byte) = self.inbox.take() {
            let mut out = Emitter::new(self.ctx.sink, self.name, start);
            self.handler.handle(Command::from(byte), &mut out);
        }

        let end = self.ctx.clock.now();
        self.executions = self.executions.saturating_add(1);

        match self.log.record(start, end) {
            Ok(()) => {}
            Err(TimingError::Overflow { capacity }) => emit(
                self.ctx.sink,
                end,
                self.name,
                Level::Warn,
                format_args!(
                    "timing log full ({} entries), execution {} not recorded",
                    capacity, self.executions
                ),
            ),
            Err(err) => emit(
                self.ctx.sink,
                end,
                self.name,
                Level::Error,
                format_args!("execution {}: {}", self.executions, err),
            ),
        }
    }

    /// 任务主循环，停机后输出报告并返回统计
    pub async fn run(mut self) -> TaskSummary {
        log_info!("Service {} started", self.id);

        loop {
            if self.slot.shutdown.is_raised() {
                break;
            }
            let wake = self.slot.release.wait().await;
            // 醒来后重新检查
            if self.slot.shutdown.is_raised() {
                break;
            }
            if wake == Wake::Released {
                self.run_once();
            }
        }

        self.drain().await
    }

    /// 当前统计
    pub fn summary(&self) -> TaskSummary {
        TaskSummary {
            id: self.id,
            executions: self.executions,
            recorded: self.log.count(),
            wcet: self.log.wcet(),
            overflowed: self.log.overflowed(),
            overruns: self.slot.release.overruns(),
            missed: self.slot.release.missed(),
        }
    }

    /// 在输出锁下写出计时报告，然后通知协调器
    pub async fn drain(self) -> TaskSummary {
        let summary = self.summary();
        let ctx = self.ctx;

        {
            let _guard = ctx.coordinator.flush_lock().lock().await;
            let tick = ctx.clock.now();
            let line = |level: Level, message: fmt::Arguments<'_>| {
                emit(ctx.sink, tick, self.name, level, message)
            };

            for (i, span) in self.log.spans().iter().enumerate() {
                line(
                    Level::Info,
                    format_args!(
                        "Execution {} - Start: {}, End: {}, Execution Time: {}",
                        i + 1,
                        span.start,
                        span.end,
                        span.duration()
                    ),
                );
            }
            line(
                Level::Info,
                format_args!(
                    "Summary: Total Executions: {}, WCET: {}",
                    summary.executions, summary.wcet
                ),
            );
            if summary.overflowed > 0 {
                line(
                    Level::Warn,
                    format_args!(
                        "{} of {} executions not recorded (timing log full)",
                        summary.overflowed, summary.executions
                    ),
                );
            }
            if summary.overruns > 0 {
                line(
                    Level::Warn,
                    format_args!("{} overruns (released while still pending)", summary.overruns),
                );
            }
            if summary.missed > 0 {
                line(
                    Level::Warn,
                    format_args!("{} releases missed", summary.missed),
                );
            }
        }

        // 释放日志存储
        drop(self.log);
        ctx.coordinator.task_exited(summary.id);
        summary
    }
}
