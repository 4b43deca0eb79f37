//! 基准 tick 序列器
//!
//! 每个基准 tick 在中断上下文调用一次 [`Sequencer::on_tick`]:
//! 只使用原子操作和临界区，从不阻塞。
//!
//! 本次 tick 的编号 `T` 是调用前的计数值 (第一个 tick 为 0)。
//! `T` 达到 horizon 时发起停机 (只发起一次)，之后的 tick 不做任何事。

use heapless::Vec;
use portable_atomic::{AtomicU64, Ordering};

use super::plan::RatePlan;
use super::shutdown::ShutdownCoordinator;
use super::{Clock, TaskId, Tick};
use crate::actuate::ActuationSink;
use crate::config::{MAX_TASKS, TASK_NAMES};
use crate::sync::primitives::AtomicCounter;
use crate::sync::release::Release;
use crate::util::trace::{emit, Level, LogSink};
use crate::{log_info, log_warn};

const NAME: &str = "sequencer";

/// 单次 tick 的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// 正常 tick，包含本次释放的已启动任务 (按速率表顺序)
    Released(Vec<TaskId, MAX_TASKS>),
    /// 本次 tick 达到 horizon 并发起了停机
    ShutdownInitiated,
    /// 停机之后的 tick
    Halted,
}

impl TickOutcome {
    pub fn released(&self) -> &[TaskId] {
        match self {
            TickOutcome::Released(tasks) => tasks,
            _ => &[],
        }
    }
}

/// 速率表驱动的释放器
pub struct Sequencer<'a> {
    plan: RatePlan,
    horizon: Tick,
    counter: AtomicU64,
    missed: AtomicCounter,
    coordinator: &'a ShutdownCoordinator,
    actuator: &'a dyn ActuationSink,
    sink: &'a dyn LogSink,
}

impl<'a> Sequencer<'a> {
    pub fn new(
        plan: RatePlan,
        horizon: Tick,
        coordinator: &'a ShutdownCoordinator,
        actuator: &'a dyn ActuationSink,
        sink: &'a dyn LogSink,
    ) -> Self {
        Self {
            plan,
            horizon,
            counter: AtomicU64::new(0),
            missed: AtomicCounter::new(),
            coordinator,
            actuator,
            sink,
        }
    }

    pub fn plan(&self) -> &RatePlan {
        &self.plan
    }

    pub fn horizon(&self) -> Tick {
        self.horizon
    }

    /// 因信号饱和丢失的释放总数
    pub fn missed_releases(&self) -> u32 {
        self.missed.get()
    }

    /// tick 中断处理
    pub fn on_tick(&self) -> TickOutcome {
        if self.coordinator.is_initiated() {
            return TickOutcome::Halted;
        }

        let tick = self.counter.load(Ordering::Acquire);
        if tick >= self.horizon {
            if !self.coordinator.initiate() {
                return TickOutcome::Halted;
            }
            self.actuator.stop();
            emit(
                self.sink,
                tick,
                NAME,
                Level::Info,
                format_args!("Horizon reached after {} ticks - shutting down", tick),
            );
            log_info!("Sequencer horizon {} reached", tick);
            return TickOutcome::ShutdownInitiated;
        }

        // 先推进时钟，被释放的任务看到的是本次 tick 之后的时间
        self.counter.store(tick + 1, Ordering::Release);

        // 未启动的任务没有消费者，不向它释放
        let mut released = self.plan.releases_at(tick);
        released.retain(|&task| self.coordinator.started_slot(task).is_some());
        for &task in &released {
            let Some(slot) = self.coordinator.started_slot(task) else {
                continue;
            };
            let name = TASK_NAMES.get(task).copied().unwrap_or("?");
            match slot.release.give() {
                Ok(Release::Fresh) => {}
                Ok(Release::Queued { pending }) => emit(
                    self.sink,
                    tick,
                    NAME,
                    Level::Warn,
                    format_args!("overrun: {} released with {} pending", name, pending),
                ),
                Err(err) => {
                    let missed = self.missed.increment();
                    emit(
                        self.sink,
                        tick,
                        NAME,
                        Level::Warn,
                        format_args!("release for {} failed: {}", name, err),
                    );
                    log_warn!("Release for task {} missed ({} total)", task, missed);
                }
            }
        }

        TickOutcome::Released(released)
    }
}

impl Clock for Sequencer<'_> {
    /// 已处理的 tick 数
    fn now(&self) -> Tick {
        self.counter.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuate::Drive;
    use crate::config::RATE_PLAN;
    use crate::sched::plan::RateEntry;
    use crate::testing::{RecordingActuator, RecordingSink};

    fn register_all(coordinator: &ShutdownCoordinator) {
        for task in 0..MAX_TASKS {
            coordinator.register(task);
        }
    }

    fn drain_releases(coordinator: &ShutdownCoordinator) {
        for task in 0..MAX_TASKS {
            let slot = coordinator.slot(task).unwrap();
            while slot.release.try_take() {}
        }
    }

    #[test]
    fn test_reference_release_sets() {
        let coordinator = ShutdownCoordinator::new();
        let actuator = RecordingActuator::new();
        let sink = RecordingSink::new();
        let plan = RatePlan::new(&RATE_PLAN).unwrap();
        let sequencer = Sequencer::new(plan, 1000, &coordinator, &actuator, &sink);
        register_all(&coordinator);

        let mut sets: std::vec::Vec<(Tick, std::vec::Vec<TaskId>)> = std::vec::Vec::new();
        for _ in 0..=100 {
            let tick = sequencer.now();
            let outcome = sequencer.on_tick();
            if matches!(tick, 0 | 1 | 20 | 25 | 40 | 50 | 100) {
                sets.push((tick, outcome.released().to_vec()));
            }
            drain_releases(&coordinator);
        }

        let expected: [(Tick, std::vec::Vec<TaskId>); 7] = [
            (0, vec![0, 1, 2, 3]),
            (1, vec![1, 2]),
            (20, vec![0, 1, 2]),
            (25, vec![1, 2, 3]),
            (40, vec![0, 1, 2]),
            (50, vec![1, 2, 3]),
            (100, vec![0, 1, 2, 3]),
        ];
        assert_eq!(sets, expected);
        assert_eq!(sequencer.now(), 101);
        assert_eq!(sequencer.missed_releases(), 0);
        assert!(actuator.commands().is_empty());
    }

    #[test]
    fn test_horizon_initiates_shutdown_once() {
        let coordinator = ShutdownCoordinator::new();
        let actuator = RecordingActuator::new();
        let sink = RecordingSink::new();
        let plan = RatePlan::new(&RATE_PLAN).unwrap();
        let sequencer = Sequencer::new(plan, 3, &coordinator, &actuator, &sink);
        register_all(&coordinator);

        for _ in 0..3 {
            assert!(matches!(sequencer.on_tick(), TickOutcome::Released(_)));
            drain_releases(&coordinator);
        }
        assert!(!coordinator.is_initiated());

        assert_eq!(sequencer.on_tick(), TickOutcome::ShutdownInitiated);
        assert!(coordinator.is_initiated());
        assert_eq!(actuator.commands(), [Drive::Stop]);
        // 停机 tick 不释放任何任务
        for task in 0..MAX_TASKS {
            assert_eq!(coordinator.slot(task).unwrap().release.pending(), 0);
        }

        assert_eq!(sequencer.on_tick(), TickOutcome::Halted);
        assert_eq!(sequencer.on_tick(), TickOutcome::Halted);
        assert_eq!(actuator.commands().len(), 1);
        assert_eq!(sequencer.now(), 3);
        assert_eq!(sink.count("Horizon reached"), 1);
    }

    #[test]
    fn test_unconsumed_releases_are_queued_then_missed() {
        let coordinator = ShutdownCoordinator::with_release_bound(2);
        let actuator = RecordingActuator::new();
        let sink = RecordingSink::new();
        let plan = RatePlan::new(&[RateEntry::new(1, 1)]).unwrap();
        let sequencer = Sequencer::new(plan, 100, &coordinator, &actuator, &sink);
        coordinator.register(1);

        // 任务一直不消费
        sequencer.on_tick();
        sequencer.on_tick();
        assert!(sink.contains("[sequencer] Warning: overrun: motor1 released with 2 pending"));
        sequencer.on_tick();

        assert_eq!(sequencer.missed_releases(), 1);
        assert!(sink.contains("release for motor1 failed"));
        let slot = coordinator.slot(1).unwrap();
        assert_eq!(slot.release.pending(), 2);
        assert_eq!(slot.release.overruns(), 1);
        assert_eq!(slot.release.missed(), 1);
    }

    #[test]
    fn test_unstarted_tasks_are_not_released() {
        let coordinator = ShutdownCoordinator::new();
        let actuator = RecordingActuator::new();
        let sink = RecordingSink::new();
        let plan = RatePlan::new(&RATE_PLAN).unwrap();
        let sequencer = Sequencer::new(plan, 1000, &coordinator, &actuator, &sink);

        // 只有 motor1 启动并消费释放，其余任务启动失败
        coordinator.register(1);
        let motor1 = coordinator.slot(1).unwrap();
        let mut executions = 0;
        loop {
            let outcome = sequencer.on_tick();
            if outcome != TickOutcome::ShutdownInitiated {
                assert!(outcome.released().iter().all(|&task| task == 1));
            }
            while motor1.release.try_take() {
                executions += 1;
            }
            if outcome == TickOutcome::ShutdownInitiated {
                break;
            }
        }

        assert_eq!(executions, 1000);
        assert_eq!(sequencer.missed_releases(), 0);
        assert!(!sink.contains("failed"));
        assert!(!sink.contains("overrun"));
        for task in [0, 2, 3] {
            assert_eq!(coordinator.slot(task).unwrap().release.pending(), 0);
        }
    }
}
