//! StopBot 固件 - ESP32-S3 停车标志小车
//!
//! 基于 Embassy 异步运行时的速率单调循环执行器:
//! - Priority3 执行器: 100 Hz 序列器 (基准 tick)
//! - Priority2 执行器: 两个电机服务 (100 Hz)
//! - Priority1 执行器: 摄像头命令监视 (5 Hz)、UART 接收
//! - 线程模式: 诊断指示灯 (4 Hz)、停机等待
//!
//! 运行 `HORIZON_TICKS` 个 tick (10 秒) 后停车，各任务输出计时报告。
//!
//! 硬件目标: ESP32-S3 (Xtensa LX7 @ 240MHz)

#![no_std]
#![no_main]

use embassy_executor::Spawner;
use embassy_time::{Duration, Instant, Ticker, Timer};
use esp_hal::{
    gpio::{Level as PinLevel, Output, OutputConfig},
    interrupt::{software::SoftwareInterruptControl, Priority},
    timer::timg::TimerGroup,
    uart::{Config as UartConfig, Uart},
    Async,
};
use esp_rtos::embassy::InterruptExecutor;
use static_cell::StaticCell;

use stopbot_rtos::actuate::{ActuationSink, DriveTrain, HBridge, StatusLed};
use stopbot_rtos::config::{
    BASE_RATE_HZ, CAMERA_TASK, DIAGNOSTICS_TASK, HORIZON_TICKS, MOTOR1_TASK, MOTOR2_TASK,
    RATE_PLAN, TASK_NAMES, TOTAL_SPANS, UART_BAUDRATE,
};
use stopbot_rtos::sched::{Clock, RatePlan, Sequencer, ShutdownCoordinator, TaskId, Tick, TickOutcome};
use stopbot_rtos::sync::{CommandBus, Subscriber};
use stopbot_rtos::tasks::{
    CameraMonitor, DiagnosticsLed, Handler, MotorService, ServiceContext, ServiceTask, Span,
    SpanArena, TaskSummary,
};
use stopbot_rtos::util::trace::{LogSink, TraceLine};
use stopbot_rtos::{log_error, log_info, log_warn};

esp_bootloader_esp_idf::esp_app_desc!();

// ===== 日志后端 =====
#[cfg(feature = "log-defmt")]
use defmt_rtt as _;

// ===== Panic Handler =====
#[cfg(any(feature = "dev", feature = "log-println"))]
use esp_backtrace as _;

#[cfg(not(any(feature = "dev", feature = "log-println")))]
#[panic_handler]
fn panic(_info: &core::panic::PanicInfo) -> ! {
    loop {
        core::hint::spin_loop();
    }
}

// ===== 硬件适配 =====

type Pin = Output<'static>;
type Service<H> = ServiceTask<'static, Subscriber<'static>, H>;

/// 启动后的微秒数，作为任务计时的时间戳
struct UptimeClock;

impl Clock for UptimeClock {
    fn now(&self) -> Tick {
        Instant::now().as_micros()
    }
}

/// 串口控制台追踪输出
struct ConsoleSink;

impl LogSink for ConsoleSink {
    #[cfg(any(feature = "dev", feature = "log-println"))]
    fn write_line(&self, line: &TraceLine<'_>) {
        esp_println::println!("{}", line);
    }

    #[cfg(not(any(feature = "dev", feature = "log-println")))]
    fn write_line(&self, _line: &TraceLine<'_>) {}
}

// ===== 静态分配 =====
static SEQUENCER_EXECUTOR: StaticCell<InterruptExecutor<3>> = StaticCell::new();
static MOTOR_EXECUTOR: StaticCell<InterruptExecutor<2>> = StaticCell::new();
static CAMERA_EXECUTOR: StaticCell<InterruptExecutor<1>> = StaticCell::new();

static COORDINATOR: ShutdownCoordinator = ShutdownCoordinator::new();
static COMMANDS: CommandBus = CommandBus::new();
static CLOCK: UptimeClock = UptimeClock;
static CONSOLE: ConsoleSink = ConsoleSink;

static DRIVE: StaticCell<DriveTrain<Pin>> = StaticCell::new();
static LED: StaticCell<StatusLed<Pin>> = StaticCell::new();
static SEQUENCER: StaticCell<Sequencer<'static>> = StaticCell::new();
static SPANS: StaticCell<[Span; TOTAL_SPANS]> = StaticCell::new();

// ===== 任务 =====

/// 基准 tick: 每个周期调用一次序列器
#[embassy_executor::task]
async fn sequencer_task(sequencer: &'static Sequencer<'static>) {
    let period = Duration::from_hz(BASE_RATE_HZ as u64);
    let mut ticker = Ticker::every(period);
    log_info!("Sequencer started: {} Hz, horizon {} ticks", BASE_RATE_HZ, HORIZON_TICKS);

    loop {
        ticker.next().await;
        match sequencer.on_tick() {
            TickOutcome::Released(_) => {}
            TickOutcome::ShutdownInitiated | TickOutcome::Halted => break,
        }
    }

    log_info!("Sequencer stopped, {} missed releases", sequencer.missed_releases());
}

#[embassy_executor::task(pool_size = 2)]
async fn motor_service(task: Service<MotorService<'static>>) {
    report(task.run().await);
}

#[embassy_executor::task]
async fn camera_service(task: Service<CameraMonitor<'static>>) {
    report(task.run().await);
}

#[embassy_executor::task]
async fn diagnostics_service(task: Service<DiagnosticsLed<'static>>) {
    report(task.run().await);
}

fn report(summary: TaskSummary) {
    log_info!(
        "Service {} terminated: {} executions, WCET {} us",
        summary.id,
        summary.executions,
        summary.wcet
    );
}

/// UART 命令接收: 每个字节发布到命令总线
#[embassy_executor::task]
async fn uart_rx_task(mut uart: Uart<'static, Async>) {
    let mut buf = [0u8; 16];
    loop {
        match uart.read_async(&mut buf).await {
            Ok(len) => {
                for &byte in &buf[..len] {
                    COMMANDS.publish(byte);
                }
            }
            Err(_) => log_warn!("UART receive error"),
        }
    }
}

// ===== 启动辅助 =====

/// 为任务订阅命令总线并分配计时日志；失败时该任务不启动
fn start_service<H: Handler>(
    id: TaskId,
    handler: H,
    plan: &RatePlan,
    arena: &mut SpanArena<'static>,
    ctx: ServiceContext<'static>,
) -> Option<Service<H>> {
    let Some(inbox) = COMMANDS.subscribe() else {
        log_error!("No command subscriber left for service {}", id);
        return None;
    };
    let capacity = plan.expected_releases(id, HORIZON_TICKS);
    ServiceTask::try_start(id, TASK_NAMES[id], inbox, handler, arena, capacity, ctx).ok()
}

// ===== 主入口点 =====
#[esp_rtos::main]
async fn main(thread_spawner: Spawner) {
    // ========================================
    // 1. 硬件初始化
    // ========================================
    let peripherals = esp_hal::init(esp_hal::Config::default());

    log_info!("StopBot starting on ESP32-S3");

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    esp_rtos::start(timg0.timer0);

    let sw_ints = SoftwareInterruptControl::new(peripherals.SW_INTERRUPT);

    // ========================================
    // 2. 执行器 (速率单调优先级)
    // ========================================
    let sequencer_spawner = SEQUENCER_EXECUTOR
        .init(InterruptExecutor::new(sw_ints.software_interrupt3))
        .start(Priority::Priority3);
    let motor_spawner = MOTOR_EXECUTOR
        .init(InterruptExecutor::new(sw_ints.software_interrupt2))
        .start(Priority::Priority2);
    let camera_spawner = CAMERA_EXECUTOR
        .init(InterruptExecutor::new(sw_ints.software_interrupt1))
        .start(Priority::Priority1);

    // ========================================
    // 3. 执行器外设: 电机、指示灯
    // ========================================
    let drive: &'static DriveTrain<Pin> = DRIVE.init(DriveTrain::new(
        HBridge::new(
            Output::new(peripherals.GPIO4, PinLevel::Low, OutputConfig::default()),
            Output::new(peripherals.GPIO5, PinLevel::Low, OutputConfig::default()),
        ),
        HBridge::new(
            Output::new(peripherals.GPIO6, PinLevel::Low, OutputConfig::default()),
            Output::new(peripherals.GPIO7, PinLevel::Low, OutputConfig::default()),
        ),
    ));
    let led: &'static StatusLed<Pin> = LED.init(StatusLed::new(Output::new(
        peripherals.GPIO2,
        PinLevel::Low,
        OutputConfig::default(),
    )));

    // 上电先停再前进
    drive.start();
    drive.forward();
    log_info!("Drive train started, moving forward");

    // ========================================
    // 4. 命令串口
    // ========================================
    match Uart::new(
        peripherals.UART1,
        UartConfig::default().with_baudrate(UART_BAUDRATE),
    ) {
        Ok(uart) => {
            let uart = uart.with_rx(peripherals.GPIO18).into_async();
            camera_spawner.must_spawn(uart_rx_task(uart));
        }
        Err(_) => log_error!("UART1 configuration failed, no commands will arrive"),
    }

    // ========================================
    // 5. 速率表、计时日志、服务任务
    // ========================================
    let plan = match RatePlan::new(&RATE_PLAN) {
        Ok(plan) => plan,
        Err(_) => {
            log_error!("Invalid rate plan, scheduler not started");
            loop {
                Timer::after(Duration::from_secs(60)).await;
            }
        }
    };

    let ctx = ServiceContext {
        coordinator: &COORDINATOR,
        clock: &CLOCK,
        sink: &CONSOLE,
    };
    let spans: &'static mut [Span; TOTAL_SPANS] = SPANS.init_with(|| [Span::ZERO; TOTAL_SPANS]);
    let mut arena = SpanArena::new(spans);

    // 按速率单调优先级从高到低启动；执行器优先级与名次对应
    for task in plan.by_priority() {
        if let (Some(entry), Some(rank)) = (plan.entry(task), plan.priority_rank(task)) {
            log_info!(
                "Task {} ({}): every {} ticks ({} mHz), rank {}",
                task,
                TASK_NAMES[task],
                entry.period,
                entry.rate_millihertz(BASE_RATE_HZ),
                rank
            );
        }

        match task {
            // motor1 / motor2 周期相同，共用 Priority2 执行器，同级之间按唤醒顺序运行
            MOTOR1_TASK | MOTOR2_TASK => {
                if let Some(service) =
                    start_service(task, MotorService::new(drive), &plan, &mut arena, ctx)
                {
                    motor_spawner.must_spawn(motor_service(service));
                }
            }
            CAMERA_TASK => {
                if let Some(service) =
                    start_service(task, CameraMonitor::new(drive), &plan, &mut arena, ctx)
                {
                    camera_spawner.must_spawn(camera_service(service));
                }
            }
            DIAGNOSTICS_TASK => {
                if let Some(service) =
                    start_service(task, DiagnosticsLed::new(led), &plan, &mut arena, ctx)
                {
                    thread_spawner.must_spawn(diagnostics_service(service));
                }
            }
            _ => log_warn!("Task {} has no service, not started", task),
        }
    }

    // ========================================
    // 6. 序列器 (最后启动，服务任务已在等待释放)
    // ========================================
    let sequencer: &'static Sequencer<'static> =
        SEQUENCER.init(Sequencer::new(plan, HORIZON_TICKS, &COORDINATOR, drive, &CONSOLE));
    sequencer_spawner.must_spawn(sequencer_task(sequencer));

    log_info!("All tasks spawned, running for {} ticks", HORIZON_TICKS);

    // ========================================
    // 7. 等待所有服务完成报告
    // ========================================
    let exited = COORDINATOR.finished().await;
    log_info!("All {} services finished, vehicle stopped", exited);

    loop {
        Timer::after(Duration::from_secs(60)).await;
    }
}
