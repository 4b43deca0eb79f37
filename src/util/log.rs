//! 条件编译日志系统
//!
//! 根据 feature 选择后端:
//! - `log-defmt`: defmt (二进制日志，经 RTT 输出)
//! - `dev` / `log-println`: esp-println (串口文本日志)
//! - 都未启用 (主机测试 / release): 不输出，参数仍做类型检查
//!
//! 这些宏只用于内部诊断 (序列器、停机协调、启动过程)。
//! 任务的追踪行和计时报告走 [`crate::util::trace::LogSink`]。
//!
//! 五个级别宏都转发到 `__log_emit!`，后端只在那里选择一次:
//! `log_error!` / `log_warn!` / `log_info!` / `log_debug!` / `log_trace!`

#[cfg(feature = "log-defmt")]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($level:ident, $tag:literal, $($arg:tt)*) => {
        defmt::$level!($($arg)*)
    };
}

#[cfg(all(any(feature = "dev", feature = "log-println"), not(feature = "log-defmt")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($level:ident, $tag:literal, $($arg:tt)*) => {
        esp_println::println!(concat!("[", $tag, "] {}"), format_args!($($arg)*))
    };
}

// `if false` 让只在日志里出现的变量不产生未使用警告
#[cfg(not(any(feature = "dev", feature = "log-defmt", feature = "log-println")))]
#[doc(hidden)]
#[macro_export]
macro_rules! __log_emit {
    ($level:ident, $tag:literal, $($arg:tt)*) => {
        if false {
            let _ = format_args!($($arg)*);
        }
    };
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => { $crate::__log_emit!(error, "ERROR", $($arg)*) };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => { $crate::__log_emit!(warn, "WARN", $($arg)*) };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => { $crate::__log_emit!(info, "INFO", $($arg)*) };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => { $crate::__log_emit!(debug, "DEBUG", $($arg)*) };
}

#[macro_export]
macro_rules! log_trace {
    ($($arg:tt)*) => { $crate::__log_emit!(trace, "TRACE", $($arg)*) };
}
