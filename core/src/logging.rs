//! 日志系统初始化

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::time::FormatTime;
use tracing_subscriber::{EnvFilter, fmt};

/// 未设置 `RUST_LOG` 时的过滤规则；图形后端的 info 日志过多，只保留警告
const DEFAULT_FILTER: &str = "info,wgpu_core=warn,wgpu_hal=warn,naga=warn";

/// 只显示 `HH:MM:SS.微秒`（UTC）的时间格式
struct ClockTime;

/// 一天内的时刻（时, 分, 秒, 微秒）
fn clock_of_day(since_epoch: Duration) -> (u64, u64, u64, u32) {
    let secs = since_epoch.as_secs();
    (
        (secs / 3600) % 24,
        (secs / 60) % 60,
        secs % 60,
        since_epoch.subsec_micros(),
    )
}

impl FormatTime for ClockTime {
    fn format_time(&self, w: &mut Writer<'_>) -> std::fmt::Result {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        let (h, m, s, micros) = clock_of_day(now);
        write!(w, "{h:02}:{m:02}:{s:02}.{micros:06}")
    }
}

/// 初始化全局日志系统
///
/// 日志级别由环境变量 `RUST_LOG` 控制：
///
/// ```bash
/// RUST_LOG=debug ltl-piano           # 显示串口探测与收到的消息
/// RUST_LOG=ltl_piano::link=debug ltl-piano
/// ```
///
/// 重复调用时保留第一次安装的订阅者。
pub fn init_logging() {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_ansi(true)
        .with_timer(ClockTime)
        .compact()
        .try_init();
}
