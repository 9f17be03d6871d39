//! 串口连接管理
//!
//! 状态机：`Disconnected → Probing → Connected → Disconnected`
//!
//! - 手动指定串口时直接打开，成功即视为已连接
//! - 自动发现时逐个探测候选串口，每帧一次有界读取，收到心跳即确认
//! - 读取失败或心跳超时回到 `Disconnected`，串口句柄随状态一同释放

pub mod protocol;
pub mod serial;

#[cfg(test)]
pub(crate) mod fake;

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config;
use crate::error::{LinkError, ProtocolWarning};
use crate::link::protocol::{HEARTBEAT, LineBuffer, SerialMsg, parse_line};

/// 串口信息
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// 设备名（如 `COM3`、`/dev/ttyACM0`）
    pub name: String,
    /// 设备描述
    pub description: String,
}

/// 面向行文本的串口
pub trait LinePort {
    /// 设备名
    fn name(&self) -> &str;

    /// 读取一段数据，最多等待一个读超时周期；超时无数据返回 `None`
    ///
    /// # Errors
    ///
    /// - 读取失败（设备断开等）
    fn read_chunk(&mut self) -> Result<Option<String>, LinkError>;

    /// 仅读取已经到达的数据，不等待
    ///
    /// # Errors
    ///
    /// - 读取失败（设备断开等）
    fn read_available(&mut self) -> Result<Option<String>, LinkError> {
        self.read_chunk()
    }
}

/// 串口枚举与打开
pub trait PortProvider {
    /// 打开后的串口类型
    type Port: LinePort;

    /// 枚举当前可用串口
    ///
    /// # Errors
    ///
    /// - 系统枚举失败
    fn available_ports(&mut self) -> Result<Vec<PortInfo>, LinkError>;

    /// 打开指定串口
    ///
    /// # Errors
    ///
    /// - 打开失败
    fn open(&mut self, name: &str) -> Result<Self::Port, LinkError>;
}

/// 串口选择方式
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortMode {
    /// 自动发现
    Auto,
    /// 手动指定串口名
    Manual(String),
}

/// 连接状态机参数
#[derive(Debug, Clone)]
pub struct LinkSettings {
    /// 串口选择方式
    pub mode: PortMode,
    /// 每个候选串口的探测读取次数
    pub probe_attempts: u32,
    /// 心跳超时
    pub heartbeat_timeout: Duration,
    /// 一轮发现失败后的重试间隔
    pub retry_interval: Duration,
    /// 跳过的串口描述（小写）
    pub skip_patterns: Vec<String>,
}

impl From<&config::Link> for LinkSettings {
    fn from(cfg: &config::Link) -> Self {
        let mode = if cfg.port.eq_ignore_ascii_case("auto") {
            PortMode::Auto
        } else {
            PortMode::Manual(cfg.port.clone())
        };
        Self {
            mode,
            probe_attempts: cfg.probe_attempts.max(1),
            heartbeat_timeout: cfg.heartbeat_timeout,
            retry_interval: cfg.retry_interval,
            skip_patterns: cfg.skip_patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }
}

impl LinkSettings {
    /// 该串口是否应被跳过
    fn should_skip(&self, info: &PortInfo) -> bool {
        let desc = info.description.to_lowercase();
        let name = info.name.to_lowercase();
        self.skip_patterns
            .iter()
            .any(|p| desc.contains(p.as_str()) || name.contains(p.as_str()))
    }
}

/// 对外可见的连接状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkStatus {
    /// 未连接
    Disconnected,
    /// 正在探测候选串口
    Probing,
    /// 已连接
    Connected,
}

/// 正在探测的单个串口
struct ProbeAttempt<T> {
    /// 已打开的串口
    port: T,
    /// 已进行的读取次数
    attempts: u32,
    /// 行缓冲
    lines: LineBuffer,
    /// 心跳之后收到的行
    backlog: Vec<String>,
}

/// 一轮探测
struct Probe<T> {
    /// 尚未尝试的候选串口
    candidates: VecDeque<PortInfo>,
    /// 当前正在探测的串口
    current: Option<ProbeAttempt<T>>,
}

/// 已建立的连接
struct Connection<T> {
    /// 已打开的串口
    port: T,
    /// 最近一次心跳时间
    last_heartbeat: Instant,
    /// 行缓冲
    lines: LineBuffer,
    /// 探测阶段心跳之后收到、尚未分发的行
    backlog: Vec<String>,
}

/// 连接状态；串口句柄只存在于 `Probing` / `Connected`
enum State<T> {
    /// 未连接，`retry_at` 之前不再尝试
    Disconnected {
        /// 下一次允许尝试的时间
        retry_at: Option<Instant>,
    },
    /// 探测中
    Probing(Probe<T>),
    /// 已连接
    Connected(Connection<T>),
}

/// 一次探测读取的结果
enum ProbeStep {
    /// 继续探测
    Continue,
    /// 收到心跳，确认连接
    Confirmed,
    /// 候选串口已全部尝试
    Exhausted,
}

/// 串口连接管理器
pub struct SerialLink<P: PortProvider> {
    /// 串口枚举与打开
    provider: P,
    /// 状态机参数
    settings: LinkSettings,
    /// 当前状态
    state: State<P::Port>,
}

impl<P: PortProvider> SerialLink<P> {
    /// 创建处于未连接状态的管理器，首帧即尝试连接
    pub const fn new(provider: P, settings: LinkSettings) -> Self {
        Self {
            provider,
            settings,
            state: State::Disconnected { retry_at: None },
        }
    }

    /// 当前状态
    #[must_use]
    pub const fn status(&self) -> LinkStatus {
        match self.state {
            State::Disconnected { .. } => LinkStatus::Disconnected,
            State::Probing(_) => LinkStatus::Probing,
            State::Connected(_) => LinkStatus::Connected,
        }
    }

    /// 是否已连接
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    /// 已连接的串口名
    #[must_use]
    pub fn port_name(&self) -> Option<&str> {
        match &self.state {
            State::Connected(conn) => Some(conn.port.name()),
            _ => None,
        }
    }

    /// 维护连接：未连接时尝试连接，探测中时推进一步
    pub fn maintain(&mut self, now: Instant) {
        match &self.state {
            State::Connected(_) => {}
            State::Probing(_) => self.probe_step(now),
            State::Disconnected { retry_at } => {
                if retry_at.is_some_and(|t| now < t) {
                    return;
                }
                match self.settings.mode.clone() {
                    PortMode::Manual(name) => self.open_manual(&name, now),
                    PortMode::Auto => self.start_discovery(now),
                }
            }
        }
    }

    /// 读取并解析已到达的消息；读取失败时断开
    ///
    /// 心跳会刷新超时计时，同样出现在返回列表中。
    pub fn poll(&mut self, now: Instant) -> Vec<Result<SerialMsg, ProtocolWarning>> {
        let State::Connected(conn) = &mut self.state else {
            return Vec::new();
        };
        let mut lines = std::mem::take(&mut conn.backlog);
        let mut lost = None;
        match conn.port.read_available() {
            Ok(Some(chunk)) => lines.extend(conn.lines.push(&chunk)),
            Ok(None) => {}
            Err(e) => lost = Some(e),
        }
        let mut msgs = Vec::with_capacity(lines.len());
        for line in lines {
            let msg = parse_line(&line);
            if matches!(msg, Ok(SerialMsg::Heartbeat)) {
                conn.last_heartbeat = now;
            } else {
                debug!(message = %line, "收到串口消息");
            }
            msgs.push(msg);
        }
        if let Some(e) = lost {
            warn!(port = conn.port.name(), error = %e, "串口连接丢失");
            self.state = State::Disconnected { retry_at: None };
        }
        msgs
    }

    /// 心跳超时检查：超过时限未收到心跳则断开
    pub fn check_heartbeat(&mut self, now: Instant) {
        let State::Connected(conn) = &self.state else {
            return;
        };
        let silent = now.saturating_duration_since(conn.last_heartbeat);
        if silent > self.settings.heartbeat_timeout {
            warn!(
                port = conn.port.name(),
                silent_secs = silent.as_secs_f32(),
                "心跳超时，视为连接断开"
            );
            self.state = State::Disconnected { retry_at: None };
        }
    }

    /// 直接打开手动指定的串口
    fn open_manual(&mut self, name: &str, now: Instant) {
        match self.provider.open(name) {
            Ok(port) => self.connect(port, LineBuffer::default(), Vec::new(), now),
            Err(e) => {
                debug!(port = name, error = %e, "打开串口失败");
                self.back_off(now);
            }
        }
    }

    /// 枚举串口并进入探测
    fn start_discovery(&mut self, now: Instant) {
        let ports = match self.provider.available_ports() {
            Ok(ports) => ports,
            Err(e) => {
                warn!(error = %e, "串口枚举失败");
                self.back_off(now);
                return;
            }
        };
        let candidates: VecDeque<PortInfo> = ports
            .into_iter()
            .filter(|p| {
                let skip = self.settings.should_skip(p);
                if skip {
                    debug!(port = %p.name, description = %p.description, "跳过串口");
                }
                !skip
            })
            .collect();
        if candidates.is_empty() {
            debug!("没有可探测的串口");
            self.back_off(now);
            return;
        }
        self.state = State::Probing(Probe {
            candidates,
            current: None,
        });
        self.probe_step(now);
    }

    /// 探测推进一步：必要时打开下一个候选串口，然后进行一次有界读取
    fn probe_step(&mut self, now: Instant) {
        let max_attempts = self.settings.probe_attempts;
        let step = {
            let State::Probing(probe) = &mut self.state else {
                return;
            };
            while probe.current.is_none() {
                let Some(info) = probe.candidates.pop_front() else {
                    break;
                };
                debug!(port = %info.name, "尝试串口");
                match self.provider.open(&info.name) {
                    Ok(port) => {
                        probe.current = Some(ProbeAttempt {
                            port,
                            attempts: 0,
                            lines: LineBuffer::default(),
                            backlog: Vec::new(),
                        });
                    }
                    Err(e) => debug!(port = %info.name, error = %e, "打开串口失败"),
                }
            }
            match probe.current.as_mut() {
                None => ProbeStep::Exhausted,
                Some(attempt) => {
                    attempt.attempts += 1;
                    let confirmed = match attempt.port.read_chunk() {
                        Ok(Some(chunk)) => {
                            let lines = attempt.lines.push(&chunk);
                            match lines.iter().position(|l| l.contains(HEARTBEAT)) {
                                Some(pos) => {
                                    // 心跳之后的行留给连接分发
                                    attempt.backlog = lines.into_iter().skip(pos + 1).collect();
                                    true
                                }
                                None => false,
                            }
                        }
                        Ok(None) => false,
                        Err(e) => {
                            debug!(port = attempt.port.name(), error = %e, "探测读取失败");
                            false
                        }
                    };
                    if confirmed {
                        ProbeStep::Confirmed
                    } else {
                        if attempt.attempts >= max_attempts {
                            debug!(port = attempt.port.name(), "未收到心跳，关闭串口");
                            probe.current = None;
                        }
                        ProbeStep::Continue
                    }
                }
            }
        };
        match step {
            ProbeStep::Continue => {}
            ProbeStep::Exhausted => {
                debug!("本轮未发现钢琴设备");
                self.back_off(now);
            }
            ProbeStep::Confirmed => {
                let state = std::mem::replace(&mut self.state, State::Disconnected { retry_at: None });
                if let State::Probing(probe) = state
                    && let Some(attempt) = probe.current
                {
                    let ProbeAttempt {
                        port,
                        lines,
                        backlog,
                        ..
                    } = attempt;
                    self.connect(port, lines, backlog, now);
                }
            }
        }
    }

    /// 进入已连接状态
    fn connect(&mut self, port: P::Port, lines: LineBuffer, backlog: Vec<String>, now: Instant) {
        info!(port = port.name(), "已连接到钢琴");
        self.state = State::Connected(Connection {
            port,
            last_heartbeat: now,
            lines,
            backlog,
        });
    }

    /// 回到未连接状态并在重试间隔之后再尝试
    fn back_off(&mut self, now: Instant) {
        self.state = State::Disconnected {
            retry_at: now.checked_add(self.settings.retry_interval),
        };
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::fake::{FakeBus, Step};

    fn settings(mode: PortMode) -> LinkSettings {
        LinkSettings {
            mode,
            probe_attempts: 20,
            heartbeat_timeout: Duration::from_secs(10),
            retry_interval: Duration::from_secs(1),
            skip_patterns: vec!["bluetooth".to_string()],
        }
    }

    fn secs(t0: Instant, s: f64) -> Instant {
        t0 + Duration::from_secs_f64(s)
    }

    #[test]
    fn test_manual_port_connects_without_probe() {
        let bus = FakeBus::default();
        bus.add_port("COM3", "USB Serial");
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Manual("COM3".into())));
        let t0 = Instant::now();
        link.maintain(t0);
        assert!(link.is_connected());
        assert_eq!(link.port_name(), Some("COM3"));
        assert_eq!(bus.enumerations(), 0);
    }

    #[test]
    fn test_manual_port_failure_backs_off() {
        let bus = FakeBus::default();
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Manual("COM9".into())));
        let t0 = Instant::now();
        link.maintain(t0);
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert_eq!(bus.open_attempts(), 1);
        // 重试间隔内不再尝试
        link.maintain(secs(t0, 0.5));
        assert_eq!(bus.open_attempts(), 1);
        link.maintain(secs(t0, 1.0));
        assert_eq!(bus.open_attempts(), 2);
    }

    #[test]
    fn test_auto_discovery_connects_on_heartbeat() {
        let bus = FakeBus::default();
        bus.add_port("ttyACM0", "Arduino Uno");
        bus.script("ttyACM0", [Step::Silence, Step::Silence, Step::Data("alive\n")]);
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Auto));
        let t0 = Instant::now();
        link.maintain(t0);
        assert_eq!(link.status(), LinkStatus::Probing);
        link.maintain(secs(t0, 0.1));
        assert_eq!(link.status(), LinkStatus::Probing);
        link.maintain(secs(t0, 0.2));
        assert!(link.is_connected());
        assert_eq!(link.port_name(), Some("ttyACM0"));
    }

    #[test]
    fn test_bluetooth_ports_are_skipped() {
        let bus = FakeBus::default();
        bus.add_port("cu.Bluetooth-Incoming-Port", "");
        bus.add_port("COM5", "Standard Serial over Bluetooth link");
        bus.add_port("COM4", "Arduino Mega");
        bus.script("COM4", [Step::Data("alive\n")]);
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Auto));
        link.maintain(Instant::now());
        assert!(link.is_connected());
        assert_eq!(bus.opened(), vec!["COM4"]);
    }

    #[test]
    fn test_silent_candidate_is_closed_after_budget() {
        let bus = FakeBus::default();
        bus.add_port("COM1", "Modem");
        bus.add_port("COM4", "Arduino");
        bus.script("COM4", [Step::Data("alive\r\n")]);
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Auto));
        let t0 = Instant::now();
        for i in 0..20 {
            link.maintain(secs(t0, f64::from(i) * 0.1));
            assert_eq!(link.status(), LinkStatus::Probing);
        }
        assert_eq!(bus.closed(), vec!["COM1"]);
        link.maintain(secs(t0, 2.0));
        assert!(link.is_connected());
        assert_eq!(link.port_name(), Some("COM4"));
    }

    #[test]
    fn test_exhausted_round_backs_off() {
        let bus = FakeBus::default();
        bus.add_port("COM1", "Modem");
        let mut link = SerialLink::new(
            bus.clone(),
            LinkSettings {
                probe_attempts: 2,
                ..settings(PortMode::Auto)
            },
        );
        let t0 = Instant::now();
        link.maintain(t0);
        link.maintain(secs(t0, 0.1));
        // 候选串口已关闭，下一步发现已无候选
        link.maintain(secs(t0, 0.2));
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert_eq!(bus.closed(), vec!["COM1"]);
        link.maintain(secs(t0, 0.5));
        assert_eq!(bus.enumerations(), 1);
        link.maintain(secs(t0, 1.3));
        assert_eq!(bus.enumerations(), 2);
    }

    #[test]
    fn test_heartbeat_timeout_disconnects() {
        let bus = FakeBus::default();
        bus.add_port("COM3", "");
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Manual("COM3".into())));
        let t0 = Instant::now();
        link.maintain(t0);
        assert!(link.is_connected());

        bus.push("COM3", Step::Data("alive\n"));
        assert_eq!(link.poll(secs(t0, 5.0)), vec![Ok(SerialMsg::Heartbeat)]);
        link.check_heartbeat(secs(t0, 14.0));
        assert!(link.is_connected());
        link.check_heartbeat(secs(t0, 15.5));
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert_eq!(bus.closed(), vec!["COM3"]);
    }

    #[test]
    fn test_io_error_disconnects_and_reconnects_next_tick() {
        let bus = FakeBus::default();
        bus.add_port("COM3", "");
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Manual("COM3".into())));
        let t0 = Instant::now();
        link.maintain(t0);
        bus.push("COM3", Step::Fail);
        assert!(link.poll(secs(t0, 0.1)).is_empty());
        assert_eq!(link.status(), LinkStatus::Disconnected);
        assert_eq!(bus.closed(), vec!["COM3"]);
        link.maintain(secs(t0, 0.2));
        assert!(link.is_connected());
    }

    #[test]
    fn test_lines_after_probe_heartbeat_are_kept() {
        let bus = FakeBus::default();
        bus.add_port("COM4", "Arduino");
        bus.script("COM4", [Step::Data("alive\nkeyDown|2\nkeyU")]);
        let mut link = SerialLink::new(bus.clone(), settings(PortMode::Auto));
        let t0 = Instant::now();
        link.maintain(t0);
        assert!(link.is_connected());
        bus.push("COM4", Step::Data("p|2\n"));
        assert_eq!(
            link.poll(t0),
            vec![Ok(SerialMsg::KeyDown(2)), Ok(SerialMsg::KeyUp(2))]
        );
    }

    #[test]
    fn test_poll_when_disconnected_is_empty() {
        let bus = FakeBus::default();
        let mut link = SerialLink::new(bus, settings(PortMode::Auto));
        assert!(link.poll(Instant::now()).is_empty());
    }
}
