//! 主循环：协调串口、自动轮换与界面事件
//!
//! 每个节拍按固定顺序执行：
//! 1. 未连接时维护串口连接
//! 2. 自动轮换到期时所有按键切换到下一个音色
//! 3. 处理界面事件（退出、尺寸变化、鼠标、控制键）
//! 4. 处理串口消息
//! 5. 心跳超时检查
//! 6. 构建渲染帧

use std::sync::mpsc;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::audio::{RodioSample, SoundSample};
use crate::error::ProtocolWarning;
use crate::key::{DisplayTransform, Key};
use crate::link::protocol::SerialMsg;
use crate::link::serial::SerialPortProvider;
use crate::link::{PortProvider, SerialLink};
use crate::loops::key_map::KeyMap;
use crate::loops::visual::build_frame;
use crate::loops::{ControlAction, TickOutput, UiEvent, WindowCommand};

/// 实际运行时使用的协调器
pub type PianoReconciler = Reconciler<RodioSample, SerialPortProvider>;

/// 自动轮换定时器
#[derive(Debug, Clone)]
pub struct AutoCycle {
    /// 是否开启
    enabled: bool,
    /// 轮换周期
    period: Duration,
    /// 上一次轮换（或开启）的时间
    last: Instant,
}

impl AutoCycle {
    /// 创建关闭状态的定时器
    #[must_use]
    pub const fn new(period: Duration, now: Instant) -> Self {
        Self {
            enabled: false,
            period,
            last: now,
        }
    }

    /// 是否开启
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// 开关定时器并重新计时，返回切换后的状态
    pub fn toggle(&mut self, now: Instant) -> bool {
        self.enabled = !self.enabled;
        self.last = now;
        self.enabled
    }

    /// 是否到期；到期时推进计时起点
    ///
    /// 计时起点按周期累加，落后超过一个周期时对齐到当前时间。
    pub fn due(&mut self, now: Instant) -> bool {
        if !self.enabled || self.period.is_zero() {
            return false;
        }
        if now.saturating_duration_since(self.last) < self.period {
            return false;
        }
        self.last = self.last.checked_add(self.period).unwrap_or(now);
        if now.saturating_duration_since(self.last) >= self.period {
            self.last = now;
        }
        true
    }
}

/// 协调器持有的全部可变状态
pub struct ApplicationState<S> {
    /// 按键，顺序即串口索引
    keys: Vec<Key<S>>,
    /// 音色目录名，与按键的音色索引一一对应
    folders: Vec<String>,
    /// 画布到窗口的变换
    transform: DisplayTransform,
    /// 当前被鼠标按下的按键
    mouse_key: Option<usize>,
    /// 自动轮换
    auto_cycle: AutoCycle,
    /// 启动时间，用于箭头闪烁
    started: Instant,
}

impl<S> ApplicationState<S> {
    /// 创建初始状态
    #[must_use]
    pub const fn new(
        keys: Vec<Key<S>>,
        folders: Vec<String>,
        transform: DisplayTransform,
        cycle_period: Duration,
        now: Instant,
    ) -> Self {
        Self {
            keys,
            folders,
            transform,
            mouse_key: None,
            auto_cycle: AutoCycle::new(cycle_period, now),
            started: now,
        }
    }

    /// 全部按键
    #[must_use]
    pub fn keys(&self) -> &[Key<S>] {
        &self.keys
    }

    /// 当前音色目录名（以第一个按键的音色为准）
    #[must_use]
    pub fn active_folder(&self) -> Option<&str> {
        let idx = self.keys.first()?.variant_index();
        self.folders.get(idx).map(String::as_str)
    }

    /// 自动轮换定时器
    #[must_use]
    pub const fn auto_cycle(&self) -> &AutoCycle {
        &self.auto_cycle
    }

    /// 找出窗口坐标处层级最高的按键；同层级取先找到的
    #[must_use]
    pub fn pick_key(&self, x: f32, y: f32) -> Option<usize> {
        let (cx, cy) = self.transform.to_canvas(x, y);
        let mut best: Option<(usize, u8)> = None;
        for (idx, key) in self.keys.iter().enumerate() {
            if !key.hit_test(cx, cy) {
                continue;
            }
            if best.is_none_or(|(_, z)| key.z_order() > z) {
                best = Some((idx, key.z_order()));
            }
        }
        best.map(|(idx, _)| idx)
    }

    /// 自动轮换箭头本帧是否可见：开启时约每秒闪烁一次
    #[must_use]
    pub fn arrow_visible(&self, now: Instant) -> bool {
        if !self.auto_cycle.is_enabled() {
            return false;
        }
        let half_secs = (now.saturating_duration_since(self.started).as_secs_f64() * 2.0).floor();
        half_secs % 2.0 >= 1.0
    }

    /// 所有按键切换到下一个音色
    fn next_variant_all(&mut self) {
        for key in &mut self.keys {
            key.next_variant();
        }
    }

    /// 所有按键切换到上一个音色
    fn previous_variant_all(&mut self) {
        for key in &mut self.keys {
            key.previous_variant();
        }
    }
}

/// 输入协调器：鼠标、控制键与串口三路输入共同作用于按键状态
pub struct Reconciler<S, P: PortProvider> {
    /// 应用状态
    state: ApplicationState<S>,
    /// 串口连接
    link: SerialLink<P>,
    /// 控制键映射
    key_map: KeyMap,
    /// 界面事件接收端
    ui_rx: mpsc::Receiver<UiEvent>,
    /// 窗口基础标题
    title: String,
    /// 标题中已显示的音色目录
    shown_folder: Option<String>,
}

impl<S: SoundSample, P: PortProvider> Reconciler<S, P> {
    /// 创建协调器
    pub const fn new(
        state: ApplicationState<S>,
        link: SerialLink<P>,
        key_map: KeyMap,
        ui_rx: mpsc::Receiver<UiEvent>,
        title: String,
    ) -> Self {
        Self {
            state,
            link,
            key_map,
            ui_rx,
            title,
            shown_folder: None,
        }
    }

    /// 应用状态
    #[must_use]
    pub const fn state(&self) -> &ApplicationState<S> {
        &self.state
    }

    /// 串口连接
    #[must_use]
    pub const fn link(&self) -> &SerialLink<P> {
        &self.link
    }

    /// 执行一个节拍
    pub fn tick(&mut self, now: Instant) -> TickOutput {
        let mut out = TickOutput::default();

        if !self.link.is_connected() {
            self.link.maintain(now);
        }

        if self.state.auto_cycle.due(now) {
            self.state.next_variant_all();
            debug!(folder = ?self.state.active_folder(), "自动轮换音色");
        }

        while let Ok(event) = self.ui_rx.try_recv() {
            if self.handle_ui(event, now, &mut out.commands) {
                out.quit = true;
                break;
            }
        }

        for msg in self.link.poll(now) {
            if let Some(w) = self.dispatch_serial(msg) {
                out.warnings.push(w);
            }
        }

        self.link.check_heartbeat(now);

        let folder = self.state.active_folder().map(str::to_string);
        if folder.is_some() && folder != self.shown_folder {
            if let Some(name) = &folder {
                out.commands
                    .push(WindowCommand::SetTitle(format!("{} - {}", self.title, name)));
            }
            self.shown_folder = folder;
        }
        out.frame = build_frame(
            &self.state.keys,
            &self.state.transform,
            self.link.is_connected(),
            self.state.arrow_visible(now),
            self.state.active_folder(),
        );
        out
    }

    /// 处理单个界面事件，收到退出信号时返回 `true`
    fn handle_ui(&mut self, event: UiEvent, now: Instant, commands: &mut Vec<WindowCommand>) -> bool {
        match event {
            UiEvent::Quit => return true,
            UiEvent::Resize { width, height } => {
                if width > 0 && height > 0 {
                    self.state.transform.window = (width as f32, height as f32);
                }
            }
            UiEvent::MouseDown { x, y } => {
                if let Some(idx) = self.state.pick_key(x, y) {
                    self.state.mouse_key = Some(idx);
                    if let Some(key) = self.state.keys.get_mut(idx) {
                        key.press();
                    }
                }
            }
            UiEvent::MouseUp => {
                if let Some(idx) = self.state.mouse_key.take()
                    && let Some(key) = self.state.keys.get_mut(idx)
                {
                    key.release();
                }
            }
            UiEvent::KeyPress { code } => match self.key_map.convert(&code) {
                Some(ControlAction::ToggleFullscreen) => {
                    commands.push(WindowCommand::ToggleFullscreen);
                }
                Some(ControlAction::NextVariant) => {
                    self.state.next_variant_all();
                    info!(folder = ?self.state.active_folder(), "切换到下一个音色");
                }
                Some(ControlAction::PreviousVariant) => {
                    self.state.previous_variant_all();
                    info!(folder = ?self.state.active_folder(), "切换到上一个音色");
                }
                Some(ControlAction::ToggleAutoCycle) => {
                    let enabled = self.state.auto_cycle.toggle(now);
                    info!(enabled, "自动轮换");
                }
                None => {}
            },
        }
        false
    }

    /// 分发一条串口消息；被忽略时返回原因
    fn dispatch_serial(
        &mut self,
        msg: Result<SerialMsg, ProtocolWarning>,
    ) -> Option<ProtocolWarning> {
        let key_count = self.state.keys.len();
        let result = match msg {
            Ok(SerialMsg::Heartbeat | SerialMsg::Unknown(_)) => Ok(()),
            Ok(SerialMsg::KeyDown(index)) => match self.state.keys.get_mut(index) {
                Some(key) => {
                    key.press();
                    Ok(())
                }
                None => Err(ProtocolWarning::KeyIndexOutOfRange {
                    kind: "keyDown",
                    index,
                    key_count,
                }),
            },
            Ok(SerialMsg::KeyUp(index)) => match self.state.keys.get_mut(index) {
                Some(key) => {
                    key.release();
                    Ok(())
                }
                None => Err(ProtocolWarning::KeyIndexOutOfRange {
                    kind: "keyUp",
                    index,
                    key_count,
                }),
            },
            Err(w) => Err(w),
        };
        let w = result.err()?;
        warn!(warning = %w, "忽略串口消息");
        Some(w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config;
    use crate::key::tests::{CountingSample, key_with, spec};
    use crate::link::fake::{FakeBus, Step};
    use crate::link::{LinkSettings, PortMode};
    use crate::loops::RawKeyCode;

    const PERIOD: Duration = Duration::from_secs(30);

    struct Harness {
        reconciler: Reconciler<CountingSample, FakeBus>,
        ui_tx: mpsc::Sender<UiEvent>,
        bus: FakeBus,
        t0: Instant,
    }

    impl Harness {
        fn new(keys: Vec<Key<CountingSample>>, mode: PortMode) -> Self {
            let bus = FakeBus::default();
            bus.add_port("COM3", "Arduino");
            let t0 = Instant::now();
            let transform = DisplayTransform {
                canvas: (100.0, 100.0),
                window: (100.0, 100.0),
            };
            let folders = vec!["Piano".to_string(), "Organ".to_string(), "Guitar".to_string()];
            let state = ApplicationState::new(keys, folders, transform, PERIOD, t0);
            let settings = LinkSettings {
                mode,
                ..LinkSettings::from(&config::Link::default())
            };
            let link = SerialLink::new(bus.clone(), settings);
            let (ui_tx, ui_rx) = mpsc::channel();
            let reconciler = Reconciler::new(
                state,
                link,
                KeyMap::new(&config::Controls::default()),
                ui_rx,
                "Piano Test".to_string(),
            );
            Self {
                reconciler,
                ui_tx,
                bus,
                t0,
            }
        }

        fn manual(keys: Vec<Key<CountingSample>>) -> Self {
            Self::new(keys, PortMode::Manual("COM3".to_string()))
        }

        fn at(&self, secs: f64) -> Instant {
            self.t0 + Duration::from_secs_f64(secs)
        }

        fn send(&self, event: UiEvent) {
            self.ui_tx.send(event).unwrap();
        }

        fn press_control(&self, code: &str) {
            self.send(UiEvent::KeyPress {
                code: RawKeyCode(code.to_string()),
            });
        }

        fn tick(&mut self, secs: f64) -> TickOutput {
            let now = self.at(secs);
            self.reconciler.tick(now)
        }

        fn key(&self, idx: usize) -> &Key<CountingSample> {
            &self.reconciler.state().keys()[idx]
        }
    }

    fn row(count: usize) -> Vec<Key<CountingSample>> {
        (0..count)
            .map(|i| key_with(&spec(i as f32 * 16.0, 16.0, 60.0, 0), 3))
            .collect()
    }

    #[test]
    fn test_mouse_picks_highest_z_and_releases_it() {
        let keys = vec![
            key_with(&spec(0.0, 16.0, 60.0, 0), 3),
            key_with(&spec(12.0, 8.0, 30.0, 1), 3),
        ];
        let mut h = Harness::manual(keys);
        h.send(UiEvent::MouseDown { x: 14.0, y: 10.0 });
        h.tick(0.0);
        assert!(h.key(1).is_pressed());
        assert!(!h.key(0).is_pressed());

        h.send(UiEvent::MouseUp);
        h.tick(0.1);
        assert!(!h.key(1).is_pressed());
        // 没有记住的按键时抬起无影响
        h.send(UiEvent::MouseUp);
        h.tick(0.2);
        assert_eq!(h.key(1).variants()[0].plays, 1);
    }

    #[test]
    fn test_equal_z_keeps_first_hit() {
        let keys = vec![
            key_with(&spec(0.0, 16.0, 60.0, 0), 1),
            key_with(&spec(10.0, 16.0, 60.0, 0), 1),
        ];
        let h = Harness::manual(keys);
        assert_eq!(h.reconciler.state().pick_key(12.0, 5.0), Some(0));
        assert_eq!(h.reconciler.state().pick_key(20.0, 5.0), Some(1));
        assert_eq!(h.reconciler.state().pick_key(50.0, 5.0), None);
    }

    #[test]
    fn test_resize_rescales_pointer() {
        let keys = vec![
            key_with(&spec(0.0, 16.0, 60.0, 0), 1),
            key_with(&spec(12.0, 8.0, 30.0, 1), 1),
        ];
        let mut h = Harness::manual(keys);
        h.send(UiEvent::Resize {
            width: 200,
            height: 200,
        });
        h.send(UiEvent::MouseDown { x: 28.0, y: 20.0 });
        h.tick(0.0);
        assert!(h.key(1).is_pressed());
    }

    #[test]
    fn test_serial_down_then_up_in_one_batch() {
        let mut h = Harness::manual(row(5));
        h.bus.push("COM3", Step::Data("keyDown|3\nkeyUp|3\n"));
        h.tick(0.0);
        assert!(h.reconciler.link().is_connected());
        assert_eq!(h.key(3).variants()[0].plays, 1);
        assert!(!h.key(3).is_pressed());
    }

    #[test]
    fn test_out_of_range_key_up_does_not_halt_batch() {
        let mut h = Harness::manual(row(5));
        h.bus.push("COM3", Step::Data("keyUp|999\nkeyDown|1\n"));
        let out = h.tick(0.0);
        assert!(h.key(1).is_pressed());
        assert!(matches!(
            out.warnings.as_slice(),
            [ProtocolWarning::KeyIndexOutOfRange {
                kind: "keyUp",
                index: 999,
                key_count: 5,
            }]
        ));
    }

    #[test]
    fn test_out_of_range_key_down_is_ignored() {
        let mut h = Harness::manual(row(5));
        h.bus
            .push("COM3", Step::Data("keyDown|42\nkeyDown|x\nfoo|1\nkeyDown|0\n"));
        let out = h.tick(0.0);
        assert!(h.key(0).is_pressed());
        assert!((1..5).all(|i| !h.key(i).is_pressed()));
        // 越界、格式错误各一条；未知命令不算错误
        assert_eq!(out.warnings.len(), 2);
        assert!(matches!(
            out.warnings[0],
            ProtocolWarning::KeyIndexOutOfRange {
                kind: "keyDown",
                index: 42,
                ..
            }
        ));
    }

    #[test]
    fn test_serial_and_mouse_share_key_state() {
        let keys = vec![key_with(&spec(0.0, 16.0, 60.0, 0), 1)];
        let mut h = Harness::manual(keys);
        h.bus.push("COM3", Step::Data("keyDown|0\n"));
        h.send(UiEvent::MouseDown { x: 4.0, y: 4.0 });
        h.tick(0.0);
        // 鼠标先按下，串口再按下不会重复触发
        assert_eq!(h.key(0).variants()[0].plays, 1);
        h.send(UiEvent::MouseUp);
        h.tick(0.1);
        assert!(!h.key(0).is_pressed());
    }

    #[test]
    fn test_auto_cycle_advances_once_per_period() {
        let mut h = Harness::manual(row(3));
        h.press_control("ArrowUp");
        h.tick(0.0);
        assert!(h.reconciler.state().auto_cycle().is_enabled());
        h.tick(15.0);
        assert_eq!(h.key(0).variant_index(), 0);
        h.tick(30.0);
        h.tick(45.0);
        h.tick(60.0);
        for i in 0..3 {
            assert_eq!(h.key(i).variant_index(), 2);
        }
    }

    #[test]
    fn test_auto_cycle_late_tick_does_not_burst() {
        let mut h = Harness::manual(row(1));
        h.press_control("ArrowUp");
        h.tick(0.0);
        // 落后多个周期也只推进一次
        h.tick(100.0);
        h.tick(100.1);
        assert_eq!(h.key(0).variant_index(), 1);
        h.tick(130.0);
        assert_eq!(h.key(0).variant_index(), 2);
    }

    #[test]
    fn test_toggle_off_stops_cycling() {
        let mut h = Harness::manual(row(1));
        h.press_control("ArrowUp");
        h.tick(0.0);
        h.press_control("ArrowUp");
        h.tick(1.0);
        h.tick(90.0);
        assert_eq!(h.key(0).variant_index(), 0);
    }

    #[test]
    fn test_arrow_keys_cycle_every_key_and_update_title() {
        let mut h = Harness::manual(row(4));
        let first = h.tick(0.0);
        assert_eq!(
            first.commands,
            vec![WindowCommand::SetTitle("Piano Test - Piano".to_string())]
        );

        h.press_control("ArrowRight");
        let out = h.tick(0.1);
        assert!((0..4).all(|i| h.key(i).variant_index() == 1));
        // 画面左下角的音色名随之改变
        assert_ne!(first.frame, out.frame);
        assert_eq!(
            out.commands,
            vec![WindowCommand::SetTitle("Piano Test - Organ".to_string())]
        );

        h.press_control("ArrowLeft");
        h.press_control("ArrowLeft");
        h.tick(0.2);
        assert!((0..4).all(|i| h.key(i).variant_index() == 2));

        // 音色不变时不重复设置标题
        let out = h.tick(0.3);
        assert!(out.commands.is_empty());
    }

    #[test]
    fn test_escape_toggles_fullscreen() {
        let mut h = Harness::manual(row(1));
        h.tick(0.0);
        h.press_control("Escape");
        assert_eq!(h.tick(0.1).commands, vec![WindowCommand::ToggleFullscreen]);
        // 每次按下都发出切换命令，不依赖协调器记住的全屏状态
        h.press_control("Escape");
        h.press_control("Escape");
        assert_eq!(
            h.tick(0.2).commands,
            vec![WindowCommand::ToggleFullscreen, WindowCommand::ToggleFullscreen]
        );
    }

    #[test]
    fn test_quit_stops_draining_events() {
        let mut h = Harness::manual(row(2));
        h.send(UiEvent::Quit);
        h.press_control("ArrowRight");
        let out = h.tick(0.0);
        assert!(out.quit);
        assert_eq!(h.key(0).variant_index(), 0);
        // 本帧仍然完整构建
        assert!(!out.frame.is_empty());
    }

    #[test]
    fn test_heartbeat_silence_disconnects_and_reconnects() {
        let mut h = Harness::new(row(2), PortMode::Auto);
        h.bus.push("COM3", Step::Data("alive\n"));
        h.tick(0.0);
        assert!(h.reconciler.link().is_connected());

        h.bus.push("COM3", Step::Data("alive\n"));
        h.tick(6.0);
        h.tick(15.0);
        assert!(h.reconciler.link().is_connected());
        h.tick(16.5);
        assert!(!h.reconciler.link().is_connected());
        assert_eq!(h.bus.closed(), vec!["COM3"]);

        // 控制器恢复心跳后重新探测成功
        h.bus.push("COM3", Step::Silence);
        h.bus.push("COM3", Step::Data("alive\n"));
        h.tick(16.6);
        assert!(!h.reconciler.link().is_connected());
        h.tick(16.7);
        assert!(h.reconciler.link().is_connected());
    }

    #[test]
    fn test_arrow_blinks_while_cycling() {
        let mut h = Harness::manual(row(1));
        let state_frame = h.tick(0.0).frame.len();
        h.press_control("ArrowUp");
        h.tick(0.1);
        assert!(!h.reconciler.state().arrow_visible(h.at(0.2)));
        assert!(h.reconciler.state().arrow_visible(h.at(0.7)));
        assert!(!h.reconciler.state().arrow_visible(h.at(1.2)));
        assert!(h.tick(0.7).frame.len() > state_frame);
    }
}
