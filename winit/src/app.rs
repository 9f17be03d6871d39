//! winit 窗口与事件循环入口

#![cfg(not(target_arch = "wasm32"))]
use std::{
    sync::{Arc, mpsc},
    time::{Duration, Instant},
};

use anyhow::Result;
use tracing::error;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, MouseButton, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::PhysicalKey,
    window::{Fullscreen, Window, WindowId},
};

use ltl_piano::audio::SoundSample;
use ltl_piano::config;
use ltl_piano::entry::VisualApp;
use ltl_piano::link::PortProvider;
use ltl_piano::loops::{RawKeyCode, UiEvent, WindowCommand, visual};

/// 两次节拍之间的最长间隔，窗口不重绘时也保持串口轮询
const TICK_INTERVAL: Duration = Duration::from_millis(16);

/// 以窗口当前的全屏状态为准切换：已全屏则退出，否则进入无边框全屏
fn toggled_fullscreen(current: Option<&Fullscreen>) -> Option<Fullscreen> {
    match current {
        Some(_) => None,
        None => Some(Fullscreen::Borderless(None)),
    }
}

/// 视觉事件处理器
struct Handler<S, P: PortProvider> {
    /// 窗口实例；`resumed` 之前为空
    window: Option<Arc<Window>>,
    /// 视觉应用
    app: VisualApp<S, P>,
    /// 界面事件发送端
    ui_tx: mpsc::Sender<UiEvent>,
    /// 最近一次的光标位置（物理像素）
    cursor: PhysicalPosition<f64>,
    /// 窗口配置
    window_cfg: config::Window,
}

impl<S: SoundSample, P: PortProvider> Handler<S, P> {
    /// 创建窗口与渲染器
    fn create_window(&mut self, event_loop: &ActiveEventLoop) -> Result<Arc<Window>> {
        let attrs = Window::default_attributes()
            .with_title(self.window_cfg.title.clone())
            .with_window_icon(crate::icon::window_icon())
            .with_inner_size(LogicalSize::new(
                f64::from(self.window_cfg.width),
                f64::from(self.window_cfg.height),
            ));
        let window = Arc::new(event_loop.create_window(attrs)?);
        let size = window.inner_size();
        let ctx = visual::init_gpu(Arc::clone(&window), (size.width, size.height))?;
        self.app.attach_renderer(visual::Renderer::new(ctx));
        self.send(UiEvent::Resize {
            width: size.width,
            height: size.height,
        });
        Ok(window)
    }

    /// 发送界面事件；接收端随协调器一起存在，发送失败时忽略
    fn send(&self, event: UiEvent) {
        let _ = self.ui_tx.send(event);
    }

    /// 执行协调器产生的窗口命令
    fn apply(window: &Window, command: WindowCommand) {
        match command {
            WindowCommand::ToggleFullscreen => {
                window.set_fullscreen(toggled_fullscreen(window.fullscreen().as_ref()));
            }
            WindowCommand::SetTitle(title) => window.set_title(&title),
        }
    }
}

impl<S: SoundSample, P: PortProvider> ApplicationHandler for Handler<S, P> {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }
        match self.create_window(event_loop) {
            Ok(window) => self.window = Some(window),
            Err(e) => {
                error!(error = %e, "窗口或渲染器创建失败");
                event_loop.exit();
            }
        }
    }

    fn window_event(&mut self, _event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        match event {
            WindowEvent::CloseRequested => self.send(UiEvent::Quit),
            WindowEvent::Resized(size) => {
                self.app.resize(size.width, size.height);
                self.send(UiEvent::Resize {
                    width: size.width,
                    height: size.height,
                });
            }
            WindowEvent::CursorMoved { position, .. } => self.cursor = position,
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => self.send(UiEvent::MouseDown {
                    x: self.cursor.x as f32,
                    y: self.cursor.y as f32,
                }),
                ElementState::Released => self.send(UiEvent::MouseUp),
            },
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state != ElementState::Pressed || event.repeat {
                    return;
                }
                if let PhysicalKey::Code(code) = event.physical_key
                    && let Some(name) = crate::key_code_name(code)
                {
                    self.send(UiEvent::KeyPress {
                        code: RawKeyCode(name),
                    });
                }
            }
            WindowEvent::RedrawRequested => self.app.redraw(),
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(window) = self.window.as_ref() else {
            return;
        };
        let now = Instant::now();
        let effects = self.app.tick(now);
        for command in effects.commands {
            Self::apply(window, command);
        }
        if effects.quit {
            event_loop.exit();
            return;
        }
        window.request_redraw();
        event_loop.set_control_flow(ControlFlow::WaitUntil(now + TICK_INTERVAL));
    }
}

/// 运行 winit 事件循环（内部实现）
pub fn run_internal<S, P>(
    app: VisualApp<S, P>,
    ui_tx: mpsc::Sender<UiEvent>,
    window_cfg: config::Window,
) -> Result<()>
where
    S: SoundSample,
    P: PortProvider,
{
    let event_loop = EventLoop::new()?;
    let mut handler = Handler {
        window: None,
        app,
        ui_tx,
        cursor: PhysicalPosition::new(0.0, 0.0),
        window_cfg,
    };
    event_loop.run_app(&mut handler)?;
    Ok(())
}
