//! 程序入口：协调器与渲染器的组合

use std::time::Instant;

use tracing::warn;

use crate::Instance;
use crate::audio::SoundSample;
use crate::link::PortProvider;
use crate::loops::main_loop::Reconciler;
use crate::loops::{TickOutput, WindowCommand, visual};

/// 一次节拍之后窗口系统需要处理的内容
#[derive(Debug, Default)]
pub struct TickEffects {
    /// 是否退出
    pub quit: bool,
    /// 窗口命令
    pub commands: Vec<WindowCommand>,
}

/// 视觉应用：驱动协调器节拍并把最新帧交给渲染器
pub struct VisualApp<S, P: PortProvider> {
    /// 输入协调器
    reconciler: Reconciler<S, P>,
    /// 绑定到窗口表面的渲染器；窗口创建前为空
    window_renderer: Option<visual::Renderer>,
    /// 最新一帧的实例列表
    latest_instances: Vec<Instance>,
}

impl<S: SoundSample, P: PortProvider> VisualApp<S, P> {
    /// 创建视觉应用，渲染器稍后由 `attach_renderer` 提供
    pub const fn new(reconciler: Reconciler<S, P>) -> Self {
        Self {
            reconciler,
            window_renderer: None,
            latest_instances: Vec::new(),
        }
    }

    /// 绑定渲染器
    pub fn attach_renderer(&mut self, renderer: visual::Renderer) {
        self.window_renderer = Some(renderer);
    }

    /// 处理窗口大小变化
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(renderer) = self.window_renderer.as_mut() {
            renderer.resize(width, height);
        }
    }

    /// 推进一个节拍并保存新帧
    pub fn tick(&mut self, now: Instant) -> TickEffects {
        let TickOutput {
            quit,
            commands,
            frame,
            ..
        } = self.reconciler.tick(now);
        self.latest_instances = frame;
        TickEffects { quit, commands }
    }

    /// 绘制最新一帧
    pub fn redraw(&mut self) {
        let Some(renderer) = self.window_renderer.as_ref() else {
            return;
        };
        if let Err(e) = renderer.draw(&self.latest_instances) {
            warn!(error = %e, "绘制失败");
        }
    }
}
