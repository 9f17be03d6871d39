//! 事件循环模块入口
//!
//! 提供三个子模块：
//! - `key_map`：控制键映射
//! - `main_loop`：每帧按固定顺序协调串口、定时器与界面事件
//! - `visual`：帧构建与 wgpu 渲染

pub mod key_map;
pub mod main_loop;
pub mod visual;

use crate::Instance;
use crate::error::ProtocolWarning;

/// 原始按键代码（平台无关表示）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawKeyCode(pub String);

/// 窗口系统传入的界面事件
#[derive(Debug, Clone, PartialEq)]
pub enum UiEvent {
    /// 关闭窗口
    Quit,
    /// 窗口尺寸变化（物理像素）
    Resize {
        /// 宽
        width: u32,
        /// 高
        height: u32,
    },
    /// 鼠标左键按下（窗口像素坐标）
    MouseDown {
        /// 横坐标
        x: f32,
        /// 纵坐标
        y: f32,
    },
    /// 鼠标左键抬起
    MouseUp,
    /// 键盘按下
    KeyPress {
        /// 按键代码
        code: RawKeyCode,
    },
}

/// 控制键对应的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ControlAction {
    /// 切换全屏
    ToggleFullscreen,
    /// 所有按键切换到下一个音色
    NextVariant,
    /// 所有按键切换到上一个音色
    PreviousVariant,
    /// 开关自动轮换
    ToggleAutoCycle,
}

/// 需要窗口系统执行的命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WindowCommand {
    /// 切换全屏；进入还是退出由窗口当前状态决定
    ToggleFullscreen,
    /// 更新窗口标题
    SetTitle(String),
}

/// 一次节拍的输出
#[derive(Debug, Default)]
pub struct TickOutput {
    /// 是否收到退出信号
    pub quit: bool,
    /// 待执行的窗口命令
    pub commands: Vec<WindowCommand>,
    /// 本帧被忽略的串口消息（已记录日志）
    pub warnings: Vec<ProtocolWarning>,
    /// 本帧的绘制实例（窗口像素）
    pub frame: Vec<Instance>,
}
