//! # Larger Than Life Piano - winit 平台实现
//!
//! 提供 winit 窗口系统与事件循环的桌面平台实现

#![cfg(not(target_arch = "wasm32"))]

mod app;
mod icon;

use anyhow::Result;
use std::sync::mpsc;
use winit::keyboard::KeyCode;

use ltl_piano::audio::SoundSample;
use ltl_piano::config;
use ltl_piano::entry::VisualApp;
use ltl_piano::link::PortProvider;
use ltl_piano::loops::UiEvent;

/// 将配置文件中的按键代码字符串转换为 `winit::KeyCode`
fn parse_key_code(s: &str) -> Option<KeyCode> {
    // KeyCode 的 serde 表示即其变体名
    serde_json::from_str::<KeyCode>(format!("\"{s}\"").as_str()).ok()
}

/// `winit::KeyCode` 的名称，与配置文件中的写法一致
fn key_code_name(code: KeyCode) -> Option<String> {
    match serde_json::to_value(code).ok()? {
        serde_json::Value::String(name) => Some(name),
        _ => None,
    }
}

/// 检查控制键配置，返回无法识别的键名
#[must_use]
pub fn invalid_controls(controls: &config::Controls) -> Vec<String> {
    [
        &controls.fullscreen,
        &controls.next_variant,
        &controls.previous_variant,
        &controls.toggle_cycle,
    ]
    .into_iter()
    .filter(|name| parse_key_code(name).is_none())
    .cloned()
    .collect()
}

/// 运行 winit 事件循环：窗口事件转为 `UiEvent` 送入 `ui_tx`，每轮空闲时推进一个节拍
///
/// # Errors
///
/// - winit 事件循环创建失败
/// - 窗口或渲染器创建失败
pub fn run<S, P>(
    app: VisualApp<S, P>,
    ui_tx: mpsc::Sender<UiEvent>,
    window: config::Window,
) -> Result<()>
where
    S: SoundSample,
    P: PortProvider,
{
    app::run_internal(app, ui_tx, window)
}
