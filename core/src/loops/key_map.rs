//! 按键映射：将原始按键代码转换为控制操作
//!
//! 键名来自配置文件 `[controls]`，与窗口系统的按键代码名称一致。

use std::collections::HashMap;

use crate::config;
use crate::loops::{ControlAction, RawKeyCode};

/// 按键映射器
pub struct KeyMap {
    /// 按键代码字符串到控制操作的映射
    map: HashMap<String, ControlAction>,
}

impl KeyMap {
    /// 从控制键配置创建映射器
    ///
    /// 多个操作配置了同一个键时，后配置的覆盖先配置的。
    #[must_use]
    pub fn new(controls: &config::Controls) -> Self {
        let bindings = [
            (&controls.fullscreen, ControlAction::ToggleFullscreen),
            (&controls.next_variant, ControlAction::NextVariant),
            (&controls.previous_variant, ControlAction::PreviousVariant),
            (&controls.toggle_cycle, ControlAction::ToggleAutoCycle),
        ];
        let map = bindings
            .into_iter()
            .map(|(code, action)| (code.clone(), action))
            .collect();
        Self { map }
    }

    /// 将原始按键代码转换为控制操作；未映射的按键返回 `None`
    #[must_use]
    pub fn convert(&self, code: &RawKeyCode) -> Option<ControlAction> {
        let RawKeyCode(key_str) = code;
        self.map.get(key_str).copied()
    }

    /// 控制键说明，按操作顺序排列
    #[must_use]
    pub fn help_lines(controls: &config::Controls) -> Vec<String> {
        vec![
            format!("{}: 切换全屏", controls.fullscreen),
            format!("{}: 下一个音色", controls.next_variant),
            format!("{}: 上一个音色", controls.previous_variant),
            format!("{}: 开关音色自动轮换", controls.toggle_cycle),
        ]
    }
}
