//! Larger Than Life Piano 核心库
//!
//! 按键状态同步、采样播放、串口连接与渲染帧构建，不依赖具体窗口系统。

pub mod audio;
pub mod catalog;
pub mod config;
pub mod entry;
pub mod error;
pub mod key;
pub mod layout;
pub mod link;
pub mod logging;
pub mod loops;

use bytemuck::{Pod, Zeroable};

use crate::layout::{Color, Rect};

#[repr(C)]
#[derive(Clone, Copy, Zeroable, Pod, Debug, PartialEq)]
/// 单个矩形实例（位置、大小、颜色）
pub struct Instance {
    /// 中心坐标（x, y），窗口像素，原点在左上角
    pos: [f32; 2],
    /// 尺寸（宽, 高）
    size: [f32; 2],
    /// 颜色（RGBA）
    color: [f32; 4],
}

impl Instance {
    /// 由左上角矩形构造实例
    #[must_use]
    pub fn from_rect(r: Rect, color: Color) -> Self {
        Self {
            pos: [r.x + r.width / 2.0, r.y + r.height / 2.0],
            size: [r.width, r.height],
            color,
        }
    }

    /// 中心坐标
    #[must_use]
    pub const fn pos(&self) -> [f32; 2] {
        self.pos
    }

    /// 尺寸
    #[must_use]
    pub const fn size(&self) -> [f32; 2] {
        self.size
    }

    /// 颜色
    #[must_use]
    pub const fn color(&self) -> [f32; 4] {
        self.color
    }
}
