//! 键位布局：从按键表生成每个按键的几何、层级与采样槽位

use serde::Deserialize;

use crate::config;
use crate::error::ConfigError;

/// RGBA 颜色
pub type Color = [f32; 4];

/// 由 8 位分量构造不透明颜色
#[must_use]
pub const fn rgb(r: u8, g: u8, b: u8) -> Color {
    [r as f32 / 255.0, g as f32 / 255.0, b as f32 / 255.0, 1.0]
}

/// 白键颜色
pub const WHITE: Color = rgb(255, 255, 255);
/// 黑键颜色
pub const BLACK: Color = rgb(0, 0, 0);

/// 轴对齐矩形（虚拟画布坐标，左上角为原点）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    /// 左边 x
    pub x: f32,
    /// 上边 y
    pub y: f32,
    /// 宽度
    pub width: f32,
    /// 高度
    pub height: f32,
}

impl Rect {
    /// 创建矩形
    #[must_use]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// 右边 x
    #[must_use]
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// 下边 y
    #[must_use]
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// 点是否落在矩形内（左上闭、右下开）
    #[must_use]
    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// 向内收缩指定距离
    #[must_use]
    pub fn inset(&self, d: f32) -> Self {
        Self::new(
            self.x + d,
            self.y + d,
            (self.width - 2.0 * d).max(0.0),
            (self.height - 2.0 * d).max(0.0),
        )
    }
}

/// 按键类型
#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    /// 白键：16x60，底层
    White,
    /// 黑键：8x30，覆盖层
    Black,
}

impl KeyKind {
    /// 按键尺寸（宽, 高）
    #[must_use]
    pub const fn size(self) -> (f32, f32) {
        match self {
            Self::White => (16.0, 60.0),
            Self::Black => (8.0, 30.0),
        }
    }

    /// 绘制与命中层级
    #[must_use]
    pub const fn z_order(self) -> u8 {
        match self {
            Self::White => 0,
            Self::Black => 1,
        }
    }

    /// 基础颜色
    #[must_use]
    pub const fn color(self) -> Color {
        match self {
            Self::White => WHITE,
            Self::Black => BLACK,
        }
    }
}

/// 按键表中的一项
#[derive(Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct LayoutEntry {
    /// 按键类型
    pub kind: KeyKind,
    /// 与前一个按键右边缘的重叠量（首个按键忽略）
    #[serde(default)]
    pub overlap: f32,
}

/// 单个按键的构建参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KeySpec {
    /// 命中与绘制区域
    pub region: Rect,
    /// 层级
    pub z_order: u8,
    /// 基础颜色
    pub color: Color,
    /// 采样槽位编号（1 起）
    pub slot: usize,
}

/// 完整键盘布局
#[derive(Debug, Clone)]
pub struct KeyboardLayout {
    /// 按串口索引排列的按键参数
    pub keys: Vec<KeySpec>,
    /// 虚拟画布尺寸（宽, 高）
    pub canvas: (f32, f32),
}

impl KeyboardLayout {
    /// 由布局配置生成按键参数
    ///
    /// 槽位从按键总数递减到 1，按表顺序分配；反转只改变列表顺序，不改变几何。
    ///
    /// # Errors
    ///
    /// - 按键表为空
    pub fn from_config(cfg: &config::Layout) -> Result<Self, ConfigError> {
        if cfg.keys.is_empty() {
            return Err(ConfigError::EmptyLayout);
        }
        let count = cfg.keys.len();
        let mut keys: Vec<KeySpec> = Vec::with_capacity(count);
        for (i, entry) in cfg.keys.iter().enumerate() {
            let x = keys
                .last()
                .map_or(cfg.padding, |prev| prev.region.right() - entry.overlap);
            let (w, h) = entry.kind.size();
            keys.push(KeySpec {
                region: Rect::new(x, cfg.top, w, h),
                z_order: entry.kind.z_order(),
                color: entry.kind.color(),
                slot: count - i,
            });
        }
        let right = keys
            .iter()
            .map(|k| k.region.right())
            .fold(f32::MIN, f32::max);
        if cfg.reverse {
            keys.reverse();
        }
        Ok(Self {
            keys,
            canvas: (right + cfg.padding, cfg.canvas_height),
        })
    }

    /// 按键数量（同时也是采样槽位数量）
    #[must_use]
    pub fn slot_count(&self) -> usize {
        self.keys.len()
    }
}
