//! 按键实体：区域、层级、音色变体与按下状态

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::Instance;
use crate::audio::SoundSample;
use crate::catalog::Catalog;
use crate::error::ConfigError;
use crate::layout::{BLACK, Color, KeySpec, KeyboardLayout, Rect, rgb};

/// 按下时的高亮颜色
const HIGHLIGHT: Color = rgb(255, 128, 128);
/// 描边宽度（画布单位）
const OUTLINE: f32 = 1.0;

/// 画布到窗口的缩放变换
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayTransform {
    /// 虚拟画布尺寸（宽, 高）
    pub canvas: (f32, f32),
    /// 窗口尺寸（宽, 高）
    pub window: (f32, f32),
}

impl DisplayTransform {
    /// 窗口像素坐标转换为画布坐标
    #[must_use]
    pub fn to_canvas(&self, x: f32, y: f32) -> (f32, f32) {
        if self.window.0 <= 0.0 || self.window.1 <= 0.0 {
            return (x, y);
        }
        (
            (x * self.canvas.0 / self.window.0).trunc(),
            (y * self.canvas.1 / self.window.1).trunc(),
        )
    }

    /// 画布矩形转换为窗口像素矩形
    #[must_use]
    pub fn to_window(&self, r: Rect) -> Rect {
        let sx = self.window.0 / self.canvas.0;
        let sy = self.window.1 / self.canvas.1;
        Rect::new(r.x * sx, r.y * sy, r.width * sx, r.height * sy)
    }
}

/// 键盘上的一个按键
pub struct Key<S> {
    /// 命中与绘制区域（画布坐标）
    region: Rect,
    /// 层级：0 白键，1 黑键
    z_order: u8,
    /// 基础颜色
    color: Color,
    /// 各音色目录对应的采样
    variants: Vec<S>,
    /// 当前音色索引
    variant_index: usize,
    /// 是否按下
    pressed: bool,
    /// 每次按下的淡出时长
    fade_out: Duration,
}

impl<S: SoundSample> Key<S> {
    /// 由布局参数和已加载的采样创建按键
    ///
    /// # Errors
    ///
    /// - `variants` 为空
    pub fn new(spec: &KeySpec, variants: Vec<S>, fade_out: Duration) -> Result<Self, ConfigError> {
        if variants.is_empty() {
            return Err(ConfigError::NoVariants { slot: spec.slot });
        }
        Ok(Self {
            region: spec.region,
            z_order: spec.z_order,
            color: spec.color,
            variants,
            variant_index: 0,
            pressed: false,
            fade_out,
        })
    }

    /// 按下：停止本键所有声部并播放当前音色
    ///
    /// 已按下时不做任何事并返回 `false`。
    pub fn press(&mut self) -> bool {
        if self.pressed {
            return false;
        }
        for variant in &mut self.variants {
            variant.stop();
        }
        if let Some(variant) = self.variants.get_mut(self.variant_index) {
            variant.play(self.fade_out);
        }
        self.pressed = true;
        true
    }

    /// 抬起；未按下时返回 `false`
    pub fn release(&mut self) -> bool {
        if !self.pressed {
            return false;
        }
        self.pressed = false;
        true
    }
}

impl<S> Key<S> {
    /// 切换到下一个音色
    pub fn next_variant(&mut self) {
        self.variant_index = (self.variant_index + 1) % self.variants.len();
    }

    /// 切换到上一个音色
    pub fn previous_variant(&mut self) {
        let n = self.variants.len();
        self.variant_index = (self.variant_index + n - 1) % n;
    }

    /// 画布坐标点是否落在按键区域内
    #[must_use]
    pub fn hit_test(&self, x: f32, y: f32) -> bool {
        self.region.contains(x, y)
    }

    /// 追加本键的绘制实例：描边与填充
    pub fn render(&self, transform: &DisplayTransform, out: &mut Vec<Instance>) {
        let fill = if self.pressed { HIGHLIGHT } else { self.color };
        out.push(Instance::from_rect(transform.to_window(self.region), BLACK));
        out.push(Instance::from_rect(
            transform.to_window(self.region.inset(OUTLINE)),
            fill,
        ));
    }

    /// 命中与绘制区域
    #[must_use]
    pub const fn region(&self) -> Rect {
        self.region
    }

    /// 层级
    #[must_use]
    pub const fn z_order(&self) -> u8 {
        self.z_order
    }

    /// 当前音色索引
    #[must_use]
    pub const fn variant_index(&self) -> usize {
        self.variant_index
    }

    /// 音色数量
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// 全部音色采样
    #[must_use]
    pub fn variants(&self) -> &[S] {
        &self.variants
    }

    /// 是否按下
    #[must_use]
    pub const fn is_pressed(&self) -> bool {
        self.pressed
    }
}

/// 按布局与音色目录创建全部按键，`load` 负责加载单个采样文件
///
/// # Errors
///
/// - 某个槽位在音色目录中没有采样路径
/// - `load` 返回的任何错误
pub fn build_keys<S, F>(
    layout: &KeyboardLayout,
    catalog: &Catalog,
    fade_out: Duration,
    mut load: F,
) -> Result<Vec<Key<S>>, ConfigError>
where
    S: SoundSample,
    F: FnMut(&Path) -> Result<S, ConfigError>,
{
    layout
        .keys
        .iter()
        .map(|spec| {
            let paths = catalog
                .slot(spec.slot)
                .ok_or_else(|| ConfigError::MissingSample {
                    path: PathBuf::from(format!("note{}.wav", spec.slot)),
                })?;
            let variants = paths
                .iter()
                .map(|p| load(p))
                .collect::<Result<Vec<_>, _>>()?;
            Key::new(spec, variants, fade_out)
        })
        .collect()
}
