//! 窗口图标：程序内绘制的 64x64 琴键图案

use tracing::warn;
use winit::window::Icon;

/// 图标边长（像素）
const SIZE: u32 = 64;
/// 琴键区域的上下边界
const KEYS_TOP: u32 = 8;
const KEYS_BOTTOM: u32 = 56;
/// 黑键下沿
const BLACK_BOTTOM: u32 = 36;
/// 白键宽（含 1 像素缝隙）
const WHITE_W: u32 = 15;
/// 白键区域左边界
const LEFT: u32 = 2;

const CLEAR: [u8; 4] = [0, 0, 0, 0];
const IVORY: [u8; 4] = [255, 255, 255, 255];
const EBONY: [u8; 4] = [0, 0, 0, 255];

/// 单个像素：四个白键，相邻白键之间各有一个黑键
fn pixel(x: u32, y: u32) -> [u8; 4] {
    if !(KEYS_TOP..KEYS_BOTTOM).contains(&y) || !(LEFT..LEFT + WHITE_W * 4).contains(&x) {
        return CLEAR;
    }
    let col = x - LEFT;
    if y < BLACK_BOTTOM && (1..4).any(|k| col.abs_diff(k * WHITE_W) < 4) {
        return EBONY;
    }
    if col % WHITE_W == WHITE_W - 1 {
        EBONY
    } else {
        IVORY
    }
}

/// 图标的 RGBA 像素，逐行排列
pub(crate) fn piano_rgba() -> Vec<u8> {
    (0..SIZE)
        .flat_map(|y| (0..SIZE).flat_map(move |x| pixel(x, y)))
        .collect()
}

/// 构造窗口图标，失败时只记录警告
pub(crate) fn window_icon() -> Option<Icon> {
    Icon::from_rgba(piano_rgba(), SIZE, SIZE)
        .inspect_err(|e| warn!(error = %e, "窗口图标创建失败"))
        .ok()
}
