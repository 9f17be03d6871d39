//! 5x7 点阵字形：以矩形实例绘制短文本
//!
//! 每行的连续点合并为一个矩形。小写字母按大写绘制，未收录的字符画成 `?`。

use crate::Instance;
use crate::layout::{Color, Rect};

/// 字形宽（点）
pub const GLYPH_W: usize = 5;
/// 字形高（点）
pub const GLYPH_H: usize = 7;
/// 字距（点）
const ADVANCE: usize = GLYPH_W + 1;

/// 每行低 5 位有效，最高位在左
type Glyph = [u8; GLYPH_H];

const UNKNOWN: Glyph = [0x0E, 0x11, 0x01, 0x02, 0x04, 0x00, 0x04];

/// 查找字符对应的点阵
fn glyph(c: char) -> Glyph {
    match c.to_ascii_uppercase() {
        ' ' => [0; GLYPH_H],
        'A' => [0x0E, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'B' => [0x1E, 0x11, 0x11, 0x1E, 0x11, 0x11, 0x1E],
        'C' => [0x0E, 0x11, 0x10, 0x10, 0x10, 0x11, 0x0E],
        'D' => [0x1E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x1E],
        'E' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x1F],
        'F' => [0x1F, 0x10, 0x10, 0x1E, 0x10, 0x10, 0x10],
        'G' => [0x0E, 0x11, 0x10, 0x17, 0x11, 0x11, 0x0F],
        'H' => [0x11, 0x11, 0x11, 0x1F, 0x11, 0x11, 0x11],
        'I' => [0x0E, 0x04, 0x04, 0x04, 0x04, 0x04, 0x0E],
        'J' => [0x07, 0x02, 0x02, 0x02, 0x02, 0x12, 0x0C],
        'K' => [0x11, 0x12, 0x14, 0x18, 0x14, 0x12, 0x11],
        'L' => [0x10, 0x10, 0x10, 0x10, 0x10, 0x10, 0x1F],
        'M' => [0x11, 0x1B, 0x15, 0x15, 0x11, 0x11, 0x11],
        'N' => [0x11, 0x11, 0x19, 0x15, 0x13, 0x11, 0x11],
        'O' => [0x0E, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'P' => [0x1E, 0x11, 0x11, 0x1E, 0x10, 0x10, 0x10],
        'Q' => [0x0E, 0x11, 0x11, 0x11, 0x15, 0x12, 0x0D],
        'R' => [0x1E, 0x11, 0x11, 0x1E, 0x14, 0x12, 0x11],
        'S' => [0x0F, 0x10, 0x10, 0x0E, 0x01, 0x01, 0x1E],
        'T' => [0x1F, 0x04, 0x04, 0x04, 0x04, 0x04, 0x04],
        'U' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x11, 0x0E],
        'V' => [0x11, 0x11, 0x11, 0x11, 0x11, 0x0A, 0x04],
        'W' => [0x11, 0x11, 0x11, 0x15, 0x15, 0x15, 0x0A],
        'X' => [0x11, 0x11, 0x0A, 0x04, 0x0A, 0x11, 0x11],
        'Y' => [0x11, 0x11, 0x11, 0x0A, 0x04, 0x04, 0x04],
        'Z' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x10, 0x1F],
        '0' => [0x0E, 0x11, 0x13, 0x15, 0x19, 0x11, 0x0E],
        '1' => [0x04, 0x0C, 0x04, 0x04, 0x04, 0x04, 0x0E],
        '2' => [0x0E, 0x11, 0x01, 0x02, 0x04, 0x08, 0x1F],
        '3' => [0x1F, 0x02, 0x04, 0x02, 0x01, 0x11, 0x0E],
        '4' => [0x02, 0x06, 0x0A, 0x12, 0x1F, 0x02, 0x02],
        '5' => [0x1F, 0x10, 0x1E, 0x01, 0x01, 0x11, 0x0E],
        '6' => [0x06, 0x08, 0x10, 0x1E, 0x11, 0x11, 0x0E],
        '7' => [0x1F, 0x01, 0x02, 0x04, 0x08, 0x08, 0x08],
        '8' => [0x0E, 0x11, 0x11, 0x0E, 0x11, 0x11, 0x0E],
        '9' => [0x0E, 0x11, 0x11, 0x0F, 0x01, 0x02, 0x0C],
        '-' => [0x00, 0x00, 0x00, 0x1F, 0x00, 0x00, 0x00],
        '_' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x1F],
        '.' => [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C],
        _ => UNKNOWN,
    }
}

/// 一行点阵中连续点的区间（起始列, 长度）
fn runs(row: u8) -> impl Iterator<Item = (usize, usize)> {
    let mut col = 0;
    std::iter::from_fn(move || {
        let lit = |c: usize| row & (1 << (GLYPH_W - 1 - c)) != 0;
        while col < GLYPH_W && !lit(col) {
            col += 1;
        }
        if col >= GLYPH_W {
            return None;
        }
        let start = col;
        while col < GLYPH_W && lit(col) {
            col += 1;
        }
        Some((start, col - start))
    })
}

/// 以 `(x, bottom)` 为左下角绘制单行文本，每个点边长 `scale` 像素
pub fn push_text(
    text: &str,
    x: f32,
    bottom: f32,
    scale: f32,
    color: Color,
    out: &mut Vec<Instance>,
) {
    let top = bottom - GLYPH_H as f32 * scale;
    for (i, c) in text.chars().enumerate() {
        let left = x + (i * ADVANCE) as f32 * scale;
        for (r, row) in glyph(c).into_iter().enumerate() {
            for (start, len) in runs(row) {
                out.push(Instance::from_rect(
                    Rect::new(
                        left + start as f32 * scale,
                        top + r as f32 * scale,
                        len as f32 * scale,
                        scale,
                    ),
                    color,
                ));
            }
        }
    }
}
