//! 水平切片的 PNG 快照.

use std::path::Path;

use image::{ImageResult, Rgb, RgbImage};

use crate::consts::gray::*;
use crate::{IntensityWindow, Mask, MriScan};

/// 表明一个体数据的水平切片可以通过 **可视化友好** 模式保存为图像.
///
/// 对于 [`MriScan`], 切片会用该切片自身的最小/最大强度规范化到 0..=255 的灰度,
/// 并可叠加一张掩膜 (前景以红色半透明显示); 对于 [`Mask`], 前景为白色, 背景为黑色.
pub trait SliceSnapshot {
    /// 将第 `z` 层水平切片保存到 `path`, 可选地叠加 `overlay` 掩膜.
    ///
    /// # 注意
    ///
    /// `z` 越界, 或 `overlay` 与自身形状不同时, 程序 panic.
    fn save_slice<P: AsRef<Path>>(&self, z: usize, overlay: Option<&Mask>, path: P) -> ImageResult<()>;
}

/// 叠加颜色.
const OVERLAY: [u8; 3] = [WHITE, BLACK, BLACK];

/// 以 1:1 的比例将 `gray` 与叠加颜色混合.
#[inline]
fn blend(gray: u8) -> Rgb<u8> {
    Rgb(OVERLAY.map(|c| ((c as u16 + gray as u16) / 2) as u8))
}

fn paint<F>(height: usize, width: usize, overlay: Option<(&Mask, usize)>, gray_at: F) -> RgbImage
where
    F: Fn(usize, usize) -> u8,
{
    let mut buf = RgbImage::new(width as u32, height as u32);
    for h in 0..height {
        for w in 0..width {
            let gray = gray_at(h, w);
            let marked = overlay.is_some_and(|(m, z)| is_foreground(m[(z, h, w)]));
            let pix = if marked { blend(gray) } else { Rgb([gray; 3]) };
            buf.put_pixel(w as u32, h as u32, pix);
        }
    }
    buf
}

impl SliceSnapshot for MriScan {
    fn save_slice<P: AsRef<Path>>(&self, z: usize, overlay: Option<&Mask>, path: P) -> ImageResult<()> {
        let slice = self.slice_at(z);
        if let Some(m) = overlay {
            assert_eq!(m.data().dim(), self.data().dim(), "掩膜与体数据形状不一致");
        }
        let (lo, hi) = slice
            .iter()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v as f64), hi.max(v as f64))
            });
        let window = IntensityWindow::new(lo, hi).unwrap_or(IntensityWindow::from_seed_value(0.0, 1.0, 1.0));
        let (height, width) = slice.dim();
        let buf = paint(height, width, overlay.map(|m| (m, z)), |h, w| {
            window.eval_gray(slice[(h, w)] as f64).unwrap_or(BLACK)
        });
        buf.save(path)
    }
}

impl SliceSnapshot for Mask {
    fn save_slice<P: AsRef<Path>>(&self, z: usize, overlay: Option<&Mask>, path: P) -> ImageResult<()> {
        let slice = self.slice_at(z);
        if let Some(m) = overlay {
            assert_eq!(m.data().dim(), self.data().dim(), "掩膜与体数据形状不一致");
        }
        let (height, width) = slice.dim();
        let buf = paint(height, width, overlay.map(|m| (m, z)), |h, w| {
            if is_foreground(slice[(h, w)]) {
                WHITE
            } else {
                BLACK
            }
        });
        buf.save(path)
    }
}
