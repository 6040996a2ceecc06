//! 二值腐蚀, 膨胀, 开运算与闭运算.
//!
//! 输入掩膜中任何非零体素都视为前景, 输出掩膜只含 `MASK_FOREGROUND` 与
//! `MASK_BACKGROUND`. 所有操作都不修改输入, 而是返回新分配的掩膜.

use ndarray::{s, ArrayViewMut2};

use super::element::{Offset3d, StructuringElement};
use crate::consts::gray::*;
use crate::{Geometry, GeometryAttr, Idx3d, Mask};

/// 越界体素被视为何种像素.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum Boundary {
    Foreground,
    Background,
}

/// `pos + d`, 越界时返回 `None`.
#[inline]
fn shifted((z, h, w): Idx3d, (dz, dh, dw): Offset3d, (sz, sh, sw): Idx3d) -> Option<Idx3d> {
    let z = z.checked_add_signed(dz).filter(|v| *v < sz)?;
    let h = h.checked_add_signed(dh).filter(|v| *v < sh)?;
    let w = w.checked_add_signed(dw).filter(|v| *v < sw)?;
    Some((z, h, w))
}

/// 结构元覆盖范围内, 是否存在 (`want_fg = true`) 前景, 或存在 (`want_fg = false`) 背景?
#[inline]
fn any_under(mask: &Mask, pos: Idx3d, se: &StructuringElement, want_fg: bool, boundary: Boundary) -> bool {
    let shape = mask.shape();
    se.offsets().iter().any(|d| match shifted(pos, *d, shape) {
        Some(q) => is_foreground(mask[q]) == want_fg,
        None => (boundary == Boundary::Foreground) == want_fg,
    })
}

/// 逐切片计算输出掩膜.
fn fill_slice(z: usize, mut out: ArrayViewMut2<u8>, op: &(dyn Fn(Idx3d) -> bool + Sync)) {
    for ((h, w), pix) in out.indexed_iter_mut() {
        *pix = if op((z, h, w)) { MASK_FOREGROUND } else { MASK_BACKGROUND };
    }
}

#[cfg(feature = "rayon")]
fn apply(mask: &Mask, op: &(dyn Fn(Idx3d) -> bool + Sync)) -> Mask {
    Mask::par_from_slices(*mask.geometry(), MASK_BACKGROUND, |z, v| fill_slice(z, v, op))
}

#[cfg(not(feature = "rayon"))]
fn apply(mask: &Mask, op: &(dyn Fn(Idx3d) -> bool + Sync)) -> Mask {
    let mut out = Mask::background(*mask.geometry());
    for (z, v) in out.data_mut().axis_iter_mut(ndarray::Axis(0)).enumerate() {
        fill_slice(z, v, op);
    }
    out
}

/// 二值膨胀: 结构元覆盖范围内存在前景, 则输出前景. 越界体素视为背景.
pub fn dilate(mask: &Mask, se: &StructuringElement) -> Mask {
    apply(mask, &|pos| any_under(mask, pos, se, true, Boundary::Background))
}

/// 二值腐蚀: 结构元覆盖范围内全部为前景, 才输出前景. 越界体素视为前景,
/// 因此贴着体数据边界的前景不会被边界腐蚀.
pub fn erode(mask: &Mask, se: &StructuringElement) -> Mask {
    apply(mask, &|pos| !any_under(mask, pos, se, false, Boundary::Foreground))
}

/// 开运算: 先腐蚀后膨胀. 用于切断细小连接, 去除细小突起.
#[inline]
pub fn opening(mask: &Mask, se: &StructuringElement) -> Mask {
    dilate(&erode(mask, se), se)
}

/// 闭运算: 先膨胀后腐蚀. 用于填充细小空隙.
///
/// 计算前在四周补上宽度为结构元半径的背景, 计算后裁剪回原网格,
/// 以免腐蚀时越界体素被当作前景, 从而使前景沿体数据边界增长.
pub fn closing(mask: &Mask, se: &StructuringElement) -> Mask {
    let r = se.radius();
    let padded = pad(mask, r);
    let closed = erode(&dilate(&padded, se), se);
    crop(&closed, r, *mask.geometry())
}

/// 在掩膜四周补上宽度为 `r` 的背景.
fn pad(mask: &Mask, r: usize) -> Mask {
    let (z, h, w) = mask.shape();
    let mut out = Mask::background(Geometry::unit((z + 2 * r, h + 2 * r, w + 2 * r)));
    out.data_mut()
        .slice_mut(s![r..r + z, r..r + h, r..r + w])
        .assign(&mask.data());
    out
}

/// 从补边后的掩膜中裁剪出 `geometry` 对应的部分.
fn crop(padded: &Mask, r: usize, geometry: Geometry) -> Mask {
    let (z, h, w) = geometry.shape();
    let data = padded.data().slice(s![r..r + z, r..r + h, r..r + w]).to_owned();
    Mask::with_geometry(geometry, data)
}
