use log::{debug, info, warn};
use num::ToPrimitive;

use super::threshold::{binarize_above, otsu_threshold};
use crate::consts::OTSU_BINS;
use crate::morph::{closing, keep_label, label_components, relabel_by_size, StructuringElement};
use crate::{GeometryAttr, Mask, Volume};

/// 全脑 (前景) 分割参数.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForegroundParams {
    /// Otsu 直方图 bin 数.
    pub bins: usize,

    /// 闭运算球形结构元半径.
    pub closing_radius: usize,
}

impl Default for ForegroundParams {
    fn default() -> Self {
        Self {
            bins: OTSU_BINS,
            closing_radius: 1,
        }
    }
}

/// 全脑 (前景) 分割.
///
/// 1. Otsu 阈值二值化, 高于阈值的体素为前景;
/// 2. 球形结构元闭运算, 填充细小空隙;
/// 3. 6-连通分量标记, 按体素个数降序重标记;
/// 4. 只保留标签 1, 即最大的连通分量.
///
/// 结果只依赖输入体数据. 若体数据为空, 强度恒定或 `bins < 2`, 返回全背景掩膜.
pub fn segment_foreground<T: ToPrimitive + Copy>(volume: &Volume<T>, params: &ForegroundParams) -> Mask {
    let Some(threshold) = otsu_threshold(volume, params.bins) else {
        warn!("no otsu threshold ({} bins), foreground is empty", params.bins);
        return Mask::background(*volume.geometry());
    };
    let binary = binarize_above(volume, threshold);
    debug!(
        "otsu threshold = {threshold:.4}, {} voxels above",
        binary.count_foreground()
    );

    let closed = closing(&binary, &StructuringElement::ball(params.closing_radius));
    let components = relabel_by_size(&label_components(&closed), 0);
    let mask = keep_label(&components, 1);
    info!(
        "foreground: {} components, kept the largest with {} voxels",
        components.len(),
        mask.count_foreground()
    );
    mask
}
