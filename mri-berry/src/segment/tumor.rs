//! 种子点肿瘤分割.
//!
//! 状态流转: `SeedPending -> Grown -> Opened -> Filtered -> Done`. 生长或开运算后
//! 区域为空时提前失败.

use std::collections::VecDeque;

use log::{debug, info, warn};
use num::ToPrimitive;

use super::seed::{SeedPicker, SeedPoint};
use crate::consts::gray::*;
use crate::error::{EmptyPhase, PipelineError, Result, Stage, VolumeTag};
use crate::morph::{label_components, opening, relabel_by_size, StructuringElement};
use crate::{GeometryAttr, Idx3d, IntensityWindow, Mask, MriScan, Volume};

/// 肿瘤分割参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TumorParams {
    /// 强度窗口下限系数.
    pub lower_factor: f64,

    /// 强度窗口上限系数.
    pub upper_factor: f64,

    /// 连通分量最小体素个数, 更小的分量被丢弃.
    pub min_size: usize,

    /// 开运算球形结构元半径.
    pub opening_radius: usize,
}

impl Default for TumorParams {
    fn default() -> Self {
        Self {
            lower_factor: 0.8,
            upper_factor: 1.2,
            min_size: 100,
            opening_radius: 1,
        }
    }
}

impl TumorParams {
    /// 由种子点强度得到的强度窗口.
    #[inline]
    pub fn window(&self, seed_value: f64) -> IntensityWindow {
        IntensityWindow::from_seed_value(seed_value, self.lower_factor, self.upper_factor)
    }
}

/// 从 `seed` 出发, 以 6-相邻规则进行区域生长, 接受强度落在 `window` 内的体素.
///
/// 若种子点自身不在窗口内, 返回全背景掩膜.
///
/// # 注意
///
/// `seed` 越界时程序 panic.
pub fn grow_region<T: ToPrimitive + Copy>(volume: &Volume<T>, seed: Idx3d, window: &IntensityWindow) -> Mask {
    let accept = |pos: Idx3d| volume[pos].to_f64().is_some_and(|v| window.contains(v));
    let mut out = Mask::background(*volume.geometry());
    if !accept(seed) {
        return out;
    }

    let mut bfs_q = VecDeque::with_capacity(64);
    out[seed] = MASK_FOREGROUND;
    bfs_q.push_back(seed);
    while let Some(cur) = bfs_q.pop_front() {
        for neigh in volume.diamond_neighbours(cur) {
            if is_background(out[neigh]) && accept(neigh) {
                out[neigh] = MASK_FOREGROUND;
                bfs_q.push_back(neigh);
            }
        }
    }
    out
}

/// 分割进度.
#[derive(Debug)]
enum Progress {
    SeedPending,
    Grown(SeedPoint, Mask),
    Opened(SeedPoint, Mask),
    Filtered(SeedPoint, Mask),
}

/// 种子点肿瘤分割器. 出错时会在错误中标明所处理的体数据.
#[derive(Clone, Debug, Default)]
pub struct TumorSegmenter {
    params: TumorParams,
    tag: VolumeTag,
}

impl TumorSegmenter {
    /// 创建分割器.
    #[inline]
    pub fn new(params: TumorParams) -> Self {
        Self {
            params,
            tag: VolumeTag::default(),
        }
    }

    /// 设置体数据在错误信息中的名称.
    #[inline]
    pub fn volume_tag(mut self, tag: impl Into<VolumeTag>) -> Self {
        self.tag = tag.into();
        self
    }

    /// 分割参数.
    #[inline]
    pub fn params(&self) -> &TumorParams {
        &self.params
    }

    /// 执行分割. `seed` 为 `None` 时借助 `picker` 获取种子点.
    ///
    /// # 返回值
    ///
    /// 二值肿瘤掩膜, 以及实际使用的种子点 (供另一时间点的体数据复用).
    ///
    /// # 错误
    ///
    /// 1. 没有可用种子点: `MissingSeed`;
    /// 2. 种子点越界: `SeedOutOfBounds`;
    /// 3. 区域生长或开运算后为空: `EmptyRegion`.
    ///
    /// 小分量过滤后为空不是错误, 只记录警告并返回全背景掩膜.
    pub fn run(
        &self,
        volume: &MriScan,
        seed: Option<SeedPoint>,
        picker: Option<&mut dyn SeedPicker>,
    ) -> Result<(Mask, SeedPoint)> {
        let mut picker = picker;
        let mut state = Progress::SeedPending;
        loop {
            state = match state {
                Progress::SeedPending => {
                    let seed = seed
                        .or_else(|| picker.as_mut().and_then(|p| p.pick_seed(volume)))
                        .ok_or_else(|| PipelineError::MissingSeed {
                            stage: Stage::SegmentTumor,
                            volume: self.tag.clone(),
                        })?;
                    let grown = self.grow(volume, seed)?;
                    Progress::Grown(seed, grown)
                }
                Progress::Grown(seed, grown) => {
                    let opened = opening(&grown, &StructuringElement::ball(self.params.opening_radius));
                    debug!("[{}] opening kept {} voxels", self.tag, opened.count_foreground());
                    if opened.is_background() {
                        return Err(self.empty(seed, EmptyPhase::Opened));
                    }
                    Progress::Opened(seed, opened)
                }
                Progress::Opened(seed, opened) => {
                    let components = relabel_by_size(&label_components(&opened), self.params.min_size);
                    let filtered = components.to_mask();
                    debug!(
                        "[{}] {} components of at least {} voxels",
                        self.tag,
                        components.len(),
                        self.params.min_size
                    );
                    Progress::Filtered(seed, filtered)
                }
                Progress::Filtered(seed, mask) => {
                    let count = mask.count_foreground();
                    if count == 0 {
                        warn!(
                            "[{}] every component is smaller than {} voxels, tumor mask is empty",
                            self.tag, self.params.min_size
                        );
                    } else {
                        info!("[{}] tumor mask has {count} voxels (seed {seed})", self.tag);
                    }
                    return Ok((mask, seed));
                }
            };
        }
    }

    /// 检查种子点并进行区域生长.
    fn grow(&self, volume: &MriScan, seed: SeedPoint) -> Result<Mask> {
        let pos = seed.index();
        if !volume.check(&pos) {
            return Err(PipelineError::SeedOutOfBounds {
                volume: self.tag.clone(),
                seed: pos,
                shape: volume.shape(),
            });
        }
        let value = volume[pos] as f64;
        let window = self.params.window(value);
        let grown = grow_region(volume, pos, &window);
        debug!(
            "[{}] seed {seed} = {value:.3}, window [{:.3}, {:.3}], grown {} voxels",
            self.tag,
            window.lower_bound(),
            window.upper_bound(),
            grown.count_foreground()
        );
        if grown.is_background() {
            return Err(self.empty(seed, EmptyPhase::Grown));
        }
        Ok(grown)
    }

    fn empty(&self, seed: SeedPoint, phase: EmptyPhase) -> PipelineError {
        PipelineError::EmptyRegion {
            stage: Stage::SegmentTumor,
            volume: self.tag.clone(),
            seed: seed.index(),
            phase,
        }
    }
}

/// 以给定种子点分割肿瘤. `seed` 为 `None` 时返回 `MissingSeed` 错误.
pub fn segment_tumor(volume: &MriScan, seed: Option<SeedPoint>, params: &TumorParams) -> Result<(Mask, SeedPoint)> {
    TumorSegmenter::new(*params).run(volume, seed, None)
}

/// 分割肿瘤. `seed` 为 `None` 时借助 `picker` 获取种子点.
pub fn segment_tumor_with<P: SeedPicker>(
    volume: &MriScan,
    seed: Option<SeedPoint>,
    picker: &mut P,
    params: &TumorParams,
) -> Result<(Mask, SeedPoint)> {
    TumorSegmenter::new(*params).run(volume, seed, Some(picker))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    /// 背景 10, `[lo, hi)³` 的立方块为 100.
    fn block_volume(n: usize, lo: usize, hi: usize) -> MriScan {
        let data = Array3::from_shape_fn((n, n, n), |(z, h, w)| {
            let inside = (lo..hi).contains(&z) && (lo..hi).contains(&h) && (lo..hi).contains(&w);
            if inside {
                100.0
            } else {
                10.0
            }
        });
        MriScan::new(data, [1.0; 3], [0.0; 3]).unwrap()
    }

    #[test]
    fn test_grow_fills_exactly_the_block() {
        let v = block_volume(24, 5, 15);
        let window = TumorParams::default().window(100.0);
        let grown = grow_region(&v, (9, 9, 9), &window);
        assert_eq!(grown.count_foreground(), 1000);
        assert!(grown
            .foreground_pos()
            .iter()
            .all(|&(z, h, w)| (5..15).contains(&z) && (5..15).contains(&h) && (5..15).contains(&w)));
    }

    #[test]
    fn test_segment_tumor_on_block() {
        let v = block_volume(24, 5, 15);
        let (mask, seed) = segment_tumor(&v, Some(SeedPoint::new(9, 9, 9)), &TumorParams::default()).unwrap();
        assert_eq!(seed, SeedPoint::new(9, 9, 9));
        // 开运算只去除立方块的 8 个角.
        assert_eq!(mask.count_foreground(), 992);
        assert_eq!(mask[(5, 5, 5)], MASK_BACKGROUND);
        assert_eq!(mask[(5, 5, 6)], MASK_FOREGROUND);
    }

    #[test]
    fn test_deterministic() {
        let v = block_volume(24, 5, 15);
        let seed = Some(SeedPoint::new(7, 8, 9));
        let a = segment_tumor(&v, seed, &TumorParams::default()).unwrap();
        let b = segment_tumor(&v, seed, &TumorParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_missing_seed() {
        let v = block_volume(8, 2, 6);
        let err = segment_tumor(&v, None, &TumorParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::MissingSeed { .. }));
    }

    #[test]
    fn test_picker_is_used_only_without_seed() {
        let v = block_volume(24, 5, 15);
        let mut calls = 0;
        let mut picker = |_: &MriScan| {
            calls += 1;
            Some(SeedPoint::new(10, 10, 10))
        };
        let params = TumorParams::default();
        let (_, seed) = segment_tumor_with(&v, None, &mut picker, &params).unwrap();
        assert_eq!(seed, SeedPoint::new(10, 10, 10));
        let (_, seed) = segment_tumor_with(&v, Some(SeedPoint::new(6, 6, 6)), &mut picker, &params).unwrap();
        assert_eq!(seed, SeedPoint::new(6, 6, 6));
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_seed_out_of_bounds() {
        let v = block_volume(8, 2, 6);
        let err = segment_tumor(&v, Some(SeedPoint::new(8, 0, 0)), &TumorParams::default()).unwrap_err();
        assert!(matches!(err, PipelineError::SeedOutOfBounds { seed: (8, 0, 0), .. }));
    }

    #[test]
    fn test_isolated_seed_fails_after_opening() {
        // 种子点的 6 个邻居都在窗口外.
        let mut v = block_volume(9, 0, 0);
        v[(4, 4, 4)] = 100.0;
        let err = TumorSegmenter::new(TumorParams::default())
            .volume_tag("registered")
            .run(&v, Some(SeedPoint::new(4, 4, 4)), None)
            .unwrap_err();
        match err {
            PipelineError::EmptyRegion { phase, volume, seed, .. } => {
                assert_eq!(phase, EmptyPhase::Opened);
                assert_eq!(volume, VolumeTag::registered());
                assert_eq!(seed, (4, 4, 4));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_negative_seed_fails_at_growing() {
        let mut v = block_volume(9, 0, 0);
        v[(4, 4, 4)] = -50.0;
        let err = segment_tumor(&v, Some(SeedPoint::new(4, 4, 4)), &TumorParams::default()).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyRegion {
                phase: EmptyPhase::Grown,
                ..
            }
        ));
    }

    #[test]
    fn test_small_tumor_filtered_out() {
        let v = block_volume(16, 5, 9);
        let (mask, _) = segment_tumor(&v, Some(SeedPoint::new(6, 6, 6)), &TumorParams::default()).unwrap();
        assert!(mask.is_background());
    }

    #[test]
    fn test_wider_window_never_shrinks_growth() {
        let data = Array3::from_shape_fn((12, 12, 12), |(z, h, w)| (50 + z * 3 + h + w) as f32);
        let v = MriScan::new(data, [1.0; 3], [0.0; 3]).unwrap();
        let seed = (6, 6, 6);
        let value = v[seed] as f64;
        let mut previous = 0;
        for (lf, uf) in [(0.95, 1.05), (0.9, 1.1), (0.8, 1.2), (0.5, 1.5), (0.0, 10.0)] {
            let grown = grow_region(&v, seed, &IntensityWindow::from_seed_value(value, lf, uf));
            let count = grown.count_foreground();
            assert!(count >= previous);
            previous = count;
        }
        assert_eq!(previous, 12 * 12 * 12);
    }
}
