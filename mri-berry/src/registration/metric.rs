//! Mattes 风格互信息.
//!
//! 在固定图像上规则地抽取一组采样点, 经变换映射到浮动图像后线性插值取值,
//! 以三角 (一阶 B 样条) Parzen 窗将样本对软分配到联合直方图, 由此估计互信息.
//! 代价函数为互信息的相反数, 越小越好.

use num::ToPrimitive;

use super::interpolate::LinearInterpolator;
use super::transform::{AffineMap, RigidTransform};
use crate::error::{PipelineError, Result, Stage, VolumeTag};
use crate::{GeometryAttr, Point3d, Volume};

/// 每个并行任务负责的样本个数. 分块后按固定顺序合并, 以保证结果与线程数无关.
const CHUNK: usize = 4096;

/// 将强度线性映射到 `[0, bins - 1]` 的连续 bin 坐标.
#[derive(Copy, Clone, Debug)]
struct BinMapper {
    min: f64,
    scale: f64,
    bins: usize,
}

impl BinMapper {
    fn new(min: f64, max: f64, bins: usize) -> Self {
        let range = if max > min { max - min } else { 1.0 };
        Self {
            min,
            scale: (bins - 1) as f64 / range,
            bins,
        }
    }

    /// 返回下侧 bin 下标, 以及上侧 bin (下标 + 1) 的权重.
    #[inline]
    fn soft_bin(&self, v: f64) -> (usize, f64) {
        let u = ((v - self.min) * self.scale).clamp(0.0, (self.bins - 1) as f64);
        let i0 = (u.floor() as usize).min(self.bins - 2);
        (i0, u - i0 as f64)
    }
}

/// 求 `volume` 的强度最小值与最大值.
fn value_range<T: ToPrimitive + Copy>(volume: &Volume<T>) -> (f64, f64) {
    volume
        .data()
        .iter()
        .filter_map(|v| v.to_f64())
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}

/// Mattes 风格互信息度量.
pub struct MattesMutualInformation<'a, M> {
    bins: usize,
    fixed_bins: BinMapper,
    moving_bins: BinMapper,
    /// 固定图像采样点: (物理坐标, 强度).
    samples: Vec<(Point3d, f64)>,
    moving: LinearInterpolator<'a, M>,
}

impl<'a, M: ToPrimitive + Copy + Sync> MattesMutualInformation<'a, M> {
    /// 构建度量.
    ///
    /// 固定图像按行优先顺序以固定步长抽样, 样本数不超过 `max_samples`.
    /// 两幅图像各自的强度范围分别决定各自的直方图 bin 划分.
    ///
    /// # 注意
    ///
    /// 任一图像为空时返回 `Geometry` 错误; `bins < 2` 或 `max_samples == 0` 时返回 `Config` 错误.
    pub fn new<F: ToPrimitive + Copy>(
        fixed: &Volume<F>,
        moving: &'a Volume<M>,
        bins: usize,
        max_samples: usize,
    ) -> Result<Self> {
        if fixed.size() == 0 {
            return Err(PipelineError::geometry(Stage::Register, VolumeTag::fixed(), "empty volume"));
        }
        if moving.size() == 0 {
            return Err(PipelineError::geometry(Stage::Register, VolumeTag::moving(), "empty volume"));
        }
        if bins < 2 || max_samples == 0 {
            return Err(PipelineError::Config {
                stage: Stage::Register,
                reason: format!("need at least 2 bins and 1 sample, got {bins} bins, {max_samples} samples"),
            });
        }

        let (f_lo, f_hi) = value_range(fixed);
        let (m_lo, m_hi) = value_range(moving);
        let stride = fixed.size().div_ceil(max_samples).max(1);
        let geometry = fixed.geometry();
        let samples = fixed
            .data()
            .indexed_iter()
            .step_by(stride)
            .filter_map(|(pos, v)| {
                let v = v.to_f64().filter(|v| v.is_finite())?;
                Some((geometry.index_to_physical(pos), v))
            })
            .collect();

        Ok(Self {
            bins,
            fixed_bins: BinMapper::new(f_lo, f_hi, bins),
            moving_bins: BinMapper::new(m_lo, m_hi, bins),
            samples,
            moving: LinearInterpolator::new(moving),
        })
    }

    /// 直方图 bin 数.
    #[inline]
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// 固定图像采样点个数.
    #[inline]
    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// 累加一块样本的联合直方图. 返回 (直方图, 有效样本数).
    fn partial_histogram(&self, chunk: &[(Point3d, f64)], map: &AffineMap) -> (Vec<f64>, usize) {
        let b = self.bins;
        let mut hist = vec![0.0; b * b];
        let mut valid = 0usize;
        for (p, fv) in chunk {
            let Some(mv) = self.moving.evaluate(&map.apply(p)) else {
                continue;
            };
            valid += 1;
            let (fi, fw) = self.fixed_bins.soft_bin(*fv);
            let (mi, mw) = self.moving_bins.soft_bin(mv);
            hist[fi * b + mi] += (1.0 - fw) * (1.0 - mw);
            hist[fi * b + mi + 1] += (1.0 - fw) * mw;
            hist[(fi + 1) * b + mi] += fw * (1.0 - mw);
            hist[(fi + 1) * b + mi + 1] += fw * mw;
        }
        (hist, valid)
    }

    #[cfg(feature = "rayon")]
    fn partials(&self, map: &AffineMap) -> Vec<(Vec<f64>, usize)> {
        use rayon::prelude::*;
        self.samples
            .par_chunks(CHUNK)
            .map(|c| self.partial_histogram(c, map))
            .collect()
    }

    #[cfg(not(feature = "rayon"))]
    fn partials(&self, map: &AffineMap) -> Vec<(Vec<f64>, usize)> {
        self.samples
            .chunks(CHUNK)
            .map(|c| self.partial_histogram(c, map))
            .collect()
    }

    /// 在变换 `t` 下的联合直方图 (未归一化) 与落入浮动图像内部的样本数.
    pub fn joint_histogram(&self, t: &RigidTransform) -> (Vec<f64>, usize) {
        let mut hist = vec![0.0; self.bins * self.bins];
        let mut valid = 0usize;
        for (h, n) in self.partials(&t.fixed_to_moving()) {
            hist.iter_mut().zip(h).for_each(|(a, b)| *a += b);
            valid += n;
        }
        (hist, valid)
    }

    /// 在变换 `t` 下的互信息 (nats). 若没有任何样本落入浮动图像内部, 返回 `None`.
    pub fn mutual_information(&self, t: &RigidTransform) -> Option<f64> {
        let (hist, valid) = self.joint_histogram(t);
        if valid == 0 {
            return None;
        }
        let b = self.bins;
        let total: f64 = hist.iter().sum();
        let mut pf = vec![0.0; b];
        let mut pm = vec![0.0; b];
        for i in 0..b {
            for j in 0..b {
                let p = hist[i * b + j] / total;
                pf[i] += p;
                pm[j] += p;
            }
        }
        let mut mi = 0.0;
        for i in 0..b {
            for j in 0..b {
                let p = hist[i * b + j] / total;
                if p > 0.0 {
                    mi += p * (p / (pf[i] * pm[j])).ln();
                }
            }
        }
        Some(mi.max(0.0))
    }

    /// 代价值: 互信息的相反数. 若没有任何样本落入浮动图像内部, 返回 `None`.
    #[inline]
    pub fn value(&self, t: &RigidTransform) -> Option<f64> {
        self.mutual_information(t).map(|mi| -mi)
    }
}
