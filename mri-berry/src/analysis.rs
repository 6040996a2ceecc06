//! 变化量化: 肿瘤体积, 体积差, Dice 系数与掩膜内强度统计.
//!
//! 所有函数都只读输入掩膜与体数据.

use std::fmt;

use ordered_float::OrderedFloat;

use crate::consts::gray::is_foreground;
use crate::error::{PipelineError, Result, Stage};
use crate::{GeometryAttr, Mask, MriScan};

/// 掩膜前景体积 (立方毫米), 即前景体素个数乘以单个体素的体积.
#[inline]
pub fn volume_mm3(mask: &Mask) -> f64 {
    mask.count_foreground() as f64 * mask.voxel()
}

/// 两个时间点的肿瘤体积.
///
/// # 返回值
///
/// `(vol_b - vol_a, vol_a, vol_b)`, 单位为立方毫米. 每个掩膜用自身的体素体积计算.
pub fn volume_difference(a: &Mask, b: &Mask) -> (f64, f64, f64) {
    let (va, vb) = (volume_mm3(a), volume_mm3(b));
    (vb - va, va, vb)
}

fn check_shape(expected: &impl GeometryAttr, actual: &impl GeometryAttr) -> Result<()> {
    if expected.shape() != actual.shape() {
        return Err(PipelineError::ShapeMismatch {
            stage: Stage::Analyze,
            expected: expected.shape(),
            actual: actual.shape(),
        });
    }
    Ok(())
}

/// Dice 系数 `2|A∩B| / (|A| + |B|)`, 非零体素视为前景.
///
/// 两个掩膜均为空时返回 `0.0`. 形状不一致时返回 `ShapeMismatch` 错误.
pub fn dice(a: &Mask, b: &Mask) -> Result<f64> {
    check_shape(a, b)?;
    let (mut inter, mut na, mut nb) = (0usize, 0usize, 0usize);
    for (&pa, &pb) in a.data().iter().zip(b.data().iter()) {
        let (fa, fb) = (is_foreground(pa), is_foreground(pb));
        na += fa as usize;
        nb += fb as usize;
        inter += (fa && fb) as usize;
    }
    if na + nb == 0 {
        return Ok(0.0);
    }
    Ok(2.0 * inter as f64 / (na + nb) as f64)
}

/// 掩膜内的强度统计量.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityStats {
    /// 体素个数.
    pub count: usize,
    /// 均值.
    pub mean: f64,
    /// 总体标准差.
    pub std: f64,
    /// 中位数. 偶数个样本时取中间两个值的平均.
    pub median: f64,
    /// 最小值.
    pub min: f64,
    /// 最大值.
    pub max: f64,
}

/// 统计 `volume` 在 `mask` 非零处的强度.
///
/// 掩膜为空时返回 `Ok(None)`. 形状不一致时返回 `ShapeMismatch` 错误.
pub fn intensity_statistics(volume: &MriScan, mask: &Mask) -> Result<Option<IntensityStats>> {
    check_shape(volume, mask)?;
    let mut values: Vec<OrderedFloat<f64>> = volume
        .data()
        .iter()
        .zip(mask.data().iter())
        .filter(|(_, &m)| is_foreground(m))
        .map(|(&v, _)| OrderedFloat(v as f64))
        .collect();
    if values.is_empty() {
        return Ok(None);
    }
    values.sort_unstable();

    let count = values.len();
    let n = count as f64;
    let mean = values.iter().map(|v| v.0).sum::<f64>() / n;
    let var = values.iter().map(|v| (v.0 - mean).powi(2)).sum::<f64>() / n;
    let median = if count % 2 == 1 {
        values[count / 2].0
    } else {
        (values[count / 2 - 1].0 + values[count / 2].0) / 2.0
    };
    Ok(Some(IntensityStats {
        count,
        mean,
        std: var.sqrt(),
        median,
        min: values[0].0,
        max: values[count - 1].0,
    }))
}

/// 两个时间点的变化量化报告.
#[derive(Clone, Debug, PartialEq)]
pub struct Report {
    /// 固定图像肿瘤体积 (立方毫米).
    pub fixed_volume: f64,
    /// 配准后图像肿瘤体积 (立方毫米).
    pub registered_volume: f64,
    /// 体积差 `registered - fixed`.
    pub volume_difference: f64,
    /// 两个肿瘤掩膜的 Dice 系数.
    pub dice: f64,
    /// 固定图像肿瘤内强度统计.
    pub fixed_stats: Option<IntensityStats>,
    /// 配准后图像肿瘤内强度统计.
    pub registered_stats: Option<IntensityStats>,
}

impl Report {
    /// 由两幅强度体数据与各自的肿瘤掩膜计算报告.
    pub fn compute(
        fixed: &MriScan,
        registered: &MriScan,
        fixed_tumor: &Mask,
        registered_tumor: &Mask,
    ) -> Result<Self> {
        let (volume_difference, fixed_volume, registered_volume) = volume_difference(fixed_tumor, registered_tumor);
        Ok(Self {
            fixed_volume,
            registered_volume,
            volume_difference,
            dice: dice(fixed_tumor, registered_tumor)?,
            fixed_stats: intensity_statistics(fixed, fixed_tumor)?,
            registered_stats: intensity_statistics(registered, registered_tumor)?,
        })
    }

    /// 平均强度差 `registered - fixed`. 任一掩膜为空时为 `None`.
    pub fn mean_intensity_difference(&self) -> Option<f64> {
        Some(self.registered_stats?.mean - self.fixed_stats?.mean)
    }
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "tumor volume #1: {:.2} mm³", self.fixed_volume)?;
        writeln!(f, "tumor volume #2: {:.2} mm³", self.registered_volume)?;
        writeln!(f, "difference: {:.2} mm³", self.volume_difference)?;
        writeln!(f, "dice: {:.3}", self.dice)?;
        match (&self.fixed_stats, &self.registered_stats) {
            (Some(s1), Some(s2)) => {
                writeln!(
                    f,
                    "mean intensity: T1={:.2} ± {:.2}, T2={:.2} ± {:.2}",
                    s1.mean, s1.std, s2.mean, s2.std
                )?;
                write!(f, "mean intensity difference: {:.2}", s2.mean - s1.mean)
            }
            _ => write!(f, "mean intensity: n/a (empty tumor mask)"),
        }
    }
}
