//! 基于互信息的三维刚性配准.
//!
//! 流程: 几何中心初始化 -> 单分辨率规则步长梯度下降 (代价为 Mattes 互信息的相反数)
//! -> 以收敛变换将浮动图像三线性插值重采样到固定图像网格.

use log::info;

use crate::consts::MI_BINS;
use crate::error::{PipelineError, Result, Stage, VolumeTag};
use crate::{GeometryAttr, MriScan};

mod initializer;

mod interpolate;

mod metric;

mod optimizer;

mod resample;

mod transform;

pub use initializer::centered_initial_transform;
pub use interpolate::LinearInterpolator;
pub use metric::MattesMutualInformation;
pub use optimizer::{OptimizerReport, RegularStepGradientDescent, StopReason};
pub use resample::resample;
pub use transform::{AffineMap, Matrix3, RigidTransform};

/// 配准参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegistrationConfig {
    /// 互信息直方图 bin 数.
    pub bins: usize,
    /// 初始步长.
    pub learning_rate: f64,
    /// 方向反转时步长的缩小比例.
    pub relaxation: f64,
    /// 最小步长.
    pub min_step: f64,
    /// 最大迭代次数.
    pub max_iterations: usize,
    /// 缩放梯度模长容差.
    pub gradient_tolerance: f64,
    /// 参数缩放, 依次为 3 个旋转参数与 3 个平移参数.
    pub scales: [f64; 6],
    /// 梯度差分步长 (缩放后的参数空间).
    pub fd_step: f64,
    /// 固定图像最大采样点数.
    pub max_samples: usize,
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        let opt = RegularStepGradientDescent::default();
        Self {
            bins: MI_BINS,
            learning_rate: opt.learning_rate,
            relaxation: opt.relaxation,
            min_step: opt.min_step,
            max_iterations: opt.max_iterations,
            gradient_tolerance: opt.gradient_tolerance,
            scales: opt.scales,
            fd_step: opt.fd_step,
            max_samples: 100_000,
        }
    }
}

impl RegistrationConfig {
    /// 对应的优化器.
    pub fn optimizer(&self) -> RegularStepGradientDescent {
        RegularStepGradientDescent {
            learning_rate: self.learning_rate,
            relaxation: self.relaxation,
            min_step: self.min_step,
            max_iterations: self.max_iterations,
            gradient_tolerance: self.gradient_tolerance,
            scales: self.scales,
            fd_step: self.fd_step,
        }
    }
}

/// 配准结果.
#[derive(Clone, Debug)]
pub struct RegistrationOutcome {
    /// 重采样到固定图像网格上的浮动图像.
    pub registered: MriScan,

    /// 收敛 (或迭代上限处最优) 的变换.
    pub transform: RigidTransform,

    /// 优化迭代次数.
    pub iterations: usize,

    /// 最终互信息 (nats).
    pub final_metric: f64,

    /// 优化停止原因.
    pub stop_reason: StopReason,
}

/// 将 `moving` 刚性配准到 `fixed`.
///
/// 两幅图像不需要有相同的形状或间距. 输出的 `registered` 与 `fixed` 的网格完全一致,
/// 映射到 `moving` 外部的体素填 0.
///
/// # 注意
///
/// 1. 任一图像为空, 或初始变换下两幅图像没有任何重叠时, 返回 `Geometry` 错误.
/// 2. 优化器未收敛不是错误: 总是接受迭代过程中代价最小的变换.
pub fn register(fixed: &MriScan, moving: &MriScan, config: &RegistrationConfig) -> Result<RegistrationOutcome> {
    let initial = centered_initial_transform(fixed.geometry(), moving.geometry())?;
    let metric = MattesMutualInformation::new(fixed, moving, config.bins, config.max_samples)?;
    if metric.value(&initial).is_none() {
        return Err(PipelineError::geometry(
            Stage::Register,
            VolumeTag::moving(),
            "no overlap with the fixed volume at the initial transform",
        ));
    }
    info!(
        "registering {:?} onto {:?} with {} samples, {} bins",
        moving.shape(),
        fixed.shape(),
        metric.sample_count(),
        metric.bins()
    );

    // 没有样本落入浮动图像时, 互信息视为 0.
    let report = config
        .optimizer()
        .optimize(initial, |t| metric.value(t).unwrap_or(0.0));
    info!(
        "optimizer finished after {} iterations ({}): MI = {:.6}, angle = {:.5} rad, translation = {:?}",
        report.iterations,
        report.stop_reason,
        -report.best_value,
        report.best.angle(),
        report.best.translation()
    );

    let registered = resample(moving, fixed.geometry(), &report.best, 0.0);
    Ok(RegistrationOutcome {
        registered,
        transform: report.best,
        iterations: report.iterations,
        final_metric: -report.best_value,
        stop_reason: report.stop_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn two_blobs(shift_w: f64) -> MriScan {
        let data = Array3::from_shape_fn((16, 16, 16), |(z, h, w)| {
            let (z, h, w) = (z as f64, h as f64, w as f64 - shift_w);
            let a = ((z - 7.0).powi(2) + (h - 8.0).powi(2) + (w - 6.0).powi(2)) / 10.0;
            let b = ((z - 9.0).powi(2) + (h - 5.0).powi(2) + (w - 10.0).powi(2)) / 4.0;
            (100.0 * (-a).exp() + 60.0 * (-b).exp()) as f32
        });
        MriScan::new(data, [1.0; 3], [0.0; 3]).unwrap()
    }

    #[test]
    fn test_identical_volumes_converge_to_identity() {
        let fixed = two_blobs(0.0);
        let out = register(&fixed, &fixed, &RegistrationConfig::default()).unwrap();
        assert!(out.transform.angle() < 0.01);
        assert!(out.transform.translation().iter().all(|t| t.abs() < 0.1));
        assert!(out.registered.same_grid(&fixed));
        let max_err = out
            .registered
            .data()
            .iter()
            .zip(fixed.data().iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 5.0);
    }

    #[test]
    fn test_recovers_translation() {
        let fixed = two_blobs(0.0);
        let moving = two_blobs(2.0);
        let out = register(&fixed, &moving, &RegistrationConfig::default()).unwrap();
        let t = out.transform.translation();
        assert!((t[2] - 2.0).abs() < 0.5, "translation = {t:?}");
        assert!(t[0].abs() < 0.5 && t[1].abs() < 0.5, "translation = {t:?}");
    }

    #[test]
    fn test_registered_has_fixed_geometry() {
        let fixed = two_blobs(0.0);
        let data = Array3::from_shape_fn((8, 12, 10), |(z, h, w)| (z + h + w) as f32);
        let moving = MriScan::new(data, [2.0, 1.5, 1.0], [3.0, -2.0, 1.0]).unwrap();
        let config = RegistrationConfig {
            max_iterations: 5,
            ..Default::default()
        };
        let out = register(&fixed, &moving, &config).unwrap();
        assert_eq!(out.registered.geometry(), fixed.geometry());
        assert!(out.iterations <= 5);
    }

    #[test]
    fn test_empty_moving_is_geometry_error() {
        let fixed = two_blobs(0.0);
        let moving = MriScan::new(Array3::zeros((0, 3, 3)), [1.0; 3], [0.0; 3]).unwrap();
        let err = register(&fixed, &moving, &RegistrationConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Geometry { stage: Stage::Register, .. }));
    }
}
