//! 规则步长梯度下降.

use std::fmt;

use log::{debug, warn};

use super::transform::RigidTransform;

/// 优化停止原因.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum StopReason {
    /// 步长缩小到最小步长以下.
    StepTooSmall,

    /// 缩放后的梯度模长小于容差.
    GradientTooSmall,

    /// 达到最大迭代次数.
    MaxIterations,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StopReason::StepTooSmall => "step length below minimum",
            StopReason::GradientTooSmall => "gradient magnitude below tolerance",
            StopReason::MaxIterations => "maximum number of iterations reached",
        };
        f.write_str(s)
    }
}

/// 优化结果. 总是给出迭代过程中代价最小的变换.
#[derive(Copy, Clone, Debug)]
pub struct OptimizerReport {
    /// 代价最小的变换.
    pub best: RigidTransform,

    /// 最小代价.
    pub best_value: f64,

    /// 实际迭代次数.
    pub iterations: usize,

    /// 停止原因.
    pub stop_reason: StopReason,
}

/// 作用于 6 参数刚性变换的规则步长梯度下降.
///
/// 每次迭代:
///
/// 1. 用中心差分估计梯度 `g`, 第 `i` 个参数的差分步长为 `fd_step / scales[i]`;
/// 2. 缩放梯度 `g'ᵢ = gᵢ / scales[i]`, 模长小于 `gradient_tolerance` 时停止;
/// 3. 若 `g'` 与上一次的缩放梯度方向相反 (内积为负), 步长乘以 `relaxation`;
/// 4. 步长小于 `min_step` 时停止, 否则沿 `-g'` 方向前进一个步长.
///
/// 旋转参数的增量被解释为旋转向量, 与当前旋转复合.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RegularStepGradientDescent {
    /// 初始步长.
    pub learning_rate: f64,
    /// 方向反转时步长的缩小比例.
    pub relaxation: f64,
    /// 最小步长.
    pub min_step: f64,
    /// 最大迭代次数.
    pub max_iterations: usize,
    /// 梯度模长容差.
    pub gradient_tolerance: f64,
    /// 参数缩放因子, 前 3 个对应旋转, 后 3 个对应平移.
    pub scales: [f64; 6],
    /// 差分步长 (缩放后的参数空间).
    pub fd_step: f64,
}

impl Default for RegularStepGradientDescent {
    fn default() -> Self {
        Self {
            learning_rate: 0.2,
            relaxation: 0.5,
            min_step: 0.001,
            max_iterations: 300,
            gradient_tolerance: 1e-4,
            scales: [1000.0, 1000.0, 1000.0, 1.0, 1.0, 1.0],
            fd_step: 1.0,
        }
    }
}

/// 第 `i` 个分量为 `v`, 其余为 0.
#[inline]
fn unit(i: usize, v: f64) -> [f64; 6] {
    let mut d = [0.0; 6];
    d[i] = v;
    d
}

impl RegularStepGradientDescent {
    /// 中心差分梯度.
    fn gradient<F: FnMut(&RigidTransform) -> f64>(&self, x: &RigidTransform, cost: &mut F) -> [f64; 6] {
        std::array::from_fn(|i| {
            let h = self.fd_step / self.scales[i];
            let plus = cost(&x.step(&unit(i, h)));
            let minus = cost(&x.step(&unit(i, -h)));
            (plus - minus) / (2.0 * h)
        })
    }

    /// 从 `initial` 出发最小化 `cost`.
    ///
    /// 未收敛 (达到最大迭代次数) 不视为错误, 仍返回迄今为止代价最小的变换.
    pub fn optimize<F: FnMut(&RigidTransform) -> f64>(&self, initial: RigidTransform, mut cost: F) -> OptimizerReport {
        let mut current = initial;
        let mut best = initial;
        let mut best_value = cost(&initial);
        let mut step = self.learning_rate;
        let mut previous: Option<[f64; 6]> = None;
        let mut stop_reason = StopReason::MaxIterations;
        let mut iterations = 0usize;

        while iterations < self.max_iterations {
            iterations += 1;
            let g = self.gradient(&current, &mut cost);
            let scaled: [f64; 6] = std::array::from_fn(|i| g[i] / self.scales[i]);
            let magnitude = scaled.iter().map(|v| v * v).sum::<f64>().sqrt();
            if !magnitude.is_finite() || magnitude < self.gradient_tolerance {
                stop_reason = StopReason::GradientTooSmall;
                break;
            }
            if let Some(prev) = previous {
                let dot: f64 = prev.iter().zip(&scaled).map(|(a, b)| a * b).sum();
                if dot < 0.0 {
                    step *= self.relaxation;
                }
            }
            if step < self.min_step {
                stop_reason = StopReason::StepTooSmall;
                break;
            }

            let factor = step / magnitude;
            current = current.step(&scaled.map(|v| -v * factor));
            previous = Some(scaled);

            let value = cost(&current);
            debug!(
                "iter {iterations:>3}: cost = {value:.6}, step = {step:.5}, params = {:?}",
                current.parameters()
            );
            if value < best_value {
                best_value = value;
                best = current;
            }
        }

        if stop_reason == StopReason::MaxIterations {
            warn!(
                "optimizer stopped after {} iterations without converging, accepting best cost {best_value:.6}",
                self.max_iterations
            );
        }

        OptimizerReport {
            best,
            best_value,
            iterations,
            stop_reason,
        }
    }
}
