//! 流水线运行时错误.
//!
//! 每个错误都会指明出错的阶段 ([`Stage`]) 以及相关的体数据 ([`VolumeTag`]),
//! 以便只需用修正后的输入重跑该阶段, 而不是重跑整条流水线.

use std::fmt;

use thiserror::Error;

use crate::Idx3d;

/// 流水线阶段.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Stage {
    /// 读写体数据.
    Io,

    /// 刚性配准.
    Register,

    /// 全脑 (前景) 分割.
    SegmentBrain,

    /// 种子点肿瘤分割.
    SegmentTumor,

    /// 变化量化.
    Analyze,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Io => "io",
            Stage::Register => "register",
            Stage::SegmentBrain => "segment-brain",
            Stage::SegmentTumor => "segment-tumor",
            Stage::Analyze => "analyze",
        };
        f.write_str(s)
    }
}

/// 体数据在错误信息中的简短名称, 如 `fixed`, `moving`, `registered`.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
pub struct VolumeTag(pub String);

impl VolumeTag {
    /// 固定图像.
    pub fn fixed() -> Self {
        Self("fixed".into())
    }

    /// 浮动图像.
    pub fn moving() -> Self {
        Self("moving".into())
    }

    /// 配准后的图像.
    pub fn registered() -> Self {
        Self("registered".into())
    }
}

impl From<&str> for VolumeTag {
    #[inline]
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl Default for VolumeTag {
    #[inline]
    fn default() -> Self {
        Self("volume".into())
    }
}

impl fmt::Display for VolumeTag {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 肿瘤分割中可能得到空区域的步骤.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EmptyPhase {
    /// 区域生长后为空: 种子自身不在强度窗口内.
    Grown,

    /// 开运算后为空: 生长区域不是实心块.
    Opened,
}

impl fmt::Display for EmptyPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EmptyPhase::Grown => f.write_str("region growing"),
            EmptyPhase::Opened => f.write_str("morphological opening"),
        }
    }
}

/// 流水线错误. 均不可在本地恢复, 需要调用方换用不同的输入.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// 体数据几何退化或不兼容.
    #[error("[{stage}] degenerate geometry for `{volume}`: {reason}")]
    Geometry {
        /// 出错阶段.
        stage: Stage,
        /// 出错的体数据.
        volume: VolumeTag,
        /// 具体原因.
        reason: String,
    },

    /// 参数配置无效, 与输入体数据无关.
    #[error("[{stage}] invalid configuration: {reason}")]
    Config {
        /// 出错阶段.
        stage: Stage,
        /// 具体原因.
        reason: String,
    },

    /// 没有可用的种子点.
    #[error("[{stage}] no seed point available for `{volume}`")]
    MissingSeed {
        /// 出错阶段.
        stage: Stage,
        /// 出错的体数据.
        volume: VolumeTag,
    },

    /// 种子点越界.
    #[error("[segment-tumor] seed {seed:?} lies outside `{volume}` of shape {shape:?}")]
    SeedOutOfBounds {
        /// 出错的体数据.
        volume: VolumeTag,
        /// 种子点.
        seed: Idx3d,
        /// 体数据形状.
        shape: Idx3d,
    },

    /// 区域生长或开运算后没有任何前景体素.
    #[error("[{stage}] {phase} left no foreground voxel in `{volume}` (seed {seed:?})")]
    EmptyRegion {
        /// 出错阶段.
        stage: Stage,
        /// 出错的体数据.
        volume: VolumeTag,
        /// 种子点.
        seed: Idx3d,
        /// 在哪一步变为空.
        phase: EmptyPhase,
    },

    /// 两个体数据形状不一致.
    #[error("[{stage}] shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// 出错阶段.
        stage: Stage,
        /// 期望形状.
        expected: Idx3d,
        /// 实际形状.
        actual: Idx3d,
    },

    /// nifti 读写错误.
    #[error("[io] nifti error: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 其他底层 I/O 错误.
    #[error("[io] {0}")]
    Io(#[from] std::io::Error),

    /// 检查点 (变换参数) 序列化错误.
    #[cfg(feature = "serde")]
    #[error("[io] checkpoint error: {0}")]
    Checkpoint(#[from] bincode::Error),
}

/// 流水线运行结果.
pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    /// 创建几何错误.
    pub fn geometry(stage: Stage, volume: impl Into<VolumeTag>, reason: impl Into<String>) -> Self {
        Self::Geometry {
            stage,
            volume: volume.into(),
            reason: reason.into(),
        }
    }

    /// 错误所在阶段.
    pub fn stage(&self) -> Stage {
        match self {
            Self::Geometry { stage, .. }
            | Self::Config { stage, .. }
            | Self::MissingSeed { stage, .. }
            | Self::EmptyRegion { stage, .. }
            | Self::ShapeMismatch { stage, .. } => *stage,
            Self::SeedOutOfBounds { .. } => Stage::SegmentTumor,
            Self::Nifti(_) | Self::Io(_) => Stage::Io,
            #[cfg(feature = "serde")]
            Self::Checkpoint(_) => Stage::Io,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_names_stage_and_volume() {
        let err = PipelineError::geometry(Stage::Register, VolumeTag::moving(), "zero extent");
        let s = err.to_string();
        assert!(s.contains("register"));
        assert!(s.contains("moving"));
        assert!(s.contains("zero extent"));
        assert_eq!(err.stage(), Stage::Register);
    }

    #[test]
    fn test_config_error_names_no_volume() {
        let err = PipelineError::Config {
            stage: Stage::Register,
            reason: "1 bins".into(),
        };
        let s = err.to_string();
        assert!(s.contains("invalid configuration"));
        assert!(!s.contains("fixed"));
        assert_eq!(err.stage(), Stage::Register);
    }

    #[test]
    fn test_empty_region_display() {
        let err = PipelineError::EmptyRegion {
            stage: Stage::SegmentTumor,
            volume: VolumeTag::registered(),
            seed: (1, 2, 3),
            phase: EmptyPhase::Opened,
        };
        let s = err.to_string();
        assert!(s.contains("segment-tumor"));
        assert!(s.contains("registered"));
        assert!(s.contains("(1, 2, 3)"));
        assert!(s.contains("opening"));
    }

    #[test]
    fn test_seed_out_of_bounds_stage() {
        let err = PipelineError::SeedOutOfBounds {
            volume: VolumeTag::fixed(),
            seed: (9, 9, 9),
            shape: (4, 4, 4),
        };
        assert_eq!(err.stage(), Stage::SegmentTumor);
    }
}
