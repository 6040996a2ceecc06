//! 🧠欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx3d, Point3d};

pub use crate::data::{Geometry, GeometryAttr, IntensityWindow, Mask, MriScan, Volume};

pub use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};

pub use crate::error::{PipelineError, Result, Stage, VolumeTag};

pub use crate::registration::{register, RegistrationConfig, RegistrationOutcome, RigidTransform};
pub use crate::segment::{
    segment_foreground, segment_tumor, segment_tumor_with, ForegroundParams, SeedPicker,
    SeedPoint, TumorParams,
};

pub use crate::analysis::{dice, intensity_statistics, volume_difference, volume_mm3, Report};

pub use crate::dataset::{home_dataset_dir_with, StagePaths};
