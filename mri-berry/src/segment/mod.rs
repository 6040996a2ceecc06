//! 分割: 全脑 (前景) 掩膜与种子点肿瘤掩膜.

mod brain;

mod seed;

mod threshold;

mod tumor;

pub use brain::{segment_foreground, ForegroundParams};
pub use seed::{ParseSeedError, SeedPicker, SeedPoint};
pub use threshold::{binarize_above, otsu_threshold};
pub use tumor::{grow_region, segment_tumor, segment_tumor_with, TumorParams, TumorSegmenter};
