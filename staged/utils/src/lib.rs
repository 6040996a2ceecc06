//! 流水线可执行程序依赖的通用组件.

use std::env;
use std::path::PathBuf;

const SEP: &str = "--------------------------------------------------------";

/// 保存数据目录的环境变量.
pub const DATA_DIR_ENV: &str = "MRI_BERRY_DATA_DIR";

/// 简单分隔线.
#[inline]
pub fn sep() {
    println!("{SEP}");
}

/// 获得可并行核心数.
pub fn cpus() -> usize {
    std::thread::available_parallelism().map_or_else(|_| num_cpus::get(), usize::from)
}

/// 获取 MRI 数据目录.
///
/// 1. 若环境变量 `$MRI_BERRY_DATA_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/mri`. 无法确定用户主目录时返回 `None`.
pub fn data_dir_from_env_or_home() -> Option<PathBuf> {
    match env::var(DATA_DIR_ENV) {
        Ok(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => mri_berry::dataset::home_dataset_dir_with(["mri"]),
    }
}
