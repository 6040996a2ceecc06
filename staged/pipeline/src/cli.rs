//! 命令行参数.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;
use mri_berry::segment::SeedPoint;

/// 脑肿瘤纵向分析流水线: 配准, 分割, 量化.
#[derive(Parser, Debug)]
#[command(name = "pipeline", version)]
pub struct Cli {
    /// 要执行的阶段. 缺省时以硬编码种子点执行全部阶段.
    #[command(subcommand)]
    pub command: Option<Command>,

    /// 数据目录. 缺省时依次尝试 `$MRI_BERRY_DATA_DIR` 与 `$HOME/dataset/mri`.
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// 固定图像 (第一个时间点) 文件名.
    #[arg(long, global = true, default_value = "case6_gre1.nii.gz")]
    pub fixed: String,

    /// 浮动图像 (第二个时间点) 文件名.
    #[arg(long, global = true, default_value = "case6_gre2.nii.gz")]
    pub moving: String,

    /// 肿瘤种子点, 形如 `z,h,w`.
    #[arg(long, global = true)]
    pub seed: Option<SeedPoint>,

    /// 使用演示数据上的固定种子点.
    #[arg(long, global = true, conflicts_with = "seed")]
    pub hardcode_seed: bool,

    /// 配准的最大迭代次数.
    #[arg(long, global = true)]
    pub max_iterations: Option<usize>,

    /// rayon 线程数. 缺省为可用核心数.
    #[arg(long, global = true)]
    pub threads: Option<usize>,

    /// 日志详细程度, 可重复.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,
}

/// 流水线阶段.
#[derive(Subcommand, Copy, Clone, Debug, Eq, PartialEq)]
pub enum Command {
    /// 将浮动图像刚性配准到固定图像.
    Register,
    /// 分割两个时间点的全脑与肿瘤.
    Segment,
    /// 量化肿瘤的变化.
    Analyze,
    /// 保存种子点所在切片的 PNG 快照.
    Snapshot,
    /// 依次执行全部阶段.
    All,
}

impl Cli {
    /// 日志级别.
    pub fn log_level(&self) -> LevelFilter {
        match self.verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    }
}
