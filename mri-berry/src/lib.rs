#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 对同一患者不同时间点采集的两个 3D MRI 体数据进行刚性配准,
//! 分别提取全脑掩膜与肿瘤区域, 并量化两个时间点之间的变化.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 注意
//!
//! 1. 所有体数据按照 `(z, h, w)` 顺序访问, 即 (切片, 行, 列).
//!   物理坐标 (毫米) 也按照同样的轴顺序表示. 读写 nifti 文件时会自动转换.
//! 2. 体数据的方向余弦矩阵被视为单位阵, 只保留间距 (spacing) 和原点 (origin).
//! 3. 每个阶段都只读输入, 并返回新分配的输出. 阶段间通过返回值或磁盘文件交接.
//!
//! # 开发计划
//!
//! ### 体数据结构与 nifti 读写 ✅
//!
//! 实现位于 `mri-berry/src/data`.
//!
//! ### 刚性配准 ✅
//!
//! 1. 几何中心初始化; ✅
//! 2. Mattes 风格互信息 (联合直方图, 50 bins); ✅
//! 3. 带参数缩放的规则步长梯度下降 (6 参数, versor + 平移); ✅
//! 4. 三线性插值重采样到固定图像网格. ✅
//!
//! 实现位于 `mri-berry/src/registration`.
//!
//! ### 三维二值形态学 ✅
//!
//! 球形结构元, 腐蚀/膨胀/开/闭运算, 6-连通分量标记与按大小重标记.
//!
//! 实现位于 `mri-berry/src/morph`.
//!
//! ### 分割 ✅
//!
//! 1. 全脑: Otsu 阈值 + 闭运算 + 最大连通分量; ✅
//! 2. 肿瘤: 种子点区域生长 + 开运算 + 小分量过滤. ✅
//!
//! 实现位于 `mri-berry/src/segment`.
//!
//! ### 变化量化 ✅
//!
//! 体积差, Dice 系数, 掩膜内强度统计.
//!
//! 实现位于 `mri-berry/src/analysis.rs`.
//!
//! ### 多分辨率金字塔 ❌
//!
//! 目前只做单层配准. 初始错位较小时足够.

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 三维物理坐标 (毫米), 轴顺序与 [`Idx3d`] 一致.
pub type Point3d = [f64; 3];

/// 3D MRI 体数据基础数据结构.
mod data;

pub use data::{Geometry, GeometryAttr, IntensityWindow, Mask, MriScan, SliceSnapshot, Volume};

pub mod analysis;

pub mod consts;

pub mod dataset;

pub mod error;

pub mod morph;

pub mod prelude;

pub mod registration;

pub mod segment;

pub use error::{PipelineError, Result, Stage, VolumeTag};
