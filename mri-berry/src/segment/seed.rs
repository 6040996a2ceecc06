use std::fmt;
use std::str::FromStr;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Idx3d, MriScan};

/// 种子点: 某个强度体数据上的体素索引 `(z, h, w)`.
///
/// 种子点在固定图像上确定后, 原样用于配准后的图像, 由调用方显式传递.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SeedPoint {
    /// 切片索引.
    pub z: usize,
    /// 行索引.
    pub h: usize,
    /// 列索引.
    pub w: usize,
}

impl SeedPoint {
    /// 构建种子点.
    #[inline]
    pub const fn new(z: usize, h: usize, w: usize) -> Self {
        Self { z, h, w }
    }

    /// 对应的体素索引.
    #[inline]
    pub const fn index(&self) -> Idx3d {
        (self.z, self.h, self.w)
    }
}

impl From<Idx3d> for SeedPoint {
    #[inline]
    fn from((z, h, w): Idx3d) -> Self {
        Self { z, h, w }
    }
}

impl fmt::Display for SeedPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.z, self.h, self.w)
    }
}

/// 种子点解析错误.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("expected a seed of the form `z,h,w`, got `{0}`")]
pub struct ParseSeedError(String);

impl FromStr for SeedPoint {
    type Err = ParseSeedError;

    /// 解析形如 `53,63,83` 的字符串. 允许逗号两侧存在空白.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<usize> = s
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<Result<_, _>>()
            .map_err(|_| ParseSeedError(s.to_owned()))?;
        match parts[..] {
            [z, h, w] => Ok(Self { z, h, w }),
            _ => Err(ParseSeedError(s.to_owned())),
        }
    }
}

/// 交互式种子点获取能力. 核心库本身从不获取种子点, 只消费已确定的种子点.
///
/// 实现可以阻塞等待用户输入. 返回 `None` 代表用户没有给出种子点.
pub trait SeedPicker {
    /// 在 `volume` 上选取种子点.
    fn pick_seed(&mut self, volume: &MriScan) -> Option<SeedPoint>;
}

impl<F: FnMut(&MriScan) -> Option<SeedPoint>> SeedPicker for F {
    #[inline]
    fn pick_seed(&mut self, volume: &MriScan) -> Option<SeedPoint> {
        self(volume)
    }
}
