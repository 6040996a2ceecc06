//! 数据目录与流水线各阶段的文件布局.

use std::path::{Path, PathBuf};

/// 获取 `{用户主目录}/dataset` 目录.
pub fn home_dataset_dir() -> Option<PathBuf> {
    let mut ans = dirs::home_dir()?;
    ans.push("dataset");
    Some(ans)
}

/// 获取 `{用户主目录}/dataset` 目录下给定继续项组成的全路径.
pub fn home_dataset_dir_with<P: AsRef<Path>, I: IntoIterator<Item = P>>(it: I) -> Option<PathBuf> {
    let mut ans = home_dataset_dir()?;
    ans.extend(it);
    Some(ans)
}

/// 流水线在数据目录下读写的文件.
///
/// 阶段之间只通过这些文件交接, 因此任一阶段都可以单独重跑.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct StagePaths {
    root: PathBuf,
    fixed: String,
    moving: String,
}

impl StagePaths {
    /// 配准结果.
    pub const REGISTERED: &'static str = "registered.nii.gz";
    /// 配准变换检查点.
    pub const TRANSFORM: &'static str = "transform.bin";
    /// 固定图像全脑掩膜.
    pub const FIXED_BRAIN_MASK: &'static str = "fixed_brain_mask.nii.gz";
    /// 固定图像肿瘤掩膜.
    pub const FIXED_TUMOR_MASK: &'static str = "fixed_tumor_mask.nii.gz";
    /// 配准后图像全脑掩膜.
    pub const REGISTERED_BRAIN_MASK: &'static str = "registered_brain_mask.nii.gz";
    /// 配准后图像肿瘤掩膜.
    pub const REGISTERED_TUMOR_MASK: &'static str = "registered_tumor_mask.nii.gz";

    /// 以 `root` 为数据目录, 固定/浮动图像文件名分别为 `fixed`/`moving`.
    pub fn new<P: AsRef<Path>>(root: P, fixed: &str, moving: &str) -> Self {
        Self {
            root: root.as_ref().to_owned(),
            fixed: fixed.to_owned(),
            moving: moving.to_owned(),
        }
    }

    /// 数据目录.
    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn join(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// 固定图像 (第一个时间点).
    pub fn fixed(&self) -> PathBuf {
        self.join(&self.fixed)
    }

    /// 浮动图像 (第二个时间点).
    pub fn moving(&self) -> PathBuf {
        self.join(&self.moving)
    }

    /// 配准后的图像.
    pub fn registered(&self) -> PathBuf {
        self.join(Self::REGISTERED)
    }

    /// 配准变换检查点.
    pub fn transform(&self) -> PathBuf {
        self.join(Self::TRANSFORM)
    }

    /// 固定图像全脑掩膜.
    pub fn fixed_brain_mask(&self) -> PathBuf {
        self.join(Self::FIXED_BRAIN_MASK)
    }

    /// 固定图像肿瘤掩膜.
    pub fn fixed_tumor_mask(&self) -> PathBuf {
        self.join(Self::FIXED_TUMOR_MASK)
    }

    /// 配准后图像全脑掩膜.
    pub fn registered_brain_mask(&self) -> PathBuf {
        self.join(Self::REGISTERED_BRAIN_MASK)
    }

    /// 配准后图像肿瘤掩膜.
    pub fn registered_tumor_mask(&self) -> PathBuf {
        self.join(Self::REGISTERED_TUMOR_MASK)
    }

    /// 第 `z` 张切片快照的保存路径, `name` 区分不同体数据.
    pub fn snapshot(&self, name: &str, z: usize) -> PathBuf {
        self.join(&format!("{name}_slice_{z:03}.png"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_paths() {
        let p = StagePaths::new("/data/mri", "gre1.nii.gz", "gre2.nii.gz");
        assert_eq!(p.fixed(), PathBuf::from("/data/mri/gre1.nii.gz"));
        assert_eq!(p.moving(), PathBuf::from("/data/mri/gre2.nii.gz"));
        assert_eq!(p.registered(), PathBuf::from("/data/mri/registered.nii.gz"));
        assert_eq!(p.transform(), PathBuf::from("/data/mri/transform.bin"));
        assert_eq!(p.registered_tumor_mask(), PathBuf::from("/data/mri/registered_tumor_mask.nii.gz"));
        assert_eq!(p.snapshot("fixed", 7), PathBuf::from("/data/mri/fixed_slice_007.png"));
    }

    #[test]
    fn test_home_dataset_dir_with() {
        if let Some(base) = home_dataset_dir() {
            assert_eq!(home_dataset_dir_with(["mri", "a.nii"]), Some(base.join("mri").join("a.nii")));
        }
    }
}
