//! 流水线各阶段. 阶段之间只通过数据目录下的文件交接.

use anyhow::{bail, Context, Result};
use log::info;
use mri_berry::analysis::Report;
use mri_berry::dataset::StagePaths;
use mri_berry::registration::{register, RegistrationConfig};
use mri_berry::segment::{segment_foreground, ForegroundParams, SeedPoint, TumorParams, TumorSegmenter};
use mri_berry::{GeometryAttr, Mask, MriScan, SliceSnapshot, VolumeTag};

use crate::picker::StdinSeedPicker;

/// 流水线运行状态.
#[derive(Debug)]
pub struct Pipeline {
    paths: StagePaths,
    seed: Option<SeedPoint>,
    registration: RegistrationConfig,
    foreground: ForegroundParams,
    tumor: TumorParams,
}

fn open_scan(path: &std::path::Path) -> Result<MriScan> {
    MriScan::open(path).with_context(|| format!("failed to load {}", path.display()))
}

fn open_mask(path: &std::path::Path) -> Result<Mask> {
    Mask::open(path).with_context(|| format!("failed to load {}", path.display()))
}

fn save_mask(mask: &Mask, path: &std::path::Path) -> Result<()> {
    mask.save(path).with_context(|| format!("failed to write {}", path.display()))?;
    info!("wrote {}", path.display());
    Ok(())
}

impl Pipeline {
    pub fn new(paths: StagePaths, seed: Option<SeedPoint>, registration: RegistrationConfig) -> Self {
        Self {
            paths,
            seed,
            registration,
            foreground: ForegroundParams::default(),
            tumor: TumorParams::default(),
        }
    }

    /// 配准, 写出 `registered.nii.gz` 与 `transform.bin`.
    pub fn register(&self) -> Result<()> {
        let (fixed_path, moving_path) = (self.paths.fixed(), self.paths.moving());
        if !fixed_path.is_file() || !moving_path.is_file() {
            bail!(
                "source volumes missing: {} / {}",
                fixed_path.display(),
                moving_path.display()
            );
        }
        let fixed = open_scan(&fixed_path)?;
        let moving = open_scan(&moving_path)?;

        let out = register(&fixed, &moving, &self.registration)?;
        info!(
            "registration stopped after {} iterations ({}), MI = {:.5}",
            out.iterations, out.stop_reason, out.final_metric
        );
        out.registered.save(self.paths.registered())?;
        out.transform.save(self.paths.transform())?;
        info!("wrote {} and {}", self.paths.registered().display(), self.paths.transform().display());
        Ok(())
    }

    /// 分割两个时间点的全脑与肿瘤. 固定图像上确定的种子点原样用于配准后的图像.
    ///
    /// 返回实际使用的种子点, 后续阶段会复用它.
    pub fn segment(&mut self) -> Result<SeedPoint> {
        let fixed = open_scan(&self.paths.fixed())?;
        let registered = open_scan(&self.paths.registered())?;

        save_mask(&segment_foreground(&fixed, &self.foreground), &self.paths.fixed_brain_mask())?;
        if self.seed.is_none() {
            println!("tumor segmentation is semi-automatic: enter a seed inside the tumor");
        }
        let mut picker = StdinSeedPicker::new();
        let (fixed_tumor, seed) = TumorSegmenter::new(self.tumor)
            .volume_tag(VolumeTag::fixed())
            .run(&fixed, self.seed, Some(&mut picker))?;
        save_mask(&fixed_tumor, &self.paths.fixed_tumor_mask())?;

        save_mask(
            &segment_foreground(&registered, &self.foreground),
            &self.paths.registered_brain_mask(),
        )?;
        let (registered_tumor, _) = TumorSegmenter::new(self.tumor)
            .volume_tag(VolumeTag::registered())
            .run(&registered, Some(seed), None)?;
        save_mask(&registered_tumor, &self.paths.registered_tumor_mask())?;

        self.seed = Some(seed);
        Ok(seed)
    }

    /// 重新读取两个肿瘤掩膜与两幅强度图像, 计算变化报告.
    pub fn analyze(&self) -> Result<Report> {
        let fixed = open_scan(&self.paths.fixed())?;
        let registered = open_scan(&self.paths.registered())?;
        let fixed_tumor = open_mask(&self.paths.fixed_tumor_mask())?;
        let registered_tumor = open_mask(&self.paths.registered_tumor_mask())?;
        Ok(Report::compute(&fixed, &registered, &fixed_tumor, &registered_tumor)?)
    }

    /// 保存两个时间点在种子点所在切片上的快照, 肿瘤以红色叠加.
    ///
    /// 没有种子点时取固定图像肿瘤掩膜的中间切片.
    pub fn snapshot(&self) -> Result<()> {
        let fixed = open_scan(&self.paths.fixed())?;
        let registered = open_scan(&self.paths.registered())?;
        let fixed_tumor = open_mask(&self.paths.fixed_tumor_mask())?;
        let registered_tumor = open_mask(&self.paths.registered_tumor_mask())?;

        let z = match self.seed {
            Some(s) => s.z,
            None => middle_slice(&fixed_tumor),
        };
        if z >= fixed.len_z() || z >= registered.len_z() {
            bail!("slice {z} lies outside the volumes");
        }
        for (name, scan, mask) in [("fixed", &fixed, &fixed_tumor), ("registered", &registered, &registered_tumor)] {
            let path = self.paths.snapshot(name, z);
            scan.save_slice(z, Some(mask), &path)
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!("wrote {}", path.display());
        }
        Ok(())
    }
}

/// 掩膜前景所覆盖切片范围的中间切片. 掩膜为空时取整个体数据的中间切片.
fn middle_slice(mask: &Mask) -> usize {
    let zs = mask.foreground_pos().into_iter().map(|(z, _, _)| z);
    let (lo, hi) = zs.fold((usize::MAX, 0), |(lo, hi), z| (lo.min(z), hi.max(z)));
    if lo > hi {
        mask.len_z() / 2
    } else {
        (lo + hi) / 2
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_berry::consts::gray::MASK_FOREGROUND;
    use mri_berry::Geometry;

    /// 背景为 10, 立方块 `[5, end)³` 内为 `value`.
    fn block(end: usize, value: f32) -> MriScan {
        let mut v = MriScan::from_elem(Geometry::unit((24, 24, 24)), 10.0);
        for z in 5..end {
            for h in 5..end {
                for w in 5..end {
                    v[(z, h, w)] = value;
                }
            }
        }
        v
    }

    #[test]
    fn test_middle_slice() {
        let mut m = Mask::background(Geometry::unit((10, 4, 4)));
        assert_eq!(middle_slice(&m), 5);
        m[(2, 1, 1)] = MASK_FOREGROUND;
        m[(6, 2, 2)] = MASK_FOREGROUND;
        assert_eq!(middle_slice(&m), 4);
    }

    #[test]
    fn test_register_requires_sources() {
        let dir = std::env::temp_dir().join("mri-berry-pipeline-missing");
        let p = Pipeline::new(
            StagePaths::new(&dir, "nope1.nii.gz", "nope2.nii.gz"),
            None,
            RegistrationConfig::default(),
        );
        assert!(p.register().is_err());
    }

    #[test]
    fn test_segment_hands_fixed_seed_to_registered() {
        let dir = tempfile::tempdir().unwrap();
        let paths = StagePaths::new(dir.path(), "fixed.nii.gz", "moving.nii.gz");
        block(15, 100.0).save(paths.fixed()).unwrap();
        block(15, 100.0).save(paths.moving()).unwrap();
        // 配准后的肿瘤更大, 更亮.
        block(16, 200.0).save(paths.registered()).unwrap();

        let seed = SeedPoint::new(9, 9, 9);
        let mut p = Pipeline::new(paths.clone(), Some(seed), RegistrationConfig::default());
        assert_eq!(p.segment().unwrap(), seed);
        assert_eq!(p.seed, Some(seed));

        for path in [paths.fixed_brain_mask(), paths.registered_brain_mask()] {
            assert!(path.is_file(), "{} missing", path.display());
        }
        // 立方块开运算后去掉 8 个角.
        assert_eq!(Mask::open(paths.fixed_tumor_mask()).unwrap().count_foreground(), 1000 - 8);
        assert_eq!(Mask::open(paths.registered_tumor_mask()).unwrap().count_foreground(), 1331 - 8);

        let report = p.analyze().unwrap();
        assert_eq!(report.fixed_volume, 992.0);
        assert_eq!(report.registered_volume, 1323.0);
    }
}
