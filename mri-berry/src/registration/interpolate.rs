use num::ToPrimitive;

use crate::{GeometryAttr, Point3d, Volume};

/// 三线性插值器. 对任意可转换为 `f64` 的体素类型有效.
///
/// 连续索引 `c` 在某一轴上位于 `[-0.5, n - 0.5)` 内时被视为在体数据内部;
/// 越过首末体素中心的部分按边界体素取值.
#[derive(Copy, Clone, Debug)]
pub struct LinearInterpolator<'a, T> {
    volume: &'a Volume<T>,
}

impl<'a, T: ToPrimitive + Copy> LinearInterpolator<'a, T> {
    /// 在 `volume` 上构建插值器.
    #[inline]
    pub fn new(volume: &'a Volume<T>) -> Self {
        Self { volume }
    }

    /// 被插值的体数据.
    #[inline]
    pub fn volume(&self) -> &'a Volume<T> {
        self.volume
    }

    /// 连续索引是否落在体数据内部?
    #[inline]
    pub fn is_inside(&self, c: &[f64; 3]) -> bool {
        let dims = self.volume.geometry().dims();
        c.iter()
            .zip(dims)
            .all(|(&x, n)| x >= -0.5 && x < n as f64 - 0.5)
    }

    /// 在物理坐标 `p` 处插值. 若 `p` 在体数据外部, 返回 `None`.
    #[inline]
    pub fn evaluate(&self, p: &Point3d) -> Option<f64> {
        self.evaluate_at_index(&self.volume.geometry().physical_to_continuous_index(p))
    }

    /// 在连续索引 `c` 处插值. 若 `c` 在体数据外部, 返回 `None`.
    pub fn evaluate_at_index(&self, c: &[f64; 3]) -> Option<f64> {
        if !self.is_inside(c) {
            return None;
        }
        let dims = self.volume.geometry().dims();
        // 每个轴上的 (下标0, 下标1, 下标1 的权重).
        let axis: [(usize, usize, f64); 3] = std::array::from_fn(|a| {
            let last = dims[a] as isize - 1;
            let fl = c[a].floor();
            let i0 = fl as isize;
            (
                i0.clamp(0, last) as usize,
                (i0 + 1).clamp(0, last) as usize,
                c[a] - fl,
            )
        });

        let mut acc = 0.0;
        for (z, wz) in [(axis[0].0, 1.0 - axis[0].2), (axis[0].1, axis[0].2)] {
            if wz == 0.0 {
                continue;
            }
            for (h, wh) in [(axis[1].0, 1.0 - axis[1].2), (axis[1].1, axis[1].2)] {
                if wh == 0.0 {
                    continue;
                }
                for (w, ww) in [(axis[2].0, 1.0 - axis[2].2), (axis[2].1, axis[2].2)] {
                    if ww == 0.0 {
                        continue;
                    }
                    let v = self.volume[(z, h, w)].to_f64().unwrap_or(f64::NAN);
                    acc += wz * wh * ww * v;
                }
            }
        }
        Some(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn ramp() -> Volume<f32> {
        let data = Array3::from_shape_fn((4, 5, 6), |(z, h, w)| (100 * z + 10 * h + w) as f32);
        Volume::new(data, [2.0, 1.0, 0.5], [10.0, 0.0, -1.0]).unwrap()
    }

    #[test]
    fn test_exact_on_grid() {
        let v = ramp();
        let it = LinearInterpolator::new(&v);
        assert_eq!(it.evaluate_at_index(&[1.0, 2.0, 3.0]), Some(123.0));
        let p = v.geometry().index_to_physical((3, 4, 5));
        assert_eq!(it.evaluate(&p), Some(345.0));
    }

    #[test]
    fn test_linear_between_voxels() {
        let v = ramp();
        let it = LinearInterpolator::new(&v);
        let x = it.evaluate_at_index(&[1.5, 2.25, 3.5]).unwrap();
        assert!((x - 176.0).abs() < 1e-9);
    }

    #[test]
    fn test_outside_and_border() {
        let v = ramp();
        let it = LinearInterpolator::new(&v);
        assert_eq!(it.evaluate_at_index(&[-0.6, 0.0, 0.0]), None);
        assert_eq!(it.evaluate_at_index(&[0.0, 0.0, 5.5]), None);
        assert_eq!(it.evaluate_at_index(&[-0.4, 0.0, 0.0]), Some(0.0));
        assert!((it.evaluate_at_index(&[0.0, 0.0, 5.4]).unwrap() - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_generic_over_sample_type() {
        let data = Array3::from_shape_fn((2, 2, 2), |(z, _, _)| (z * 200) as u8);
        let v = Volume::new(data, [1.0; 3], [0.0; 3]).unwrap();
        let it = LinearInterpolator::new(&v);
        assert_eq!(it.evaluate_at_index(&[0.5, 0.0, 0.0]), Some(100.0));
    }
}
