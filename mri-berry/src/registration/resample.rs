use ndarray::ArrayViewMut2;
use num::{NumCast, ToPrimitive};

use super::interpolate::LinearInterpolator;
use super::transform::{AffineMap, RigidTransform};
use crate::{Geometry, Volume};

fn fill_slice<T>(
    z: usize,
    mut out: ArrayViewMut2<T>,
    reference: &Geometry,
    interp: &LinearInterpolator<T>,
    map: &AffineMap,
    default: T,
) where
    T: ToPrimitive + NumCast + Copy,
{
    for ((h, w), pix) in out.indexed_iter_mut() {
        let p = map.apply(&reference.index_to_physical((z, h, w)));
        *pix = interp
            .evaluate(&p)
            .and_then(<T as NumCast>::from)
            .unwrap_or(default);
    }
}

/// 将 `moving` 经 `transform` 重采样到 `reference` 网格上 (三线性插值).
///
/// 输出与 `reference` 的形状, 间距, 原点完全一致. 映射到 `moving` 外部的体素取
/// `default`. 插值结果无法用 `T` 表示时同样取 `default`.
#[cfg(feature = "rayon")]
pub fn resample<T>(moving: &Volume<T>, reference: &Geometry, transform: &RigidTransform, default: T) -> Volume<T>
where
    T: ToPrimitive + NumCast + Copy + Send + Sync,
{
    let interp = LinearInterpolator::new(moving);
    let map = transform.fixed_to_moving();
    Volume::par_from_slices(*reference, default, |z, v| {
        fill_slice(z, v, reference, &interp, &map, default)
    })
}

/// 将 `moving` 经 `transform` 重采样到 `reference` 网格上 (三线性插值).
///
/// 输出与 `reference` 的形状, 间距, 原点完全一致. 映射到 `moving` 外部的体素取
/// `default`. 插值结果无法用 `T` 表示时同样取 `default`.
#[cfg(not(feature = "rayon"))]
pub fn resample<T>(moving: &Volume<T>, reference: &Geometry, transform: &RigidTransform, default: T) -> Volume<T>
where
    T: ToPrimitive + NumCast + Copy + Send + Sync,
{
    let interp = LinearInterpolator::new(moving);
    let map = transform.fixed_to_moving();
    let mut out = Volume::from_elem(*reference, default);
    for (z, v) in out.data_mut().axis_iter_mut(ndarray::Axis(0)).enumerate() {
        fill_slice(z, v, reference, &interp, &map, default);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{GeometryAttr, MriScan};
    use ndarray::Array3;

    fn ramp() -> MriScan {
        let data = Array3::from_shape_fn((5, 6, 7), |(z, h, w)| (z * 100 + h * 10 + w) as f32);
        MriScan::new(data, [1.0, 2.0, 1.0], [0.0, 0.0, 0.0]).unwrap()
    }

    #[test]
    fn test_identity_reproduces_input() {
        let v = ramp();
        let out = resample(&v, v.geometry(), &RigidTransform::identity([0.0; 3]), 0.0);
        assert_eq!(out, v);
    }

    #[test]
    fn test_output_has_reference_geometry() {
        let v = ramp();
        let reference = Geometry::new((3, 4, 9), [0.5, 0.5, 0.5], [1.0, 1.0, 1.0]).unwrap();
        let out = resample(&v, &reference, &RigidTransform::identity([0.0; 3]), -1.0);
        assert_eq!(*out.geometry(), reference);
        // (z, h, w) = (1.0, 1.0, 1.0) mm -> 索引 (1, 0.5, 1)
        assert!((out[(0, 0, 0)] - 106.0).abs() < 1e-4);
    }

    #[test]
    fn test_outside_gets_default() {
        let v = ramp();
        let shift = RigidTransform::identity([0.0; 3]).step(&[0.0, 0.0, 0.0, 0.0, 0.0, 3.0]);
        let out = resample(&v, v.geometry(), &shift, 0.0);
        assert_eq!(out[(2, 3, 0)], v[(2, 3, 3)]);
        assert_eq!(out[(2, 3, 3)], v[(2, 3, 6)]);
        assert_eq!(out[(2, 3, 4)], 0.0);
    }
}
