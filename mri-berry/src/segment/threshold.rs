use num::ToPrimitive;

use crate::consts::gray::*;
use crate::{Mask, Volume};

/// Otsu 方法自动选取阈值.
///
/// 在 `[min, max]` 上建立 `bins` 个等宽 bin 的直方图, 选取使类间方差最大的分割 bin
/// `t` (存在多个时取第一个), 返回该 bin 的上边界 `min + (t + 1) * width`.
/// 因此严格大于阈值的体素属于高强度类.
///
/// # 返回值
///
/// 若 `bins < 2` 或体数据中没有有限值, 返回 `None`. 若所有有限值都相等, 返回该值,
/// 此时没有体素严格大于阈值.
pub fn otsu_threshold<T: ToPrimitive + Copy>(volume: &Volume<T>, bins: usize) -> Option<f64> {
    if bins < 2 {
        return None;
    }
    let values = || {
        volume
            .data()
            .into_iter()
            .filter_map(|v| v.to_f64())
            .filter(|v| v.is_finite())
    };
    let (min_val, max_val) = values().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if min_val > max_val {
        return None;
    }
    if max_val - min_val < 1e-10 {
        return Some(min_val);
    }

    let bin_width = (max_val - min_val) / bins as f64;
    let mut histogram = vec![0usize; bins];
    for v in values() {
        let bin = (((v - min_val) / bin_width).floor() as usize).min(bins - 1);
        histogram[bin] += 1;
    }

    let total = histogram.iter().sum::<usize>() as f64;
    let sum_total: f64 = histogram.iter().enumerate().map(|(i, &c)| i as f64 * c as f64).sum();

    let mut sum_background = 0.0;
    let mut weight_background = 0.0;
    let mut max_variance = 0.0;
    let mut optimal_bin = 0;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count as f64;
        if weight_background == 0.0 {
            continue;
        }
        let weight_foreground = total - weight_background;
        if weight_foreground == 0.0 {
            break;
        }
        sum_background += t as f64 * count as f64;

        let mean_background = sum_background / weight_background;
        let mean_foreground = (sum_total - sum_background) / weight_foreground;
        let variance = weight_background * weight_foreground * (mean_background - mean_foreground).powi(2);
        if variance > max_variance {
            max_variance = variance;
            optimal_bin = t;
        }
    }

    Some(min_val + (optimal_bin + 1) as f64 * bin_width)
}

/// 二值化: 严格大于 `threshold` 的体素为前景.
pub fn binarize_above<T: ToPrimitive + Copy>(volume: &Volume<T>, threshold: f64) -> Mask {
    volume.map(|v| match v.to_f64() {
        Some(x) if x > threshold => MASK_FOREGROUND,
        _ => MASK_BACKGROUND,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    #[test]
    fn test_otsu_bimodal() {
        let data = Array3::from_shape_fn((2, 10, 10), |(z, h, w)| {
            let jitter = (h * 10 + w) as f32 / 100.0;
            if z == 0 { 10.0 + jitter * 5.0 } else { 70.0 + jitter * 5.0 }
        });
        let v = Volume::new(data, [1.0; 3], [0.0; 3]).unwrap();
        let t = otsu_threshold(&v, 200).unwrap();
        assert!(t > 15.0 && t < 70.0, "threshold = {t}");
        let m = binarize_above(&v, t);
        assert_eq!(m.count_foreground(), 100);
        assert_eq!(m[(1, 0, 0)], MASK_FOREGROUND);
    }

    #[test]
    fn test_otsu_binary_input() {
        let data = Array3::from_shape_fn((4, 4, 4), |(z, _, _)| if z < 2 { 0u8 } else { 1u8 });
        let v = Volume::new(data, [1.0; 3], [0.0; 3]).unwrap();
        let t = otsu_threshold(&v, 200).unwrap();
        assert!(t > 0.0 && t < 1.0);
        assert_eq!(binarize_above(&v, t).count_foreground(), 32);
    }

    #[test]
    fn test_otsu_constant() {
        let v = Volume::new(Array3::from_elem((3, 3, 3), 5.0f32), [1.0; 3], [0.0; 3]).unwrap();
        assert_eq!(otsu_threshold(&v, 200), Some(5.0));
        assert!(binarize_above(&v, 5.0).is_background());
    }

    #[test]
    fn test_otsu_empty() {
        let v = Volume::new(Array3::<f32>::zeros((0, 3, 3)), [1.0; 3], [0.0; 3]).unwrap();
        assert_eq!(otsu_threshold(&v, 200), None);
    }

    #[test]
    fn test_otsu_too_few_bins() {
        let data = Array3::from_shape_fn((2, 2, 2), |(z, _, _)| z as f32);
        let v = Volume::new(data, [1.0; 3], [0.0; 3]).unwrap();
        assert_eq!(otsu_threshold(&v, 0), None);
        assert_eq!(otsu_threshold(&v, 1), None);
        assert!(otsu_threshold(&v, 2).is_some());
    }
}
