use itertools::iproduct;
use once_cell::sync::Lazy;

/// 三维偏移量 `(dz, dh, dw)`.
pub type Offset3d = (isize, isize, isize);

/// 半径为 1 的球形结构元, 共 19 个偏移量.
pub static BALL1: Lazy<StructuringElement> = Lazy::new(|| StructuringElement::ball(1));

/// 平坦 (二值) 结构元, 由一组相对中心的偏移量构成. 中心 `(0, 0, 0)` 总是包含在内.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StructuringElement {
    radius: usize,
    offsets: Vec<Offset3d>,
}

impl StructuringElement {
    /// 体素网格上的球形结构元.
    ///
    /// 偏移量 `d` 被包含, 当且仅当 `|d|² <= (radius + 0.5)²`. 因此半径为 1 时,
    /// 结构元包含中心, 6 个面邻居和 12 个棱邻居, 但不包含 8 个角邻居.
    pub fn ball(radius: usize) -> Self {
        let r = radius as isize;
        let limit = (radius as f64 + 0.5).powi(2);
        let offsets = iproduct!(-r..=r, -r..=r, -r..=r)
            .filter(|&(z, h, w)| ((z * z + h * h + w * w) as f64) <= limit)
            .collect();
        Self { radius, offsets }
    }

    /// 任意方向上偏移量绝对值的最大值.
    #[inline]
    pub fn radius(&self) -> usize {
        self.radius
    }

    /// 所有偏移量.
    #[inline]
    pub fn offsets(&self) -> &[Offset3d] {
        &self.offsets
    }

    /// 偏移量个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// 是否不含任何偏移量. 由构造方式保证总是返回 `false`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ball_sizes() {
        assert_eq!(StructuringElement::ball(0).offsets(), &[(0, 0, 0)]);
        assert_eq!(BALL1.len(), 19);
        assert!(BALL1.offsets().contains(&(1, 1, 0)));
        assert!(!BALL1.offsets().contains(&(1, 1, 1)));
        assert_eq!(StructuringElement::ball(2).radius(), 2);
    }

    #[test]
    fn test_ball_is_symmetric() {
        let b = StructuringElement::ball(2);
        for &(z, h, w) in b.offsets() {
            assert!(b.offsets().contains(&(-z, -h, -w)));
        }
    }
}
