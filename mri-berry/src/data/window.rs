/// 强度窗口 `[lower, upper]`, 闭区间.
///
/// 肿瘤分割时用于判断体素是否属于生长区域, 保存切片快照时用于灰度映射.
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityWindow {
    lower: f64,
    upper: f64,
}

impl IntensityWindow {
    /// 构建强度窗口.
    ///
    /// `lower` 和 `upper` 必须是有限值且 `lower <= upper`, 否则返回 `None`.
    pub fn new(lower: f64, upper: f64) -> Option<Self> {
        if lower.is_finite() && upper.is_finite() && lower <= upper {
            Some(Self { lower, upper })
        } else {
            None
        }
    }

    /// 以种子点强度 `value` 为中心构建窗口:
    /// `[max(0, value * lower_factor), value * upper_factor]`.
    ///
    /// # 注意
    ///
    /// 只有下限被截断到 0. 当 `value` 为负数时, 上限小于下限, 窗口不包含任何值.
    #[inline]
    pub fn from_seed_value(value: f64, lower_factor: f64, upper_factor: f64) -> Self {
        Self {
            lower: (value * lower_factor).max(0.0),
            upper: value * upper_factor,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f64 {
        self.lower
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f64 {
        self.upper
    }

    /// 窗宽. 空窗口的窗宽为 0.
    #[inline]
    pub fn width(&self) -> f64 {
        (self.upper - self.lower).max(0.0)
    }

    /// 窗口是否不包含任何值?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.upper.is_nan() || self.lower > self.upper
    }

    /// `value` 是否落在窗口内 (含边界). NaN 不在任何窗口内.
    #[inline]
    pub fn contains(&self, value: f64) -> bool {
        self.lower <= value && value <= self.upper
    }

    /// 求在当前窗口设置下, `value` 对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `value` 无意义 (如 inf, NaN), 则返回 `None`. 窗宽为 0 时,
    /// 不小于窗上限的值映射为 255, 其余为 0.
    pub fn eval_gray(&self, value: f64) -> Option<u8> {
        if !value.is_finite() {
            return None;
        }
        if value <= self.lower && self.lower < self.upper {
            Some(u8::MIN)
        } else if value >= self.upper {
            Some(u8::MAX)
        } else if value < self.lower {
            Some(u8::MIN)
        } else {
            // 255, not 256.
            Some(((value - self.lower) / self.width() * 255.0) as u8)
        }
    }
}
