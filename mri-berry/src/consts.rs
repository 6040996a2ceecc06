//! 通用常量.

/// 单通道颜色 / 掩膜取值.
pub mod gray {
    /// 掩膜中背景的体素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中前景的体素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 体素是否是前景? 任何非零标签都视为前景.
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        p != MASK_BACKGROUND
    }

    /// 体素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// Otsu 阈值默认直方图 bin 数.
pub const OTSU_BINS: usize = 200;

/// 互信息默认直方图 bin 数.
pub const MI_BINS: usize = 50;

/// 原始演示数据上的肿瘤种子点 `(z, h, w)`.
pub const DEMO_SEED: (usize, usize, usize) = (53, 63, 83);
