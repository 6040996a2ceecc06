//! 以 versor (单位四元数的向量部分) 表示旋转的三维刚性变换.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::Point3d;

/// 3x3 矩阵, 行优先.
pub type Matrix3 = [[f64; 3]; 3];

/// 刚性变换 `T(x) = R(x - c) + c + t`.
///
/// 旋转 `R` 由单位四元数 `(v, w)` 的向量部分 `v` 表示, `w = sqrt(1 - |v|²) >= 0`,
/// 因此只需 3 个参数, 不存在万向节死锁. 旋转中心 `c` 在初始化时确定, 不参与优化.
///
/// # 注意
///
/// `T` 把固定图像上的物理点映射到浮动图像上的对应点 (重采样时按此方向取值).
/// 浮动图像 -> 固定图像方向的映射由 [`Self::map_moving_to_fixed`] 或
/// [`Self::inverse`] 给出.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RigidTransform {
    versor: [f64; 3],
    translation: [f64; 3],
    center: Point3d,
}

/// 预先展开的仿射映射 `p -> Mp + b`.
///
/// 由 [`RigidTransform::fixed_to_moving`] 构建, 对大量点逐一映射时只需计算一次旋转矩阵.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct AffineMap {
    matrix: Matrix3,
    offset: [f64; 3],
}

impl AffineMap {
    /// 映射单个点.
    #[inline]
    pub fn apply(&self, p: &Point3d) -> Point3d {
        std::array::from_fn(|i| dot(&self.matrix[i], p) + self.offset[i])
    }
}

#[inline]
fn dot(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn cross(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

/// 四元数乘法 `(v1, w1) * (v2, w2)`.
#[inline]
fn quat_mul((v1, w1): ([f64; 3], f64), (v2, w2): ([f64; 3], f64)) -> ([f64; 3], f64) {
    let c = cross(&v1, &v2);
    let v = std::array::from_fn(|i| w1 * v2[i] + w2 * v1[i] + c[i]);
    (v, w1 * w2 - dot(&v1, &v2))
}

/// 由旋转向量 (轴 * 角度) 得到单位四元数.
#[inline]
fn quat_from_rotation_vector(r: &[f64; 3]) -> ([f64; 3], f64) {
    let angle = dot(r, r).sqrt();
    if angle < f64::EPSILON {
        return ([0.0; 3], 1.0);
    }
    let s = (angle / 2.0).sin() / angle;
    (r.map(|x| x * s), (angle / 2.0).cos())
}

impl RigidTransform {
    /// 以 `center` 为旋转中心的恒等变换.
    #[inline]
    pub fn identity(center: Point3d) -> Self {
        Self {
            versor: [0.0; 3],
            translation: [0.0; 3],
            center,
        }
    }

    /// 由 versor 向量部分, 平移和旋转中心构建变换.
    ///
    /// 若 `|versor| > 1` 或存在非有限值, 返回 `None`.
    pub fn new(versor: [f64; 3], translation: [f64; 3], center: Point3d) -> Option<Self> {
        let finite = versor
            .iter()
            .chain(translation.iter())
            .chain(center.iter())
            .all(|v| v.is_finite());
        (finite && dot(&versor, &versor) <= 1.0).then_some(Self {
            versor,
            translation,
            center,
        })
    }

    /// 6 个优化参数 `[vx, vy, vz, tx, ty, tz]`.
    #[inline]
    pub fn parameters(&self) -> [f64; 6] {
        let [a, b, c] = self.versor;
        let [x, y, z] = self.translation;
        [a, b, c, x, y, z]
    }

    /// versor 向量部分.
    #[inline]
    pub fn versor(&self) -> [f64; 3] {
        self.versor
    }

    /// 平移量 (毫米).
    #[inline]
    pub fn translation(&self) -> [f64; 3] {
        self.translation
    }

    /// 旋转中心.
    #[inline]
    pub fn center(&self) -> Point3d {
        self.center
    }

    /// versor 标量部分.
    #[inline]
    fn scalar(&self) -> f64 {
        (1.0 - dot(&self.versor, &self.versor)).max(0.0).sqrt()
    }

    /// 旋转角 (弧度), 位于 `[0, π]`.
    #[inline]
    pub fn angle(&self) -> f64 {
        2.0 * self.scalar().clamp(-1.0, 1.0).acos()
    }

    /// 旋转矩阵.
    pub fn rotation_matrix(&self) -> Matrix3 {
        let [x, y, z] = self.versor;
        let w = self.scalar();
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        let (xw, yw, zw) = (x * w, y * w, z * w);
        [
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy - zw), 2.0 * (xz + yw)],
            [2.0 * (xy + zw), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - xw)],
            [2.0 * (xz - yw), 2.0 * (yz + xw), 1.0 - 2.0 * (xx + yy)],
        ]
    }

    /// 固定图像物理点 -> 浮动图像物理点的映射, 展开为 `Rp + (c + t - Rc)`.
    pub fn fixed_to_moving(&self) -> AffineMap {
        let matrix = self.rotation_matrix();
        let offset = std::array::from_fn(|i| self.center[i] + self.translation[i] - dot(&matrix[i], &self.center));
        AffineMap { matrix, offset }
    }

    /// 固定图像物理点 -> 浮动图像物理点: `R(p - c) + c + t`.
    ///
    /// 映射大量点时应使用 [`Self::fixed_to_moving`].
    #[inline]
    pub fn map_fixed_to_moving(&self, p: &Point3d) -> Point3d {
        self.fixed_to_moving().apply(p)
    }

    /// 浮动图像物理点 -> 固定图像物理点: `Rᵀ(q - c - t) + c`.
    pub fn map_moving_to_fixed(&self, q: &Point3d) -> Point3d {
        let r = self.rotation_matrix();
        let d: [f64; 3] = std::array::from_fn(|i| q[i] - self.center[i] - self.translation[i]);
        std::array::from_fn(|i| r[0][i] * d[0] + r[1][i] * d[1] + r[2][i] * d[2] + self.center[i])
    }

    /// 逆变换. 旋转中心保持不变.
    pub fn inverse(&self) -> Self {
        let r = self.rotation_matrix();
        let t = self.translation;
        Self {
            versor: self.versor.map(|v| -v),
            translation: std::array::from_fn(|i| -(r[0][i] * t[0] + r[1][i] * t[1] + r[2][i] * t[2])),
            center: self.center,
        }
    }

    /// 在当前变换基础上前进一步: 旋转部分右乘由旋转向量 `delta[..3]` 得到的旋转,
    /// 平移部分直接加上 `delta[3..]`.
    pub fn step(&self, delta: &[f64; 6]) -> Self {
        let rot = quat_from_rotation_vector(&[delta[0], delta[1], delta[2]]);
        let (mut v, mut w) = quat_mul((self.versor, self.scalar()), rot);
        let norm = (dot(&v, &v) + w * w).sqrt();
        v = v.map(|x| x / norm);
        w /= norm;
        if w < 0.0 {
            // q 与 -q 代表同一旋转, 保持 w >= 0.
            v = v.map(|x| -x);
        }
        Self {
            versor: v,
            translation: std::array::from_fn(|i| self.translation[i] + delta[i + 3]),
            center: self.center,
        }
    }
}

#[cfg(feature = "serde")]
mod checkpoint {
    use std::fs::File;
    use std::io::{BufReader, BufWriter};
    use std::path::Path;

    use super::RigidTransform;
    use crate::Result;

    impl RigidTransform {
        /// 以 `bincode` 格式将变换保存到 `path`.
        pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
            let writer = BufWriter::new(File::create(path)?);
            bincode::serialize_into(writer, self)?;
            Ok(())
        }

        /// 读取由 [`Self::save`] 保存的变换.
        pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
            let reader = BufReader::new(File::open(path)?);
            Ok(bincode::deserialize_from(reader)?)
        }
    }
}
