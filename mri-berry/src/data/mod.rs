use std::ops::{Index, IndexMut};
use std::path::Path;

use ndarray::{Array3, ArrayView2, ArrayView3, ArrayViewMut3, Axis, IxDyn};
use nifti::writer::WriterOptions;
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::consts::gray::*;
use crate::error::{PipelineError, Result, Stage};
use crate::{Idx3d, Point3d};

pub mod snapshot;
pub mod window;

pub use snapshot::SliceSnapshot;
pub use window::IntensityWindow;

/// 体数据的网格几何信息: 形状, 间距和原点.
///
/// 所有分量均按照 `(z, h, w)` 顺序存储. 间距以毫米为单位, 且保证为有限正数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Geometry {
    shape: Idx3d,
    spacing: [f64; 3],
    origin: Point3d,
}

impl Geometry {
    /// 构建网格几何信息.
    ///
    /// 如果 `spacing` 存在非正数或非有限值, 或 `origin` 存在非有限值, 则返回 `Err`.
    pub fn new(shape: Idx3d, spacing: [f64; 3], origin: Point3d) -> Result<Self> {
        if !spacing.iter().all(|s| s.is_finite() && *s > 0.0) {
            return Err(PipelineError::geometry(
                Stage::Io,
                "volume",
                format!("spacing must be positive, got {spacing:?}"),
            ));
        }
        if !origin.iter().all(|o| o.is_finite()) {
            return Err(PipelineError::geometry(
                Stage::Io,
                "volume",
                format!("origin must be finite, got {origin:?}"),
            ));
        }
        Ok(Self {
            shape,
            spacing,
            origin,
        })
    }

    /// 间距为 1 mm, 原点为 0 的网格.
    #[inline]
    pub fn unit(shape: Idx3d) -> Self {
        Self {
            shape,
            spacing: [1.0; 3],
            origin: [0.0; 3],
        }
    }

    /// 形状 `(z, h, w)`.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 间距 `[z, h, w]`, 以毫米为单位.
    #[inline]
    pub fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    /// 原点 (索引 `(0, 0, 0)` 的物理坐标).
    #[inline]
    pub fn origin(&self) -> Point3d {
        self.origin
    }

    /// 三个轴上的体素个数.
    #[inline]
    pub fn dims(&self) -> [usize; 3] {
        let (z, h, w) = self.shape;
        [z, h, w]
    }

    /// 索引 -> 物理坐标.
    #[inline]
    pub fn index_to_physical(&self, (z, h, w): Idx3d) -> Point3d {
        let idx = [z as f64, h as f64, w as f64];
        std::array::from_fn(|a| self.origin[a] + idx[a] * self.spacing[a])
    }

    /// 物理坐标 -> 连续索引. 结果可能越界, 也可能为负.
    #[inline]
    pub fn physical_to_continuous_index(&self, p: &Point3d) -> [f64; 3] {
        std::array::from_fn(|a| (p[a] - self.origin[a]) / self.spacing[a])
    }

    /// 物理包围盒的几何中心.
    pub fn center(&self) -> Point3d {
        let dims = self.dims();
        std::array::from_fn(|a| {
            self.origin[a] + self.spacing[a] * (dims[a].saturating_sub(1) as f64) / 2.0
        })
    }

    /// 任意一个轴上体素个数为 0.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.dims().contains(&0)
    }

    /// 两个网格是否完全一致 (形状, 间距, 原点).
    #[inline]
    pub fn same_grid(&self, other: &Geometry) -> bool {
        self == other
    }

    /// 生成与该几何一致的 nifti header.
    fn to_header(self) -> NiftiHeader {
        let mut header = NiftiHeader::default();
        let (z, h, w) = self.shape;
        header.dim = [3, w as u16, h as u16, z as u16, 1, 1, 1, 1];
        let [sz, sh, sw] = self.spacing;
        header.pixdim = [1.0, sw as f32, sh as f32, sz as f32, 0.0, 0.0, 0.0, 0.0];
        let [oz, oh, ow] = self.origin;
        header.qform_code = 1;
        header.sform_code = 0;
        (header.quatern_b, header.quatern_c, header.quatern_d) = (0.0, 0.0, 0.0);
        (header.quatern_x, header.quatern_y, header.quatern_z) = (ow as f32, oh as f32, oz as f32);
        header.scl_slope = 1.0;
        header.scl_inter = 0.0;
        header
    }

    /// 从 nifti header 中提取几何信息. 方向余弦被忽略.
    fn from_header(header: &NiftiHeader) -> Result<Self> {
        // [W, H, z]. 体素个数数组.
        let [_, w, h, z, ..] = header.dim;
        let [_, pw, ph, pz, ..] = header.pixdim;
        let origin = if header.qform_code > 0 {
            [header.quatern_z, header.quatern_y, header.quatern_x]
        } else if header.sform_code > 0 {
            [header.srow_z[3], header.srow_y[3], header.srow_x[3]]
        } else {
            [0.0; 3]
        };
        Self::new(
            (z as usize, h as usize, w as usize),
            [pz as f64, ph as f64, pw as f64],
            origin.map(f64::from),
        )
    }
}

/// 带有网格几何信息的对象的共用属性和部分通用操作.
pub trait GeometryAttr {
    /// 获取几何信息.
    fn geometry(&self) -> &Geometry;

    /// 获取数据形状大小.
    #[inline]
    fn shape(&self) -> Idx3d {
        self.geometry().shape()
    }

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取单个体素分辨率. 该分辨率以毫米为单位, 分别代表空间 (相邻切片方向),
    /// 高 (自然图像的垂直方向), 宽 (自然图像的水平方向).
    #[inline]
    fn pix_dim(&self) -> [f64; 3] {
        self.geometry().spacing()
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.pix_dim().iter().product()
    }

    /// 与另一对象是否处于完全相同的网格上.
    #[inline]
    fn same_grid<G: GeometryAttr + ?Sized>(&self, other: &G) -> bool {
        self.geometry().same_grid(other.geometry())
    }
}

/// 带物理网格信息的 3D 体数据.
///
/// 数据以 `(z, h, w)` 顺序存放在 `Array3<T>` 中.
#[derive(Debug, Clone, PartialEq)]
pub struct Volume<T> {
    geometry: Geometry,
    data: Array3<T>,
}

/// 强度体数据, 体素值以 `f32` 保存.
pub type MriScan = Volume<f32>;

/// 二值 (或标签) 掩膜, 体素值以 `u8` 保存. 前景为 1, 背景为 0.
pub type Mask = Volume<u8>;

impl<T> GeometryAttr for Volume<T> {
    #[inline]
    fn geometry(&self) -> &Geometry {
        &self.geometry
    }
}

impl<T> Index<Idx3d> for Volume<T> {
    type Output = T;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl<T> IndexMut<Idx3d> for Volume<T> {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl<T> Volume<T> {
    /// 根据 `(z, h, w)` 顺序的数据, 间距和原点直接创建体数据.
    pub fn new(data: Array3<T>, spacing: [f64; 3], origin: Point3d) -> Result<Self> {
        let geometry = Geometry::new(data.dim(), spacing, origin)?;
        Ok(Self { geometry, data })
    }

    /// 在已有几何信息上创建体数据. 数据形状必须与 `geometry` 一致, 否则程序 panic.
    pub fn with_geometry(geometry: Geometry, data: Array3<T>) -> Self {
        assert_eq!(geometry.shape(), data.dim(), "数据形状与网格不一致");
        Self { geometry, data }
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, T> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, T> {
        self.data.view_mut()
    }

    /// 获取给定位置的体素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<&T> {
        self.data.get(pos)
    }

    /// 获取 3D 体数据 z 空间的第 `z_index` 层切片视图.
    ///
    /// 当 `z_index` 越界时 panic.
    #[inline]
    pub fn slice_at(&self, z_index: usize) -> ArrayView2<'_, T> {
        self.data.index_axis(Axis(0), z_index)
    }

    /// 在同一网格上逐体素映射, 获得新的体数据.
    pub fn map<U, F: FnMut(&T) -> U>(&self, f: F) -> Volume<U> {
        Volume {
            geometry: self.geometry,
            data: self.data.map(f),
        }
    }

    /// 获取 `pos` 前后上下左右六个点的坐标.
    ///
    /// 在数据范围外的坐标会被过滤掉, 不会包含在返回值中.
    pub fn diamond_neighbours(&self, (z, h, w): Idx3d) -> Vec<Idx3d> {
        self.check_collect([
            (z.wrapping_sub(1), h, w),
            (z.saturating_add(1), h, w),
            (z, h.wrapping_sub(1), w),
            (z, h.saturating_add(1), w),
            (z, h, w.wrapping_sub(1)),
            (z, h, w.saturating_add(1)),
        ])
    }

    /// 收集 `data` 中不越界的索引.
    #[inline]
    fn check_collect<B: FromIterator<Idx3d>, const N: usize>(&self, data: [Idx3d; N]) -> B {
        data.into_iter().filter(|p| self.check(p)).collect()
    }
}

impl<T: Clone> Volume<T> {
    /// 在 `geometry` 网格上创建所有体素都为 `value` 的体数据.
    #[inline]
    pub fn from_elem(geometry: Geometry, value: T) -> Self {
        Self {
            geometry,
            data: Array3::from_elem(geometry.shape(), value),
        }
    }
}

impl Mask {
    /// 在 `geometry` 网格上创建全背景掩膜.
    #[inline]
    pub fn background(geometry: Geometry) -> Self {
        Self::from_elem(geometry, MASK_BACKGROUND)
    }

    /// 获取 3D 掩膜中值为 `label` 的体素个数.
    #[inline]
    pub fn count(&self, label: u8) -> usize {
        self.data.iter().filter(|p| **p == label).count()
    }

    /// 获取 3D 掩膜中前景 (非零) 体素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 掩膜是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, pixel)| is_foreground(*pixel).then_some(pos))
            .collect()
    }
}

/// nifti 读写. 针对具体体素类型展开, 以便直接使用 nifti crate 的元素转换.
macro_rules! impl_nifti_io {
    ($($elem: ty),+) => {
        $(
            impl Volume<$elem> {
                /// 打开 nii / nii.gz 文件格式的 3D 体数据. `path` 为文件的本地路径.
                /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
                ///
                /// 只支持三维数据; 体素值会被转换为目标类型.
                pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
                    let obj = ReaderOptions::new().read_file(path.as_ref())?;
                    let geometry = Geometry::from_header(obj.header())?;

                    let data = obj.into_volume().into_ndarray::<$elem>()?;
                    if data.ndim() != 3 {
                        return Err(PipelineError::geometry(
                            Stage::Io,
                            path.as_ref().display().to_string().as_str(),
                            format!("expected a 3D volume, got {} dimensions", data.ndim()),
                        ));
                    }
                    // [W, H, z] -> [z, H, W].
                    let data = data.permuted_axes(IxDyn(&[2, 1, 0]));
                    let data = Array3::from_shape_vec(geometry.shape(), data.iter().copied().collect())
                        .map_err(|e| {
                            PipelineError::geometry(
                                Stage::Io,
                                path.as_ref().display().to_string().as_str(),
                                e.to_string(),
                            )
                        })?;

                    Ok(Self { geometry, data })
                }

                /// 将体数据以 nifti 格式写入 `path`. 间距和原点可被 [`Self::open`] 原样读回.
                /// 以 `.gz` 结尾的路径会被压缩.
                pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
                    let header = self.geometry.to_header();
                    // [z, H, W] -> [W, H, z].
                    let data = self.data.view().permuted_axes([2, 1, 0]);
                    WriterOptions::new(path.as_ref())
                        .reference_header(&header)
                        .write_nifti(&data)?;
                    Ok(())
                }
            }
        )+
    };
}

impl_nifti_io!(f32, u8);

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use ndarray::parallel::prelude::*;
    }
}

/// 并发操作部分
#[cfg(feature = "rayon")]
impl<T: Clone + Send + Sync> Volume<T> {
    /// 借助 `rayon`, 并行地按水平切片填充新的体数据. `op` 接收切片索引和可变切片视图.
    pub fn par_from_slices<F>(geometry: Geometry, init: T, op: F) -> Self
    where
        F: Fn(usize, ndarray::ArrayViewMut2<T>) + Sync + Send,
    {
        let mut data = Array3::from_elem(geometry.shape(), init);
        data.axis_iter_mut(Axis(0))
            .into_par_iter()
            .enumerate()
            .for_each(|(z, v)| op(z, v));
        Self { geometry, data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_rejects_bad_spacing() {
        assert!(Geometry::new((2, 2, 2), [1.0, 0.0, 1.0], [0.0; 3]).is_err());
        assert!(Geometry::new((2, 2, 2), [1.0, -1.0, 1.0], [0.0; 3]).is_err());
        assert!(Geometry::new((2, 2, 2), [1.0, f64::NAN, 1.0], [0.0; 3]).is_err());
        assert!(Geometry::new((2, 2, 2), [0.5, 1.0, 2.0], [3.0, 4.0, 5.0]).is_ok());
    }

    #[test]
    fn test_index_physical_round_trip() {
        let g = Geometry::new((10, 20, 30), [2.0, 0.5, 1.5], [-4.0, 1.0, 7.0]).unwrap();
        let p = g.index_to_physical((3, 4, 5));
        assert_eq!(p, [2.0, 3.0, 14.5]);
        let c = g.physical_to_continuous_index(&p);
        assert_eq!(c, [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_geometry_center() {
        let g = Geometry::new((11, 21, 5), [2.0, 1.0, 0.5], [0.0, 10.0, -1.0]).unwrap();
        assert_eq!(g.center(), [10.0, 20.0, 0.0]);
    }

    #[test]
    fn test_voxel_volume() {
        let v = Volume::new(Array3::<u8>::zeros((2, 3, 4)), [2.0, 0.5, 3.0], [0.0; 3]).unwrap();
        assert_eq!(v.voxel(), 3.0);
        assert_eq!(v.size(), 24);
        assert_eq!(v.pix_dim(), [2.0, 0.5, 3.0]);
    }

    #[test]
    fn test_diamond_neighbours_filter_out_of_bounds() {
        let v = Mask::background(Geometry::unit((3, 3, 3)));
        assert_eq!(v.diamond_neighbours((1, 1, 1)).len(), 6);
        assert_eq!(v.diamond_neighbours((0, 0, 0)).len(), 3);
        assert_eq!(v.diamond_neighbours((2, 2, 2)).len(), 3);
    }

    #[test]
    fn test_mask_counting() {
        let mut m = Mask::background(Geometry::unit((4, 4, 4)));
        m[(0, 0, 0)] = 1;
        m[(1, 2, 3)] = 1;
        m[(3, 3, 3)] = 2;
        assert_eq!(m.count_foreground(), 3);
        assert_eq!(m.count(1), 2);
        assert_eq!(m.count(2), 1);
        assert_eq!(m.foreground_pos(), vec![(0, 0, 0), (1, 2, 3), (3, 3, 3)]);
    }
}
