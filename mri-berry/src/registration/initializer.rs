use super::transform::RigidTransform;
use crate::error::{PipelineError, Result, Stage, VolumeTag};
use crate::Geometry;

/// 几何中心初始化.
///
/// 旋转中心取固定图像物理包围盒的几何中心, 初始平移为浮动图像几何中心减去固定图像
/// 几何中心, 旋转为恒等. 这是闭式计算, 只依赖两幅图像的物理范围.
///
/// # 注意
///
/// 任一图像在某个轴上的体素个数为 0 时返回 `Geometry` 错误.
pub fn centered_initial_transform(fixed: &Geometry, moving: &Geometry) -> Result<RigidTransform> {
    for (g, tag) in [(fixed, VolumeTag::fixed()), (moving, VolumeTag::moving())] {
        if g.is_empty() {
            return Err(PipelineError::geometry(
                Stage::Register,
                tag,
                format!("zero extent, shape {:?}", g.shape()),
            ));
        }
    }
    let c = fixed.center();
    let m = moving.center();
    let translation = std::array::from_fn(|i| m[i] - c[i]);
    RigidTransform::new([0.0; 3], translation, c)
        .ok_or_else(|| PipelineError::geometry(Stage::Register, VolumeTag::moving(), "non-finite center"))
}
