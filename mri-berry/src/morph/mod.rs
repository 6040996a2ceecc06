//! 3D 二值形态学: 结构元, 腐蚀/膨胀/开/闭运算, 连通分量标记.

mod binary;

mod element;

mod label;

pub use binary::{closing, dilate, erode, opening};
pub use element::{Offset3d, StructuringElement, BALL1};
pub use label::{keep_label, keep_largest, label_components, relabel_by_size, Components, LabelMap};
