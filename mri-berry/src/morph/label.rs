//! 6-连通分量标记与按大小重标记.

use std::cmp::Reverse;
use std::collections::VecDeque;

use crate::consts::gray::*;
use crate::{GeometryAttr, Mask, Volume};

/// 标签图. 0 代表背景, 正整数代表连通分量编号.
pub type LabelMap = Volume<u32>;

/// 连通分量标记结果.
#[derive(Clone, Debug, PartialEq)]
pub struct Components {
    labels: LabelMap,
    /// `sizes[i]` 为标签 `i + 1` 的体素个数.
    sizes: Vec<usize>,
}

impl Components {
    /// 标签图.
    #[inline]
    pub fn labels(&self) -> &LabelMap {
        &self.labels
    }

    /// 各分量的体素个数, 下标 `i` 对应标签 `i + 1`.
    #[inline]
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// 分量个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// 是否不存在任何分量?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// 标签 `label` 的体素个数. 不存在该标签时返回 0.
    #[inline]
    pub fn size_of(&self, label: u32) -> usize {
        (label as usize)
            .checked_sub(1)
            .and_then(|i| self.sizes.get(i).copied())
            .unwrap_or(0)
    }

    /// 所有非零标签构成的二值掩膜.
    pub fn to_mask(&self) -> Mask {
        self.labels.map(|&l| if l != 0 { MASK_FOREGROUND } else { MASK_BACKGROUND })
    }
}

/// 按 6-相邻规则标记 `mask` 中所有前景 (非零) 连通分量.
///
/// 标签按照行优先遍历时首次遇到的顺序从 1 开始编号.
pub fn label_components(mask: &Mask) -> Components {
    let mut labels = LabelMap::from_elem(*mask.geometry(), 0);
    let mut sizes = Vec::new();
    let mut bfs_q = VecDeque::with_capacity(64);

    for (pos, _) in mask.data().indexed_iter().filter(|(_, p)| is_foreground(**p)) {
        if labels[pos] != 0 {
            continue;
        }
        let label = sizes.len() as u32 + 1;
        let mut size = 0usize;
        labels[pos] = label;
        bfs_q.push_back(pos);
        while let Some(cur) = bfs_q.pop_front() {
            size += 1;
            for neigh in mask.diamond_neighbours(cur) {
                if is_foreground(mask[neigh]) && labels[neigh] == 0 {
                    labels[neigh] = label;
                    bfs_q.push_back(neigh);
                }
            }
        }
        sizes.push(size);
    }

    Components { labels, sizes }
}

/// 按体素个数降序重新编号, 使标签 1 总是最大的分量. 体素个数相同的分量保持原有顺序.
///
/// 体素个数小于 `min_size` 的分量被并入背景.
pub fn relabel_by_size(components: &Components, min_size: usize) -> Components {
    let mut order: Vec<usize> = (0..components.len()).collect();
    order.sort_by_key(|i| Reverse(components.sizes[*i]));

    let mut mapping = vec![0u32; components.len() + 1];
    let mut sizes = Vec::with_capacity(order.len());
    for old in order.into_iter().filter(|i| components.sizes[*i] >= min_size) {
        sizes.push(components.sizes[old]);
        mapping[old + 1] = sizes.len() as u32;
    }

    Components {
        labels: components.labels.map(|&l| mapping[l as usize]),
        sizes,
    }
}

/// 只保留标签为 `label` 的分量, 返回二值掩膜.
pub fn keep_label(components: &Components, label: u32) -> Mask {
    components
        .labels
        .map(|&l| if l != 0 && l == label { MASK_FOREGROUND } else { MASK_BACKGROUND })
}

/// 只保留 `mask` 中最大的 6-连通前景分量. 若不存在前景, 返回全背景掩膜.
pub fn keep_largest(mask: &Mask) -> Mask {
    keep_label(&relabel_by_size(&label_components(mask), 0), 1)
}
