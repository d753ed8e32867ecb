//! 粗检测：包围盒重叠
//!
//! 沿 X 轴排序后扫描（sort and sweep），只对 X 区间重叠的节点做完整的 AABB 相交测试。

use crate::math::Point3;
use parry3d::bounding_volume::{Aabb, BoundingVolume};

/// 由 f64 角点构造 parry 的 AABB
pub fn aabb_from_corners(mins: &Point3, maxs: &Point3) -> Aabb {
    Aabb::new(mins.cast::<f32>(), maxs.cast::<f32>())
}

/// 粗检测
pub struct BroadPhase;

impl BroadPhase {
    /// 所有包围盒重叠的节点对
    ///
    /// 包围盒先各自外扩 `margin`，使刚好贴合的零件也被视为相交。
    /// 每一对只出现一次，顺序与输入顺序一致（前者在输入中靠前）。
    pub fn overlapping_pairs<N: Clone>(items: &[(N, Aabb)], margin: f64) -> Vec<(N, N)> {
        let margin = margin as f32;
        let mut order: Vec<(usize, Aabb)> = items
            .iter()
            .enumerate()
            .map(|(i, (_, aabb))| (i, aabb.loosened(margin)))
            .collect();
        order.sort_by(|a, b| a.1.mins.x.total_cmp(&b.1.mins.x));

        let mut pairs = Vec::new();
        for (pos, (i, aabb_i)) in order.iter().enumerate() {
            for (j, aabb_j) in &order[pos + 1..] {
                if aabb_j.mins.x > aabb_i.maxs.x {
                    break;
                }
                if aabb_i.intersects(aabb_j) {
                    let (first, second) = if i < j { (*i, *j) } else { (*j, *i) };
                    pairs.push((items[first].0.clone(), items[second].0.clone()));
                }
            }
        }
        tracing::trace!("Broad phase: {} items, {} overlapping pairs", items.len(), pairs.len());
        pairs
    }

    /// 与 `query` 重叠的节点
    pub fn overlapping_with<N: Clone>(items: &[(N, Aabb)], query: &Aabb, margin: f64) -> Vec<N> {
        let query = query.loosened(margin as f32);
        items
            .iter()
            .filter(|(_, aabb)| query.intersects(aabb))
            .map(|(n, _)| n.clone())
            .collect()
    }
}
