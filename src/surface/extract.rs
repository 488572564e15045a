use ndarray::{Array2, ArrayView1, Zip};
use serde::{Deserialize, Serialize};

use crate::utils::voxel_grid::VolumetricField;

/// 列中没有零值样本（材料贯穿整个深度）时的取值策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoCrossing {
    /// 记为 0，与表面恰好位于深度 0 的列无法区分
    #[default]
    Zero,
    /// 记为 Nz，即表面位于最后一层之下
    Bottom,
}

/// 沿 z 方向第一个精确等于零的样本索引
pub fn first_zero(column: ArrayView1<'_, f64>) -> Option<usize> {
    column.iter().position(|&value| value == 0.0)
}

/// 表面高度索引图，shape (Ny, Nx)
/// 每个元素是该列第一个零值样本的 z 索引，没有零值时为 None
#[derive(Debug, Clone, PartialEq)]
pub struct HeightIndexMap {
    indices: Array2<Option<usize>>,
    /// 扫描深度 Nz
    depth: usize,
}

impl HeightIndexMap {
    pub fn from_indices(indices: Array2<Option<usize>>, depth: usize) -> Self {
        Self { indices, depth }
    }

    /// (Ny, Nx)
    pub fn shape(&self) -> (usize, usize) {
        self.indices.dim()
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn get(&self, iy: usize, ix: usize) -> Option<usize> {
        self.indices.get((iy, ix)).copied().flatten()
    }

    pub fn indices(&self) -> &Array2<Option<usize>> {
        &self.indices
    }

    /// 没有零值样本的列数
    pub fn no_crossing_count(&self) -> usize {
        self.indices.iter().filter(|index| index.is_none()).count()
    }

    /// 转换为实数索引图，按策略填充没有零值的列
    pub fn to_depths(&self, policy: NoCrossing) -> Array2<f64> {
        let fallback = match policy {
            NoCrossing::Zero => 0.0,
            NoCrossing::Bottom => self.depth as f64,
        };
        self.indices
            .mapv(|index| index.map_or(fallback, |iz| iz as f64))
    }
}

/// 表面提取器：逐列沿 z 扫描，取第一个零值样本
/// 各列相互独立，parallel 时按行并行，结果与顺序扫描一致
#[derive(Debug, Clone, Copy)]
pub struct SurfaceExtractor {
    parallel: bool,
}

impl SurfaceExtractor {
    pub fn new(parallel: bool) -> Self {
        Self { parallel }
    }

    pub fn extract(&self, field: &VolumetricField) -> HeightIndexMap {
        let [nz, ny, nx] = field.shape();
        let mut indices = Array2::from_elem((ny, nx), None);

        let zip = Zip::indexed(&mut indices);
        if self.parallel {
            zip.par_for_each(|(iy, ix), slot| *slot = first_zero(field.column(iy, ix)));
        } else {
            zip.for_each(|(iy, ix), slot| *slot = first_zero(field.column(iy, ix)));
        }

        HeightIndexMap { indices, depth: nz }
    }
}

impl Default for SurfaceExtractor {
    fn default() -> Self {
        Self::new(true)
    }
}
