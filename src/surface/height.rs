use ndarray::{Array2, s};

use crate::error::{Error, Result};
use crate::surface::extract::{HeightIndexMap, NoCrossing};

/// 物理高度图，shape (Ny, Nx)
#[derive(Debug, Clone, PartialEq)]
pub struct HeightMap {
    heights: Array2<f64>,
}

impl HeightMap {
    pub fn new(heights: Array2<f64>) -> Result<Self> {
        if heights.is_empty() {
            return Err(Error::config("高度图不能为空"));
        }
        Ok(Self { heights })
    }

    pub fn heights(&self) -> &Array2<f64> {
        &self.heights
    }

    /// (Ny, Nx)
    pub fn shape(&self) -> (usize, usize) {
        self.heights.dim()
    }

    pub fn len(&self) -> usize {
        self.heights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heights.is_empty()
    }

    /// 行 iy 与行 Ny-1-iy 互换
    pub fn flip_rows(&self) -> Self {
        Self {
            heights: self.heights.slice(s![..;-1, ..]).to_owned(),
        }
    }

    /// 列 ix 与列 Nx-1-ix 互换
    pub fn flip_cols(&self) -> Self {
        Self {
            heights: self.heights.slice(s![.., ..;-1]).to_owned(),
        }
    }

    /// 最小值与最大值（忽略 NaN）
    pub fn min_max(&self) -> (f64, f64) {
        self.heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            })
    }

    /// 按行优先顺序展开
    pub fn to_row_major_vec(&self) -> Vec<f64> {
        self.heights.iter().copied().collect()
    }
}

/// 把高度索引图换算成物理高度：height = index × dL
/// flip_rows 修正源网格行方向与显示约定之间的差异
#[derive(Debug, Clone, Copy)]
pub struct HeightMapper {
    dl: f64,
    flip_rows: bool,
    no_crossing: NoCrossing,
}

impl HeightMapper {
    pub fn new(dl: f64, flip_rows: bool) -> Self {
        Self {
            dl,
            flip_rows,
            no_crossing: NoCrossing::default(),
        }
    }

    pub fn with_no_crossing(mut self, no_crossing: NoCrossing) -> Self {
        self.no_crossing = no_crossing;
        self
    }

    pub fn map(&self, indices: &HeightIndexMap) -> HeightMap {
        let map = HeightMap {
            heights: indices.to_depths(self.no_crossing) * self.dl,
        };
        if self.flip_rows { map.flip_rows() } else { map }
    }
}
