use serde::{Deserialize, Serialize};

use crate::surface::height::HeightMap;

/// 粗糙度统计结果
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoughnessResult {
    /// 平均高度
    pub mean: f64,
    /// 平均绝对偏差 (1/N) Σ |h - mean|
    pub ra: f64,
    /// 平均平方偏差 (1/N) Σ (h - mean)²，没有开平方
    pub rq: f64,
}

impl RoughnessResult {
    /// 常规意义上的均方根粗糙度 √Rq
    pub fn rq_root(&self) -> f64 {
        self.rq.sqrt()
    }
}

/// 计算平均高度、Ra 与 Rq
/// NaN/Inf 不做特殊处理，会传播到结果中
pub fn analyze(map: &HeightMap) -> RoughnessResult {
    let heights = map.heights();
    let n = heights.len() as f64;
    let mean = heights.sum() / n;

    let (abs_sum, sq_sum) = heights.iter().fold((0.0, 0.0), |(abs_sum, sq_sum), &h| {
        let delta = h - mean;
        (abs_sum + delta.abs(), sq_sum + delta * delta)
    });

    RoughnessResult {
        mean,
        ra: abs_sum / n,
        rq: sq_sum / n,
    }
}
