//! 表面提取与粗糙度统计
//!
//! 体素场 (Nz, Ny, Nx) → 高度索引图 (Ny, Nx) → 物理高度图 → Ra / Rq

pub mod extract;
pub mod height;
pub mod roughness;

pub use extract::{HeightIndexMap, NoCrossing, SurfaceExtractor, first_zero};
pub use height::{HeightMap, HeightMapper};
pub use roughness::{RoughnessResult, analyze};
