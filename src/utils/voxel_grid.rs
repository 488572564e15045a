use ndarray::{Array3, ArrayView1, s};

use crate::error::{Error, Result};

/// 体素网格数据结构
/// 表示三维规则网格上的二值相标量场，按 (z, y, x) 索引
/// 创建后只读
#[derive(Debug, Clone)]
pub struct VolumetricField {
    data: Array3<f64>,
}

impl VolumetricField {
    /// 从扁平数据创建体素网格
    /// dims: [nz, ny, nx]
    /// 数据按 VTK 点顺序存储 (x变化最快，y其次，z最慢)
    /// 索引计算: index = iz * nx * ny + iy * nx + ix
    pub fn new(dims: [usize; 3], data: Vec<f64>) -> Result<Self> {
        let expected = dims[0]
            .checked_mul(dims[1])
            .and_then(|n| n.checked_mul(dims[2]))
            .ok_or_else(|| Error::config(format!("网格维度 {:?} 的点数溢出", dims)))?;

        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                declared: dims,
                expected,
                actual: data.len(),
            });
        }

        let data = Array3::from_shape_vec((dims[0], dims[1], dims[2]), data)
            .map_err(|e| Error::parse(format!("无法重塑数据: {}", e)))?;

        Ok(Self { data })
    }

    pub fn from_array(data: Array3<f64>) -> Self {
        Self { data }
    }

    /// 获取 shape [nz, ny, nx]
    pub fn shape(&self) -> [usize; 3] {
        let (nz, ny, nx) = self.data.dim();
        [nz, ny, nx]
    }

    pub fn point_count(&self) -> usize {
        self.data.len()
    }

    /// (iy, ix) 处沿 z 方向的一列
    pub fn column(&self, iy: usize, ix: usize) -> ArrayView1<'_, f64> {
        self.data.slice(s![.., iy, ix])
    }

    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }
}
