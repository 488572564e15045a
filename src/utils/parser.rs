use tracing::warn;

use crate::config::GridConfig;
use crate::error::Result;
use crate::utils::voxel_grid::VolumetricField;

/// 从文件读出的点标量数组（尚未按声明维度重塑）
#[derive(Debug, Clone)]
pub struct PointScalars {
    /// 标量数组名称
    pub name: String,
    /// 文件中声明的维度 [nx, ny, nz]
    pub dimensions: [usize; 3],
    pub values: Vec<f64>,
}

impl PointScalars {
    pub fn point_count(&self) -> usize {
        self.values.len()
    }

    /// 按调用方声明的维度重塑为体素网格
    /// 点数必须等于 Nx·Ny·Nz，否则返回 DimensionMismatch
    pub fn into_field(self, grid: &GridConfig) -> Result<VolumetricField> {
        let declared = [grid.nx, grid.ny, grid.nz];
        if self.dimensions != declared {
            warn!(
                "文件声明的 DIMENSIONS {:?} 与配置 [nx, ny, nz] = {:?} 不一致，按配置重塑",
                self.dimensions, declared
            );
        }
        VolumetricField::new(grid.dims(), self.values)
    }
}

/// 文件头元数据
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldHeader {
    /// 文件中声明的维度 [nx, ny, nz]
    pub dimensions: [usize; 3],
    /// 点数据数量
    pub point_count: usize,
}

/// 体素网格解析器 trait
/// 不同文件格式需要实现这个 trait
pub trait VoxelGridParser: Send + Sync {
    /// 获取支持的文件扩展名（不含点号），例如: "vtk"
    fn supported_extensions(&self) -> Vec<&'static str>;

    /// 检查文件扩展名是否被支持
    fn supports(&self, extension: &str) -> bool {
        self.supported_extensions()
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }

    /// 从文件路径解析点标量数据
    fn parse_from_file(&self, file_path: &str) -> Result<PointScalars>;

    /// 快速获取文件头（只读取元数据，不解析完整数据）
    /// 用于在解析之前校验声明的维度
    fn header_from_file(&self, file_path: &str) -> Result<FieldHeader>;

    /// 获取解析器名称（用于日志和错误信息）
    fn name(&self) -> &'static str;
}
