//! 表面分析流程的统一入口
//!
//! 同一条流程服务两类调用：只计算粗糙度统计、只绘制高度图，或两者都做。
//! 行翻转是配置项，不是两套算法。

use std::path::PathBuf;
use std::time::Instant;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{Error, Result};
use crate::render::HeightMapRenderer;
use crate::surface::{
    HeightIndexMap, HeightMap, HeightMapper, RoughnessResult, SurfaceExtractor, analyze,
};
use crate::utils::parser_registry::ParserRegistry;
use crate::utils::voxel_grid::VolumetricField;

/// 高度图的下游消费者
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisMode {
    /// 只计算粗糙度
    Statistics,
    /// 只绘图
    Render,
    /// 统计并绘图
    Full,
}

impl AnalysisMode {
    pub fn computes_statistics(self) -> bool {
        matches!(self, AnalysisMode::Statistics | AnalysisMode::Full)
    }

    pub fn renders(self) -> bool {
        matches!(self, AnalysisMode::Render | AnalysisMode::Full)
    }

    /// 未配置 flip_rows 时的默认值：绘图需要与物理场景方向一致
    /// 统计量对行置换不变，因此不翻转
    pub fn default_flip_rows(self) -> bool {
        self.renders()
    }
}

/// 一次分析的全部输出
#[derive(Debug, Clone)]
pub struct SurfaceAnalysis {
    pub point_count: usize,
    pub index_map: HeightIndexMap,
    pub height_map: HeightMap,
    pub roughness: Option<RoughnessResult>,
    pub rendered: Option<PathBuf>,
}

impl SurfaceAnalysis {
    pub fn report(&self, unit: &str) -> AnalysisReport {
        AnalysisReport {
            point_count: self.point_count,
            shape: [self.height_map.shape().0, self.height_map.shape().1],
            no_crossing_columns: self.index_map.no_crossing_count(),
            unit: unit.to_string(),
            roughness: self.roughness,
            image: self
                .rendered
                .as_ref()
                .map(|path| path.display().to_string()),
        }
    }
}

/// 面向用户的分析摘要
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub point_count: usize,
    /// [ny, nx]
    pub shape: [usize; 2],
    pub no_crossing_columns: usize,
    pub unit: String,
    #[serde(flatten)]
    pub roughness: Option<RoughnessResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// 表面分析流程，持有已校验的配置
pub struct SurfacePipeline {
    config: AnalysisConfig,
}

impl SurfacePipeline {
    /// 校验配置；之后的所有数组操作都基于这份配置
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// 读取配置中的文件并按声明维度重塑
    /// 先只读取文件头校验点数，维度不一致时不解析数据
    pub fn load_field(&self, registry: &ParserRegistry) -> Result<VolumetricField> {
        let file = self.config.file.as_str();
        let grid = &self.config.grid;
        let parser = registry.parser_for_file(file)?;

        let header = parser.header_from_file(file)?;
        if header.point_count != grid.point_count() {
            return Err(Error::DimensionMismatch {
                declared: grid.dims(),
                expected: grid.point_count(),
                actual: header.point_count,
            });
        }

        let parse_start = Instant::now();
        let scalars = parser.parse_from_file(file)?;
        info!(
            "[解析] {} 读取 {} 个点 (标量 '{}', 解析器 {})，耗时 {:.2}ms",
            file,
            scalars.point_count(),
            scalars.name,
            parser.name(),
            parse_start.elapsed().as_secs_f64() * 1000.0
        );

        scalars.into_field(grid)
    }

    /// 提取高度索引图并换算成物理高度
    pub fn height_map(&self, field: &VolumetricField, flip_rows: bool) -> Result<(HeightIndexMap, HeightMap)> {
        let grid = &self.config.grid;
        if field.shape() != grid.dims() {
            return Err(Error::DimensionMismatch {
                declared: grid.dims(),
                expected: grid.point_count(),
                actual: field.point_count(),
            });
        }

        let surface = &self.config.surface;
        let index_map = SurfaceExtractor::new(surface.parallel).extract(field);

        let missing = index_map.no_crossing_count();
        if missing > 0 {
            warn!(
                "{} 列没有零值样本，按 {:?} 策略取值",
                missing, surface.no_crossing
            );
        }

        let height_map = HeightMapper::new(grid.dl, flip_rows)
            .with_no_crossing(surface.no_crossing)
            .map(&index_map);
        debug!("高度图 {:?}, flip_rows={}", height_map.shape(), flip_rows);

        Ok((index_map, height_map))
    }

    /// 对已加载的体素场运行流程
    pub fn run(&self, field: &VolumetricField, mode: AnalysisMode) -> Result<SurfaceAnalysis> {
        // 绘图配置在提取之前校验，统计模式不关心 render 段
        let renderer = if mode.renders() {
            Some(HeightMapRenderer::new(&self.config.render)?)
        } else {
            None
        };

        let flip_rows = self.config.surface.flip_rows_or(mode.default_flip_rows());
        let (index_map, height_map) = self.height_map(field, flip_rows)?;

        let roughness = mode.computes_statistics().then(|| analyze(&height_map));
        if let Some(result) = &roughness {
            let unit = &self.config.grid.unit;
            debug!(
                "mean={} {unit}, Ra={} {unit}, Rq={} {unit}²",
                result.mean, result.ra, result.rq
            );
        }

        let rendered = match renderer {
            Some(renderer) => {
                let output = PathBuf::from(&self.config.render.output);
                renderer.render(&height_map, &self.config.grid.unit, &output)?;
                Some(output)
            }
            None => None,
        };

        Ok(SurfaceAnalysis {
            point_count: field.point_count(),
            index_map,
            height_map,
            roughness,
            rendered,
        })
    }

    /// 读取文件并运行流程
    pub fn run_file(&self, registry: &ParserRegistry, mode: AnalysisMode) -> Result<SurfaceAnalysis> {
        let field = self.load_field(registry)?;
        self.run(&field, mode)
    }
}
