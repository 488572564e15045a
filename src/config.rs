use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::surface::NoCrossing;

/// 网格配置：维度与每个格子的物理长度
/// 这些值由调用方声明，不从文件读取
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GridConfig {
    pub nx: usize,
    pub ny: usize,
    pub nz: usize,
    /// 每个格子的物理长度（与 unit 同单位）
    pub dl: f64,
    #[serde(default = "default_unit")]
    pub unit: String,
}

fn default_unit() -> String {
    "um".to_string()
}

impl GridConfig {
    pub fn new(nx: usize, ny: usize, nz: usize, dl: f64) -> Self {
        Self {
            nx,
            ny,
            nz,
            dl,
            unit: default_unit(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.nx == 0 || self.ny == 0 || self.nz == 0 {
            return Err(Error::config(format!(
                "网格维度必须为正 (nx={}, ny={}, nz={})",
                self.nx, self.ny, self.nz
            )));
        }
        if self.checked_point_count().is_none() {
            return Err(Error::config(format!(
                "网格点数溢出 (nx={}, ny={}, nz={})",
                self.nx, self.ny, self.nz
            )));
        }
        // dl = 0 合法，得到全零高度图
        if !self.dl.is_finite() || self.dl < 0.0 {
            return Err(Error::config(format!(
                "格子长度必须是非负有限数, 得到 {}",
                self.dl
            )));
        }
        Ok(())
    }

    /// 数组维度 [nz, ny, nx]
    pub fn dims(&self) -> [usize; 3] {
        [self.nz, self.ny, self.nx]
    }

    /// Nx·Ny·Nz，溢出时为 None
    pub fn checked_point_count(&self) -> Option<usize> {
        self.nx.checked_mul(self.ny)?.checked_mul(self.nz)
    }

    /// 溢出时饱和到 usize::MAX；validate 之后总是精确值
    pub fn point_count(&self) -> usize {
        self.checked_point_count().unwrap_or(usize::MAX)
    }
}

/// 表面提取与高度映射配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SurfaceConfig {
    /// 是否翻转行顺序（修正源网格与显示约定的 y 方向差异）
    /// 未设置时由调用路径决定：统计默认不翻转，绘图默认翻转
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flip_rows: Option<bool>,
    #[serde(default)]
    pub no_crossing: NoCrossing,
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

fn default_parallel() -> bool {
    true
}

impl Default for SurfaceConfig {
    fn default() -> Self {
        Self {
            flip_rows: None,
            no_crossing: NoCrossing::default(),
            parallel: default_parallel(),
        }
    }
}

impl SurfaceConfig {
    pub fn flip_rows_or(&self, default: bool) -> bool {
        self.flip_rows.unwrap_or(default)
    }
}

pub const COLORMAPS: [&str; 7] = [
    "viridis", "magma", "inferno", "plasma", "cividis", "turbo", "rd_yl_bu",
];

/// 高度图渲染配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RenderConfig {
    #[serde(default = "default_output")]
    pub output: String,
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_colormap")]
    pub colormap: String,
}

fn default_output() -> String {
    "surface_height.png".to_string()
}

fn default_width() -> u32 {
    1200
}

fn default_height() -> u32 {
    700
}

fn default_colormap() -> String {
    "viridis".to_string()
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            width: default_width(),
            height: default_height(),
            colormap: default_colormap(),
        }
    }
}

impl RenderConfig {
    pub fn validate(&self) -> Result<()> {
        // 右侧色标占用 160 像素
        if self.width <= 200 || self.height <= 100 {
            return Err(Error::config(format!(
                "图像尺寸过小 (width={}, height={})",
                self.width, self.height
            )));
        }
        if !COLORMAPS.contains(&self.colormap.as_str()) {
            return Err(Error::config(format!(
                "无效的 colormap '{}'，可选: {:?}",
                self.colormap, COLORMAPS
            )));
        }
        if self.output.trim().is_empty() {
            return Err(Error::config("输出文件名不能为空"));
        }
        Ok(())
    }
}

/// 完整的分析配置，在任何数组操作之前校验一次
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisConfig {
    #[serde(default)]
    pub file: String,
    pub grid: GridConfig,
    #[serde(default)]
    pub surface: SurfaceConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl AnalysisConfig {
    pub fn new(file: impl Into<String>, grid: GridConfig) -> Self {
        Self {
            file: file.into(),
            grid,
            surface: SurfaceConfig::default(),
            render: RenderConfig::default(),
        }
    }

    /// 从 TOML 文件加载配置（不做校验，允许命令行覆盖后再校验）
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::config(format!("无法解析配置文件 '{}': {}", path.display(), e)))
    }

    /// 校验输入文件与网格；render 段只在绘图时由 HeightMapRenderer 校验
    pub fn validate(&self) -> Result<()> {
        if self.file.trim().is_empty() {
            return Err(Error::config("未指定输入文件"));
        }
        self.grid.validate()
    }

    pub fn log_summary(&self) {
        info!("输入文件: {}", self.file);
        info!(
            "网格: {} x {} x {} (dL = {} {})",
            self.grid.nx, self.grid.ny, self.grid.nz, self.grid.dl, self.grid.unit
        );
        info!(
            "表面: flip_rows={:?}, no_crossing={:?}, parallel={}",
            self.surface.flip_rows, self.surface.no_crossing, self.surface.parallel
        );
    }
}

/// HTTP 服务配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_resource_dir")]
    pub resource_dir: String,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 任务过期时间（分钟）
    #[serde(default = "default_task_ttl")]
    pub task_ttl_minutes: u64,
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_minutes: u64,
}

fn default_resource_dir() -> String {
    "test/resource".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_task_ttl() -> u64 {
    30
}

fn default_cleanup_interval() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dir: default_resource_dir(),
            host: default_host(),
            port: default_port(),
            task_ttl_minutes: default_task_ttl(),
            cleanup_interval_minutes: default_cleanup_interval(),
        }
    }
}

impl ServerConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: ServerConfig = toml::from_str(&content)
            .map_err(|e| Error::config(format!("无法解析配置文件 '{}': {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.task_ttl_minutes == 0 || self.cleanup_interval_minutes == 0 {
            return Err(Error::config("任务 TTL 与清理间隔必须为正"));
        }
        Ok(())
    }
}
