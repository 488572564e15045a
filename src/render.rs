use std::path::Path;

use colorgrad::Gradient;
use plotters::prelude::*;
use tracing::{info, warn};

use crate::config::RenderConfig;
use crate::error::{Error, Result};
use crate::surface::HeightMap;

/// 右侧色标区域宽度（像素）
const LEGEND_WIDTH: u32 = 160;
const LEGEND_STEPS: usize = 256;

fn render_err<E: std::fmt::Display>(err: E) -> Error {
    Error::Render(err.to_string())
}

/// 系统中能否找到绘制文字所需的字体
fn fonts_available() -> bool {
    ("sans-serif", 12).into_font().box_size("0").is_ok()
}

fn gradient_by_name(name: &str) -> Result<Box<dyn Gradient>> {
    let gradient: Box<dyn Gradient> = match name {
        "viridis" => Box::new(colorgrad::preset::viridis()),
        "magma" => Box::new(colorgrad::preset::magma()),
        "inferno" => Box::new(colorgrad::preset::inferno()),
        "plasma" => Box::new(colorgrad::preset::plasma()),
        "cividis" => Box::new(colorgrad::preset::cividis()),
        "turbo" => Box::new(colorgrad::preset::turbo()),
        "rd_yl_bu" => Box::new(colorgrad::preset::rd_yl_bu()),
        other => return Err(Error::config(format!("未知 colormap '{}'", other))),
    };
    Ok(gradient)
}

/// 高度图渲染器：伪彩色栅格 + 色标，隐藏坐标轴
pub struct HeightMapRenderer {
    width: u32,
    height: u32,
    gradient: Box<dyn Gradient>,
}

impl HeightMapRenderer {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            width: config.width,
            height: config.height,
            gradient: gradient_by_name(&config.colormap)?,
        })
    }

    /// 绘制高度图到 PNG 文件，行 0 位于图像顶部
    pub fn render(&self, map: &HeightMap, unit: &str, output: &Path) -> Result<()> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let labelled = fonts_available();
        if !labelled {
            warn!("找不到可用字体，高度图将不绘制标题与色标刻度");
        }

        let root = BitMapBackend::new(output, (self.width, self.height)).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        let root = if labelled {
            root.titled(&format!("The Surface Height Plot ({})", unit), ("sans-serif", 28))
                .map_err(render_err)?
        } else {
            root
        };
        let (map_area, legend_area) = root.split_horizontally((self.width - LEGEND_WIDTH) as i32);

        let (ny, nx) = map.shape();
        let (lo, hi) = color_range(map);
        let heights = map.heights();

        let mut chart = ChartBuilder::on(&map_area)
            .margin(10)
            .build_cartesian_2d(0..nx, 0..ny)
            .map_err(render_err)?;

        chart
            .draw_series((0..ny).flat_map(|iy| (0..nx).map(move |ix| (iy, ix))).map(
                |(iy, ix)| {
                    let color = self.value_to_color(heights[[iy, ix]], lo, hi);
                    Rectangle::new([(ix, ny - 1 - iy), (ix + 1, ny - iy)], color.filled())
                },
            ))
            .map_err(render_err)?;

        let mut legend = ChartBuilder::on(&legend_area)
            .margin(20)
            .y_label_area_size(if labelled { 70 } else { 0 })
            .build_cartesian_2d(0.0..1.0, lo..hi)
            .map_err(render_err)?;

        if labelled {
            legend
                .configure_mesh()
                .disable_mesh()
                .disable_x_axis()
                .y_labels(8)
                .y_label_formatter(&|v| format!("{:.2}", v))
                .draw()
                .map_err(render_err)?;
        }

        let step = (hi - lo) / LEGEND_STEPS as f64;
        legend
            .draw_series((0..LEGEND_STEPS).map(|i| {
                let v0 = lo + step * i as f64;
                let color = self.value_to_color(v0 + step / 2.0, lo, hi);
                Rectangle::new([(0.0, v0), (1.0, v0 + step)], color.filled())
            }))
            .map_err(render_err)?;

        root.present().map_err(render_err)?;
        info!("已保存高度图: {}", output.display());
        Ok(())
    }

    fn value_to_color(&self, value: f64, min_val: f64, max_val: f64) -> RGBColor {
        let normalized = if max_val > min_val {
            (value - min_val) / (max_val - min_val)
        } else {
            0.5
        };
        let normalized = normalized.clamp(0.0, 1.0);
        let color_rgba = self.gradient.at(normalized as f32).to_rgba8();
        RGBColor(color_rgba[0], color_rgba[1], color_rgba[2])
    }
}

/// 色标范围；常数高度图向两侧扩展 0.5，避免空区间
fn color_range(map: &HeightMap) -> (f64, f64) {
    let (min, max) = map.min_max();
    if !min.is_finite() || !max.is_finite() {
        (0.0, 1.0)
    } else if max > min {
        (min, max)
    } else {
        (min - 0.5, max + 0.5)
    }
}
