use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use actix_web::{App, HttpServer, web};
use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use surface_roughness::app_state::AppState;
use surface_roughness::config::{AnalysisConfig, GridConfig, ServerConfig};
use surface_roughness::pipeline::{AnalysisMode, AnalysisReport, SurfacePipeline};
use surface_roughness::routes;
use surface_roughness::task::TaskStore;
use surface_roughness::utils::parser_registry::ParserRegistry;

#[derive(Parser, Debug)]
#[command(name = "surface-roughness")]
#[command(about = "从体素场提取表面高度图，计算粗糙度 Ra / Rq 并绘制高度图")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 只计算平均高度与粗糙度
    Stats {
        #[command(flatten)]
        input: InputArgs,
        /// 以 JSON 输出结果
        #[arg(long)]
        json: bool,
    },
    /// 只绘制高度图
    Plot {
        #[command(flatten)]
        input: InputArgs,
        /// 输出 PNG 路径（覆盖配置）
        #[arg(short, long)]
        output: Option<String>,
    },
    /// 计算粗糙度并绘制高度图
    Analyze {
        #[command(flatten)]
        input: InputArgs,
        #[arg(short, long)]
        output: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// 启动 HTTP 服务
    Serve {
        /// 服务配置文件 (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,
        #[arg(long)]
        resource_dir: Option<String>,
        #[arg(long)]
        host: Option<String>,
        #[arg(long)]
        port: Option<u16>,
    },
}

#[derive(Args, Debug)]
struct InputArgs {
    /// 分析配置文件 (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// 输入的 VTK 文件（覆盖配置）
    #[arg(short, long)]
    file: Option<String>,
    #[arg(long)]
    nx: Option<usize>,
    #[arg(long)]
    ny: Option<usize>,
    #[arg(long)]
    nz: Option<usize>,
    /// 每个格子的物理长度
    #[arg(long)]
    dl: Option<f64>,
    #[arg(long)]
    unit: Option<String>,
    /// 翻转行顺序
    #[arg(long, conflicts_with = "keep_rows")]
    flip_rows: bool,
    /// 保持源网格的行顺序
    #[arg(long)]
    keep_rows: bool,
}

impl InputArgs {
    fn into_config(self) -> Result<AnalysisConfig> {
        let mut config = match &self.config {
            Some(path) => AnalysisConfig::from_file(path)
                .with_context(|| format!("无法加载配置文件 {}", path.display()))?,
            None => {
                let (Some(nx), Some(ny), Some(nz), Some(dl)) = (self.nx, self.ny, self.nz, self.dl)
                else {
                    bail!("未提供配置文件时必须指定 --nx --ny --nz --dl");
                };
                AnalysisConfig::new(String::new(), GridConfig::new(nx, ny, nz, dl))
            }
        };

        if let Some(file) = self.file {
            config.file = file;
        }
        if let Some(nx) = self.nx {
            config.grid.nx = nx;
        }
        if let Some(ny) = self.ny {
            config.grid.ny = ny;
        }
        if let Some(nz) = self.nz {
            config.grid.nz = nz;
        }
        if let Some(dl) = self.dl {
            config.grid.dl = dl;
        }
        if let Some(unit) = self.unit {
            config.grid.unit = unit;
        }
        if self.flip_rows {
            config.surface.flip_rows = Some(true);
        } else if self.keep_rows {
            config.surface.flip_rows = Some(false);
        }
        Ok(config)
    }
}

/// 初始化日志，RUST_LOG 可覆盖默认过滤器
/// 日志写到 stderr，stdout 只留给结果
fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,surface_roughness=debug"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run_analysis(
    input: InputArgs,
    output: Option<String>,
    mode: AnalysisMode,
    json: bool,
) -> Result<()> {
    let mut config = input.into_config()?;
    if let Some(output) = output {
        config.render.output = output;
    }
    config.log_summary();

    let unit = config.grid.unit.clone();
    let pipeline = SurfacePipeline::new(config).context("配置校验失败")?;
    let registry = ParserRegistry::new();
    let analysis = pipeline
        .run_file(&registry, mode)
        .with_context(|| format!("分析 {} 失败", pipeline.config().file))?;

    let report = analysis.report(&unit);
    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &AnalysisReport) {
    println!("点数: {}", report.point_count);
    if report.no_crossing_columns > 0 {
        println!("无零值样本的列: {}", report.no_crossing_columns);
    }
    if let Some(roughness) = &report.roughness {
        println!("平均高度 ({}): {}", report.unit, roughness.mean);
        println!("表面粗糙度 Ra ({}): {}", report.unit, roughness.ra);
        println!("表面粗糙度 Rq ({}²): {}", report.unit, roughness.rq);
    }
    if let Some(image) = &report.image {
        println!("高度图: {}", image);
    }
}

async fn run_server(config: ServerConfig) -> std::io::Result<()> {
    // 初始化解析器注册表
    let parser_registry = Arc::new(ParserRegistry::new());

    info!("已注册的解析器:");
    for ext in parser_registry.supported_extensions() {
        info!("  - .{}", ext);
    }

    let task_store = Arc::new(TaskStore::with_ttl(Duration::from_secs(
        config.task_ttl_minutes * 60,
    )));
    let app_state = web::Data::new(AppState {
        parser_registry,
        resource_dir: config.resource_dir.clone(),
        task_store: task_store.clone(),
    });

    // 启动后台清理任务：定期清理过期的任务
    let cleanup_store = task_store.clone();
    let cleanup_interval = Duration::from_secs(config.cleanup_interval_minutes * 60);
    actix_web::rt::spawn(async move {
        let mut interval = actix_web::rt::time::interval(cleanup_interval);
        loop {
            interval.tick().await;
            let cleaned_count = cleanup_store.cleanup_expired();
            if cleaned_count > 0 {
                info!(
                    "[清理任务] 清理了 {} 个过期任务，当前剩余: {} 个任务",
                    cleaned_count,
                    cleanup_store.task_count()
                );
            }
        }
    });

    info!("服务器启动在 http://{}:{}", config.host, config.port);
    info!("资源目录: {}", config.resource_dir);
    info!("任务 TTL: {} 分钟", task_store.default_ttl().as_secs() / 60);

    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .configure(routes::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Command::Stats { input, json } => run_analysis(input, None, AnalysisMode::Statistics, json),
        Command::Plot { input, output } => run_analysis(input, output, AnalysisMode::Render, false),
        Command::Analyze {
            input,
            output,
            json,
        } => run_analysis(input, output, AnalysisMode::Full, json),
        Command::Serve {
            config,
            resource_dir,
            host,
            port,
        } => {
            let mut server_config = match config {
                Some(path) => ServerConfig::from_file(&path)
                    .with_context(|| format!("无法加载服务配置 {}", path.display()))?,
                None => ServerConfig::default(),
            };
            if let Some(resource_dir) = resource_dir {
                server_config.resource_dir = resource_dir;
            }
            if let Some(host) = host {
                server_config.host = host;
            }
            if let Some(port) = port {
                server_config.port = port;
            }

            actix_web::rt::System::new()
                .block_on(run_server(server_config))
                .context("HTTP 服务异常退出")
        }
    }
}
