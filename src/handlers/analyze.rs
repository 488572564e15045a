use std::time::Instant;

use actix_web::{HttpResponse, Responder, post, web};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::app_state::AppState;
use crate::config::{AnalysisConfig, GridConfig, RenderConfig, SurfaceConfig};
use crate::error::Error;
use crate::handlers::error_response;
use crate::pipeline::{AnalysisMode, SurfacePipeline};
use crate::surface::NoCrossing;
use crate::task::{AnalysisTask, ChunkDescriptor, split_into_chunks};

#[derive(Deserialize)]
pub struct AnalyzeRequest {
    pub file: String,
    pub grid: GridConfig,
    /// 未指定时翻转行，使高度图与物理场景方向一致
    #[serde(default)]
    pub flip_rows: Option<bool>,
    #[serde(default)]
    pub no_crossing: NoCrossing,
    pub chunk_size: usize,
}

#[derive(Serialize, Clone)]
pub struct AnalyzeResponse {
    pub task_id: String,
    pub file: String,
    pub file_size: u64,
    /// 高度图维度 [ny, nx]
    pub shape: [usize; 2],
    pub data_length: usize,
    pub chunk_size: usize,
    pub chunks: Vec<ChunkDescriptor>,
}

#[post("/surface/analyze")]
pub async fn analyze_surface(
    data: web::Data<AppState>,
    payload: web::Json<AnalyzeRequest>,
) -> impl Responder {
    match run_analyze(data.get_ref(), payload.into_inner()) {
        Ok(resp) => HttpResponse::Ok().json(resp),
        Err(err) => err,
    }
}

/// 创建表面分析任务并启动后台计算
///
/// ## 功能概述
/// 只做轻量级操作后立即返回：
/// 1. 校验请求中的网格配置
/// 2. 查找解析器并读取文件头，校验声明的 Nx·Ny·Nz 与文件点数
/// 3. 按 chunk_size 划分高度图
/// 4. 创建任务（task_id）
/// 5. 在阻塞线程池中解析文件、提取表面并计算粗糙度
///
/// ## 返回
/// - `Ok(AnalyzeResponse)`: 任务已创建，返回 task_id、shape、chunks
/// - `Err(HttpResponse)`: 请求无效或文件不可用
pub fn run_analyze(
    app_state: &AppState,
    request: AnalyzeRequest,
) -> Result<AnalyzeResponse, HttpResponse> {
    // ==================== 步骤 1: 参数验证与文件路径构建 ====================
    let chunk_size = request.chunk_size.max(1);
    let file = request.file;
    if file.split(['/', '\\']).any(|part| part == "..") {
        return Err(HttpResponse::BadRequest().json(serde_json::json!({
            "error": "文件名不能包含上级目录",
            "file": file,
        })));
    }
    let file_path = format!("{}/{}", app_state.resource_dir, file);

    let config = AnalysisConfig {
        file: file_path.clone(),
        grid: request.grid,
        surface: SurfaceConfig {
            flip_rows: Some(request.flip_rows.unwrap_or(true)),
            no_crossing: request.no_crossing,
            parallel: true,
        },
        render: RenderConfig::default(),
    };
    let pipeline = SurfacePipeline::new(config).map_err(|e| error_response(&e, &file))?;
    let grid = pipeline.config().grid.clone();

    // ==================== 步骤 2: 查找解析器 ====================
    let parser = app_state
        .parser_registry
        .parser_for_file(&file_path)
        .map_err(|e| error_response(&e, &file))?;

    // ==================== 步骤 3: 获取文件大小 ====================
    let file_size = std::fs::metadata(&file_path)
        .map_err(|e| error_response(&Error::Io(e), &file))?
        .len();

    // ==================== 步骤 4: 读取文件头并校验点数 ====================
    let header = parser
        .header_from_file(&file_path)
        .map_err(|e| error_response(&e, &file))?;
    if header.point_count != grid.point_count() {
        let err = Error::DimensionMismatch {
            declared: grid.dims(),
            expected: grid.point_count(),
            actual: header.point_count,
        };
        return Err(error_response(&err, &file));
    }

    // ==================== 步骤 5: 计算分块信息 ====================
    let shape = [grid.ny, grid.nx];
    let data_length = grid.ny * grid.nx;
    let chunks = split_into_chunks(data_length, chunk_size);

    // ==================== 步骤 6: 创建任务 ====================
    let task_id = app_state
        .task_store
        .insert(AnalysisTask::new(shape, chunks.clone(), file_path));
    let Some(task) = app_state.task_store.get(&task_id) else {
        return Err(HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "创建任务失败",
        })));
    };

    // ==================== 步骤 7: 后台分析 ====================
    let registry = app_state.parser_registry.clone();
    let background_id = task_id.clone();
    actix_web::rt::spawn(async move {
        let start = Instant::now();
        let unit = pipeline.config().grid.unit.clone();

        let result = web::block(move || {
            pipeline.run_file(&registry, AnalysisMode::Statistics)
        })
        .await;

        match result {
            Ok(Ok(analysis)) => {
                task.store_height_map(&analysis.height_map.to_row_major_vec());
                task.complete(analysis.report(&unit));
                info!(
                    "[后台分析] 任务 {} ({}) 完成，共 {} 个 chunk，耗时 {:.2}ms",
                    background_id,
                    task.file_path,
                    task.chunks.len(),
                    start.elapsed().as_secs_f64() * 1000.0
                );
            }
            Ok(Err(e)) => {
                error!("[后台分析] 任务 {} 失败: {}", background_id, e);
                task.fail(e.to_string());
            }
            Err(e) => {
                error!("[后台分析] 任务 {} 执行被中断: {}", background_id, e);
                task.fail(e.to_string());
            }
        }
    });

    // 立即返回，不等待分析完成
    Ok(AnalyzeResponse {
        task_id,
        file,
        file_size,
        shape,
        data_length,
        chunk_size,
        chunks,
    })
}
