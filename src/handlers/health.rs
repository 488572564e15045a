use actix_web::{HttpResponse, Responder, get, web};

use crate::app_state::AppState;

/// 根路径健康检查/服务说明
#[get("/")]
pub async fn hello(data: web::Data<AppState>) -> impl Responder {
    let supported = data.parser_registry.supported_extensions();
    HttpResponse::Ok().json(serde_json::json!({
        "message": "表面粗糙度分析服务",
        "endpoints": [
            "POST /surface/analyze",
            "GET /surface/chunk?task_id=<id>&chunk_index=<n>",
            "GET /surface/roughness?task_id=<id>",
        ],
        "supported_extensions": supported,
        "resource_dir": data.resource_dir,
        "tasks": data.task_store.task_count(),
    }))
}
