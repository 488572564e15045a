use actix_web::{HttpResponse, Responder, get, web};
use serde::Deserialize;

use crate::app_state::AppState;
use crate::task::TaskStatus;

#[derive(Deserialize)]
pub struct RoughnessQuery {
    pub task_id: String,
}

/// 查询任务的平均高度与粗糙度 Ra / Rq
#[get("/surface/roughness")]
pub async fn get_roughness(
    data: web::Data<AppState>,
    query: web::Query<RoughnessQuery>,
) -> impl Responder {
    let Some(task) = data.task_store.get(&query.task_id) else {
        return HttpResponse::BadRequest().json(serde_json::json!({
            "error": "无效的 task_id",
            "task_id": query.task_id,
        }));
    };

    match task.status() {
        TaskStatus::Processing => HttpResponse::Accepted().json(serde_json::json!({
            "task_id": query.task_id,
            "status": "processing",
        })),
        TaskStatus::Completed(report) => HttpResponse::Ok().json(serde_json::json!({
            "task_id": query.task_id,
            "status": "completed",
            "report": report,
        })),
        TaskStatus::Failed(details) => HttpResponse::InternalServerError().json(serde_json::json!({
            "error": "表面分析失败",
            "task_id": query.task_id,
            "status": "failed",
            "details": details,
        })),
    }
}
