use actix_web::web;

use crate::handlers;

/// 统一注册 HTTP 路由，方便集中管理
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(handlers::hello)
        .service(handlers::analyze_surface)
        .service(handlers::get_height_chunk)
        .service(handlers::get_roughness);
}
