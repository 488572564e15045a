pub mod analyze;
pub mod chunk;
pub mod health;
pub mod roughness;

pub use analyze::analyze_surface;
pub use chunk::get_height_chunk;
pub use health::hello;
pub use roughness::get_roughness;

use actix_web::HttpResponse;

use crate::error::Error;

/// 把分析错误映射为 HTTP 响应
pub(crate) fn error_response(err: &Error, file: &str) -> HttpResponse {
    let body = serde_json::json!({
        "error": err.to_string(),
        "file": file,
    });
    match err {
        Error::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
            HttpResponse::NotFound().json(body)
        }
        Error::Io(_) | Error::Render(_) => HttpResponse::InternalServerError().json(body),
        Error::DimensionMismatch { .. }
        | Error::Parse(_)
        | Error::UnsupportedFormat(_)
        | Error::InvalidConfig(_) => HttpResponse::BadRequest().json(body),
    }
}
