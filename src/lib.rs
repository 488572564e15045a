//! 从二值相体素场提取表面高度图，计算粗糙度 Ra / Rq，并可绘制伪彩色高度图。
//!
//! 批处理入口是 [`pipeline::SurfacePipeline`]；HTTP 服务由 [`routes`] 与
//! [`handlers`] 组成。

pub mod app_state;
pub mod config;
pub mod error;
pub mod handlers;
pub mod parsers;
pub mod pipeline;
pub mod render;
pub mod routes;
pub mod surface;
pub mod task;
pub mod utils;

pub use error::{Error, Result};
