use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use uuid::Uuid;

use crate::pipeline::AnalysisReport;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: usize,
    /// 开始位置（包含），单位：高度图元素索引（行优先）
    pub start: usize,
    /// 结束位置（不包含），单位：高度图元素索引（行优先）
    pub end: usize,
}

/// 按 chunk_size 把长度为 data_length 的数据划分成连续分块
/// chunk_size 为 0 时按 1 处理
pub fn split_into_chunks(data_length: usize, chunk_size: usize) -> Vec<ChunkDescriptor> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::new();
    let mut start = 0usize;
    let mut index = 0usize;
    while start < data_length {
        let end = (start + chunk_size).min(data_length);
        chunks.push(ChunkDescriptor { index, start, end });
        start = end;
        index += 1;
    }
    chunks
}

/// 分析任务状态
#[derive(Debug, Clone)]
pub enum TaskStatus {
    Processing,
    Completed(AnalysisReport),
    Failed(String),
}

/// 分析任务，存储分块的高度图数据与粗糙度结果
/// 使用 HashMap 独立存储每个 chunk，允许单独释放
pub struct AnalysisTask {
    /// 高度图维度 [ny, nx]
    pub shape: [usize; 2],
    /// 分块描述列表
    pub chunks: Vec<ChunkDescriptor>,
    /// 每个 chunk 的数据，key 是 chunk_index
    /// 当 chunk 被请求后，对应的数据会被移除以释放内存
    /// None 表示 chunk 正在计算中，Some(Vec) 表示已就绪
    pub chunk_data: RwLock<HashMap<usize, Option<Vec<f64>>>>,
    pub status: RwLock<TaskStatus>,
    /// 任务创建时间，用于 TTL 过期检查
    pub created_at: Instant,
    pub file_path: String,
}

impl AnalysisTask {
    /// 创建新的任务（此时高度图还未计算）
    pub fn new(shape: [usize; 2], chunks: Vec<ChunkDescriptor>, file_path: String) -> Self {
        let chunk_data: HashMap<usize, Option<Vec<f64>>> = chunks
            .iter()
            .map(|descriptor| (descriptor.index, None))
            .collect();

        Self {
            shape,
            chunks,
            chunk_data: RwLock::new(chunk_data),
            status: RwLock::new(TaskStatus::Processing),
            created_at: Instant::now(),
            file_path,
        }
    }

    /// 按分块描述切分整个高度图并存储（后台分析完成后调用）
    pub fn store_height_map(&self, values: &[f64]) {
        let mut chunk_data = self.chunk_data.write();
        for descriptor in &self.chunks {
            chunk_data.insert(
                descriptor.index,
                Some(values[descriptor.start..descriptor.end].to_vec()),
            );
        }
    }

    /// 获取并移除指定 chunk 的数据（用于请求后释放内存）
    /// 返回 None 如果：
    /// - chunk 不存在
    /// - chunk 正在计算中（还未就绪）
    /// - chunk 已被请求
    pub fn take_chunk(&self, chunk_index: usize) -> Option<Vec<f64>> {
        let mut chunk_data = self.chunk_data.write();
        if matches!(chunk_data.get(&chunk_index), Some(Some(_))) {
            chunk_data.remove(&chunk_index).flatten()
        } else {
            None
        }
    }

    /// 检查指定 chunk 是否已就绪
    pub fn is_chunk_ready(&self, chunk_index: usize) -> bool {
        self.chunk_data
            .read()
            .get(&chunk_index)
            .map(|opt| opt.is_some())
            .unwrap_or(false)
    }

    /// 获取剩余（未被请求）的 chunk 数量
    pub fn remaining_chunk_count(&self) -> usize {
        self.chunk_data.read().len()
    }

    pub fn complete(&self, report: AnalysisReport) {
        *self.status.write() = TaskStatus::Completed(report);
    }

    /// 标记失败并丢弃尚未就绪的 chunk
    pub fn fail(&self, message: String) {
        self.chunk_data.write().clear();
        *self.status.write() = TaskStatus::Failed(message);
    }

    pub fn status(&self) -> TaskStatus {
        self.status.read().clone()
    }
}

pub struct TaskStore {
    tasks: RwLock<HashMap<String, Arc<AnalysisTask>>>,
    default_ttl: Duration,
}

impl TaskStore {
    /// 默认 TTL：30 分钟
    pub fn new() -> Self {
        Self::with_ttl(Duration::from_secs(30 * 60))
    }

    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            tasks: RwLock::new(HashMap::new()),
            default_ttl: ttl,
        }
    }

    pub fn insert(&self, task: AnalysisTask) -> String {
        let task_id = Uuid::new_v4().to_string();
        self.tasks.write().insert(task_id.clone(), Arc::new(task));
        task_id
    }

    pub fn get(&self, task_id: &str) -> Option<Arc<AnalysisTask>> {
        self.tasks.read().get(task_id).cloned()
    }

    /// 清理过期的任务
    /// 返回清理的任务数量
    pub fn cleanup_expired(&self) -> usize {
        let now = Instant::now();
        let mut tasks = self.tasks.write();
        let before_count = tasks.len();

        tasks.retain(|_, task| now.duration_since(task.created_at) < self.default_ttl);

        before_count - tasks.len()
    }

    /// 获取当前任务数量
    pub fn task_count(&self) -> usize {
        self.tasks.read().len()
    }

    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}
