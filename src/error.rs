use thiserror::Error;

/// 统一结果类型
pub type Result<T> = std::result::Result<T, Error>;

/// 表面分析流程中的所有错误
/// 所有错误都是致命的：出现错误时不产生高度图或粗糙度结果
#[derive(Debug, Error)]
pub enum Error {
    /// 声明的 Nx·Ny·Nz 与文件实际点数不一致（在 reshape 之前检测）
    #[error("维度不匹配: 声明 {declared:?} 共 {expected} 个点，但文件包含 {actual} 个点")]
    DimensionMismatch {
        declared: [usize; 3],
        expected: usize,
        actual: usize,
    },

    /// 文件不存在或无法读取
    #[error("I/O 错误: {0}")]
    Io(#[from] std::io::Error),

    /// 文件内容格式错误
    #[error("解析错误: {0}")]
    Parse(String),

    /// 没有解析器支持该文件扩展名
    #[error("不支持的文件格式: {0}")]
    UnsupportedFormat(String),

    /// 配置校验失败
    #[error("配置无效: {0}")]
    InvalidConfig(String),

    /// 绘图后端错误
    #[error("绘图失败: {0}")]
    Render(String),
}

impl Error {
    pub fn parse(msg: impl Into<String>) -> Self {
        Error::Parse(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Error::InvalidConfig(msg.into())
    }
}
