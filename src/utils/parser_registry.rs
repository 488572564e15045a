use std::path::Path;

use crate::error::{Error, Result};
use crate::utils::parser::VoxelGridParser;

/// 按文件扩展名选择体素场读取器
/// `.vtk.gz` 按最后一个扩展名 gz 匹配，由 VTK 读取器负责解压
pub struct ParserRegistry {
    parsers: Vec<Box<dyn VoxelGridParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self {
            parsers: crate::parsers::get_all_parsers(),
        }
    }

    /// 扩展名（不含点号，大小写不敏感）对应的读取器
    pub fn find_parser(&self, extension: &str) -> Option<&dyn VoxelGridParser> {
        self.parsers
            .iter()
            .map(|parser| parser.as_ref())
            .find(|parser| parser.supports(extension))
    }

    /// 文件路径对应的读取器；没有扩展名或扩展名不受支持时返回 UnsupportedFormat
    pub fn parser_for_file(&self, file_path: &str) -> Result<&dyn VoxelGridParser> {
        let extension = Path::new(file_path)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();

        self.find_parser(extension).ok_or_else(|| {
            Error::UnsupportedFormat(format!(
                "{} (扩展名 '{}'，支持: {})",
                file_path,
                extension,
                self.supported_extensions().join(", ")
            ))
        })
    }

    /// 所有读取器支持的扩展名，小写、去重、排序
    pub fn supported_extensions(&self) -> Vec<String> {
        let mut extensions: Vec<String> = self
            .parsers
            .iter()
            .flat_map(|parser| parser.supported_extensions())
            .map(str::to_lowercase)
            .collect();
        extensions.sort();
        extensions.dedup();
        extensions
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::new()
    }
}
