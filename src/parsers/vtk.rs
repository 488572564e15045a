use std::fs::File;
use std::io::{BufRead, BufReader, ErrorKind};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::{Error, Result};
use crate::utils::parser::{FieldHeader, PointScalars, VoxelGridParser};

/// 旧版 VTK 文件格式解析器（DATASET STRUCTURED_POINTS）
/// 支持 ASCII 与 BINARY（大端）编码，以及 gzip 压缩的 .vtk.gz
pub struct VtkParser;

impl VtkParser {
    pub fn new() -> Self {
        VtkParser
    }
}

impl Default for VtkParser {
    fn default() -> Self {
        Self::new()
    }
}

impl VoxelGridParser for VtkParser {
    fn supported_extensions(&self) -> Vec<&'static str> {
        vec!["vtk", "gz"]
    }

    fn name(&self) -> &'static str {
        "VTK Legacy Parser"
    }

    fn parse_from_file(&self, file_path: &str) -> Result<PointScalars> {
        let mut reader = open(file_path)?;
        let header = read_header(&mut reader)?;
        debug!(
            "[VTK] {}: {:?}, DIMENSIONS {:?}, SCALARS {} ({:?})",
            file_path, header.encoding, header.dimensions, header.scalar_name, header.scalar_type
        );

        let values = match header.encoding {
            Encoding::Ascii => read_ascii_values(&mut reader, header.point_count)?,
            Encoding::Binary => {
                read_binary_values(&mut reader, header.scalar_type, header.point_count)?
            }
        };

        Ok(PointScalars {
            name: header.scalar_name,
            dimensions: header.dimensions,
            values,
        })
    }

    fn header_from_file(&self, file_path: &str) -> Result<FieldHeader> {
        let mut reader = open(file_path)?;
        let header = read_header(&mut reader)?;
        Ok(FieldHeader {
            dimensions: header.dimensions,
            point_count: header.point_count,
        })
    }
}

fn open(file_path: &str) -> Result<Box<dyn BufRead>> {
    let file = File::open(file_path)?;
    let compressed = Path::new(file_path)
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("gz"));

    if compressed {
        Ok(Box::new(BufReader::new(GzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Ascii,
    Binary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarType {
    UnsignedChar,
    Char,
    Short,
    UnsignedShort,
    Int,
    UnsignedInt,
    Float,
    Double,
    Int64,
    UnsignedInt64,
}

impl ScalarType {
    fn parse(name: &str) -> Result<Self> {
        match name.to_ascii_lowercase().as_str() {
            "unsigned_char" => Ok(ScalarType::UnsignedChar),
            "char" => Ok(ScalarType::Char),
            "short" => Ok(ScalarType::Short),
            "unsigned_short" => Ok(ScalarType::UnsignedShort),
            // 旧版格式中 long 按 4 字节写出
            "int" | "long" => Ok(ScalarType::Int),
            "unsigned_int" | "unsigned_long" => Ok(ScalarType::UnsignedInt),
            "float" => Ok(ScalarType::Float),
            "double" => Ok(ScalarType::Double),
            "vtktypeint64" => Ok(ScalarType::Int64),
            "vtktypeuint64" => Ok(ScalarType::UnsignedInt64),
            other => Err(Error::parse(format!("不支持的标量类型 '{}'", other))),
        }
    }
}

#[derive(Debug)]
struct VtkHeader {
    encoding: Encoding,
    dimensions: [usize; 3],
    point_count: usize,
    scalar_name: String,
    scalar_type: ScalarType,
}

/// 读取一行（去掉行尾换行符），文件结束时返回 None
fn next_line(reader: &mut dyn BufRead) -> Result<Option<String>> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\n', '\r']).to_string()))
}

/// 读取下一个非空行
fn next_keyword_line(reader: &mut dyn BufRead) -> Result<Option<String>> {
    while let Some(line) = next_line(reader)? {
        if !line.trim().is_empty() {
            return Ok(Some(line));
        }
    }
    Ok(None)
}

fn parse_usize(token: Option<&str>, what: &str) -> Result<usize> {
    token
        .ok_or_else(|| Error::parse(format!("缺少 {}", what)))?
        .parse::<usize>()
        .map_err(|e| Error::parse(format!("无法解析 {}: {}", what, e)))
}

/// 检查缓冲区接下来的内容是否以给定关键字开头（不消费数据）
fn peek_starts_with(reader: &mut dyn BufRead, keyword: &[u8]) -> Result<bool> {
    let buf = reader.fill_buf()?;
    Ok(buf.len() >= keyword.len() && buf[..keyword.len()].eq_ignore_ascii_case(keyword))
}

fn read_header(reader: &mut dyn BufRead) -> Result<VtkHeader> {
    let version = next_line(reader)?.ok_or_else(|| Error::parse("空文件"))?;
    if !version.trim_start().to_ascii_lowercase().starts_with("# vtk") {
        return Err(Error::parse(format!("不是 VTK 文件: '{}'", version)));
    }

    // 第2行是标题
    next_line(reader)?.ok_or_else(|| Error::parse("缺少标题行"))?;

    let encoding_line = next_line(reader)?.ok_or_else(|| Error::parse("缺少编码行"))?;
    let encoding = match encoding_line.trim().to_ascii_uppercase().as_str() {
        "ASCII" => Encoding::Ascii,
        "BINARY" => Encoding::Binary,
        other => return Err(Error::parse(format!("未知编码 '{}'", other))),
    };

    let mut dimensions: Option<[usize; 3]> = None;
    let mut point_count: Option<usize> = None;

    loop {
        let line = next_keyword_line(reader)?
            .ok_or_else(|| Error::parse("文件在 SCALARS 之前结束"))?;
        let mut tokens = line.split_whitespace();
        let keyword = tokens.next().unwrap_or_default().to_ascii_uppercase();

        match keyword.as_str() {
            "DATASET" => {
                let kind = tokens.next().unwrap_or_default();
                if !kind.eq_ignore_ascii_case("STRUCTURED_POINTS") {
                    return Err(Error::parse(format!(
                        "只支持 STRUCTURED_POINTS 数据集，得到 '{}'",
                        kind
                    )));
                }
            }
            "DIMENSIONS" => {
                dimensions = Some([
                    parse_usize(tokens.next(), "DIMENSIONS nx")?,
                    parse_usize(tokens.next(), "DIMENSIONS ny")?,
                    parse_usize(tokens.next(), "DIMENSIONS nz")?,
                ]);
            }
            "ORIGIN" | "SPACING" | "ASPECT_RATIO" => {}
            "POINT_DATA" => {
                point_count = Some(parse_usize(tokens.next(), "POINT_DATA")?);
            }
            "SCALARS" => {
                let scalar_name = tokens
                    .next()
                    .ok_or_else(|| Error::parse("SCALARS 缺少名称"))?
                    .to_string();
                let scalar_type =
                    ScalarType::parse(tokens.next().ok_or_else(|| Error::parse("SCALARS 缺少类型"))?)?;
                if let Some(components) = tokens.next() {
                    if components != "1" {
                        return Err(Error::parse(format!(
                            "只支持单分量标量，得到 {} 个分量",
                            components
                        )));
                    }
                }

                let dimensions = dimensions.ok_or_else(|| Error::parse("缺少 DIMENSIONS"))?;
                let point_count = point_count.ok_or_else(|| Error::parse("SCALARS 之前缺少 POINT_DATA"))?;
                let dimension_product = dimensions[0]
                    .checked_mul(dimensions[1])
                    .and_then(|n| n.checked_mul(dimensions[2]))
                    .ok_or_else(|| Error::parse(format!("DIMENSIONS {:?} 的点数溢出", dimensions)))?;
                if dimension_product != point_count {
                    return Err(Error::parse(format!(
                        "POINT_DATA {} 与 DIMENSIONS {:?} 不一致",
                        point_count, dimensions
                    )));
                }

                // LOOKUP_TABLE 行可省略
                if peek_starts_with(reader, b"LOOKUP_TABLE")? {
                    next_line(reader)?;
                }

                return Ok(VtkHeader {
                    encoding,
                    dimensions,
                    point_count,
                    scalar_name,
                    scalar_type,
                });
            }
            other => {
                return Err(Error::parse(format!(
                    "在点标量之前遇到不支持的段 '{}'",
                    other
                )));
            }
        }
    }
}

/// 数据块之后可能出现的段关键字
const SECTION_KEYWORDS: &[&str] = &[
    "SCALARS",
    "VECTORS",
    "NORMALS",
    "TENSORS",
    "TEXTURE_COORDINATES",
    "COLOR_SCALARS",
    "LOOKUP_TABLE",
    "FIELD",
    "POINT_DATA",
    "CELL_DATA",
    "METADATA",
];

fn is_section_start(line: &str) -> bool {
    line.split_whitespace()
        .next()
        .is_some_and(|token| SECTION_KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(token)))
}

/// 读取 count 个 ASCII 值，遇到下一个段关键字即停止
fn read_ascii_values(reader: &mut dyn BufRead, count: usize) -> Result<Vec<f64>> {
    let mut data = Vec::with_capacity(count.min(1 << 20));

    while data.len() < count {
        let Some(line) = next_line(reader)? else {
            break;
        };
        if is_section_start(&line) {
            break;
        }
        for token in line.split_whitespace() {
            if data.len() == count {
                break;
            }
            let value = token.parse::<f64>().map_err(|_| {
                Error::parse(format!("第 {} 个值 '{}' 不是数字", data.len() + 1, token))
            })?;
            data.push(value);
        }
    }

    if data.len() < count {
        return Err(Error::parse(format!(
            "数据不足: POINT_DATA 声明 {} 个值，只读取到 {} 个",
            count,
            data.len()
        )));
    }
    Ok(data)
}

fn read_binary_values(
    reader: &mut dyn BufRead,
    scalar_type: ScalarType,
    count: usize,
) -> Result<Vec<f64>> {
    fn widen<T: Copy + Into<f64>>(values: &[T]) -> Vec<f64> {
        values.iter().map(|&v| v.into()).collect()
    }

    let result = match scalar_type {
        ScalarType::UnsignedChar => {
            let mut buf = vec![0u8; count];
            reader.read_exact(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::Char => {
            let mut buf = vec![0i8; count];
            reader.read_i8_into(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::Short => {
            let mut buf = vec![0i16; count];
            reader.read_i16_into::<BigEndian>(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::UnsignedShort => {
            let mut buf = vec![0u16; count];
            reader.read_u16_into::<BigEndian>(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::Int => {
            let mut buf = vec![0i32; count];
            reader.read_i32_into::<BigEndian>(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::UnsignedInt => {
            let mut buf = vec![0u32; count];
            reader.read_u32_into::<BigEndian>(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::Float => {
            let mut buf = vec![0f32; count];
            reader.read_f32_into::<BigEndian>(&mut buf).map(|_| widen(&buf))
        }
        ScalarType::Double => {
            let mut buf = vec![0f64; count];
            reader.read_f64_into::<BigEndian>(&mut buf).map(|_| buf)
        }
        ScalarType::Int64 => {
            let mut buf = vec![0i64; count];
            reader
                .read_i64_into::<BigEndian>(&mut buf)
                .map(|_| buf.iter().map(|&v| v as f64).collect())
        }
        ScalarType::UnsignedInt64 => {
            let mut buf = vec![0u64; count];
            reader
                .read_u64_into::<BigEndian>(&mut buf)
                .map(|_| buf.iter().map(|&v| v as f64).collect())
        }
    };

    result.map_err(|e| match e.kind() {
        ErrorKind::UnexpectedEof => Error::parse(format!(
            "二进制数据不足: POINT_DATA 声明 {} 个 {:?} 值",
            count, scalar_type
        )),
        _ => Error::Io(e),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::WriteBytesExt;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;
    use tempfile::Builder;

    const ASCII_VTK: &str = "# vtk DataFile Version 3.0\n\
        phase field\n\
        ASCII\n\
        DATASET STRUCTURED_POINTS\n\
        DIMENSIONS 2 1 4\n\
        ORIGIN 0 0 0\n\
        SPACING 1 1 1\n\
        POINT_DATA 8\n\
        SCALARS phi float 1\n\
        LOOKUP_TABLE default\n\
        5 3\n0 4\n7 5\n0 6\n";

    fn write_temp(suffix: &str, bytes: &[u8]) -> tempfile::NamedTempFile {
        let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
        file
    }

    fn path_of(file: &tempfile::NamedTempFile) -> String {
        file.path().to_str().unwrap().to_string()
    }

    #[test]
    fn parses_ascii_file() {
        let file = write_temp(".vtk", ASCII_VTK.as_bytes());
        let scalars = VtkParser::new().parse_from_file(&path_of(&file)).unwrap();

        assert_eq!(scalars.name, "phi");
        assert_eq!(scalars.dimensions, [2, 1, 4]);
        assert_eq!(scalars.values, vec![5.0, 3.0, 0.0, 4.0, 7.0, 5.0, 0.0, 6.0]);
    }

    #[test]
    fn parses_header_only() {
        let file = write_temp(".vtk", ASCII_VTK.as_bytes());
        let header = VtkParser::new().header_from_file(&path_of(&file)).unwrap();
        assert_eq!(header.dimensions, [2, 1, 4]);
        assert_eq!(header.point_count, 8);
    }

    #[test]
    fn parses_big_endian_binary_file() {
        let mut bytes = b"# vtk DataFile Version 3.0\nbinary phase\nBINARY\n\
            DATASET STRUCTURED_POINTS\nDIMENSIONS 2 1 2\nPOINT_DATA 4\n\
            SCALARS phi double\nLOOKUP_TABLE default\n"
            .to_vec();
        for value in [1.0, 0.0, 2.5, 0.0] {
            bytes.write_f64::<BigEndian>(value).unwrap();
        }
        let file = write_temp(".vtk", &bytes);

        let scalars = VtkParser::new().parse_from_file(&path_of(&file)).unwrap();
        assert_eq!(scalars.values, vec![1.0, 0.0, 2.5, 0.0]);
    }

    #[test]
    fn parses_binary_unsigned_char_without_lookup_table() {
        let mut bytes = b"# vtk DataFile Version 3.0\nbytes\nBINARY\n\
            DATASET STRUCTURED_POINTS\nDIMENSIONS 3 1 1\nPOINT_DATA 3\n\
            SCALARS phase unsigned_char 1\n"
            .to_vec();
        bytes.extend_from_slice(&[0, 1, 255]);
        let file = write_temp(".vtk", &bytes);

        let scalars = VtkParser::new().parse_from_file(&path_of(&file)).unwrap();
        assert_eq!(scalars.values, vec![0.0, 1.0, 255.0]);
    }

    #[test]
    fn parses_gzip_file() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(ASCII_VTK.as_bytes()).unwrap();
        let file = write_temp(".vtk.gz", &encoder.finish().unwrap());

        let scalars = VtkParser::new().parse_from_file(&path_of(&file)).unwrap();
        assert_eq!(scalars.values.len(), 8);
        assert_eq!(scalars.values[2], 0.0);
    }

    #[test]
    fn reports_truncated_ascii_data() {
        let truncated = ASCII_VTK.replace("0 6\n", "");
        let file = write_temp(".vtk", truncated.as_bytes());
        let err = VtkParser::new().parse_from_file(&path_of(&file)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn short_data_does_not_read_into_next_section() {
        let text = ASCII_VTK.replace(
            "0 6\n",
            "0\nSCALARS other float 1\nLOOKUP_TABLE default\n9 9 9 9 9 9 9 9\n",
        );
        let file = write_temp(".vtk", text.as_bytes());
        let err = VtkParser::new().parse_from_file(&path_of(&file)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)), "unexpected: {err:?}");
    }

    #[test]
    fn trailing_sections_after_full_data_are_ignored() {
        let text = format!("{ASCII_VTK}SCALARS other float 1\nLOOKUP_TABLE default\n1 1 1 1 1 1 1 1\n");
        let file = write_temp(".vtk", text.as_bytes());
        let scalars = VtkParser::new().parse_from_file(&path_of(&file)).unwrap();
        assert_eq!(scalars.values, vec![5.0, 3.0, 0.0, 4.0, 7.0, 5.0, 0.0, 6.0]);
    }

    #[test]
    fn rejects_non_numeric_value() {
        let text = ASCII_VTK.replace("7 5\n", "7 x\n");
        let file = write_temp(".vtk", text.as_bytes());
        let err = VtkParser::new().parse_from_file(&path_of(&file)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn overflowing_dimensions_are_a_parse_error() {
        let text = ASCII_VTK.replace("DIMENSIONS 2 1 4", "DIMENSIONS 18446744073709551615 2 2");
        let file = write_temp(".vtk", text.as_bytes());
        let err = VtkParser::new().header_from_file(&path_of(&file)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn reports_truncated_binary_data() {
        let mut bytes = b"# vtk DataFile Version 3.0\nt\nBINARY\n\
            DATASET STRUCTURED_POINTS\nDIMENSIONS 2 1 1\nPOINT_DATA 2\n\
            SCALARS phi float\nLOOKUP_TABLE default\n"
            .to_vec();
        bytes.write_f32::<BigEndian>(1.0).unwrap();
        let file = write_temp(".vtk", &bytes);

        let err = VtkParser::new().parse_from_file(&path_of(&file)).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn rejects_other_datasets() {
        let text = ASCII_VTK.replace("STRUCTURED_POINTS", "UNSTRUCTURED_GRID");
        let file = write_temp(".vtk", text.as_bytes());
        assert!(VtkParser::new().parse_from_file(&path_of(&file)).is_err());
    }

    #[test]
    fn rejects_inconsistent_point_data() {
        let text = ASCII_VTK.replace("POINT_DATA 8", "POINT_DATA 9");
        let file = write_temp(".vtk", text.as_bytes());
        assert!(VtkParser::new().header_from_file(&path_of(&file)).is_err());
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = VtkParser::new()
            .parse_from_file("/nonexistent/dir/field.vtk")
            .unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
