use std::fs;
use std::io::Write;
use std::path::Path;

use byteorder::{BigEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::GzEncoder;
use surface_roughness::config::{AnalysisConfig, GridConfig};
use surface_roughness::pipeline::{AnalysisMode, SurfacePipeline};
use surface_roughness::utils::parser_registry::ParserRegistry;
use surface_roughness::Error;

const TWO_COLUMNS: &str = "# vtk DataFile Version 3.0\n\
    two columns\n\
    ASCII\n\
    DATASET STRUCTURED_POINTS\n\
    DIMENSIONS 2 1 4\n\
    ORIGIN 0 0 0\n\
    SPACING 1 1 1\n\
    POINT_DATA 8\n\
    SCALARS phi float 1\n\
    LOOKUP_TABLE default\n\
    5 3 0 4\n\
    7 5 0 6\n";

fn config_for(path: &Path, nx: usize, ny: usize, nz: usize, dl: f64) -> AnalysisConfig {
    AnalysisConfig::new(path.to_str().unwrap(), GridConfig::new(nx, ny, nz, dl))
}

/// 表面位于 k(x, y) = (x + y) % nz 的二值相场，按 BINARY float 写出
fn binary_phase_vtk(nx: usize, ny: usize, nz: usize) -> Vec<u8> {
    let mut bytes = format!(
        "# vtk DataFile Version 3.0\nphase\nBINARY\nDATASET STRUCTURED_POINTS\n\
         DIMENSIONS {nx} {ny} {nz}\nSPACING 1 1 1\nORIGIN 0 0 0\nPOINT_DATA {}\n\
         SCALARS phase float\nLOOKUP_TABLE default\n",
        nx * ny * nz
    )
    .into_bytes();
    for iz in 0..nz {
        for iy in 0..ny {
            for ix in 0..nx {
                let value = if iz < (ix + iy) % nz { 1.0 } else { 0.0 };
                bytes.write_f32::<BigEndian>(value).unwrap();
            }
        }
    }
    bytes
}

#[test]
fn two_column_file_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.vtk");
    fs::write(&path, TWO_COLUMNS).unwrap();

    let pipeline = SurfacePipeline::new(config_for(&path, 2, 1, 4, 2.0)).unwrap();
    let analysis = pipeline
        .run_file(&ParserRegistry::new(), AnalysisMode::Statistics)
        .unwrap();

    assert_eq!(analysis.point_count, 8);
    assert_eq!(analysis.height_map.to_row_major_vec(), vec![2.0, 0.0]);
    let roughness = analysis.roughness.unwrap();
    assert_eq!((roughness.mean, roughness.ra, roughness.rq), (1.0, 1.0, 1.0));
    assert_eq!(analysis.index_map.no_crossing_count(), 1);
}

#[test]
fn gzip_binary_file_matches_direct_statistics() {
    let (nx, ny, nz) = (4, 3, 5);
    let dl = 0.5;

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phase.vtk.gz");
    let mut encoder = GzEncoder::new(Vec::new(), Compression::fast());
    encoder.write_all(&binary_phase_vtk(nx, ny, nz)).unwrap();
    fs::write(&path, encoder.finish().unwrap()).unwrap();

    let analysis = SurfacePipeline::new(config_for(&path, nx, ny, nz, dl))
        .unwrap()
        .run_file(&ParserRegistry::new(), AnalysisMode::Statistics)
        .unwrap();

    let heights: Vec<f64> = (0..ny)
        .flat_map(|iy| (0..nx).map(move |ix| ((ix + iy) % nz) as f64 * dl))
        .collect();
    let n = heights.len() as f64;
    let mean = heights.iter().sum::<f64>() / n;
    let ra = heights.iter().map(|h| (h - mean).abs()).sum::<f64>() / n;
    let rq = heights.iter().map(|h| (h - mean).powi(2)).sum::<f64>() / n;

    assert_eq!(analysis.height_map.to_row_major_vec(), heights);
    let roughness = analysis.roughness.unwrap();
    assert!((roughness.mean - mean).abs() < 1e-12);
    assert!((roughness.ra - ra).abs() < 1e-12);
    assert!((roughness.rq - rq).abs() < 1e-12);
}

#[test]
fn declared_dimensions_must_match_point_count() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.vtk");
    fs::write(&path, TWO_COLUMNS).unwrap();

    let err = SurfacePipeline::new(config_for(&path, 2, 1, 3, 1.0))
        .unwrap()
        .run_file(&ParserRegistry::new(), AnalysisMode::Statistics)
        .unwrap_err();

    match err {
        Error::DimensionMismatch {
            declared,
            expected,
            actual,
        } => {
            assert_eq!(declared, [3, 1, 2]);
            assert_eq!(expected, 6);
            assert_eq!(actual, 8);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn reordered_dimensions_with_same_count_are_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("example.vtk");
    fs::write(&path, TWO_COLUMNS).unwrap();

    // 声明 nx=1, ny=2：点数相同，按声明重塑
    let analysis = SurfacePipeline::new(config_for(&path, 1, 2, 4, 1.0))
        .unwrap()
        .run_file(&ParserRegistry::new(), AnalysisMode::Statistics)
        .unwrap();
    assert_eq!(analysis.height_map.shape(), (2, 1));
}

#[test]
fn missing_and_unsupported_files() {
    let dir = tempfile::tempdir().unwrap();
    let registry = ParserRegistry::new();

    let missing = dir.path().join("absent.vtk");
    let err = SurfacePipeline::new(config_for(&missing, 2, 1, 4, 1.0))
        .unwrap()
        .run_file(&registry, AnalysisMode::Statistics)
        .unwrap_err();
    assert!(matches!(err, Error::Io(_)));

    let other = dir.path().join("CHGCAR.vasp");
    fs::write(&other, "not a grid").unwrap();
    let err = SurfacePipeline::new(config_for(&other, 2, 1, 4, 1.0))
        .unwrap()
        .run_file(&registry, AnalysisMode::Statistics)
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedFormat(_)));
}

#[test]
fn config_file_drives_the_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let field = dir.path().join("example.vtk");
    fs::write(&field, TWO_COLUMNS).unwrap();

    let config_path = dir.path().join("analysis.toml");
    fs::write(
        &config_path,
        format!(
            "file = {:?}\n[grid]\nnx = 2\nny = 1\nnz = 4\ndl = 2.0\n[surface]\nno_crossing = \"bottom\"\n",
            field.to_str().unwrap()
        ),
    )
    .unwrap();

    let config = AnalysisConfig::from_file(&config_path).unwrap();
    let analysis = SurfacePipeline::new(config)
        .unwrap()
        .run_file(&ParserRegistry::new(), AnalysisMode::Statistics)
        .unwrap();

    // 第 1 列没有零值，按 bottom 策略记为 nz = 4
    assert_eq!(analysis.height_map.to_row_major_vec(), vec![2.0, 8.0]);
    assert_eq!(analysis.roughness.unwrap().mean, 5.0);
}

#[test]
fn shipped_demo_config_is_valid() {
    let config = AnalysisConfig::from_file("demos/analysis.toml").unwrap();
    assert_eq!(config.grid.dims(), [256, 256, 512]);
    assert_eq!(config.grid.dl, 0.5);
    assert!(SurfacePipeline::new(config).is_ok());
}
