use std::collections::BTreeMap;
use std::io::{Cursor, Write};

use spoolsync_plan::{ArchiveFetcher, FetchConfig, PlanError, PlanSource};
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const SLICE_INFO: &str = r##"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <plate>
    <metadata key="index" value="1"/>
    <filament id="1" type="PETG" color="#FFFFFF" used_m="3.10" used_g="9.50" />
    <filament id="2" type="PETG" color="#FF0000" used_m="1.00" used_g="3.25" />
    <filament id="3" type="PETG" color="#0000FF" used_m="0.50" used_g="1.00" />
  </plate>
</config>
"##;

const TOOLPATH: &str = "\
; HEADER_BLOCK_START
M620 S255
M620 S0A
G1 X10 Y10
M620 S2A
G1 X20 Y20
M620 S0A
M620 S1A
";

fn write_archive(dir: &TempDir, name: &str) -> std::path::PathBuf {
    write_archive_with(dir, name, SLICE_INFO, Some(TOOLPATH))
}

fn write_archive_with(
    dir: &TempDir,
    name: &str,
    slice_info: &str,
    toolpath: Option<&str>,
) -> std::path::PathBuf {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Stored);
    writer
        .start_file("Metadata/slice_info.config", options)
        .expect("start slice info");
    writer.write_all(slice_info.as_bytes()).expect("write slice info");
    if let Some(toolpath) = toolpath {
        writer
            .start_file("Metadata/plate_1.gcode", options)
            .expect("start gcode");
        writer.write_all(toolpath.as_bytes()).expect("write gcode");
    }
    let bytes = writer.finish().expect("finish").into_inner();

    let path = dir.path().join(name);
    std::fs::write(&path, bytes).expect("write archive");
    path
}

#[tokio::test]
async fn local_reference_yields_full_plan() {
    let dir = TempDir::new().expect("tmp");
    let path = write_archive(&dir, "benchy.3mf");
    let fetcher = ArchiveFetcher::new(FetchConfig::default()).expect("fetcher");

    let plan = fetcher
        .fetch_plan(&format!("local:{}", path.display()))
        .await
        .expect("plan");

    assert_eq!(plan.file, "benchy.3mf");
    assert_eq!(plan.slots.len(), 3);
    assert_eq!(plan.total_grams(), 13.75);
    // The sentinel select still counts as a directive.
    assert_eq!(plan.order, BTreeMap::from([(1, 1), (3, 2), (2, 4)]));
}

#[tokio::test]
async fn missing_local_file_is_io_error() {
    let dir = TempDir::new().expect("tmp");
    let fetcher = ArchiveFetcher::new(FetchConfig::default()).expect("fetcher");
    let reference = format!("local:{}", dir.path().join("absent.3mf").display());

    let err = fetcher.fetch_plan(&reference).await.unwrap_err();
    assert!(matches!(err, PlanError::Io { .. }));
}

#[tokio::test]
async fn single_filament_job_orders_its_listed_slot() {
    let dir = TempDir::new().expect("tmp");
    let slice_info = r##"<?xml version="1.0" encoding="UTF-8"?>
<config>
  <plate>
    <metadata key="index" value="1"/>
    <filament id="3" type="PLA" color="#000000" used_m="2.00" used_g="6.00" />
  </plate>
</config>
"##;
    let path = write_archive_with(&dir, "vase.3mf", slice_info, Some("G28\nG1 X5\n"));
    let fetcher = ArchiveFetcher::new(FetchConfig::default()).expect("fetcher");

    let plan = fetcher
        .fetch_plan(&format!("local:{}", path.display()))
        .await
        .expect("plan");

    assert_eq!(plan.order, BTreeMap::from([(3, 0)]));
    assert_eq!(plan.slot_at(0), Some(3));
}
