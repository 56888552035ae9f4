//! キャプチャ再生ホストを使ったエクスポートの結合テスト

use ghidra_export::config::{DEFAULT_OUTPUT_PATH, OUTPUT_PATH_ENV};
use ghidra_export::{export_program, CapturedProgram, ExportConfig};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

const CAPTURE: &str = r#"{"name":"main","address":"00401000","status":"completed","code":"int main(void){return 0;}"}
{"name":"helper","address":"00401050","status":"timed_out"}
{"complete":true,"count":2}
"#;

#[test]
fn test_export_two_functions_to_file() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut program = CapturedProgram::read_from("sample", CAPTURE.as_bytes())?;

    let config = ExportConfig {
        output_path: dir.path().join("out.json"),
        ..ExportConfig::default()
    };
    let summary = export_program(&mut program, &config)?;

    let written = fs::read_to_string(&config.output_path)?;
    assert_eq!(
        written,
        r#"[{"name":"main","address":"00401000","code":"int main(void){return 0;}"},{"name":"helper","address":"00401050","code":""}]"#
    );
    assert_eq!(
        summary.to_string(),
        format!("Success: Exported 2 functions to {}", config.output_path.display())
    );
    Ok(())
}

#[test]
fn test_capture_file_replay() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let capture_path = dir.path().join("crackme.jsonl");
    fs::write(&capture_path, CAPTURE)?;

    let mut program = CapturedProgram::load(&capture_path)?;
    let config = ExportConfig {
        output_path: dir.path().join("out.json"),
        with_status: true,
        ..ExportConfig::default()
    };
    let summary = export_program(&mut program, &config)?;
    assert_eq!(summary.stats.exported, 2);
    assert_eq!(summary.stats.timed_out, 1);

    let parsed: Vec<Value> = serde_json::from_str(&fs::read_to_string(&config.output_path)?)?;
    assert_eq!(parsed.len(), 2);
    assert_eq!(parsed[1]["status"], "timed_out");
    Ok(())
}

#[test]
fn test_output_path_from_environment() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let target = dir.path().join("env_output.json");

    std::env::set_var(OUTPUT_PATH_ENV, &target);
    let config = ExportConfig::from_env();
    assert_eq!(config.output_path, target);

    let mut program = CapturedProgram::read_from("sample", CAPTURE.as_bytes())?;
    export_program(&mut program, &config)?;
    assert!(target.exists());

    std::env::set_var(OUTPUT_PATH_ENV, "");
    assert_eq!(ExportConfig::from_env().output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));

    std::env::remove_var(OUTPUT_PATH_ENV);
    assert_eq!(ExportConfig::from_env().output_path, PathBuf::from(DEFAULT_OUTPUT_PATH));
    Ok(())
}

#[test]
fn test_unwritable_output_is_fatal() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let mut program = CapturedProgram::read_from("sample", CAPTURE.as_bytes())?;
    let config = ExportConfig {
        output_path: dir.path().join("missing_dir").join("out.json"),
        ..ExportConfig::default()
    };
    assert!(export_program(&mut program, &config).is_err());
    Ok(())
}
