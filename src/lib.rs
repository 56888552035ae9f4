/// Ghidra-Export ライブラリ
///
/// 解析ホスト（Ghidra Headless）で全関数をデコンパイルし、
/// `{name, address, code}` のJSON配列として書き出す

pub mod binary;
pub mod cache;
pub mod capture;
pub mod config;
pub mod error;
pub mod export;
pub mod ghidra_headless;
pub mod host;

pub use capture::{CapturedFunction, CapturedProgram};
pub use config::ExportConfig;
pub use error::{ExportError, Result};
pub use export::{export_program, export_to_writer, ExportStats, ExportSummary, FunctionRecord};
pub use ghidra_headless::{GhidraHeadless, HeadlessConfig, Launcher};
pub use host::{AnalysisHost, Decompilation, DecompileStatus, Direction, FunctionEntry};
