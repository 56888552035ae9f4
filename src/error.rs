use std::path::PathBuf;
use thiserror::Error;

/// エクスポート処理のエラー
///
/// デコンパイルの失敗・タイムアウトはここには含まれない（空文字列に縮退する）。
/// ここに並ぶのは実行全体を中断する致命的エラーのみ。
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("binary not found: {}", .0.display())]
    BinaryNotFound(PathBuf),

    #[error("Ghidra not found at: {}. Please install Ghidra or set GHIDRA_PATH", .0.display())]
    GhidraNotFound(PathBuf),

    #[error("analyzeHeadless not found. Expected at: {}", .0.display())]
    LauncherNotFound(PathBuf),

    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("analysis host exited with {status}: {stderr}")]
    HostFailed { status: String, stderr: String },

    #[error("analysis host produced no capture at {}", .0.display())]
    MissingCapture(PathBuf),

    #[error("incomplete capture: {found} functions read, completion marker expected {expected:?}")]
    IncompleteCapture { expected: Option<usize>, found: usize },

    #[error("malformed capture line {line}: {source}")]
    Capture {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ExportError>;
