use std::path::PathBuf;
use std::time::Duration;

use crate::host::Direction;

/// 出力先を指定する環境変数
pub const OUTPUT_PATH_ENV: &str = "GHIDRA_OUTPUT_PATH";
/// Ghidra のインストールディレクトリを指定する環境変数
pub const GHIDRA_PATH_ENV: &str = "GHIDRA_PATH";

pub const DEFAULT_OUTPUT_PATH: &str = "/tmp/ghidra_output.json";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CACHE_DIR: &str = ".ghidra_cache";

/// エクスポート処理の設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub output_path: PathBuf,
    /// 関数ごとのデコンパイルタイムアウト
    pub timeout: Duration,
    pub direction: Direction,
    /// 各要素に `status` フィールドを付ける
    pub with_status: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            timeout: DEFAULT_TIMEOUT,
            direction: Direction::Forward,
            with_status: false,
        }
    }
}

impl ExportConfig {
    /// 環境変数から出力先を解決した設定
    pub fn from_env() -> Self {
        Self {
            output_path: output_path_from_env(),
            ..Self::default()
        }
    }
}

/// 出力先を解決する
///
/// 環境変数の値が空でなければそれを、そうでなければ `/tmp/ghidra_output.json`
pub fn resolve_output_path(env_value: Option<String>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(DEFAULT_OUTPUT_PATH),
    }
}

pub fn output_path_from_env() -> PathBuf {
    resolve_output_path(std::env::var(OUTPUT_PATH_ENV).ok())
}
