use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::Duration;

use crate::binary::{read_binary, BinaryInfo};
use crate::cache::CaptureCache;
use crate::capture::CapturedProgram;
use crate::config::DEFAULT_TIMEOUT;
use crate::error::{ExportError, Result};

/// キャプチャスクリプトが書き出し先を読む環境変数
pub const CAPTURE_PATH_ENV: &str = "GHIDRA_CAPTURE_PATH";

const CAPTURE_SCRIPT: &str = include_str!("../scripts/export_functions.py");
const SCRIPT_NAME: &str = "export_functions.py";
const CAPTURE_FILE: &str = "capture.jsonl";
const PROJECT_NAME: &str = "ghidra_export";

/// コンテナ内で作業ディレクトリをマウントする場所
const DOCKER_WORKDIR: &str = "/data";

/// analyzeHeadless の起動方法
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Launcher {
    /// ローカルの Ghidra インストール（例: /opt/ghidra_11.0）
    Local { ghidra_path: PathBuf },
    /// Docker イメージ（例: blacktop/ghidra）
    Docker { image: String },
}

#[derive(Debug, Clone)]
pub struct HeadlessConfig {
    pub launcher: Launcher,
    /// 関数ごとのデコンパイルタイムアウト（スクリプト引数として渡す）
    pub timeout: Duration,
    /// `None` ならキャッシュしない
    pub cache_dir: Option<PathBuf>,
    /// JVM の最大ヒープ（例: "4G"）
    pub max_heap: Option<String>,
}

impl HeadlessConfig {
    pub fn new(launcher: Launcher) -> Self {
        Self {
            launcher,
            timeout: DEFAULT_TIMEOUT,
            cache_dir: None,
            max_heap: None,
        }
    }
}

/// Ghidra Headless連携モジュール
///
/// analyzeHeadless をサブプロセスで起動し、同梱のキャプチャスクリプトで
/// 全関数をデコンパイルさせる。結果は `CapturedProgram` として返す。
pub struct GhidraHeadless {
    config: HeadlessConfig,
    cache: Option<CaptureCache>,
}

impl GhidraHeadless {
    pub fn new(config: HeadlessConfig) -> Result<Self> {
        if let Launcher::Local { ghidra_path } = &config.launcher {
            if !ghidra_path.exists() {
                return Err(ExportError::GhidraNotFound(ghidra_path.clone()));
            }
        }

        let cache = config.cache_dir.as_ref().map(|dir| CaptureCache::new(dir)).transpose()?;

        Ok(Self { config, cache })
    }

    /// バイナリを解析してデコンパイル済みプログラムを開く（キャッシュ優先）
    pub fn open(&self, binary_path: &Path) -> Result<CapturedProgram> {
        let binary = read_binary(binary_path)?;
        let info = BinaryInfo::probe(&binary);
        if info.is_known() {
            tracing::info!("Input binary: {} ({})", binary_path.display(), info);
        } else {
            tracing::warn!(
                "Unrecognized binary format for {}, letting Ghidra pick a loader",
                binary_path.display()
            );
        }

        let program_name = program_name(binary_path);
        let key = CaptureCache::key(&binary, self.config.timeout);

        if let Some(cache) = &self.cache {
            if let Some(program) = cache.load(&key, &program_name) {
                return Ok(program);
            }
            tracing::info!("Cache miss, calling Ghidra Headless...");
        }

        let program = self.capture(binary_path, &program_name)?;

        if let Some(cache) = &self.cache {
            if let Err(e) = cache.store(&key, &program) {
                tracing::warn!("Failed to cache capture: {}", e);
            }
        }

        Ok(program)
    }

    /// analyzeHeadless を実行してキャプチャを読み込む
    fn capture(&self, binary_path: &Path, program_name: &str) -> Result<CapturedProgram> {
        let workdir = tempfile::Builder::new().prefix("ghidra_export").tempdir()?;
        fs::create_dir_all(workdir.path().join("project"))?;
        fs::write(workdir.path().join(SCRIPT_NAME), CAPTURE_SCRIPT)?;

        let mut command = self.build_command(workdir.path(), binary_path)?;
        let program = format!("{:?}", command.get_program());

        tracing::info!("Running Ghidra Headless analysis...");
        tracing::debug!("Command: {:?}", command);

        let output = command
            .output()
            .map_err(|source| ExportError::Launch { program, source })?;
        check_output(&output)?;

        let capture_path = workdir.path().join(CAPTURE_FILE);
        if !capture_path.exists() {
            return Err(ExportError::MissingCapture(capture_path));
        }

        let mut captured = CapturedProgram::load(&capture_path)?;
        captured.set_name(program_name);
        tracing::info!("Ghidra captured {} functions", captured.len());

        Ok(captured)
    }

    fn build_command(&self, workdir: &Path, binary_path: &Path) -> Result<Command> {
        let timeout = self.config.timeout.as_secs().to_string();

        let command = match &self.config.launcher {
            Launcher::Local { ghidra_path } => {
                let launcher = launcher_path(ghidra_path);
                if !launcher.exists() {
                    return Err(ExportError::LauncherNotFound(launcher));
                }

                let mut command = Command::new(&launcher);
                command
                    .arg(workdir.join("project"))
                    .arg(PROJECT_NAME)
                    .arg("-import")
                    .arg(binary_path)
                    .arg("-scriptPath")
                    .arg(workdir)
                    .arg("-postScript")
                    .arg(SCRIPT_NAME)
                    .arg(&timeout)
                    .arg("-deleteProject")
                    .env(CAPTURE_PATH_ENV, workdir.join(CAPTURE_FILE));
                if let Some(max_heap) = &self.config.max_heap {
                    command.env("_JAVA_OPTIONS", format!("-Xmx{}", max_heap));
                }
                command
            }
            Launcher::Docker { image } => {
                // コンテナからはマウントした作業ディレクトリしか見えない
                let file_name = binary_path
                    .file_name()
                    .ok_or_else(|| ExportError::BinaryNotFound(binary_path.to_path_buf()))?;
                fs::copy(binary_path, workdir.join(file_name))?;
                let container_binary = format!("{}/{}", DOCKER_WORKDIR, file_name.to_string_lossy());

                let mut command = Command::new("docker");
                command
                    .arg("run")
                    .arg("--rm")
                    .arg("-v")
                    .arg(format!("{}:{}", workdir.display(), DOCKER_WORKDIR))
                    .arg("-e")
                    .arg(format!("{}={}/{}", CAPTURE_PATH_ENV, DOCKER_WORKDIR, CAPTURE_FILE));
                if let Some(max_heap) = &self.config.max_heap {
                    command.arg("-e").arg(format!("_JAVA_OPTIONS=-Xmx{}", max_heap));
                }
                command
                    .arg(image)
                    .arg("analyzeHeadless")
                    .arg(format!("{}/project", DOCKER_WORKDIR))
                    .arg(PROJECT_NAME)
                    .arg("-import")
                    .arg(container_binary)
                    .arg("-scriptPath")
                    .arg(DOCKER_WORKDIR)
                    .arg("-postScript")
                    .arg(SCRIPT_NAME)
                    .arg(&timeout)
                    .arg("-deleteProject");
                command
            }
        };

        Ok(command)
    }
}

/// `<ghidra>/support/analyzeHeadless`（Windows では `.bat`）
pub fn launcher_path(ghidra_path: &Path) -> PathBuf {
    let name = if cfg!(windows) {
        "analyzeHeadless.bat"
    } else {
        "analyzeHeadless"
    };
    ghidra_path.join("support").join(name)
}

fn program_name(binary_path: &Path) -> String {
    binary_path
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| binary_path.display().to_string())
}

fn check_output(output: &Output) -> Result<()> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);

    tracing::debug!("Ghidra stdout: {}", stdout);
    if !stderr.is_empty() {
        tracing::debug!("Ghidra stderr: {}", stderr);
    }

    if output.status.success() {
        return Ok(());
    }

    Err(ExportError::HostFailed {
        status: output.status.to_string(),
        stderr: tail(&stderr, 20),
    })
}

/// 末尾 `lines` 行だけ残す
fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    let start = all.len().saturating_sub(lines);
    all[start..].join("\n")
}
