use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;
use std::time::Duration;

use crate::error::{ExportError, Result};
use crate::host::{AnalysisHost, Decompilation, DecompileStatus, Direction, FunctionEntry};

/// キャプチャファイルの1行（Ghidra側スクリプトが1関数ごとに書き出す）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapturedFunction {
    pub name: String,
    pub address: String,
    pub status: DecompileStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

impl CapturedFunction {
    fn decompilation(&self) -> Decompilation {
        Decompilation {
            status: self.status,
            code: self.code.clone(),
        }
    }
}

/// キャプチャ末尾の完了マーカー。全関数を書き終えた場合のみ出力される
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
struct CaptureTrailer {
    complete: bool,
    count: usize,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CaptureLine {
    Trailer(CaptureTrailer),
    Function(CapturedFunction),
}

/// キャプチャ済みの解析結果を再生するホスト
///
/// Ghidra Headless の実行結果、キャッシュ、`--capture` で渡されたファイルの
/// いずれもこの形で保持する。関数はホストの列挙順に並び、同じアドレスが
/// 複数回現れても1件ずつ保持する。
#[derive(Debug, Clone, Default)]
pub struct CapturedProgram {
    name: String,
    functions: Vec<CapturedFunction>,
}

impl CapturedProgram {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            functions: Vec::new(),
        }
    }

    pub fn from_functions(
        name: impl Into<String>,
        functions: impl IntoIterator<Item = CapturedFunction>,
    ) -> Self {
        Self {
            name: name.into(),
            functions: functions.into_iter().collect(),
        }
    }

    pub fn push(&mut self, function: CapturedFunction) {
        self.functions.push(function);
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    /// JSON Lines 形式のキャプチャを読み込む（空行は無視）
    ///
    /// 完了マーカーが無い、または件数が合わないキャプチャは途中で
    /// 打ち切られたものとして `IncompleteCapture` を返す。
    pub fn read_from(name: impl Into<String>, reader: impl BufRead) -> Result<Self> {
        let mut program = Self::new(name);
        let mut trailer = None;

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if trailer.is_some() {
                return Err(ExportError::IncompleteCapture {
                    expected: None,
                    found: program.len(),
                });
            }
            match serde_json::from_str(&line)
                .map_err(|source| ExportError::Capture { line: index + 1, source })?
            {
                CaptureLine::Function(function) => program.push(function),
                CaptureLine::Trailer(t) => trailer = Some(t),
            }
        }

        match trailer {
            Some(CaptureTrailer { complete: true, count }) if count == program.len() => Ok(program),
            Some(CaptureTrailer { count, .. }) => Err(ExportError::IncompleteCapture {
                expected: Some(count),
                found: program.len(),
            }),
            None => Err(ExportError::IncompleteCapture {
                expected: None,
                found: program.len(),
            }),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file = fs::File::open(path)?;
        Self::read_from(name, BufReader::new(file))
    }

    /// JSON Lines 形式で書き出す（キャッシュ保存用、完了マーカー付き）
    pub fn write_to(&self, mut writer: impl Write) -> Result<()> {
        for function in &self.functions {
            serde_json::to_writer(&mut writer, function)?;
            writer.write_all(b"\n")?;
        }
        let trailer = CaptureTrailer {
            complete: true,
            count: self.functions.len(),
        };
        serde_json::to_writer(&mut writer, &trailer)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }
}

impl AnalysisHost for CapturedProgram {
    fn program_name(&self) -> &str {
        &self.name
    }

    fn functions(&mut self, direction: Direction) -> Result<Vec<FunctionEntry>> {
        let entries = self.functions.iter().enumerate().map(|(id, f)| FunctionEntry {
            id,
            name: f.name.clone(),
            address: f.address.clone(),
        });

        Ok(match direction {
            Direction::Forward => entries.collect(),
            Direction::Backward => entries.rev().collect(),
        })
    }

    fn decompile(&mut self, function: &FunctionEntry, timeout: Duration) -> Result<Decompilation> {
        // 結果はキャプチャ時のタイムアウトで既に確定している
        tracing::trace!("Replaying {} (timeout {:?} ignored)", function.address, timeout);

        match self.functions.get(function.id) {
            Some(captured) if captured.address == function.address => Ok(captured.decompilation()),
            _ => {
                tracing::warn!("No captured result for {} @ {}", function.name, function.address);
                Ok(Decompilation::unavailable(DecompileStatus::Failed))
            }
        }
    }
}
