use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::Result;

/// 解析ホストが報告する関数1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionEntry {
    /// ホスト内での識別子（キャプチャでは行の位置）
    pub id: usize,
    pub name: String,
    /// エントリーアドレス（ホスト固有の表記、例: `00401000`）
    pub address: String,
}

/// 関数列挙の向き（結果集合は変わらず、順序のみ変わる）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

/// デコンパイル結果の状態
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecompileStatus {
    /// 完了し、C疑似コードが得られた
    Completed,
    /// 完了したがデコンパイル結果が null
    NoResult,
    /// デコンパイラ内部エラー
    Failed,
    /// タイムアウト
    TimedOut,
}

/// 1関数分のデコンパイル結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decompilation {
    pub status: DecompileStatus,
    pub code: Option<String>,
}

impl Decompilation {
    pub fn completed(code: impl Into<String>) -> Self {
        Self {
            status: DecompileStatus::Completed,
            code: Some(code.into()),
        }
    }

    pub fn unavailable(status: DecompileStatus) -> Self {
        Self { status, code: None }
    }

    /// 出力に書く文字列。完了以外はすべて空文字列に縮退する
    pub fn into_code(self) -> String {
        match (self.status, self.code) {
            (DecompileStatus::Completed, Some(code)) => code,
            _ => String::new(),
        }
    }
}

/// 解析ホストのアダプタ
///
/// 実装は Ghidra Headless（`GhidraHeadless`）と、キャプチャ再生用の
/// `CapturedProgram` の2つ。
pub trait AnalysisHost {
    /// プログラム名（ログ用）
    fn program_name(&self) -> &str;

    /// 全関数を列挙
    fn functions(&mut self, direction: Direction) -> Result<Vec<FunctionEntry>>;

    /// 1関数をデコンパイル
    ///
    /// 戻り値の `Err` は致命的エラー。デコンパイル自体の失敗は
    /// `Ok(Decompilation)` の状態で表す。
    fn decompile(&mut self, function: &FunctionEntry, timeout: Duration) -> Result<Decompilation>;
}
