use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::ExportConfig;
use crate::error::Result;
use crate::host::{AnalysisHost, DecompileStatus};

/// 出力配列の1要素
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FunctionRecord {
    pub name: String,
    pub address: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<DecompileStatus>,
}

/// JSON配列を1要素ずつ書き出すライター
///
/// 全体をメモリに溜めず、要素ごとに `serde_json` で直接書き込む。
pub struct JsonArrayWriter<W: Write> {
    writer: W,
    count: usize,
}

impl<W: Write> JsonArrayWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(b"[")?;
        Ok(Self { writer, count: 0 })
    }

    pub fn push<T: Serialize>(&mut self, element: &T) -> Result<()> {
        if self.count > 0 {
            self.writer.write_all(b",")?;
        }
        serde_json::to_writer(&mut self.writer, element)?;
        self.count += 1;
        Ok(())
    }

    /// 配列を閉じて内側のライターと要素数を返す
    pub fn finish(mut self) -> Result<(W, usize)> {
        self.writer.write_all(b"]")?;
        self.writer.flush()?;
        Ok((self.writer, self.count))
    }
}

/// エクスポート結果の統計
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExportStats {
    pub exported: usize,
    pub completed: usize,
    pub no_result: usize,
    pub failed: usize,
    pub timed_out: usize,
}

impl ExportStats {
    fn record(&mut self, status: DecompileStatus) {
        self.exported += 1;
        match status {
            DecompileStatus::Completed => self.completed += 1,
            DecompileStatus::NoResult => self.no_result += 1,
            DecompileStatus::Failed => self.failed += 1,
            DecompileStatus::TimedOut => self.timed_out += 1,
        }
    }

    pub fn degraded(&self) -> usize {
        self.exported - self.completed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub stats: ExportStats,
    pub output_path: PathBuf,
}

impl fmt::Display for ExportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Success: Exported {} functions to {}",
            self.stats.exported,
            self.output_path.display()
        )
    }
}

/// 全関数をデコンパイルして `writer` にJSON配列として書き出す
///
/// デコンパイルが完了しなかった関数も要素として残し、`code` は空文字列にする。
/// ホストが返した `Err` はそのまま伝播して処理全体を中断する。
pub fn export_to_writer<H, W>(host: &mut H, config: &ExportConfig, writer: W) -> Result<(W, ExportStats)>
where
    H: AnalysisHost + ?Sized,
    W: Write,
{
    let functions = host.functions(config.direction)?;
    tracing::info!(
        "Enumerated {} functions in {}",
        functions.len(),
        host.program_name()
    );

    let mut array = JsonArrayWriter::new(writer)?;
    let mut stats = ExportStats::default();

    for function in functions {
        let decompiled = host.decompile(&function, config.timeout)?;
        let status = decompiled.status;

        if status != DecompileStatus::Completed {
            tracing::debug!(
                "Decompilation of {} @ {} did not complete ({:?}), exporting empty code",
                function.name,
                function.address,
                status
            );
        }

        array.push(&FunctionRecord {
            name: function.name,
            address: function.address,
            code: decompiled.into_code(),
            status: config.with_status.then_some(status),
        })?;
        stats.record(status);
    }

    let (writer, count) = array.finish()?;
    debug_assert_eq!(count, stats.exported);

    Ok((writer, stats))
}

/// 設定された出力先ファイルへエクスポートする
pub fn export_program<H>(host: &mut H, config: &ExportConfig) -> Result<ExportSummary>
where
    H: AnalysisHost + ?Sized,
{
    let file = File::create(&config.output_path)?;
    let (_, stats) = export_to_writer(host, config, BufWriter::new(file))?;

    if stats.degraded() > 0 {
        tracing::warn!(
            "{} of {} functions exported without code (no result: {}, failed: {}, timed out: {})",
            stats.degraded(),
            stats.exported,
            stats.no_result,
            stats.failed,
            stats.timed_out
        );
    }

    Ok(ExportSummary {
        stats,
        output_path: config.output_path.clone(),
    })
}
