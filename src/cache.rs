use std::fs;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Duration;
use xxhash_rust::xxh3::Xxh3;

use crate::capture::CapturedProgram;
use crate::error::Result;

/// Ghidra Headless のキャプチャをディスクにキャッシュする
///
/// キーはバイナリ内容の xxh3 ハッシュとタイムアウト。同じバイナリを
/// 同じ条件で再エクスポートする場合は Ghidra を起動しない。
pub struct CaptureCache {
    cache_dir: PathBuf,
}

impl CaptureCache {
    pub fn new(cache_dir: impl AsRef<Path>) -> Result<Self> {
        let cache_dir = cache_dir.as_ref().to_path_buf();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir)?;
        }
        Ok(Self { cache_dir })
    }

    pub fn key(binary: &[u8], timeout: Duration) -> String {
        let mut hasher = Xxh3::new();
        hasher.update(&(binary.len() as u64).to_le_bytes());
        hasher.update(binary);
        format!("{:016x}_{}s", hasher.digest(), timeout.as_secs())
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.jsonl", key))
    }

    /// キャッシュ済みキャプチャを取得。壊れたエントリはミス扱い
    pub fn load(&self, key: &str, program_name: &str) -> Option<CapturedProgram> {
        let path = self.entry_path(key);
        let file = fs::File::open(&path).ok()?;

        match CapturedProgram::read_from(program_name, BufReader::new(file)) {
            Ok(program) => {
                tracing::info!("Cache hit for {} ({} functions)", program_name, program.len());
                Some(program)
            }
            Err(e) => {
                tracing::warn!("Ignoring corrupt cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn store(&self, key: &str, program: &CapturedProgram) -> Result<()> {
        let path = self.entry_path(key);
        let file = fs::File::create(&path)?;
        program.write_to(BufWriter::new(file))?;
        tracing::debug!("Cached capture at {}", path.display());
        Ok(())
    }

    /// キャッシュクリア（`*.jsonl` のみ削除）
    pub fn clear(&self) -> Result<usize> {
        let mut removed = 0;
        for entry in fs::read_dir(&self.cache_dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) == Some("jsonl") {
                fs::remove_file(path)?;
                removed += 1;
            }
        }
        tracing::info!("Cache cleared ({} entries)", removed);
        Ok(removed)
    }

    pub fn entry_count(&self) -> usize {
        fs::read_dir(&self.cache_dir)
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .filter(|e| e.path().extension().and_then(|s| s.to_str()) == Some("jsonl"))
                    .count()
            })
            .unwrap_or(0)
    }
}
