use goblin::Object;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{ExportError, Result};

/// 入力バイナリの概要（ログ出力とキャッシュキー計算用）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryInfo {
    pub format: String,
    pub architecture: String,
    pub size: u64,
}

impl BinaryInfo {
    /// Ghidraに渡す前にフォーマットを判定する
    ///
    /// 未知のフォーマットもエラーにはしない（Ghidraは生イメージも読める）。
    pub fn probe(buffer: &[u8]) -> Self {
        let (format, architecture) = match Object::parse(buffer) {
            Ok(Object::Elf(elf)) => {
                let arch = match elf.header.e_machine {
                    0x03 => "x86",
                    0x3E => "x86-64",
                    0x28 => "ARM",
                    0xB7 => "ARM64",
                    0x08 => "MIPS",
                    0xF3 => "RISC-V",
                    _ => "Unknown",
                };
                ("ELF", arch)
            }
            Ok(Object::PE(pe)) => {
                let arch = match pe.header.coff_header.machine {
                    0x14c => "x86",
                    0x8664 => "x86-64",
                    0xaa64 => "ARM64",
                    _ => "Unknown",
                };
                ("PE", arch)
            }
            Ok(Object::Mach(_)) => ("Mach-O", "Unknown"),
            Ok(_) | Err(_) => ("Unknown", "Unknown"),
        };

        Self {
            format: format.to_string(),
            architecture: architecture.to_string(),
            size: buffer.len() as u64,
        }
    }

    pub fn is_known(&self) -> bool {
        self.format != "Unknown"
    }
}

impl fmt::Display for BinaryInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}, {} bytes", self.format, self.architecture, self.size)
    }
}

/// バイナリを読み込む。存在しなければ致命的エラー
pub fn read_binary(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(ExportError::BinaryNotFound(path.to_path_buf()));
    }
    Ok(fs::read(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 最小限の ELF64 ヘッダ（x86-64）
    fn elf64_header() -> Vec<u8> {
        let mut header = vec![0u8; 64];
        header[..4].copy_from_slice(b"\x7fELF");
        header[4] = 2; // ELFCLASS64
        header[5] = 1; // little endian
        header[6] = 1; // EV_CURRENT
        header[16..18].copy_from_slice(&2u16.to_le_bytes()); // ET_EXEC
        header[18..20].copy_from_slice(&0x3Eu16.to_le_bytes());
        header[20..24].copy_from_slice(&1u32.to_le_bytes());
        header[52..54].copy_from_slice(&64u16.to_le_bytes()); // e_ehsize
        header
    }

    #[test]
    fn test_probe_elf() {
        let info = BinaryInfo::probe(&elf64_header());
        assert_eq!(info.format, "ELF");
        assert_eq!(info.architecture, "x86-64");
        assert!(info.is_known());
    }

    #[test]
    fn test_probe_raw_bytes() {
        let info = BinaryInfo::probe(&[0x90; 16]);
        assert!(!info.is_known());
        assert_eq!(info.size, 16);
    }

    #[test]
    fn test_missing_binary() {
        let result = read_binary(Path::new("/nonexistent/binary"));
        assert!(matches!(result, Err(ExportError::BinaryNotFound(_))));
    }
}
