//! 日志初始化：`时间 - 级别 - 消息` 格式，可同时写入日志文件

use std::fs::OpenOptions;
use std::io::{self, IsTerminal, Write};
use std::path::Path;

use colored::*;
use env_logger::{Builder, Target};
use log::{Level, LevelFilter};

use crate::error::{Result, ScanError};

/// 同时写入两个目标，用于 stderr + 日志文件
pub struct TeeWriter<A, B> {
    first: A,
    second: B,
}

impl<A: Write, B: Write> TeeWriter<A, B> {
    /// 组合两个写入目标
    pub fn new(first: A, second: B) -> Self {
        TeeWriter { first, second }
    }
}

impl<A: Write, B: Write> Write for TeeWriter<A, B> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.first.write_all(buf)?;
        self.second.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.first.flush()?;
        self.second.flush()
    }
}

fn colorize(level: Level) -> ColoredString {
    let label = level.to_string();
    match level {
        Level::Error => label.red(),
        Level::Warn => label.yellow(),
        Level::Info => label.blue(),
        Level::Debug => label.magenta(),
        Level::Trace => label.normal(),
    }
}

/// 初始化日志
///
/// 先读取 `RUST_LOG`，再用 `level` 覆盖本 crate 的级别。
/// 日志总是写到 stderr；指定 `log_file` 时同时追加到文件（此时不带颜色）。
pub fn init_logger(level: LevelFilter, log_file: Option<&Path>) -> Result<()> {
    let mut builder = Builder::from_default_env();
    builder.filter_level(level);
    builder.filter_module("trust_dns_proto", LevelFilter::Warn);
    builder.filter_module("trust_dns_resolver", LevelFilter::Warn);
    builder.filter_module("subbrute", level);

    let use_colors = match log_file {
        Some(path) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| {
                    ScanError::Logger(format!("cannot open {}: {}", path.display(), e))
                })?;
            builder.target(Target::Pipe(Box::new(TeeWriter::new(io::stderr(), file))));
            false
        }
        None => std::io::stderr().is_terminal(),
    };

    builder.format(move |buf, record| {
        let level = if use_colors {
            colorize(record.level()).to_string()
        } else {
            record.level().to_string()
        };
        writeln!(
            buf,
            "{} - {} - {}",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S,%3f"),
            level,
            record.args()
        )
    });

    builder
        .try_init()
        .map_err(|e| ScanError::Logger(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_reports_error() {
        // 进程内只能初始化一次，第二次应返回错误而不是 panic
        let _ = init_logger(LevelFilter::Info, None);
        let second = init_logger(LevelFilter::Debug, None);
        assert!(matches!(second, Err(ScanError::Logger(_))));
    }

    #[test]
    fn test_unwritable_log_file() {
        let path = Path::new("/nonexistent/dir/subbrute.log");
        let result = init_logger(LevelFilter::Info, Some(path));
        assert!(matches!(result, Err(ScanError::Logger(_))));
    }

    #[test]
    fn test_tee_writes_both_targets() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("subbrute.log");
        let file = OpenOptions::new().create(true).append(true).open(&path).unwrap();

        let mut console = Vec::new();
        {
            let mut tee = TeeWriter::new(&mut console, file);
            writeln!(tee, "Found: www.example.com").unwrap();
            tee.flush().unwrap();
        }

        assert_eq!(String::from_utf8(console).unwrap(), "Found: www.example.com\n");
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "Found: www.example.com\n"
        );
    }
}
