//! 结果写出：TXT、JSON、CSV 文件或内存

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};

use crate::error::{Result, ScanError};
use crate::input::OutputFormat;

/// 已确认子域名的输出端，每个域名的扫描只写一次
pub trait ResultSink: Send + Sync {
    /// 写出一个域名的已确认集合，返回结果所在位置的描述
    fn write(&self, domain: &str, confirmed: &[String]) -> Result<Option<String>>;
}

/// JSON导出结构
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    /// 目标域名
    pub domain: String,
    /// 已确认的子域名
    pub subdomains: Vec<String>,
    /// 子域名数量
    pub count: usize,
    /// 导出时间（UTC）
    pub export_time: String,
}

/// 写入文件，文件名由域名决定
#[derive(Debug, Clone)]
pub struct FileSink {
    dir: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    /// 输出到 `dir` 目录，不存在时自动创建
    pub fn new(dir: impl Into<PathBuf>, format: OutputFormat) -> Self {
        FileSink {
            dir: dir.into(),
            format,
        }
    }

    /// 域名对应的输出文件路径
    pub fn path_for(&self, domain: &str) -> PathBuf {
        self.dir.join(format!(
            "existing_subdomains_{}.{}",
            sanitize_file_component(domain),
            self.format.extension()
        ))
    }

    fn write_file(&self, path: &Path, domain: &str, confirmed: &[String]) -> std::io::Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        match self.format {
            OutputFormat::Txt => {
                writer.write_all(export_to_txt(confirmed).as_bytes())?;
            }
            OutputFormat::Csv => {
                writer.write_all(export_to_csv(confirmed).as_bytes())?;
            }
            OutputFormat::Json => {
                let data = ExportData {
                    domain: domain.to_string(),
                    subdomains: confirmed.to_vec(),
                    count: confirmed.len(),
                    export_time: chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC").to_string(),
                };
                serde_json::to_writer_pretty(&mut writer, &data)?;
                writer.write_all(b"\n")?;
            }
        }
        writer.flush()
    }
}

impl ResultSink for FileSink {
    fn write(&self, domain: &str, confirmed: &[String]) -> Result<Option<String>> {
        if !self.dir.as_os_str().is_empty() && !self.dir.exists() {
            fs::create_dir_all(&self.dir).map_err(|source| ScanError::WriteOutput {
                path: self.dir.clone(),
                source,
            })?;
        }
        let path = self.path_for(domain);
        self.write_file(&path, domain, confirmed)
            .map_err(|source| ScanError::WriteOutput {
                path: path.clone(),
                source,
            })?;
        Ok(Some(path.display().to_string()))
    }
}

/// 保存在内存中，用于测试和库调用
#[derive(Debug, Default)]
pub struct MemorySink {
    writes: Mutex<Vec<(String, Vec<String>)>>,
}

impl MemorySink {
    /// 创建空的内存输出端
    pub fn new() -> Self {
        Self::default()
    }

    /// 所有写入记录，按写入顺序
    pub fn writes(&self) -> Vec<(String, Vec<String>)> {
        match self.writes.lock() {
            Ok(writes) => writes.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// 某个域名最后一次写入的内容（txt格式）
    pub fn rendered(&self, domain: &str) -> Option<String> {
        self.writes()
            .into_iter()
            .rev()
            .find(|(d, _)| d == domain)
            .map(|(_, names)| export_to_txt(&names))
    }
}

impl ResultSink for MemorySink {
    fn write(&self, domain: &str, confirmed: &[String]) -> Result<Option<String>> {
        if let Ok(mut writes) = self.writes.lock() {
            writes.push((domain.to_string(), confirmed.to_vec()));
        }
        Ok(None)
    }
}

/// 每行一个域名，以换行结尾
pub fn export_to_txt(confirmed: &[String]) -> String {
    let mut txt = String::new();
    for name in confirmed {
        txt.push_str(name);
        txt.push('\n');
    }
    txt
}

fn export_to_csv(confirmed: &[String]) -> String {
    let mut csv = String::from("subdomain\n");
    for name in confirmed {
        csv.push_str(&escape_csv(name));
        csv.push('\n');
    }
    csv
}

/// CSV转义
fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

fn sanitize_file_component(domain: &str) -> String {
    domain
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}
