//! 命令行参数和输入文件解析

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use itertools::Itertools;
use lazy_static::lazy_static;
use log::{warn, LevelFilter};
use regex::Regex;

use crate::config::{parse_seconds, ConfigFile, ScanConfig};
use crate::error::{Result, ScanError};

/// 输出格式枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// 每行一个域名
    #[default]
    Txt,
    /// 带元数据的JSON
    Json,
    /// 带表头的CSV
    Csv,
}

impl OutputFormat {
    /// 输出文件扩展名
    pub fn extension(&self) -> &'static str {
        match self {
            OutputFormat::Txt => "txt",
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
        }
    }
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" => Ok(OutputFormat::Txt),
            "json" => Ok(OutputFormat::Json),
            "csv" => Ok(OutputFormat::Csv),
            _ => Err(format!("不支持的输出格式: {}。支持的格式: txt, json, csv", s)),
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "subbrute")]
#[command(version)]
#[command(
    about = "SubBrute - Fast and Accurate Subdomain Bruteforce Using DNS Queries",
    long_about = None,
    arg_required_else_help = true
)]
/// 命令行参数
pub struct Opts {
    /// file containing main domains, one per line
    #[arg(short, long)]
    pub domains: PathBuf,

    /// file containing subdomain labels, one per line
    #[arg(short, long)]
    pub subdomains: PathBuf,

    /// maximum number of concurrent queries (default: 100)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// attempts per subdomain when queries time out (default: 3)
    #[arg(long)]
    pub retries: Option<u32>,

    /// seconds to wait between attempts (default: 1.0)
    #[arg(long)]
    pub retry_delay: Option<f64>,

    /// per-query timeout in seconds (default: 5.0)
    #[arg(long)]
    pub timeout: Option<f64>,

    /// DNS servers to use, system configuration on default
    #[arg(short, long)]
    pub resolvers: Vec<IpAddr>,

    /// directory for the result files
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,

    /// output format (txt, json, csv)
    #[arg(long, default_value = "txt")]
    pub format: OutputFormat,

    /// only print found subdomains
    #[arg(long)]
    pub silent: bool,

    /// drop repeated labels from the wordlist
    #[arg(long)]
    pub dedup: bool,

    /// warn when a domain resolves random labels (wildcard DNS)
    #[arg(short = 'w', long)]
    pub wildcard_check: bool,

    /// JSON config file (maxRetries, retryDelay, concurrency, perQueryTimeout, resolvers, wildcardCheck)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    pub log_level: LevelFilter,

    /// also append logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Opts {
    /// 合并默认值、配置文件和命令行参数，命令行优先
    pub fn scan_config(&self) -> Result<ScanConfig> {
        let mut config = ScanConfig::default();
        if let Some(path) = &self.config {
            config.merge_file(ConfigFile::load(path)?)?;
        }

        if let Some(threads) = self.threads {
            config.concurrency = threads;
        }
        if let Some(retries) = self.retries {
            config.max_retries = retries;
        }
        if let Some(secs) = self.retry_delay {
            config.retry_delay = parse_seconds("retryDelay", secs)?;
        }
        if let Some(secs) = self.timeout {
            config.per_query_timeout = parse_seconds("perQueryTimeout", secs)?;
        }
        if !self.resolvers.is_empty() {
            config.resolvers = self.resolvers.clone();
        }
        if self.wildcard_check {
            config.wildcard_check = true;
        }

        config.validate()?;
        Ok(config)
    }
}

lazy_static! {
    static ref DOMAIN_RE: Option<Regex> = Regex::new(
        r"^[a-z0-9_](?:[a-z0-9_-]{0,61}[a-z0-9])?(?:\.[a-z0-9_](?:[a-z0-9_-]{0,61}[a-z0-9])?)*$"
    )
    .ok();
}

/// 校验并规范化域名（小写，去掉末尾的点）
pub fn normalize_domain(raw: &str) -> Option<String> {
    let domain = raw.trim().trim_end_matches('.').to_lowercase();
    let valid = DOMAIN_RE.as_ref().is_some_and(|re| re.is_match(&domain));
    if domain.is_empty() || domain.len() > 253 || !valid {
        return None;
    }
    Some(domain)
}

fn meaningful_lines(content: &str) -> impl Iterator<Item = &str> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

/// 解析域名列表，非法域名跳过并告警
pub fn parse_domains(content: &str) -> Vec<String> {
    meaningful_lines(content)
        .filter_map(|line| {
            let domain = normalize_domain(line);
            if domain.is_none() {
                warn!("跳过非法域名: {}", line);
            }
            domain
        })
        .collect()
}

/// 解析字典，默认保留重复项
pub fn parse_labels(content: &str, dedup: bool) -> Vec<String> {
    let labels = meaningful_lines(content).map(str::to_string);
    if dedup {
        labels.unique().collect()
    } else {
        labels.collect()
    }
}

fn read_input(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|source| ScanError::ReadInput {
        path: path.to_path_buf(),
        source,
    })
}

/// 从文件读取域名列表
pub fn read_domains(path: &Path) -> Result<Vec<String>> {
    Ok(parse_domains(&read_input(path)?))
}

/// 从文件读取字典
pub fn read_labels(path: &Path, dedup: bool) -> Result<Vec<String>> {
    Ok(parse_labels(&read_input(path)?, dedup))
}
