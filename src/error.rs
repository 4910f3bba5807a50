//! 错误类型
//!
//! 单个候选域名的DNS失败不会出现在这里，它们以 [`ProbeOutcome`](crate::probe::ProbeOutcome)
//! 的形式交给聚合器。这里只有会中止整个运行或单个扫描的错误。

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::state::ScanPhase;

/// 扫描引擎错误
#[derive(Error, Debug)]
pub enum ScanError {
    /// 读取输入文件（域名列表、字典）失败
    #[error("failed to read {path}: {source}")]
    ReadInput {
        /// 输入文件路径
        path: PathBuf,
        /// 底层IO错误
        #[source]
        source: io::Error,
    },

    /// 写入结果失败
    #[error("failed to write results to {path}: {source}")]
    WriteOutput {
        /// 输出文件路径
        path: PathBuf,
        /// 底层IO错误
        #[source]
        source: io::Error,
    },

    /// 配置非法
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// 配置文件无法解析
    #[error("failed to parse config file {path}: {source}")]
    ConfigFile {
        /// 配置文件路径
        path: PathBuf,
        /// JSON解析错误
        #[source]
        source: serde_json::Error,
    },

    /// 扫描状态机的非法跳转
    #[error("invalid scan state transition: {from:?} -> {to:?}")]
    InvalidTransition {
        /// 当前状态
        from: ScanPhase,
        /// 目标状态
        to: ScanPhase,
    },

    /// 日志初始化失败
    #[error("logger initialization error: {0}")]
    Logger(String),
}

/// 本 crate 的结果类型
pub type Result<T> = std::result::Result<T, ScanError>;
