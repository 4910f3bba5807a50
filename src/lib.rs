//! # subbrute
//!
//! 基于DNS A记录查询的子域名暴破库。
//!
//! ## 特性
//!
//! - 🚀 **并发查询**: 任务数有上限的并发探测，每个候选域名一个任务
//! - 🔁 **超时重试**: 只有超时会重试，NXDOMAIN 等否定回答立即返回
//! - 📊 **结果输出**: 按完成顺序写出已确认的子域名，支持 TXT、JSON、CSV
//! - 🧩 **可替换组件**: 探测器、事件接收端和输出端都通过 trait 注入
//!
//! ## 快速开始
//!
//! ```rust,no_run
//! use subbrute::{brute_force_subdomains, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let domains = vec!["example.com".to_string()];
//!     let labels = vec!["www".to_string(), "mail".to_string()];
//!     let results = brute_force_subdomains(domains, labels, ScanConfig::default()).await?;
//!
//!     for result in &results {
//!         println!("{}: 发现 {} 个子域名", result.domain, result.confirmed.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## 自定义组件
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use subbrute::{MemorySink, RecordingSink, ScanConfig, SubdomainBruteEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig {
//!         concurrency: 20,
//!         ..Default::default()
//!     };
//!     let events = Arc::new(RecordingSink::new());
//!     let sink = Arc::new(MemorySink::new());
//!
//!     let engine = SubdomainBruteEngine::with_dns(config, events.clone(), sink.clone())?;
//!     engine.run(&["example.com".to_string()], vec!["www".to_string()]).await?;
//!
//!     println!("{:?}", events.found());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod handle;
pub mod input;
pub mod logger;
pub mod output;
pub mod probe;
pub mod retry;
pub mod state;
pub mod wildcard;

// 重新导出主要的公共API
pub use api::{brute_force_subdomains, SubdomainBruteEngine};
pub use config::{ConfigFile, ScanConfig, MAX_CONCURRENCY};
pub use error::ScanError;
pub use handle::{ResultAggregator, ScanResult};

// 导出其他有用的类型
pub use dispatch::{Completion, DispatchMessage, Dispatcher};
pub use events::{ConsoleReporter, EventSink, RecordingSink, ScanEvent};
pub use input::OutputFormat;
pub use output::{FileSink, MemorySink, ResultSink};
pub use probe::{DnsProbe, Probe, ProbeOutcome, ProbeResult};
pub use retry::{RetryOutcome, RetryPolicy};
pub use state::{ScanPhase, ScanState};
pub use wildcard::WildcardDetector;
