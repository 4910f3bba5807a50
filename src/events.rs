//! 扫描进度和事件上报
//!
//! 事件通过注入的 [`EventSink`] 传递，生命周期跟随一次运行，不依赖进程级的全局状态。

use std::fmt;
use std::sync::Mutex;

use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};

/// 扫描过程中产生的事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanEvent {
    /// 开始扫描一个域名
    ScanStarted {
        /// 目标域名
        domain: String,
        /// 候选子域名数
        total: usize,
    },
    /// 又有一个候选完成
    Progress {
        /// 目标域名
        domain: String,
        /// 已完成数
        current: usize,
        /// 候选总数
        total: usize,
    },
    /// 确认存在的子域名
    Found {
        /// 目标域名
        domain: String,
        /// 完整子域名
        name: String,
    },
    /// 未归类的探测失败，按不存在统计
    ProbeFailed {
        /// 目标域名
        domain: String,
        /// 完整子域名
        name: String,
        /// 失败原因
        cause: String,
    },
    /// 检测到泛解析
    WildcardDetected {
        /// 目标域名
        domain: String,
    },
    /// 扫描被中断
    Interrupted {
        /// 目标域名
        domain: String,
        /// 中断前已完成数
        completed: usize,
        /// 候选总数
        total: usize,
    },
    /// 一个域名扫描结束
    Summary {
        /// 目标域名
        domain: String,
        /// 确认存在的数量
        found: usize,
        /// 候选总数
        total: usize,
        /// 未归类失败的数量
        failed: usize,
        /// 结果写入的位置
        location: Option<String>,
    },
}

impl fmt::Display for ScanEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScanEvent::ScanStarted { domain, total } => {
                write!(f, "Checking {} subdomains for {}", total, domain)
            }
            ScanEvent::Progress { current, total, .. } => write!(f, "{}/{}", current, total),
            ScanEvent::Found { name, .. } => write!(f, "Found: {}", name),
            ScanEvent::ProbeFailed { domain, name, cause } => {
                write!(f, "Error checking {} ({}): {}", name, domain, cause)
            }
            ScanEvent::WildcardDetected { domain } => {
                write!(f, "Wildcard DNS detected for {}", domain)
            }
            ScanEvent::Interrupted { domain, completed, total } => {
                write!(f, "Scan of {} interrupted after {}/{}", domain, completed, total)
            }
            ScanEvent::Summary {
                domain,
                found,
                total,
                failed,
                location,
            } => {
                write!(f, "{}: {} of {} subdomains found", domain, found, total)?;
                if *failed > 0 {
                    write!(f, ", {} failed", failed)?;
                }
                if let Some(location) = location {
                    write!(f, ", results saved to {}", location)?;
                }
                Ok(())
            }
        }
    }
}

/// 事件接收端
pub trait EventSink: Send + Sync {
    /// 处理一个事件，不能阻塞扫描
    fn emit(&self, event: &ScanEvent);
}

/// 静默模式下一个事件的去向
#[derive(Debug, PartialEq, Eq)]
enum SilentLine {
    /// 写到 stdout，供管道使用
    Stdout(String),
    /// 通过 `error!` 写到 stderr
    Diagnostic(String),
}

fn silent_line(event: &ScanEvent) -> Option<SilentLine> {
    match event {
        ScanEvent::Found { name, .. } => Some(SilentLine::Stdout(name.clone())),
        ScanEvent::ProbeFailed { .. } => Some(SilentLine::Diagnostic(event.to_string())),
        _ => None,
    }
}

/// 终端输出：进度条、发现的域名以及日志
pub struct ConsoleReporter {
    silent: bool,
    bar: Mutex<Option<ProgressBar>>,
}

impl ConsoleReporter {
    /// `silent` 模式下 stdout 只输出发现的域名，失败诊断仍写到 stderr
    pub fn new(silent: bool) -> Self {
        ConsoleReporter {
            silent,
            bar: Mutex::new(None),
        }
    }

    fn new_bar(domain: &str, total: usize) -> ProgressBar {
        let bar = ProgressBar::new(total as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({per_sec})")
        {
            bar.set_style(style.progress_chars("█▓▒░ "));
        }
        bar.set_message(format!("Checking subdomains for {}", domain));
        bar
    }

    /// 在进度条上方输出，避免打乱进度条
    fn with_bar<F: FnOnce(Option<&ProgressBar>)>(&self, f: F) {
        match self.bar.lock() {
            Ok(guard) => f(guard.as_ref()),
            Err(_) => f(None),
        }
    }
}

impl EventSink for ConsoleReporter {
    fn emit(&self, event: &ScanEvent) {
        if self.silent {
            match silent_line(event) {
                Some(SilentLine::Stdout(line)) => println!("{}", line),
                Some(SilentLine::Diagnostic(line)) => error!("{}", line),
                None => {}
            }
            return;
        }

        match event {
            ScanEvent::ScanStarted { domain, total } => {
                info!("开始扫描 {}，共 {} 个候选子域名", domain, total);
                if let Ok(mut guard) = self.bar.lock() {
                    *guard = Some(Self::new_bar(domain, *total));
                }
            }
            ScanEvent::Progress { current, .. } => {
                self.with_bar(|bar| {
                    if let Some(bar) = bar {
                        bar.set_position(*current as u64);
                    }
                });
            }
            ScanEvent::Found { name, .. } => {
                let line = format!("{} {}", "Found:".green().bold(), name);
                self.with_bar(|bar| match bar {
                    Some(bar) => bar.println(line),
                    None => println!("{}", line),
                });
            }
            ScanEvent::ProbeFailed { .. } | ScanEvent::WildcardDetected { .. } => {
                let is_error = matches!(event, ScanEvent::ProbeFailed { .. });
                self.with_bar(|bar| {
                    let log_it = || {
                        if is_error {
                            error!("{}", event);
                        } else {
                            warn!("{}", event);
                        }
                    };
                    match bar {
                        Some(bar) => bar.suspend(log_it),
                        None => log_it(),
                    }
                });
            }
            ScanEvent::Interrupted { .. } => {
                if let Ok(mut guard) = self.bar.lock() {
                    if let Some(bar) = guard.take() {
                        bar.abandon();
                    }
                }
                warn!("{}", event);
            }
            ScanEvent::Summary { .. } => {
                if let Ok(mut guard) = self.bar.lock() {
                    if let Some(bar) = guard.take() {
                        bar.finish_and_clear();
                    }
                }
                info!("{}", event);
            }
        }
    }
}

/// 把事件记录在内存中，用于嵌入调用方和测试
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<ScanEvent>>,
}

impl RecordingSink {
    /// 创建空的记录器
    pub fn new() -> Self {
        Self::default()
    }

    /// 已记录事件的快照
    pub fn events(&self) -> Vec<ScanEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(_) => Vec::new(),
        }
    }

    /// 所有 `Found` 事件中的域名
    pub fn found(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                ScanEvent::Found { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    /// 所有 `Summary` 事件
    pub fn summaries(&self) -> Vec<ScanEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ScanEvent::Summary { .. }))
            .collect()
    }

    /// 所有 `ProbeFailed` 事件
    pub fn failures(&self) -> Vec<ScanEvent> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, ScanEvent::ProbeFailed { .. }))
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: &ScanEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}
