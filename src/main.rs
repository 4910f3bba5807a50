use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};

use subbrute::input::{read_domains, read_labels, Opts};
use subbrute::logger::init_logger;
use subbrute::{ConsoleReporter, FileSink, SubdomainBruteEngine};

#[tokio::main]
async fn main() {
    let opts = Opts::parse();

    if let Err(e) = init_logger(opts.log_level, opts.log_file.as_deref()) {
        eprintln!("日志初始化失败: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(opts).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

/// 执行域名暴破主逻辑
async fn run(opts: Opts) -> anyhow::Result<()> {
    let config = opts.scan_config().context("invalid configuration")?;

    let domains = read_domains(&opts.domains)
        .with_context(|| format!("Failed to read domains file {}", opts.domains.display()))?;
    let labels = read_labels(&opts.subdomains, opts.dedup)
        .with_context(|| format!("Failed to read subdomains file {}", opts.subdomains.display()))?;

    if domains.is_empty() {
        warn!("域名列表为空，没有需要扫描的域名");
        return Ok(());
    }
    info!(
        "目标域名: {}，候选子域名: {}，并发数: {}",
        domains.len(),
        labels.len(),
        config.concurrency
    );

    let engine = SubdomainBruteEngine::with_dns(
        config,
        Arc::new(ConsoleReporter::new(opts.silent)),
        Arc::new(FileSink::new(&opts.output_dir, opts.format)),
    )?;

    let shutdown = async {
        if tokio::signal::ctrl_c().await.is_err() {
            // 无法监听信号时不中断扫描
            std::future::pending::<()>().await;
        }
    };
    let results = engine.run_until(&domains, labels, shutdown).await?;

    for result in &results {
        info!("{}", result);
    }
    let found: usize = results.iter().map(|r| r.confirmed.len()).sum();
    info!("完成，{} 个域名共发现 {} 个子域名", results.len(), found);
    if results.iter().any(|r| r.interrupted) {
        warn!("扫描被中断，部分域名未完成");
    }
    Ok(())
}
