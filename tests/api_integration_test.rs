use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_test::{assert_err, assert_ok};

use subbrute::{
    MemorySink, Probe, ProbeResult, RecordingSink, ScanConfig, ScanError, ScanEvent,
    SubdomainBruteEngine,
};

/// 固定应答的DNS，未登记的域名返回不存在
struct OracleProbe {
    answers: HashMap<String, ProbeResult>,
    calls: AtomicUsize,
}

impl OracleProbe {
    fn new(answers: &[(&str, ProbeResult)]) -> Self {
        OracleProbe {
            answers: answers
                .iter()
                .map(|(name, result)| (name.to_string(), result.clone()))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Probe for OracleProbe {
    async fn probe(&self, name: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::task::yield_now().await;
        self.answers.get(name).cloned().unwrap_or(ProbeResult::Absent)
    }
}

/// 每个域名按脚本依次返回结果
struct ScriptedProbe {
    scripts: Mutex<HashMap<String, Vec<ProbeResult>>>,
    calls: AtomicUsize,
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, name: &str) -> ProbeResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(name) {
            Some(script) if !script.is_empty() => script.remove(0),
            _ => ProbeResult::Absent,
        }
    }
}

/// `hang.` 开头的域名永远不返回
struct HangingProbe;

#[async_trait]
impl Probe for HangingProbe {
    async fn probe(&self, name: &str) -> ProbeResult {
        if name.starts_with("hang.") {
            std::future::pending::<()>().await;
        }
        ProbeResult::Exists
    }
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn fast_config() -> ScanConfig {
    ScanConfig {
        retry_delay: Duration::from_millis(1),
        concurrency: 8,
        ..Default::default()
    }
}

fn engine(
    config: ScanConfig,
    probe: Arc<dyn Probe>,
) -> (SubdomainBruteEngine, Arc<RecordingSink>, Arc<MemorySink>) {
    let events = Arc::new(RecordingSink::new());
    let sink = Arc::new(MemorySink::new());
    let engine = SubdomainBruteEngine::new(config, probe, events.clone(), sink.clone()).unwrap();
    (engine, events, sink)
}

#[tokio::test]
async fn test_end_to_end_found_and_absent() {
    let probe = Arc::new(OracleProbe::new(&[
        ("www.example.com", ProbeResult::Exists),
        ("mail.example.com", ProbeResult::Exists),
        ("ghost.example.com", ProbeResult::Absent),
    ]));
    let (engine, events, sink) = engine(fast_config(), probe);

    let results = engine
        .run(&["example.com".to_string()], labels(&["www", "mail", "ghost"]))
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    let confirmed: HashSet<String> = results[0].confirmed.iter().cloned().collect();
    let expected: HashSet<String> = ["www.example.com", "mail.example.com"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(confirmed, expected);

    // 输出端只写一次，恰好两行
    let writes = sink.writes();
    assert_eq!(writes.len(), 1);
    let rendered = sink.rendered("example.com").unwrap();
    assert_eq!(rendered.lines().count(), 2);
    assert!(rendered.ends_with('\n'));
    let lines: HashSet<String> = rendered.lines().map(|s| s.to_string()).collect();
    assert_eq!(lines, expected);

    assert_eq!(events.found().len(), 2);
    let summaries = events.summaries();
    assert_eq!(summaries.len(), 1);
    assert!(matches!(
        &summaries[0],
        ScanEvent::Summary { found: 2, total: 3, failed: 0, .. }
    ));
}

#[tokio::test]
async fn test_timeouts_then_exists() {
    let mut scripts = HashMap::new();
    scripts.insert(
        "a.example.com".to_string(),
        vec![ProbeResult::Timeout, ProbeResult::Timeout, ProbeResult::Exists],
    );
    let probe = Arc::new(ScriptedProbe {
        scripts: Mutex::new(scripts),
        calls: AtomicUsize::new(0),
    });
    let (engine, _events, _sink) = engine(fast_config(), probe.clone());

    let result = engine
        .scan_domain("example.com", labels(&["a"]).into())
        .await
        .unwrap();

    assert_eq!(result.confirmed, vec!["a.example.com"]);
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_always_timeout_resolves_absent() {
    let probe = Arc::new(OracleProbe::new(&[
        ("slow.example.com", ProbeResult::Timeout),
        ("other.example.com", ProbeResult::Timeout),
    ]));
    let (engine, events, _sink) = engine(fast_config(), probe.clone());

    let result = engine
        .scan_domain("example.com", labels(&["slow", "other"]).into())
        .await
        .unwrap();

    assert!(result.confirmed.is_empty());
    assert_eq!(result.completed, 2);
    // 每个候选恰好尝试 maxRetries 次
    assert_eq!(probe.calls.load(Ordering::SeqCst), 6);
    // 超时耗尽不是错误
    assert!(events.failures().is_empty());
}

#[tokio::test]
async fn test_unclassified_failure_does_not_stop_scan() {
    let probe = Arc::new(OracleProbe::new(&[
        ("www.example.com", ProbeResult::Exists),
        ("bad.example.com", ProbeResult::Error("malformed response".to_string())),
        ("api.example.com", ProbeResult::Exists),
    ]));
    let (engine, events, _sink) = engine(fast_config(), probe.clone());

    let result = engine
        .scan_domain("example.com", labels(&["www", "bad", "api"]).into())
        .await
        .unwrap();

    assert_eq!(result.confirmed.len(), 2);
    assert_eq!(result.failed, 1);
    // 未归类错误不重试
    assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    assert_eq!(
        events.failures(),
        vec![ScanEvent::ProbeFailed {
            domain: "example.com".to_string(),
            name: "bad.example.com".to_string(),
            cause: "malformed response".to_string(),
        }]
    );
}

#[tokio::test]
async fn test_confirmed_set_is_subset_and_idempotent() {
    let answers: Vec<(String, ProbeResult)> = (0..40)
        .map(|i| {
            let result = if i % 3 == 0 {
                ProbeResult::Exists
            } else {
                ProbeResult::Absent
            };
            (format!("host{}.example.org", i), result)
        })
        .collect();
    let answer_refs: Vec<(&str, ProbeResult)> =
        answers.iter().map(|(n, r)| (n.as_str(), r.clone())).collect();
    let wordlist: Vec<String> = (0..40).map(|i| format!("host{}", i)).collect();
    let candidates: HashSet<String> =
        wordlist.iter().map(|l| format!("{}.example.org", l)).collect();

    let mut runs = Vec::new();
    for _ in 0..2 {
        let oracle = Arc::new(OracleProbe::new(&answer_refs));
        let (engine, _events, _sink) = engine(fast_config(), oracle);
        let result = engine
            .scan_domain("example.org", wordlist.clone().into())
            .await
            .unwrap();
        let confirmed: HashSet<String> = result.confirmed.into_iter().collect();
        assert!(confirmed.is_subset(&candidates));
        runs.push(confirmed);
    }

    assert_eq!(runs[0], runs[1]);
    assert_eq!(runs[0].len(), 14);
}

#[tokio::test]
async fn test_multiple_domains_share_wordlist() {
    let probe = Arc::new(OracleProbe::new(&[
        ("www.example.com", ProbeResult::Exists),
        ("mail.example.net", ProbeResult::Exists),
    ]));
    let (engine, events, sink) = engine(fast_config(), probe);

    let results = engine
        .run(
            &["example.com".to_string(), "example.net".to_string()],
            labels(&["www", "mail"]),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].confirmed, vec!["www.example.com"]);
    assert_eq!(results[1].confirmed, vec!["mail.example.net"]);
    assert_eq!(sink.writes().len(), 2);
    assert_eq!(events.summaries().len(), 2);
}

#[tokio::test]
async fn test_empty_wordlist() {
    let (engine, events, sink) = engine(fast_config(), Arc::new(OracleProbe::new(&[])));

    let result = engine
        .scan_domain("example.com", labels(&[]).into())
        .await
        .unwrap();

    assert!(result.confirmed.is_empty());
    assert_eq!(result.total, 0);
    assert_eq!(sink.rendered("example.com").as_deref(), Some(""));
    assert!(matches!(
        &events.summaries()[0],
        ScanEvent::Summary { found: 0, total: 0, .. }
    ));
}

#[tokio::test]
async fn test_interrupt_preserves_completed_results() {
    let (engine, events, sink) = engine(fast_config(), Arc::new(HangingProbe));

    let results = engine
        .run_until(
            &["example.com".to_string(), "example.net".to_string()],
            labels(&["www", "hang", "mail"]),
            tokio::time::sleep(Duration::from_millis(200)),
        )
        .await
        .unwrap();

    // 第二个域名不再扫描
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert!(result.interrupted);
    assert_eq!(result.completed, 2);
    let confirmed: HashSet<&str> = result.confirmed.iter().map(|s| s.as_str()).collect();
    assert_eq!(confirmed, HashSet::from(["www.example.com", "mail.example.com"]));

    assert_eq!(sink.writes().len(), 1);
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, ScanEvent::Interrupted { completed: 2, total: 3, .. })));
}

#[tokio::test]
async fn test_wildcard_detection_event() {
    // 任何域名都能解析
    let (engine, events, _sink) = engine(
        ScanConfig {
            wildcard_check: true,
            ..fast_config()
        },
        Arc::new(HangingProbe),
    );

    let result = assert_ok!(engine.scan_domain("example.com", labels(&["www"]).into()).await);

    assert_eq!(result.confirmed, vec!["www.example.com"]);
    assert!(events
        .events()
        .iter()
        .any(|e| matches!(e, ScanEvent::WildcardDetected { .. })));
}

#[test]
fn test_invalid_config_rejected() {
    let result = SubdomainBruteEngine::new(
        ScanConfig {
            concurrency: 0,
            ..Default::default()
        },
        Arc::new(HangingProbe),
        Arc::new(RecordingSink::new()),
        Arc::new(MemorySink::new()),
    );
    let err = assert_err!(result.map(|_| ()));
    assert!(matches!(err, ScanError::InvalidConfig(_)));
}

#[test]
fn test_api_exports() {
    // 如果能编译通过，说明API导出正常
    #[allow(unused_imports)]
    use subbrute::{
        brute_force_subdomains, ConsoleReporter, DnsProbe, FileSink, OutputFormat, RetryPolicy,
        ScanResult, WildcardDetector,
    };
}
