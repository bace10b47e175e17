//! End-to-end reconciliation tests
//!
//! Each test runs the full engine against scripted NNTP servers on loopback
//! TCP: real connections, real pools, real wire traffic, with each server's
//! behavior driven by a per-message-id table. POSTed articles are recorded
//! so tests can assert exactly what was re-uploaded where.

use nzb_refresh::{
    reconcile_nzb, Nzb, NzbFile, NzbSegment, Progress, Provider, ProviderConfig, Run,
    RunStatistics,
};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// How the server answers HEAD/ARTICLE for one message-id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HeadBehavior {
    /// 221/220 with headers (and body for ARTICLE)
    Present,
    /// 430 No Such Article
    Missing,
    /// 503 internal fault: a transient error, not a verdict
    Error,
}

/// How the server treats POST
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum PostBehavior {
    /// 340 then 240; the article is recorded
    #[default]
    Accept,
    /// 340 then 441; the attempt is recorded
    Reject,
    /// 440 straight away
    Forbidden,
}

#[derive(Debug, Default)]
struct ServerState {
    articles: HashMap<String, HeadBehavior>,
    post: PostBehavior,
    advertise_post: bool,
    advertise_ihave: bool,
    /// Answer CAPABILITIES with 500, like servers predating RFC 3977
    capabilities_unsupported: bool,
    /// Full article texts received via POST (accepted or rejected)
    posts: Vec<String>,
}

/// A scripted NNTP server on a loopback port
struct MockNntpServer {
    addr: SocketAddr,
    state: Arc<Mutex<ServerState>>,
}

impl MockNntpServer {
    async fn start(state: ServerState) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(Mutex::new(state));

        let accept_state = state.clone();
        tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_connection(socket, accept_state.clone()));
            }
        });

        Self { addr, state }
    }

    fn provider_config(&self, name: &str) -> ProviderConfig {
        ProviderConfig {
            name: name.to_string(),
            host: "127.0.0.1".to_string(),
            port: self.addr.port(),
            ssl: false,
            skip_ssl_check: false,
            username: String::new(),
            password: String::new(),
            max_conns: 2,
            conn_wait_time: 5,
            idle_timeout: 0,
            health_check: false,
            max_too_many_conns_errors: 0,
            max_conn_errors: 0,
        }
    }

    async fn provider(&self, name: &str) -> Arc<Provider> {
        Provider::connect(self.provider_config(name)).await.unwrap()
    }

    fn recorded_posts(&self) -> Vec<String> {
        self.state.lock().unwrap().posts.clone()
    }
}

async fn serve_connection(socket: TcpStream, state: Arc<Mutex<ServerState>>) {
    let (read_half, mut writer) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    if writer.write_all(b"200 mock server ready\r\n").await.is_err() {
        return;
    }

    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) => {}
        }
        let command = line.trim_end().to_string();
        let mut parts = command.split_whitespace();
        let verb = parts.next().map(|v| v.to_ascii_uppercase());

        let response: String = match verb.as_deref() {
            Some("CAPABILITIES") => {
                let (post, ihave, unsupported) = {
                    let state = state.lock().unwrap();
                    (
                        state.advertise_post,
                        state.advertise_ihave,
                        state.capabilities_unsupported,
                    )
                };
                if unsupported {
                    if writer.write_all(b"500 unknown command\r\n").await.is_err() {
                        return;
                    }
                    continue;
                }
                let mut response = String::from("101 Capability list:\r\nVERSION 2\r\nREADER\r\n");
                if post {
                    response.push_str("POST\r\n");
                }
                if ihave {
                    response.push_str("IHAVE\r\n");
                }
                response.push_str(".\r\n");
                response
            }
            Some("HEAD") => {
                let id = strip_brackets(parts.next().unwrap_or(""));
                match head_behavior(&state, &id) {
                    HeadBehavior::Present => {
                        format!("221 0 <{}> head follows\r\n{}.\r\n", id, article_headers(&id))
                    }
                    HeadBehavior::Missing => "430 No Such Article\r\n".to_string(),
                    HeadBehavior::Error => "503 internal fault\r\n".to_string(),
                }
            }
            Some("ARTICLE") => {
                let id = strip_brackets(parts.next().unwrap_or(""));
                match head_behavior(&state, &id) {
                    HeadBehavior::Present => format!(
                        "220 0 <{}> article follows\r\n{}\r\nsegment payload for {}\r\n.\r\n",
                        id,
                        article_headers(&id),
                        id
                    ),
                    HeadBehavior::Missing => "430 No Such Article\r\n".to_string(),
                    HeadBehavior::Error => "503 internal fault\r\n".to_string(),
                }
            }
            Some("POST") => {
                let behavior = state.lock().unwrap().post;
                if behavior == PostBehavior::Forbidden {
                    "440 posting not allowed\r\n".to_string()
                } else {
                    if writer.write_all(b"340 send article\r\n").await.is_err() {
                        return;
                    }
                    let mut article = String::new();
                    loop {
                        line.clear();
                        match reader.read_line(&mut line).await {
                            Ok(0) | Err(_) => return,
                            Ok(_) => {}
                        }
                        if line.trim_end() == "." {
                            break;
                        }
                        article.push_str(&line);
                    }
                    state.lock().unwrap().posts.push(article);
                    match behavior {
                        PostBehavior::Accept => "240 article received\r\n".to_string(),
                        _ => "441 posting failed\r\n".to_string(),
                    }
                }
            }
            Some("DATE") => "111 20260802120000\r\n".to_string(),
            Some("QUIT") => {
                let _ = writer.write_all(b"205 bye\r\n").await;
                return;
            }
            _ => "500 unknown command\r\n".to_string(),
        };

        if writer.write_all(response.as_bytes()).await.is_err() {
            return;
        }
    }
}

fn head_behavior(state: &Arc<Mutex<ServerState>>, id: &str) -> HeadBehavior {
    state
        .lock()
        .unwrap()
        .articles
        .get(id)
        .copied()
        .unwrap_or(HeadBehavior::Missing)
}

fn strip_brackets(id: &str) -> String {
    id.trim_start_matches('<').trim_end_matches('>').to_string()
}

fn article_headers(id: &str) -> String {
    format!(
        "From: poster@example.com\r\nSubject: test post [1/1]\r\nNewsgroups: alt.binaries.test\r\nMessage-Id: <{}>\r\nDate: Mon, 20 Jan 2025 12:00:00 +0000\r\nPath: origin.example.com!relay!not-for-mail\r\nX-Uploader: poster-tool/2.1\r\n",
        id
    )
}

/// Build an NZB with one file per (filename, message-ids) pair
fn nzb_with(files: &[(&str, &[&str])]) -> Nzb {
    Nzb {
        meta: HashMap::new(),
        files: files
            .iter()
            .map(|(filename, ids)| NzbFile {
                filename: filename.to_string(),
                poster: "poster@example.com".to_string(),
                date: 1234567890,
                subject: format!("\"{}\" yEnc", filename),
                groups: vec!["alt.binaries.test".to_string()],
                segments: ids
                    .iter()
                    .enumerate()
                    .map(|(i, id)| NzbSegment {
                        bytes: 1000,
                        number: (i + 1) as u32,
                        message_id: id.to_string(),
                    })
                    .collect(),
            })
            .collect(),
    }
}

async fn run_reconcile(providers: Vec<Arc<Provider>>, nzb: &Nzb, check_only: bool) -> Arc<Run> {
    let run = Arc::new(Run {
        providers,
        stats: Arc::new(RunStatistics::from_nzb(nzb)),
        progress: Arc::new(Progress::new(nzb.total_segments())),
        check_only,
    });
    reconcile_nzb(run.clone(), nzb).await;
    run
}

fn assert_counters(provider: &Provider, checked: u64, available: u64, missing: u64, refreshed: u64) {
    let snapshot = provider.counters.snapshot();
    assert_eq!(
        (snapshot.checked, snapshot.available, snapshot.missing, snapshot.refreshed),
        (checked, available, missing, refreshed),
        "unexpected counters for provider '{}'",
        provider.name()
    );
}

fn articles(entries: &[(&str, HeadBehavior)]) -> HashMap<String, HeadBehavior> {
    entries
        .iter()
        .map(|(id, behavior)| (id.to_string(), *behavior))
        .collect()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn repairs_segment_missing_on_one_provider() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Present),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Missing),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["s1@test", "s2@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 2, 2, 0, 0);
    assert_counters(&run.providers[1], 2, 1, 1, 1);

    // Exactly one POST, to B, carrying s1
    assert!(server_a.recorded_posts().is_empty());
    let posts = server_b.recorded_posts();
    assert_eq!(posts.len(), 1);
    assert!(posts[0].contains("Message-Id: <s1@test>"));

    assert_eq!(run.progress.segments_done(), 2);
    let uploads = run.progress.uploads().unwrap();
    assert_eq!(uploads.scheduled, 1);
    assert_eq!(uploads.finished, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn check_only_never_posts() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Present),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Missing),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["s1@test", "s2@test"])]);
    let run = run_reconcile(providers, &nzb, true).await;

    assert_counters(&run.providers[0], 2, 2, 0, 0);
    assert_counters(&run.providers[1], 2, 1, 1, 0);
    assert!(server_a.recorded_posts().is_empty());
    assert!(server_b.recorded_posts().is_empty());
    assert!(run.progress.uploads().is_none());

    // The availability report is still populated in check-only mode
    let stats_file = run.stats.file("file.bin").unwrap();
    assert_eq!(stats_file.available_on("A"), 2);
    assert_eq!(stats_file.available_on("B"), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn first_successful_post_wins() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_c = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![
        server_a.provider("A").await,
        server_b.provider("B").await,
        server_c.provider("C").await,
    ];
    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    // One upload to B satisfied the repair; C is never touched
    assert_eq!(run.providers[0].counters.snapshot().refreshed, 0);
    assert_eq!(run.providers[1].counters.snapshot().refreshed, 1);
    assert_eq!(run.providers[2].counters.snapshot().refreshed, 0);
    assert_eq!(server_b.recorded_posts().len(), 1);
    assert!(server_c.recorded_posts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn failed_post_falls_through_to_next_target() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        post: PostBehavior::Reject,
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_c = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![
        server_a.provider("A").await,
        server_b.provider("B").await,
        server_c.provider("C").await,
    ];
    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_eq!(run.providers[1].counters.snapshot().refreshed, 0);
    assert_eq!(run.providers[2].counters.snapshot().refreshed, 1);
    assert_eq!(server_b.recorded_posts().len(), 1);
    assert_eq!(server_c.recorded_posts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn all_targets_failing_falls_back_to_available_side() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        post: PostBehavior::Reject,
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_c = MockNntpServer::start(ServerState {
        post: PostBehavior::Reject,
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![
        server_a.provider("A").await,
        server_b.provider("B").await,
        server_c.provider("C").await,
    ];
    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    // The fetched article was parked on the provider that already had it
    assert_eq!(run.providers[0].counters.snapshot().refreshed, 1);
    assert_eq!(run.providers[1].counters.snapshot().refreshed, 0);
    assert_eq!(run.providers[2].counters.snapshot().refreshed, 0);
    assert_eq!(server_a.recorded_posts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn provider_without_post_is_skipped_as_target_but_used_as_source() {
    // P holds everything but accepts no uploads; Q lost the article
    let server_p = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        post: PostBehavior::Forbidden,
        advertise_post: false,
        advertise_ihave: false,
        ..Default::default()
    })
    .await;
    let server_q = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_p.provider("P").await, server_q.provider("Q").await];
    assert!(!providers[0].capabilities().post);
    assert!(providers[1].capabilities().post);

    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 1, 1, 0, 0);
    assert_counters(&run.providers[1], 1, 0, 1, 1);
    assert!(server_p.recorded_posts().is_empty());
    assert_eq!(server_q.recorded_posts().len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn missing_target_without_post_capability_is_skipped() {
    // Both P and Q lost the article; P cannot take uploads, so the repair
    // must go to Q even though P comes first in provider order
    let server_p = MockNntpServer::start(ServerState {
        post: PostBehavior::Forbidden,
        ..Default::default()
    })
    .await;
    let server_q = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_r = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![
        server_p.provider("P").await,
        server_q.provider("Q").await,
        server_r.provider("R").await,
    ];
    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert!(server_p.recorded_posts().is_empty());
    assert_eq!(server_q.recorded_posts().len(), 1);
    assert_eq!(run.providers[0].counters.snapshot().refreshed, 0);
    assert_eq!(run.providers[1].counters.snapshot().refreshed, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn segment_missing_everywhere_is_not_repaired() {
    let server_a = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["gone@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 1, 0, 1, 0);
    assert_counters(&run.providers[1], 1, 0, 1, 0);
    assert!(server_a.recorded_posts().is_empty());
    assert!(server_b.recorded_posts().is_empty());
    assert_eq!(run.progress.segments_done(), 1);
    assert!(run.progress.uploads().is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn transient_head_errors_leave_counters_untouched() {
    // A answers HEAD with 503 for everything: no verdicts, no counters,
    // and crucially no spurious re-upload toward A
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Error),
            ("s2@test", HeadBehavior::Error),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Present),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["s1@test", "s2@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 0, 0, 0, 0);
    assert_counters(&run.providers[1], 2, 2, 0, 0);
    assert!(server_a.recorded_posts().is_empty());
    assert!(server_b.recorded_posts().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn reposted_article_carries_only_minimum_headers() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[("s1@test", HeadBehavior::Present)]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["s1@test"])]);
    run_reconcile(providers, &nzb, false).await;

    let posts = server_b.recorded_posts();
    assert_eq!(posts.len(), 1);
    let posted = &posts[0];

    assert!(posted.contains("From: poster@example.com"));
    assert!(posted.contains("Subject: test post [1/1]"));
    assert!(posted.contains("Newsgroups: alt.binaries.test"));
    assert!(posted.contains("Message-Id: <s1@test>"));
    assert!(posted.contains("Path: not-for-mail"));
    // The transit path and extension headers from the source are gone
    assert!(!posted.contains("origin.example.com"));
    assert!(!posted.contains("X-Uploader"));
    // Date was refreshed, not copied
    assert!(!posted.contains("Date: Mon, 20 Jan 2025 12:00:00 +0000"));
    assert!(posted.contains("Date: "));
    // The body survived the round trip
    assert!(posted.contains("segment payload for s1@test"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn empty_nzb_completes_with_zero_counters() {
    let server = MockNntpServer::start(ServerState {
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server.provider("A").await];
    let nzb = nzb_with(&[]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 0, 0, 0, 0);
    assert_eq!(run.progress.segments_done(), 0);
    assert_eq!(run.stats.file_count(), 0);

    let csv = run.stats.to_csv(&["A".to_string()]);
    assert_eq!(csv, "Filename,Total segments,A\r\n");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn statistics_track_availability_per_file() {
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("a1@test", HeadBehavior::Present),
            ("a2@test", HeadBehavior::Present),
            ("b1@test", HeadBehavior::Missing),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("a1@test", HeadBehavior::Present),
            ("a2@test", HeadBehavior::Missing),
            ("b1@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[
        ("alpha.bin", &["a1@test", "a2@test"]),
        ("beta.bin", &["b1@test"]),
    ]);
    let run = run_reconcile(providers, &nzb, true).await;

    let alpha = run.stats.file("alpha.bin").unwrap();
    assert_eq!(alpha.available_on("A"), 2);
    assert_eq!(alpha.available_on("B"), 1);
    let beta = run.stats.file("beta.bin").unwrap();
    assert_eq!(beta.available_on("A"), 0);
    assert_eq!(beta.available_on("B"), 1);

    let csv = run.stats.to_csv(&["B".to_string(), "A".to_string()]);
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines[0], "Filename,Total segments,A,B");
    assert_eq!(lines[1], "alpha.bin,2,2,1");
    assert_eq!(lines[2], "beta.bin,1,0,1");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn capabilities_fallback_probes_post_and_ihave() {
    // Pre-RFC-3977 server rejecting POST outright: only the 440 means
    // "no POST"; IHAVE answered with 500 means "no IHAVE"
    let server_old = MockNntpServer::start(ServerState {
        capabilities_unsupported: true,
        post: PostBehavior::Forbidden,
        ..Default::default()
    })
    .await;
    let provider = server_old.provider("old").await;
    assert!(!provider.capabilities().post);
    assert!(!provider.capabilities().ihave);

    // Same vintage, but POST works: the sentinel article gets a non-440
    // answer, which proves the command exists
    let server_posting = MockNntpServer::start(ServerState {
        capabilities_unsupported: true,
        ..Default::default()
    })
    .await;
    let provider = server_posting.provider("posting").await;
    assert!(provider.capabilities().post);
    assert!(!provider.capabilities().ihave);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn second_run_after_repair_refreshes_nothing() {
    // Steady state: everything present everywhere
    let server_a = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Present),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;
    let server_b = MockNntpServer::start(ServerState {
        articles: articles(&[
            ("s1@test", HeadBehavior::Present),
            ("s2@test", HeadBehavior::Present),
        ]),
        advertise_post: true,
        ..Default::default()
    })
    .await;

    let providers = vec![server_a.provider("A").await, server_b.provider("B").await];
    let nzb = nzb_with(&[("file.bin", &["s1@test", "s2@test"])]);
    let run = run_reconcile(providers, &nzb, false).await;

    assert_counters(&run.providers[0], 2, 2, 0, 0);
    assert_counters(&run.providers[1], 2, 2, 0, 0);
    assert!(server_a.recorded_posts().is_empty());
    assert!(server_b.recorded_posts().is_empty());
}
