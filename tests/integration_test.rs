use async_trait::async_trait;
use rdebrid::download::TransferSnapshot;
use rdebrid::{
    DownloadManager, DownloadOptions, DownloadProgress, Error, RealDebridClient, RunSummary,
    Sleeper, StaticToken, StreamingFetcher,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct CountingSleeper {
    sleeps: AtomicUsize,
}

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    server: MockServer,
    output: TempDir,
    sleeper: Arc<CountingSleeper>,
}

impl Harness {
    async fn start() -> Self {
        Self {
            server: MockServer::start().await,
            output: TempDir::new().unwrap(),
            sleeper: Arc::new(CountingSleeper::default()),
        }
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/files/{}", self.server.uri(), name)
    }

    async fn serve_file(&self, name: &str, body: Vec<u8>) {
        Mock::given(method("GET"))
            .and(path(format!("/files/{}", name)))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
            .mount(&self.server)
            .await;
    }

    /// Unlocks any request whose form body mentions `needle`
    async fn unlock(&self, needle: &str, filename: &str, filesize: u64) {
        Mock::given(method("POST"))
            .and(path("/unrestrict/link"))
            .and(body_string_contains(needle))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "UNL",
                "filename": filename,
                "filesize": filesize,
                "download": self.file_url(filename),
                "host": "filehost.com"
            })))
            .mount(&self.server)
            .await;
    }

    async fn run(&self, inputs: &[&str]) -> (rdebrid::Result<RunSummary>, Vec<DownloadProgress>) {
        let cancel = CancellationToken::new();
        let client = Arc::new(
            RealDebridClient::new(
                self.server.uri(),
                Arc::new(StaticToken("TOKEN".into())),
                Duration::from_secs(5),
            )
            .unwrap(),
        );
        let fetcher = Arc::new(StreamingFetcher::new(cancel.clone()).unwrap());
        let options = DownloadOptions {
            output_directory: self.output.path().to_path_buf(),
            poll_interval: Duration::from_secs(5),
            max_poll_wait: Some(Duration::from_secs(60)),
        };

        let (manager, receiver) = DownloadManager::new(
            client.clone(),
            client,
            fetcher,
            self.sleeper.clone(),
            options,
            cancel,
        );

        let inputs: Vec<String> = inputs.iter().map(|s| s.to_string()).collect();
        let result = manager.run(&inputs).await;
        drop(manager);
        (result, drain(receiver).await)
    }
}

async fn drain(mut receiver: mpsc::UnboundedReceiver<DownloadProgress>) -> Vec<DownloadProgress> {
    let mut events = Vec::new();
    while let Some(event) = receiver.recv().await {
        events.push(event);
    }
    events
}

fn snapshots(events: &[DownloadProgress]) -> Vec<TransferSnapshot> {
    events
        .iter()
        .filter_map(|event| match event {
            DownloadProgress::Transfer { snapshot, .. } => Some(*snapshot),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_direct_link_is_downloaded_exactly() {
    let harness = Harness::start().await;
    let body: Vec<u8> = (0..1_048_576u32).map(|i| (i % 251) as u8).collect();

    Mock::given(method("POST"))
        .and(path("/unrestrict/link"))
        .and(header("authorization", "Bearer TOKEN"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "filename": "a.zip",
            "filesize": 1_048_576,
            "download": harness.file_url("a.zip")
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    harness.serve_file("a.zip", body.clone()).await;

    let (result, events) = harness.run(&["https://host/a"]).await;
    let summary = assert_ok!(result);

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 0);
    assert_eq!(summary.bytes_written, 1_048_576);
    assert_eq!(std::fs::read(harness.output.path().join("a.zip")).unwrap(), body);

    let progress = snapshots(&events);
    assert!(!progress.is_empty());
    let complete = progress
        .iter()
        .filter(|s| s.percent() == Some(100.0))
        .count();
    assert_eq!(complete, 1, "100% should be reported exactly once");
    assert!(
        progress
            .windows(2)
            .all(|w| w[0].bytes_downloaded <= w[1].bytes_downloaded)
    );
}

#[tokio::test]
async fn test_magnet_is_polled_until_downloaded() {
    let harness = Harness::start().await;
    let magnet = "magnet:?xt=urn:btih:ABC";

    Mock::given(method("POST"))
        .and(path("/torrents/addMagnet"))
        .and(body_string_contains("btih"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "T1",
            "uri": "https://real-debrid.com/torrents/T1"
        })))
        .expect(1)
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/torrents/selectFiles/T1"))
        .and(body_string_contains("files=all"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&harness.server)
        .await;

    for (status, progress) in [("queued", 0.0), ("downloading", 42.5)] {
        Mock::given(method("GET"))
            .and(path("/torrents/info/T1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "T1",
                "filename": "release",
                "status": status,
                "progress": progress,
                "speed": 2_097_152,
                "links": []
            })))
            .up_to_n_times(1)
            .mount(&harness.server)
            .await;
    }
    Mock::given(method("GET"))
        .and(path("/torrents/info/T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T1",
            "filename": "release",
            "status": "downloaded",
            "progress": 100,
            "links": ["https://real-debrid.com/d/FILE1", "https://real-debrid.com/d/FILE2"]
        })))
        .mount(&harness.server)
        .await;

    harness.unlock("FILE1", "one.bin", 3).await;
    harness.unlock("FILE2", "two.bin", 4).await;
    harness.serve_file("one.bin", b"one".to_vec()).await;
    harness.serve_file("two.bin", b"two!".to_vec()).await;

    let (result, events) = harness.run(&[magnet]).await;
    let summary = assert_ok!(result);

    assert_eq!(summary.succeeded, 2);
    assert_eq!(summary.bytes_written, 7);
    assert_eq!(harness.sleeper.sleeps.load(Ordering::SeqCst), 2);
    assert_eq!(std::fs::read(harness.output.path().join("one.bin")).unwrap(), b"one");
    assert_eq!(std::fs::read(harness.output.path().join("two.bin")).unwrap(), b"two!");

    let statuses: Vec<(String, u8)> = events
        .iter()
        .filter_map(|event| match event {
            DownloadProgress::TorrentStatus {
                status,
                progress_percent,
                ..
            } => Some((status.to_string(), *progress_percent)),
            _ => None,
        })
        .collect();
    assert_eq!(
        statuses,
        vec![
            ("queued".to_string(), 0),
            ("downloading".to_string(), 42),
            ("downloaded".to_string(), 100),
        ]
    );
}

#[tokio::test]
async fn test_dead_torrent_fails_without_downloads() {
    let harness = Harness::start().await;

    Mock::given(method("POST"))
        .and(path("/torrents/addMagnet"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": "T2"})))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/torrents/selectFiles/T2"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&harness.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/torrents/info/T2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "T2",
            "filename": "gone",
            "status": "dead",
            "progress": 0,
            "links": []
        })))
        .mount(&harness.server)
        .await;
    Mock::given(method("POST"))
        .and(path("/unrestrict/link"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&harness.server)
        .await;

    let (result, _) = harness.run(&["magnet:?xt=urn:btih:DEAD"]).await;
    let summary = assert_ok!(result);

    assert_eq!(summary.succeeded, 0);
    assert_eq!(summary.failed, 1);
    assert!(summary.failures[0].reason.contains("dead"));
    assert_eq!(harness.sleeper.sleeps.load(Ordering::SeqCst), 0);
    assert_eq!(std::fs::read_dir(harness.output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_rejected_link_does_not_stop_the_batch() {
    let harness = Harness::start().await;

    Mock::given(method("POST"))
        .and(path("/unrestrict/link"))
        .and(body_string_contains("bad"))
        .respond_with(
            ResponseTemplate::new(403).set_body_json(json!({"error": "hoster_unavailable"})),
        )
        .mount(&harness.server)
        .await;
    harness.unlock("good", "good.bin", 5).await;
    harness.serve_file("good.bin", b"hello".to_vec()).await;

    let (result, events) = harness
        .run(&["https://host/bad", "https://host/good"])
        .await;
    let summary = assert_ok!(result);

    assert_eq!(summary.succeeded, 1);
    assert_eq!(summary.failed, 1);
    assert!(summary.has_failures());
    assert_eq!(summary.failures[0].item, "https://host/bad");
    assert!(summary.failures[0].reason.contains("hoster_unavailable"));
    assert_eq!(
        std::fs::read(harness.output.path().join("good.bin")).unwrap(),
        b"hello"
    );

    assert!(events.iter().any(|event| matches!(
        event,
        DownloadProgress::Failed { item, .. } if item == "https://host/bad"
    )));
}

#[tokio::test]
async fn test_rejected_token_aborts_the_run() {
    let harness = Harness::start().await;

    Mock::given(method("POST"))
        .and(path("/unrestrict/link"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "bad_token"})))
        .expect(1)
        .mount(&harness.server)
        .await;

    let (result, _) = harness
        .run(&["https://host/first", "https://host/second"])
        .await;

    assert!(matches!(result, Err(Error::Authorization(_))));
}

#[tokio::test]
async fn test_unreported_filesize_still_writes_every_byte() {
    let harness = Harness::start().await;
    harness.unlock("nosize", "nosize.bin", 0).await;
    harness.serve_file("nosize.bin", vec![7u8; 20_000]).await;

    let (result, events) = harness.run(&["https://host/nosize"]).await;
    let summary = assert_ok!(result);

    assert_eq!(summary.bytes_written, 20_000);
    assert_eq!(
        std::fs::metadata(harness.output.path().join("nosize.bin"))
            .unwrap()
            .len(),
        20_000
    );
    assert!(events.iter().any(|event| matches!(
        event,
        DownloadProgress::Downloading { size_bytes: 0, .. }
    )));
}
