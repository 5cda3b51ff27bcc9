//! Integration tests for the download orchestrator.
//!
//! These run every strategy against a mock HTTP server and an in-memory sink.

use std::sync::Arc;
use std::time::Duration;

use resource_dl::{
    ChannelObserver, DownloadEvent, DownloadOrchestrator, DownloadOutcome, DownloadRecorder,
    DownloadRequest, EnvironmentProfile, ErrorKind, HttpDownloadRecorder, MemorySink,
    MobileTactics, Resource, SinkCall, StrategyKind, StrategyTuning,
};
use tokio::sync::mpsc::UnboundedReceiver;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_tuning() -> StrategyTuning {
    StrategyTuning {
        revoke_grace: Duration::from_millis(10),
        mobile: MobileTactics {
            double_activate: true,
            retrigger_delay: Duration::from_millis(5),
        },
    }
}

fn orchestrator(sink: &Arc<MemorySink>, profile: EnvironmentProfile) -> DownloadOrchestrator {
    DownloadOrchestrator::new(Arc::clone(sink) as _, Arc::new(profile)).with_tuning(fast_tuning())
}

async fn serve(route: &str, template: ResponseTemplate) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(template)
        .mount(&server)
        .await;
    server
}

fn drain(rx: &mut UnboundedReceiver<DownloadEvent>) -> Vec<DownloadEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn progress_values(events: &[DownloadEvent]) -> Vec<u8> {
    events
        .iter()
        .filter_map(|event| match event {
            DownloadEvent::Progress(percent) => Some(*percent),
            _ => None,
        })
        .collect()
}

fn terminal_events(events: &[DownloadEvent]) -> Vec<&DownloadEvent> {
    events
        .iter()
        .filter(|event| matches!(event, DownloadEvent::Completed | DownloadEvent::Failed(_)))
        .collect()
}

#[tokio::test]
async fn test_desktop_download_reports_full_progress() {
    let body = vec![7u8; 1024];
    let server = serve(
        "/guide.pdf",
        ResponseTemplate::new(200)
            .insert_header("Content-Type", "application/pdf")
            .set_body_bytes(body.clone()),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let request = DownloadRequest::new(format!("{}/guide.pdf", server.uri()), "guide.pdf");
    let outcome = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .download(&request, &observer)
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::Desktop
        }
    );
    let events = drain(&mut rx);
    assert_eq!(events.first(), Some(&DownloadEvent::Started));
    assert_eq!(progress_values(&events), vec![5, 10, 30, 70, 90, 100]);
    assert_eq!(terminal_events(&events), vec![&DownloadEvent::Completed]);
    assert_eq!(sink.saved(), vec![("guide.pdf".to_string(), body)]);
    assert_eq!(sink.live_object_urls(), 0);
    assert_eq!(sink.live_triggers(), 0);
}

#[tokio::test]
async fn test_http_error_reports_status_once() {
    let server = serve("/missing.pdf", ResponseTemplate::new(404)).await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let request = DownloadRequest::new(format!("{}/missing.pdf", server.uri()), "missing.pdf");
    let outcome = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .download(&request, &observer)
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::HttpError));
    let events = drain(&mut rx);
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 1);
    assert!(matches!(terminal[0], DownloadEvent::Failed(message) if message.contains("404")));
    assert!(sink.calls().is_empty());
}

#[tokio::test]
async fn test_size_limit_fails_before_blob_is_created() {
    let server = serve(
        "/big.bin",
        ResponseTemplate::new(200).set_body_bytes(vec![0u8; 200]),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let request =
        DownloadRequest::new(format!("{}/big.bin", server.uri()), "big.bin").with_size_limit(100);
    let outcome = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .download(&request, &observer)
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::SizeLimitExceeded));
    assert!(
        !sink
            .calls()
            .iter()
            .any(|call| matches!(call, SinkCall::CreateObjectUrl { .. }))
    );
    let events = drain(&mut rx);
    assert!(!events.contains(&DownloadEvent::Completed));
}

#[tokio::test]
async fn test_timeout_falls_back_to_native_trigger() {
    let server = serve(
        "/slow.pdf",
        ResponseTemplate::new(200)
            .set_body_bytes(b"late".to_vec())
            .set_delay(Duration::from_millis(500)),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let url = format!("{}/slow.pdf", server.uri());
    let request =
        DownloadRequest::new(url.clone(), "slow.pdf").with_timeout(Duration::from_millis(50));
    let outcome = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .download(&request, &observer)
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::NativeFallback
        }
    );
    let events = drain(&mut rx);
    let terminal = terminal_events(&events);
    assert_eq!(terminal.len(), 2);
    assert!(matches!(terminal[0], DownloadEvent::Failed(message) if message.contains("timed out")));
    assert_eq!(terminal[1], &DownloadEvent::Completed);
    assert_eq!(progress_values(&events).last(), Some(&100));

    let calls = sink.calls();
    assert!(calls.iter().any(|call| matches!(
        call,
        SinkCall::AttachTrigger { href, file_name, .. } if *href == url && file_name == "slow.pdf"
    )));
    assert_eq!(sink.live_triggers(), 0);
}

#[tokio::test]
async fn test_ios_never_fetches() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let url = format!("{}/guide.pdf", server.uri());
    let outcome = orchestrator(&sink, EnvironmentProfile::IOS)
        .download(&DownloadRequest::new(url.clone(), "guide.pdf"), &observer)
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::IosNewContext
        }
    );
    assert_eq!(sink.opened_contexts(), vec![url]);
    assert_eq!(sink.activations(), 0);
    assert_eq!(
        drain(&mut rx),
        vec![
            DownloadEvent::Started,
            DownloadEvent::Progress(100),
            DownloadEvent::Completed
        ]
    );
}

#[tokio::test]
async fn test_ios_popup_blocked_is_reported() {
    let sink = Arc::new(MemorySink::with_popups_blocked());
    let (observer, mut rx) = ChannelObserver::new();

    let outcome = orchestrator(&sink, EnvironmentProfile::IOS)
        .download(
            &DownloadRequest::new("https://cdn.example.com/guide.pdf", "guide.pdf"),
            &observer,
        )
        .await;

    assert_eq!(outcome.error_kind(), Some(ErrorKind::PopupBlocked));
    let events = drain(&mut rx);
    assert_eq!(terminal_events(&events).len(), 1);
    assert!(!events.contains(&DownloadEvent::Completed));
}

#[tokio::test]
async fn test_android_activates_blob_trigger_twice() {
    let server = serve(
        "/kit.zip",
        ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let outcome = orchestrator(&sink, EnvironmentProfile::ANDROID)
        .download(
            &DownloadRequest::new(format!("{}/kit.zip", server.uri()), "kit.zip"),
            &observer,
        )
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::MobileBlob
        }
    );
    assert_eq!(sink.activations(), 2);
    assert_eq!(sink.live_object_urls(), 0);
    assert_eq!(progress_values(&drain(&mut rx)).last(), Some(&100));
}

#[tokio::test]
async fn test_android_single_activation_when_disabled() {
    let server = serve(
        "/kit.zip",
        ResponseTemplate::new(200).set_body_bytes(b"zip".to_vec()),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let tuning = StrategyTuning {
        mobile: MobileTactics {
            double_activate: false,
            ..fast_tuning().mobile
        },
        ..fast_tuning()
    };

    orchestrator(&sink, EnvironmentProfile::ANDROID)
        .with_tuning(tuning)
        .download(
            &DownloadRequest::new(format!("{}/kit.zip", server.uri()), "kit.zip"),
            &resource_dl::NoopObserver,
        )
        .await;

    assert_eq!(sink.activations(), 1);
}

#[tokio::test]
async fn test_android_unreachable_host_opens_new_context() {
    let sink = Arc::new(MemorySink::new());
    let url = "http://127.0.0.1:9/guide.pdf";

    let outcome = orchestrator(&sink, EnvironmentProfile::ANDROID)
        .download(
            &DownloadRequest::new(url, "guide.pdf"),
            &resource_dl::NoopObserver,
        )
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::MobileNewContext
        }
    );
    assert_eq!(sink.opened_contexts(), vec![url.to_string()]);
}

#[tokio::test]
async fn test_android_timeout_opens_new_context_without_error() {
    let server = serve(
        "/slow.pdf",
        ResponseTemplate::new(200)
            .set_body_bytes(b"late".to_vec())
            .set_delay(Duration::from_millis(500)),
    )
    .await;
    let sink = Arc::new(MemorySink::new());
    let (observer, mut rx) = ChannelObserver::new();

    let url = format!("{}/slow.pdf", server.uri());
    let request =
        DownloadRequest::new(url.clone(), "slow.pdf").with_timeout(Duration::from_millis(50));
    let outcome = orchestrator(&sink, EnvironmentProfile::ANDROID)
        .download(&request, &observer)
        .await;

    assert_eq!(
        outcome,
        DownloadOutcome::Completed {
            strategy: StrategyKind::MobileNewContext
        }
    );
    let events = drain(&mut rx);
    assert_eq!(terminal_events(&events), vec![&DownloadEvent::Completed]);
    assert!(
        !events
            .iter()
            .any(|event| matches!(event, DownloadEvent::Failed(_)))
    );
    assert_eq!(progress_values(&events).last(), Some(&100));
    assert_eq!(sink.opened_contexts(), vec![url]);
    assert!(
        !sink
            .calls()
            .iter()
            .any(|call| matches!(call, SinkCall::AttachTrigger { .. }))
    );
}

#[tokio::test]
async fn test_concurrent_downloads_are_independent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/a.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"aaa".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/b.txt"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let sink = Arc::new(MemorySink::new());
    let orchestrator = orchestrator(&sink, EnvironmentProfile::DESKTOP);
    let (observer_a, mut rx_a) = ChannelObserver::new();
    let (observer_b, mut rx_b) = ChannelObserver::new();

    let request_a = DownloadRequest::new(format!("{}/a.txt", server.uri()), "a.txt");
    let request_b = DownloadRequest::new(format!("{}/b.txt", server.uri()), "b.txt");
    let (outcome_a, outcome_b) = tokio::join!(
        orchestrator.download(&request_a, &observer_a),
        orchestrator.download(&request_b, &observer_b),
    );

    assert!(outcome_a.is_success());
    assert_eq!(outcome_b.error_kind(), Some(ErrorKind::HttpError));
    assert_eq!(
        terminal_events(&drain(&mut rx_a)),
        vec![&DownloadEvent::Completed]
    );
    let events_b = drain(&mut rx_b);
    assert_eq!(terminal_events(&events_b).len(), 1);
    assert!(!events_b.contains(&DownloadEvent::Completed));
    assert_eq!(sink.saved(), vec![("a.txt".to_string(), b"aaa".to_vec())]);
}

#[tokio::test]
async fn test_download_resource_records_and_downloads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/guide.pdf"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"pdf".to_vec()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/record"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let resource = Resource {
        id: Some("r-1".to_string()),
        title: "Brand guide".to_string(),
        description: None,
        file_name: "guide.pdf".to_string(),
        file_size: Some(3),
        file_url: format!("{}/guide.pdf", server.uri()),
        file_type: Some("application/pdf".to_string()),
        is_published: true,
        download_count: 0,
    };
    let recorder: Arc<dyn DownloadRecorder> = Arc::new(HttpDownloadRecorder::new(
        reqwest::Client::new(),
        format!("{}/record", server.uri()),
    ));
    let sink = Arc::new(MemorySink::new());

    let download = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .with_recorder(recorder)
        .download_resource(&resource, &resource_dl::NoopObserver)
        .await;

    assert!(download.outcome.is_success());
    assert_eq!(sink.saved(), vec![("guide.pdf".to_string(), b"pdf".to_vec())]);
    download.recording.unwrap().await.unwrap();
    server.verify().await;
}

#[tokio::test]
async fn test_download_resource_without_recorder_has_no_recording() {
    let server = serve(
        "/guide.pdf",
        ResponseTemplate::new(200).set_body_bytes(b"pdf".to_vec()),
    )
    .await;
    let resource: Resource = serde_json::from_value(serde_json::json!({
        "title": "Brand guide",
        "file_name": "guide.pdf",
        "file_url": format!("{}/guide.pdf", server.uri()),
        "is_published": true
    }))
    .unwrap();
    let sink = Arc::new(MemorySink::new());

    let download = orchestrator(&sink, EnvironmentProfile::DESKTOP)
        .download_resource(&resource, &resource_dl::NoopObserver)
        .await;

    assert!(download.outcome.is_success());
    assert!(download.recording.is_none());
}
