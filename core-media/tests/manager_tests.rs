//! End-to-end behaviour of `MediaCacheManager` against in-memory doubles.

mod common;

use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse};
use bytes::Bytes;
use common::*;
use core_media::{
    CacheDirectoryKind, MediaCacheConfig, MediaCacheError, MediaCacheManager, ReadinessState,
    ReturnFormat, StorageStrategy,
};
use core_runtime::events::{CacheEvent, CoreEvent};
use mockall::mock;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::Ordering;
use std::sync::Arc;

const COVER: &str = "https://cdn.example.com/albums/cover.jpg";
const BANNER: &str = "https://cdn.example.com/banner.png?size=large";

#[tokio::test]
async fn test_download_returns_file_uri() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(64));
    assert_eq!(h.manager.strategy(), StorageStrategy::Native);
    assert_eq!(h.manager.initialize().await, ReadinessState::Ready);
    assert!(h.fs.has_dir(&cache_dir()));

    let value = h.manager.get_media(COVER).await.unwrap();

    assert_eq!(value, file_uri(&cached_path(COVER)));
    assert!(h.fs.has_file(&cached_path(COVER)));
    assert_eq!(h.http.fetch_count(COVER), 1);
}

#[tokio::test]
async fn test_second_request_is_served_from_disk() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(64));

    let first = h.manager.get_media(COVER).await.unwrap();
    let second = h.manager.get_media(COVER).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(h.http.fetch_count(COVER), 1);
    assert!(h.manager.is_cached(COVER).await);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_download() {
    let h = Harness::new(
        MediaCacheConfig::default(),
        ScriptedHttpClient::new(64).gated(),
    );
    h.manager.initialize().await;

    let mut handles = Vec::new();
    for _ in 0..10 {
        let manager = h.manager.clone();
        handles.push(tokio::spawn(async move { manager.get_media(COVER).await }));
    }

    settle().await;
    assert_eq!(h.http.fetch_count(COVER), 1);
    h.http.release(1);

    let expected = file_uri(&cached_path(COVER));
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), expected);
    }
    assert_eq!(h.http.fetch_count(COVER), 1);
}

#[tokio::test]
async fn test_lookup_initializes_lazily() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    assert_eq!(h.manager.readiness(), ReadinessState::Uninitialized);

    h.manager.get_media(COVER).await.unwrap();
    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_start_initializes_in_background() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));

    h.manager.start();
    settle().await;

    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
    assert!(h.fs.has_dir(&cache_dir()));
}

#[tokio::test]
async fn test_initialize_runs_once() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));

    let (a, b) = tokio::join!(h.manager.initialize(), h.manager.initialize());
    assert_eq!(a, ReadinessState::Ready);
    assert_eq!(b, ReadinessState::Ready);

    let creates = h
        .fs
        .ops()
        .iter()
        .filter(|op| op.starts_with("create_dir_all"))
        .count();
    assert_eq!(creates, 1);
}

#[tokio::test]
async fn test_relative_url_is_returned_untouched() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    h.manager.initialize().await;
    let ops_before = h.fs.op_count();

    for url in ["assets/logo.png", "/static/a.jpg", "ftp://host/a.jpg"] {
        assert_eq!(h.manager.get_media(url).await.unwrap(), url);
    }

    assert_eq!(h.fs.op_count(), ops_before);
    assert!(h.http.fetches().is_empty());
    assert!(!h.manager.is_cached("assets/logo.png").await);
}

#[tokio::test]
async fn test_relative_url_does_not_start_initialization() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));

    assert_eq!(h.manager.get_media("img/cover.png").await.unwrap(), "img/cover.png");
    assert_eq!(h.fs.op_count(), 0);
    assert_eq!(h.manager.readiness(), ReadinessState::Uninitialized);
}

#[tokio::test]
async fn test_uppercase_scheme_is_cacheable() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    let url = "HTTPS://CDN.EXAMPLE.COM/A.PNG";

    let value = h.manager.get_media(url).await.unwrap();
    assert!(value.starts_with("file://"));
    assert_eq!(h.http.fetch_count(url), 1);
}

#[tokio::test]
async fn test_platform_without_native_storage_passes_through() {
    let clock = Arc::new(bridge_traits::time::ManualClock::default());
    let fs = Arc::new(InMemoryFileSystem::new(clock));
    let http = Arc::new(ScriptedHttpClient::new(8));

    let manager = MediaCacheManager::builder(MediaCacheConfig::default())
        .file_system(fs.clone())
        .http_client(http.clone())
        .platform(Arc::new(NoNativeStorage))
        .build()
        .unwrap();

    assert_eq!(manager.strategy(), StorageStrategy::Passthrough);
    assert_eq!(manager.get_media(COVER).await.unwrap(), COVER);
    assert_eq!(manager.readiness(), ReadinessState::Disabled);
    assert_eq!(fs.op_count(), 0);
    assert!(http.fetches().is_empty());
}

#[tokio::test]
async fn test_directory_failure_disables_cache_until_cleared() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    h.fs.fail_create_dir.store(true, Ordering::SeqCst);

    assert_eq!(h.manager.initialize().await, ReadinessState::Disabled);
    assert_eq!(h.manager.get_media(COVER).await.unwrap(), COVER);
    assert!(h.http.fetches().is_empty());

    // Clearing re-runs initialization
    h.fs.fail_create_dir.store(false, Ordering::SeqCst);
    h.manager.clear_cache().await.unwrap();
    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
    assert!(h.manager.get_media(COVER).await.unwrap().starts_with("file://"));
}

#[tokio::test]
async fn test_base64_return_format() {
    let url = "https://cdn.example.com/icons/star.png";
    let http = ScriptedHttpClient::new(8).respond(url, 200, "hello");
    let h = Harness::new(
        MediaCacheConfig::new().with_return_format(ReturnFormat::Base64),
        http,
    );

    let fresh = h.manager.get_media(url).await.unwrap();
    let cached = h.manager.get_media(url).await.unwrap();

    assert_eq!(fresh, "data:image/png;base64,aGVsbG8=");
    assert_eq!(cached, fresh);
    assert_eq!(h.http.fetch_count(url), 1);
}

#[tokio::test]
async fn test_query_string_does_not_change_extension() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));

    h.manager.get_media(BANNER).await.unwrap();

    let names = h.fs.file_names_in(&cache_dir());
    assert_eq!(names.len(), 1);
    assert!(names[0].ends_with(".png"), "unexpected name {}", names[0]);
}

#[tokio::test]
async fn test_cache_directory_kind() {
    let h = Harness::new(
        MediaCacheConfig::new()
            .with_directory_kind(CacheDirectoryKind::Cache)
            .with_cache_directory_name("thumbs"),
        ScriptedHttpClient::new(8),
    );

    let value = h.manager.get_media(COVER).await.unwrap();

    let dir = Path::new(ROOT).join("cache").join("thumbs");
    assert!(h.fs.has_dir(&dir));
    assert_eq!(h.fs.file_names_in(&dir).len(), 1);
    assert!(value.starts_with("file:///app/cache/thumbs/"));
}

#[tokio::test]
async fn test_fetch_failure_rejects_and_fallback_returns_original() {
    let http = ScriptedHttpClient::new(8).respond(COVER, 404, Bytes::new());
    let mut h = Harness::new(MediaCacheConfig::default(), http);

    let err = h.manager.get_media(COVER).await.unwrap_err();
    assert!(matches!(err, MediaCacheError::FetchFailure(_)));
    assert!(err.to_string().contains("404"));

    assert_eq!(h.manager.get_media_or_original(COVER).await.unwrap(), COVER);
    assert!(!h.fs.has_file(&cached_path(COVER)));

    let failed = h
        .drain_events()
        .into_iter()
        .filter(|event| matches!(event, CoreEvent::Cache(CacheEvent::DownloadFailed { .. })))
        .count();
    assert_eq!(failed, 2);

    // A failure does not poison later requests
    assert!(h.manager.get_media(BANNER).await.unwrap().starts_with("file://"));
}

#[tokio::test]
async fn test_write_failure_is_filesystem_error() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    h.manager.initialize().await;

    // Remove the directory behind the manager's back
    use bridge_traits::storage::FileSystemAccess;
    h.fs.delete_dir_all(&cache_dir()).await.unwrap();

    let err = h.manager.get_media(COVER).await.unwrap_err();
    assert!(matches!(err, MediaCacheError::FilesystemFailure(_)));
    assert_eq!(h.manager.get_media_or_original(COVER).await.unwrap(), COVER);
}

#[tokio::test]
async fn test_configured_headers_are_sent() {
    let h = Harness::new(
        MediaCacheConfig::new()
            .with_http_header("Authorization", "Bearer token")
            .with_http_header("Accept", "image/*"),
        ScriptedHttpClient::new(8),
    );

    h.manager.get_media(COVER).await.unwrap();

    let requests = h.http.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, HttpMethod::Get);
    assert_eq!(
        requests[0].headers.get("Authorization").map(String::as_str),
        Some("Bearer token")
    );
    assert_eq!(
        requests[0].headers.get("Accept").map(String::as_str),
        Some("image/*")
    );
}

#[tokio::test]
async fn test_preload_warms_cache() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));

    assert!(!h.manager.is_cached(COVER).await);
    h.manager.preload(COVER).await.unwrap();
    assert!(h.manager.is_cached(COVER).await);

    h.manager.get_media(COVER).await.unwrap();
    assert_eq!(h.http.fetch_count(COVER), 1);
}

#[tokio::test]
async fn test_clear_cache_removes_everything() {
    let mut h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(16));
    h.manager.get_media(COVER).await.unwrap();
    h.manager.get_media(BANNER).await.unwrap();
    assert_eq!(h.manager.stats().entries, 2);

    h.manager.clear_cache().await.unwrap();

    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
    assert!(h.fs.file_names_in(&cache_dir()).is_empty());
    assert!(h.fs.has_dir(&cache_dir()));
    assert_eq!(h.manager.stats().entries, 0);
    assert!(!h.manager.is_cached(COVER).await);

    let cleared = h.drain_events().into_iter().any(|event| {
        matches!(event, CoreEvent::Cache(CacheEvent::CacheCleared { ref scope }) if scope == "all")
    });
    assert!(cleared);

    h.manager.get_media(COVER).await.unwrap();
    assert_eq!(h.http.fetch_count(COVER), 2);
}

#[tokio::test]
async fn test_clear_cache_reports_removal_failure() {
    let h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(8));
    h.manager.get_media(COVER).await.unwrap();
    h.fs.fail_delete.store(true, Ordering::SeqCst);

    let err = h.manager.clear_cache().await.unwrap_err();
    assert!(matches!(err, MediaCacheError::FilesystemFailure(_)));
    // Re-initialized regardless
    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
}

#[tokio::test]
async fn test_clear_media_cache_removes_one_file() {
    let h = Harness::new(
        MediaCacheConfig::new().with_max_cache_size(1_000_000),
        ScriptedHttpClient::new(16),
    );
    h.manager.get_media(COVER).await.unwrap();
    h.manager.get_media(BANNER).await.unwrap();

    h.manager.clear_media_cache(COVER).await.unwrap();

    assert_eq!(h.manager.readiness(), ReadinessState::Ready);
    assert!(!h.fs.has_file(&cached_path(COVER)));
    assert!(h.manager.is_cached(BANNER).await);
    assert_eq!(h.manager.stats().entries, 1);
    assert_eq!(h.manager.stats().total_bytes, 16);

    // Clearing something never cached is fine
    h.manager
        .clear_media_cache("https://cdn.example.com/never.jpg")
        .await
        .unwrap();
    h.manager.clear_media_cache("relative/path.jpg").await.unwrap();

    h.manager.get_media(COVER).await.unwrap();
    assert_eq!(h.http.fetch_count(COVER), 2);
}

#[tokio::test]
async fn test_clear_during_download_stores_into_new_directory() {
    let h = Harness::new(
        MediaCacheConfig::default(),
        ScriptedHttpClient::new(32).gated(),
    );
    h.manager.initialize().await;

    let manager = h.manager.clone();
    let pending = tokio::spawn(async move { manager.get_media(COVER).await });
    settle().await;
    assert_eq!(h.http.running(), 1);

    h.manager.clear_cache().await.unwrap();
    h.http.release(1);

    let value = pending.await.unwrap().unwrap();
    assert_eq!(value, file_uri(&cached_path(COVER)));
    assert!(h.fs.has_file(&cached_path(COVER)));
}

#[tokio::test]
async fn test_clear_that_disables_cache_mid_download_returns_original() {
    let h = Harness::new(
        MediaCacheConfig::default(),
        ScriptedHttpClient::new(32).gated(),
    );
    h.manager.initialize().await;

    let manager = h.manager.clone();
    let pending = tokio::spawn(async move { manager.get_media(COVER).await });
    settle().await;
    assert_eq!(h.http.running(), 1);

    h.fs.fail_create_dir.store(true, Ordering::SeqCst);
    h.manager.clear_cache().await.unwrap();
    assert_eq!(h.manager.readiness(), ReadinessState::Disabled);
    h.http.release(1);

    assert_eq!(pending.await.unwrap().unwrap(), COVER);
    assert!(!h.fs.has_file(&cached_path(COVER)));
    assert_eq!(h.manager.get_media_or_original(COVER).await.unwrap(), COVER);
}

#[tokio::test]
async fn test_events_for_successful_download() {
    let mut h = Harness::new(MediaCacheConfig::default(), ScriptedHttpClient::new(42));
    h.manager.get_media(COVER).await.unwrap();

    let events = h.drain_events();
    let states: Vec<_> = events
        .iter()
        .filter_map(|event| match event {
            CoreEvent::Cache(CacheEvent::ReadinessChanged { state }) => Some(state.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(states, vec!["initializing", "ready"]);

    let cached = events.iter().find_map(|event| match event {
        CoreEvent::Cache(CacheEvent::MediaCached { url, size, .. }) => Some((url.clone(), *size)),
        _ => None,
    });
    assert_eq!(cached, Some((COVER.to_string(), 42)));
}

#[tokio::test]
async fn test_stats_reflect_downloads() {
    let h = Harness::new(
        MediaCacheConfig::new().with_max_cache_size(1000),
        ScriptedHttpClient::new(100),
    );
    h.manager.get_media(COVER).await.unwrap();
    h.manager.get_media(BANNER).await.unwrap();

    let stats = h.manager.stats();
    assert_eq!(stats.entries, 2);
    assert_eq!(stats.total_bytes, 200);
    assert_eq!(stats.usage_percentage(), Some(20.0));
    assert_eq!(stats.readiness, ReadinessState::Ready);
    assert!(!stats.is_busy());
}

mock! {
    Http {}

    #[async_trait]
    impl HttpClient for Http {
        async fn execute(&self, request: HttpRequest) -> bridge_traits::error::Result<HttpResponse>;
    }
}

#[tokio::test]
async fn test_mocked_transport_error_maps_to_fetch_failure() {
    let mut http = MockHttp::new();
    http.expect_execute()
        .withf(|request| request.url == COVER && request.method == HttpMethod::Get)
        .times(2)
        .returning(|_| {
            Err(bridge_traits::BridgeError::OperationFailed(
                "connection reset".to_string(),
            ))
        });

    let clock = Arc::new(bridge_traits::time::ManualClock::default());
    let fs = Arc::new(InMemoryFileSystem::new(clock));
    let manager = MediaCacheManager::builder(MediaCacheConfig::default())
        .file_system(fs)
        .http_client(Arc::new(http))
        .build()
        .unwrap();

    let err = manager.get_media(COVER).await.unwrap_err();
    assert!(matches!(err, MediaCacheError::FetchFailure(ref message) if message.contains("connection reset")));
    assert_eq!(manager.get_media_or_original(COVER).await.unwrap(), COVER);
}

#[tokio::test]
async fn test_mocked_transport_success() {
    let mut http = MockHttp::new();
    http.expect_execute().times(1).returning(|_| {
        Ok(HttpResponse {
            status: 200,
            headers: HashMap::new(),
            body: Bytes::from_static(b"jpeg bytes"),
        })
    });

    let clock = Arc::new(bridge_traits::time::ManualClock::default());
    let fs = Arc::new(InMemoryFileSystem::new(clock));
    let manager = MediaCacheManager::builder(MediaCacheConfig::default())
        .file_system(fs.clone())
        .http_client(Arc::new(http))
        .build()
        .unwrap();

    manager.get_media(COVER).await.unwrap();
    manager.get_media(COVER).await.unwrap();
    assert!(fs.has_file(&cached_path(COVER)));
}

#[tokio::test]
async fn test_failure_events_can_be_filtered() {
    use core_runtime::events::{EventBus, EventStream};

    let bus = Arc::new(EventBus::default());
    let mut failures = EventStream::new(bus.subscribe()).filter(|event| {
        matches!(event, CoreEvent::Cache(CacheEvent::DownloadFailed { .. }))
    });

    let clock = Arc::new(bridge_traits::time::ManualClock::default());
    let manager = MediaCacheManager::builder(MediaCacheConfig::default())
        .file_system(Arc::new(InMemoryFileSystem::new(clock)))
        .http_client(Arc::new(
            ScriptedHttpClient::new(8).respond(BANNER, 503, Bytes::new()),
        ))
        .event_bus(bus)
        .build()
        .unwrap();

    manager.get_media(COVER).await.unwrap();
    assert!(manager.get_media(BANNER).await.is_err());

    match failures.try_recv() {
        Some(Ok(CoreEvent::Cache(CacheEvent::DownloadFailed { url, message }))) => {
            assert_eq!(url, BANNER);
            assert!(message.contains("503"));
        }
        other => panic!("expected a download failure, got {:?}", other),
    }
    assert!(failures.try_recv().is_none());
}
