use super::*;

#[tokio::test]
async fn test_excluded_id_touches_nothing() {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = test_config(temp_dir.path());
    config.filter.exclude_id.insert("abc".to_string());
    let mut downloader = create_test_downloader(config.clone()).await;
    let mut events = downloader.subscribe();

    let outcome = downloader
        .process(&submission("abc", &format!("{}/a.jpg", server.uri())))
        .await;

    assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::ExcludedId));
    assert!(!config.download_dir.join("pics").exists());
    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [Event::SubmissionSkipped { id, reason: SkipReason::ExcludedId }] if id == "abc"
    ));
    server.verify().await;
}

#[tokio::test]
async fn test_min_score_boundary() {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;
    serve(&server, "/high.jpg", b"high", 1).await;
    serve(&server, "/low.jpg", b"low", 0).await;

    let mut config = test_config(temp_dir.path());
    config.filter.min_score = Some(5);
    let mut downloader = create_test_downloader(config.clone()).await;

    let mut low = submission("low", &format!("{}/low.jpg", server.uri()));
    low.score = 3;
    let mut high = submission("high", &format!("{}/high.jpg", server.uri()));
    high.score = 10;

    match downloader.process(&low).await {
        ProcessOutcome::Skipped(reason) => {
            assert_eq!(reason, SkipReason::ScoreBelowMinimum { score: 3, min: 5 });
            assert!(reason.to_string().starts_with("score below minimum"));
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let outcome = downloader.process(&high).await;
    assert!(matches!(outcome, ProcessOutcome::Completed(ResourceTally { written: 1, .. })));
    assert!(destination(&config, "high").exists());
    assert!(!destination(&config, "low").exists());
}

#[tokio::test]
async fn test_disabled_module_is_case_insensitive() {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;
    serve(&server, "/a.jpg", b"a", 0).await;

    let mut config = test_config(temp_dir.path());
    config.filter.disable_module.insert("DIRECT".to_string());
    let mut downloader = create_test_downloader(config).await;

    let outcome = downloader
        .process(&submission("abc", &format!("{}/a.jpg", server.uri())))
        .await;
    assert_eq!(
        outcome,
        ProcessOutcome::Skipped(SkipReason::DisabledModule {
            module: "Direct".to_string()
        })
    );
}

#[tokio::test]
async fn test_excluded_domain_rejects_submission_url() {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;
    serve(&server, "/a.jpg", b"a", 0).await;

    let mut config = test_config(temp_dir.path());
    config.filter.excluded_domains = vec!["127.0.0.1".to_string()];
    let mut downloader = create_test_downloader(config).await;

    let url = format!("{}/a.jpg", server.uri());
    let outcome = downloader.process(&submission("abc", &url)).await;
    assert_eq!(
        outcome,
        ProcessOutcome::Skipped(SkipReason::UrlFiltered { url })
    );
}

#[tokio::test]
async fn test_excluded_extension_skips_only_that_resource() {
    let temp_dir = tempdir().unwrap();
    let server = MockServer::start().await;
    serve(&server, "/anim.gif", b"gif", 0).await;
    serve(&server, "/still.jpg", b"jpg", 1).await;

    let mut config = test_config(temp_dir.path());
    config.filter.excluded_extensions = vec!["GIF".to_string()];
    let gallery = Arc::new(StaticDownloader {
        module: "Gallery",
        urls: vec![
            format!("{}/anim.gif", server.uri()),
            format!("{}/still.jpg", server.uri()),
        ],
    });
    let mut downloader = create_downloader_with(config.clone(), gallery).await;
    let mut events = downloader.subscribe();

    let outcome = downloader
        .process(&submission("abc", &format!("{}/gallery", server.uri())))
        .await;

    assert_eq!(
        outcome,
        ProcessOutcome::Completed(ResourceTally {
            written: 1,
            skipped: 1,
            ..Default::default()
        })
    );
    assert!(config.download_dir.join("pics/abc_2.jpg").exists());
    assert!(drain_events(&mut events).iter().any(|e| matches!(
        e,
        Event::ResourceSkipped { reason: ResourceSkip::Filtered, .. }
    )));
}

#[tokio::test]
async fn test_unresolvable_url_fails_submission() {
    let temp_dir = tempdir().unwrap();
    let mut downloader = create_test_downloader(test_config(temp_dir.path())).await;
    let mut events = downloader.subscribe();

    let outcome = downloader
        .process(&submission("abc", "ftp://example.com/a.jpg"))
        .await;

    assert_eq!(outcome, ProcessOutcome::Unresolved);
    assert!(matches!(
        drain_events(&mut events).as_slice(),
        [Event::SubmissionFailed { error, .. }] if error.contains("unsupported scheme")
    ));
}

#[tokio::test]
async fn test_extraction_failure_fails_submission() {
    let temp_dir = tempdir().unwrap();
    let mut downloader =
        create_downloader_with(test_config(temp_dir.path()), Arc::new(FailingDownloader)).await;

    let outcome = downloader
        .process(&submission("abc", "https://example.com/gallery"))
        .await;
    assert_eq!(outcome, ProcessOutcome::ExtractionFailed);
}
