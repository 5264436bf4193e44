use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::*;
use crate::classifier::{SimulatedClassifier, Verdict};
use crate::models::{RecordState, NOT_APPLICABLE};
use crate::test_support::{acme, memory_engine, RecordingAlertSink, ScriptedClassifier};

async fn suspected_engine(
    classifier: ScriptedClassifier,
) -> (MonitorEngine, Arc<ScriptedClassifier>, Arc<RecordingAlertSink>) {
    let classifier = Arc::new(classifier);
    let sink = Arc::new(RecordingAlertSink::default());
    let engine = memory_engine(classifier.clone(), sink.clone(), MonitoringPolicy::default()).await;
    (engine, classifier, sink)
}

#[tokio::test]
async fn test_submitted_suspected_domain_starts_at_zero() {
    let (engine, _, _) = suspected_engine(ScriptedClassifier::new(Verdict::Suspected)).await;

    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    assert_eq!(record.state, RecordState::Suspected);
    assert_eq!(record.elapsed_milliunits, 0);
    assert_eq!(record.target_entity, acme());
    assert_eq!(record.reclassification_reason, NOT_APPLICABLE);
    assert_eq!(engine.list_records().await.unwrap(), vec![record]);
}

#[tokio::test]
async fn test_expires_after_900_quiet_ticks() {
    let (engine, _, sink) = suspected_engine(ScriptedClassifier::new(Verdict::Suspected)).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    for tick in 1..900 {
        let report = engine.tick().await.unwrap();
        assert_eq!(report.advanced, 1, "tick {}", tick);
    }
    let last = engine.tick().await.unwrap();
    assert_eq!(last.expired, 1);

    let expired = engine.find_record(record.id).await.unwrap();
    assert_eq!(expired.state, RecordState::Expired);
    assert_eq!(expired.elapsed_units(), 90.0);
    assert!(sink.messages().is_empty());
    assert!(engine.list_alerts().await.unwrap().is_empty());

    let after = engine.tick().await.unwrap();
    assert_eq!(after.evaluated, 0);
    assert_eq!(engine.find_record(record.id).await.unwrap(), expired);
}

#[tokio::test]
async fn test_positive_signal_on_tick_37_promotes_once() {
    let (engine, _, sink) =
        suspected_engine(ScriptedClassifier::new(Verdict::Suspected).promote_on("x.test", 37)).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    for _ in 0..36 {
        engine.tick().await.unwrap();
    }
    assert_eq!(engine.find_record(record.id).await.unwrap().state, RecordState::Suspected);

    let report = engine.tick().await.unwrap();
    assert_eq!(report.promoted, 1);

    let promoted = engine.find_record(record.id).await.unwrap();
    assert_eq!(promoted.state, RecordState::Phishing);
    assert!(
        promoted.reclassification_reason.contains("unit 3.6"),
        "{}",
        promoted.reclassification_reason
    );
    assert_eq!(promoted.evidence["visual_similarity_score"], 0.95);
    assert_eq!(promoted.elapsed_milliunits, 3_600);

    for _ in 0..10 {
        engine.tick().await.unwrap();
    }
    assert_eq!(engine.find_record(record.id).await.unwrap(), promoted);

    let delivered = sink.messages();
    assert_eq!(delivered.len(), 1);
    assert_eq!(delivered[0].0, record.id);
    assert!(delivered[0].1.contains("RE-CLASSIFIED as PHISHING"));

    let persisted = engine.list_alerts().await.unwrap();
    assert_eq!(persisted.len(), 1);
    assert_eq!(persisted[0].record_id, record.id);
}

#[tokio::test]
async fn test_duplicate_submissions_are_independent_records() {
    let (engine, _, _) =
        suspected_engine(ScriptedClassifier::new(Verdict::Suspected).promote_on("y.test", 2)).await;

    let (first, second) = tokio::join!(
        engine.submit_domain("y.test", acme()),
        engine.submit_domain("y.test", acme())
    );
    let (first, second) = (first.unwrap(), second.unwrap());
    assert_ne!(first.id, second.id);
    assert_eq!(engine.list_records().await.unwrap().len(), 2);

    // per-domain call counter: the second re-evaluation of "y.test" promotes
    // whichever record is evaluated second on the first tick
    let report = engine.tick().await.unwrap();
    assert_eq!(report.evaluated, 2);
    assert_eq!(report.advanced, 1);
    assert_eq!(report.promoted, 1);

    let states: Vec<_> = engine
        .list_records()
        .await
        .unwrap()
        .into_iter()
        .map(|r| (r.state, r.elapsed_milliunits))
        .collect();
    assert!(states.contains(&(RecordState::Phishing, 0)));
    assert!(states.contains(&(RecordState::Suspected, 100)));
}

#[tokio::test]
async fn test_classifier_timeout_creates_no_record() {
    let classifier = ScriptedClassifier::new(Verdict::Suspected).classify_delay(Duration::from_millis(500));
    let (engine, _, _) = suspected_engine(classifier).await;
    let engine = engine.with_classification_timeout(Duration::from_millis(20));

    let err = engine.submit_domain("x.test", acme()).await.unwrap_err();

    assert!(matches!(err, MonitorError::ClassificationUnavailable { .. }), "{:?}", err);
    assert!(engine.list_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_classifier_failure_creates_no_record() {
    let (engine, _, _) =
        suspected_engine(ScriptedClassifier::new(Verdict::Suspected).failing_for("x.test")).await;

    let err = engine.submit_domain("x.test", acme()).await.unwrap_err();
    assert!(matches!(err, MonitorError::ClassificationUnavailable { .. }));
    assert!(engine.list_records().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_invalid_submission_is_rejected_before_classifying() {
    let (engine, _, _) = suspected_engine(ScriptedClassifier::new(Verdict::Suspected)).await;

    let err = engine.submit_domain("   ", acme()).await.unwrap_err();
    assert!(matches!(err, MonitorError::InvalidInput(_)));

    let err = engine
        .submit_domain("x.test", TargetEntity::new(" ", "acme.com"))
        .await
        .unwrap_err();
    assert!(matches!(err, MonitorError::InvalidInput(_)));
}

#[tokio::test]
async fn test_only_suspected_records_are_monitored() {
    for verdict in [Verdict::Legitimate, Verdict::Phishing] {
        let (engine, classifier, _) = suspected_engine(ScriptedClassifier::new(verdict)).await;
        let record = engine.submit_domain("z.test", acme()).await.unwrap();
        assert_eq!(record.state, RecordState::from(verdict));

        let report = engine.tick().await.unwrap();
        assert_eq!(report.evaluated, 0);
        assert_eq!(classifier.reevaluations("z.test"), 0);
        assert_eq!(engine.find_record(record.id).await.unwrap(), record);
    }
}

#[tokio::test]
async fn test_concurrent_ticks_do_not_double_increment() {
    let classifier = ScriptedClassifier::new(Verdict::Suspected).reevaluate_delay(Duration::from_millis(50));
    let (engine, _, _) = suspected_engine(classifier).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    let (a, b) = tokio::join!(engine.tick(), engine.tick());
    let (a, b) = (a.unwrap(), b.unwrap());

    assert!(a.skipped != b.skipped, "exactly one tick should run: {:?} {:?}", a, b);
    assert_eq!(engine.find_record(record.id).await.unwrap().elapsed_milliunits, 100);
}

#[tokio::test]
async fn test_failed_reevaluation_leaves_record_untouched() {
    let classifier = ScriptedClassifier::new(Verdict::Suspected)
        .promote_on("ok.test", 100)
        .failing_for("down.test");
    let (engine, _, _) = suspected_engine(ScriptedClassifier::new(Verdict::Suspected)).await;
    let ok = engine.submit_domain("ok.test", acme()).await.unwrap();
    let down = engine.submit_domain("down.test", acme()).await.unwrap();

    // swap in the flaky classifier for the ticks
    let engine = MonitorEngine::new(
        engine.store().clone(),
        Arc::new(classifier),
        Arc::new(RecordingAlertSink::default()),
        MonitoringPolicy::default(),
    );

    let report = engine.tick().await.unwrap();
    assert_eq!(report.deferred, 1);
    assert_eq!(report.advanced, 1);
    assert_eq!(engine.find_record(ok.id).await.unwrap().elapsed_milliunits, 100);
    assert_eq!(engine.find_record(down.id).await.unwrap(), down);
}

#[tokio::test]
async fn test_recheck_cadence_is_independent_of_increment() {
    let classifier = Arc::new(ScriptedClassifier::new(Verdict::Suspected));
    let policy = MonitoringPolicy::new(90.0, 0.1, 3).unwrap();
    let engine = memory_engine(classifier.clone(), Arc::new(RecordingAlertSink::default()), policy).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    for _ in 0..7 {
        engine.tick().await.unwrap();
    }

    assert_eq!(classifier.reevaluations("x.test"), 2);
    assert_eq!(engine.find_record(record.id).await.unwrap().elapsed_milliunits, 700);
}

#[tokio::test]
async fn test_store_failure_fails_the_tick() {
    let (engine, _, sink) =
        suspected_engine(ScriptedClassifier::new(Verdict::Suspected).promote_on("x.test", 1)).await;
    engine.submit_domain("x.test", acme()).await.unwrap();
    engine.store().pool().close().await;

    let err = engine.tick().await.unwrap_err();
    assert!(matches!(err, MonitorError::StoreUnavailable(_)));
    assert!(sink.messages().is_empty());
}

#[tokio::test]
async fn test_failed_commit_drops_the_whole_promotion() {
    let (engine, classifier, sink) =
        suspected_engine(ScriptedClassifier::new(Verdict::Suspected).promote_on("x.test", 1)).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    // alert insert fails inside the tick transaction, after the record update
    sqlx::query(
        "CREATE TRIGGER reject_alerts BEFORE INSERT ON alerts \
         BEGIN SELECT RAISE(ABORT, 'disk I/O error'); END",
    )
    .execute(engine.store().pool())
    .await
    .unwrap();

    let err = engine.tick().await.unwrap_err();
    assert!(matches!(err, MonitorError::StoreUnavailable(_)), "{:?}", err);
    assert_eq!(classifier.reevaluations("x.test"), 1);

    assert_eq!(engine.find_record(record.id).await.unwrap(), record);
    assert!(engine.list_alerts().await.unwrap().is_empty());
    assert!(sink.messages().is_empty());

    sqlx::query("DROP TRIGGER reject_alerts")
        .execute(engine.store().pool())
        .await
        .unwrap();
    let report = engine.tick().await.unwrap();
    assert_eq!(report.advanced, 1);
    assert_eq!(engine.find_record(record.id).await.unwrap().elapsed_milliunits, 100);
}

#[tokio::test]
async fn test_failed_alert_delivery_keeps_promotion() {
    struct DownSink;

    #[async_trait]
    impl AlertSink for DownSink {
        async fn notify(&self, _: &MonitoringRecord, _: &str) -> MonitorResult<()> {
            Err(MonitorError::AlertDelivery("webhook returned 502".into()))
        }
    }

    let classifier = Arc::new(ScriptedClassifier::new(Verdict::Suspected).promote_on("x.test", 1));
    let engine = memory_engine(classifier, Arc::new(DownSink), MonitoringPolicy::default()).await;
    let record = engine.submit_domain("x.test", acme()).await.unwrap();

    let report = engine.tick().await.unwrap();
    assert_eq!(report.promoted, 1);
    assert_eq!(engine.find_record(record.id).await.unwrap().state, RecordState::Phishing);
    assert_eq!(engine.list_alerts().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_seeded_signals_give_identical_histories() {
    async fn run(seed: u64) -> Vec<Vec<(String, RecordState, i64)>> {
        let classifier = Arc::new(SimulatedClassifier::new(0.05, Some(seed)).unwrap().with_verdict(Verdict::Suspected));
        let engine = memory_engine(
            classifier,
            Arc::new(RecordingAlertSink::default()),
            MonitoringPolicy::new(5.0, 0.1, 1).unwrap(),
        )
        .await;
        for domain in ["a.test", "b.test", "c.test"] {
            engine.submit_domain(domain, acme()).await.unwrap();
        }

        let mut history = Vec::new();
        for _ in 0..60 {
            engine.tick().await.unwrap();
            let mut snapshot: Vec<_> = engine
                .list_records()
                .await
                .unwrap()
                .into_iter()
                .map(|r| (r.domain, r.state, r.elapsed_milliunits))
                .collect();
            snapshot.sort_by(|a, b| a.0.cmp(&b.0));
            history.push(snapshot);
        }
        history
    }

    let first = run(2024).await;
    let second = run(2024).await;
    assert_eq!(first, second);

    for window in first.windows(2) {
        for (before, after) in window[0].iter().zip(&window[1]) {
            assert!(after.2 >= before.2, "elapsed decreased for {}", before.0);
            if before.1.is_terminal() {
                assert_eq!(before, after, "terminal record {} changed", before.0);
            }
        }
    }
}
