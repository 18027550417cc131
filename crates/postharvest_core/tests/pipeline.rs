mod common;

use common::{listing, ScriptedSession};
use postharvest_core::annotate::{AnnotateResult, AnnotationArchive, Annotator, SEPARATOR};
use postharvest_core::deliver::{DeliveryChannel, DeliveryResult};
use postharvest_core::{
    AppConfig, CompletionLedger, Pipeline, SqliteCompletionLedger, WorkingSetRecord,
    WorkingSetStore,
};
use std::cell::RefCell;

const LISTING: &str = r#"
    <div class="blog-grid-card">
      <span class="tag">Product</span><img src="/img/a.jpg">
      <a href="/blog/post-a">Post A</a>
    </div>
    <div class="blog-grid-card">
      <span class="tag">Engineering</span><img src="/img/b.jpg">
      <a href="/blog/post-b">Post B</a>
    </div>
    <div class="blog-grid-card">
      <span class="tag">product</span><img src="/img/c.jpg">
      <a href="/blog/post-c">Post C</a>
    </div>"#;

struct Fixture {
    _dir: tempfile::TempDir,
    config: AppConfig,
    archive: AnnotationArchive,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.site.origin = "https://example.com".to_string();
        config.site.listing_url = "https://example.com/blog".to_string();
        config.site.target_categories = vec!["Product".to_string()];
        config.annotation.max_chars = 40;
        config.files.working_set_path = dir.path().join("data").join("posts.csv");
        config.files.ledger_path = dir.path().join("database").join("processed.sqlite3");
        config.files.archive_path = dir.path().join("data").join("annotations.json");
        let archive = AnnotationArchive::open(&config.files.archive_path).unwrap();
        Self {
            _dir: dir,
            config,
            archive,
        }
    }

    fn pipeline(&self) -> Pipeline<'_, SqliteCompletionLedger> {
        let store = WorkingSetStore::new(&self.config.files.working_set_path);
        let ledger = SqliteCompletionLedger::open(&self.config.files.ledger_path).unwrap();
        Pipeline::new(&self.config, store, ledger).unwrap()
    }
}

#[derive(Default)]
struct RecordingAnnotator {
    calls: RefCell<Vec<String>>,
    reply: Option<String>,
}

impl Annotator for RecordingAnnotator {
    fn annotate(&self, permalink: &str) -> AnnotateResult<String> {
        self.calls.borrow_mut().push(permalink.to_string());
        Ok(self
            .reply
            .clone()
            .unwrap_or_else(|| format!("About {}", permalink.rsplit('/').next().unwrap_or(""))))
    }
}

struct RecordingChannel {
    reachable: bool,
    delivered: RefCell<Vec<WorkingSetRecord>>,
}

impl RecordingChannel {
    fn new(reachable: bool) -> Self {
        Self {
            reachable,
            delivered: RefCell::new(Vec::new()),
        }
    }
}

impl DeliveryChannel for RecordingChannel {
    fn probe(&self) -> bool {
        self.reachable
    }

    fn deliver(&self, records: &[WorkingSetRecord]) -> DeliveryResult<usize> {
        self.delivered.borrow_mut().extend_from_slice(records);
        Ok(records.len())
    }
}

#[test]
fn full_run_scrapes_annotates_and_delivers() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing(LISTING));
    let annotator = RecordingAnnotator::default();
    let channel = RecordingChannel::new(true);

    assert!(pipeline.run_full(&mut session, &annotator, &fixture.archive, &channel));

    assert_eq!(session.shutdowns, 1);
    let records = pipeline.store().load().unwrap();
    let permalinks: Vec<&str> = records.iter().map(|r| r.permalink.as_str()).collect();
    assert_eq!(
        permalinks,
        vec!["https://example.com/blog/post-a", "https://example.com/blog/post-c"]
    );
    assert_eq!(records[0].annotation_text, format!("{SEPARATOR}About post-a"));
    assert!(!records[0].annotation_timestamp.is_empty());

    assert!(pipeline
        .ledger()
        .is_completed("https://example.com/blog/post-c")
        .unwrap());
    assert_eq!(fixture.archive.load().unwrap().len(), 2);
    assert_eq!(channel.delivered.borrow().len(), 2);
}

#[test]
fn failed_navigation_aborts_run_and_still_shuts_down() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing(LISTING));
    session.fail_navigation = true;
    let annotator = RecordingAnnotator::default();
    let channel = RecordingChannel::new(true);

    assert!(!pipeline.run_full(&mut session, &annotator, &fixture.archive, &channel));

    assert_eq!(session.shutdowns, 1);
    assert!(annotator.calls.borrow().is_empty());
    assert!(channel.delivered.borrow().is_empty());
    assert!(!fixture.config.files.working_set_path.exists());
}

#[test]
fn scrape_without_items_fails() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing("<p>nothing here</p>"));
    session.selector_present = false;

    assert!(!pipeline.run_scrape(&mut session));
    assert_eq!(session.shutdowns, 1);
}

#[test]
fn annotation_skips_completed_items() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing(LISTING));
    assert!(pipeline.run_scrape(&mut session));
    pipeline
        .ledger()
        .mark_completed("https://example.com/blog/post-a")
        .unwrap();
    let annotator = RecordingAnnotator::default();

    assert!(pipeline.run_annotation(&annotator, &fixture.archive));

    assert_eq!(
        *annotator.calls.borrow(),
        vec!["https://example.com/blog/post-c".to_string()]
    );
    let missing = pipeline.store().records_missing_annotation().unwrap();
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].permalink, "https://example.com/blog/post-a");
}

#[test]
fn overlong_annotation_is_not_stored_or_completed() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing(LISTING));
    assert!(pipeline.run_scrape(&mut session));
    let annotator = RecordingAnnotator {
        reply: Some("x".repeat(41)),
        ..RecordingAnnotator::default()
    };

    assert!(pipeline.run_annotation(&annotator, &fixture.archive));

    assert_eq!(annotator.calls.borrow().len(), 2);
    assert_eq!(pipeline.store().statistics().unwrap().with_annotation, 0);
    assert_eq!(pipeline.ledger().statistics().unwrap().total_completed, 0);
    assert!(fixture.archive.load().unwrap().is_empty());
}

#[test]
fn annotation_fails_on_empty_working_set() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();

    assert!(!pipeline.run_annotation(&RecordingAnnotator::default(), &fixture.archive));
}

#[test]
fn delivery_requires_reachable_channel_and_annotated_records() {
    let fixture = Fixture::new();
    let pipeline = fixture.pipeline();
    let mut session = ScriptedSession::new(&listing(LISTING));
    assert!(pipeline.run_scrape(&mut session));

    let channel = RecordingChannel::new(true);
    assert!(!pipeline.run_delivery(&channel));
    assert!(channel.delivered.borrow().is_empty());

    assert!(pipeline.run_annotation(&RecordingAnnotator::default(), &fixture.archive));
    let unreachable = RecordingChannel::new(false);
    assert!(!pipeline.run_delivery(&unreachable));
    assert!(unreachable.delivered.borrow().is_empty());

    assert!(pipeline.run_delivery(&channel));
    assert_eq!(channel.delivered.borrow().len(), 2);
}
