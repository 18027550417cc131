//! Scrape, annotate and deliver stages plus the full run.
//!
//! # Responsibility
//! - Sequence the stages and turn every failure into a `false` result.
//! - Own stage start/end logging.
//!
//! # Invariants
//! - The render session is shut down when the scrape stage ends, on every path.
//! - A full run stops at the first failed stage.
//! - Ledger-completed items are never sent to the annotator again.

use crate::annotate::{
    decorate, format_timestamp, validate_annotation, AnnotationArchive, Annotator, ArchiveEntry,
};
use crate::config::AppConfig;
use crate::deliver::DeliveryChannel;
use crate::extract::{filter_by_category, ExtractResult, ExtractionRules, ItemExtractor};
use crate::model::item::WorkingSetRecord;
use crate::render::RenderSession;
use crate::repo::ledger_repo::CompletionLedger;
use crate::store::WorkingSetStore;
use chrono::Local;
use log::{error, info, warn};

/// Per-record outcome counts of one annotation stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnnotationReport {
    pub processed: usize,
    pub skipped: usize,
    pub failed: usize,
}

pub struct Pipeline<'a, L: CompletionLedger> {
    config: &'a AppConfig,
    store: WorkingSetStore,
    ledger: L,
    extractor: ItemExtractor,
}

impl<'a, L: CompletionLedger> Pipeline<'a, L> {
    pub fn new(config: &'a AppConfig, store: WorkingSetStore, ledger: L) -> ExtractResult<Self> {
        let rules = ExtractionRules::with_item_path_marker(config.site.item_path_marker.clone());
        let extractor = ItemExtractor::new(rules, &config.site.origin)?;
        Ok(Self {
            config,
            store,
            ledger,
            extractor,
        })
    }

    pub fn store(&self) -> &WorkingSetStore {
        &self.store
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    /// Renders the listing surface, extracts and filters items, saves them.
    pub fn run_scrape(&self, session: &mut dyn RenderSession) -> bool {
        stage_start("scrape");
        let succeeded = self.scrape_with(session);
        session.shutdown();
        stage_end("scrape", succeeded);
        succeeded
    }

    fn scrape_with(&self, session: &mut dyn RenderSession) -> bool {
        let render = &self.config.render;
        let listing_url = &self.config.site.listing_url;

        if let Err(err) = session.navigate(listing_url) {
            error!(
                "event=listing_navigate module=pipeline status=error url={} error={}",
                listing_url, err
            );
            return false;
        }
        if !session.wait_for_selector(&render.listing_ready_selector, render.wait_timeout()) {
            warn!(
                "event=listing_wait module=pipeline status=skip selector=\"{}\" reason=timeout",
                render.listing_ready_selector
            );
        }
        if let Err(err) = session.scroll_to_end(render.scroll_delay()) {
            warn!("event=listing_scroll module=pipeline status=error error={err}");
        }

        let markup = match session.current_markup() {
            Ok(markup) => markup,
            Err(err) => {
                error!("event=listing_markup module=pipeline status=error error={err}");
                return false;
            }
        };

        let items = self.extractor.extract(&markup, session);
        if items.is_empty() {
            warn!("event=scrape module=pipeline status=error reason=no_items");
            return false;
        }
        let items = filter_by_category(items, &self.config.site.target_categories);
        if items.is_empty() {
            warn!("event=scrape module=pipeline status=error reason=no_items_after_filter");
            return false;
        }

        let records: Vec<WorkingSetRecord> = items.into_iter().map(Into::into).collect();
        match self.store.save(records, true) {
            Ok(saved) => {
                info!("event=scrape module=pipeline status=ok saved={saved}");
                true
            }
            Err(err) => {
                error!("event=scrape module=pipeline status=error error={err}");
                false
            }
        }
    }

    /// Annotates every record that has no annotation and is not yet
    /// completed in the ledger, then merges the results into the store.
    pub fn run_annotation(&self, annotator: &dyn Annotator, archive: &AnnotationArchive) -> bool {
        stage_start("annotate");
        let succeeded = match self.annotate_with(annotator, archive) {
            Some(report) => {
                info!(
                    "event=annotate module=pipeline status=ok processed={} skipped={} failed={}",
                    report.processed, report.skipped, report.failed
                );
                true
            }
            None => false,
        };
        stage_end("annotate", succeeded);
        succeeded
    }

    fn annotate_with(
        &self,
        annotator: &dyn Annotator,
        archive: &AnnotationArchive,
    ) -> Option<AnnotationReport> {
        let records = match self.store.load() {
            Ok(records) => records,
            Err(err) => {
                error!("event=annotate module=pipeline status=error error={err}");
                return None;
            }
        };
        if records.is_empty() {
            warn!("event=annotate module=pipeline status=error reason=empty_working_set");
            return None;
        }

        let max_chars = self.config.annotation.max_chars;
        let candidates: Vec<WorkingSetRecord> = records
            .into_iter()
            .filter(|record| !record.has_annotation())
            .collect();
        let total = candidates.len();
        let mut report = AnnotationReport::default();
        let mut annotated = Vec::new();

        for (position, mut record) in candidates.into_iter().enumerate() {
            let step = position + 1;
            match self.ledger.is_completed(&record.permalink) {
                Ok(true) => {
                    info!(
                        "event=annotate_item module=pipeline status=skip item={step}/{total} reason=completed permalink={}",
                        record.permalink
                    );
                    report.skipped += 1;
                    continue;
                }
                Ok(false) => {}
                Err(err) => {
                    error!(
                        "event=annotate_item module=pipeline status=error item={step}/{total} error={err}"
                    );
                    report.failed += 1;
                    continue;
                }
            }

            let text = match annotator
                .annotate(&record.permalink)
                .and_then(|text| validate_annotation(&text, max_chars).map(|()| text))
            {
                Ok(text) => text,
                Err(err) => {
                    warn!(
                        "event=annotate_item module=pipeline status=error item={step}/{total} permalink={} error={err}",
                        record.permalink
                    );
                    report.failed += 1;
                    continue;
                }
            };

            let timestamp = format_timestamp(Local::now());
            record.annotation_text = decorate(&text);
            record.annotation_timestamp = timestamp.clone();

            if let Err(err) = archive.append(ArchiveEntry {
                title: record.title.clone(),
                permalink: record.permalink.clone(),
                annotated_at: timestamp,
                text,
            }) {
                warn!("event=archive_append module=pipeline status=error error={err}");
            }
            if let Err(err) = self.ledger.mark_completed(&record.permalink) {
                warn!("event=ledger_mark module=pipeline status=error error={err}");
            }

            info!(
                "event=annotate_item module=pipeline status=ok item={step}/{total} permalink={}",
                record.permalink
            );
            report.processed += 1;
            annotated.push(record);
        }

        if annotated.is_empty() {
            return Some(report);
        }
        match self.store.update(&annotated) {
            Ok(_) => Some(report),
            Err(err) => {
                error!("event=annotate module=pipeline status=error error={err}");
                None
            }
        }
    }

    /// Probes the channel, then sends every annotated record in one batch.
    pub fn run_delivery(&self, channel: &dyn DeliveryChannel) -> bool {
        stage_start("deliver");
        let succeeded = self.deliver_with(channel);
        stage_end("deliver", succeeded);
        succeeded
    }

    fn deliver_with(&self, channel: &dyn DeliveryChannel) -> bool {
        if !channel.probe() {
            error!("event=deliver module=pipeline status=error reason=probe_failed");
            return false;
        }
        let records = match self.store.load() {
            Ok(records) => records,
            Err(err) => {
                error!("event=deliver module=pipeline status=error error={err}");
                return false;
            }
        };
        let annotated: Vec<WorkingSetRecord> = records
            .into_iter()
            .filter(WorkingSetRecord::has_annotation)
            .collect();
        if annotated.is_empty() {
            warn!("event=deliver module=pipeline status=error reason=nothing_annotated");
            return false;
        }

        match channel.deliver(&annotated) {
            Ok(sent) => {
                info!("event=deliver module=pipeline status=ok sent={sent}");
                true
            }
            Err(err) => {
                error!("event=deliver module=pipeline status=error error={err}");
                false
            }
        }
    }

    /// Scrape, annotate, deliver; stops after the first failed stage.
    pub fn run_full(
        &self,
        session: &mut dyn RenderSession,
        annotator: &dyn Annotator,
        archive: &AnnotationArchive,
        channel: &dyn DeliveryChannel,
    ) -> bool {
        info!("event=run module=pipeline status=start");
        let succeeded = self.run_scrape(session)
            && self.run_annotation(annotator, archive)
            && self.run_delivery(channel);
        if succeeded {
            info!("event=run module=pipeline status=ok");
        } else {
            error!("event=run module=pipeline status=error reason=stage_failed");
        }
        succeeded
    }
}

fn stage_start(stage: &str) {
    info!("event=stage module=pipeline stage={stage} status=start");
}

fn stage_end(stage: &str, succeeded: bool) {
    if succeeded {
        info!("event=stage module=pipeline stage={stage} status=ok");
    } else {
        error!("event=stage module=pipeline stage={stage} status=error");
    }
}
