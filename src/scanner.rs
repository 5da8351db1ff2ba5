use chrono::{DateTime, Duration, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::error::SourceError;
use crate::extract;
use crate::filter::{self, AcceptedCode, Verdict};
use crate::lexicon::IgnoreLexicon;
use crate::notify::Notifier;
use crate::source::{MessageSource, RawMessage};
use crate::store::CodeStore;

/// Limits on how much of each source is read in one run.
#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub lookback: Duration,
    /// Max messages read from a newest-first source.
    pub message_limit: usize,
    pub letter_required: bool,
    pub now: DateTime<Utc>,
}

impl ScanPolicy {
    fn cutoff(&self) -> DateTime<Utc> {
        self.now - self.lookback
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Delivered,
    /// Code is stored as known but the alert did not go out.
    DeliveryFailed(String),
    /// Code could not be stored; it was not announced and stays unknown.
    PersistFailed(String),
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Delivered => "delivered",
            Outcome::DeliveryFailed(_) => "delivery_failed",
            Outcome::PersistFailed(_) => "persist_failed",
        }
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            Outcome::Delivered => None,
            Outcome::DeliveryFailed(d) | Outcome::PersistFailed(d) => Some(d),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Sighting {
    pub code: String,
    pub provenance_link: String,
    pub source_id: String,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default)]
pub struct SourceReport {
    pub source_id: String,
    pub messages_seen: usize,
    pub messages_scanned: usize,
    pub skipped_old: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScanReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sources: Vec<SourceReport>,
    pub sightings: Vec<Sighting>,
}

impl ScanReport {
    pub fn sources_failed(&self) -> usize {
        self.sources.iter().filter(|s| s.error.is_some()).count()
    }

    pub fn messages_scanned(&self) -> usize {
        self.sources.iter().map(|s| s.messages_scanned).sum()
    }

    pub fn count(&self, label: &str) -> usize {
        self.sightings
            .iter()
            .filter(|s| s.outcome.label() == label)
            .count()
    }
}

/// Runs every source through extraction, filtering, storage and
/// notification, strictly one code at a time.
pub struct Scanner<'a> {
    lexicon: &'a IgnoreLexicon,
    store: &'a mut dyn CodeStore,
    notifier: &'a dyn Notifier,
    policy: ScanPolicy,
    progress: ProgressBar,
}

impl<'a> Scanner<'a> {
    pub fn new(
        lexicon: &'a IgnoreLexicon,
        store: &'a mut dyn CodeStore,
        notifier: &'a dyn Notifier,
        policy: ScanPolicy,
    ) -> Self {
        Scanner {
            lexicon,
            store,
            notifier,
            policy,
            progress: ProgressBar::hidden(),
        }
    }

    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:30} {pos}/{len} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        self.progress = progress;
        self
    }

    pub fn run(&mut self, sources: &[Box<dyn MessageSource>]) -> ScanReport {
        let started_at = Utc::now();
        let mut report = ScanReport {
            started_at,
            finished_at: started_at,
            sources: Vec::with_capacity(sources.len()),
            sightings: Vec::new(),
        };

        self.progress.set_length(sources.len() as u64);
        for source in sources {
            self.progress.set_message(source.id().to_string());
            let mut summary = SourceReport {
                source_id: source.id().to_string(),
                ..Default::default()
            };
            if let Err(e) = self.scan_source(source.as_ref(), &mut summary, &mut report.sightings) {
                warn!("Error checking {}: {}", source.id(), e);
                summary.error = Some(e.to_string());
            }
            report.sources.push(summary);
            self.progress.inc(1);
        }
        self.progress.finish_and_clear();

        report.finished_at = Utc::now();
        info!(
            "Scanned {} messages from {} sources ({} failed), {} new codes",
            report.messages_scanned(),
            report.sources.len(),
            report.sources_failed(),
            report.sightings.len()
        );
        report
    }

    fn scan_source(
        &mut self,
        source: &dyn MessageSource,
        summary: &mut SourceReport,
        sightings: &mut Vec<Sighting>,
    ) -> Result<(), SourceError> {
        let mut messages = source.fetch()?;
        let newest_first = source.newest_first();
        if newest_first {
            messages.truncate(self.policy.message_limit);
        }
        let cutoff = self.policy.cutoff();

        for msg in &messages {
            summary.messages_seen += 1;
            if msg.published_at.is_some_and(|ts| ts < cutoff) {
                summary.skipped_old += 1;
                if newest_first {
                    // everything after this one is older still
                    break;
                }
                continue;
            }
            summary.messages_scanned += 1;
            self.scan_message(msg, sightings);
        }
        debug!(
            "{}: {} seen, {} scanned, {} too old",
            summary.source_id, summary.messages_seen, summary.messages_scanned, summary.skipped_old
        );
        Ok(())
    }

    fn scan_message(&mut self, msg: &RawMessage, sightings: &mut Vec<Sighting>) {
        let text = extract::normalize(&msg.text);
        for candidate in extract::extract(&text, self.policy.letter_required) {
            match filter::evaluate(candidate, &msg.provenance_link, self.lexicon, &*self.store) {
                Verdict::Ignored => debug!("{}: ignored word", candidate),
                Verdict::Known => debug!("{}: already known", candidate),
                Verdict::Accepted(accepted) => {
                    let outcome = self.accept(&accepted);
                    sightings.push(Sighting {
                        code: accepted.code,
                        provenance_link: accepted.provenance_link,
                        source_id: msg.source_id.clone(),
                        outcome,
                    });
                }
            }
        }
    }

    /// Store first, then announce. A code that cannot be stored is not
    /// announced, so a later run can pick it up again.
    fn accept(&mut self, accepted: &AcceptedCode) -> Outcome {
        info!(
            "New code found: {} from {}",
            accepted.code, accepted.provenance_link
        );
        if let Err(e) = self.store.add(&accepted.code) {
            error!("Could not record {}: {}", accepted.code, e);
            return Outcome::PersistFailed(e.to_string());
        }
        match self.notifier.send(&accepted.code, &accepted.provenance_link) {
            Ok(()) => Outcome::Delivered,
            Err(e) => {
                warn!(
                    "Failed to announce {} (kept as known): {}",
                    accepted.code, e
                );
                Outcome::DeliveryFailed(e.to_string())
            }
        }
    }
}
