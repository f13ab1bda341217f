//! One batch run
//!
//! A run folds one poll into the stores in a fixed order:
//!
//! 1. load every store the run will touch (a read failure aborts the run
//!    before anything is written)
//! 2. users: fold member statuses into timelines
//! 3. crimes: fold the crime roster, diffing slot occupancy
//! 4. naughty: score crimes whose window qualifies
//! 5. persist users, crimes, naughty in that order
//!
//! Later stages consume the in-memory output of earlier ones, so a failed
//! write does not stop the run; it is logged and reported in the
//! [`RunReport`].
//!
//! Precondition: at most one run writes a given set of stores at a time.

use serde::{de::DeserializeOwned, Serialize};
use tracing::{info, warn};

use crate::config::ScanConfig;
use crate::crimes::{update_crimes, CrimeDb, CrimeUpdateSummary};
use crate::diagnostics::ErrorLog;
use crate::error::Result;
use crate::naughty::{update_naughty_list, NaughtyDb};
use crate::status::{LocationLookup, LocationRules, StatusNormalizer};
use crate::storage::{DocumentStore, SaveOutcome, StoreKind};
use crate::timeline::{update_activity, TimelineSummary, UserDb};
use crate::torn::FactionSnapshot;

/// Outcome of persisting one store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreWrite {
    pub store: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<SaveOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary of one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunReport {
    pub timestamp: i64,
    pub members: usize,
    pub crimes_polled: usize,
    pub users: TimelineSummary,
    /// `None` when the crime stages were skipped by the refresh interval
    #[serde(skip_serializing_if = "Option::is_none")]
    pub crimes: Option<CrimeUpdateSummary>,
    pub flagged_crimes: Vec<u64>,
    pub writes: Vec<StoreWrite>,
}

impl RunReport {
    /// Stores whose write failed.
    pub fn failed_stores(&self) -> Vec<String> {
        self.writes
            .iter()
            .filter(|write| write.error.is_some())
            .map(|write| write.store.to_string())
            .collect()
    }
}

pub struct Pipeline<L = LocationRules> {
    store: DocumentStore,
    normalizer: StatusNormalizer<L>,
    scan: ScanConfig,
    crime_refresh_secs: u64,
    diagnostics: ErrorLog,
}

impl<L: LocationLookup> Pipeline<L> {
    pub fn new(
        store: DocumentStore,
        normalizer: StatusNormalizer<L>,
        scan: ScanConfig,
        diagnostics: ErrorLog,
    ) -> Self {
        Self {
            store,
            normalizer,
            scan,
            crime_refresh_secs: 0,
            diagnostics,
        }
    }

    /// Only refresh crimes and the naughty list when the crime store is at
    /// least this old.
    pub fn with_crime_refresh(mut self, secs: u64) -> Self {
        self.crime_refresh_secs = secs;
        self
    }

    async fn crimes_due(&self, now: i64) -> bool {
        if self.crime_refresh_secs == 0 {
            return true;
        }
        match self.store.last_modified(StoreKind::Crimes).await {
            Ok(Some(modified)) => {
                let age = now.saturating_sub(modified);
                let due = age >= self.crime_refresh_secs as i64;
                if !due {
                    info!(age, interval = self.crime_refresh_secs, "crime refresh not due");
                }
                due
            }
            Ok(None) => true,
            Err(err) => {
                warn!(error = %err, "could not read crime store age, refreshing");
                true
            }
        }
    }

    async fn load<T: DeserializeOwned + Default>(&mut self, kind: StoreKind) -> Result<T> {
        self.store.load(kind).await.inspect_err(|err| {
            self.diagnostics
                .record(&format!("loading {kind} store: {err}"), err.diagnostic_code());
        })
    }

    async fn persist<T: Serialize>(&mut self, kind: StoreKind, doc: &T) -> StoreWrite {
        match self.store.save(kind, doc).await {
            Ok(outcome) => {
                info!(store = %kind, ?outcome, "store persisted");
                StoreWrite {
                    store: kind.name(),
                    outcome: Some(outcome),
                    error: None,
                }
            }
            Err(err) => {
                self.diagnostics
                    .record(&format!("saving {kind} store: {err}"), err.diagnostic_code());
                StoreWrite {
                    store: kind.name(),
                    outcome: None,
                    error: Some(err.to_string()),
                }
            }
        }
    }

    /// Fold one poll into the stores.
    ///
    /// Store read failures abort the run; write failures are reported in the
    /// returned report.
    pub async fn process(&mut self, snapshot: &FactionSnapshot, now: i64) -> Result<RunReport> {
        let crimes_due = self.crimes_due(now).await;

        let mut users: UserDb = self.load(StoreKind::Users).await?;
        let mut stored = if crimes_due {
            let crimes: CrimeDb = self.load(StoreKind::Crimes).await?;
            let naughty: NaughtyDb = self.load(StoreKind::Naughty).await?;
            Some((crimes, naughty))
        } else {
            None
        };

        let mut report = RunReport {
            timestamp: now,
            members: snapshot.members.len(),
            crimes_polled: snapshot.crimes.len(),
            ..RunReport::default()
        };

        report.users = update_activity(&mut users, &snapshot.members, &self.normalizer, now);
        info!(
            created = report.users.created,
            changed = report.users.changed,
            unchanged = report.users.unchanged,
            "activity timelines updated"
        );

        if let Some((crimes, naughty)) = stored.as_mut() {
            let summary = update_crimes(crimes, &snapshot.crimes, &snapshot.members, now);
            info!(
                tracked = summary.tracked,
                actions = summary.actions,
                "crime store updated"
            );
            report.crimes = Some(summary);
            report.flagged_crimes = update_naughty_list(naughty, crimes, &users, &self.scan, now);
        }

        let write = self.persist(StoreKind::Users, &users).await;
        report.writes.push(write);
        if let Some((crimes, naughty)) = &stored {
            let write = self.persist(StoreKind::Crimes, crimes).await;
            report.writes.push(write);
            let write = self.persist(StoreKind::Naughty, naughty).await;
            report.writes.push(write);
        }

        Ok(report)
    }
}
