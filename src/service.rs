// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Attendance Service
//!
//! Orchestrates one attendance event across the four registers and owns the
//! process-scoped state: the storage key, the biometric matcher, and the
//! set of identities already marked today.
//!
//! ## Event Pipeline
//!
//! 1. Resolve the identity (given directly, or matched from a vector)
//! 2. Suppress repeats within the same day (recognition path only)
//! 3. Enroll the identity in every register
//! 4. Write the status to daily, master, and calendar
//! 5. Recompute the yearly aggregates
//!
//! Registers fail independently: a broken yearly or calendar file is
//! reported in the [`EventReport`] and never stops the daily write.

use std::collections::{BTreeMap, HashSet};
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::config::AppConfig;
use crate::recognition::{
    capture_samples, BoundingBox, Detection, GalleryRepository, IdentityMatcher, MatchError,
    MatchResult, TwinConflict, TwinPair, VectorSource,
};
use crate::storage::{
    AttendanceStatus, Identity, KeyStore, Ledger, MasterEntry, SecureStorage, StorageError,
    StoragePaths, StorageResult, StoreFailure, StoreKind, YearlySummary,
};

/// Scratch files older than this are removed at startup.
const STALE_SCRATCH_AGE: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Match(#[from] MatchError),
    #[error("no usable samples captured after {attempts} frames")]
    NoSamples { attempts: usize },
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Who an event is about.
#[derive(Debug, Clone, PartialEq)]
pub enum Subject {
    Identity(Identity),
    Vector(Vec<f64>),
}

/// What one event wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EventReport {
    pub identity: Identity,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    /// Registers that could not be updated.
    pub failures: Vec<StoreFailure>,
    /// Registers that ignored the event, such as a calendar for another year.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<StoreKind>,
    /// Yearly aggregates after the event, when recomputed.
    pub summary: Option<YearlySummary>,
}

impl EventReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn failed(&self, store: StoreKind) -> bool {
        self.failures.iter().any(|f| f.store == store)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum MarkOutcome {
    Marked { report: EventReport },
    /// Already marked today by this process; nothing written.
    AlreadyMarked { identity: Identity },
    /// Vector matched no enrolled identity; nothing written.
    Unknown,
}

/// One detection resolved during recognition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Recognition {
    pub bounding_box: BoundingBox,
    #[serde(rename = "match")]
    pub matched: MatchResult,
    pub outcome: MarkOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct EnrollmentReport {
    pub identity: Identity,
    pub samples: usize,
    /// Samples of this identity that were replaced.
    pub replaced: usize,
    pub twin_of: Option<i64>,
    pub failures: Vec<StoreFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EnrollmentOutcome {
    Enrolled(EnrollmentReport),
    /// Captured samples look like another identity. Nothing was applied;
    /// resolve with [`AttendanceService::commit_enrollment`].
    Conflict {
        conflict: TwinConflict,
        samples: Vec<Vec<f64>>,
    },
}

/// Most recent event dates whose marks are remembered.
const MARKED_DATES_KEPT: usize = 7;

/// Identities already marked, per event date.
#[derive(Debug, Default)]
struct MarkedDates {
    dates: BTreeMap<NaiveDate, HashSet<i64>>,
}

impl MarkedDates {
    fn contains(&self, date: NaiveDate, id: i64) -> bool {
        self.dates.get(&date).is_some_and(|ids| ids.contains(&id))
    }

    fn insert(&mut self, date: NaiveDate, id: i64) {
        self.dates.entry(date).or_default().insert(id);
        while self.dates.len() > MARKED_DATES_KEPT {
            if let Some((dropped, ids)) = self.dates.pop_first() {
                tracing::debug!(date = %dropped, cleared = ids.len(), "Dedup date expired");
            }
        }
    }
}

fn local_today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct AttendanceService {
    config: AppConfig,
    keys: KeyStore,
    storage: SecureStorage,
    matcher: IdentityMatcher,
    marked: MarkedDates,
    clock: fn() -> NaiveDate,
}

impl AttendanceService {
    pub fn new(config: AppConfig) -> ServiceResult<Self> {
        Self::with_clock(config, local_today)
    }

    /// Build the service with a custom source of "today".
    ///
    /// Loads (or creates) the key, prepares the data directory, and
    /// bootstraps every register. Registers or a gallery left unreadable by
    /// a key reset are logged and left for [`reset_ledger`](Self::reset_ledger).
    pub fn with_clock(config: AppConfig, clock: fn() -> NaiveDate) -> ServiceResult<Self> {
        let keys = KeyStore::new(&config.key_path);
        let key = keys.load()?;

        let mut storage = SecureStorage::new(StoragePaths::new(&config.data_dir), key);
        storage.initialize()?;

        if let Err(e) = storage.sweep_stale_scratch(STALE_SCRATCH_AGE) {
            tracing::warn!(error = %e, "Scratch sweep failed");
        }

        if let Err(e) = Ledger::new(&storage).ensure_all(clock()) {
            tracing::warn!(error = %e, "Attendance registers not ready");
        }

        let gallery = match GalleryRepository::new(&storage).load() {
            Ok(gallery) => gallery,
            Err(e @ StorageError::Corrupt { .. }) => {
                tracing::warn!(error = %e, "Gallery unreadable, starting empty");
                Default::default()
            }
            Err(e) => return Err(e.into()),
        };
        tracing::info!(
            data_dir = %config.data_dir.display(),
            samples = gallery.len(),
            "Attendance service ready"
        );

        let matcher = IdentityMatcher::new(gallery, config.thresholds);
        Ok(Self {
            config,
            keys,
            storage,
            matcher,
            marked: MarkedDates::default(),
            clock,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn storage(&self) -> &SecureStorage {
        &self.storage
    }

    pub fn matcher(&self) -> &IdentityMatcher {
        &self.matcher
    }

    pub fn today(&self) -> NaiveDate {
        (self.clock)()
    }

    pub fn health_check(&self) -> StorageResult<()> {
        self.storage.health_check()
    }

    // ========== Attendance ==========

    /// Mark `subject` for today.
    pub fn mark_presence(&mut self, subject: Subject, status: AttendanceStatus) -> MarkOutcome {
        let today = self.today();
        self.mark_presence_on(subject, status, today)
    }

    /// Mark `subject` for `date`, at most once per identity and date.
    pub fn mark_presence_on(
        &mut self,
        subject: Subject,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> MarkOutcome {
        let identity = match subject {
            Subject::Identity(identity) => identity,
            Subject::Vector(vector) => {
                let matched = self.matcher.match_vector(&vector);
                match matched.identity_id {
                    Some(id) => Identity::new(id, matched.name),
                    None => return MarkOutcome::Unknown,
                }
            }
        };
        self.mark_identity(identity, status, date)
    }

    fn mark_identity(
        &mut self,
        identity: Identity,
        status: AttendanceStatus,
        date: NaiveDate,
    ) -> MarkOutcome {
        if self.marked.contains(date, identity.id) {
            tracing::debug!(id = identity.id, %date, "Already marked, skipped");
            return MarkOutcome::AlreadyMarked { identity };
        }

        let report = self.apply_event(&identity, date, status);
        if !report.failed(StoreKind::Daily) {
            self.marked.insert(date, identity.id);
        }
        MarkOutcome::Marked { report }
    }

    /// Manual correction: write `status` for today without dedup.
    pub fn record_status(&self, identity: &Identity, status: AttendanceStatus) -> EventReport {
        self.apply_event(identity, self.today(), status)
    }

    /// Run the full register pipeline for one event.
    fn apply_event(
        &self,
        identity: &Identity,
        date: NaiveDate,
        status: AttendanceStatus,
    ) -> EventReport {
        let ledger = Ledger::new(&self.storage);
        let today = self.today();
        let mut failures = ledger.enroll(identity, date, today);
        let mut skipped = Vec::new();

        let daily = ledger.daily().set_status(identity, date, status);
        note_failure(&mut failures, StoreKind::Daily, daily);

        let master = ledger.master().upsert(identity, date, status);
        note_failure(&mut failures, StoreKind::Master, master);

        match ledger.calendar(today).set_status(identity, date, status) {
            Ok(true) => {}
            Ok(false) => {
                tracing::warn!(id = identity.id, %date, %today, "Event outside calendar year");
                skipped.push(StoreKind::Calendar);
            }
            Err(e) => note_failure::<()>(&mut failures, StoreKind::Calendar, Err(e)),
        }

        let summary = match ledger.yearly().recompute(identity.id) {
            Ok(summary) => summary,
            Err(e) => {
                note_failure::<()>(&mut failures, StoreKind::Yearly, Err(e));
                None
            }
        };

        if failures.is_empty() {
            tracing::info!(id = identity.id, %date, %status, "Attendance recorded");
        } else {
            tracing::error!(
                id = identity.id,
                %date,
                %status,
                failed = ?failures.iter().map(|f| f.store).collect::<Vec<_>>(),
                "Attendance partially recorded"
            );
        }

        EventReport {
            identity: identity.clone(),
            date,
            status,
            failures,
            skipped,
            summary,
        }
    }

    pub fn list_attendance(&self) -> StorageResult<Vec<MasterEntry>> {
        Ledger::new(&self.storage).master().list()
    }

    /// Create any missing register and heal the calendar.
    pub fn ensure_stores(&self) -> StorageResult<()> {
        Ledger::new(&self.storage).ensure_all(self.today())
    }

    /// Wipe every register and start empty. The gallery is kept.
    pub fn reset_ledger(&mut self) -> StorageResult<()> {
        Ledger::new(&self.storage).reset_all(self.today())?;
        self.marked = MarkedDates::default();
        Ok(())
    }

    // ========== Enrollment ==========

    /// Add `identity` to every register without marking attendance.
    pub fn enroll_identity(&self, identity: &Identity) -> Vec<StoreFailure> {
        let today = self.today();
        Ledger::new(&self.storage).enroll(identity, today, today)
    }

    /// Capture samples from `source` and enroll them.
    ///
    /// A lookalike of a *different* identity is returned unapplied together
    /// with the captured samples.
    pub fn enroll_from_source(
        &mut self,
        identity: &Identity,
        source: &mut dyn VectorSource,
        tag: Option<&str>,
    ) -> ServiceResult<EnrollmentOutcome> {
        let capture = capture_samples(source, self.config.samples_per_identity);
        if capture.samples.is_empty() {
            return Err(ServiceError::NoSamples {
                attempts: capture.attempts,
            });
        }

        if let Some(conflict) = self.check_twin_conflict(identity.id, &capture.samples) {
            tracing::warn!(
                id = identity.id,
                lookalike = conflict.identity_id,
                distance = conflict.distance,
                "Enrollment resembles another identity"
            );
            return Ok(EnrollmentOutcome::Conflict {
                conflict,
                samples: capture.samples,
            });
        }

        self.commit_enrollment(identity, capture.samples, tag, None)
            .map(EnrollmentOutcome::Enrolled)
    }

    /// Closest lookalike of another identity across `samples`.
    pub fn check_twin_conflict(&self, identity_id: i64, samples: &[Vec<f64>]) -> Option<TwinConflict> {
        samples
            .iter()
            .filter_map(|s| self.matcher.find_twin_conflict_for(identity_id, s))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    /// Store `vectors` for `identity` (replacing earlier ones), optionally
    /// record it as a twin of `twin_of`, and enroll it in the ledger.
    pub fn commit_enrollment(
        &mut self,
        identity: &Identity,
        vectors: Vec<Vec<f64>>,
        tag: Option<&str>,
        twin_of: Option<i64>,
    ) -> ServiceResult<EnrollmentReport> {
        let samples = vectors.len();
        let twin_of = twin_of.filter(|&other| other != identity.id);
        let mut next = self.matcher.clone();
        let replaced = next.enroll_vectors(identity.id, vectors, &identity.name, tag)?;
        if let Some(other) = twin_of {
            next.mark_twins(identity.id, other);
        }
        GalleryRepository::new(&self.storage).save(next.gallery())?;
        self.matcher = next;

        let failures = self.enroll_identity(identity);
        tracing::info!(id = identity.id, samples, replaced, twin_of, "Identity enrolled");

        Ok(EnrollmentReport {
            identity: identity.clone(),
            samples,
            replaced,
            twin_of,
            failures,
        })
    }

    /// Record `a` and `b` as confusable. Returns `false` if already recorded.
    pub fn mark_twins(&mut self, a: i64, b: i64) -> ServiceResult<bool> {
        let mut next = self.matcher.clone();
        if !next.mark_twins(a, b) {
            return Ok(false);
        }
        GalleryRepository::new(&self.storage).save(next.gallery())?;
        self.matcher = next;
        Ok(true)
    }

    pub fn twin_pairs(&self) -> &[TwinPair] {
        &self.matcher.gallery().twin_pairs
    }

    // ========== Recognition ==========

    /// Match each detection and mark today's attendance for known ones.
    pub fn recognize(&mut self, detections: Vec<Detection>) -> Vec<Recognition> {
        let today = self.today();
        detections
            .into_iter()
            .map(|detection| {
                let matched = self.matcher.match_vector(&detection.vector);
                let outcome = match matched.identity_id {
                    Some(id) => self.mark_identity(
                        Identity::new(id, matched.name.clone()),
                        AttendanceStatus::Present,
                        today,
                    ),
                    None => MarkOutcome::Unknown,
                };
                Recognition {
                    bounding_box: detection.bounding_box,
                    matched,
                    outcome,
                }
            })
            .collect()
    }

    // ========== Key Management ==========

    /// Replace the storage key.
    ///
    /// Existing registers stay encrypted under the old key and become
    /// unreadable; follow with [`reset_ledger`](Self::reset_ledger). The
    /// in-memory gallery survives and is rewritten under the new key on the
    /// next enrollment.
    pub fn reset_key(&mut self) -> StorageResult<()> {
        let key = self.keys.reset()?;
        self.storage.rekey(key);
        Ok(())
    }

    /// Remove scratch files this process still tracks.
    pub fn cleanup_scratch(&self) -> usize {
        self.storage.cleanup_scratch()
    }
}

/// Record the first failure per register.
fn note_failure<T>(failures: &mut Vec<StoreFailure>, store: StoreKind, result: StorageResult<T>) {
    if let Err(e) = result {
        tracing::warn!(%store, error = %e, "Register update failed");
        if !failures.iter().any(|f| f.store == store) {
            failures.push(StoreFailure::new(store, e));
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::{fixed_today, service};
    use super::*;
    use crate::storage::ledger::test_support::date;

    fn ann() -> Identity {
        Identity::new(1, "Ann")
    }

    fn frames(vector: Vec<f64>) -> impl Iterator<Item = Vec<Detection>> {
        std::iter::repeat_with(move || vec![Detection::new(vector.clone())])
    }

    fn report(outcome: MarkOutcome) -> EventReport {
        match outcome {
            MarkOutcome::Marked { report } => report,
            other => panic!("expected marked, got {other:?}"),
        }
    }

    #[test]
    fn new_bootstraps_key_and_registers() {
        let (temp, service) = service();
        assert!(temp.path().join("secret.key").exists());
        for path in service.storage().paths().ledger_files() {
            assert!(path.exists(), "{} missing", path.display());
        }
        assert!(service.matcher().gallery().is_empty());
    }

    #[test]
    fn marking_unenrolled_identity_creates_rows_everywhere() {
        let (_temp, mut service) = service();
        service.enroll_identity(&ann());
        let day = date("2024-03-01");

        let cy = Identity::new(3, "Cy");
        let report = report(service.mark_presence(Subject::Identity(cy), AttendanceStatus::Present));
        assert!(report.is_complete(), "{:?}", report.failures);

        let ledger = Ledger::new(service.storage());
        assert_eq!(ledger.daily().status(3, day).unwrap(), Some(AttendanceStatus::Present));
        assert_eq!(ledger.daily().status(1, day).unwrap(), Some(AttendanceStatus::Absent));
        assert_eq!(
            ledger.master().get(3, day).unwrap().map(|e| e.status),
            Some(AttendanceStatus::Present)
        );
        assert_eq!(ledger.calendar(day).status(3, day).unwrap(), Some(AttendanceStatus::Present));
        assert_eq!(ledger.calendar(day).status(1, day).unwrap(), Some(AttendanceStatus::Absent));

        let summary = report.summary.unwrap();
        assert_eq!(summary.total_present, 1);
        assert_eq!(summary.join_date, Some(day));
        assert_eq!(ledger.yearly().get(3).unwrap(), Some(summary));
    }

    #[test]
    fn repeat_marks_are_suppressed_until_rollover() {
        let (_temp, mut service) = service();
        let subject = || Subject::Identity(ann());

        assert!(matches!(
            service.mark_presence(subject(), AttendanceStatus::Present),
            MarkOutcome::Marked { .. }
        ));
        assert!(matches!(
            service.mark_presence(subject(), AttendanceStatus::Present),
            MarkOutcome::AlreadyMarked { .. }
        ));

        let next_day = date("2024-03-02");
        let outcome = service.mark_presence_on(subject(), AttendanceStatus::Present, next_day);
        assert_eq!(report(outcome).date, next_day);
    }

    #[test]
    fn alternating_dates_stay_deduplicated() {
        let (_temp, mut service) = service();
        let subject = || Subject::Identity(ann());
        let (first, second) = (date("2024-02-28"), date("2024-02-29"));

        report(service.mark_presence_on(subject(), AttendanceStatus::Present, first));
        report(service.mark_presence_on(subject(), AttendanceStatus::Present, second));
        assert!(matches!(
            service.mark_presence_on(subject(), AttendanceStatus::Present, first),
            MarkOutcome::AlreadyMarked { .. }
        ));
        assert!(matches!(
            service.mark_presence_on(subject(), AttendanceStatus::Present, second),
            MarkOutcome::AlreadyMarked { .. }
        ));
    }

    #[test]
    fn event_from_another_year_leaves_calendar_alone() {
        let (_temp, mut service) = service();
        service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present);

        let bob = Identity::new(2, "Bob");
        let new_year_eve = date("2023-12-31");
        let report = report(service.mark_presence_on(
            Subject::Identity(bob),
            AttendanceStatus::Present,
            new_year_eve,
        ));
        assert!(report.is_complete(), "{:?}", report.failures);
        assert_eq!(report.skipped, vec![StoreKind::Calendar]);

        let ledger = Ledger::new(service.storage());
        let calendar = ledger.calendar(fixed_today());
        assert_eq!(
            calendar.status(1, fixed_today()).unwrap(),
            Some(AttendanceStatus::Present)
        );
        let table = calendar.read().unwrap();
        assert_eq!(table.columns.len(), 366 + 2);
        assert!(table.contains_id(2));
        assert_eq!(
            ledger.daily().status(2, new_year_eve).unwrap(),
            Some(AttendanceStatus::Present)
        );
    }

    #[test]
    fn record_status_bypasses_dedup_and_last_write_wins() {
        let (_temp, mut service) = service();
        service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present);

        let report = service.record_status(&ann(), AttendanceStatus::normalize("late"));
        assert_eq!(report.status, AttendanceStatus::Absent);

        let ledger = Ledger::new(service.storage());
        let day = fixed_today();
        assert_eq!(ledger.daily().status(1, day).unwrap(), Some(AttendanceStatus::Absent));
        assert_eq!(
            ledger.master().get(1, day).unwrap().map(|e| e.status),
            Some(AttendanceStatus::Absent)
        );
        assert_eq!(ledger.master().list().unwrap().len(), 1);
    }

    #[test]
    fn broken_yearly_register_does_not_block_daily() {
        let (_temp, mut service) = service();
        std::fs::write(service.storage().paths().yearly(), b"garbage").unwrap();

        let report = report(service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present));
        assert!(report.failed(StoreKind::Yearly));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.summary, None);

        let daily = Ledger::new(service.storage()).daily();
        assert_eq!(daily.status(1, fixed_today()).unwrap(), Some(AttendanceStatus::Present));
    }

    #[test]
    fn broken_calendar_register_does_not_block_daily() {
        let (_temp, mut service) = service();
        std::fs::write(service.storage().paths().calendar(), b"garbage").unwrap();

        let report = report(service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present));
        assert!(report.failed(StoreKind::Calendar));
        assert_eq!(report.failures.len(), 1);
        assert!(report.summary.is_some());

        let daily = Ledger::new(service.storage()).daily();
        assert_eq!(daily.status(1, fixed_today()).unwrap(), Some(AttendanceStatus::Present));
    }

    #[test]
    fn broken_master_register_does_not_block_daily() {
        let (_temp, mut service) = service();
        std::fs::write(service.storage().paths().master(), b"garbage").unwrap();

        let report = report(service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present));
        assert!(report.failed(StoreKind::Master));
        assert_eq!(report.failures.len(), 1);

        let ledger = Ledger::new(service.storage());
        assert_eq!(ledger.daily().status(1, fixed_today()).unwrap(), Some(AttendanceStatus::Present));
        assert_eq!(
            ledger.calendar(fixed_today()).status(1, fixed_today()).unwrap(),
            Some(AttendanceStatus::Present)
        );
    }

    #[test]
    fn unknown_vector_writes_nothing() {
        let (_temp, mut service) = service();
        assert_eq!(
            service.mark_presence(Subject::Vector(vec![0.2, 0.2]), AttendanceStatus::Present),
            MarkOutcome::Unknown
        );
        assert!(Ledger::new(service.storage()).daily().dates().unwrap().is_empty());
    }

    #[test]
    fn recognize_marks_known_faces() {
        let (_temp, mut service) = service();
        service
            .commit_enrollment(&Identity::new(7, "Ann"), vec![vec![0.0, 0.0, 0.0]], None, None)
            .unwrap();

        let results = service.recognize(vec![
            Detection::new(vec![0.1, 0.0, 0.0]),
            Detection::new(vec![5.0, 5.0, 5.0]),
            Detection::new(vec![0.0, 0.1, 0.0]),
        ]);

        assert_eq!(results[0].matched.identity_id, Some(7));
        assert!((results[0].matched.confidence - 0.9).abs() < 1e-12);
        assert!(matches!(results[0].outcome, MarkOutcome::Marked { .. }));
        assert_eq!(results[1].outcome, MarkOutcome::Unknown);
        assert!(matches!(results[2].outcome, MarkOutcome::AlreadyMarked { .. }));
    }

    #[test]
    fn enroll_from_source_commits_samples() {
        let (_temp, mut service) = service();
        let outcome = service
            .enroll_from_source(&ann(), &mut frames(vec![1.0, 1.0]), Some("front"))
            .unwrap();

        let EnrollmentOutcome::Enrolled(report) = outcome else {
            panic!("expected enrollment");
        };
        assert_eq!(report.samples, 3);
        assert!(report.failures.is_empty());
        assert_eq!(service.matcher().gallery().samples_for(1), 3);
        assert!(Ledger::new(service.storage()).daily().read().unwrap().contains_id(1));

        // Re-enrolling the same person is not a conflict with themselves.
        let again = service
            .enroll_from_source(&ann(), &mut frames(vec![1.05, 1.0]), None)
            .unwrap();
        assert!(matches!(again, EnrollmentOutcome::Enrolled(r) if r.replaced == 3));
    }

    #[test]
    fn lookalike_enrollment_is_returned_unapplied() {
        let (_temp, mut service) = service();
        service
            .commit_enrollment(&ann(), vec![vec![0.0, 0.0]], Some("a"), None)
            .unwrap();

        let bea = Identity::new(2, "Bea");
        let outcome = service
            .enroll_from_source(&bea, &mut frames(vec![0.5, 0.0]), None)
            .unwrap();
        let EnrollmentOutcome::Conflict { conflict, samples } = outcome else {
            panic!("expected conflict");
        };
        assert_eq!(conflict.identity_id, 1);
        assert_eq!(conflict.tag.as_deref(), Some("a"));
        assert_eq!(service.matcher().gallery().samples_for(2), 0);

        let report = service
            .commit_enrollment(&bea, samples, Some("b"), Some(conflict.identity_id))
            .unwrap();
        assert_eq!(report.twin_of, Some(1));
        assert_eq!(service.twin_pairs(), &[TwinPair(1, 2)]);
    }

    #[test]
    fn own_id_as_twin_is_ignored() {
        let (_temp, mut service) = service();
        let report = service
            .commit_enrollment(&ann(), vec![vec![0.0, 0.0]], None, Some(1))
            .unwrap();
        assert_eq!(report.twin_of, None);
        assert!(service.twin_pairs().is_empty());
    }

    #[test]
    fn empty_capture_is_an_error() {
        let (_temp, mut service) = service();
        let mut nothing = std::iter::repeat_with(Vec::new);
        let err = service.enroll_from_source(&ann(), &mut nothing, None).unwrap_err();
        assert!(matches!(err, ServiceError::NoSamples { attempts: 15 }));
    }

    #[test]
    fn gallery_survives_restart() {
        let (temp, mut service) = service();
        service
            .commit_enrollment(&ann(), vec![vec![0.3, 0.3]], None, None)
            .unwrap();
        assert!(service.mark_twins(1, 2).unwrap());
        assert!(!service.mark_twins(2, 1).unwrap());
        drop(service);

        let config = super::test_support::config(&temp);
        let service = AttendanceService::with_clock(config, fixed_today).unwrap();
        assert_eq!(service.matcher().gallery().samples_for(1), 1);
        assert_eq!(service.twin_pairs(), &[TwinPair(1, 2)]);
    }

    #[test]
    fn key_reset_makes_registers_unreadable_until_ledger_reset() {
        let (_temp, mut service) = service();
        service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present);

        service.reset_key().unwrap();
        assert!(matches!(
            service.list_attendance(),
            Err(StorageError::Corrupt { .. })
        ));

        service.reset_ledger().unwrap();
        assert!(service.list_attendance().unwrap().is_empty());
        assert!(matches!(
            service.mark_presence(Subject::Identity(ann()), AttendanceStatus::Present),
            MarkOutcome::Marked { .. }
        ));
    }
}
