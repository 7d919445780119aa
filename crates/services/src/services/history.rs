use std::{
    collections::HashSet,
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use chrono::{DateTime, Datelike, Utc};
use db::{
    DbService, StoreError,
    models::history_record::{HistoryQuery, HistoryRecord, PageCursor, SortSpec},
};
use genai::artifact::ArtifactKind;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use ts_rs::TS;
use utils::{auth::AuthProvider, debounce::Debouncer};
use uuid::Uuid;

/// Lexically greatest code point used as the exclusive upper bound of a
/// title prefix scan.
pub const SEARCH_RANGE_SENTINEL: char = '\u{f8ff}';

pub const DEFAULT_PAGE_SIZE: i64 = 15;
pub const DEFAULT_SEARCH_DEBOUNCE: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("validation error: {0}")]
    Validation(String),
    #[error("sign in to browse your saved history")]
    AuthRequired,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Load state of the browser. An error is sticky: automatic loads stay
/// suppressed until the query inputs change.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum BrowserPhase {
    #[default]
    Idle,
    Loading,
    Error(String),
}

/// The user-chosen query inputs. The effective store query is derived from
/// these by `effective_query`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryInputs {
    pub search: String,
    pub kind: Option<ArtifactKind>,
    pub sort: SortSpec,
}

impl Default for QueryInputs {
    fn default() -> Self {
        Self {
            search: String::new(),
            kind: None,
            sort: SortSpec::NEWEST_FIRST,
        }
    }
}

/// Derive the store query for the current inputs. While a search is active
/// the sort is forced to title ascending: a prefix range scan orders by the
/// filtered field, which keeps matches lexicographically contiguous.
pub fn effective_query(
    inputs: &QueryInputs,
    owner_id: Uuid,
    limit: i64,
    start_after: Option<PageCursor>,
) -> HistoryQuery {
    let search = inputs.search.trim();
    let (title_range, sort) = if search.is_empty() {
        (None, inputs.sort)
    } else {
        let upper = format!("{search}{SEARCH_RANGE_SENTINEL}");
        (Some((search.to_string(), upper)), SortSpec::TITLE_ASC)
    };
    HistoryQuery {
        owner_id,
        kind: inputs.kind,
        title_range,
        sort,
        limit,
        start_after,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub enum RecencyBucket {
    Today,
    Yesterday,
    ThisWeek,
    ThisMonth,
    Older,
}

impl RecencyBucket {
    pub fn label(&self) -> &'static str {
        match self {
            RecencyBucket::Today => "Today",
            RecencyBucket::Yesterday => "Yesterday",
            RecencyBucket::ThisWeek => "This Week",
            RecencyBucket::ThisMonth => "This Month",
            RecencyBucket::Older => "Older",
        }
    }
}

const BUCKET_ORDER: [RecencyBucket; 5] = [
    RecencyBucket::Today,
    RecencyBucket::Yesterday,
    RecencyBucket::ThisWeek,
    RecencyBucket::ThisMonth,
    RecencyBucket::Older,
];

/// Place a timestamp in exactly one recency bucket. Buckets are checked in
/// priority order; weeks start on Monday.
pub fn bucket_for(created_at: DateTime<Utc>, now: DateTime<Utc>) -> RecencyBucket {
    let day = created_at.date_naive();
    let today = now.date_naive();

    if day == today {
        return RecencyBucket::Today;
    }
    if today.pred_opt() == Some(day) {
        return RecencyBucket::Yesterday;
    }
    if day.iso_week() == today.iso_week() {
        return RecencyBucket::ThisWeek;
    }
    if day.month() == today.month() && day.year() == today.year() {
        return RecencyBucket::ThisMonth;
    }
    RecencyBucket::Older
}

/// Bucket records by recency for display. Empty buckets are omitted.
pub fn group_by_recency(
    records: &[HistoryRecord],
    now: DateTime<Utc>,
) -> Vec<(RecencyBucket, Vec<HistoryRecord>)> {
    let mut groups: Vec<(RecencyBucket, Vec<HistoryRecord>)> =
        BUCKET_ORDER.iter().map(|bucket| (*bucket, Vec::new())).collect();
    for record in records {
        let bucket = bucket_for(record.created_at, now);
        if let Some((_, items)) = groups.iter_mut().find(|(candidate, _)| *candidate == bucket) {
            items.push(record.clone());
        }
    }
    groups.retain(|(_, items)| !items.is_empty());
    groups
}

/// Read-only projection of one record, with per-question answer reveal for
/// quiz practice.
#[derive(Debug, Clone)]
pub struct DetailDrawer {
    pub record: HistoryRecord,
    pub revealed: HashSet<usize>,
}

/// Hand-off of a stored record back into a generation session. The browser
/// itself performs no generation.
#[derive(Debug, Clone)]
pub struct RehydrateAction {
    pub record: HistoryRecord,
}

/// Point-in-time view of the browser for rendering.
#[derive(Debug, Clone, Default)]
pub struct BrowserSnapshot {
    pub records: Vec<HistoryRecord>,
    pub phase: BrowserPhase,
    pub has_more: bool,
    pub selection_mode: bool,
    pub selected: HashSet<Uuid>,
    pub drawer_record: Option<HistoryRecord>,
    pub inputs: QueryInputs,
    pub search_input: String,
}

struct BrowserState {
    records: Vec<HistoryRecord>,
    cursor: Option<PageCursor>,
    has_more: bool,
    phase: BrowserPhase,
    inputs: QueryInputs,
    search_input: String,
    selection_mode: bool,
    selected: HashSet<Uuid>,
    drawer: Option<DetailDrawer>,
}

impl Default for BrowserState {
    fn default() -> Self {
        Self {
            records: Vec::new(),
            cursor: None,
            has_more: true,
            phase: BrowserPhase::Idle,
            inputs: QueryInputs::default(),
            search_input: String::new(),
            selection_mode: false,
            selected: HashSet::new(),
            drawer: None,
        }
    }
}

/// Incrementally loaded, filtered, sorted view over an owner's history.
/// Every input change resets the cursor and reloads from the first page; a
/// stale in-flight page can never land in a newer configuration's state.
#[derive(Clone)]
pub struct HistoryBrowser {
    db: DbService,
    auth: Arc<dyn AuthProvider>,
    state: Arc<Mutex<BrowserState>>,
    epoch: Arc<AtomicU64>,
    debouncer: Debouncer,
    page_size: i64,
}

impl HistoryBrowser {
    pub fn new(db: DbService, auth: Arc<dyn AuthProvider>) -> Self {
        Self::with_options(db, auth, DEFAULT_PAGE_SIZE, DEFAULT_SEARCH_DEBOUNCE)
    }

    pub fn with_options(
        db: DbService,
        auth: Arc<dyn AuthProvider>,
        page_size: i64,
        search_debounce: Duration,
    ) -> Self {
        Self {
            db,
            auth,
            state: Arc::new(Mutex::new(BrowserState::default())),
            epoch: Arc::new(AtomicU64::new(0)),
            debouncer: Debouncer::new(search_debounce),
            page_size,
        }
    }

    pub fn snapshot(&self) -> BrowserSnapshot {
        self.with_state(|state| BrowserSnapshot {
            records: state.records.clone(),
            phase: state.phase.clone(),
            has_more: state.has_more,
            selection_mode: state.selection_mode,
            selected: state.selected.clone(),
            drawer_record: state.drawer.as_ref().map(|drawer| drawer.record.clone()),
            inputs: state.inputs.clone(),
            search_input: state.search_input.clone(),
        })
    }

    /// Discard everything loaded and fetch the first page for the current
    /// inputs. Bumping the epoch invalidates any in-flight fetch.
    pub async fn refresh(&self) -> Result<(), HistoryError> {
        let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let inputs = self.with_state(|state| {
            state.records.clear();
            state.cursor = None;
            state.has_more = true;
            state.phase = BrowserPhase::Loading;
            state.inputs.clone()
        });
        self.fetch_page(epoch, inputs, None).await
    }

    /// Fetch the page after the current cursor. A no-op while loading, after
    /// a sticky error, or once the collection is exhausted.
    pub async fn load_more(&self) -> Result<(), HistoryError> {
        let Some((inputs, cursor)) = self.with_state(|state| {
            if state.phase != BrowserPhase::Idle || !state.has_more {
                return None;
            }
            state.phase = BrowserPhase::Loading;
            Some((state.inputs.clone(), state.cursor.clone()))
        }) else {
            return Ok(());
        };
        let epoch = self.epoch.load(Ordering::SeqCst);
        self.fetch_page(epoch, inputs, cursor).await
    }

    pub async fn set_type_filter(&self, kind: Option<ArtifactKind>) -> Result<(), HistoryError> {
        let changed = self.with_state(|state| {
            if state.inputs.kind == kind {
                false
            } else {
                state.inputs.kind = kind;
                true
            }
        });
        if changed { self.refresh().await } else { Ok(()) }
    }

    pub async fn set_sort(&self, sort: SortSpec) -> Result<(), HistoryError> {
        let changed = self.with_state(|state| {
            if state.inputs.sort == sort {
                false
            } else {
                state.inputs.sort = sort;
                true
            }
        });
        if changed { self.refresh().await } else { Ok(()) }
    }

    /// Record a keystroke. The effective query only updates once the
    /// debounce window passes without further input.
    pub fn set_search_input(&self, text: &str) {
        let term = text.to_string();
        self.with_state(|state| state.search_input = term.clone());

        let browser = self.clone();
        self.debouncer.call(move || async move {
            if let Err(err) = browser.apply_search(&term).await {
                tracing::debug!(error = %err, "debounced history search failed");
            }
        });
    }

    /// Apply a search term immediately. This is the debounce target and the
    /// direct entry point for callers whose input already settled.
    pub async fn apply_search(&self, term: &str) -> Result<(), HistoryError> {
        let changed = self.with_state(|state| {
            if state.inputs.search == term {
                false
            } else {
                state.inputs.search = term.to_string();
                true
            }
        });
        if changed { self.refresh().await } else { Ok(()) }
    }

    pub fn set_selection_mode(&self, enabled: bool) {
        self.with_state(|state| {
            state.selection_mode = enabled;
            if !enabled {
                state.selected.clear();
            }
        });
    }

    pub fn toggle_selection(&self, id: Uuid) {
        self.with_state(|state| {
            if !state.selected.insert(id) {
                state.selected.remove(&id);
            }
        });
    }

    /// Delete every selected record in one atomic batch. Local state is
    /// pruned only after the store commit succeeds.
    pub async fn bulk_delete(&self) -> Result<u64, HistoryError> {
        let Some(owner_id) = self.auth.current_user() else {
            return Err(HistoryError::AuthRequired);
        };
        let ids: Vec<Uuid> = self.with_state(|state| state.selected.iter().copied().collect());
        if ids.is_empty() {
            return Err(HistoryError::Validation("no records selected".to_string()));
        }

        let deleted = HistoryRecord::delete_many(&self.db.pool, owner_id, &ids).await?;
        self.prune_local(&ids);
        self.with_state(|state| {
            state.selected.clear();
            state.selection_mode = false;
        });
        tracing::debug!(deleted, "bulk delete committed");
        Ok(deleted)
    }

    pub async fn delete_one(&self, id: Uuid) -> Result<(), HistoryError> {
        let Some(owner_id) = self.auth.current_user() else {
            return Err(HistoryError::AuthRequired);
        };
        HistoryRecord::delete(&self.db.pool, owner_id, id).await?;
        self.prune_local(&[id]);
        Ok(())
    }

    /// Delete every record for the current owner, ignoring the active
    /// filter. The full unfiltered set is fetched first.
    pub async fn clear_all(&self) -> Result<u64, HistoryError> {
        let Some(owner_id) = self.auth.current_user() else {
            return Err(HistoryError::AuthRequired);
        };
        let all = HistoryRecord::find_all_for_owner(&self.db.pool, owner_id).await?;
        let ids: Vec<Uuid> = all.iter().map(|record| record.id).collect();
        if ids.is_empty() {
            return Ok(0);
        }

        let deleted = HistoryRecord::delete_many(&self.db.pool, owner_id, &ids).await?;
        self.with_state(|state| {
            state.records.clear();
            state.cursor = None;
            state.has_more = false;
            state.selected.clear();
            state.drawer = None;
        });
        Ok(deleted)
    }

    pub fn open_detail(&self, record: HistoryRecord) {
        self.with_state(|state| {
            state.drawer = Some(DetailDrawer {
                record,
                revealed: HashSet::new(),
            });
        });
    }

    pub fn close_detail(&self) {
        self.with_state(|state| state.drawer = None);
    }

    /// Reveal the correct answer for one practice-mode question; reveals are
    /// independent per question.
    pub fn reveal_answer(&self, question_index: usize) {
        self.with_state(|state| {
            if let Some(drawer) = &mut state.drawer {
                drawer.revealed.insert(question_index);
            }
        });
    }

    pub fn revealed_answers(&self) -> HashSet<usize> {
        self.with_state(|state| {
            state
                .drawer
                .as_ref()
                .map(|drawer| drawer.revealed.clone())
                .unwrap_or_default()
        })
    }

    /// Package a loaded record for re-execution by a generation session.
    pub fn rerun(&self, id: Uuid) -> Option<RehydrateAction> {
        self.with_state(|state| {
            state
                .records
                .iter()
                .find(|record| record.id == id)
                .cloned()
                .map(|record| RehydrateAction { record })
        })
    }

    pub fn grouped(&self, now: DateTime<Utc>) -> Vec<(RecencyBucket, Vec<HistoryRecord>)> {
        let records = self.with_state(|state| state.records.clone());
        group_by_recency(&records, now)
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut BrowserState) -> R) -> R {
        let mut state = self.state.lock().expect("browser state lock poisoned");
        f(&mut state)
    }

    /// Apply a state change only if no newer fetch has started since.
    fn apply_if_current(&self, epoch: u64, f: impl FnOnce(&mut BrowserState)) -> bool {
        if self.epoch.load(Ordering::SeqCst) != epoch {
            tracing::debug!("discarding a stale history page");
            return false;
        }
        self.with_state(f);
        true
    }

    async fn fetch_page(
        &self,
        epoch: u64,
        inputs: QueryInputs,
        start_after: Option<PageCursor>,
    ) -> Result<(), HistoryError> {
        let Some(owner_id) = self.auth.current_user() else {
            let err = HistoryError::AuthRequired;
            self.apply_if_current(epoch, |state| {
                state.phase = BrowserPhase::Error(err.to_string());
            });
            return Err(err);
        };

        // One extra row decides has_more without a follow-up probe, so an
        // exactly page-sized collection terminates after its only page.
        let query = effective_query(&inputs, owner_id, self.page_size + 1, start_after);
        match HistoryRecord::find_page(&self.db.pool, &query).await {
            Ok(mut page) => {
                let has_more = page.len() as i64 > self.page_size;
                if has_more {
                    page.truncate(self.page_size as usize);
                }
                self.apply_if_current(epoch, |state| {
                    if let Some(last) = page.last() {
                        state.cursor = Some(PageCursor::from(last));
                    }
                    state.has_more = has_more;
                    state.records.extend(page);
                    state.phase = BrowserPhase::Idle;
                });
                Ok(())
            }
            Err(err) => {
                let err = HistoryError::from(err);
                self.apply_if_current(epoch, |state| {
                    state.phase = BrowserPhase::Error(err.to_string());
                });
                Err(err)
            }
        }
    }

    fn prune_local(&self, ids: &[Uuid]) {
        self.with_state(|state| {
            state.records.retain(|record| !ids.contains(&record.id));
            if state
                .drawer
                .as_ref()
                .is_some_and(|drawer| ids.contains(&drawer.record.id))
            {
                state.drawer = None;
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use db::models::history_record::CreateHistoryRecord;
    use serde_json::json;
    use utils::auth::LocalAuth;

    use super::*;

    async fn seed(
        db: &DbService,
        owner: Uuid,
        kind: ArtifactKind,
        title: &str,
    ) -> HistoryRecord {
        HistoryRecord::create(
            &db.pool,
            &CreateHistoryRecord {
                owner_id: owner,
                kind,
                title: title.to_string(),
                payload: json!({ "bodyText": title, "chatHistory": [] }),
                score: None,
                question_count: None,
            },
            Uuid::new_v4(),
        )
        .await
        .expect("seed record")
    }

    async fn browser_with(page_size: i64) -> (HistoryBrowser, DbService, Arc<LocalAuth>, Uuid) {
        let db = DbService::in_memory().await.expect("in-memory store");
        let owner = Uuid::new_v4();
        let auth = Arc::new(LocalAuth::signed_in(owner));
        let browser = HistoryBrowser::with_options(
            db.clone(),
            auth.clone(),
            page_size,
            Duration::from_millis(30),
        );
        (browser, db, auth, owner)
    }

    #[test]
    fn search_forces_title_ascending_with_prefix_range() {
        let inputs = QueryInputs {
            search: "Pho".to_string(),
            kind: None,
            sort: SortSpec::NEWEST_FIRST,
        };
        let query = effective_query(&inputs, Uuid::new_v4(), 15, None);
        assert_eq!(query.sort, SortSpec::TITLE_ASC);
        assert_eq!(
            query.title_range,
            Some(("Pho".to_string(), "Pho\u{f8ff}".to_string()))
        );
    }

    #[test]
    fn empty_search_keeps_the_chosen_sort() {
        let inputs = QueryInputs {
            search: "   ".to_string(),
            kind: Some(ArtifactKind::Quiz),
            sort: SortSpec::NEWEST_FIRST,
        };
        let query = effective_query(&inputs, Uuid::new_v4(), 15, None);
        assert_eq!(query.sort, SortSpec::NEWEST_FIRST);
        assert!(query.title_range.is_none());
    }

    #[test]
    fn buckets_are_exclusive_and_priority_ordered() {
        // Wednesday, June 18th 2025.
        let now = Utc.with_ymd_and_hms(2025, 6, 18, 12, 0, 0).unwrap();

        let cases = [
            (Utc.with_ymd_and_hms(2025, 6, 18, 3, 0, 0).unwrap(), RecencyBucket::Today),
            (Utc.with_ymd_and_hms(2025, 6, 17, 23, 0, 0).unwrap(), RecencyBucket::Yesterday),
            // Monday of the same ISO week.
            (Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap(), RecencyBucket::ThisWeek),
            // Sunday belongs to the previous Monday-started week.
            (Utc.with_ymd_and_hms(2025, 6, 15, 8, 0, 0).unwrap(), RecencyBucket::ThisMonth),
            (Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap(), RecencyBucket::ThisMonth),
            (Utc.with_ymd_and_hms(2025, 5, 20, 8, 0, 0).unwrap(), RecencyBucket::Older),
            (Utc.with_ymd_and_hms(2024, 6, 18, 8, 0, 0).unwrap(), RecencyBucket::Older),
        ];
        for (created_at, expected) in cases {
            assert_eq!(bucket_for(created_at, now), expected, "for {created_at}");
        }
    }

    #[tokio::test]
    async fn today_record_lands_only_in_the_today_group() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        seed(&db, owner, ArtifactKind::Quiz, "Fresh quiz").await;
        browser.refresh().await.expect("refresh");

        let groups = browser.grouped(Utc::now());
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].0, RecencyBucket::Today);
        assert_eq!(groups[0].1.len(), 1);
    }

    #[tokio::test]
    async fn exactly_one_page_reports_no_more_and_load_more_is_a_noop() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        for index in 0..15 {
            seed(&db, owner, ArtifactKind::Quiz, &format!("Quiz {index:02}")).await;
        }

        browser.refresh().await.expect("refresh");
        let snapshot = browser.snapshot();
        assert_eq!(snapshot.records.len(), 15);
        assert!(!snapshot.has_more);
        assert_eq!(snapshot.phase, BrowserPhase::Idle);

        browser.load_more().await.expect("noop load_more");
        let snapshot = browser.snapshot();
        assert_eq!(snapshot.records.len(), 15);
        assert!(!snapshot.has_more);
    }

    #[tokio::test]
    async fn pagination_walks_the_whole_collection_without_duplicates() {
        let (browser, db, _auth, owner) = browser_with(3).await;
        for index in 0..7 {
            seed(&db, owner, ArtifactKind::Flashcards, &format!("Deck {index}")).await;
        }

        browser.refresh().await.expect("refresh");
        assert_eq!(browser.snapshot().records.len(), 3);
        assert!(browser.snapshot().has_more);

        browser.load_more().await.expect("second page");
        browser.load_more().await.expect("third page");

        let snapshot = browser.snapshot();
        assert_eq!(snapshot.records.len(), 7);
        assert!(!snapshot.has_more);
        let unique: HashSet<Uuid> = snapshot.records.iter().map(|record| record.id).collect();
        assert_eq!(unique.len(), 7);

        browser.load_more().await.expect("exhausted load_more");
        assert_eq!(browser.snapshot().records.len(), 7);
    }

    #[tokio::test]
    async fn filter_change_resets_to_matching_records_only() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        seed(&db, owner, ArtifactKind::Quiz, "Quiz A").await;
        seed(&db, owner, ArtifactKind::Quiz, "Quiz B").await;
        seed(&db, owner, ArtifactKind::Explanation, "Explainer").await;

        browser.refresh().await.expect("refresh");
        assert_eq!(browser.snapshot().records.len(), 3);

        browser
            .set_type_filter(Some(ArtifactKind::Quiz))
            .await
            .expect("filter change");
        let snapshot = browser.snapshot();
        assert_eq!(snapshot.records.len(), 2);
        assert!(
            snapshot
                .records
                .iter()
                .all(|record| record.kind == ArtifactKind::Quiz)
        );
    }

    #[tokio::test]
    async fn applied_search_returns_prefix_matches_in_title_order() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        for title in ["Photosynthesis", "Biology", "Phonetics", "Chemistry"] {
            seed(&db, owner, ArtifactKind::Explanation, title).await;
        }

        browser.apply_search("Pho").await.expect("search");
        let snapshot = browser.snapshot();
        let titles: Vec<&str> = snapshot
            .records
            .iter()
            .map(|record| record.title.as_str())
            .collect();
        assert_eq!(titles, vec!["Phonetics", "Photosynthesis"]);
    }

    #[tokio::test]
    async fn search_input_is_debounced_to_the_last_keystroke() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        seed(&db, owner, ArtifactKind::Explanation, "Phonetics").await;
        seed(&db, owner, ArtifactKind::Explanation, "Biology").await;

        browser.set_search_input("P");
        tokio::time::sleep(Duration::from_millis(10)).await;
        browser.set_search_input("Pho");
        tokio::time::sleep(Duration::from_millis(120)).await;

        let snapshot = browser.snapshot();
        assert_eq!(snapshot.search_input, "Pho");
        assert_eq!(snapshot.inputs.search, "Pho");
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].title, "Phonetics");
    }

    #[tokio::test]
    async fn bulk_delete_removes_exactly_the_selected_set() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        let keep = seed(&db, owner, ArtifactKind::Quiz, "Keep").await;
        let drop_a = seed(&db, owner, ArtifactKind::Quiz, "Drop A").await;
        let drop_b = seed(&db, owner, ArtifactKind::Quiz, "Drop B").await;

        browser.refresh().await.expect("refresh");
        browser.set_selection_mode(true);
        browser.toggle_selection(drop_a.id);
        browser.toggle_selection(drop_b.id);

        let deleted = browser.bulk_delete().await.expect("bulk delete");
        assert_eq!(deleted, 2);

        let snapshot = browser.snapshot();
        assert_eq!(snapshot.records.len(), 1);
        assert_eq!(snapshot.records[0].id, keep.id);
        assert!(snapshot.selected.is_empty());
        assert!(!snapshot.selection_mode);

        let remaining = HistoryRecord::find_all_for_owner(&db.pool, owner)
            .await
            .expect("owner query");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, keep.id);
    }

    #[tokio::test]
    async fn bulk_delete_with_nothing_selected_is_rejected() {
        let (browser, _db, _auth, _owner) = browser_with(15).await;
        let err = browser.bulk_delete().await.expect_err("empty selection");
        assert!(matches!(err, HistoryError::Validation(_)));
    }

    #[tokio::test]
    async fn deleting_the_drawer_record_closes_the_drawer() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        let record = seed(&db, owner, ArtifactKind::MindMap, "Map").await;

        browser.refresh().await.expect("refresh");
        browser.open_detail(record.clone());
        browser.reveal_answer(0);
        assert!(browser.snapshot().drawer_record.is_some());

        browser.delete_one(record.id).await.expect("delete");
        let snapshot = browser.snapshot();
        assert!(snapshot.drawer_record.is_none());
        assert!(snapshot.records.is_empty());
    }

    #[tokio::test]
    async fn clear_all_ignores_the_active_filter() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        seed(&db, owner, ArtifactKind::Quiz, "Quiz").await;
        seed(&db, owner, ArtifactKind::Explanation, "Explainer").await;

        browser
            .set_type_filter(Some(ArtifactKind::Quiz))
            .await
            .expect("filter");
        let deleted = browser.clear_all().await.expect("clear all");
        assert_eq!(deleted, 2);

        let remaining = HistoryRecord::find_all_for_owner(&db.pool, owner)
            .await
            .expect("owner query");
        assert!(remaining.is_empty());
        assert!(browser.snapshot().records.is_empty());
    }

    #[tokio::test]
    async fn auth_failure_is_sticky_until_inputs_change() {
        let (browser, db, auth, owner) = browser_with(15).await;
        seed(&db, owner, ArtifactKind::Quiz, "Quiz").await;

        auth.sign_out();
        let err = browser.refresh().await.expect_err("signed-out refresh");
        assert!(matches!(err, HistoryError::AuthRequired));
        assert!(matches!(browser.snapshot().phase, BrowserPhase::Error(_)));

        // Scroll-driven loads stay suppressed while the error is sticky.
        browser.load_more().await.expect("suppressed load_more");
        assert!(matches!(browser.snapshot().phase, BrowserPhase::Error(_)));
        assert!(browser.snapshot().records.is_empty());

        auth.sign_in(owner);
        browser
            .set_type_filter(Some(ArtifactKind::Quiz))
            .await
            .expect("input change retries");
        let snapshot = browser.snapshot();
        assert_eq!(snapshot.phase, BrowserPhase::Idle);
        assert_eq!(snapshot.records.len(), 1);
    }

    #[tokio::test]
    async fn rerun_hands_back_the_loaded_record() {
        let (browser, db, _auth, owner) = browser_with(15).await;
        let record = seed(&db, owner, ArtifactKind::Explanation, "Explainer").await;

        browser.refresh().await.expect("refresh");
        let action = browser.rerun(record.id).expect("record is loaded");
        assert_eq!(action.record.id, record.id);
        assert_eq!(action.record.kind, ArtifactKind::Explanation);

        assert!(browser.rerun(Uuid::new_v4()).is_none());
    }
}
