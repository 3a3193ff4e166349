//! Date-partitioned conversation log.
//!
//! One active conversation lives in `conversation.json`; closed days live in
//! `history/YYYY-MM-DD.json`. Every mutation runs as a read-modify-write
//! cycle under `conversation.lock` and replaces files via temp + rename.

use crate::paths::WorkspaceLayout;
use crate::storage::{AtomicJsonFile, FileLock};
use chrono::{Duration as ChronoDuration, Local, NaiveDate, Utc};
use gchat_core::{
    Conversation, GchatError, HistorySummary, Message, Part, Result, Role, SessionRecord,
    StoreSettings,
};
use regex::Regex;
use std::fs;
use std::path::PathBuf;
use std::sync::LazyLock;

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("static date pattern"));

/// Parses a strict `YYYY-MM-DD` date.
pub fn parse_date(raw: &str) -> Result<NaiveDate> {
    if !DATE_PATTERN.is_match(raw) {
        return Err(GchatError::InvalidDate(raw.to_string()));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|_| GchatError::InvalidDate(raw.to_string()))
}

/// Owns the active conversation and the dated history set of one workspace.
pub struct ConversationStore {
    layout: WorkspaceLayout,
    settings: StoreSettings,
    fixed_today: Option<NaiveDate>,
}

impl ConversationStore {
    /// Opens (and if needed creates) a workspace rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory structure cannot be created.
    pub fn open(root: impl Into<PathBuf>, settings: StoreSettings) -> Result<Self> {
        let layout = WorkspaceLayout::new(root);
        fs::create_dir_all(layout.history_dir())?;
        Ok(Self {
            layout,
            settings,
            fixed_today: None,
        })
    }

    /// Pins the store's notion of "today" instead of reading the local clock.
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.fixed_today
            .unwrap_or_else(|| Local::now().date_naive())
    }

    pub fn layout(&self) -> &WorkspaceLayout {
        &self.layout
    }

    pub fn settings(&self) -> &StoreSettings {
        &self.settings
    }

    // ============================================================================
    // Reads
    // ============================================================================

    /// Returns the active conversation, or an empty one dated today.
    pub fn active(&self) -> Result<Conversation> {
        Ok(self
            .active_file()
            .load()?
            .unwrap_or_else(|| Conversation::empty(self.today())))
    }

    /// Returns the history entry for `date`.
    pub fn history_entry(&self, date: &str) -> Result<Conversation> {
        let date = parse_date(date)?;
        self.history_file(date)
            .load()?
            .ok_or_else(|| GchatError::not_found("history entry", date.to_string()))
    }

    /// Lists history entries, newest first, limited to `max_days` entries.
    ///
    /// `max_days == 0` means no limit. Unreadable entries are skipped.
    pub fn list(&self, max_days: usize, detailed: bool) -> Result<std::vec::IntoIter<HistorySummary>> {
        let mut dates = self.history_dates()?;
        dates.sort_by(|a, b| b.0.cmp(&a.0));
        if max_days > 0 {
            dates.truncate(max_days);
        }

        let mut summaries = Vec::with_capacity(dates.len());
        for (date, path) in dates {
            match AtomicJsonFile::<Conversation>::new(path).load() {
                Ok(Some(entry)) => {
                    let mut summary = entry.summary(detailed);
                    // The file name is authoritative for the date key.
                    summary.date = date;
                    summaries.push(summary);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(%date, error = %e, "skipping unreadable history entry"),
            }
        }

        Ok(summaries.into_iter())
    }

    // ============================================================================
    // Mutations
    // ============================================================================

    /// Appends one message to the active conversation.
    ///
    /// Oldest messages are evicted first so the stored length never exceeds
    /// the retention ceiling.
    pub fn append(&self, role: Role, content: &str, attachments: Vec<Part>) -> Result<Message> {
        let message = Message::new(role, content, attachments);
        let stored = self.commit(vec![message], None)?;
        stored
            .into_iter()
            .next()
            .ok_or_else(|| GchatError::io("append produced no message"))
    }

    /// Appends a user turn and the model's answer in one locked cycle and
    /// refreshes the session record.
    pub fn append_exchange(
        &self,
        user: Message,
        model: Message,
        session: Option<SessionRecord>,
    ) -> Result<()> {
        self.commit(vec![user, model], session).map(|_| ())
    }

    /// Archives the active conversation if it belongs to an earlier day.
    ///
    /// Returns `true` when a history entry was written.
    pub fn archive_if_stale(&self) -> Result<bool> {
        let _lock = self.lock()?;
        self.archive_locked(false)
    }

    /// Replaces the active conversation with a copy of the history entry for
    /// `date`, archiving whatever was active first.
    pub fn load(&self, date: &str) -> Result<Conversation> {
        let date = parse_date(date)?;
        let _lock = self.lock()?;

        let history = self.history_file(date);
        if !history.exists() {
            return Err(GchatError::not_found("history entry", date.to_string()));
        }

        self.archive_locked(true)?;

        let mut active = history
            .load()?
            .ok_or_else(|| GchatError::not_found("history entry", date.to_string()))?;
        active.date = self.today();
        active.loaded_from = Some(date);
        active.archived_at = None;
        let evicted = active.trim_to(self.settings.history_max);

        self.active_file().save(&active)?;
        tracing::info!(%date, messages = active.len(), evicted, "loaded history entry");
        Ok(active)
    }

    /// Deletes history entries strictly older than `today - retention_days`.
    ///
    /// The active conversation is never touched.
    pub fn cleanup(&self, retention_days: i64) -> Result<usize> {
        if retention_days < 0 {
            return Err(GchatError::config("retention days must not be negative"));
        }
        let Some(cutoff) = ChronoDuration::try_days(retention_days)
            .and_then(|window| self.today().checked_sub_signed(window))
        else {
            tracing::debug!(retention_days, "retention window reaches past the earliest date");
            return Ok(0);
        };
        let _lock = self.lock()?;

        let mut removed = 0;
        for (date, path) in self.history_dates()? {
            if date < cutoff {
                fs::remove_file(&path)?;
                tracing::debug!(%date, "removed expired history entry");
                removed += 1;
            }
        }

        tracing::info!(removed, %cutoff, "history cleanup finished");
        Ok(removed)
    }

    /// Resets the active conversation to empty, optionally archiving it
    /// first. Returns whether anything was archived.
    pub fn clear(&self, archive_first: bool) -> Result<bool> {
        let _lock = self.lock()?;
        let archived = if archive_first {
            self.archive_locked(true)?
        } else {
            false
        };
        self.active_file()
            .save(&Conversation::empty(self.today()))?;
        Ok(archived)
    }

    // ============================================================================
    // Internals (callers hold the lock)
    // ============================================================================

    fn commit(&self, messages: Vec<Message>, session: Option<SessionRecord>) -> Result<Vec<Message>> {
        let _lock = self.lock()?;
        let file = self.active_file();
        let mut active = file
            .load()?
            .unwrap_or_else(|| Conversation::empty(self.today()));

        let mut stored = Vec::with_capacity(messages.len());
        for mut message in messages {
            message.timestamp = Utc::now();
            stored.push(message.clone());
            active.push_bounded(message, self.settings.history_max);
        }
        if session.is_some() {
            active.session = session;
        }

        file.save(&active)?;
        tracing::debug!(messages = active.len(), "active conversation updated");
        Ok(stored)
    }

    /// Merges the active conversation into history.
    ///
    /// Without `force` only a conversation dated before today is archived.
    /// An empty stale conversation is reset without writing history.
    fn archive_locked(&self, force: bool) -> Result<bool> {
        let today = self.today();
        let file = self.active_file();
        let Some(active) = file.load()? else {
            return Ok(false);
        };

        let stale = active.date != today;
        if !stale && !force {
            return Ok(false);
        }

        if active.is_empty() {
            if stale {
                file.save(&Conversation::empty(today))?;
            }
            return Ok(false);
        }

        let target = active.loaded_from.unwrap_or(active.date);
        let history = self.history_file(target);
        let mut entry = history.load()?.unwrap_or_else(|| Conversation {
            created_at: active.created_at,
            ..Conversation::empty(target)
        });

        // Loaded turns, or turns merged by an archive that crashed before the
        // active reset, are already in the entry.
        let before = entry.len();
        let fresh: Vec<Message> = active
            .contents
            .into_iter()
            .filter(|m| !entry.contents.contains(m))
            .collect();
        entry.contents.extend(fresh);
        entry.archived_at = Some(Utc::now());
        if active.session.is_some() {
            entry.session = active.session;
        }

        history.save(&entry)?;
        file.save(&Conversation::empty(today))?;

        tracing::info!(
            date = %target,
            added = entry.len() - before,
            total = entry.len(),
            "archived active conversation"
        );
        Ok(true)
    }

    fn history_dates(&self) -> Result<Vec<(NaiveDate, PathBuf)>> {
        let dir = self.layout.history_dir();
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut dates = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if let Ok(date) = parse_date(stem) {
                dates.push((date, path));
            }
        }
        Ok(dates)
    }

    fn lock(&self) -> Result<FileLock> {
        Ok(FileLock::acquire(
            &self.layout.lock_file(),
            self.settings.lock_timeout,
        )?)
    }

    fn active_file(&self) -> AtomicJsonFile<Conversation> {
        AtomicJsonFile::new(self.layout.active_file())
    }

    fn history_file(&self, date: NaiveDate) -> AtomicJsonFile<Conversation> {
        AtomicJsonFile::new(self.layout.history_file(&date.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn days_ago(n: i64) -> NaiveDate {
        today() - ChronoDuration::days(n)
    }

    fn store_with(temp_dir: &TempDir, history_max: usize) -> ConversationStore {
        let settings = StoreSettings {
            history_max,
            lock_timeout: Duration::from_millis(200),
            ..StoreSettings::default()
        };
        ConversationStore::open(temp_dir.path(), settings)
            .unwrap()
            .with_today(today())
    }

    fn store(temp_dir: &TempDir) -> ConversationStore {
        store_with(temp_dir, 50)
    }

    fn write_active(store: &ConversationStore, date: NaiveDate, texts: &[&str]) -> Conversation {
        let mut conv = Conversation::empty(date);
        for text in texts {
            conv.contents.push(Message::user(*text));
        }
        AtomicJsonFile::new(store.layout().active_file())
            .save(&conv)
            .unwrap();
        conv
    }

    fn write_history(store: &ConversationStore, date: NaiveDate, count: usize) {
        let mut conv = Conversation::empty(date);
        for i in 0..count {
            conv.contents.push(Message::user(format!("{date} #{i}")));
        }
        AtomicJsonFile::new(store.layout().history_file(&date.to_string()))
            .save(&conv)
            .unwrap();
    }

    fn texts(conv: &Conversation) -> Vec<String> {
        conv.contents.iter().map(|m| m.content.clone()).collect()
    }

    #[test]
    fn test_parse_date_is_strict() {
        assert_eq!(parse_date("2024-06-15").unwrap(), today());
        assert!(matches!(parse_date("2024-6-15"), Err(GchatError::InvalidDate(_))));
        assert!(parse_date("2024-02-30").is_err());
        assert!(parse_date("yesterday").is_err());
    }

    #[test]
    fn test_active_defaults_to_empty_today() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let active = store.active().unwrap();
        assert!(active.is_empty());
        assert_eq!(active.date, today());
        assert!(!store.layout().active_file().exists());
    }

    #[test]
    fn test_append_persists_with_timestamp() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        let before = Utc::now();
        let msg = store.append(Role::User, "hello", Vec::new()).unwrap();
        assert!(msg.timestamp >= before);

        let active = store.active().unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active.contents[0].role, Role::User);
        assert_eq!(active.contents[0], msg);
    }

    #[test]
    fn test_retention_ceiling_keeps_latest_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, 4);

        for n in 1..=9 {
            store
                .append(Role::User, &format!("m{n}"), Vec::new())
                .unwrap();
            let len = store.active().unwrap().len();
            assert_eq!(len, n.min(4));
        }

        assert_eq!(texts(&store.active().unwrap()), vec!["m6", "m7", "m8", "m9"]);
    }

    #[test]
    fn test_append_exchange_records_session() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);

        store
            .append_exchange(
                Message::new(Role::User, "look", vec![Part::inline_data("image/png", "QUJD")]),
                Message::model("a cat"),
                Some(SessionRecord::new("gemini-2.0-flash", 0.4)),
            )
            .unwrap();

        let active = store.active().unwrap();
        assert_eq!(texts(&active), vec!["look", "a cat"]);
        assert_eq!(active.contents[0].attachment_count(), 1);
        assert!(active.contents[0].timestamp <= active.contents[1].timestamp);
        assert_eq!(active.session.unwrap().temperature, 0.4);
    }

    #[test]
    fn test_archive_if_stale_merges_into_recorded_date() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let yesterday = days_ago(1);

        write_history(&store, yesterday, 2);
        write_active(&store, yesterday, &["a", "b"]);

        assert!(store.archive_if_stale().unwrap());

        let entry = store.history_entry(&yesterday.to_string()).unwrap();
        assert_eq!(
            texts(&entry),
            vec![
                format!("{yesterday} #0"),
                format!("{yesterday} #1"),
                "a".to_string(),
                "b".to_string()
            ]
        );
        assert!(entry.archived_at.is_some());

        let active = store.active().unwrap();
        assert!(active.is_empty());
        assert_eq!(active.date, today());
    }

    #[test]
    fn test_rearchive_after_interrupted_reset_adds_no_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let yesterday = days_ago(1);

        // History already holds the merged turn but the active file was never reset.
        let active = write_active(&store, yesterday, &["q"]);
        AtomicJsonFile::new(store.layout().history_file(&yesterday.to_string()))
            .save(&active)
            .unwrap();

        assert!(store.archive_if_stale().unwrap());

        let entry = store.history_entry(&yesterday.to_string()).unwrap();
        assert_eq!(texts(&entry), vec!["q".to_string()]);
        assert!(store.active().unwrap().is_empty());
    }

    #[test]
    fn test_archive_is_idempotent_within_a_day() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let yesterday = days_ago(1);
        write_active(&store, yesterday, &["only once"]);

        assert!(store.archive_if_stale().unwrap());
        let first = fs::read(store.layout().history_file(&yesterday.to_string())).unwrap();

        assert!(!store.archive_if_stale().unwrap());
        let second = fs::read(store.layout().history_file(&yesterday.to_string())).unwrap();
        assert_eq!(first, second);
        assert_eq!(store.history_entry(&yesterday.to_string()).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_empty_conversation_resets_without_history() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let yesterday = days_ago(1);
        write_active(&store, yesterday, &[]);

        assert!(!store.archive_if_stale().unwrap());
        assert!(!store.layout().history_file(&yesterday.to_string()).exists());
        assert_eq!(store.active().unwrap().date, today());
    }

    #[test]
    fn test_fresh_conversation_is_not_archived() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_active(&store, today(), &["still today"]);

        assert!(!store.archive_if_stale().unwrap());
        assert_eq!(store.active().unwrap().len(), 1);
    }

    #[test]
    fn test_archive_then_load_round_trip() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let day = days_ago(3);
        let archived = write_active(&store, day, &["q1", "a1", "q2"]);

        assert!(store.archive_if_stale().unwrap());
        let loaded = store.load(&day.to_string()).unwrap();

        assert_eq!(loaded.contents, archived.contents);
        assert_eq!(loaded.loaded_from, Some(day));
        assert_eq!(store.active().unwrap().contents, archived.contents);
    }

    #[test]
    fn test_load_archives_current_active_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let day = days_ago(2);
        write_history(&store, day, 1);
        write_active(&store, today(), &["unsaved today"]);

        store.load(&day.to_string()).unwrap();

        let today_entry = store.history_entry(&today().to_string()).unwrap();
        assert_eq!(texts(&today_entry), vec!["unsaved today"]);
        assert_eq!(texts(&store.active().unwrap()), vec![format!("{day} #0")]);
    }

    #[test]
    fn test_loaded_conversation_writes_back_without_duplicates() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        let day = days_ago(5);
        write_history(&store, day, 2);

        store.load(&day.to_string()).unwrap();
        store.append(Role::User, "follow-up", Vec::new()).unwrap();
        assert!(store.clear(true).unwrap());

        let entry = store.history_entry(&day.to_string()).unwrap();
        assert_eq!(
            texts(&entry),
            vec![format!("{day} #0"), format!("{day} #1"), "follow-up".to_string()]
        );
        assert!(!store.layout().history_file(&today().to_string()).exists());
    }

    #[test]
    fn test_load_trims_long_entry_to_ceiling() {
        let temp_dir = TempDir::new().unwrap();
        let store = store_with(&temp_dir, 3);
        let day = days_ago(1);
        write_history(&store, day, 5);

        let loaded = store.load(&day.to_string()).unwrap();
        assert_eq!(
            texts(&loaded),
            vec![format!("{day} #2"), format!("{day} #3"), format!("{day} #4")]
        );
        // The history entry itself keeps everything.
        assert_eq!(store.history_entry(&day.to_string()).unwrap().len(), 5);
    }

    #[test]
    fn test_load_missing_or_invalid_date() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_active(&store, today(), &["keep me"]);

        assert!(store.load("2020-01-01").unwrap_err().is_not_found());
        assert!(matches!(store.load("01/01/2020"), Err(GchatError::InvalidDate(_))));
        // A failed load leaves the active conversation alone.
        assert_eq!(texts(&store.active().unwrap()), vec!["keep me"]);
    }

    #[test]
    fn test_list_newest_first_with_limit() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        for (ago, count) in [(10, 1), (1, 3), (4, 2)] {
            write_history(&store, days_ago(ago), count);
        }
        fs::write(store.layout().history_dir().join("notes.txt"), "ignored").unwrap();
        fs::write(store.layout().history_dir().join("bogus.json"), "{}").unwrap();

        let all: Vec<_> = store.list(0, false).unwrap().collect();
        assert_eq!(
            all.iter().map(|s| s.date).collect::<Vec<_>>(),
            vec![days_ago(1), days_ago(4), days_ago(10)]
        );
        assert_eq!(all[0].message_count, 3);
        assert!(all[0].created_at.is_none());

        let limited: Vec<_> = store.list(2, true).unwrap().collect();
        assert_eq!(limited.len(), 2);
        assert!(limited[0].created_at.is_some());
    }

    #[test]
    fn test_cleanup_boundary() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_history(&store, days_ago(29), 1);
        write_history(&store, days_ago(31), 1);
        write_active(&store, days_ago(90), &["active is never cleaned"]);

        assert_eq!(store.cleanup(30).unwrap(), 1);

        assert!(store.layout().history_file(&days_ago(29).to_string()).exists());
        assert!(!store.layout().history_file(&days_ago(31).to_string()).exists());
        assert_eq!(store.active().unwrap().len(), 1);
    }

    #[test]
    fn test_cleanup_keeps_exact_cutoff_day() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_history(&store, days_ago(30), 1);

        assert_eq!(store.cleanup(30).unwrap(), 0);
        assert!(store.cleanup(-1).unwrap_err().is_config());
    }

    #[test]
    fn test_cleanup_with_huge_window_removes_nothing() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_history(&store, days_ago(365), 1);

        assert_eq!(store.cleanup(1_000_000_000).unwrap(), 0);
        assert_eq!(store.cleanup(i64::MAX).unwrap(), 0);
        assert!(store.layout().history_file(&days_ago(365).to_string()).exists());
    }

    #[test]
    fn test_clear_without_archive_discards() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        write_active(&store, today(), &["gone"]);

        assert!(!store.clear(false).unwrap());
        assert!(store.active().unwrap().is_empty());
        assert_eq!(store.list(0, false).unwrap().count(), 0);
    }

    #[test]
    fn test_writer_times_out_while_lock_is_held() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.append(Role::User, "committed", Vec::new()).unwrap();
        let committed = fs::read(store.layout().active_file()).unwrap();

        let _held = FileLock::acquire(&store.layout().lock_file(), Duration::from_secs(1)).unwrap();
        let err = store.append(Role::User, "blocked", Vec::new()).unwrap_err();

        assert!(err.is_lock_timeout());
        assert_eq!(fs::read(store.layout().active_file()).unwrap(), committed);
    }

    #[test]
    fn test_interrupted_write_keeps_committed_file() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir);
        store.append(Role::User, "committed", Vec::new()).unwrap();
        let committed = fs::read(store.layout().active_file()).unwrap();

        let file = AtomicJsonFile::<Conversation>::new(store.layout().active_file());
        let staged = file.stage(&Conversation::empty(today())).unwrap();
        drop(staged);

        assert_eq!(fs::read(store.layout().active_file()).unwrap(), committed);
        assert_eq!(texts(&store.active().unwrap()), vec!["committed"]);
    }
}
