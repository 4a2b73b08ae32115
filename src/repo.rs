use chrono::NaiveDate;

use crate::models::*;

#[derive(thiserror::Error, Debug)]
pub enum RepoError {
    #[error("not found")] NotFound,
    #[error("conflict: {0}")] Conflict(String),
    #[error("storage failure: {0}")] Internal(String),
}

pub type RepoResult<T> = Result<T, RepoError>;

/// Result of a subscribe call; decides the HTTP status in the route layer.
#[derive(Debug, Clone)]
pub enum SubscribeOutcome {
    Created(EmailSubscription),
    Resent(EmailSubscription),
    AlreadyVerified,
}

use async_trait::async_trait;

#[async_trait]
pub trait PainEntryRepo: Send + Sync {
    async fn create_pain_entry(&self, new: NewPainEntry) -> RepoResult<PainEntry>;
    /// Newest first.
    async fn list_pain_entries(&self) -> RepoResult<Vec<PainEntry>>;
    async fn get_pain_entry(&self, id: Id) -> RepoResult<PainEntry>;
}

#[async_trait]
pub trait ActivityLogRepo: Send + Sync {
    async fn list_activity_logs(&self) -> RepoResult<Vec<ActivityLog>>;
    async fn get_activity_log_by_date(&self, date: NaiveDate) -> RepoResult<ActivityLog>;
    /// Fails with `Conflict` when a log already exists for the date.
    async fn create_activity_log(&self, new: NewActivityLog) -> RepoResult<ActivityLog>;
    async fn update_activity_log(&self, id: Id, upd: NewActivityLog) -> RepoResult<ActivityLog>;
    async fn delete_activity_log(&self, id: Id) -> RepoResult<()>;
    /// Returns the stored log and whether it was newly created.
    async fn upsert_activity_log(&self, new: NewActivityLog) -> RepoResult<(ActivityLog, bool)>;
}

#[async_trait]
pub trait InjuryRepo: Send + Sync {
    async fn list_injuries(&self, user_id: Option<&str>) -> RepoResult<Vec<Injury>>;
    async fn create_injury(&self, new: NewInjury) -> RepoResult<Injury>;
    async fn get_injury(&self, id: Id) -> RepoResult<Injury>;
    async fn update_injury(&self, id: Id, upd: NewInjury) -> RepoResult<Injury>;
    async fn delete_injury(&self, id: Id) -> RepoResult<()>;
}

#[async_trait]
pub trait SubscriptionRepo: Send + Sync {
    async fn subscribe(&self, email: &str, token: &str) -> RepoResult<SubscribeOutcome>;
    /// Marks the unverified subscription holding `token` as verified.
    async fn verify_subscription(&self, token: &str) -> RepoResult<EmailSubscription>;
}

#[async_trait]
pub trait AnalyticsRepo: Send + Sync {
    async fn record_event(&self, new: NewAnalyticsEvent) -> RepoResult<AnalyticsEvent>;
    async fn list_events(&self) -> RepoResult<Vec<AnalyticsEvent>>;
}

pub trait Repo: PainEntryRepo + ActivityLogRepo + InjuryRepo + SubscriptionRepo + AnalyticsRepo {}

impl<T> Repo for T where T: PainEntryRepo + ActivityLogRepo + InjuryRepo + SubscriptionRepo + AnalyticsRepo {}

#[cfg(feature = "inmem-store")]
pub mod inmem {
    use super::*;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};
    use std::collections::HashMap;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
    use tracing::{info, warn};

    const SNAPSHOT_FILE: &str = "state.json";

    #[derive(Default, Serialize, Deserialize)]
    struct Counters {
        pain_entries: Id,
        activity_logs: Id,
        injuries: Id,
        subscriptions: Id,
        events: Id,
    }

    #[derive(Default, Serialize, Deserialize)]
    struct State {
        pain_entries: HashMap<Id, PainEntry>,
        activity_logs: HashMap<Id, ActivityLog>,
        injuries: HashMap<Id, Injury>,
        subscriptions: HashMap<Id, EmailSubscription>,
        events: HashMap<Id, AnalyticsEvent>,
        next: Counters,
    }

    /// Map-backed store. Optionally mirrored to a JSON snapshot after every write.
    #[derive(Clone, Default)]
    pub struct InMemRepo {
        state: Arc<RwLock<State>>,
        snapshot_path: Option<Arc<PathBuf>>,
    }

    impl InMemRepo {
        pub fn new() -> Self {
            Self::default()
        }

        /// Loads `<dir>/state.json` if present and persists there on every mutation.
        pub fn with_snapshot_dir(dir: impl AsRef<Path>) -> Self {
            let path = dir.as_ref().join(SNAPSHOT_FILE);
            let state = Self::load_state_from(&path);
            Self { state: Arc::new(RwLock::new(state)), snapshot_path: Some(Arc::new(path)) }
        }

        fn load_state_from(path: &Path) -> State {
            match std::fs::read(path) {
                Ok(bytes) => match serde_json::from_slice::<State>(&bytes) {
                    Ok(s) => {
                        info!(path = %path.display(), "loaded snapshot");
                        s
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to parse snapshot, starting empty");
                        State::default()
                    }
                },
                Err(e) => {
                    info!(path = %path.display(), error = %e, "no snapshot, starting empty");
                    State::default()
                }
            }
        }

        /// Mirrors `state` to disk. Callers hold the write guard, so snapshots are
        /// written one at a time and always reflect a complete state.
        fn persist(&self, state: &State) {
            let Some(path) = self.snapshot_path.as_ref() else { return };
            let bytes = match serde_json::to_vec_pretty(state) {
                Ok(b) => b,
                Err(e) => {
                    warn!(error = %e, "failed to serialize snapshot");
                    return;
                }
            };
            if let Some(dir) = path.parent() {
                let _ = std::fs::create_dir_all(dir);
            }
            // write aside, then swap in whole
            let tmp = path.with_extension("json.tmp");
            if let Err(e) = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path.as_path())) {
                warn!(path = %path.display(), error = %e, "failed to write snapshot");
            }
        }

        fn read(&self) -> RepoResult<RwLockReadGuard<'_, State>> {
            self.state.read().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn write(&self) -> RepoResult<RwLockWriteGuard<'_, State>> {
            self.state.write().map_err(|_| RepoError::Internal("state lock poisoned".into()))
        }

        fn next_id(counter: &mut Id) -> Id {
            *counter += 1;
            *counter
        }
    }

    #[async_trait]
    impl PainEntryRepo for InMemRepo {
        async fn create_pain_entry(&self, new: NewPainEntry) -> RepoResult<PainEntry> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s.next.pain_entries);
            let entry = PainEntry {
                id,
                image_url: new.image_url,
                date: Utc::now(),
                pain_markers: new.pain_markers,
                notes: new.notes,
            };
            s.pain_entries.insert(id, entry.clone());
            self.persist(&s);
            Ok(entry)
        }

        async fn list_pain_entries(&self) -> RepoResult<Vec<PainEntry>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.pain_entries.values().cloned().collect();
            v.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn get_pain_entry(&self, id: Id) -> RepoResult<PainEntry> {
            let s = self.read()?;
            s.pain_entries.get(&id).cloned().ok_or(RepoError::NotFound)
        }
    }

    fn date_taken(s: &State, date: NaiveDate, except: Option<Id>) -> bool {
        s.activity_logs.values().any(|l| l.date == date && Some(l.id) != except)
    }

    #[async_trait]
    impl ActivityLogRepo for InMemRepo {
        async fn list_activity_logs(&self) -> RepoResult<Vec<ActivityLog>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.activity_logs.values().cloned().collect();
            v.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn get_activity_log_by_date(&self, date: NaiveDate) -> RepoResult<ActivityLog> {
            let s = self.read()?;
            s.activity_logs.values().find(|l| l.date == date).cloned().ok_or(RepoError::NotFound)
        }

        async fn create_activity_log(&self, new: NewActivityLog) -> RepoResult<ActivityLog> {
            let mut s = self.write()?;
            if date_taken(&s, new.date, None) {
                return Err(RepoError::Conflict(format!("activity log for {} already exists", new.date)));
            }
            let id = Self::next_id(&mut s.next.activity_logs);
            let log = ActivityLog {
                id,
                date: new.date,
                steps: new.steps,
                activity: new.activity,
                symptoms: new.symptoms,
                pain_level: new.pain_level,
                created_at: Utc::now(),
            };
            s.activity_logs.insert(id, log.clone());
            self.persist(&s);
            Ok(log)
        }

        async fn update_activity_log(&self, id: Id, upd: NewActivityLog) -> RepoResult<ActivityLog> {
            let mut s = self.write()?;

            // uniqueness check before the mutable borrow
            if date_taken(&s, upd.date, Some(id)) {
                return Err(RepoError::Conflict(format!("activity log for {} already exists", upd.date)));
            }
            let log = s.activity_logs.get_mut(&id).ok_or(RepoError::NotFound)?;
            log.date = upd.date;
            log.steps = upd.steps;
            log.activity = upd.activity;
            log.symptoms = upd.symptoms;
            log.pain_level = upd.pain_level;

            let updated = log.clone();
            self.persist(&s);
            Ok(updated)
        }

        async fn delete_activity_log(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.activity_logs.remove(&id).ok_or(RepoError::NotFound)?;
            self.persist(&s);
            Ok(())
        }

        async fn upsert_activity_log(&self, new: NewActivityLog) -> RepoResult<(ActivityLog, bool)> {
            let mut s = self.write()?;
            let existing = s.activity_logs.values().find(|l| l.date == new.date).map(|l| l.id);
            let result = match existing {
                Some(id) => {
                    let log = s.activity_logs.get_mut(&id).ok_or(RepoError::NotFound)?;
                    log.steps = new.steps;
                    log.activity = new.activity;
                    log.symptoms = new.symptoms;
                    log.pain_level = new.pain_level;
                    (log.clone(), false)
                }
                None => {
                    let id = Self::next_id(&mut s.next.activity_logs);
                    let log = ActivityLog {
                        id,
                        date: new.date,
                        steps: new.steps,
                        activity: new.activity,
                        symptoms: new.symptoms,
                        pain_level: new.pain_level,
                        created_at: Utc::now(),
                    };
                    s.activity_logs.insert(id, log.clone());
                    (log, true)
                }
            };
            self.persist(&s);
            Ok(result)
        }
    }

    #[async_trait]
    impl InjuryRepo for InMemRepo {
        async fn list_injuries(&self, user_id: Option<&str>) -> RepoResult<Vec<Injury>> {
            let s = self.read()?;
            let mut v: Vec<_> = s
                .injuries
                .values()
                .filter(|i| user_id.map_or(true, |u| i.user_id.as_deref() == Some(u)))
                .cloned()
                .collect();
            v.sort_by(|a, b| b.date_of_injury.cmp(&a.date_of_injury).then(b.id.cmp(&a.id)));
            Ok(v)
        }

        async fn create_injury(&self, new: NewInjury) -> RepoResult<Injury> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s.next.injuries);
            let now = Utc::now();
            let injury = Injury {
                id,
                user_id: new.user_id,
                name: new.name,
                description: new.description,
                date_of_injury: new.date_of_injury,
                status: new.status,
                created_at: now,
                updated_at: now,
            };
            s.injuries.insert(id, injury.clone());
            self.persist(&s);
            Ok(injury)
        }

        async fn get_injury(&self, id: Id) -> RepoResult<Injury> {
            let s = self.read()?;
            s.injuries.get(&id).cloned().ok_or(RepoError::NotFound)
        }

        async fn update_injury(&self, id: Id, upd: NewInjury) -> RepoResult<Injury> {
            let mut s = self.write()?;
            let injury = s.injuries.get_mut(&id).ok_or(RepoError::NotFound)?;
            injury.user_id = upd.user_id;
            injury.name = upd.name;
            injury.description = upd.description;
            injury.date_of_injury = upd.date_of_injury;
            injury.status = upd.status;
            injury.updated_at = Utc::now();
            let updated = injury.clone();
            self.persist(&s);
            Ok(updated)
        }

        async fn delete_injury(&self, id: Id) -> RepoResult<()> {
            let mut s = self.write()?;
            s.injuries.remove(&id).ok_or(RepoError::NotFound)?;
            self.persist(&s);
            Ok(())
        }
    }

    #[async_trait]
    impl SubscriptionRepo for InMemRepo {
        async fn subscribe(&self, email: &str, token: &str) -> RepoResult<SubscribeOutcome> {
            let mut s = self.write()?;
            let existing = s.subscriptions.values().find(|sub| sub.email == email).map(|sub| (sub.id, sub.verified));
            let outcome = match existing {
                Some((_, true)) => return Ok(SubscribeOutcome::AlreadyVerified),
                Some((id, false)) => {
                    let sub = s.subscriptions.get_mut(&id).ok_or(RepoError::NotFound)?;
                    sub.verification_token = Some(token.to_string());
                    SubscribeOutcome::Resent(sub.clone())
                }
                None => {
                    let id = Self::next_id(&mut s.next.subscriptions);
                    let sub = EmailSubscription {
                        id,
                        email: email.to_string(),
                        verification_token: Some(token.to_string()),
                        verified: false,
                        created_at: Utc::now(),
                    };
                    s.subscriptions.insert(id, sub.clone());
                    SubscribeOutcome::Created(sub)
                }
            };
            self.persist(&s);
            Ok(outcome)
        }

        async fn verify_subscription(&self, token: &str) -> RepoResult<EmailSubscription> {
            let mut s = self.write()?;
            let sub = s
                .subscriptions
                .values_mut()
                .find(|sub| !sub.verified && sub.verification_token.as_deref() == Some(token))
                .ok_or(RepoError::NotFound)?;
            sub.verified = true;
            sub.verification_token = None;
            let verified = sub.clone();
            self.persist(&s);
            Ok(verified)
        }
    }

    #[async_trait]
    impl AnalyticsRepo for InMemRepo {
        async fn record_event(&self, new: NewAnalyticsEvent) -> RepoResult<AnalyticsEvent> {
            let mut s = self.write()?;
            let id = Self::next_id(&mut s.next.events);
            let event = AnalyticsEvent {
                id,
                event: new.event,
                metadata: new.metadata,
                user_agent: new.user_agent,
                session_id: new.session_id,
                created_at: Utc::now(),
            };
            s.events.insert(id, event.clone());
            self.persist(&s);
            Ok(event)
        }

        async fn list_events(&self) -> RepoResult<Vec<AnalyticsEvent>> {
            let s = self.read()?;
            let mut v: Vec<_> = s.events.values().cloned().collect();
            v.sort_by_key(|e| e.id);
            Ok(v)
        }
    }
}

// Postgres implementation (feature = "postgres-store")
#[cfg(feature = "postgres-store")]
pub mod pg {
    use super::*;
    use chrono::{DateTime, Utc};
    use sqlx::types::Json;
    use sqlx::{Pool, Postgres};

    #[derive(Clone)]
    pub struct PgRepo { pool: Pool<Postgres> }

    impl PgRepo {
        pub fn new(pool: Pool<Postgres>) -> Self { Self { pool } }

        pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
            sqlx::migrate!("./migrations").run(&self.pool).await
        }
    }

    fn db_err(e: sqlx::Error) -> RepoError {
        match e {
            sqlx::Error::RowNotFound => RepoError::NotFound,
            sqlx::Error::Database(ref d) if d.code().as_deref() == Some("23505") => {
                RepoError::Conflict(d.message().to_string())
            }
            other => RepoError::Internal(other.to_string()),
        }
    }

    #[derive(sqlx::FromRow)]
    struct PainEntryRow {
        id: Id,
        image_url: String,
        date: DateTime<Utc>,
        pain_markers: Json<Vec<PainMarker>>,
        notes: Option<String>,
    }

    impl From<PainEntryRow> for PainEntry {
        fn from(r: PainEntryRow) -> Self {
            PainEntry { id: r.id, image_url: r.image_url, date: r.date, pain_markers: r.pain_markers.0, notes: r.notes }
        }
    }

    #[derive(sqlx::FromRow)]
    struct ActivityLogRow {
        id: Id,
        date: NaiveDate,
        steps: i64,
        activity: String,
        symptoms: String,
        pain_level: f64,
        created_at: DateTime<Utc>,
    }

    impl From<ActivityLogRow> for ActivityLog {
        fn from(r: ActivityLogRow) -> Self {
            ActivityLog {
                id: r.id,
                date: r.date,
                steps: r.steps,
                activity: r.activity,
                symptoms: r.symptoms,
                pain_level: r.pain_level,
                created_at: r.created_at,
            }
        }
    }

    #[derive(sqlx::FromRow)]
    struct InjuryRow {
        id: Id,
        user_id: Option<String>,
        name: String,
        description: Option<String>,
        date_of_injury: NaiveDate,
        status: String,
        created_at: DateTime<Utc>,
        updated_at: DateTime<Utc>,
    }

    impl TryFrom<InjuryRow> for Injury {
        type Error = RepoError;
        fn try_from(r: InjuryRow) -> Result<Self, Self::Error> {
            let status = InjuryStatus::parse(&r.status)
                .ok_or_else(|| RepoError::Internal(format!("unknown injury status '{}'", r.status)))?;
            Ok(Injury {
                id: r.id,
                user_id: r.user_id,
                name: r.name,
                description: r.description,
                date_of_injury: r.date_of_injury,
                status,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
        }
    }

    #[derive(sqlx::FromRow)]
    struct SubscriptionRow {
        id: Id,
        email: String,
        verification_token: Option<String>,
        verified: bool,
        created_at: DateTime<Utc>,
    }

    impl From<SubscriptionRow> for EmailSubscription {
        fn from(r: SubscriptionRow) -> Self {
            EmailSubscription {
                id: r.id,
                email: r.email,
                verification_token: r.verification_token,
                verified: r.verified,
                created_at: r.created_at,
            }
        }
    }

    #[derive(sqlx::FromRow)]
    struct EventRow {
        id: Id,
        event: String,
        metadata: Json<serde_json::Value>,
        user_agent: Option<String>,
        session_id: String,
        created_at: DateTime<Utc>,
    }

    impl From<EventRow> for AnalyticsEvent {
        fn from(r: EventRow) -> Self {
            AnalyticsEvent {
                id: r.id,
                event: r.event,
                metadata: r.metadata.0,
                user_agent: r.user_agent,
                session_id: r.session_id,
                created_at: r.created_at,
            }
        }
    }

    const PAIN_COLS: &str = "id, image_url, date, pain_markers, notes";
    const LOG_COLS: &str = "id, date, steps, activity, symptoms, pain_level, created_at";
    const INJURY_COLS: &str = "id, user_id, name, description, date_of_injury, status, created_at, updated_at";
    const SUB_COLS: &str = "id, email, verification_token, verified, created_at";
    const EVENT_COLS: &str = "id, event, metadata, user_agent, session_id, created_at";

    #[async_trait]
    impl PainEntryRepo for PgRepo {
        async fn create_pain_entry(&self, new: NewPainEntry) -> RepoResult<PainEntry> {
            let row = sqlx::query_as::<_, PainEntryRow>(&format!(
                "INSERT INTO pain_entries (image_url, pain_markers, notes) VALUES ($1,$2,$3) RETURNING {PAIN_COLS}"
            ))
            .bind(&new.image_url)
            .bind(Json(&new.pain_markers))
            .bind(new.notes.as_ref())
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn list_pain_entries(&self) -> RepoResult<Vec<PainEntry>> {
            let rows = sqlx::query_as::<_, PainEntryRow>(&format!(
                "SELECT {PAIN_COLS} FROM pain_entries ORDER BY date DESC, id DESC"
            ))
            .fetch_all(&self.pool).await.map_err(db_err)?;
            Ok(rows.into_iter().map(Into::into).collect())
        }

        async fn get_pain_entry(&self, id: Id) -> RepoResult<PainEntry> {
            let row = sqlx::query_as::<_, PainEntryRow>(&format!("SELECT {PAIN_COLS} FROM pain_entries WHERE id=$1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }
    }

    #[async_trait]
    impl ActivityLogRepo for PgRepo {
        async fn list_activity_logs(&self) -> RepoResult<Vec<ActivityLog>> {
            let rows = sqlx::query_as::<_, ActivityLogRow>(&format!(
                "SELECT {LOG_COLS} FROM activity_logs ORDER BY date DESC, id DESC"
            ))
            .fetch_all(&self.pool).await.map_err(db_err)?;
            Ok(rows.into_iter().map(Into::into).collect())
        }

        async fn get_activity_log_by_date(&self, date: NaiveDate) -> RepoResult<ActivityLog> {
            let row = sqlx::query_as::<_, ActivityLogRow>(&format!("SELECT {LOG_COLS} FROM activity_logs WHERE date=$1"))
                .bind(date)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn create_activity_log(&self, new: NewActivityLog) -> RepoResult<ActivityLog> {
            let row = sqlx::query_as::<_, ActivityLogRow>(&format!(
                "INSERT INTO activity_logs (date, steps, activity, symptoms, pain_level) VALUES ($1,$2,$3,$4,$5) RETURNING {LOG_COLS}"
            ))
            .bind(new.date).bind(new.steps).bind(&new.activity).bind(&new.symptoms).bind(new.pain_level)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn update_activity_log(&self, id: Id, upd: NewActivityLog) -> RepoResult<ActivityLog> {
            let row = sqlx::query_as::<_, ActivityLogRow>(&format!(
                "UPDATE activity_logs SET date=$2, steps=$3, activity=$4, symptoms=$5, pain_level=$6 WHERE id=$1 RETURNING {LOG_COLS}"
            ))
            .bind(id).bind(upd.date).bind(upd.steps).bind(&upd.activity).bind(&upd.symptoms).bind(upd.pain_level)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn delete_activity_log(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM activity_logs WHERE id=$1")
                .bind(id)
                .execute(&self.pool).await.map_err(db_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }

        async fn upsert_activity_log(&self, new: NewActivityLog) -> RepoResult<(ActivityLog, bool)> {
            #[derive(sqlx::FromRow)]
            struct Upserted {
                #[sqlx(flatten)]
                log: ActivityLogRow,
                inserted: bool,
            }
            // xmax = 0 only for freshly inserted tuples
            let row = sqlx::query_as::<_, Upserted>(&format!(
                r#"INSERT INTO activity_logs (date, steps, activity, symptoms, pain_level) VALUES ($1,$2,$3,$4,$5)
                   ON CONFLICT (date) DO UPDATE SET steps = EXCLUDED.steps, activity = EXCLUDED.activity,
                       symptoms = EXCLUDED.symptoms, pain_level = EXCLUDED.pain_level
                   RETURNING {LOG_COLS}, (xmax = 0) AS inserted"#
            ))
            .bind(new.date).bind(new.steps).bind(&new.activity).bind(&new.symptoms).bind(new.pain_level)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok((row.log.into(), row.inserted))
        }
    }

    #[async_trait]
    impl InjuryRepo for PgRepo {
        async fn list_injuries(&self, user_id: Option<&str>) -> RepoResult<Vec<Injury>> {
            let rows = sqlx::query_as::<_, InjuryRow>(&format!(
                "SELECT {INJURY_COLS} FROM injuries WHERE ($1::TEXT IS NULL OR user_id = $1) ORDER BY date_of_injury DESC, id DESC"
            ))
            .bind(user_id)
            .fetch_all(&self.pool).await.map_err(db_err)?;
            rows.into_iter().map(Injury::try_from).collect()
        }

        async fn create_injury(&self, new: NewInjury) -> RepoResult<Injury> {
            let row = sqlx::query_as::<_, InjuryRow>(&format!(
                "INSERT INTO injuries (user_id, name, description, date_of_injury, status) VALUES ($1,$2,$3,$4,$5) RETURNING {INJURY_COLS}"
            ))
            .bind(new.user_id.as_ref()).bind(&new.name).bind(new.description.as_ref())
            .bind(new.date_of_injury).bind(new.status.as_str())
            .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_into()
        }

        async fn get_injury(&self, id: Id) -> RepoResult<Injury> {
            let row = sqlx::query_as::<_, InjuryRow>(&format!("SELECT {INJURY_COLS} FROM injuries WHERE id=$1"))
                .bind(id)
                .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_into()
        }

        async fn update_injury(&self, id: Id, upd: NewInjury) -> RepoResult<Injury> {
            let row = sqlx::query_as::<_, InjuryRow>(&format!(
                "UPDATE injuries SET user_id=$2, name=$3, description=$4, date_of_injury=$5, status=$6, updated_at=now() WHERE id=$1 RETURNING {INJURY_COLS}"
            ))
            .bind(id).bind(upd.user_id.as_ref()).bind(&upd.name).bind(upd.description.as_ref())
            .bind(upd.date_of_injury).bind(upd.status.as_str())
            .fetch_one(&self.pool).await.map_err(db_err)?;
            row.try_into()
        }

        async fn delete_injury(&self, id: Id) -> RepoResult<()> {
            let res = sqlx::query("DELETE FROM injuries WHERE id=$1")
                .bind(id)
                .execute(&self.pool).await.map_err(db_err)?;
            if res.rows_affected() == 0 { return Err(RepoError::NotFound); }
            Ok(())
        }
    }

    #[async_trait]
    impl SubscriptionRepo for PgRepo {
        async fn subscribe(&self, email: &str, token: &str) -> RepoResult<SubscribeOutcome> {
            let mut tx = self.pool.begin().await.map_err(db_err)?;
            let existing = sqlx::query_as::<_, SubscriptionRow>(&format!(
                "SELECT {SUB_COLS} FROM email_subscriptions WHERE email=$1 FOR UPDATE"
            ))
            .bind(email)
            .fetch_optional(&mut *tx).await.map_err(db_err)?;
            let outcome = match existing {
                Some(row) if row.verified => SubscribeOutcome::AlreadyVerified,
                Some(row) => {
                    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
                        "UPDATE email_subscriptions SET verification_token=$2 WHERE id=$1 RETURNING {SUB_COLS}"
                    ))
                    .bind(row.id).bind(token)
                    .fetch_one(&mut *tx).await.map_err(db_err)?;
                    SubscribeOutcome::Resent(row.into())
                }
                None => {
                    let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
                        "INSERT INTO email_subscriptions (email, verification_token) VALUES ($1,$2) RETURNING {SUB_COLS}"
                    ))
                    .bind(email).bind(token)
                    .fetch_one(&mut *tx).await.map_err(db_err)?;
                    SubscribeOutcome::Created(row.into())
                }
            };
            tx.commit().await.map_err(db_err)?;
            Ok(outcome)
        }

        async fn verify_subscription(&self, token: &str) -> RepoResult<EmailSubscription> {
            let row = sqlx::query_as::<_, SubscriptionRow>(&format!(
                "UPDATE email_subscriptions SET verified=TRUE, verification_token=NULL WHERE verification_token=$1 AND verified=FALSE RETURNING {SUB_COLS}"
            ))
            .bind(token)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }
    }

    #[async_trait]
    impl AnalyticsRepo for PgRepo {
        async fn record_event(&self, new: NewAnalyticsEvent) -> RepoResult<AnalyticsEvent> {
            let row = sqlx::query_as::<_, EventRow>(&format!(
                "INSERT INTO analytics_events (event, metadata, user_agent, session_id) VALUES ($1,$2,$3,$4) RETURNING {EVENT_COLS}"
            ))
            .bind(&new.event).bind(Json(&new.metadata)).bind(new.user_agent.as_ref()).bind(&new.session_id)
            .fetch_one(&self.pool).await.map_err(db_err)?;
            Ok(row.into())
        }

        async fn list_events(&self) -> RepoResult<Vec<AnalyticsEvent>> {
            let rows = sqlx::query_as::<_, EventRow>(&format!("SELECT {EVENT_COLS} FROM analytics_events ORDER BY id"))
                .fetch_all(&self.pool).await.map_err(db_err)?;
            Ok(rows.into_iter().map(Into::into).collect())
        }
    }
}
