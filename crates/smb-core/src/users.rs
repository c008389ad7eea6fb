//! Per-user subscription state and daily quotas, persisted as a JSON object
//! keyed by the decimal user id.

use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, MutexGuard},
};

use chrono::{Duration, Local, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{
    config::{Config, TierLimits},
    domain::{Plan, UserId},
    Result,
};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRecord {
    pub is_subscribed: bool,
    pub subscription_date: Option<String>,
    pub downloads_today: u32,
    pub summaries_today: u32,
    pub last_reset: String,
    pub is_premium: bool,
    pub premium_expires: Option<String>,
    pub premium_started: Option<String>,
    pub total_downloads: u64,
    pub total_summaries: u64,
    pub referral_code: Option<String>,
    pub referred_by: Option<String>,
}

impl Default for UserRecord {
    fn default() -> Self {
        Self {
            is_subscribed: false,
            subscription_date: None,
            downloads_today: 0,
            summaries_today: 0,
            last_reset: String::new(),
            is_premium: false,
            premium_expires: None,
            premium_started: None,
            total_downloads: 0,
            total_summaries: 0,
            referral_code: None,
            referred_by: None,
        }
    }
}

impl UserRecord {
    fn fresh(today: NaiveDate) -> Self {
        Self {
            last_reset: today.to_string(),
            ..Self::default()
        }
    }
}

/// Which daily counter a quota check is about.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Quota {
    Downloads,
    Summaries,
}

/// A user's record after daily reset and plan expiry have been applied.
#[derive(Clone, Debug)]
pub struct UsageSnapshot {
    pub user: UserRecord,
    pub plan: Plan,
    pub limits: TierLimits,
}

impl UsageSnapshot {
    pub fn used(&self, quota: Quota) -> u32 {
        match quota {
            Quota::Downloads => self.user.downloads_today,
            Quota::Summaries => self.user.summaries_today,
        }
    }

    pub fn limit(&self, quota: Quota) -> u32 {
        match quota {
            Quota::Downloads => self.limits.downloads_per_day,
            Quota::Summaries => self.limits.summaries_per_day,
        }
    }
}

pub struct UserStore {
    cfg: Arc<Config>,
    path: PathBuf,
    users: Mutex<HashMap<String, UserRecord>>,
}

impl UserStore {
    /// Load the store from `cfg.user_data_file`.
    ///
    /// A missing or unreadable file starts an empty store; the error is logged.
    pub fn open(cfg: Arc<Config>) -> Self {
        let path = cfg.user_data_file.clone();
        let users = match load_users(&path) {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(path = %path.display(), "error loading user data: {e}");
                HashMap::new()
            }
        };
        tracing::info!(users = users.len(), "user store loaded");

        Self {
            cfg,
            path,
            users: Mutex::new(users),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn get_user(&self, id: UserId) -> UserRecord {
        self.get_user_at(id, now())
    }

    pub fn get_user_at(&self, id: UserId, now: NaiveDateTime) -> UserRecord {
        let mut users = self.lock();
        entry(&mut users, id, now).clone()
    }

    pub fn is_subscribed(&self, id: UserId) -> bool {
        self.get_user(id).is_subscribed
    }

    pub fn subscribe(&self, id: UserId, referred_by: Option<&str>) {
        self.subscribe_at(id, referred_by, now())
    }

    pub fn subscribe_at(&self, id: UserId, referred_by: Option<&str>, now: NaiveDateTime) {
        let own_code = referral_code(id);
        self.update(id, now, |user| {
            user.is_subscribed = true;
            if user.subscription_date.is_none() {
                user.subscription_date = Some(format_timestamp(now));
            }
            if user.referral_code.is_none() {
                user.referral_code = Some(own_code.clone());
            }
            if let Some(code) = referred_by.map(str::trim).filter(|c| !c.is_empty()) {
                if code != own_code && user.referred_by.is_none() {
                    user.referred_by = Some(code.to_string());
                }
            }
            true
        });
        tracing::info!(user_id = id.0, "user subscribed to free plan");
    }

    pub fn upgrade_to_premium(&self, id: UserId, days: i64) {
        self.upgrade_to_premium_at(id, days, now())
    }

    pub fn upgrade_to_premium_at(&self, id: UserId, days: i64, now: NaiveDateTime) {
        self.update(id, now, |user| {
            grant_premium(user, days, now);
            true
        });
        tracing::info!(user_id = id.0, days, "user upgraded to premium");
    }

    /// Start the one-time premium trial. Returns `false` if the user already
    /// had premium at some point.
    pub fn start_trial(&self, id: UserId, days: i64) -> bool {
        self.start_trial_at(id, days, now())
    }

    pub fn start_trial_at(&self, id: UserId, days: i64, now: NaiveDateTime) -> bool {
        let started = self.update(id, now, |user| {
            if user.premium_started.is_some() || user.is_premium {
                return false;
            }
            grant_premium(user, days, now);
            true
        });
        if started {
            tracing::info!(user_id = id.0, days, "premium trial started");
        }
        started
    }

    pub fn reset_daily_limits(&self, id: UserId) {
        self.reset_daily_limits_at(id, now())
    }

    pub fn reset_daily_limits_at(&self, id: UserId, now: NaiveDateTime) {
        self.update(id, now, |user| reset_if_new_day(user, now.date()));
    }

    /// Current plan; an expired premium is downgraded (and persisted).
    pub fn plan(&self, id: UserId) -> Plan {
        self.plan_at(id, now())
    }

    pub fn plan_at(&self, id: UserId, now: NaiveDateTime) -> Plan {
        let mut plan = Plan::Free;
        self.update(id, now, |user| {
            let changed = expire_premium(user, now);
            plan = plan_of(user);
            changed
        });
        plan
    }

    pub fn max_file_size(&self, id: UserId) -> u64 {
        self.cfg.limits(self.plan(id)).max_file_size
    }

    /// Reset daily counters and expired premium, then return the result.
    pub fn usage(&self, id: UserId) -> UsageSnapshot {
        self.usage_at(id, now())
    }

    pub fn usage_at(&self, id: UserId, now: NaiveDateTime) -> UsageSnapshot {
        let mut snapshot = None;
        self.update(id, now, |user| {
            let expired = expire_premium(user, now);
            let reset = reset_if_new_day(user, now.date());
            snapshot = Some(user.clone());
            expired || reset
        });
        let user = snapshot.unwrap_or_else(|| UserRecord::fresh(now.date()));
        let plan = plan_of(&user);
        UsageSnapshot {
            limits: self.cfg.limits(plan),
            plan,
            user,
        }
    }

    pub fn can_download(&self, id: UserId) -> bool {
        self.has_quota_at(id, Quota::Downloads, now())
    }

    pub fn can_summarize(&self, id: UserId) -> bool {
        self.has_quota_at(id, Quota::Summaries, now())
    }

    /// Subscribed and below today's limit for `quota`.
    pub fn has_quota_at(&self, id: UserId, quota: Quota, now: NaiveDateTime) -> bool {
        let snapshot = self.usage_at(id, now);
        snapshot.user.is_subscribed && snapshot.used(quota) < snapshot.limit(quota)
    }

    pub fn increment_download(&self, id: UserId) {
        self.update(id, now(), |user| {
            user.downloads_today += 1;
            user.total_downloads += 1;
            true
        });
    }

    pub fn increment_summary(&self, id: UserId) {
        self.update(id, now(), |user| {
            user.summaries_today += 1;
            user.total_summaries += 1;
            true
        });
    }

    /// Apply `f` to the user's record; `f` returns whether anything changed,
    /// in which case the whole store is saved.
    fn update(
        &self,
        id: UserId,
        now: NaiveDateTime,
        f: impl FnOnce(&mut UserRecord) -> bool,
    ) -> bool {
        let mut users = self.lock();
        let changed = f(entry(&mut users, id, now));
        if changed {
            if let Err(e) = save_users(&self.path, &users) {
                tracing::error!(path = %self.path.display(), "error saving user data: {e}");
            }
        }
        changed
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, UserRecord>> {
        self.users.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// A user's own shareable referral code.
pub fn referral_code(id: UserId) -> String {
    let digest = Sha256::digest(format!("smb-ref:{}", id.0).as_bytes());
    digest[..4].iter().map(|b| format!("{b:02x}")).collect()
}

fn entry(
    users: &mut HashMap<String, UserRecord>,
    id: UserId,
    now: NaiveDateTime,
) -> &mut UserRecord {
    users
        .entry(id.0.to_string())
        .or_insert_with(|| UserRecord::fresh(now.date()))
}

fn grant_premium(user: &mut UserRecord, days: i64, now: NaiveDateTime) {
    user.is_premium = true;
    user.premium_started = Some(format_timestamp(now));
    user.premium_expires = Some(format_timestamp(now + Duration::days(days)));
}

fn reset_if_new_day(user: &mut UserRecord, today: NaiveDate) -> bool {
    let today = today.to_string();
    if user.last_reset == today {
        return false;
    }
    user.downloads_today = 0;
    user.summaries_today = 0;
    user.last_reset = today;
    true
}

fn expire_premium(user: &mut UserRecord, now: NaiveDateTime) -> bool {
    if !user.is_premium {
        return false;
    }
    let expired = user
        .premium_expires
        .as_deref()
        .and_then(parse_timestamp)
        .is_some_and(|expires| expires <= now);
    if expired {
        user.is_premium = false;
    }
    expired
}

fn plan_of(user: &UserRecord) -> Plan {
    if user.is_premium {
        Plan::Premium
    } else {
        Plan::Free
    }
}

fn now() -> NaiveDateTime {
    Local::now().naive_local()
}

fn format_timestamp(t: NaiveDateTime) -> String {
    t.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_timestamp(s: &str) -> Option<NaiveDateTime> {
    s.parse::<NaiveDateTime>().ok()
}

fn load_users(path: &Path) -> Result<HashMap<String, UserRecord>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() {
        return Ok(HashMap::new());
    }
    Ok(serde_json::from_str(&txt)?)
}

fn save_users(path: &Path, users: &HashMap<String, UserRecord>) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let txt = serde_json::to_string_pretty(users)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, txt)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> NaiveDateTime {
        s.parse().unwrap()
    }

    fn store_in(dir: &tempfile::TempDir) -> UserStore {
        let mut cfg = Config::with_token("t");
        cfg.user_data_file = dir.path().join("user_data.json");
        UserStore::open(Arc::new(cfg))
    }

    #[test]
    fn unknown_user_gets_default_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let user = store.get_user_at(UserId(7), at("2025-03-01T10:00:00"));

        assert!(!user.is_subscribed);
        assert!(!user.is_premium);
        assert_eq!(user.last_reset, "2025-03-01");
        assert_eq!(user.downloads_today, 0);
        // Creating a record alone is not persisted.
        assert!(!store.path().exists());
    }

    #[test]
    fn unsubscribed_users_have_no_quota() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let now = at("2025-03-01T10:00:00");
        assert!(!store.has_quota_at(UserId(1), Quota::Downloads, now));
        assert!(!store.has_quota_at(UserId(1), Quota::Summaries, now));
    }

    #[test]
    fn free_download_quota_is_enforced_and_resets_next_day() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let id = UserId(42);
        let day1 = at("2025-03-01T10:00:00");

        store.subscribe_at(id, None, day1);
        for _ in 0..3 {
            assert!(store.has_quota_at(id, Quota::Downloads, day1));
            store.increment_download(id);
        }
        assert!(!store.has_quota_at(id, Quota::Downloads, day1));
        assert!(store.has_quota_at(id, Quota::Summaries, day1));

        let day2 = at("2025-03-02T00:00:01");
        assert!(store.has_quota_at(id, Quota::Downloads, day2));
        let user = store.get_user_at(id, day2);
        assert_eq!(user.downloads_today, 0);
        assert_eq!(user.total_downloads, 3);
        assert_eq!(user.last_reset, "2025-03-02");
    }

    #[test]
    fn state_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let id = UserId(5);
        {
            let store = store_in(&dir);
            store.subscribe_at(id, Some("abc12345"), at("2025-03-01T10:00:00"));
            store.increment_summary(id);
        }
        let store = store_in(&dir);
        let user = store.get_user(id);
        assert!(user.is_subscribed);
        assert_eq!(user.total_summaries, 1);
        assert_eq!(user.referred_by.as_deref(), Some("abc12345"));
        assert_eq!(user.referral_code, Some(referral_code(id)));
        assert!(user
            .subscription_date
            .as_deref()
            .unwrap()
            .starts_with("2025-03-01T10:00:00"));
    }

    #[test]
    fn own_referral_code_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let id = UserId(9);
        let own = referral_code(id);
        store.subscribe_at(id, Some(&own), at("2025-03-01T10:00:00"));
        assert_eq!(store.get_user(id).referred_by, None);
    }

    #[test]
    fn loads_records_written_by_older_versions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("user_data.json");
        std::fs::write(
            &path,
            r#"{"12": {"is_subscribed": true, "subscription_date": "2024-05-01T08:00:00.123456",
                "downloads_today": 2, "summaries_today": 0, "last_reset": "2024-05-01",
                "is_premium": false, "premium_expires": null, "premium_started": null,
                "total_downloads": 9, "total_summaries": 4, "referral_code": null,
                "referred_by": null}}"#,
        )
        .unwrap();
        let store = store_in(&dir);
        let user = store.get_user(UserId(12));
        assert!(user.is_subscribed);
        assert_eq!(user.total_downloads, 9);
    }

    #[test]
    fn corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("user_data.json"), "{not json").unwrap();
        let store = store_in(&dir);
        assert!(!store.is_subscribed(UserId(1)));
    }

    #[test]
    fn premium_expires_back_to_free() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let id = UserId(3);
        let start = at("2025-03-01T10:00:00");

        store.subscribe_at(id, None, start);
        store.upgrade_to_premium_at(id, 30, start);
        assert_eq!(store.plan_at(id, at("2025-03-30T10:00:00")), Plan::Premium);
        assert_eq!(store.plan_at(id, at("2025-03-31T10:00:00")), Plan::Free);
        assert!(!store.get_user(id).is_premium);
    }

    #[test]
    fn premium_raises_daily_limit() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let id = UserId(4);
        let now = at("2025-03-01T10:00:00");
        store.subscribe_at(id, None, now);
        for _ in 0..5 {
            store.increment_summary(id);
        }
        assert!(!store.has_quota_at(id, Quota::Summaries, now));
        store.upgrade_to_premium_at(id, 30, now);
        assert!(store.has_quota_at(id, Quota::Summaries, now));
        assert_eq!(store.usage_at(id, now).limit(Quota::Summaries), 50);
    }

    #[test]
    fn trial_is_one_time() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let id = UserId(8);
        let start = at("2025-03-01T10:00:00");
        store.subscribe_at(id, None, start);

        assert!(store.start_trial_at(id, 7, start));
        assert!(!store.start_trial_at(id, 7, start));
        assert_eq!(store.plan_at(id, at("2025-03-09T10:00:00")), Plan::Free);
        assert!(!store.start_trial_at(id, 7, at("2025-03-09T10:00:00")));
    }

    #[test]
    fn referral_codes_are_stable_and_short() {
        assert_eq!(referral_code(UserId(1)), referral_code(UserId(1)));
        assert_ne!(referral_code(UserId(1)), referral_code(UserId(2)));
        assert_eq!(referral_code(UserId(1)).len(), 8);
    }
}
