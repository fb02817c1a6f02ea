//! Shared usage ledger.
//!
//! Each `(service, window kind)` pair is guarded by its own mutex.
//! Single-window operations ([`UsageLedger::set_limit`],
//! [`UsageLedger::clear_limit`], [`UsageLedger::limits`],
//! [`UsageLedger::accumulated`]) take only that window's lock.
//!
//! Affordability, reservation, recording and status touch every window of a
//! service and hold all three of its locks at once, taken in
//! [`WindowKind::ALL`] order. For those operations exclusion is effectively
//! per service: a reservation checked against the daily window cannot be
//! overtaken on the monthly window by a concurrent request. Unrelated
//! services never contend.

use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::clock::{Clock, SystemClock};
use super::status::{ServiceStatus, WindowStatus};
use super::store::LedgerSnapshot;
use super::window::{BudgetLimit, BudgetWindow, WindowKind};

/// One recorded spend. Append-only, used for reporting only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageRecord {
    pub service: String,
    pub amount: Decimal,
    pub label: String,
    pub timestamp: DateTime<Utc>,
}

/// Per-service totals over all retained usage records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceUsage {
    pub service: String,
    pub total: Decimal,
    pub request_count: u64,
}

/// A window whose limit would be crossed by the requested amount.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "{service} {kind} budget exceeded: {accumulated:.4} spent + {reserved:.4} reserved + {requested:.4} requested > {limit:.2} limit"
)]
pub struct BudgetViolation {
    pub service: String,
    pub kind: WindowKind,
    pub limit: Decimal,
    pub accumulated: Decimal,
    pub reserved: Decimal,
    pub requested: Decimal,
}

#[derive(Debug, Default)]
struct WindowState {
    limit: Option<Decimal>,
    current: Option<BudgetWindow>,
    reserved: Decimal,
}

impl WindowState {
    /// Resolve the current window, replacing it if the period rolled over.
    fn resolve(&mut self, service: &str, kind: WindowKind, now: DateTime<Utc>) -> &mut BudgetWindow {
        let stale = self.current.as_ref().is_some_and(|w| w.is_stale(now));
        if stale {
            if let Some(old) = &self.current {
                tracing::info!(
                    service,
                    window = %kind,
                    previous_spend = %old.accumulated,
                    "budget window reset"
                );
            }
            self.current = None;
        }
        self.current
            .get_or_insert_with(|| BudgetWindow::open(service, kind, now))
    }

    fn check(
        &mut self,
        service: &str,
        kind: WindowKind,
        now: DateTime<Utc>,
        requested: Decimal,
    ) -> Result<(), BudgetViolation> {
        let Some(limit) = self.limit else {
            return Ok(());
        };
        let reserved = self.reserved;
        let accumulated = self.resolve(service, kind, now).accumulated;
        let total = accumulated
            .checked_add(reserved)
            .and_then(|held| held.checked_add(requested));
        if total.is_none_or(|total| total > limit) {
            return Err(BudgetViolation {
                service: service.to_string(),
                kind,
                limit,
                accumulated,
                reserved,
                requested,
            });
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ServiceAccount {
    windows: [Mutex<WindowState>; 3],
}

impl ServiceAccount {
    fn lock(&self, kind: WindowKind) -> MutexGuard<'_, WindowState> {
        self.windows[kind.index()]
            .lock()
            .unwrap_or_else(|e| e.into_inner())
    }

    fn lock_all(&self) -> [MutexGuard<'_, WindowState>; 3] {
        WindowKind::ALL.map(|kind| self.lock(kind))
    }
}

/// Records kept for reporting before the oldest are dropped.
pub const DEFAULT_RECORD_RETENTION: usize = 10_000;

/// Bounded usage log; the oldest entries go first.
#[derive(Debug)]
struct RecordLog {
    entries: VecDeque<UsageRecord>,
    capacity: usize,
}

impl RecordLog {
    fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    fn push(&mut self, record: UsageRecord) {
        self.entries.push_back(record);
        self.trim();
    }

    fn trim(&mut self) {
        let excess = self.entries.len().saturating_sub(self.capacity);
        if excess > 0 {
            self.entries.drain(..excess);
            tracing::trace!(dropped = excess, "usage log trimmed");
        }
    }
}

/// Time-windowed spend accounting shared by all concurrent requests.
///
/// Window accumulators are exact regardless of the usage log, which keeps at
/// most [`DEFAULT_RECORD_RETENTION`] records unless configured otherwise.
#[derive(Debug)]
pub struct UsageLedger {
    accounts: DashMap<String, Arc<ServiceAccount>>,
    records: Mutex<RecordLog>,
    clock: Arc<dyn Clock>,
}

impl Default for UsageLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl UsageLedger {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            accounts: DashMap::new(),
            records: Mutex::new(RecordLog::new(DEFAULT_RECORD_RETENTION)),
            clock,
        }
    }

    /// Cap the usage log at `capacity` records. Zero keeps none.
    pub fn with_record_retention(self, capacity: usize) -> Self {
        {
            let mut log = self.log();
            log.capacity = capacity;
            log.trim();
        }
        self
    }

    fn log(&self) -> MutexGuard<'_, RecordLog> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Builder-style limit registration for startup configuration.
    pub fn with_limit(self, service: impl AsRef<str>, limit: BudgetLimit) -> Self {
        self.set_limit(service.as_ref(), limit.kind, limit.amount);
        self
    }

    /// Apply a `{service -> limits}` map loaded at startup.
    pub fn with_limits<I, S>(self, limits: I) -> Self
    where
        I: IntoIterator<Item = (S, Vec<BudgetLimit>)>,
        S: AsRef<str>,
    {
        for (service, service_limits) in limits {
            for limit in service_limits {
                self.set_limit(service.as_ref(), limit.kind, limit.amount);
            }
        }
        self
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn account(&self, service: &str) -> Arc<ServiceAccount> {
        if let Some(account) = self.accounts.get(service) {
            return Arc::clone(account.value());
        }
        Arc::clone(self.accounts.entry(service.to_string()).or_default().value())
    }

    fn existing_account(&self, service: &str) -> Option<Arc<ServiceAccount>> {
        self.accounts.get(service).map(|a| Arc::clone(a.value()))
    }

    /// Check whether `estimate` fits within every configured window of `service`.
    ///
    /// Fails on the first violated window in daily, weekly, monthly order.
    /// A service without limits is always affordable, and the boundary is
    /// inclusive: spending exactly the remaining budget is allowed.
    pub fn can_afford(&self, service: &str, estimate: Decimal) -> Result<(), BudgetViolation> {
        let Some(account) = self.existing_account(service) else {
            return Ok(());
        };
        let now = self.now();
        let mut windows = account.lock_all();
        for (kind, state) in WindowKind::ALL.into_iter().zip(windows.iter_mut()) {
            state.check(service, kind, now, estimate)?;
        }
        Ok(())
    }

    /// Atomically check affordability and hold `estimate` against every
    /// window of `service` until the returned reservation is committed or
    /// dropped.
    pub fn reserve(
        &self,
        service: &str,
        estimate: Decimal,
    ) -> Result<Reservation<'_>, BudgetViolation> {
        let estimate = estimate.max(Decimal::ZERO);
        let account = self.account(service);
        let now = self.now();
        {
            let mut windows = account.lock_all();
            for (kind, state) in WindowKind::ALL.into_iter().zip(windows.iter_mut()) {
                state.check(service, kind, now, estimate)?;
            }
            for state in windows.iter_mut() {
                state.reserved = state.reserved.saturating_add(estimate);
            }
        }
        Ok(Reservation {
            ledger: self,
            account,
            service: service.to_string(),
            amount: estimate,
            settled: false,
        })
    }

    /// Record spend against every window of `service`. Never rejects, even
    /// when the amount pushes a window past its limit. Accumulators saturate
    /// at `Decimal::MAX` instead of overflowing.
    pub fn record_usage(&self, service: &str, amount: Decimal, label: &str) {
        let account = self.account(service);
        self.apply(&account, service, amount, Decimal::ZERO, label);
    }

    fn apply(
        &self,
        account: &ServiceAccount,
        service: &str,
        amount: Decimal,
        release: Decimal,
        label: &str,
    ) {
        let amount = if amount.is_sign_negative() {
            tracing::warn!(service, %amount, "ignoring negative usage amount");
            Decimal::ZERO
        } else {
            amount
        };
        let now = self.now();
        {
            let mut windows = account.lock_all();
            for (kind, state) in WindowKind::ALL.into_iter().zip(windows.iter_mut()) {
                state.reserved = state.reserved.saturating_sub(release).max(Decimal::ZERO);
                let window = state.resolve(service, kind, now);
                window.accumulated = window.accumulated.saturating_add(amount);
            }
        }
        tracing::debug!(service, %amount, label, "usage recorded");
        self.log().push(UsageRecord {
            service: service.to_string(),
            amount,
            label: label.to_string(),
            timestamp: now,
        });
    }

    fn release(&self, account: &ServiceAccount, amount: Decimal) {
        for mut state in account.lock_all() {
            state.reserved = state.reserved.saturating_sub(amount).max(Decimal::ZERO);
        }
    }

    /// Replace or create the limit for one window kind. The window's current
    /// accumulated spend is left untouched.
    pub fn set_limit(&self, service: &str, kind: WindowKind, amount: Decimal) {
        let account = self.account(service);
        account.lock(kind).limit = Some(amount);
        tracing::info!(service, window = %kind, limit = %amount, "budget limit set");
    }

    pub fn clear_limit(&self, service: &str, kind: WindowKind) -> Option<Decimal> {
        let account = self.existing_account(service)?;
        let previous = account.lock(kind).limit.take();
        if previous.is_some() {
            tracing::info!(service, window = %kind, "budget limit cleared");
        }
        previous
    }

    pub fn limits(&self, service: &str) -> Vec<BudgetLimit> {
        let Some(account) = self.existing_account(service) else {
            return Vec::new();
        };
        WindowKind::ALL
            .into_iter()
            .filter_map(|kind| account.lock(kind).limit.map(|a| BudgetLimit::new(kind, a)))
            .collect()
    }

    /// Per configured window: limit, spend, remaining, period start.
    /// Triggers lazy resets; returns `None` for a service with no limits.
    pub fn status(&self, service: &str) -> Option<ServiceStatus> {
        let account = self.existing_account(service)?;
        let now = self.now();
        let mut windows = account.lock_all();
        let statuses: Vec<WindowStatus> = WindowKind::ALL
            .into_iter()
            .zip(windows.iter_mut())
            .filter_map(|(kind, state)| {
                let limit = state.limit?;
                let reserved = state.reserved;
                let window = state.resolve(service, kind, now);
                Some(WindowStatus {
                    kind,
                    limit,
                    accumulated: window.accumulated,
                    reserved,
                    remaining: (limit - window.accumulated).max(Decimal::ZERO),
                    period_start: window.period_start,
                })
            })
            .collect();

        if statuses.is_empty() {
            return None;
        }
        Some(ServiceStatus {
            service: service.to_string(),
            windows: statuses,
        })
    }

    pub fn status_all(&self) -> BTreeMap<String, ServiceStatus> {
        let mut services: Vec<String> = self.accounts.iter().map(|e| e.key().clone()).collect();
        services.sort();
        services
            .into_iter()
            .filter_map(|service| self.status(&service).map(|s| (service, s)))
            .collect()
    }

    /// Current accumulated spend of one window, after any lazy reset.
    pub fn accumulated(&self, service: &str, kind: WindowKind) -> Decimal {
        let Some(account) = self.existing_account(service) else {
            return Decimal::ZERO;
        };
        let now = self.now();
        account.lock(kind).resolve(service, kind, now).accumulated
    }

    pub fn records(&self, service: Option<&str>) -> Vec<UsageRecord> {
        self.log()
            .entries
            .iter()
            .filter(|r| service.is_none_or(|s| r.service == s))
            .cloned()
            .collect()
    }

    /// Remove and return every retained record, oldest first. Window
    /// accumulators are unaffected.
    pub fn drain_records(&self) -> Vec<UsageRecord> {
        self.log().entries.drain(..).collect()
    }

    pub fn usage_summary(&self) -> Vec<ServiceUsage> {
        let log = self.log();
        let mut totals: BTreeMap<&str, (Decimal, u64)> = BTreeMap::new();
        for record in log.entries.iter() {
            let entry = totals.entry(record.service.as_str()).or_default();
            entry.0 = entry.0.saturating_add(record.amount);
            entry.1 += 1;
        }
        totals
            .into_iter()
            .map(|(service, (total, request_count))| ServiceUsage {
                service: service.to_string(),
                total,
                request_count,
            })
            .collect()
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let mut windows = Vec::new();
        for entry in self.accounts.iter() {
            for state in entry.value().lock_all() {
                if let Some(window) = &state.current {
                    windows.push(window.clone());
                }
            }
        }
        windows.sort_by(|a, b| (&a.service, a.kind).cmp(&(&b.service, b.kind)));
        LedgerSnapshot {
            taken_at: self.now(),
            windows,
            records: self.records(None),
        }
    }

    /// Load windows and records from a snapshot. Limits are not part of the
    /// snapshot; stale windows are discarded on their next access.
    pub fn restore(&self, snapshot: LedgerSnapshot) {
        let restored = snapshot.windows.len();
        for window in snapshot.windows {
            let account = self.account(&window.service);
            let mut state = account.lock(window.kind);
            state.current = Some(BudgetWindow {
                accumulated: window.accumulated.max(Decimal::ZERO),
                ..window
            });
        }
        {
            let mut log = self.log();
            log.entries.extend(snapshot.records);
            log.trim();
        }
        tracing::info!(windows = restored, "usage ledger restored from snapshot");
    }
}

/// Budget held for an in-flight provider call.
///
/// Dropping an uncommitted reservation releases the hold without recording
/// anything, which is what happens on failure or cancellation.
#[derive(Debug)]
#[must_use = "dropping a reservation releases it without recording usage"]
pub struct Reservation<'a> {
    ledger: &'a UsageLedger,
    account: Arc<ServiceAccount>,
    service: String,
    amount: Decimal,
    settled: bool,
}

impl Reservation<'_> {
    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Release the hold and record the actual amount as one step.
    pub fn commit(mut self, actual: Decimal, label: &str) {
        self.ledger
            .apply(&self.account, &self.service, actual, self.amount, label);
        self.settled = true;
    }

    pub fn release(mut self) {
        self.ledger.release(&self.account, self.amount);
        self.settled = true;
    }
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.ledger.release(&self.account, self.amount);
        }
    }
}
