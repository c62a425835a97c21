//! Action lifecycle engine.
//!
//! `ActionService` owns no state of its own: every operation reads the record
//! fresh from the store, decides, and writes back with compare-and-swap so
//! transitions on one action are linearizable. Different actions never
//! coordinate.
//!
//! # `run` ordering
//!
//! 1. provisional `ACTIVE` record written under `action/<id>`
//! 2. `request/<request_id>` claimed with put-if-absent
//! 3. work executed (only by the claim winner)
//! 4. terminal record swapped in over the `ACTIVE` bytes
//!
//! The mapping therefore never points at a record that was not written, and
//! once it is visible no other call executes the work for that request id. A
//! crash between 2 and 4 leaves an `ACTIVE` record that `recover_stale` fails
//! on the next startup.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::action::{
    ActionRecord, ActionRequest, ActionStatusValue, CANCELED_DISPLAY, RECOVERED_DISPLAY,
};
use crate::auth::{can_manage, can_monitor, Authorization, Caller};
use crate::codec;
use crate::error::{ActionError, Result};
use crate::idempotency::{action_key, action_prefix, Claim, IdempotencyIndex};
use crate::runner::ActionRunner;
use crate::store::KvStore;

/// Compare-and-swap attempts before a transition gives up.
const MAX_SWAP_ATTEMPTS: usize = 16;

/// `details.error` of a run whose result could not be stored.
const STORAGE_FAILURE_ERROR: &str = "storage unavailable";

/// Default `release_after` when neither the request nor the config set one.
pub const DEFAULT_RELEASE_AFTER: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub default_release_after: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            default_release_after: DEFAULT_RELEASE_AFTER,
        }
    }
}

/// What a transition closure wants done with the record it was handed.
enum Step {
    /// Return the record as-is without writing.
    Keep(ActionRecord),
    Write(ActionRecord),
    Delete(ActionRecord),
}

pub struct ActionService {
    store: Arc<dyn KvStore>,
    runner: Arc<dyn ActionRunner>,
    settings: EngineSettings,
}

impl ActionService {
    pub fn new(
        store: Arc<dyn KvStore>,
        runner: Arc<dyn ActionRunner>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            runner,
            settings,
        }
    }

    fn index(&self) -> IdempotencyIndex<'_> {
        IdempotencyIndex::new(self.store.as_ref())
    }

    /// Record plus the exact bytes it was decoded from, for compare-and-swap.
    fn load(&self, action_id: &str) -> Result<Option<(ActionRecord, Vec<u8>)>> {
        match self.store.get(&action_key(action_id))? {
            Some(raw) => Ok(Some((codec::decode(&raw)?, raw))),
            None => Ok(None),
        }
    }

    /// Load and authorize. A denied caller gets the same `NotFound` as for a
    /// missing record.
    fn load_authorized(
        &self,
        action_id: &str,
        caller: &Caller,
        check: fn(&ActionRecord, &Caller) -> Authorization,
    ) -> Result<(ActionRecord, Vec<u8>)> {
        let not_found = || ActionError::NotFound(action_id.to_string());
        let (record, raw) = self.load(action_id)?.ok_or_else(not_found)?;
        match check(&record, caller) {
            Authorization::Authorized => Ok((record, raw)),
            Authorization::Denied => {
                debug!(action_id, caller = ?caller.identity, "access denied");
                Err(not_found())
            }
        }
    }

    /// Read-decide-swap loop shared by `cancel` and `release`.
    fn transition(
        &self,
        action_id: &str,
        caller: &Caller,
        check: fn(&ActionRecord, &Caller) -> Authorization,
        mut decide: impl FnMut(ActionRecord) -> Result<Step>,
    ) -> Result<ActionRecord> {
        let key = action_key(action_id);
        for _ in 0..MAX_SWAP_ATTEMPTS {
            let (record, raw) = self.load_authorized(action_id, caller, check)?;
            let (record, next) = match decide(record)? {
                Step::Keep(record) => return Ok(record),
                Step::Write(record) => {
                    let bytes = codec::encode(&record)?;
                    (record, Some(bytes))
                }
                Step::Delete(record) => (record, None),
            };
            if self.store.compare_and_swap(&key, &raw, next.as_deref())? {
                return Ok(record);
            }
            debug!(action_id, "record changed underneath transition, retrying");
        }
        Err(ActionError::StorageUnavailable(format!(
            "gave up updating action {action_id} after {MAX_SWAP_ATTEMPTS} attempts"
        )))
    }

    // -----------------------------------------------------------------------
    // Caller operations
    // -----------------------------------------------------------------------

    /// Start an action for `request`, or return the existing one if this
    /// request id was seen before.
    pub fn run(&self, request: &ActionRequest, caller: &Caller) -> Result<ActionRecord> {
        if request.request_id.trim().is_empty() {
            return Err(ActionError::InvalidRequest(
                "request_id must not be empty".into(),
            ));
        }

        if let Some(action_id) = self.index().resolve(&request.request_id)? {
            debug!(request_id = %request.request_id, %action_id, "duplicate request");
            return self.status(&action_id, caller);
        }

        let mut record = ActionRecord::new_active(
            request,
            caller.identity.as_deref(),
            self.settings.default_release_after,
        );
        let key = action_key(&record.action_id);
        let active = codec::encode(&record)?;
        if self.store.put_if_absent(&key, &active)?.is_some() {
            return Err(ActionError::InvalidState(format!(
                "action id collision: {}",
                record.action_id
            )));
        }

        match self.index().claim(&request.request_id, &record.action_id) {
            Ok(Claim::Claimed) => {}
            Ok(Claim::Existing(winner)) => {
                debug!(request_id = %request.request_id, %winner, "lost first-run race");
                self.store.compare_and_swap(&key, &active, None)?;
                return self.status(&winner, caller);
            }
            Err(e) => {
                // Nothing points at the provisional record yet.
                if let Err(cleanup) = self.store.compare_and_swap(&key, &active, None) {
                    warn!(%key, error = %cleanup, "could not remove provisional record");
                }
                return Err(e);
            }
        }

        let provisional = record.clone();
        match self.runner.execute(caller, &request.body) {
            Ok(result) => {
                record.complete(
                    ActionStatusValue::Succeeded,
                    ActionStatusValue::Succeeded.as_str(),
                    Some(result),
                );
            }
            Err(err) => {
                warn!(action_id = %record.action_id, error = %err, "action failed");
                record.complete(
                    ActionStatusValue::Failed,
                    ActionStatusValue::Failed.as_str(),
                    Some(err.to_details()),
                );
            }
        }

        let terminal = codec::encode(&record)?;
        let swapped = match self.store.compare_and_swap(&key, &active, Some(&terminal)) {
            Ok(swapped) => swapped,
            Err(e) => {
                self.fail_unstored(&key, &active, provisional);
                return Err(e);
            }
        };
        if swapped {
            info!(
                action_id = %record.action_id,
                request_id = %record.request_id,
                status = %record.status,
                "action completed"
            );
            return Ok(record);
        }

        // A cancel landed while the work ran; the stored state wins.
        let (current, _) = self
            .load(&record.action_id)?
            .ok_or_else(|| ActionError::NotFound(record.action_id.clone()))?;
        info!(action_id = %current.action_id, status = %current.status, "action superseded during run");
        Ok(current)
    }

    /// The terminal write of `run` failed. Try once more with a FAILED record
    /// so retries of a synchronous action do not keep seeing it ACTIVE; if
    /// that also fails the record is left for `recover_stale`.
    fn fail_unstored(&self, key: &str, active: &[u8], mut record: ActionRecord) {
        record.complete(
            ActionStatusValue::Failed,
            ActionStatusValue::Failed.as_str(),
            Some(json!({ "error": STORAGE_FAILURE_ERROR })),
        );
        let written = codec::encode(&record)
            .and_then(|bytes| self.store.compare_and_swap(key, active, Some(&bytes)));
        match written {
            Ok(true) => warn!(action_id = %record.action_id, "result not stored; action marked failed"),
            Ok(false) => debug!(action_id = %record.action_id, "record changed before failure could be stored"),
            Err(e) => warn!(
                action_id = %record.action_id,
                error = %e,
                "result not stored; action left active until recovery"
            ),
        }
    }

    pub fn status(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        let (record, _) = self.load_authorized(action_id, caller, can_monitor)?;
        Ok(record)
    }

    /// Fail an active action. Finished actions are returned unchanged.
    pub fn cancel(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        self.transition(action_id, caller, can_manage, |mut record| {
            if record.is_terminal() {
                return Ok(Step::Keep(record));
            }
            record.complete(ActionStatusValue::Failed, CANCELED_DISPLAY, None);
            info!(action_id = %record.action_id, "action canceled");
            Ok(Step::Write(record))
        })
    }

    /// Delete a finished action and return its last state.
    pub fn release(&self, action_id: &str, caller: &Caller) -> Result<ActionRecord> {
        self.transition(action_id, caller, can_manage, |record| {
            if !record.is_terminal() {
                return Err(ActionError::InvalidState(format!(
                    "action {} is not complete",
                    record.action_id
                )));
            }
            info!(action_id = %record.action_id, "action released");
            Ok(Step::Delete(record))
        })
    }

    // -----------------------------------------------------------------------
    // Operator operations (no caller authorization)
    // -----------------------------------------------------------------------

    pub fn find(&self, action_id: &str) -> Result<Option<ActionRecord>> {
        Ok(self.load(action_id)?.map(|(record, _)| record))
    }

    /// Every readable record, newest first. Undecodable entries are skipped.
    pub fn list_records(&self) -> Result<Vec<ActionRecord>> {
        let mut records = Vec::new();
        for (key, raw) in self.store.scan_prefix(action_prefix())? {
            match codec::decode(&raw) {
                Ok(record) => records.push(record),
                Err(e) => warn!(%key, error = %e, "skipping unreadable record"),
            }
        }
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(records)
    }

    /// Terminal records whose `release_after` has elapsed at `now`.
    pub fn expired(&self, now: DateTime<Utc>) -> Result<Vec<ActionRecord>> {
        Ok(self
            .list_records()?
            .into_iter()
            .filter(|r| r.is_expired(now))
            .collect())
    }

    /// Delete a terminal record regardless of who created it. Returns `false`
    /// if it was absent or changed concurrently.
    pub fn reclaim(&self, action_id: &str) -> Result<bool> {
        let Some((record, raw)) = self.load(action_id)? else {
            return Ok(false);
        };
        if !record.is_terminal() {
            return Err(ActionError::InvalidState(format!(
                "action {action_id} is not complete"
            )));
        }
        self.store
            .compare_and_swap(&action_key(action_id), &raw, None)
    }

    /// Fail every `ACTIVE` record started more than `max_age` ago.
    ///
    /// Returns the number of records recovered.
    pub fn recover_stale(&self, max_age: Duration) -> Result<u32> {
        let max_age = chrono::Duration::from_std(max_age)
            .map_err(|e| ActionError::InvalidRequest(e.to_string()))?;
        let cutoff = Utc::now() - max_age;

        let mut count = 0u32;
        for (key, raw) in self.store.scan_prefix(action_prefix())? {
            let mut record = match codec::decode(&raw) {
                Ok(record) => record,
                Err(e) => {
                    warn!(%key, error = %e, "skipping unreadable record during recovery");
                    continue;
                }
            };
            if record.is_terminal() || record.start_time >= cutoff {
                continue;
            }
            record.complete(ActionStatusValue::Failed, RECOVERED_DISPLAY, None);
            if self
                .store
                .compare_and_swap(&key, &raw, Some(&codec::encode(&record)?))?
            {
                warn!(action_id = %record.action_id, "recovered stale active action");
                count += 1;
            }
        }
        Ok(count)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
