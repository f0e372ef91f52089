//! Optimistic local-then-remote mutation of entity collections.
//!
//! A [`Coordinator`] owns the cached collection for one view. Every mutation is applied to the
//! cache synchronously and its remote write is spawned on the injected executor right away, so
//! the write reaches the [`RpcClient`] whether or not anyone awaits the returned
//! [`PendingMutation`]. Failures are reported, never rolled back.
//!
//! Remote writes for the same id are chained under [`WritePolicy::Serialized`] so they reach
//! the gateway in issue order. Under [`WritePolicy::Concurrent`] they race; acknowledgments are
//! sequence-checked so a late ack for an older write never replaces a newer confirmed value in
//! the cache, although the gateway itself may end up storing the older write.

mod cache;
mod patch;

pub use cache::CollectionCache;
pub use patch::apply_patch;

use crate::model::{DeletePolicy, Entity, same_content};
use crate::remote::{RemoteCallError, RpcClient, RpcResult};
use chrono::Utc;
use futures::channel::oneshot;
use futures::future::{self, FutureExt, LocalBoxFuture};
use futures::task::{LocalSpawn, LocalSpawnExt};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};
use thiserror::Error;

/// Coordinator errors.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CoordinatorError {
    #[error(transparent)]
    Remote(#[from] RemoteCallError),
    #[error("unknown {0}")]
    UnknownEntity(String),
    #[error("serialization error: {0}")]
    Serialization(String),
    #[error("invalid patch: {0}")]
    InvalidPatch(String),
    #[error("write to {0} was abandoned before the gateway answered")]
    Abandoned(String),
}

/// Result type for coordinator operations.
pub type CoordinatorResult<T> = Result<T, CoordinatorError>;

/// Ordering of remote writes that target the same id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritePolicy {
    /// Each write waits for the previous write to the same id to settle.
    #[default]
    Serialized,
    /// Writes are sent immediately and may be acknowledged in any order.
    Concurrent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    #[serde(default)]
    pub write_policy: WritePolicy,
}

/// Where a record stands relative to the gateway.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum MutationState {
    /// Cache and last acknowledged value agree (or nothing was ever written).
    #[default]
    Idle,
    /// A local change is waiting for its remote write.
    LocallyApplied,
    /// The latest remote write failed; the cache keeps the local change.
    RemoteFailure(String),
}

/// How a mutation finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Deep-equal to the baseline; nothing was sent.
    Unchanged,
    /// The gateway accepted the write.
    Acknowledged,
    /// The write settled after the coordinator was disposed and was ignored.
    Discarded,
}

/// A mutation already applied locally whose remote write is in flight.
///
/// The write runs on the coordinator's executor. Dropping this only discards the outcome.
#[must_use = "dropping a pending mutation discards its outcome"]
pub struct PendingMutation {
    id: String,
    outcome: LocalBoxFuture<'static, CoordinatorResult<MutationOutcome>>,
}

impl PendingMutation {
    fn ready(id: impl Into<String>, outcome: CoordinatorResult<MutationOutcome>) -> Self {
        Self {
            id: id.into(),
            outcome: future::ready(outcome).boxed_local(),
        }
    }

    /// Id of the record being written, including ids assigned by `create`.
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl Future for PendingMutation {
    type Output = CoordinatorResult<MutationOutcome>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.outcome.as_mut().poll(cx)
    }
}

#[derive(Default)]
struct WriteTrack {
    issued: u64,
    acked: u64,
    tail: Option<(u64, oneshot::Receiver<()>)>,
}

struct Ticket {
    seq: u64,
    wait_for: Option<oneshot::Receiver<()>>,
    done: Option<oneshot::Sender<()>>,
}

enum Request {
    Put(Value),
    Delete(Value),
}

struct State<T> {
    cache: CollectionCache<T>,
    confirmed: HashMap<String, T>,
    mutations: HashMap<String, MutationState>,
    writes: HashMap<String, WriteTrack>,
    disposed: bool,
}

struct Shared<T> {
    rpc: Rc<dyn RpcClient>,
    spawner: Rc<dyn LocalSpawn>,
    config: CoordinatorConfig,
    state: RefCell<State<T>>,
}

/// Optimistic view of one entity collection.
pub struct Coordinator<T: Entity> {
    shared: Rc<Shared<T>>,
}

impl<T: Entity> Clone for Coordinator<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<T: Entity> Coordinator<T> {
    /// Remote writes are spawned on `spawner`, which must be driven for them to make progress.
    pub fn new(rpc: Rc<dyn RpcClient>, spawner: Rc<dyn LocalSpawn>, config: CoordinatorConfig) -> Self {
        Self {
            shared: Rc::new(Shared {
                rpc,
                spawner,
                config,
                state: RefCell::new(State {
                    cache: CollectionCache::new(),
                    confirmed: HashMap::new(),
                    mutations: HashMap::new(),
                    writes: HashMap::new(),
                    disposed: false,
                }),
            }),
        }
    }

    pub fn config(&self) -> CoordinatorConfig {
        self.shared.config
    }

    /// Add a new record. An empty id is replaced with a generated one.
    pub fn create(&self, mut entity: T) -> PendingMutation {
        if entity.id().is_empty() {
            entity.set_id(T::generate_id());
        }
        let now = Utc::now();
        entity.set_created_at(now);
        entity.set_updated_at(now);
        let id = entity.id().to_string();

        let payload = match serialize(&entity) {
            Ok(payload) => payload,
            Err(e) => return PendingMutation::ready(id, Err(e)),
        };

        let ticket = {
            let mut state = self.shared.state.borrow_mut();
            state.cache.upsert(entity.clone());
            self.shared.enqueue(&mut state, &id)
        };
        self.dispatch(id, ticket, Request::Put(payload), Some(entity))
    }

    /// Replace a cached record.
    ///
    /// The new value is compared with the last acknowledged value, or with the cached value
    /// while an earlier write is still in flight; equal content sends nothing.
    pub fn update(&self, mut entity: T) -> PendingMutation {
        let id = entity.id().to_string();
        let (ticket, payload) = {
            let mut state = self.shared.state.borrow_mut();
            let Some(cached) = state.cache.get(&id) else {
                return PendingMutation::ready(&id, Err(unknown::<T>(&id)));
            };
            let in_flight = state.mutations.get(&id) == Some(&MutationState::LocallyApplied);
            let baseline = if in_flight {
                Some(cached)
            } else {
                state.confirmed.get(&id)
            };
            if baseline.is_some_and(|b| same_content(&entity, b)) {
                log::debug!("{} {id}: unchanged, no write", T::KIND);
                return PendingMutation::ready(&id, Ok(MutationOutcome::Unchanged));
            }

            entity.set_created_at(cached.created_at());
            entity.set_updated_at(Utc::now());
            let payload = match serialize(&entity) {
                Ok(payload) => payload,
                Err(e) => return PendingMutation::ready(&id, Err(e)),
            };
            state.cache.upsert(entity.clone());
            (self.shared.enqueue(&mut state, &id), payload)
        };
        self.dispatch(id, ticket, Request::Put(payload), Some(entity))
    }

    /// Replace individual top-level fields of a cached record, then write it as `update` does.
    pub fn patch(&self, id: &str, fields: &Map<String, Value>) -> PendingMutation {
        let patched = {
            let state = self.shared.state.borrow();
            match state.cache.get(id) {
                Some(cached) => apply_patch(cached, fields),
                None => Err(unknown::<T>(id)),
            }
        };
        match patched {
            Ok(entity) => self.update(entity),
            Err(e) => PendingMutation::ready(id, Err(e)),
        }
    }

    /// Remove a record according to its [`DeletePolicy`].
    pub fn delete(&self, id: &str) -> PendingMutation {
        let cached = self.shared.state.borrow().cache.get(id).cloned();
        let Some(cached) = cached else {
            return PendingMutation::ready(id, Err(unknown::<T>(id)));
        };

        match T::DELETE_POLICY {
            DeletePolicy::Tombstone => {
                let mut tombstone = cached;
                tombstone.mark_deleted();
                self.update(tombstone)
            }
            DeletePolicy::Hard => {
                let ticket = {
                    let mut state = self.shared.state.borrow_mut();
                    state.cache.remove(id);
                    self.shared.enqueue(&mut state, id)
                };
                self.dispatch(id.to_string(), ticket, Request::Delete(cached.delete_payload()), None)
            }
        }
    }

    /// Fetch the full collection and replace the cache with it.
    ///
    /// Returns the number of records loaded.
    pub async fn refresh(&self) -> CoordinatorResult<usize> {
        let rpc = Rc::clone(&self.shared.rpc);
        let result = rpc.call(T::LIST_ENDPOINT, Some(json!({})), None).await?;
        let records: Vec<T> = match result {
            Some(value) => serde_json::from_value(value).map_err(|e| {
                log::error!("{}: undecodable listing: {e}", T::LIST_ENDPOINT);
                CoordinatorError::Serialization(e.to_string())
            })?,
            None => Vec::new(),
        };
        if self.is_disposed() {
            log::debug!("{}: listing arrived after dispose, ignored", T::LIST_ENDPOINT);
            return Ok(0);
        }
        Ok(self.load_snapshot(records))
    }

    /// Replace the cache and the acknowledged values with an already fetched snapshot.
    ///
    /// Records with a write still in flight keep their `LocallyApplied` state.
    pub fn load_snapshot(&self, records: impl IntoIterator<Item = T>) -> usize {
        let mut state = self.shared.state.borrow_mut();
        state.cache = CollectionCache::from_snapshot(records);
        state.confirmed = state
            .cache
            .iter()
            .map(|record| (record.id().to_string(), record.clone()))
            .collect();
        state
            .mutations
            .retain(|_, s| *s == MutationState::LocallyApplied);
        state.cache.len()
    }

    /// Mark the owning view as gone. Writes that settle afterwards leave the cache untouched.
    pub fn dispose(&self) {
        self.shared.state.borrow_mut().disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.shared.state.borrow().disposed
    }

    /// Look up a record by id. Tombstoned records are still returned.
    pub fn get(&self, id: &str) -> Option<T> {
        self.shared.state.borrow().cache.get(id).cloned()
    }

    /// Every record that is not tombstoned, in insertion order.
    pub fn list(&self) -> Vec<T> {
        self.shared.state.borrow().cache.visible().cloned().collect()
    }

    /// Every record including tombstones.
    pub fn list_all(&self) -> Vec<T> {
        self.shared.state.borrow().cache.iter().cloned().collect()
    }

    /// Last value the gateway acknowledged for `id`.
    pub fn confirmed(&self, id: &str) -> Option<T> {
        self.shared.state.borrow().confirmed.get(id).cloned()
    }

    pub fn state_of(&self, id: &str) -> MutationState {
        self.shared
            .state
            .borrow()
            .mutations
            .get(id)
            .cloned()
            .unwrap_or_default()
    }

    /// Whether any write is still waiting for the gateway.
    pub fn has_pending_writes(&self) -> bool {
        self.shared
            .state
            .borrow()
            .mutations
            .values()
            .any(|s| *s == MutationState::LocallyApplied)
    }

    fn dispatch(&self, id: String, ticket: Ticket, request: Request, sent: Option<T>) -> PendingMutation {
        let shared = Rc::clone(&self.shared);
        let write_id = id.clone();
        let seq = ticket.seq;
        let write = async move {
            let Ticket { seq, wait_for, done } = ticket;
            if let Some(previous) = wait_for {
                // Cancellation just means the previous write was dropped; go ahead.
                let _ = previous.await;
            }
            let rpc = Rc::clone(&shared.rpc);
            let result = match request {
                Request::Put(payload) => rpc.call(T::PUT_ENDPOINT, Some(payload), None).await,
                Request::Delete(payload) => rpc.call(T::DELETE_ENDPOINT, Some(payload), None).await,
            };
            let outcome = shared.settle(&write_id, seq, result, sent);
            if let Some(done) = done {
                let _ = done.send(());
            }
            outcome
        };

        let (tx, rx) = oneshot::channel();
        let spawned = self.shared.spawner.spawn_local(async move {
            let _ = tx.send(write.await);
        });
        if let Err(e) = spawned {
            log::warn!("{} {id}: could not schedule write #{seq}: {e}", T::KIND);
            self.shared.abandon(&id, seq);
            let error = abandoned::<T>(&id);
            return PendingMutation::ready(id, Err(error));
        }

        let abandoned = abandoned::<T>(&id);
        let outcome = rx.map(move |result| result.unwrap_or(Err(abandoned))).boxed_local();
        PendingMutation { id, outcome }
    }
}

impl<T: Entity> Shared<T> {
    /// Register a write for `id` and mark it locally applied.
    fn enqueue(&self, state: &mut State<T>, id: &str) -> Ticket {
        set_mutation::<T>(state, id, MutationState::LocallyApplied);
        let track = state.writes.entry(id.to_string()).or_default();
        track.issued += 1;
        let seq = track.issued;
        match self.config.write_policy {
            WritePolicy::Serialized => {
                let (done, rx) = oneshot::channel();
                let wait_for = track.tail.replace((seq, rx)).map(|(_, rx)| rx);
                Ticket {
                    seq,
                    wait_for,
                    done: Some(done),
                }
            }
            WritePolicy::Concurrent => Ticket {
                seq,
                wait_for: None,
                done: None,
            },
        }
    }

    /// Fold a remote result into the coordinator state.
    fn settle(
        &self,
        id: &str,
        seq: u64,
        result: RpcResult<Option<Value>>,
        sent: Option<T>,
    ) -> CoordinatorResult<MutationOutcome> {
        let mut state = self.state.borrow_mut();
        let (latest, newest_ack) = {
            let track = state.writes.entry(id.to_string()).or_default();
            if track.tail.as_ref().is_some_and(|(tail_seq, _)| *tail_seq == seq) {
                track.tail = None;
            }
            let latest = track.issued == seq;
            let newest_ack = result.is_ok() && seq > track.acked;
            if newest_ack {
                track.acked = seq;
            }
            (latest, newest_ack)
        };

        if state.disposed {
            log::debug!("{} {id}: write #{seq} settled after dispose, ignored", T::KIND);
            return Ok(MutationOutcome::Discarded);
        }

        match result {
            Ok(stored) => {
                if newest_ack {
                    match sent {
                        Some(sent) => {
                            let stored = stored.and_then(|value| decode_stored::<T>(id, value));
                            if latest {
                                if let Some(stored) = &stored {
                                    state.cache.upsert(stored.clone());
                                }
                            }
                            state.confirmed.insert(id.to_string(), stored.unwrap_or(sent));
                        }
                        None => {
                            state.confirmed.remove(id);
                        }
                    }
                } else {
                    log::debug!("{} {id}: stale acknowledgment for write #{seq} ignored", T::KIND);
                }
                if latest {
                    set_mutation::<T>(&mut state, id, MutationState::Idle);
                }
                Ok(MutationOutcome::Acknowledged)
            }
            Err(e) => {
                log::warn!("{} {id}: remote write #{seq} failed: {e}", T::KIND);
                if latest {
                    set_mutation::<T>(&mut state, id, MutationState::RemoteFailure(e.message.clone()));
                }
                Err(e.into())
            }
        }
    }

    /// Mark a write that never reached the gateway as failed, if it is the latest for `id`.
    fn abandon(&self, id: &str, seq: u64) {
        let mut state = self.state.borrow_mut();
        if state.writes.get(id).is_some_and(|track| track.issued == seq) {
            set_mutation::<T>(
                &mut state,
                id,
                MutationState::RemoteFailure("write was never scheduled".to_string()),
            );
        }
    }
}

fn set_mutation<T: Entity>(state: &mut State<T>, id: &str, next: MutationState) {
    let previous = state.mutations.insert(id.to_string(), next.clone()).unwrap_or_default();
    if previous != next {
        log::debug!("{} {id}: {previous:?} -> {next:?}", T::KIND);
    }
}

fn serialize<T: Entity>(entity: &T) -> CoordinatorResult<Value> {
    serde_json::to_value(entity).map_err(|e| CoordinatorError::Serialization(e.to_string()))
}

fn decode_stored<T: Entity>(id: &str, value: Value) -> Option<T> {
    match serde_json::from_value::<T>(value) {
        Ok(stored) if stored.id() == id => Some(stored),
        Ok(stored) => {
            log::error!("{} {id}: gateway returned a record for {}", T::KIND, stored.id());
            None
        }
        Err(e) => {
            log::error!("{} {id}: undecodable stored record: {e}", T::KIND);
            None
        }
    }
}

fn unknown<T: Entity>(id: &str) -> CoordinatorError {
    CoordinatorError::UnknownEntity(format!("{} {id}", T::KIND))
}

fn abandoned<T: Entity>(id: &str) -> CoordinatorError {
    CoordinatorError::Abandoned(format!("{} {id}", T::KIND))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Lesson, LessonPlan};
    use crate::remote::MemoryRpc;
    use futures::executor::LocalPool;

    type Slot = Rc<RefCell<Option<CoordinatorResult<MutationOutcome>>>>;

    fn setup<T: Entity>(policy: WritePolicy) -> (Rc<MemoryRpc>, Coordinator<T>, LocalPool) {
        let rpc = Rc::new(MemoryRpc::new());
        let pool = LocalPool::new();
        let coordinator = Coordinator::new(
            rpc.clone(),
            Rc::new(pool.spawner()),
            CoordinatorConfig {
                write_policy: policy,
            },
        );
        (rpc, coordinator, pool)
    }

    fn spawn(pool: &LocalPool, pending: PendingMutation) -> Slot {
        let slot: Slot = Rc::new(RefCell::new(None));
        let out = Rc::clone(&slot);
        pool.spawner()
            .spawn_local(async move {
                *out.borrow_mut() = Some(pending.await);
            })
            .unwrap();
        slot
    }

    fn class(id: &str, name: &str) -> Class {
        let mut class = Class::new("t@example.com", name);
        class.set_id(id.to_string());
        class
    }

    fn lesson(id: &str) -> Lesson {
        let plan = LessonPlan::new("t@example.com", "Plan");
        let mut lesson = Lesson::for_plan(&plan, &class("c1", "Class"), "T");
        lesson.set_id(id.to_string());
        lesson
    }

    #[test]
    fn test_create_applies_locally_before_remote_ack() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();

        let pending = coordinator.create(Class::new("t@example.com", "New class"));
        let id = pending.id().to_string();
        assert!(!id.is_empty());
        assert_eq!(coordinator.list().len(), 1);
        assert_eq!(coordinator.get(&id).map(|c| c.name), Some("New class".to_string()));
        assert_eq!(coordinator.state_of(&id), MutationState::LocallyApplied);

        let slot = spawn(&pool, pending);
        pool.run_until_stalled();
        let calls = rpc.calls_to("putClass");
        assert_eq!(calls.len(), 1);
        let payload = calls[0].payload.clone().unwrap();
        assert_eq!(payload["id"], json!(id));
        assert_eq!(payload["name"], json!("New class"));
        assert!(slot.borrow().is_none());

        assert!(rpc.release(0, Ok(None)));
        pool.run_until_stalled();
        assert_eq!(*slot.borrow(), Some(Ok(MutationOutcome::Acknowledged)));
        assert_eq!(coordinator.state_of(&id), MutationState::Idle);
        assert!(coordinator.confirmed(&id).is_some());
    }

    #[test]
    fn test_failed_create_is_not_rolled_back() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.push_response("putClass", Err(RemoteCallError::new("putClass", "permission denied")));

        let pending = coordinator.create(Class::new("t@example.com", "New class"));
        let id = pending.id().to_string();
        let result = pool.run_until(pending);

        assert_eq!(
            result,
            Err(CoordinatorError::Remote(RemoteCallError::new("putClass", "permission denied")))
        );
        assert!(coordinator.get(&id).is_some());
        assert_eq!(
            coordinator.state_of(&id),
            MutationState::RemoteFailure("permission denied".to_string())
        );
        assert!(coordinator.confirmed(&id).is_none());
    }

    #[test]
    fn test_unchanged_update_sends_nothing() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "Biology")]);

        let mut same = coordinator.get("c1").unwrap();
        same.updated_at = same.updated_at + chrono::Duration::seconds(5);
        assert_eq!(pool.run_until(coordinator.update(same)), Ok(MutationOutcome::Unchanged));
        assert_eq!(rpc.call_count(), 0);
    }

    #[test]
    fn test_changed_update_sends_one_write() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();
        coordinator.load_snapshot([class("c1", "Biology")]);
        let created_at = coordinator.get("c1").unwrap().created_at;

        let mut renamed = coordinator.get("c1").unwrap();
        renamed.name = "Marine Biology".to_string();
        let slot = spawn(&pool, coordinator.update(renamed));
        assert_eq!(coordinator.get("c1").unwrap().name, "Marine Biology");
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "Biology");

        pool.run_until_stalled();
        assert_eq!(rpc.call_count(), 1);
        assert!(coordinator.has_pending_writes());
        rpc.release_all();
        pool.run_until_stalled();
        assert!(!coordinator.has_pending_writes());
        assert_eq!(*slot.borrow(), Some(Ok(MutationOutcome::Acknowledged)));
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "Marine Biology");
        assert_eq!(coordinator.get("c1").unwrap().created_at, created_at);
    }

    #[test]
    fn test_revert_while_in_flight_is_still_written() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();
        coordinator.load_snapshot([class("c1", "Biology")]);

        let mut renamed = coordinator.get("c1").unwrap();
        renamed.name = "Chemistry".to_string();
        let first = spawn(&pool, coordinator.update(renamed));
        let second = spawn(&pool, coordinator.update(class("c1", "Biology")));

        pool.run_until_stalled();
        rpc.release(0, Ok(None));
        pool.run_until_stalled();
        rpc.release(1, Ok(None));
        pool.run_until_stalled();

        assert_eq!(*first.borrow(), Some(Ok(MutationOutcome::Acknowledged)));
        assert_eq!(*second.borrow(), Some(Ok(MutationOutcome::Acknowledged)));
        assert_eq!(rpc.calls_to("putClass").len(), 2);
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "Biology");
    }

    #[test]
    fn test_dropped_mutation_still_writes() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "V0")]);

        drop(coordinator.update(class("c1", "V1")));
        pool.run_until_stalled();

        let puts = rpc.calls_to("putClass");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].payload.as_ref().unwrap()["name"], json!("V1"));
        assert_eq!(coordinator.state_of("c1"), MutationState::Idle);
        assert!(!coordinator.has_pending_writes());
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "V1");

        assert_eq!(
            pool.run_until(coordinator.update(class("c1", "V1"))),
            Ok(MutationOutcome::Unchanged)
        );
        assert_eq!(rpc.call_count(), 1);
    }

    #[test]
    fn test_later_write_can_be_awaited_first() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "V0")]);

        let first = coordinator.update(class("c1", "V1"));
        let second = coordinator.update(class("c1", "V2"));
        assert_eq!(pool.run_until(second), Ok(MutationOutcome::Acknowledged));

        let names: Vec<_> = rpc
            .calls_to("putClass")
            .iter()
            .map(|c| c.payload.as_ref().unwrap()["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("V1"), json!("V2")]);
        assert_eq!(pool.run_until(first), Ok(MutationOutcome::Acknowledged));
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "V2");
    }

    #[test]
    fn test_write_without_executor_is_reported() {
        let (rpc, coordinator, pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "V0")]);
        drop(pool);

        let result = futures::executor::block_on(coordinator.update(class("c1", "V1")));
        assert_eq!(result, Err(CoordinatorError::Abandoned("class c1".to_string())));
        assert_eq!(coordinator.get("c1").unwrap().name, "V1");
        assert!(matches!(coordinator.state_of("c1"), MutationState::RemoteFailure(_)));
        assert_eq!(rpc.call_count(), 0);
    }

    #[test]
    fn test_unknown_ids_are_rejected() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        let update = pool.run_until(coordinator.update(class("nope", "X")));
        assert_eq!(update, Err(CoordinatorError::UnknownEntity("class nope".to_string())));
        assert!(matches!(
            pool.run_until(coordinator.delete("nope")),
            Err(CoordinatorError::UnknownEntity(_))
        ));
        let fields = Map::new();
        assert!(matches!(
            pool.run_until(coordinator.patch("nope", &fields)),
            Err(CoordinatorError::UnknownEntity(_))
        ));
        assert_eq!(rpc.call_count(), 0);
    }

    #[test]
    fn test_patch_updates_single_field() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "Biology")]);

        let mut fields = Map::new();
        fields.insert("name".to_string(), json!("Ecology"));
        assert_eq!(pool.run_until(coordinator.patch("c1", &fields)), Ok(MutationOutcome::Acknowledged));
        assert_eq!(coordinator.get("c1").unwrap().name, "Ecology");
        assert_eq!(rpc.calls_to("putClass")[0].payload.as_ref().unwrap()["name"], json!("Ecology"));

        fields.insert("id".to_string(), json!("c2"));
        assert!(matches!(
            pool.run_until(coordinator.patch("c1", &fields)),
            Err(CoordinatorError::InvalidPatch(_))
        ));
    }

    #[test]
    fn test_hard_delete() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "Biology"), class("c2", "Physics")]);

        assert_eq!(pool.run_until(coordinator.delete("c1")), Ok(MutationOutcome::Acknowledged));
        assert!(coordinator.get("c1").is_none());
        assert!(coordinator.confirmed("c1").is_none());
        assert_eq!(coordinator.list().len(), 1);
        let calls = rpc.calls_to("deleteClass");
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].payload, Some(json!({ "id": "c1" })));
    }

    #[test]
    fn test_tombstone_delete_hides_but_resolves() {
        let (rpc, coordinator, mut pool) = setup::<Lesson>(WritePolicy::Serialized);
        coordinator.load_snapshot([lesson("ABC123"), lesson("XYZ789")]);

        assert_eq!(pool.run_until(coordinator.delete("ABC123")), Ok(MutationOutcome::Acknowledged));
        let visible: Vec<_> = coordinator.list().into_iter().map(|l| l.id).collect();
        assert_eq!(visible, vec!["XYZ789".to_string()]);
        assert!(coordinator.get("ABC123").is_some_and(|l| l.deleted));
        assert_eq!(coordinator.list_all().len(), 2);

        assert!(rpc.calls_to("deleteLesson").is_empty());
        let puts = rpc.calls_to("putLesson");
        assert_eq!(puts.len(), 1);
        assert_eq!(puts[0].payload.as_ref().unwrap()["deleted"], json!(true));

        assert_eq!(pool.run_until(coordinator.delete("ABC123")), Ok(MutationOutcome::Unchanged));
    }

    #[test]
    fn test_serialized_writes_reach_gateway_in_order() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();
        coordinator.load_snapshot([class("c1", "V0")]);

        let v1 = spawn(&pool, coordinator.update(class("c1", "V1")));
        let v2 = spawn(&pool, coordinator.update(class("c1", "V2")));
        assert_eq!(coordinator.get("c1").unwrap().name, "V2");

        pool.run_until_stalled();
        assert_eq!(rpc.pending(), vec![0]);
        rpc.release(0, Ok(None));
        pool.run_until_stalled();
        assert_eq!(rpc.pending(), vec![1]);
        assert_eq!(coordinator.state_of("c1"), MutationState::LocallyApplied);
        rpc.release(1, Ok(None));
        pool.run_until_stalled();

        let names: Vec<_> = rpc
            .calls_to("putClass")
            .iter()
            .map(|c| c.payload.as_ref().unwrap()["name"].clone())
            .collect();
        assert_eq!(names, vec![json!("V1"), json!("V2")]);
        assert!(v1.borrow().is_some() && v2.borrow().is_some());
        assert_eq!(coordinator.get("c1").unwrap().name, "V2");
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "V2");
        assert_eq!(coordinator.state_of("c1"), MutationState::Idle);
    }

    #[test]
    fn test_serialized_chain_continues_after_failure() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();
        coordinator.load_snapshot([class("c1", "V0")]);

        let v1 = spawn(&pool, coordinator.update(class("c1", "V1")));
        let v2 = spawn(&pool, coordinator.update(class("c1", "V2")));
        pool.run_until_stalled();
        rpc.release(0, Err(RemoteCallError::new("putClass", "timeout")));
        pool.run_until_stalled();
        rpc.release(1, Ok(None));
        pool.run_until_stalled();

        assert!(matches!(*v1.borrow(), Some(Err(CoordinatorError::Remote(_)))));
        assert_eq!(*v2.borrow(), Some(Ok(MutationOutcome::Acknowledged)));
        assert_eq!(coordinator.state_of("c1"), MutationState::Idle);
    }

    #[test]
    fn test_concurrent_acks_in_either_order_keep_latest() {
        for reversed in [false, true] {
            let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Concurrent);
            rpc.hold_responses();
            coordinator.load_snapshot([class("c1", "V0")]);

            let _v1 = spawn(&pool, coordinator.update(class("c1", "V1")));
            let _v2 = spawn(&pool, coordinator.update(class("c1", "V2")));
            pool.run_until_stalled();
            assert_eq!(rpc.pending(), vec![0, 1]);

            let order = if reversed { [1, 0] } else { [0, 1] };
            for index in order {
                rpc.release(index, Ok(None));
                pool.run_until_stalled();
            }

            assert_eq!(coordinator.get("c1").unwrap().name, "V2");
            assert_eq!(coordinator.confirmed("c1").unwrap().name, "V2");
            assert_eq!(coordinator.state_of("c1"), MutationState::Idle);
        }
    }

    #[test]
    fn test_stored_record_from_gateway_wins() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("c1", "Biology")]);
        let mut stored = class("c1", "Biology (normalized)");
        stored.teacher_email = "t@example.com".to_string();
        rpc.push_response("putClass", Ok(Some(serde_json::to_value(&stored).unwrap())));

        pool.run_until(coordinator.update(class("c1", "biology"))).unwrap();
        assert_eq!(coordinator.get("c1").unwrap().name, "Biology (normalized)");
        assert_eq!(coordinator.confirmed("c1").unwrap().name, "Biology (normalized)");
    }

    #[test]
    fn test_results_after_dispose_are_ignored() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        rpc.hold_responses();

        let pending = coordinator.create(Class::new("t@example.com", "New class"));
        let id = pending.id().to_string();
        let slot = spawn(&pool, pending);
        pool.run_until_stalled();

        coordinator.dispose();
        rpc.release(0, Err(RemoteCallError::new("putClass", "late failure")));
        pool.run_until_stalled();

        assert_eq!(*slot.borrow(), Some(Ok(MutationOutcome::Discarded)));
        assert_eq!(coordinator.state_of(&id), MutationState::LocallyApplied);
    }

    #[test]
    fn test_refresh_replaces_cache() {
        let (rpc, coordinator, mut pool) = setup::<Class>(WritePolicy::Serialized);
        coordinator.load_snapshot([class("stale", "Old")]);
        let listing = json!([
            serde_json::to_value(class("c1", "Biology")).unwrap(),
            serde_json::to_value(class("c2", "Physics")).unwrap(),
        ]);
        rpc.push_response("getClasses", Ok(Some(listing)));

        assert_eq!(pool.run_until(coordinator.refresh()), Ok(2));
        assert!(coordinator.get("stale").is_none());
        assert_eq!(coordinator.confirmed("c2").unwrap().name, "Physics");
        assert_eq!(rpc.calls_to("getClasses")[0].payload, Some(json!({})));

        rpc.push_response("getClasses", Ok(Some(json!({ "unexpected": true }))));
        assert!(matches!(
            pool.run_until(coordinator.refresh()),
            Err(CoordinatorError::Serialization(_))
        ));
        assert_eq!(coordinator.list().len(), 2);
    }
}
