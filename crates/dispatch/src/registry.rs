//! Ordered, typed handler registry
//!
//! Maps each [`UpdateKind`] to an ordered sequence of registrations. The
//! table is swapped atomically on every mutation (copy-on-write via
//! `arc-swap`), so a dispatch already holding a snapshot is never affected
//! by concurrent registration and readers never block writers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwap;
use domain::{Filter, UpdateKind};
use parking_lot::Mutex;

use crate::handler::Handler;

/// Opaque handle returned by registration, usable for [`HandlerRegistry::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

/// One registered callback: kind, filter, priority and propagation flag.
///
/// Registrations for the same kind are totally ordered by
/// `(priority, insertion order)`; lower priority runs first.
pub struct Registration<C> {
    kind: UpdateKind,
    filter: Filter,
    priority: i32,
    continue_propagation: bool,
    handler: Arc<dyn Handler<C>>,
    seq: u64,
}

impl<C> Registration<C> {
    pub fn id(&self) -> HandlerId {
        HandlerId(self.seq)
    }

    pub fn kind(&self) -> UpdateKind {
        self.kind
    }

    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// `false` means a match stops propagation to later registrations.
    pub fn continue_propagation(&self) -> bool {
        self.continue_propagation
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub(crate) fn handler(&self) -> &Arc<dyn Handler<C>> {
        &self.handler
    }
}

impl<C> std::fmt::Debug for Registration<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registration")
            .field("kind", &self.kind)
            .field("name", &self.handler.name())
            .field("priority", &self.priority)
            .field("continue_propagation", &self.continue_propagation)
            .field("seq", &self.seq)
            .finish()
    }
}

type KindTable<C> = HashMap<UpdateKind, Arc<Vec<Arc<Registration<C>>>>>;

/// Process-wide mapping from update kind to ordered registrations.
///
/// Populated at startup, read-only on the dispatch path, and safe to
/// extend at runtime: mutations build a new table and swap it in whole.
pub struct HandlerRegistry<C> {
    table: ArcSwap<KindTable<C>>,
    /// Serializes mutations; readers go through `table` and never take it.
    writer: Mutex<()>,
    next_seq: AtomicU64,
}

impl<C> Default for HandlerRegistry<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C> HandlerRegistry<C> {
    pub fn new() -> Self {
        Self {
            table: ArcSwap::from_pointee(HashMap::new()),
            writer: Mutex::new(()),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Register a handler; matching updates keep propagating afterwards.
    pub fn register<H>(
        &self,
        kind: UpdateKind,
        filter: Filter,
        priority: i32,
        handler: H,
    ) -> HandlerId
    where
        H: Handler<C> + 'static,
    {
        self.insert(kind, filter, priority, true, Arc::new(handler))
    }

    /// Register a handler whose match stops propagation to later
    /// registrations for the same update ("first handler wins").
    pub fn register_blocking<H>(
        &self,
        kind: UpdateKind,
        filter: Filter,
        priority: i32,
        handler: H,
    ) -> HandlerId
    where
        H: Handler<C> + 'static,
    {
        self.insert(kind, filter, priority, false, Arc::new(handler))
    }

    /// Register an already-shared handler with explicit propagation.
    pub fn register_arc(
        &self,
        kind: UpdateKind,
        filter: Filter,
        priority: i32,
        continue_propagation: bool,
        handler: Arc<dyn Handler<C>>,
    ) -> HandlerId {
        self.insert(kind, filter, priority, continue_propagation, handler)
    }

    fn insert(
        &self,
        kind: UpdateKind,
        filter: Filter,
        priority: i32,
        continue_propagation: bool,
        handler: Arc<dyn Handler<C>>,
    ) -> HandlerId {
        let _guard = self.writer.lock();
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        let registration = Arc::new(Registration {
            kind,
            filter,
            priority,
            continue_propagation,
            handler,
            seq,
        });

        let mut table: KindTable<C> = (**self.table.load()).clone();
        let mut registrations: Vec<Arc<Registration<C>>> = table
            .get(&kind)
            .map(|existing| existing.as_ref().clone())
            .unwrap_or_default();
        registrations.push(Arc::clone(&registration));
        // seq is unique, so this ordering is total and stable across snapshots
        registrations.sort_by_key(|r| (r.priority, r.seq));
        table.insert(kind, Arc::new(registrations));
        self.table.store(Arc::new(table));

        HandlerId(seq)
    }

    /// Remove a registration by handle. Returns whether it was present.
    pub fn unregister(&self, id: HandlerId) -> bool {
        let _guard = self.writer.lock();
        let current = self.table.load();
        let Some((kind, registrations)) = current
            .iter()
            .find(|(_, regs)| regs.iter().any(|r| r.seq == id.0))
        else {
            return false;
        };

        let remaining: Vec<Arc<Registration<C>>> = registrations
            .iter()
            .filter(|r| r.seq != id.0)
            .cloned()
            .collect();

        let mut table: KindTable<C> = (**current).clone();
        if remaining.is_empty() {
            table.remove(kind);
        } else {
            table.insert(*kind, Arc::new(remaining));
        }
        self.table.store(Arc::new(table));
        true
    }

    /// Immutable ordered view of the registrations for `kind`.
    ///
    /// The returned snapshot is unaffected by registrations or removals
    /// performed after this call.
    pub fn snapshot(&self, kind: UpdateKind) -> Arc<Vec<Arc<Registration<C>>>> {
        self.table
            .load()
            .get(&kind)
            .map_or_else(|| Arc::new(Vec::new()), Arc::clone)
    }

    /// Total number of registrations across all kinds.
    pub fn len(&self) -> usize {
        self.table.load().values().map(|regs| regs.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<C> std::fmt::Debug for HandlerRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("registrations", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::handler_fn;

    struct NullClient;

    fn noop() -> impl Handler<NullClient> + 'static {
        handler_fn("noop", |_client: Arc<NullClient>, _update| async { Ok(()) })
    }

    #[test]
    fn snapshot_of_empty_registry_is_empty() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        assert!(registry.snapshot(UpdateKind::Message).is_empty());
        assert!(registry.is_empty());
    }

    #[test]
    fn registrations_sorted_by_priority_then_insertion() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        let a = registry.register(UpdateKind::Message, Filter::any(), 5, noop());
        let b = registry.register(UpdateKind::Message, Filter::any(), 1, noop());
        let c = registry.register(UpdateKind::Message, Filter::any(), 5, noop());

        let snapshot = registry.snapshot(UpdateKind::Message);
        let order: Vec<HandlerId> = snapshot.iter().map(|r| r.id()).collect();
        assert_eq!(order, vec![b, a, c]);
    }

    #[test]
    fn kinds_are_isolated() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        registry.register(UpdateKind::Message, Filter::any(), 0, noop());
        registry.register(UpdateKind::MessageStatus, Filter::any(), 0, noop());

        assert_eq!(registry.snapshot(UpdateKind::Message).len(), 1);
        assert_eq!(registry.snapshot(UpdateKind::MessageStatus).len(), 1);
        assert!(registry.snapshot(UpdateKind::ChatOpened).is_empty());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn duplicate_registrations_are_kept() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        let handler: Arc<dyn Handler<NullClient>> = Arc::new(noop());
        registry.register_arc(
            UpdateKind::Message,
            Filter::any(),
            0,
            true,
            Arc::clone(&handler),
        );
        registry.register_arc(UpdateKind::Message, Filter::any(), 0, true, handler);
        assert_eq!(registry.snapshot(UpdateKind::Message).len(), 2);
    }

    #[test]
    fn unregister_removes_only_the_handle() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        let keep = registry.register(UpdateKind::Message, Filter::any(), 0, noop());
        let drop = registry.register(UpdateKind::Message, Filter::any(), 1, noop());

        assert!(registry.unregister(drop));
        let snapshot = registry.snapshot(UpdateKind::Message);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].id(), keep);

        // Unknown handle is a no-op
        assert!(!registry.unregister(drop));
    }

    #[test]
    fn snapshot_is_unaffected_by_later_registration() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        registry.register(UpdateKind::Message, Filter::any(), 0, noop());

        let snapshot = registry.snapshot(UpdateKind::Message);
        registry.register(UpdateKind::Message, Filter::any(), 0, noop());

        assert_eq!(snapshot.len(), 1);
        assert_eq!(registry.snapshot(UpdateKind::Message).len(), 2);
    }

    #[test]
    fn blocking_registration_flag() {
        let registry: HandlerRegistry<NullClient> = HandlerRegistry::new();
        registry.register_blocking(UpdateKind::Message, Filter::any(), 0, noop());
        let snapshot = registry.snapshot(UpdateKind::Message);
        assert!(!snapshot[0].continue_propagation());
    }
}
