//! Client-side replica of the server-owned world.
//!
//! The store is the only place entities are mutated. A snapshot replaces the
//! whole map; an event batch is folded in delivery order through
//! [`apply_event`]. Everything else reads through `&WorldStateStore`.

use std::collections::{HashMap, HashSet};

use gridtalk_domain::{EntityConversation, EntityId, EntityKind, GridPos, WorldEntity};
use gridtalk_shared::{EntityRecord, Lenient, MapDimensions, ServerMessage, WorldEvent};
use tokio::sync::watch;

/// What happened to one incremental event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    Applied,
    /// Names an entity we don't know; ignored.
    UnknownEntity,
    /// Not an entity mutation (conversation lifecycle, unknown type).
    NotEntityEvent,
}

/// Tally for one applied message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub applied: usize,
    pub ignored: usize,
    pub malformed: usize,
}

/// Fold one event into the entity map.
pub fn apply_event(entities: &mut HashMap<EntityId, WorldEntity>, event: &WorldEvent) -> EventOutcome {
    match event {
        WorldEvent::EntityJoined { entity } => {
            let entity = entity.clone().into_entity();
            entities.insert(entity.id.clone(), entity);
            EventOutcome::Applied
        }
        WorldEvent::EntityLeft { entity_id } => match entities.remove(entity_id) {
            Some(_) => EventOutcome::Applied,
            None => EventOutcome::UnknownEntity,
        },
        WorldEvent::EntityMoved {
            entity_id,
            x,
            y,
            facing,
        } => with_entity(entities, entity_id, |entity| {
            entity.position = GridPos::new(*x, *y);
            if let Some(facing) = facing {
                entity.facing = *facing;
            }
        }),
        WorldEvent::EntityTurned { entity_id, facing } => {
            with_entity(entities, entity_id, |entity| entity.facing = *facing)
        }
        WorldEvent::EntityStateChanged {
            entity_id,
            conversation_state,
            conversation_target_id,
            conversation_partner_id,
        } => with_entity(entities, entity_id, |entity| {
            let current = entity.conversation.state;
            if !current.can_transition_to(*conversation_state) {
                // Server state is authoritative; record the oddity and follow it.
                tracing::warn!(
                    entity_id = %entity_id,
                    from = %current,
                    to = %conversation_state,
                    "Unexpected conversation transition"
                );
            }
            entity.conversation = if conversation_state.is_idle() {
                EntityConversation::idle()
            } else {
                EntityConversation {
                    state: *conversation_state,
                    partner_id: conversation_partner_id.clone(),
                    target_id: conversation_target_id.clone(),
                }
            };
        }),
        WorldEvent::EntityStatsUpdated { entity_id, stats } => {
            with_entity(entities, entity_id, |entity| {
                entity.vitals.get_or_insert_with(Default::default).apply(stats);
            })
        }
        WorldEvent::ConversationRequested { .. }
        | WorldEvent::ConversationAccepted { .. }
        | WorldEvent::ConversationRejected { .. }
        | WorldEvent::ConversationStarted { .. }
        | WorldEvent::ConversationEnded { .. }
        | WorldEvent::Unknown => EventOutcome::NotEntityEvent,
    }
}

fn with_entity(
    entities: &mut HashMap<EntityId, WorldEntity>,
    id: &EntityId,
    f: impl FnOnce(&mut WorldEntity),
) -> EventOutcome {
    match entities.get_mut(id) {
        Some(entity) => {
            f(entity);
            EventOutcome::Applied
        }
        None => EventOutcome::UnknownEntity,
    }
}

pub struct WorldStateStore {
    entities: HashMap<EntityId, WorldEntity>,
    map: Option<MapDimensions>,
    revision: u64,
    changes: watch::Sender<u64>,
}

impl Default for WorldStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorldStateStore {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            entities: HashMap::new(),
            map: None,
            revision: 0,
            changes,
        }
    }

    /// Receives the new revision after every change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Apply a SNAPSHOT or EVENTS message; `None` for anything else.
    pub fn apply(&mut self, message: &ServerMessage) -> Option<ApplyReport> {
        match message {
            ServerMessage::Snapshot { map, entities } => Some(self.replace(*map, entities)),
            ServerMessage::Events { events } => Some(self.apply_events(events)),
            _ => None,
        }
    }

    /// Discard every entity and install the snapshot's set.
    pub fn replace(
        &mut self,
        map: MapDimensions,
        records: &[Lenient<EntityRecord>],
    ) -> ApplyReport {
        let mut report = ApplyReport::default();
        let mut entities = HashMap::with_capacity(records.len());

        for record in records {
            match record {
                Lenient::Parsed(record) => {
                    let entity = record.clone().into_entity();
                    entities.insert(entity.id.clone(), entity);
                    report.applied += 1;
                }
                Lenient::Malformed { error, .. } => {
                    tracing::warn!(%error, "Skipping malformed snapshot entity");
                    report.malformed += 1;
                }
            }
        }

        self.entities = entities;
        self.map = Some(map);
        tracing::debug!(
            entities = self.entities.len(),
            width = map.width,
            height = map.height,
            "Applied snapshot"
        );
        self.bump();
        report
    }

    /// Fold a batch in delivery order. Bad entries are skipped individually.
    pub fn apply_events(&mut self, events: &[Lenient<WorldEvent>]) -> ApplyReport {
        let mut report = ApplyReport::default();

        for event in events {
            match event {
                Lenient::Parsed(event) => match apply_event(&mut self.entities, event) {
                    EventOutcome::Applied => report.applied += 1,
                    EventOutcome::UnknownEntity => {
                        tracing::trace!(event = event.kind(), "Event for unknown entity");
                        report.ignored += 1;
                    }
                    EventOutcome::NotEntityEvent => report.ignored += 1,
                },
                Lenient::Malformed { error, .. } => {
                    tracing::warn!(%error, "Skipping malformed event");
                    report.malformed += 1;
                }
            }
        }

        if report.applied > 0 {
            self.bump();
        }
        report
    }

    fn bump(&mut self) {
        self.revision += 1;
        self.changes.send_replace(self.revision);
    }

    pub fn get(&self, id: &EntityId) -> Option<&WorldEntity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &EntityId) -> bool {
        self.entities.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &WorldEntity> {
        self.entities.values()
    }

    pub fn map(&self) -> Option<MapDimensions> {
        self.map
    }

    /// Entities within `radius` of `center` (Euclidean), nearest first.
    pub fn within_radius(&self, center: GridPos, radius: f64) -> Vec<&WorldEntity> {
        let mut found: Vec<(f64, &WorldEntity)> = self
            .entities
            .values()
            .map(|e| (center.distance_to(e.position), e))
            .filter(|(d, _)| *d <= radius)
            .collect();
        found.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));
        found.into_iter().map(|(_, e)| e).collect()
    }

    /// Cells held by entities other than `except`; the dynamic obstacle set.
    pub fn occupied_cells(&self, except: Option<&EntityId>) -> HashSet<GridPos> {
        self.entities
            .values()
            .filter(|e| Some(&e.id) != except)
            .map(|e| e.position)
            .collect()
    }

    pub fn wall_cells(&self) -> impl Iterator<Item = GridPos> + '_ {
        self.entities
            .values()
            .filter(|e| e.kind == EntityKind::Wall)
            .map(|e| e.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridtalk_domain::{ConversationState, Facing, VitalsPatch};

    fn id(s: &str) -> EntityId {
        EntityId::new(s)
    }

    fn dims() -> MapDimensions {
        MapDimensions {
            width: 20,
            height: 20,
        }
    }

    fn snapshot(records: Vec<EntityRecord>) -> ServerMessage {
        ServerMessage::Snapshot {
            map: dims(),
            entities: records.into_iter().map(Lenient::Parsed).collect(),
        }
    }

    fn events(events: Vec<WorldEvent>) -> ServerMessage {
        ServerMessage::Events {
            events: events.into_iter().map(Lenient::Parsed).collect(),
        }
    }

    #[test]
    fn snapshot_then_move() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![
            EntityRecord::new("a", 1, 1),
            EntityRecord::new("b", 2, 2),
        ]));
        store.apply(&events(vec![WorldEvent::EntityMoved {
            entity_id: id("a"),
            x: 2,
            y: 1,
            facing: None,
        }]));

        assert_eq!(store.get(&id("a")).map(|e| e.position), Some(GridPos::new(2, 1)));
        assert_eq!(store.get(&id("b")).map(|e| e.position), Some(GridPos::new(2, 2)));
    }

    #[test]
    fn snapshot_replaces_wholesale() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![
            EntityRecord::new("a", 1, 1),
            EntityRecord::new("b", 2, 2),
        ]));
        store.apply(&events(vec![WorldEvent::EntityJoined {
            entity: EntityRecord::new("c", 3, 3),
        }]));
        store.apply(&snapshot(vec![EntityRecord::new("b", 5, 5)]));

        assert_eq!(store.len(), 1);
        assert!(!store.contains(&id("a")));
        assert!(!store.contains(&id("c")));
        assert_eq!(store.get(&id("b")).map(|e| e.position), Some(GridPos::new(5, 5)));
    }

    #[test]
    fn unknown_entity_is_silent_noop() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![EntityRecord::new("a", 1, 1)]));
        let before = store.revision();

        let report = store.apply(&events(vec![
            WorldEvent::EntityMoved {
                entity_id: id("ghost"),
                x: 9,
                y: 9,
                facing: None,
            },
            WorldEvent::EntityLeft {
                entity_id: id("ghost"),
            },
        ]));

        assert_eq!(
            report,
            Some(ApplyReport {
                applied: 0,
                ignored: 2,
                malformed: 0
            })
        );
        assert_eq!(store.revision(), before);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn events_apply_in_delivery_order() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![EntityRecord::new("a", 0, 0)]));
        store.apply(&events(vec![
            WorldEvent::EntityMoved {
                entity_id: id("a"),
                x: 1,
                y: 0,
                facing: Some(Facing::Right),
            },
            WorldEvent::EntityLeft {
                entity_id: id("a"),
            },
            WorldEvent::EntityJoined {
                entity: EntityRecord::new("a", 7, 7),
            },
            WorldEvent::EntityTurned {
                entity_id: id("a"),
                facing: Facing::Up,
            },
        ]));

        let a = store.get(&id("a")).expect("rejoined");
        assert_eq!(a.position, GridPos::new(7, 7));
        assert_eq!(a.facing, Facing::Up);
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let raw = r#"{"type":"EVENTS","events":[
            {"type":"ENTITY_MOVED","entityId":"a"},
            {"type":"ENTITY_MOVED","entityId":"a","x":4,"y":4}
        ]}"#;
        let message = gridtalk_shared::parse_server_message(raw).expect("frame");

        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![EntityRecord::new("a", 0, 0)]));
        let report = store.apply(&message).expect("report");

        assert_eq!(report.malformed, 1);
        assert_eq!(report.applied, 1);
        assert_eq!(store.get(&id("a")).map(|e| e.position), Some(GridPos::new(4, 4)));
    }

    #[test]
    fn state_change_is_authoritative() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![EntityRecord::new("a", 0, 0).with_conversation(
            ConversationState::InConversation,
            Some(id("b")),
            None,
        )]));

        // Not a legal edge, but the server said so.
        store.apply(&events(vec![WorldEvent::EntityStateChanged {
            entity_id: id("a"),
            conversation_state: ConversationState::PendingRequest,
            conversation_target_id: Some(id("c")),
            conversation_partner_id: None,
        }]));
        let a = store.get(&id("a")).expect("a");
        assert_eq!(a.conversation.state, ConversationState::PendingRequest);
        assert_eq!(a.conversation.target_id, Some(id("c")));

        store.apply(&events(vec![WorldEvent::EntityStateChanged {
            entity_id: id("a"),
            conversation_state: ConversationState::Idle,
            conversation_target_id: Some(id("c")),
            conversation_partner_id: None,
        }]));
        assert_eq!(
            store.get(&id("a")).map(|e| e.conversation.clone()),
            Some(EntityConversation::idle())
        );
    }

    #[test]
    fn stats_patch_fills_defaults() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![EntityRecord::new("r", 0, 0)]));
        store.apply(&events(vec![WorldEvent::EntityStatsUpdated {
            entity_id: id("r"),
            stats: VitalsPatch {
                hunger: Some(0.9),
                ..Default::default()
            },
        }]));

        let vitals = store.get(&id("r")).and_then(|e| e.vitals).expect("vitals");
        assert_eq!(vitals.hunger, 0.9);
        assert_eq!(vitals.energy, 0.8);
    }

    #[test]
    fn radius_query_sorted_by_distance() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![
            EntityRecord::new("far", 10, 0),
            EntityRecord::new("near", 1, 0),
            EntityRecord::new("mid", 3, 4),
        ]));

        let ids: Vec<&str> = store
            .within_radius(GridPos::new(0, 0), 5.0)
            .into_iter()
            .map(|e| e.id.as_str())
            .collect();
        assert_eq!(ids, vec!["near", "mid"]);
    }

    #[test]
    fn occupied_cells_exclude_self() {
        let mut store = WorldStateStore::new();
        store.apply(&snapshot(vec![
            EntityRecord::new("me", 0, 0),
            EntityRecord::new("wall", 1, 0).with_kind(EntityKind::Wall),
        ]));

        let cells = store.occupied_cells(Some(&id("me")));
        assert_eq!(cells, HashSet::from([GridPos::new(1, 0)]));
        assert_eq!(store.wall_cells().collect::<Vec<_>>(), vec![GridPos::new(1, 0)]);
    }

    #[tokio::test]
    async fn subscribers_see_revisions() {
        let mut store = WorldStateStore::new();
        let mut rx = store.subscribe();

        store.apply(&snapshot(vec![EntityRecord::new("a", 0, 0)]));
        rx.changed().await.expect("sender alive");
        assert_eq!(*rx.borrow_and_update(), 1);
    }
}
