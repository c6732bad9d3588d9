//! Per-player kills, deaths and score.
//!
//! Rows keep registration order, which is the table order used for win
//! checks and tie-breaks. Rows outlive disconnects (flagged, not removed) so
//! end-of-match results still list everyone who played; disconnected rows
//! cannot win and are purged on restart.

use shared::{EntityId, Replicated, ScoreEntry, ServerEvent};

#[derive(Debug)]
struct Row {
    entity: EntityId,
    entry: Replicated<ScoreEntry>,
}

#[derive(Debug, Default)]
pub struct Scoreboard {
    rows: Vec<Row>,
    removed: Vec<EntityId>,
}

impl Scoreboard {
    pub fn new() -> Self {
        Self::default()
    }

    fn row_mut(&mut self, entity: EntityId) -> Option<&mut Row> {
        self.rows.iter_mut().find(|row| row.entity == entity)
    }

    pub fn get(&self, entity: EntityId) -> Option<&ScoreEntry> {
        self.rows
            .iter()
            .find(|row| row.entity == entity)
            .map(|row| row.entry.get())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Adds a row, or reconnects an existing one keeping its stats.
    pub fn register_player(&mut self, entity: EntityId, display_name: &str) {
        if let Some(row) = self.row_mut(entity) {
            row.entry.modify(|e| {
                e.connected = true;
                e.display_name = display_name.to_string();
            });
            return;
        }

        let mut entry = Replicated::new(ScoreEntry {
            display_name: display_name.to_string(),
            connected: true,
            ..ScoreEntry::default()
        });
        entry.mark_dirty();
        self.rows.push(Row { entity, entry });
    }

    pub fn unregister_player(&mut self, entity: EntityId) {
        if let Some(row) = self.row_mut(entity) {
            row.entry.modify(|e| e.connected = false);
        }
    }

    /// Credits a kill. Either side missing from the table is skipped.
    pub fn add_kill(&mut self, killer: EntityId, victim: EntityId) {
        if let Some(row) = self.row_mut(killer) {
            row.entry.modify(|e| {
                e.kills += 1;
                e.score += 1;
            });
        }
        self.add_death(victim);
    }

    pub fn add_score(&mut self, entity: EntityId, points: i32) {
        if let Some(row) = self.row_mut(entity) {
            row.entry.modify(|e| e.score += points);
        }
    }

    pub fn add_death(&mut self, entity: EntityId) {
        if let Some(row) = self.row_mut(entity) {
            row.entry.modify(|e| e.deaths += 1);
        }
    }

    /// First connected row in table order whose score reached `threshold`.
    pub fn first_reaching(&self, threshold: i32) -> Option<EntityId> {
        self.rows
            .iter()
            .find(|row| row.entry.get().connected && row.entry.get().score >= threshold)
            .map(|row| row.entity)
    }

    /// Highest-scoring connected row; ties go to the earlier row.
    pub fn leader(&self) -> Option<EntityId> {
        let mut best: Option<&Row> = None;
        for row in self.rows.iter().filter(|row| row.entry.get().connected) {
            match best {
                Some(current) if current.entry.get().score >= row.entry.get().score => {}
                _ => best = Some(row),
            }
        }
        best.map(|row| row.entity)
    }

    pub fn display_name(&self, entity: EntityId) -> Option<String> {
        self.get(entity).map(|e| e.display_name.clone())
    }

    /// Zeroes every stat and drops rows whose player has left.
    pub fn reset_for_restart(&mut self) {
        let (kept, gone): (Vec<Row>, Vec<Row>) =
            std::mem::take(&mut self.rows).into_iter().partition(|row| row.entry.get().connected);
        self.removed.extend(gone.into_iter().map(|row| row.entity));
        self.rows = kept;

        for row in &mut self.rows {
            row.entry.modify(|e| {
                e.kills = 0;
                e.deaths = 0;
                e.score = 0;
            });
        }
    }

    /// Change notifications for every row touched since the last call.
    pub fn drain_changes(&mut self, events: &mut Vec<ServerEvent>) {
        for entity in self.removed.drain(..) {
            events.push(ServerEvent::ScoreboardChanged { entity, entry: None });
        }
        for row in &mut self.rows {
            if let Some(entry) = row.entry.take_dirty() {
                events.push(ServerEvent::ScoreboardChanged {
                    entity: row.entity,
                    entry: Some(entry),
                });
            }
        }
    }

    pub fn entries(&self) -> Vec<(EntityId, ScoreEntry)> {
        self.rows
            .iter()
            .map(|row| (row.entity, row.entry.get().clone()))
            .collect()
    }

    /// Every row, for a participant that just joined.
    pub fn full_state(&self) -> Vec<ServerEvent> {
        self.rows
            .iter()
            .map(|row| ServerEvent::ScoreboardChanged {
                entity: row.entity,
                entry: Some(row.entry.get().clone()),
            })
            .collect()
    }
}
