//! The presence store: every live player, the team ownership index, and
//! move rate-limit bookkeeping.
//!
//! # Concurrency note
//!
//! `PresenceStore` is a plain struct with `&mut self` methods and no
//! internal locking. The server wraps it in a single `Mutex`, which is the
//! serialization point for every operation. The three maps below must
//! change together (a join touches the player table and the team index in
//! one step), so they are never locked separately.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

use plaza_protocol::{PlayerView, Team};
use plaza_transport::ConnectionId;

use crate::{JoinInput, Player, Position, PresenceConfig, ValidationError};

/// A connection removed to make room for a newer holder of its team.
#[derive(Debug, Clone, PartialEq)]
pub struct Eviction {
    /// The connection that lost its team. Its transport should be told
    /// and then closed.
    pub connection: ConnectionId,

    /// Its player record, if it had one. `None` would mean the team index
    /// pointed at a connection with no player, which the store never
    /// produces, but callers treat it as "nothing to announce".
    pub player: Option<Player>,
}

/// Result of [`PresenceStore::join_with_eviction`].
#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    /// The newly joined player as others will see it.
    pub player: PlayerView,

    /// The previous holder of the team, if a different connection held it.
    pub evicted: Option<Eviction>,

    /// Everyone else present right after the join, for the joiner's
    /// initial snapshot.
    pub others: Vec<PlayerView>,
}

/// Owns all live presence state.
///
/// ## Invariants
///
/// - Every key of `players` is a live, joined connection and vice versa.
/// - `teams[t] == c` implies `players[c].team == t`; no team maps to two
///   connections, since it is a map.
/// - Every stored position is finite and on the canvas.
pub struct PresenceStore {
    /// Player records keyed by the connection that owns them.
    players: HashMap<ConnectionId, Player>,

    /// Which connection currently holds each team.
    teams: HashMap<Team, ConnectionId>,

    /// When each connection's last move was *accepted*.
    last_moves: HashMap<ConnectionId, Instant>,

    config: PresenceConfig,
}

impl PresenceStore {
    /// Creates an empty store.
    pub fn new(config: PresenceConfig) -> Self {
        Self {
            players: HashMap::new(),
            teams: HashMap::new(),
            last_moves: HashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &PresenceConfig {
        &self.config
    }

    /// Returns the connection currently holding `team`, if any.
    ///
    /// Read-only. Callers that act on the answer must do so under the same
    /// lock acquisition, or use [`join_with_eviction`](Self::join_with_eviction)
    /// which does the read and the claim in one step.
    pub fn try_claim_team(&self, team: Team) -> Option<ConnectionId> {
        self.teams.get(&team).copied()
    }

    /// Same as [`try_claim_team`](Self::try_claim_team).
    pub fn team_holder(&self, team: Team) -> Option<ConnectionId> {
        self.try_claim_team(team)
    }

    /// Validates `input` and stores a player for `connection`, claiming its
    /// team.
    ///
    /// The claim overwrites any previous holder unconditionally. Evicting
    /// that holder is the caller's job; most callers want
    /// [`join_with_eviction`](Self::join_with_eviction) instead.
    ///
    /// If `connection` had already joined under a different team, its old
    /// claim is released so the index never points at a player who has
    /// since moved on.
    ///
    /// # Errors
    /// Returns the first failing [`ValidationError`]. Nothing changes on
    /// error.
    pub fn join(
        &mut self,
        connection: ConnectionId,
        input: &JoinInput,
    ) -> Result<&Player, ValidationError> {
        let player = Player::from_input(input, &self.config)?;
        Ok(self.insert(connection, player))
    }

    /// Join with team exclusivity enforced atomically.
    ///
    /// In one call: validate, look up the team's holder, remove it if it is
    /// another connection, insert the new player, claim the team, and take
    /// a snapshot of everyone else. No other operation can observe the
    /// state between those steps.
    ///
    /// Validation runs first, so an invalid join never evicts anyone.
    ///
    /// # Errors
    /// Returns the first failing [`ValidationError`]. Nothing changes on
    /// error.
    pub fn join_with_eviction(
        &mut self,
        connection: ConnectionId,
        input: &JoinInput,
    ) -> Result<JoinOutcome, ValidationError> {
        let player = Player::from_input(input, &self.config)?;

        let evicted = match self.try_claim_team(player.team) {
            Some(holder) if holder != connection => {
                tracing::info!(
                    evicted = %holder,
                    by = %connection,
                    team = %player.team,
                    "team reclaimed, evicting previous holder"
                );
                Some(Eviction {
                    connection: holder,
                    player: self.remove(holder),
                })
            }
            _ => None,
        };

        let view = self.insert(connection, player).view();
        let others = self.list_others(connection);

        Ok(JoinOutcome {
            player: view,
            evicted,
            others,
        })
    }

    /// Stores an already validated player and claims its team.
    fn insert(&mut self, connection: ConnectionId, player: Player) -> &Player {
        let previous_team = self.players.get(&connection).map(|p| p.team);
        if let Some(previous_team) = previous_team {
            if previous_team != player.team {
                self.release_team(previous_team, connection);
            }
        }

        self.teams.insert(player.team, connection);
        tracing::info!(
            %connection,
            user_id = %player.user_id,
            team = %player.team,
            "player joined"
        );

        match self.players.entry(connection) {
            Entry::Occupied(mut slot) => {
                slot.insert(player);
                slot.into_mut()
            }
            Entry::Vacant(slot) => slot.insert(player),
        }
    }

    /// Clears `team`'s claim only if `connection` still holds it.
    ///
    /// A later joiner may already own the team; their claim must survive
    /// a late cleanup of the connection they replaced.
    fn release_team(&mut self, team: Team, connection: ConnectionId) {
        if self.teams.get(&team) == Some(&connection) {
            self.teams.remove(&team);
        }
    }

    /// Removes `connection`'s player, its team claim (if still held), and
    /// its rate-limit entry.
    ///
    /// Returns the removed player, or `None` if there was none. Calling it
    /// twice for the same connection is harmless; the second call is a
    /// no-op returning `None`.
    pub fn remove(&mut self, connection: ConnectionId) -> Option<Player> {
        self.last_moves.remove(&connection);
        let player = self.players.remove(&connection)?;
        self.release_team(player.team, connection);

        tracing::info!(
            %connection,
            user_id = %player.user_id,
            team = %player.team,
            "player removed"
        );
        Some(player)
    }

    /// Snapshot of every player except the one on `excluding`.
    ///
    /// Order is unspecified.
    pub fn list_others(&self, excluding: ConnectionId) -> Vec<PlayerView> {
        self.players
            .iter()
            .filter(|(connection, _)| **connection != excluding)
            .map(|(_, player)| player.view())
            .collect()
    }

    /// Moves `connection`'s player to `(x, y)` if admission allows it.
    ///
    /// See [`update_position_at`](Self::update_position_at).
    pub fn update_position(
        &mut self,
        connection: ConnectionId,
        x: f64,
        y: f64,
    ) -> bool {
        self.update_position_at(connection, x, y, Instant::now())
    }

    /// Moves `connection`'s player to `(x, y)` as of `now`.
    ///
    /// Rejected (returns `false`, changes nothing) when:
    /// - the connection has no player,
    /// - less than `move_interval` has passed since its last accepted
    ///   move, or
    /// - `(x, y)` is non-finite or off the canvas.
    ///
    /// On success the position is stored and `now` becomes the
    /// connection's last accepted move.
    pub fn update_position_at(
        &mut self,
        connection: ConnectionId,
        x: f64,
        y: f64,
        now: Instant,
    ) -> bool {
        let Some(player) = self.players.get_mut(&connection) else {
            tracing::trace!(%connection, "move ignored: not joined");
            return false;
        };

        if let Some(last) = self.last_moves.get(&connection) {
            if now.saturating_duration_since(*last) < self.config.move_interval()
            {
                tracing::trace!(%connection, "move ignored: rate limited");
                return false;
            }
        }

        if !self.config.contains(x, y) {
            tracing::trace!(%connection, x, y, "move ignored: out of bounds");
            return false;
        }

        player.position = Position { x, y };
        self.last_moves.insert(connection, now);
        true
    }

    /// Records that `connection`'s player completed `quest_id`.
    ///
    /// Returns `false` only if the connection has no player. Completing a
    /// quest that is already recorded succeeds without adding a duplicate.
    pub fn complete_quest(
        &mut self,
        connection: ConnectionId,
        quest_id: &str,
    ) -> bool {
        let Some(player) = self.players.get_mut(&connection) else {
            return false;
        };
        if player.completed_quests.insert(quest_id.to_string()) {
            tracing::debug!(
                %connection,
                user_id = %player.user_id,
                quest_id,
                "quest completed"
            );
        }
        true
    }

    /// Looks up the player on `connection`.
    pub fn player(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.get(&connection)
    }

    /// Number of live players.
    pub fn count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for PresenceStore {
    fn default() -> Self {
        Self::new(PresenceConfig::default())
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Unit tests for `PresenceStore`, named
    //! `test_{function}_{scenario}_{expected}`.
    //!
    //! Rate-limit tests pass explicit instants to `update_position_at`
    //! instead of sleeping.

    use std::time::Duration;

    use plaza_protocol::Shape;

    use super::*;

    // -- Helpers ----------------------------------------------------------

    fn conn(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn join_input(user_id: &str, team: Team) -> JoinInput {
        JoinInput {
            user_id: user_id.into(),
            username: format!("name-{user_id}"),
            x: 100.0,
            y: 100.0,
            shape: "circle".into(),
            team: team.as_str().into(),
        }
    }

    fn store() -> PresenceStore {
        PresenceStore::default()
    }

    fn store_with(conns: &[(u64, &str, Team)]) -> PresenceStore {
        let mut store = store();
        for (id, user, team) in conns {
            store
                .join_with_eviction(conn(*id), &join_input(user, *team))
                .expect("valid join");
        }
        store
    }

    // =====================================================================
    // try_claim_team()
    // =====================================================================

    #[test]
    fn test_try_claim_team_unheld_returns_none() {
        let store = store();
        assert_eq!(store.try_claim_team(Team::Red), None);
    }

    #[test]
    fn test_try_claim_team_held_returns_holder() {
        let store = store_with(&[(1, "u1", Team::Red)]);
        assert_eq!(store.try_claim_team(Team::Red), Some(conn(1)));
        assert_eq!(store.try_claim_team(Team::Blue), None);
        assert_eq!(store.team_holder(Team::Red), Some(conn(1)));
    }

    // =====================================================================
    // join()
    // =====================================================================

    #[test]
    fn test_join_valid_stores_player_and_claims_team() {
        let mut store = store();
        let player = store
            .join(conn(1), &join_input("u1", Team::Red))
            .expect("valid");

        assert_eq!(player.user_id, "u1");
        assert_eq!(player.shape, Shape::Circle);
        assert_eq!(store.count(), 1);
        assert_eq!(store.try_claim_team(Team::Red), Some(conn(1)));
    }

    #[test]
    fn test_join_invalid_changes_nothing() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let bad = JoinInput {
            username: String::new(),
            ..join_input("u2", Team::Red)
        };

        let result = store.join(conn(2), &bad);

        assert_eq!(result.unwrap_err(), ValidationError::EmptyUsername);
        assert_eq!(store.count(), 1);
        assert_eq!(store.try_claim_team(Team::Red), Some(conn(1)));
    }

    #[test]
    fn test_join_overwrites_team_mapping() {
        // Plain `join` does not evict; it just takes the index entry.
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        store.join(conn(2), &join_input("u2", Team::Red)).unwrap();

        assert_eq!(store.try_claim_team(Team::Red), Some(conn(2)));
    }

    #[test]
    fn test_join_again_with_new_team_releases_old_claim() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        store.join(conn(1), &join_input("u1", Team::Blue)).unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(store.try_claim_team(Team::Red), None);
        assert_eq!(store.try_claim_team(Team::Blue), Some(conn(1)));
    }

    // =====================================================================
    // join_with_eviction()
    // =====================================================================

    #[test]
    fn test_join_with_eviction_first_player_gets_empty_snapshot() {
        let mut store = store();

        let outcome = store
            .join_with_eviction(conn(1), &join_input("u1", Team::Red))
            .unwrap();

        assert_eq!(outcome.player.user_id, "u1");
        assert!(outcome.others.is_empty());
        assert!(outcome.evicted.is_none());
    }

    #[test]
    fn test_join_with_eviction_snapshot_excludes_joiner() {
        let mut store =
            store_with(&[(1, "u1", Team::Red), (2, "u2", Team::Blue)]);

        let outcome = store
            .join_with_eviction(conn(3), &join_input("u3", Team::Green))
            .unwrap();

        let mut ids: Vec<_> =
            outcome.others.iter().map(|p| p.user_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, ["u1", "u2"]);
    }

    #[test]
    fn test_join_with_eviction_same_team_evicts_holder() {
        let mut store =
            store_with(&[(1, "u1", Team::Red), (2, "u2", Team::Blue)]);

        let outcome = store
            .join_with_eviction(conn(3), &join_input("u3", Team::Red))
            .unwrap();

        let evicted = outcome.evicted.expect("conn 1 should be evicted");
        assert_eq!(evicted.connection, conn(1));
        assert_eq!(evicted.player.expect("had a player").user_id, "u1");

        assert!(store.player(conn(1)).is_none());
        assert_eq!(store.player(conn(3)).unwrap().team, Team::Red);
        assert_eq!(store.try_claim_team(Team::Red), Some(conn(3)));
        assert_eq!(store.count(), 2);

        // The evicted player is not in the joiner's snapshot.
        assert!(outcome.others.iter().all(|p| p.user_id != "u1"));
    }

    #[test]
    fn test_join_with_eviction_same_connection_does_not_evict_itself() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        let outcome = store
            .join_with_eviction(conn(1), &join_input("u1-again", Team::Red))
            .unwrap();

        assert!(outcome.evicted.is_none());
        assert_eq!(store.count(), 1);
        assert_eq!(store.player(conn(1)).unwrap().user_id, "u1-again");
    }

    #[test]
    fn test_join_with_eviction_invalid_input_never_evicts() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let bad = JoinInput {
            x: 2500.0,
            ..join_input("u2", Team::Red)
        };

        let result = store.join_with_eviction(conn(2), &bad);

        assert!(matches!(
            result,
            Err(ValidationError::InvalidPosition { .. })
        ));
        assert!(store.player(conn(1)).is_some());
        assert_eq!(store.try_claim_team(Team::Red), Some(conn(1)));
    }

    // =====================================================================
    // remove()
    // =====================================================================

    #[test]
    fn test_remove_joined_returns_player_and_frees_team() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        let removed = store.remove(conn(1)).expect("was joined");

        assert_eq!(removed.user_id, "u1");
        assert!(store.is_empty());
        assert_eq!(store.try_claim_team(Team::Red), None);
    }

    #[test]
    fn test_remove_twice_is_noop() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        assert!(store.remove(conn(1)).is_some());
        assert!(store.remove(conn(1)).is_none());
        assert!(store.remove(conn(99)).is_none());
    }

    #[test]
    fn test_remove_stale_connection_keeps_new_holder_claim() {
        // conn 2 took Red from conn 1 with a plain join (no eviction). A
        // late remove of conn 1 must not clear conn 2's claim.
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        store.join(conn(2), &join_input("u2", Team::Red)).unwrap();

        store.remove(conn(1));

        assert_eq!(store.try_claim_team(Team::Red), Some(conn(2)));
    }

    #[test]
    fn test_remove_clears_rate_limit_entry() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let t0 = Instant::now();
        assert!(store.update_position_at(conn(1), 5.0, 5.0, t0));

        store.remove(conn(1));
        store.join(conn(1), &join_input("u1", Team::Red)).unwrap();

        // A fresh join is not throttled by the previous session's moves.
        assert!(store.update_position_at(conn(1), 6.0, 6.0, t0));
    }

    // =====================================================================
    // update_position()
    // =====================================================================

    #[test]
    fn test_update_position_unjoined_returns_false() {
        let mut store = store();
        assert!(!store.update_position(conn(1), 10.0, 10.0));
    }

    #[test]
    fn test_update_position_in_bounds_applies() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        assert!(store.update_position(conn(1), 150.0, 250.0));

        assert_eq!(
            store.player(conn(1)).unwrap().position,
            Position { x: 150.0, y: 250.0 }
        );
    }

    #[test]
    fn test_update_position_out_of_bounds_leaves_position() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        assert!(!store.update_position(conn(1), 2500.0, 100.0));
        assert!(!store.update_position(conn(1), 100.0, -1.0));
        assert!(!store.update_position(conn(1), f64::NAN, 100.0));

        assert_eq!(
            store.player(conn(1)).unwrap().position,
            Position { x: 100.0, y: 100.0 }
        );
    }

    #[test]
    fn test_update_position_within_interval_rejected() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let t0 = Instant::now();

        assert!(store.update_position_at(conn(1), 110.0, 100.0, t0));
        assert!(!store.update_position_at(
            conn(1),
            120.0,
            100.0,
            t0 + Duration::from_millis(30)
        ));

        assert_eq!(store.player(conn(1)).unwrap().position.x, 110.0);
    }

    #[test]
    fn test_update_position_after_interval_applies() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let t0 = Instant::now();

        assert!(store.update_position_at(conn(1), 110.0, 100.0, t0));
        assert!(store.update_position_at(
            conn(1),
            120.0,
            100.0,
            t0 + Duration::from_millis(50)
        ));
    }

    #[test]
    fn test_update_position_window_measured_from_last_accepted() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let t0 = Instant::now();
        assert!(store.update_position_at(conn(1), 110.0, 100.0, t0));

        // Rejected attempts at +20ms and +40ms do not restart the window...
        let at = |ms| t0 + Duration::from_millis(ms);
        assert!(!store.update_position_at(conn(1), 1.0, 1.0, at(20)));
        assert!(!store.update_position_at(conn(1), 1.0, 1.0, at(40)));
        // ...so +50ms is measured from t0 and succeeds.
        assert!(store.update_position_at(conn(1), 1.0, 1.0, at(50)));
    }

    #[test]
    fn test_update_position_rejected_bounds_does_not_consume_window() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);
        let t0 = Instant::now();

        assert!(!store.update_position_at(conn(1), 9999.0, 1.0, t0));
        assert!(store.update_position_at(conn(1), 1.0, 1.0, t0));
    }

    #[test]
    fn test_update_position_rate_limit_is_per_connection() {
        let mut store =
            store_with(&[(1, "u1", Team::Red), (2, "u2", Team::Blue)]);
        let t0 = Instant::now();

        assert!(store.update_position_at(conn(1), 1.0, 1.0, t0));
        assert!(store.update_position_at(conn(2), 1.0, 1.0, t0));
    }

    #[test]
    fn test_update_position_zero_interval_never_throttles() {
        let mut store = PresenceStore::new(PresenceConfig {
            move_interval_ms: 0,
            ..PresenceConfig::default()
        });
        store.join(conn(1), &join_input("u1", Team::Red)).unwrap();
        let t0 = Instant::now();

        assert!(store.update_position_at(conn(1), 1.0, 1.0, t0));
        assert!(store.update_position_at(conn(1), 2.0, 2.0, t0));
    }

    // =====================================================================
    // complete_quest()
    // =====================================================================

    #[test]
    fn test_complete_quest_unjoined_returns_false() {
        let mut store = store();
        assert!(!store.complete_quest(conn(1), "q1"));
    }

    #[test]
    fn test_complete_quest_twice_records_once() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        assert!(store.complete_quest(conn(1), "q1"));
        assert!(store.complete_quest(conn(1), "q1"));

        let quests = &store.player(conn(1)).unwrap().completed_quests;
        assert_eq!(quests.len(), 1);
        assert!(quests.contains("q1"));
    }

    #[test]
    fn test_complete_quest_distinct_ids_accumulate() {
        let mut store = store_with(&[(1, "u1", Team::Red)]);

        store.complete_quest(conn(1), "q1");
        store.complete_quest(conn(1), "q2");

        assert_eq!(store.player(conn(1)).unwrap().completed_quests.len(), 2);
    }

    // =====================================================================
    // count() / list_others()
    // =====================================================================

    #[test]
    fn test_count_tracks_joins_and_removes() {
        let mut store = store();
        assert_eq!(store.count(), 0);

        store.join(conn(1), &join_input("u1", Team::Red)).unwrap();
        store.join(conn(2), &join_input("u2", Team::Blue)).unwrap();
        assert_eq!(store.count(), 2);

        store.remove(conn(1));
        assert_eq!(store.count(), 1);
    }

    #[test]
    fn test_list_others_unknown_exclusion_lists_everyone() {
        let store =
            store_with(&[(1, "u1", Team::Red), (2, "u2", Team::Blue)]);
        assert_eq!(store.list_others(conn(99)).len(), 2);
    }
}
