//! Spawn slots and respawn placement
//!
//! Each team owns two fixed slots on its home edge of the grid. Both joins and
//! respawns take the first slot nobody is standing on. They differ only when
//! every slot is taken: a joiner shares the last slot, a respawn goes to the
//! middle of the map.

use shared::{Position, Team};

pub const RED_SLOTS: [Position; 2] = [Position::new(2, 0), Position::new(17, 0)];
pub const BLUE_SLOTS: [Position; 2] = [Position::new(2, 19), Position::new(17, 19)];

/// Used when both of a team's slots are occupied during a respawn
pub const FALLBACK_SPAWN: Position = Position::new(10, 10);

pub fn slots(team: Team) -> &'static [Position] {
    match team {
        Team::Red => &RED_SLOTS,
        Team::Blue => &BLUE_SLOTS,
    }
}

fn first_free<I>(team: Team, occupied: I) -> Option<Position>
where
    I: IntoIterator<Item = Position>,
{
    let occupied: Vec<Position> = occupied.into_iter().collect();
    slots(team)
        .iter()
        .copied()
        .find(|slot| !occupied.contains(slot))
}

/// Spawn for a newly joined player.
///
/// Slots are scanned in order, so the first player of a team lands on slot 1
/// and the second on slot 2. A player who leaves frees their slot for the
/// next joiner. With both slots taken, further joiners share slot 2.
pub fn initial_spawn<I>(team: Team, occupied: I) -> Position
where
    I: IntoIterator<Item = Position>,
{
    first_free(team, occupied).unwrap_or(match team {
        Team::Red => RED_SLOTS[RED_SLOTS.len() - 1],
        Team::Blue => BLUE_SLOTS[BLUE_SLOTS.len() - 1],
    })
}

/// First slot of `team` that no position in `occupied` covers
pub fn respawn_position<I>(team: Team, occupied: I) -> Position
where
    I: IntoIterator<Item = Position>,
{
    first_free(team, occupied).unwrap_or(FALLBACK_SPAWN)
}
