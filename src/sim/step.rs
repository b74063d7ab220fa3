/// The tick pipeline: advances a level by one simulation tick.
///
/// Order within a tick:
///   1. Veil transitions (reveal at start, hide on exit)
///   2. Orb bounds check
///   3. Contact with the projected next cell (while moving)
///   4. Rest check: the current cell turned non-occupiable
///   5. Key handling + orb motion (unless already solved)
///   6. Active-tile stepping, newest first, with expiry removal
///   7. Readiness indicator
///
/// Step 6 iterates the worklist by decrementing index so that a tile
/// restructuring the board mid-tick (a trap closing into a wall) only
/// ever removes entries at or above the current position; entries not
/// yet visited are never disturbed.

use std::f32::consts::PI;

use crate::domain::tile::{Direction, Tile, TileId, TileKind, Trap, SPEED};

use super::event::GameEvent;
use super::veil::Veil;
use super::world::{RunState, World};

/// Minimum wall-clock time for one simulation tick.
pub const TICK_MS: u64 = 40;
/// Elapsed time is clamped to this before the tick test.
pub const CLAMP_MS: u64 = 250;

// ══════════════════════════════════════════════════════════════
// Driver entry point
// ══════════════════════════════════════════════════════════════

/// Advance the level for one external callback with a monotonic
/// timestamp in milliseconds. Returns Continue while the level runs;
/// once the hide veil finishes, the latched outcome.
pub fn tick(world: &mut World, timestamp: u64) -> RunState {
    if world.terminated {
        return outcome(world);
    }
    world.frame += 1;
    // The baseline is latched on the first callback and never refreshed:
    // once 40ms of wall time have passed, every later callback advances
    // the simulation by one tick (elapsed stays clamped at 250ms).
    let base = *world.base_time.get_or_insert(timestamp);
    let elapsed = timestamp.saturating_sub(base).min(CLAMP_MS);
    if elapsed >= TICK_MS && !advance(world) {
        world.terminated = true;
        return outcome(world);
    }
    RunState::Continue
}

fn outcome(world: &World) -> RunState {
    if world.success {
        RunState::Solved
    } else if world.aborted {
        RunState::Aborted
    } else {
        RunState::Failed
    }
}

// ══════════════════════════════════════════════════════════════
// One simulation tick
// ══════════════════════════════════════════════════════════════

/// Returns false when the hide veil has finished and the level is over.
fn advance(world: &mut World) -> bool {
    world.ticks += 1;

    if let Some(v) = world.reveal.as_mut() {
        if !v.step() {
            world.reveal = None;
        }
    } else if let Some(v) = world.hide.as_mut() {
        if !v.step() {
            return false;
        }
    }

    let (px, py) = world.player.tile_location(false);
    if !World::in_bounds(px, py) {
        exit(world, false);
    } else {
        if world.player.is_moving() {
            let (nx, ny) = world.player.tile_location(true);
            if World::in_bounds(nx, ny) {
                if let Some(id) = world.tile_id_at(nx, ny) {
                    contact(world, id);
                }
            }
        } else if let Some(id) = world.tile_id_at(px, py) {
            if !world.occupiable(id) {
                // the ground under the resting orb turned solid
                exit(world, false);
                return true;
            }
        }
        if !world.success {
            handle_keys(world);
            world.player.step();
        }
    }

    let (bombs, pending_sensors) = step_tiles(world);
    world.warn_opacity = if pending_sensors > 0 || (world.clear_bombs && bombs > 0) {
        0.5 + (world.frame as f32 * PI / 45.0).sin() / 2.0
    } else {
        0.0
    };
    true
}

// ══════════════════════════════════════════════════════════════
// Exit / abort
// ══════════════════════════════════════════════════════════════

/// Leave the level. The final outcome additionally requires every
/// sensor to report activated. The outcome is latched by the call that
/// starts the hide veil; later calls are no-ops.
pub fn exit(world: &mut World, ok: bool) {
    if world.hide.is_some() {
        return;
    }
    let solved = ok && world.sensors_clear();
    let veil = Veil::new(false, &mut world.rng);
    world.hide = Some(veil);
    world.success = solved;
    world.events.push(GameEvent::LevelExit { solved });
}

/// Quit the level. Counts as a failure, flagged so the driver can
/// restart instead of falling back to the title screen.
pub fn abort(world: &mut World) {
    world.aborted = true;
    exit(world, false);
}

// ══════════════════════════════════════════════════════════════
// Key handling
// ══════════════════════════════════════════════════════════════

fn handle_keys(world: &mut World) {
    if world.keys.abort {
        abort(world);
    }
    if world.player.is_moving() {
        return;
    }
    let dir = if world.keys.left {
        world.keys.left = false;
        Some(Direction::Left)
    } else if world.keys.right {
        world.keys.right = false;
        Some(Direction::Right)
    } else if world.keys.down {
        world.keys.down = false;
        Some(Direction::Down)
    } else if world.keys.up {
        world.keys.up = false;
        Some(Direction::Up)
    } else {
        None
    };
    let Some(dir) = dir else { return };
    world.player.set_direction(dir);
    let (x, y) = world.player.tile_location(false);
    let (dx, dy) = dir.delta();
    if let Some(id) = world.tile_id_at(x + dx, y + dy) {
        if !world.occupiable(id) {
            // something right next door: cancel the move, just touch it
            world.player.halt();
            contact(world, id);
            return;
        }
    }
    world.events.push(GameEvent::Moved);
}

// ══════════════════════════════════════════════════════════════
// Contact resolution
// ══════════════════════════════════════════════════════════════

/// What touching a tile does, captured up front so the borrow on the
/// tile ends before the world is mutated.
enum Contact {
    Stop,
    Bomb,
    Trap,
    Deflect { orient: Direction },
    Sensor,
    Wormhole { exit: Option<TileId> },
    Portal { needs_clear: bool },
}

fn classify(kind: &TileKind) -> Contact {
    match kind {
        TileKind::Wall | TileKind::TrapSide { .. } | TileKind::Overlap { .. } => Contact::Stop,
        TileKind::Bomb(_) => Contact::Bomb,
        TileKind::Trap(_) => Contact::Trap,
        TileKind::Deflector { orient } => Contact::Deflect { orient: *orient },
        TileKind::Sensor(_) => Contact::Sensor,
        TileKind::Wormhole { exit } => Contact::Wormhole { exit: *exit },
        TileKind::Portal(p) => Contact::Portal {
            needs_clear: p.needs_clear,
        },
    }
}

pub(crate) fn contact(world: &mut World, id: TileId) {
    let Some(tile) = world.tile(id) else { return };
    let (x, y) = (tile.x, tile.y);
    match classify(&tile.kind) {
        Contact::Stop => stop_player(world, x, y, false),
        Contact::Bomb => {
            if let Some(t) = world.tile_mut(id) {
                if let TileKind::Bomb(b) = &mut t.kind {
                    b.armed = true;
                }
            }
            stop_player(world, x, y, false);
        }
        Contact::Trap => arm_trap(world, id, x, y),
        Contact::Deflect { orient } => match orient.redirect(world.player.direction()) {
            None => stop_player(world, x, y, false),
            Some(new_dir) => {
                if world.player.within_reach(x, y) {
                    stop_player(world, x, y, true);
                    world.player.set_direction(new_dir);
                }
            }
        },
        Contact::Sensor => {
            let dir = world.player.direction();
            stop_player(world, x, y, false);
            let mut fresh = false;
            if let Some(t) = world.tile_mut(id) {
                if let TileKind::Sensor(s) = &mut t.kind {
                    fresh = s.activate(dir);
                }
            }
            if fresh {
                world.events.push(GameEvent::SensorTouched { x, y });
            }
        }
        Contact::Wormhole { exit } => {
            if world.player.within_reach(x, y) {
                if let Some((ex, ey)) = exit.and_then(|e| world.tile(e)).map(|t| (t.x, t.y)) {
                    world.player.place(ex as i32, ey as i32);
                    world.events.push(GameEvent::Teleported { x: ex, y: ey });
                }
            }
        }
        Contact::Portal { needs_clear } => {
            if world.player.within_reach(x, y) {
                stop_player(world, x, y, true);
                let ok = !needs_clear || world.bomb_count() == 0;
                exit(world, ok);
            }
        }
    }
}

fn stop_player(world: &mut World, x: usize, y: usize, on_tile: bool) {
    if world.player.stop(x as i32, y as i32, on_tile) {
        world.events.push(GameEvent::Stopped { x, y });
    }
}

/// Arm a resting trap: the shared countdown starts on the main tile,
/// which drives both sides until the wall swap.
fn arm_trap(world: &mut World, id: TileId, x: usize, y: usize) {
    let mut armed = false;
    if let Some(t) = world.tile_mut(id) {
        if let TileKind::Trap(trap) = &mut t.kind {
            if trap.timer == 0 && trap.sides.is_some() {
                trap.timer = SPEED;
                armed = true;
            }
        }
    }
    if armed {
        world.events.push(GameEvent::TrapArmed { x, y });
    }
}

// ══════════════════════════════════════════════════════════════
// Active-tile stepping
// ══════════════════════════════════════════════════════════════

/// Step everything, newest registration first. Returns the live bomb
/// count and the number of sensors still waiting for activation.
fn step_tiles(world: &mut World) -> (usize, usize) {
    let mut bombs = 0;
    let mut pending_sensors = 0;
    let mut i = world.active.len();
    while i > 0 {
        i -= 1;
        if i >= world.active.len() {
            // the list shrank while an earlier tile restructured the board
            continue;
        }
        let id = world.active[i];
        if step_tile(world, id) {
            match world.tile(id).map(|t| &t.kind) {
                Some(TileKind::Bomb(_)) => bombs += 1,
                Some(TileKind::Sensor(s)) if !s.activated() => pending_sensors += 1,
                _ => {}
            }
        } else {
            world.expire(id);
        }
    }
    (bombs, pending_sensors)
}

/// Step one tile. Returns false when the tile should leave the board.
fn step_tile(world: &mut World, id: TileId) -> bool {
    enum Class {
        Bomb,
        Trap,
        Overlap,
        Plain,
    }
    let class = match world.tile(id).map(|t| &t.kind) {
        Some(TileKind::Bomb(_)) => Class::Bomb,
        Some(TileKind::Trap(_)) => Class::Trap,
        Some(TileKind::Overlap { .. }) => Class::Overlap,
        Some(_) => Class::Plain,
        None => return false,
    };
    match class {
        Class::Bomb => step_bomb(world, id),
        Class::Trap => step_trap(world, id),
        Class::Overlap => step_overlap(world, id),
        Class::Plain => {
            if let Some(t) = world.tile_mut(id) {
                t.frame += 1;
            }
            true
        }
    }
}

/// Armed bombs tick their readout down every 40 of their own frames;
/// the alarm fires exactly when the readout shows 0, removal follows
/// one cadence later. While the readout shows 0 the blast visual grows
/// every tick.
fn step_bomb(world: &mut World, id: TileId) -> bool {
    let mut event = None;
    let mut alive = true;
    if let Some(tile) = world.tile_mut(id) {
        tile.frame += 1;
        let frame = tile.frame;
        let (x, y) = (tile.x, tile.y);
        if let TileKind::Bomb(b) = &mut tile.kind {
            if b.armed && frame % 40 == 0 {
                b.countdown -= 1;
                if b.countdown < 0 {
                    alive = false;
                } else if b.countdown == 0 {
                    event = Some(GameEvent::BombExploded { x, y });
                } else {
                    event = Some(GameEvent::BombTick {
                        remaining: b.countdown,
                    });
                }
            }
            if alive && b.countdown == 0 {
                b.radius += 1;
                b.blast_opacity = (40.0 - b.radius as f32) / 40.0;
            }
        }
    }
    if let Some(e) = event {
        world.events.push(e);
    }
    alive
}

/// A resting trap pulses; a counting one contracts its sides and, at
/// the last countdown step, swaps itself for a wall and pulls both
/// sides off the board. The wall swap also removes the main tile from
/// the worklist, so the countdown never actually reaches zero here.
fn step_trap(world: &mut World, id: TileId) -> bool {
    let mut reroll = false;
    let mut closing: Option<(usize, usize, [TileId; 2])> = None;
    let mut alive = true;
    if let Some(tile) = world.tile_mut(id) {
        tile.frame += 1;
        let frame = tile.frame;
        let (x, y) = (tile.x, tile.y);
        if let TileKind::Trap(trap) = &mut tile.kind {
            if trap.timer == 0 {
                trap.pulse =
                    0.5 + ((frame + trap.phase) as f32 * PI / trap.frequency as f32).sin() / 3.0;
                if frame % 360 == 0 {
                    reroll = true;
                }
            } else {
                trap.timer -= 1;
                if trap.timer == 0 {
                    alive = false;
                } else if trap.timer == 1 {
                    if let Some(sides) = trap.sides {
                        closing = Some((x, y, sides));
                    }
                }
            }
        }
    }
    if reroll {
        let f = Trap::roll_frequency(&mut world.rng);
        if let Some(tile) = world.tile_mut(id) {
            if let TileKind::Trap(trap) = &mut tile.kind {
                trap.frequency = f;
            }
        }
    }
    if let Some((x, y, sides)) = closing {
        let wall = world.alloc(Tile::new(TileKind::Wall));
        world.set_tile(x, y, wall);
        for side in sides {
            if let Some((sx, sy)) = world.tile(side).map(|t| (t.x, t.y)) {
                world.remove_tile(sx, sy, Some(side));
            }
        }
    }
    alive
}

/// An overlap steps all its children and lives while it has any.
fn step_overlap(world: &mut World, id: TileId) -> bool {
    let children = match world.tile_mut(id) {
        Some(tile) => {
            tile.frame += 1;
            match &tile.kind {
                TileKind::Overlap { children } => children.clone(),
                _ => return true,
            }
        }
        None => return false,
    };
    for child in children {
        step_tile(world, child);
    }
    matches!(
        world.tile(id).map(|t| &t.kind),
        Some(TileKind::Overlap { children }) if !children.is_empty()
    )
}

// ══════════════════════════════════════════════════════════════
// Tests
// ══════════════════════════════════════════════════════════════

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::level::{build, LevelDef};
    use crate::sim::world::{GRID_H, GRID_W};

    fn world_from(rows: &[&str]) -> World {
        let mut full: Vec<String> = rows.iter().map(|r| format!("{r:<20}")).collect();
        while full.len() < GRID_H {
            full.push(" ".repeat(GRID_W));
        }
        build(&LevelDef {
            code: "TEST".into(),
            rows: full,
        })
        .unwrap()
    }

    /// Latch the gate baseline, then run `n` simulation ticks.
    fn run(world: &mut World, n: usize) {
        if world.base_time.is_none() {
            tick(world, 0);
        }
        for i in 0..n {
            tick(world, 1_000 + i as u64);
        }
    }

    /// Run until the level terminates, returning the final state.
    fn run_to_end(world: &mut World, cap: usize) -> RunState {
        if world.base_time.is_none() {
            tick(world, 0);
        }
        for i in 0..cap {
            let rs = tick(world, 2_000 + i as u64);
            if rs != RunState::Continue {
                return rs;
            }
        }
        panic!("level did not finish within {cap} callbacks");
    }

    fn press(world: &mut World, dir: Direction) {
        match dir {
            Direction::Left => world.keys.left = true,
            Direction::Right => world.keys.right = true,
            Direction::Up => world.keys.up = true,
            Direction::Down => world.keys.down = true,
        }
    }

    // ── Tick gating ──

    #[test]
    fn gate_waits_40ms_then_every_callback_ticks() {
        let mut w = world_from(&["x"]);
        assert_eq!(tick(&mut w, 100), RunState::Continue); // latches baseline
        assert_eq!(w.ticks(), 0);
        tick(&mut w, 139);
        assert_eq!(w.ticks(), 0);
        tick(&mut w, 140);
        assert_eq!(w.ticks(), 1);
        // the baseline is never refreshed, so 1ms later still ticks
        tick(&mut w, 141);
        assert_eq!(w.ticks(), 2);
        // and elapsed is clamped, far-future stamps are no different
        tick(&mut w, 1_000_000);
        assert_eq!(w.ticks(), 3);
    }

    // ── Walls and stopping ──

    #[test]
    fn wall_stops_orb_one_cell_short() {
        let mut w = world_from(&["", "  x    w"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        run(&mut w, 30);
        assert_eq!(w.player.tile_location(false), (6, 1));
        assert!(!w.player.is_moving());
    }

    #[test]
    fn nudging_an_adjacent_wall_does_not_move() {
        let mut w = world_from(&["xw"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        run(&mut w, 3);
        assert_eq!(w.player.tile_location(false), (0, 0));
        assert!(!w.player.is_moving());
        assert!(!w.take_events().contains(&GameEvent::Moved));
    }

    #[test]
    fn trap_side_blocks_like_a_wall() {
        let mut w = world_from(&["  x", "     T"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        run(&mut w, 30);
        assert_eq!(w.player.tile_location(false), (4, 0));
    }

    // ── Bombs ──

    #[test]
    fn bomb_arms_on_nudge_and_counts_down_every_40_ticks() {
        let mut w = world_from(&["", " xB"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let mut downticks = Vec::new();
        let mut exploded_at = None;
        for i in 0..400u32 {
            run(&mut w, 1);
            for ev in w.take_events() {
                match ev {
                    GameEvent::BombTick { .. } => downticks.push(i),
                    GameEvent::BombExploded { .. } => exploded_at = Some(i),
                    _ => {}
                }
            }
        }
        // readout 5 → 4,3,2,1 then the alarm at 0, removal one cadence later
        assert_eq!(downticks.len(), 4);
        for pair in downticks.windows(2) {
            assert_eq!(pair[1] - pair[0], 40);
        }
        let exploded_at = exploded_at.expect("alarm fired");
        assert_eq!(exploded_at - downticks[downticks.len() - 1], 40);
        assert!(w.tile_at(2, 1).is_none());
        assert_eq!(w.bomb_count(), 0);
    }

    #[test]
    fn unarmed_bomb_never_counts_down() {
        let mut w = world_from(&["x", "          B"]);
        run(&mut w, 300);
        match w.tile_at(10, 1).map(|t| &t.kind) {
            Some(TileKind::Bomb(b)) => {
                assert!(!b.armed);
                assert_eq!(b.countdown, 5);
            }
            other => panic!("expected bomb, got {other:?}"),
        }
    }

    // ── Traps ──

    #[test]
    fn crossing_a_trap_arms_it_and_a_wall_closes_behind() {
        let mut w = world_from(&["", "", "  x  T    w"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let mut armed = false;
        for _ in 0..40 {
            run(&mut w, 1);
            armed |= w
                .take_events()
                .iter()
                .any(|e| matches!(e, GameEvent::TrapArmed { x: 5, y: 2 }));
        }
        assert!(armed);
        assert!(matches!(
            w.tile_at(5, 2).map(|t| &t.kind),
            Some(TileKind::Wall)
        ));
        assert!(w.tile_at(5, 1).is_none(), "upper side still on the board");
        assert!(w.tile_at(5, 3).is_none(), "lower side still on the board");
        // the orb crossed before the wall formed
        assert_eq!(w.player.tile_location(false), (9, 2));
    }

    #[test]
    fn overlapped_sides_dissolve_one_trap_at_a_time() {
        let mut w = world_from(&["x", "", "          T", "", "          T"]);
        run(&mut w, 1);
        let first = w.tile_id_at(10, 2).expect("first trap");
        contact(&mut w, first);
        run(&mut w, 10);
        assert!(matches!(
            w.tile_at(10, 2).map(|t| &t.kind),
            Some(TileKind::Wall)
        ));
        // the shared cell keeps the overlap for the other trap's side
        match w.tile_at(10, 3).map(|t| &t.kind) {
            Some(TileKind::Overlap { children }) => assert_eq!(children.len(), 1),
            other => panic!("expected one-child overlap, got {other:?}"),
        }
        let second = w.tile_id_at(10, 4).expect("second trap");
        contact(&mut w, second);
        run(&mut w, 10);
        assert!(matches!(
            w.tile_at(10, 4).map(|t| &t.kind),
            Some(TileKind::Wall)
        ));
        assert!(w.tile_at(10, 3).is_none(), "overlap did not dissolve");
        assert!(w.tile_at(10, 5).is_none());
    }

    #[test]
    fn resting_trap_only_arms_on_contact() {
        let mut w = world_from(&["x", "", "     T"]);
        run(&mut w, 100);
        match w.tile_at(5, 2).map(|t| &t.kind) {
            Some(TileKind::Trap(t)) => assert_eq!(t.timer, 0),
            other => panic!("expected trap, got {other:?}"),
        }
    }

    // ── Deflectors ──

    #[test]
    fn deflector_without_mapping_stops_short() {
        let mut w = world_from(&["", "  x    a"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        run(&mut w, 30);
        assert_eq!(w.player.tile_location(false), (6, 1));
        assert!(!w.player.is_moving());
    }

    #[test]
    fn deflector_redirects_once_within_reach() {
        let mut w = world_from(&["", "    a  w", "", "", "    x"]);
        run(&mut w, 1);
        press(&mut w, Direction::Up);
        run(&mut w, 40);
        // Up → Right through the deflector, then the wall stops the orb
        assert_eq!(w.player.tile_location(false), (6, 1));
        assert_eq!(w.player.direction(), Direction::Right);
    }

    // ── Sensors ──

    #[test]
    fn sensor_activates_the_side_keyed_by_travel_direction() {
        let mut w = world_from(&["  x  s"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        run(&mut w, 20);
        assert_eq!(w.player.tile_location(false), (4, 0));
        match w.tile_at(5, 0).map(|t| &t.kind) {
            Some(TileKind::Sensor(s)) => {
                assert!(!s.is_pending(Direction::Right), "touched side");
                assert!(!s.is_pending(Direction::Down), "edge side auto-activated");
                assert!(s.is_pending(Direction::Left));
                assert!(s.is_pending(Direction::Up));
            }
            other => panic!("expected sensor, got {other:?}"),
        }
    }

    // ── Wormholes ──

    #[test]
    fn wormhole_relocates_exactly_and_preserves_motion() {
        let mut w = world_from(&["", " h          w", "", " x   h"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let mut teleported = false;
        for _ in 0..60 {
            run(&mut w, 1);
            if w
                .take_events()
                .iter()
                .any(|e| matches!(e, GameEvent::Teleported { x: 1, y: 1 }))
            {
                teleported = true;
                assert_eq!(w.player.tile_location(false), (1, 1));
                assert!(w.player.is_moving());
                assert_eq!(w.player.direction(), Direction::Right);
            }
        }
        assert!(teleported);
        assert_eq!(w.player.tile_location(false), (11, 1));
    }

    // ── Portals and outcomes ──

    #[test]
    fn gated_portal_fails_while_bombs_remain() {
        let mut w = world_from(&["", "  x  P  B"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Failed);
        assert!(!w.is_solved());
    }

    #[test]
    fn gated_portal_solves_once_bombs_are_cleared() {
        let mut w = world_from(&["", "  x  P"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Solved);
        assert!(w.is_solved());
    }

    #[test]
    fn portal_fails_until_all_sensors_activate() {
        let mut w = world_from(&["", "  x  p", "", "          s"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Failed);
    }

    #[test]
    fn sliding_off_the_board_fails_the_level() {
        let mut w = world_from(&["x"]);
        run(&mut w, 1);
        press(&mut w, Direction::Left);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Failed);
        assert!(!w.is_aborted());
    }

    #[test]
    fn wall_closing_under_the_resting_orb_fails() {
        // the deflector bounces the orb back onto the armed trap's cell
        let mut w = world_from(&["", "", "  x  Ta"]);
        run(&mut w, 1);
        press(&mut w, Direction::Right);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Failed);
    }

    #[test]
    fn abort_latches_even_if_the_portal_is_reached_later() {
        let mut w = world_from(&["", "  x  p"]);
        run(&mut w, 1);
        w.keys.abort = true;
        run(&mut w, 1);
        w.keys.abort = false;
        press(&mut w, Direction::Right);
        let rs = run_to_end(&mut w, 400);
        assert_eq!(rs, RunState::Aborted);
        assert!(w.is_aborted());
        assert!(!w.is_solved());
    }

    // ── Readiness indicator ──

    #[test]
    fn indicator_pulses_until_conditions_are_met() {
        let mut w = world_from(&["x", "", "  B  P"]);
        run(&mut w, 5);
        assert!(w.warn_opacity > 0.0);
        // blow up the only bomb
        let bomb = w.tile_id_at(2, 2).expect("bomb");
        if let Some(t) = w.tile_mut(bomb) {
            if let TileKind::Bomb(b) = &mut t.kind {
                b.armed = true;
            }
        }
        run(&mut w, 300);
        assert_eq!(w.bomb_count(), 0);
        assert_eq!(w.warn_opacity, 0.0);
    }
}
