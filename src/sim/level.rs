/// Level definitions, validation and the build pass.
///
/// ## Sources (priority order):
///   1. `levels/` directory (individual `.txt` files, sorted by name)
///   2. Built-in embedded levels
///
/// ## Single-level file format (`.txt`):
///   Line 1: `# CODE`
///   Lines: 15 board rows (padded to 20 columns if shorter)
///
/// ## Tile legend:
///   'w' wall                   'B' bomb
///   'p' exit portal            'P' exit portal, all bombs must be cleared
///   'a','b','c','d' = deflector oriented right/down/left/up
///   'T' trap with sides above and below
///   't' trap with sides left and right
///   'h' wormhole (exactly two per level, linked in reading order)
///   's' sensor                 'x' orb start (exactly one)
///   anything else: empty ground

use std::path::Path;

use thiserror::Error;

use crate::domain::tile::{
    Axis, Bomb, Direction, End, Portal, Sensor, Tile, TileId, TileKind, Trap,
};
use crate::sim::world::{World, GRID_H, GRID_W};

/// Runtime level data (owned strings, embedded or loaded from a file).
#[derive(Clone, Debug)]
pub struct LevelDef {
    pub code: String,
    pub rows: Vec<String>,
}

/// Rejections for malformed level data. Anything that passes validation
/// builds and plays without further checks.
#[derive(Debug, Error)]
pub enum LevelError {
    #[error("level {code}: expected 15 rows, found {found}")]
    WrongHeight { code: String, found: usize },
    #[error("level {code}: row {row} has {found} columns, expected 20")]
    WrongWidth {
        code: String,
        row: usize,
        found: usize,
    },
    #[error("level {code}: no orb start")]
    MissingStart { code: String },
    #[error("level {code}: more than one orb start")]
    MultipleStarts { code: String },
    #[error("level {code}: found {found} wormholes, need exactly two or none")]
    WormholeCount { code: String, found: usize },
    #[error("level {code}: trap at ({x},{y}) would push a side off the board")]
    TrapAtEdge { code: String, x: usize, y: usize },
}

// ══════════════════════════════════════════════════════════════
// Validation
// ══════════════════════════════════════════════════════════════

pub fn validate(def: &LevelDef) -> Result<(), LevelError> {
    let code = || def.code.clone();
    if def.rows.len() != GRID_H {
        return Err(LevelError::WrongHeight {
            code: code(),
            found: def.rows.len(),
        });
    }
    for (y, row) in def.rows.iter().enumerate() {
        let found = row.chars().count();
        if found != GRID_W {
            return Err(LevelError::WrongWidth {
                code: code(),
                row: y,
                found,
            });
        }
    }
    let mut starts = 0;
    let mut wormholes = 0;
    for (y, row) in def.rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            match ch {
                'x' => starts += 1,
                'h' => wormholes += 1,
                'T' if y == 0 || y == GRID_H - 1 => {
                    return Err(LevelError::TrapAtEdge { code: code(), x, y });
                }
                't' if x == 0 || x == GRID_W - 1 => {
                    return Err(LevelError::TrapAtEdge { code: code(), x, y });
                }
                _ => {}
            }
        }
    }
    if starts == 0 {
        return Err(LevelError::MissingStart { code: code() });
    }
    if starts > 1 {
        return Err(LevelError::MultipleStarts { code: code() });
    }
    if wormholes != 0 && wormholes != 2 {
        return Err(LevelError::WormholeCount {
            code: code(),
            found: wormholes,
        });
    }
    Ok(())
}

// ══════════════════════════════════════════════════════════════
// Build
// ══════════════════════════════════════════════════════════════

/// Parse the rows into a ready-to-run world: spawn every tile, link the
/// wormhole pair, then run the neighbor-aware pass (trap sides, sensor
/// auto-activation) over the completed grid in reading order.
pub fn build(def: &LevelDef) -> Result<World, LevelError> {
    validate(def)?;
    let mut world = World::new(&def.code);
    let mut wormholes: Vec<TileId> = Vec::new();

    for (y, row) in def.rows.iter().enumerate() {
        for (x, ch) in row.chars().enumerate() {
            if ch == 'x' {
                world.player.place(x as i32, y as i32);
                continue;
            }
            let kind = match ch {
                'w' => TileKind::Wall,
                'B' => TileKind::Bomb(Bomb::new()),
                'p' => TileKind::Portal(Portal { needs_clear: false }),
                'P' => TileKind::Portal(Portal { needs_clear: true }),
                'a' => TileKind::Deflector {
                    orient: Direction::Right,
                },
                'b' => TileKind::Deflector {
                    orient: Direction::Down,
                },
                'c' => TileKind::Deflector {
                    orient: Direction::Left,
                },
                'd' => TileKind::Deflector {
                    orient: Direction::Up,
                },
                'T' => TileKind::Trap(Trap::new(Axis::Vertical, &mut world.rng)),
                't' => TileKind::Trap(Trap::new(Axis::Horizontal, &mut world.rng)),
                'h' => TileKind::Wormhole { exit: None },
                's' => TileKind::Sensor(Sensor::new()),
                _ => continue,
            };
            if let TileKind::Portal(p) = &kind {
                world.clear_bombs = p.needs_clear;
            }
            let sensor = matches!(kind, TileKind::Sensor(_));
            let wormhole = matches!(kind, TileKind::Wormhole { .. });
            let id = world.alloc(Tile::new(kind));
            world.install(x, y, id);
            if sensor {
                world.sensors.push(id);
            }
            if wormhole {
                wormholes.push(id);
            }
        }
    }

    if let [first, second] = wormholes[..] {
        link_wormhole(&mut world, first, second);
        link_wormhole(&mut world, second, first);
    }

    post_process(&mut world);
    Ok(world)
}

fn link_wormhole(world: &mut World, id: TileId, exit: TileId) {
    if let Some(t) = world.tile_mut(id) {
        if let TileKind::Wormhole { exit: slot } = &mut t.kind {
            *slot = Some(exit);
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Post-build pass
// ══════════════════════════════════════════════════════════════

enum Post {
    Trap(Axis),
    Sensor,
}

/// The candidate list is collected before any entry runs, so tiles
/// spawned by the pass itself (trap sides) are never post-processed.
fn post_process(world: &mut World) {
    let mut pending: Vec<(TileId, usize, usize)> = Vec::new();
    for y in 0..GRID_H {
        for x in 0..GRID_W {
            if let Some(id) = world.tile_id_at(x as i32, y as i32) {
                if world.tile(id).is_some_and(|t| t.kind.wants_post_process()) {
                    pending.push((id, x, y));
                }
            }
        }
    }
    for (id, x, y) in pending {
        let what = match world.tile(id).map(|t| &t.kind) {
            Some(TileKind::Trap(t)) => Post::Trap(t.axis),
            Some(TileKind::Sensor(_)) => Post::Sensor,
            _ => continue,
        };
        match what {
            Post::Trap(axis) => spawn_trap_sides(world, id, axis, x, y),
            Post::Sensor => auto_activate_sides(world, id, x, y),
        }
    }
}

fn spawn_trap_sides(world: &mut World, id: TileId, axis: Axis, x: usize, y: usize) {
    let neg = world.alloc(Tile::new(TileKind::TrapSide {
        axis,
        end: End::Neg,
    }));
    let pos = world.alloc(Tile::new(TileKind::TrapSide {
        axis,
        end: End::Pos,
    }));
    if let Some(t) = world.tile_mut(id) {
        if let TileKind::Trap(trap) = &mut t.kind {
            trap.sides = Some([neg, pos]);
        }
    }
    match axis {
        Axis::Vertical => {
            world.set_tile(x, y - 1, neg);
            world.set_tile(x, y + 1, pos);
        }
        Axis::Horizontal => {
            world.set_tile(x - 1, y, neg);
            world.set_tile(x + 1, y, pos);
        }
    }
}

/// A sensor side that is physically unreachable (board edge or an
/// occupied neighbor, traversable or not) starts out activated.
fn auto_activate_sides(world: &mut World, id: TileId, x: usize, y: usize) {
    let (x, y) = (x as i32, y as i32);
    let approaches = [
        (x - 1, y, Direction::Right),
        (x + 1, y, Direction::Left),
        (x, y - 1, Direction::Down),
        (x, y + 1, Direction::Up),
    ];
    for (nx, ny, dir) in approaches {
        if !World::in_bounds(nx, ny) || world.tile_id_at(nx, ny).is_some() {
            if let Some(t) = world.tile_mut(id) {
                if let TileKind::Sensor(s) = &mut t.kind {
                    s.activate(dir);
                }
            }
        }
    }
}

// ══════════════════════════════════════════════════════════════
// Directory loading (individual .txt files)
// ══════════════════════════════════════════════════════════════

pub fn load_from_directory(dir: &Path) -> Vec<LevelDef> {
    let mut found: Vec<(String, LevelDef)> = Vec::new();

    let entries = match std::fs::read_dir(dir) {
        Ok(e) => e,
        Err(_) => return Vec::new(),
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !path.extension().is_some_and(|e| e == "txt") {
            continue;
        }
        let Ok(content) = std::fs::read_to_string(&path) else {
            continue;
        };
        let name = path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        match parse_level_file(&content) {
            Some(def) => match validate(&def) {
                Ok(()) => found.push((name, def)),
                Err(e) => log::warn!("skipping {name}: {e}"),
            },
            None => log::warn!("skipping {name}: no board rows"),
        }
    }

    found.sort_by(|a, b| a.0.cmp(&b.0));
    found.into_iter().map(|(_, def)| def).collect()
}

/// Parse one level from text. Short rows are padded to the board width;
/// everything else is left to `validate`.
pub fn parse_level_file(content: &str) -> Option<LevelDef> {
    let mut code = String::new();
    let mut rows: Vec<String> = Vec::new();

    for line in content.lines() {
        if let Some(rest) = line.strip_prefix('#') {
            if code.is_empty() {
                code = rest.trim().to_uppercase();
            }
            continue;
        }
        rows.push(line.to_string());
    }

    while rows.last().is_some_and(|r| r.trim().is_empty()) {
        rows.pop();
    }
    if rows.is_empty() {
        return None;
    }

    for row in &mut rows {
        let len = row.chars().count();
        if len < GRID_W {
            row.extend(std::iter::repeat(' ').take(GRID_W - len));
        }
    }

    if code.is_empty() {
        code = "????".to_string();
    }

    Some(LevelDef { code, rows })
}

// ══════════════════════════════════════════════════════════════
// Embedded levels
// ══════════════════════════════════════════════════════════════

pub fn embedded_levels() -> Vec<LevelDef> {
    vec![
        make_embedded("HALT", &[
            "                    ",
            "  w              w  ",
            "                    ",
            "                    ",
            "       w      p     ",
            "                    ",
            "                    ",
            "  x            w    ",
            "                    ",
            "                    ",
            "      w             ",
            "                    ",
            "                    ",
            "  w              w  ",
            "                    ",
        ]),
        make_embedded("BEND", &[
            "                    ",
            "                    ",
            "                    ",
            "                a p ",
            "                    ",
            "        w           ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "  x             c   ",
            "                    ",
            "                    ",
        ]),
        make_embedded("FUSE", &[
            "                    ",
            "  w                 ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "  x       B   B   P ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "  w                 ",
            "                    ",
        ]),
        make_embedded("EYES", &[
            "   w                ",
            "           w        ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                 p  ",
            "         wsw        ",
            "  w                 ",
            "                    ",
            "                    ",
            "                    ",
            "          x         ",
            "                    ",
            "                    ",
        ]),
        make_embedded("WARP", &[
            "                    ",
            "                    ",
            "      w             ",
            "                    ",
            "  h              p  ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "  x           h     ",
            "                    ",
            "              w     ",
        ]),
        make_embedded("SNAP", &[
            "                    ",
            "      w             ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "  x    T    B   P   ",
            "                    ",
            "                    ",
            "                    ",
            "      w             ",
            "                    ",
            "                    ",
            "                    ",
        ]),
        make_embedded("DUAL", &[
            "                    ",
            "                    ",
            "                    ",
            "  x       T      p  ",
            "                    ",
            "          T         ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
            "                    ",
        ]),
    ]
}

fn make_embedded(code: &str, map: &[&str]) -> LevelDef {
    LevelDef {
        code: code.to_string(),
        rows: map.iter().map(|s| s.to_string()).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn padded(code: &str, rows: &[&str]) -> LevelDef {
        let mut full: Vec<String> = rows.iter().map(|r| format!("{r:<20}")).collect();
        while full.len() < GRID_H {
            full.push(" ".repeat(GRID_W));
        }
        LevelDef {
            code: code.to_string(),
            rows: full,
        }
    }

    #[test]
    fn embedded_levels_all_validate() {
        let levels = embedded_levels();
        assert!(!levels.is_empty());
        for def in &levels {
            validate(def).unwrap_or_else(|e| panic!("{e}"));
            build(def).unwrap_or_else(|e| panic!("{e}"));
        }
    }

    #[test]
    fn rejects_wrong_dimensions() {
        let short = LevelDef {
            code: "BAD1".into(),
            rows: vec![" ".repeat(GRID_W); 3],
        };
        assert!(matches!(
            validate(&short),
            Err(LevelError::WrongHeight { found: 3, .. })
        ));

        let mut narrow = padded("BAD2", &["x"]);
        narrow.rows[4] = "   ".to_string();
        assert!(matches!(
            validate(&narrow),
            Err(LevelError::WrongWidth { row: 4, .. })
        ));
    }

    #[test]
    fn rejects_bad_start_counts() {
        let none = padded("BAD3", &["w"]);
        assert!(matches!(
            validate(&none),
            Err(LevelError::MissingStart { .. })
        ));
        let two = padded("BAD4", &["x x"]);
        assert!(matches!(
            validate(&two),
            Err(LevelError::MultipleStarts { .. })
        ));
    }

    #[test]
    fn rejects_unpaired_wormholes() {
        let one = padded("BAD5", &["x h"]);
        assert!(matches!(
            validate(&one),
            Err(LevelError::WormholeCount { found: 1, .. })
        ));
        let three = padded("BAD6", &["x h h h"]);
        assert!(matches!(
            validate(&three),
            Err(LevelError::WormholeCount { found: 3, .. })
        ));
        let two = padded("OK42", &["x h h"]);
        assert!(validate(&two).is_ok());
    }

    #[test]
    fn rejects_edge_traps() {
        let top = padded("BAD7", &["   T", "x"]);
        assert!(matches!(
            validate(&top),
            Err(LevelError::TrapAtEdge { x: 3, y: 0, .. })
        ));
        let mut left = padded("BAD8", &["x"]);
        left.rows[5] = format!("{:<20}", "t");
        assert!(matches!(
            validate(&left),
            Err(LevelError::TrapAtEdge { x: 0, y: 5, .. })
        ));
    }

    #[test]
    fn build_maps_symbols() {
        let def = padded("MAPS", &["x w B p P", " a b c d", "  s"]);
        let world = build(&def).unwrap();
        assert!(matches!(
            world.tile_at(2, 0).map(|t| &t.kind),
            Some(TileKind::Wall)
        ));
        assert!(matches!(
            world.tile_at(4, 0).map(|t| &t.kind),
            Some(TileKind::Bomb(_))
        ));
        assert!(matches!(
            world.tile_at(6, 0).map(|t| &t.kind),
            Some(TileKind::Portal(Portal { needs_clear: false }))
        ));
        assert!(matches!(
            world.tile_at(8, 0).map(|t| &t.kind),
            Some(TileKind::Portal(Portal { needs_clear: true }))
        ));
        for (x, orient) in [
            (1, Direction::Right),
            (3, Direction::Down),
            (5, Direction::Left),
            (7, Direction::Up),
        ] {
            match world.tile_at(x, 1).map(|t| &t.kind) {
                Some(TileKind::Deflector { orient: o }) => assert_eq!(*o, orient),
                other => panic!("expected deflector at ({x},1), got {other:?}"),
            }
        }
        assert!(matches!(
            world.tile_at(2, 2).map(|t| &t.kind),
            Some(TileKind::Sensor(_))
        ));
        // the orb start is recorded, not placed in the grid
        assert!(world.tile_at(0, 0).is_none());
        assert_eq!(world.player.tile_location(false), (0, 0));
        assert!(world.clear_bombs);
    }

    #[test]
    fn wormholes_link_in_reading_order() {
        let def = padded("PAIR", &["x", " h", "      h"]);
        let world = build(&def).unwrap();
        let first = world.tile_at(1, 1).expect("first wormhole");
        let second = world.tile_at(6, 2).expect("second wormhole");
        match (&first.kind, &second.kind) {
            (TileKind::Wormhole { exit: Some(a) }, TileKind::Wormhole { exit: Some(b) }) => {
                assert_eq!(world.tile(*a).map(|t| (t.x, t.y)), Some((6, 2)));
                assert_eq!(world.tile(*b).map(|t| (t.x, t.y)), Some((1, 1)));
            }
            other => panic!("wormholes not linked: {other:?}"),
        }
    }

    #[test]
    fn traps_spawn_sides_in_neighboring_slots() {
        let def = padded("SIDE", &["x", "", "     T", "", "  t"]);
        let world = build(&def).unwrap();
        assert!(matches!(
            world.tile_at(5, 1).map(|t| &t.kind),
            Some(TileKind::TrapSide {
                axis: Axis::Vertical,
                end: End::Neg
            })
        ));
        assert!(matches!(
            world.tile_at(5, 3).map(|t| &t.kind),
            Some(TileKind::TrapSide {
                axis: Axis::Vertical,
                end: End::Pos
            })
        ));
        assert!(matches!(
            world.tile_at(1, 4).map(|t| &t.kind),
            Some(TileKind::TrapSide {
                axis: Axis::Horizontal,
                end: End::Neg
            })
        ));
        assert!(matches!(
            world.tile_at(3, 4).map(|t| &t.kind),
            Some(TileKind::TrapSide {
                axis: Axis::Horizontal,
                end: End::Pos
            })
        ));
    }

    #[test]
    fn adjacent_traps_overlap_on_the_shared_cell() {
        // sides of the traps at y=2 and y=4 both land on (10,3)
        let def = padded("OVLP", &["x", "", "          T", "", "          T"]);
        let world = build(&def).unwrap();
        match world.tile_at(10, 3).map(|t| &t.kind) {
            Some(TileKind::Overlap { children }) => assert_eq!(children.len(), 2),
            other => panic!("expected overlap, got {other:?}"),
        }
    }

    #[test]
    fn surrounded_sensor_is_active_after_build() {
        let def = padded("SHUT", &["x", "     w", "    wsw", "     w"]);
        let world = build(&def).unwrap();
        match world.tile_at(5, 2).map(|t| &t.kind) {
            Some(TileKind::Sensor(s)) => assert!(s.activated()),
            other => panic!("expected sensor, got {other:?}"),
        }
        assert!(world.sensors_clear());
    }

    #[test]
    fn open_sensor_keeps_all_sides_pending() {
        let def = padded("OPEN", &["x", "", "    s"]);
        let world = build(&def).unwrap();
        match world.tile_at(4, 2).map(|t| &t.kind) {
            Some(TileKind::Sensor(s)) => {
                assert!(!s.activated());
                for dir in [
                    Direction::Right,
                    Direction::Down,
                    Direction::Left,
                    Direction::Up,
                ] {
                    assert!(s.is_pending(dir));
                }
            }
            other => panic!("expected sensor, got {other:?}"),
        }
    }

    #[test]
    fn parse_level_file_pads_and_reads_code() {
        let def = parse_level_file("# warp\nx  h\n   h\n").expect("parses");
        assert_eq!(def.code, "WARP");
        assert_eq!(def.rows.len(), 2);
        assert!(def.rows.iter().all(|r| r.chars().count() == GRID_W));
    }
}
