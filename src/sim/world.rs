/// World: the complete state of one running level.
///
/// Owns the 20×15 slot grid, the tile arena, the active worklist, the
/// sensor list and the orb. Tiles never mutate the grid themselves;
/// every structural change goes through `set_tile` / `remove_tile`,
/// the only two places that know how overlapping trap sides are
/// wrapped into a composite tile.

use rand::SeedableRng;
use rand_pcg::Pcg32;

use crate::domain::player::{KeyMap, Player};
use crate::domain::tile::{Tile, TileId, TileKind};
use crate::sim::event::GameEvent;
use crate::sim::veil::Veil;

pub const GRID_W: usize = 20;
pub const GRID_H: usize = 15;

/// Outcome of one driver callback.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum RunState {
    Continue,
    Solved,
    Failed,
    Aborted,
}

pub struct World {
    grid: [[Option<TileId>; GRID_W]; GRID_H],
    slots: Vec<Option<Tile>>,
    /// Tiles stepped every tick, in registration order.
    pub(crate) active: Vec<TileId>,
    /// Sensors, tracked separately for win evaluation.
    pub(crate) sensors: Vec<TileId>,
    pub player: Player,
    pub keys: KeyMap,
    pub code: String,
    /// Latched by a bomb-clearing portal during the build.
    pub clear_bombs: bool,
    pub(crate) success: bool,
    pub(crate) aborted: bool,
    pub(crate) reveal: Option<Veil>,
    pub(crate) hide: Option<Veil>,
    pub(crate) base_time: Option<u64>,
    /// External callback counter (not the simulation tick count).
    pub(crate) frame: i64,
    pub(crate) ticks: u64,
    pub(crate) terminated: bool,
    /// Readiness-indicator opacity for the exit portal.
    pub warn_opacity: f32,
    pub(crate) events: Vec<GameEvent>,
    pub(crate) rng: Pcg32,
}

impl World {
    pub fn new(code: &str) -> Self {
        let seed = code
            .bytes()
            .fold(0u64, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u64));
        let mut rng = Pcg32::seed_from_u64(seed);
        let reveal = Veil::new(true, &mut rng);
        World {
            grid: [[None; GRID_W]; GRID_H],
            slots: Vec::new(),
            active: Vec::new(),
            sensors: Vec::new(),
            player: Player::new(),
            keys: KeyMap::default(),
            code: code.to_string(),
            clear_bombs: false,
            success: false,
            aborted: false,
            reveal: Some(reveal),
            hide: None,
            base_time: None,
            frame: -1,
            ticks: 0,
            terminated: false,
            warn_opacity: 0.0,
            events: Vec::new(),
            rng,
        }
    }

    // ── Run result surface ──

    pub fn is_solved(&self) -> bool {
        self.success
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Cover opacity of the running veil for a board row, if any.
    pub fn veil_cover(&self, row: usize) -> f32 {
        if let Some(v) = &self.reveal {
            v.cover(row)
        } else if let Some(v) = &self.hide {
            v.cover(row)
        } else {
            0.0
        }
    }

    pub fn has_sensors(&self) -> bool {
        !self.sensors.is_empty()
    }

    pub fn take_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    // ── Tile access ──

    pub fn in_bounds(x: i32, y: i32) -> bool {
        (0..GRID_W as i32).contains(&x) && (0..GRID_H as i32).contains(&y)
    }

    pub fn tile(&self, id: TileId) -> Option<&Tile> {
        self.slots.get(id).and_then(|s| s.as_ref())
    }

    pub fn tile_mut(&mut self, id: TileId) -> Option<&mut Tile> {
        self.slots.get_mut(id).and_then(|s| s.as_mut())
    }

    pub fn tile_id_at(&self, x: i32, y: i32) -> Option<TileId> {
        if Self::in_bounds(x, y) {
            self.grid[y as usize][x as usize]
        } else {
            None
        }
    }

    pub fn tile_at(&self, x: i32, y: i32) -> Option<&Tile> {
        self.tile_id_at(x, y).and_then(|id| self.tile(id))
    }

    /// A missing tile counts as vacant ground.
    pub fn occupiable(&self, id: TileId) -> bool {
        self.tile(id).map(|t| t.kind.occupiable()).unwrap_or(true)
    }

    // ── Construction helpers (build-time only) ──

    pub(crate) fn alloc(&mut self, tile: Tile) -> TileId {
        self.slots.push(Some(tile));
        self.slots.len() - 1
    }

    /// Direct placement during the build scan: no overlap handling, the
    /// grid is still being filled cell by cell.
    pub(crate) fn install(&mut self, x: usize, y: usize, id: TileId) {
        if let Some(t) = self.tile_mut(id) {
            t.place(x, y);
        }
        self.grid[y][x] = Some(id);
        self.active.push(id);
    }

    // ── Slot mutation primitives ──

    /// Put a tile into a slot. An existing trap side there gets wrapped
    /// together with the newcomer into a fresh overlap; an existing
    /// overlap absorbs the newcomer as another child; anything else is
    /// replaced outright and dropped from the worklist.
    pub fn set_tile(&mut self, x: usize, y: usize, id: TileId) {
        if x >= GRID_W || y >= GRID_H {
            return;
        }
        enum Slot {
            Side,
            Overlap,
            Plain,
        }
        let old = self.grid[y][x];
        if let Some(old_id) = old {
            let slot = match self.tile(old_id).map(|t| &t.kind) {
                Some(TileKind::TrapSide { .. }) => Slot::Side,
                Some(TileKind::Overlap { .. }) => Slot::Overlap,
                _ => Slot::Plain,
            };
            match slot {
                Slot::Side => {
                    let overlap = self.alloc(Tile::new(TileKind::Overlap {
                        children: vec![old_id, id],
                    }));
                    if let Some(t) = self.tile_mut(old_id) {
                        t.place(x, y);
                    }
                    if let Some(t) = self.tile_mut(id) {
                        t.place(x, y);
                    }
                    if let Some(t) = self.tile_mut(overlap) {
                        t.place(x, y);
                    }
                    self.grid[y][x] = Some(overlap);
                    self.active.push(overlap);
                    // the old side now lives through the overlap, the new
                    // one never enters the worklist on its own
                    self.active.retain(|&a| a != old_id);
                    return;
                }
                Slot::Overlap => {
                    if let Some(t) = self.tile_mut(id) {
                        t.place(x, y);
                    }
                    if let Some(t) = self.tile_mut(old_id) {
                        if let TileKind::Overlap { children } = &mut t.kind {
                            children.push(id);
                        }
                    }
                    return;
                }
                Slot::Plain => {}
            }
        }
        if let Some(t) = self.tile_mut(id) {
            t.place(x, y);
        }
        self.grid[y][x] = Some(id);
        self.active.push(id);
        if let Some(old_id) = old {
            self.active.retain(|&a| a != old_id);
            self.slots[old_id] = None;
        }
    }

    /// Take a tile out of a slot. With `which` given and an overlap in
    /// the slot, only that child is removed; the slot is cleared and the
    /// overlap dropped from the worklist once it reports childless.
    pub fn remove_tile(&mut self, x: usize, y: usize, which: Option<TileId>) {
        if x >= GRID_W || y >= GRID_H {
            return;
        }
        let Some(old_id) = self.grid[y][x] else {
            return;
        };
        if let Some(child) = which {
            let mut was_overlap = false;
            let mut childless = false;
            if let Some(t) = self.tile_mut(old_id) {
                if let TileKind::Overlap { children } = &mut t.kind {
                    children.retain(|&c| c != child);
                    was_overlap = true;
                    childless = children.is_empty();
                }
            }
            if was_overlap {
                self.slots[child] = None;
                if !childless {
                    // the slot keeps the overlap for its remaining child
                    return;
                }
            }
        }
        self.grid[y][x] = None;
        self.active.retain(|&a| a != old_id);
        self.slots[old_id] = None;
    }

    /// Drop an expired tile: clear its slot (if it still owns it), leave
    /// the worklist, free the arena entry.
    pub(crate) fn expire(&mut self, id: TileId) {
        if let Some(t) = self.slots[id].take() {
            if self.grid[t.y][t.x] == Some(id) {
                self.grid[t.y][t.x] = None;
            }
        }
        self.active.retain(|&a| a != id);
    }

    // ── Win evaluation ──

    /// True when every sensor in the level reports activated.
    pub fn sensors_clear(&self) -> bool {
        self.sensors.iter().all(|&id| match self.tile(id) {
            Some(Tile {
                kind: TileKind::Sensor(s),
                ..
            }) => s.activated(),
            _ => true,
        })
    }

    /// Bombs still registered in the grid, armed or not.
    pub fn bomb_count(&self) -> usize {
        self.grid
            .iter()
            .flatten()
            .filter_map(|&slot| slot)
            .filter(|&id| matches!(self.tile(id).map(|t| &t.kind), Some(TileKind::Bomb(_))))
            .count()
    }
}
