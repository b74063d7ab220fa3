/// Tile variants and their per-variant state.
/// Contact resolution and per-tick stepping live in sim::step;
/// the data and the pure rules are centralized here so tile
/// semantics have a single home.

use rand::Rng;
use rand_pcg::Pcg32;

/// Arena index of a tile. Ids are never reused within a level.
pub type TileId = usize;

/// Sub-cell units per grid cell edge.
pub const CELL: i32 = 32;
/// Orb travel speed in sub-cell units per tick.
pub const SPEED: i32 = 8;

/// Travel / facing directions, clockwise from Right.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Direction {
    Right,
    Down,
    Left,
    Up,
}

impl Direction {
    pub fn delta(self) -> (i32, i32) {
        match self {
            Direction::Right => (1, 0),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Up => (0, -1),
        }
    }

    /// Deflector redirect table. `self` is the deflector's orientation,
    /// `incoming` the orb's travel direction. Two mapped entries per
    /// orientation; any other approach is a plain collision.
    pub fn redirect(self, incoming: Direction) -> Option<Direction> {
        use Direction::*;
        match (self, incoming) {
            (Right, Left) => Some(Down),
            (Right, Up) => Some(Right),
            (Down, Right) => Some(Down),
            (Down, Up) => Some(Left),
            (Left, Down) => Some(Left),
            (Left, Right) => Some(Up),
            (Up, Left) => Some(Up),
            (Up, Down) => Some(Right),
            _ => None,
        }
    }
}

/// Axis a trap's side blocks sit on: Vertical = sides above and below
/// the main tile, Horizontal = sides left and right of it.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Axis {
    Horizontal,
    Vertical,
}

/// Which end of a trap a side block is: Neg = up/left, Pos = down/right.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum End {
    Neg,
    Pos,
}

#[derive(Clone, Debug)]
pub struct Bomb {
    pub armed: bool,
    /// Countdown readout, 5 down to 0; below 0 the bomb is gone.
    pub countdown: i32,
    /// Cosmetic blast radius in sub-cell units, grows once the readout hits 0.
    pub radius: u32,
    pub blast_opacity: f32,
}

impl Bomb {
    pub fn new() -> Self {
        Bomb {
            armed: false,
            countdown: 5,
            radius: 0,
            blast_opacity: 0.0,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Trap {
    pub axis: Axis,
    /// Shared countdown; 0 = at rest. Armed to SPEED on contact.
    pub timer: i32,
    /// [Neg, Pos] side ids, filled in by the post-build pass.
    pub sides: Option<[TileId; 2]>,
    /// Random phase and frequency for the idle pulse.
    pub phase: i64,
    pub frequency: u32,
    /// Cosmetic idle opacity, updated each resting tick.
    pub pulse: f32,
}

impl Trap {
    pub fn new(axis: Axis, rng: &mut Pcg32) -> Self {
        Trap {
            axis,
            timer: 0,
            sides: None,
            phase: rng.random_range(0..=100),
            frequency: Trap::roll_frequency(rng),
            pulse: 0.5,
        }
    }

    pub fn roll_frequency(rng: &mut Pcg32) -> u32 {
        (5 + rng.random_range(0..=10)) * 5
    }

    /// Sub-cell offset of the side blocks toward the center while the
    /// shared countdown runs.
    pub fn side_offset(timer: i32) -> f32 {
        1.5 + ((SPEED - timer) as f32 * 16.0 / SPEED as f32).round()
    }

    /// Fading energy-bar opacity while contracting.
    pub fn bar_opacity(timer: i32) -> f32 {
        (timer as f32 * 100.0 / SPEED as f32).round() / 100.0
    }
}

/// Pending sides are keyed by the orb travel direction that activates
/// them: the side facing an approach from the left is hit by an orb
/// traveling Right, and so on.
#[derive(Clone, Debug)]
pub struct Sensor {
    pending: [bool; 4],
}

impl Sensor {
    pub fn new() -> Self {
        Sensor { pending: [true; 4] }
    }

    /// True once no side is pending.
    pub fn activated(&self) -> bool {
        self.pending.iter().all(|p| !p)
    }

    pub fn is_pending(&self, dir: Direction) -> bool {
        self.pending[dir as usize]
    }

    /// Activate the side keyed by the given travel direction.
    /// Returns true if that side was still pending.
    pub fn activate(&mut self, dir: Direction) -> bool {
        let was = self.pending[dir as usize];
        self.pending[dir as usize] = false;
        was
    }
}

#[derive(Clone, Debug)]
pub struct Portal {
    /// When set, the level only completes once every bomb is gone.
    pub needs_clear: bool,
}

#[derive(Clone, Debug)]
pub enum TileKind {
    Wall,
    Bomb(Bomb),
    Trap(Trap),
    TrapSide { axis: Axis, end: End },
    Deflector { orient: Direction },
    Sensor(Sensor),
    Wormhole { exit: Option<TileId> },
    Portal(Portal),
    Overlap { children: Vec<TileId> },
}

impl TileKind {
    /// Can the orb rest on this tile without it counting as a collision?
    pub fn occupiable(&self) -> bool {
        matches!(
            self,
            TileKind::Trap(_)
                | TileKind::Deflector { .. }
                | TileKind::Wormhole { .. }
                | TileKind::Portal(_)
        )
    }

    /// Does this tile need the neighbor-aware pass after the grid is built?
    pub fn wants_post_process(&self) -> bool {
        matches!(self, TileKind::Trap(_) | TileKind::Sensor(_))
    }
}

/// One grid occupant: coordinates, a frame counter and the variant payload.
/// Coordinates always match the slot the tile sits in; overlap children
/// share their container's slot.
#[derive(Clone, Debug)]
pub struct Tile {
    pub x: usize,
    pub y: usize,
    /// Starts at -1, incremented once per step.
    pub frame: i64,
    pub kind: TileKind,
}

impl Tile {
    pub fn new(kind: TileKind) -> Self {
        Tile {
            x: 0,
            y: 0,
            frame: -1,
            kind,
        }
    }

    pub fn place(&mut self, x: usize, y: usize) {
        self.x = x;
        self.y = y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn redirect_has_two_entries_per_orientation() {
        use Direction::*;
        for orient in [Right, Down, Left, Up] {
            let mapped = [Right, Down, Left, Up]
                .iter()
                .filter(|d| orient.redirect(**d).is_some())
                .count();
            assert_eq!(mapped, 2, "orientation {orient:?}");
        }
    }

    #[test]
    fn redirect_mappings() {
        use Direction::*;
        assert_eq!(Right.redirect(Left), Some(Down));
        assert_eq!(Right.redirect(Up), Some(Right));
        assert_eq!(Down.redirect(Right), Some(Down));
        assert_eq!(Down.redirect(Up), Some(Left));
        assert_eq!(Left.redirect(Down), Some(Left));
        assert_eq!(Left.redirect(Right), Some(Up));
        assert_eq!(Up.redirect(Left), Some(Up));
        assert_eq!(Up.redirect(Down), Some(Right));
        // head-on approaches collide
        assert_eq!(Right.redirect(Right), None);
        assert_eq!(Up.redirect(Up), None);
    }

    #[test]
    fn sensor_activation() {
        let mut s = Sensor::new();
        assert!(!s.activated());
        assert!(s.activate(Direction::Left));
        assert!(!s.activate(Direction::Left)); // already done
        assert!(s.activate(Direction::Right));
        assert!(s.activate(Direction::Up));
        assert!(!s.activated());
        assert!(s.activate(Direction::Down));
        assert!(s.activated());
    }

    #[test]
    fn occupiable_matrix() {
        let mut rng = Pcg32::seed_from_u64(1);
        assert!(!TileKind::Wall.occupiable());
        assert!(!TileKind::Bomb(Bomb::new()).occupiable());
        assert!(TileKind::Trap(Trap::new(Axis::Vertical, &mut rng)).occupiable());
        assert!(!TileKind::TrapSide { axis: Axis::Vertical, end: End::Neg }.occupiable());
        assert!(TileKind::Deflector { orient: Direction::Up }.occupiable());
        assert!(!TileKind::Sensor(Sensor::new()).occupiable());
        assert!(TileKind::Wormhole { exit: None }.occupiable());
        assert!(TileKind::Portal(Portal { needs_clear: true }).occupiable());
        assert!(!TileKind::Overlap { children: vec![] }.occupiable());
    }

    #[test]
    fn side_offset_contracts_toward_center() {
        // freshly armed: barely off the resting position
        assert!((Trap::side_offset(SPEED - 1) - 3.5).abs() < f32::EPSILON);
        // last countdown step: almost at the center
        assert!((Trap::side_offset(1) - 15.5).abs() < f32::EPSILON);
        for timer in 1..SPEED - 1 {
            assert!(Trap::side_offset(timer) > Trap::side_offset(timer + 1));
        }
    }

    #[test]
    fn trap_frequency_range() {
        let mut rng = Pcg32::seed_from_u64(7);
        for _ in 0..100 {
            let f = Trap::roll_frequency(&mut rng);
            assert!((25..=75).contains(&f));
        }
    }
}
