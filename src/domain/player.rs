/// The orb: the one moving entity of a level.
///
/// Position is continuous in sub-cell units (CELL per tile edge) and
/// advances SPEED units per tick along the current delta; the grid
/// projection is the floor of the position. Key consumption and contact
/// resolution live in sim::step; this type only owns motion state.

use crate::domain::tile::{Direction, CELL, SPEED};

/// Ticks the impact flash stays visible after a stop.
const FLASH: i64 = 40;

/// Pressed/held state for the logical game keys. The platform layer
/// writes it before every callback; the simulation reads the entries
/// and clears the ones it consumes.
#[derive(Clone, Copy, Default, Debug)]
pub struct KeyMap {
    pub left: bool,
    pub right: bool,
    pub up: bool,
    pub down: bool,
    pub abort: bool,
}

#[derive(Clone, Debug)]
pub struct Player {
    position: (i32, i32),
    delta: (i32, i32),
    direction: Direction,
    flash_target: i64,
    frame: i64,
}

impl Player {
    pub fn new() -> Self {
        Player {
            position: (0, 0),
            delta: (0, 0),
            direction: Direction::Right,
            flash_target: -FLASH,
            frame: -1,
        }
    }

    /// Snap the orb onto the given grid cell.
    pub fn place(&mut self, tx: i32, ty: i32) {
        self.position = (CELL * tx, CELL * ty);
    }

    /// Continuous position in sub-cell units.
    pub fn position(&self) -> (i32, i32) {
        self.position
    }

    /// The grid cell the orb is on, or with `next` the one it is about
    /// to occupy along the current delta. Floor semantics: the position
    /// may be transiently negative while sliding off the board.
    pub fn tile_location(&self, next: bool) -> (i32, i32) {
        let mut x = self.position.0.div_euclid(CELL);
        let mut y = self.position.1.div_euclid(CELL);
        if next {
            if self.delta.0 > 0 {
                x += self.delta.0;
            }
            if self.delta.1 > 0 {
                y += self.delta.1;
            }
        }
        (x, y)
    }

    pub fn is_moving(&self) -> bool {
        self.delta != (0, 0)
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Start traveling in the given direction.
    pub fn set_direction(&mut self, direction: Direction) {
        self.delta = direction.delta();
        self.direction = direction;
    }

    /// Drop the delta without the stop feedback (used when a just-set
    /// move is cancelled by an adjacent obstacle).
    pub fn halt(&mut self) {
        self.delta = (0, 0);
    }

    /// Advance one tick of motion and the flash window.
    pub fn step(&mut self) {
        self.frame += 1;
        if self.is_moving() {
            self.position.0 += SPEED * self.delta.0;
            self.position.1 += SPEED * self.delta.1;
        }
    }

    /// Stop the orb at the given cell: directly on it, or one cell
    /// behind it along the current delta. No-op when already at rest.
    /// Returns whether a stop actually happened.
    pub fn stop(&mut self, tx: i32, ty: i32, on_tile: bool) -> bool {
        if !self.is_moving() {
            return false;
        }
        self.flash_target = FLASH + self.frame;
        if on_tile {
            self.place(tx, ty);
        } else {
            self.place(tx - self.delta.0, ty - self.delta.1);
        }
        self.delta = (0, 0);
        true
    }

    /// Euclidean distance from the continuous position to a cell's origin.
    pub fn distance(&self, tx: usize, ty: usize) -> f64 {
        let dx = (CELL * tx as i32 - self.position.0) as f64;
        let dy = (CELL * ty as i32 - self.position.1) as f64;
        (dx * dx + dy * dy).sqrt()
    }

    /// Is the orb close enough to a cell's center to snap onto it?
    pub fn within_reach(&self, tx: usize, ty: usize) -> bool {
        self.distance(tx, ty) <= SPEED as f64
    }

    /// Impact-flash body opacity, or None when the window has passed.
    pub fn flash_opacity(&self) -> Option<f32> {
        let activity = self.flash_target - self.frame;
        if activity >= 0 {
            Some(1.0 - activity as f32 / FLASH as f32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn advances_speed_units_per_tick() {
        let mut p = Player::new();
        p.place(2, 3);
        p.set_direction(Direction::Right);
        p.step();
        assert_eq!(p.position(), (2 * CELL + SPEED, 3 * CELL));
        assert_eq!(p.tile_location(false), (2, 3));
    }

    #[test]
    fn projection_adds_positive_delta_only() {
        let mut p = Player::new();
        p.place(5, 5);
        p.set_direction(Direction::Right);
        assert_eq!(p.tile_location(true), (6, 5));
        p.set_direction(Direction::Left);
        // moving left: the floor of the position already names the cell
        // being entered once the orb is partway in
        assert_eq!(p.tile_location(true), (5, 5));
        p.step();
        assert_eq!(p.tile_location(true), (4, 5));
    }

    #[test]
    fn floor_projection_below_zero() {
        let mut p = Player::new();
        p.place(0, 0);
        p.set_direction(Direction::Up);
        p.step();
        assert_eq!(p.tile_location(false), (0, -1));
    }

    #[test]
    fn stop_behind_and_on_tile() {
        let mut p = Player::new();
        p.place(2, 7);
        p.set_direction(Direction::Right);
        p.step();
        assert!(p.stop(5, 7, false));
        assert_eq!(p.tile_location(false), (4, 7));
        assert!(!p.is_moving());
        // stopping again is a no-op
        assert!(!p.stop(5, 7, false));

        p.set_direction(Direction::Up);
        assert!(p.stop(4, 3, true));
        assert_eq!(p.tile_location(false), (4, 3));
    }

    #[test]
    fn flash_window_after_stop() {
        let mut p = Player::new();
        assert!(p.flash_opacity().is_none());
        p.place(1, 1);
        p.set_direction(Direction::Down);
        p.step();
        p.stop(1, 3, false);
        p.step();
        let first = p.flash_opacity().expect("flash running");
        for _ in 0..39 {
            p.step();
        }
        let last = p.flash_opacity().expect("flash still running");
        assert!(last > first);
        p.step();
        assert!(p.flash_opacity().is_none());
    }

    #[test]
    fn distance_to_cell_origin() {
        let mut p = Player::new();
        p.place(3, 4);
        assert_eq!(p.distance(3, 4), 0.0);
        p.set_direction(Direction::Right);
        p.step();
        assert_eq!(p.distance(4, 4), (CELL - SPEED) as f64);
        // one step away from the origin cell is exactly the snap boundary
        assert!(p.within_reach(3, 4));
        assert!(!p.within_reach(4, 4));
    }
}
