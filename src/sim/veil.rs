/// Row-by-row fade used to reveal the board when a level starts and to
/// hide it again on exit. Pure state advanced by simulation ticks; the
/// renderer only reads the per-row cover opacity.

use rand::Rng;
use rand_pcg::Pcg32;

use super::world::GRID_H;

/// Ticks a full transition takes; also the opacity ramp divisor.
const RAMP: i32 = 50;

#[derive(Clone, Debug)]
pub struct Veil {
    opacity: [i32; GRID_H],
    delta: i32,
    remain: u32,
}

impl Veil {
    /// A revealing veil fades row covers out, a hiding one fades them in.
    /// The sweep order (top-down, bottom-up, or from the middle) is
    /// picked at random.
    pub fn new(reveal: bool, rng: &mut Pcg32) -> Self {
        let mut order: Vec<usize> = (0..GRID_H).collect();
        match rng.random_range(0..3u8) {
            0 => {}
            1 => order.reverse(),
            _ => {
                let mut interleaved = Vec::with_capacity(GRID_H);
                let (mut a, mut b) = (0usize, GRID_H - 1);
                while a < b {
                    interleaved.push(a);
                    interleaved.push(b);
                    a += 1;
                    b -= 1;
                }
                if a == b {
                    interleaved.push(a);
                }
                interleaved.reverse();
                order = interleaved;
            }
        }
        let delta = if reveal { -1 } else { 1 };
        let mut opacity = [0i32; GRID_H];
        for (i, &row) in order.iter().enumerate() {
            opacity[row] = if reveal {
                RAMP + 2 * i as i32
            } else {
                1 + 2 * i as i32
            };
        }
        Veil {
            opacity,
            delta,
            remain: RAMP as u32,
        }
    }

    /// Advance one tick. Returns false once the transition is finished.
    pub fn step(&mut self) -> bool {
        for o in self.opacity.iter_mut() {
            *o += self.delta;
        }
        self.remain -= 1;
        self.remain > 0
    }

    /// Cover opacity for a grid row: 0.0 = fully visible, 1.0 = hidden.
    pub fn cover(&self, row: usize) -> f32 {
        (self.opacity[row] as f32 / RAMP as f32).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn reveal_runs_down_to_clear() {
        let mut rng = Pcg32::seed_from_u64(3);
        let mut v = Veil::new(true, &mut rng);
        assert!(v.cover(0) > 0.9);
        let mut steps = 1;
        while v.step() {
            steps += 1;
        }
        assert_eq!(steps, RAMP);
        // the earliest row in the sweep is fully clear by the end
        let min = (0..GRID_H)
            .map(|r| v.cover(r))
            .fold(f32::MAX, f32::min);
        assert!(min < 0.05);
    }

    #[test]
    fn hide_covers_everything() {
        let mut rng = Pcg32::seed_from_u64(4);
        let mut v = Veil::new(false, &mut rng);
        while v.step() {}
        for row in 0..GRID_H {
            assert!(v.cover(row) > 0.95, "row {row} still visible");
        }
    }

    #[test]
    fn cover_is_clamped() {
        let mut rng = Pcg32::seed_from_u64(5);
        let v = Veil::new(true, &mut rng);
        for row in 0..GRID_H {
            let c = v.cover(row);
            assert!((0.0..=1.0).contains(&c));
        }
    }
}
