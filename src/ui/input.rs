/// Input state tracker.
///
/// Tracks which keys are currently held down. The game consumes held
/// state for the four travel directions and the abort key; the title
/// screen uses fresh presses and typed characters for code entry.
///
/// Uses crossterm's keyboard enhancement for Release events when the
/// terminal supports it, falling back to timeout-based release
/// detection everywhere else.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crossterm::event::{self, poll, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

pub struct InputState {
    /// Timestamp of the last Press/Repeat event for each key.
    last_active: HashMap<KeyCode, Instant>,

    /// Keys that went from "not held" to "held" during the most recent
    /// drain_events() call.
    fresh_presses: Vec<KeyCode>,

    /// Raw key events collected during the drain, for meta-key handling.
    raw_events: Vec<KeyEvent>,

    /// After this long without a Press/Repeat event a key counts as
    /// released. Only consulted when Release events are unreliable.
    hold_timeout: Duration,

    /// Whether to honor Release events (keyboard enhancement confirmed).
    honor_release: bool,
}

impl InputState {
    pub fn new(hold_timeout_ms: u64, honor_release: bool) -> Self {
        InputState {
            last_active: HashMap::with_capacity(16),
            fresh_presses: Vec::with_capacity(8),
            raw_events: Vec::with_capacity(8),
            hold_timeout: Duration::from_millis(hold_timeout_ms),
            honor_release,
        }
    }

    /// Drain all pending terminal events and update key states.
    /// Call once per frame, before the simulation tick.
    pub fn drain_events(&mut self) {
        self.fresh_presses.clear();
        self.raw_events.clear();

        while poll(Duration::ZERO).unwrap_or(false) {
            if let Ok(Event::Key(key)) = event::read() {
                self.raw_events.push(key);

                match key.kind {
                    KeyEventKind::Release if self.honor_release => {
                        self.last_active.remove(&key.code);
                    }
                    KeyEventKind::Release => {
                        // rely on the timeout instead
                    }
                    _ => {
                        let was_held = self.is_held_inner(key.code);
                        self.last_active.insert(key.code, Instant::now());
                        if !was_held {
                            self.fresh_presses.push(key.code);
                        }
                    }
                }
            }
        }

        let now = Instant::now();
        let timeout = self.hold_timeout;
        self.last_active
            .retain(|_, t| now.duration_since(*t) < timeout);
    }

    /// Is this key currently held down? (continuous actions)
    pub fn is_held(&self, code: KeyCode) -> bool {
        self.is_held_inner(code)
    }

    pub fn any_held(&self, codes: &[KeyCode]) -> bool {
        codes.iter().any(|c| self.is_held(*c))
    }

    /// Was this key freshly pressed this frame? (edge-triggered actions)
    pub fn was_pressed(&self, code: KeyCode) -> bool {
        self.fresh_presses.contains(&code)
    }

    /// Characters freshly typed this frame, for the code entry box.
    pub fn pressed_chars(&self) -> impl Iterator<Item = char> + '_ {
        self.fresh_presses.iter().filter_map(|code| match code {
            KeyCode::Char(c) => Some(*c),
            _ => None,
        })
    }

    pub fn ctrl_c_pressed(&self) -> bool {
        self.raw_events.iter().any(|k| {
            k.modifiers.contains(KeyModifiers::CONTROL)
                && (k.code == KeyCode::Char('c') || k.code == KeyCode::Char('C'))
        })
    }

    // ── Internal ──

    fn is_held_inner(&self, code: KeyCode) -> bool {
        self.last_active
            .get(&code)
            .map(|t| t.elapsed() < self.hold_timeout)
            .unwrap_or(false)
    }
}
