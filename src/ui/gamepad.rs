/// Gamepad support via gilrs: maps the d-pad and the left stick onto
/// the logical key map, Start/Select onto the abort key.
///
/// Compile without the "gamepad" feature to drop gilrs entirely
/// (the stub GamepadState does nothing).

#[cfg(feature = "gamepad")]
mod inner {
    use gilrs::{Axis, Button, Event, EventType, Gilrs};

    use crate::domain::player::KeyMap;

    const STICK_THRESHOLD: f32 = 0.5;

    pub struct GamepadState {
        gilrs: Option<Gilrs>,
        left: bool,
        right: bool,
        up: bool,
        down: bool,
        abort: bool,
    }

    impl GamepadState {
        pub fn new() -> Self {
            let gilrs = match Gilrs::new() {
                Ok(g) => Some(g),
                Err(e) => {
                    log::warn!("gamepad support unavailable: {e}");
                    None
                }
            };
            GamepadState {
                gilrs,
                left: false,
                right: false,
                up: false,
                down: false,
                abort: false,
            }
        }

        /// Drain pad events. Call once per frame.
        pub fn update(&mut self) {
            let Some(gilrs) = self.gilrs.as_mut() else {
                return;
            };
            let mut pending = Vec::new();
            while let Some(Event { event, .. }) = gilrs.next_event() {
                pending.push(event);
            }
            for event in pending {
                match event {
                    EventType::ButtonPressed(b, _) => self.button(b, true),
                    EventType::ButtonReleased(b, _) => self.button(b, false),
                    EventType::AxisChanged(a, v, _) => self.axis(a, v),
                    _ => {}
                }
            }
        }

        /// OR the pad state into this frame's key map.
        pub fn apply(&self, keys: &mut KeyMap) {
            keys.left |= self.left;
            keys.right |= self.right;
            keys.up |= self.up;
            keys.down |= self.down;
            keys.abort |= self.abort;
        }

        fn button(&mut self, button: Button, on: bool) {
            match button {
                Button::DPadLeft => self.left = on,
                Button::DPadRight => self.right = on,
                Button::DPadUp => self.up = on,
                Button::DPadDown => self.down = on,
                Button::Start | Button::Select => self.abort = on,
                _ => {}
            }
        }

        fn axis(&mut self, axis: Axis, value: f32) {
            match axis {
                Axis::LeftStickX => {
                    self.left = value < -STICK_THRESHOLD;
                    self.right = value > STICK_THRESHOLD;
                }
                Axis::LeftStickY => {
                    self.up = value > STICK_THRESHOLD;
                    self.down = value < -STICK_THRESHOLD;
                }
                _ => {}
            }
        }
    }
}

#[cfg(feature = "gamepad")]
pub use inner::GamepadState;

#[cfg(not(feature = "gamepad"))]
pub struct GamepadState;

#[cfg(not(feature = "gamepad"))]
impl GamepadState {
    pub fn new() -> Self {
        GamepadState
    }
    pub fn update(&mut self) {}
    pub fn apply(&self, _keys: &mut crate::domain::player::KeyMap) {}
}
