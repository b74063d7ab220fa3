/// Entry point and driver loop.
///
/// The driver owns the wall clock and the frame cadence: every frame it
/// drains input into the logical key map, hands the simulation a
/// monotonic timestamp, maps the emitted events to sound cues and
/// renders. Level progression follows the run outcome: next level on
/// success, instant restart on a player abort, back to the title screen
/// (with code entry) on failure.

mod config;
mod domain;
mod sim;
mod ui;

use std::time::{Duration, Instant};

use crossterm::event::KeyCode;

use config::GameConfig;
use domain::player::KeyMap;
use sim::event::GameEvent;
use sim::level::{self, LevelDef};
use sim::step;
use sim::world::RunState;
use ui::gamepad::GamepadState;
use ui::input::InputState;
use ui::renderer::Renderer;
use ui::sound::{Cue, SoundEngine};

const FRAME_SLEEP: Duration = Duration::from_millis(5);

fn main() {
    env_logger::init();
    let config = GameConfig::load();

    let mut levels = level::load_from_directory(&config.levels_dir);
    if levels.is_empty() {
        levels = level::embedded_levels();
    }

    let mut renderer = Renderer::new(config.ascii);
    let release_events = match renderer.init() {
        Ok(r) => r,
        Err(e) => {
            eprintln!("Terminal init failed: {e}");
            return;
        }
    };

    let sound = SoundEngine::new();

    let result = run(
        &mut renderer,
        sound.as_ref(),
        &levels,
        &config,
        release_events,
    );

    if let Err(e) = renderer.cleanup() {
        eprintln!("Terminal cleanup failed: {e}");
    }
    if let Err(e) = result {
        eprintln!("Game error: {e}");
    }
}

fn run(
    renderer: &mut Renderer,
    sound: Option<&SoundEngine>,
    levels: &[LevelDef],
    config: &GameConfig,
    release_events: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut kb = InputState::new(config.hold_timeout_ms, release_events);
    let mut gp = GamepadState::new();

    let mut index = config
        .start_code
        .as_deref()
        .and_then(|code| levels.iter().position(|l| l.code == code))
        .unwrap_or(0);

    loop {
        match title_screen(renderer, &mut kb, levels, index)? {
            None => return Ok(()),
            Some(picked) => index = picked,
        }
        loop {
            match play_level(renderer, &mut kb, &mut gp, sound, levels, index)? {
                None => return Ok(()),
                Some(RunState::Solved) => index = (index + 1) % levels.len(),
                Some(RunState::Aborted) => {} // restart the same level
                Some(_) => break,             // failed: back to the title
            }
        }
    }
}

// ── Title / code entry ──

fn title_screen(
    renderer: &mut Renderer,
    kb: &mut InputState,
    levels: &[LevelDef],
    current: usize,
) -> Result<Option<usize>, Box<dyn std::error::Error>> {
    let mut typed = String::new();
    loop {
        kb.drain_events();
        if kb.ctrl_c_pressed() || kb.was_pressed(KeyCode::Esc) {
            return Ok(None);
        }
        for ch in kb.pressed_chars().collect::<Vec<_>>() {
            if ch.is_ascii_alphanumeric() && typed.len() < 4 {
                typed.push(ch.to_ascii_uppercase());
            }
        }
        if kb.was_pressed(KeyCode::Backspace) {
            typed.pop();
        }
        if kb.was_pressed(KeyCode::Enter) {
            if typed.is_empty() {
                return Ok(Some(current));
            }
            if let Some(i) = levels.iter().position(|l| l.code == typed) {
                return Ok(Some(i));
            }
            typed.clear(); // unknown code
        }
        renderer.draw_title(&typed, &levels[current].code, current + 1, levels.len())?;
        std::thread::sleep(FRAME_SLEEP);
    }
}

// ── One level ──

fn play_level(
    renderer: &mut Renderer,
    kb: &mut InputState,
    gp: &mut GamepadState,
    sound: Option<&SoundEngine>,
    levels: &[LevelDef],
    index: usize,
) -> Result<Option<RunState>, Box<dyn std::error::Error>> {
    let mut world = level::build(&levels[index])?;
    let start = Instant::now();

    loop {
        kb.drain_events();
        gp.update();
        if kb.ctrl_c_pressed() {
            return Ok(None);
        }
        apply_input(kb, gp, &mut world.keys);

        let state = step::tick(&mut world, start.elapsed().as_millis() as u64);

        for event in world.take_events() {
            if let Some(sfx) = sound {
                sfx.play(cue_for(&event));
            }
        }

        renderer.draw(&world, index + 1, levels.len())?;

        match state {
            RunState::Continue => std::thread::sleep(FRAME_SLEEP),
            terminal => {
                log::debug!(
                    "level {}: solved={} aborted={}",
                    world.code,
                    world.is_solved(),
                    world.is_aborted()
                );
                return Ok(Some(terminal));
            }
        }
    }
}

// ── Key Constants ──

const KEYS_LEFT: &[KeyCode] = &[KeyCode::Left, KeyCode::Char('a'), KeyCode::Char('A')];
const KEYS_RIGHT: &[KeyCode] = &[KeyCode::Right, KeyCode::Char('d'), KeyCode::Char('D')];
const KEYS_UP: &[KeyCode] = &[KeyCode::Up, KeyCode::Char('w'), KeyCode::Char('W')];
const KEYS_DOWN: &[KeyCode] = &[KeyCode::Down, KeyCode::Char('s'), KeyCode::Char('S')];
const KEYS_ABORT: &[KeyCode] = &[KeyCode::Char(' ')];

/// Write this frame's logical key map: keyboard state first, then the
/// gamepad ORed on top. The simulation clears the entries it consumes;
/// held keys simply get re-asserted next frame.
fn apply_input(kb: &InputState, gp: &GamepadState, keys: &mut KeyMap) {
    keys.left = kb.any_held(KEYS_LEFT);
    keys.right = kb.any_held(KEYS_RIGHT);
    keys.up = kb.any_held(KEYS_UP);
    keys.down = kb.any_held(KEYS_DOWN);
    keys.abort = kb.any_held(KEYS_ABORT);
    gp.apply(keys);
}

fn cue_for(event: &GameEvent) -> Cue {
    match event {
        GameEvent::Moved => Cue::Move,
        GameEvent::Stopped { .. } => Cue::Stop,
        GameEvent::BombTick { .. } => Cue::Stop,
        GameEvent::BombExploded { .. } => Cue::Explode,
        GameEvent::TrapArmed { .. } => Cue::Arm,
        GameEvent::SensorTouched { .. } => Cue::Sensor,
        GameEvent::Teleported { .. } => Cue::Teleport,
        GameEvent::LevelExit { solved: true } => Cue::ExitSuccess,
        GameEvent::LevelExit { solved: false } => Cue::ExitFailure,
    }
}
