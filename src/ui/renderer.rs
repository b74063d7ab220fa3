/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// The next frame is built into `front` (a fixed 44×18 canvas: HUD row,
/// the 20×15 board at two columns per cell, two footer rows), diffed
/// against `back`, and only changed cells emit terminal commands.
/// Everything drawn is read from simulation state, including the
/// cosmetic values the core computes (blast opacity, trap pulse,
/// readiness indicator, veil covers, orb flash). Nothing flows back.

use std::io::{self, BufWriter, Stdout, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{KeyboardEnhancementFlags, PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags},
    execute, queue,
    style::{Color, Print, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::domain::tile::{Axis, Direction, End, Tile, TileKind, Trap};
use crate::sim::world::{World, GRID_H, GRID_W};

const CANVAS_W: usize = GRID_W * 2 + 4;
const CANVAS_H: usize = GRID_H + 3;
const BOARD_X: usize = 2;
const BOARD_Y: usize = 1;

const BASE_BG: Color = Color::Rgb { r: 12, g: 12, b: 28 };
const COL_WALL: Color = Color::Rgb { r: 204, g: 48, b: 16 };
const COL_BOMB: Color = Color::Rgb { r: 204, g: 192, b: 16 };
const COL_TRAP: Color = Color::Rgb { r: 0, g: 128, b: 192 };
const COL_GREEN: Color = Color::Rgb { r: 16, g: 192, b: 32 };
const COL_GOLD: Color = Color::Rgb { r: 248, g: 204, b: 0 };
const COL_PORTAL: Color = Color::Rgb { r: 204, g: 48, b: 204 };
const COL_ORB: Color = Color::Rgb { r: 141, g: 221, b: 238 };

#[derive(Clone, Copy, PartialEq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

const BLANK: Cell = Cell {
    ch: ' ',
    fg: Color::White,
    bg: BASE_BG,
};

/// Sentinel that differs from every real cell, so a fresh screen gets
/// fully painted.
const INVALID: Cell = Cell {
    ch: '\u{0}',
    fg: Color::Magenta,
    bg: Color::Magenta,
};

pub struct Renderer {
    out: BufWriter<Stdout>,
    front: Vec<Cell>,
    back: Vec<Cell>,
    ascii: bool,
}

impl Renderer {
    pub fn new(ascii: bool) -> Self {
        Renderer {
            out: BufWriter::new(io::stdout()),
            front: vec![BLANK; CANVAS_W * CANVAS_H],
            back: vec![INVALID; CANVAS_W * CANVAS_H],
            ascii,
        }
    }

    /// Enter raw mode and the alternate screen. Returns whether the
    /// terminal reports key Release events.
    pub fn init(&mut self) -> io::Result<bool> {
        terminal::enable_raw_mode()?;
        execute!(
            self.out,
            terminal::EnterAlternateScreen,
            cursor::Hide,
            Clear(ClearType::All),
            SetBackgroundColor(BASE_BG),
        )?;
        let release = terminal::supports_keyboard_enhancement().unwrap_or(false);
        if release {
            execute!(
                self.out,
                PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
            )?;
        }
        Ok(release)
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        let _ = execute!(self.out, PopKeyboardEnhancementFlags);
        execute!(
            self.out,
            cursor::Show,
            terminal::LeaveAlternateScreen,
        )?;
        terminal::disable_raw_mode()
    }

    // ── Level view ──

    pub fn draw(&mut self, world: &World, number: usize, total: usize) -> io::Result<()> {
        self.front.fill(BLANK);

        self.put_str(1, 0, &world.code, COL_GOLD);
        let counter = format!("{number}/{total}");
        self.put_str(CANVAS_W.saturating_sub(counter.len() + 1), 0, &counter, Color::White);

        for y in 0..GRID_H {
            for x in 0..GRID_W {
                if let Some(tile) = world.tile_at(x as i32, y as i32) {
                    let (a, b, fg) = self.tile_glyph(world, tile);
                    self.put(BOARD_X + 2 * x, BOARD_Y + y, a, fg);
                    self.put(BOARD_X + 2 * x + 1, BOARD_Y + y, b, fg);
                }
            }
        }

        self.draw_orb(world);
        self.apply_veil(world);
        self.draw_hints(world);

        self.flush()
    }

    fn draw_orb(&mut self, world: &World) {
        let (px, py) = world.player.position();
        let col = ((px as f32 / 16.0).round() as i32) + BOARD_X as i32;
        let row = ((py as f32 / 32.0).round() as i32) + BOARD_Y as i32;
        let fg = if world.player.flash_opacity().is_some() {
            Color::White
        } else {
            COL_ORB
        };
        for (i, ch) in ['(', ')'].into_iter().enumerate() {
            let c = col + i as i32;
            if (0..CANVAS_W as i32).contains(&c)
                && (BOARD_Y as i32..(BOARD_Y + GRID_H) as i32).contains(&row)
            {
                self.put(c as usize, row as usize, ch, fg);
            }
        }
    }

    fn apply_veil(&mut self, world: &World) {
        for y in 0..GRID_H {
            let cover = world.veil_cover(y);
            if cover >= 0.7 {
                for x in 0..CANVAS_W {
                    self.front[(BOARD_Y + y) * CANVAS_W + x] = BLANK;
                }
            } else if cover >= 0.35 {
                for x in 0..CANVAS_W {
                    self.front[(BOARD_Y + y) * CANVAS_W + x].fg = Color::DarkGrey;
                }
            }
        }
    }

    fn draw_hints(&mut self, world: &World) {
        let mut x = 1;
        if world.clear_bombs {
            self.put_str(x, CANVAS_H - 2, "clear bombs", COL_BOMB);
            x += 13;
        }
        if world.has_sensors() {
            self.put_str(x, CANVAS_H - 2, "activate sensors", COL_GREEN);
        }
        self.put_str(
            1,
            CANVAS_H - 1,
            "arrows: move   space: quit level",
            Color::DarkGrey,
        );
    }

    fn tile_glyph(&self, world: &World, tile: &Tile) -> (char, char, Color) {
        match &tile.kind {
            TileKind::Wall => {
                let ch = if self.ascii { '#' } else { '▓' };
                (ch, ch, COL_WALL)
            }
            TileKind::Bomb(b) => {
                if b.countdown == 0 {
                    let ch = if self.ascii { '*' } else { '✸' };
                    let fg = if b.blast_opacity > 0.5 {
                        Color::Yellow
                    } else {
                        COL_BOMB
                    };
                    (ch, ch, fg)
                } else {
                    let digit = char::from_digit(b.countdown.max(0) as u32, 10).unwrap_or('?');
                    let fg = if b.armed { Color::Yellow } else { COL_BOMB };
                    (if self.ascii { 'B' } else { '▣' }, digit, fg)
                }
            }
            TileKind::Trap(t) => {
                let (a, b) = match (t.axis, self.ascii) {
                    (Axis::Vertical, false) => ('║', ' '),
                    (Axis::Vertical, true) => ('|', ' '),
                    (Axis::Horizontal, false) => ('═', '═'),
                    (Axis::Horizontal, true) => ('-', '-'),
                };
                let fg = if t.timer > 0 {
                    // energy bar fading out while the sides close in
                    if Trap::bar_opacity(t.timer) > 0.5 {
                        COL_TRAP
                    } else {
                        Color::DarkBlue
                    }
                } else if t.pulse > 0.55 {
                    Color::Cyan
                } else {
                    COL_TRAP
                };
                (a, b, fg)
            }
            TileKind::TrapSide { axis, end } => {
                // the main tile sits on the far side of this block
                let (mx, my) = match (axis, end) {
                    (Axis::Vertical, End::Neg) => (tile.x as i32, tile.y as i32 + 1),
                    (Axis::Vertical, End::Pos) => (tile.x as i32, tile.y as i32 - 1),
                    (Axis::Horizontal, End::Neg) => (tile.x as i32 + 1, tile.y as i32),
                    (Axis::Horizontal, End::Pos) => (tile.x as i32 - 1, tile.y as i32),
                };
                let closed_in = matches!(
                    world.tile_at(mx, my).map(|t| &t.kind),
                    Some(TileKind::Trap(t)) if t.timer > 0 && Trap::side_offset(t.timer) > 8.0
                );
                let (a, b) = if closed_in {
                    if self.ascii { ('#', '#') } else { ('█', '█') }
                } else {
                    match (axis, end, self.ascii) {
                        (Axis::Vertical, End::Neg, false) => ('▄', '▄'),
                        (Axis::Vertical, End::Pos, false) => ('▀', '▀'),
                        (Axis::Horizontal, End::Neg, false) => (' ', '▐'),
                        (Axis::Horizontal, End::Pos, false) => ('▌', ' '),
                        (_, _, true) => ('%', '%'),
                    }
                };
                (a, b, COL_WALL)
            }
            TileKind::Deflector { orient } => {
                let ch = if self.ascii {
                    match orient {
                        Direction::Right | Direction::Left => '/',
                        Direction::Down | Direction::Up => '\\',
                    }
                } else {
                    match orient {
                        Direction::Right => '◤',
                        Direction::Down => '◥',
                        Direction::Left => '◢',
                        Direction::Up => '◣',
                    }
                };
                (ch, ch, COL_GREEN)
            }
            TileKind::Sensor(s) => {
                if s.activated() {
                    let ch = if self.ascii { '*' } else { '◆' };
                    (ch, ch, COL_GOLD)
                } else {
                    let pending = [
                        Direction::Right,
                        Direction::Down,
                        Direction::Left,
                        Direction::Up,
                    ]
                    .into_iter()
                    .filter(|d| s.is_pending(*d))
                    .count();
                    let ch = if self.ascii { '+' } else { '◇' };
                    let fg = if pending == 4 { COL_GREEN } else { Color::Cyan };
                    (ch, ch, fg)
                }
            }
            TileKind::Wormhole { .. } => {
                let fg = if world.ticks() % 2 == 0 {
                    Color::Grey
                } else {
                    Color::DarkGrey
                };
                ('(', ')', fg)
            }
            TileKind::Portal(_) => {
                if world.warn_opacity > 0.5 {
                    ('!', '!', Color::White)
                } else {
                    ('[', ']', COL_PORTAL)
                }
            }
            TileKind::Overlap { children } => children
                .first()
                .and_then(|c| world.tile(*c))
                .map(|t| self.tile_glyph(world, t))
                .unwrap_or((' ', ' ', Color::White)),
        }
    }

    // ── Title view ──

    pub fn draw_title(
        &mut self,
        typed: &str,
        code: &str,
        number: usize,
        total: usize,
    ) -> io::Result<()> {
        self.front.fill(BLANK);
        self.put_str(4, 2, "G R I D L O C K", COL_ORB);
        self.put_str(4, 4, "slide the orb into the exit portal", Color::Grey);
        self.put_str(4, 6, "arrows: move    space: quit a level", Color::DarkGrey);
        let entry = format!("level code: {typed:_<4}");
        self.put_str(4, 9, &entry, COL_GOLD);
        let start = format!("enter: start at {code}  ({number}/{total})");
        self.put_str(4, 11, &start, Color::Grey);
        self.put_str(4, 13, "esc: leave", Color::DarkGrey);
        self.flush()
    }

    // ── Canvas primitives ──

    fn put(&mut self, x: usize, y: usize, ch: char, fg: Color) {
        if x < CANVAS_W && y < CANVAS_H {
            self.front[y * CANVAS_W + x] = Cell { ch, fg, bg: BASE_BG };
        }
    }

    fn put_str(&mut self, x: usize, y: usize, text: &str, fg: Color) {
        for (i, ch) in text.chars().enumerate() {
            self.put(x + i, y, ch, fg);
        }
    }

    /// Emit terminal commands for the cells that changed since the last
    /// frame, then remember the frame.
    fn flush(&mut self) -> io::Result<()> {
        let mut last_fg = None;
        let mut last_bg = None;
        for y in 0..CANVAS_H {
            for x in 0..CANVAS_W {
                let idx = y * CANVAS_W + x;
                let cell = self.front[idx];
                if cell == self.back[idx] {
                    continue;
                }
                queue!(self.out, MoveTo(x as u16, y as u16))?;
                if last_fg != Some(cell.fg) {
                    queue!(self.out, SetForegroundColor(cell.fg))?;
                    last_fg = Some(cell.fg);
                }
                if last_bg != Some(cell.bg) {
                    queue!(self.out, SetBackgroundColor(cell.bg))?;
                    last_bg = Some(cell.bg);
                }
                queue!(self.out, Print(cell.ch))?;
            }
        }
        self.out.flush()?;
        self.back.copy_from_slice(&self.front);
        Ok(())
    }
}
