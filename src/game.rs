//! Game engine: playfield, piece catalog, rotation, line clears, scoring.

use std::collections::VecDeque;
use std::time::Duration;
use thiserror::Error;

/// Gravity speed added (cells per second) on every level-up.
const SPEED_INCREMENT: f64 = 0.5;

/// Cleared lines needed per level-up.
const LINES_PER_LEVEL: u32 = 5;

/// Points per cleared line, multiplied by the current level.
const POINTS_PER_LINE: u32 = 100;

#[derive(Debug, Error)]
pub enum GameError {
    #[error("playfield dimensions must be positive, got {0}x{1}")]
    InvalidDimensions(u16, u16),
}

/// Tetromino kinds in catalog order (I, J, L, O, S, Z, T).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TetrominoKind {
    I,
    J,
    L,
    O,
    S,
    Z,
    T,
}

impl TetrominoKind {
    pub const ALL: [Self; 7] = [Self::I, Self::J, Self::L, Self::O, Self::S, Self::Z, Self::T];

    /// Occupancy matrix in spawn orientation, row-major, 1 = occupied.
    fn rows(&self) -> &'static [&'static [u8]] {
        match self {
            Self::I => &[&[1, 1, 1, 1]],
            Self::J => &[&[1, 0, 0], &[1, 1, 1]],
            Self::L => &[&[0, 0, 1], &[1, 1, 1]],
            Self::O => &[&[1, 1], &[1, 1]],
            Self::S => &[&[0, 1, 1], &[1, 1, 0]],
            Self::Z => &[&[1, 1, 0], &[0, 1, 1]],
            Self::T => &[&[0, 1, 0], &[1, 1, 1]],
        }
    }

    /// Colour index 0..=6 for theme.piece_color().
    pub fn color_index(&self) -> u8 {
        match self {
            Self::I => 0, // Cyan
            Self::J => 1, // Blue
            Self::L => 2, // Orange
            Self::O => 3, // Yellow
            Self::S => 4, // Green
            Self::Z => 5, // Red
            Self::T => 6, // Magenta
        }
    }
}

/// Immutable occupancy matrix of a piece. Rows and columns may differ
/// (the I piece is 1x4 in spawn orientation, 4x1 after one rotation).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shape {
    rows: Vec<Vec<bool>>,
}

impl Shape {
    pub fn new(rows: Vec<Vec<bool>>) -> Self {
        debug_assert!(!rows.is_empty() && !rows[0].is_empty());
        debug_assert!(rows.iter().all(|r| r.len() == rows[0].len()));
        Self { rows }
    }

    pub fn for_kind(kind: TetrominoKind) -> Self {
        Self::new(
            kind.rows()
                .iter()
                .map(|row| row.iter().map(|&c| c != 0).collect())
                .collect(),
        )
    }

    #[inline]
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    pub fn num_cols(&self) -> usize {
        self.rows[0].len()
    }

    /// True if the relative cell (x, y) is occupied.
    #[inline]
    pub fn occupied(&self, x: usize, y: usize) -> bool {
        self.rows[y][x]
    }

    /// Occupied relative cells as (x, y) pairs.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.rows.iter().enumerate().flat_map(|(y, row)| {
            row.iter()
                .enumerate()
                .filter(|&(_, &c)| c)
                .map(move |(x, _)| (x, y))
        })
    }

    /// 90-degree clockwise rotation of the bounding box: an R x C matrix
    /// becomes C x R with rotated[x][R-1-y] = self[y][x]. Always returns a
    /// new shape so the caller can reject it and keep the original.
    pub fn rotate_cw(&self) -> Self {
        let (r, c) = (self.num_rows(), self.num_cols());
        let mut rotated = vec![vec![false; r]; c];
        for y in 0..r {
            for x in 0..c {
                rotated[x][r - 1 - y] = self.rows[y][x];
            }
        }
        Self { rows: rotated }
    }
}

/// Single playfield cell: empty or filled with a colour index 0..=6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Filled(u8),
}

/// Current piece: shape, colour and top-left anchor in playfield coordinates.
#[derive(Debug, Clone)]
pub struct Piece {
    pub shape: Shape,
    pub color_index: u8,
    pub x: i32,
    pub y: i32,
}

impl Piece {
    pub fn new(kind: TetrominoKind, x: i32, y: i32) -> Self {
        Self {
            shape: Shape::for_kind(kind),
            color_index: kind.color_index(),
            x,
            y,
        }
    }
}

/// Playfield: grid of cells. y=0 is top; rows are stored [0..height].
#[derive(Debug, Clone)]
pub struct Playfield {
    pub width: usize,
    pub height: usize,
    /// rows[y][x] = cell. rows[0] is top.
    rows: VecDeque<Vec<Cell>>,
}

impl Playfield {
    pub fn new(width: u16, height: u16) -> Result<Self, GameError> {
        if width == 0 || height == 0 {
            return Err(GameError::InvalidDimensions(width, height));
        }
        let (w, h) = (width as usize, height as usize);
        let rows = (0..h).map(|_| vec![Cell::Empty; w]).collect();
        Ok(Self {
            width: w,
            height: h,
            rows,
        })
    }

    #[inline]
    pub fn get(&self, x: usize, y: usize) -> Option<Cell> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.rows.get(y).and_then(|row| row.get(x)).copied()
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            if let Some(row) = self.rows.get_mut(y) {
                row[x] = cell;
            }
        }
    }

    /// True if every occupied cell of `shape`, anchored at (x, y), lands
    /// inside the playfield on an empty cell. Pure; no side effects.
    pub fn can_place(&self, shape: &Shape, x: i32, y: i32) -> bool {
        for (cx, cy) in shape.cells() {
            let nx = x + cx as i32;
            let ny = y + cy as i32;
            if nx < 0 || nx >= self.width as i32 || ny < 0 || ny >= self.height as i32 {
                return false;
            }
            if self.get(nx as usize, ny as usize) != Some(Cell::Empty) {
                return false;
            }
        }
        true
    }

    /// Commit a piece's occupied cells into the grid. The caller must have
    /// validated the position with can_place; this writes unconditionally.
    pub fn place(&mut self, shape: &Shape, x: i32, y: i32, color_index: u8) {
        for (cx, cy) in shape.cells() {
            let nx = x + cx as i32;
            let ny = y + cy as i32;
            if nx >= 0 && ny >= 0 {
                self.set(nx as usize, ny as usize, Cell::Filled(color_index));
            }
        }
    }

    /// Remove every fully occupied row and push an equal number of empty rows
    /// at the top, keeping the grid height constant. Returns the count.
    ///
    /// Two-phase: full rows are collected over the grid as it is on entry,
    /// then removed top-down. Deleting while scanning would shift later row
    /// indices under the scan on multi-row clears.
    pub fn clear_full_rows(&mut self) -> usize {
        let full: Vec<usize> = (0..self.height)
            .filter(|&y| self.rows[y].iter().all(|&c| c != Cell::Empty))
            .collect();
        for &y in full.iter().rev() {
            self.rows.remove(y);
        }
        for _ in 0..full.len() {
            self.rows.push_front(vec![Cell::Empty; self.width]);
        }
        full.len()
    }
}

/// Uniform random draw over the 7 kinds; no bag, repeats allowed.
#[derive(Debug, Clone)]
pub struct PieceRng {
    state: u32,
}

impl PieceRng {
    pub fn new(seed: u32) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    /// Seed from the system clock.
    pub fn from_entropy() -> Self {
        let nanos = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.subsec_nanos() ^ d.as_secs() as u32)
            .unwrap_or(0x1234_5678);
        Self::new(nanos)
    }

    fn next_rand(&mut self) -> u32 {
        self.state = self.state.wrapping_mul(1103515245).wrapping_add(12345);
        self.state >> 16
    }

    pub fn next_kind(&mut self) -> TetrominoKind {
        TetrominoKind::ALL[(self.next_rand() % 7) as usize]
    }
}

/// Game session: playfield, current piece, score, level, gravity timing.
/// Mutated only through the per-tick methods below; rendering reads fields.
#[derive(Debug)]
pub struct GameState {
    pub playfield: Playfield,
    pub piece: Piece,
    pub score: u32,
    pub level: u32,
    pub lines_cleared: u32,
    pub game_over: bool,
    /// Gravity speed in cells per second.
    fall_speed: f64,
    /// Elapsed-time accumulator; a gravity step fires at 1/fall_speed.
    fall_timer: f64,
    /// Cleared lines since the last level-up (kept below LINES_PER_LEVEL).
    lines_toward_level: u32,
    rng: PieceRng,
}

impl GameState {
    pub fn new(width: u16, height: u16, config: &crate::GameConfig) -> Result<Self, GameError> {
        let playfield = Playfield::new(width, height)?;
        let mut rng = match config.seed {
            Some(seed) => PieceRng::new(seed),
            None => PieceRng::from_entropy(),
        };
        let level = config.initial_level.max(1);
        let piece = Self::spawn_piece(playfield.width, rng.next_kind());
        let mut state = Self {
            playfield,
            piece,
            score: 0,
            level,
            lines_cleared: 0,
            game_over: false,
            fall_speed: 1.0 + f64::from(level - 1) * SPEED_INCREMENT,
            fall_timer: 0.0,
            lines_toward_level: 0,
            rng,
        };
        if !state
            .playfield
            .can_place(&state.piece.shape, state.piece.x, state.piece.y)
        {
            state.game_over = true;
        }
        Ok(state)
    }

    /// New piece horizontally centred at the top row.
    fn spawn_piece(width: usize, kind: TetrominoKind) -> Piece {
        let shape = Shape::for_kind(kind);
        let x = width as i32 / 2 - shape.num_cols() as i32 / 2;
        Piece::new(kind, x, 0)
    }

    /// Advance gravity by `dt` of real time. At most one gravity step fires
    /// per call; the frontend calls this once per frame.
    pub fn advance_time(&mut self, dt: Duration) {
        if self.game_over {
            return;
        }
        self.fall_timer += dt.as_secs_f64();
        if self.fall_timer >= 1.0 / self.fall_speed {
            self.fall_timer = 0.0;
            self.step_down();
        }
    }

    /// One gravity step: move down, or lock + clear + respawn when blocked.
    fn step_down(&mut self) {
        if self
            .playfield
            .can_place(&self.piece.shape, self.piece.x, self.piece.y + 1)
        {
            self.piece.y += 1;
            return;
        }
        self.playfield.place(
            &self.piece.shape,
            self.piece.x,
            self.piece.y,
            self.piece.color_index,
        );
        let cleared = self.playfield.clear_full_rows();
        if cleared > 0 {
            self.award_clears(cleared as u32);
        }
        self.spawn_next();
    }

    /// Score and level progression for one clear event.
    fn award_clears(&mut self, cleared: u32) {
        self.score += cleared * POINTS_PER_LINE * self.level;
        self.lines_cleared += cleared;
        self.lines_toward_level += cleared;
        while self.lines_toward_level >= LINES_PER_LEVEL {
            self.level += 1;
            self.fall_speed += SPEED_INCREMENT;
            self.lines_toward_level -= LINES_PER_LEVEL;
        }
    }

    fn spawn_next(&mut self) {
        self.piece = Self::spawn_piece(self.playfield.width, self.rng.next_kind());
        if !self
            .playfield
            .can_place(&self.piece.shape, self.piece.x, self.piece.y)
        {
            self.game_over = true;
        }
    }

    pub fn move_left(&mut self) {
        if self.game_over {
            return;
        }
        if self
            .playfield
            .can_place(&self.piece.shape, self.piece.x - 1, self.piece.y)
        {
            self.piece.x -= 1;
        }
    }

    pub fn move_right(&mut self) {
        if self.game_over {
            return;
        }
        if self
            .playfield
            .can_place(&self.piece.shape, self.piece.x + 1, self.piece.y)
        {
            self.piece.x += 1;
        }
    }

    /// One row down at the player's request; never locks the piece
    /// (the next gravity step does that).
    pub fn soft_drop(&mut self) {
        if self.game_over {
            return;
        }
        if self
            .playfield
            .can_place(&self.piece.shape, self.piece.x, self.piece.y + 1)
        {
            self.piece.y += 1;
        }
    }

    /// Rotate clockwise if the rotated shape fits at the current anchor;
    /// otherwise the piece keeps its shape. No kick offsets are tried.
    pub fn rotate(&mut self) {
        if self.game_over {
            return;
        }
        let rotated = self.piece.shape.rotate_cw();
        if self
            .playfield
            .can_place(&rotated, self.piece.x, self.piece.y)
        {
            self.piece.shape = rotated;
        }
    }

    /// Drop to the lowest valid row. The piece locks on the next gravity step.
    pub fn hard_drop(&mut self) {
        if self.game_over {
            return;
        }
        while self
            .playfield
            .can_place(&self.piece.shape, self.piece.x, self.piece.y + 1)
        {
            self.piece.y += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> crate::GameConfig {
        crate::GameConfig {
            initial_level: 1,
            seed: Some(7),
        }
    }

    fn state(width: u16, height: u16) -> GameState {
        GameState::new(width, height, &config()).unwrap()
    }

    /// Fill row `y` completely, skipping the columns in `except`.
    fn fill_row(pf: &mut Playfield, y: usize, except: &[usize]) {
        for x in 0..pf.width {
            if !except.contains(&x) {
                pf.set(x, y, Cell::Filled(0));
            }
        }
    }

    fn second() -> Duration {
        Duration::from_secs(1)
    }

    #[test]
    fn test_new_playfield_is_empty() {
        let pf = Playfield::new(10, 20).unwrap();
        for y in 0..20 {
            for x in 0..10 {
                assert_eq!(pf.get(x, y), Some(Cell::Empty));
            }
        }
        assert_eq!(pf.get(10, 0), None);
        assert_eq!(pf.get(0, 20), None);
    }

    #[test]
    fn test_zero_dimensions_rejected() {
        assert!(matches!(
            Playfield::new(0, 20),
            Err(GameError::InvalidDimensions(0, 20))
        ));
        assert!(Playfield::new(10, 0).is_err());
    }

    #[test]
    fn test_rotation_swaps_dimensions() {
        let i = Shape::for_kind(TetrominoKind::I);
        assert_eq!((i.num_rows(), i.num_cols()), (1, 4));
        let r = i.rotate_cw();
        assert_eq!((r.num_rows(), r.num_cols()), (4, 1));
    }

    #[test]
    fn test_rotation_index_law() {
        // rotated[x][R-1-y] == original[y][x], checked on the asymmetric J.
        let j = Shape::for_kind(TetrominoKind::J);
        let r = j.rotate_cw();
        let rows = j.num_rows();
        for y in 0..j.num_rows() {
            for x in 0..j.num_cols() {
                assert_eq!(r.occupied(rows - 1 - y, x), j.occupied(x, y));
            }
        }
    }

    #[test]
    fn test_four_rotations_identity() {
        for kind in TetrominoKind::ALL {
            let s = Shape::for_kind(kind);
            let r4 = s.rotate_cw().rotate_cw().rotate_cw().rotate_cw();
            assert_eq!(r4, s, "{kind:?}");
        }
    }

    #[test]
    fn test_can_place_bounds_and_occupancy() {
        let mut pf = Playfield::new(10, 20).unwrap();
        let o = Shape::for_kind(TetrominoKind::O);
        assert!(pf.can_place(&o, 0, 0));
        assert!(pf.can_place(&o, 8, 18));
        assert!(!pf.can_place(&o, -1, 0)); // left wall
        assert!(!pf.can_place(&o, 9, 0)); // right wall (cell at x=10)
        assert!(!pf.can_place(&o, 0, 19)); // floor (cell at y=20)
        assert!(!pf.can_place(&o, 0, -1)); // above the top
        pf.set(4, 4, Cell::Filled(2));
        assert!(!pf.can_place(&o, 4, 4));
        assert!(!pf.can_place(&o, 3, 3));
        assert!(pf.can_place(&o, 5, 4));
    }

    #[test]
    fn test_place_writes_color() {
        let mut pf = Playfield::new(10, 20).unwrap();
        let t = Shape::for_kind(TetrominoKind::T);
        pf.place(&t, 3, 17, 6);
        assert_eq!(pf.get(4, 17), Some(Cell::Filled(6)));
        assert_eq!(pf.get(3, 18), Some(Cell::Filled(6)));
        assert_eq!(pf.get(3, 17), Some(Cell::Empty));
    }

    #[test]
    fn test_clear_single_row() {
        let mut pf = Playfield::new(10, 20).unwrap();
        fill_row(&mut pf, 13, &[]);
        pf.set(0, 12, Cell::Filled(1));
        assert_eq!(pf.clear_full_rows(), 1);
        assert_eq!(pf.height, 20);
        // Row above the cleared one shifted down by one.
        assert_eq!(pf.get(0, 13), Some(Cell::Filled(1)));
        for x in 0..10 {
            assert_eq!(pf.get(x, 12), Some(Cell::Empty));
        }
    }

    #[test]
    fn test_clear_nonadjacent_rows_two_phase() {
        // Full rows at 17 and 19 with a survivor at 18; a same-pass deletion
        // would mis-index the second full row after removing the first.
        let mut pf = Playfield::new(4, 20).unwrap();
        fill_row(&mut pf, 17, &[]);
        fill_row(&mut pf, 19, &[]);
        pf.set(2, 18, Cell::Filled(3));
        assert_eq!(pf.clear_full_rows(), 2);
        assert_eq!(pf.height, 20);
        assert_eq!(pf.get(2, 19), Some(Cell::Filled(3)));
        for y in 0..19 {
            for x in 0..4 {
                assert_eq!(pf.get(x, y), Some(Cell::Empty), "({x},{y})");
            }
        }
    }

    #[test]
    fn test_scoring_per_clear() {
        let mut s = state(10, 20);
        s.level = 3;
        s.award_clears(1);
        assert_eq!(s.score, 300);
        s.score = 0;
        s.level = 2;
        s.lines_toward_level = 0;
        s.award_clears(4);
        assert_eq!(s.score, 800);
    }

    #[test]
    fn test_level_up_every_five_lines() {
        let mut s = state(10, 20);
        s.award_clears(4);
        assert_eq!(s.level, 1);
        s.award_clears(1);
        assert_eq!(s.level, 2);
        assert_eq!(s.lines_toward_level, 0);
        // Ten accumulated lines in one event levels up twice.
        s.award_clears(10);
        assert_eq!(s.level, 4);
        assert_eq!(s.lines_cleared, 15);
    }

    #[test]
    fn test_o_piece_drops_to_floor() {
        let mut s = state(10, 20);
        s.piece = Piece::new(TetrominoKind::O, 4, 0);
        // 18 steps to reach y=18, one more to lock and respawn.
        for _ in 0..18 {
            s.advance_time(second());
        }
        assert_eq!(s.piece.y, 18);
        s.advance_time(second());
        assert_eq!(s.piece.y, 0);
        assert_eq!(s.score, 0);
        assert_eq!(s.lines_cleared, 0);
        assert!(!s.game_over);
        assert_eq!(s.playfield.get(4, 18), Some(Cell::Filled(3)));
        assert_eq!(s.playfield.get(5, 19), Some(Cell::Filled(3)));
    }

    #[test]
    fn test_single_cell_completes_row() {
        let mut s = state(10, 20);
        fill_row(&mut s.playfield, 19, &[0]);
        s.piece = Piece {
            shape: Shape::new(vec![vec![true]]),
            color_index: 0,
            x: 0,
            y: 0,
        };
        s.hard_drop();
        assert_eq!(s.piece.y, 19);
        s.advance_time(second()); // lock + clear
        assert_eq!(s.lines_cleared, 1);
        assert_eq!(s.score, 100);
        for x in 0..10 {
            assert_eq!(s.playfield.get(x, 19), Some(Cell::Empty));
        }
    }

    #[test]
    fn test_gravity_waits_for_fall_interval() {
        let mut s = state(10, 20);
        s.piece = Piece::new(TetrominoKind::O, 4, 0);
        s.advance_time(Duration::from_millis(400));
        assert_eq!(s.piece.y, 0);
        s.advance_time(Duration::from_millis(700));
        assert_eq!(s.piece.y, 1);
    }

    #[test]
    fn test_moves_respect_walls_and_stack() {
        let mut s = state(10, 20);
        s.piece = Piece::new(TetrominoKind::O, 0, 0);
        s.move_left();
        assert_eq!(s.piece.x, 0);
        s.piece.x = 8;
        s.move_right();
        assert_eq!(s.piece.x, 8);
        s.playfield.set(7, 0, Cell::Filled(1));
        s.move_left();
        assert_eq!(s.piece.x, 8);
    }

    #[test]
    fn test_rotation_rejected_keeps_shape() {
        let mut s = state(10, 20);
        // I at the bottom row: rotating to 4x1 would run past the floor.
        s.piece = Piece::new(TetrominoKind::I, 3, 19);
        let before = s.piece.shape.clone();
        s.rotate();
        assert_eq!(s.piece.shape, before);
        s.piece.y = 10;
        s.rotate();
        assert_eq!((s.piece.shape.num_rows(), s.piece.shape.num_cols()), (4, 1));
    }

    #[test]
    fn test_blocked_spawn_is_game_over() {
        let mut s = state(10, 20);
        // Rows 0-1 blocked but not full, so the lock below clears nothing.
        fill_row(&mut s.playfield, 0, &[0]);
        fill_row(&mut s.playfield, 1, &[0]);
        s.piece = Piece::new(TetrominoKind::O, 4, 18);
        s.advance_time(second()); // locks; respawn collides with rows 0-1
        assert!(s.game_over);

        // All mutators are no-ops from here on.
        let piece_x = s.piece.x;
        let piece_y = s.piece.y;
        s.move_left();
        s.move_right();
        s.rotate();
        s.soft_drop();
        s.hard_drop();
        s.advance_time(second());
        assert_eq!((s.piece.x, s.piece.y), (piece_x, piece_y));
        assert_eq!(s.playfield.get(1, 0), Some(Cell::Filled(0)));
        assert_eq!(s.playfield.get(4, 18), Some(Cell::Filled(3)));
    }

    #[test]
    fn test_rng_seeded_sequence_repeats() {
        let mut a = PieceRng::new(42);
        let mut b = PieceRng::new(42);
        for _ in 0..50 {
            assert_eq!(a.next_kind(), b.next_kind());
        }
    }
}
