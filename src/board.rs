//! Board: the 8x8 grid of coloured blocks, run detection and column compaction.

use crate::piece::Piece;
use rand::Rng;
use std::collections::BTreeSet;

/// Board is GRID_SIZE x GRID_SIZE cells.
pub const GRID_SIZE: usize = 8;

/// Shortest run of same-coloured cells that clears.
pub const MIN_RUN: usize = 3;

/// Sanrio block colours.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlockColor {
    HelloKitty,
    MyMelody,
    Keroppi,
    Cinnamoroll,
    Pompompurin,
}

impl BlockColor {
    pub const ALL: [Self; 5] = [
        Self::HelloKitty,
        Self::MyMelody,
        Self::Keroppi,
        Self::Cinnamoroll,
        Self::Pompompurin,
    ];

    /// Index 0..5 into theme colour tables.
    pub fn index(self) -> usize {
        match self {
            Self::HelloKitty => 0,
            Self::MyMelody => 1,
            Self::Keroppi => 2,
            Self::Cinnamoroll => 3,
            Self::Pompompurin => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::HelloKitty => "Hello Kitty Bow",
            Self::MyMelody => "My Melody Flower",
            Self::Keroppi => "Keroppi Lily Pad",
            Self::Cinnamoroll => "Cinnamoroll Cloud",
            Self::Pompompurin => "Pompompurin Pudding",
        }
    }

    /// Letter drawn on the block.
    pub fn initial(self) -> char {
        match self {
            Self::HelloKitty => 'H',
            Self::MyMelody => 'M',
            Self::Keroppi => 'K',
            Self::Cinnamoroll => 'C',
            Self::Pompompurin => 'P',
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Single cell: either empty or a block of one colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Block(BlockColor),
}

impl Cell {
    #[inline]
    pub fn color(self) -> Option<BlockColor> {
        match self {
            Self::Empty => None,
            Self::Block(c) => Some(c),
        }
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self == Self::Empty
    }
}

/// A block moved by compaction (or dropped in from above the board on refill).
/// `from_row` is negative for refill blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockFall {
    pub column: usize,
    pub from_row: i32,
    pub to_row: usize,
    pub color: BlockColor,
}

/// Grid of cells. y=0 is the top row; cells[y][x].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Board {
    cells: [[Cell; GRID_SIZE]; GRID_SIZE],
}

impl Board {
    pub fn new() -> Self {
        Self::default()
    }

    /// Board with every cell holding a random colour (classic mode start).
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut board = Self::new();
        for row in &mut board.cells {
            for cell in row.iter_mut() {
                *cell = Cell::Block(BlockColor::random(rng));
            }
        }
        board
    }

    #[inline]
    fn index(x: i32, y: i32) -> Option<(usize, usize)> {
        let (x, y) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        (x < GRID_SIZE && y < GRID_SIZE).then_some((x, y))
    }

    /// Cell at (x, y), or None when off the board.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<Cell> {
        Self::index(x, y).map(|(x, y)| self.cells[y][x])
    }

    /// Write a cell; writes outside the board are ignored.
    #[inline]
    pub fn set(&mut self, x: i32, y: i32, cell: Cell) {
        if let Some((x, y)) = Self::index(x, y) {
            self.cells[y][x] = cell;
        }
    }

    #[inline]
    pub fn is_occupied(&self, x: i32, y: i32) -> bool {
        matches!(self.get(x, y), Some(Cell::Block(_)))
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> Cell {
        self.cells[y][x]
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().flatten().all(|c| c.is_empty())
    }

    /// True if every cell of the piece is inside the side walls, above the floor, and
    /// not on an occupied cell. Rows above the board (y < 0) are always free.
    pub fn can_place(&self, piece: &Piece) -> bool {
        piece.blocks().all(|(x, y, _)| {
            if x < 0 || x >= GRID_SIZE as i32 || y >= GRID_SIZE as i32 {
                return false;
            }
            y < 0 || !self.is_occupied(x, y)
        })
    }

    /// Every cell belonging to a horizontal or vertical run of MIN_RUN or more
    /// identical colours. Each consecutive triple is tested on its own, so longer
    /// runs are covered by the union.
    pub fn find_matches(&self) -> BTreeSet<(usize, usize)> {
        let mut found = BTreeSet::new();
        for y in 0..GRID_SIZE {
            for x in 0..=GRID_SIZE - MIN_RUN {
                if let Some(c) = self.at(x, y).color() {
                    if (1..MIN_RUN).all(|k| self.at(x + k, y) == Cell::Block(c)) {
                        found.extend((0..MIN_RUN).map(|k| (x + k, y)));
                    }
                }
            }
        }
        for x in 0..GRID_SIZE {
            for y in 0..=GRID_SIZE - MIN_RUN {
                if let Some(c) = self.at(x, y).color() {
                    if (1..MIN_RUN).all(|k| self.at(x, y + k) == Cell::Block(c)) {
                        found.extend((0..MIN_RUN).map(|k| (x, y + k)));
                    }
                }
            }
        }
        found
    }

    /// Group around a picked cell: the cell itself plus every same-coloured cell
    /// reached walking left, right, up and down from it. Empty unless the group has
    /// at least MIN_RUN cells.
    pub fn matches_through(&self, x: usize, y: usize) -> BTreeSet<(usize, usize)> {
        let Some(color) = self.get(x as i32, y as i32).and_then(Cell::color) else {
            return BTreeSet::new();
        };
        let mut group = BTreeSet::from([(x, y)]);
        for (dx, dy) in [(-1i32, 0i32), (1, 0), (0, -1), (0, 1)] {
            let (mut nx, mut ny) = (x as i32 + dx, y as i32 + dy);
            while self.get(nx, ny) == Some(Cell::Block(color)) {
                group.insert((nx as usize, ny as usize));
                nx += dx;
                ny += dy;
            }
        }
        if group.len() >= MIN_RUN {
            group
        } else {
            BTreeSet::new()
        }
    }

    /// Empty the given cells.
    pub fn remove(&mut self, cells: &BTreeSet<(usize, usize)>) {
        for &(x, y) in cells {
            if x < GRID_SIZE && y < GRID_SIZE {
                self.cells[y][x] = Cell::Empty;
            }
        }
    }

    /// Gravity: pack each column's blocks against the floor, keeping their order.
    /// Vacancies stay empty. Returns one entry per block that moved.
    pub fn collapse(&mut self) -> Vec<BlockFall> {
        self.compact(|| None)
    }

    /// Gravity, then fill each column's vacancies with fresh random blocks that
    /// fall in from above the board.
    pub fn collapse_and_refill<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Vec<BlockFall> {
        self.compact(|| Some(BlockColor::random(rng)))
    }

    fn compact(&mut self, mut refill: impl FnMut() -> Option<BlockColor>) -> Vec<BlockFall> {
        let mut falls = Vec::new();
        for x in 0..GRID_SIZE {
            // Rows at and below `write` are packed.
            let mut write = GRID_SIZE;
            for y in (0..GRID_SIZE).rev() {
                if let Cell::Block(color) = self.cells[y][x] {
                    write -= 1;
                    if write != y {
                        self.cells[write][x] = Cell::Block(color);
                        self.cells[y][x] = Cell::Empty;
                        falls.push(BlockFall {
                            column: x,
                            from_row: y as i32,
                            to_row: write,
                            color,
                        });
                    }
                }
            }
            let vacancies = write;
            for y in 0..vacancies {
                if let Some(color) = refill() {
                    self.cells[y][x] = Cell::Block(color);
                    falls.push(BlockFall {
                        column: x,
                        from_row: y as i32 - vacancies as i32,
                        to_row: y,
                        color,
                    });
                }
            }
        }
        falls
    }

    /// True when no empty cell sits below a block in any column.
    pub fn is_settled(&self) -> bool {
        (0..GRID_SIZE).all(|x| {
            let mut seen_block = false;
            (0..GRID_SIZE).all(|y| {
                let cell = self.at(x, y);
                if cell.is_empty() {
                    !seen_block
                } else {
                    seen_block = true;
                    true
                }
            })
        })
    }
}
