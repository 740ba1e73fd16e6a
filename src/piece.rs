//! Shapes: catalog of offsets, coloured previews and the falling piece.

use crate::board::{BlockColor, GRID_SIZE};
use rand::Rng;

/// Spawn column for the anchor (horizontal centre).
pub const SPAWN_X: i32 = GRID_SIZE as i32 / 2 - 1;

/// Spawn row for the anchor: three rows above the board.
pub const SPAWN_Y: i32 = -3;

/// Shape kinds; every shape has four cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Line,
    Square,
    Tee,
    Ell,
}

impl ShapeKind {
    pub const ALL: [Self; 4] = [Self::Line, Self::Square, Self::Tee, Self::Ell];

    /// 4 cells relative to the anchor (0,0); each (dx, dy).
    pub fn offsets(self) -> &'static [(i32, i32); 4] {
        match self {
            Self::Line => &[(0, 0), (0, 1), (0, 2), (0, 3)],
            Self::Square => &[(0, 0), (1, 0), (0, 1), (1, 1)],
            Self::Tee => &[(0, 0), (1, 0), (2, 0), (1, 1)],
            Self::Ell => &[(0, 0), (0, 1), (0, 2), (1, 2)],
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Rotate an offset about the anchor by `r` quarter turns clockwise.
pub fn rotate_offset(dx: i32, dy: i32, r: u8) -> (i32, i32) {
    match r % 4 {
        1 => (-dy, dx),
        2 => (-dx, -dy),
        3 => (dy, -dx),
        _ => (dx, dy),
    }
}

/// One coloured cell of a shape, relative to the anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PieceCell {
    pub dx: i32,
    pub dy: i32,
    pub color: BlockColor,
}

/// Shape with colours assigned but no position: the "Next" preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextPiece {
    pub kind: ShapeKind,
    pub cells: [PieceCell; 4],
}

impl NextPiece {
    pub fn new(kind: ShapeKind, colors: [BlockColor; 4]) -> Self {
        let offsets = kind.offsets();
        let cells = std::array::from_fn(|i| PieceCell {
            dx: offsets[i].0,
            dy: offsets[i].1,
            color: colors[i],
        });
        Self { kind, cells }
    }

    /// Random shape; each cell gets its own random colour.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let kind = ShapeKind::random(rng);
        let colors = std::array::from_fn(|_| BlockColor::random(rng));
        Self::new(kind, colors)
    }
}

/// Falling piece with anchor position and rotation (0..4).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Piece {
    pub kind: ShapeKind,
    pub cells: [PieceCell; 4],
    pub x: i32,
    pub y: i32,
    pub rotation: u8,
}

impl Piece {
    pub fn new(next: NextPiece, x: i32, y: i32) -> Self {
        Self {
            kind: next.kind,
            cells: next.cells,
            x,
            y,
            rotation: 0,
        }
    }

    /// Piece at the spawn anchor with rotation 0.
    pub fn spawn(next: NextPiece) -> Self {
        Self::new(next, SPAWN_X, SPAWN_Y)
    }

    /// Board coordinates and colour of each cell at the current rotation.
    pub fn blocks(&self) -> impl Iterator<Item = (i32, i32, BlockColor)> + '_ {
        self.cells.iter().map(|c| {
            let (rdx, rdy) = rotate_offset(c.dx, c.dy, self.rotation);
            (self.x + rdx, self.y + rdy, c.color)
        })
    }

    /// Copy moved by (dx, dy).
    pub fn shifted(&self, dx: i32, dy: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            ..self.clone()
        }
    }

    /// Copy turned by `quarter_turns` clockwise (3 = one turn counter-clockwise).
    pub fn rotated(&self, quarter_turns: u8) -> Self {
        Self {
            rotation: (self.rotation + quarter_turns) % 4,
            ..self.clone()
        }
    }

    /// True when every cell is above the board.
    pub fn is_above_board(&self) -> bool {
        self.blocks().all(|(_, y, _)| y < 0)
    }
}
