//! Sub-cell addressing: the four slots of a cell and the doubled global grid.

use std::fmt;

/// One quadrant of a cell's 2×2 sub-grid. `x` is horizontal, `y` vertical (0 = bottom row).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot {
    x: u8,
    y: u8,
}

impl Slot {
    /// Canonical order used for seeding scans and splitting slots across units.
    pub const ALL: [Self; 4] = [
        Self { x: 0, y: 0 },
        Self { x: 1, y: 0 },
        Self { x: 0, y: 1 },
        Self { x: 1, y: 1 },
    ];

    /// Returns `None` unless both components are 0 or 1.
    pub const fn new(x: u8, y: u8) -> Option<Self> {
        if x < 2 && y < 2 {
            Some(Self { x, y })
        } else {
            None
        }
    }

    #[inline]
    pub const fn x(self) -> u8 {
        self.x
    }

    #[inline]
    pub const fn y(self) -> u8 {
        self.y
    }

    /// Position in `Slot::ALL`; also the bit index inside a `SlotSet`.
    #[inline]
    pub const fn index(self) -> usize {
        (self.y * 2 + self.x) as usize
    }

    #[inline]
    pub const fn from_index(index: usize) -> Self {
        Self::ALL[index & 3]
    }

    /// Slots sharing an edge with this one inside the same cell (always two).
    pub const fn neighbours(self) -> [Self; 2] {
        [
            Self { x: 1 - self.x, y: self.y },
            Self { x: self.x, y: 1 - self.y },
        ]
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.x, self.y)
    }
}

/// Set of slots as a 4-bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SlotSet(u8);

impl SlotSet {
    pub const EMPTY: Self = Self(0);
    pub const FULL: Self = Self(0b1111);

    pub const fn row(y: u8) -> Self {
        Self(0b11 << ((y & 1) * 2))
    }

    pub const fn column(x: u8) -> Self {
        Self(0b0101 << (x & 1))
    }

    pub const fn single(slot: Slot) -> Self {
        Self(1 << slot.index())
    }

    pub fn from_slots<I: IntoIterator<Item = Slot>>(slots: I) -> Self {
        slots.into_iter().fold(Self::EMPTY, |acc, s| acc.with(s))
    }

    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    #[inline]
    pub const fn contains(self, slot: Slot) -> bool {
        self.0 & (1 << slot.index()) != 0
    }

    #[inline]
    pub const fn with(self, slot: Slot) -> Self {
        Self(self.0 | (1 << slot.index()))
    }

    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    #[inline]
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    #[inline]
    pub const fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Slots in canonical order.
    pub fn iter(self) -> impl Iterator<Item = Slot> {
        Slot::ALL.into_iter().filter(move |s| self.contains(*s))
    }

    /// Row indices touched by this set, as a 2-bit mask (bit y).
    pub fn rows(self) -> u8 {
        self.iter().fold(0, |acc, s| acc | (1 << s.y()))
    }

    /// Column indices touched by this set, as a 2-bit mask (bit x).
    pub fn columns(self) -> u8 {
        self.iter().fold(0, |acc, s| acc | (1 << s.x()))
    }

    /// `Some(y)` when the set is exactly one full row.
    pub fn full_row(self) -> Option<u8> {
        (0..2).find(|&y| self == Self::row(y))
    }

    /// `Some(x)` when the set is exactly one full column.
    pub fn full_column(self) -> Option<u8> {
        (0..2).find(|&x| self == Self::column(x))
    }
}

/// Cell coordinate plus slot. Converts to and from the doubled global grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubCellAddress {
    pub cell_x: usize,
    pub cell_y: usize,
    pub slot: Slot,
}

impl SubCellAddress {
    pub const fn new(cell_x: usize, cell_y: usize, slot: Slot) -> Self {
        Self {
            cell_x,
            cell_y,
            slot,
        }
    }

    /// `(cell_x * 2 + slot.x, cell_y * 2 + slot.y)`.
    #[inline]
    pub const fn to_global(self) -> (usize, usize) {
        (
            self.cell_x * 2 + self.slot.x as usize,
            self.cell_y * 2 + self.slot.y as usize,
        )
    }

    #[inline]
    pub const fn from_global(gx: usize, gy: usize) -> Self {
        Self {
            cell_x: gx / 2,
            cell_y: gy / 2,
            slot: Slot {
                x: (gx % 2) as u8,
                y: (gy % 2) as u8,
            },
        }
    }
}
