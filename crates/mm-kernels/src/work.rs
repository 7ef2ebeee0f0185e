use std::fmt;

/// How many workers a launch starts and how they are grouped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkShape {
    /// `global` workers in teams of `local` cooperating members.
    OneD { global: usize, local: usize },
    /// A `rows × cols` grid of independent workers.
    TwoD { global: [usize; 2] },
}

impl WorkShape {
    /// One independent worker per cell of an N×N output.
    pub fn per_element(n: usize) -> Self {
        WorkShape::TwoD { global: [n, n] }
    }

    /// One worker per output row, in teams of `team_size`.
    pub fn per_row(n: usize, team_size: usize) -> Self {
        WorkShape::OneD {
            global: n,
            local: team_size,
        }
    }

    /// Total number of workers launched, counting padding workers that a
    /// team-based launch adds to fill its last team.
    pub fn workers(&self) -> usize {
        match *self {
            WorkShape::OneD { global, local } if local > 0 => global.div_ceil(local) * local,
            WorkShape::OneD { global, .. } => global,
            WorkShape::TwoD { global } => global[0] * global[1],
        }
    }
}

impl fmt::Display for WorkShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkShape::OneD { global, local } => write!(f, "[{global}] / [{local}]"),
            WorkShape::TwoD { global } => write!(f, "[{}, {}]", global[0], global[1]),
        }
    }
}
