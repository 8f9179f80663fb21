/// Square grid of equally sized cells on a fixed canvas, one cell per source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub slots: usize,
    pub grid: u32,
    pub canvas_width: u32,
    pub canvas_height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
}

impl GridLayout {
    pub fn new(slots: usize, canvas_width: u32, canvas_height: u32) -> Self {
        let grid = Self::grid_dim(slots);
        Self {
            slots,
            grid,
            canvas_width,
            canvas_height,
            cell_width: (canvas_width / grid).max(1),
            cell_height: (canvas_height / grid).max(1),
        }
    }

    /// Smallest `g` with `g * g >= slots`, at least 1.
    pub fn grid_dim(slots: usize) -> u32 {
        let mut g = 1u32;
        while (g as usize) * (g as usize) < slots {
            g += 1;
        }
        g
    }

    /// Top-left corner of the cell for `index`.
    pub fn cell_origin(&self, index: usize) -> (u32, u32) {
        let i = index as u32;
        ((i % self.grid) * self.cell_width, (i / self.grid) * self.cell_height)
    }

    pub fn cell_size(&self) -> (u32, u32) {
        (self.cell_width, self.cell_height)
    }
}
