use std::fmt;

/// Square grid of side `2 * radius + 1`, stored row-major in a flat `Vec`.
///
/// Cells are addressed by flat index or by an offset `(dx, dy)` relative to
/// some base index. Offset lookups do no bounds checking beyond what slice
/// indexing does; callers stay within the radius they built the grid with.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TileGrid<T> {
    radius: u32,
    size: usize,
    cells: Vec<T>,
}

impl<T> TileGrid<T> {
    /// Builds a grid by calling `f(dx, dy)` for every cell, rows (`dy`) outer.
    pub fn from_fn(radius: u32, mut f: impl FnMut(i32, i32) -> T) -> Self {
        let r = radius as i32;
        let size = radius as usize * 2 + 1;
        let mut cells = Vec::with_capacity(size * size);
        for dy in -r..=r {
            for dx in -r..=r {
                cells.push(f(dx, dy));
            }
        }
        Self {
            radius,
            size,
            cells,
        }
    }

    pub fn filled(radius: u32, value: T) -> Self
    where
        T: Clone,
    {
        Self::from_fn(radius, |_, _| value.clone())
    }

    #[inline]
    pub fn radius(&self) -> u32 {
        self.radius
    }

    /// Side length, `2 * radius + 1`.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.cells.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    #[inline]
    pub fn center_index(&self) -> usize {
        self.cells.len() / 2
    }

    #[inline]
    pub fn index_of(&self, index: usize, dx: i32, dy: i32) -> usize {
        let i = index as isize + dx as isize + dy as isize * self.size as isize;
        debug_assert!(i >= 0 && (i as usize) < self.cells.len());
        i as usize
    }

    #[inline]
    pub fn get(&self, index: usize, dx: i32, dy: i32) -> &T {
        &self.cells[self.index_of(index, dx, dy)]
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize, dx: i32, dy: i32) -> &mut T {
        let i = self.index_of(index, dx, dy);
        &mut self.cells[i]
    }

    /// Cell at `(dx, dy)` from the center.
    #[inline]
    pub fn at_offset(&self, dx: i32, dy: i32) -> &T {
        self.get(self.center_index(), dx, dy)
    }

    #[inline]
    pub fn at(&self, index: usize) -> &T {
        &self.cells[index]
    }

    #[inline]
    pub fn at_mut(&mut self, index: usize) -> &mut T {
        &mut self.cells[index]
    }

    /// Center-relative offset of a flat index.
    #[inline]
    pub fn pos_of(&self, index: usize) -> (i32, i32) {
        let r = self.radius as i32;
        ((index % self.size) as i32 - r, (index / self.size) as i32 - r)
    }

    #[inline]
    pub fn contains_offset(&self, dx: i32, dy: i32) -> bool {
        let r = self.radius as i32;
        dx.abs() <= r && dy.abs() <= r
    }

    /// Copies the centered `radius`-sized subset, row by row.
    pub fn sub_grid(&self, radius: u32) -> TileGrid<T>
    where
        T: Clone,
    {
        assert!(
            radius <= self.radius,
            "sub-grid radius {} exceeds grid radius {}",
            radius,
            self.radius
        );
        let r = radius as i32;
        let size = radius as usize * 2 + 1;
        let centre = self.center_index();
        let mut cells = Vec::with_capacity(size * size);
        for oy in -r..=r {
            let begin = self.index_of(centre, -r, oy);
            let end = self.index_of(centre, r, oy);
            cells.extend_from_slice(&self.cells[begin..=end]);
        }
        TileGrid {
            radius,
            size,
            cells,
        }
    }

    /// Same selection as [`TileGrid::sub_grid`] but moves the cells out.
    pub fn into_sub_grid(self, radius: u32) -> TileGrid<T> {
        assert!(
            radius <= self.radius,
            "sub-grid radius {} exceeds grid radius {}",
            radius,
            self.radius
        );
        let src_r = self.radius as i32;
        let src_size = self.size;
        let r = radius as i32;
        let cells = self
            .cells
            .into_iter()
            .enumerate()
            .filter_map(|(i, cell)| {
                let dx = (i % src_size) as i32 - src_r;
                let dy = (i / src_size) as i32 - src_r;
                (dx.abs() <= r && dy.abs() <= r).then_some(cell)
            })
            .collect();
        TileGrid {
            radius,
            size: radius as usize * 2 + 1,
            cells,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.cells.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.cells.iter_mut()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.cells
    }

    pub fn into_vec(self) -> Vec<T> {
        self.cells
    }
}

impl<T> fmt::Display for TileGrid<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TileGrid {}*{}[{}]", self.size, self.size, self.cells.len())
    }
}

impl<T> IntoIterator for TileGrid<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a TileGrid<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.cells.iter()
    }
}
