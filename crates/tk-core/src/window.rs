//! Iteration domains.
//!
//! A [`Window`] describes, for each of the [`MAX_DIMS`] dimensions, a
//! right-open range `[start, end)` walked with a positive `step`. Windows are
//! plain values: every adjustment returns a new window and none of them refer
//! to tensor data, so the same window can drive any kernel whose tensors have
//! compatible shapes.

use std::fmt;

use tk_tensor::{Coordinates, TensorShape, MAX_DIMS};

pub const DIM_X: usize = 0;
pub const DIM_Y: usize = 1;
pub const DIM_Z: usize = 2;

/// One dimension of a window: `[start, end)` with a positive step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Dimension {
    start: isize,
    end: isize,
    step: isize,
}

impl Dimension {
    /// # Panics
    /// Panics if `end < start` or `step <= 0`.
    pub fn new(start: isize, end: isize, step: isize) -> Self {
        assert!(end >= start, "dimension end {} is before start {}", end, start);
        assert!(step > 0, "dimension step must be positive, got {}", step);
        Dimension { start, end, step }
    }

    pub fn start(&self) -> isize {
        self.start
    }

    pub fn end(&self) -> isize {
        self.end
    }

    pub fn step(&self) -> isize {
        self.step
    }

    /// `ceil((end - start) / step)`.
    pub fn num_iterations(&self) -> usize {
        ((self.end - self.start + self.step - 1) / self.step) as usize
    }
}

impl Default for Dimension {
    fn default() -> Self {
        Dimension {
            start: 0,
            end: 1,
            step: 1,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.step == 1 {
            write!(f, "{}..{}", self.start, self.end)
        } else {
            write!(f, "{}..{} step {}", self.start, self.end, self.step)
        }
    }
}

/// An immutable N-dimensional iteration domain.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Window {
    dims: [Dimension; MAX_DIMS],
}

impl Window {
    /// A window with a single iteration in every dimension.
    pub fn new() -> Self {
        Window::default()
    }

    /// Build a window from per-dimension ranges, innermost first. Dimensions
    /// not given are `0..1`.
    pub fn from_dimensions(dims: &[Dimension]) -> Self {
        assert!(
            dims.len() <= MAX_DIMS,
            "a window has at most {} dimensions, got {}",
            MAX_DIMS,
            dims.len()
        );
        let mut window = Window::default();
        window.dims[..dims.len()].copy_from_slice(dims);
        window
    }

    /// The maximal window over `shape`.
    ///
    /// Dimension 0 advances `step_x` elements per iteration and its end is
    /// rounded up to a multiple of `step_x`; kernels using a vector step must
    /// handle the partial vector at the end of each row. Every other
    /// dimension is stepped by 1.
    pub fn from_shape(shape: &TensorShape, step_x: usize) -> Self {
        assert!(step_x > 0, "vector step must be positive");
        let mut window = Window::default();
        for (i, d) in window.dims.iter_mut().enumerate() {
            let extent = shape.dim(i) as isize;
            *d = if i == DIM_X {
                let step = step_x as isize;
                Dimension::new(0, ceil_to_multiple(extent, step), step)
            } else {
                Dimension::new(0, extent, 1)
            };
        }
        window
    }

    pub fn dim(&self, dim: usize) -> Dimension {
        self.dims[dim]
    }

    pub fn x(&self) -> Dimension {
        self.dims[DIM_X]
    }

    pub fn y(&self) -> Dimension {
        self.dims[DIM_Y]
    }

    pub fn z(&self) -> Dimension {
        self.dims[DIM_Z]
    }

    /// Copy with dimension `dim` replaced.
    pub fn with_dimension(&self, dim: usize, value: Dimension) -> Window {
        let mut window = self.clone();
        window.dims[dim] = value;
        window
    }

    /// Copy with dimension `dim` set to `[start, end)` stepped by `step`.
    pub fn set(&self, dim: usize, start: isize, end: isize, step: isize) -> Window {
        self.with_dimension(dim, Dimension::new(start, end, step))
    }

    /// Copy with a new step for dimension `dim`.
    pub fn with_step(&self, dim: usize, step: isize) -> Window {
        let d = self.dims[dim];
        self.set(dim, d.start, d.end, step)
    }

    /// Copy with both bounds of `dim` moved by `delta`.
    pub fn shift(&self, dim: usize, delta: isize) -> Window {
        let d = self.dims[dim];
        self.set(dim, d.start + delta, d.end + delta, d.step)
    }

    /// Copy with one bound of `dim` moved by `value`: the start when
    /// `at_start` is set, otherwise the end.
    pub fn adjust(&self, dim: usize, value: isize, at_start: bool) -> Window {
        let d = self.dims[dim];
        if at_start {
            self.set(dim, d.start + value, d.end, d.step)
        } else {
            self.set(dim, d.start, d.end + value, d.step)
        }
    }

    /// Copy with `dim` mapped through an integer scale factor, e.g. from an
    /// input window to the output window of an upsampling kernel.
    pub fn scale(&self, dim: usize, factor: usize) -> Window {
        assert!(factor > 0, "scale factor must be positive");
        let f = factor as isize;
        let d = self.dims[dim];
        self.set(dim, d.start * f, d.end * f, d.step * f)
    }

    pub fn num_iterations(&self, dim: usize) -> usize {
        self.dims[dim].num_iterations()
    }

    /// Number of iterations across all dimensions.
    pub fn total_iterations(&self) -> usize {
        self.dims.iter().map(Dimension::num_iterations).product()
    }

    /// Returns true if some dimension has no iteration at all.
    pub fn is_empty(&self) -> bool {
        self.dims.iter().any(|d| d.start == d.end)
    }

    /// The highest dimension with more than one iteration, or [`DIM_X`] if
    /// the window has at most one iteration everywhere.
    pub fn outermost_splittable_dimension(&self) -> usize {
        (0..MAX_DIMS)
            .rev()
            .find(|&d| self.num_iterations(d) > 1)
            .unwrap_or(DIM_X)
    }

    /// Number of partitions `split_dimension(dim, requested)` produces:
    /// `requested` clamped to `[1, num_iterations(dim)]`.
    pub fn partition_count(&self, dim: usize, requested: usize) -> usize {
        requested.clamp(1, self.num_iterations(dim).max(1))
    }

    /// Partition `dim` into contiguous, disjoint sub-windows that exactly
    /// cover this window.
    ///
    /// The split works in iterations, so every boundary stays aligned to the
    /// step. Each partition gets `num_iterations / n` iterations and the last
    /// one absorbs the remainder, keeping the original end. The number of
    /// partitions is clamped so that none is empty.
    pub fn split_dimension(&self, dim: usize, block_count: usize) -> Vec<Window> {
        let n = self.partition_count(dim, block_count);
        (0..n).map(|id| self.split_window(dim, id, n)).collect()
    }

    /// The `id`-th of `total` partitions of `dim`, following the same scheme
    /// as [`Window::split_dimension`].
    ///
    /// # Panics
    /// Panics if `id` is not below the clamped partition count.
    pub fn split_window(&self, dim: usize, id: usize, total: usize) -> Window {
        let n = self.partition_count(dim, total);
        assert!(id < n, "partition {} out of range for {} partitions", id, n);
        let d = self.dims[dim];
        let chunk = (self.num_iterations(dim) / n) as isize;
        let start = d.start + id as isize * chunk * d.step;
        let end = if id + 1 == n {
            d.end
        } else {
            start + chunk * d.step
        };
        self.set(dim, start, end, d.step)
    }

    /// Returns true if every dimension lies within `other`'s range, with the
    /// same step and a start reachable from `other`'s start.
    pub fn is_subset_of(&self, other: &Window) -> bool {
        self.dims.iter().zip(other.dims.iter()).all(|(a, b)| {
            a.start >= b.start
                && a.end <= b.end
                && a.step == b.step
                && (a.start - b.start) % b.step == 0
        })
    }

    /// Visit the coordinates of every iteration, dimension 0 innermost.
    pub fn for_each<F: FnMut(&Coordinates)>(&self, mut f: F) {
        if self.is_empty() {
            return;
        }
        let mut coords = Coordinates::default();
        for (i, d) in self.dims.iter().enumerate() {
            coords.set(i, d.start);
        }
        loop {
            f(&coords);
            let mut dim = 0;
            loop {
                let d = self.dims[dim];
                let next = coords[dim] + d.step;
                if next < d.end {
                    coords.set(dim, next);
                    break;
                }
                coords.set(dim, d.start);
                dim += 1;
                if dim == MAX_DIMS {
                    return;
                }
            }
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

fn ceil_to_multiple(value: isize, multiple: isize) -> isize {
    (value + multiple - 1) / multiple * multiple
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::BTreeSet;

    fn iteration_starts(d: Dimension) -> Vec<isize> {
        (0..d.num_iterations())
            .map(|i| d.start() + i as isize * d.step())
            .collect()
    }

    #[test]
    fn test_num_iterations() {
        assert_eq!(Dimension::new(0, 10, 1).num_iterations(), 10);
        assert_eq!(Dimension::new(0, 10, 4).num_iterations(), 3);
        assert_eq!(Dimension::new(2, 2, 4).num_iterations(), 0);
        assert_eq!(Dimension::new(-3, 3, 2).num_iterations(), 3);
    }

    #[test]
    #[should_panic]
    fn test_dimension_rejects_zero_step() {
        let _ = Dimension::new(0, 4, 0);
    }

    #[test]
    fn test_from_shape_rounds_vector_step() {
        let w = Window::from_shape(&TensorShape::new(&[10, 3]), 4);
        assert_eq!(w.x(), Dimension::new(0, 12, 4));
        assert_eq!(w.y(), Dimension::new(0, 3, 1));
        assert_eq!(w.z(), Dimension::new(0, 1, 1));
        assert_eq!(w.total_iterations(), 9);
    }

    #[test]
    fn test_split_even() {
        let w = Window::from_shape(&TensorShape::new(&[4, 4]), 1);
        let parts = w.split_dimension(DIM_Y, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].y(), Dimension::new(0, 2, 1));
        assert_eq!(parts[1].y(), Dimension::new(2, 4, 1));
        assert_eq!(parts[0].x(), w.x());
    }

    #[test]
    fn test_split_last_absorbs_remainder() {
        let w = Window::new().set(DIM_Y, 0, 10, 1);
        let parts = w.split_dimension(DIM_Y, 3);
        let ys: Vec<_> = parts.iter().map(|p| p.y()).collect();
        assert_eq!(
            ys,
            vec![
                Dimension::new(0, 3, 1),
                Dimension::new(3, 6, 1),
                Dimension::new(6, 10, 1)
            ]
        );
    }

    #[test]
    fn test_split_keeps_vector_alignment() {
        let w = Window::new().set(DIM_X, 0, 40, 8);
        for part in w.split_dimension(DIM_X, 3) {
            assert_eq!(part.x().start() % 8, 0);
            assert_eq!(part.x().step(), 8);
            assert!(part.is_subset_of(&w));
        }
    }

    #[test]
    fn test_split_clamps_to_iterations() {
        let w = Window::new().set(DIM_Y, 0, 3, 1);
        let parts = w.split_dimension(DIM_Y, 8);
        assert_eq!(parts.len(), 3);
        assert!(parts.iter().all(|p| p.num_iterations(DIM_Y) == 1));

        let empty = Window::new().set(DIM_Y, 5, 5, 1);
        assert_eq!(empty.split_dimension(DIM_Y, 4), vec![empty.clone()]);
    }

    #[test]
    fn test_split_window_matches_split_dimension() {
        let w = Window::new().set(DIM_Z, 0, 7, 1);
        let parts = w.split_dimension(DIM_Z, 3);
        for (id, part) in parts.iter().enumerate() {
            assert_eq!(&w.split_window(DIM_Z, id, 3), part);
        }
    }

    #[test]
    fn test_adjustments_return_copies() {
        let w = Window::new().set(DIM_X, 0, 8, 2);
        let shifted = w.shift(DIM_X, 4);
        assert_eq!(shifted.x(), Dimension::new(4, 12, 2));
        assert_eq!(w.x(), Dimension::new(0, 8, 2));
        assert_eq!(w.adjust(DIM_X, 2, true).x(), Dimension::new(2, 8, 2));
        assert_eq!(w.adjust(DIM_X, -2, false).x(), Dimension::new(0, 6, 2));
        assert_eq!(w.with_step(DIM_X, 4).x(), Dimension::new(0, 8, 4));
        assert_eq!(w.scale(DIM_X, 3).x(), Dimension::new(0, 24, 6));
    }

    #[test]
    fn test_is_subset_of() {
        let w = Window::from_shape(&TensorShape::new(&[8, 4]), 4);
        assert!(w.is_subset_of(&w));
        assert!(w.set(DIM_Y, 1, 3, 1).is_subset_of(&w));
        assert!(!w.set(DIM_Y, 2, 5, 1).is_subset_of(&w));
        assert!(!w.set(DIM_X, 2, 8, 4).is_subset_of(&w));
        assert!(!w.set(DIM_X, 0, 8, 2).is_subset_of(&w));
    }

    #[test]
    fn test_outermost_splittable_dimension() {
        assert_eq!(
            Window::from_shape(&TensorShape::new(&[4, 4]), 1).outermost_splittable_dimension(),
            DIM_Y
        );
        assert_eq!(
            Window::from_shape(&TensorShape::new(&[4, 1, 3]), 1).outermost_splittable_dimension(),
            DIM_Z
        );
        assert_eq!(Window::new().outermost_splittable_dimension(), DIM_X);
    }

    #[test]
    fn test_for_each_order() {
        let w = Window::new().set(DIM_X, 0, 4, 2).set(DIM_Y, 1, 3, 1);
        let mut seen = Vec::new();
        w.for_each(|c| seen.push((c.x(), c.y())));
        assert_eq!(seen, vec![(0, 1), (2, 1), (0, 2), (2, 2)]);

        let mut count = 0;
        Window::new().set(DIM_X, 3, 3, 1).for_each(|_| count += 1);
        assert_eq!(count, 0);
    }

    #[test]
    fn test_display() {
        let w = Window::new().set(DIM_X, 0, 8, 4);
        assert_eq!(
            w.to_string(),
            "[0..8 step 4, 0..1, 0..1, 0..1, 0..1, 0..1]"
        );
    }

    fn window_strategy() -> impl Strategy<Value = Window> {
        prop::collection::vec((-8isize..8, 0isize..24, 1isize..5), MAX_DIMS).prop_map(|dims| {
            let dims: Vec<Dimension> = dims
                .into_iter()
                .map(|(start, len, step)| Dimension::new(start, start + len, step))
                .collect();
            Window::from_dimensions(&dims)
        })
    }

    proptest! {
        #[test]
        fn test_split_is_exact_partition(w in window_strategy(), dim in 0usize..MAX_DIMS, n in 1usize..32) {
            let iterations = w.num_iterations(dim);
            prop_assume!(n <= iterations.max(1));
            let parts = w.split_dimension(dim, n);
            prop_assert_eq!(parts.len(), n);

            let mut union = BTreeSet::new();
            let mut total = 0;
            for part in &parts {
                prop_assert!(part.is_subset_of(&w));
                for other in 0..MAX_DIMS {
                    if other != dim {
                        prop_assert_eq!(part.dim(other), w.dim(other));
                    }
                }
                let starts = iteration_starts(part.dim(dim));
                total += starts.len();
                union.extend(starts);
            }
            // Disjoint: no index was counted twice. Exact: same set as the original.
            prop_assert_eq!(total, union.len());
            let expected: BTreeSet<_> = iteration_starts(w.dim(dim)).into_iter().collect();
            prop_assert_eq!(union, expected);
            if iterations > 0 {
                prop_assert!(parts.iter().all(|p| p.num_iterations(dim) > 0));
            }
        }
    }
}
