use crate::error::{Result, TensorError};
use std::fmt;
use std::ops::Index;

/// Maximum number of dimensions a shape, window or coordinate can have.
pub const MAX_DIMS: usize = 6;

/// A tensor shape stored innermost dimension first.
///
/// Dimension 0 is the fastest varying one ("x"), dimension 1 is "y" (rows)
/// and so on. Unused dimensions hold an extent of 1, and trailing extents of
/// 1 do not count towards [`TensorShape::num_dimensions`]. A shape whose
/// every extent is 0 is the explicit "empty" marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TensorShape {
    dims: [usize; MAX_DIMS],
    num_dimensions: usize,
}

impl TensorShape {
    /// Create a shape from its extents, innermost first.
    ///
    /// # Panics
    /// Panics if any extent is 0 or if more than [`MAX_DIMS`] extents are given.
    pub fn new(dims: &[usize]) -> Self {
        match Self::try_new(dims) {
            Ok(shape) => shape,
            Err(e) => panic!("invalid tensor shape {:?}: {}", dims, e),
        }
    }

    /// Fallible variant of [`TensorShape::new`].
    pub fn try_new(dims: &[usize]) -> Result<Self> {
        if dims.len() > MAX_DIMS {
            return Err(TensorError::RankTooLarge {
                rank: dims.len(),
                max: MAX_DIMS,
            });
        }
        if let Some(dim) = dims.iter().position(|&d| d == 0) {
            return Err(TensorError::ZeroExtent { dim });
        }
        let mut shape = TensorShape {
            dims: [1; MAX_DIMS],
            num_dimensions: 1,
        };
        shape.dims[..dims.len()].copy_from_slice(dims);
        shape.trim();
        Ok(shape)
    }

    /// The "empty" marker shape: no dimensions and no elements.
    pub fn empty() -> Self {
        TensorShape {
            dims: [0; MAX_DIMS],
            num_dimensions: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.num_dimensions == 0
    }

    /// Number of significant dimensions (trailing extents of 1 excluded,
    /// but at least 1 for a non-empty shape).
    pub fn num_dimensions(&self) -> usize {
        self.num_dimensions
    }

    /// Total number of elements (0 for the empty shape).
    pub fn total_size(&self) -> usize {
        if self.is_empty() {
            return 0;
        }
        self.dims.iter().product()
    }

    /// Returns the extent of dimension `i`. Dimensions past the significant
    /// rank report 1 (0 for the empty shape).
    ///
    /// # Panics
    /// Panics if `i >= MAX_DIMS`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    pub fn x(&self) -> usize {
        self.dims[0]
    }

    pub fn y(&self) -> usize {
        self.dims[1]
    }

    pub fn z(&self) -> usize {
        self.dims[2]
    }

    /// The significant extents, innermost first.
    pub fn dims(&self) -> &[usize] {
        &self.dims[..self.num_dimensions]
    }

    /// Returns a copy with dimension `i` set to `extent`.
    ///
    /// # Panics
    /// Panics if `extent` is 0, `i >= MAX_DIMS` or the shape is empty.
    pub fn with_dim(&self, i: usize, extent: usize) -> Self {
        assert!(!self.is_empty(), "cannot set a dimension of the empty shape");
        assert!(extent > 0, "dimension {} must have a non-zero extent", i);
        let mut shape = *self;
        shape.dims[i] = extent;
        shape.trim();
        shape
    }

    /// Contiguous element strides, innermost first.
    ///
    /// For a shape [d0, d1, d2], the strides are [1, d0, d0*d1].
    pub fn strides(&self) -> Vec<usize> {
        let mut strides = Vec::with_capacity(self.num_dimensions);
        let mut acc = 1;
        for &d in self.dims() {
            strides.push(acc);
            acc *= d;
        }
        strides
    }

    /// Returns true if the coordinates address an element inside this shape.
    pub fn contains(&self, coords: &Coordinates) -> bool {
        !self.is_empty()
            && (0..MAX_DIMS).all(|i| coords[i] >= 0 && (coords[i] as usize) < self.dims[i])
    }

    /// Compute the broadcast shape of `a` and `b`.
    ///
    /// Dimensions are compared from the innermost edge. For each dimension
    /// the extents must either be equal, or one of them must be 1; the output
    /// extent is the larger one. Missing dimensions behave as extent 1.
    /// The empty shape broadcasts with nothing.
    pub fn broadcast_shape(a: &TensorShape, b: &TensorShape) -> Result<TensorShape> {
        if a.is_empty() || b.is_empty() {
            return Err(TensorError::BroadcastError {
                a: a.dims().to_vec(),
                b: b.dims().to_vec(),
            });
        }
        let mut result = [1usize; MAX_DIMS];
        for i in 0..MAX_DIMS {
            let (da, db) = (a.dims[i], b.dims[i]);
            result[i] = if da == db || db == 1 {
                da
            } else if da == 1 {
                db
            } else {
                return Err(TensorError::BroadcastError {
                    a: a.dims().to_vec(),
                    b: b.dims().to_vec(),
                });
            };
        }
        let mut shape = TensorShape {
            dims: result,
            num_dimensions: 1,
        };
        shape.trim();
        Ok(shape)
    }

    /// Returns true if `a` and `b` can be broadcast against each other.
    pub fn broadcast_compatible(a: &TensorShape, b: &TensorShape) -> bool {
        Self::broadcast_shape(a, b).is_ok()
    }

    fn trim(&mut self) {
        let mut n = MAX_DIMS;
        while n > 1 && self.dims[n - 1] == 1 {
            n -= 1;
        }
        self.num_dimensions = n;
    }
}

impl fmt::Display for TensorShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl TryFrom<&[usize]> for TensorShape {
    type Error = TensorError;

    fn try_from(dims: &[usize]) -> Result<Self> {
        TensorShape::try_new(dims)
    }
}

/// Element coordinates, innermost dimension first. Unspecified dimensions are 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Coordinates([isize; MAX_DIMS]);

impl Coordinates {
    /// # Panics
    /// Panics if more than [`MAX_DIMS`] values are given.
    pub fn new(values: &[isize]) -> Self {
        assert!(
            values.len() <= MAX_DIMS,
            "coordinates have at most {} dimensions, got {}",
            MAX_DIMS,
            values.len()
        );
        let mut coords = [0; MAX_DIMS];
        coords[..values.len()].copy_from_slice(values);
        Coordinates(coords)
    }

    pub fn get(&self, dim: usize) -> isize {
        self.0[dim]
    }

    pub fn set(&mut self, dim: usize, value: isize) {
        self.0[dim] = value;
    }

    pub fn x(&self) -> isize {
        self.0[0]
    }

    pub fn y(&self) -> isize {
        self.0[1]
    }

    pub fn z(&self) -> isize {
        self.0[2]
    }

    pub fn as_slice(&self) -> &[isize] {
        &self.0
    }
}

impl Index<usize> for Coordinates {
    type Output = isize;

    fn index(&self, dim: usize) -> &isize {
        &self.0[dim]
    }
}
