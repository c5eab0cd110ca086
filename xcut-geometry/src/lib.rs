use nalgebra::allocator::Allocator;
use nalgebra::{DefaultAllocator, DimName, OPoint, OVector, Point3, RealField, Scalar, U2, U3};
use serde::{Deserialize, Serialize};

mod hull;
mod primitives;
pub use hull::*;
pub use primitives::*;

pub mod polymesh;

#[cfg(feature = "proptest-support")]
pub mod proptest;

/// Absolute tolerance used for point identity, parameter-box slack and facet classification.
pub const TOL7: f64 = 1e-7;

/// Residual tolerance used by the Newton solvers.
pub const TOL14: f64 = 1e-14;

pub trait BoundedGeometry<T>
where
    T: Scalar,
    DefaultAllocator: Allocator<T, Self::Dimension>,
{
    type Dimension: DimName;

    fn bounding_box(&self) -> AxisAlignedBoundingBox<T, Self::Dimension>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(bound(
    serialize = "OVector<T, D>: Serialize",
    deserialize = "OVector<T, D>: Deserialize<'de>"
))]
pub struct AxisAlignedBoundingBox<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    min: OVector<T, D>,
    max: OVector<T, D>,
}

impl<T, D> Copy for AxisAlignedBoundingBox<T, D>
where
    T: Scalar,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
    OVector<T, D>: Copy,
{
}

pub type AxisAlignedBoundingBox2d<T> = AxisAlignedBoundingBox<T, U2>;
pub type AxisAlignedBoundingBox3d<T> = AxisAlignedBoundingBox<T, U3>;

impl<T, D> AxisAlignedBoundingBox<T, D>
where
    T: Scalar + PartialOrd,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    pub fn new(min: OVector<T, D>, max: OVector<T, D>) -> Self {
        for i in 0..D::dim() {
            assert!(min[i] <= max[i]);
        }
        Self { min, max }
    }

    pub fn min(&self) -> &OVector<T, D> {
        &self.min
    }

    pub fn max(&self) -> &OVector<T, D> {
        &self.max
    }
}

impl<T, D> From<OPoint<T, D>> for AxisAlignedBoundingBox<T, D>
where
    T: Scalar + PartialOrd,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    fn from(point: OPoint<T, D>) -> Self {
        AxisAlignedBoundingBox::new(point.coords.clone(), point.coords)
    }
}

impl<T, D> AxisAlignedBoundingBox<T, D>
where
    T: RealField + Copy,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    /// Computes the minimal bounding box which encloses both `this` and `other`.
    pub fn enclose(&self, other: &AxisAlignedBoundingBox<T, D>) -> Self {
        let min = self.min.iter().zip(&other.min).map(|(a, b)| T::min(*a, *b));
        let min = OVector::<T, D>::from_iterator(min);

        let max = self.max.iter().zip(&other.max).map(|(a, b)| T::max(*a, *b));
        let max = OVector::<T, D>::from_iterator(max);

        AxisAlignedBoundingBox::new(min, max)
    }

    /// The tightest box around the given points, or `None` if there are no points.
    ///
    /// No padding is added.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a OPoint<T, D>>) -> Option<Self> {
        let mut points = points.into_iter();
        points.next().map(|first_point| {
            points.fold(AxisAlignedBoundingBox::from(first_point.clone()), |aabb, point| {
                aabb.enclose(&AxisAlignedBoundingBox::from(point.clone()))
            })
        })
    }

    pub fn extents(&self) -> OVector<T, D> {
        self.max() - self.min()
    }

    pub fn max_extent(&self) -> T {
        (self.max() - self.min()).amax()
    }

    pub fn center(&self) -> OPoint<T, D> {
        OPoint::from((self.max() + self.min()) / T::from_f64(2.0).unwrap())
    }

    pub fn contains_point(&self, point: &OPoint<T, D>) -> bool {
        (0..D::dim()).all(|dim| point[dim] >= self.min[dim] && point[dim] <= self.max[dim])
    }

    /// Exact overlap test. Boxes that merely touch are considered to intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        self.intersects_with_tolerance(other, T::zero())
    }

    /// Overlap test where each interval is widened by `tolerance` on both sides.
    ///
    /// The test is symmetric in `self` and `other`.
    pub fn intersects_with_tolerance(&self, other: &Self, tolerance: T) -> bool {
        (0..D::dim()).all(|i| {
            intervals_intersect(
                [self.min[i], self.max[i]],
                [other.min[i], other.max[i]],
                tolerance,
            )
        })
    }

    /// Grows the bounding box by `distance` in all directions.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use xcut_geometry::AxisAlignedBoundingBox;
    /// # use nalgebra::vector;
    /// let aabb = AxisAlignedBoundingBox::new(vector![0.0, 0.0], vector![1.0, 1.0]);
    /// let grown = aabb.grow_uniformly(1.0);
    /// assert_eq!(grown.min(), &vector![-1.0, -1.0]);
    /// assert_eq!(grown.max(), &vector![2.0, 2.0]);
    /// ```
    ///
    pub fn grow_uniformly(&self, distance: T) -> Self {
        let min = self.min().map(|b_i| b_i - distance);
        let max = self.max().map(|b_i| b_i + distance);
        Self::new(min, max)
    }
}

fn intervals_intersect<T: RealField + Copy>([l1, u1]: [T; 2], [l2, u2]: [T; 2], tolerance: T) -> bool {
    l2 <= u1 + tolerance && u2 + tolerance >= l1
}

impl<T, D> BoundedGeometry<T> for AxisAlignedBoundingBox<T, D>
where
    T: RealField + Copy,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    type Dimension = D;

    fn bounding_box(&self) -> AxisAlignedBoundingBox<T, D> {
        self.clone()
    }
}

/// Coordinate-wise comparison of two points with an absolute tolerance.
pub fn points_equal<T, D>(a: &OPoint<T, D>, b: &OPoint<T, D>, tolerance: T) -> bool
where
    T: RealField + Copy,
    D: DimName,
    DefaultAllocator: Allocator<T, D>,
{
    a.coords
        .iter()
        .zip(b.coords.iter())
        .all(|(a_i, b_i)| (*a_i - *b_i).abs() <= tolerance)
}

/// Signed volume of the tetrahedron `abcd`, positive when `d` lies on the side of `abc`
/// that `(b - a) x (c - a)` points to.
pub fn tetrahedron_signed_volume<T: RealField + Copy>(vertices: &[Point3<T>; 4]) -> T {
    let [a, b, c, d] = vertices;
    let ab = b - a;
    let ac = c - a;
    let ad = d - a;
    ab.cross(&ac).dot(&ad) / T::from_f64(6.0).unwrap()
}
