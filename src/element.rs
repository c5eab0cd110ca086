//! Element shapes, shape functions and topology tables.
//!
//! All reference elements live in `[-1, 1]^d`. Reference coordinates are always passed as
//! `Vector3`, with unused trailing components ignored, so that lines, surfaces and volumes can
//! be treated uniformly by the root finders.
use crate::mesh::MeshError;
use crate::Real;
use xcut_traits::constant;
use itertools::Itertools;
use nalgebra::{distance, DVector, Matrix3, Matrix3xX, Point3, Scalar, Vector3};
use numeric_literals::replace_float_literals;
use serde::{Deserialize, Serialize};
use std::fmt;
use xcut_geometry::{AxisAlignedBoundingBox3d, BoundedGeometry};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ElementShape {
    Line2,
    Line3,
    Tri3,
    Tri6,
    Quad4,
    Quad8,
    Quad9,
    Tet4,
    Tet10,
    Hex8,
}

impl fmt::Display for ElementShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

const HEX8_FACETS: [&[usize]; 6] = [
    &[0, 3, 2, 1],
    &[0, 1, 5, 4],
    &[1, 2, 6, 5],
    &[2, 3, 7, 6],
    &[0, 4, 7, 3],
    &[4, 5, 6, 7],
];
const HEX8_LINES: [&[usize]; 12] = [
    &[0, 1],
    &[1, 2],
    &[2, 3],
    &[0, 3],
    &[0, 4],
    &[1, 5],
    &[2, 6],
    &[3, 7],
    &[4, 5],
    &[5, 6],
    &[6, 7],
    &[4, 7],
];
const TET4_FACETS: [&[usize]; 4] = [&[0, 2, 1], &[0, 1, 3], &[1, 2, 3], &[0, 3, 2]];
const TET10_FACETS: [&[usize]; 4] = [&[0, 2, 1, 6, 5, 4], &[0, 1, 3, 4, 9, 7], &[1, 2, 3, 5, 8, 9], &[0, 3, 2, 7, 8, 6]];
// The midside node of line i of a tet10 is node 4 + i
const TET4_LINES: [&[usize]; 6] = [&[0, 1], &[1, 2], &[0, 2], &[0, 3], &[2, 3], &[1, 3]];
const TET10_LINES: [&[usize]; 6] = [&[0, 1, 4], &[1, 2, 5], &[0, 2, 6], &[0, 3, 7], &[2, 3, 8], &[1, 3, 9]];
const TRI3_LINES: [&[usize]; 3] = [&[0, 1], &[1, 2], &[2, 0]];
const TRI6_LINES: [&[usize]; 3] = [&[0, 1, 3], &[1, 2, 4], &[2, 0, 5]];
const QUAD4_LINES: [&[usize]; 4] = [&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const QUAD8_LINES: [&[usize]; 4] = [&[0, 1, 4], &[1, 2, 5], &[2, 3, 6], &[3, 0, 7]];
const LINE2_LINES: [&[usize]; 1] = [&[0, 1]];
const LINE3_LINES: [&[usize]; 1] = [&[0, 1, 2]];
const LINE_FACETS: [&[usize]; 2] = [&[0], &[1]];

/// Indices of the facets of an element a given point lies on. A point lies on at most three
/// facets of the supported shapes.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct FacetSet {
    facets: [usize; 3],
    len: usize,
}

impl FacetSet {
    pub fn from_slice(facets: &[usize]) -> Self {
        let mut set = Self::default();
        for &f in facets {
            set.insert(f);
        }
        set
    }

    /// Inserts the facet if not already present. Facets beyond the third are ignored.
    pub fn insert(&mut self, facet: usize) {
        if !self.contains(facet) && self.len < 3 {
            self.facets[self.len] = facet;
            self.len += 1;
        }
    }

    pub fn contains(&self, facet: usize) -> bool {
        self.as_slice().contains(&facet)
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.facets[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn intersection(&self, other: &FacetSet) -> FacetSet {
        let common: Vec<usize> = self
            .as_slice()
            .iter()
            .copied()
            .filter(|f| other.contains(*f))
            .collect();
        FacetSet::from_slice(&common)
    }
}

impl ElementShape {
    pub fn num_nodes(&self) -> usize {
        use ElementShape::*;
        match self {
            Line2 => 2,
            Line3 => 3,
            Tri3 => 3,
            Tri6 => 6,
            Quad4 => 4,
            Quad8 => 8,
            Quad9 => 9,
            Tet4 => 4,
            Tet10 => 10,
            Hex8 => 8,
        }
    }

    pub fn num_corner_nodes(&self) -> usize {
        self.linear_shape().num_nodes()
    }

    pub fn reference_dim(&self) -> usize {
        use ElementShape::*;
        match self {
            Line2 | Line3 => 1,
            Tri3 | Tri6 | Quad4 | Quad8 | Quad9 => 2,
            Tet4 | Tet10 | Hex8 => 3,
        }
    }

    pub fn is_quadratic(&self) -> bool {
        self.linear_shape() != *self
    }

    /// The shape with the same corner nodes but linear interpolation.
    pub fn linear_shape(&self) -> ElementShape {
        use ElementShape::*;
        match self {
            Line2 | Line3 => Line2,
            Tri3 | Tri6 => Tri3,
            Quad4 | Quad8 | Quad9 => Quad4,
            Tet4 | Tet10 => Tet4,
            Hex8 => Hex8,
        }
    }

    /// Node lists of the facets, i.e. the sub-entities of dimension `reference_dim - 1`.
    ///
    /// Facets of volumes are ordered counter-clockwise when seen from outside the element.
    pub fn facets(&self) -> &'static [&'static [usize]] {
        use ElementShape::*;
        match self {
            Line2 | Line3 => &LINE_FACETS,
            Tri3 => &TRI3_LINES,
            Tri6 => &TRI6_LINES,
            Quad4 => &QUAD4_LINES,
            Quad8 | Quad9 => &QUAD8_LINES,
            Tet4 => &TET4_FACETS,
            Tet10 => &TET10_FACETS,
            Hex8 => &HEX8_FACETS,
        }
    }

    pub fn num_facets(&self) -> usize {
        self.facets().len()
    }

    /// Shape of every facet. Lines have point facets, reported as `None`.
    pub fn facet_shape(&self) -> Option<ElementShape> {
        use ElementShape::*;
        match self {
            Line2 | Line3 => None,
            Tri3 | Quad4 => Some(Line2),
            Tri6 | Quad8 | Quad9 => Some(Line3),
            Tet4 => Some(Tri3),
            Tet10 => Some(Tri6),
            Hex8 => Some(Quad4),
        }
    }

    /// Node lists of the edges (one-dimensional sub-entities), midside node last.
    pub fn lines(&self) -> &'static [&'static [usize]] {
        use ElementShape::*;
        match self {
            Line2 => &LINE2_LINES,
            Line3 => &LINE3_LINES,
            Tri3 => &TRI3_LINES,
            Tri6 => &TRI6_LINES,
            Quad4 => &QUAD4_LINES,
            Quad8 | Quad9 => &QUAD8_LINES,
            Tet4 => &TET4_LINES,
            Tet10 => &TET10_LINES,
            Hex8 => &HEX8_LINES,
        }
    }

    pub fn line_shape(&self) -> ElementShape {
        if self.is_quadratic() {
            ElementShape::Line3
        } else {
            ElementShape::Line2
        }
    }

    /// Facets containing both end points of the given line.
    pub fn facets_of_line(&self, line: usize) -> FacetSet {
        let line_nodes = &self.lines()[line][0..2];
        let facets: Vec<usize> = self
            .facets()
            .iter()
            .positions(|facet| line_nodes.iter().all(|n| facet.contains(n)))
            .collect();
        FacetSet::from_slice(&facets)
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference_nodes<T: Real>(&self) -> Vec<Point3<T>> {
        use ElementShape::*;
        let p = |x, y, z| Point3::new(x, y, z);
        match self {
            Line2 => vec![p(-1.0, 0.0, 0.0), p(1.0, 0.0, 0.0)],
            Line3 => vec![p(-1.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 0.0, 0.0)],
            Tri3 => vec![p(-1.0, -1.0, 0.0), p(1.0, -1.0, 0.0), p(-1.0, 1.0, 0.0)],
            Tri6 => vec![
                p(-1.0, -1.0, 0.0),
                p(1.0, -1.0, 0.0),
                p(-1.0, 1.0, 0.0),
                p(0.0, -1.0, 0.0),
                p(0.0, 0.0, 0.0),
                p(-1.0, 0.0, 0.0),
            ],
            Quad4 | Quad8 | Quad9 => {
                let mut nodes = vec![p(-1.0, -1.0, 0.0), p(1.0, -1.0, 0.0), p(1.0, 1.0, 0.0), p(-1.0, 1.0, 0.0)];
                if *self != Quad4 {
                    nodes.extend([p(0.0, -1.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0), p(-1.0, 0.0, 0.0)]);
                }
                if *self == Quad9 {
                    nodes.push(p(0.0, 0.0, 0.0));
                }
                nodes
            }
            Tet4 | Tet10 => {
                let mut nodes = vec![
                    p(-1.0, -1.0, -1.0),
                    p(1.0, -1.0, -1.0),
                    p(-1.0, 1.0, -1.0),
                    p(-1.0, -1.0, 1.0),
                ];
                if *self == Tet10 {
                    let midpoints: Vec<_> = TET10_LINES
                        .iter()
                        .map(|line| nalgebra::center(&nodes[line[0]], &nodes[line[1]]))
                        .collect();
                    nodes.extend(midpoints);
                }
                nodes
            }
            Hex8 => vec![
                p(-1.0, -1.0, -1.0),
                p(1.0, -1.0, -1.0),
                p(1.0, 1.0, -1.0),
                p(-1.0, 1.0, -1.0),
                p(-1.0, -1.0, 1.0),
                p(1.0, -1.0, 1.0),
                p(1.0, 1.0, 1.0),
                p(-1.0, 1.0, 1.0),
            ],
        }
    }

    /// Length, area or volume of the reference element.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference_measure<T: Real>(&self) -> T {
        use ElementShape::*;
        match self {
            Line2 | Line3 => 2.0,
            Tri3 | Tri6 => 2.0,
            Quad4 | Quad8 | Quad9 => 4.0,
            Tet4 | Tet10 => 4.0 / 3.0,
            Hex8 => 8.0,
        }
    }

    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference_centroid<T: Real>(&self) -> Vector3<T> {
        use ElementShape::*;
        match self {
            Tri3 | Tri6 => Vector3::new(-1.0 / 3.0, -1.0 / 3.0, 0.0),
            Tet4 | Tet10 => Vector3::new(-0.5, -0.5, -0.5),
            _ => Vector3::zeros(),
        }
    }

    /// The facets of the reference element as planes `n . xi = c`, with `n` the outward unit
    /// normal. The reference element is `{ xi : n . xi <= c }` over all facets.
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn reference_facet_planes<T: Real>(&self) -> Vec<(Vector3<T>, T)> {
        use ElementShape::*;
        let v = |x, y, z| Vector3::new(x, y, z);
        match self {
            Line2 | Line3 => vec![(v(-1.0, 0.0, 0.0), 1.0), (v(1.0, 0.0, 0.0), 1.0)],
            Tri3 | Tri6 => {
                let d = 0.5.sqrt();
                vec![(v(0.0, -1.0, 0.0), 1.0), (v(d, d, 0.0), 0.0), (v(-1.0, 0.0, 0.0), 1.0)]
            }
            Quad4 | Quad8 | Quad9 => vec![
                (v(0.0, -1.0, 0.0), 1.0),
                (v(1.0, 0.0, 0.0), 1.0),
                (v(0.0, 1.0, 0.0), 1.0),
                (v(-1.0, 0.0, 0.0), 1.0),
            ],
            Tet4 | Tet10 => {
                let d = (1.0 / 3.0).sqrt();
                vec![
                    (v(0.0, 0.0, -1.0), 1.0),
                    (v(0.0, -1.0, 0.0), 1.0),
                    (v(d, d, d), -d),
                    (v(-1.0, 0.0, 0.0), 1.0),
                ]
            }
            Hex8 => vec![
                (v(0.0, 0.0, -1.0), 1.0),
                (v(0.0, -1.0, 0.0), 1.0),
                (v(1.0, 0.0, 0.0), 1.0),
                (v(0.0, 1.0, 0.0), 1.0),
                (v(-1.0, 0.0, 0.0), 1.0),
                (v(0.0, 0.0, 1.0), 1.0),
            ],
        }
    }

    /// Parameter space test: whether `xi` lies in the reference element, widened by `tolerance`.
    pub fn contains_reference_point<T: Real>(&self, xi: &Vector3<T>, tolerance: T) -> bool {
        self.reference_facet_planes()
            .iter()
            .all(|(n, c)| n.dot(xi) - *c <= tolerance)
    }

    /// Boundary classification: the facets `xi` lies on, within `tolerance`.
    pub fn facets_containing<T: Real>(&self, xi: &Vector3<T>, tolerance: T) -> FacetSet {
        let mut set = FacetSet::default();
        for (facet, (n, c)) in self.reference_facet_planes().iter().enumerate() {
            if (n.dot(xi) - *c).abs() <= tolerance {
                set.insert(facet);
            }
        }
        set
    }

    /// Maps reference coordinates of a sub-entity (facet or line, given by its node list and
    /// shape) to reference coordinates of this element.
    pub fn embed_reference_coords<T: Real>(
        &self,
        sub_nodes: &[usize],
        sub_shape: ElementShape,
        sub_xi: &Vector3<T>,
    ) -> Vector3<T> {
        let nodes = self.reference_nodes::<T>();
        let phi = sub_shape.evaluate_basis(sub_xi);
        sub_nodes
            .iter()
            .zip(phi.iter())
            .fold(Vector3::zeros(), |acc, (node, phi_i)| acc + nodes[*node].coords * *phi_i)
    }

    /// Shape function values at `xi`, one entry per node.
    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn evaluate_basis<T: Real>(&self, xi: &Vector3<T>) -> DVector<T> {
        use ElementShape::*;
        let (r, s, t) = (xi[0], xi[1], xi[2]);
        let values = match self {
            Line2 => vec![phi_linear_1d(-1.0, r), phi_linear_1d(1.0, r)],
            Line3 => vec![
                phi_quadratic_1d(-1.0, r),
                phi_quadratic_1d(1.0, r),
                phi_quadratic_1d(0.0, r),
            ],
            Tri3 => tri3_basis(r, s).to_vec(),
            Tri6 => {
                let psi = tri3_basis(r, s);
                vec![
                    psi[0] * (2.0 * psi[0] - 1.0),
                    psi[1] * (2.0 * psi[1] - 1.0),
                    psi[2] * (2.0 * psi[2] - 1.0),
                    4.0 * psi[0] * psi[1],
                    4.0 * psi[1] * psi[2],
                    4.0 * psi[0] * psi[2],
                ]
            }
            Quad4 => QUAD_CORNERS
                .iter()
                .map(|[a, b]| phi_linear_1d(constant(*a), r) * phi_linear_1d(constant(*b), s))
                .collect(),
            Quad8 => {
                let mut values: Vec<T> = QUAD_CORNERS
                    .iter()
                    .map(|[a, b]| {
                        let (a, b): (T, T) = (constant(*a), constant(*b));
                        0.25 * (1.0 + a * r) * (1.0 + b * s) * (a * r + b * s - 1.0)
                    })
                    .collect();
                values.extend([
                    0.5 * (1.0 - r * r) * (1.0 - s),
                    0.5 * (1.0 + r) * (1.0 - s * s),
                    0.5 * (1.0 - r * r) * (1.0 + s),
                    0.5 * (1.0 - r) * (1.0 - s * s),
                ]);
                values
            }
            Quad9 => QUAD9_NODES
                .iter()
                .map(|[a, b]| phi_quadratic_1d(constant(*a), r) * phi_quadratic_1d(constant(*b), s))
                .collect(),
            Tet4 => tet4_basis(r, s, t).to_vec(),
            Tet10 => {
                let psi = tet4_basis(r, s, t);
                let mut values: Vec<T> = psi.iter().map(|p| *p * (2.0 * *p - 1.0)).collect();
                values.extend(TET10_LINES.iter().map(|line| 4.0 * psi[line[0]] * psi[line[1]]));
                values
            }
            Hex8 => HEX_CORNERS
                .iter()
                .map(|[a, b, c]| {
                    phi_linear_1d(constant(*a), r) * phi_linear_1d(constant(*b), s) * phi_linear_1d(constant(*c), t)
                })
                .collect(),
        };
        DVector::from_vec(values)
    }

    /// Shape function gradients at `xi`, one column per node. Rows beyond the reference
    /// dimension are zero.
    #[rustfmt::skip]
    #[replace_float_literals(T::from_f64(literal).unwrap())]
    pub fn gradients<T: Real>(&self, xi: &Vector3<T>) -> Matrix3xX<T> {
        use ElementShape::*;
        let (r, s, t) = (xi[0], xi[1], xi[2]);
        let v = |x, y, z| Vector3::new(x, y, z);
        let columns: Vec<Vector3<T>> = match self {
            Line2 => vec![v(phi_linear_1d_grad(-1.0), 0.0, 0.0), v(phi_linear_1d_grad(1.0), 0.0, 0.0)],
            Line3 => vec![
                v(phi_quadratic_1d_grad(-1.0, r), 0.0, 0.0),
                v(phi_quadratic_1d_grad(1.0, r), 0.0, 0.0),
                v(phi_quadratic_1d_grad(0.0, r), 0.0, 0.0),
            ],
            Tri3 => TRI3_GRADIENTS.iter().map(|[a, b]| v(constant(*a), constant(*b), 0.0)).collect(),
            Tri6 => {
                let psi = tri3_basis(r, s);
                let g: Vec<Vector3<T>> = TRI3_GRADIENTS.iter().map(|[a, b]| v(constant(*a), constant(*b), 0.0)).collect();
                let vertex_gradient = |i: usize| g[i] * (4.0 * psi[i] - 1.0);
                let edge_gradient = |i: usize, j: usize| g[i] * (4.0 * psi[j]) + g[j] * (4.0 * psi[i]);
                vec![
                    vertex_gradient(0),
                    vertex_gradient(1),
                    vertex_gradient(2),
                    edge_gradient(0, 1),
                    edge_gradient(1, 2),
                    edge_gradient(0, 2),
                ]
            }
            Quad4 => QUAD_CORNERS
                .iter()
                .map(|[a, b]| {
                    let (a, b): (T, T) = (constant(*a), constant(*b));
                    v(phi_linear_1d_grad(a) * phi_linear_1d(b, s), phi_linear_1d(a, r) * phi_linear_1d_grad(b), 0.0)
                })
                .collect(),
            Quad8 => {
                let mut columns: Vec<Vector3<T>> = QUAD_CORNERS
                    .iter()
                    .map(|[a, b]| {
                        let (a, b): (T, T) = (constant(*a), constant(*b));
                        v(
                            0.25 * a * (1.0 + b * s) * (2.0 * a * r + b * s),
                            0.25 * b * (1.0 + a * r) * (a * r + 2.0 * b * s),
                            0.0,
                        )
                    })
                    .collect();
                columns.extend([
                    v(-r * (1.0 - s), -0.5 * (1.0 - r * r), 0.0),
                    v(0.5 * (1.0 - s * s), -s * (1.0 + r), 0.0),
                    v(-r * (1.0 + s), 0.5 * (1.0 - r * r), 0.0),
                    v(-0.5 * (1.0 - s * s), -s * (1.0 - r), 0.0),
                ]);
                columns
            }
            Quad9 => QUAD9_NODES
                .iter()
                .map(|[a, b]| {
                    let (a, b): (T, T) = (constant(*a), constant(*b));
                    v(
                        phi_quadratic_1d_grad(a, r) * phi_quadratic_1d(b, s),
                        phi_quadratic_1d(a, r) * phi_quadratic_1d_grad(b, s),
                        0.0,
                    )
                })
                .collect(),
            Tet4 => TET4_GRADIENTS.iter().map(|[a, b, c]| v(constant(*a), constant(*b), constant(*c))).collect(),
            Tet10 => {
                let psi = tet4_basis(r, s, t);
                let g: Vec<Vector3<T>> = TET4_GRADIENTS.iter().map(|[a, b, c]| v(constant(*a), constant(*b), constant(*c))).collect();
                let mut columns: Vec<Vector3<T>> = (0..4).map(|i| g[i] * (4.0 * psi[i] - 1.0)).collect();
                columns.extend(
                    TET10_LINES
                        .iter()
                        .map(|line| g[line[0]] * (4.0 * psi[line[1]]) + g[line[1]] * (4.0 * psi[line[0]])),
                );
                columns
            }
            Hex8 => HEX_CORNERS
                .iter()
                .map(|[a, b, c]| {
                    let (a, b, c): (T, T, T) = (constant(*a), constant(*b), constant(*c));
                    v(
                        phi_linear_1d_grad(a) * phi_linear_1d(b, s) * phi_linear_1d(c, t),
                        phi_linear_1d(a, r) * phi_linear_1d_grad(b) * phi_linear_1d(c, t),
                        phi_linear_1d(a, r) * phi_linear_1d(b, s) * phi_linear_1d_grad(c),
                    )
                })
                .collect(),
        };
        Matrix3xX::from_columns(&columns)
    }
}

const QUAD_CORNERS: [[f64; 2]; 4] = [[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]];
const QUAD9_NODES: [[f64; 2]; 9] = [
    [-1.0, -1.0],
    [1.0, -1.0],
    [1.0, 1.0],
    [-1.0, 1.0],
    [0.0, -1.0],
    [1.0, 0.0],
    [0.0, 1.0],
    [-1.0, 0.0],
    [0.0, 0.0],
];
const HEX_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];
const TRI3_GRADIENTS: [[f64; 2]; 3] = [[-0.5, -0.5], [0.5, 0.0], [0.0, 0.5]];
const TET4_GRADIENTS: [[f64; 3]; 4] = [[-0.5, -0.5, -0.5], [0.5, 0.0, 0.0], [0.0, 0.5, 0.0], [0.0, 0.0, 0.5]];

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn tri3_basis<T: Real>(r: T, s: T) -> [T; 3] {
    [-0.5 * r - 0.5 * s, 0.5 * r + 0.5, 0.5 * s + 0.5]
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
fn tet4_basis<T: Real>(r: T, s: T, t: T) -> [T; 4] {
    [-0.5 * r - 0.5 * s - 0.5 * t - 0.5, 0.5 * r + 0.5, 0.5 * s + 0.5, 0.5 * t + 0.5]
}

/// Linear basis function on the interval [-1, 1].
///
///`alpha == -1` denotes the basis function associated with the node at `x == -1`,
/// and `alpha == 1` for `x == 1`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
#[inline(always)]
fn phi_linear_1d<T: Real>(alpha: T, xi: T) -> T {
    (1.0 + alpha * xi) / 2.0
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
#[inline(always)]
fn phi_linear_1d_grad<T: Real>(alpha: T) -> T {
    alpha / 2.0
}

/// Quadratic basis function on the interval [-1, 1].
///
/// `alpha == -1` denotes the basis function associated with the node at `x == -1`,
/// `alpha == 0` denotes the basis function associated with the node at `x == 0`,
/// and `alpha == 1` for `x == 1`.
#[replace_float_literals(T::from_f64(literal).unwrap())]
#[inline(always)]
fn phi_quadratic_1d<T: Real>(alpha: T, xi: T) -> T {
    let alpha2 = alpha * alpha;
    let xi2 = xi * xi;
    (3.0 / 2.0 * alpha2 - 1.0) * xi2 + 0.5 * alpha * xi + 1.0 - alpha2
}

#[replace_float_literals(T::from_f64(literal).unwrap())]
#[inline(always)]
fn phi_quadratic_1d_grad<T: Real>(alpha: T, xi: T) -> T {
    let alpha2 = alpha * alpha;
    2.0 * (3.0 / 2.0 * alpha2 - 1.0) * xi + 0.5 * alpha
}

/// An element shape together with the physical positions of its nodes.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementGeometry<T: Scalar> {
    shape: ElementShape,
    vertices: Vec<Point3<T>>,
}

impl<T: Scalar> ElementGeometry<T> {
    pub fn from_vertices(shape: ElementShape, vertices: Vec<Point3<T>>) -> Result<Self, MeshError> {
        if vertices.len() != shape.num_nodes() {
            return Err(MeshError::NodeCountMismatch {
                shape,
                expected: shape.num_nodes(),
                actual: vertices.len(),
            });
        }
        Ok(Self { shape, vertices })
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn vertices(&self) -> &[Point3<T>] {
        &self.vertices
    }
}

impl<T: Real> ElementGeometry<T> {
    /// The reference element itself, i.e. the element with its reference nodes as vertices.
    pub fn reference(shape: ElementShape) -> Self {
        Self {
            shape,
            vertices: shape.reference_nodes(),
        }
    }

    /// A straight line2 element from `a` to `b`.
    pub fn line_segment(a: Point3<T>, b: Point3<T>) -> Self {
        Self {
            shape: ElementShape::Line2,
            vertices: vec![a, b],
        }
    }

    /// A bilinear quad4 element with the given corners.
    pub fn quad(corners: [Point3<T>; 4]) -> Self {
        Self {
            shape: ElementShape::Quad4,
            vertices: corners.to_vec(),
        }
    }

    /// A sub-entity (facet or line) given by local node indices.
    pub fn sub_geometry(&self, nodes: &[usize], shape: ElementShape) -> Self {
        Self {
            shape,
            vertices: nodes.iter().map(|n| self.vertices[*n]).collect(),
        }
    }

    /// The given facet as an element of its own.
    ///
    /// Panics if the element is a line.
    pub fn facet(&self, facet: usize) -> Self {
        let shape = self
            .shape
            .facet_shape()
            .expect("Point facets of lines are not elements");
        self.sub_geometry(self.shape.facets()[facet], shape)
    }

    pub fn line(&self, line: usize) -> Self {
        self.sub_geometry(self.shape.lines()[line], self.shape.line_shape())
    }

    #[allow(non_snake_case)]
    pub fn map_reference_coords(&self, xi: &Vector3<T>) -> Point3<T> {
        let N = self.shape.evaluate_basis(xi);
        let x = self
            .vertices
            .iter()
            .zip(N.iter())
            .fold(Vector3::zeros(), |acc, (v, n)| acc + v.coords * *n);
        Point3::from(x)
    }

    /// The 3x3 matrix `dX/dxi`. Columns beyond the reference dimension are zero.
    #[allow(non_snake_case)]
    pub fn reference_jacobian(&self, xi: &Vector3<T>) -> Matrix3<T> {
        let G = self.shape.gradients(xi);
        let mut J = Matrix3::zeros();
        for (v, g) in self.vertices.iter().zip(G.column_iter()) {
            J += v.coords * g.transpose();
        }
        J
    }

    pub fn diameter(&self) -> T {
        self.vertices
            .iter()
            .tuple_combinations()
            .map(|(x, y)| distance(x, y))
            .fold(T::zero(), |a, b| a.max(b))
    }

    /// Unit normal of a surface element at `xi`, `dX/dr x dX/ds` normalized.
    ///
    /// Returns `None` for elements that are not surfaces or where the surface is degenerate.
    pub fn surface_normal(&self, xi: &Vector3<T>) -> Option<Vector3<T>> {
        if self.shape.reference_dim() != 2 {
            return None;
        }
        let j = self.reference_jacobian(xi);
        let n = j.column(0).cross(&j.column(1));
        n.try_normalize(T::default_epsilon())
    }
}

impl<T: Real> BoundedGeometry<T> for ElementGeometry<T> {
    type Dimension = nalgebra::U3;

    fn bounding_box(&self) -> AxisAlignedBoundingBox3d<T> {
        AxisAlignedBoundingBox3d::from_points(&self.vertices)
            .expect("Element geometries always have at least two vertices")
    }
}
