//! Interface points and the per-element accumulator of the linearized interface.
use crate::element::{ElementShape, FacetSet};
use crate::Real;
use nalgebra::{Point3, Scalar, Vector3};
use xcut_geometry::{points_equal, TOL7};

/// How an interface point was found, or where it lies relative to the xfem element.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PointType {
    /// A cutter node strictly inside the xfem element.
    Internal,
    /// A point on a single facet of the xfem element.
    Surface,
    /// A point on an edge of the xfem element (two facets).
    Line,
    /// A point coinciding with a corner node of the xfem element (three facets).
    Node,
    /// A crossing of a line element with a surface element.
    Intersection,
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct InterfacePoint<T: Scalar> {
    /// Coordinates in the frame the point was computed in: xfem-local for stored points,
    /// cutter-local (third component zero) for hull construction.
    pub coord: Vector3<T>,
    pub point_type: PointType,
    surfaces: FacetSet,
}

impl<T: Scalar> InterfacePoint<T> {
    pub fn new(coord: Vector3<T>, point_type: PointType, surfaces: FacetSet) -> Self {
        Self {
            coord,
            point_type,
            surfaces,
        }
    }

    /// Classifies a point by the number of xfem facets it lies on.
    pub fn classified(coord: Vector3<T>, surfaces: FacetSet) -> Self {
        let point_type = match surfaces.len() {
            0 => PointType::Internal,
            1 => PointType::Surface,
            2 => PointType::Line,
            _ => PointType::Node,
        };
        Self::new(coord, point_type, surfaces)
    }

    /// The xfem facets the point lies on.
    pub fn surfaces(&self) -> &[usize] {
        self.surfaces.as_slice()
    }

    pub fn facet_set(&self) -> &FacetSet {
        &self.surfaces
    }

    pub fn num_surfaces(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_on_boundary(&self) -> bool {
        !self.surfaces.is_empty()
    }
}

/// Everything collected for one xfem element before tessellation.
///
/// Points are stored in xfem-local coordinates. The corner nodes of the xfem element occupy the
/// first `num_corner_nodes` points.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementAccumulator<T: Scalar> {
    shape: ElementShape,
    points: Vec<Point3<T>>,
    num_corner_nodes: usize,
    segments: Vec<Vec<[usize; 2]>>,
    surface_points: Vec<Vec<usize>>,
    triangles: Vec<[usize; 3]>,
    face_markers: Vec<usize>,
    skimming_triangles: Vec<([usize; 3], usize)>,
    intersecting_cutter_elements: Vec<usize>,
}

impl<T: Real> ElementAccumulator<T> {
    /// An accumulator holding the corner nodes of the reference element of `shape`.
    pub fn new(shape: ElementShape) -> Self {
        let num_corner_nodes = shape.num_corner_nodes();
        let points = shape
            .reference_nodes()
            .into_iter()
            .take(num_corner_nodes)
            .collect();
        Self {
            shape,
            points,
            num_corner_nodes,
            segments: vec![Vec::new(); shape.num_facets()],
            surface_points: vec![Vec::new(); shape.num_facets()],
            triangles: Vec::new(),
            face_markers: Vec::new(),
            skimming_triangles: Vec::new(),
            intersecting_cutter_elements: Vec::new(),
        }
    }

    pub fn shape(&self) -> ElementShape {
        self.shape
    }

    pub fn points(&self) -> &[Point3<T>] {
        &self.points
    }

    pub fn num_corner_nodes(&self) -> usize {
        self.num_corner_nodes
    }

    /// Segments per facet of the xfem element.
    pub fn segments(&self) -> &[Vec<[usize; 2]>] {
        &self.segments
    }

    /// Isolated points per facet of the xfem element.
    pub fn surface_points(&self) -> &[Vec<usize>] {
        &self.surface_points
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// The face marker of every triangle, indexing [`Self::intersecting_cutter_elements`].
    pub fn face_markers(&self) -> &[usize] {
        &self.face_markers
    }

    /// Interface triangles lying on a facet of the xfem element, with their face markers.
    ///
    /// They are not part of the PLC and become boundary cells as they are.
    pub fn skimming_triangles(&self) -> &[([usize; 3], usize)] {
        &self.skimming_triangles
    }

    pub fn intersecting_cutter_elements(&self) -> &[usize] {
        &self.intersecting_cutter_elements
    }

    /// Index of the stored point equal to `point` within `TOL7`.
    pub fn find_point(&self, point: &Point3<T>) -> Option<usize> {
        let tol = T::from_f64(TOL7).unwrap();
        self.points.iter().position(|p| points_equal(p, point, tol))
    }

    /// Stores a point unless an equal point (within `TOL7`) exists, and returns its index.
    pub fn store_point(&mut self, point: Point3<T>) -> usize {
        match self.find_point(&point) {
            Some(idx) => idx,
            None => {
                self.points.push(point);
                self.points.len() - 1
            }
        }
    }

    /// Stores a segment on the given facet. Degenerate segments and segments already present in
    /// either orientation are ignored.
    pub fn store_segment(&mut self, facet: usize, a: usize, b: usize) {
        assert!(a < self.points.len() && b < self.points.len(), "Segment index out of bounds");
        if a == b {
            return;
        }
        let segments = &mut self.segments[facet];
        if !segments.contains(&[a, b]) && !segments.contains(&[b, a]) {
            segments.push([a, b]);
        }
    }

    pub fn store_surface_point(&mut self, facet: usize, point: usize) {
        assert!(point < self.points.len(), "Surface point index out of bounds");
        let surface_points = &mut self.surface_points[facet];
        if !surface_points.contains(&point) {
            surface_points.push(point);
        }
    }

    pub fn store_triangle(&mut self, triangle: [usize; 3], face_marker: usize) {
        assert!(
            triangle.iter().all(|idx| *idx < self.points.len()),
            "Triangle index out of bounds"
        );
        assert!(
            face_marker < self.intersecting_cutter_elements.len(),
            "Face marker does not refer to an intersecting cutter element"
        );
        self.triangles.push(triangle);
        self.face_markers.push(face_marker);
    }

    pub fn store_skimming_triangle(&mut self, triangle: [usize; 3], face_marker: usize) {
        assert!(
            triangle.iter().all(|idx| *idx < self.points.len()),
            "Triangle index out of bounds"
        );
        assert!(
            face_marker < self.intersecting_cutter_elements.len(),
            "Face marker does not refer to an intersecting cutter element"
        );
        self.skimming_triangles.push((triangle, face_marker));
    }

    /// Records a cutter element as intersecting and returns its face marker.
    pub fn register_cutter_element(&mut self, cutter_element: usize) -> usize {
        match self
            .intersecting_cutter_elements
            .iter()
            .position(|id| *id == cutter_element)
        {
            Some(marker) => marker,
            None => {
                self.intersecting_cutter_elements.push(cutter_element);
                self.intersecting_cutter_elements.len() - 1
            }
        }
    }

    /// Whether any interface triangle, in the element or on its facets, was collected.
    pub fn is_cut(&self) -> bool {
        !self.triangles.is_empty() || !self.skimming_triangles.is_empty()
    }

    /// Whether anything beyond the corner nodes was collected.
    pub fn has_interface(&self) -> bool {
        self.points.len() > self.num_corner_nodes
    }
}
