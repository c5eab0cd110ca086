//! The intersection driver.
//!
//! A pass runs candidate search, construction of the linearized interface, tessellation,
//! recovery of the curved interface and cell extraction for every xfem element with candidates.
use crate::candidates::{
    compute_candidate_pairs, redistribute_cutter_elements, renumber_cutter_elements, CandidateMap, Communicator,
};
use crate::cells::{BoundaryIntCell, DomainIntCell};
use crate::construction::construct_pair_interface;
use crate::element::{ElementGeometry, ElementShape};
use crate::error::IntersectionError;
use crate::interface::ElementAccumulator;
use crate::mesh::Discretization;
use crate::recovery::{InterfaceRecovery, RecoveryCutter};
use crate::tessellation::{ArrangementTessellator, Plc, TessellationOptions, Tessellator, TetMesh};
use crate::transform::current_to_surface_coordinates;
use crate::Real;
use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use xcut_optimize::newton::NewtonSettings;

/// Shapes of xfem elements that can be cut.
pub const XFEM_SHAPES: [ElementShape; 3] = [ElementShape::Hex8, ElementShape::Tet4, ElementShape::Tet10];

/// Shapes of cutter elements.
pub const CUTTER_SHAPES: [ElementShape; 5] = [
    ElementShape::Tri3,
    ElementShape::Tri6,
    ElementShape::Quad4,
    ElementShape::Quad8,
    ElementShape::Quad9,
];

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntersectionSettings {
    /// Residual tolerance of all curve-surface Newton solves.
    pub newton_tolerance: f64,
    pub max_iterations: usize,
    /// Iteration cap of the root finders used during recovery.
    pub max_recovery_iterations: usize,
    pub max_singular_steps: usize,
    /// Depth cap of the subdivision search enumerating all roots of a curve-surface pair.
    pub max_subdivision_depth: usize,
    /// Iteration cap when projecting points onto cutter elements.
    pub max_projection_iterations: usize,
    /// Produce tet10/tri6 cells instead of tet4/tri3.
    pub quadratic_cells: bool,
    pub recover_curved_interface: bool,
    /// Give cutter elements globally unique ids before redistribution.
    pub renumber_cutter_elements: bool,
    pub tessellation: TessellationOptions,
}

impl Default for IntersectionSettings {
    fn default() -> Self {
        Self {
            newton_tolerance: 1e-14,
            max_iterations: 30,
            max_recovery_iterations: 50,
            max_singular_steps: 5,
            max_subdivision_depth: 16,
            max_projection_iterations: 20,
            quadratic_cells: false,
            recover_curved_interface: true,
            renumber_cutter_elements: false,
            tessellation: TessellationOptions::default(),
        }
    }
}

impl IntersectionSettings {
    fn newton_settings<T: Real>(&self, max_iterations: usize) -> NewtonSettings<T> {
        NewtonSettings {
            tolerance: T::from_f64(self.newton_tolerance).unwrap(),
            max_singular_steps: self.max_singular_steps,
            ..NewtonSettings::with_max_iterations(max_iterations)
        }
    }
}

/// Counters of one intersection pass.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// Points the curved interface recovery could not lift. They keep their linear position.
    pub missed_points: usize,
    pub recovered_points: usize,
    /// Times the root enumeration stopped at the subdivision depth cap.
    pub depth_cap_hits: usize,
    pub cut_elements: usize,
    pub steiner_points: usize,
}

/// Result of an intersection pass. Cell maps are keyed by xfem element id and only contain cut
/// elements.
#[derive(Debug, Clone, PartialEq)]
pub struct IntersectionOutput<T: Real> {
    pub domain_cells: BTreeMap<usize, Vec<DomainIntCell<T>>>,
    pub boundary_cells: BTreeMap<usize, Vec<BoundaryIntCell<T>>>,
    pub candidates: CandidateMap,
    /// The redistributed cutter in its current configuration.
    pub cutter: Discretization<T>,
    pub diagnostics: Diagnostics,
}

/// Cells and counters of a single xfem element.
#[derive(Debug, Clone, PartialEq)]
pub struct ElementCells<T: Real> {
    pub domain_cells: Vec<DomainIntCell<T>>,
    pub boundary_cells: Vec<BoundaryIntCell<T>>,
    pub diagnostics: Diagnostics,
}

/// Intersects xfem discretizations with cutter discretizations.
#[derive(Debug, Clone)]
pub struct Intersection<S = ArrangementTessellator> {
    pub settings: IntersectionSettings,
    pub tessellator: S,
}

impl Default for Intersection<ArrangementTessellator> {
    fn default() -> Self {
        Self::new(IntersectionSettings::default())
    }
}

impl Intersection<ArrangementTessellator> {
    pub fn new(settings: IntersectionSettings) -> Self {
        Self {
            settings,
            tessellator: ArrangementTessellator::default(),
        }
    }
}

fn check_shapes<T: Real>(xfem: &Discretization<T>, cutter: &Discretization<T>) -> Result<(), IntersectionError> {
    for (id, element) in xfem.elements() {
        if !XFEM_SHAPES.contains(&element.shape()) {
            return Err(IntersectionError::UnsupportedShape {
                element: *id,
                shape: element.shape(),
            });
        }
    }
    for id in cutter.condition_elements()?.keys() {
        let shape = cutter.element(*id)?.shape();
        if !CUTTER_SHAPES.contains(&shape) {
            return Err(IntersectionError::UnsupportedShape { element: *id, shape });
        }
    }
    Ok(())
}

impl<S> Intersection<S> {
    /// Runs a full intersection pass on this rank.
    ///
    /// `xfem` holds the xfem elements of this rank, `cutter` the cutter elements of this rank and
    /// `displacements` the displacements of its cutter nodes. Cutter elements are redistributed
    /// so that every rank sees all of them; the result for an xfem element does not depend on
    /// how the cutter is partitioned.
    pub fn compute<T, C>(
        &self,
        xfem: &Discretization<T>,
        cutter: &Discretization<T>,
        displacements: &BTreeMap<usize, Vector3<T>>,
        comm: &C,
    ) -> Result<IntersectionOutput<T>, IntersectionError>
    where
        T: Real + Serialize + DeserializeOwned,
        S: Tessellator<T>,
        C: Communicator + ?Sized,
    {
        check_shapes(xfem, cutter)?;

        let redistributed = if self.settings.renumber_cutter_elements {
            let (renumbered, id_map) = renumber_cutter_elements(cutter, comm)?;
            debug!("Renumbered {} cutter elements on rank {}", id_map.len(), comm.rank());
            redistribute_cutter_elements(comm, &renumbered, displacements)?
        } else {
            redistribute_cutter_elements(comm, cutter, displacements)?
        };
        let current_cutter = redistributed
            .discretization
            .displaced(&redistributed.displacements);

        let candidates = compute_candidate_pairs(xfem, &current_cutter)?;

        let mut domain_cells = BTreeMap::new();
        let mut boundary_cells = BTreeMap::new();
        let mut diagnostics = Diagnostics::default();
        for (&xfem_id, cutter_ids) in &candidates {
            let xfem_geometry = xfem.element_geometry(xfem_id)?;
            let cutters = cutter_ids
                .iter()
                .map(|id| Ok((*id, current_cutter.element_geometry(*id)?)))
                .collect::<Result<Vec<_>, IntersectionError>>()?;
            let cells = self
                .intersect_element(xfem_id, &xfem_geometry, &cutters, &current_cutter)
                .map_err(|err| err.in_element(xfem_id))?;

            diagnostics.missed_points += cells.diagnostics.missed_points;
            diagnostics.recovered_points += cells.diagnostics.recovered_points;
            diagnostics.depth_cap_hits += cells.diagnostics.depth_cap_hits;
            diagnostics.steiner_points += cells.diagnostics.steiner_points;
            if !cells.domain_cells.is_empty() {
                diagnostics.cut_elements += 1;
                domain_cells.insert(xfem_id, cells.domain_cells);
                boundary_cells.insert(xfem_id, cells.boundary_cells);
            }
        }

        if diagnostics.missed_points > 0 {
            warn!(
                "Curved interface recovery missed {} points, which remain at their linear position",
                diagnostics.missed_points
            );
        }
        if diagnostics.depth_cap_hits > 0 {
            warn!(
                "Root enumeration hit the subdivision depth cap {} times",
                diagnostics.depth_cap_hits
            );
        }
        info!(
            "Intersection on rank {}: {} of {} candidate elements cut, {} domain cells, {} boundary cells",
            comm.rank(),
            diagnostics.cut_elements,
            candidates.len(),
            domain_cells.values().map(Vec::len).sum::<usize>(),
            boundary_cells.values().map(Vec::len).sum::<usize>()
        );

        Ok(IntersectionOutput {
            domain_cells,
            boundary_cells,
            candidates,
            cutter: current_cutter,
            diagnostics,
        })
    }

    /// Computes the cells of one xfem element cut by the given cutter elements, all in their
    /// current configuration.
    ///
    /// Returns no cells if the element is not cut, meaning no interface triangle was built. An
    /// interface lying on a facet of the element is returned by only one of the two elements
    /// sharing the facet.
    pub fn intersect_element<T>(
        &self,
        xfem_id: usize,
        xfem: &ElementGeometry<T>,
        cutters: &[(usize, ElementGeometry<T>)],
        cutter_mesh: &Discretization<T>,
    ) -> Result<ElementCells<T>, IntersectionError>
    where
        T: Real,
        S: Tessellator<T>,
    {
        let newton = self.settings.newton_settings(self.settings.max_iterations);
        let mut diagnostics = Diagnostics::default();
        let mut accumulator = ElementAccumulator::new(xfem.shape());
        for (cutter_id, cutter) in cutters {
            let outcome = construct_pair_interface(
                &mut accumulator,
                xfem,
                cutter,
                xfem_id,
                *cutter_id,
                &newton,
                self.settings.max_subdivision_depth,
            )?;
            diagnostics.depth_cap_hits += outcome.depth_cap_hits;
        }

        if !accumulator.is_cut() {
            return Ok(ElementCells {
                domain_cells: Vec::new(),
                boundary_cells: Vec::new(),
                diagnostics,
            });
        }

        let plc = Plc::from_accumulator(&accumulator);
        let options = TessellationOptions {
            quadratic: self.settings.quadratic_cells,
            ..self.settings.tessellation
        };
        let mut mesh = self
            .tessellator
            .tessellate(&plc, &options)
            .map_err(|error| IntersectionError::Tessellation { element: xfem_id, error })?;
        diagnostics.steiner_points = mesh.points.len() - mesh.num_input_points - mesh.midside_nodes.len();

        let marker_cutters = accumulator
            .intersecting_cutter_elements()
            .iter()
            .map(|id| {
                let geometry = cutters
                    .iter()
                    .find(|(cutter_id, _)| cutter_id == id)
                    .map(|(_, geometry)| geometry.clone())
                    .map_or_else(|| cutter_mesh.element_geometry(*id), Ok)?;
                Ok(RecoveryCutter {
                    element: cutter_mesh.element(*id)?.clone(),
                    geometry,
                })
            })
            .collect::<Result<Vec<_>, IntersectionError>>()?;

        if self.settings.recover_curved_interface {
            let recovery = InterfaceRecovery {
                xfem,
                cutters: &marker_cutters,
                newton: self.settings.newton_settings(self.settings.max_recovery_iterations),
                projection_iterations: self.settings.max_projection_iterations,
            };
            let stats = recovery.recover(&mut mesh)?;
            diagnostics.recovered_points = stats.recovered_points;
            diagnostics.missed_points = stats.missed_points;
        }

        let (domain_cells, mut boundary_cells) = self.extract_cells(xfem, &mesh, &marker_cutters);
        boundary_cells.extend(self.skimming_cells(xfem, &accumulator, &marker_cutters));
        debug!(
            "Xfem element {} has {} domain cells and {} boundary cells",
            xfem_id,
            domain_cells.len(),
            boundary_cells.len()
        );
        Ok(ElementCells {
            domain_cells,
            boundary_cells,
            diagnostics,
        })
    }

    fn extract_cells<T: Real>(
        &self,
        xfem: &ElementGeometry<T>,
        mesh: &TetMesh<T>,
        cutters: &[RecoveryCutter<T>],
    ) -> (Vec<DomainIntCell<T>>, Vec<BoundaryIntCell<T>>) {
        let domain_cells = mesh
            .tets
            .iter()
            .map(|tet| {
                let shape = if tet.len() == 10 {
                    ElementShape::Tet10
                } else {
                    ElementShape::Tet4
                };
                let domain_coords = tet.iter().map(|v| mesh.points[*v]).collect();
                DomainIntCell::from_domain_coords(xfem, shape, domain_coords)
            })
            .collect();

        let boundary_cells = mesh
            .interface_faces()
            .map(|(marker, face)| {
                let domain_coords = face.vertices.iter().map(|v| mesh.points[*v]).collect();
                self.boundary_cell(xfem, &cutters[marker], domain_coords)
            })
            .collect();

        (domain_cells, boundary_cells)
    }

    /// Boundary cells of the interface triangles lying on the facets of the element.
    fn skimming_cells<T: Real>(
        &self,
        xfem: &ElementGeometry<T>,
        accumulator: &ElementAccumulator<T>,
        cutters: &[RecoveryCutter<T>],
    ) -> Vec<BoundaryIntCell<T>> {
        let points = accumulator.points();
        accumulator
            .skimming_triangles()
            .iter()
            .map(|(triangle, marker)| {
                let mut domain_coords: Vec<Point3<T>> = triangle.iter().map(|v| points[*v]).collect();
                if self.settings.quadratic_cells {
                    let [a, b, c] = triangle.map(|v| points[v]);
                    domain_coords.extend([(a, b), (b, c), (c, a)].map(|(p, q)| nalgebra::center(&p, &q)));
                }
                self.boundary_cell(xfem, &cutters[*marker], domain_coords)
            })
            .collect()
    }

    /// A tri3 or tri6 boundary cell from its nodes in the reference frame of the xfem element.
    fn boundary_cell<T: Real>(
        &self,
        xfem: &ElementGeometry<T>,
        cutter: &RecoveryCutter<T>,
        domain_coords: Vec<Point3<T>>,
    ) -> BoundaryIntCell<T> {
        let shape = if domain_coords.len() == 6 {
            ElementShape::Tri6
        } else {
            ElementShape::Tri3
        };
        let physical_coords: Vec<Point3<T>> = domain_coords
            .iter()
            .map(|xi| xfem.map_reference_coords(&xi.coords))
            .collect();
        let boundary_coords = physical_coords
            .iter()
            .map(|x| {
                let projection = current_to_surface_coordinates(&cutter.geometry, x, self.settings.max_projection_iterations);
                Point3::from(projection.xi)
            })
            .collect();
        BoundaryIntCell {
            shape,
            cutter_element_id: cutter.element.id(),
            domain_coords,
            boundary_coords,
            physical_coords,
        }
    }
}
