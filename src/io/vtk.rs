//! Export of integration cells and PLC points to legacy VTK files, for debugging.
use crate::cells::{BoundaryIntCell, DomainIntCell};
use crate::element::{ElementGeometry, ElementShape};
use crate::tessellation::Plc;
use crate::Real;
use eyre::eyre;
use nalgebra::Point3;
use std::convert::TryInto;
use std::path::Path;
use vtkio::model::{
    Attribute, Attributes, ByteOrder, CellType, Cells, DataSet, Piece, UnstructuredGridPiece, Version, VertexNumbers,
    Vtk,
};

/// The VTK cell type of an element shape, if there is one.
pub fn vtk_cell_type(shape: ElementShape) -> Option<CellType> {
    match shape {
        ElementShape::Line2 => Some(CellType::Line),
        ElementShape::Line3 => Some(CellType::QuadraticEdge),
        ElementShape::Tri3 => Some(CellType::Triangle),
        ElementShape::Tri6 => Some(CellType::QuadraticTriangle),
        ElementShape::Quad4 => Some(CellType::Quad),
        ElementShape::Quad8 => Some(CellType::QuadraticQuad),
        ElementShape::Quad9 => Some(CellType::BiquadraticQuad),
        ElementShape::Tet4 => Some(CellType::Tetra),
        ElementShape::Tet10 => Some(CellType::QuadraticTetra),
        ElementShape::Hex8 => Some(CellType::Hexahedron),
    }
}

/// Writes the local node indices of a cell in VTK order.
fn write_vtk_connectivity(shape: ElementShape, connectivity: &mut [usize]) {
    if shape == ElementShape::Tet10 {
        // The midside nodes of the edges (1, 3) and (2, 3) are ordered the other way around in VTK
        connectivity.swap(8, 9);
    }
}

/// Accumulates cells into a single unstructured grid.
#[derive(Debug, Default)]
struct GridBuilder {
    points: Vec<f64>,
    vertices: Vec<u32>,
    cell_types: Vec<CellType>,
    num_points: usize,
}

impl GridBuilder {
    fn push_cell<T: Real>(&mut self, shape: ElementShape, coords: &[Point3<T>]) -> eyre::Result<()> {
        let cell_type = vtk_cell_type(shape).ok_or_else(|| eyre!("No VTK cell type for shape {}", shape))?;
        if coords.len() != shape.num_nodes() {
            return Err(eyre!(
                "Cell of shape {} has {} nodes, expected {}",
                shape,
                coords.len(),
                shape.num_nodes()
            ));
        }
        for x in coords {
            self.points.extend(
                x.coords
                    .iter()
                    .map(|x_i| x_i.to_subset().unwrap_or(f64::NAN)),
            );
        }

        let mut connectivity: Vec<usize> = (self.num_points..self.num_points + coords.len()).collect();
        write_vtk_connectivity(shape, &mut connectivity);
        self.vertices.push(coords.len().try_into()?);
        for idx in connectivity {
            self.vertices.push(idx.try_into()?);
        }
        self.cell_types.push(cell_type);
        self.num_points += coords.len();
        Ok(())
    }

    fn build(self, cell_data: Vec<Attribute>) -> eyre::Result<DataSet> {
        let num_cells = self.cell_types.len().try_into()?;
        let piece = UnstructuredGridPiece {
            points: self.points.into(),
            cells: Cells {
                cell_verts: VertexNumbers::Legacy {
                    num_cells,
                    vertices: self.vertices,
                },
                types: self.cell_types,
            },
            data: Attributes {
                point: Vec::new(),
                cell: cell_data,
            },
        };
        Ok(DataSet::UnstructuredGrid {
            meta: None,
            pieces: vec![Piece::Inline(Box::new(piece))],
        })
    }
}

/// Domain cells in physical coordinates, with the id of their xfem element as cell data.
pub fn domain_cells_data_set<'a, T, I>(cells: I) -> eyre::Result<DataSet>
where
    T: Real,
    I: IntoIterator<Item = (usize, &'a DomainIntCell<T>)>,
{
    let mut builder = GridBuilder::default();
    let mut xfem_ids = Vec::new();
    for (xfem_id, cell) in cells {
        builder.push_cell(cell.shape, &cell.physical_coords)?;
        xfem_ids.push(xfem_id as u64);
    }
    builder.build(vec![Attribute::scalars("xfem_element", 1).with_data(xfem_ids)])
}

/// Boundary cells in physical coordinates, with the ids of their xfem and cutter elements as
/// cell data.
pub fn boundary_cells_data_set<'a, T, I>(cells: I) -> eyre::Result<DataSet>
where
    T: Real,
    I: IntoIterator<Item = (usize, &'a BoundaryIntCell<T>)>,
{
    let mut builder = GridBuilder::default();
    let mut xfem_ids = Vec::new();
    let mut cutter_ids = Vec::new();
    for (xfem_id, cell) in cells {
        builder.push_cell(cell.shape, &cell.physical_coords)?;
        xfem_ids.push(xfem_id as u64);
        cutter_ids.push(cell.cutter_element_id as u64);
    }
    builder.build(vec![
        Attribute::scalars("xfem_element", 1).with_data(xfem_ids),
        Attribute::scalars("cutter_element", 1).with_data(cutter_ids),
    ])
}

/// The points of a PLC in physical coordinates of its xfem element, one vertex cell per point.
pub fn plc_points_data_set<T: Real>(plc: &Plc<T>, xfem: &ElementGeometry<T>) -> eyre::Result<DataSet> {
    let mut builder = GridBuilder::default();
    for xi in &plc.points {
        let x = xfem.map_reference_coords(&xi.coords);
        builder.points.extend(x.coords.iter().map(|x_i| x_i.to_subset().unwrap_or(f64::NAN)));
        builder.vertices.push(1);
        builder.vertices.push(builder.num_points.try_into()?);
        builder.cell_types.push(CellType::Vertex);
        builder.num_points += 1;
    }
    let point_ids: Vec<u64> = (0..plc.points.len() as u64).collect();
    builder.build(vec![Attribute::scalars("point", 1).with_data(point_ids)])
}

/// Writes a data set to a legacy VTK file. The file stem is used as title if none is given.
pub fn export_data_set(data_set: DataSet, path: impl AsRef<Path>, title: Option<&str>) -> eyre::Result<()> {
    let filepath = path.as_ref();
    let fallback_title = filepath
        .file_stem()
        .map(|os_str| os_str.to_string_lossy().to_string())
        .unwrap_or_else(|| "untitled".to_string());
    Vtk {
        version: Version { major: 4, minor: 1 },
        title: title.map(str::to_string).unwrap_or(fallback_title),
        byte_order: ByteOrder::BigEndian,
        data: data_set,
        file_path: None,
    }
    .export(filepath)
    .map_err(|err| eyre!("Failed to write {}: {:?}", filepath.display(), err))
}
