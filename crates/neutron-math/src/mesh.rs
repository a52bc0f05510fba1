// ─────────────────────────────────────────────────────────────────────
// SCPN Fusion Core — Triangular Finite-Element Mesh
// © 1998–2026 Miroslav Šotek. All rights reserved.
// Contact: www.anulum.li | protoscience@anulum.li
// ORCID: https://orcid.org/0009-0009-3560-0851
// License: GNU AGPL v3 | Commercial licensing available
// ─────────────────────────────────────────────────────────────────────
//! Unstructured 2D triangular mesh with linear (P1) Lagrange basis.
//!
//! Per element the mesh precomputes the area, the basis coefficients
//! `φ_i(x, y) = a_i + b_i x + c_i y` and their constant gradients.
//! Exterior edges are those owned by a single element; each carries its
//! axis-aligned side (if any) and outward unit normal.
//!
//! Quadrature:
//! - area: 3-point edge-midpoint rule, weight A/3, exact for quadratics
//! - edge: 2-point Gauss-Legendre, exact for cubics along the edge

use ndarray::ArrayView1;
use neutron_types::constants::BOUNDARY_TOL;
use neutron_types::error::{TransportError, TransportResult};

use crate::interp::{element_neighbours, Triangulation};

/// Barycentric coordinates of the three area quadrature points
/// (midpoints of edges 0-1, 1-2, 2-0).
pub const AREA_QUADRATURE: [[f64; 3]; 3] = [[0.5, 0.5, 0.0], [0.0, 0.5, 0.5], [0.5, 0.0, 0.5]];

/// Gauss-Legendre abscissae on [0, 1] for the 2-point edge rule.
const EDGE_GAUSS: [f64; 2] = [0.211_324_865_405_187_1, 0.788_675_134_594_812_9];

/// Axis-aligned side of the bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoundarySide {
    XMin,
    XMax,
    YMin,
    YMax,
}

impl BoundarySide {
    pub fn normal(self) -> [f64; 2] {
        match self {
            BoundarySide::XMin => [-1.0, 0.0],
            BoundarySide::XMax => [1.0, 0.0],
            BoundarySide::YMin => [0.0, -1.0],
            BoundarySide::YMax => [0.0, 1.0],
        }
    }
}

/// Exterior edge of the mesh.
#[derive(Debug, Clone)]
pub struct BoundaryEdge {
    pub element: usize,
    /// Local vertex indices within `element`.
    pub local: [usize; 2],
    /// Global node ids, same order as `local`.
    pub nodes: [usize; 2],
    /// `None` for edges not lying on the bounding box.
    pub side: Option<BoundarySide>,
    pub normal: [f64; 2],
    pub length: f64,
}

/// Triangular mesh with precomputed P1 element data.
#[derive(Debug, Clone)]
pub struct TriGrid {
    points: Vec<[f64; 2]>,
    triangles: Vec<[usize; 3]>,
    materials: Vec<usize>,
    areas: Vec<f64>,
    /// Per element, per local node: [a, b, c].
    basis: Vec<[[f64; 3]; 3]>,
    gradients: Vec<[[f64; 2]; 3]>,
    neighbours: Vec<[Option<usize>; 3]>,
    boundary_edges: Vec<BoundaryEdge>,
    element_boundary: Vec<Vec<usize>>,
    node_boundary_edges: Vec<Vec<usize>>,
    node_elements: Vec<Vec<usize>>,
    bounds: [f64; 4],
}

impl TriGrid {
    /// Build from raw node coordinates, triangle connectivity and per-element
    /// material ids. Triangles are reoriented counter-clockwise.
    pub fn from_parts(
        points: Vec<[f64; 2]>,
        triangles: Vec<[usize; 3]>,
        materials: Vec<usize>,
    ) -> TransportResult<Self> {
        if triangles.is_empty() {
            return Err(TransportError::ConfigError("mesh has no elements".to_string()));
        }
        if materials.len() != triangles.len() {
            return Err(TransportError::ConfigError(format!(
                "mesh has {} elements but {} material ids",
                triangles.len(),
                materials.len()
            )));
        }

        let mut bounds = [f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY];
        for p in &points {
            bounds[0] = bounds[0].min(p[0]);
            bounds[1] = bounds[1].max(p[0]);
            bounds[2] = bounds[2].min(p[1]);
            bounds[3] = bounds[3].max(p[1]);
        }
        let scale = (bounds[1] - bounds[0]).max(bounds[3] - bounds[2]).max(1.0);
        let tol = BOUNDARY_TOL * scale;

        let mut triangles = triangles;
        let mut areas = Vec::with_capacity(triangles.len());
        let mut basis = Vec::with_capacity(triangles.len());
        let mut gradients = Vec::with_capacity(triangles.len());
        let mut node_elements = vec![Vec::new(); points.len()];

        for (e, tri) in triangles.iter_mut().enumerate() {
            if tri.iter().any(|&n| n >= points.len()) {
                return Err(TransportError::ConfigError(format!(
                    "element {e} references a node outside 0..{}",
                    points.len()
                )));
            }
            let [p0, p1, p2] = [points[tri[0]], points[tri[1]], points[tri[2]]];
            let mut twice_area = (p1[0] - p0[0]) * (p2[1] - p0[1]) - (p2[0] - p0[0]) * (p1[1] - p0[1]);
            if twice_area.abs() <= tol * tol {
                return Err(TransportError::ConfigError(format!(
                    "element {e} is degenerate (area {})",
                    0.5 * twice_area
                )));
            }
            if twice_area < 0.0 {
                tri.swap(1, 2);
                twice_area = -twice_area;
            }

            let mut coeffs = [[0.0; 3]; 3];
            let mut grads = [[0.0; 2]; 3];
            for i in 0..3 {
                let pj = points[tri[(i + 1) % 3]];
                let pk = points[tri[(i + 2) % 3]];
                let a = (pj[0] * pk[1] - pk[0] * pj[1]) / twice_area;
                let b = (pj[1] - pk[1]) / twice_area;
                let c = (pk[0] - pj[0]) / twice_area;
                coeffs[i] = [a, b, c];
                grads[i] = [b, c];
            }
            for &n in tri.iter() {
                node_elements[n].push(e);
            }
            areas.push(0.5 * twice_area);
            basis.push(coeffs);
            gradients.push(grads);
        }

        let neighbours = element_neighbours(&triangles);
        let mut boundary_edges = Vec::new();
        let mut element_boundary = vec![Vec::new(); triangles.len()];
        let mut node_boundary_edges = vec![Vec::new(); points.len()];

        for (e, tri) in triangles.iter().enumerate() {
            for opposite in 0..3 {
                if neighbours[e][opposite].is_some() {
                    continue;
                }
                let la = (opposite + 1) % 3;
                let lb = (opposite + 2) % 3;
                let (na, nb) = (tri[la], tri[lb]);
                let (pa, pb) = (points[na], points[nb]);
                let side = classify_side(pa, pb, &bounds, tol);
                let dx = pb[0] - pa[0];
                let dy = pb[1] - pa[1];
                let length = (dx * dx + dy * dy).sqrt();
                let normal = match side {
                    Some(s) => s.normal(),
                    // Counter-clockwise element: the outward normal of edge a→b is (dy, -dx)
                    None => [dy / length, -dx / length],
                };
                let idx = boundary_edges.len();
                boundary_edges.push(BoundaryEdge {
                    element: e,
                    local: [la, lb],
                    nodes: [na, nb],
                    side,
                    normal,
                    length,
                });
                element_boundary[e].push(idx);
                node_boundary_edges[na].push(idx);
                node_boundary_edges[nb].push(idx);
            }
        }

        Ok(TriGrid {
            points,
            triangles,
            materials,
            areas,
            basis,
            gradients,
            neighbours,
            boundary_edges,
            element_boundary,
            node_boundary_edges,
            node_elements,
            bounds,
        })
    }

    /// Structured mesh of `nx × ny` rectangular cells, each split along the
    /// (i, j)–(i+1, j+1) diagonal. Nodes are numbered row-major
    /// (`j * (nx + 1) + i`); `material` is evaluated at element centroids.
    pub fn rectangle<F>(
        nx: usize,
        ny: usize,
        x_range: (f64, f64),
        y_range: (f64, f64),
        material: F,
    ) -> TransportResult<Self>
    where
        F: Fn(f64, f64) -> usize,
    {
        if nx == 0 || ny == 0 {
            return Err(TransportError::ConfigError(format!(
                "rectangle mesh needs at least one cell per axis, got {nx}x{ny}"
            )));
        }
        if x_range.1 <= x_range.0 || y_range.1 <= y_range.0 {
            return Err(TransportError::ConfigError(
                "rectangle mesh needs increasing coordinate ranges".to_string(),
            ));
        }
        let dx = (x_range.1 - x_range.0) / nx as f64;
        let dy = (y_range.1 - y_range.0) / ny as f64;

        let mut points = Vec::with_capacity((nx + 1) * (ny + 1));
        for j in 0..=ny {
            for i in 0..=nx {
                points.push([x_range.0 + i as f64 * dx, y_range.0 + j as f64 * dy]);
            }
        }

        let id = |i: usize, j: usize| j * (nx + 1) + i;
        let mut triangles = Vec::with_capacity(2 * nx * ny);
        let mut materials = Vec::with_capacity(2 * nx * ny);
        for j in 0..ny {
            for i in 0..nx {
                let (n00, n10, n01, n11) = (id(i, j), id(i + 1, j), id(i, j + 1), id(i + 1, j + 1));
                for tri in [[n00, n10, n11], [n00, n11, n01]] {
                    let cx = tri.iter().map(|&n| points[n][0]).sum::<f64>() / 3.0;
                    let cy = tri.iter().map(|&n| points[n][1]).sum::<f64>() / 3.0;
                    materials.push(material(cx, cy));
                    triangles.push(tri);
                }
            }
        }

        Self::from_parts(points, triangles, materials)
    }

    pub fn num_nodes(&self) -> usize {
        self.points.len()
    }

    pub fn num_elements(&self) -> usize {
        self.triangles.len()
    }

    pub fn node(&self, n: usize) -> [f64; 2] {
        self.points[n]
    }

    pub fn element_nodes(&self, e: usize) -> [usize; 3] {
        self.triangles[e]
    }

    pub fn element_points(&self, e: usize) -> [[f64; 2]; 3] {
        let t = self.triangles[e];
        [self.points[t[0]], self.points[t[1]], self.points[t[2]]]
    }

    pub fn material(&self, e: usize) -> usize {
        self.materials[e]
    }

    pub fn materials(&self) -> &[usize] {
        &self.materials
    }

    pub fn area(&self, e: usize) -> f64 {
        self.areas[e]
    }

    pub fn total_area(&self) -> f64 {
        self.areas.iter().sum()
    }

    /// `[a, b, c]` of `φ_local = a + b x + c y`.
    pub fn basis_coefficients(&self, e: usize, local: usize) -> [f64; 3] {
        self.basis[e][local]
    }

    pub fn evaluate_basis(&self, e: usize, local: usize, p: [f64; 2]) -> f64 {
        let [a, b, c] = self.basis[e][local];
        a + b * p[0] + c * p[1]
    }

    /// Constant gradient of local basis function `local` on element `e`.
    pub fn gradient(&self, e: usize, local: usize) -> [f64; 2] {
        self.gradients[e][local]
    }

    pub fn gradients(&self, e: usize) -> [[f64; 2]; 3] {
        self.gradients[e]
    }

    /// Physical coordinates and weights of the area quadrature points.
    pub fn quadrature_points(&self, e: usize) -> [([f64; 2], f64); 3] {
        let pts = self.element_points(e);
        let w = self.areas[e] / 3.0;
        AREA_QUADRATURE.map(|bary| {
            let x = bary[0] * pts[0][0] + bary[1] * pts[1][0] + bary[2] * pts[2][0];
            let y = bary[0] * pts[0][1] + bary[1] * pts[1][1] + bary[2] * pts[2][1];
            ([x, y], w)
        })
    }

    /// Consistent mass matrix `∫ φ_i φ_j` of element `e` via the area rule.
    pub fn element_mass(&self, e: usize) -> [[f64; 3]; 3] {
        let w = self.areas[e] / 3.0;
        let mut m = [[0.0; 3]; 3];
        for q in AREA_QUADRATURE.iter() {
            for i in 0..3 {
                for j in 0..3 {
                    m[i][j] += w * q[i] * q[j];
                }
            }
        }
        m
    }

    /// 2-point Gauss rule on a boundary edge: (point, [φ_a, φ_b], weight).
    pub fn edge_quadrature(&self, edge: usize) -> [([f64; 2], [f64; 2], f64); 2] {
        let be = &self.boundary_edges[edge];
        let pa = self.points[be.nodes[0]];
        let pb = self.points[be.nodes[1]];
        let w = 0.5 * be.length;
        EDGE_GAUSS.map(|t| {
            let p = [pa[0] + t * (pb[0] - pa[0]), pa[1] + t * (pb[1] - pa[1])];
            (p, [1.0 - t, t], w)
        })
    }

    /// Edge mass matrix `∫_edge φ_a φ_b ds` in edge-local order.
    pub fn edge_mass(&self, edge: usize) -> [[f64; 2]; 2] {
        let mut m = [[0.0; 2]; 2];
        for (_, phi, w) in self.edge_quadrature(edge) {
            for a in 0..2 {
                for b in 0..2 {
                    m[a][b] += w * phi[a] * phi[b];
                }
            }
        }
        m
    }

    pub fn boundary_edges(&self) -> &[BoundaryEdge] {
        &self.boundary_edges
    }

    pub fn boundary_edge(&self, edge: usize) -> &BoundaryEdge {
        &self.boundary_edges[edge]
    }

    /// Indices of the exterior edges owned by element `e`.
    pub fn element_boundary_edges(&self, e: usize) -> &[usize] {
        &self.element_boundary[e]
    }

    pub fn is_interior(&self, n: usize) -> bool {
        self.node_boundary_edges[n].is_empty()
    }

    pub fn is_boundary(&self, n: usize) -> bool {
        !self.is_interior(n)
    }

    /// A node touching two exterior edges with different outward normals.
    pub fn is_corner(&self, n: usize) -> bool {
        let edges = &self.node_boundary_edges[n];
        edges.iter().enumerate().any(|(i, &a)| {
            edges[i + 1..].iter().any(|&b| {
                let na = self.boundary_edges[a].normal;
                let nb = self.boundary_edges[b].normal;
                na[0] * nb[0] + na[1] * nb[1] < 1.0 - 1e-8
            })
        })
    }

    /// Local vertex of `e` whose two incident element edges are both on the
    /// exterior boundary.
    pub fn whole_element_corner(&self, e: usize) -> Option<usize> {
        let edges = &self.element_boundary[e];
        if edges.len() < 2 {
            return None;
        }
        (0..3).find(|&local| {
            edges
                .iter()
                .filter(|&&be| self.boundary_edges[be].local.contains(&local))
                .count()
                >= 2
        })
    }

    pub fn is_whole_element_corner(&self, n: usize) -> bool {
        self.node_elements[n].iter().any(|&e| {
            self.whole_element_corner(e)
                .is_some_and(|local| self.triangles[e][local] == n)
        })
    }

    /// Elements containing node `n`.
    pub fn node_elements(&self, n: usize) -> &[usize] {
        &self.node_elements[n]
    }

    /// `[xmin, xmax, ymin, ymax]`
    pub fn bounds(&self) -> [f64; 4] {
        self.bounds
    }

    pub fn centroid(&self, e: usize) -> [f64; 2] {
        let pts = self.element_points(e);
        [
            (pts[0][0] + pts[1][0] + pts[2][0]) / 3.0,
            (pts[0][1] + pts[1][1] + pts[2][1]) / 3.0,
        ]
    }

    /// Value of the P1 field at the centroid of `e`.
    pub fn interpolate_to_centroid(&self, e: usize, field: ArrayView1<f64>) -> f64 {
        let t = self.triangles[e];
        (field[t[0]] + field[t[1]] + field[t[2]]) / 3.0
    }

    /// Point-location and interpolation handle over this mesh.
    pub fn triangulation(&self) -> Triangulation<'_> {
        Triangulation::new(&self.points, &self.triangles, &self.neighbours)
    }
}

fn classify_side(pa: [f64; 2], pb: [f64; 2], bounds: &[f64; 4], tol: f64) -> Option<BoundarySide> {
    let on = |v: f64, target: f64| (v - target).abs() <= tol;
    if on(pa[0], bounds[0]) && on(pb[0], bounds[0]) {
        Some(BoundarySide::XMin)
    } else if on(pa[0], bounds[1]) && on(pb[0], bounds[1]) {
        Some(BoundarySide::XMax)
    } else if on(pa[1], bounds[2]) && on(pb[1], bounds[2]) {
        Some(BoundarySide::YMin)
    } else if on(pa[1], bounds[3]) && on(pb[1], bounds[3]) {
        Some(BoundarySide::YMax)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array1;

    fn unit_square(n: usize) -> TriGrid {
        TriGrid::rectangle(n, n, (0.0, 1.0), (0.0, 1.0), |_, _| 0).unwrap()
    }

    #[test]
    fn test_rectangle_counts_and_area() {
        let grid = TriGrid::rectangle(4, 3, (0.0, 2.0), (-1.0, 2.0), |_, _| 0).unwrap();
        assert_eq!(grid.num_nodes(), 5 * 4);
        assert_eq!(grid.num_elements(), 2 * 4 * 3);
        assert!((grid.total_area() - 6.0).abs() < 1e-12);
        assert_eq!(grid.boundary_edges().len(), 2 * (4 + 3));
    }

    #[test]
    fn test_basis_partition_of_unity_and_nodal_property() {
        let grid = unit_square(3);
        for e in 0..grid.num_elements() {
            let pts = grid.element_points(e);
            for (i, p) in pts.iter().enumerate() {
                for j in 0..3 {
                    let v = grid.evaluate_basis(e, j, *p);
                    let expected = if i == j { 1.0 } else { 0.0 };
                    assert!((v - expected).abs() < 1e-12, "φ_{j}(x_{i}) = {v}");
                }
            }
            for l in 0..3 {
                let [_, b, c] = grid.basis_coefficients(e, l);
                assert_eq!([b, c], grid.gradient(e, l));
            }
            let g: [f64; 2] = (0..3).fold([0.0, 0.0], |acc, l| {
                let gl = grid.gradient(e, l);
                [acc[0] + gl[0], acc[1] + gl[1]]
            });
            assert!(g[0].abs() < 1e-12 && g[1].abs() < 1e-12, "Σ∇φ ≠ 0");
        }
    }

    #[test]
    fn test_element_mass_closed_form() {
        let grid = unit_square(2);
        let a = grid.area(0);
        let m = grid.element_mass(0);
        for i in 0..3 {
            for j in 0..3 {
                let exact = if i == j { a / 6.0 } else { a / 12.0 };
                assert!((m[i][j] - exact).abs() < 1e-14);
            }
        }
    }

    #[test]
    fn test_edge_mass_closed_form() {
        let grid = unit_square(2);
        for edge in 0..grid.boundary_edges().len() {
            let l = grid.boundary_edge(edge).length;
            let m = grid.edge_mass(edge);
            assert!((m[0][0] - l / 3.0).abs() < 1e-14);
            assert!((m[0][1] - l / 6.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_boundary_sides_and_normals() {
        let grid = unit_square(2);
        let mut counts = [0usize; 4];
        for be in grid.boundary_edges() {
            let side = be.side.unwrap();
            counts[side as usize] += 1;
            assert_eq!(be.normal, side.normal());
        }
        assert_eq!(counts, [2, 2, 2, 2]);
    }

    #[test]
    fn test_interior_and_corner_classification() {
        let grid = unit_square(2);
        // Node 4 is the centre of a 3x3 node lattice
        assert!(grid.is_interior(4));
        assert!(grid.is_boundary(1));
        assert!(!grid.is_corner(1));
        for corner in [0, 2, 6, 8] {
            assert!(grid.is_corner(corner), "node {corner} should be a corner");
        }
        // Only (xmax, ymin) and (xmin, ymax) sit in a single element
        assert!(grid.is_whole_element_corner(2));
        assert!(grid.is_whole_element_corner(6));
        assert!(!grid.is_whole_element_corner(0));
        assert!(!grid.is_whole_element_corner(8));
    }

    #[test]
    fn test_geometric_normal_for_slanted_boundary() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        let grid = TriGrid::from_parts(points, vec![[0, 2, 1]], vec![0]).unwrap();
        let slanted = grid
            .boundary_edges()
            .iter()
            .find(|be| be.side.is_none())
            .unwrap();
        let s = 1.0 / 2f64.sqrt();
        assert!((slanted.normal[0] - s).abs() < 1e-12);
        assert!((slanted.normal[1] - s).abs() < 1e-12);
        assert_eq!(grid.whole_element_corner(0).is_some(), true);
    }

    #[test]
    fn test_quadrature_integrates_linear_field() {
        let grid = unit_square(3);
        // ∫(x + 2y) over the unit square = 1/2 + 1 = 1.5
        let mut total = 0.0;
        for e in 0..grid.num_elements() {
            for (p, w) in grid.quadrature_points(e) {
                total += w * (p[0] + 2.0 * p[1]);
            }
        }
        assert!((total - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_centroid_interpolation_and_triangulation_agree() {
        let grid = unit_square(3);
        let field = Array1::from_shape_fn(grid.num_nodes(), |n| {
            let p = grid.node(n);
            3.0 * p[0] - p[1]
        });
        let tri = grid.triangulation();
        for e in 0..grid.num_elements() {
            let c = grid.centroid(e);
            let a = grid.interpolate_to_centroid(e, field.view());
            let b = tri.interpolate(field.view(), c, Some(e)).unwrap();
            assert!((a - b).abs() < 1e-12);
            assert!((a - (3.0 * c[0] - c[1])).abs() < 1e-12);
        }
    }

    #[test]
    fn test_material_by_centroid() {
        let grid = TriGrid::rectangle(4, 1, (0.0, 4.0), (0.0, 1.0), |x, _| usize::from(x > 2.0)).unwrap();
        for e in 0..grid.num_elements() {
            let expected = usize::from(grid.centroid(e)[0] > 2.0);
            assert_eq!(grid.material(e), expected);
        }
    }

    #[test]
    fn test_rejects_degenerate_element() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [2.0, 0.0]];
        assert!(TriGrid::from_parts(points, vec![[0, 1, 2]], vec![0]).is_err());
    }

    #[test]
    fn test_rejects_bad_node_index() {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]];
        assert!(TriGrid::from_parts(points, vec![[0, 1, 5]], vec![0]).is_err());
    }
}
