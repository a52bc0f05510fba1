//! Piecewise-linear interpolation on a triangulation.
//!
//! Point location walks across element neighbours starting from a hint
//! element, falling back to a linear scan when the walk leaves the mesh
//! (non-convex domains). Inside the containing triangle the field is
//! combined with barycentric weights, which is exactly the P1 finite
//! element interpolant.

use std::collections::HashMap;

use ndarray::ArrayView1;

/// Barycentric tolerance for "inside the triangle".
const INSIDE_TOL: f64 = 1e-10;

/// For each triangle, the neighbour across the edge opposite local
/// vertex `i` (`None` on the exterior boundary).
pub fn element_neighbours(triangles: &[[usize; 3]]) -> Vec<[Option<usize>; 3]> {
    let mut owners: HashMap<(usize, usize), Vec<(usize, usize)>> = HashMap::new();
    for (e, tri) in triangles.iter().enumerate() {
        for i in 0..3 {
            let a = tri[(i + 1) % 3];
            let b = tri[(i + 2) % 3];
            owners.entry((a.min(b), a.max(b))).or_default().push((e, i));
        }
    }

    let mut neighbours = vec![[None; 3]; triangles.len()];
    for shared in owners.values() {
        if shared.len() == 2 {
            let (e0, i0) = shared[0];
            let (e1, i1) = shared[1];
            neighbours[e0][i0] = Some(e1);
            neighbours[e1][i1] = Some(e0);
        }
    }
    neighbours
}

/// Barycentric coordinates of `p` with respect to triangle `(a, b, c)`.
pub fn barycentric(p: [f64; 2], a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> [f64; 3] {
    let det = (b[1] - c[1]) * (a[0] - c[0]) + (c[0] - b[0]) * (a[1] - c[1]);
    let l0 = ((b[1] - c[1]) * (p[0] - c[0]) + (c[0] - b[0]) * (p[1] - c[1])) / det;
    let l1 = ((c[1] - a[1]) * (p[0] - c[0]) + (a[0] - c[0]) * (p[1] - c[1])) / det;
    [l0, l1, 1.0 - l0 - l1]
}

/// Borrowed view of a triangulation used for scattered-point queries.
#[derive(Debug, Clone, Copy)]
pub struct Triangulation<'a> {
    points: &'a [[f64; 2]],
    triangles: &'a [[usize; 3]],
    neighbours: &'a [[Option<usize>; 3]],
}

impl<'a> Triangulation<'a> {
    pub fn new(
        points: &'a [[f64; 2]],
        triangles: &'a [[usize; 3]],
        neighbours: &'a [[Option<usize>; 3]],
    ) -> Self {
        Triangulation {
            points,
            triangles,
            neighbours,
        }
    }

    fn weights(&self, tri: usize, p: [f64; 2]) -> [f64; 3] {
        let [a, b, c] = self.triangles[tri];
        barycentric(p, self.points[a], self.points[b], self.points[c])
    }

    /// Containing triangle and barycentric weights, or `None` outside the mesh.
    pub fn locate(&self, p: [f64; 2], hint: Option<usize>) -> Option<(usize, [f64; 3])> {
        if self.triangles.is_empty() {
            return None;
        }
        let mut current = hint.filter(|&h| h < self.triangles.len()).unwrap_or(0);

        for _ in 0..self.triangles.len() {
            let w = self.weights(current, p);
            let (worst, min_w) = w
                .iter()
                .copied()
                .enumerate()
                .fold((0, f64::INFINITY), |acc, (i, v)| if v < acc.1 { (i, v) } else { acc });
            if min_w >= -INSIDE_TOL {
                return Some((current, w));
            }
            match self.neighbours[current][worst] {
                Some(next) => current = next,
                None => break,
            }
        }

        (0..self.triangles.len()).find_map(|t| {
            let w = self.weights(t, p);
            (w.iter().all(|&v| v >= -INSIDE_TOL)).then_some((t, w))
        })
    }

    /// P1 interpolant of a nodal `field` at `p`.
    pub fn interpolate(&self, field: ArrayView1<f64>, p: [f64; 2], hint: Option<usize>) -> Option<f64> {
        let (tri, w) = self.locate(p, hint)?;
        let nodes = self.triangles[tri];
        Some(w[0] * field[nodes[0]] + w[1] * field[nodes[1]] + w[2] * field[nodes[2]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unit square split along the (0,0)-(1,1) diagonal
    fn square() -> (Vec<[f64; 2]>, Vec<[usize; 3]>) {
        let points = vec![[0.0, 0.0], [1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        let triangles = vec![[0, 1, 3], [0, 3, 2]];
        (points, triangles)
    }

    #[test]
    fn test_neighbours_share_diagonal() {
        let (_, tris) = square();
        let nb = element_neighbours(&tris);
        // In [0,1,3] the diagonal 3-0 is opposite local vertex 1
        assert_eq!(nb[0][1], Some(1));
        // In [0,3,2] the diagonal 0-3 is opposite local vertex 2
        assert_eq!(nb[1][2], Some(0));
        assert_eq!(nb[0].iter().filter(|n| n.is_none()).count(), 2);
    }

    #[test]
    fn test_barycentric_vertices_and_centroid() {
        let a = [0.0, 0.0];
        let b = [2.0, 0.0];
        let c = [0.0, 2.0];
        let w = barycentric(b, a, b, c);
        assert!((w[1] - 1.0).abs() < 1e-14 && w[0].abs() < 1e-14 && w[2].abs() < 1e-14);
        let g = barycentric([2.0 / 3.0, 2.0 / 3.0], a, b, c);
        for v in g {
            assert!((v - 1.0 / 3.0).abs() < 1e-14, "centroid weight {v}");
        }
    }

    #[test]
    fn test_linear_field_reproduced_exactly() {
        let (points, tris) = square();
        let nb = element_neighbours(&tris);
        let tri = Triangulation::new(&points, &tris, &nb);
        let field: Vec<f64> = points.iter().map(|p| 1.0 + 2.0 * p[0] - 3.0 * p[1]).collect();
        for &p in &[[0.2, 0.1], [0.1, 0.8], [0.5, 0.5], [0.99, 0.01]] {
            let v = tri.interpolate(ArrayView1::from(&field[..]), p, Some(1)).unwrap();
            let exact = 1.0 + 2.0 * p[0] - 3.0 * p[1];
            assert!((v - exact).abs() < 1e-12, "at {p:?}: {v} vs {exact}");
        }
    }

    #[test]
    fn test_locate_walks_from_wrong_hint() {
        let (points, tris) = square();
        let nb = element_neighbours(&tris);
        let tri = Triangulation::new(&points, &tris, &nb);
        let (t, _) = tri.locate([0.9, 0.1], Some(1)).unwrap();
        assert_eq!(t, 0);
        let (t, _) = tri.locate([0.1, 0.9], Some(0)).unwrap();
        assert_eq!(t, 1);
    }

    #[test]
    fn test_outside_point_is_none() {
        let (points, tris) = square();
        let nb = element_neighbours(&tris);
        let tri = Triangulation::new(&points, &tris, &nb);
        assert!(tri.locate([1.5, 0.5], None).is_none());
        let zeros = [0.0; 4];
        assert!(tri.interpolate(ArrayView1::from(&zeros[..]), [-0.1, -0.1], None).is_none());
    }
}
