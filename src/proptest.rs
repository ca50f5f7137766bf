use crate::mapping::LineMapping;
use crate::mesh::procedural::create_interval_mesh_from_points;
use crate::mesh::Mesh;
use ::proptest::collection::vec;
use ::proptest::prelude::*;
use nalgebra::Point1;

pub fn point1() -> impl Strategy<Value = Point1<f64>> {
    // Keep coordinates in a moderate range so that products of coordinates stay well conditioned
    (-10.0..10.0).prop_map(Point1::new)
}

/// Points in the reference interval `[-1, 1]`.
pub fn reference_point() -> impl Strategy<Value = Point1<f64>> {
    (-1.0..=1.0).prop_map(Point1::new)
}

/// Strictly increasing sequences of `2..=max_cells + 1` points.
///
/// Consecutive points are at least `0.01` apart, so that no generated cell is degenerate.
pub fn interval_mesh_points(max_cells: usize) -> impl Strategy<Value = Vec<f64>> {
    let max_cells = max_cells.max(1);
    (point1(), vec(0.01..2.0, 1..=max_cells)).prop_map(|(start, spacings)| {
        let mut points = Vec::with_capacity(spacings.len() + 1);
        points.push(start.x);
        for h in spacings {
            let last = points[points.len() - 1];
            points.push(last + h);
        }
        points
    })
}

/// Non-uniform interval meshes with between one and `max_cells` cells.
pub fn interval_mesh(max_cells: usize) -> impl Strategy<Value = Mesh<f64>> {
    interval_mesh_points(max_cells)
        .prop_map(|points| create_interval_mesh_from_points(points).expect("Points are strictly increasing"))
}

impl Arbitrary for LineMapping<f64> {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    /// Line mappings with either orientation and a length of at least `0.01`.
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        (point1(), 0.01..5.0, any::<bool>())
            .prop_map(|(a, length, reversed)| {
                let b = if reversed { a.x - length } else { a.x + length };
                LineMapping::from_vertices([a, Point1::new(b)])
            })
            .boxed()
    }
}
