//! # GeoJSON Geometry
//!
//! Planar geometry primitives used for areas of interest and opportunity
//! footprints. Serialized in GeoJSON shape (`{"type": "Polygon", "coordinates": ...}`)
//! with `[longitude, latitude]` positions.
//!
//! Intersection is evaluated on the plane without any geodesic correction,
//! which is the resolution STAPI filters are specified at.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// `[longitude, latitude]`
pub type Position = [f64; 2];

const EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    LineString(Vec<Position>),
    /// Exterior ring followed by optional holes.
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("geometry has no coordinates")]
    Empty,

    #[error("coordinate [{0}, {1}] is not a finite longitude/latitude pair")]
    InvalidCoordinate(f64, f64),

    #[error("line string needs at least 2 positions, got {0}")]
    TooFewPositions(usize),

    #[error("polygon ring needs at least 4 positions, got {0}")]
    RingTooShort(usize),

    #[error("polygon ring is not closed")]
    RingNotClosed,

    #[error("polygon ring intersects itself between segments {0} and {1}")]
    SelfIntersection(usize, usize),
}

/// Axis-aligned bounding box: `[min_lon, min_lat, max_lon, max_lat]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Position,
    pub max: Position,
}

impl BoundingBox {
    fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Self> {
        let mut iter = positions.into_iter();
        let first = *iter.next()?;
        let mut bbox = BoundingBox {
            min: first,
            max: first,
        };
        for p in iter {
            bbox.min[0] = bbox.min[0].min(p[0]);
            bbox.min[1] = bbox.min[1].min(p[1]);
            bbox.max[0] = bbox.max[0].max(p[0]);
            bbox.max[1] = bbox.max[1].max(p[1]);
        }
        Some(bbox)
    }

    pub fn intersects(&self, other: &BoundingBox) -> bool {
        self.min[0] <= other.max[0] + EPSILON
            && other.min[0] <= self.max[0] + EPSILON
            && self.min[1] <= other.max[1] + EPSILON
            && other.min[1] <= self.max[1] + EPSILON
    }
}

impl Geometry {
    /// Build a closed rectangular polygon from `[min_lon, min_lat, max_lon, max_lat]`.
    pub fn bbox(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Self {
        Geometry::Polygon(vec![vec![
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat],
        ]])
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Point(_) => "Point",
            Self::LineString(_) => "LineString",
            Self::Polygon(_) => "Polygon",
            Self::MultiPolygon(_) => "MultiPolygon",
        }
    }

    /// Check that the geometry is non-empty, has sane coordinates, and that
    /// every polygon ring is closed and simple.
    pub fn validate(&self) -> Result<(), GeometryError> {
        match self {
            Self::Point(p) => check_position(p),
            Self::LineString(line) => {
                if line.is_empty() {
                    return Err(GeometryError::Empty);
                }
                if line.len() < 2 {
                    return Err(GeometryError::TooFewPositions(line.len()));
                }
                line.iter().try_for_each(check_position)
            }
            Self::Polygon(rings) => validate_polygon(rings),
            Self::MultiPolygon(polygons) => {
                if polygons.is_empty() {
                    return Err(GeometryError::Empty);
                }
                polygons.iter().try_for_each(|rings| validate_polygon(rings))
            }
        }
    }

    pub fn bounding_box(&self) -> Option<BoundingBox> {
        BoundingBox::from_positions(self.positions())
    }

    /// Planar intersection test, boundaries included.
    pub fn intersects(&self, other: &Geometry) -> bool {
        match (self.bounding_box(), other.bounding_box()) {
            (Some(a), Some(b)) if a.intersects(&b) => {}
            _ => return false,
        }

        let own_edges = self.edges();
        let other_edges = other.edges();
        for (a1, a2) in &own_edges {
            for (b1, b2) in &other_edges {
                if segments_intersect(a1, a2, b1, b2) {
                    return true;
                }
            }
        }

        // No crossing edges: either disjoint, or one lies wholly inside the other.
        self.positions().any(|p| other.contains_position(p))
            || other.positions().any(|p| self.contains_position(p))
    }

    /// Whether a position lies on or inside this geometry.
    pub fn contains_position(&self, p: &Position) -> bool {
        match self {
            Self::Point(q) => same_position(p, q),
            Self::LineString(line) => line
                .windows(2)
                .any(|w| on_segment(&w[0], &w[1], p)),
            Self::Polygon(rings) => polygon_contains(rings, p),
            Self::MultiPolygon(polygons) => polygons.iter().any(|rings| polygon_contains(rings, p)),
        }
    }

    fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        match self {
            Self::Point(p) => Box::new(std::iter::once(p)),
            Self::LineString(line) => Box::new(line.iter()),
            Self::Polygon(rings) => Box::new(rings.iter().flatten()),
            Self::MultiPolygon(polygons) => Box::new(polygons.iter().flatten().flatten()),
        }
    }

    fn edges(&self) -> Vec<(Position, Position)> {
        fn chain(points: &[Position], out: &mut Vec<(Position, Position)>) {
            out.extend(points.windows(2).map(|w| (w[0], w[1])));
        }

        let mut edges = Vec::new();
        match self {
            Self::Point(_) => {}
            Self::LineString(line) => chain(line, &mut edges),
            Self::Polygon(rings) => rings.iter().for_each(|r| chain(r, &mut edges)),
            Self::MultiPolygon(polygons) => polygons
                .iter()
                .flatten()
                .for_each(|r| chain(r, &mut edges)),
        }
        edges
    }
}

fn check_position(p: &Position) -> Result<(), GeometryError> {
    let [lon, lat] = *p;
    if lon.is_finite()
        && lat.is_finite()
        && (-180.0..=180.0).contains(&lon)
        && (-90.0..=90.0).contains(&lat)
    {
        Ok(())
    } else {
        Err(GeometryError::InvalidCoordinate(lon, lat))
    }
}

fn validate_polygon(rings: &[Vec<Position>]) -> Result<(), GeometryError> {
    if rings.is_empty() {
        return Err(GeometryError::Empty);
    }
    for ring in rings {
        if ring.len() < 4 {
            return Err(GeometryError::RingTooShort(ring.len()));
        }
        ring.iter().try_for_each(check_position)?;
        if !same_position(&ring[0], &ring[ring.len() - 1]) {
            return Err(GeometryError::RingNotClosed);
        }
        check_ring_is_simple(ring)?;
    }
    Ok(())
}

fn check_ring_is_simple(ring: &[Position]) -> Result<(), GeometryError> {
    let segment_count = ring.len() - 1;
    for i in 0..segment_count {
        for j in (i + 1)..segment_count {
            let adjacent = j == i + 1 || (i == 0 && j == segment_count - 1);
            if adjacent {
                // Neighbours share a vertex; they only conflict when they fold back.
                if collinear_overlap(&ring[i], &ring[i + 1], &ring[j], &ring[j + 1]) {
                    return Err(GeometryError::SelfIntersection(i, j));
                }
                continue;
            }
            if segments_intersect(&ring[i], &ring[i + 1], &ring[j], &ring[j + 1]) {
                return Err(GeometryError::SelfIntersection(i, j));
            }
        }
    }
    Ok(())
}

fn same_position(a: &Position, b: &Position) -> bool {
    (a[0] - b[0]).abs() <= EPSILON && (a[1] - b[1]).abs() <= EPSILON
}

fn orientation(a: &Position, b: &Position, c: &Position) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn on_segment(a: &Position, b: &Position, p: &Position) -> bool {
    orientation(a, b, p).abs() <= EPSILON
        && p[0] >= a[0].min(b[0]) - EPSILON
        && p[0] <= a[0].max(b[0]) + EPSILON
        && p[1] >= a[1].min(b[1]) - EPSILON
        && p[1] <= a[1].max(b[1]) + EPSILON
}

fn segments_intersect(a1: &Position, a2: &Position, b1: &Position, b2: &Position) -> bool {
    let d1 = orientation(b1, b2, a1);
    let d2 = orientation(b1, b2, a2);
    let d3 = orientation(a1, a2, b1);
    let d4 = orientation(a1, a2, b2);

    if ((d1 > EPSILON && d2 < -EPSILON) || (d1 < -EPSILON && d2 > EPSILON))
        && ((d3 > EPSILON && d4 < -EPSILON) || (d3 < -EPSILON && d4 > EPSILON))
    {
        return true;
    }

    on_segment(b1, b2, a1) || on_segment(b1, b2, a2) || on_segment(a1, a2, b1) || on_segment(a1, a2, b2)
}

/// Two segments sharing an endpoint overlap along a line.
fn collinear_overlap(a1: &Position, a2: &Position, b1: &Position, b2: &Position) -> bool {
    if orientation(a1, a2, b1).abs() > EPSILON || orientation(a1, a2, b2).abs() > EPSILON {
        return false;
    }
    let shared = [a1, a2]
        .iter()
        .flat_map(|a| [b1, b2].into_iter().map(move |b| (*a, b)))
        .filter(|(a, b)| same_position(a, b))
        .count();
    // Collinear neighbours that continue straight share exactly one point and
    // nothing else; folding back makes an interior point of one lie on the other.
    let inner_hits = [a1, a2].iter().filter(|p| on_segment(b1, b2, p)).count()
        + [b1, b2].iter().filter(|p| on_segment(a1, a2, p)).count();
    inner_hits > 2 * shared
}

fn ring_contains(ring: &[Position], p: &Position) -> bool {
    if ring.windows(2).any(|w| on_segment(&w[0], &w[1], p)) {
        return true;
    }
    let mut inside = false;
    for w in ring.windows(2) {
        let (a, b) = (&w[0], &w[1]);
        if (a[1] > p[1]) != (b[1] > p[1]) {
            let x = a[0] + (p[1] - a[1]) / (b[1] - a[1]) * (b[0] - a[0]);
            if p[0] < x {
                inside = !inside;
            }
        }
    }
    inside
}

fn polygon_contains(rings: &[Vec<Position>], p: &Position) -> bool {
    let Some((exterior, holes)) = rings.split_first() else {
        return false;
    };
    if !ring_contains(exterior, p) {
        return false;
    }
    // Points on a hole boundary still touch the polygon.
    !holes.iter().any(|hole| {
        ring_contains(hole, p) && !hole.windows(2).any(|w| on_segment(&w[0], &w[1], p))
    })
}
