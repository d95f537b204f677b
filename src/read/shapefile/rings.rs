//! Turns a record's parts into rings a geometry library can build polygons
//! from.
//!
//! Shapefile polygons list outer rings clockwise and holes counter-clockwise,
//! with y pointing north. Nothing here allocates anything fancier than a Vec.

use std::fmt;
use itertools::Itertools;
use super::shp::{ShpPart, ShpPoint, ShpRecord};

#[derive(Debug,Clone,Copy,PartialEq,Eq)]
pub enum WindingOrder {
    Clockwise,
    CounterClockwise,
}

/// Returns 2*area, positive iff the ring is counter-clockwise.
///
/// Assumes y points up, as in every GIS coordinate system (and unlike SVG).
///
/// Assumes the first and last Points are identical. An unclosed ring gets
/// the area of the ring that would close it.
pub fn signed_area2<'a, T: IntoIterator<Item=&'a ShpPoint>>(points: T) -> f64 {
    // https://en.wikipedia.org/wiki/Shoelace_formula
    let mut a = 0.;
    let mut first: Option<ShpPoint> = None;
    let mut last: Option<ShpPoint> = None;

    for (p1, p2) in points.into_iter().tuple_windows() {
        if first.is_none() {
            first = Some(*p1);
        }
        last = Some(*p2);
        a += p1.0 * p2.1 - p2.0 * p1.1;
    }

    if let (Some(p1), Some(p2)) = (last, first) {
        a += p1.0 * p2.1 - p2.0 * p1.1;
    }

    a
}

/// A zero-area ring is considered to be Clockwise.
pub fn winding_order(points: &[ShpPoint]) -> WindingOrder {
    if signed_area2(points) > 0. {
        WindingOrder::CounterClockwise
    } else {
        WindingOrder::Clockwise
    }
}

/// Drops each point that equals the one before it.
///
/// Curve builders choke on zero-length segments. The ring's first and last
/// points are not adjacent, so a closed ring stays closed.
pub fn dedup_points(points: &[ShpPoint]) -> Vec<ShpPoint> {
    let mut ret = points.to_vec();
    ret.dedup();
    ret
}

/// A Polygon record's rings, split by winding order.
#[derive(Debug,Clone)]
pub struct ShpRegion {
    pub outer_rings: Box<[ShpPart]>,
    pub inner_rings: Box<[ShpPart]>,
}

impl fmt::Display for ShpRegion {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut r = write!(f, "Region(outer=[");
        for (i, ring) in self.outer_rings.iter().enumerate() {
            if i > 0 {
                r = r.and_then(|_| write!(f, ","));
            }
            r = r.and_then(|_| write!(f, "{}", ring));
        }
        r = r.and_then(|_| write!(f, "], inner=["));
        for (i, ring) in self.inner_rings.iter().enumerate() {
            if i > 0 {
                r = r.and_then(|_| write!(f, ","));
            }
            r = r.and_then(|_| write!(f, "{}", ring));
        }
        r.and_then(|_| write!(f, "])"))
    }
}

/// Clockwise parts become outer rings; counter-clockwise parts become holes.
///
/// Consecutive duplicate points are dropped on the way. The record isn't
/// checked for being a polygon: a polyline's strands get split the same way.
pub fn split_rings(record: &ShpRecord) -> ShpRegion {
    let (outer, inner): (Vec<_>, Vec<_>) = record.parts.iter()
        .map(|part| ShpPart(dedup_points(&part.0).into_boxed_slice()))
        .partition(|part| winding_order(&part.0) == WindingOrder::Clockwise);

    ShpRegion {
        outer_rings: outer.into_boxed_slice(),
        inner_rings: inner.into_boxed_slice(),
    }
}
