//! Joins coastline way segments that share endpoints.
//!
//! Overpass returns the coastline as many short ways. Chains whose ends meet
//! become closed polygons (islands, or the mainland when fully inside the
//! box); chains cut by the box edge stay open line strings.

use geo::{Coord, Geometry, LineString, Polygon};
use tracing::debug;

/// One way's geometry, keyed by its OSM id
pub type WaySegment = (i64, Vec<Coord<f64>>);

/// Stitch way segments end-to-end into rings and open chains.
///
/// Each result carries the id of the way its chain was grown from.
pub fn stitch_ways(segments: Vec<WaySegment>) -> Vec<(i64, Geometry<f64>)> {
    let mut result = Vec::new();
    let mut remaining: Vec<WaySegment> = segments
        .into_iter()
        .filter(|(_, coords)| coords.len() >= 2)
        .collect();
    let input_count = remaining.len();

    while !remaining.is_empty() {
        let (id, mut current) = remaining.remove(0);

        let mut merged = true;
        while merged && !is_closed(&current) && !remaining.is_empty() {
            merged = false;

            let current_start = current[0];
            let current_end = current[current.len() - 1];

            for i in 0..remaining.len() {
                let seg_start = remaining[i].1[0];
                let seg_end = remaining[i].1[remaining[i].1.len() - 1];

                if current_end == seg_start {
                    let (_, mut seg) = remaining.remove(i);
                    seg.remove(0);
                    current.extend(seg);
                } else if current_end == seg_end {
                    let (_, mut seg) = remaining.remove(i);
                    seg.reverse();
                    seg.remove(0);
                    current.extend(seg);
                } else if current_start == seg_end {
                    let (_, mut seg) = remaining.remove(i);
                    seg.pop();
                    seg.extend(current);
                    current = seg;
                } else if current_start == seg_start {
                    let (_, mut seg) = remaining.remove(i);
                    seg.reverse();
                    seg.pop();
                    seg.extend(current);
                    current = seg;
                } else {
                    continue;
                }
                merged = true;
                break;
            }
        }

        if is_closed(&current) && current.len() >= 4 {
            result.push((id, Polygon::new(LineString::new(current), vec![]).into()));
        } else {
            result.push((id, LineString::new(current).into()));
        }
    }

    debug!(
        "Stitched {} coastline segments into {} geometries",
        input_count,
        result.len()
    );

    result
}

fn is_closed(coords: &[Coord<f64>]) -> bool {
    coords.len() > 2 && coords.first() == coords.last()
}
