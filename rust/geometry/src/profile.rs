// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! 2D profile definitions
//!
//! Parametric and arbitrary profiles read into a [`Profile2D`] in the
//! profile's own position, ready for extrusion.

use crate::error::{Error, Result};
use crate::placement::{axis2_placement_2d, fetch, list_point, read_point2, required_ref};
use crate::triangulation::{dedup_loop, signed_area, triangulate_polygon};
use bimkit_core::{EntityId, ParsedFile, RawInstance};
use nalgebra::{Matrix3, Point2};
use std::f64::consts::TAU;

const POINT_TOLERANCE: f64 = 1e-9;

/// 2D profile with optional holes
#[derive(Debug, Clone, PartialEq)]
pub struct Profile2D {
    /// Outer boundary (counter-clockwise after [`Profile2D::normalized`])
    pub outer: Vec<Point2<f64>>,
    /// Holes (clockwise after [`Profile2D::normalized`])
    pub holes: Vec<Vec<Point2<f64>>>,
}

/// Triangulated profile: all points (outer then holes) and triangle indices
#[derive(Debug, Clone)]
pub struct Triangulation {
    pub points: Vec<Point2<f64>>,
    pub indices: Vec<usize>,
}

impl Profile2D {
    pub fn new(outer: Vec<Point2<f64>>) -> Self {
        Self {
            outer,
            holes: Vec::new(),
        }
    }

    pub fn add_hole(&mut self, hole: Vec<Point2<f64>>) {
        self.holes.push(hole);
    }

    /// Remove repeated points, fix winding and drop degenerate holes.
    /// Fails when the outer boundary has fewer than three distinct points.
    pub fn normalized(self) -> Result<Self> {
        let same = |a: &Point2<f64>, b: &Point2<f64>| (a - b).norm() <= POINT_TOLERANCE;
        let mut outer = dedup_loop(&self.outer, same);
        if outer.len() < 3 || signed_area(&outer).abs() <= POINT_TOLERANCE {
            return Err(Error::InvalidProfile(format!(
                "outer boundary has {} distinct points and no area",
                outer.len()
            )));
        }
        if signed_area(&outer) < 0.0 {
            outer.reverse();
        }

        let holes = self
            .holes
            .iter()
            .map(|h| dedup_loop(h, same))
            .filter(|h| h.len() >= 3)
            .map(|mut h| {
                if signed_area(&h) > 0.0 {
                    h.reverse();
                }
                h
            })
            .collect();

        Ok(Self { outer, holes })
    }

    pub fn transformed(mut self, m: &Matrix3<f64>) -> Self {
        let apply = |p: &mut Point2<f64>| *p = m.transform_point(p);
        self.outer.iter_mut().for_each(apply);
        self.holes.iter_mut().flatten().for_each(apply);
        self
    }

    pub fn triangulate(&self) -> Result<Triangulation> {
        let indices = triangulate_polygon(&self.outer, &self.holes)?;
        let points = self.outer.iter().chain(self.holes.iter().flatten()).copied().collect();
        Ok(Triangulation { points, indices })
    }

    /// Every boundary loop, outer first
    pub fn loops(&self) -> impl Iterator<Item = &[Point2<f64>]> {
        std::iter::once(self.outer.as_slice()).chain(self.holes.iter().map(Vec::as_slice))
    }
}

/// Rectangle centred on the origin
pub fn rectangle(width: f64, height: f64) -> Profile2D {
    let (hw, hh) = (width / 2.0, height / 2.0);
    Profile2D::new(vec![
        Point2::new(-hw, -hh),
        Point2::new(hw, -hh),
        Point2::new(hw, hh),
        Point2::new(-hw, hh),
    ])
}

/// Circle centred on the origin, counter-clockwise
pub fn circle(radius: f64, segments: usize) -> Vec<Point2<f64>> {
    let segments = segments.max(3);
    (0..segments)
        .map(|i| {
            let angle = TAU * i as f64 / segments as f64;
            Point2::new(radius * angle.cos(), radius * angle.sin())
        })
        .collect()
}

fn positive(instance: &RawInstance, index: usize, what: &str) -> Result<f64> {
    match instance.get_float(index) {
        Some(v) if v.is_finite() && v > 0.0 => Ok(v),
        Some(v) => Err(Error::InvalidProfile(format!("#{} {} is {}", instance.id, what, v))),
        None => Err(Error::InvalidProfile(format!("#{} has no {}", instance.id, what))),
    }
}

/// Read any supported profile definition. Parametric profiles are placed by
/// their `Position` (attribute 2) when present.
pub fn read_profile(file: &ParsedFile, id: EntityId, circle_segments: usize) -> Result<Profile2D> {
    let profile = file.get(id).ok_or(Error::MissingEntity(id))?;

    let parametric = match profile.type_name.as_str() {
        "IFCRECTANGLEPROFILEDEF" => {
            rectangle(positive(profile, 3, "XDim")?, positive(profile, 4, "YDim")?)
        }
        "IFCRECTANGLEHOLLOWPROFILEDEF" => {
            let (w, h) = (positive(profile, 3, "XDim")?, positive(profile, 4, "YDim")?);
            let t = positive(profile, 5, "WallThickness")?;
            if 2.0 * t >= w.min(h) {
                return Err(Error::InvalidProfile(format!("#{} wall fills the rectangle", id)));
            }
            let mut outer = rectangle(w, h);
            outer.add_hole(rectangle(w - 2.0 * t, h - 2.0 * t).outer);
            outer
        }
        "IFCCIRCLEPROFILEDEF" => Profile2D::new(circle(positive(profile, 3, "Radius")?, circle_segments)),
        "IFCCIRCLEHOLLOWPROFILEDEF" => {
            let r = positive(profile, 3, "Radius")?;
            let t = positive(profile, 4, "WallThickness")?;
            if t >= r {
                return Err(Error::InvalidProfile(format!("#{} wall fills the circle", id)));
            }
            let mut outer = Profile2D::new(circle(r, circle_segments));
            outer.add_hole(circle(r - t, circle_segments));
            outer
        }
        "IFCARBITRARYCLOSEDPROFILEDEF" => {
            return Profile2D::new(read_curve(file, required_ref(profile, 2, "outer curve")?, circle_segments)?)
                .normalized();
        }
        "IFCARBITRARYPROFILEDEFWITHVOIDS" => {
            let mut out = Profile2D::new(read_curve(file, required_ref(profile, 2, "outer curve")?, circle_segments)?);
            for inner in profile.get_ref_list(3) {
                out.add_hole(read_curve(file, inner, circle_segments)?);
            }
            return out.normalized();
        }
        other => {
            return Err(Error::InvalidProfile(format!("#{} {} is not a supported profile", id, other)));
        }
    };

    let placed = match profile.get_ref(2) {
        Some(position) => parametric.transformed(&axis2_placement_2d(file, position)?),
        None => parametric,
    };
    placed.normalized()
}

/// Points of a bounded 2D curve used as a profile boundary
pub fn read_curve(file: &ParsedFile, id: EntityId, circle_segments: usize) -> Result<Vec<Point2<f64>>> {
    let curve = file.get(id).ok_or(Error::MissingEntity(id))?;
    match curve.type_name.as_str() {
        "IFCPOLYLINE" => curve
            .get_ref_list(0)
            .into_iter()
            .map(|p| read_point2(file, p))
            .collect(),
        "IFCINDEXEDPOLYCURVE" => indexed_poly_curve(file, curve, circle_segments),
        other => Err(Error::InvalidProfile(format!("#{} {} is not a supported curve", id, other))),
    }
}

/// `IFCINDEXEDPOLYCURVE`: 0 = Points (`IFCCARTESIANPOINTLIST2D`), 1 = Segments.
/// Without segments the points are joined in order.
fn indexed_poly_curve(file: &ParsedFile, curve: &RawInstance, circle_segments: usize) -> Result<Vec<Point2<f64>>> {
    let list = fetch(file, required_ref(curve, 0, "point list")?, "IFCCARTESIANPOINTLIST2D")?;
    let points: Vec<Point2<f64>> = list
        .get_list(0)
        .unwrap_or_default()
        .iter()
        .map(|c| list_point(c, list.id).map(|p| Point2::new(p.x, p.y)))
        .collect::<Result<_>>()?;

    let Some(segments) = curve.get_list(1) else {
        return Ok(points);
    };

    let at = |index: i64| -> Result<Point2<f64>> {
        usize::try_from(index - 1)
            .ok()
            .and_then(|i| points.get(i).copied())
            .ok_or_else(|| Error::InvalidProfile(format!("#{} segment index {} out of range", curve.id, index)))
    };

    let mut out = Vec::new();
    for segment in segments {
        let indices: Vec<i64> = segment
            .as_list()
            .unwrap_or_default()
            .iter()
            .filter_map(|v| v.as_int())
            .collect();
        let is_arc = segment.type_name() == Some("IFCARCINDEX") && indices.len() == 3;
        if is_arc {
            let arc = arc_through(at(indices[0])?, at(indices[1])?, at(indices[2])?, circle_segments / 4);
            out.extend(arc);
        } else {
            for &i in &indices {
                out.push(at(i)?);
            }
        }
    }
    Ok(out)
}

/// Polyline approximation of the circular arc from `a` through `b` to `c`
fn arc_through(a: Point2<f64>, b: Point2<f64>, c: Point2<f64>, segments: usize) -> Vec<Point2<f64>> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < 1e-12 {
        return vec![a, b, c];
    }
    let sq = |p: Point2<f64>| p.x * p.x + p.y * p.y;
    let center = Point2::new(
        (sq(a) * (b.y - c.y) + sq(b) * (c.y - a.y) + sq(c) * (a.y - b.y)) / d,
        (sq(a) * (c.x - b.x) + sq(b) * (a.x - c.x) + sq(c) * (b.x - a.x)) / d,
    );
    let radius = (a - center).norm();
    let angle = |p: Point2<f64>| (p.y - center.y).atan2(p.x - center.x);
    let (start, end) = (angle(a), angle(c));

    // d > 0 means a, b, c turn counter-clockwise
    let mut sweep = end - start;
    if d > 0.0 && sweep <= 0.0 {
        sweep += TAU;
    } else if d < 0.0 && sweep >= 0.0 {
        sweep -= TAU;
    }

    let segments = segments.max(4);
    (0..=segments)
        .map(|i| {
            let t = start + sweep * i as f64 / segments as f64;
            Point2::new(center.x + radius * t.cos(), center.y + radius * t.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use bimkit_core::{AttributeValue as A, Schema};

    fn pt(id: EntityId, x: f64, y: f64) -> RawInstance {
        RawInstance::new(id, "IFCCARTESIANPOINT", vec![A::List(vec![A::Real(x), A::Real(y)])])
    }

    #[test]
    fn test_rectangle_with_position() {
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![
                pt(1, 5.0, 0.0),
                RawInstance::new(2, "IFCAXIS2PLACEMENT2D", vec![A::Ref(1), A::Unset]),
                RawInstance::new(
                    3,
                    "IFCRECTANGLEPROFILEDEF",
                    vec![A::Enum("AREA".into()), A::Unset, A::Ref(2), A::Real(2.0), A::Real(4.0)],
                ),
            ],
        );
        let profile = read_profile(&file, 3, 24).unwrap();
        assert_eq!(profile.outer.len(), 4);
        assert_eq!(profile.outer[0], Point2::new(4.0, -2.0));
        assert!(signed_area(&profile.outer) > 0.0);
    }

    #[test]
    fn test_circle_segments_and_radius() {
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![RawInstance::new(
                1,
                "IFCCIRCLEPROFILEDEF",
                vec![A::Enum("AREA".into()), A::Unset, A::Unset, A::Real(0.5)],
            )],
        );
        let profile = read_profile(&file, 1, 24).unwrap();
        assert_eq!(profile.outer.len(), 24);
        assert!(profile.outer.iter().all(|p| (p.coords.norm() - 0.5).abs() < 1e-12));
    }

    #[test]
    fn test_zero_dimension_is_invalid() {
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![RawInstance::new(
                1,
                "IFCRECTANGLEPROFILEDEF",
                vec![A::Enum("AREA".into()), A::Unset, A::Unset, A::Real(0.0), A::Real(1.0)],
            )],
        );
        assert!(matches!(read_profile(&file, 1, 24), Err(Error::InvalidProfile(_))));
    }

    #[test]
    fn test_closed_polyline_with_void() {
        // Clockwise outer with a repeated closing point; the hole is given counter-clockwise
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![
                pt(1, 0.0, 0.0),
                pt(2, 0.0, 10.0),
                pt(3, 10.0, 10.0),
                pt(4, 10.0, 0.0),
                pt(5, 4.0, 4.0),
                pt(6, 6.0, 4.0),
                pt(7, 6.0, 6.0),
                pt(8, 4.0, 6.0),
                RawInstance::new(
                    10,
                    "IFCPOLYLINE",
                    vec![A::List([1, 2, 3, 4, 1].iter().map(|&i| A::Ref(i)).collect())],
                ),
                RawInstance::new(
                    11,
                    "IFCPOLYLINE",
                    vec![A::List([5, 6, 7, 8, 5].iter().map(|&i| A::Ref(i)).collect())],
                ),
                RawInstance::new(
                    12,
                    "IFCARBITRARYPROFILEDEFWITHVOIDS",
                    vec![A::Enum("AREA".into()), A::Unset, A::Ref(10), A::List(vec![A::Ref(11)])],
                ),
            ],
        );
        let profile = read_profile(&file, 12, 24).unwrap();
        assert_eq!(profile.outer.len(), 4);
        assert!(signed_area(&profile.outer) > 0.0);
        assert!(signed_area(&profile.holes[0]) < 0.0);

        let tri = profile.triangulate().unwrap();
        let area: f64 = tri
            .indices
            .chunks_exact(3)
            .map(|t| signed_area(&[tri.points[t[0]], tri.points[t[1]], tri.points[t[2]]]) / 2.0)
            .sum();
        assert_relative_eq!(area, 96.0, epsilon = 1e-9);
    }

    #[test]
    fn test_indexed_poly_curve_with_arc() {
        let s = std::f64::consts::FRAC_1_SQRT_2;
        let coords = [(0.0, 0.0), (1.0, 0.0), (s, s), (0.0, 1.0)];
        let list = A::List(
            coords
                .iter()
                .map(|&(x, y)| A::List(vec![A::Real(x), A::Real(y)]))
                .collect(),
        );
        let typed = |name: &str, idx: &[i64]| A::Typed {
            type_name: name.into(),
            value: Box::new(A::List(idx.iter().map(|&i| A::Integer(i)).collect())),
        };
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![
                RawInstance::new(1, "IFCCARTESIANPOINTLIST2D", vec![list]),
                RawInstance::new(
                    2,
                    "IFCINDEXEDPOLYCURVE",
                    vec![
                        A::Ref(1),
                        A::List(vec![
                            typed("IFCLINEINDEX", &[1, 2]),
                            typed("IFCARCINDEX", &[2, 3, 4]),
                            typed("IFCLINEINDEX", &[4, 1]),
                        ]),
                        A::Enum("F".into()),
                    ],
                ),
            ],
        );
        let points = read_curve(&file, 2, 24).unwrap();
        // 2 line points + 7 arc points + 2 line points
        assert_eq!(points.len(), 11);
        // Arc samples stay on the unit circle
        for p in &points[2..9] {
            assert_relative_eq!(p.coords.norm(), 1.0, epsilon = 1e-9);
        }
        assert_relative_eq!(points[8].y, 1.0, epsilon = 1e-9);
        let profile = Profile2D::new(points).normalized().unwrap();
        assert!(profile.outer.len() < 11);
    }

    #[test]
    fn test_out_of_range_segment_index() {
        let file = ParsedFile::from_instances(
            Schema::Ifc4,
            vec![
                RawInstance::new(
                    1,
                    "IFCCARTESIANPOINTLIST2D",
                    vec![A::List(vec![A::List(vec![A::Real(0.0), A::Real(0.0)])])],
                ),
                RawInstance::new(
                    2,
                    "IFCINDEXEDPOLYCURVE",
                    vec![
                        A::Ref(1),
                        A::List(vec![A::Typed {
                            type_name: "IFCLINEINDEX".into(),
                            value: Box::new(A::List(vec![A::Integer(1), A::Integer(9)])),
                        }]),
                    ],
                ),
            ],
        );
        assert!(read_curve(&file, 2, 24).is_err());
    }
}
