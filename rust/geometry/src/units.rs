// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Length unit scale
//!
//! Follows `IFCPROJECT -> IFCUNITASSIGNMENT -> IFCSIUNIT` (or a conversion
//! based unit) to find the factor that turns model coordinates into metres.

use bimkit_core::{EntityId, ParsedFile, RawInstance};

/// Multiplier for an `IfcSIPrefix` enumeration value
#[inline]
pub fn si_prefix_multiplier(prefix: &str) -> f64 {
    match prefix {
        "ATTO" => 1e-18,
        "FEMTO" => 1e-15,
        "PICO" => 1e-12,
        "NANO" => 1e-9,
        "MICRO" => 1e-6,
        "MILLI" => 1e-3,
        "CENTI" => 1e-2,
        "DECI" => 1e-1,
        "DECA" => 1e1,
        "HECTO" => 1e2,
        "KILO" => 1e3,
        "MEGA" => 1e6,
        "GIGA" => 1e9,
        "TERA" => 1e12,
        "PETA" => 1e15,
        "EXA" => 1e18,
        _ => 1.0,
    }
}

/// Metres per model length unit. Defaults to 1.0 when the project declares
/// no usable length unit.
pub fn length_unit_scale(file: &ParsedFile) -> f64 {
    let Some(project) = file.instances_of_type("IFCPROJECT").next() else {
        return 1.0;
    };
    let Some(assignment) = project.get_ref(8).and_then(|id| file.get(id)) else {
        return 1.0;
    };
    if !assignment.is_type("IFCUNITASSIGNMENT") {
        return 1.0;
    }

    for unit_id in assignment.get_ref_list(0) {
        let Some(unit) = file.get(unit_id) else { continue };
        if unit.get_enum(1) != Some("LENGTHUNIT") {
            continue;
        }
        if let Some(scale) = unit_scale(file, unit, 0) {
            tracing::debug!(unit = unit_id, scale, "length unit");
            return scale;
        }
    }
    1.0
}

const MAX_CONVERSION_DEPTH: usize = 4;

fn unit_scale(file: &ParsedFile, unit: &RawInstance, depth: usize) -> Option<f64> {
    if unit.is_type("IFCSIUNIT") {
        return Some(unit.get_enum(2).map_or(1.0, si_prefix_multiplier));
    }
    // IfcConversionBasedUnit: 3 = ConversionFactor (IfcMeasureWithUnit)
    if unit.is_type("IFCCONVERSIONBASEDUNIT") && depth < MAX_CONVERSION_DEPTH {
        let measure = file.get(unit.get_ref(3)?)?;
        let factor = measure.get_float(0)?;
        let base = resolve(file, measure.get_ref(1))
            .and_then(|u| unit_scale(file, u, depth + 1))
            .unwrap_or(1.0);
        let scale = factor * base;
        return (scale.is_finite() && scale > 0.0).then_some(scale);
    }
    None
}

#[inline]
fn resolve(file: &ParsedFile, id: Option<EntityId>) -> Option<&RawInstance> {
    id.and_then(|id| file.get(id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimkit_core::{AttributeValue as A, Schema};

    fn project_with_units(units: Vec<RawInstance>) -> ParsedFile {
        let ids: Vec<_> = units.iter().map(|u| A::Ref(u.id)).collect();
        let mut project_attrs = vec![A::Unset; 9];
        project_attrs[8] = A::Ref(2);
        let mut instances = vec![
            RawInstance::new(1, "IFCPROJECT", project_attrs),
            RawInstance::new(2, "IFCUNITASSIGNMENT", vec![A::List(ids)]),
        ];
        instances.extend(units);
        ParsedFile::from_instances(Schema::Ifc4, instances)
    }

    fn si(id: EntityId, kind: &str, prefix: Option<&str>) -> RawInstance {
        RawInstance::new(
            id,
            "IFCSIUNIT",
            vec![
                A::Derived,
                A::Enum(kind.into()),
                prefix.map_or(A::Unset, |p| A::Enum(p.into())),
                A::Enum("METRE".into()),
            ],
        )
    }

    #[test]
    fn test_millimetre_project() {
        let file = project_with_units(vec![
            si(10, "AREAUNIT", None),
            si(11, "LENGTHUNIT", Some("MILLI")),
        ]);
        assert_eq!(length_unit_scale(&file), 0.001);
    }

    #[test]
    fn test_metre_and_missing_units() {
        assert_eq!(length_unit_scale(&project_with_units(vec![si(10, "LENGTHUNIT", None)])), 1.0);
        assert_eq!(length_unit_scale(&ParsedFile::from_instances(Schema::Ifc4, vec![])), 1.0);
    }

    #[test]
    fn test_conversion_based_foot() {
        let foot = RawInstance::new(
            11,
            "IFCCONVERSIONBASEDUNIT",
            vec![A::Ref(12), A::Enum("LENGTHUNIT".into()), A::String("FOOT".into()), A::Ref(13)],
        );
        let measure = RawInstance::new(
            13,
            "IFCMEASUREWITHUNIT",
            vec![
                A::Typed {
                    type_name: "IFCLENGTHMEASURE".into(),
                    value: Box::new(A::Real(0.3048)),
                },
                A::Ref(14),
            ],
        );
        let file = project_with_units(vec![foot, measure, si(14, "LENGTHUNIT", None)]);
        assert!((length_unit_scale(&file) - 0.3048).abs() < 1e-12);
    }

    #[test]
    fn test_prefix_table() {
        assert_eq!(si_prefix_multiplier("CENTI"), 0.01);
        assert_eq!(si_prefix_multiplier("KILO"), 1000.0);
        assert_eq!(si_prefix_multiplier("NONSENSE"), 1.0);
    }
}
