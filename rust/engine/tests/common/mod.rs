// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP documents built in code for engine tests.

#![allow(dead_code)]

use std::fmt::Write;

/// First element id; element `i` is `#(FIRST_ELEMENT + 10 * i)`
pub const FIRST_ELEMENT: u64 = 106;

fn header(schema: &str) -> String {
    format!(
        "ISO-10303-21;\nHEADER;\nFILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');\n\
         FILE_NAME('test.ifc','2025-01-10T10:00:00',(''),(''),'','','');\n\
         FILE_SCHEMA(('{}'));\nENDSEC;\nDATA;\n",
        schema
    )
}

const FOOTER: &str = "ENDSEC;\nEND-ISO-10303-21;\n";

/// Project, site, building and one storey (#4) plus shared geometry:
/// a unit square profile (#13) extruded along +Z (#14) from the origin (#11).
fn spatial_structure(out: &mut String) {
    out.push_str(
        "#1=IFCPROJECT('0Proj00000000000000000',$,'Test Project',$,$,$,$,$,$);\n\
         #2=IFCSITE('0Site00000000000000000',$,'Test Site',$,$,$,$,$,.ELEMENT.,$,$,$,$,$);\n\
         #3=IFCBUILDING('0Bldg00000000000000000',$,'Test Building',$,$,$,$,$,.ELEMENT.,$,$,$);\n\
         #4=IFCBUILDINGSTOREY('0Stry00000000000000000',$,'Level 1',$,$,$,$,$,.ELEMENT.,0.);\n\
         #5=IFCRELAGGREGATES('0Agg100000000000000000',$,$,$,#1,(#2));\n\
         #6=IFCRELAGGREGATES('0Agg200000000000000000',$,$,$,#2,(#3));\n\
         #7=IFCRELAGGREGATES('0Agg300000000000000000',$,$,$,#3,(#4));\n\
         #10=IFCCARTESIANPOINT((0.,0.,0.));\n\
         #11=IFCAXIS2PLACEMENT3D(#10,$,$);\n\
         #13=IFCRECTANGLEPROFILEDEF(.AREA.,$,$,1.,1.);\n\
         #14=IFCDIRECTION((0.,0.,1.));\n\
         #15=IFCEXTRUDEDAREASOLID(#13,#11,#14,1.);\n\
         #16=IFCSHAPEREPRESENTATION($,'Body','SweptSolid',(#15));\n\
         #17=IFCPRODUCTDEFINITIONSHAPE($,$,(#16));\n",
    );
}

/// Unit cubes standing on z = 0, centred on each `(x, y)`, all contained
/// in the storey. Each cube is `#(106 + 10 * i)`.
pub fn boxes(centres: &[(f64, f64)]) -> String {
    boxes_with_schema("IFC4", centres)
}

pub fn boxes_with_schema(schema: &str, centres: &[(f64, f64)]) -> String {
    let mut out = header(schema);
    spatial_structure(&mut out);
    let mut ids = Vec::with_capacity(centres.len());
    for (i, (x, y)) in centres.iter().enumerate() {
        let base = 100 + 10 * i as u64;
        let element = base + 6;
        let _ = writeln!(out, "#{}=IFCCARTESIANPOINT(({:.3},{:.3},0.));", base, x, y);
        let _ = writeln!(out, "#{}=IFCAXIS2PLACEMENT3D(#{},$,$);", base + 1, base);
        let _ = writeln!(out, "#{}=IFCLOCALPLACEMENT($,#{});", base + 2, base + 1);
        let _ = writeln!(
            out,
            "#{}=IFCBUILDINGELEMENTPROXY('{}',$,'Box {}',$,$,#{},#17,$,$);",
            element,
            global_id(i),
            i,
            base + 2
        );
        ids.push(format!("#{}", element));
    }
    if !ids.is_empty() {
        let _ = writeln!(
            out,
            "#90=IFCRELCONTAINEDINSPATIALSTRUCTURE('0Cont00000000000000000',$,$,$,({}),#4);",
            ids.join(",")
        );
    }
    out.push_str(FOOTER);
    out
}

/// 22-character GlobalId unique per index
fn global_id(i: usize) -> String {
    format!("0Box{:018}", i)
}

/// Two cubes far enough apart that no ray along X or Z hits both by accident
pub fn two_boxes() -> String {
    boxes(&[(0.0, 0.0), (5.0, 0.0)])
}

/// A grid of `n` cubes, big enough that parsing takes measurable time
pub fn large_model(n: usize) -> String {
    let side = (n as f64).sqrt().ceil().max(1.0) as usize;
    let centres: Vec<_> = (0..n).map(|i| ((i % side) as f64 * 2.0, (i / side) as f64 * 2.0)).collect();
    boxes(&centres)
}

/// Box model where the first cube also points at a missing instance
pub fn dangling_reference() -> String {
    two_boxes().replace("(#106,#116),#4", "(#106,#116,#999),#4")
}

/// Two spaces each aggregating the other
pub fn containment_cycle() -> String {
    let mut text = boxes(&[(0.0, 0.0)]);
    let extra = "#200=IFCSPACE('0SpcA00000000000000000',$,'A',$,$,$,$,$,.ELEMENT.,.INTERNAL.,$);\n\
                 #201=IFCSPACE('0SpcB00000000000000000',$,'B',$,$,$,$,$,.ELEMENT.,.INTERNAL.,$);\n\
                 #202=IFCRELAGGREGATES('0Agg400000000000000000',$,$,$,#200,(#201));\n\
                 #203=IFCRELAGGREGATES('0Agg500000000000000000',$,$,$,#201,(#200));\n";
    if let Some(at) = text.rfind("ENDSEC;") {
        text.insert_str(at, extra);
    }
    text
}
