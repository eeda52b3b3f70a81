// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Default element colours (linear RGBA)

use bimkit_core::ElementType;

/// Colour for the current selection
pub const HIGHLIGHT: [f32; 4] = [0.2, 0.9, 0.9, 1.0];

pub const DEFAULT_COLOR: [f32; 4] = [0.7, 0.7, 0.7, 1.0];

pub fn color_for_element_type(element_type: &ElementType) -> [f32; 4] {
    match element_type {
        ElementType::Wall => [0.85, 0.83, 0.8, 1.0],
        ElementType::Slab => [0.7, 0.7, 0.7, 1.0],
        ElementType::Roof => [0.6, 0.45, 0.35, 1.0],
        ElementType::Column | ElementType::Beam | ElementType::Member => [0.6, 0.65, 0.7, 1.0],
        ElementType::Window => [0.6, 0.8, 1.0, 0.4],
        ElementType::CurtainWall => [0.5, 0.7, 0.9, 0.5],
        ElementType::Door => [0.6, 0.45, 0.3, 1.0],
        ElementType::Stair | ElementType::Ramp => [0.75, 0.75, 0.75, 1.0],
        ElementType::Railing => [0.4, 0.4, 0.45, 1.0],
        ElementType::Plate | ElementType::Covering => [0.8, 0.8, 0.8, 1.0],
        ElementType::Footing | ElementType::Pile => [0.55, 0.55, 0.5, 1.0],
        ElementType::Furniture => [0.7, 0.55, 0.4, 1.0],
        ElementType::Pipe | ElementType::FlowFitting => [0.3, 0.55, 0.75, 1.0],
        ElementType::Duct => [0.65, 0.7, 0.75, 1.0],
        ElementType::Cable => [0.9, 0.6, 0.2, 1.0],
        ElementType::FlowTerminal => [0.85, 0.85, 0.9, 1.0],
        ElementType::Space => [0.2, 0.85, 1.0, 0.3],
        ElementType::Opening => [1.0, 0.42, 0.29, 0.4],
        ElementType::Site => [0.4, 0.8, 0.3, 1.0],
        _ => DEFAULT_COLOR,
    }
}

/// Colour is see-through
#[inline]
pub fn is_translucent(color: &[f32; 4]) -> bool {
    color[3] < 1.0
}
