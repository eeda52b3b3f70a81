// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Picking and frustum queries across models.

mod common;

use approx::assert_relative_eq;
use bimkit_engine::{Camera, ElementType, LeafKey, ModelRegistry, Ray};
use nalgebra::{Matrix4, Point3, Vector3};

const FIRST: u64 = common::FIRST_ELEMENT;
const SECOND: u64 = common::FIRST_ELEMENT + 10;

fn down_at(x: f64) -> Ray {
    Ray::new(Point3::new(x, 0.0, 10.0), -Vector3::z()).unwrap()
}

fn along_x() -> Ray {
    Ray::new(Point3::new(-10.0, 0.0, 0.5), Vector3::x()).unwrap()
}

fn registry_with_two_boxes() -> ModelRegistry {
    let mut registry = ModelRegistry::new();
    registry.load("m", "m.ifc", &common::two_boxes()).unwrap();
    registry
}

#[test]
fn test_pick_each_box_from_above() {
    let registry = registry_with_two_boxes();

    let hit = registry.pick(&down_at(0.0)).unwrap();
    assert_eq!(hit.key, LeafKey::new("m", FIRST));
    assert_relative_eq!(hit.distance, 9.0, epsilon = 1e-9);
    assert_relative_eq!(hit.point.z, 1.0, epsilon = 1e-9);

    let hit = registry.pick(&down_at(5.0)).unwrap();
    assert_eq!(hit.key, LeafKey::new("m", SECOND));
}

#[test]
fn test_miss_between_boxes() {
    let registry = registry_with_two_boxes();
    assert!(registry.pick(&down_at(2.5)).is_none());
    assert!(ModelRegistry::new().pick(&down_at(0.0)).is_none());
}

#[test]
fn test_nearest_along_ray_wins() {
    let registry = registry_with_two_boxes();
    let hit = registry.pick(&along_x()).unwrap();
    assert_eq!(hit.key.element_id, FIRST);
    assert_relative_eq!(hit.distance, 9.5, epsilon = 1e-9);
}

#[test]
fn test_hidden_elements_are_see_through() {
    let mut registry = registry_with_two_boxes();
    registry.overrides_mut().set_element_visible(LeafKey::new("m", FIRST), false);
    let hit = registry.pick(&along_x()).unwrap();
    assert_eq!(hit.key.element_id, SECOND);
    assert_relative_eq!(hit.distance, 14.5, epsilon = 1e-9);

    registry.overrides_mut().set_type_visible(ElementType::Proxy, false);
    assert!(registry.pick(&along_x()).is_none());
}

#[test]
fn test_pick_across_transformed_models() {
    let mut registry = registry_with_two_boxes();
    registry.load("shifted", "m.ifc", &common::two_boxes()).unwrap();
    registry
        .set_transform("shifted", Matrix4::new_translation(&Vector3::new(-20.0, 0.0, 0.0)))
        .unwrap();

    let ray = Ray::new(Point3::new(-30.0, 0.0, 0.5), Vector3::x()).unwrap();
    let hit = registry.pick(&ray).unwrap();
    assert_eq!(hit.key, LeafKey::new("shifted", FIRST));
    assert_relative_eq!(hit.distance, 9.5, epsilon = 1e-9);
    assert_relative_eq!(hit.point.x, -20.5, epsilon = 1e-9);

    registry.set_visible("shifted", false).unwrap();
    let hit = registry.pick(&ray).unwrap();
    assert_eq!(hit.key, LeafKey::new("m", FIRST));
    assert_relative_eq!(hit.distance, 29.5, epsilon = 1e-9);
}

#[test]
fn test_pick_through_screen_centre() {
    let registry = registry_with_two_boxes();
    let camera = Camera::new(Point3::new(5.0, 0.0, 10.0), Point3::new(5.0, 0.0, 0.0));
    let hit = registry.pick_screen(&camera, 0.5, 0.5).unwrap();
    assert_eq!(hit.key.element_id, SECOND);
}

#[test]
fn test_frustum_query() {
    let registry = registry_with_two_boxes();
    let mut camera = Camera::default();
    camera.fit_to_bounds(&registry.combined_bounds().unwrap());
    let mut visible = registry.elements_in_frustum(&camera.frustum());
    visible.sort();
    assert!(visible.contains(&LeafKey::new("m", FIRST)));
    assert!(visible.contains(&LeafKey::new("m", SECOND)));

    // Looking away from the model
    let away = Camera::new(Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 20.0));
    assert!(registry.elements_in_frustum(&away.frustum()).is_empty());
}
