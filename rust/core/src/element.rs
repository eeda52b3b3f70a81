// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Element classification and element nodes
//!
//! Fast type checking using an enum instead of string comparison. Types without
//! a dedicated variant are still elements, carried as [`ElementType::Other`].

use crate::instance::{EntityId, RawInstance};
use crate::properties::PropertySets;
use std::fmt;
use std::str::FromStr;

/// Building element kinds
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ElementType {
    // Spatial structure
    Project,
    Site,
    Building,
    Storey,
    Space,

    // Building elements
    Wall,
    Slab,
    Column,
    Beam,
    Door,
    Window,
    Roof,
    Stair,
    Ramp,
    Railing,
    Covering,
    CurtainWall,
    Plate,
    Member,
    Footing,
    Pile,
    Opening,
    Proxy,

    // Furnishing and distribution
    Furniture,
    Pipe,
    Duct,
    Cable,
    FlowTerminal,
    FlowFitting,

    /// Any other product type, holding the upper-case type name
    Other(String),
}

/// Product types with no dedicated variant that still count as elements
const OTHER_PRODUCT_TYPES: &[&str] = &[
    "IFCBUILDINGELEMENTPART",
    "IFCCHIMNEY",
    "IFCSHADINGDEVICE",
    "IFCREINFORCINGBAR",
    "IFCREINFORCINGMESH",
    "IFCTENDON",
    "IFCDISCRETEACCESSORY",
    "IFCMECHANICALFASTENER",
    "IFCFASTENER",
    "IFCELEMENTASSEMBLY",
    "IFCTRANSPORTELEMENT",
    "IFCVIRTUALELEMENT",
    "IFCDISTRIBUTIONELEMENT",
    "IFCDISTRIBUTIONCONTROLELEMENT",
    "IFCDISTRIBUTIONFLOWELEMENT",
    "IFCFLOWSEGMENT",
    "IFCFLOWCONTROLLER",
    "IFCFLOWMOVINGDEVICE",
    "IFCFLOWSTORAGEDEVICE",
    "IFCFLOWTREATMENTDEVICE",
    "IFCENERGYCONVERSIONDEVICE",
    "IFCVALVE",
    "IFCPUMP",
    "IFCFAN",
    "IFCTANK",
    "IFCBOILER",
    "IFCLIGHTFIXTURE",
    "IFCLAMP",
    "IFCOUTLET",
    "IFCSWITCHINGDEVICE",
    "IFCELECTRICAPPLIANCE",
    "IFCSENSOR",
    "IFCALARM",
    "IFCGEOGRAPHICELEMENT",
    "IFCCIVILELEMENT",
    "IFCGRID",
];

/// Spatial containers introduced after IFC4 (infrastructure extensions)
const OTHER_SPATIAL_TYPES: &[&str] = &[
    "IFCFACILITY",
    "IFCFACILITYPART",
    "IFCBRIDGE",
    "IFCBRIDGEPART",
    "IFCROAD",
    "IFCROADPART",
    "IFCRAILWAY",
    "IFCRAILWAYPART",
    "IFCMARINEFACILITY",
    "IFCSPATIALZONE",
    "IFCEXTERNALSPATIALELEMENT",
];

impl ElementType {
    /// Classify an entity type name. `None` means the type is not an element
    /// (relationships, geometry, property definitions, ...).
    pub fn from_type_name(type_name: &str) -> Option<Self> {
        let upper = type_name.to_ascii_uppercase();
        let t = match upper.as_str() {
            "IFCPROJECT" => Self::Project,
            "IFCSITE" => Self::Site,
            "IFCBUILDING" => Self::Building,
            "IFCBUILDINGSTOREY" => Self::Storey,
            "IFCSPACE" => Self::Space,

            "IFCWALL" | "IFCWALLSTANDARDCASE" | "IFCWALLELEMENTEDCASE" => Self::Wall,
            "IFCSLAB" | "IFCSLABSTANDARDCASE" | "IFCSLABELEMENTEDCASE" => Self::Slab,
            "IFCCOLUMN" | "IFCCOLUMNSTANDARDCASE" => Self::Column,
            "IFCBEAM" | "IFCBEAMSTANDARDCASE" => Self::Beam,
            "IFCDOOR" | "IFCDOORSTANDARDCASE" => Self::Door,
            "IFCWINDOW" | "IFCWINDOWSTANDARDCASE" => Self::Window,
            "IFCROOF" => Self::Roof,
            "IFCSTAIR" | "IFCSTAIRFLIGHT" => Self::Stair,
            "IFCRAMP" | "IFCRAMPFLIGHT" => Self::Ramp,
            "IFCRAILING" => Self::Railing,
            "IFCCOVERING" => Self::Covering,
            "IFCCURTAINWALL" => Self::CurtainWall,
            "IFCPLATE" | "IFCPLATESTANDARDCASE" => Self::Plate,
            "IFCMEMBER" | "IFCMEMBERSTANDARDCASE" => Self::Member,
            "IFCFOOTING" => Self::Footing,
            "IFCPILE" => Self::Pile,
            "IFCOPENINGELEMENT" | "IFCOPENINGSTANDARDCASE" => Self::Opening,
            "IFCBUILDINGELEMENTPROXY" => Self::Proxy,

            "IFCFURNISHINGELEMENT" | "IFCFURNITURE" | "IFCSYSTEMFURNITUREELEMENT" => Self::Furniture,
            "IFCPIPESEGMENT" | "IFCPIPEFITTING" => Self::Pipe,
            "IFCDUCTSEGMENT" | "IFCDUCTFITTING" | "IFCDUCTSILENCER" => Self::Duct,
            "IFCCABLESEGMENT" | "IFCCABLEFITTING" | "IFCCABLECARRIERSEGMENT"
            | "IFCCABLECARRIERFITTING" => Self::Cable,
            "IFCFLOWTERMINAL" | "IFCAIRTERMINAL" | "IFCSANITARYTERMINAL" | "IFCWASTETERMINAL" => {
                Self::FlowTerminal
            }
            "IFCFLOWFITTING" => Self::FlowFitting,

            other if OTHER_PRODUCT_TYPES.contains(&other) || OTHER_SPATIAL_TYPES.contains(&other) => {
                Self::Other(upper.clone())
            }
            _ => return None,
        };
        Some(t)
    }

    /// Spatial structure element (containers in the hierarchy)
    pub fn is_spatial(&self) -> bool {
        match self {
            Self::Project | Self::Site | Self::Building | Self::Storey | Self::Space => true,
            Self::Other(name) => OTHER_SPATIAL_TYPES.contains(&name.as_str()),
            _ => false,
        }
    }

    /// Display name used for counts and search
    pub fn name(&self) -> &str {
        match self {
            Self::Project => "Project",
            Self::Site => "Site",
            Self::Building => "Building",
            Self::Storey => "Storey",
            Self::Space => "Space",
            Self::Wall => "Wall",
            Self::Slab => "Slab",
            Self::Column => "Column",
            Self::Beam => "Beam",
            Self::Door => "Door",
            Self::Window => "Window",
            Self::Roof => "Roof",
            Self::Stair => "Stair",
            Self::Ramp => "Ramp",
            Self::Railing => "Railing",
            Self::Covering => "Covering",
            Self::CurtainWall => "CurtainWall",
            Self::Plate => "Plate",
            Self::Member => "Member",
            Self::Footing => "Footing",
            Self::Pile => "Pile",
            Self::Opening => "Opening",
            Self::Proxy => "Proxy",
            Self::Furniture => "Furniture",
            Self::Pipe => "Pipe",
            Self::Duct => "Duct",
            Self::Cable => "Cable",
            Self::FlowTerminal => "FlowTerminal",
            Self::FlowFitting => "FlowFitting",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementType {
    type Err = std::convert::Infallible;

    /// Accepts display names (`wall`, `CurtainWall`) or IFC type names (`IFCWALL`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const NAMED: &[ElementType] = &[
            ElementType::Project,
            ElementType::Site,
            ElementType::Building,
            ElementType::Storey,
            ElementType::Space,
            ElementType::Wall,
            ElementType::Slab,
            ElementType::Column,
            ElementType::Beam,
            ElementType::Door,
            ElementType::Window,
            ElementType::Roof,
            ElementType::Stair,
            ElementType::Ramp,
            ElementType::Railing,
            ElementType::Covering,
            ElementType::CurtainWall,
            ElementType::Plate,
            ElementType::Member,
            ElementType::Footing,
            ElementType::Pile,
            ElementType::Opening,
            ElementType::Proxy,
            ElementType::Furniture,
            ElementType::Pipe,
            ElementType::Duct,
            ElementType::Cable,
            ElementType::FlowTerminal,
            ElementType::FlowFitting,
        ];

        if let Some(found) = NAMED.iter().find(|t| t.name().eq_ignore_ascii_case(s)) {
            return Ok(found.clone());
        }
        Ok(Self::from_type_name(s).unwrap_or_else(|| Self::Other(s.to_ascii_uppercase())))
    }
}

/// Typed projection of a product instance. Read-only after load.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ElementNode {
    pub id: EntityId,
    /// 22-character GlobalId
    pub global_id: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub object_type: Option<String>,
    pub element_type: ElementType,
    /// Upper-case source type name, e.g. `IFCWALLSTANDARDCASE`
    pub type_name: String,
    /// IfcLocalPlacement id
    pub placement: Option<EntityId>,
    /// IfcProductDefinitionShape id
    pub representation: Option<EntityId>,
    /// Tag for elements, LongName for spatial containers
    pub tag: Option<String>,
    /// Storey elevation
    pub elevation: Option<f64>,
    pub parent: Option<EntityId>,
    pub children: Vec<EntityId>,
    pub property_sets: PropertySets,
}

impl ElementNode {
    /// Project a product instance. Returns `None` for non-element types or
    /// instances without a GlobalId.
    pub fn from_instance(instance: &RawInstance) -> Option<Self> {
        let element_type = ElementType::from_type_name(&instance.type_name)?;
        Self::with_type(instance, element_type)
    }

    /// Project an instance under an already decided classification
    pub fn with_type(instance: &RawInstance, element_type: ElementType) -> Option<Self> {
        let global_id = instance.get_string(0)?.to_string();
        let text = |i: usize| instance.get_string(i).map(str::to_string);

        // IfcProject carries LongName/Phase where products have placement/representation
        let (placement, representation) = if element_type == ElementType::Project {
            (None, None)
        } else {
            (instance.get_ref(5), instance.get_ref(6))
        };

        let tag = if element_type == ElementType::Project {
            text(5)
        } else {
            text(7)
        };

        let elevation = if element_type == ElementType::Storey {
            instance.get_float(9)
        } else {
            None
        };

        Some(Self {
            id: instance.id,
            global_id,
            name: text(2),
            description: text(3),
            object_type: text(4),
            element_type,
            type_name: instance.type_name.clone(),
            placement,
            representation,
            tag,
            elevation,
            parent: None,
            children: Vec::new(),
            property_sets: PropertySets::default(),
        })
    }

    /// Name if present, else `<Type> #<id>`
    pub fn display_name(&self) -> String {
        match &self.name {
            Some(name) if !name.is_empty() => name.clone(),
            _ => format!("{} #{}", self.element_type, self.id),
        }
    }

    /// Case-insensitive substring match over name, GlobalId and numeric id.
    /// `needle` must already be lower-case.
    pub fn matches_query(&self, needle: &str) -> bool {
        if needle.is_empty() {
            return false;
        }
        self.name
            .as_deref()
            .map(|n| n.to_lowercase().contains(needle))
            .unwrap_or(false)
            || self.global_id.to_lowercase().contains(needle)
            || self.id.to_string().contains(needle)
    }
}
