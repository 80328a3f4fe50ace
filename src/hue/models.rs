//! CLIP v2 payloads used by the provider.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Envelope around every CLIP v2 response.
#[derive(Debug, Clone, Deserialize)]
pub struct HueResponse<T> {
    /// Errors reported by the bridge.
    #[serde(default)]
    pub errors: Vec<HueErrorItem>,
    /// Returned resources.
    #[serde(default = "Vec::new")]
    pub data: Vec<T>,
}

/// One entry of the `errors` array.
#[derive(Debug, Clone, Deserialize)]
pub struct HueErrorItem {
    /// Human-readable description.
    pub description: String,
}

/// Reference to another bridge resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    /// Referenced resource id.
    pub rid: String,
    /// Referenced resource type, e.g. `device`.
    pub rtype: String,
}

impl ResourceIdentifier {
    /// Reference to a device.
    pub fn device(rid: impl Into<String>) -> Self {
        Self {
            rid: rid.into(),
            rtype: "device".to_string(),
        }
    }
}

/// Power state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct On {
    /// Whether the light is on.
    pub on: bool,
}

/// Brightness state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Dimming {
    /// Brightness percentage, 0 to 100.
    pub brightness: f64,
}

/// A point in CIE xy space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GamutPosition {
    /// x chromaticity.
    pub x: f64,
    /// y chromaticity.
    pub y: f64,
}

/// Colour state.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Chromaticity.
    pub xy: GamutPosition,
}

/// Light metadata as reported by the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightMetadata {
    /// Name shown in the Hue app.
    #[serde(default)]
    pub name: String,
    /// Light archetype, e.g. `sultan_bulb`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archetype: Option<String>,
}

/// A light resource as returned by `GET /clip/v2/resource/light`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGet {
    /// Light id.
    pub id: String,
    /// Name and archetype.
    pub metadata: LightMetadata,
    /// Power state.
    pub on: On,
    /// Absent on non-dimmable lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    /// Absent on white-only lights.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Desired light state for `PUT /clip/v2/resource/light/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LightPut {
    /// New power state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<On>,
    /// New brightness.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    /// New colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

/// Room categories known to the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum RoomArchetype {
    LivingRoom,
    Kitchen,
    Dining,
    Bedroom,
    KidsBedroom,
    Bathroom,
    Nursery,
    Recreation,
    Office,
    Gym,
    Hallway,
    Toilet,
    FrontDoor,
    Garage,
    Terrace,
    Garden,
    Driveway,
    Carport,
    Home,
    Downstairs,
    Upstairs,
    TopFloor,
    Attic,
    GuestRoom,
    Staircase,
    Lounge,
    ManCave,
    Computer,
    Studio,
    Music,
    Tv,
    Reading,
    Closet,
    Storage,
    LaundryRoom,
    Balcony,
    Porch,
    Barbecue,
    Pool,
    #[serde(other)]
    Other,
}

impl RoomArchetype {
    /// Every archetype, in the bridge's order.
    pub const ALL: [RoomArchetype; 40] = [
        Self::LivingRoom,
        Self::Kitchen,
        Self::Dining,
        Self::Bedroom,
        Self::KidsBedroom,
        Self::Bathroom,
        Self::Nursery,
        Self::Recreation,
        Self::Office,
        Self::Gym,
        Self::Hallway,
        Self::Toilet,
        Self::FrontDoor,
        Self::Garage,
        Self::Terrace,
        Self::Garden,
        Self::Driveway,
        Self::Carport,
        Self::Home,
        Self::Downstairs,
        Self::Upstairs,
        Self::TopFloor,
        Self::Attic,
        Self::GuestRoom,
        Self::Staircase,
        Self::Lounge,
        Self::ManCave,
        Self::Computer,
        Self::Studio,
        Self::Music,
        Self::Tv,
        Self::Reading,
        Self::Closet,
        Self::Storage,
        Self::LaundryRoom,
        Self::Balcony,
        Self::Porch,
        Self::Barbecue,
        Self::Pool,
        Self::Other,
    ];

    /// Wire name of the archetype.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LivingRoom => "living_room",
            Self::Kitchen => "kitchen",
            Self::Dining => "dining",
            Self::Bedroom => "bedroom",
            Self::KidsBedroom => "kids_bedroom",
            Self::Bathroom => "bathroom",
            Self::Nursery => "nursery",
            Self::Recreation => "recreation",
            Self::Office => "office",
            Self::Gym => "gym",
            Self::Hallway => "hallway",
            Self::Toilet => "toilet",
            Self::FrontDoor => "front_door",
            Self::Garage => "garage",
            Self::Terrace => "terrace",
            Self::Garden => "garden",
            Self::Driveway => "driveway",
            Self::Carport => "carport",
            Self::Home => "home",
            Self::Downstairs => "downstairs",
            Self::Upstairs => "upstairs",
            Self::TopFloor => "top_floor",
            Self::Attic => "attic",
            Self::GuestRoom => "guest_room",
            Self::Staircase => "staircase",
            Self::Lounge => "lounge",
            Self::ManCave => "man_cave",
            Self::Computer => "computer",
            Self::Studio => "studio",
            Self::Music => "music",
            Self::Tv => "tv",
            Self::Reading => "reading",
            Self::Closet => "closet",
            Self::Storage => "storage",
            Self::LaundryRoom => "laundry_room",
            Self::Balcony => "balcony",
            Self::Porch => "porch",
            Self::Barbecue => "barbecue",
            Self::Pool => "pool",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for RoomArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known archetype.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownArchetype(pub String);

impl fmt::Display for UnknownArchetype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid archetype {}", self.0)
    }
}

impl std::error::Error for UnknownArchetype {}

impl FromStr for RoomArchetype {
    type Err = UnknownArchetype;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|archetype| archetype.as_str() == s)
            .ok_or_else(|| UnknownArchetype(s.to_string()))
    }
}

/// Room name and category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMetadata {
    /// Display name.
    pub name: String,
    /// Room category.
    pub archetype: RoomArchetype,
}

/// A room as returned by `GET /clip/v2/resource/room/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomGet {
    /// Room id.
    pub id: String,
    /// Name and category.
    pub metadata: RoomMetadata,
    /// Devices assigned to the room.
    #[serde(default)]
    pub children: Vec<ResourceIdentifier>,
}

/// Body of room create and update requests.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomPut {
    /// Name and category.
    pub metadata: RoomMetadata,
    /// Devices assigned to the room.
    pub children: Vec<ResourceIdentifier>,
}
