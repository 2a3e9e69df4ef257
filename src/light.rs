use glam::Vec3;
use std::fmt;

use crate::error::ShadowDataError;

/// Stable identity token for a light. Identity changes are detected by comparing tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LightId(u64);

impl LightId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for LightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    Directional,
    Point,
    Spot,
    Area,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightShadows {
    None,
    Hard,
    Soft,
}

/// A light in the host scene that may drive ocean shadowing.
pub trait ShadowCastingLight {
    fn id(&self) -> LightId;
    fn light_type(&self) -> LightType;
    fn shadows(&self) -> LightShadows;
}

#[derive(Debug, Clone)]
pub struct SceneLight {
    pub id: LightId,
    pub light_type: LightType,
    pub shadows: LightShadows,
    pub direction: Vec3,
}

impl SceneLight {
    pub fn directional(id: LightId, direction: Vec3) -> Self {
        Self { id, light_type: LightType::Directional, shadows: LightShadows::Soft, direction }
    }

    pub fn with_shadows(mut self, shadows: LightShadows) -> Self {
        self.shadows = shadows;
        self
    }

    pub fn with_type(mut self, light_type: LightType) -> Self {
        self.light_type = light_type;
        self
    }
}

impl ShadowCastingLight for SceneLight {
    fn id(&self) -> LightId {
        self.id
    }

    fn light_type(&self) -> LightType {
        self.light_type
    }

    fn shadows(&self) -> LightShadows {
        self.shadows
    }
}

/// Only a directional light with native shadows enabled can feed the ocean shadow data.
pub fn validate_light(light: &dyn ShadowCastingLight) -> Result<(), ShadowDataError> {
    if light.light_type() != LightType::Directional {
        return Err(ShadowDataError::LightNotDirectional(light.id()));
    }
    if light.shadows() == LightShadows::None {
        return Err(ShadowDataError::LightShadowsDisabled(light.id()));
    }
    Ok(())
}
