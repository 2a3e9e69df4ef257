use crate::light::LightId;

/// How a failure is handled: every category disables this component's contribution locally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureCategory {
    /// Unsupported device capability. Disables the component for the session.
    ConfigurationFatal,
    /// A required collaborator could not be found. Disables the component.
    RecoverableMissing,
    /// The light exists but cannot drive ocean shadows. Skipped until the light changes.
    PolicyViolation,
    /// A collaborator is out of step with this component. The frame is skipped.
    Transient,
    /// No light configured. Only a warning, and only when null lights are not allowed.
    ExpectedAbsent,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, thiserror::Error)]
pub enum ShadowDataError {
    #[error("the graphics device does not support the shadow texture format {0:?}")]
    UnsupportedFormat(wgpu::TextureFormat),
    #[error("could not find a camera or viewpoint, disabling shadow data")]
    MissingCamera,
    #[error("primary light {0} must be of type Directional")]
    LightNotDirectional(LightId),
    #[error(
        "shadows must be enabled on primary light {0} to enable ocean shadowing (hard and soft are equivalent for the ocean)"
    )]
    LightShadowsDisabled(LightId),
    #[error("a primary light must be specified to enable ocean shadows")]
    MissingLight,
    #[error("transform registry has {registry} cascades but the shadow data has {cascades}, skipping update")]
    CascadeCountMismatch { registry: usize, cascades: u32 },
}

impl ShadowDataError {
    pub fn category(&self) -> FailureCategory {
        match self {
            ShadowDataError::UnsupportedFormat(_) => FailureCategory::ConfigurationFatal,
            ShadowDataError::MissingCamera => FailureCategory::RecoverableMissing,
            ShadowDataError::LightNotDirectional(_) | ShadowDataError::LightShadowsDisabled(_) => {
                FailureCategory::PolicyViolation
            }
            ShadowDataError::CascadeCountMismatch { .. } => FailureCategory::Transient,
            ShadowDataError::MissingLight => FailureCategory::ExpectedAbsent,
        }
    }

    /// Whether the component stays off for the rest of the session after this failure.
    pub fn disables_component(&self) -> bool {
        matches!(
            self.category(),
            FailureCategory::ConfigurationFatal | FailureCategory::RecoverableMissing
        )
    }
}
