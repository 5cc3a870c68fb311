use async_trait::async_trait;
use teleconsult_client::{LocalTrackSet, MediaError, MediaSource};

/// Simulates the user refusing the camera/microphone permission prompt.
pub struct DeniedSource;

#[async_trait]
impl MediaSource for DeniedSource {
    async fn acquire(&self) -> Result<LocalTrackSet, MediaError> {
        Err(MediaError::PermissionDenied)
    }
}

/// Simulates a machine with no capture devices at all.
pub struct MissingSource;

#[async_trait]
impl MediaSource for MissingSource {
    async fn acquire(&self) -> Result<LocalTrackSet, MediaError> {
        Err(MediaError::DeviceNotFound)
    }
}
