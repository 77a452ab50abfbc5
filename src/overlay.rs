//! Settings of the floating timer overlay: which corner it sits in and how opaque it is.
//! Rendering is left to the UI, this module only keeps the values valid and persisted.

use std::{fmt::Display, ops::Deref, str::FromStr};

use anyhow::{anyhow, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::storage::PersistentStore;

pub const OVERLAY_STORAGE_KEY: &str = "overlay_settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OverlayPosition {
    TopLeft,
    #[default]
    TopRight,
    BottomRight,
    BottomLeft,
}

impl OverlayPosition {
    /// Clockwise order used when the overlay is tapped.
    const CYCLE: [OverlayPosition; 4] = [
        OverlayPosition::TopLeft,
        OverlayPosition::TopRight,
        OverlayPosition::BottomRight,
        OverlayPosition::BottomLeft,
    ];

    pub fn next(self) -> Self {
        let index = Self::CYCLE
            .iter()
            .position(|v| *v == self)
            .unwrap_or_default();
        Self::CYCLE[(index + 1) % Self::CYCLE.len()]
    }
}

impl Display for OverlayPosition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OverlayPosition::TopLeft => write!(f, "top-left"),
            OverlayPosition::TopRight => write!(f, "top-right"),
            OverlayPosition::BottomRight => write!(f, "bottom-right"),
            OverlayPosition::BottomLeft => write!(f, "bottom-left"),
        }
    }
}

/// Opacity in percent. Always within [Opacity::MIN]..=[Opacity::MAX] and a multiple of
/// [Opacity::STEP].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "u8")]
pub struct Opacity(u8);

impl Opacity {
    pub const MIN: u8 = 20;
    pub const MAX: u8 = 100;
    pub const STEP: u8 = 5;

    /// Clamps into range and snaps down to the slider step.
    pub fn new(value: u8) -> Self {
        let clamped = value.clamp(Self::MIN, Self::MAX);
        Self(clamped - clamped % Self::STEP)
    }

    pub fn as_fraction(self) -> f64 {
        self.0 as f64 / 100.
    }
}

impl Default for Opacity {
    fn default() -> Self {
        Self(Self::MAX)
    }
}

impl From<u8> for Opacity {
    fn from(value: u8) -> Self {
        Self::new(value)
    }
}

impl Deref for Opacity {
    type Target = u8;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl Display for Opacity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}%", self.0)
    }
}

impl FromStr for Opacity {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().trim_end_matches('%');
        let v = s
            .parse::<u8>()
            .map_err(|e| anyhow!("Can't parse {s} into opacity: {e}"))?;
        Ok(Opacity::new(v))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverlaySettings {
    pub position: OverlayPosition,
    pub opacity: Opacity,
}

impl OverlaySettings {
    /// Reads settings from the store. Missing or unreadable settings fall back to defaults.
    pub async fn load(store: &dyn PersistentStore) -> Self {
        match store.get(OVERLAY_STORAGE_KEY).await {
            Ok(Some(value)) => serde_json::from_str(&value).unwrap_or_else(|e| {
                warn!("Overlay settings are corrupted, using defaults: {e}");
                Self::default()
            }),
            Ok(None) => Self::default(),
            Err(e) => {
                warn!("Failed to read overlay settings {e:?}");
                Self::default()
            }
        }
    }

    pub async fn save(&self, store: &dyn PersistentStore) -> Result<()> {
        store
            .set(OVERLAY_STORAGE_KEY, serde_json::to_string(self)?)
            .await
    }
}

#[cfg(test)]
mod tests {
    use anyhow::{anyhow, Result};
    use mockall::predicate::eq;

    use crate::storage::MockPersistentStore;

    use super::{Opacity, OverlayPosition, OverlaySettings, OVERLAY_STORAGE_KEY};

    #[test]
    fn test_position_cycles_clockwise() {
        let mut position = OverlayPosition::TopLeft;
        let mut visited = vec![];
        for _ in 0..4 {
            position = position.next();
            visited.push(position);
        }
        assert_eq!(
            visited,
            vec![
                OverlayPosition::TopRight,
                OverlayPosition::BottomRight,
                OverlayPosition::BottomLeft,
                OverlayPosition::TopLeft,
            ]
        );
    }

    #[test]
    fn test_opacity_is_clamped_and_snapped() {
        assert_eq!(*Opacity::new(0), 20);
        assert_eq!(*Opacity::new(200), 100);
        assert_eq!(*Opacity::new(67), 65);
        assert_eq!(*Opacity::new(20), 20);
    }

    #[test]
    fn test_opacity_parsing() -> Result<()> {
        assert_eq!(*"60%".parse::<Opacity>()?, 60);
        assert_eq!(*"42".parse::<Opacity>()?, 40);
        assert!("half".parse::<Opacity>().is_err());
        Ok(())
    }

    #[test]
    fn test_settings_deserialize_snaps_opacity() -> Result<()> {
        let settings: OverlaySettings =
            serde_json::from_str(r#"{"position":"bottom-left","opacity":13}"#)?;
        assert_eq!(settings.position, OverlayPosition::BottomLeft);
        assert_eq!(*settings.opacity, 20);
        Ok(())
    }

    #[tokio::test]
    async fn test_load_falls_back_to_defaults() {
        let mut store = MockPersistentStore::new();
        store
            .expect_get()
            .with(eq(OVERLAY_STORAGE_KEY))
            .returning(|_| Err(anyhow!("storage is gone")));
        assert_eq!(OverlaySettings::load(&store).await, OverlaySettings::default());

        let mut store = MockPersistentStore::new();
        store
            .expect_get()
            .returning(|_| Ok(Some("not json".into())));
        assert_eq!(OverlaySettings::load(&store).await, OverlaySettings::default());
    }

    #[tokio::test]
    async fn test_save_writes_json() -> Result<()> {
        let mut store = MockPersistentStore::new();
        store
            .expect_set()
            .withf(|key, value| {
                key == OVERLAY_STORAGE_KEY && value == r#"{"position":"top-left","opacity":55}"#
            })
            .times(1)
            .returning(|_, _| Ok(()));
        OverlaySettings {
            position: OverlayPosition::TopLeft,
            opacity: Opacity::new(55),
        }
        .save(&store)
        .await
    }
}
