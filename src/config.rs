use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::{
    damage::tracker::{CarryForward, MAX_HISTORY_DEPTH},
    foundation::{
        core::Rgba8Premul,
        error::{OutpaintError, OutpaintResult},
    },
};

/// Runtime configuration of one output's paint pipeline.
///
/// Colours are straight (non-premultiplied) RGBA.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PaintConfig {
    /// Repaint the whole output every frame.
    pub force_full_damage: bool,
    /// Paint every frame yellow over the whole output, to make damage visible.
    pub damage_debug: bool,
    pub carry_forward: CarryForward,
    /// Clear colour of a fresh default target and of the output under a render override.
    pub background: [u8; 4],
    /// Clear colour of workspace stream caches.
    pub stream_background: [u8; 4],
}

impl Default for PaintConfig {
    fn default() -> Self {
        Self {
            force_full_damage: false,
            damage_debug: false,
            carry_forward: CarryForward::default(),
            background: [0, 0, 0, 255],
            stream_background: [26, 26, 26, 255],
        }
    }
}

impl PaintConfig {
    pub fn from_json_str(s: &str) -> OutpaintResult<Self> {
        let cfg: Self = serde_json::from_str(s)
            .map_err(|e| OutpaintError::config(format!("invalid paint config: {e}")))?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> OutpaintResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("read paint config {}", path.display()))?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> OutpaintResult<()> {
        if let CarryForward::History { depth } = self.carry_forward
            && !(1..=MAX_HISTORY_DEPTH).contains(&depth)
        {
            return Err(OutpaintError::config(format!(
                "carry_forward history depth must be in 1..={MAX_HISTORY_DEPTH}, got {depth}"
            )));
        }
        Ok(())
    }

    pub(crate) fn background_color(&self) -> Rgba8Premul {
        Rgba8Premul::from_straight(self.background)
    }

    pub(crate) fn stream_background_color(&self) -> Rgba8Premul {
        Rgba8Premul::from_straight(self.stream_background)
    }
}

#[cfg(test)]
#[path = "../tests/unit/config.rs"]
mod tests;
