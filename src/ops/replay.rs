// ============================================================================
// Stroke scripts: headless replay of painting sessions
// ============================================================================
//
// A script is a TOML document:
//
//   [display]            # optional: size the photo was shown at on screen
//   width = 400.0
//   height = 300.0
//
//   [[action]]
//   kind = "stroke"
//   diameter = 30        # optional, defaults to the current brush
//   points = [[100.0, 100.0], [200.0, 200.0]]
//
//   [[action]]
//   kind = "undo"        # also: "clear", and "brush" with a diameter
//
// Points are in display coordinates and go through the same pointer state
// machine as live input, so the mapping to photo pixels is exercised too.

use std::path::{Path, PathBuf};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::canvas::DisplayRect;
use crate::components::tools::PointerEvent;
use crate::project::Project;

#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("could not read stroke script {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid stroke script: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("action {0}: a stroke needs at least one point")]
    EmptyStroke(usize),
    #[error("no photo loaded")]
    NoPhoto,
}

#[derive(Clone, Copy, Debug, Deserialize, PartialEq)]
pub struct DisplaySize {
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub left: f32,
    #[serde(default)]
    pub top: f32,
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ScriptAction {
    Stroke {
        #[serde(default)]
        diameter: Option<u32>,
        points: Vec<[f32; 2]>,
    },
    Brush {
        diameter: u32,
    },
    Undo,
    Clear,
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
pub struct StrokeScript {
    #[serde(default)]
    pub display: Option<DisplaySize>,
    #[serde(default, rename = "action")]
    pub actions: Vec<ScriptAction>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub strokes: usize,
    pub undos: usize,
    pub clears: usize,
}

impl StrokeScript {
    pub fn parse(source: &str) -> Result<Self, ReplayError> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self, ReplayError> {
        let source = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&source)
    }

    /// Replay every action against the project's canvas.
    ///
    /// Stroke point lists are checked before anything is drawn, so a bad
    /// script leaves the canvas untouched.
    pub fn replay(&self, project: &mut Project) -> Result<ReplaySummary, ReplayError> {
        let photo = project.photo().ok_or(ReplayError::NoPhoto)?;
        let (w, h) = photo.dimensions();
        let view = match self.display {
            Some(d) => DisplayRect::new(d.left, d.top, d.width, d.height),
            None => DisplayRect::native(w, h),
        };

        for (index, action) in self.actions.iter().enumerate() {
            if let ScriptAction::Stroke { points, .. } = action
                && points.is_empty()
            {
                return Err(ReplayError::EmptyStroke(index));
            }
        }

        let mut summary = ReplaySummary::default();
        for action in &self.actions {
            match action {
                ScriptAction::Stroke { diameter, points } => {
                    let previous = project.brush.diameter();
                    if let Some(d) = diameter {
                        project.brush.set_diameter(*d);
                    }
                    let [x, y] = points[0];
                    project.pointer(PointerEvent::Down { x, y }, &view);
                    for &[x, y] in points {
                        project.pointer(PointerEvent::Move { x, y }, &view);
                    }
                    project.pointer(PointerEvent::Up, &view);
                    project.brush.set_diameter(previous);
                    summary.strokes += 1;
                }
                ScriptAction::Brush { diameter } => {
                    let applied = project.brush.set_diameter(*diameter);
                    debug!("brush diameter set to {}", applied);
                }
                ScriptAction::Undo => {
                    project.canvas.undo();
                    summary.undos += 1;
                }
                ScriptAction::Clear => {
                    project.canvas.clear();
                    summary.clears += 1;
                }
            }
        }
        debug!(
            "replayed {} strokes, {} undos, {} clears",
            summary.strokes, summary.undos, summary.clears
        );
        Ok(summary)
    }
}
