use anyhow::{Context, Result};
use std::path::Path;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Replays a fixed script of per-frame detections, looping at the end.
///
/// The script is a JSON array with one entry per frame, each an array of
/// detections: `[[{"label": "person", "confidence": 0.8}], []]`. Frame
/// content is ignored.
pub struct ScriptedBackend {
    script: Vec<Vec<Detection>>,
    cursor: usize,
}

impl ScriptedBackend {
    pub fn new(script: Vec<Vec<Detection>>) -> Self {
        Self { script, cursor: 0 }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let script: Vec<Vec<Detection>> =
            serde_json::from_str(json).context("parse detection script")?;
        Ok(Self::new(script))
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("read detection script {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("in {}", path.display()))
    }

    pub fn len(&self) -> usize {
        self.script.len()
    }

    pub fn is_empty(&self) -> bool {
        self.script.is_empty()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn detect(&mut self, _frame: &Frame) -> Result<Vec<Detection>> {
        if self.script.is_empty() {
            return Ok(vec![]);
        }
        let detections = self.script[self.cursor].clone();
        self.cursor = (self.cursor + 1) % self.script.len();
        Ok(detections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::PixelFormat;

    fn frame() -> Frame {
        Frame::new(vec![0; 3], 1, 1, PixelFormat::Rgb24).unwrap()
    }

    #[test]
    fn replays_script_in_order_and_loops() {
        let mut backend = ScriptedBackend::from_json_str(
            r#"[
                [{"label": "person", "confidence": 0.8}],
                [],
                [{"label": "cat", "confidence": 0.7, "bbox": {"x1": 1, "y1": 2, "x2": 3, "y2": 4}}]
            ]"#,
        )
        .unwrap();
        assert_eq!(backend.len(), 3);

        let first = backend.detect(&frame()).unwrap();
        assert_eq!(first, vec![Detection::new("person", 0.8)]);
        assert!(backend.detect(&frame()).unwrap().is_empty());
        let third = backend.detect(&frame()).unwrap();
        assert_eq!(third[0].label, "cat");
        assert_eq!(third[0].bbox.area(), 4.0);
        assert_eq!(backend.detect(&frame()).unwrap(), first);
    }

    #[test]
    fn empty_script_reports_nothing() {
        let mut backend = ScriptedBackend::new(vec![]);
        assert!(backend.is_empty());
        assert!(backend.detect(&frame()).unwrap().is_empty());
    }

    #[test]
    fn malformed_script_is_rejected() {
        assert!(ScriptedBackend::from_json_str(r#"{"label": "person"}"#).is_err());
    }
}
