#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{round_confidence_up, BoundingBox, Detection};
use crate::frame::{FrameView, RGB_CHANNELS};
use crate::signs::{SignClass, SIGN_CLASS_COUNT};

/// Tuning for the ONNX road-sign model.
#[derive(Clone, Debug)]
pub struct TractSettings {
    /// Square model input edge in pixels.
    pub input_size: u32,
    /// Candidates scoring below this are discarded before suppression.
    pub min_confidence: f32,
    /// Overlap above which the weaker of two same-class boxes is dropped.
    pub iou_threshold: f32,
}

impl Default for TractSettings {
    fn default() -> Self {
        Self {
            input_size: 640,
            min_confidence: 0.25,
            iou_threshold: 0.45,
        }
    }
}

/// Tract-based backend for a YOLO-style ONNX export.
///
/// The model is expected to emit `[1, 4 + classes, anchors]`, where each
/// anchor column holds `cx, cy, w, h` in input pixels followed by one score
/// per class.
pub struct TractBackend {
    model: SimplePlan<TypedFact, Box<dyn TypedOp>>,
    settings: TractSettings,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, settings: TractSettings) -> Result<Self> {
        let model_path = model_path.as_ref();
        let edge = settings.input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, edge, edge)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        log::info!(
            "TractBackend: loaded {} ({}x{} input)",
            model_path.display(),
            edge,
            edge
        );
        Ok(Self { model, settings })
    }

    /// Nearest-neighbour resize into a normalized NCHW tensor.
    fn build_input(&self, frame: FrameView<'_>) -> Result<Tensor> {
        let (width, height) = (frame.width() as usize, frame.height() as usize);
        if width == 0 || height == 0 {
            return Err(anyhow!("cannot run inference on an empty frame"));
        }
        let pixels = frame.pixels();
        let edge = self.settings.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_fn((1, 3, edge, edge), |(_, c, y, x)| {
            let sx = x * width / edge;
            let sy = y * height / edge;
            let idx = (sy * width + sx) * RGB_CHANNELS + c;
            pixels[idx] as f32 / 255.0
        });
        Ok(input.into_tensor())
    }

    fn decode(&self, outputs: TVec<TValue>, frame: FrameView<'_>) -> Result<Vec<Detection>> {
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let view = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?
            .into_dimensionality::<tract_ndarray::Ix3>()
            .context("model output is not [1, 4 + classes, anchors]")?;
        let (_, rows, anchors) = view.dim();
        if rows < 5 {
            return Err(anyhow!("model output has {} rows, expected at least 5", rows));
        }
        let classes = rows - 4;
        if classes != SIGN_CLASS_COUNT {
            log::debug!(
                "TractBackend: model reports {} classes, class table has {}",
                classes,
                SIGN_CLASS_COUNT
            );
        }

        let edge = self.settings.input_size as f32;
        let sx = frame.width() as f32 / edge;
        let sy = frame.height() as f32 / edge;
        let max_x = frame.width() as f32;
        let max_y = frame.height() as f32;

        let mut candidates: Vec<(usize, f32, BoundingBox)> = Vec::new();
        for a in 0..anchors {
            let (class_idx, score) = (0..classes)
                .map(|c| (c, view[[0, 4 + c, a]]))
                .fold((0, f32::NEG_INFINITY), |best, cur| {
                    if cur.1 > best.1 {
                        cur
                    } else {
                        best
                    }
                });
            if !score.is_finite() || score < self.settings.min_confidence {
                continue;
            }
            let (cx, cy, w, h) = (
                view[[0, 0, a]],
                view[[0, 1, a]],
                view[[0, 2, a]],
                view[[0, 3, a]],
            );
            let x1 = ((cx - w / 2.0) * sx).clamp(0.0, max_x);
            let y1 = ((cy - h / 2.0) * sy).clamp(0.0, max_y);
            let x2 = ((cx + w / 2.0) * sx).clamp(0.0, max_x);
            let y2 = ((cy + h / 2.0) * sy).clamp(0.0, max_y);
            let Ok(bbox) = BoundingBox::new(x1, y1, x2, y2) else {
                continue;
            };
            candidates.push((class_idx, score.min(1.0), bbox));
        }

        let kept = non_max_suppression(candidates, self.settings.iou_threshold);
        kept.into_iter()
            .map(|(class_idx, score, bbox)| {
                Detection::new(
                    SignClass::from_class_id(class_idx as i64),
                    round_confidence_up(score),
                    bbox,
                )
            })
            .collect()
    }
}

/// Per-class greedy suppression. Output is sorted by descending score.
fn non_max_suppression(
    mut candidates: Vec<(usize, f32, BoundingBox)>,
    iou_threshold: f32,
) -> Vec<(usize, f32, BoundingBox)> {
    candidates.sort_by(|a, b| b.1.total_cmp(&a.1));
    let mut kept: Vec<(usize, f32, BoundingBox)> = Vec::new();
    for cand in candidates {
        let suppressed = kept
            .iter()
            .any(|k| k.0 == cand.0 && k.2.iou(&cand.2) > iou_threshold);
        if !suppressed {
            kept.push(cand);
        }
    }
    kept
}

impl DetectorBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn detect(&mut self, frame: FrameView<'_>) -> Result<Vec<Detection>> {
        let input = self.build_input(frame)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        self.decode(outputs, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BoundingBox {
        BoundingBox::new(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn suppression_keeps_strongest_overlapping_box() {
        let kept = non_max_suppression(
            vec![
                (10, 0.7, bbox(0.0, 0.0, 10.0, 10.0)),
                (10, 0.9, bbox(1.0, 1.0, 11.0, 11.0)),
                (1, 0.8, bbox(1.0, 1.0, 11.0, 11.0)),
            ],
            0.45,
        );
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].0, 10);
        assert_eq!(kept[0].1, 0.9);
        assert_eq!(kept[1].0, 1);
    }
}
