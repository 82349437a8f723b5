use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

use crate::signs::SignClass;

/// Axis-aligned box in frame pixel coordinates. `x1 < x2` and `y1 < y2`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self> {
        if !(x1 < x2 && y1 < y2) {
            return Err(anyhow!(
                "degenerate bounding box ({}, {}, {}, {})",
                x1,
                y1,
                x2,
                y2
            ));
        }
        Ok(Self { x1, y1, x2, y2 })
    }

    pub fn width(&self) -> f32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> f32 {
        self.y2 - self.y1
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union with another box.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix1 = self.x1.max(other.x1);
        let iy1 = self.y1.max(other.y1);
        let ix2 = self.x2.min(other.x2);
        let iy2 = self.y2.min(other.y2);
        let inter = (ix2 - ix1).max(0.0) * (iy2 - iy1).max(0.0);
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

/// One detector output record for one frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub sign: SignClass,
    pub confidence: f32,
    pub bbox: BoundingBox,
}

impl Detection {
    pub fn new(sign: SignClass, confidence: f32, bbox: BoundingBox) -> Result<Self> {
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "confidence {} for {} outside [0, 1]",
                confidence,
                sign
            ));
        }
        Ok(Self {
            sign,
            confidence,
            bbox,
        })
    }

    /// Overlay caption, e.g. `Stop 0.91`.
    pub fn caption(&self) -> String {
        format!("{} {:.2}", self.sign, self.confidence)
    }
}

/// Round a raw score up to two decimals, the precision shown on overlays.
pub fn round_confidence_up(score: f32) -> f32 {
    ((score * 100.0).ceil() / 100.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_boxes_are_rejected() {
        assert!(BoundingBox::new(10.0, 10.0, 10.0, 20.0).is_err());
        assert!(BoundingBox::new(10.0, 30.0, 20.0, 20.0).is_err());
        assert!(BoundingBox::new(0.0, 0.0, 1.0, 1.0).is_ok());
    }

    #[test]
    fn confidence_outside_unit_range_is_rejected() {
        let bbox = BoundingBox::new(0.0, 0.0, 4.0, 4.0).unwrap();
        assert!(Detection::new(SignClass::Stop, 1.2, bbox).is_err());
        assert!(Detection::new(SignClass::Stop, -0.1, bbox).is_err());
        let det = Detection::new(SignClass::Stop, 0.91, bbox).unwrap();
        assert_eq!(det.caption(), "Stop 0.91");
    }

    #[test]
    fn iou_of_identical_and_disjoint_boxes() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0).unwrap();
        let b = BoundingBox::new(20.0, 20.0, 30.0, 30.0).unwrap();
        let c = BoundingBox::new(5.0, 0.0, 15.0, 10.0).unwrap();
        assert!((a.iou(&a) - 1.0).abs() < 1e-6);
        assert_eq!(a.iou(&b), 0.0);
        assert!((a.iou(&c) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn confidence_rounds_up_to_hundredths() {
        assert!((round_confidence_up(0.801) - 0.81).abs() < 1e-6);
        assert!((round_confidence_up(0.75) - 0.75).abs() < 1e-6);
        assert_eq!(round_confidence_up(0.999), 1.0);
    }
}
