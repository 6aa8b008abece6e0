//! Detections returned by a recognition engine.

/// A point in raster coordinates. `y` grows downwards.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// A quadrilateral enclosing a detected fragment. Engines may return skewed
/// or rotated quads, so nothing here assumes the edges are axis-aligned.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region(pub [Point; 4]);

impl Region {
    /// Build an axis-aligned region from a rectangle.
    pub fn from_rect(left: f64, top: f64, width: f64, height: f64) -> Self {
        let right = left + width;
        let bottom = top + height;
        Self([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ])
    }

    /// Mean of the y-coordinates. Used as the fragment's vertical position.
    pub fn vertical_anchor(&self) -> f64 {
        self.0.iter().map(|p| p.y).sum::<f64>() / self.0.len() as f64
    }

    /// Mean of the x-coordinates. Used as the fragment's horizontal position.
    pub fn horizontal_anchor(&self) -> f64 {
        self.0.iter().map(|p| p.x).sum::<f64>() / self.0.len() as f64
    }

    /// Vertical extent of the region.
    pub fn height(&self) -> f64 {
        let (min, max) = self
            .0
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(min, max), p| {
                (min.min(p.y), max.max(p.y))
            });
        max - min
    }
}

/// One recognized text fragment.
#[derive(Clone, Debug, PartialEq)]
pub struct Detection {
    /// Where the fragment was found.
    pub region: Region,

    /// The recognized text, as returned by the engine (may need trimming).
    pub text: String,

    /// Engine confidence in `[0, 1]`. We don't use this for layout.
    pub confidence: f32,
}

impl Detection {
    pub fn new(region: Region, text: impl Into<String>, confidence: f32) -> Self {
        Self {
            region,
            text: text.into(),
            confidence,
        }
    }
}
