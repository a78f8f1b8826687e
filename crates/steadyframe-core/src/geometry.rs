//! Geometric primitives for 2D transformations.

use bytemuck::{Pod, Zeroable};
use glam::{DAffine2, DMat2, DVec2, Vec2 as GlamVec2};
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// An image coordinate in pixels. Point sets are positional: index `i` of a
/// previous set corresponds to index `i` of the set produced by tracking it.
pub type FeaturePoint = Vec2;

/// Axis-aligned rectangle.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Rectangle covering a `width` x `height` image, i.e. `[0,w) x [0,h)`.
    #[inline]
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    /// Check if a point is inside the rectangle (half-open on the far edges).
    #[inline]
    pub fn contains(self, point: Vec2) -> bool {
        point.x >= self.x
            && point.x < self.x + self.width
            && point.y >= self.y
            && point.y < self.y + self.height
    }
}

/// Largest uniform scale an estimated motion may carry.
const MAX_REASONABLE_SCALE: f64 = 2.0;
/// Smallest uniform scale an estimated motion may carry.
const MIN_REASONABLE_SCALE: f64 = 0.5;
/// Largest per-frame translation (pixels) an estimated motion may carry.
const MAX_REASONABLE_TRANSLATION: f64 = 100.0;

/// 2x3 affine transform
///
/// ```text
/// | a  b  tx |
/// | c  d  ty |
/// ```
///
/// Stored in double precision.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[[f64; 3]; 2]", into = "[[f64; 3]; 2]")]
pub struct Transform {
    inner: DAffine2,
}

impl Transform {
    /// Identity transform.
    pub const IDENTITY: Self = Self {
        inner: DAffine2::IDENTITY,
    };

    /// Build a transform from its two rows `[[a, b, tx], [c, d, ty]]`.
    pub fn from_rows(rows: [[f64; 3]; 2]) -> Self {
        let [[a, b, tx], [c, d, ty]] = rows;
        Self {
            inner: DAffine2::from_mat2_translation(
                DMat2::from_cols(DVec2::new(a, c), DVec2::new(b, d)),
                DVec2::new(tx, ty),
            ),
        }
    }

    /// The two rows `[[a, b, tx], [c, d, ty]]`.
    pub fn to_rows(self) -> [[f64; 3]; 2] {
        let m = self.inner.matrix2;
        let t = self.inner.translation;
        [[m.x_axis.x, m.y_axis.x, t.x], [m.x_axis.y, m.y_axis.y, t.y]]
    }

    /// Create a translation transform.
    #[inline]
    pub fn translate(tx: f64, ty: f64) -> Self {
        Self {
            inner: DAffine2::from_translation(DVec2::new(tx, ty)),
        }
    }

    /// Create a similarity transform: uniform scale, rotation (radians), then translation.
    pub fn similarity(scale: f64, angle: f64, tx: f64, ty: f64) -> Self {
        Self {
            inner: DAffine2::from_scale_angle_translation(
                DVec2::splat(scale),
                angle,
                DVec2::new(tx, ty),
            ),
        }
    }

    /// Translation component `(tx, ty)`.
    #[inline]
    pub fn translation(&self) -> DVec2 {
        self.inner.translation
    }

    /// Rotation angle (radians) of the linear part.
    pub fn rotation(&self) -> f64 {
        let m = self.inner.matrix2;
        m.x_axis.y.atan2(m.x_axis.x)
    }

    /// Uniform scale of the linear part (length of the first column).
    pub fn scale(&self) -> f64 {
        self.inner.matrix2.x_axis.length()
    }

    /// Determinant of the linear part.
    #[inline]
    pub fn determinant(&self) -> f64 {
        self.inner.matrix2.determinant()
    }

    /// True when every coefficient is finite.
    pub fn is_finite(&self) -> bool {
        self.inner.is_finite()
    }

    /// True when every coefficient is within `eps` of the identity.
    pub fn is_identity_within(&self, eps: f64) -> bool {
        self.inner.abs_diff_eq(DAffine2::IDENTITY, eps)
    }

    /// Exact identity check.
    pub fn is_identity(&self) -> bool {
        self.inner == DAffine2::IDENTITY
    }

    /// Whether this transform is plausible as frame-to-frame camera motion:
    /// finite, scale within [0.5, 2.0] and translation within
    /// 100 px on each axis.
    pub fn is_reasonable(&self) -> bool {
        if !self.is_finite() {
            return false;
        }
        let scale = self.scale();
        let t = self.translation();
        (MIN_REASONABLE_SCALE..=MAX_REASONABLE_SCALE).contains(&scale)
            && t.x.abs() <= MAX_REASONABLE_TRANSLATION
            && t.y.abs() <= MAX_REASONABLE_TRANSLATION
    }

    /// Inverse transform, or `None` when the linear part is singular or the
    /// result is not finite.
    pub fn try_inverse(self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || det.abs() < 1e-12 {
            return None;
        }
        let inner = self.inner.inverse();
        inner.is_finite().then_some(Self { inner })
    }

    /// Combine two transforms: the result applies `other` first, then `self`.
    #[inline]
    pub fn then(self, other: Self) -> Self {
        Self {
            inner: self.inner * other.inner,
        }
    }

    /// Transform a point.
    #[inline]
    pub fn transform_point(&self, point: Vec2) -> Vec2 {
        self.inner.transform_point2(point.as_dvec2()).as_vec2()
    }

    /// Transform a point in double precision.
    #[inline]
    pub fn transform_point_f64(&self, x: f64, y: f64) -> DVec2 {
        self.inner.transform_point2(DVec2::new(x, y))
    }

    /// Same linear part, translation replaced.
    pub fn with_translation(mut self, tx: f64, ty: f64) -> Self {
        self.inner.translation = DVec2::new(tx, ty);
        self
    }

    /// Same linear part, translation divided per axis. Used to carry a luma
    /// transform onto a subsampled chroma plane.
    pub fn with_translation_divided(self, div_x: f64, div_y: f64) -> Self {
        let t = self.translation();
        self.with_translation(t.x / div_x, t.y / div_y)
    }

    /// Clamp the translation to `[-max_x, max_x] x [-max_y, max_y]`.
    pub fn clamp_translation(self, max_x: f64, max_y: f64) -> Self {
        let (max_x, max_y) = (max_x.abs(), max_y.abs());
        let t = self.translation();
        self.with_translation(t.x.clamp(-max_x, max_x), t.y.clamp(-max_y, max_y))
    }

    /// Element-wise arithmetic mean of the coefficients. Empty input yields
    /// the identity.
    pub fn mean<'a, I>(transforms: I) -> Self
    where
        I: IntoIterator<Item = &'a Transform>,
    {
        let mut sum = [[0.0f64; 3]; 2];
        let mut count = 0usize;
        for t in transforms {
            let rows = t.to_rows();
            for (acc_row, row) in sum.iter_mut().zip(rows.iter()) {
                for (acc, v) in acc_row.iter_mut().zip(row.iter()) {
                    *acc += v;
                }
            }
            count += 1;
        }
        if count == 0 {
            return Self::IDENTITY;
        }
        let n = count as f64;
        for v in sum.iter_mut().flatten() {
            *v /= n;
        }
        Self::from_rows(sum)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl From<[[f64; 3]; 2]> for Transform {
    fn from(rows: [[f64; 3]; 2]) -> Self {
        Self::from_rows(rows)
    }
}

impl From<Transform> for [[f64; 3]; 2] {
    fn from(t: Transform) -> Self {
        t.to_rows()
    }
}
