//! Rendering backends: the seam between the canvas surface and pixels.
//!
//! The surface owns the scene; a backend only turns a scene into pixels. The
//! browser editor delegated this to a canvas library, which could lose its
//! drawing context at any time. `RenderBackend::is_context_lost` models that,
//! and `BackendFactory` is how the surface asks for a fresh backend when it
//! (re)initializes.
//!
//! `RasterBackend` is the software implementation used for PNG export. It
//! covers rects, circles, free-hand paths and `data:` URL images, honoring
//! position, scale and rotation. Text glyphs are not rasterized.

#[cfg(test)]
#[path = "raster_test.rs"]
mod raster_test;

use std::io::Cursor;

use base64::Engine as _;
use base64::engine::general_purpose;
use image::{ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::consts::MAX_RASTER_DIMENSION;
use crate::error::ErrorCode;
use crate::scene::{Drawable, PathPoint, Scene, Shape};

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("invalid surface dimensions {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("rendering context lost")]
    ContextLost,
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

impl ErrorCode for BackendError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidDimensions { .. } => "E_BACKEND_DIMENSIONS",
            Self::ContextLost => "E_BACKEND_CONTEXT_LOST",
            Self::Unavailable(_) => "E_BACKEND_UNAVAILABLE",
            Self::Encode(_) => "E_BACKEND_ENCODE",
        }
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::ContextLost | Self::Unavailable(_))
    }
}

/// A live drawing target owned by one canvas surface.
pub trait RenderBackend: Send {
    /// Draw `scene` from scratch.
    ///
    /// # Errors
    ///
    /// Returns `ContextLost` if the drawing context is gone.
    fn render(&mut self, scene: &Scene) -> Result<(), BackendError>;

    /// Encode the last rendered frame as PNG.
    ///
    /// # Errors
    ///
    /// Returns an error if the context is gone or encoding fails.
    fn encode_png(&self) -> Result<Vec<u8>, BackendError>;

    /// Whether the drawing context has been lost and the backend must be
    /// recreated.
    fn is_context_lost(&self) -> bool {
        false
    }

    /// Release native resources. The backend is unusable afterwards.
    fn release(&mut self);
}

/// Creates backends for a surface.
pub trait BackendFactory: Send + Sync {
    /// Create a backend of the given pixel size.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be created right now.
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, BackendError>;
}

// =============================================================================
// SOFTWARE RASTER
// =============================================================================

/// Factory for [`RasterBackend`].
#[derive(Debug, Clone, Copy, Default)]
pub struct RasterFactory;

impl BackendFactory for RasterFactory {
    fn create(&self, width: u32, height: u32) -> Result<Box<dyn RenderBackend>, BackendError> {
        Ok(Box::new(RasterBackend::new(width, height)?))
    }
}

/// Software backend drawing into an RGBA buffer.
pub struct RasterBackend {
    pixels: Option<RgbaImage>,
}

impl RasterBackend {
    /// Allocate a transparent buffer.
    ///
    /// # Errors
    ///
    /// Returns `InvalidDimensions` for zero or oversized edges.
    pub fn new(width: u32, height: u32) -> Result<Self, BackendError> {
        if width == 0 || height == 0 || width > MAX_RASTER_DIMENSION || height > MAX_RASTER_DIMENSION {
            return Err(BackendError::InvalidDimensions { width, height });
        }
        Ok(Self { pixels: Some(RgbaImage::new(width, height)) })
    }

    /// The rendered buffer, if the backend has not been released.
    #[must_use]
    pub fn pixels(&self) -> Option<&RgbaImage> {
        self.pixels.as_ref()
    }
}

impl RenderBackend for RasterBackend {
    fn render(&mut self, scene: &Scene) -> Result<(), BackendError> {
        let Some(pixels) = self.pixels.as_mut() else {
            return Err(BackendError::ContextLost);
        };
        let background = parse_color(&scene.background).unwrap_or(Rgba([255, 255, 255, 255]));
        for px in pixels.pixels_mut() {
            *px = background;
        }
        for drawable in &scene.objects {
            draw_drawable(pixels, drawable);
        }
        Ok(())
    }

    fn encode_png(&self) -> Result<Vec<u8>, BackendError> {
        let Some(pixels) = self.pixels.as_ref() else {
            return Err(BackendError::ContextLost);
        };
        let mut bytes = Vec::new();
        pixels.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
        Ok(bytes)
    }

    fn is_context_lost(&self) -> bool {
        self.pixels.is_none()
    }

    fn release(&mut self) {
        self.pixels = None;
    }
}

// =============================================================================
// DRAWING
// =============================================================================

/// Local ↔ world transform for one drawable: scale, then rotate about
/// `left`/`top`, then translate.
#[derive(Debug, Clone, Copy)]
struct Transform {
    left: f64,
    top: f64,
    sx: f64,
    sy: f64,
    cos: f64,
    sin: f64,
}

impl Transform {
    fn of(d: &Drawable) -> Self {
        let rad = d.angle.to_radians();
        Self { left: d.left, top: d.top, sx: d.scale_x, sy: d.scale_y, cos: rad.cos(), sin: rad.sin() }
    }

    fn to_world(self, x: f64, y: f64) -> (f64, f64) {
        let (x, y) = (x * self.sx, y * self.sy);
        (self.left + x * self.cos - y * self.sin, self.top + x * self.sin + y * self.cos)
    }

    fn to_local(self, wx: f64, wy: f64) -> Option<(f64, f64)> {
        if self.sx == 0.0 || self.sy == 0.0 {
            return None;
        }
        let (dx, dy) = (wx - self.left, wy - self.top);
        let x = dx * self.cos + dy * self.sin;
        let y = -dx * self.sin + dy * self.cos;
        Some((x / self.sx, y / self.sy))
    }
}

fn draw_drawable(pixels: &mut RgbaImage, d: &Drawable) {
    let fill = parse_color(&d.fill);
    let decoded;
    let sampler: Box<dyn Fn(f64, f64) -> Option<Rgba<u8>> + '_> = match &d.shape {
        Shape::Rect { width, height } => {
            let (w, h) = (*width, *height);
            Box::new(move |x, y| if (0.0..w).contains(&x) && (0.0..h).contains(&y) { fill } else { None })
        }
        Shape::Circle { radius } => {
            let r = *radius;
            Box::new(move |x, y| if (x - r).powi(2) + (y - r).powi(2) <= r * r { fill } else { None })
        }
        Shape::Path { path, stroke, stroke_width } => {
            let color = parse_color(stroke);
            let half = stroke_width / 2.0;
            let points = path.clone();
            Box::new(move |x, y| if near_polyline(&points, x, y, half) { color } else { None })
        }
        Shape::Image { src, width, height } => {
            decoded = match decode_data_url(src) {
                Some(img) => img,
                None => {
                    debug!(id = %d.id, "image source is not a decodable data URL; skipping");
                    return;
                }
            };
            let (w, h) = (*width, *height);
            let img = &decoded;
            Box::new(move |x, y| sample_image(img, x, y, w, h))
        }
        Shape::Text { .. } => {
            debug!(id = %d.id, "text glyphs are not rasterized");
            return;
        }
    };

    let transform = Transform::of(d);
    let Some((x0, y0, x1, y1)) = pixel_bounds(pixels, transform, d.shape.local_bounds()) else {
        return;
    };
    for py in y0..y1 {
        for px in x0..x1 {
            let Some((lx, ly)) = transform.to_local(f64::from(px) + 0.5, f64::from(py) + 0.5) else {
                continue;
            };
            if let Some(color) = sampler(lx, ly) {
                blend(pixels.get_pixel_mut(px, py), color);
            }
        }
    }
}

fn pixel_bounds(pixels: &RgbaImage, t: Transform, local: (f64, f64, f64, f64)) -> Option<(u32, u32, u32, u32)> {
    let (lx0, ly0, lx1, ly1) = local;
    let corners = [t.to_world(lx0, ly0), t.to_world(lx1, ly0), t.to_world(lx0, ly1), t.to_world(lx1, ly1)];
    let min_x = corners.iter().map(|c| c.0).fold(f64::MAX, f64::min).floor().max(0.0);
    let min_y = corners.iter().map(|c| c.1).fold(f64::MAX, f64::min).floor().max(0.0);
    let max_x = corners.iter().map(|c| c.0).fold(f64::MIN, f64::max).ceil().min(f64::from(pixels.width()));
    let max_y = corners.iter().map(|c| c.1).fold(f64::MIN, f64::max).ceil().min(f64::from(pixels.height()));
    if !(min_x < max_x && min_y < max_y) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    Some((min_x as u32, min_y as u32, max_x as u32, max_y as u32))
}

fn near_polyline(points: &[PathPoint], x: f64, y: f64, half_width: f64) -> bool {
    match points {
        [] => false,
        [only] => (x - only.x).hypot(y - only.y) <= half_width,
        _ => points.windows(2).any(|seg| segment_distance(seg[0], seg[1], x, y) <= half_width),
    }
}

fn segment_distance(a: PathPoint, b: PathPoint, x: f64, y: f64) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    let len_sq = dx * dx + dy * dy;
    if len_sq == 0.0 {
        return (x - a.x).hypot(y - a.y);
    }
    let t = (((x - a.x) * dx + (y - a.y) * dy) / len_sq).clamp(0.0, 1.0);
    (x - (a.x + t * dx)).hypot(y - (a.y + t * dy))
}

fn sample_image(img: &RgbaImage, x: f64, y: f64, w: f64, h: f64) -> Option<Rgba<u8>> {
    if !((0.0..w).contains(&x) && (0.0..h).contains(&y)) {
        return None;
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    let (ix, iy) = (
        ((x / w) * f64::from(img.width())) as u32,
        ((y / h) * f64::from(img.height())) as u32,
    );
    Some(*img.get_pixel(ix.min(img.width() - 1), iy.min(img.height() - 1)))
}

fn decode_data_url(src: &str) -> Option<RgbaImage> {
    let (header, payload) = src.strip_prefix("data:")?.split_once(',')?;
    if !header.ends_with(";base64") {
        return None;
    }
    let bytes = match general_purpose::STANDARD.decode(payload) {
        Ok(bytes) => bytes,
        Err(e) => {
            debug!(error = %e, "image data URL is not valid base64");
            return None;
        }
    };
    match image::load_from_memory(&bytes) {
        Ok(img) if img.width() > 0 && img.height() > 0 => Some(img.to_rgba8()),
        Ok(_) => None,
        Err(e) => {
            debug!(error = %e, "image data URL could not be decoded");
            None
        }
    }
}

/// Source-over compositing of `src` onto `dst`.
fn blend(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    let sa = f64::from(src[3]) / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = f64::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let c = (f64::from(src[i]) * sa + f64::from(dst[i]) * da * (1.0 - sa)) / out_a;
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        {
            dst[i] = c.round().clamp(0.0, 255.0) as u8;
        }
    }
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    }
}

/// Parse a CSS hex color (`#rgb`, `#rrggbb`, `#rrggbbaa`) or one of the few
/// keywords the profile editor emits.
#[must_use]
pub fn parse_color(raw: &str) -> Option<Rgba<u8>> {
    let raw = raw.trim();
    match raw.to_ascii_lowercase().as_str() {
        "transparent" => return Some(Rgba([0, 0, 0, 0])),
        "white" => return Some(Rgba([255, 255, 255, 255])),
        "black" => return Some(Rgba([0, 0, 0, 255])),
        _ => {}
    }
    let hex = raw.strip_prefix('#')?;
    if !hex.is_ascii() {
        return None;
    }
    let channel = |s: &str| u8::from_str_radix(s, 16);
    let parsed = match hex.len() {
        3 => {
            let expand = |i: usize| channel(&hex[i..=i].repeat(2));
            (expand(0), expand(1), expand(2), Ok(255))
        }
        6 => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]), Ok(255)),
        8 => (channel(&hex[0..2]), channel(&hex[2..4]), channel(&hex[4..6]), channel(&hex[6..8])),
        _ => return None,
    };
    match parsed {
        (Ok(r), Ok(g), Ok(b), Ok(a)) => Some(Rgba([r, g, b, a])),
        _ => None,
    }
}
