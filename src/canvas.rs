use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgb as Pixel, RgbImage, RgbaImage};
use itertools::Itertools;
use rusttype::{point, Font, Scale};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{LayoutConfig, Rgb};
use crate::error::{Error, ErrorKind, Result};
use crate::text::{FontRole, TextMeasure};
use crate::weather::WeatherKind;

/// One placement on the poster. Coordinates are whole canvas pixels; text
/// positions are the top-left of the text run.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawOp {
    Fill {
        color: Rgb,
    },
    Text {
        x: i32,
        y: i32,
        role: FontRole,
        text: String,
        color: Rgb,
    },
    /// Filled ellipse inscribed in the given box.
    Ellipse {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Rgb,
    },
    Rect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        color: Rgb,
    },
    Icon {
        kind: WeatherKind,
        x: i32,
        y: i32,
        size: u32,
    },
}

/// Pixel drawing primitives the composer's instructions are replayed onto.
pub trait Canvas {
    fn fill(&mut self, color: Rgb);
    fn text(&mut self, x: i32, y: i32, role: FontRole, text: &str, color: Rgb);
    fn ellipse(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb);
    fn rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb);
    /// Returns `false` when no artwork exists for `kind`.
    fn icon(&mut self, kind: WeatherKind, x: i32, y: i32, size: u32) -> bool;
}

impl DrawOp {
    pub fn apply<C: Canvas + ?Sized>(&self, canvas: &mut C) {
        match self {
            DrawOp::Fill { color } => canvas.fill(*color),
            DrawOp::Text {
                x,
                y,
                role,
                text,
                color,
            } => canvas.text(*x, *y, *role, text, *color),
            DrawOp::Ellipse {
                x,
                y,
                width,
                height,
                color,
            } => canvas.ellipse(*x, *y, *width, *height, *color),
            DrawOp::Rect {
                x,
                y,
                width,
                height,
                color,
            } => canvas.rect(*x, *y, *width, *height, *color),
            DrawOp::Icon { kind, x, y, size } => {
                if !canvas.icon(*kind, *x, *y, *size) {
                    log::debug!("No icon artwork for {:?}, leaving slot empty", kind);
                }
            }
        }
    }
}

/// One TrueType face at the pixel sizes of each [`FontRole`].
pub struct FontSet {
    font: Font<'static>,
    sizes: HashMap<FontRole, f32>,
}

impl FontSet {
    pub fn load(path: &Path, layout: &LayoutConfig) -> Result<Self> {
        let bytes = fs::read(path).map_err(|err| {
            Error::new(
                ErrorKind::Font,
                &format!("Could not read '{}': {}", path.display(), err),
            )
        })?;
        let font = Font::try_from_vec(bytes).ok_or_else(|| {
            Error::new(
                ErrorKind::Font,
                &format!("'{}' is not a TrueType font", path.display()),
            )
        })?;

        let sizes = [
            (FontRole::Month, layout.month_font),
            (FontRole::Label, layout.label_font),
            (FontRole::Date, layout.date_font),
            (FontRole::Event, layout.event_font),
        ]
        .iter()
        .cloned()
        .collect();

        Ok(FontSet { font, sizes })
    }

    fn scale(&self, role: FontRole) -> Scale {
        Scale::uniform(self.sizes.get(&role).copied().unwrap_or(16.0))
    }
}

impl TextMeasure for FontSet {
    fn text_width(&self, role: FontRole, text: &str) -> f32 {
        let scale = self.scale(role);
        let mut width = 0.0;
        let mut previous = None;

        for glyph in self.font.glyphs_for(text.chars()) {
            let glyph = glyph.scaled(scale);
            if let Some(previous) = previous {
                width += self.font.pair_kerning(scale, previous, glyph.id());
            }
            width += glyph.h_metrics().advance_width;
            previous = Some(glyph.id());
        }

        width
    }

    fn line_height(&self, role: FontRole) -> f32 {
        let metrics = self.font.v_metrics(self.scale(role));
        metrics.ascent - metrics.descent
    }
}

/// Weather artwork keyed by kind, loaded from `<dir>/<kind>.png`.
#[derive(Default)]
pub struct IconSet {
    icons: HashMap<WeatherKind, RgbaImage>,
}

impl IconSet {
    /// Loads whatever artwork exists; absent or unreadable files are skipped.
    pub fn load(dir: &Path) -> Self {
        let mut icons = HashMap::new();

        for kind in WeatherKind::ALL_ICONS.iter() {
            let name = match kind.asset_name() {
                Some(name) => name,
                None => continue,
            };
            let path: PathBuf = dir.join(format!("{}.png", name));

            match image::open(&path) {
                Ok(img) => {
                    icons.insert(*kind, img.to_rgba8());
                }
                Err(err) => log::debug!("Icon '{}' unavailable: {}", path.display(), err),
            }
        }

        log::debug!(
            "Loaded weather icons: [{}]",
            icons.keys().map(|kind| format!("{:?}", kind)).sorted().join(", ")
        );

        IconSet { icons }
    }

    pub fn get(&self, kind: WeatherKind) -> Option<&RgbaImage> {
        self.icons.get(&kind)
    }
}

fn pixel(color: Rgb) -> Pixel<u8> {
    Pixel(color.0)
}

fn blend(dst: &mut Pixel<u8>, color: [u8; 3], alpha: f32) {
    let alpha = alpha.max(0.0).min(1.0);
    let inv = 1.0 - alpha;
    for c in 0..3 {
        dst.0[c] = (color[c] as f32 * alpha + dst.0[c] as f32 * inv).round() as u8;
    }
}

fn put(image: &mut RgbImage, x: i64, y: i64, color: [u8; 3], alpha: f32) {
    if x < 0 || y < 0 || x >= image.width() as i64 || y >= image.height() as i64 {
        return;
    }
    blend(image.get_pixel_mut(x as u32, y as u32), color, alpha);
}

pub(crate) fn fill_rect(image: &mut RgbImage, x: i32, y: i32, width: u32, height: u32, color: Rgb) {
    for py in y as i64..y as i64 + height as i64 {
        for px in x as i64..x as i64 + width as i64 {
            put(image, px, py, color.0, 1.0);
        }
    }
}

pub(crate) fn fill_ellipse(
    image: &mut RgbImage,
    x: i32,
    y: i32,
    width: u32,
    height: u32,
    color: Rgb,
) {
    if width == 0 || height == 0 {
        return;
    }

    let rx = width as f32 / 2.0;
    let ry = height as f32 / 2.0;
    let cx = x as f32 + rx;
    let cy = y as f32 + ry;

    for py in y as i64..y as i64 + height as i64 {
        for px in x as i64..x as i64 + width as i64 {
            let dx = (px as f32 + 0.5 - cx) / rx;
            let dy = (py as f32 + 0.5 - cy) / ry;
            if dx * dx + dy * dy <= 1.0 {
                put(image, px, py, color.0, 1.0);
            }
        }
    }
}

/// Alpha-blends `icon` with its top-left corner at `(x, y)`.
pub(crate) fn overlay_icon(image: &mut RgbImage, icon: &RgbaImage, x: i32, y: i32) {
    for (ix, iy, p) in icon.enumerate_pixels() {
        let alpha = p.0[3] as f32 / 255.0;
        if alpha <= 0.0 {
            continue;
        }
        put(
            image,
            x as i64 + ix as i64,
            y as i64 + iy as i64,
            [p.0[0], p.0[1], p.0[2]],
            alpha,
        );
    }
}

/// In-memory RGB raster backed by `image`, text rendered with `rusttype`.
pub struct RasterCanvas<'a> {
    image: RgbImage,
    fonts: &'a FontSet,
    icons: &'a IconSet,
}

impl<'a> RasterCanvas<'a> {
    pub fn new(width: u32, height: u32, fonts: &'a FontSet, icons: &'a IconSet) -> Self {
        RasterCanvas {
            image: RgbImage::new(width, height),
            fonts,
            icons,
        }
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }
}

impl Canvas for RasterCanvas<'_> {
    fn fill(&mut self, color: Rgb) {
        let color = pixel(color);
        for p in self.image.pixels_mut() {
            *p = color;
        }
    }

    fn text(&mut self, x: i32, y: i32, role: FontRole, text: &str, color: Rgb) {
        let fonts = self.fonts;
        let image = &mut self.image;
        let scale = fonts.scale(role);
        let ascent = fonts.font.v_metrics(scale).ascent;
        let start = point(x as f32, y as f32 + ascent);

        for glyph in fonts.font.layout(text, scale, start) {
            if let Some(bb) = glyph.pixel_bounding_box() {
                glyph.draw(|gx, gy, coverage| {
                    put(
                        image,
                        bb.min.x as i64 + gx as i64,
                        bb.min.y as i64 + gy as i64,
                        color.0,
                        coverage,
                    );
                });
            }
        }
    }

    fn ellipse(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb) {
        fill_ellipse(&mut self.image, x, y, width, height, color);
    }

    fn rect(&mut self, x: i32, y: i32, width: u32, height: u32, color: Rgb) {
        fill_rect(&mut self.image, x, y, width, height, color);
    }

    fn icon(&mut self, kind: WeatherKind, x: i32, y: i32, size: u32) -> bool {
        let icon = match self.icons.get(kind) {
            Some(icon) => icon,
            None => return false,
        };

        if icon.dimensions() == (size, size) {
            overlay_icon(&mut self.image, icon, x, y);
        } else {
            let scaled = imageops::resize(icon, size, size, FilterType::Lanczos3);
            overlay_icon(&mut self.image, &scaled, x, y);
        }

        true
    }
}

/// Writes `image` as PNG to `path`, creating parent directories. The file is
/// written next to the target first and then renamed over it.
pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let mut staging = path.as_os_str().to_owned();
    staging.push(".partial");
    let staging = PathBuf::from(staging);

    image.save_with_format(&staging, ImageFormat::Png)?;
    fs::rename(&staging, path)?;

    log::info!("Poster written to '{}'", path.display());
    Ok(())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    const RED: Rgb = Rgb([200, 0, 0]);

    /// DejaVu Sans, shipped under `testdata/` with its license.
    pub(crate) fn fixture_font() -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join("DejaVuSans.ttf")
    }

    fn fixture_fonts() -> FontSet {
        FontSet::load(&fixture_font(), &LayoutConfig::default()).unwrap()
    }

    #[test]
    fn font_metrics_follow_role_sizes() {
        let fonts = fixture_fonts();

        assert_eq!(fonts.text_width(FontRole::Date, ""), 0.0);
        assert!(fonts.text_width(FontRole::Date, "MMMM") > fonts.text_width(FontRole::Date, "iiii"));
        assert!(fonts.text_width(FontRole::Month, "12") > fonts.text_width(FontRole::Date, "12"));

        let date = fonts.line_height(FontRole::Date);
        assert!(date > 0.0);
        assert!(fonts.line_height(FontRole::Month) > date);
        assert!(fonts.line_height(FontRole::Event) < date);
    }

    #[test]
    fn text_is_rasterised_inside_its_run() {
        let fonts = fixture_fonts();
        let icons = IconSet::default();
        let mut canvas = RasterCanvas::new(120, 80, &fonts, &icons);
        canvas.fill(Rgb::WHITE);

        let width = fonts.text_width(FontRole::Date, "15").ceil() as u32;
        let height = fonts.line_height(FontRole::Date).ceil() as u32;
        canvas.text(20, 10, FontRole::Date, "15", RED);

        let image = canvas.image();
        let mut inked = 0;
        for (x, y, p) in image.enumerate_pixels() {
            if *p == Pixel([255, 255, 255]) {
                continue;
            }
            inked += 1;
            assert!(x >= 20 && x <= 20 + width, "ink at x={}", x);
            assert!(y >= 10 && y <= 10 + height, "ink at y={}", y);
        }

        assert!(inked > 0);
        assert!(image.pixels().any(|p| *p == Pixel([200, 0, 0])));
    }

    #[test]
    fn missing_icon_leaves_slot_empty() {
        let fonts = fixture_fonts();
        let icons = IconSet::default();
        let mut canvas = RasterCanvas::new(16, 16, &fonts, &icons);
        canvas.fill(Rgb::WHITE);

        assert!(!canvas.icon(WeatherKind::Sun, 0, 0, 16));
        assert!(canvas.image().pixels().all(|p| *p == Pixel([255, 255, 255])));
    }

    #[test]
    fn ellipse_stays_inside_its_box() {
        let mut image = RgbImage::new(20, 20);
        fill_ellipse(&mut image, 5, 5, 10, 10, RED);

        assert_eq!(*image.get_pixel(10, 10), Pixel([200, 0, 0]));
        assert_eq!(*image.get_pixel(5, 5), Pixel([0, 0, 0]));
        assert_eq!(*image.get_pixel(4, 10), Pixel([0, 0, 0]));
        assert_eq!(*image.get_pixel(15, 10), Pixel([0, 0, 0]));
    }

    #[test]
    fn shapes_are_clipped_to_the_canvas() {
        let mut image = RgbImage::new(4, 4);
        fill_rect(&mut image, -2, -2, 4, 4, RED);
        fill_ellipse(&mut image, 2, 2, 10, 10, RED);

        assert_eq!(*image.get_pixel(0, 0), Pixel([200, 0, 0]));
        assert_eq!(*image.get_pixel(2, 0), Pixel([0, 0, 0]));
    }

    #[test]
    fn transparent_icon_pixels_leave_background() {
        let mut image = RgbImage::from_pixel(2, 1, Pixel([255, 255, 255]));
        let mut icon = RgbaImage::new(2, 1);
        icon.put_pixel(0, 0, image::Rgba([0, 0, 0, 255]));
        icon.put_pixel(1, 0, image::Rgba([0, 0, 0, 0]));

        overlay_icon(&mut image, &icon, 0, 0);

        assert_eq!(*image.get_pixel(0, 0), Pixel([0, 0, 0]));
        assert_eq!(*image.get_pixel(1, 0), Pixel([255, 255, 255]));
    }

    #[test]
    fn icon_set_skips_missing_artwork() {
        let dir = tempfile::tempdir().unwrap();
        RgbaImage::new(8, 8).save(dir.path().join("sun.png")).unwrap();
        fs::write(dir.path().join("rain.png"), b"not a png").unwrap();

        let icons = IconSet::load(dir.path());

        assert!(icons.get(WeatherKind::Sun).is_some());
        assert!(icons.get(WeatherKind::Rain).is_none());
        assert!(icons.get(WeatherKind::Fog).is_none());
        assert!(icons.get(WeatherKind::None).is_none());
    }

    #[test]
    fn png_is_written_with_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("docs").join("latest.png");
        let image = RgbImage::from_pixel(3, 2, Pixel([1, 2, 3]));

        save_png(&image, &target).unwrap();
        save_png(&image, &target).unwrap();

        let written = image::open(&target).unwrap().to_rgb8();
        assert_eq!(written, image);
        assert!(!dir.path().join("docs").join("latest.png.partial").exists());
    }

    #[test]
    fn missing_font_is_reported() {
        let err = match FontSet::load(Path::new("/nonexistent/font.ttf"), &LayoutConfig::default()) {
            Err(err) => err,
            Ok(_) => panic!("font should not load"),
        };
        assert!(matches!(err.kind, ErrorKind::Font));
    }
}
