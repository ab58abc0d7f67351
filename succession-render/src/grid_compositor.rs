//! Diagnostic keyframe grid
//!
//! Lays every persisted keyframe out as a thumbnail cell with an annotation
//! band underneath, row-major, `columns` cells per row.

use crate::glyphs::{draw_text, GLYPH_HEIGHT};
use crate::{Error, Result};
use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};
use log::{debug, info};
use std::path::{Path, PathBuf};
use succession_core::artifact::write_png_atomic;
use succession_core::{DiagnosticCell, DiagnosticsSink, SegmentationConfig, GRID_FILENAME};

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const BAND: Rgb<u8> = Rgb([32, 32, 32]);
const TEXT: Rgb<u8> = Rgb([255, 255, 255]);

/// Annotation lines per cell
const ANNOTATION_LINES: u32 = 4;

/// Renders the keyframe grid of one video
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridRenderer {
    columns: usize,
    cell_size: u32,
}

impl GridRenderer {
    /// Creates a renderer with `columns` cells per row, each thumbnail fitting
    /// in a `cell_size` square
    pub fn new(columns: usize, cell_size: u32) -> Result<Self> {
        if columns == 0 {
            return Err(Error::InvalidGrid("columns must be at least 1".to_string()));
        }
        if cell_size == 0 {
            return Err(Error::InvalidGrid("cell size must be at least 1".to_string()));
        }
        Ok(Self { columns, cell_size })
    }

    pub fn from_config(config: &SegmentationConfig) -> Result<Self> {
        Self::new(config.grid_columns, config.grid_cell_size)
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    /// Rows needed for `count` cells
    pub fn rows_for(&self, count: usize) -> usize {
        count.div_ceil(self.columns)
    }

    fn text_scale(&self) -> u32 {
        (self.cell_size / 128).max(1)
    }

    fn line_height(&self) -> u32 {
        (GLYPH_HEIGHT + 3) * self.text_scale()
    }

    fn band_height(&self) -> u32 {
        ANNOTATION_LINES * self.line_height() + 2 * self.text_scale()
    }

    /// Full height of one cell, thumbnail plus annotation band
    pub fn cell_height(&self) -> u32 {
        self.cell_size + self.band_height()
    }

    /// Composes the grid image, or `None` when there are no cells
    pub fn compose(&self, cells: &[DiagnosticCell<'_>]) -> Option<RgbImage> {
        if cells.is_empty() {
            return None;
        }

        let rows = self.rows_for(cells.len()) as u32;
        let width = self.columns as u32 * self.cell_size;
        let height = rows * self.cell_height();
        let mut grid = RgbImage::from_pixel(width, height, BACKGROUND);

        for (position, cell) in cells.iter().enumerate() {
            let column = (position % self.columns) as u32;
            let row = (position / self.columns) as u32;
            self.draw_cell(
                &mut grid,
                cell,
                column * self.cell_size,
                row * self.cell_height(),
            );
        }

        Some(grid)
    }

    fn draw_cell(&self, grid: &mut RgbImage, cell: &DiagnosticCell<'_>, x: u32, y: u32) {
        let thumb = thumbnail(cell.image, self.cell_size);
        let offset_x = (self.cell_size - thumb.width()) / 2;
        let offset_y = (self.cell_size - thumb.height()) / 2;
        overlay_image(grid, &thumb, x + offset_x, y + offset_y);

        let band_top = y + self.cell_size;
        for py in band_top..band_top + self.band_height() {
            for px in x..x + self.cell_size {
                grid.put_pixel(px, py, BAND);
            }
        }

        let scale = self.text_scale();
        for (line, text) in annotations(cell).iter().enumerate() {
            let text_y = band_top + scale + line as u32 * self.line_height() + scale;
            draw_text(grid, text, x + 2 * scale, text_y, scale, TEXT);
        }
    }
}

impl DiagnosticsSink for GridRenderer {
    fn render(
        &self,
        output_dir: &Path,
        cells: &[DiagnosticCell<'_>],
    ) -> succession_core::Result<Option<PathBuf>> {
        let Some(grid) = self.compose(cells) else {
            debug!("No clear keyframes, skipping grid for {}", output_dir.display());
            return Ok(None);
        };

        let path = output_dir.join(GRID_FILENAME);
        write_png_atomic(&path, &grid)?;
        info!(
            "Wrote {}x{} keyframe grid ({} cells) to {}",
            grid.width(),
            grid.height(),
            cells.len(),
            path.display()
        );
        Ok(Some(path))
    }
}

/// Annotation lines of one cell, top to bottom
pub fn annotations(cell: &DiagnosticCell<'_>) -> [String; 4] {
    let successor = match cell.successor_value {
        Some(value) => format!("SUCC {:.3}", value),
        None => "SUCC N/A".to_string(),
    };
    [
        format!("SEGMENT {}", cell.segment_label),
        successor,
        format!("T {:.2}", cell.record.timestamp),
        format!("FRAME {}", cell.record.index),
    ]
}

/// Scales `image` to fit a `size` square, keeping its aspect ratio
fn thumbnail(image: &RgbImage, size: u32) -> RgbImage {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return RgbImage::new(0, 0);
    }

    let scale = (size as f64 / width as f64).min(size as f64 / height as f64);
    let thumb_width = ((width as f64 * scale).round() as u32).clamp(1, size);
    let thumb_height = ((height as f64 * scale).round() as u32).clamp(1, size);
    imageops::resize(image, thumb_width, thumb_height, FilterType::Triangle)
}

/// Copies `overlay` onto `base` with its top-left corner at `(x, y)`,
/// clipping whatever falls outside `base`
fn overlay_image(base: &mut RgbImage, overlay: &RgbImage, x: u32, y: u32) {
    let visible_width = overlay.width().min(base.width().saturating_sub(x));
    let visible_height = overlay.height().min(base.height().saturating_sub(y));

    for src_y in 0..visible_height {
        for src_x in 0..visible_width {
            base.put_pixel(x + src_x, y + src_y, *overlay.get_pixel(src_x, src_y));
        }
    }
}
