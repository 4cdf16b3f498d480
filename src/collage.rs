//! Collage composition: tiles every stored drawing into one PNG grid.

use crate::storage::DrawingStore;
use crate::{Error, Result};
use futures::future::try_join_all;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use log::{debug, info};
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Default edge length of a collage cell, in pixels.
pub const DEFAULT_CELL_SIZE: u32 = 200;

/// Largest cell edge a server configuration accepts.
pub const MAX_CELL_SIZE: u32 = 4096;

/// Opaque white.
pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Rendering options for [`CollageComposer`].
#[derive(Debug, Clone, PartialEq)]
pub struct CollageOptions {
    /// Edge length of each square cell
    pub cell_size: u32,
    /// Fill for every canvas pixel not covered by a drawing
    pub background: Rgba<u8>,
}

impl Default for CollageOptions {
    fn default() -> Self {
        Self {
            cell_size: DEFAULT_CELL_SIZE,
            background: WHITE,
        }
    }
}

/// Column/row count of a collage grid.
///
/// Columns are chosen first as `ceil(sqrt(n))`, then just enough rows to hold
/// `n` cells, so the grid is never taller than it is wide.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub cols: u32,
    pub rows: u32,
}

impl GridLayout {
    pub fn for_count(n: usize) -> Self {
        if n == 0 {
            return Self { cols: 0, rows: 0 };
        }
        // Float sqrt can be off by one for large n; settle on the exact ceiling.
        let mut cols = (n as f64).sqrt().ceil() as usize;
        while cols > 1 && (cols - 1) * (cols - 1) >= n {
            cols -= 1;
        }
        while cols * cols < n {
            cols += 1;
        }
        let rows = n.div_ceil(cols);
        Self {
            cols: cols as u32,
            rows: rows as u32,
        }
    }

    /// Number of cells in the grid, filled or not.
    pub fn capacity(&self) -> usize {
        self.cols as usize * self.rows as usize
    }

    /// Top-left pixel of cell `index`, filling left-to-right, top-to-bottom.
    pub fn cell_origin(&self, index: usize, cell_size: u32) -> (u32, u32) {
        let cols = self.cols.max(1) as usize;
        let col = (index % cols) as u32;
        let row = (index / cols) as u32;
        (col * cell_size, row * cell_size)
    }

    /// Canvas dimensions for the given cell size, or `None` if either side
    /// overflows `u32`.
    pub fn canvas_size(&self, cell_size: u32) -> Option<(u32, u32)> {
        Some((self.cols.checked_mul(cell_size)?, self.rows.checked_mul(cell_size)?))
    }
}

// RGBA buffer length must be addressable.
fn fits_in_memory(width: u32, height: u32) -> bool {
    (u64::from(width) * u64::from(height))
        .checked_mul(4)
        .and_then(|len| usize::try_from(len).ok())
        .is_some()
}

/// A composed collage, PNG-encoded.
#[derive(Debug, Clone)]
pub struct Collage {
    pub width: u32,
    pub height: u32,
    pub layout: GridLayout,
    pub png_data: Vec<u8>,
}

/// Scale `image` uniformly until it covers a `cell × cell` square, then crop
/// the centred overflow. Aspect ratio is preserved and nothing is letterboxed.
pub fn cover_crop(image: &DynamicImage, cell: u32) -> DynamicImage {
    image.resize_to_fill(cell, cell, FilterType::Lanczos3)
}

/// Paint already-decoded drawings into a grid and encode it as PNG.
///
/// Drawings are placed in slice order; image `i` lands in cell
/// `(i mod cols, i div cols)`. Transparent regions blend over the background.
pub fn compose_images(images: &[DynamicImage], options: &CollageOptions) -> Result<Collage> {
    if images.is_empty() {
        return Err(Error::NotFound("No drawings found".into()));
    }
    if options.cell_size == 0 {
        return Err(Error::ConfigError("cell size must be positive".into()));
    }

    let layout = GridLayout::for_count(images.len());
    let (width, height) = layout
        .canvas_size(options.cell_size)
        .filter(|&(w, h)| fits_in_memory(w, h))
        .ok_or_else(|| {
            Error::ConfigError(format!(
                "{}x{} grid of {} px cells is too large",
                layout.cols, layout.rows, options.cell_size
            ))
        })?;
    let mut canvas = RgbaImage::from_pixel(width, height, options.background);

    for (i, image) in images.iter().enumerate() {
        let cell = cover_crop(image, options.cell_size).to_rgba8();
        let (x, y) = layout.cell_origin(i, options.cell_size);
        imageops::overlay(&mut canvas, &cell, i64::from(x), i64::from(y));
    }

    let png_data = encode_png(canvas)?;
    debug!(
        "Composed {} drawings into {}x{} grid ({}x{} px)",
        images.len(),
        layout.cols,
        layout.rows,
        width,
        height
    );
    Ok(Collage {
        width,
        height,
        layout,
        png_data,
    })
}

fn encode_png(canvas: RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::EncodingFailure(e.to_string()))?;
    Ok(buf)
}

/// Read and decode a single drawing from disk.
pub fn load_drawing(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path)
        .map_err(|e| Error::StorageFailure(format!("Failed to read {}: {}", path.display(), e)))?;
    image::load_from_memory(&bytes)
        .map_err(|e| Error::DecodeFailure(format!("{}: {}", path.display(), e)))
}

/// Decode every path on the blocking pool concurrently.
///
/// Results keep the order of `paths`; the first failure aborts the whole load.
pub async fn load_all(paths: Vec<PathBuf>) -> Result<Vec<DynamicImage>> {
    let loads = paths.into_iter().map(|path| async move {
        tokio::task::spawn_blocking(move || load_drawing(&path)).await?
    });
    try_join_all(loads).await
}

/// Builds collages from the current contents of a [`DrawingStore`].
#[derive(Debug, Clone)]
pub struct CollageComposer {
    store: DrawingStore,
    options: CollageOptions,
}

impl CollageComposer {
    pub fn new(store: DrawingStore, options: CollageOptions) -> Self {
        Self { store, options }
    }

    pub fn options(&self) -> &CollageOptions {
        &self.options
    }

    /// Compose every drawing currently in the store.
    ///
    /// Fails with [`Error::NotFound`] when the store holds no `.png` entries
    /// and with [`Error::DecodeFailure`] if any single drawing is unreadable.
    pub async fn compose(&self) -> Result<Collage> {
        let store = self.store.clone();
        let paths = tokio::task::spawn_blocking(move || store.list()).await??;
        if paths.is_empty() {
            return Err(Error::NotFound("No drawings found".into()));
        }

        let count = paths.len();
        let images = load_all(paths).await?;
        let options = self.options.clone();
        let collage = tokio::task::spawn_blocking(move || compose_images(&images, &options)).await??;

        info!(
            "Built collage of {} drawings ({}x{})",
            count, collage.width, collage.height
        );
        Ok(collage)
    }
}
