use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, ensure, Context, Result};
use log::{debug, info};
use rust_xlsxwriter::{Image, Workbook};
use url::Url;

use crate::extract::{Product, HEADER};

/// Target cell size for embedded thumbnails, in pixels.
const CELL_WIDTH: f64 = 128.0;
const CELL_HEIGHT: f64 = 192.0;
/// Forced after autofit so the bitmaps line up with their cells.
const IMAGE_COL_WIDTH: f64 = 17.6;
const ROW_HEIGHT: f64 = 0.75 * CELL_HEIGHT;

/// File name an image source path is stored under locally.
pub fn image_basename(src: &str) -> Result<String> {
    src.rsplit('/')
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .ok_or_else(|| anyhow!("image source {src:?} has no file name"))
}

/// Resolve `src` against the site base URL and download it into
/// `download_dir`, keyed by the basename of the source path. An existing
/// file is not re-fetched. Returns the local path and whether a fetch
/// actually happened.
pub async fn fetch_image(
    client: &reqwest::Client,
    base_url: &str,
    src: &str,
    download_dir: &Path,
) -> Result<(PathBuf, bool)> {
    let target = download_dir.join(image_basename(src)?);
    if target.exists() {
        debug!("already downloaded: {}", target.display());
        return Ok((target, false));
    }

    let url = Url::parse(base_url)
        .and_then(|base| base.join(src))
        .with_context(|| format!("bad image URL {base_url}{src}"))?;
    let bytes = client
        .get(url.clone())
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await
        .with_context(|| format!("download {url}"))?;
    fs::write(&target, &bytes).with_context(|| format!("write {}", target.display()))?;
    info!("downloaded {} ({} bytes)", target.display(), bytes.len());
    Ok((target, true))
}

/// Write the scraped rows into a single-sheet workbook, replacing each image
/// URL with its downloaded bitmap scaled to the target cell size.
pub fn write_workbook(
    products: &[Product],
    image_paths: &[PathBuf],
    out_path: &Path,
) -> Result<()> {
    ensure!(
        products.len() == image_paths.len(),
        "{} products but {} images",
        products.len(),
        image_paths.len()
    );

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Sheet")?;

    for (col, title) in HEADER.iter().enumerate() {
        sheet.write_string(0, col as u16, *title)?;
    }

    for (i, product) in products.iter().enumerate() {
        let row = (i + 1) as u32;
        sheet.write_string(row, 1, product.name.as_str())?;
        sheet.write_string(row, 2, product.description.as_str())?;
        sheet.write_string(row, 3, product.price.as_str())?;

        let path = &image_paths[i];
        let (width, height) = image::image_dimensions(path)
            .with_context(|| format!("unreadable image {}", path.display()))?;
        let thumbnail = Image::new(path)?
            .set_scale_width(CELL_WIDTH / f64::from(width))
            .set_scale_height(CELL_HEIGHT / f64::from(height));
        sheet.insert_image(row, 0, &thumbnail)?;
        sheet.write_string(row, 0, "")?;
    }

    sheet.autofit();
    sheet.set_column_width(0, IMAGE_COL_WIDTH)?;
    for i in 0..products.len() {
        sheet.set_row_height((i + 1) as u32, ROW_HEIGHT)?;
    }

    workbook.save(out_path)?;
    info!("workbook written to {}", out_path.display());
    Ok(())
}
