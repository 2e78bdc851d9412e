use std::fs;
use std::io::Cursor;
use std::path::PathBuf;
use std::time::Duration;

use httpmock::{Method::GET, MockServer};
use shelfbot::pipeline::{run, Options};

const LISTING: &str = r#"<!DOCTYPE html>
<html>
<head><title>Swag Labs</title></head>
<body>
<div class="inventory_container">
  <div class="inventory_item">
    <img class="inventory_item_img" src="/static/media/sauce-backpack.png" alt="Sauce Labs Backpack">
    <div class="inventory_item_name">Sauce Labs Backpack</div>
    <div class="inventory_item_desc">carry.allTheThings() with the sleek, streamlined Sly Pack.</div>
    <div class="inventory_item_price">$29.99</div>
  </div>
  <div class="inventory_item">
    <img class="inventory_item_img" src="/static/media/bike-light.png" alt="Sauce Labs Bike Light">
    <div class="inventory_item_name">Sauce Labs Bike Light</div>
    <div class="inventory_item_desc">A red light isn't the desired state in nearly any situation.</div>
    <div class="inventory_item_price">$9.99</div>
  </div>
</div>
</body>
</html>"#;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([20, 90, 160, 255]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

fn options(base_url: String, out_dir: PathBuf) -> Options {
    Options {
        base_url,
        out_dir,
        browser_path: None,
        headless: true,
        log_requests: false,
        wait_timeout: Duration::from_secs(5),
    }
}

#[tokio::test]
async fn cached_listing_exports_workbook_and_images() {
    let server = MockServer::start();
    let backpack = server.mock(|when, then| {
        when.method(GET).path("/static/media/sauce-backpack.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(png_bytes(12, 16));
    });
    let bike_light = server.mock(|when, then| {
        when.method(GET).path("/static/media/bike-light.png");
        then.status(200)
            .header("content-type", "image/png")
            .body(png_bytes(8, 20));
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    fs::write(out_dir.join("out.html"), LISTING).unwrap();

    let opts = options(server.base_url(), out_dir.clone());
    let summary = run(&opts).await.expect("run");

    assert!(summary.html_cached);
    assert_eq!(summary.products, 2);
    assert_eq!(summary.images_downloaded, 2);
    assert!(out_dir.join("download/sauce-backpack.png").exists());
    assert!(out_dir.join("download/bike-light.png").exists());
    let workbook = fs::metadata(out_dir.join("out.xlsx")).expect("workbook missing");
    assert!(workbook.len() > 512, "workbook too small");
    backpack.assert();
    bike_light.assert();

    // Rerun with everything already on disk: no re-fetches, same artifacts.
    let summary = run(&opts).await.expect("second run");
    assert!(summary.html_cached);
    assert_eq!(summary.products, 2);
    assert_eq!(summary.images_downloaded, 0);
    assert_eq!(backpack.hits(), 1);
    assert_eq!(bike_light.hits(), 1);
}

#[tokio::test]
async fn download_failure_aborts_the_run() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/static/media/sauce-backpack.png");
        then.status(500);
    });

    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    fs::write(out_dir.join("out.html"), LISTING).unwrap();

    let result = run(&options(server.base_url(), out_dir.clone())).await;
    assert!(result.is_err());
    // The interrupted run leaves no workbook behind.
    assert!(!out_dir.join("out.xlsx").exists());
}

#[tokio::test]
async fn malformed_listing_fails_extraction() {
    let dir = tempfile::tempdir().expect("tempdir");
    let out_dir = dir.path().join("out");
    fs::create_dir_all(&out_dir).unwrap();
    let broken = LISTING.replace(r#"<div class="inventory_item_name">Sauce Labs Backpack</div>"#, "");
    fs::write(out_dir.join("out.html"), broken).unwrap();

    let result = run(&options("http://127.0.0.1:9".into(), out_dir)).await;
    assert!(result.is_err());
}
