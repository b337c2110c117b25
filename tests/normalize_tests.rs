// SPDX-License-Identifier: GPL-3.0-only

//! Integration tests for normalizing imported image files

use curio::errors::PhotoError;
use curio::pipelines::photo::{EncodingFormat, ImageNormalizer, NormalizedImage};
use std::io::Cursor;

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let mut bytes = Vec::new();
    image::RgbImage::from_pixel(width, height, image::Rgb([10, 200, 30]))
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap();
    bytes
}

#[tokio::test]
async fn test_large_file_bounded_to_1024_jpeg() {
    let image = ImageNormalizer::new()
        .normalize_file(png_bytes(2000, 1500), Some("image/png".into()))
        .await
        .unwrap();

    assert_eq!(image.format(), EncodingFormat::Jpeg);
    assert_eq!((image.width(), image.height()), (1024, 768));
    assert!(image.data_url().starts_with("data:image/jpeg;base64,"));
}

#[tokio::test]
async fn test_small_file_keeps_size() {
    let image = ImageNormalizer::new()
        .normalize_file(png_bytes(300, 500), None)
        .await
        .unwrap();

    assert_eq!((image.width(), image.height()), (300, 500));
    let parsed = NormalizedImage::parse(image.data_url()).unwrap();
    assert_eq!(parsed.format(), EncodingFormat::Jpeg);
}

#[tokio::test]
async fn test_unreadable_file_is_a_decode_error() {
    let result = ImageNormalizer::new()
        .normalize_file(b"definitely not an image".to_vec(), Some("image/png".into()))
        .await;
    assert!(matches!(result, Err(PhotoError::ImageDecode(_))));
}

#[tokio::test]
async fn test_truncated_png_is_a_decode_error() {
    let png = png_bytes(64, 64);
    for cut in [8, 30, 163.min(png.len() - 1)] {
        let result = ImageNormalizer::new()
            .normalize_file(png[..cut].to_vec(), Some("image/png".into()))
            .await;
        assert!(
            matches!(result, Err(PhotoError::ImageDecode(_))),
            "cut at {cut}: {result:?}"
        );
    }
}

#[tokio::test]
async fn test_missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = ImageNormalizer::new()
        .normalize_path(&dir.path().join("nope.jpg"))
        .await;
    assert!(matches!(result, Err(PhotoError::ReadFailed(_))));
}

#[tokio::test]
async fn test_normalize_path_reads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("photo.png");
    std::fs::write(&path, png_bytes(1200, 400)).unwrap();

    let image = ImageNormalizer::new()
        .with_max_dimension(600)
        .normalize_path(&path)
        .await
        .unwrap();
    assert_eq!((image.width(), image.height()), (600, 200));
}
