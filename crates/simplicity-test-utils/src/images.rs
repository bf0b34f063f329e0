use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

fn sample(width: u32, height: u32, format: ImageFormat) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, format)
        .expect("failed to encode sample image");
    out.into_inner()
}

/// A gradient PNG of the given size.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    sample(width, height, ImageFormat::Png)
}

/// A gradient JPEG of the given size.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    sample(width, height, ImageFormat::Jpeg)
}
