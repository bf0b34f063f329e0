use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};

use simplicity_core::{ByteStream, SimplicityError, SimplicityResult, collect_stream};

use crate::format::{Container, Format};

/// Quality used for every lossy encoding.
pub const JPEG_QUALITY: u8 = 85;

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// How an image is fitted into a sized format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResizeStrategy {
    /// Scale to fit inside the box and center on a white canvas.
    #[default]
    Letterbox,
    /// Scale to cover the box and center-crop the overflow.
    CropToFill,
}

impl ResizeStrategy {
    pub fn apply(&self, img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
        match self {
            ResizeStrategy::Letterbox => letterbox(img, width, height),
            ResizeStrategy::CropToFill => img.resize_to_fill(width, height, FilterType::CatmullRom),
        }
    }
}

fn letterbox(img: &DynamicImage, width: u32, height: u32) -> DynamicImage {
    let (orig_w, orig_h) = img.dimensions();
    let scale = f64::min(
        width as f64 / orig_w as f64,
        height as f64 / orig_h as f64,
    );
    let new_w = ((orig_w as f64 * scale).ceil() as u32).clamp(1, width);
    let new_h = ((orig_h as f64 * scale).ceil() as u32).clamp(1, height);

    let scaled = img.resize_exact(new_w, new_h, FilterType::CatmullRom).to_rgba8();
    let mut canvas = RgbaImage::from_pixel(width, height, BACKGROUND);
    imageops::overlay(
        &mut canvas,
        &scaled,
        i64::from((width - new_w) / 2),
        i64::from((height - new_h) / 2),
    );
    DynamicImage::ImageRgba8(canvas)
}

/// Converts an image between two formats.
pub trait Transcoder: Send + Sync + 'static {
    fn transcode(
        &self,
        input: &Format,
        output: &Format,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
    ) -> SimplicityResult<()>;
}

/// Decode, resize when the output format is sized, then re-encode.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultTranscoder {
    strategy: ResizeStrategy,
}

impl DefaultTranscoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strategy(strategy: ResizeStrategy) -> Self {
        Self { strategy }
    }
}

impl Transcoder for DefaultTranscoder {
    fn transcode(
        &self,
        input: &Format,
        output: &Format,
        reader: &mut dyn Read,
        writer: &mut dyn Write,
    ) -> SimplicityResult<()> {
        check_formats(input, output)?;
        tracing::debug!(input = input.name, output = output.name, "transcoding image");

        let mut img = decode(input.container, reader)?;
        if output.has_size() {
            img = self.strategy.apply(&img, output.width, output.height);
        }
        encode(output.container, &img, writer)
    }
}

/// Rejections shared by every transcoder.
pub fn check_formats(input: &Format, output: &Format) -> SimplicityResult<()> {
    if input == output {
        return Err(SimplicityError::IdenticalFormats);
    }
    if output.is_source() || output.container == Container::Data {
        return Err(SimplicityError::SourceOutput);
    }
    Ok(())
}

fn image_format(container: Container) -> SimplicityResult<ImageFormat> {
    match container {
        Container::Jpeg => Ok(ImageFormat::Jpeg),
        Container::Png => Ok(ImageFormat::Png),
        Container::Data => Err(SimplicityError::UnsupportedEncoding(
            container.ext().to_string(),
        )),
    }
}

fn decode(container: Container, reader: &mut dyn Read) -> SimplicityResult<DynamicImage> {
    let format = image_format(container)?;
    let mut buf = Vec::new();
    reader
        .read_to_end(&mut buf)
        .map_err(|e| SimplicityError::Transcode(format!("failed to read image: {e}")))?;
    image::load_from_memory_with_format(&buf, format)
        .map_err(|e| SimplicityError::Transcode(format!("failed to decode image: {e}")))
}

fn encode(container: Container, img: &DynamicImage, writer: &mut dyn Write) -> SimplicityResult<()> {
    let result = match image_format(container)? {
        ImageFormat::Jpeg => img
            .to_rgb8()
            .write_with_encoder(JpegEncoder::new_with_quality(writer, JPEG_QUALITY)),
        _ => img.write_with_encoder(PngEncoder::new(writer)),
    };
    result.map_err(|e| SimplicityError::Transcode(format!("failed to encode image: {e}")))
}

/// Lazily transcode `body` into a new stream. Nothing runs until the result
/// is polled; the codec work happens on the blocking pool and any failure is
/// delivered as the stream's error item.
pub fn transcode_stream(
    transcoder: Arc<dyn Transcoder>,
    input: Format,
    output: Format,
    body: ByteStream,
) -> ByteStream {
    Box::pin(stream::once(async move {
        let data = collect_stream(body).await?;
        tokio::task::spawn_blocking(move || {
            let mut out = Vec::new();
            transcoder.transcode(&input, &output, &mut &data[..], &mut out)?;
            Ok::<_, SimplicityError>(Bytes::from(out))
        })
        .await
        .map_err(|e| SimplicityError::InternalError(format!("transcode task failed: {e}")))?
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CANONICAL, SOURCE, WEB_STD, WEB_THUMB_SQ};
    use image::{Rgb, RgbImage};
    use simplicity_core::stream_from_bytes;

    fn png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb(color));
        let mut out = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_with_encoder(PngEncoder::new(&mut out))
            .unwrap();
        out
    }

    fn run(input: &Format, output: &Format, data: &[u8]) -> SimplicityResult<Vec<u8>> {
        let mut out = Vec::new();
        DefaultTranscoder::new().transcode(input, output, &mut &data[..], &mut out)?;
        Ok(out)
    }

    fn dimensions(data: &[u8]) -> (u32, u32) {
        image::load_from_memory(data).unwrap().dimensions()
    }

    #[test]
    fn identical_formats_are_rejected_before_decoding() {
        for format in [SOURCE, CANONICAL, WEB_STD] {
            assert!(matches!(
                run(&format, &format, b"not an image"),
                Err(SimplicityError::IdenticalFormats)
            ));
        }
    }

    #[test]
    fn source_is_never_an_output() {
        let inbound = Format::inbound(Container::Jpeg);
        for input in [inbound, CANONICAL, WEB_THUMB_SQ] {
            assert!(matches!(
                run(&input, &SOURCE, &png(2, 2, [0, 0, 0])),
                Err(SimplicityError::SourceOutput)
            ));
        }
    }

    #[test]
    fn opaque_input_is_unsupported() {
        assert!(matches!(
            run(&SOURCE, &CANONICAL, &png(2, 2, [0, 0, 0])),
            Err(SimplicityError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn garbage_fails_to_decode() {
        let inbound = Format::inbound(Container::Jpeg);
        assert!(matches!(
            run(&inbound, &CANONICAL, b"0123456789"),
            Err(SimplicityError::Transcode(_))
        ));
    }

    #[test]
    fn unsized_output_keeps_dimensions() {
        let inbound = Format::inbound(Container::Png);
        let out = run(&inbound, &CANONICAL, &png(37, 21, [10, 20, 30])).unwrap();
        assert_eq!(&out[..8], &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]);
        assert_eq!(dimensions(&out), (37, 21));
    }

    #[test]
    fn sized_output_is_jpeg_of_target_box() {
        let out = run(&CANONICAL, &WEB_THUMB_SQ, &png(300, 100, [200, 0, 0])).unwrap();
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        assert_eq!(dimensions(&out), (400, 400));

        let out = run(&CANONICAL, &WEB_STD, &png(64, 64, [0, 200, 0])).unwrap();
        assert_eq!(dimensions(&out), (1280, 853));
    }

    #[test]
    fn letterbox_pads_with_white() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])));
        let boxed = ResizeStrategy::Letterbox.apply(&img, 100, 100).to_rgba8();
        assert_eq!(boxed.dimensions(), (100, 100));
        assert_eq!(boxed.get_pixel(50, 2), &BACKGROUND);
        assert_eq!(boxed.get_pixel(50, 97), &BACKGROUND);
        assert_eq!(boxed.get_pixel(50, 50), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn crop_to_fill_covers_the_box() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 100, Rgb([0, 0, 0])));
        let filled = ResizeStrategy::CropToFill.apply(&img, 100, 100).to_rgba8();
        assert_eq!(filled.dimensions(), (100, 100));
        assert_eq!(filled.get_pixel(50, 2), &Rgba([0, 0, 0, 255]));
        assert_eq!(filled.get_pixel(0, 0), &Rgba([0, 0, 0, 255]));
    }

    #[test]
    fn transcoder_uses_configured_strategy() {
        let data = png(300, 100, [0, 0, 0]);
        let top_edge = |transcoder: DefaultTranscoder| {
            let mut out = Vec::new();
            transcoder
                .transcode(&CANONICAL, &WEB_THUMB_SQ, &mut &data[..], &mut out)
                .unwrap();
            let img = image::load_from_memory(&out).unwrap().to_rgb8();
            assert_eq!(img.dimensions(), (400, 400));
            img.get_pixel(200, 5)[0]
        };

        // Letterbox leaves white bands above and below a wide image.
        assert!(top_edge(DefaultTranscoder::new()) > 200);
        assert!(top_edge(DefaultTranscoder::with_strategy(ResizeStrategy::CropToFill)) < 50);
    }

    #[tokio::test]
    async fn stream_transcode_is_lazy_and_reports_errors() {
        let transcoder: Arc<dyn Transcoder> = Arc::new(DefaultTranscoder::new());
        let inbound = Format::inbound(Container::Png);

        let out = transcode_stream(
            Arc::clone(&transcoder),
            inbound,
            CANONICAL,
            stream_from_bytes(png(5, 4, [1, 2, 3])),
        );
        let data = collect_stream(out).await.unwrap();
        assert_eq!(dimensions(&data), (5, 4));

        let out = transcode_stream(
            transcoder,
            inbound,
            CANONICAL,
            stream_from_bytes(&b"nope"[..]),
        );
        assert!(matches!(
            collect_stream(out).await,
            Err(SimplicityError::Transcode(_))
        ));
    }
}
