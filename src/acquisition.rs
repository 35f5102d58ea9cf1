//! Image acquisition: turns uploaded bytes, a URL or a camera capture into a
//! [`CanonicalImage`].

use crate::error::VqaError;
use image::ImageFormat;
use kornia_image::{Image, ImageSize, allocator::CpuAllocator};
use std::{io::Read, time::Duration};

/// In-memory 8-bit RGB image used by everything downstream of acquisition.
pub type CanonicalImage = Image<u8, 3, CpuAllocator>;

/// Upper bound on a single image fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest encoded image accepted from any source (20 MiB).
pub const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// Where the user's image comes from.
#[derive(Clone, Debug)]
pub enum ImageSource {
    /// Bytes of a locally uploaded file.
    Upload(Vec<u8>),
    /// Remote image fetched with an HTTP GET.
    Url(String),
    /// Bytes captured from a camera.
    Camera(Vec<u8>),
}

impl ImageSource {
    /// Returns the source kind as a string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSource::Upload(_) => "upload",
            ImageSource::Url(_) => "url",
            ImageSource::Camera(_) => "camera",
        }
    }
}

/// Decodes a JPEG, PNG, GIF or WebP container into a [`CanonicalImage`].
///
/// The container is detected from its magic bytes, not from a file name. Alpha,
/// grayscale, palette and 16-bit inputs are all flattened to 8-bit RGB.
/// Inputs larger than [`MAX_IMAGE_BYTES`] are rejected before decoding.
pub fn decode_image(bytes: &[u8]) -> Result<CanonicalImage, VqaError> {
    if bytes.is_empty() {
        return Err(VqaError::Decode("image data is empty".to_string()));
    }
    check_size(bytes.len(), MAX_IMAGE_BYTES)?;

    let format = image::guess_format(bytes).map_err(|e| VqaError::Decode(e.to_string()))?;
    if !matches!(
        format,
        ImageFormat::Jpeg | ImageFormat::Png | ImageFormat::Gif | ImageFormat::WebP
    ) {
        return Err(VqaError::Decode(format!(
            "unsupported image format: {format:?}"
        )));
    }

    let rgb = image::load_from_memory_with_format(bytes, format)
        .map_err(|e| VqaError::Decode(e.to_string()))?
        .to_rgb8();

    let size = ImageSize {
        width: rgb.width() as usize,
        height: rgb.height() as usize,
    };
    log::debug!("Decoded {:?} image of {}x{}", format, size.width, size.height);

    Image::new(size, rgb.into_raw(), CpuAllocator).map_err(|e| VqaError::Decode(e.to_string()))
}

fn check_size(len: usize, max_bytes: usize) -> Result<(), VqaError> {
    if len > max_bytes {
        return Err(VqaError::Decode(format!(
            "image data is too large: {len} bytes (max: {max_bytes} bytes)"
        )));
    }
    Ok(())
}

// reqwest surfaces body errors (e.g. a timeout mid-download) through io::Error
fn body_read_error(err: std::io::Error) -> VqaError {
    match err.into_inner().map(|inner| inner.downcast::<reqwest::Error>()) {
        Some(Ok(err)) => VqaError::Network(*err),
        Some(Err(other)) => VqaError::Decode(format!("failed to read response body: {other}")),
        None => VqaError::Decode("failed to read response body".to_string()),
    }
}

/// Resolves [`ImageSource`]s, fetching remote images with a bounded timeout.
#[derive(Clone, Debug)]
pub struct ImageFetcher {
    client: reqwest::blocking::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl ImageFetcher {
    /// Creates a fetcher with [`DEFAULT_FETCH_TIMEOUT`].
    pub fn new() -> Result<Self, VqaError> {
        Self::with_timeout(DEFAULT_FETCH_TIMEOUT)
    }

    /// Creates a fetcher whose requests give up after `timeout`.
    pub fn with_timeout(timeout: Duration) -> Result<Self, VqaError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(VqaError::Network)?;

        Ok(Self {
            client,
            timeout,
            max_bytes: MAX_IMAGE_BYTES,
        })
    }

    /// Lowers the size cap on fetched bodies and uploaded bytes.
    ///
    /// The cap never exceeds [`MAX_IMAGE_BYTES`].
    pub fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes.min(MAX_IMAGE_BYTES);
        self
    }

    /// Timeout applied to each fetch.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Largest encoded image accepted.
    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Produces a canonical image from exactly one source.
    pub fn load(&self, source: &ImageSource) -> Result<CanonicalImage, VqaError> {
        log::debug!("Acquiring image from {}", source.as_str());
        match source {
            ImageSource::Upload(bytes) | ImageSource::Camera(bytes) => {
                check_size(bytes.len(), self.max_bytes)?;
                decode_image(bytes)
            }
            ImageSource::Url(url) => self.fetch(url),
        }
    }

    /// Downloads `url` and decodes the body. Any non-2xx status is a network error.
    ///
    /// Bodies larger than the size cap are rejected without being read to the end.
    pub fn fetch(&self, url: &str) -> Result<CanonicalImage, VqaError> {
        let response = self
            .client
            .get(url)
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(VqaError::Network)?;

        if let Some(len) = response.content_length() {
            check_size(usize::try_from(len).unwrap_or(usize::MAX), self.max_bytes)?;
        }

        // read one byte past the cap so bodies without a length header are caught too
        let mut body = Vec::new();
        response
            .take(self.max_bytes as u64 + 1)
            .read_to_end(&mut body)
            .map_err(body_read_error)?;
        check_size(body.len(), self.max_bytes)?;
        log::debug!("Fetched {} bytes from {}", body.len(), url);

        decode_image(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageBuffer, Luma, Rgba};
    use std::io::Cursor;

    fn encode(img: DynamicImage, format: ImageFormat) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, format).expect("encode test image");
        buf.into_inner()
    }

    #[test]
    fn supported_containers_decode_to_rgb() {
        let img = ImageBuffer::from_pixel(6, 4, image::Rgb([0u8, 255, 0]));
        for format in [
            ImageFormat::Jpeg,
            ImageFormat::Png,
            ImageFormat::Gif,
            ImageFormat::WebP,
        ] {
            let bytes = encode(DynamicImage::ImageRgb8(img.clone()), format);
            let decoded = decode_image(&bytes).unwrap();
            assert_eq!(decoded.num_channels(), 3, "{format:?}");
            assert_eq!(decoded.width(), 6, "{format:?}");
            assert_eq!(decoded.height(), 4, "{format:?}");
        }
    }

    #[test]
    fn rgba_png_drops_alpha() {
        let img = ImageBuffer::from_pixel(4, 2, Rgba([10u8, 20, 30, 128]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.width(), 4);
        assert_eq!(decoded.height(), 2);
        assert_eq!(decoded.num_channels(), 3);
        assert_eq!(&decoded.as_slice()[..3], &[10, 20, 30]);
    }

    #[test]
    fn grayscale_png_expands_to_rgb() {
        let img = ImageBuffer::from_pixel(3, 3, Luma([200u8]));
        let bytes = encode(DynamicImage::ImageLuma8(img), ImageFormat::Png);

        let decoded = decode_image(&bytes).unwrap();
        assert_eq!(decoded.as_slice().len(), 3 * 3 * 3);
        assert!(decoded.as_slice().iter().all(|&v| v == 200));
    }

    #[test]
    fn empty_bytes_are_a_decode_error() {
        assert!(matches!(decode_image(&[]), Err(VqaError::Decode(_))));
    }

    #[test]
    fn bmp_is_rejected() {
        // minimal BMP signature followed by junk
        let bytes = b"BM\x3a\x00\x00\x00\x00\x00\x00\x00\x36\x00\x00\x00";
        assert!(matches!(decode_image(bytes), Err(VqaError::Decode(_))));
    }

    #[test]
    fn truncated_png_is_a_decode_error() {
        let img = ImageBuffer::from_pixel(8, 8, Rgba([1u8, 2, 3, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        assert!(matches!(
            decode_image(&bytes[..bytes.len() / 2]),
            Err(VqaError::Decode(_))
        ));
    }

    #[test]
    fn oversized_upload_is_a_decode_error() {
        let img = ImageBuffer::from_pixel(32, 32, Rgba([1u8, 2, 3, 255]));
        let bytes = encode(DynamicImage::ImageRgba8(img), ImageFormat::Png);
        let fetcher = ImageFetcher::new().unwrap().with_max_bytes(bytes.len() - 1);

        match fetcher.load(&ImageSource::Upload(bytes)) {
            Err(VqaError::Decode(message)) => assert!(message.contains("too large")),
            other => panic!("expected a size error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn size_cap_is_clamped_to_the_global_limit() {
        let fetcher = ImageFetcher::new().unwrap().with_max_bytes(usize::MAX);
        assert_eq!(fetcher.max_bytes(), MAX_IMAGE_BYTES);
    }

    #[test]
    fn malformed_url_is_a_network_error() {
        let fetcher = ImageFetcher::new().unwrap();
        let result = fetcher.load(&ImageSource::Url("not a url".to_string()));
        assert!(matches!(result, Err(VqaError::Network(_))));
    }
}
