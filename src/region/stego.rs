//! LSB steganography codec for PNG, BMP and TGA cover images.
//!
//! One payload byte is spread over the least significant bits of eight
//! consecutive image samples (row-major pixel order, channels interleaved,
//! as the decoder returns them). Bit 0 of the byte lands in the first of
//! the eight samples, bit 7 in the eighth. The upper seven bits of every
//! sample are never touched, which is what keeps the covers looking like
//! ordinary pictures.

use crate::error::{Error, Result};
use crate::region::BackingCodec;
use image::codecs::bmp::BmpEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::codecs::tga::TgaEncoder;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Cover formats we can rewrite in place.
///
/// The set is restricted to formats whose encoders are lossless; a lossy
/// rewrite would shred the embedded LSBs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverFormat {
    Png,
    Bmp,
    Tga,
}

impl CoverFormat {
    /// Classify a path by its extension, case-insensitively.
    fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_uppercase())
            .unwrap_or_default();
        match ext.as_str() {
            "PNG" => Ok(CoverFormat::Png),
            "BMP" => Ok(CoverFormat::Bmp),
            "TGA" => Ok(CoverFormat::Tga),
            _ => Err(Error::BackingStore(format!(
                "'{}': only PNG, BMP and TGA images are supported, for now",
                path.display()
            ))),
        }
    }
}

/// Image-backed codec: hides the payload in pixel-sample LSBs.
///
/// The probe records the image's dimensions and channel count; both
/// `decode` and `encode` re-open the image and refuse to proceed if those
/// no longer match, since an externally modified cover means the embedded
/// data is already gone.
#[derive(Debug)]
pub struct StegoCodec {
    width: u32,
    height: u32,
    channels: u8,
    format: CoverFormat,
}

impl StegoCodec {
    /// Image width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Image height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Samples per pixel.
    pub fn channels(&self) -> u8 {
        self.channels
    }

    /// The format the cover will be rewritten as.
    pub fn format(&self) -> CoverFormat {
        self.format
    }

    fn open_samples(&self, path: &Path) -> Result<Vec<u8>> {
        let img = open_image(path)?;
        let (w, h) = img.dimensions();
        let n = img.color().channel_count();
        if (w, h, n) != (self.width, self.height, self.channels) {
            return Err(Error::changed(path));
        }
        flatten_samples(img, path)
    }
}

impl BackingCodec for StegoCodec {
    fn probe(path: &Path) -> Result<(Self, usize)> {
        // Checking the extension first means a misnamed file fails now,
        // with a clear message, instead of at the first sync.
        let format = CoverFormat::from_path(path)?;

        let img = open_image(path)?;
        let (width, height) = img.dimensions();
        let channels = img.color().channel_count();

        // 32-bit BMP output is not portable: many encoders drop the fourth
        // channel on write, and a cover rewritten that way trips the change
        // guard forever after. Refuse up front.
        if format == CoverFormat::Bmp && channels == 4 {
            return Err(Error::BackingStore(format!(
                "'{}': 4-channel BMP is not supported",
                path.display()
            )));
        }

        let samples = width as usize * height as usize * channels as usize;
        Ok((
            Self {
                width,
                height,
                channels,
                format,
            },
            samples / 8,
        ))
    }

    fn decode(&self, path: &Path, buf: &mut [u8]) -> Result<()> {
        let samples = self.open_samples(path)?;

        // Assemble each payload byte from the LSBs of its eight samples,
        // least significant bit first.
        for (i, byte) in buf.iter_mut().enumerate() {
            let loc = i * 8;
            let mut b = 0u8;
            for bit in 0..8 {
                b |= (samples[loc + bit] & 1) << bit;
            }
            *byte = b;
        }
        Ok(())
    }

    fn encode(&self, path: &Path, buf: &[u8]) -> Result<()> {
        let mut samples = self.open_samples(path)?;

        for (i, byte) in buf.iter().enumerate() {
            let loc = i * 8;
            for bit in 0..8 {
                samples[loc + bit] = (samples[loc + bit] & !1) | ((byte >> bit) & 1);
            }
        }

        write_image(path, &samples, self.width, self.height, self.channels, self.format)
    }
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|e| {
        Error::BackingStore(format!("could not open image at '{}': {}", path.display(), e))
    })
}

/// Flatten a decoded image to one 8-bit sample per channel, row-major.
///
/// Deeper-than-8-bit sources are narrowed to 8 bits per channel, which is
/// also how they will be rewritten; the channel count is preserved so the
/// probe's capacity stays honest.
fn flatten_samples(img: DynamicImage, path: &Path) -> Result<Vec<u8>> {
    let channels = img.color().channel_count();
    match channels {
        1 => Ok(img.into_luma8().into_raw()),
        2 => Ok(img.into_luma_alpha8().into_raw()),
        3 => Ok(img.into_rgb8().into_raw()),
        4 => Ok(img.into_rgba8().into_raw()),
        n => Err(Error::BackingStore(format!(
            "'{}': unsupported channel count {}",
            path.display(),
            n
        ))),
    }
}

fn sample_color(channels: u8, path: &Path) -> Result<ExtendedColorType> {
    match channels {
        1 => Ok(ExtendedColorType::L8),
        2 => Ok(ExtendedColorType::La8),
        3 => Ok(ExtendedColorType::Rgb8),
        4 => Ok(ExtendedColorType::Rgba8),
        n => Err(Error::BackingStore(format!(
            "'{}': unsupported channel count {}",
            path.display(),
            n
        ))),
    }
}

fn write_image(
    path: &Path,
    samples: &[u8],
    width: u32,
    height: u32,
    channels: u8,
    format: CoverFormat,
) -> Result<()> {
    let color = sample_color(channels, path)?;
    let file = File::create(path).map_err(|e| Error::io(path, "open for writing", e))?;
    let mut writer = BufWriter::new(file);

    let encoded = match format {
        // No row filtering: the rewrite is byte-for-byte reproducible and
        // cheap, and any compliant decoder can still read the result.
        CoverFormat::Png => {
            PngEncoder::new_with_quality(&mut writer, CompressionType::Fast, FilterType::NoFilter)
                .write_image(samples, width, height, color)
        }
        CoverFormat::Bmp => {
            BmpEncoder::new(&mut writer).write_image(samples, width, height, color)
        }
        CoverFormat::Tga => TgaEncoder::new(&mut writer).write_image(samples, width, height, color),
    };

    encoded.map_err(|e| {
        Error::BackingStore(format!("could not write image to '{}': {}", path.display(), e))
    })?;

    // BufWriter's drop swallows flush errors; surface them here instead.
    writer.flush().map_err(|e| Error::io(path, "write image to", e))
}
