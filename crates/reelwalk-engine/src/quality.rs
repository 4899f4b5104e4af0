//! Quality gate over downloaded image bytes.

const MIN_BYTES: usize = 1024;
const MIN_ENTROPY_BITS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageFormat {
    #[must_use]
    pub fn mime(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
            ImageFormat::Gif => "image/gif",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum QualityVerdict {
    Accepted { format: ImageFormat, entropy: f64 },
    Rejected { reason: String },
}

/// Identifies an image container from its magic bytes.
#[must_use]
pub fn sniff_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some(ImageFormat::Png),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some(ImageFormat::Webp),
        [b'G', b'I', b'F', b'8', ..] => Some(ImageFormat::Gif),
        _ => None,
    }
}

/// Shannon entropy of the byte distribution, in bits per byte.
#[must_use]
pub fn byte_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0u64; 256];
    for &b in bytes {
        counts[usize::from(b)] += 1;
    }
    #[allow(clippy::cast_precision_loss)]
    let total = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            #[allow(clippy::cast_precision_loss)]
            let p = c as f64 / total;
            -p * p.log2()
        })
        .sum()
}

/// Checks that `bytes` is a real image of reasonable size and detail.
///
/// A declared `content_type` that names a non-image type is rejected even
/// when the magic bytes look like an image.
#[must_use]
pub fn assess_image(bytes: &[u8], content_type: Option<&str>) -> QualityVerdict {
    if bytes.len() < MIN_BYTES {
        return QualityVerdict::Rejected {
            reason: format!("only {} bytes", bytes.len()),
        };
    }
    let Some(format) = sniff_format(bytes) else {
        return QualityVerdict::Rejected {
            reason: "unrecognised image signature".to_owned(),
        };
    };
    if let Some(declared) = content_type {
        let declared = declared.to_ascii_lowercase();
        if !declared.starts_with("image/") && !declared.starts_with("application/octet-stream") {
            return QualityVerdict::Rejected {
                reason: format!("content type {declared} is not an image"),
            };
        }
    }
    let entropy = byte_entropy(bytes);
    if entropy < MIN_ENTROPY_BITS {
        return QualityVerdict::Rejected {
            reason: format!("entropy {entropy:.2} below {MIN_ENTROPY_BITS}"),
        };
    }
    QualityVerdict::Accepted { format, entropy }
}
