//! 受信画像の前処理
//!
//! Base64（Data URL可）を復号し、サイズと形式を検証する。
//! サイズ判定は形式判定より先に行うので、上限超えは中身に関係なく弾かれる。

use base64::{engine::general_purpose::STANDARD, Engine};
use image::{ImageFormat, ImageReader, Limits};
use plant_advisor_common::{strip_data_url, Classify, ErrorKind};
use std::io::Cursor;
use thiserror::Error;

/// 復号後の画像サイズ上限 (10MB)
pub const MAX_IMAGE_BYTES: usize = 10 * 1024 * 1024;

/// 縦横それぞれの最大ピクセル数
pub const MAX_IMAGE_DIMENSION: u32 = 8192;

/// 展開時に確保してよい最大メモリ (160MiB、48MPのRGBが収まる)
pub const MAX_DECODE_ALLOC: u64 = 160 * 1024 * 1024;

/// 受け付ける画像形式
pub const ALLOWED_FORMATS: &[ImageFormat] = &[
    ImageFormat::Jpeg,
    ImageFormat::Png,
    ImageFormat::Gif,
    ImageFormat::WebP,
    ImageFormat::Bmp,
];

#[derive(Error, Debug)]
pub enum ImageError {
    #[error("Invalid image: payload is empty")]
    Empty,

    #[error("Invalid image: payload is not a string")]
    NotText,

    #[error("Invalid image: malformed data URL")]
    MalformedDataUrl,

    #[error("Invalid image: base64 decode failed: {0}")]
    InvalidBase64(#[from] base64::DecodeError),

    #[error("Invalid image: {size} bytes exceeds the {max} byte limit")]
    TooLarge { size: usize, max: usize },

    #[error("Invalid image: dimensions exceed the decode limit: {0}")]
    DimensionsTooLarge(String),

    #[error("Invalid image: unsupported format {0}")]
    UnsupportedFormat(String),

    #[error("Invalid image: corrupt image data: {0}")]
    Corrupt(String),
}

impl Classify for ImageError {
    fn error_kind(&self) -> Option<ErrorKind> {
        Some(ErrorKind::ImageInvalid)
    }
}

/// 検証済み画像
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub bytes: Vec<u8>,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
}

impl PreparedImage {
    pub fn mime_type(&self) -> &'static str {
        self.format.to_mime_type()
    }

    /// 上流の `inline_data` に載せるBase64
    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.bytes)
    }
}

/// 画像ペイロードを復号・検証する
///
/// # Arguments
/// * `payload` - Base64文字列（`data:image/...;base64,` 付きでも可）
pub fn prepare_image(payload: &str) -> Result<PreparedImage, ImageError> {
    let payload = payload.trim();
    if payload.is_empty() {
        return Err(ImageError::Empty);
    }

    let data = strip_data_url(payload).ok_or(ImageError::MalformedDataUrl)?;
    // 改行入りのBase64も受ける
    let data: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    if data.is_empty() {
        return Err(ImageError::Empty);
    }

    let bytes = STANDARD.decode(data.as_bytes())?;
    prepare_bytes(bytes)
}

/// 復号済みバイト列を検証する
///
/// 縦横と展開メモリに上限を掛けてから展開する。CPUを使うので
/// 非同期の呼び出し側は `spawn_blocking` から呼ぶ。
pub fn prepare_bytes(bytes: Vec<u8>) -> Result<PreparedImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::Empty);
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(ImageError::TooLarge {
            size: bytes.len(),
            max: MAX_IMAGE_BYTES,
        });
    }

    let mut reader = ImageReader::new(Cursor::new(bytes.as_slice()))
        .with_guessed_format()
        .map_err(|e| ImageError::Corrupt(e.to_string()))?;

    let format = reader
        .format()
        .ok_or_else(|| ImageError::UnsupportedFormat("unknown".to_string()))?;
    if !ALLOWED_FORMATS.contains(&format) {
        return Err(ImageError::UnsupportedFormat(format!("{:?}", format)));
    }

    let mut limits = Limits::default();
    limits.max_image_width = Some(MAX_IMAGE_DIMENSION);
    limits.max_image_height = Some(MAX_IMAGE_DIMENSION);
    limits.max_alloc = Some(MAX_DECODE_ALLOC);
    reader.limits(limits);

    let decoded = reader.decode().map_err(|e| match e {
        image::ImageError::Limits(_) => ImageError::DimensionsTooLarge(e.to_string()),
        _ => ImageError::Corrupt(e.to_string()),
    })?;
    let (width, height) = (decoded.width(), decoded.height());

    tracing::debug!(?format, width, height, size = bytes.len(), "画像検証OK");

    Ok(PreparedImage {
        bytes,
        format,
        width,
        height,
    })
}
