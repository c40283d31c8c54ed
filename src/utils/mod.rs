use image::{DynamicImage, Luma};
use qrcode::QrCode;
use std::io::Cursor;

use crate::error::AppError;

/// Encode a short text payload as a PNG raster QR image.
///
/// Deterministic for a given input; fails when the payload does not fit the
/// configured symbol density.
pub fn encode_qr_png(data: &str) -> Result<Vec<u8>, AppError> {
    let code =
        QrCode::new(data).map_err(|e| AppError::Encoding(format!("QR encoding failed: {}", e)))?;
    let image = code.render::<Luma<u8>>().build();

    let dynamic_image = DynamicImage::ImageLuma8(image);
    let mut buffer = Cursor::new(Vec::new());
    dynamic_image
        .write_to(&mut buffer, image::ImageOutputFormat::Png)
        .map_err(|e| AppError::Encoding(format!("QR raster write failed: {}", e)))?;

    Ok(buffer.into_inner())
}
