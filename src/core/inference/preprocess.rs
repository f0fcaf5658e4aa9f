use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use super::InferenceError;

/// Décode les octets d'une image téléversée
pub fn decode_image(bytes: &[u8]) -> Result<DynamicImage, InferenceError> {
    image::load_from_memory(bytes).map_err(|e| InferenceError::Decode(e.to_string()))
}

/// Convertit en RGB, recadre au format carré du modèle (Lanczos3, centré) et
/// produit un tenseur NHWC `[1, size, size, 3]` divisé par `pixel_scale`.
pub fn to_input_tensor(image: &DynamicImage, size: u32, pixel_scale: f32) -> Array4<f32> {
    let rgb = image.resize_to_fill(size, size, FilterType::Lanczos3).to_rgb8();

    let side = size as usize;
    let mut tensor = Array4::<f32>::zeros((1, side, side, 3));
    for (x, y, pixel) in rgb.enumerate_pixels() {
        for channel in 0..3 {
            tensor[[0, y as usize, x as usize, channel]] = pixel[channel] as f32 / pixel_scale;
        }
    }
    tensor
}

/// Indice et valeur de la probabilité maximale
pub fn top_class(probabilities: &[f32]) -> Option<(usize, f32)> {
    probabilities
        .iter()
        .copied()
        .enumerate()
        .filter(|(_, p)| p.is_finite())
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn tensor_shape_and_scaling() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(100, 60, Rgb([255, 0, 51])));
        let tensor = to_input_tensor(&img, 48, 255.0);
        assert_eq!(tensor.shape(), &[1, 48, 48, 3]);
        assert!((tensor[[0, 10, 10, 0]] - 1.0).abs() < 1e-3);
        assert!(tensor[[0, 10, 10, 1]].abs() < 1e-3);
        assert!((tensor[[0, 10, 10, 2]] - 0.2).abs() < 1e-2);
    }

    #[test]
    fn raw_pixel_scale_keeps_range() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 200, 200])));
        let tensor = to_input_tensor(&img, 4, 1.0);
        assert!((tensor[[0, 0, 0, 0]] - 200.0).abs() < 1.0);
    }

    #[test]
    fn top_class_picks_maximum() {
        assert_eq!(top_class(&[0.1, 0.7, 0.2]), Some((1, 0.7)));
        assert_eq!(top_class(&[]), None);
        assert_eq!(top_class(&[f32::NAN, 0.3]), Some((1, 0.3)));
    }

    #[test]
    fn garbage_bytes_fail_to_decode() {
        assert!(matches!(
            decode_image(b"definitely not an image"),
            Err(InferenceError::Decode(_))
        ));
    }
}
