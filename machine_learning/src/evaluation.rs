use serde::Serialize;

/// The result of fitting fresh latent codes to a set of images with the decoder frozen.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Evaluation {
    /// The trainer's reconstruction loss over every image, after the last step.
    pub loss: f32,
    pub mse: f32,
    /// The peak signal to noise ratio, in decibels.
    pub psnr: f32,
    /// The amount of passes over the images the codes were optimized for.
    pub steps: usize,
}

/// Returns the peak signal to noise ratio for images with values in `[0, 1]`.
pub fn psnr(mse: f32) -> f32 {
    if mse <= 0. {
        return f32::INFINITY;
    }

    10. * (1. / mse).log10()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn psnr_of_known_errors() {
        assert_eq!(psnr(0.), f32::INFINITY);
        assert!((psnr(0.01) - 20.).abs() < 1e-4);
        assert!((psnr(1.)).abs() < 1e-6);
    }
}
