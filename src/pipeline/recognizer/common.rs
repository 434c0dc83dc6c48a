use anyhow::{Context, Result, anyhow};
use fast_image_resize as fir;
use ndarray::Array4;
use rayon::prelude::*;

use crate::types::{Frame, Keypoint, Keypoint3, NUM_KEYPOINTS};

pub const HANDPOSE_INPUT_SIZE: u32 = 224;
pub const PALM_INPUT_SIZE: u32 = 192;

/// Where a square letterboxed model input sits inside the source frame.
#[derive(Clone, Copy, Debug)]
pub struct Letterbox {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub frame_w: u32,
    pub frame_h: u32,
}

impl Letterbox {
    /// Model-input pixels back to frame pixels.
    pub fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        ((x - self.pad_x) / self.scale, (y - self.pad_y) / self.scale)
    }
}

/// A rotated square region of the frame resampled to `size x size`.
#[derive(Clone, Copy, Debug)]
pub struct RotatedCrop {
    pub center: (f32, f32),
    pub side: f32,
    pub angle: f32,
    pub size: u32,
    pub frame_w: u32,
    pub frame_h: u32,
}

impl RotatedCrop {
    /// Crop pixels back to frame pixels, clamped to the frame.
    pub fn to_frame(&self, x: f32, y: f32) -> Keypoint {
        let (sin, cos) = self.angle.sin_cos();
        let half = self.size as f32 / 2.0;
        let step = self.side / self.size as f32;
        let dx = (x - half) * step;
        let dy = (y - half) * step;
        Keypoint::new(
            (self.center.0 + dx * cos - dy * sin).clamp(0.0, self.frame_w.saturating_sub(1) as f32),
            (self.center.1 + dx * sin + dy * cos).clamp(0.0, self.frame_h.saturating_sub(1) as f32),
        )
    }

    pub fn tensor(&self, frame: &Frame) -> Result<Array4<f32>> {
        check_frame(frame)?;
        let (sin, cos) = self.angle.sin_cos();
        let half = self.size as f32 / 2.0;
        let step = self.side / self.size as f32;
        let size = self.size as usize;

        let data: Vec<f32> = (0..size)
            .into_par_iter()
            .flat_map_iter(|row| {
                let dy = (row as f32 + 0.5 - half) * step;
                (0..size).flat_map(move |col| {
                    let dx = (col as f32 + 0.5 - half) * step;
                    bilinear_rgb(
                        frame,
                        self.center.0 + dx * cos - dy * sin,
                        self.center.1 + dx * sin + dy * cos,
                    )
                })
            })
            .collect();

        Array4::from_shape_vec((1, size, size, 3), data)
            .map_err(|err| anyhow!("failed to shape rotated crop tensor: {err}"))
    }
}

fn check_frame(frame: &Frame) -> Result<()> {
    let expected = (frame.width as usize)
        .saturating_mul(frame.height as usize)
        .saturating_mul(4);
    if frame.rgba.len() != expected {
        return Err(anyhow!(
            "frame buffer is {} bytes, {}x{} RGBA needs {expected}",
            frame.rgba.len(),
            frame.width,
            frame.height
        ));
    }
    Ok(())
}

/// Resizes the frame to fit `target x target`, pads the rest black and normalizes to 0..1.
pub fn letterbox_tensor(frame: &Frame, target: u32) -> Result<(Array4<f32>, Letterbox)> {
    check_frame(frame)?;

    let scale = target as f32 / frame.width.max(frame.height) as f32;
    let fit_w = ((frame.width as f32 * scale).round() as u32).clamp(1, target);
    let fit_h = ((frame.height as f32 * scale).round() as u32).clamp(1, target);

    let src = fir::images::Image::from_vec_u8(
        frame.width,
        frame.height,
        frame.rgba.clone(),
        fir::PixelType::U8x4,
    )?;
    let mut dst = fir::images::Image::new(fit_w, fit_h, fir::PixelType::U8x4);
    let options = fir::ResizeOptions::new()
        .resize_alg(fir::ResizeAlg::Interpolation(fir::FilterType::Bilinear));
    fir::Resizer::new()
        .resize(&src, &mut dst, Some(&options))
        .context("letterbox resize failed")?;
    let resized = dst.into_vec();

    let pad_x = ((target - fit_w) / 2) as usize;
    let pad_y = ((target - fit_h) / 2) as usize;
    let side = target as usize;
    let fit_w = fit_w as usize;
    let fit_h = fit_h as usize;

    let mut data = vec![0.0f32; side * side * 3];
    data.par_chunks_exact_mut(side * 3)
        .enumerate()
        .skip(pad_y)
        .take(fit_h)
        .for_each(|(row, out)| {
            let src_row = &resized[(row - pad_y) * fit_w * 4..(row - pad_y + 1) * fit_w * 4];
            for (col, px) in src_row.chunks_exact(4).enumerate() {
                let at = (pad_x + col) * 3;
                out[at] = px[0] as f32 / 255.0;
                out[at + 1] = px[1] as f32 / 255.0;
                out[at + 2] = px[2] as f32 / 255.0;
            }
        });

    let tensor = Array4::from_shape_vec((1, side, side, 3), data)
        .map_err(|err| anyhow!("failed to shape letterbox tensor: {err}"))?;

    Ok((
        tensor,
        Letterbox {
            scale,
            pad_x: pad_x as f32,
            pad_y: pad_y as f32,
            frame_w: frame.width,
            frame_h: frame.height,
        },
    ))
}

/// Reads `NUM_KEYPOINTS` xyz triples from a flat model output.
pub fn decode_keypoints(flat: &[f32]) -> Result<Vec<Keypoint3>> {
    if flat.len() < NUM_KEYPOINTS * 3 {
        return Err(anyhow!(
            "landmark output has {} values, need {}",
            flat.len(),
            NUM_KEYPOINTS * 3
        ));
    }
    Ok(flat
        .chunks_exact(3)
        .take(NUM_KEYPOINTS)
        .map(|c| Keypoint3::new(c[0], c[1], c[2]))
        .collect())
}

fn bilinear_rgb(frame: &Frame, x: f32, y: f32) -> [f32; 3] {
    if !x.is_finite() || !y.is_finite() {
        return [0.0; 3];
    }
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = x - x0;
    let fy = y - y0;

    let texel = |tx: f32, ty: f32| -> [f32; 3] {
        let (ix, iy) = (tx as i64, ty as i64);
        if ix < 0 || iy < 0 || ix >= frame.width as i64 || iy >= frame.height as i64 {
            return [0.0; 3];
        }
        let at = (iy as usize * frame.width as usize + ix as usize) * 4;
        [
            frame.rgba[at] as f32 / 255.0,
            frame.rgba[at + 1] as f32 / 255.0,
            frame.rgba[at + 2] as f32 / 255.0,
        ]
    };

    let top = [texel(x0, y0), texel(x0 + 1.0, y0)];
    let bottom = [texel(x0, y0 + 1.0), texel(x0 + 1.0, y0 + 1.0)];
    let mut out = [0.0; 3];
    for c in 0..3 {
        let t = top[0][c] + (top[1][c] - top[0][c]) * fx;
        let b = bottom[0][c] + (bottom[1][c] - bottom[0][c]) * fx;
        out[c] = t + (b - t) * fy;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn solid_frame(width: u32, height: u32, value: u8) -> Frame {
        Frame {
            rgba: vec![value; (width * height * 4) as usize],
            width,
            height,
        }
    }

    #[test]
    fn letterbox_pads_short_side() {
        let frame = solid_frame(64, 32, 255);
        let (tensor, letterbox) = letterbox_tensor(&frame, 32).unwrap();
        assert_eq!(tensor.shape(), &[1, 32, 32, 3]);
        assert_relative_eq!(letterbox.scale, 0.5);
        assert_relative_eq!(letterbox.pad_y, 8.0);
        assert_relative_eq!(tensor[[0, 0, 0, 0]], 0.0);
        assert_relative_eq!(tensor[[0, 16, 16, 0]], 1.0, epsilon = 1e-3);

        let (fx, fy) = letterbox.to_frame(16.0, 16.0);
        assert_relative_eq!(fx, 32.0);
        assert_relative_eq!(fy, 16.0);
    }

    #[test]
    fn rejects_truncated_frame() {
        let mut frame = solid_frame(8, 8, 0);
        frame.rgba.truncate(10);
        assert!(letterbox_tensor(&frame, 16).is_err());
    }

    #[test]
    fn unrotated_crop_centre_maps_to_crop_centre() {
        let crop = RotatedCrop {
            center: (100.0, 80.0),
            side: 50.0,
            angle: 0.0,
            size: 10,
            frame_w: 640,
            frame_h: 480,
        };
        let p = crop.to_frame(5.0, 5.0);
        assert_relative_eq!(p.x, 100.0);
        assert_relative_eq!(p.y, 80.0);
        let corner = crop.to_frame(0.0, 0.0);
        assert_relative_eq!(corner.x, 75.0);
        assert_relative_eq!(corner.y, 55.0);
    }

    #[test]
    fn decodes_twenty_one_triples() {
        let flat: Vec<f32> = (0..63).map(|v| v as f32).collect();
        let points = decode_keypoints(&flat).unwrap();
        assert_eq!(points.len(), NUM_KEYPOINTS);
        assert_eq!(points[8], Keypoint3::new(24.0, 25.0, 26.0));
        assert!(decode_keypoints(&flat[..60]).is_err());
    }
}
