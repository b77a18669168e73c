// Shows a rendered figure in a window

use std::{error::Error, time::Duration};

use image::{RgbImage, imageops::FilterType};
use minifb::{Key, Window, WindowOptions};
use screen_size::get_primary_screen_size as get_screen_size;

/// Window width used when the screen size cannot be read
const FALLBACK_WIDTH: u64 = 1200;

/// Redraw rate while the window is open
const REFRESH_FPS: u64 = 30;

/// Initial window size: half the screen width, keeping the figure's aspect.
fn initial_size((w, h): (u32, u32), screen_w: u64) -> (usize, usize) {
    let init_w = (screen_w / 2).min(w as u64).max(1);
    let init_h = ((init_w as f64 * (h as f64 / w.max(1) as f64)) as u64).max(1);
    (init_w as usize, init_h as usize)
}

/// Pack RGB pixels into the 0RGB words minifb expects.
fn pack_pixels(img: &RgbImage) -> Vec<u32> {
    img.pixels()
        .map(|px| ((px[0] as u32) << 16) | ((px[1] as u32) << 8) | (px[2] as u32))
        .collect()
}

/// Open a resizable window showing `figure` until it is closed or Escape is
/// pressed.
pub fn show_figure(figure: &RgbImage, title: &str) -> Result<(), Box<dyn Error>> {
    let screen_w = get_screen_size()
        .map(|(w, _)| w as u64)
        .unwrap_or(FALLBACK_WIDTH * 2);
    let (init_w, init_h) = initial_size(figure.dimensions(), screen_w);

    let mut window = Window::new(
        title,
        init_w,
        init_h,
        WindowOptions {
            resize: true,
            ..WindowOptions::default()
        },
    )?;
    window.set_target_fps(REFRESH_FPS as usize);

    let mut shown: Option<((usize, usize), Vec<u32>)> = None;

    while window.is_open() && !window.is_key_down(Key::Escape) {
        let (win_w, win_h) = window.get_size();
        if win_w == 0 || win_h == 0 {
            window.update();
            std::thread::sleep(Duration::from_millis(1000 / REFRESH_FPS));
            continue;
        }

        // only resample when the window size changes
        let stale = shown.as_ref().is_none_or(|(size, _)| *size != (win_w, win_h));
        if stale {
            let resized = image::imageops::resize(
                figure,
                win_w as u32,
                win_h as u32,
                FilterType::Triangle,
            );
            shown = Some(((win_w, win_h), pack_pixels(&resized)));
        }

        if let Some((_, buffer)) = &shown {
            window.update_with_buffer(buffer, win_w, win_h)?;
        }
    }

    Ok(())
}
