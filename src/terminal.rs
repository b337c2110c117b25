// SPDX-License-Identifier: GPL-3.0-only

//! Terminal capture UI
//!
//! Shows the live camera preview with Unicode half-block characters and
//! takes a 224x224 photo on request. The session is opened when the UI
//! starts and always closed when it ends, whether by capture, quit or a
//! camera failure.

use crate::backends::camera::manager::CAMERA_ACCESS_ERROR;
use crate::backends::camera::types::{CameraFrame, PixelFormat};
use crate::backends::camera::CaptureSessionManager;
use crate::constants::timing;
use crate::pipelines::photo::{ImageNormalizer, NormalizedImage};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal, backend::CrosstermBackend, buffer::Buffer, layout::Rect, style::Color,
    widgets::Widget,
};
use std::io::{self, stdout};
use tracing::{error, info, warn};

/// Result of a terminal capture session
#[derive(Debug, Default)]
pub struct TerminalCapture {
    /// The captured photo, `None` when the user quit
    pub image: Option<NormalizedImage>,
    /// Device that produced the last frame shown
    pub device_id: Option<String>,
}

/// Run the terminal capture UI on `session`
pub fn run(
    session: &mut CaptureSessionManager,
    normalizer: &ImageNormalizer,
) -> Result<TerminalCapture, Box<dyn std::error::Error>> {
    // Acquire the camera before touching the terminal so failures print normally
    if let Err(e) = session.open() {
        error!(error = %e, "Could not open capture session");
        return Err(session.last_error().unwrap_or(CAMERA_ACCESS_ERROR).into());
    }

    // Set up terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, session, normalizer);

    session.close();

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    session: &mut CaptureSessionManager,
    normalizer: &ImageNormalizer,
) -> Result<TerminalCapture, Box<dyn std::error::Error>> {
    info!(count = session.devices().len(), "Found cameras");

    let mut outcome = TerminalCapture::default();
    let mut frame_widget = FrameWidget::new();
    let mut show_help = false;
    let mut status_message = build_status_message(session.can_flip());

    loop {
        if let Err(e) = session.check_stream() {
            warn!(error = %e, "Leaving capture UI");
            return Err(session.last_error().unwrap_or(CAMERA_ACCESS_ERROR).into());
        }

        if let Some(frame) = session.latest_frame() {
            frame_widget.update_frame(frame);
        }
        if let Some(device_id) = session.active_device_id() {
            outcome.device_id = Some(device_id.to_string());
        }

        terminal.draw(|f| {
            let area = f.area();

            // Reserve bottom line for status
            let camera_area = Rect {
                x: area.x,
                y: area.y,
                width: area.width,
                height: area.height.saturating_sub(1),
            };
            f.render_widget(&frame_widget, camera_area);

            let status_area = Rect {
                x: area.x,
                y: area.height.saturating_sub(1),
                width: area.width,
                height: 1,
            };
            f.render_widget(
                StatusBar {
                    message: &status_message,
                },
                status_area,
            );
        })?;

        if !event::poll(timing::PREVIEW_FRAME_INTERVAL)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        match key.code {
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => break,
            KeyCode::Char('q') => break,
            KeyCode::Char('p') => {
                show_help = false;
                match session.capture(normalizer) {
                    Ok(image) => {
                        info!(
                            width = image.width(),
                            height = image.height(),
                            "Captured photo"
                        );
                        outcome.image = Some(image);
                        break;
                    }
                    Err(e) => {
                        warn!(error = %e, "Capture refused");
                        status_message = format!("Error: {}", e);
                    }
                }
            }
            KeyCode::Char('s') if session.can_flip() => {
                show_help = false;
                if let Err(e) = session.flip() {
                    error!(error = %e, "Failed to switch camera");
                    return Err(session.last_error().unwrap_or(CAMERA_ACCESS_ERROR).into());
                }
                frame_widget = FrameWidget::new();
                status_message = build_status_message(session.can_flip());
            }
            KeyCode::Char('h') => {
                show_help = !show_help;
                status_message = if show_help {
                    build_help_message(session.can_flip())
                } else {
                    build_status_message(session.can_flip())
                };
            }
            _ => {}
        }
    }

    Ok(outcome)
}

fn build_status_message(can_flip: bool) -> String {
    let mut msg = "'p' picture".to_string();
    if can_flip {
        msg.push_str(" | 's' flip camera");
    }
    msg.push_str(" | 'h' help | 'q' quit");
    msg
}

fn build_help_message(can_flip: bool) -> String {
    let mut msg = String::from("p: Take 224x224 picture | ");
    if can_flip {
        msg.push_str("s: Flip camera | ");
    }
    msg.push_str("h: Toggle help | q/Ctrl+C: Quit");
    msg
}

/// Widget that renders a camera frame using half-block characters
struct FrameWidget {
    frame: Option<CameraFrame>,
}

impl FrameWidget {
    fn new() -> Self {
        Self { frame: None }
    }

    fn update_frame(&mut self, frame: CameraFrame) {
        self.frame = Some(frame);
    }
}

impl Widget for &FrameWidget {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let Some(frame) = self.frame.as_ref().filter(|f| f.is_ready()) else {
            let msg = "Waiting for camera...";
            let x = area.x + (area.width.saturating_sub(msg.len() as u16)) / 2;
            let y = area.y + area.height / 2;
            if y < area.y + area.height && x < area.x + area.width {
                buf.set_string(x, y, msg, ratatui::style::Style::default());
            }
            return;
        };

        // Each terminal cell displays 2 vertical pixels
        let frame_aspect = frame.width as f64 / frame.height as f64;
        let term_width = area.width as f64;
        let term_height = (area.height * 2) as f64;

        let (display_width, display_height) = if term_width / term_height > frame_aspect {
            let h = term_height;
            let w = h * frame_aspect;
            (w as u16, (h / 2.0) as u16)
        } else {
            let w = term_width;
            let h = w / frame_aspect;
            (w as u16, (h / 2.0) as u16)
        };
        if display_width == 0 || display_height == 0 {
            return;
        }

        let x_offset = area.x + (area.width.saturating_sub(display_width)) / 2;
        let y_offset = area.y + (area.height.saturating_sub(display_height)) / 2;

        let x_scale = frame.width as f64 / display_width as f64;
        let y_scale = frame.height as f64 / (display_height * 2) as f64;

        // Upper half (▀) takes the fg colour, lower half the bg colour
        for ty in 0..display_height {
            for tx in 0..display_width {
                let term_x = x_offset + tx;
                let term_y = y_offset + ty;

                if term_x >= area.x + area.width || term_y >= area.y + area.height {
                    continue;
                }

                let src_x = (tx as f64 * x_scale) as u32;
                let src_y_top = (ty as f64 * 2.0 * y_scale) as u32;
                let src_y_bottom = ((ty as f64 * 2.0 + 1.0) * y_scale) as u32;

                let top_color = sample_pixel(frame, src_x, src_y_top);
                let bottom_color = sample_pixel(frame, src_x, src_y_bottom);

                if let Some(cell) = buf.cell_mut((term_x, term_y)) {
                    cell.set_char('▀');
                    cell.set_fg(top_color);
                    cell.set_bg(bottom_color);
                }
            }
        }
    }
}

fn sample_pixel(frame: &CameraFrame, x: u32, y: u32) -> Color {
    let (r, g, b) = sample_pixel_rgb(frame, x, y);
    Color::Rgb(r, g, b)
}

/// Read one pixel, clamped to the frame
///
/// Backends deliver RGBA; other layouts the preview does not understand
/// render black.
fn sample_pixel_rgb(frame: &CameraFrame, x: u32, y: u32) -> (u8, u8, u8) {
    let x = x.min(frame.width.saturating_sub(1));
    let y = y.min(frame.height.saturating_sub(1));
    let data = &frame.data[..];

    let idx = |bytes_per_pixel: u32| (y * frame.stride + x * bytes_per_pixel) as usize;
    match (frame.format, frame.format.bytes_per_pixel()) {
        (PixelFormat::RGBA | PixelFormat::RGB24, Some(bpp)) => match data.get(idx(bpp)..idx(bpp) + 3) {
            Some(&[r, g, b]) => (r, g, b),
            _ => (0, 0, 0),
        },
        (PixelFormat::Gray8, _) => data.get(idx(1)).map(|&v| (v, v, v)).unwrap_or((0, 0, 0)),
        _ => (0, 0, 0),
    }
}

/// Status bar widget
struct StatusBar<'a> {
    message: &'a str,
}

impl Widget for StatusBar<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        for x in area.x..area.x + area.width {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_char(' ');
                cell.set_bg(Color::DarkGray);
            }
        }

        let text: String = self.message.chars().take(area.width as usize).collect();
        buf.set_string(
            area.x,
            area.y,
            text,
            ratatui::style::Style::default()
                .fg(Color::White)
                .bg(Color::DarkGray),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_pixel_rgba_clamps_to_frame() {
        let frame = CameraFrame::from_rgba(2, 1, vec![10, 20, 30, 255, 40, 50, 60, 255]);
        assert_eq!(sample_pixel_rgb(&frame, 0, 0), (10, 20, 30));
        assert_eq!(sample_pixel_rgb(&frame, 5, 9), (40, 50, 60));
    }

    #[test]
    fn test_flip_hint_only_when_offered() {
        assert!(!build_status_message(false).contains("flip"));
        assert!(build_status_message(true).contains("'s' flip camera"));
        assert!(build_help_message(true).contains("s: Flip camera"));
    }

    #[test]
    fn test_frame_widget_renders_half_blocks() {
        let mut widget = FrameWidget::new();
        widget.update_frame(CameraFrame::from_rgba(2, 2, vec![255; 16]));

        let area = Rect::new(0, 0, 4, 2);
        let mut buf = Buffer::empty(area);
        (&widget).render(area, &mut buf);

        let cell = buf.cell((1, 0)).map(|c| c.symbol().to_string());
        assert_eq!(cell.as_deref(), Some("▀"));
    }
}
