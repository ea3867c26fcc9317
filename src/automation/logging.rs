use std::path::Path;

use super::{Automation, Point};

/// Dry-run backend: logs every capability call instead of touching the
/// screen, and reports every probe as "not found". Used by the CLI to
/// rehearse a script's control flow; real hosts plug in a driver-backed
/// implementation.
#[derive(Debug, Default)]
pub struct LogAutomation;

impl Automation for LogAutomation {
    fn locate(&mut self, image: &Path, confidence: f32) -> Option<Point> {
        log::info!("locate {} (confidence {})", image.display(), confidence);
        None
    }

    fn click(&mut self, at: Point) {
        log::info!("click at ({}, {})", at.x, at.y);
    }

    fn move_to(&mut self, to: Point) {
        log::info!("move to ({}, {})", to.x, to.y);
    }

    fn type_text(&mut self, text: &str) {
        log::info!("type {:?}", text);
    }

    fn press_key(&mut self, key: &str) {
        log::info!("press {}", key);
    }
}
