mod logging;

pub use logging::LogAutomation;

use std::path::Path;

/// Screen coordinates in pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Screen automation capability consumed by the interpreter.
///
/// The interpreter drives everything through this trait so its control-flow
/// logic can be tested without real screen I/O. Implementations wrap the
/// actual pointer/keyboard driver and the image search; they are expected to
/// be synchronous and to pace `type_text` with a small inter-character delay.
///
/// Reference-file existence is checked by the caller before `locate` is
/// invoked; `locate` only answers whether the image currently matches on
/// screen at the given confidence.
pub trait Automation {
    /// Find the center of `image` on screen, or `None` if it does not
    /// currently match at `confidence`.
    fn locate(&mut self, image: &Path, confidence: f32) -> Option<Point>;

    /// Click at the given coordinates.
    fn click(&mut self, at: Point);

    /// Move the pointer to the given coordinates without clicking.
    fn move_to(&mut self, to: Point);

    /// Type a string, one keystroke at a time.
    fn type_text(&mut self, text: &str);

    /// Press and release a single key, e.g. "enter" or "esc".
    fn press_key(&mut self, key: &str);
}
