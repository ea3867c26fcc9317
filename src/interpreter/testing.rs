//! Scripted automation capability for interpreter tests: records every call
//! and answers `locate` from a fixed set of "on screen" images.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::automation::{Automation, Point};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Locate(PathBuf, f32),
    Click(Point),
    MoveTo(Point),
    TypeText(String),
    PressKey(String),
}

#[derive(Debug, Default)]
pub struct MockAutomation {
    on_screen: HashMap<PathBuf, Point>,
    pub calls: Vec<Call>,
}

impl MockAutomation {
    /// Make `image` match on screen at the given center from now on.
    pub fn show(&mut self, image: &Path, center: Point) {
        self.on_screen.insert(image.to_path_buf(), center);
    }

    pub fn clicks(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, Call::Click(_)))
            .count()
    }

    pub fn locate_confidences(&self) -> Vec<f32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Locate(_, confidence) => Some(*confidence),
                _ => None,
            })
            .collect()
    }
}

impl Automation for MockAutomation {
    fn locate(&mut self, image: &Path, confidence: f32) -> Option<Point> {
        self.calls
            .push(Call::Locate(image.to_path_buf(), confidence));
        self.on_screen.get(image).copied()
    }

    fn click(&mut self, at: Point) {
        self.calls.push(Call::Click(at));
    }

    fn move_to(&mut self, to: Point) {
        self.calls.push(Call::MoveTo(to));
    }

    fn type_text(&mut self, text: &str) {
        self.calls.push(Call::TypeText(text.to_string()));
    }

    fn press_key(&mut self, key: &str) {
        self.calls.push(Call::PressKey(key.to_string()));
    }
}
