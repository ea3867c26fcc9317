use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use serde_yaml::Value;

use super::{Flow, RunError};
use crate::automation::{Automation, Point};
use crate::cancel::CancelToken;
use crate::script::Action;

/// Confidence threshold for click-oriented image searches.
pub const MATCH_CONFIDENCE: f32 = 0.7;

/// Waits sleep in slices of at most this long so a cancellation request is
/// observed within 100 ms no matter how long the requested wait is.
const WAIT_SLICE: Duration = Duration::from_millis(100);

/// Execute one leaf action. Returns the control signal to propagate, or an
/// error that unwinds the whole run.
pub fn execute_action(
    action: &Action,
    auto: &mut dyn Automation,
    cancel: &CancelToken,
) -> Result<Flow, RunError> {
    match action {
        Action::Wait(value) => wait(value, cancel),
        Action::Click(image) => click(image, auto),
        Action::ClickAny(value) => click_any(value, auto),
        Action::BreakOnFound(image) => probe_break(image, auto, Flow::BreakRun),
        Action::BreakCurrentLoopOnFound(image) => probe_break(image, auto, Flow::BreakLoop),
        Action::ClickPos(value) => click_pos(value, auto),
        Action::Input(text) => {
            auto.type_text(text);
            Ok(Flow::Continue)
        }
        Action::Key(key) => {
            auto.press_key(key);
            Ok(Flow::Continue)
        }
        Action::Break => Ok(Flow::BreakRun),
        Action::BreakCurrentLoop => Ok(Flow::BreakLoop),
    }
}

fn wait(value: &Value, cancel: &CancelToken) -> Result<Flow, RunError> {
    let seconds = as_seconds(value).ok_or_else(|| {
        RunError::InvalidArgument(format!("'wait' requires a number of seconds, got {:?}", value))
    })?;
    // A wait too large for Duration (or for the clock) just polls until
    // cancelled; no deadline means no expiry.
    let requested = Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(Duration::MAX);
    let deadline = Instant::now().checked_add(requested);
    loop {
        if cancel.is_cancelled() {
            return Ok(Flow::BreakRun);
        }
        let remaining = match deadline {
            Some(deadline) => deadline.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        };
        if remaining.is_zero() {
            return Ok(Flow::Continue);
        }
        thread::sleep(remaining.min(WAIT_SLICE));
    }
}

fn as_seconds(value: &Value) -> Option<f64> {
    let seconds = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    seconds.is_finite().then_some(seconds)
}

fn click(image: &str, auto: &mut dyn Automation) -> Result<Flow, RunError> {
    let path = require_file(image)?;
    match auto.locate(path, MATCH_CONFIDENCE) {
        Some(center) => {
            auto.click(center);
            Ok(Flow::Continue)
        }
        None => Err(RunError::ImageNotFound(format!(
            "image not found on screen: {}",
            image
        ))),
    }
}

fn click_any(value: &Value, auto: &mut dyn Automation) -> Result<Flow, RunError> {
    let candidates: Vec<&str> = value
        .as_sequence()
        .and_then(|seq| seq.iter().map(Value::as_str).collect())
        .ok_or_else(|| {
            RunError::InvalidArgument(format!(
                "'click_any' requires a list of image paths, got {:?}",
                value
            ))
        })?;

    for image in &candidates {
        let path = Path::new(image);
        if !path.exists() {
            // a missing candidate file is not fatal, the next one may match
            log::warn!("image file does not exist, skipping: {}", image);
            continue;
        }
        if let Some(center) = auto.locate(path, MATCH_CONFIDENCE) {
            auto.click(center);
            return Ok(Flow::Continue);
        }
    }
    Err(RunError::ImageNotFound(format!(
        "none of the images found on screen: {:?}",
        candidates
    )))
}

/// Probe for an image; found yields the given break signal, not found is a
/// normal negative outcome. Only a missing reference file is fatal.
fn probe_break(image: &str, auto: &mut dyn Automation, found: Flow) -> Result<Flow, RunError> {
    let path = require_file(image)?;
    if auto.locate(path, MATCH_CONFIDENCE).is_some() {
        Ok(found)
    } else {
        Ok(Flow::Continue)
    }
}

fn click_pos(value: &Value, auto: &mut dyn Automation) -> Result<Flow, RunError> {
    let invalid = || {
        RunError::InvalidArgument(format!(
            "'click_pos' requires an [x, y] pair of integers, got {:?}",
            value
        ))
    };
    let pair = value
        .as_sequence()
        .filter(|seq| seq.len() == 2)
        .ok_or_else(invalid)?;
    let x = as_coordinate(&pair[0]).ok_or_else(invalid)?;
    let y = as_coordinate(&pair[1]).ok_or_else(invalid)?;

    let target = Point::new(x, y);
    auto.move_to(target);
    auto.click(target);
    Ok(Flow::Continue)
}

fn as_coordinate(value: &Value) -> Option<i32> {
    match value {
        Value::Number(n) => i32::try_from(n.as_i64()?).ok(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(super) fn require_file(image: &str) -> Result<&Path, RunError> {
    let path = Path::new(image);
    if path.exists() {
        Ok(path)
    } else {
        Err(RunError::ImageNotFound(format!(
            "image file does not exist: {}",
            image
        )))
    }
}
