use std::fs;
use std::path::Path;

use serde_yaml::Value;

use super::executor::{execute_action, require_file};
use super::{Flow, RunError};
use crate::automation::Automation;
use crate::cancel::CancelToken;
use crate::script::{Script, Step};

/// Confidence threshold for `if_condition` probes. Stricter than click
/// searches: a branch decision must not fire on a marginal match.
pub const BRANCH_CONFIDENCE: f32 = 0.9;

/// Load and execute a script file. Returns when the script completes, is
/// broken out of, or is cancelled; any error unwinds the whole run.
pub fn run(
    path: &Path,
    auto: &mut dyn Automation,
    cancel: &CancelToken,
) -> Result<(), RunError> {
    let yaml = fs::read_to_string(path)?;
    let script = Script::from_str(&yaml)?;
    log::info!(
        "running {} ({} top-level steps)",
        path.display(),
        script.steps.len()
    );
    process_steps(&script.steps, auto, cancel)?;
    Ok(())
}

/// Execute a step sequence in document order and return the signal to
/// propagate to the caller. Cancellation is checked before every step; a
/// non-`Continue` signal short-circuits the remaining steps.
pub fn process_steps(
    steps: &[Step],
    auto: &mut dyn Automation,
    cancel: &CancelToken,
) -> Result<Flow, RunError> {
    for step in steps {
        if cancel.is_cancelled() {
            return Ok(Flow::BreakRun);
        }
        let flow = match step {
            Step::Loop { count, body } => run_loop(count, body, auto, cancel)?,
            Step::If {
                image,
                then_branch,
                else_branch,
            } => run_conditional(image, then_branch, else_branch, auto, cancel)?,
            Step::Action(action) => execute_action(action, auto, cancel)?,
        };
        if flow != Flow::Continue {
            return Ok(flow);
        }
    }
    Ok(Flow::Continue)
}

enum LoopCount {
    Infinite,
    Times(i64),
}

fn run_loop(
    count: &Value,
    body: &[Step],
    auto: &mut dyn Automation,
    cancel: &CancelToken,
) -> Result<Flow, RunError> {
    match loop_count(count)? {
        LoopCount::Infinite => {
            log::debug!("entering infinite loop");
            while !cancel.is_cancelled() {
                match process_steps(body, auto, cancel)? {
                    Flow::BreakRun => return Ok(Flow::BreakRun),
                    Flow::BreakLoop => break,
                    Flow::Continue => {}
                }
            }
        }
        LoopCount::Times(n) => {
            log::debug!("entering loop of {} iterations", n);
            for _ in 0..n.max(0) {
                if cancel.is_cancelled() {
                    return Ok(Flow::BreakRun);
                }
                match process_steps(body, auto, cancel)? {
                    Flow::BreakRun => return Ok(Flow::BreakRun),
                    Flow::BreakLoop => break,
                    Flow::Continue => {}
                }
            }
        }
    }
    Ok(Flow::Continue)
}

/// Interpret a raw loop count. Only called when the loop is reached, so a
/// malformed count in a branch that never executes never surfaces.
fn loop_count(value: &Value) -> Result<LoopCount, RunError> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("infinite") || s.eq_ignore_ascii_case("inf") {
                return Ok(LoopCount::Infinite);
            }
            if let Ok(n) = s.parse() {
                return Ok(LoopCount::Times(n));
            }
        }
        Value::Number(n) => {
            if let Some(n) = n.as_i64() {
                return Ok(LoopCount::Times(n));
            }
            // YAML `.inf` arrives as a float
            if n.as_f64().is_some_and(|f| f.is_infinite() && f > 0.0) {
                return Ok(LoopCount::Infinite);
            }
        }
        _ => {}
    }
    Err(RunError::InvalidArgument(format!(
        "loop count must be an integer or \"infinite\", got {:?}",
        value
    )))
}

fn run_conditional(
    image: &str,
    then_branch: &[Step],
    else_branch: &[Step],
    auto: &mut dyn Automation,
    cancel: &CancelToken,
) -> Result<Flow, RunError> {
    let path = require_file(image)?;
    let branch = if auto.locate(path, BRANCH_CONFIDENCE).is_some() {
        log::debug!("{} found, taking then branch", image);
        then_branch
    } else {
        log::debug!("{} not found, taking else branch", image);
        else_branch
    };
    process_steps(branch, auto, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::Point;
    use crate::interpreter::testing::{Call, MockAutomation};
    use std::time::Duration;

    fn steps(yaml: &str) -> Vec<Step> {
        Script::from_str(yaml).unwrap().steps
    }

    fn execute(yaml: &str, auto: &mut MockAutomation, cancel: &CancelToken) -> Flow {
        process_steps(&steps(yaml), auto, cancel).unwrap()
    }

    #[test]
    fn counted_loop_runs_its_body_exactly_n_times() {
        for n in [0usize, 1, 3, 7] {
            let mut auto = MockAutomation::default();
            let yaml = format!(
                "- loop:\n    count: {}\n    steps:\n      - click_pos: [10, 20]\n",
                n
            );
            let flow = execute(&yaml, &mut auto, &CancelToken::new());
            assert_eq!(flow, Flow::Continue);
            assert_eq!(auto.clicks(), n);
        }
    }

    #[test]
    fn loop_count_may_be_an_integral_string() {
        let mut auto = MockAutomation::default();
        let yaml = "- loop:\n    count: \"2\"\n    steps:\n      - click_pos: [1, 1]\n";
        execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(auto.clicks(), 2);
    }

    #[test]
    fn negative_loop_count_runs_zero_iterations() {
        let mut auto = MockAutomation::default();
        let yaml = "- loop:\n    count: -3\n    steps:\n      - click_pos: [1, 1]\n";
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::Continue);
        assert_eq!(auto.clicks(), 0);
    }

    #[test]
    fn malformed_loop_count_fails_when_the_loop_is_reached() {
        let mut auto = MockAutomation::default();
        let yaml = "- loop:\n    count: maybe\n    steps: []\n";
        let err = process_steps(&steps(yaml), &mut auto, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RunError::InvalidArgument(_)));
    }

    #[test]
    fn malformed_loop_count_is_ignored_when_the_loop_is_never_reached() {
        // the break short-circuits before the malformed loop
        let yaml = "- break: true\n- loop:\n    count: maybe\n    steps: []\n";
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::BreakRun);
    }

    #[test]
    fn break_current_loop_ends_only_the_innermost_loop() {
        let yaml = r#"
- loop:
    count: 3
    steps:
      - click_pos: [1, 1]
      - loop:
          count: 5
          steps:
            - break_current_loop: true
      - click_pos: [2, 2]
"#;
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::Continue);
        // both the before and after clicks happen on all 3 outer iterations
        assert_eq!(auto.clicks(), 6);
    }

    #[test]
    fn break_at_any_depth_ends_the_whole_run() {
        let yaml = r#"
- loop:
    count: 3
    steps:
      - loop:
          count: 3
          steps:
            - break: true
- click_pos: [9, 9]
"#;
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::BreakRun);
        assert_eq!(auto.clicks(), 0);
    }

    #[test]
    fn infinite_loop_ends_on_a_local_break_and_the_script_resumes() {
        let yaml = r#"
- loop:
    count: infinite
    steps:
      - break_current_loop: true
- click_pos: [3, 4]
"#;
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::Continue);
        assert_eq!(auto.clicks(), 1);
    }

    #[test]
    fn yaml_dot_inf_count_is_treated_as_infinite() {
        let yaml = r#"
- loop:
    count: .inf
    steps:
      - break_current_loop: true
- click_pos: [3, 4]
"#;
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::Continue);
        assert_eq!(auto.clicks(), 1);
    }

    #[test]
    fn infinite_loop_stops_when_cancelled() {
        let cancel = CancelToken::new();
        let setter = {
            let cancel = cancel.clone();
            std::thread::spawn(move || {
                std::thread::sleep(Duration::from_millis(50));
                cancel.cancel();
            })
        };

        // a long wait in the body so the cancel always lands mid-wait
        let yaml = "- loop:\n    count: infinite\n    steps:\n      - wait: 30\n";
        let mut auto = MockAutomation::default();
        let flow = execute(yaml, &mut auto, &cancel);
        setter.join().unwrap();
        assert_eq!(flow, Flow::BreakRun);
    }

    #[test]
    fn a_set_token_stops_before_the_first_step() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let mut auto = MockAutomation::default();
        let flow = execute("- click_pos: [1, 1]\n", &mut auto, &cancel);
        assert_eq!(flow, Flow::BreakRun);
        assert!(auto.calls.is_empty());
    }

    #[test]
    fn conditional_takes_the_then_branch_on_a_match() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("x.png");
        std::fs::write(&image, b"").unwrap();

        let yaml = format!(
            "- if_condition:\n    image: \"{}\"\n    then:\n      - click_pos: [1, 1]\n    else:\n      - click_pos: [2, 2]\n",
            image.display()
        );

        let mut auto = MockAutomation::default();
        auto.show(&image, Point::new(0, 0));
        execute(&yaml, &mut auto, &CancelToken::new());
        assert!(auto.calls.contains(&Call::Click(Point::new(1, 1))));

        // probes use the stricter branch-decision confidence
        assert_eq!(auto.locate_confidences(), vec![BRANCH_CONFIDENCE]);

        let mut auto = MockAutomation::default();
        execute(&yaml, &mut auto, &CancelToken::new());
        assert!(auto.calls.contains(&Call::Click(Point::new(2, 2))));
    }

    #[test]
    fn conditional_propagates_the_branch_signal() {
        let dir = tempfile::tempdir().unwrap();
        let image = dir.path().join("x.png");
        std::fs::write(&image, b"").unwrap();

        let yaml = format!(
            "- loop:\n    count: 5\n    steps:\n      - if_condition:\n          image: \"{}\"\n          then:\n            - break_current_loop: true\n      - click_pos: [1, 1]\n",
            image.display()
        );
        let mut auto = MockAutomation::default();
        auto.show(&image, Point::new(0, 0));
        let flow = execute(&yaml, &mut auto, &CancelToken::new());
        assert_eq!(flow, Flow::Continue);
        assert_eq!(auto.clicks(), 0);
    }

    #[test]
    fn conditional_with_a_missing_reference_file_is_fatal() {
        let yaml = "- if_condition:\n    image: \"no/such/x.png\"\n    then: []\n";
        let mut auto = MockAutomation::default();
        let err = process_steps(&steps(yaml), &mut auto, &CancelToken::new()).unwrap_err();
        assert!(matches!(err, RunError::ImageNotFound(_)));
    }
}
