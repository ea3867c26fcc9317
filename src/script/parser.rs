use serde_yaml::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("script document must be a sequence of steps")]
    NotASequence,
    #[error("step {0}: {1}")]
    Step(usize, String),
}

/// A loaded action script: an ordered list of steps, immutable per run.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub steps: Vec<Step>,
}

/// One node of the script tree. Exactly one variant per document mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `loop:` — repeat `body` a fixed number of times or forever.
    /// `count` is kept as the raw document value; it is only interpreted
    /// when the loop is reached, so a malformed count in a branch that
    /// never executes is not an error.
    Loop { count: Value, body: Vec<Step> },
    /// `if_condition:` — probe `image` on screen and run one branch.
    If {
        image: String,
        then_branch: Vec<Step>,
        else_branch: Vec<Step>,
    },
    /// Any leaf action.
    Action(Action),
}

/// Leaf actions. Payloads whose validation is deferred to execution time
/// (`wait`, `click_any`, `click_pos`) stay as raw document values.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Wait(Value),
    Click(String),
    ClickAny(Value),
    BreakOnFound(String),
    BreakCurrentLoopOnFound(String),
    ClickPos(Value),
    Input(String),
    Key(String),
    Break,
    BreakCurrentLoop,
}

impl Script {
    pub fn from_str(yaml: &str) -> Result<Self, ParseError> {
        let root: Value = serde_yaml::from_str(yaml)?;
        let steps = root.as_sequence().ok_or(ParseError::NotASequence)?;
        Ok(Script {
            steps: parse_steps(steps)?,
        })
    }

    /// Re-serialize the step tree back to its document form. Step order and
    /// payloads survive a load/serialize round trip; an omitted loop count
    /// comes back as its default of 1.
    pub fn to_value(&self) -> Value {
        Value::Sequence(self.steps.iter().map(Step::to_value).collect())
    }
}

fn parse_steps(seq: &[Value]) -> Result<Vec<Step>, ParseError> {
    seq.iter()
        .enumerate()
        .map(|(i, v)| parse_step(i, v))
        .collect()
}

fn parse_step(i: usize, value: &Value) -> Result<Step, ParseError> {
    let err = |msg: String| ParseError::Step(i, msg);
    let map = value
        .as_mapping()
        .ok_or_else(|| err("expected a mapping".into()))?;

    if map.len() != 1 {
        let keys: Vec<&str> = map.keys().filter_map(Value::as_str).collect();
        return Err(err(format!(
            "expected exactly one action key, got {:?}",
            keys
        )));
    }
    let (key, payload) = map
        .iter()
        .next()
        .ok_or_else(|| err("empty mapping".into()))?;
    let key = key
        .as_str()
        .ok_or_else(|| err("action key must be a string".into()))?;

    let string_payload = |what: &str| -> Result<String, ParseError> {
        payload
            .as_str()
            .map(String::from)
            .ok_or_else(|| err(format!("'{}' requires a string value", what)))
    };

    let step = match key {
        "loop" => {
            let config = payload
                .as_mapping()
                .ok_or_else(|| err("'loop' value must be a mapping".into()))?;
            let count = config
                .get("count")
                .cloned()
                .unwrap_or_else(|| Value::Number(1.into()));
            let body = parse_branch(config.get("steps"))
                .map_err(|e| err(format!("loop steps: {}", e)))?;
            Step::Loop { count, body }
        }
        "if_condition" => {
            let config = payload
                .as_mapping()
                .ok_or_else(|| err("'if_condition' value must be a mapping".into()))?;
            let image = config
                .get("image")
                .and_then(Value::as_str)
                .map(String::from)
                .ok_or_else(|| err("'if_condition' requires a string 'image'".into()))?;
            let then_branch =
                parse_branch(config.get("then")).map_err(|e| err(format!("then: {}", e)))?;
            let else_branch =
                parse_branch(config.get("else")).map_err(|e| err(format!("else: {}", e)))?;
            Step::If {
                image,
                then_branch,
                else_branch,
            }
        }
        "wait" => Step::Action(Action::Wait(payload.clone())),
        "click" => Step::Action(Action::Click(string_payload("click")?)),
        "click_any" => Step::Action(Action::ClickAny(payload.clone())),
        "break_on_found" => Step::Action(Action::BreakOnFound(string_payload("break_on_found")?)),
        "break_current_loop_on_found" => Step::Action(Action::BreakCurrentLoopOnFound(
            string_payload("break_current_loop_on_found")?,
        )),
        "click_pos" => Step::Action(Action::ClickPos(payload.clone())),
        "input" => Step::Action(Action::Input(string_payload("input")?)),
        "key" => Step::Action(Action::Key(string_payload("key")?)),
        "break" => Step::Action(Action::Break),
        "break_current_loop" => Step::Action(Action::BreakCurrentLoop),
        other => return Err(err(format!("unknown action: {}", other))),
    };
    Ok(step)
}

/// A loop body or conditional branch: absent or null means empty, anything
/// else must be a sequence of steps.
fn parse_branch(value: Option<&Value>) -> Result<Vec<Step>, String> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        Some(Value::Sequence(seq)) => parse_steps(seq).map_err(|e| e.to_string()),
        Some(_) => Err("must be a sequence".into()),
    }
}

impl Step {
    pub fn to_value(&self) -> Value {
        let (key, payload) = match self {
            Step::Loop { count, body } => {
                let mut config = serde_yaml::Mapping::new();
                config.insert("count".into(), count.clone());
                config.insert(
                    "steps".into(),
                    Value::Sequence(body.iter().map(Step::to_value).collect()),
                );
                ("loop", Value::Mapping(config))
            }
            Step::If {
                image,
                then_branch,
                else_branch,
            } => {
                let mut config = serde_yaml::Mapping::new();
                config.insert("image".into(), Value::String(image.clone()));
                config.insert(
                    "then".into(),
                    Value::Sequence(then_branch.iter().map(Step::to_value).collect()),
                );
                config.insert(
                    "else".into(),
                    Value::Sequence(else_branch.iter().map(Step::to_value).collect()),
                );
                ("if_condition", Value::Mapping(config))
            }
            Step::Action(action) => return action.to_value(),
        };
        singleton(key, payload)
    }
}

impl Action {
    pub fn to_value(&self) -> Value {
        let (key, payload) = match self {
            Action::Wait(v) => ("wait", v.clone()),
            Action::Click(s) => ("click", Value::String(s.clone())),
            Action::ClickAny(v) => ("click_any", v.clone()),
            Action::BreakOnFound(s) => ("break_on_found", Value::String(s.clone())),
            Action::BreakCurrentLoopOnFound(s) => {
                ("break_current_loop_on_found", Value::String(s.clone()))
            }
            Action::ClickPos(v) => ("click_pos", v.clone()),
            Action::Input(s) => ("input", Value::String(s.clone())),
            Action::Key(s) => ("key", Value::String(s.clone())),
            Action::Break => ("break", Value::Bool(true)),
            Action::BreakCurrentLoop => ("break_current_loop", Value::Bool(true)),
        };
        singleton(key, payload)
    }
}

fn singleton(key: &str, payload: Value) -> Value {
    let mut map = serde_yaml::Mapping::new();
    map.insert(Value::String(key.into()), payload);
    Value::Mapping(map)
}
