//! Simulation script parsing
//!
//! A script is a comma or whitespace separated list of operations:
//! `play,seek:5000,volume:0.8,detach,attach,dispose`.

use anyhow::{anyhow, bail, Context};
use std::fmt;
use std::str::FromStr;
use vidra_core::Resolution;

/// One scripted operation
#[derive(Debug, Clone, PartialEq)]
pub enum ScriptOp {
    Play,
    Pause,
    Seek(u64),
    Volume(f64),
    Speed(f64),
    Loop(bool),
    Resolution(Resolution),
    /// Destroy the render surface
    Detach,
    /// Recreate the render surface
    Attach,
    Resolutions,
    Position,
    Buffered,
    /// Advance the simulated clock
    Tick(u64),
    /// Inject an engine error with the given code
    Fault(String),
    /// Change the data source to a plain URI
    Swap(String),
    Dispose,
}

impl FromStr for ScriptOp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        let (name, arg) = match s.split_once(':') {
            Some((name, arg)) => (name, Some(arg)),
            None => (s, None),
        };
        let arg = |op: &str| arg.ok_or_else(|| anyhow!("'{}' needs an argument ({}:...)", op, op));

        let op = match name.trim().to_ascii_lowercase().as_str() {
            "play" => ScriptOp::Play,
            "pause" => ScriptOp::Pause,
            "seek" => ScriptOp::Seek(arg("seek")?.parse().context("seek takes milliseconds")?),
            "volume" => ScriptOp::Volume(arg("volume")?.parse().context("volume takes a number")?),
            "speed" => ScriptOp::Speed(arg("speed")?.parse().context("speed takes a number")?),
            "loop" => match arg("loop")? {
                "on" | "true" => ScriptOp::Loop(true),
                "off" | "false" => ScriptOp::Loop(false),
                other => bail!("loop takes on/off, got '{}'", other),
            },
            "res" => ScriptOp::Resolution(arg("res")?.parse()?),
            "detach" => ScriptOp::Detach,
            "attach" => ScriptOp::Attach,
            "resolutions" => ScriptOp::Resolutions,
            "position" => ScriptOp::Position,
            "buffered" => ScriptOp::Buffered,
            "tick" => ScriptOp::Tick(arg("tick")?.parse().context("tick takes milliseconds")?),
            "fault" => ScriptOp::Fault(arg("fault")?.to_string()),
            "swap" => ScriptOp::Swap(arg("swap")?.to_string()),
            "dispose" => ScriptOp::Dispose,
            other => bail!("unknown operation '{}'", other),
        };
        Ok(op)
    }
}

impl fmt::Display for ScriptOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScriptOp::Play => write!(f, "play"),
            ScriptOp::Pause => write!(f, "pause"),
            ScriptOp::Seek(ms) => write!(f, "seek:{}", ms),
            ScriptOp::Volume(v) => write!(f, "volume:{}", v),
            ScriptOp::Speed(s) => write!(f, "speed:{}", s),
            ScriptOp::Loop(on) => write!(f, "loop:{}", if *on { "on" } else { "off" }),
            ScriptOp::Resolution(r) => write!(f, "res:{}", r),
            ScriptOp::Detach => write!(f, "detach"),
            ScriptOp::Attach => write!(f, "attach"),
            ScriptOp::Resolutions => write!(f, "resolutions"),
            ScriptOp::Position => write!(f, "position"),
            ScriptOp::Buffered => write!(f, "buffered"),
            ScriptOp::Tick(ms) => write!(f, "tick:{}", ms),
            ScriptOp::Fault(code) => write!(f, "fault:{}", code),
            ScriptOp::Swap(uri) => write!(f, "swap:{}", uri),
            ScriptOp::Dispose => write!(f, "dispose"),
        }
    }
}

/// Parse a whole script
pub fn parse_script(script: &str) -> anyhow::Result<Vec<ScriptOp>> {
    script
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<ScriptOp>().with_context(|| format!("in script op '{}'", s)))
        .collect()
}
