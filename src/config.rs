//! Monitor configuration.
//!
//! The collector reads a line-oriented config file, one directive per line,
//! `#` starting a comment:
//!
//! ```text
//! port /dev/ttyUSB0
//! spool /var/spool/vz/
//! read_interval 60
//! min_post_interval 300000
//! def 2  TAussen     1  30c8a2b0-... 0.5
//! def 35 PHeizkreis  2
//! ```
//!
//! `def` lines map a payload offset to a named reading; the optional uuid
//! and trigger make it a posted channel, otherwise it is log-only.

use crate::error::ThzError;
use crate::payload::readings::ReadingDef;
use log::debug;
use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::space1;
use nom::combinator::{all_consuming, map, map_res, opt};
use nom::sequence::{pair, preceded};
use nom::IResult;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Parsed monitor configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    /// Log file path. Accepted from the collector's config format; output
    /// routing is handled by the logging facade, so this is informational.
    pub log: Option<PathBuf>,
    /// Spool directory for posted readings.
    pub spool: Option<PathBuf>,
    /// Serial device path.
    pub port: String,
    /// Pause between read cycles.
    pub read_interval: Duration,
    /// Readings are re-posted at least this often, trigger or not.
    pub min_post_interval: Option<Duration>,
    /// Reading definitions in file order.
    pub defs: Vec<ReadingDef>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            log: None,
            spool: None,
            port: String::new(),
            read_interval: Duration::from_secs(60),
            min_post_interval: None,
            defs: Vec::new(),
        }
    }
}

enum Directive {
    Log(PathBuf),
    Spool(PathBuf),
    Port(String),
    ReadInterval(u64),
    MinPostInterval(u64),
    Def(ReadingDef),
}

fn token(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| !c.is_whitespace())(input)
}

fn unsigned(input: &str) -> IResult<&str, u64> {
    map_res(token, |s: &str| s.parse::<u64>())(input)
}

fn keyword_arg<'a>(keyword: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    preceded(pair(tag(keyword), space1), token)
}

fn def_line(input: &str) -> IResult<&str, Directive> {
    let (input, _) = tag("def")(input)?;
    let (input, pos) = preceded(space1, map_res(token, |s: &str| s.parse::<usize>()))(input)?;
    let (input, name) = preceded(space1, token)(input)?;
    let (input, decimals) = preceded(space1, map_res(token, |s: &str| s.parse::<i32>()))(input)?;
    let (input, post) = opt(pair(
        preceded(space1, token),
        preceded(space1, map_res(token, |s: &str| s.parse::<f64>())),
    ))(input)?;

    let (uuid, trigger) = match post {
        Some((uuid, trigger)) => (Some(uuid.to_string()), trigger),
        None => (None, 0.0),
    };
    Ok((
        input,
        Directive::Def(ReadingDef {
            pos,
            name: name.to_string(),
            decimals,
            uuid,
            trigger,
        }),
    ))
}

fn config_line(input: &str) -> IResult<&str, Directive> {
    alt((
        map(keyword_arg("log"), |v| Directive::Log(PathBuf::from(v))),
        map(keyword_arg("spool"), |v| Directive::Spool(PathBuf::from(v))),
        map(keyword_arg("port"), |v| Directive::Port(v.to_string())),
        map(
            preceded(pair(tag("read_interval"), space1), unsigned),
            Directive::ReadInterval,
        ),
        map(
            preceded(pair(tag("min_post_interval"), space1), unsigned),
            Directive::MinPostInterval,
        ),
        def_line,
    ))(input)
}

/// Parse a config file's contents.
pub fn parse_config(input: &str) -> Result<MonitorConfig, ThzError> {
    let mut config = MonitorConfig::default();
    let mut defs = 0usize;
    let mut posted = 0usize;

    for (lineno, raw_line) in input.lines().enumerate() {
        let line = raw_line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let directive = all_consuming(config_line)(line)
            .map(|(_, directive)| directive)
            .map_err(|_| ThzError::Config(format!("invalid directive in line {}", lineno + 1)))?;
        match directive {
            Directive::Log(path) => config.log = Some(path),
            Directive::Spool(path) => config.spool = Some(path),
            Directive::Port(port) => config.port = port,
            Directive::ReadInterval(secs) => config.read_interval = Duration::from_secs(secs),
            Directive::MinPostInterval(millis) => {
                config.min_post_interval = Some(Duration::from_millis(millis))
            }
            Directive::Def(def) => {
                if def.uuid.is_some() {
                    posted += 1;
                }
                defs += 1;
                config.defs.push(def);
            }
        }
    }

    if config.port.is_empty() {
        return Err(ThzError::Config("no port configured".into()));
    }
    debug!("config has {defs} value definitions ({posted} will be posted)");
    Ok(config)
}

/// Read and parse a config file.
pub fn load_config(path: &Path) -> Result<MonitorConfig, ThzError> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| ThzError::Config(format!("open {}: {e}", path.display())))?;
    parse_config(&contents)
}
