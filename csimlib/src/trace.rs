use std::fmt;
use lazy_static::lazy_static;
use log::warn;
use regex::Regex;
use crate::error::SimulationError;

lazy_static! {
    // <op> <hex address>,<size>, e.g. "L 7ff000398,8" or " S 0x10, 4"
    static ref LINE_PATTERN: Regex =
        Regex::new(r"^\s*(?P<op>\S)\s*(?:0[xX])?(?P<address>[0-9a-fA-F]+),\s*(?P<size>-?[0-9]+)\s*$").unwrap();
}

/// The kind of memory access
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Operation {
    Load,
    Store,
}

impl Operation {
    /// The one character code used for the operation in traces
    pub fn code(&self) -> char {
        match self {
            Operation::Load => 'L',
            Operation::Store => 'S',
        }
    }
}

impl TryFrom<char> for Operation {
    type Error = SimulationError;

    fn try_from(value: char) -> Result<Self, Self::Error> {
        match value {
            'L' => Ok(Operation::Load),
            'S' => Ok(Operation::Store),
            other => Err(SimulationError::InvalidOperation(other)),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A single memory access
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct AccessEvent {
    pub operation: Operation,
    pub address: u64,
    /// The number of bytes accessed. Carried through to the verbose output, but the cache only
    /// looks at the block the address falls into, so any value is accepted
    pub size: i64,
}

impl AccessEvent {
    pub fn load(address: u64, size: i64) -> Self {
        Self { operation: Operation::Load, address, size }
    }

    pub fn store(address: u64, size: i64) -> Self {
        Self { operation: Operation::Store, address, size }
    }
}

impl fmt::Display for AccessEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:x}, {}", self.operation, self.address, self.size)
    }
}

/// A trace line which has the right shape, but whose operation has not been checked yet
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct TraceLine {
    pub operation: char,
    pub address: u64,
    pub size: i64,
}

impl TraceLine {
    /// Parses a line of the form `<op> <hex address>,<size>`
    ///
    /// returns: None if the line is malformed, including addresses which overflow. Sizes are
    /// never looked at by the cache, so one too large for an i64 is clamped rather than rejected
    ///
    /// # Examples
    ///
    /// ```
    /// use csimlib::trace::TraceLine;
    /// let line = TraceLine::parse("S 7ff0005c8,8").unwrap();
    /// assert_eq!(line.operation, 'S');
    /// assert_eq!(line.address, 0x7ff0005c8);
    /// assert_eq!(line.size, 8);
    /// assert_eq!(TraceLine::parse("S 7ff0005c8"), None);
    /// ```
    pub fn parse(line: &str) -> Option<Self> {
        let captures = LINE_PATTERN.captures(line)?;
        let operation = captures.name("op")?.as_str().chars().next()?;
        let address = u64::from_str_radix(captures.name("address")?.as_str(), 16).ok()?;
        let size = captures.name("size")?.as_str();
        // Only digits get this far, so the parse can only fail on overflow
        let size = size.parse::<i64>().unwrap_or(if size.starts_with('-') { i64::MIN } else { i64::MAX });
        Some(Self { operation, address, size })
    }

    /// Checks the operation, producing an event the simulator can apply
    pub fn to_event(&self) -> Result<AccessEvent, SimulationError> {
        Ok(AccessEvent {
            operation: Operation::try_from(self.operation)?,
            address: self.address,
            size: self.size,
        })
    }
}

/// Iterates the events of a trace held in memory
///
/// Blank lines are skipped. The first malformed line ends the trace, everything after it is
/// ignored. Lines with an unknown operation are yielded as errors, it is up to the caller to stop
pub struct Trace<'a> {
    lines: std::slice::Split<'a, u8, fn(&u8) -> bool>,
    line_number: usize,
    finished: bool,
}

impl<'a> Trace<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        let is_newline: fn(&u8) -> bool = |byte| *byte == b'\n';
        Self {
            lines: bytes.split(is_newline),
            line_number: 0,
            finished: false,
        }
    }

    /// The line number of the line last yielded, starting at 1
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl<'a> Iterator for Trace<'a> {
    type Item = Result<AccessEvent, SimulationError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for raw in self.lines.by_ref() {
            self.line_number += 1;
            let parsed = std::str::from_utf8(raw).ok().and_then(|line| {
                if line.trim().is_empty() {
                    Some(None)
                } else {
                    TraceLine::parse(line).map(Some)
                }
            });
            match parsed {
                Some(None) => continue,
                Some(Some(line)) => return Some(line.to_event()),
                None => {
                    warn!("Malformed trace line {}, treating it as the end of the trace", self.line_number);
                    self.finished = true;
                    return None;
                }
            }
        }
        self.finished = true;
        None
    }
}
