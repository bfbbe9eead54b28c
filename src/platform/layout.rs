//! Screen geometry: where to click and what to capture.
//!
//! The chat log sits directly above the message box. Given the point the
//! user parks the cursor on (the message box), the capture rectangle is
//! centred on it horizontally and ends just above the box.

use std::fmt;

use crate::config::MacroConfig;

pub const CAPTURE_W: u32 = 375;
pub const CAPTURE_H: u32 = 550;
pub const INPUT_BOX_H: u32 = 80;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{} at ({}, {})", self.width, self.height, self.x, self.y)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    /// Message box click point.
    pub click: Point,
    /// Chat log capture rectangle.
    pub capture: Region,
}

impl Layout {
    pub fn from_anchor(anchor: Point) -> Self {
        let top = anchor.y - (INPUT_BOX_H / 2) as i32 - CAPTURE_H as i32;
        Self::with_top(anchor, top)
    }

    /// Fixed coordinates from config win over the anchor. A fixed setup
    /// without a capture top derives it from the fixed click point.
    pub fn resolve(cfg: &MacroConfig, anchor: Point) -> Self {
        match cfg.fixed_position() {
            Some((x, y, Some(top))) => Self::with_top(Point::new(x, y), top),
            Some((x, y, None)) => Self::from_anchor(Point::new(x, y)),
            None => Self::from_anchor(anchor),
        }
    }

    fn with_top(click: Point, top: i32) -> Self {
        Self {
            click,
            capture: Region {
                x: (click.x - (CAPTURE_W / 2) as i32).max(0),
                y: top,
                width: CAPTURE_W,
                height: CAPTURE_H,
            },
        }
    }
}
