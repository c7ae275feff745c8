use regex::Regex;
use serde::{Deserialize, Serialize};

/// Screen rectangle of a dump node, from the `bounds="[l,t][r,b]"` attribute.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Bounds {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Bounds {
    pub fn parse(raw: &str) -> Option<Bounds> {
        let bounds_re = Regex::new(r"\[(-?\d+),(-?\d+)\]\[(-?\d+),(-?\d+)\]").ok()?;
        let caps = bounds_re.captures(raw)?;
        Some(Bounds {
            left: caps.get(1)?.as_str().parse().ok()?,
            top: caps.get(2)?.as_str().parse().ok()?,
            right: caps.get(3)?.as_str().parse().ok()?,
            bottom: caps.get(4)?.as_str().parse().ok()?,
        })
    }

    pub fn to_attr_string(&self) -> String {
        format!(
            "[{},{}][{},{}]",
            self.left, self.top, self.right, self.bottom
        )
    }

    pub fn width(&self) -> i32 {
        (self.right - self.left).max(0)
    }

    pub fn height(&self) -> i32 {
        (self.bottom - self.top).max(0)
    }

    pub fn center(&self) -> (i32, i32) {
        (
            self.left + self.width() / 2,
            self.top + self.height() / 2,
        )
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.left && x < self.right && y >= self.top && y < self.bottom
    }
}
