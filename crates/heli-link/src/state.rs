use std::fmt;

use heli_proto::{
    ControlFrame, DEF_PITCH, DEF_THROTTLE, DEF_TRIM, DEF_YAW, MAX_PITCH, MAX_THROTTLE, MAX_TRIM,
    MAX_YAW,
};

use crate::error::{HeliError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Pitch,
    Yaw,
    Trim,
    Throttle,
}

impl Axis {
    /// Exclusive upper bound.
    pub fn max(self) -> u8 {
        match self {
            Axis::Pitch => MAX_PITCH,
            Axis::Yaw => MAX_YAW,
            Axis::Trim => MAX_TRIM,
            Axis::Throttle => MAX_THROTTLE,
        }
    }

    pub fn default_value(self) -> u8 {
        match self {
            Axis::Pitch => DEF_PITCH,
            Axis::Yaw => DEF_YAW,
            Axis::Trim => DEF_TRIM,
            Axis::Throttle => DEF_THROTTLE,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Axis::Pitch => "pitch",
            Axis::Yaw => "yaw",
            Axis::Trim => "trim",
            Axis::Throttle => "throttle",
        };
        f.write_str(s)
    }
}

/// Desired state of the helicopter.
///
/// - pitch: below 63 noses down (forward), above noses up (backward)
/// - yaw: below 63 turns right, above turns left
/// - trim: below 63 drifts left, above drifts right
/// - throttle: 0 is idle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlightState {
    pitch: u8,
    yaw: u8,
    trim: u8,
    throttle: u8,
}

impl Default for FlightState {
    fn default() -> Self {
        Self {
            pitch: Axis::Pitch.default_value(),
            yaw: Axis::Yaw.default_value(),
            trim: Axis::Trim.default_value(),
            throttle: Axis::Throttle.default_value(),
        }
    }
}

impl FlightState {
    pub fn pitch(&self) -> u8 { self.pitch }
    pub fn yaw(&self) -> u8 { self.yaw }
    pub fn trim(&self) -> u8 { self.trim }
    pub fn throttle(&self) -> u8 { self.throttle }

    pub fn get(&self, axis: Axis) -> u8 {
        match axis {
            Axis::Pitch => self.pitch,
            Axis::Yaw => self.yaw,
            Axis::Trim => self.trim,
            Axis::Throttle => self.throttle,
        }
    }

    /// Rejects values outside `0..axis.max()`, leaving the field untouched.
    pub fn set(&mut self, axis: Axis, value: u8) -> Result<()> {
        let max = axis.max();
        if value >= max {
            return Err(HeliError::OutOfRange { axis, value, max });
        }
        let slot = match axis {
            Axis::Pitch => &mut self.pitch,
            Axis::Yaw => &mut self.yaw,
            Axis::Trim => &mut self.trim,
            Axis::Throttle => &mut self.throttle,
        };
        *slot = value;
        Ok(())
    }

    pub fn set_pitch(&mut self, v: u8) -> Result<()> { self.set(Axis::Pitch, v) }
    pub fn set_yaw(&mut self, v: u8) -> Result<()> { self.set(Axis::Yaw, v) }
    pub fn set_trim(&mut self, v: u8) -> Result<()> { self.set(Axis::Trim, v) }
    pub fn set_throttle(&mut self, v: u8) -> Result<()> { self.set(Axis::Throttle, v) }

    pub fn frame(&self) -> ControlFrame {
        ControlFrame {
            yaw: self.yaw,
            pitch: self.pitch,
            throttle: self.throttle,
            trim: self.trim,
        }
    }
}
