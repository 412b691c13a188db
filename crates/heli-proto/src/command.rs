use std::fmt;

pub const FRAME_LEN: usize = 4;

/// One control command as it goes over the wire.
///
/// Byte order is `[yaw, pitch, throttle, trim]`; the bridge firmware reads
/// positionally, so this order must not follow field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ControlFrame {
    pub yaw: u8,
    pub pitch: u8,
    pub throttle: u8,
    pub trim: u8,
}

impl ControlFrame {
    pub fn to_bytes(self) -> [u8; FRAME_LEN] {
        [self.yaw, self.pitch, self.throttle, self.trim]
    }
}

impl fmt::Display for ControlFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} {}", self.yaw, self.pitch, self.throttle, self.trim)
    }
}
