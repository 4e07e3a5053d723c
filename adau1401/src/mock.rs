//! Recording bus doubles shared by the unit tests.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::i2c::{self, ErrorType, I2c, Operation};

use crate::device::registers::{
    CAPTURE_0, CAPTURE_1, CORE_CONTROL, SAFELOAD_ADDR_0, SAFELOAD_DATA_0,
};
use crate::fixed::encode_5_19;

const MAX_FRAMES: usize = 512;
const MAX_FRAME_LEN: usize = 34;
const MAX_NODES: usize = 16;
const MAX_SCRIPT: usize = 24;
const MAX_DELAYS: usize = 256;

#[derive(Debug)]
pub struct MockError;

impl i2c::Error for MockError {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::Other
    }
}

/// One recorded write transaction.
#[derive(Clone, Copy)]
pub struct Frame {
    pub device: u8,
    len: usize,
    bytes: [u8; MAX_FRAME_LEN],
}

impl Frame {
    const EMPTY: Frame = Frame {
        device: 0,
        len: 0,
        bytes: [0; MAX_FRAME_LEN],
    };

    pub fn bytes(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// Register address carried in the first two bytes.
    pub fn addr(&self) -> u16 {
        u16::from_be_bytes([self.bytes[0], self.bytes[1]])
    }

    pub fn payload(&self) -> &[u8] {
        &self.bytes[2..self.len]
    }
}

/// Scripted capture values for one node. The last value repeats.
#[derive(Clone, Copy)]
struct Script {
    node: u16,
    values: [f64; MAX_SCRIPT],
    len: usize,
    next: usize,
}

impl Script {
    const EMPTY: Script = Script {
        node: 0,
        values: [0.0; MAX_SCRIPT],
        len: 0,
        next: 0,
    };
}

/// Mock I2C bus that records every write and answers capture reads.
pub struct MockI2c {
    frames: [Frame; MAX_FRAMES],
    frame_count: usize,
    scripts: [Script; MAX_NODES],
    script_count: usize,
    /// Node selector of each completed capture read, in order.
    captures: [u16; MAX_FRAMES],
    capture_count: usize,
    armed: u16,
    attempts: usize,
    fail_at: Option<usize>,
}

impl MockI2c {
    pub fn new() -> Self {
        Self {
            frames: [Frame::EMPTY; MAX_FRAMES],
            frame_count: 0,
            scripts: [Script::EMPTY; MAX_NODES],
            script_count: 0,
            captures: [0; MAX_FRAMES],
            capture_count: 0,
            armed: 0,
            attempts: 0,
            fail_at: None,
        }
    }

    /// Serve `value` for every capture of `node`.
    pub fn with_reading(self, node: u16, value: f64) -> Self {
        self.with_readings(node, &[value])
    }

    /// Serve `values` in order for captures of `node`, repeating the last.
    pub fn with_readings(mut self, node: u16, values: &[f64]) -> Self {
        let mut script = Script::EMPTY;
        script.node = node;
        script.len = values.len();
        script.values[..values.len()].copy_from_slice(values);
        self.scripts[self.script_count] = script;
        self.script_count += 1;
        self
    }

    /// Reject the write with this 0-based index and every one after it.
    pub fn failing_at(mut self, attempt: usize) -> Self {
        self.fail_at = Some(attempt);
        self
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames[..self.frame_count]
    }

    pub fn frame(&self, idx: usize) -> &Frame {
        &self.frames[idx]
    }

    /// Nodes captured so far, in order.
    pub fn captured(&self) -> &[u16] {
        &self.captures[..self.capture_count]
    }

    /// Number of 6-byte parameter writes to `addr`.
    pub fn param_writes(&self, addr: u16) -> usize {
        self.frames()
            .iter()
            .filter(|f| f.bytes().len() == 6 && f.addr() == addr)
            .count()
    }

    /// Payload of the last 6-byte parameter write to `addr`.
    pub fn last_param(&self, addr: u16) -> Option<[u8; 4]> {
        self.frames()
            .iter()
            .rev()
            .find(|f| f.bytes().len() == 6 && f.addr() == addr)
            .map(|f| [f.payload()[0], f.payload()[1], f.payload()[2], f.payload()[3]])
    }

    /// Payloads committed through safeload to `target`, in order.
    pub fn safeloads(&self, target: u16, out: &mut [[u8; 4]]) -> usize {
        let frames = self.frames();
        let mut n = 0;
        for i in 2..frames.len() {
            let (data, addr, commit) = (&frames[i - 2], &frames[i - 1], &frames[i]);
            if data.addr() == SAFELOAD_DATA_0
                && addr.addr() == SAFELOAD_ADDR_0
                && commit.addr() == CORE_CONTROL
                && u16::from_be_bytes([addr.payload()[0], addr.payload()[1]]) == target
            {
                let p = data.payload();
                out[n] = [p[1], p[2], p[3], p[4]];
                n += 1;
            }
        }
        n
    }

    fn next_reading(&mut self, node: u16) -> f64 {
        for script in self.scripts[..self.script_count].iter_mut() {
            if script.node == node {
                let idx = script.next.min(script.len - 1);
                script.next += 1;
                return script.values[idx];
            }
        }
        0.0
    }

    fn check_fail(&mut self) -> Result<(), MockError> {
        let attempt = self.attempts;
        self.attempts += 1;
        match self.fail_at {
            Some(n) if attempt >= n => Err(MockError),
            _ => Ok(()),
        }
    }
}

impl ErrorType for MockI2c {
    type Error = MockError;
}

impl I2c for MockI2c {
    fn read(&mut self, _addr: u8, _buf: &mut [u8]) -> Result<(), Self::Error> {
        Ok(())
    }

    fn write(&mut self, addr: u8, bytes: &[u8]) -> Result<(), Self::Error> {
        self.check_fail()?;
        let mut frame = Frame::EMPTY;
        frame.device = addr;
        frame.len = bytes.len();
        frame.bytes[..bytes.len()].copy_from_slice(bytes);
        if bytes.len() == 4 && matches!(frame.addr(), CAPTURE_0 | CAPTURE_1) {
            self.armed = u16::from_be_bytes([bytes[2], bytes[3]]);
        }
        self.frames[self.frame_count] = frame;
        self.frame_count += 1;
        Ok(())
    }

    fn write_read(
        &mut self,
        _addr: u8,
        _wr: &[u8],
        rd: &mut [u8],
    ) -> Result<(), Self::Error> {
        self.check_fail()?;
        let node = self.armed;
        let value = self.next_reading(node);
        rd.copy_from_slice(&encode_5_19(value));
        self.captures[self.capture_count] = node;
        self.capture_count += 1;
        Ok(())
    }

    fn transaction(
        &mut self,
        _addr: u8,
        _ops: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Mock delay that records each millisecond request.
pub struct MockDelay {
    calls: [u32; MAX_DELAYS],
    count: usize,
}

impl MockDelay {
    pub fn new() -> Self {
        Self {
            calls: [0; MAX_DELAYS],
            count: 0,
        }
    }

    pub fn calls(&self) -> &[u32] {
        &self.calls[..self.count]
    }

    pub fn total_ms(&self) -> u32 {
        self.calls().iter().sum()
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, _ns: u32) {}

    fn delay_ms(&mut self, ms: u32) {
        self.calls[self.count] = ms;
        self.count += 1;
    }
}

#[derive(Debug)]
pub struct MockPinError;

impl digital::Error for MockPinError {
    fn kind(&self) -> digital::ErrorKind {
        digital::ErrorKind::Other
    }
}

/// Mock output pin recording the levels it was driven to.
pub struct MockPin {
    levels: [bool; 8],
    count: usize,
    broken: bool,
}

impl MockPin {
    pub fn new() -> Self {
        Self {
            levels: [false; 8],
            count: 0,
            broken: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    pub fn levels(&self) -> &[bool] {
        &self.levels[..self.count]
    }

    fn drive(&mut self, high: bool) -> Result<(), MockPinError> {
        if self.broken {
            return Err(MockPinError);
        }
        self.levels[self.count] = high;
        self.count += 1;
        Ok(())
    }
}

impl digital::ErrorType for MockPin {
    type Error = MockPinError;
}

impl OutputPin for MockPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false)
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true)
    }
}
