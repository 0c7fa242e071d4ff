//! Pointer smoothing and input sources.
//!
//! The renderer owns one [`PointerState`]. Callers only ever move the target;
//! the render loop advances `current` exactly once per drawn frame, so any
//! number of input events between two frames collapse into the last one.

use std::cell::Cell;
use std::rc::Rc;

/// Fraction of the remaining distance covered per frame.
pub const SMOOTHING: f32 = 0.06;

/// Device tilt (degrees) that maps to a full deflection.
const TILT_RANGE_DEGREES: f64 = 30.0;
/// Resting forward tilt of a handheld device.
const TILT_REST_BETA: f64 = 45.0;

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PointerState {
    /// Last observed input position, nominally in [-1, 1] but not clamped.
    pub target: [f32; 2],
    /// Smoothed position used for rendering.
    pub current: [f32; 2],
}

impl PointerState {
    pub fn set_target(&mut self, x: f32, y: f32) {
        self.target = [x, y];
    }

    /// One exponential-decay step toward the target.
    pub fn step(&mut self) {
        for axis in 0..2 {
            self.current[axis] += (self.target[axis] - self.current[axis]) * SMOOTHING;
        }
    }
}

/// Idle sway added on top of the smoothed pointer, `t` in seconds since start.
pub fn drift(t: f32) -> [f32; 2] {
    [(t * 0.3).sin() * 0.002, (t * 0.4).cos() * 0.001]
}

/// Maps window coordinates to [-1, 1] on both axes.
pub fn normalize_cursor(x: f64, y: f64, width: f64, height: f64) -> [f32; 2] {
    let nx = if width > 0.0 { x / width * 2.0 - 1.0 } else { 0.0 };
    let ny = if height > 0.0 { y / height * 2.0 - 1.0 } else { 0.0 };
    [nx as f32, ny as f32]
}

/// Maps device orientation (gamma = left/right, beta = front/back, degrees)
/// to a clamped pointer position.
pub fn normalize_tilt(gamma: f64, beta: f64) -> [f32; 2] {
    let x = (gamma / TILT_RANGE_DEGREES).clamp(-1.0, 1.0);
    let y = ((beta - TILT_REST_BETA) / TILT_RANGE_DEGREES).clamp(-1.0, 1.0);
    [x as f32, y as f32]
}

/// Input feeding the pointer target. Polled once per frame by the renderer
/// that owns it.
pub trait PointerSource {
    /// Returns the newest position observed since the previous poll, if any.
    fn poll(&mut self) -> Option<[f32; 2]>;
}

/// Creates a connected writer/source pair for single-threaded hosts.
pub fn shared_pointer() -> (PointerInput, SharedPointerSource) {
    let slot = Rc::new(Cell::new(None));
    (
        PointerInput { slot: slot.clone() },
        SharedPointerSource { slot },
    )
}

/// Writer half handed to event handlers. Later writes replace earlier ones.
#[derive(Clone)]
pub struct PointerInput {
    slot: Rc<Cell<Option<[f32; 2]>>>,
}

impl PointerInput {
    pub fn set(&self, x: f32, y: f32) {
        self.slot.set(Some([x, y]));
    }

    pub fn cursor_moved(&self, x: f64, y: f64, width: f64, height: f64) {
        let [nx, ny] = normalize_cursor(x, y, width, height);
        self.set(nx, ny);
    }

    /// Orientation events without both angles are ignored.
    pub fn tilted(&self, gamma: Option<f64>, beta: Option<f64>) {
        if let (Some(gamma), Some(beta)) = (gamma, beta) {
            let [x, y] = normalize_tilt(gamma, beta);
            self.set(x, y);
        }
    }
}

pub struct SharedPointerSource {
    slot: Rc<Cell<Option<[f32; 2]>>>,
}

impl PointerSource for SharedPointerSource {
    fn poll(&mut self) -> Option<[f32; 2]> {
        self.slot.take()
    }
}
