/*!
Damping primitives: exponential decay, constant-rate interpolation and a damped
spring, for scalars, vectors, quaternions and angles.

Everything here is pure and frame-rate independent. Inputs are clamped so a bad
`dt` or a zero frequency never produces NaN.

Notes
- Angles are degrees and every angle result is wrapped to (-180, 180].
- `dt <= 0` is treated as "no time passed" unless documented otherwise.
*/

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

use crate::angle;
use crate::constants::SMALL_NUMBER;
use crate::types::{Quat, Vec3, slerp};

#[inline]
pub fn clamp01(value: f32) -> f32 {
    value.clamp(0.0, 1.0)
}

/// Lerp with `alpha` clamped to [0, 1].
#[inline]
pub fn lerp_clamped(from: f32, to: f32, alpha: f32) -> f32 {
    from + (to - from) * clamp01(alpha)
}

/// Map `value` from `input` range to `output` range, clamped to the output range.
pub fn map_range_clamped(input: (f32, f32), output: (f32, f32), value: f32) -> f32 {
    let span = input.1 - input.0;
    if span.abs() <= f32::EPSILON {
        return if value >= input.1 { output.1 } else { output.0 };
    }
    lerp_clamped(output.0, output.1, (value - input.0) / span)
}

/// Clamp a vector's length to at most 1.
#[inline]
pub fn clamp_magnitude01(v: Vec3) -> Vec3 {
    let sq = v.norm_squared();
    if sq <= 1.0 { v } else { v / sq.sqrt() }
}

/// Blend factor for an exponential decay step: `1 - e^(-lambda * dt)`.
#[inline]
pub fn exponential_decay_alpha(dt: f32, lambda: f32) -> f32 {
    1.0 - (-lambda * dt.max(0.0)).exp()
}

/// Move `current` toward `target` by `1 - e^(-lambda * dt)`; `target` when `lambda <= 0`.
#[inline]
pub fn exponential_decay(current: f32, target: f32, dt: f32, lambda: f32) -> f32 {
    if lambda <= 0.0 {
        return target;
    }
    current + (target - current) * exponential_decay_alpha(dt, lambda)
}

#[inline]
pub fn exponential_decay_vec3(current: Vec3, target: Vec3, dt: f32, lambda: f32) -> Vec3 {
    if lambda <= 0.0 {
        return target;
    }
    current.lerp(&target, exponential_decay_alpha(dt, lambda))
}

#[inline]
pub fn exponential_decay_quat(current: &Quat, target: &Quat, dt: f32, lambda: f32) -> Quat {
    if lambda <= 0.0 {
        return *target;
    }
    slerp(current, target, exponential_decay_alpha(dt, lambda))
}

/// Exponential decay along the shortest arc between two angles.
#[inline]
pub fn exponential_decay_angle(current: f32, target: f32, dt: f32, lambda: f32) -> f32 {
    if lambda <= 0.0 {
        return angle::normalize(target);
    }
    angle::lerp(current, target, exponential_decay_alpha(dt, lambda))
}

/// Step an angle toward `target` at no more than `speed` degrees per second.
///
/// The delta is remapped counter-clockwise before clamping, so a near half turn
/// always resolves in the same direction instead of flipping every tick.
pub fn interpolate_angle_constant(current: f32, target: f32, dt: f32, speed: f32) -> f32 {
    if speed <= 0.0 || current == target {
        return angle::normalize(target);
    }

    let delta = angle::remap_for_counter_clockwise_rotation(angle::delta(current, target));
    let step = speed * dt.max(0.0);

    angle::normalize(current + delta.clamp(-step, step))
}

/// Proportional interpolation that never overshoots: moves `speed * dt` of the remaining distance.
#[inline]
pub fn interp_to(current: f32, target: f32, dt: f32, speed: f32) -> f32 {
    if speed <= 0.0 {
        return target;
    }
    let distance = target - current;
    if distance * distance < SMALL_NUMBER * SMALL_NUMBER {
        return target;
    }
    current + distance * clamp01(dt.max(0.0) * speed)
}

#[inline]
pub fn interp_to_vec3(current: Vec3, target: Vec3, dt: f32, speed: f32) -> Vec3 {
    if speed <= 0.0 {
        return target;
    }
    let distance = target - current;
    if distance.norm_squared() < SMALL_NUMBER * SMALL_NUMBER {
        return target;
    }
    current + distance * clamp01(dt.max(0.0) * speed)
}

#[inline]
pub fn interp_to_quat(current: &Quat, target: &Quat, dt: f32, speed: f32) -> Quat {
    if speed <= 0.0 || current.angle_to(target) <= SMALL_NUMBER {
        return *target;
    }
    slerp(current, target, clamp01(dt.max(0.0) * speed))
}

/// Values the spring can integrate.
pub trait SpringValue:
    Copy + Add<Output = Self> + Sub<Output = Self> + Mul<f32, Output = Self>
{
    fn zero() -> Self;
}

impl SpringValue for f32 {
    fn zero() -> Self {
        0.0
    }
}

impl SpringValue for Vec3 {
    fn zero() -> Self {
        Vec3::zeros()
    }
}

/// Velocity memory of a spring between ticks.
///
/// An invalid state (never used, or reset) makes the next step snap to the target.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpringState<T> {
    pub velocity: T,
    pub previous_target: T,
    pub valid: bool,
}

impl<T: SpringValue> Default for SpringState<T> {
    fn default() -> Self {
        Self {
            velocity: T::zero(),
            previous_target: T::zero(),
            valid: false,
        }
    }
}

impl<T: SpringValue> SpringState<T> {
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Parameters of a damped spring step.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpringParams {
    /// Undamped oscillation frequency (Hz).
    pub frequency: f32,
    /// 1 = critical damping, above 1 = over-damped.
    pub damping_ratio: f32,
    /// How much of the target's own velocity the spring follows, [0, 1].
    pub target_velocity_blend: f32,
}

impl Default for SpringParams {
    fn default() -> Self {
        Self {
            frequency: 0.4,
            damping_ratio: 4.0,
            target_velocity_blend: 1.0,
        }
    }
}

/// One step of a damped harmonic oscillator pulling `current` toward a moving `target`.
///
/// The target velocity is estimated from the previous target. The first step on an
/// invalid state snaps to the target.
pub fn spring_damp<T: SpringValue>(
    current: T,
    target: T,
    state: &mut SpringState<T>,
    dt: f32,
    params: SpringParams,
) -> T {
    if dt <= SMALL_NUMBER {
        return current;
    }

    if !state.valid {
        state.velocity = T::zero();
        state.previous_target = target;
        state.valid = true;
        return target;
    }

    let target_velocity =
        (target - state.previous_target) * (clamp01(params.target_velocity_blend) / dt);

    let mut position = current;
    spring_damper(
        &mut position,
        &mut state.velocity,
        target,
        target_velocity,
        dt,
        params.frequency,
        params.damping_ratio,
    );

    state.previous_target = target;
    position
}

/// Closed-form damped spring integration over `dt`, relative to a target moving linearly.
fn spring_damper<T: SpringValue>(
    position: &mut T,
    velocity: &mut T,
    target: T,
    target_velocity: T,
    dt: f32,
    frequency: f32,
    damping_ratio: f32,
) {
    let omega = frequency.max(0.0) * std::f32::consts::TAU;
    let zeta = damping_ratio.max(0.0);

    // No stiffness: pure drift.
    if omega < SMALL_NUMBER {
        *position = *position + *velocity * dt;
        return;
    }

    let y0 = *position - target;
    let v0 = *velocity - target_velocity;
    let (a, b, c, d) = oscillator_coefficients(omega, zeta, dt);

    let y = y0 * a + v0 * b;
    let v = y0 * c + v0 * d;

    *position = target + target_velocity * dt + y;
    *velocity = target_velocity + v;
}

/// Coefficients `(a, b, c, d)` with `y(t) = a*y0 + b*v0` and `y'(t) = c*y0 + d*v0`.
fn oscillator_coefficients(omega: f32, zeta: f32, t: f32) -> (f32, f32, f32, f32) {
    const CRITICAL_EPS: f32 = 1.0e-3;

    if (zeta - 1.0).abs() < CRITICAL_EPS {
        let e = (-omega * t).exp();
        return (
            (1.0 + omega * t) * e,
            t * e,
            -omega * omega * t * e,
            (1.0 - omega * t) * e,
        );
    }

    if zeta < 1.0 {
        let omega_d = omega * (1.0 - zeta * zeta).sqrt();
        let e = (-zeta * omega * t).exp();
        let (s, c) = (omega_d * t).sin_cos();
        let k = zeta * omega / omega_d;
        return (
            e * (c + k * s),
            e * s / omega_d,
            -e * omega * omega / omega_d * s,
            e * (c - k * s),
        );
    }

    let root = (zeta * zeta - 1.0).sqrt();
    let r1 = -omega * (zeta - root);
    let r2 = -omega * (zeta + root);
    let e1 = (r1 * t).exp();
    let e2 = (r2 * t).exp();
    let inv = 1.0 / (r1 - r2);
    (
        (r1 * e2 - r2 * e1) * inv,
        (e1 - e2) * inv,
        r1 * r2 * (e2 - e1) * inv,
        (r1 * e1 - r2 * e2) * inv,
    )
}
