//! Complex numbers

use super::repr;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Div, Mul, Neg, Sub};

/// Complex number with `f64` parts
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Complex64 {
    pub re: f64,
    pub im: f64,
}

impl Complex64 {
    pub const fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    pub fn from_polar(r: f64, theta: f64) -> Self {
        Self::new(r * theta.cos(), r * theta.sin())
    }

    /// Magnitude
    pub fn norm(&self) -> f64 {
        self.re.hypot(self.im)
    }

    /// Phase angle in radians
    pub fn arg(&self) -> f64 {
        self.im.atan2(self.re)
    }

    pub fn conj(&self) -> Self {
        Self::new(self.re, -self.im)
    }

    pub fn is_zero(&self) -> bool {
        self.re == 0.0 && self.im == 0.0
    }

    pub fn exp(&self) -> Self {
        Self::from_polar(self.re.exp(), self.im)
    }

    /// Principal natural logarithm
    pub fn ln(&self) -> Self {
        Self::new(self.norm().ln(), self.arg())
    }

    /// Principal square root
    pub fn sqrt(&self) -> Self {
        if self.is_zero() {
            return Self::new(0.0, self.im);
        }
        let r = self.norm();
        let re = ((r + self.re) / 2.0).sqrt();
        let im = ((r - self.re) / 2.0).sqrt().copysign(self.im);
        Self::new(re, im)
    }

    /// `self ** exp`; the caller rules out a zero base
    pub fn powc(&self, exp: Complex64) -> Self {
        (self.ln() * exp).exp()
    }
}

impl Add for Complex64 {
    type Output = Complex64;

    fn add(self, rhs: Complex64) -> Complex64 {
        Complex64::new(self.re + rhs.re, self.im + rhs.im)
    }
}

impl Sub for Complex64 {
    type Output = Complex64;

    fn sub(self, rhs: Complex64) -> Complex64 {
        Complex64::new(self.re - rhs.re, self.im - rhs.im)
    }
}

impl Mul for Complex64 {
    type Output = Complex64;

    fn mul(self, rhs: Complex64) -> Complex64 {
        Complex64::new(
            self.re * rhs.re - self.im * rhs.im,
            self.re * rhs.im + self.im * rhs.re,
        )
    }
}

/// Division; the caller rules out a zero divisor
impl Div for Complex64 {
    type Output = Complex64;

    fn div(self, rhs: Complex64) -> Complex64 {
        let denom = rhs.re * rhs.re + rhs.im * rhs.im;
        Complex64::new(
            (self.re * rhs.re + self.im * rhs.im) / denom,
            (self.im * rhs.re - self.re * rhs.im) / denom,
        )
    }
}

impl Neg for Complex64 {
    type Output = Complex64;

    fn neg(self) -> Complex64 {
        Complex64::new(-self.re, -self.im)
    }
}

impl From<f64> for Complex64 {
    fn from(re: f64) -> Self {
        Complex64::new(re, 0.0)
    }
}

impl fmt::Display for Complex64 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", repr::complex_repr(self.re, self.im))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Complex64, b: Complex64) -> bool {
        (a - b).norm() < 1e-12
    }

    #[test]
    fn test_arithmetic() {
        let a = Complex64::new(1.0, 2.0);
        let b = Complex64::new(3.0, -1.0);
        assert_eq!(a + b, Complex64::new(4.0, 1.0));
        assert_eq!(a * b, Complex64::new(5.0, 5.0));
        assert!(close((a * b) / b, a));
    }

    #[test]
    fn test_sqrt_and_pow() {
        assert!(close(Complex64::new(-4.0, 0.0).sqrt(), Complex64::new(0.0, 2.0)));
        let i = Complex64::new(0.0, 1.0);
        assert!(close(i.powc(Complex64::from(2.0)), Complex64::new(-1.0, 0.0)));
    }

    #[test]
    fn test_display() {
        assert_eq!(Complex64::new(0.0, 2.0).to_string(), "2j");
        assert_eq!(Complex64::new(1.0, -1.5).to_string(), "(1-1.5j)");
    }
}
