//! 3D coordinates for a molecule.

use serde::{Deserialize, Serialize};

pub type Point = [f64; 3];

/// Ordered coordinates, one per atom of the molecule they were embedded
/// from, index-aligned with its atoms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conformer {
    coords: Vec<Point>,
}

impl Conformer {
    pub fn new(coords: Vec<Point>) -> Self {
        Self { coords }
    }

    pub fn coords(&self) -> &[Point] {
        &self.coords
    }

    pub fn into_coords(self) -> Vec<Point> {
        self.coords
    }

    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Arithmetic mean of all coordinates; the origin for an empty conformer.
    pub fn centroid(&self) -> Point {
        if self.coords.is_empty() {
            return [0.0; 3];
        }
        let n = self.coords.len() as f64;
        let sum = self.coords.iter().fold([0.0; 3], |acc, p| add(acc, *p));
        scale(sum, 1.0 / n)
    }

    /// Shift every atom by `delta`.
    pub fn translate(&mut self, delta: Point) {
        for p in &mut self.coords {
            *p = add(*p, delta);
        }
    }

    pub fn translated(&self, delta: Point) -> Conformer {
        let mut moved = self.clone();
        moved.translate(delta);
        moved
    }

    pub fn distance(&self, i: usize, j: usize) -> f64 {
        norm(sub(self.coords[i], self.coords[j]))
    }

    pub fn is_finite(&self) -> bool {
        self.coords.iter().flatten().all(|c| c.is_finite())
    }

    /// True when every z coordinate is zero (a 2D layout).
    pub fn is_flat(&self) -> bool {
        self.coords.iter().all(|p| p[2] == 0.0)
    }
}

pub(crate) fn add(a: Point, b: Point) -> Point {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

pub(crate) fn sub(a: Point, b: Point) -> Point {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub(crate) fn scale(a: Point, k: f64) -> Point {
    [a[0] * k, a[1] * k, a[2] * k]
}

pub(crate) fn dot(a: Point, b: Point) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

pub(crate) fn norm(a: Point) -> f64 {
    dot(a, a).sqrt()
}
