//! Pointer and touch samples turned into splat requests.
//!
//! Hosts forward raw pixel coordinates (top-left origin). Each pointer keeps
//! its own color and delta; any number of move events between two frames
//! coalesce into a single splat per pointer.

use std::collections::BTreeMap;

use crate::color::ColorGenerator;
use crate::resolution::aspect_ratio;
use crate::types::{Rgb, SplatRequest};

/// Platform-assigned contact identifier (mouse, finger, pen).
pub type PointerId = u64;

/// State of one active contact.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pointer {
    pub id: PointerId,
    pub position: [f32; 2],
    pub previous: [f32; 2],
    pub delta: [f32; 2],
    pub down: bool,
    pub moved: bool,
    pub color: Rgb,
}

/// Tracks concurrent pointers against the current viewport.
#[derive(Debug, Clone)]
pub struct PointerTracker {
    pointers: BTreeMap<PointerId, Pointer>,
    colors: ColorGenerator,
    viewport: (u32, u32),
}

impl PointerTracker {
    pub fn new(width: u32, height: u32, colors: ColorGenerator) -> Self {
        Self {
            pointers: BTreeMap::new(),
            colors,
            viewport: (width.max(1), height.max(1)),
        }
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.viewport = (width.max(1), height.max(1));
    }

    pub fn viewport(&self) -> (u32, u32) {
        self.viewport
    }

    pub fn active(&self) -> impl Iterator<Item = &Pointer> {
        self.pointers.values()
    }

    pub fn is_active(&self) -> bool {
        !self.pointers.is_empty()
    }

    pub fn get(&self, id: PointerId) -> Option<&Pointer> {
        self.pointers.get(&id)
    }

    /// Converts a pixel position into bottom-left-origin UV space.
    pub fn to_uv(&self, x: f64, y: f64) -> [f32; 2] {
        let (width, height) = self.viewport;
        [
            (x / width as f64) as f32,
            1.0 - (y / height as f64) as f32,
        ]
    }

    /// Registers a new contact with a fresh color and zero delta.
    pub fn pointer_down(&mut self, id: PointerId, x: f64, y: f64) {
        let uv = self.to_uv(x, y);
        let color = self.colors.next_color();
        self.pointers.insert(
            id,
            Pointer {
                id,
                position: uv,
                previous: uv,
                delta: [0.0, 0.0],
                down: true,
                moved: false,
                color,
            },
        );
    }

    /// Updates a contact; moves of unknown pointers are ignored.
    pub fn pointer_move(&mut self, id: PointerId, x: f64, y: f64) {
        let uv = self.to_uv(x, y);
        let aspect = aspect_ratio(self.viewport.0, self.viewport.1);
        let Some(pointer) = self.pointers.get_mut(&id) else {
            return;
        };
        pointer.previous = pointer.position;
        pointer.position = uv;
        let raw = [uv[0] - pointer.previous[0], uv[1] - pointer.previous[1]];
        let corrected = correct_delta(raw, aspect);
        if pointer.moved {
            pointer.delta[0] += corrected[0];
            pointer.delta[1] += corrected[1];
        } else {
            pointer.delta = corrected;
        }
        pointer.moved = pointer.delta[0].abs() > 0.0 || pointer.delta[1].abs() > 0.0;
    }

    /// Removes a contact. Later splats near its position never reuse its color.
    pub fn pointer_up(&mut self, id: PointerId) -> Option<Pointer> {
        self.pointers.remove(&id).map(|mut pointer| {
            pointer.down = false;
            pointer
        })
    }

    /// Emits at most one splat per moved pointer and clears the `moved` flags.
    pub fn drain_splats(&mut self, force: f32) -> Vec<SplatRequest> {
        let mut splats = Vec::new();
        for pointer in self.pointers.values_mut() {
            if !pointer.moved {
                continue;
            }
            pointer.moved = false;
            splats.push(SplatRequest {
                position: pointer.position,
                impulse: [pointer.delta[0] * force, pointer.delta[1] * force],
                color: pointer.color,
            });
            pointer.delta = [0.0, 0.0];
        }
        splats
    }

    pub fn clear(&mut self) {
        self.pointers.clear();
    }
}

/// Rescales a UV-space delta so equal screen distances produce equal impulses
/// on both axes.
pub fn correct_delta(delta: [f32; 2], aspect: f32) -> [f32; 2] {
    let mut corrected = delta;
    if aspect < 1.0 {
        corrected[0] *= aspect;
    }
    if aspect > 1.0 {
        corrected[1] /= aspect;
    }
    corrected
}
