//! # Debug drawing
//!
//! Planners describe what they are doing by emitting primitives onto named
//! layers through a [`DebugSink`]. A sink is always optional: planning with
//! no sink attached is a legal no-op, so nothing in the core may depend on a
//! draw call for correctness.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use nalgebra::{Point2, Vector2};
use serde::Serialize;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// An RGB colour for debug drawing.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const BLACK: Colour = Colour { r: 0, g: 0, b: 0 };
    pub const RED: Colour = Colour { r: 255, g: 0, b: 0 };
    pub const GREEN: Colour = Colour { r: 0, g: 200, b: 0 };
    pub const BLUE: Colour = Colour { r: 0, g: 80, b: 255 };
    pub const YELLOW: Colour = Colour {
        r: 255,
        g: 200,
        b: 0,
    };
    pub const GREY: Colour = Colour {
        r: 128,
        g: 128,
        b: 128,
    };
}

/// A single drawable primitive.
#[derive(Debug, Clone, Serialize)]
pub enum DrawItem {
    Polyline {
        layer: String,
        colour: Colour,
        points_m: Vec<Point2<f64>>,
    },
    Vector {
        layer: String,
        colour: Colour,
        origin_m: Point2<f64>,
        vector: Vector2<f64>,
    },
    Point {
        layer: String,
        colour: Colour,
        point_m: Point2<f64>,
    },
    Text {
        layer: String,
        colour: Colour,
        at_m: Point2<f64>,
        text: String,
    },
}

/// One cycle's worth of draw primitives.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DrawFrame {
    pub cycle: u128,
    pub items: Vec<DrawItem>,
}

/// A sink which records draw frames and saves them into the session
/// directory as JSON, one file per cycle.
#[derive(Default)]
pub struct SessionSink {
    frame: DrawFrame,
}

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Receiver for debug draw primitives.
pub trait DebugSink {
    fn polyline(&mut self, layer: &str, colour: Colour, points_m: &[Point2<f64>]);

    fn vector(&mut self, layer: &str, colour: Colour, origin_m: Point2<f64>, vector: Vector2<f64>);

    fn point(&mut self, layer: &str, colour: Colour, point_m: Point2<f64>);

    fn text(&mut self, layer: &str, colour: Colour, at_m: Point2<f64>, text: &str);
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SessionSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Save the collected frame for the given cycle and start a fresh one.
    pub fn flush(&mut self, cycle: u128) {
        let mut frame = std::mem::take(&mut self.frame);
        frame.cycle = cycle;
        util::session::save(format!("draw/frame_{:06}.json", cycle), frame);
    }
}

impl DebugSink for SessionSink {
    fn polyline(&mut self, layer: &str, colour: Colour, points_m: &[Point2<f64>]) {
        self.frame.items.push(DrawItem::Polyline {
            layer: layer.into(),
            colour,
            points_m: points_m.to_vec(),
        });
    }

    fn vector(&mut self, layer: &str, colour: Colour, origin_m: Point2<f64>, vector: Vector2<f64>) {
        self.frame.items.push(DrawItem::Vector {
            layer: layer.into(),
            colour,
            origin_m,
            vector,
        });
    }

    fn point(&mut self, layer: &str, colour: Colour, point_m: Point2<f64>) {
        self.frame.items.push(DrawItem::Point {
            layer: layer.into(),
            colour,
            point_m,
        });
    }

    fn text(&mut self, layer: &str, colour: Colour, at_m: Point2<f64>, text: &str) {
        self.frame.items.push(DrawItem::Text {
            layer: layer.into(),
            colour,
            at_m,
            text: text.into(),
        });
    }
}
