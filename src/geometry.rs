use rapier2d::prelude::*;

pub type Vec2 = Vector<Real>;

/// Axis aligned rectangle anchored at its top left corner, y pointing down.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub pos: Vec2,
    pub dim: Vec2,
}

impl Rect {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self {
            pos: vector![x, y],
            dim: vector![w, h],
        }
    }

    pub fn min(&self) -> Vec2 {
        self.pos
    }

    pub fn max(&self) -> Vec2 {
        self.pos + self.dim
    }
}

/// Open interval overlap on both axes. Rectangles that only share an edge do
/// not overlap.
pub fn overlaps(a: &Rect, b: &Rect) -> bool {
    (0..2).all(|i| {
        let (a_min, a_max) = (a.min()[i], a.max()[i]);
        let (b_min, b_max) = (b.min()[i], b.max()[i]);
        (a_max > b_min && a_min < b_max) || (b_max > a_min && b_min < a_max)
    })
}

/// Whether `body` stands on the top face of `support`: the two overlap
/// horizontally and the bottom edge of `body` lies within the vertical span
/// of `support`, its top edge included. Contact with a side or the bottom
/// face does not count.
pub fn rests_on(body: &Rect, support: &Rect) -> bool {
    // The body's column, clipped to the support's height.
    let column = Rect {
        pos: vector![body.pos.x, support.pos.y],
        dim: vector![body.dim.x, support.dim.y],
    };
    let feet = body.max().y;
    overlaps(&column, support) && feet >= support.min().y && feet <= support.max().y
}
