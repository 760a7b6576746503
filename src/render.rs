use raylib::prelude::{Color, RaylibDraw, RaylibDrawHandle, Rectangle};

use crate::geometry::Rect;

pub type Rgba = [u8; 4];

pub const RED: Rgba = [230, 41, 55, 255];
pub const BLUE: Rgba = [0, 121, 241, 255];
pub const MARKER: Rgba = [245, 245, 245, 255];

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shape {
    pub rect: Rect,
    pub color: Rgba,
}

/// Read only snapshot of everything drawable, taken between ticks.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub width: f32,
    pub height: f32,
    pub round: u64,
    pub shapes: Vec<Shape>,
}

pub trait RenderSink {
    fn draw(&mut self, scene: &Scene);
}

pub struct RaylibSink<'a, 'b> {
    d: &'a mut RaylibDrawHandle<'b>,
    scale_w: f32,
    scale_h: f32,
}

impl<'a, 'b> RaylibSink<'a, 'b> {
    pub fn new(
        d: &'a mut RaylibDrawHandle<'b>,
        screen_width: i32,
        screen_height: i32,
        scene: &Scene,
    ) -> Self {
        let scale_w = screen_width as f32 / scene.width;
        let scale_h = screen_height as f32 / scene.height;
        Self {
            d,
            scale_w,
            scale_h,
        }
    }

    fn scale_rect(&self, rect: &Rect) -> Rectangle {
        Rectangle::new(
            rect.pos.x * self.scale_w,
            rect.pos.y * self.scale_h,
            rect.dim.x * self.scale_w,
            rect.dim.y * self.scale_h,
        )
    }
}

impl RenderSink for RaylibSink<'_, '_> {
    fn draw(&mut self, scene: &Scene) {
        self.d.clear_background(Color::DIMGRAY);
        for shape in &scene.shapes {
            let [r, g, b, a] = shape.color;
            let rect = self.scale_rect(&shape.rect);
            self.d.draw_rectangle_rec(rect, Color::new(r, g, b, a));
        }
        let round = format!("round {}", scene.round);
        self.d.draw_text(&round, 10, 10, 20, Color::LINEN.alpha(0.5));
    }
}
