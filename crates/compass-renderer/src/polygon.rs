use bytemuck::{Pod, Zeroable};
use glam::{Affine2, Vec2, Vec3};
use std::f32::consts::TAU;

/// The compass gizmo is always a triangle.
pub const TRIANGLE_SIDES: usize = 3;

/// Vertex format for the polygon fill.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct PolygonVertex {
    /// Clip-space position.
    pub position: [f32; 2],
    /// Linear RGB.
    pub color: [f32; 3],
}

impl PolygonVertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Self>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                // position
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x2,
                },
                // color
                wgpu::VertexAttribute {
                    offset: 8,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Drawing area for the polygon, in surface pixels (Y down).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Canvas {
    /// Top-left corner within the surface.
    pub origin: Vec2,
    pub size: Vec2,
    /// Gap between the polygon's circumcircle and the canvas edge.
    pub margin: f32,
}

impl Canvas {
    pub fn new(origin: Vec2, size: Vec2, margin: f32) -> Self {
        Self {
            origin,
            size,
            margin,
        }
    }

    /// A square canvas of side `side` centered in a `surface` sized area.
    /// Shrinks to fit when the surface is smaller than `side`.
    pub fn centered(surface: Vec2, side: f32, margin: f32) -> Self {
        let side = side.min(surface.x).min(surface.y).max(0.0);
        let size = Vec2::splat(side);
        Self::new((surface - size) / 2.0, size, margin)
    }

    pub fn center(&self) -> Vec2 {
        self.origin + self.size / 2.0
    }

    /// `min(width, height) / 2 - margin`. May be zero or negative when the
    /// canvas is smaller than twice the margin.
    pub fn radius(&self) -> f32 {
        self.size.x.min(self.size.y) / 2.0 - self.margin
    }

    /// Unrotated triangle for this canvas.
    pub fn triangle(&self) -> Vec<Vec2> {
        vertices(self.center(), self.radius(), TRIANGLE_SIDES)
    }

    /// Triangle rotated by `degrees` about the canvas center.
    pub fn rotated_triangle(&self, degrees: f32) -> Vec<Vec2> {
        rotate(&self.triangle(), self.center(), degrees)
    }
}

/// Corners of a regular polygon, unrotated.
///
/// Vertex `i` sits at angle `2π·i/side_count` from the positive X axis, at
/// distance `radius` from `center`.
pub fn vertices(center: Vec2, radius: f32, side_count: usize) -> Vec<Vec2> {
    let step = TAU / side_count as f32;
    (0..side_count)
        .map(|i| {
            let angle = step * i as f32;
            center + radius * Vec2::new(angle.cos(), angle.sin())
        })
        .collect()
}

/// Rotate `points` by `degrees` about `center`.
///
/// Uses the standard rotation matrix. In a Y-down surface positive angles
/// therefore turn clockwise on screen, the same sense as a compass heading.
pub fn rotate(points: &[Vec2], center: Vec2, degrees: f32) -> Vec<Vec2> {
    let transform = rotation_about(center, degrees);
    points
        .iter()
        .map(|&p| transform.transform_point2(p))
        .collect()
}

/// Affine transform rotating by `degrees` about `center`.
pub fn rotation_about(center: Vec2, degrees: f32) -> Affine2 {
    Affine2::from_translation(center)
        * Affine2::from_angle(degrees.to_radians())
        * Affine2::from_translation(-center)
}

/// Convert surface pixel positions into clip-space vertices.
pub fn to_clip_space(points: &[Vec2], surface: Vec2, color: Vec3) -> Vec<PolygonVertex> {
    points
        .iter()
        .map(|p| PolygonVertex {
            position: [p.x / surface.x * 2.0 - 1.0, 1.0 - p.y / surface.y * 2.0],
            color: color.to_array(),
        })
        .collect()
}
