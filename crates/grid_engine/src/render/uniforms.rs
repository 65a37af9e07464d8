//! Per-frame uniform data
//!
//! One `UniformBufferObject` is written into the active frame slot's
//! persistently mapped buffer at the start of every frame.

use nalgebra::{Matrix4, Point3, Vector3};

/// Model/view/projection matrices consumed by the vertex shader
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct UniformBufferObject {
    /// Model transformation (column-major)
    pub model: [[f32; 4]; 4],
    /// View transformation (column-major)
    pub view: [[f32; 4]; 4],
    /// Projection transformation (column-major, Vulkan clip space)
    pub proj: [[f32; 4]; 4],
}

unsafe impl bytemuck::Pod for UniformBufferObject {}
unsafe impl bytemuck::Zeroable for UniformBufferObject {}

impl UniformBufferObject {
    /// Identity transforms
    pub fn identity() -> Self {
        let identity: [[f32; 4]; 4] = Matrix4::identity().into();
        Self {
            model: identity,
            view: identity,
            proj: identity,
        }
    }

    /// A simple orbiting-camera setup for the demo scene
    ///
    /// `aspect` is width/height of the current swapchain extent;
    /// `angle_rad` rotates the model around the Z axis.
    pub fn orbiting(angle_rad: f32, aspect: f32) -> Self {
        let model = Matrix4::from_axis_angle(&Vector3::z_axis(), angle_rad);

        let view = Matrix4::look_at_rh(
            &Point3::new(1.2, 1.2, 1.2),
            &Point3::origin(),
            &Vector3::z(),
        );

        // nalgebra produces OpenGL clip space; Vulkan's Y axis points down.
        let mut proj = Matrix4::new_perspective(aspect, 45.0_f32.to_radians(), 0.1, 10.0);
        proj[(1, 1)] *= -1.0;

        Self {
            model: model.into(),
            view: view.into(),
            proj: proj.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identity_has_unit_diagonal() {
        let ubo = UniformBufferObject::identity();
        for i in 0..4 {
            assert_relative_eq!(ubo.model[i][i], 1.0);
            assert_relative_eq!(ubo.view[i][i], 1.0);
            assert_relative_eq!(ubo.proj[i][i], 1.0);
        }
    }

    #[test]
    fn projection_flips_y_for_vulkan() {
        let ubo = UniformBufferObject::orbiting(0.0, 4.0 / 3.0);
        // Column-major: [1][1] is the Y scale term, negative in Vulkan clip space.
        assert!(ubo.proj[1][1] < 0.0);
    }
}
