//! wgpu backend for the shadow data: texture arrays, clears, the update kernel and read-back.

mod device;
mod readback;
mod update_kernel;

pub use device::{request_headless_device, GpuCascadeDevice, GpuTextureArray, HeadlessGpu, NullShadowArray};
pub use readback::read_layer;
pub use update_kernel::{
    KernelExecuteParams, UpdateShadowKernel, UpdateShadowUniform, UNIFORM_STRIDE, WORKGROUP_SIZE,
};

use crate::manager::ShadowBinding;

/// The view a shading pass should sample: accumulated cascades, or the all-lit placeholder.
pub fn shading_view<'a>(
    binding: &ShadowBinding<'a, GpuTextureArray>,
    null: &'a NullShadowArray,
) -> &'a wgpu::TextureView {
    match binding {
        ShadowBinding::Cascades { array, .. } => array.array_view(),
        ShadowBinding::Null => null.array_view(),
    }
}
