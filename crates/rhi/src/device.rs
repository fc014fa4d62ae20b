//! Logical device creation and queue access.
//!
//! [`Device::new`] turns a selected physical device into a `VkDevice` with
//! the swapchain extension enabled and one queue per distinct family. The
//! wrapper is reference-counted; every RHI object that needs the device
//! holds an `Arc<Device>` so teardown order falls out of ownership.

use std::ffi::c_char;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;
use crate::physical_device::{PhysicalDeviceInfo, REQUIRED_DEVICE_EXTENSIONS};

/// The logical device, its queues, and the family indices they came from.
///
/// Graphics and present queues may be the same underlying queue when both
/// roles resolve to one family. The family indices are validated once here;
/// dependants read them back as plain `u32`s.
pub struct Device {
    raw: ash::Device,
    gpu: vk::PhysicalDevice,
    graphics: vk::Queue,
    present: vk::Queue,
    graphics_index: u32,
    present_index: u32,
}

impl Device {
    /// Creates the logical device for a selected candidate.
    ///
    /// Requests a single priority-1.0 queue per distinct resolved family,
    /// enables the swapchain extension, and retrieves both queue handles.
    ///
    /// # Errors
    ///
    /// Fails when either family index is missing from the candidate, when
    /// device creation fails, or when the driver returns a null queue
    /// handle (the half-created device is destroyed before the error is
    /// returned).
    pub fn new(instance: &Instance, candidate: &PhysicalDeviceInfo) -> RhiResult<Arc<Self>> {
        let families = &candidate.queue_families;

        let graphics_index = families.graphics_family.ok_or_else(|| {
            RhiError::InvalidHandle("Graphics queue family index missing".to_string())
        })?;
        let present_index = families.present_family.ok_or_else(|| {
            RhiError::InvalidHandle("Present queue family index missing".to_string())
        })?;

        // One create info per distinct family; aliasing roles collapse.
        let distinct_families = families.unique_families();
        let priorities = [1.0f32];
        let queue_infos: Vec<_> = distinct_families
            .iter()
            .map(|&index| {
                vk::DeviceQueueCreateInfo::default()
                    .queue_family_index(index)
                    .queue_priorities(&priorities)
            })
            .collect();

        debug!(
            "Requesting {} queue(s) across families {:?}",
            queue_infos.len(),
            distinct_families
        );

        // Clearing and presenting needs no optional device features.
        let features = vk::PhysicalDeviceFeatures::default();

        let extensions: Vec<*const c_char> = REQUIRED_DEVICE_EXTENSIONS
            .iter()
            .map(|name| name.as_ptr())
            .collect();

        let create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_infos)
            .enabled_extension_names(&extensions)
            .enabled_features(&features);

        let device =
            unsafe { instance.handle().create_device(candidate.device, &create_info, None)? };
        info!(
            "Logical device created ({} device extension(s))",
            REQUIRED_DEVICE_EXTENSIONS.len()
        );

        let Some(graphics) = device_queue(&device, graphics_index) else {
            unsafe { device.destroy_device(None) };
            return Err(RhiError::InvalidHandle(format!(
                "Graphics queue from family {graphics_index} is null"
            )));
        };
        let Some(present) = device_queue(&device, present_index) else {
            unsafe { device.destroy_device(None) };
            return Err(RhiError::InvalidHandle(format!(
                "Present queue from family {present_index} is null"
            )));
        };
        debug!(
            "Queues retrieved (graphics family {}, present family {})",
            graphics_index, present_index
        );

        Ok(Arc::new(Self {
            raw: device,
            gpu: candidate.device,
            graphics,
            present,
            graphics_index,
            present_index,
        }))
    }

    #[inline]
    pub fn handle(&self) -> &ash::Device {
        &self.raw
    }

    #[inline]
    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.gpu
    }

    #[inline]
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics
    }

    #[inline]
    pub fn present_queue(&self) -> vk::Queue {
        self.present
    }

    #[inline]
    pub fn graphics_family(&self) -> u32 {
        self.graphics_index
    }

    #[inline]
    pub fn present_family(&self) -> u32 {
        self.present_index
    }

    /// Blocks until every queue on the device has drained.
    pub fn wait_idle(&self) -> RhiResult<()> {
        unsafe { self.raw.device_wait_idle()? };
        Ok(())
    }

    /// Submits to the graphics queue, signaling `fence` on completion.
    ///
    /// # Safety
    ///
    /// The submit infos must reference recorded command buffers and live
    /// semaphores, and `fence` must be unsignaled and not in use by a
    /// previous submission.
    pub unsafe fn submit_graphics(
        &self,
        infos: &[vk::SubmitInfo],
        fence: vk::Fence,
    ) -> RhiResult<()> {
        unsafe { self.raw.queue_submit(self.graphics, infos, fence)? };
        Ok(())
    }
}

impl Drop for Device {
    fn drop(&mut self) {
        // The device must be idle before destruction.
        if let Err(e) = self.wait_idle() {
            tracing::error!("Device wait during teardown failed: {:?}", e);
        }
        unsafe { self.raw.destroy_device(None) };
        info!("Device destroyed");
    }
}

/// Retrieves queue 0 of `family`, or `None` when the driver hands back a
/// null handle.
fn device_queue(device: &ash::Device, family: u32) -> Option<vk::Queue> {
    let queue = unsafe { device.get_device_queue(family, 0) };
    (queue != vk::Queue::null()).then_some(queue)
}

// Safety: ash::Device is Send+Sync, and the remaining fields are raw handle
// values and plain integers.
unsafe impl Send for Device {}
unsafe impl Sync for Device {}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_swapchain_extension_is_required() {
        assert!(REQUIRED_DEVICE_EXTENSIONS.contains(&ash::khr::swapchain::NAME));
    }

    #[test]
    fn test_device_is_shareable_across_threads() {
        assert_send_sync::<Device>();
    }
}
