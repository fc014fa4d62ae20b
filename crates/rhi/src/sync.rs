//! Semaphores, fences, and the per-frame synchronization set.
//!
//! Queue ordering (acquire before render, render before present) is
//! expressed with [`Semaphore`]s; the host observes frame completion through
//! a [`Fence`]. [`FrameSync`] bundles one of each role, which is all a
//! single-frame-in-flight loop needs.

use std::slice;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info};

use crate::device::Device;
use crate::error::RhiResult;

/// Binary semaphore for queue-to-queue ordering.
///
/// Created unsignaled. Signal and wait operations are specified at submit
/// and present time; the wrapper only owns the handle.
pub struct Semaphore {
    device: Arc<Device>,
    raw: vk::Semaphore,
}

impl Semaphore {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let info = vk::SemaphoreCreateInfo::default();
        let raw = unsafe { device.handle().create_semaphore(&info, None)? };

        debug!("Semaphore created");
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Semaphore {
        self.raw
    }
}

impl Drop for Semaphore {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_semaphore(self.raw, None) };
        debug!("Semaphore destroyed");
    }
}

/// Fence the host waits on to learn that submitted work has finished.
pub struct Fence {
    device: Arc<Device>,
    raw: vk::Fence,
}

impl Fence {
    /// Creates a fence, optionally in the signaled state.
    ///
    /// A fence that will be waited on before the first submission that
    /// signals it must start signaled, or the first wait never returns.
    pub fn new(device: Arc<Device>, signaled: bool) -> RhiResult<Self> {
        let mut info = vk::FenceCreateInfo::default();
        if signaled {
            info = info.flags(vk::FenceCreateFlags::SIGNALED);
        }

        let raw = unsafe { device.handle().create_fence(&info, None)? };

        debug!("Fence created (signaled: {})", signaled);
        Ok(Self { device, raw })
    }

    #[inline]
    pub fn handle(&self) -> vk::Fence {
        self.raw
    }

    /// Blocks until the fence is signaled.
    ///
    /// `timeout` is in nanoseconds; `u64::MAX` waits indefinitely. An
    /// expired timeout surfaces as `vk::Result::TIMEOUT`.
    pub fn wait(&self, timeout: u64) -> RhiResult<()> {
        let fences = slice::from_ref(&self.raw);
        unsafe { self.device.handle().wait_for_fences(fences, true, timeout)? };
        Ok(())
    }

    /// Returns the fence to the unsignaled state.
    ///
    /// Must not be called while a queue submission still references the
    /// fence.
    pub fn reset(&self) -> RhiResult<()> {
        unsafe { self.device.handle().reset_fences(slice::from_ref(&self.raw))? };
        Ok(())
    }
}

impl Drop for Fence {
    fn drop(&mut self) {
        unsafe { self.device.handle().destroy_fence(self.raw, None) };
        debug!("Fence destroyed");
    }
}

/// The synchronization objects for one frame.
///
/// One `FrameSync` is created at startup and reused every frame, which
/// caps the loop at a single frame in flight. Per frame:
///
/// 1. wait on the in-flight fence, then reset it
/// 2. acquire an image, signaling `image_available`
/// 3. submit, waiting `image_available`, signaling `render_finished` and
///    the fence
/// 4. present, waiting `render_finished`
pub struct FrameSync {
    image_available: Semaphore,
    render_finished: Semaphore,
    in_flight: Fence,
}

impl FrameSync {
    pub fn new(device: Arc<Device>) -> RhiResult<Self> {
        let image_available = Semaphore::new(device.clone())?;
        let render_finished = Semaphore::new(device.clone())?;
        // Signaled from the start; frame 1 has no predecessor to wait for.
        let in_flight = Fence::new(device, true)?;

        info!("Frame synchronization objects created");

        Ok(Self {
            image_available,
            render_finished,
            in_flight,
        })
    }

    /// Semaphore signaled by swapchain image acquisition.
    #[inline]
    pub fn image_available_semaphore(&self) -> &Semaphore {
        &self.image_available
    }

    /// Semaphore signaled when the frame's commands finish executing.
    #[inline]
    pub fn render_finished_semaphore(&self) -> &Semaphore {
        &self.render_finished
    }

    /// Fence signaled by the frame's queue submission.
    #[inline]
    pub fn in_flight_fence(&self) -> &Fence {
        &self.in_flight
    }

    #[inline]
    pub fn image_available_handle(&self) -> vk::Semaphore {
        self.image_available.handle()
    }

    #[inline]
    pub fn render_finished_handle(&self) -> vk::Semaphore {
        self.render_finished.handle()
    }

    #[inline]
    pub fn in_flight_fence_handle(&self) -> vk::Fence {
        self.in_flight.handle()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn require_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_sync_objects_are_send_sync() {
        require_send_sync::<Semaphore>();
        require_send_sync::<Fence>();
        require_send_sync::<FrameSync>();
    }
}
