//! Swapchain negotiation, image acquisition, and presentation.
//!
//! [`Swapchain::new`] runs the whole negotiation against the surface
//! (format, present mode, extent, image count) and then creates the
//! swapchain plus one 2D color view per image. The chain is built once for
//! a fixed-size window; nothing here knows how to rebuild it, so
//! out-of-date surfaces surface as plain `vk::Result` errors for the
//! caller to treat as fatal.

use std::slice;
use std::sync::Arc;

use ash::vk;
use tracing::{debug, info, warn};

use crate::device::Device;
use crate::error::{RhiError, RhiResult};
use crate::instance::Instance;

/// What the surface supports, queried per candidate device.
#[derive(Debug, Clone)]
pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn query(
        device: vk::PhysicalDevice,
        surface: vk::SurfaceKHR,
        loader: &ash::khr::surface::Instance,
    ) -> RhiResult<Self> {
        let capabilities =
            unsafe { loader.get_physical_device_surface_capabilities(device, surface)? };
        let formats = unsafe { loader.get_physical_device_surface_formats(device, surface)? };
        let present_modes =
            unsafe { loader.get_physical_device_surface_present_modes(device, surface)? };

        debug!(
            "Surface support: {} format(s), {} present mode(s), images min {} max {}",
            formats.len(),
            present_modes.len(),
            capabilities.min_image_count,
            capabilities.max_image_count
        );

        Ok(Self { capabilities, formats, present_modes })
    }

    /// True when the surface reported at least one format and one present
    /// mode. A surface failing this cannot present at all.
    #[inline]
    pub fn is_adequate(&self) -> bool {
        !self.formats.is_empty() && !self.present_modes.is_empty()
    }
}

/// Presentable image chain bound to the window surface.
///
/// Owns the `vk::SwapchainKHR`, its image views, and the extension loader
/// that drives acquire and present. The images themselves belong to the
/// swapchain and are released with it.
pub struct Swapchain {
    device: Arc<Device>,
    loader: ash::khr::swapchain::Device,
    raw: vk::SwapchainKHR,
    images: Vec<vk::Image>,
    views: Vec<vk::ImageView>,
    color_format: vk::Format,
    size: vk::Extent2D,
}

impl Swapchain {
    /// Negotiates and creates the swapchain for `surface`.
    ///
    /// `width` and `height` are the window's drawable pixel size; they only
    /// matter when the surface leaves the extent to the swapchain (see
    /// [`resolve_extent`]'s sentinel handling).
    ///
    /// # Errors
    ///
    /// Fails when the surface queries fail, when the surface reports no
    /// format or present mode at all, or when swapchain or image-view
    /// creation fails.
    pub fn new(
        instance: &Instance,
        device: Arc<Device>,
        surface: vk::SurfaceKHR,
        width: u32,
        height: u32,
    ) -> RhiResult<Self> {
        let loader = ash::khr::swapchain::Device::new(instance.handle(), device.handle());
        let surface_loader = ash::khr::surface::Instance::new(instance.entry(), instance.handle());

        let support =
            SwapchainSupportDetails::query(device.physical_device(), surface, &surface_loader)?;
        if !support.is_adequate() {
            return Err(RhiError::SurfaceError(
                "Surface reports no formats or present modes".to_string(),
            ));
        }

        let picked = pick_surface_format(&support.formats);
        let mode = pick_present_mode(&support.present_modes);
        let size = resolve_extent(&support.capabilities, width, height);
        let min_images = clamp_image_count(&support.capabilities);

        let graphics_family = device.graphics_family();
        let present_family = device.present_family();
        let family_indices = [graphics_family, present_family];
        let (sharing_mode, sharing_indices): (vk::SharingMode, &[u32]) =
            if graphics_family == present_family {
                (vk::SharingMode::EXCLUSIVE, &[])
            } else {
                debug!(
                    "Graphics family {} and present family {} differ, images shared concurrently",
                    graphics_family, present_family
                );
                (vk::SharingMode::CONCURRENT, &family_indices)
            };

        let create_info = vk::SwapchainCreateInfoKHR::default()
            .surface(surface)
            .min_image_count(min_images)
            .image_format(picked.format)
            .image_color_space(picked.color_space)
            .image_extent(size)
            .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT)
            .image_array_layers(1)
            .image_sharing_mode(sharing_mode)
            .queue_family_indices(sharing_indices)
            .pre_transform(support.capabilities.current_transform)
            .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
            .present_mode(mode)
            .clipped(true);

        let raw = unsafe { loader.create_swapchain(&create_info, None)? };

        // The driver may hand back more images than the requested minimum.
        let images = unsafe { loader.get_swapchain_images(raw)? };
        let views = create_image_views(&device, &images, picked.format)?;

        info!(
            "Swapchain created: {}x{}, {:?} / {:?}, {:?}, {} image(s)",
            size.width,
            size.height,
            picked.format,
            picked.color_space,
            mode,
            images.len()
        );

        Ok(Self {
            device,
            loader,
            raw,
            images,
            views,
            color_format: picked.format,
            size,
        })
    }

    /// Acquires the next presentable image, signaling `semaphore` when the
    /// presentation engine releases it.
    ///
    /// Returns the image index and the suboptimal flag. The raw
    /// `vk::Result` is handed back on failure so the caller decides policy;
    /// with a fixed-size window every failure ends the run,
    /// `ERROR_OUT_OF_DATE_KHR` included.
    pub fn acquire_next_image(&self, semaphore: vk::Semaphore) -> Result<(u32, bool), vk::Result> {
        unsafe { self.loader.acquire_next_image(self.raw, u64::MAX, semaphore, vk::Fence::null()) }
    }

    /// Queues image `index` for presentation once `wait` fires.
    ///
    /// Returns the suboptimal flag on success and the raw `vk::Result` on
    /// failure, same policy as [`Self::acquire_next_image`].
    pub fn present(
        &self,
        queue: vk::Queue,
        index: u32,
        wait: vk::Semaphore,
    ) -> Result<bool, vk::Result> {
        let present_info = vk::PresentInfoKHR::default()
            .wait_semaphores(slice::from_ref(&wait))
            .swapchains(slice::from_ref(&self.raw))
            .image_indices(slice::from_ref(&index));

        unsafe { self.loader.queue_present(queue, &present_info) }
    }

    #[inline]
    pub fn handle(&self) -> vk::SwapchainKHR {
        self.raw
    }

    #[inline]
    pub fn format(&self) -> vk::Format {
        self.color_format
    }

    #[inline]
    pub fn extent(&self) -> vk::Extent2D {
        self.size
    }

    #[inline]
    pub fn image_count(&self) -> u32 {
        self.images.len() as u32
    }

    /// One view per swapchain image, in image order.
    #[inline]
    pub fn image_views(&self) -> &[vk::ImageView] {
        &self.views
    }
}

impl Drop for Swapchain {
    fn drop(&mut self) {
        // Views before the swapchain; the images go with the swapchain.
        for view in self.views.drain(..) {
            unsafe { self.device.handle().destroy_image_view(view, None) };
        }
        unsafe { self.loader.destroy_swapchain(self.raw, None) };

        info!(
            "Swapchain destroyed ({}x{}, {} image(s))",
            self.size.width,
            self.size.height,
            self.images.len()
        );
    }
}

/// Picks `B8G8R8A8_SRGB` with the `SRGB_NONLINEAR` color space when the
/// surface offers that pair, otherwise settles for the first reported
/// format.
fn pick_surface_format(formats: &[vk::SurfaceFormatKHR]) -> vk::SurfaceFormatKHR {
    let wanted = formats.iter().copied().find(|f| {
        f.format == vk::Format::B8G8R8A8_SRGB && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
    });

    match wanted {
        Some(format) => {
            debug!("Surface format: B8G8R8A8_SRGB / SRGB_NONLINEAR");
            format
        }
        None => {
            warn!(
                "Preferred surface format unavailable, using {:?}",
                formats[0].format
            );
            formats[0]
        }
    }
}

/// Picks MAILBOX when offered, else FIFO. FIFO support is mandatory per
/// the Vulkan contract, so even an empty mode list resolves.
fn pick_present_mode(modes: &[vk::PresentModeKHR]) -> vk::PresentModeKHR {
    if modes.contains(&vk::PresentModeKHR::MAILBOX) {
        debug!("Present mode: MAILBOX");
        vk::PresentModeKHR::MAILBOX
    } else {
        debug!("Present mode: FIFO");
        vk::PresentModeKHR::FIFO
    }
}

/// Resolves the swapchain extent.
///
/// A current extent width of `u32::MAX` is the sentinel for "the swapchain
/// decides": the window's pixel size is then clamped per axis into the
/// surface's supported range. Any other current extent is binding.
fn resolve_extent(caps: &vk::SurfaceCapabilitiesKHR, width: u32, height: u32) -> vk::Extent2D {
    if caps.current_extent.width != u32::MAX {
        return caps.current_extent;
    }

    let min = caps.min_image_extent;
    let max = caps.max_image_extent;
    let chosen = vk::Extent2D {
        width: width.clamp(min.width, max.width),
        height: height.clamp(min.height, max.height),
    };

    debug!(
        "Clamped window size {}x{} to swapchain extent {}x{}",
        width, height, chosen.width, chosen.height
    );
    chosen
}

/// Requests one image beyond the surface minimum, clamped to the surface
/// maximum when one is reported (0 means unbounded).
fn clamp_image_count(capabilities: &vk::SurfaceCapabilitiesKHR) -> u32 {
    let mut count = capabilities.min_image_count + 1;
    if capabilities.max_image_count > 0 {
        count = count.min(capabilities.max_image_count);
    }
    count
}

fn create_image_views(
    device: &Device,
    images: &[vk::Image],
    color_format: vk::Format,
) -> RhiResult<Vec<vk::ImageView>> {
    let mut views = Vec::with_capacity(images.len());

    for (index, &image) in images.iter().enumerate() {
        let subresource = vk::ImageSubresourceRange::default()
            .aspect_mask(vk::ImageAspectFlags::COLOR)
            .base_mip_level(0)
            .level_count(1)
            .base_array_layer(0)
            .layer_count(1);

        // Component mapping is left at the default, the identity swizzle.
        let create_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .format(color_format)
            .view_type(vk::ImageViewType::TYPE_2D)
            .subresource_range(subresource);

        let view = unsafe { device.handle().create_image_view(&create_info, None) }.map_err(
            |e| RhiError::SwapchainError(format!("Image view {index} creation failed: {e:?}")),
        )?;
        views.push(view);
    }

    debug!("Created {} swapchain image view(s)", views.len());
    Ok(views)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format, color_space: vk::ColorSpaceKHR) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR { format, color_space }
    }

    fn extent(width: u32, height: u32) -> vk::Extent2D {
        vk::Extent2D { width, height }
    }

    #[test]
    fn test_preferred_format_wins_at_any_position() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = pick_surface_format(&formats);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_SRGB);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_format_and_color_space_must_match_together() {
        // The right format in the wrong color space does not count.
        let formats = vec![
            surface_format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::EXTENDED_SRGB_LINEAR_EXT,
            ),
            surface_format(vk::Format::B8G8R8A8_SRGB, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        let chosen = pick_surface_format(&formats);
        assert_eq!(chosen.color_space, vk::ColorSpaceKHR::SRGB_NONLINEAR);
    }

    #[test]
    fn test_first_format_wins_without_the_preferred_pair() {
        let formats = vec![
            surface_format(vk::Format::R8G8B8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
            surface_format(vk::Format::B8G8R8A8_UNORM, vk::ColorSpaceKHR::SRGB_NONLINEAR),
        ];

        assert_eq!(
            pick_surface_format(&formats).format,
            vk::Format::R8G8B8A8_UNORM
        );
    }

    #[test]
    fn test_mailbox_preferred_when_offered() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO,
            vk::PresentModeKHR::MAILBOX,
        ];
        assert_eq!(pick_present_mode(&modes), vk::PresentModeKHR::MAILBOX);
    }

    #[test]
    fn test_fifo_otherwise_even_for_an_empty_list() {
        let modes = [
            vk::PresentModeKHR::IMMEDIATE,
            vk::PresentModeKHR::FIFO_RELAXED,
        ];
        assert_eq!(pick_present_mode(&modes), vk::PresentModeKHR::FIFO);

        // FIFO is mandatory, so an empty queried list still resolves to it.
        assert_eq!(pick_present_mode(&[]), vk::PresentModeKHR::FIFO);
    }

    #[test]
    fn test_fixed_current_extent_is_binding() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(1280, 720),
            min_image_extent: extent(1, 1),
            max_image_extent: extent(16384, 16384),
            ..Default::default()
        };

        // The window size loses against a fixed current extent.
        let chosen = resolve_extent(&caps, 640, 480);
        assert_eq!(chosen.width, 1280);
        assert_eq!(chosen.height, 720);
    }

    #[test]
    fn test_sentinel_extent_clamps_each_axis_independently() {
        let caps = vk::SurfaceCapabilitiesKHR {
            current_extent: extent(u32::MAX, u32::MAX),
            min_image_extent: extent(200, 150),
            max_image_extent: extent(1600, 900),
            ..Default::default()
        };

        // Width above the max and height below the min clamp separately.
        let chosen = resolve_extent(&caps, 2560, 100);
        assert_eq!(chosen.width, 1600);
        assert_eq!(chosen.height, 150);

        // In-range sizes pass through untouched.
        let chosen = resolve_extent(&caps, 800, 600);
        assert_eq!(chosen.width, 800);
        assert_eq!(chosen.height, 600);
    }

    #[test]
    fn test_image_count_is_min_plus_one() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 3,
            max_image_count: 8,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&caps), 4);
    }

    #[test]
    fn test_image_count_respects_surface_maximum() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 2,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&caps), 2);
    }

    #[test]
    fn test_image_count_unbounded_when_max_is_zero() {
        let caps = vk::SurfaceCapabilitiesKHR {
            min_image_count: 2,
            max_image_count: 0,
            ..Default::default()
        };
        assert_eq!(clamp_image_count(&caps), 3);
    }

    #[test]
    fn test_support_is_adequate_needs_both_lists() {
        let support = SwapchainSupportDetails {
            capabilities: vk::SurfaceCapabilitiesKHR::default(),
            formats: vec![surface_format(
                vk::Format::B8G8R8A8_SRGB,
                vk::ColorSpaceKHR::SRGB_NONLINEAR,
            )],
            present_modes: vec![vk::PresentModeKHR::FIFO],
        };
        assert!(support.is_adequate());

        let without_formats = SwapchainSupportDetails {
            formats: vec![],
            ..support.clone()
        };
        assert!(!without_formats.is_adequate());

        let without_modes = SwapchainSupportDetails {
            present_modes: vec![],
            ..support
        };
        assert!(!without_modes.is_adequate());
    }
}
