//! Physical device (GPU) enumeration, scoring and selection.
//!
//! # Overview
//!
//! Selection works in three steps:
//! 1. Enumerate all GPUs and snapshot their properties, features, queue
//!    families and extension support
//! 2. Rate every candidate: `-1` marks a device that cannot run the renderer
//!    at all, otherwise higher is better (discrete GPUs win)
//! 3. Rank candidates by score and pick the one at the configured rank
//!
//! Every candidate stays in the ranked list, including unusable ones, so a
//! configured index addresses a stable, predictable ordering.
//!
//! # Example
//!
//! ```no_run
//! use glimmer_rhi::physical_device::select_physical_device;
//! use ash::vk;
//!
//! # fn example(
//! #     instance: &ash::Instance,
//! #     surface_loader: &ash::khr::surface::Instance,
//! # ) -> Result<(), glimmer_rhi::RhiError> {
//! let surface: vk::SurfaceKHR = vk::SurfaceKHR::null(); // from the window
//! let info = select_physical_device(instance, surface, surface_loader, 0)?;
//! println!("Selected GPU: {}", info.device_name());
//! # Ok(())
//! # }
//! ```

use std::ffi::CStr;

use ash::vk;
use tracing::{debug, info, warn};

use crate::error::{RhiError, RhiResult};

/// Device extensions every candidate must support to be usable.
pub const REQUIRED_DEVICE_EXTENSIONS: &[&CStr] = &[ash::khr::swapchain::NAME];

/// Queue family indices resolved against a target surface.
///
/// A candidate needs one family with graphics support and one family able to
/// present to the surface. The two roles may resolve to the same index.
#[derive(Clone, Copy, Debug, Default)]
pub struct QueueFamilyIndices {
    /// Index of the first queue family that supports graphics operations.
    pub graphics_family: Option<u32>,
    /// Index of the first queue family that can present to the surface.
    pub present_family: Option<u32>,
}

impl QueueFamilyIndices {
    /// Checks if both required queue families were found.
    #[inline]
    pub fn is_complete(&self) -> bool {
        self.graphics_family.is_some() && self.present_family.is_some()
    }

    /// Returns the distinct queue family indices.
    ///
    /// Used when creating the logical device to avoid requesting two queues
    /// from the same family when graphics and present share one.
    pub fn unique_families(&self) -> Vec<u32> {
        let mut families = Vec::with_capacity(2);
        for family in [self.graphics_family, self.present_family].into_iter().flatten() {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

/// Snapshot of a physical device taken during enumeration.
///
/// Holds everything scoring and logical-device creation need, so no further
/// queries against the candidate are required after enumeration.
#[derive(Clone)]
pub struct PhysicalDeviceInfo {
    /// Raw physical device handle.
    pub device: vk::PhysicalDevice,
    /// Properties reported by the driver (name, type, limits).
    pub properties: vk::PhysicalDeviceProperties,
    /// Feature set the device advertises.
    pub features: vk::PhysicalDeviceFeatures,
    /// Queue family indices resolved against the target surface.
    pub queue_families: QueueFamilyIndices,
    /// Whether all of [`REQUIRED_DEVICE_EXTENSIONS`] are available.
    pub supports_required_extensions: bool,
}

impl PhysicalDeviceInfo {
    /// Device name as reported by the driver.
    pub fn device_name(&self) -> &str {
        let raw = unsafe { CStr::from_ptr(self.properties.device_name.as_ptr()) };
        raw.to_str().unwrap_or("Unknown device")
    }

    /// Human-readable label for the device type.
    pub fn device_type_name(&self) -> &'static str {
        match self.properties.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => "Discrete GPU",
            vk::PhysicalDeviceType::INTEGRATED_GPU => "Integrated GPU",
            vk::PhysicalDeviceType::CPU => "CPU",
            vk::PhysicalDeviceType::VIRTUAL_GPU => "Virtual GPU",
            _ => "Other",
        }
    }

    /// Supported Vulkan API version as (major, minor, patch).
    pub fn api_version(&self) -> (u32, u32, u32) {
        let version = self.properties.api_version;
        (
            vk::api_version_major(version),
            vk::api_version_minor(version),
            vk::api_version_patch(version),
        )
    }
}

/// Rates a candidate for selection.
///
/// Returns `-1` when the candidate is unusable: it lacks the geometry-shader
/// feature, lacks a required device extension, or its queue-family resolution
/// is incomplete. Usable candidates score `1000` for a discrete GPU plus the
/// maximum supported 2D image dimension as a capability proxy.
pub fn rate_device(info: &PhysicalDeviceInfo) -> i32 {
    if info.features.geometry_shader == vk::FALSE {
        return -1;
    }
    if !info.supports_required_extensions {
        return -1;
    }
    if !info.queue_families.is_complete() {
        return -1;
    }

    let mut score = 0;
    if info.properties.device_type == vk::PhysicalDeviceType::DISCRETE_GPU {
        score += 1000;
    }
    score += info.properties.limits.max_image_dimension2_d as i32;
    score
}

/// Orders candidates by descending score.
///
/// The sort is stable, so candidates with equal scores keep their enumeration
/// order, and every `-1` candidate lands after every usable one.
pub fn rank_devices(devices: Vec<PhysicalDeviceInfo>) -> Vec<(PhysicalDeviceInfo, i32)> {
    let mut ranked: Vec<(PhysicalDeviceInfo, i32)> = devices
        .into_iter()
        .map(|info| {
            let score = rate_device(&info);
            (info, score)
        })
        .collect();

    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked
}

/// Selects the physical device at the given rank.
///
/// Candidates are enumerated, rated and ranked best-first; `device_index`
/// then picks from that ordering (0 = best).
///
/// # Errors
///
/// - [`RhiError::NoSuitableGpu`] if no Vulkan device exists, or the candidate
///   at the requested rank cannot run the renderer
/// - [`RhiError::DeviceIndexOutOfRange`] if `device_index` does not address a
///   candidate
pub fn select_physical_device(
    instance: &ash::Instance,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
    device_index: usize,
) -> RhiResult<PhysicalDeviceInfo> {
    let devices = unsafe { instance.enumerate_physical_devices()? };
    if devices.is_empty() {
        warn!("Instance enumerated zero physical devices");
        return Err(RhiError::NoSuitableGpu);
    }
    info!("Rating {} GPU(s)", devices.len());

    let candidates: Vec<PhysicalDeviceInfo> = devices
        .into_iter()
        .map(|device| query_device_info(instance, device, surface, surface_loader))
        .collect();

    let ranked = rank_devices(candidates);
    for (rank, (info, score)) in ranked.iter().enumerate() {
        debug!(
            "GPU #{}: '{}' ({}) - Score: {}",
            rank,
            info.device_name(),
            info.device_type_name(),
            score
        );
    }

    let selected = pick_ranked_device(&ranked, device_index)?;

    let (major, minor, patch) = selected.api_version();
    info!(
        "Selected GPU: '{}' ({}) - Vulkan {}.{}.{}",
        selected.device_name(),
        selected.device_type_name(),
        major,
        minor,
        patch
    );

    Ok(selected)
}

/// Picks the candidate at a rank in an ordered list (0 = best).
///
/// # Errors
///
/// - [`RhiError::DeviceIndexOutOfRange`] if `device_index` does not address a
///   candidate
/// - [`RhiError::NoSuitableGpu`] if the candidate at that rank cannot run the
///   renderer
pub fn pick_ranked_device(
    ranked: &[(PhysicalDeviceInfo, i32)],
    device_index: usize,
) -> RhiResult<PhysicalDeviceInfo> {
    if device_index >= ranked.len() {
        return Err(RhiError::DeviceIndexOutOfRange {
            index: device_index,
            count: ranked.len(),
        });
    }

    let (selected, score) = &ranked[device_index];
    if *score < 0 {
        warn!(
            "GPU '{}' at rank {} does not meet the renderer's requirements",
            selected.device_name(),
            device_index
        );
        return Err(RhiError::NoSuitableGpu);
    }

    Ok(selected.clone())
}

/// Takes the enumeration-time snapshot of one candidate.
fn query_device_info(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> PhysicalDeviceInfo {
    let properties = unsafe { instance.get_physical_device_properties(device) };
    let features = unsafe { instance.get_physical_device_features(device) };
    let queue_families = find_queue_families(instance, device, surface, surface_loader);
    let supports_required_extensions = check_extension_support(instance, device);

    PhysicalDeviceInfo {
        device,
        properties,
        features,
        queue_families,
        supports_required_extensions,
    }
}

/// Resolves queue family indices against the target surface.
///
/// Records the first family offering graphics and, independently, the first
/// family able to present; stops scanning once both are found.
fn find_queue_families(
    instance: &ash::Instance,
    device: vk::PhysicalDevice,
    surface: vk::SurfaceKHR,
    surface_loader: &ash::khr::surface::Instance,
) -> QueueFamilyIndices {
    let props = unsafe { instance.get_physical_device_queue_family_properties(device) };
    let mut found = QueueFamilyIndices::default();

    for (index, family) in props.iter().enumerate() {
        let index = index as u32;
        if family.queue_count == 0 {
            continue;
        }

        let graphics_capable = family.queue_flags.contains(vk::QueueFlags::GRAPHICS);
        if found.graphics_family.is_none() && graphics_capable {
            found.graphics_family = Some(index);
        }

        if found.present_family.is_none() {
            let can_present = unsafe {
                surface_loader
                    .get_physical_device_surface_support(device, index, surface)
                    .unwrap_or(false)
            };
            if can_present {
                found.present_family = Some(index);
            }
        }

        if found.is_complete() {
            break;
        }
    }

    found
}

/// Checks that every required device extension is available.
fn check_extension_support(instance: &ash::Instance, device: vk::PhysicalDevice) -> bool {
    let available = match unsafe { instance.enumerate_device_extension_properties(device) } {
        Ok(props) => props,
        Err(_) => return false,
    };

    REQUIRED_DEVICE_EXTENSIONS.iter().all(|required| {
        available.iter().any(|ext| {
            let name = unsafe { CStr::from_ptr(ext.extension_name.as_ptr()) };
            name == *required
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_info(
        device_type: vk::PhysicalDeviceType,
        geometry_shader: bool,
        extensions: bool,
        graphics_family: Option<u32>,
        present_family: Option<u32>,
        max_image_dimension2_d: u32,
    ) -> PhysicalDeviceInfo {
        let mut properties = vk::PhysicalDeviceProperties::default();
        properties.device_type = device_type;
        properties.limits.max_image_dimension2_d = max_image_dimension2_d;

        let mut features = vk::PhysicalDeviceFeatures::default();
        features.geometry_shader = if geometry_shader { vk::TRUE } else { vk::FALSE };

        PhysicalDeviceInfo {
            device: vk::PhysicalDevice::null(),
            properties,
            features,
            queue_families: QueueFamilyIndices {
                graphics_family,
                present_family,
            },
            supports_required_extensions: extensions,
        }
    }

    #[test]
    fn test_default_indices_are_empty() {
        let empty = QueueFamilyIndices::default();
        assert!(empty.graphics_family.is_none());
        assert!(empty.present_family.is_none());
        assert!(!empty.is_complete());
    }

    #[test]
    fn test_indices_complete_with_both_roles() {
        let both = QueueFamilyIndices { graphics_family: Some(0), present_family: Some(0) };
        assert!(both.is_complete());
    }

    #[test]
    fn test_indices_incomplete_with_either_role_missing() {
        let graphics_only = QueueFamilyIndices { graphics_family: Some(0), present_family: None };
        assert!(!graphics_only.is_complete());

        let present_only = QueueFamilyIndices { graphics_family: None, present_family: Some(0) };
        assert!(!present_only.is_complete());
    }

    #[test]
    fn test_unique_families_shared() {
        let shared = QueueFamilyIndices { graphics_family: Some(0), present_family: Some(0) };
        assert_eq!(shared.unique_families(), vec![0]);
    }

    #[test]
    fn test_unique_families_distinct() {
        let split = QueueFamilyIndices { graphics_family: Some(0), present_family: Some(2) };
        assert_eq!(split.unique_families(), vec![0, 2]);
    }

    #[test]
    fn test_rate_rejects_missing_geometry_shader() {
        let info = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            false,
            true,
            Some(0),
            Some(0),
            16384,
        );
        assert_eq!(rate_device(&info), -1);
    }

    #[test]
    fn test_rate_rejects_missing_extensions() {
        let info = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            false,
            Some(0),
            Some(0),
            16384,
        );
        assert_eq!(rate_device(&info), -1);
    }

    #[test]
    fn test_rate_rejects_incomplete_queue_families() {
        let info = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            None,
            16384,
        );
        assert_eq!(rate_device(&info), -1);
    }

    #[test]
    fn test_rate_discrete_beats_integrated() {
        let discrete = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            Some(0),
            4096,
        );
        let integrated = test_info(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            true,
            true,
            Some(0),
            Some(0),
            4096,
        );
        assert_eq!(rate_device(&discrete), 1000 + 4096);
        assert_eq!(rate_device(&integrated), 4096);
    }

    #[test]
    fn test_rank_orders_by_descending_score() {
        let low = test_info(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            true,
            true,
            Some(0),
            Some(0),
            2048,
        );
        let high = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            Some(0),
            16384,
        );
        let unusable = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            false,
            true,
            Some(0),
            Some(0),
            16384,
        );

        let ranked = rank_devices(vec![low, unusable, high]);
        assert_eq!(ranked.len(), 3);
        assert_eq!(ranked[0].1, 1000 + 16384);
        assert_eq!(ranked[1].1, 2048);
        assert_eq!(ranked[2].1, -1);
    }

    #[test]
    fn test_rank_unusable_after_every_usable() {
        let usable = test_info(
            vk::PhysicalDeviceType::CPU,
            true,
            true,
            Some(0),
            Some(0),
            1,
        );
        let unusable = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            false,
            Some(0),
            Some(0),
            16384,
        );

        let ranked = rank_devices(vec![unusable, usable]);
        assert!(ranked[0].1 >= 0);
        assert_eq!(ranked[1].1, -1);
    }

    #[test]
    fn test_rank_ties_keep_enumeration_order() {
        // Same score; the queue family index tells the two apart.
        let first = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            Some(0),
            8192,
        );
        let second = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(1),
            Some(1),
            8192,
        );

        let ranked = rank_devices(vec![first, second]);
        assert_eq!(ranked[0].1, ranked[1].1);
        assert_eq!(ranked[0].0.queue_families.graphics_family, Some(0));
        assert_eq!(ranked[1].0.queue_families.graphics_family, Some(1));
    }

    #[test]
    fn test_pick_out_of_range_index_reports_bounds() {
        let only = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            Some(0),
            8192,
        );

        let ranked = rank_devices(vec![only]);
        match pick_ranked_device(&ranked, 3) {
            Err(RhiError::DeviceIndexOutOfRange { index, count }) => {
                assert_eq!(index, 3);
                assert_eq!(count, 1);
            }
            _ => panic!("expected DeviceIndexOutOfRange"),
        }
    }

    #[test]
    fn test_pick_unusable_rank_is_no_suitable_gpu() {
        let unusable = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            false,
            true,
            Some(0),
            Some(0),
            16384,
        );

        let ranked = rank_devices(vec![unusable]);
        assert!(matches!(
            pick_ranked_device(&ranked, 0),
            Err(RhiError::NoSuitableGpu)
        ));
    }

    #[test]
    fn test_pick_returns_requested_rank() {
        let best = test_info(
            vk::PhysicalDeviceType::DISCRETE_GPU,
            true,
            true,
            Some(0),
            Some(0),
            16384,
        );
        let second = test_info(
            vk::PhysicalDeviceType::INTEGRATED_GPU,
            true,
            true,
            Some(1),
            Some(1),
            4096,
        );

        let ranked = rank_devices(vec![second, best]);
        let picked = pick_ranked_device(&ranked, 1).unwrap();
        assert_eq!(picked.queue_families.graphics_family, Some(1));
    }
}
