//! What a physical device offers, and how adapters are ranked.

use std::ffi::CStr;
use std::fmt;

use ash::vk;

/// Vendor by PCI id, for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GpuVendor {
    Nvidia,
    Amd,
    Intel,
    Apple,
    Other(u32),
}

impl From<u32> for GpuVendor {
    fn from(pci_id: u32) -> Self {
        match pci_id {
            0x10DE => Self::Nvidia,
            0x1002 => Self::Amd,
            0x8086 => Self::Intel,
            0x106B => Self::Apple,
            other => Self::Other(other),
        }
    }
}

/// The subset of physical device properties the renderer cares about.
#[derive(Debug, Clone)]
pub struct GpuCapabilities {
    pub name: String,
    pub vendor: GpuVendor,
    pub device_type: vk::PhysicalDeviceType,
    pub api_version: u32,
    /// `VK_KHR_swapchain` is listed among the device extensions.
    pub has_swapchain: bool,
    /// Highest sampler anisotropy, present only when the feature exists.
    pub max_anisotropy: Option<f32>,
    /// Sum of all device-local heaps.
    pub vram_mib: u64,
}

impl GpuCapabilities {
    /// # Safety
    /// `physical_device` must have been enumerated from `instance`.
    pub unsafe fn query(instance: &ash::Instance, physical_device: vk::PhysicalDevice) -> Self {
        let (properties, features, memory, extensions) = unsafe {
            (
                instance.get_physical_device_properties(physical_device),
                instance.get_physical_device_features(physical_device),
                instance.get_physical_device_memory_properties(physical_device),
                instance
                    .enumerate_device_extension_properties(physical_device)
                    .unwrap_or_default(),
            )
        };

        let has_swapchain = extensions
            .iter()
            .any(|ext| ext.extension_name_as_c_str() == Ok(ash::khr::swapchain::NAME));
        let name = properties
            .device_name_as_c_str()
            .map_or_else(|_| "<unnamed>".to_owned(), |n: &CStr| n.to_string_lossy().into_owned());
        let heaps = &memory.memory_heaps[..memory.memory_heap_count as usize];
        let vram_mib = heaps
            .iter()
            .filter(|heap| heap.flags.contains(vk::MemoryHeapFlags::DEVICE_LOCAL))
            .map(|heap| heap.size >> 20)
            .sum();

        Self {
            name,
            vendor: GpuVendor::from(properties.vendor_id),
            device_type: properties.device_type,
            api_version: properties.api_version,
            has_swapchain,
            max_anisotropy: (features.sampler_anisotropy == vk::TRUE)
                .then_some(properties.limits.max_sampler_anisotropy),
            vram_mib,
        }
    }

    /// Can this device drive a window at all?
    pub fn is_usable(&self) -> bool {
        self.has_swapchain
    }

    /// Anisotropy to request for samplers, or `None` to leave it off.
    pub fn sampler_anisotropy(&self) -> Option<f32> {
        self.max_anisotropy
    }

    /// Ranking used when several devices qualify. Discrete beats integrated
    /// regardless of memory; within a type each GiB of VRAM counts.
    pub fn score(&self) -> u64 {
        let type_rank: u64 = match self.device_type {
            vk::PhysicalDeviceType::DISCRETE_GPU => 3,
            vk::PhysicalDeviceType::INTEGRATED_GPU => 2,
            vk::PhysicalDeviceType::VIRTUAL_GPU => 1,
            _ => 0,
        };
        let anisotropy = u64::from(self.max_anisotropy.is_some());
        (type_rank << 32) + ((self.vram_mib >> 10) << 1) + anisotropy
    }
}

impl fmt::Display for GpuCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{:?}, {:?}] Vulkan {}.{}, {} MiB device-local",
            self.name,
            self.vendor,
            self.device_type,
            vk::api_version_major(self.api_version),
            vk::api_version_minor(self.api_version),
            self.vram_mib,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn adapter(device_type: vk::PhysicalDeviceType, vram_mib: u64) -> GpuCapabilities {
        GpuCapabilities {
            name: "mock adapter".into(),
            vendor: GpuVendor::Other(0),
            device_type,
            api_version: vk::API_VERSION_1_2,
            has_swapchain: true,
            max_anisotropy: None,
            vram_mib,
        }
    }

    #[test]
    fn vendor_from_pci_id() {
        assert_eq!(GpuVendor::from(0x10DE), GpuVendor::Nvidia);
        assert_eq!(GpuVendor::from(0x1002), GpuVendor::Amd);
        assert_eq!(GpuVendor::from(0x8086), GpuVendor::Intel);
        assert_eq!(GpuVendor::from(0xBEEF), GpuVendor::Other(0xBEEF));
    }

    #[test]
    fn discrete_outranks_integrated_with_more_memory() {
        let discrete = adapter(vk::PhysicalDeviceType::DISCRETE_GPU, 2048);
        let integrated = adapter(vk::PhysicalDeviceType::INTEGRATED_GPU, 32768);
        assert!(discrete.score() > integrated.score());
    }

    #[test]
    fn memory_and_anisotropy_break_ties() {
        let small = adapter(vk::PhysicalDeviceType::DISCRETE_GPU, 4096);
        let large = adapter(vk::PhysicalDeviceType::DISCRETE_GPU, 8192);
        assert!(large.score() > small.score());

        let mut filtered = small.clone();
        filtered.max_anisotropy = Some(16.0);
        assert!(filtered.score() > small.score());
        assert_eq!(filtered.sampler_anisotropy(), Some(16.0));
        assert_eq!(small.sampler_anisotropy(), None);
    }

    #[test]
    fn swapchain_support_is_required() {
        let mut caps = adapter(vk::PhysicalDeviceType::CPU, 0);
        assert!(caps.is_usable());
        caps.has_swapchain = false;
        assert!(!caps.is_usable());
    }

    #[test]
    fn display_names_the_device() {
        let text = adapter(vk::PhysicalDeviceType::DISCRETE_GPU, 8192).to_string();
        assert!(text.starts_with("mock adapter"));
        assert!(text.contains("Vulkan 1.2"));
        assert!(text.contains("8192 MiB"));
    }
}
