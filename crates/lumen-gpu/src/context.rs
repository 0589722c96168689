//! Instance, device, queues and allocator in one owner.

use std::ffi::{c_char, CStr};
use std::sync::Arc;

use ash::vk;
use parking_lot::Mutex;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};
use crate::instance::{create_instance, select_physical_device};
use crate::memory::GpuAllocator;
use crate::surface::SurfaceContext;

/// Everything that lives as long as the device does.
///
/// The window surface comes from the same instance but is handed out
/// separately as a [`SurfaceContext`]; it has to be destroyed before the
/// last reference to this context goes away.
pub struct GpuContext {
    // Unloading the library while the instance lives is undefined behaviour.
    _entry: ash::Entry,
    instance: ash::Instance,
    physical_device: vk::PhysicalDevice,
    device: Arc<ash::Device>,
    capabilities: GpuCapabilities,
    allocator: Mutex<GpuAllocator>,
    queues: QueueFamilyIndices,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
}

impl GpuContext {
    pub fn device(&self) -> &ash::Device {
        &self.device
    }

    pub fn instance(&self) -> &ash::Instance {
        &self.instance
    }

    pub fn physical_device(&self) -> vk::PhysicalDevice {
        self.physical_device
    }

    pub fn capabilities(&self) -> &GpuCapabilities {
        &self.capabilities
    }

    /// Queue used for frame submissions and one-shot uploads.
    pub fn graphics_queue(&self) -> vk::Queue {
        self.graphics_queue
    }

    /// Queue used for presentation. Same handle as the graphics queue
    /// unless the device splits the two families.
    pub fn present_queue(&self) -> vk::Queue {
        self.present_queue
    }

    pub fn graphics_queue_family(&self) -> u32 {
        self.queues.graphics
    }

    pub fn present_queue_family(&self) -> u32 {
        self.queues.present
    }

    pub fn allocator(&self) -> &Mutex<GpuAllocator> {
        &self.allocator
    }

    #[cfg_attr(feature = "profiling", tracing::instrument(level = "trace", skip_all))]
    pub fn wait_idle(&self) -> Result<()> {
        unsafe { self.device.device_wait_idle()? };
        Ok(())
    }
}

impl Drop for GpuContext {
    fn drop(&mut self) {
        if let Err(e) = self.wait_idle() {
            tracing::warn!("device wait before teardown failed: {e}");
        }
        // Device memory has to go back before the device does.
        self.allocator.lock().shutdown();
        unsafe {
            self.device.destroy_device(None);
            self.instance.destroy_instance(None);
        }
        tracing::debug!("GPU context destroyed");
    }
}

/// Options for [`GpuContext`] creation.
pub struct GpuContextBuilder {
    app_name: String,
    validation: bool,
}

impl Default for GpuContextBuilder {
    /// Validation follows `debug_assertions`.
    fn default() -> Self {
        Self {
            app_name: "Lumen".to_owned(),
            validation: cfg!(debug_assertions),
        }
    }
}

impl GpuContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name reported to the driver in `VkApplicationInfo`.
    #[must_use]
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = name.into();
        self
    }

    /// Request `VK_LAYER_KHRONOS_validation`. Skipped with a warning when
    /// the layer is not installed.
    #[must_use]
    pub fn validation(mut self, enabled: bool) -> Self {
        self.validation = enabled;
        self
    }

    /// Build the GPU context together with a presentation surface for `window`.
    ///
    /// The surface is created first so that device selection can require a
    /// queue family able to present to it.
    pub fn build<W>(self, window: &W) -> Result<(GpuContext, SurfaceContext)>
    where
        W: HasDisplayHandle + HasWindowHandle,
    {
        let display = window
            .display_handle()
            .map_err(|e| GpuError::Surface(format!("display handle: {e}")))?
            .as_raw();
        let window_handle = window
            .window_handle()
            .map_err(|e| GpuError::Surface(format!("window handle: {e}")))?
            .as_raw();

        let entry = unsafe { ash::Entry::load() }
            .map_err(|e| GpuError::Loader(e.to_string()))?;

        let instance =
            unsafe { create_instance(&entry, &self.app_name, display, self.validation) }?;

        let surface =
            match unsafe { ash_window::create_surface(&entry, &instance, display, window_handle, None) }
            {
                Ok(surface) => surface,
                Err(e) => {
                    unsafe { instance.destroy_instance(None) };
                    return Err(GpuError::Surface(e.to_string()));
                }
            };
        let surface_loader = ash::khr::surface::Instance::new(&entry, &instance);

        let opened = match unsafe { open_device(&instance, &surface_loader, surface) } {
            Ok(opened) => opened,
            Err(e) => {
                unsafe {
                    surface_loader.destroy_surface(surface, None);
                    instance.destroy_instance(None);
                }
                return Err(e);
            }
        };
        let OpenedDevice {
            physical_device,
            capabilities,
            queue_families,
            device,
            graphics_queue,
            present_queue,
            allocator,
        } = opened;

        let swapchain_loader = ash::khr::swapchain::Device::new(&instance, &device);
        let surface_context = SurfaceContext::new(surface, surface_loader, swapchain_loader);

        let gpu = GpuContext {
            _entry: entry,
            instance,
            physical_device,
            device,
            capabilities,
            allocator: Mutex::new(allocator),
            queues: queue_families,
            graphics_queue,
            present_queue,
        };

        Ok((gpu, surface_context))
    }
}

/// Queue family indices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueFamilyIndices {
    pub graphics: u32,
    pub present: u32,
}

impl QueueFamilyIndices {
    /// Whether graphics and presentation use different families.
    pub fn is_split(&self) -> bool {
        self.graphics != self.present
    }

    /// Pick graphics and present families from per-family capability flags.
    ///
    /// A family that can do both is preferred so the swapchain can use
    /// exclusive sharing.
    pub fn pick(families: &[(vk::QueueFlags, bool)]) -> Option<Self> {
        let graphics_families = families
            .iter()
            .enumerate()
            .filter(|(_, (flags, _))| flags.contains(vk::QueueFlags::GRAPHICS));

        let mut graphics = None;
        for (i, (_, present)) in graphics_families {
            let i = i as u32;
            if *present {
                return Some(Self {
                    graphics: i,
                    present: i,
                });
            }
            graphics.get_or_insert(i);
        }

        let present = families.iter().position(|(_, present)| *present)? as u32;
        Some(Self {
            graphics: graphics?,
            present,
        })
    }
}

/// Find queue families for graphics and presentation.
///
/// # Safety
/// The instance, surface and physical device must be valid.
unsafe fn find_queue_families(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> Result<QueueFamilyIndices> {
    let queue_families = instance.get_physical_device_queue_family_properties(physical_device);

    let mut flags = Vec::with_capacity(queue_families.len());
    for (i, family) in queue_families.iter().enumerate() {
        let present = surface_loader
            .get_physical_device_surface_support(physical_device, i as u32, surface)
            .unwrap_or(false);
        flags.push((family.queue_flags, present));
    }

    QueueFamilyIndices::pick(&flags).ok_or(GpuError::NoSuitableDevice)
}

/// A device is only usable if the surface reports at least one format and
/// one present mode for it.
unsafe fn has_surface_support(
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
    physical_device: vk::PhysicalDevice,
) -> bool {
    let formats = surface_loader
        .get_physical_device_surface_formats(physical_device, surface)
        .unwrap_or_default();
    let modes = surface_loader
        .get_physical_device_surface_present_modes(physical_device, surface)
        .unwrap_or_default();
    !formats.is_empty() && !modes.is_empty()
}

/// Required device extensions.
fn required_device_extensions() -> Vec<&'static CStr> {
    vec![
        ash::khr::swapchain::NAME,
        #[cfg(target_os = "macos")]
        ash::khr::portability_subset::NAME,
    ]
}

/// Device-level objects created once a surface exists.
struct OpenedDevice {
    physical_device: vk::PhysicalDevice,
    capabilities: GpuCapabilities,
    queue_families: QueueFamilyIndices,
    device: Arc<ash::Device>,
    graphics_queue: vk::Queue,
    present_queue: vk::Queue,
    allocator: GpuAllocator,
}

/// Pick an adapter that can present to `surface`, then create the device
/// and its allocator. Nothing created here survives a failure.
///
/// # Safety
/// `surface` must belong to `instance`.
unsafe fn open_device(
    instance: &ash::Instance,
    surface_loader: &ash::khr::surface::Instance,
    surface: vk::SurfaceKHR,
) -> Result<OpenedDevice> {
    let (physical_device, capabilities) = unsafe {
        select_physical_device(instance, |device, _| {
            find_queue_families(instance, surface_loader, surface, device).is_ok()
                && has_surface_support(surface_loader, surface, device)
        })
    }?;
    tracing::info!("selected adapter: {capabilities}");

    let queue_families =
        unsafe { find_queue_families(instance, surface_loader, surface, physical_device) }?;
    tracing::debug!(
        graphics = queue_families.graphics,
        present = queue_families.present,
        "Queue families"
    );

    let (device, graphics_queue, present_queue) =
        unsafe { create_device(instance, physical_device, &queue_families, &capabilities)? };
    let device = Arc::new(device);

    let allocator = match unsafe { GpuAllocator::new(instance, device.clone(), physical_device) } {
        Ok(allocator) => allocator,
        Err(e) => {
            unsafe { device.destroy_device(None) };
            return Err(e);
        }
    };

    Ok(OpenedDevice {
        physical_device,
        capabilities,
        queue_families,
        device,
        graphics_queue,
        present_queue,
        allocator,
    })
}

/// Create the logical device and retrieve queues.
///
/// # Safety
/// The instance and physical device must be valid.
unsafe fn create_device(
    instance: &ash::Instance,
    physical_device: vk::PhysicalDevice,
    queue_families: &QueueFamilyIndices,
    capabilities: &GpuCapabilities,
) -> Result<(ash::Device, vk::Queue, vk::Queue)> {
    let mut unique_families = vec![queue_families.graphics];
    if queue_families.is_split() {
        unique_families.push(queue_families.present);
    }

    let queue_priority = 1.0_f32;
    let queue_create_infos: Vec<vk::DeviceQueueCreateInfo> = unique_families
        .iter()
        .map(|&family| {
            vk::DeviceQueueCreateInfo::default()
                .queue_family_index(family)
                .queue_priorities(std::slice::from_ref(&queue_priority))
        })
        .collect();

    let extensions = required_device_extensions();
    let extension_names: Vec<*const c_char> = extensions.iter().map(|ext| ext.as_ptr()).collect();

    let features = vk::PhysicalDeviceFeatures::default()
        .sampler_anisotropy(capabilities.max_anisotropy.is_some());

    let device_create_info = vk::DeviceCreateInfo::default()
        .queue_create_infos(&queue_create_infos)
        .enabled_extension_names(&extension_names)
        .enabled_features(&features);

    let device = instance
        .create_device(physical_device, &device_create_info, None)
        .map_err(GpuError::from)?;

    let graphics_queue = device.get_device_queue(queue_families.graphics, 0);
    let present_queue = device.get_device_queue(queue_families.present, 0);

    Ok((device, graphics_queue, present_queue))
}

#[cfg(test)]
mod tests {
    use super::*;

    const G: vk::QueueFlags = vk::QueueFlags::GRAPHICS;
    const C: vk::QueueFlags = vk::QueueFlags::COMPUTE;

    #[test]
    fn prefers_family_with_both_capabilities() {
        let families = [(G, false), (C, true), (G | C, true)];
        let picked = QueueFamilyIndices::pick(&families).unwrap();
        assert_eq!(picked, QueueFamilyIndices { graphics: 2, present: 2 });
        assert!(!picked.is_split());
    }

    #[test]
    fn splits_when_no_family_does_both() {
        let families = [(G | C, false), (C, true)];
        let picked = QueueFamilyIndices::pick(&families).unwrap();
        assert_eq!(picked, QueueFamilyIndices { graphics: 0, present: 1 });
        assert!(picked.is_split());
    }

    #[test]
    fn missing_graphics_or_present_fails() {
        assert!(QueueFamilyIndices::pick(&[(C, true)]).is_none());
        assert!(QueueFamilyIndices::pick(&[(G, false)]).is_none());
        assert!(QueueFamilyIndices::pick(&[]).is_none());
    }
}
