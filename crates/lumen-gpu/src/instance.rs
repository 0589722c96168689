//! Instance creation and adapter selection.

use std::ffi::{c_char, CStr, CString};

use ash::vk;
use raw_window_handle::RawDisplayHandle;

use crate::capabilities::GpuCapabilities;
use crate::error::{GpuError, Result};

const VALIDATION_LAYER: &CStr = c"VK_LAYER_KHRONOS_validation";
const ENGINE_NAME: &CStr = c"Lumen";

/// Surface extensions for `display`, plus portability on macOS.
pub fn required_instance_extensions(display: RawDisplayHandle) -> Result<Vec<*const c_char>> {
    let mut names = ash_window::enumerate_required_extensions(display)?.to_vec();
    if cfg!(target_os = "macos") {
        names.extend([
            ash::khr::portability_enumeration::NAME.as_ptr(),
            ash::khr::get_physical_device_properties2::NAME.as_ptr(),
        ]);
    }
    Ok(names)
}

/// Whether `layer` is installed on this machine.
unsafe fn layer_available(entry: &ash::Entry, layer: &CStr) -> Result<bool> {
    let installed = unsafe { entry.enumerate_instance_layer_properties()? };
    Ok(installed
        .iter()
        .any(|props| props.layer_name_as_c_str() == Ok(layer)))
}

/// Create a Vulkan 1.0 instance able to present to `display`.
///
/// A missing validation layer is logged and skipped.
///
/// # Safety
/// `entry` must hold a loaded Vulkan library.
pub unsafe fn create_instance(
    entry: &ash::Entry,
    app_name: &str,
    display: RawDisplayHandle,
    validation: bool,
) -> Result<ash::Instance> {
    let app_name =
        CString::new(app_name).map_err(|e| GpuError::InvalidState(format!("application name: {e}")))?;
    let version = vk::make_api_version(0, 0, 1, 0);
    let app_info = vk::ApplicationInfo::default()
        .application_name(&app_name)
        .application_version(version)
        .engine_name(ENGINE_NAME)
        .engine_version(version)
        .api_version(vk::API_VERSION_1_0);

    let extensions = required_instance_extensions(display)?;
    let mut layers: Vec<*const c_char> = Vec::new();
    if validation {
        if unsafe { layer_available(entry, VALIDATION_LAYER)? } {
            layers.push(VALIDATION_LAYER.as_ptr());
        } else {
            tracing::warn!("{VALIDATION_LAYER:?} is not installed, continuing without validation");
        }
    }

    let flags = if cfg!(target_os = "macos") {
        vk::InstanceCreateFlags::ENUMERATE_PORTABILITY_KHR
    } else {
        vk::InstanceCreateFlags::empty()
    };
    let info = vk::InstanceCreateInfo::default()
        .flags(flags)
        .application_info(&app_info)
        .enabled_extension_names(&extensions)
        .enabled_layer_names(&layers);

    let instance = unsafe { entry.create_instance(&info, None)? };
    tracing::debug!(layers = layers.len(), "Vulkan instance created");
    Ok(instance)
}

/// Pick the highest-scoring device that is usable and passes `accept`.
///
/// # Safety
/// The instance must be valid.
pub unsafe fn select_physical_device(
    instance: &ash::Instance,
    mut accept: impl FnMut(vk::PhysicalDevice, &GpuCapabilities) -> bool,
) -> Result<(vk::PhysicalDevice, GpuCapabilities)> {
    let devices = unsafe { instance.enumerate_physical_devices()? };

    devices
        .into_iter()
        .filter_map(|device| {
            let caps = unsafe { GpuCapabilities::query(instance, device) };
            if caps.is_usable() && accept(device, &caps) {
                Some((device, caps))
            } else {
                tracing::debug!("rejected adapter: {caps}");
                None
            }
        })
        .max_by_key(|(_, caps)| caps.score())
        .ok_or(GpuError::NoSuitableDevice)
}
