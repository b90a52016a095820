//! winit window wrapper and Vulkan surface plumbing.
//!
//! The renderer never touches winit directly; it goes through [`Window`] for
//! size bookkeeping and redraw requests, and through [`Surface`] for the
//! `VkSurfaceKHR` lifetime.

use std::sync::Arc;

use ash::vk;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::{Window as WinitWindow, WindowAttributes};

use aurora_core::{Error, Result};

/// Owned `VkSurfaceKHR`, destroyed on drop via the stored loader.
///
/// The instance the surface was created from must outlive this value; the
/// renderer guarantees that by dropping its surface before its instance.
pub struct Surface {
    handle: vk::SurfaceKHR,
    loader: ash::khr::surface::Instance,
}

impl Surface {
    /// Raw surface handle; do not store it past this value's lifetime.
    #[inline]
    pub fn handle(&self) -> vk::SurfaceKHR {
        self.handle
    }

    /// Surface extension loader, needed for capability and format queries.
    #[inline]
    pub fn loader(&self) -> &ash::khr::surface::Instance {
        &self.loader
    }
}

impl Drop for Surface {
    fn drop(&mut self) {
        // SAFETY: handle and loader were created together in create_surface
        // from the same instance, and nothing else destroys the handle.
        unsafe {
            self.loader.destroy_surface(self.handle, None);
        }
        tracing::debug!("Vulkan surface destroyed");
    }
}

/// Application window; tracks the latest known inner size.
pub struct Window {
    window: Arc<WinitWindow>,
    width: u32,
    height: u32,
}

impl Window {
    /// Opens a resizable window.
    ///
    /// Must be called off the event loop's `resumed` callback; winit refuses
    /// to create windows before the loop runs.
    pub fn new(event_loop: &ActiveEventLoop, width: u32, height: u32, title: &str) -> Result<Self> {
        let window = event_loop
            .create_window(
                WindowAttributes::default()
                    .with_title(title)
                    .with_inner_size(PhysicalSize::new(width, height))
                    .with_resizable(true),
            )
            .map_err(|e| Error::Window(e.to_string()))?;

        tracing::info!(width, height, title, "window opened");

        Ok(Self {
            window: Arc::new(window),
            width,
            height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Records a new inner size; call from the resize event handler.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        tracing::debug!(width, height, "window resized");
    }

    pub fn request_redraw(&self) {
        self.window.request_redraw();
    }

    /// Display handle, used to enumerate required instance extensions.
    pub fn display_handle(
        &self,
    ) -> std::result::Result<raw_window_handle::DisplayHandle<'_>, raw_window_handle::HandleError>
    {
        self.window.display_handle()
    }

    /// Creates a [`Surface`] targeting this window.
    ///
    /// # Errors
    ///
    /// Fails when the raw handles cannot be obtained from winit or when
    /// `vkCreateSurfaceKHR` (via `ash_window`) fails.
    pub fn create_surface(&self, entry: &ash::Entry, instance: &ash::Instance) -> Result<Surface> {
        let as_window_err = |what: &str| {
            let what = what.to_string();
            move |e: raw_window_handle::HandleError| Error::Window(format!("{what}: {e}"))
        };
        let display = self
            .window
            .display_handle()
            .map_err(as_window_err("no display handle"))?;
        let window = self
            .window
            .window_handle()
            .map_err(as_window_err("no window handle"))?;

        // SAFETY: both handles belong to a live winit window, and the
        // resulting surface is destroyed exactly once, in Surface::drop.
        let handle = unsafe {
            ash_window::create_surface(entry, instance, display.as_raw(), window.as_raw(), None)
                .map_err(|e| Error::Vulkan(format!("surface creation failed: {e}")))?
        };

        tracing::info!("Vulkan surface created");

        Ok(Surface {
            handle,
            loader: ash::khr::surface::Instance::new(entry, instance),
        })
    }
}

/// Instance extensions needed to present to the current display system.
///
/// The pointers reference static strings owned by the Vulkan loader; they
/// stay valid for the life of the process.
///
/// # Errors
///
/// Fails when the display system is not supported by `ash_window`.
pub fn required_surface_extensions(
    display_handle: raw_window_handle::RawDisplayHandle,
) -> Result<Vec<*const i8>> {
    let extensions = ash_window::enumerate_required_extensions(display_handle)
        .map_err(|e| Error::Vulkan(format!("cannot enumerate surface extensions: {e}")))?;

    if tracing::enabled!(tracing::Level::DEBUG) {
        // SAFETY: ash_window returns valid null-terminated static strings.
        let names: Vec<_> = extensions
            .iter()
            .map(|&ext| unsafe { std::ffi::CStr::from_ptr(ext) })
            .collect();
        tracing::debug!(?names, "surface extensions");
    }

    Ok(extensions.to_vec())
}
