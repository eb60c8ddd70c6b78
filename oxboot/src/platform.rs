//! The platform value
//!
//! One [`Platform`] is created at init and handed by reference to every
//! command: the UEFI services snapshot, the runtime memory region, the
//! boot-transparency state and the optional engine and tick source the
//! out-of-scope init stub may wire in. Nothing here is exposed as
//! mutable global state; the interior mutability is confined to the
//! transparency configuration and engine slots.

use alloc::boxed::Box;

use spin::{Mutex, Once};

use oxboot_mem::BootHeap;
use oxboot_transparency::{Config, Engine};
use oxboot_uefi::{Error, MemoryType, AllocateType, Services};

use crate::config;

static PLATFORM: Once<Platform> = Once::new();

/// Monotonic nanosecond source, provided by the CPU init stub.
pub type TickSource = fn() -> u64;

pub struct Platform {
    pub services: Services,

    /// The loader's own memory window: image base to heap end. Kept out
    /// of E820 defragmentation so the kernel can identify it.
    ram_start: u64,
    ram_end: u64,

    /// Boot-transparency configuration, toggled by the `bt` command.
    pub bt: Mutex<Config>,

    /// The transparency engine, wired in by the integrator.
    pub engine: Mutex<Option<Box<dyn Engine + Send>>>,

    /// Monotonic clock for `uptime`, wired in by the init stub.
    ticks: Mutex<Option<TickSource>>,

    heap: &'static BootHeap,
}

impl Platform {
    /// The loader's runtime memory window `(start, end)`.
    #[must_use]
    pub fn runtime_region(&self) -> (u64, u64) {
        (self.ram_start, self.ram_end)
    }

    /// Heap usage, for diagnostics.
    #[must_use]
    pub fn heap_stats(&self) -> oxboot_mem::heap::HeapStats {
        self.heap.stats()
    }

    /// Install a transparency engine.
    pub fn set_engine(&self, engine: Box<dyn Engine + Send>) {
        *self.engine.lock() = Some(engine);
    }

    /// Install a monotonic tick source.
    pub fn set_ticks(&self, ticks: TickSource) {
        *self.ticks.lock() = Some(ticks);
    }

    /// Nanoseconds since boot, when a tick source is present.
    #[must_use]
    pub fn uptime(&self) -> Option<u64> {
        self.ticks.lock().map(|t| t())
    }
}

/// The installed platform, if init has run.
pub fn get() -> Option<&'static Platform> {
    PLATFORM.get()
}

/// Validate the System Table, cache the service records, and extend the
/// runtime heap into firmware memory.
pub fn init(
    image_handle: u64,
    system_table: u64,
    heap: &'static BootHeap,
) -> Result<&'static Platform, Error> {
    let mut services = Services::init(image_handle, system_table)?;
    services.console.replace_tabs = config::CONSOLE_TABS;

    let (ram_start, ram_end) = extend_heap(&services, heap);

    Ok(PLATFORM.call_once(|| Platform {
        services,
        ram_start,
        ram_end,
        bt: Mutex::new(Config::default()),
        engine: Mutex::new(None),
        ticks: Mutex::new(None),
        heap,
    }))
}

/// Grow the runtime heap into the firmware memory right behind our own
/// image.
///
/// The `LoaderCode` descriptor holding the image text is located in the
/// current memory map; the descriptor immediately after it becomes the
/// heap window and is reserved from Boot Services as `LoaderData`, so
/// later map changes cannot steal it. Returns the runtime window
/// `(image base, heap end)`.
fn extend_heap(services: &Services, heap: &'static BootHeap) -> (u64, u64) {
    let image_base = match services.loaded_image_region() {
        Ok((base, _)) => base,
        Err(err) => {
            log::warn!("could not locate loaded image, {err}");
            return (0, 0);
        }
    };

    let map = match services.boot.get_memory_map() {
        Ok(map) => map,
        Err(err) => {
            log::warn!("could not get memory map, {err}");
            return (image_base, image_base);
        }
    };

    let mut text_end = 0u64;
    let mut window = None;

    for desc in &map.descriptors {
        if text_end > 0 {
            window = Some((desc.physical_start, desc.size() as usize));
            break;
        }

        if desc.memory_type == MemoryType::LoaderCode as u32
            && desc.physical_start <= image_base
            && image_base < desc.physical_end()
        {
            text_end = desc.physical_end();
        }
    }

    let Some((heap_start, heap_size)) = window else {
        log::warn!("could not find heap offset");
        return (image_base, image_base);
    };

    if let Err(err) = services.boot.allocate_pages(
        AllocateType::Address,
        MemoryType::LoaderData,
        heap_size,
        heap_start,
    ) {
        log::warn!("could not allocate heap at {heap_start:#x}, {err}");
        return (image_base, image_base);
    }

    // SAFETY: the range was just reserved from firmware as LoaderData
    // and is identity-mapped conventional memory.
    unsafe { heap.grow(heap_start, heap_size) };

    (image_base, heap_start + heap_size as u64)
}
