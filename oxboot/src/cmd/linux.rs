//! Linux boot and boot-transparency commands

use alloc::format;
use alloc::string::String;
use alloc::vec;

use oxboot_linux::LinuxImage;
use oxboot_transparency::{Artifact, BootEntry, Config, EngineKind, Status};
use oxboot_uapi::load_entry;
use oxboot_uefi::{Error as UefiError, FsRoot};

use crate::cmd::{CmdError, CmdResult};
use crate::config;
use crate::platform::Platform;

/// `linux [entry]` — boot a Linux kernel image.
///
/// Returns only when the pipeline failed before the hand-off.
pub fn linux(p: &Platform, entry_path: Option<&str>) -> CmdResult {
    let path = entry_path.unwrap_or(config::DEFAULT_LINUX_ENTRY);

    if !p.services.boot.is_bound() {
        return Err(CmdError::Uefi(UefiError::FirmwareUnavailable));
    }

    let root = p.services.root()?;

    log::info!("loading boot loader entry {path}");
    let entry = load_entry(&root, path)?;

    if entry.linux.is_empty() {
        return Err(CmdError::Invalid("empty kernel entry"));
    }

    bt_check(p, &entry, &root)?;

    let image = LinuxImage::new(entry.linux, entry.initrd, entry.options);

    log::info!("booting kernel");
    image.boot(&p.services, p.runtime_region())?;

    Ok(String::new())
}

/// Gate a kernel launch on the boot-transparency configuration.
fn bt_check(
    p: &Platform,
    entry: &oxboot_uapi::Entry,
    root: &FsRoot,
) -> Result<(), CmdError> {
    let mut bt = p.bt.lock();

    if bt.status == Status::None {
        return Ok(());
    }

    let mut artifacts = vec![Artifact {
        category: config::CATEGORY_LINUX_KERNEL,
        hash: oxboot_transparency::digest(&entry.linux).to_vec(),
    }];

    if !entry.initrd.is_empty() {
        artifacts.push(Artifact {
            category: config::CATEGORY_INITRD,
            hash: oxboot_transparency::digest(&entry.initrd).to_vec(),
        });
    }

    let boot_entry = BootEntry { artifacts };

    let mut engine = p.engine.lock();
    let engine = engine
        .as_mut()
        .ok_or(CmdError::Unsupported("no transparency engine is wired in"))?;

    boot_entry
        .validate(&mut bt, engine.as_mut(), Some(root))
        .map_err(CmdError::Validate)
}

/// `bt [none|offline|online] [sigsum|tessera]` — show or set the
/// boot-transparency configuration.
pub fn bt(p: &Platform, status: Option<&str>, engine: Option<&str>) -> CmdResult {
    if let Some(status) = status {
        let status = match status {
            "none" => Status::None,
            "offline" => Status::Offline,
            "online" => Status::Online,
            _ => return Err(CmdError::Invalid("bt status")),
        };

        let kind = match engine {
            None | Some("sigsum") => EngineKind::Sigsum,
            Some("tessera") => EngineKind::Tessera,
            Some(_) => return Err(CmdError::Invalid("bt engine")),
        };

        if status == Status::Online {
            let engine = p.engine.lock();

            match engine.as_ref() {
                Some(engine) if engine.supports_online() => {}
                _ => {
                    return Err(CmdError::Unsupported(
                        "online mode requires a network-capable transparency engine",
                    ))
                }
            }
        }

        // a fresh configuration: no key material crosses a toggle
        *p.bt.lock() = Config::new(status, kind);
    }

    let bt = p.bt.lock();

    Ok(match bt.status {
        Status::None => String::from("boot-transparency is off"),
        status => format!("boot-transparency is {status}, engine {}", bt.engine),
    })
}
