//! EFI Graphics Output Protocol

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::boot::BootServices;
use crate::codec;
use crate::error::Error;
use crate::guid::Guid;
use crate::invoke;
use crate::status;

pub const GRAPHICS_OUTPUT_PROTOCOL_GUID: Guid = Guid::from_fields(
    0x9042a9de,
    0x23dc,
    0x4a38,
    [0x96, 0xfb, 0x7a, 0xde, 0xd0, 0x80, 0x51, 0x6a],
);

/// EFI Graphics Output Protocol offset for Blt.
const BLT: u64 = 0x10;

/// EFI_GRAPHICS_OUTPUT_BLT_OPERATION
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum BltOperation {
    VideoFill = 0,
    VideoToBltBuffer = 1,
    BufferToVideo = 2,
    VideoToVideo = 3,
}

/// The protocol table: three service slots and the mode pointer.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
struct GraphicsOutputTable {
    query_mode: u64,
    set_mode: u64,
    blt: u64,
    mode: u64,
}

/// An EFI Graphics Output Mode Information instance.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct ModeInformation {
    pub version: u32,
    pub horizontal_resolution: u32,
    pub vertical_resolution: u32,
    pub pixel_format: u32,
    pub red_mask: u32,
    pub green_mask: u32,
    pub blue_mask: u32,
    pub reserved_mask: u32,
    pub pixels_per_scan_line: u32,
}

/// An EFI Graphics Output Protocol Mode instance.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy)]
#[repr(C)]
pub struct ProtocolMode {
    pub max_mode: u32,
    pub mode: u32,
    pub info: u64,
    pub size_of_info: u64,
    pub frame_buffer_base: u64,
    pub frame_buffer_size: u64,
}

impl ProtocolMode {
    /// Decode the mode information record.
    pub fn info(&self) -> Result<ModeInformation, Error> {
        codec::decode(self.info)
    }
}

/// An EFI Graphics Output Protocol instance.
pub struct GraphicsOutput {
    base: u64,
    mode: u64,
}

impl GraphicsOutput {
    /// Decode the current protocol mode.
    pub fn mode(&self) -> Result<ProtocolMode, Error> {
        codec::decode(self.mode)
    }

    /// Call `EFI_GRAPHICS_OUTPUT_PROTOCOL.Blt()`.
    #[allow(clippy::too_many_arguments)]
    pub fn blt(
        &self,
        buf: &[u8],
        op: BltOperation,
        src_x: u64,
        src_y: u64,
        dst_x: u64,
        dst_y: u64,
        width: u64,
        height: u64,
        delta: u64,
    ) -> Result<(), Error> {
        if self.base == 0 {
            return Ok(());
        }

        // SAFETY: base is the live protocol instance; buf lives across
        // the call.
        let s = unsafe {
            invoke::call(
                self.base + BLT,
                &[
                    self.base,
                    buf.as_ptr() as u64,
                    op as u64,
                    src_x,
                    src_y,
                    dst_x,
                    dst_y,
                    width,
                    height,
                    delta,
                ],
            )
        };

        status::check(s)
    }
}

impl BootServices {
    /// Locate the EFI Graphics Output Protocol instance.
    ///
    /// A missing GOP is common on headless systems; callers treat the
    /// error as non-fatal.
    pub fn graphics_output(&self) -> Result<GraphicsOutput, Error> {
        let base = self.locate_protocol(&GRAPHICS_OUTPUT_PROTOCOL_GUID)?;
        let table: GraphicsOutputTable = codec::decode(base)?;

        Ok(GraphicsOutput {
            base,
            mode: table.mode,
        })
    }
}
