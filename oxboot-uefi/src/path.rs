//! EFI Device Paths
//!
//! Device paths are parsed by hand rather than through firmware helper
//! protocols: firmware does not handle invalid pointers gracefully, so
//! the node walk enforces a depth cap and length validation itself.

use alloc::vec::Vec;

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use oxboot_mem::PhysWindow;

use crate::codec;
use crate::error::Error;
use crate::guid::Guid;

pub const DEVICE_PATH_PROTOCOL_GUID: Guid = Guid::from_fields(
    0x09576e91,
    0x6d3f,
    0x11d2,
    [0x8e, 0x39, 0x00, 0xa0, 0xc9, 0x69, 0x72, 0x3b],
);

/// Nodes allowed before the terminator.
const MAX_DEPTH: usize = 16;

/// Window size used to walk a device path of unknown length.
const BUFFER_SIZE: usize = 1 << 16;

// Media Device Path / File Path
const MEDIA_DEVICE_PATH: u8 = 0x04;
const FILE_PATH_SUBTYPE: u8 = 0x04;

// End of Hardware Device Path / End Entire Device Path
const END_TYPE: u8 = 0x7f;
const END_SUBTYPE: u8 = 0xff;

/// An EFI Generic Device Path Node header.
#[derive(FromBytes, IntoBytes, Immutable, KnownLayout, Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DevicePathNode {
    pub node_type: u8,
    pub sub_type: u8,
    pub length: u16,
}

/// A parsed Device Path node with its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath {
    pub node_type: u8,
    pub sub_type: u8,
    pub data: Vec<u8>,
}

/// Parse the device path at `addr`.
///
/// Returns the nodes and the raw prefix bytes (without the terminator),
/// ready to have further nodes appended.
pub fn parse(addr: u64) -> Result<(Vec<DevicePath>, Vec<u8>), Error> {
    let window = PhysWindow::map(addr, BUFFER_SIZE)?;

    let mut nodes = Vec::new();
    let mut off = 0usize;
    let mut header = [0u8; 4];

    for depth in 0..=MAX_DEPTH {
        if depth == MAX_DEPTH {
            return Err(Error::Protocol("device path nodes limit exceeded"));
        }

        window.read(off, &mut header)?;

        let node = DevicePathNode::read_from_bytes(&header)
            .map_err(|_| Error::Protocol("device path node"))?;

        if node.node_type == END_TYPE && node.sub_type == END_SUBTYPE {
            break;
        }

        if node.length < 4 || node.length > 0xff {
            return Err(Error::Protocol("device path node length"));
        }

        off += 4;

        let mut data = alloc::vec![0u8; node.length as usize - 4];
        window.read(off, &mut data)?;
        off += data.len();

        nodes.push(DevicePath {
            node_type: node.node_type,
            sub_type: node.sub_type,
            data,
        });
    }

    let mut prefix = alloc::vec![0u8; off];
    window.read(0, &mut prefix)?;

    Ok((nodes, prefix))
}

/// Build a full device path description: the device prefix, a File Path
/// node carrying the UTF-16 pathname, and the terminator.
#[must_use]
pub fn with_file_path(device_prefix: &[u8], name: &str) -> Vec<u8> {
    let path_name = codec::utf16_encode(name);

    let file_node = DevicePathNode {
        node_type: MEDIA_DEVICE_PATH,
        sub_type: FILE_PATH_SUBTYPE,
        length: 4 + path_name.len() as u16,
    };

    let end_node = DevicePathNode {
        node_type: END_TYPE,
        sub_type: END_SUBTYPE,
        length: 4,
    };

    let mut desc = Vec::with_capacity(device_prefix.len() + file_node.length as usize + 4);
    desc.extend_from_slice(device_prefix);
    desc.extend_from_slice(file_node.as_bytes());
    desc.extend_from_slice(&path_name);
    desc.extend_from_slice(end_node.as_bytes());
    desc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_bytes(t: u8, s: u8, data: &[u8]) -> Vec<u8> {
        let mut v = Vec::new();
        v.push(t);
        v.push(s);
        v.extend_from_slice(&(4 + data.len() as u16).to_le_bytes());
        v.extend_from_slice(data);
        v
    }

    #[test]
    fn test_node_layout() {
        assert_eq!(core::mem::size_of::<DevicePathNode>(), 4);
    }

    #[test]
    fn test_parse_terminated_path() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&node_bytes(0x02, 0x01, &[0xaa; 8]));
        buf.extend_from_slice(&node_bytes(0x04, 0x01, &[0xbb; 16]));
        buf.extend_from_slice(&node_bytes(END_TYPE, END_SUBTYPE, &[]));
        buf.resize(BUFFER_SIZE, 0);

        let (nodes, prefix) = parse(buf.as_ptr() as u64).unwrap();

        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].node_type, 0x02);
        assert_eq!(nodes[0].data.len(), 8);
        assert_eq!(nodes[1].data, alloc::vec![0xbb; 16]);
        assert_eq!(prefix.len(), 12 + 20);
    }

    #[test]
    fn test_parse_rejects_invalid_length() {
        let mut buf = alloc::vec![0u8; BUFFER_SIZE];
        buf[0] = 0x02;
        buf[1] = 0x01;
        // length below the header size
        buf[2] = 2;
        buf[3] = 0;

        assert!(parse(buf.as_ptr() as u64).is_err());
    }

    #[test]
    fn test_parse_rejects_unterminated_path() {
        let mut buf = Vec::new();
        for _ in 0..MAX_DEPTH + 1 {
            buf.extend_from_slice(&node_bytes(0x02, 0x01, &[0; 4]));
        }
        buf.resize(BUFFER_SIZE, 0);

        assert!(parse(buf.as_ptr() as u64).is_err());
    }

    #[test]
    fn test_file_path_layout() {
        let desc = with_file_path(&[], "\\EFI\\BOOT\\BOOTX64.EFI");
        let name_utf16 = codec::utf16_encode("\\EFI\\BOOT\\BOOTX64.EFI");

        // file node header
        assert_eq!(desc[0], MEDIA_DEVICE_PATH);
        assert_eq!(desc[1], FILE_PATH_SUBTYPE);
        let len = u16::from_le_bytes([desc[2], desc[3]]) as usize;
        assert_eq!(len, 4 + name_utf16.len());

        // UTF-16 body, then terminator
        assert_eq!(&desc[4..4 + name_utf16.len()], &name_utf16[..]);
        let end = &desc[4 + name_utf16.len()..];
        assert_eq!(end, &[END_TYPE, END_SUBTYPE, 4, 0]);
    }
}
