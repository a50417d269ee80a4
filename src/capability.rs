use std::fmt;

use crate::v4l2::videodev::v4l2_capability;

/// Maximum length of the card name reported through [`Capabilities::device_name`]
pub const DEVICE_NAME_MAX: usize = 32;

#[allow(clippy::unreadable_literal)]
#[rustfmt::skip]
#[repr(u32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    VideoCapture        = 0x00000001,
    VideoOutput         = 0x00000002,
    VideoOverlay        = 0x00000004,
    VbiCapture          = 0x00000010,
    VbiOutput           = 0x00000020,
    SlicedVbiCapture    = 0x00000040,
    SlicedVbiOutput     = 0x00000080,
    RdsCapture          = 0x00000100,
    VideoOutputOverlay  = 0x00000200,

    Tuner               = 0x00010000,
    Audio               = 0x00020000,
    Radio               = 0x00040000,

    ReadWrite           = 0x01000000,
    AsyncIO             = 0x02000000,
    Streaming           = 0x04000000,

    DeviceCaps          = 0x80000000,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
/// Device capability flags
///
/// Pure bit tests over the word fetched once at open time.
pub struct DeviceCapabilities {
    /// Capability flags such as V4L2_CAP_VIDEO_CAPTURE
    pub flags: u32,
}

impl DeviceCapabilities {
    pub fn has(&self, cap: Capability) -> bool {
        self.flags & cap as u32 != 0
    }

    pub fn video_capture(&self) -> bool {
        self.has(Capability::VideoCapture)
    }

    pub fn video_output(&self) -> bool {
        self.has(Capability::VideoOutput)
    }

    pub fn video_overlay(&self) -> bool {
        self.has(Capability::VideoOverlay)
    }

    pub fn vbi_capture(&self) -> bool {
        self.has(Capability::VbiCapture)
    }

    pub fn vbi_output(&self) -> bool {
        self.has(Capability::VbiOutput)
    }

    pub fn sliced_vbi_capture(&self) -> bool {
        self.has(Capability::SlicedVbiCapture)
    }

    pub fn sliced_vbi_output(&self) -> bool {
        self.has(Capability::SlicedVbiOutput)
    }

    pub fn rds_capture(&self) -> bool {
        self.has(Capability::RdsCapture)
    }

    pub fn video_output_overlay(&self) -> bool {
        self.has(Capability::VideoOutputOverlay)
    }

    pub fn tuner(&self) -> bool {
        self.has(Capability::Tuner)
    }

    pub fn audio(&self) -> bool {
        self.has(Capability::Audio)
    }

    pub fn radio(&self) -> bool {
        self.has(Capability::Radio)
    }

    pub fn read_write(&self) -> bool {
        self.has(Capability::ReadWrite)
    }

    pub fn async_io(&self) -> bool {
        self.has(Capability::AsyncIO)
    }

    pub fn streaming(&self) -> bool {
        self.has(Capability::Streaming)
    }
}

impl From<u32> for DeviceCapabilities {
    fn from(flags: u32) -> Self {
        DeviceCapabilities { flags }
    }
}

impl fmt::Display for DeviceCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut prefix = "";
        let mut flags = self.flags;

        let mut print_flag = |flag: Capability, info: &str| -> fmt::Result {
            let flag = flag as u32;
            if flags & flag != 0 {
                write!(f, "{}{}", prefix, info)?;
                prefix = ", ";

                // remove from input flags so we can know about flags we do not recognize
                flags &= !flag;
            }
            Ok(())
        };

        print_flag(Capability::VideoCapture, "Video Capture")?;
        print_flag(Capability::VideoOutput, "Video Output")?;
        print_flag(Capability::VideoOverlay, "Video Overlay")?;
        print_flag(Capability::VideoOutputOverlay, "Video Output Overlay")?;
        print_flag(Capability::VbiCapture, "VBI Capture")?;
        print_flag(Capability::VbiOutput, "VBI Output")?;
        print_flag(Capability::SlicedVbiCapture, "Sliced VBI Capture")?;
        print_flag(Capability::SlicedVbiOutput, "Sliced VBI Output")?;
        print_flag(Capability::RdsCapture, "RDS Capture")?;
        print_flag(Capability::Tuner, "Tuner")?;
        print_flag(Capability::Audio, "Audio")?;
        print_flag(Capability::Radio, "Radio")?;
        print_flag(Capability::ReadWrite, "Read/Write")?;
        print_flag(Capability::AsyncIO, "Async I/O")?;
        print_flag(Capability::Streaming, "Streaming")?;
        print_flag(Capability::DeviceCaps, "Device Capabilities")?;

        if flags != 0 {
            write!(f, "{}{:#x}", prefix, flags)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
/// Device capabilities
pub struct Capabilities {
    /// Driver name, e.g. uvc for usb video class devices
    pub driver: String,
    /// Card name
    pub card: String,
    /// Bus name, e.g. USB or PCI
    pub bus: String,
    /// Version number MAJOR.MINOR.PATCH
    pub version: (u8, u8, u8),

    /// Capability flags of the opened node
    pub capabilities: DeviceCapabilities,
}

impl Capabilities {
    /// Card name, truncated to [`DEVICE_NAME_MAX`] bytes
    pub fn device_name(&self) -> &str {
        let mut end = self.card.len().min(DEVICE_NAME_MAX);
        while !self.card.is_char_boundary(end) {
            end -= 1;
        }
        &self.card[..end]
    }
}

fn c_str(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    String::from_utf8_lossy(&raw[..end]).into_owned()
}

impl From<v4l2_capability> for Capabilities {
    fn from(cap: v4l2_capability) -> Self {
        // device_caps describes the opened node, capabilities the whole physical device
        let flags = if cap.capabilities & Capability::DeviceCaps as u32 != 0 {
            cap.device_caps
        } else {
            cap.capabilities
        };

        Capabilities {
            driver: c_str(&cap.driver),
            card: c_str(&cap.card),
            bus: c_str(&cap.bus_info),
            version: (
                ((cap.version >> 16) & 0xff) as u8,
                ((cap.version >> 8) & 0xff) as u8,
                (cap.version & 0xff) as u8,
            ),
            capabilities: DeviceCapabilities::from(flags),
        }
    }
}

impl fmt::Display for Capabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let yes_no = |value: bool| if value { "yes" } else { "no" };
        let caps = &self.capabilities;

        writeln!(f, "driver               : {}", self.driver)?;
        writeln!(f, "dev name             : {}", self.card)?;
        writeln!(f, "bus                  : {}", self.bus)?;
        writeln!(
            f,
            "version              : {}.{}.{}",
            self.version.0, self.version.1, self.version.2
        )?;
        writeln!(f, "video capture        : {}", yes_no(caps.video_capture()))?;
        writeln!(f, "video output         : {}", yes_no(caps.video_output()))?;
        writeln!(f, "video overlay        : {}", yes_no(caps.video_overlay()))?;
        writeln!(f, "vbi capture          : {}", yes_no(caps.vbi_capture()))?;
        writeln!(f, "vbi output           : {}", yes_no(caps.vbi_output()))?;
        writeln!(f, "sliced vbi capture   : {}", yes_no(caps.sliced_vbi_capture()))?;
        writeln!(f, "sliced vbi output    : {}", yes_no(caps.sliced_vbi_output()))?;
        writeln!(f, "rds capture          : {}", yes_no(caps.rds_capture()))?;
        writeln!(
            f,
            "video output overlay : {}",
            yes_no(caps.video_output_overlay())
        )?;
        writeln!(f, "tuner                : {}", yes_no(caps.tuner()))?;
        writeln!(f, "audio                : {}", yes_no(caps.audio()))?;
        writeln!(f, "radio                : {}", yes_no(caps.radio()))?;
        writeln!(f, "read/write           : {}", yes_no(caps.read_write()))?;
        writeln!(f, "async io             : {}", yes_no(caps.async_io()))?;
        writeln!(f, "streaming            : {}", yes_no(caps.streaming()))?;
        Ok(())
    }
}
