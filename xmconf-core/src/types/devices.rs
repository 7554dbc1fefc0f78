//! Graphics, input, character and sound device types.

use serde::{Deserialize, Serialize};

use crate::error::{Result, XmError};

/// VNC display N listens on this port plus N.
pub const VNC_BASE_PORT: u16 = 5900;

/// Guest framebuffer. VNC and SDL are mutually exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Graphics {
    Vnc(VncGraphics),
    Sdl(SdlGraphics),
}

impl Graphics {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Vnc(_) => "vnc",
            Self::Sdl(_) => "sdl",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VncGraphics {
    /// Fixed TCP port; `None` lets the toolstack pick a free one
    pub port: Option<u16>,
    pub listen: Option<String>,
    pub passwd: Option<String>,
    pub keymap: Option<String>,
}

impl VncGraphics {
    pub fn autoport(&self) -> bool {
        self.port.is_none()
    }

    /// Display number for a fixed port.
    pub fn display(&self) -> Option<i64> {
        self.port.map(|p| i64::from(p) - i64::from(VNC_BASE_PORT))
    }

    /// Port for a display number, if it fits.
    pub fn port_for_display(display: i64) -> Option<u16> {
        u16::try_from(display.checked_add(i64::from(VNC_BASE_PORT))?).ok()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdlGraphics {
    pub display: Option<String>,
    pub xauthority: Option<String>,
}

/// USB pointing device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputDevice {
    Tablet,
    Mouse,
}

impl InputDevice {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Tablet => "tablet",
            Self::Mouse => "mouse",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s {
            "tablet" => Some(Self::Tablet),
            "mouse" => Some(Self::Mouse),
            _ => None,
        }
    }
}

/// Host side of a serial, parallel or console port.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CharDevice {
    Null,
    Vc,
    Pty,
    Stdio,
    Dev { path: String },
    File { path: String },
    Pipe { path: String },
    Tcp { host: String, service: String, listen: bool, telnet: bool },
    Udp {
        connect_host: Option<String>,
        connect_service: String,
        bind_host: Option<String>,
        bind_service: Option<String>,
    },
    Unix { path: String, listen: bool },
}

impl CharDevice {
    /// Type name used in the structured document.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Vc => "vc",
            Self::Pty => "pty",
            Self::Stdio => "stdio",
            Self::Dev { .. } => "dev",
            Self::File { .. } => "file",
            Self::Pipe { .. } => "pipe",
            Self::Tcp { .. } => "tcp",
            Self::Udp { .. } => "udp",
            Self::Unix { .. } => "unix",
        }
    }
}

/// Emulated sound card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundModel {
    Sb16,
    Es1370,
    Pcspk,
    Ac97,
}

impl SoundModel {
    pub const ALL: [SoundModel; 4] = [Self::Sb16, Self::Es1370, Self::Pcspk, Self::Ac97];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sb16 => "sb16",
            Self::Es1370 => "es1370",
            Self::Pcspk => "pcspk",
            Self::Ac97 => "ac97",
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

/// Parse a `soundhw` value: a comma-separated model list, or "all".
pub fn parse_sound_list(s: &str) -> Result<Vec<SoundModel>> {
    if s.trim() == "all" {
        return Ok(SoundModel::ALL.to_vec());
    }

    let mut models = Vec::new();
    for name in s.split(',').map(str::trim).filter(|n| !n.is_empty()) {
        let model = SoundModel::from_name(name)
            .ok_or_else(|| XmError::malformed("soundhw", format!("unknown sound model {}", name)))?;
        if !models.contains(&model) {
            models.push(model);
        }
    }
    Ok(models)
}

/// Format a `soundhw` value.
pub fn format_sound_list(models: &[SoundModel]) -> String {
    models.iter().map(SoundModel::as_str).collect::<Vec<_>>().join(",")
}
