//! Para-virtual framebuffer strings from the `vfb` list.
//!
//! ```text
//! type=vnc,vncunused=1,vnclisten=0.0.0.0,keymap=en-us
//! type=vnc,vncdisplay=2
//! type=sdl,display=:0.0,xauthority=/root/.Xauthority
//! ```

use super::vif::key_values;
use crate::error::{Result, XmError};
use crate::types::devices::{Graphics, SdlGraphics, VncGraphics};

const KEY: &str = "vfb";

/// Decode a `vfb` entry. `type=sdl` selects SDL; anything else is VNC.
///
/// Segments without `=` are skipped. A fixed `vncdisplay` that is not a
/// usable display number is an error.
pub fn decode_vfb(spec: &str) -> Result<Graphics> {
    let pairs = key_values(spec);

    if spec.contains("type=sdl") {
        let mut sdl = SdlGraphics::default();
        for (k, v) in pairs {
            match k {
                "display" => sdl.display = Some(v.to_string()),
                "xauthority" => sdl.xauthority = Some(v.to_string()),
                _ => {}
            }
        }
        return Ok(Graphics::Sdl(sdl));
    }

    let mut vnc = VncGraphics::default();
    let mut unused = false;
    let mut display = None;
    for (k, v) in pairs {
        match k {
            "vncunused" => unused = v == "1",
            "vncdisplay" => display = Some(v.trim()),
            "vnclisten" => vnc.listen = Some(v.to_string()),
            "vncpasswd" => vnc.passwd = Some(v.to_string()),
            "keymap" => vnc.keymap = Some(v.to_string()),
            _ => {}
        }
    }
    if let (false, Some(display)) = (unused, display) {
        let port = display
            .parse::<u64>()
            .ok()
            .and_then(|d| i64::try_from(d).ok())
            .and_then(VncGraphics::port_for_display);
        vnc.port = Some(port.ok_or_else(|| {
            XmError::malformed(KEY, format!("vncdisplay {} is out of range", display))
        })?);
    }
    Ok(Graphics::Vnc(vnc))
}

/// Encode graphics as a `vfb` entry.
pub fn encode_vfb(graphics: &Graphics) -> String {
    let mut out = format!("type={}", graphics.type_name());
    let mut push = |key: &str, value: Option<&str>| {
        if let Some(value) = value {
            out.push_str(&format!(",{}={}", key, value));
        }
    };
    match graphics {
        Graphics::Vnc(vnc) => {
            match vnc.display() {
                Some(display) => push("vncdisplay", Some(&display.to_string())),
                None => push("vncunused", Some("1")),
            }
            push("vnclisten", vnc.listen.as_deref());
            push("vncpasswd", vnc.passwd.as_deref());
            push("keymap", vnc.keymap.as_deref());
        }
        Graphics::Sdl(sdl) => {
            push("display", sdl.display.as_deref());
            push("xauthority", sdl.xauthority.as_deref());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_vnc_autoport() {
        match decode_vfb("type=vnc,vncunused=1,vnclisten=0.0.0.0,keymap=en-us").unwrap() {
            Graphics::Vnc(vnc) => {
                assert!(vnc.autoport());
                assert_eq!(vnc.listen.as_deref(), Some("0.0.0.0"));
                assert_eq!(vnc.keymap.as_deref(), Some("en-us"));
            }
            other => panic!("expected vnc, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_vnc_display() {
        match decode_vfb("vncdisplay=2, vncpasswd=secret").unwrap() {
            Graphics::Vnc(vnc) => {
                assert_eq!(vnc.port, Some(5902));
                assert_eq!(vnc.passwd.as_deref(), Some("secret"));
            }
            other => panic!("expected vnc, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_sdl() {
        let g = decode_vfb("type=sdl,display=:0.0,xauthority=/root/.Xauthority").unwrap();
        assert_eq!(
            g,
            Graphics::Sdl(SdlGraphics {
                display: Some(":0.0".into()),
                xauthority: Some("/root/.Xauthority".into()),
            })
        );
    }

    #[test]
    fn test_decode_skips_bare_segment() {
        match decode_vfb("type=vnc,junk,vnclisten=1.2.3.4").unwrap() {
            Graphics::Vnc(vnc) => assert_eq!(vnc.listen.as_deref(), Some("1.2.3.4")),
            other => panic!("expected vnc, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_display_is_malformed() {
        for spec in ["type=vnc,vncdisplay=70000", "type=vnc,vncdisplay=-1", "type=vnc,vncdisplay=x"] {
            assert!(matches!(decode_vfb(spec), Err(XmError::MalformedConfig { .. })), "{}", spec);
        }
        // ignored when the display is picked automatically
        assert!(decode_vfb("type=vnc,vncunused=1,vncdisplay=x").is_ok());
    }

    #[test]
    fn test_encode_reproduces_input() {
        for spec in [
            "type=vnc,vncunused=1,vnclisten=0.0.0.0,keymap=en-us",
            "type=vnc,vncdisplay=2,vncpasswd=secret",
            "type=sdl,display=:0.0,xauthority=/root/.Xauthority",
        ] {
            assert_eq!(encode_vfb(&decode_vfb(spec).unwrap()), spec);
        }
    }
}
