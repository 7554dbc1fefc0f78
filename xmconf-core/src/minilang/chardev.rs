//! Character-device strings used by `serial` and `parallel`.
//!
//! ```text
//! pty | null | vc | stdio | /dev/ttyS0 | file:/var/log/guest.log
//! pipe:/tmp/guest | tcp:0.0.0.0:4555,server,nowait | telnet::4555,server
//! udp:10.0.0.1:5555@:6666 | unix:/var/run/guest.sock,server
//! ```

use crate::error::{Result, XmError};
use crate::types::devices::CharDevice;

/// Parse a character-device string. `key` names the setting for errors.
pub fn parse_chardev(key: &str, spec: &str) -> Result<CharDevice> {
    let bad = |reason: &str| XmError::malformed(key, format!("'{}': {}", spec, reason));

    match spec {
        "null" => return Ok(CharDevice::Null),
        "vc" => return Ok(CharDevice::Vc),
        "pty" => return Ok(CharDevice::Pty),
        "stdio" => return Ok(CharDevice::Stdio),
        _ => {}
    }
    if spec.starts_with("/dev/") {
        return Ok(CharDevice::Dev { path: spec.to_string() });
    }

    let (kind, value) = spec.split_once(':').ok_or_else(|| bad("unknown device type"))?;
    match kind {
        "file" | "pipe" if value.is_empty() => Err(bad("missing path")),
        "file" => Ok(CharDevice::File { path: value.to_string() }),
        "pipe" => Ok(CharDevice::Pipe { path: value.to_string() }),
        "tcp" | "telnet" => {
            let (addr, opts) = split_options(value);
            let (host, service) = addr.rsplit_once(':').ok_or_else(|| bad("missing port"))?;
            if service.is_empty() {
                return Err(bad("missing port"));
            }
            Ok(CharDevice::Tcp {
                host: host.to_string(),
                service: service.to_string(),
                listen: opts.contains(&"server") || opts.contains(&"listen"),
                telnet: kind == "telnet",
            })
        }
        "udp" => {
            let (connect, bind) = match value.split_once('@') {
                Some((connect, bind)) => (connect, Some(bind)),
                None => (value, None),
            };
            let (connect_host, connect_service) =
                connect.rsplit_once(':').ok_or_else(|| bad("missing port"))?;
            if connect_service.is_empty() {
                return Err(bad("missing port"));
            }
            let (bind_host, bind_service) = match bind {
                Some(bind) => {
                    let (h, s) = bind.rsplit_once(':').ok_or_else(|| bad("missing bind port"))?;
                    (non_empty(h), non_empty(s))
                }
                None => (None, None),
            };
            Ok(CharDevice::Udp {
                connect_host: non_empty(connect_host),
                connect_service: connect_service.to_string(),
                bind_host,
                bind_service,
            })
        }
        "unix" => {
            let (path, opts) = split_options(value);
            if path.is_empty() {
                return Err(bad("missing path"));
            }
            Ok(CharDevice::Unix {
                path: path.to_string(),
                listen: opts.contains(&"server") || opts.contains(&"listen"),
            })
        }
        _ => Err(bad("unknown device type")),
    }
}

/// Format a character device back to its string form.
pub fn format_chardev(dev: &CharDevice) -> String {
    match dev {
        CharDevice::Null => "null".to_string(),
        CharDevice::Vc => "vc".to_string(),
        CharDevice::Pty => "pty".to_string(),
        CharDevice::Stdio => "stdio".to_string(),
        CharDevice::Dev { path } => path.clone(),
        CharDevice::File { path } => format!("file:{}", path),
        CharDevice::Pipe { path } => format!("pipe:{}", path),
        CharDevice::Tcp { host, service, listen, telnet } => format!(
            "{}:{}:{}{}",
            if *telnet { "telnet" } else { "tcp" },
            host,
            service,
            if *listen { ",server,nowait" } else { "" }
        ),
        CharDevice::Udp { connect_host, connect_service, bind_host, bind_service } => {
            let mut out =
                format!("udp:{}:{}", connect_host.as_deref().unwrap_or(""), connect_service);
            if bind_host.is_some() || bind_service.is_some() {
                out.push_str(&format!(
                    "@{}:{}",
                    bind_host.as_deref().unwrap_or(""),
                    bind_service.as_deref().unwrap_or("")
                ));
            }
            out
        }
        CharDevice::Unix { path, listen } => {
            format!("unix:{}{}", path, if *listen { ",server,nowait" } else { "" })
        }
    }
}

fn split_options(value: &str) -> (&str, Vec<&str>) {
    let mut parts = value.split(',');
    let head = parts.next().unwrap_or("");
    (head, parts.collect())
}

fn non_empty(s: &str) -> Option<String> {
    (!s.is_empty()).then(|| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_kinds() {
        assert_eq!(parse_chardev("serial", "pty").unwrap(), CharDevice::Pty);
        assert_eq!(parse_chardev("serial", "null").unwrap(), CharDevice::Null);
        assert_eq!(
            parse_chardev("serial", "/dev/ttyS0").unwrap(),
            CharDevice::Dev { path: "/dev/ttyS0".into() }
        );
        assert_eq!(
            parse_chardev("parallel", "file:/var/log/lp.log").unwrap(),
            CharDevice::File { path: "/var/log/lp.log".into() }
        );
    }

    #[test]
    fn test_tcp() {
        let dev = parse_chardev("serial", "tcp:0.0.0.0:4555,server,nowait").unwrap();
        assert_eq!(
            dev,
            CharDevice::Tcp { host: "0.0.0.0".into(), service: "4555".into(), listen: true, telnet: false }
        );
        assert_eq!(format_chardev(&dev), "tcp:0.0.0.0:4555,server,nowait");

        let telnet = parse_chardev("serial", "telnet::4555").unwrap();
        assert_eq!(format_chardev(&telnet), "telnet::4555");
    }

    #[test]
    fn test_udp() {
        let dev = parse_chardev("serial", "udp:10.0.0.1:5555@:6666").unwrap();
        assert_eq!(
            dev,
            CharDevice::Udp {
                connect_host: Some("10.0.0.1".into()),
                connect_service: "5555".into(),
                bind_host: None,
                bind_service: Some("6666".into()),
            }
        );
        assert_eq!(format_chardev(&dev), "udp:10.0.0.1:5555@:6666");
    }

    #[test]
    fn test_unix() {
        let dev = parse_chardev("serial", "unix:/var/run/guest.sock,server").unwrap();
        assert_eq!(dev, CharDevice::Unix { path: "/var/run/guest.sock".into(), listen: true });
        assert_eq!(format_chardev(&dev), "unix:/var/run/guest.sock,server,nowait");
    }

    #[test]
    fn test_rejects() {
        assert!(parse_chardev("serial", "bogus").is_err());
        assert!(parse_chardev("serial", "tcp:host").is_err());
        assert!(parse_chardev("serial", "file:").is_err());
        assert!(parse_chardev("serial", "vnc:1").is_err());
    }
}
