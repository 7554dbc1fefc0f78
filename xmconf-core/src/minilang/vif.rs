//! Network-interface spec strings: comma-separated `key=value` pairs.
//!
//! ```text
//! mac=00:16:3e:01:02:03,bridge=xenbr0,model=e1000
//! mac=00:16:3e:01:02:04,script=vif-route,ip=10.0.0.5
//! ```

use crate::error::{Result, XmError};
use crate::host::NetworkResolver;
use crate::types::net::{MacAddr, NetConnection, NetworkInterface};

const KEY: &str = "vif";

/// Marker added to every interface of a fully virtualized guest.
pub const IOEMU_MARKER: &str = "type=ioemu";

/// Split a mini-language string into `key=value` pairs.
///
/// Blanks after a comma are skipped, as are segments with no `=`.
pub(crate) fn key_values(spec: &str) -> impl Iterator<Item = (&str, &str)> {
    spec.split(',')
        .map(|seg| seg.trim_start_matches([' ', '\t']))
        .filter_map(|seg| seg.split_once('='))
}

/// Decode one `vif` list entry.
///
/// Unknown keys are ignored. An entry with no bridge, script or device is
/// treated as bridged.
pub fn decode_vif(spec: &str) -> Result<NetworkInterface> {
    let mut mac = None;
    let mut bridge = None;
    let mut dev = None;
    let mut script = None;
    let mut model = None;
    let mut ip = None;

    for (k, v) in key_values(spec) {
        let v = v.to_string();
        match k {
            "mac" => mac = Some(v),
            "bridge" => bridge = Some(v),
            "dev" => dev = Some(v),
            "script" => script = Some(v),
            "model" => model = Some(v),
            "ip" => ip = Some(v),
            _ => {}
        }
    }

    let mac: MacAddr = mac
        .ok_or_else(|| XmError::malformed(KEY, format!("'{}' has no mac", spec)))?
        .parse()
        .map_err(|e: String| XmError::malformed(KEY, e))?;

    let bridged = bridge.is_some()
        || script.as_deref().is_some_and(|s| s.ends_with("vif-bridge"))
        || (script.is_none() && dev.is_none());
    let connection = if bridged {
        NetConnection::Bridge { bridge }
    } else {
        NetConnection::Ethernet { dev }
    };

    Ok(NetworkInterface { mac, connection, script, ip, model })
}

/// Encode an interface as a `vif` list entry.
///
/// A virtual network is written as the bridge it is backed by.
pub fn encode_vif(net: &NetworkInterface, hvm: bool, networks: &dyn NetworkResolver) -> Result<String> {
    let mut out = format!("mac={}", net.mac);
    match &net.connection {
        NetConnection::Bridge { bridge: Some(bridge) } => {
            out.push_str(",bridge=");
            out.push_str(bridge);
        }
        NetConnection::Ethernet { dev: Some(dev) } => {
            out.push_str(",dev=");
            out.push_str(dev);
        }
        NetConnection::Network { network } => {
            out.push_str(",bridge=");
            out.push_str(&networks.bridge_for(network)?);
        }
        NetConnection::Bridge { bridge: None } | NetConnection::Ethernet { dev: None } => {}
    }
    if hvm {
        out.push(',');
        out.push_str(IOEMU_MARKER);
    }
    for (key, value) in [("script", &net.script), ("model", &net.model), ("ip", &net.ip)] {
        if let Some(value) = value {
            out.push(',');
            out.push_str(key);
            out.push('=');
            out.push_str(value);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::StaticNetworks;

    #[test]
    fn test_decode_bridge() {
        let net = decode_vif("mac=00:16:3e:01:02:03,bridge=br0").unwrap();
        assert_eq!(net.mac.to_string(), "00:16:3e:01:02:03");
        assert_eq!(net.connection, NetConnection::Bridge { bridge: Some("br0".into()) });
        assert_eq!(encode_vif(&net, false, &StaticNetworks::default()).unwrap(), "mac=00:16:3e:01:02:03,bridge=br0");
    }

    #[test]
    fn test_decode_skips_bare_segments() {
        let net = decode_vif("mac=00:16:3e:01:02:03,junk, ,bridge=br0").unwrap();
        assert_eq!(net.connection, NetConnection::Bridge { bridge: Some("br0".into()) });
        assert!(decode_vif("junk,bridge=br0").is_err());
    }

    #[test]
    fn test_decode_defaults_to_bridge() {
        let net = decode_vif("mac=00:16:3e:01:02:03, model=e1000").unwrap();
        assert_eq!(net.connection, NetConnection::Bridge { bridge: None });
        assert_eq!(net.model.as_deref(), Some("e1000"));

        let net = decode_vif("mac=00:16:3e:01:02:03,script=/etc/xen/scripts/vif-bridge").unwrap();
        assert_eq!(net.connection.type_name(), "bridge");
    }

    #[test]
    fn test_decode_ethernet() {
        let net = decode_vif("mac=00:16:3e:01:02:03,script=vif-route,ip=10.0.0.5,type=ioemu").unwrap();
        assert_eq!(net.connection, NetConnection::Ethernet { dev: None });
        assert_eq!(net.script.as_deref(), Some("vif-route"));
        assert_eq!(net.ip.as_deref(), Some("10.0.0.5"));
    }

    #[test]
    fn test_decode_rejects() {
        assert!(decode_vif("bridge=br0").is_err());
        assert!(decode_vif("mac=00:16:3e:01:02,bridge=br0").is_err());
        assert!(decode_vif("mac=00:16:3e:01:02:03,garbage").is_err());
    }

    #[test]
    fn test_encode_hvm_order() {
        let mut net = decode_vif("mac=00:16:3e:0a:0b:0c,ip=10.0.0.5,model=rtl8139,script=vif-route,dev=vif1").unwrap();
        net.connection = NetConnection::Ethernet { dev: Some("vif1".into()) };
        assert_eq!(
            encode_vif(&net, true, &StaticNetworks::default()).unwrap(),
            "mac=00:16:3e:0a:0b:0c,dev=vif1,type=ioemu,script=vif-route,model=rtl8139,ip=10.0.0.5"
        );
    }

    #[test]
    fn test_encode_resolves_network() {
        let mut networks = StaticNetworks::default();
        networks.insert("default", "virbr0");
        let mut net = NetworkInterface::bridged("00:16:3e:01:02:03".parse().unwrap(), None);
        net.connection = NetConnection::Network { network: "default".into() };
        assert_eq!(encode_vif(&net, false, &networks).unwrap(), "mac=00:16:3e:01:02:03,bridge=virbr0");

        net.connection = NetConnection::Network { network: "missing".into() };
        assert!(encode_vif(&net, false, &networks).is_err());
    }
}
