//! Integration tests for the domain store.
//!
//! These tests drive the public store API against a scratch definitions
//! directory:
//! - Load and translate existing files
//! - Mutate and persist definitions
//! - Define and undefine
//! - Attach and detach devices
//!
//! The refresh interval is zero so every call rescans the directory.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;
use xmconf_core::{
    cache::unix_now,
    minilang::{decode_vif, encode_vif},
    types::{DiskBus, DiskType, NetConnection, VirtMode},
    ConfigCache, DomainState, DomainStore, HostCapabilities, MacAddr, OpenMode, StaticNetworks,
    StoreConfig, Translator, XmError,
};

const VM1: &str = r#"
name = "vm1"
uuid = "c7a5fdbd-edaf-9455-926a-d65c16db1809"
memory = 256
vcpus = 2
disk = [ "phy:/dev/vg/vm1,xvda,w" ]
"#;

const VM2: &str = r#"
name = "vm2"
uuid = "0b7ed1b5-6e4f-4d0f-9a55-7a1f52a1c001"
memory = 512
maxmem = 1024
vif = [ "mac=00:16:3e:01:02:03,bridge=br0" ]
"#;

fn write(dir: &Path, file: &str, text: &str) {
    std::fs::write(dir.join(file), text).unwrap();
}

fn test_store(dir: &TempDir) -> DomainStore {
    let mut networks = StaticNetworks::default();
    networks.insert("default", "virbr0");
    let translator = Translator::new(Arc::new(HostCapabilities::xen_default()), Arc::new(networks), 3);
    let config = StoreConfig { config_dir: dir.path().to_path_buf(), refresh_interval_secs: 0, ..Default::default() };
    DomainStore::new(config, translator)
}

fn disk_xml(dev: &str, target: &str) -> String {
    format!(
        "<disk type='block' device='disk'><source dev='{}'/><target dev='{}' bus='xen'/></disk>",
        dev, target
    )
}

#[test]
fn test_existing_file_is_loaded() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);

    let dom = store.lookup_by_name(&session, "vm1").unwrap();
    assert!(!dom.is_active());

    let def = store.definition(&dom).unwrap();
    assert_eq!(def.os.mode, VirtMode::Xen);
    assert_eq!(def.memory_kib, 262144);
    assert_eq!(def.max_memory_kib, 262144);
    assert_eq!(def.vcpus, 2);
    assert_eq!(def.disks.len(), 1);
    let disk = &def.disks[0];
    assert_eq!(disk.target, "xvda");
    assert_eq!(disk.bus, DiskBus::Xen);
    assert_eq!(disk.disk_type, DiskType::Block);
    assert!(!disk.readonly);

    let info = store.get_info(&dom).unwrap();
    assert_eq!(info.state, DomainState::Shutoff);
    assert_eq!(info.memory_kib, 262144);
    assert_eq!(info.vcpus, 2);
    assert_eq!(info.cpu_time_ns, 0);
}

#[test]
fn test_lookup_by_uuid_and_missing_names() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadOnly);

    let uuid = "c7a5fdbd-edaf-9455-926a-d65c16db1809".parse().unwrap();
    assert_eq!(store.lookup_by_uuid(&session, &uuid).unwrap().name, "vm1");

    assert!(matches!(store.lookup_by_name(&session, "nope"), Err(XmError::DomainNotFound { .. })));
    let other = "00000000-0000-0000-0000-000000000001".parse().unwrap();
    assert!(matches!(store.lookup_by_uuid(&session, &other), Err(XmError::NotFound { .. })));
}

#[test]
fn test_vif_string_round_trips() {
    let net = decode_vif("mac=00:16:3e:01:02:03,bridge=br0").unwrap();
    assert_eq!(net.mac, "00:16:3e:01:02:03".parse::<MacAddr>().unwrap());
    assert_eq!(net.connection, NetConnection::Bridge { bridge: Some("br0".into()) });

    let encoded = encode_vif(&net, false, &StaticNetworks::default()).unwrap();
    assert_eq!(encoded, "mac=00:16:3e:01:02:03,bridge=br0");
}

#[test]
fn test_attach_and_detach_disks() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    let dom = store.lookup_by_name(&session, "vm1").unwrap();

    store.attach_device(&dom, &disk_xml("/dev/vg/vm1b", "xvdb")).unwrap();
    let targets: Vec<_> = store.definition(&dom).unwrap().disks.into_iter().map(|d| d.target).collect();
    assert_eq!(targets, vec!["xvda", "xvdb"]);

    store.detach_device(&dom, &disk_xml("/dev/vg/vm1", "xvda")).unwrap();
    let targets: Vec<_> = store.definition(&dom).unwrap().disks.into_iter().map(|d| d.target).collect();
    assert_eq!(targets, vec!["xvdb"]);

    // The change reached the file.
    let on_disk = store.translator().read_file(&dir.path().join("vm1")).unwrap();
    assert_eq!(on_disk.disks.len(), 1);
    assert_eq!(on_disk.disks[0].target, "xvdb");

    assert!(matches!(
        store.detach_device(&dom, &disk_xml("/dev/vg/vm1", "xvda")),
        Err(XmError::NotFound { .. })
    ));
    assert!(matches!(
        store.attach_device(&dom, "<graphics type='vnc'/>"),
        Err(XmError::Unsupported { .. })
    ));
}

#[test]
fn test_attach_and_detach_interfaces() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm2", VM2);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    let dom = store.lookup_by_name(&session, "vm2").unwrap();

    store
        .attach_device(&dom, "<interface type='network'><mac address='00:16:3e:0a:0b:0c'/><source network='default'/></interface>")
        .unwrap();
    let text = std::fs::read_to_string(dir.path().join("vm2")).unwrap();
    assert!(text.contains("mac=00:16:3e:0a:0b:0c,bridge=virbr0"));

    store
        .detach_device(&dom, "<interface type='bridge'><mac address='00:16:3e:01:02:03'/></interface>")
        .unwrap();
    let nets = store.definition(&dom).unwrap().nets;
    assert_eq!(nets.len(), 1);
    assert_eq!(nets[0].mac.to_string(), "00:16:3e:0a:0b:0c");
}

#[test]
fn test_memory_setters_clamp() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm2", VM2);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    let dom = store.lookup_by_name(&session, "vm2").unwrap();

    store.set_memory(&dom, 4 * 1024 * 1024).unwrap();
    let info = store.get_info(&dom).unwrap();
    assert_eq!(info.memory_kib, 1024 * 1024);

    store.set_max_memory(&dom, 256 * 1024).unwrap();
    let info = store.get_info(&dom).unwrap();
    assert_eq!(info.max_memory_kib, 256 * 1024);
    assert_eq!(info.memory_kib, 256 * 1024);
    assert_eq!(store.get_max_memory(&dom).unwrap(), 256 * 1024);

    store.set_vcpus(&dom, 4).unwrap();
    let on_disk = store.translator().read_file(&dir.path().join("vm2")).unwrap();
    assert_eq!(on_disk.memory_kib, 256 * 1024);
    assert_eq!(on_disk.vcpus, 4);
}

#[test]
fn test_define_and_undefine() {
    let dir = TempDir::new().unwrap();
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);

    let xml = "<domain type='xen'><name>web</name><memory>131072</memory><vcpu>1</vcpu>\
        <os><type>linux</type><kernel>/boot/vmlinuz</kernel></os>\
        <devices><disk type='file' device='disk'><driver name='file'/><source file='/srv/web.img'/>\
        <target dev='xvda'/></disk></devices></domain>";
    let dom = store.define_xml(&session, xml).unwrap();
    assert_eq!(dom.name, "web");
    assert!(dir.path().join("web").is_file());
    assert_eq!(store.num_of_defined().unwrap(), 1);

    let dumped = store.dump_xml(&dom, false).unwrap();
    assert!(dumped.contains("<name>web</name>"));
    assert!(dumped.contains("/srv/web.img"));

    store.undefine(&dom).unwrap();
    assert!(!dir.path().join("web").exists());
    assert!(matches!(store.lookup_by_name(&session, "web"), Err(XmError::DomainNotFound { .. })));
    assert_eq!(store.num_of_defined().unwrap(), 0);
}

#[test]
fn test_define_takes_over_a_name() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "legacy-vm1", VM1);
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    assert!(store.cache().owner_of("vm1").unwrap().ends_with("legacy-vm1"));

    let xml = "<domain type='xen'><name>vm1</name><uuid>c7a5fdbd-edaf-9455-926a-d65c16db1809</uuid>\
        <memory>524288</memory><os><type>xen</type><kernel>/boot/vmlinuz</kernel></os></domain>";
    let dom = store.define_xml(&session, xml).unwrap();
    assert!(store.cache().owner_of("vm1").unwrap().ends_with("vm1"));
    assert_eq!(store.get_info(&dom).unwrap().memory_kib, 524288);

    // The old file is still on disk but cannot take the name back.
    let names = store.list_defined(10, &HashSet::new()).unwrap();
    assert_eq!(names, vec!["vm1"]);
    assert_eq!(store.num_of_defined().unwrap(), 1);
}

#[test]
fn test_read_only_and_active_handles_are_refused() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    let mut store = test_store(&dir);
    let ro = store.open(OpenMode::ReadOnly);

    let dom = store.lookup_by_name(&ro, "vm1").unwrap();
    assert!(matches!(store.set_memory(&dom, 1024), Err(XmError::ReadOnly { .. })));
    assert!(matches!(store.attach_device(&dom, &disk_xml("/dev/x", "xvdc")), Err(XmError::ReadOnly { .. })));
    assert!(store.dump_xml(&dom, false).is_ok());

    let rw = store.open(OpenMode::ReadWrite);
    let mut dom = store.lookup_by_name(&rw, "vm1").unwrap();
    dom.id = Some(7);
    assert!(matches!(store.set_vcpus(&dom, 1), Err(XmError::InvalidState { .. })));
    assert!(matches!(store.undefine(&dom), Err(XmError::InvalidState { .. })));
    assert!(dir.path().join("vm1").exists());
}

#[test]
fn test_list_defined_skips_running_and_honors_max() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    write(dir.path(), "vm2", VM2);
    write(dir.path(), "broken", "name = [ unterminated");
    write(dir.path(), "xmexample1", VM1);
    let mut store = test_store(&dir);
    let _session = store.open(OpenMode::ReadOnly);

    let running: HashSet<String> = ["vm2".to_string()].into_iter().collect();
    assert_eq!(store.list_defined(10, &running).unwrap(), vec!["vm1"]);
    assert_eq!(store.list_defined(1, &HashSet::new()).unwrap().len(), 1);
    assert!(store.list_defined(0, &HashSet::new()).unwrap().is_empty());
    assert_eq!(store.num_of_defined().unwrap(), 2);
}

#[test]
fn test_deleted_file_is_reaped_after_interval() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm1", VM1);
    write(dir.path(), "vm2", VM2);
    let mut cache = ConfigCache::new(dir.path(), Translator::xen_default(3), xmconf_core::cache::DEFAULT_REFRESH_INTERVAL);

    let t = unix_now();
    cache.refresh_at(t).unwrap();
    assert_eq!(cache.size(), 2);

    std::fs::remove_file(dir.path().join("vm1")).unwrap();
    cache.refresh_at(t + 5).unwrap();
    assert!(cache.lookup_by_name("vm1").is_some());

    cache.refresh_at(t + 11).unwrap();
    assert!(cache.lookup_by_name("vm1").is_none());
    assert!(cache.owner_of("vm1").is_none());
    assert_eq!(cache.size(), 1);
    assert_eq!(cache.name_count(), 1);
}

#[test]
fn test_missing_directory_fails_lookup() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        config_dir: dir.path().join("absent"),
        refresh_interval_secs: 0,
        ..Default::default()
    };
    let mut store = DomainStore::with_config(config);
    let session = store.open(OpenMode::ReadWrite);
    assert!(matches!(store.lookup_by_name(&session, "vm1"), Err(XmError::Io { .. })));
}

fn pv_xml(name: &str, cmdline: &str) -> String {
    format!(
        "<domain type='xen'><name>{}</name><uuid>c7a5fdbd-edaf-9455-926a-d65c16db1809</uuid>\
         <memory>262144</memory><os><type>xen</type><kernel>/boot/vmlinuz</kernel>\
         <cmdline>{}</cmdline></os></domain>",
        name, cmdline
    )
}

#[test]
fn test_cmdline_with_both_quotes_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    store.define_xml(&session, &pv_xml("vm1", "init=\"/bin/sh\" it's")).unwrap();
    store.close(session);

    let session = store.open(OpenMode::ReadOnly);
    let dom = store.lookup_by_name(&session, "vm1").unwrap();
    let def = store.definition(&dom).unwrap();
    assert_eq!(def.os.cmdline.as_deref(), Some("init=\"/bin/sh\" it's"));
}

#[test]
fn test_unwritable_cmdline_is_refused_before_writing() {
    let dir = TempDir::new().unwrap();
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);

    let result = store.define_xml(&session, &pv_xml("vm1", "it's \"quoted\""));
    assert!(matches!(result, Err(XmError::MalformedConfig { .. })));
    assert!(!dir.path().join("vm1").exists());
    assert_eq!(store.num_of_defined().unwrap(), 0);
}

#[test]
fn test_cmdline_whitespace_is_kept() {
    let dir = TempDir::new().unwrap();
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    let dom = store.define_xml(&session, &pv_xml("vm1", " console=hvc0 ")).unwrap();
    store.set_vcpus(&dom, 2).unwrap();
    store.close(session);

    let session = store.open(OpenMode::ReadOnly);
    let dom = store.lookup_by_name(&session, "vm1").unwrap();
    assert_eq!(store.definition(&dom).unwrap().os.cmdline.as_deref(), Some(" console=hvc0 "));
}

#[test]
fn test_memory_above_maxmem_loads_unclamped() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "vm3", "name = \"vm3\"\nuuid = \"3f1c0a52-8d7e-4b1a-9c55-0e2f6a7b8c9d\"\nmemory = 1024\nmaxmem = 512\n");
    let mut store = test_store(&dir);
    let session = store.open(OpenMode::ReadWrite);
    let dom = store.lookup_by_name(&session, "vm3").unwrap();

    let info = store.get_info(&dom).unwrap();
    assert_eq!((info.memory_kib, info.max_memory_kib), (1048576, 524288));

    store.set_memory(&dom, 1048576).unwrap();
    assert_eq!(store.get_info(&dom).unwrap().memory_kib, 524288);
}
