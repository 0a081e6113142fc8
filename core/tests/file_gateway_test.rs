use std::path::PathBuf;
use std::sync::Arc;

use lumen_core::bus::MachineBus;
use lumen_core::device::FileGateway;
use lumen_core::device::file_gateway::{
    CMD_READ, CMD_WRITE, FILE_ERR_NOT_FOUND, FILE_ERR_PATH_TRAVERSAL, FILE_OK, REG_CMD,
    REG_DATA_PTR, REG_ERROR, REG_LEN, REG_NAME_PTR, REG_STATUS, sanitize_path,
};

const GW: u32 = 0xF1100;
const DATA: u32 = 0x7_0000;
const NAME_AT: u32 = 0x4000;

struct Rig {
    bus: Arc<MachineBus>,
    dir: PathBuf,
}

fn setup(tag: &str) -> Rig {
    let dir = std::env::temp_dir().join(format!("lumen-files-{tag}-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();

    let mut bus = MachineBus::new(0x10_0000);
    let gw = FileGateway::new(GW, dir.clone(), DATA);
    gw.map(&mut bus).unwrap();
    let bus = Arc::new(bus);
    gw.connect_bus(&bus);
    Rig { bus, dir }
}

fn set_name(rig: &Rig, name: &str) {
    let mut bytes = name.as_bytes().to_vec();
    bytes.push(0);
    rig.bus.write_block(NAME_AT, &bytes);
    rig.bus.write32(GW + REG_NAME_PTR, NAME_AT);
}

#[test]
fn test_write_then_read_roundtrip() {
    let rig = setup("roundtrip");
    set_name(&rig, "save.dat");
    rig.bus.write_block(DATA, b"guest data");
    rig.bus.write32(GW + REG_LEN, 10);
    rig.bus.write32(GW + REG_CMD, CMD_WRITE);
    assert_eq!(rig.bus.read32(GW + REG_STATUS), FILE_OK);
    assert_eq!(std::fs::read(rig.dir.join("save.dat")).unwrap(), b"guest data");

    // Clobber the staging area, then read the file back into it.
    rig.bus.write_block(DATA, &[0u8; 16]);
    rig.bus.write32(GW + REG_LEN, 0);
    rig.bus.write32(GW + REG_CMD, CMD_READ);
    assert_eq!(rig.bus.read32(GW + REG_STATUS), FILE_OK);
    assert_eq!(rig.bus.read32(GW + REG_LEN), 10);
    let mut back = [0u8; 10];
    rig.bus.read_block(DATA, &mut back);
    assert_eq!(&back, b"guest data");
    let _ = std::fs::remove_dir_all(&rig.dir);
}

#[test]
fn test_missing_file_reports_not_found() {
    let rig = setup("missing");
    set_name(&rig, "nope.bin");
    rig.bus.write32(GW + REG_CMD, CMD_READ);
    assert_eq!(rig.bus.read32(GW + REG_STATUS), 1);
    assert_eq!(rig.bus.read32(GW + REG_ERROR), FILE_ERR_NOT_FOUND);
}

#[test]
fn test_traversal_and_absolute_paths_rejected() {
    let rig = setup("traversal");
    for name in ["../secrets.txt", "/etc/passwd", "a/../../b"] {
        set_name(&rig, name);
        rig.bus.write32(GW + REG_CMD, CMD_READ);
        assert_eq!(rig.bus.read32(GW + REG_STATUS), 1, "{name}");
        assert_eq!(rig.bus.read32(GW + REG_ERROR), FILE_ERR_PATH_TRAVERSAL, "{name}");
    }
}

#[test]
fn test_subdirectories_inside_sandbox_are_fine() {
    let rig = setup("subdir");
    std::fs::create_dir_all(rig.dir.join("sub")).unwrap();
    std::fs::write(rig.dir.join("sub/x.bin"), b"abc").unwrap();
    set_name(&rig, "sub/x.bin");
    rig.bus.write32(GW + REG_CMD, CMD_READ);
    assert_eq!(rig.bus.read32(GW + REG_STATUS), FILE_OK);
    assert_eq!(rig.bus.read32(GW + REG_LEN), 3);
    let _ = std::fs::remove_dir_all(&rig.dir);
}

#[test]
fn test_sanitize_path_rules() {
    let base = PathBuf::from("/work/media");
    assert!(sanitize_path(&base, "song.ym").is_some());
    assert!(sanitize_path(&base, "sub/dir/song.ym").is_some());
    assert!(sanitize_path(&base, "./song.ym").is_some());
    assert!(sanitize_path(&base, "").is_none());
    assert!(sanitize_path(&base, "../song.ym").is_none());
    assert!(sanitize_path(&base, "a/../b").is_none());
    assert!(sanitize_path(&base, "/abs/path").is_none());
    assert!(sanitize_path(&base, "nul\0name").is_none());
}
