use anyhow::Result;
use osy_codegen::canopen::*;
use osy_codegen::{Codegen, CodegenError, GenerateOptions};
use osy_core::Direction;
use testutil::{fixtures::*, util::*};

#[test]
fn manager_files_generated() -> Result<()> {
    let node = canopen_node();
    let (_dir, files) = generate_into_tempdir(&node, "Main", GenerateOptions::default())?;

    assert_eq!(
        file_names(&files),
        [
            "osy_init.h",
            "osy_init.c",
            "com_data_pool.h",
            "com_data_pool.c",
            "comm_canopen_can1.h",
            "comm_canopen_can1.c",
            "osco_man_config_can1.h",
            "osco_man_config_can1.c",
            "osco_man_config_init.h",
            "osco_man_config_init.c",
        ]
    );

    let header = read_generated(&files, "osco_man_config_can1.h")?;
    assert!(header.contains("#define OSCO_MAN_CONFIG_CAN1_START_DEVICES_INDIVIDUALLY_AND_NMT_START_ALL"));
    assert!(header.contains("#define OSCO_MAN_CONFIG_CAN1_ON_ERROR_RESTART_FAILED_DEVICE"));
    assert!(header.contains("#define OSCO_MAN_CONFIG_CAN1_DEVICE_INDEX_SENSOR (0U)"));

    let init = read_generated(&files, "osco_man_config_init.c")?;
    assert!(init.contains("&gt_osco_man_config_can1_ManagerConfiguration,"));

    let osy_init = read_generated(&files, "osy_init.h")?;
    assert!(osy_init.contains("#define OSY_INIT_HOSTS_CANOPEN_MANAGER (1U)"));

    Ok(())
}

#[test]
fn concise_buffer_size_law() -> Result<()> {
    let node = canopen_node();
    let manager = &node.canopen_managers[&0];
    let device = &manager.devices[&5];
    let container = &node.protocols[0].containers[0];

    let pdos = [
        (Direction::Tx, &container.tx[0]),
        (Direction::Rx, &container.rx[0]),
    ];
    let entries = device_concise_entries(manager, device, &pdos)?;

    // reset, 2 heartbeat consumers, producer, 7 RPDO and 8 TPDO entries
    assert_eq!(entries.len(), 19);
    assert_eq!(concise_array_size(&entries), 189);
    assert_eq!(encode_concise(&entries).len(), 189);

    let (_dir, files) = generate_into_tempdir(&node, "Main", GenerateOptions::default())?;
    let header = read_generated(&files, "osco_man_config_can1.h")?;
    assert!(header.contains("#define OSCO_MAN_CONFIG_CAN1_CONCISE_BUFFER_SIZE (191U)"));

    let source = read_generated(&files, "osco_man_config_can1.c")?;
    assert!(source.contains("static const uint8 mau8_ConciseDevice5[189] ="));
    assert!(source.contains("{ 5U, 0U, 0U, 250U, 189U, &mau8_ConciseDevice5[0] }, ///< Sensor"));

    Ok(())
}

#[test]
fn no_init_device_has_no_concise_data() -> Result<()> {
    let mut node = canopen_node();
    if let Some(m) = node.canopen_managers.get_mut(&0) {
        if let Some(d) = m.devices.get_mut(&5) {
            d.no_init = true;
        }
    }

    let (_dir, files) = generate_into_tempdir(&node, "Main", GenerateOptions::default())?;
    let source = read_generated(&files, "osco_man_config_can1.c")?;
    assert!(!source.contains("mau8_ConciseDevice5"));
    assert!(source.contains("{ 5U, 0U, 1U, 250U, 0U, NULL }, ///< Sensor"));

    let header = read_generated(&files, "osco_man_config_can1.h")?;
    assert!(header.contains("_CONCISE_BUFFER_SIZE (6U)"));

    Ok(())
}

#[test]
fn manager_needs_a_start_mode() -> Result<()> {
    let mut node = canopen_node();
    if let Some(m) = node.canopen_managers.get_mut(&0) {
        m.start_devices = false;
        m.nmt_start_all = false;
    }

    let dir = tempfile::tempdir()?;
    let res = Codegen::new(&node, "Main", GenerateOptions::default())?.generate(dir.path());
    assert!(matches!(res, Err(CodegenError::Config(_))));

    Ok(())
}

#[test]
fn tpdo_entries_follow_object_dictionary() -> Result<()> {
    let node = canopen_node();
    let manager = &node.canopen_managers[&0];
    let device = &manager.devices[&5];
    let measurement = &node.protocols[0].containers[0].rx[0];

    let entries = device_concise_entries(manager, device, &[(Direction::Rx, measurement)])?;
    let tpdo: Vec<_> = entries
        .iter()
        .filter(|e| e.index == 0x1800)
        .map(|e| (e.sub_index, e.payload.clone()))
        .collect();

    assert_eq!(
        tpdo,
        [
            (1, (0x185u32 | 1 << 31).to_le_bytes().to_vec()),
            (2, vec![255]),
            (3, 20u16.to_le_bytes().to_vec()),
            (5, 100u16.to_le_bytes().to_vec()),
            (1, 0x185u32.to_le_bytes().to_vec()),
        ]
    );

    let hb = entries.iter().find(|e| e.index == 0x1016 && e.sub_index == 1);
    assert_eq!(
        hb.map(|e| e.payload.clone()),
        Some(((1u32 << 16) | 300).to_le_bytes().to_vec())
    );

    Ok(())
}
