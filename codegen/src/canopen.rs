//! CANopen manager configuration (`osco_man_config_can<N>.h/.c` and
//! `osco_man_config_init.h/.c`).
//!
//! Each device the manager configures gets a concise DCF: a list of SDO
//! downloads the manager sends to the device at startup.

use indoc::formatdoc;
use osy_core::hash::DEFINITION_HASH;
use osy_core::*;

use crate::naming::*;
use crate::text::*;
use crate::{Codegen, CodegenError, Indent};

/// Added to the concise buffer size for servers that count the entry count
/// bytes twice.
const LEGACY_SERVER_BUFFER_COMPENSATION: usize = 2;

/// "load", written to 0x1011 to restore the factory defaults.
const RESTORE_SIGNATURE: u32 = 0x6461_6F6C;

const PDO_DISABLED: u32 = 1 << 31;
const PDO_EXTENDED_ID: u32 = 1 << 29;
const MAX_PDO_NUMBER: u16 = 0x1FF;
const MAX_MAPPED_OBJECTS: usize = 64;

const RPDO_COMMUNICATION: u16 = 0x1400;
const RPDO_MAPPING: u16 = 0x1600;
const TPDO_COMMUNICATION: u16 = 0x1800;
const TPDO_MAPPING: u16 = 0x1A00;

/// One SDO download of a concise DCF.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConciseEntry {
    pub index: u16,
    pub sub_index: u8,
    pub payload: Vec<u8>,
    pub comment: String,
}

impl ConciseEntry {
    pub fn u8(index: u16, sub_index: u8, value: u8, comment: impl Into<String>) -> Self {
        Self::new(index, sub_index, vec![value], comment)
    }

    pub fn u16(index: u16, sub_index: u8, value: u16, comment: impl Into<String>) -> Self {
        Self::new(index, sub_index, value.to_le_bytes().to_vec(), comment)
    }

    pub fn u32(index: u16, sub_index: u8, value: u32, comment: impl Into<String>) -> Self {
        Self::new(index, sub_index, value.to_le_bytes().to_vec(), comment)
    }

    fn new(index: u16, sub_index: u8, payload: Vec<u8>, comment: impl Into<String>) -> Self {
        Self {
            index,
            sub_index,
            payload,
            comment: comment.into(),
        }
    }

    /// Index (2), sub-index (1), size (4) and payload.
    pub fn encoded_len(&self) -> usize {
        7 + self.payload.len()
    }

    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.index.to_le_bytes());
        out.push(self.sub_index);
        out.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.payload);
    }
}

/// Size of the encoded concise DCF: entry count (4) plus the entries.
pub fn concise_array_size(entries: &[ConciseEntry]) -> usize {
    4 + entries.iter().map(ConciseEntry::encoded_len).sum::<usize>()
}

/// Concise DCF bytes: little-endian entry count followed by the entries.
pub fn encode_concise(entries: &[ConciseEntry]) -> Vec<u8> {
    let mut out = Vec::with_capacity(concise_array_size(entries));
    out.extend_from_slice(&(entries.len() as u32).to_le_bytes());
    for e in entries {
        e.encode_into(&mut out);
    }
    out
}

/// Concise DCF of one device.
///
/// `pdos` are the PDO messages of the device with their direction as seen
/// by the manager. Optional settings are only written when the device's
/// object dictionary has the object and it is writable.
pub fn device_concise_entries(
    manager: &CanOpenManagerInfo,
    device: &CanOpenDevice,
    pdos: &[(Direction, &CanMessage)],
) -> Result<Vec<ConciseEntry>, CodegenError> {
    let mut out = Vec::new();
    if device.no_init {
        return Ok(out);
    }

    let od = &device.object_dictionary;

    if device.factory_reset {
        out.push(ConciseEntry::u32(
            OD_RESTORE_DEFAULTS,
            1,
            RESTORE_SIGNATURE,
            "restore factory settings",
        ));
    }

    let slots = od.heartbeat_consumer_slots();
    if slots > 0 && od.is_writable(OD_HEARTBEAT_CONSUMER, 1) {
        let consumer = if device.heartbeat_consumer && manager.heartbeat_producer_ms > 0 {
            (u32::from(manager.node_id) << 16) | u32::from(device.heartbeat_consumer_ms)
        } else {
            0
        };

        out.push(ConciseEntry::u32(
            OD_HEARTBEAT_CONSUMER,
            1,
            consumer,
            "heartbeat consumer of manager",
        ));
        for sub in 2..=slots {
            out.push(ConciseEntry::u32(
                OD_HEARTBEAT_CONSUMER,
                sub,
                0,
                "heartbeat consumer unused",
            ));
        }
    }

    if od.is_writable(OD_HEARTBEAT_PRODUCER, 0) {
        out.push(ConciseEntry::u16(
            OD_HEARTBEAT_PRODUCER,
            0,
            device.heartbeat_producer_ms,
            "heartbeat producer time",
        ));
    }

    for (dir, msg) in pdos {
        pdo_entries(device, *dir, msg, &mut out)?;
    }

    Ok(out)
}

/// Reconfigure one PDO: disable it, set its parameters, rebuild the mapping
/// and enable it again.
fn pdo_entries(
    device: &CanOpenDevice,
    dir: Direction,
    msg: &CanMessage,
    out: &mut Vec<ConciseEntry>,
) -> Result<(), CodegenError> {
    let Some(pdo) = &msg.pdo else {
        return Ok(());
    };

    if pdo.pdo_index > MAX_PDO_NUMBER {
        return Err(CodegenError::config(format!(
            "PDO message `{}` uses PDO number {}, maximum is {MAX_PDO_NUMBER}.",
            msg.name, pdo.pdo_index
        )));
    }

    if msg.signals.len() > MAX_MAPPED_OBJECTS {
        return Err(CodegenError::config(format!(
            "PDO message `{}` maps {} signals, maximum is {MAX_MAPPED_OBJECTS}.",
            msg.name,
            msg.signals.len()
        )));
    }

    // manager Tx is received by the device and vice versa
    let (comm, mapping, kind) = match dir {
        Direction::Tx => (RPDO_COMMUNICATION, RPDO_MAPPING, "RPDO"),
        Direction::Rx => (TPDO_COMMUNICATION, TPDO_MAPPING, "TPDO"),
    };
    let comm = comm + pdo.pdo_index;
    let mapping = mapping + pdo.pdo_index;
    let label = format!("{kind}{} ({})", pdo.pdo_index + 1, msg.name);

    let mut cob_id = msg.id;
    if msg.extended {
        cob_id |= PDO_EXTENDED_ID;
    }

    let od = &device.object_dictionary;

    out.push(ConciseEntry::u32(
        comm,
        1,
        cob_id | PDO_DISABLED,
        format!("{label}: disable"),
    ));

    if od.is_writable(comm, 2) {
        let transmission_type = match msg.trigger {
            TxTrigger::CanOpenType254 => 254,
            _ => 255,
        };
        out.push(ConciseEntry::u8(
            comm,
            2,
            transmission_type,
            format!("{label}: transmission type"),
        ));
    }

    if od.is_writable(comm, 3) {
        out.push(ConciseEntry::u16(
            comm,
            3,
            pdo.inhibit_time,
            format!("{label}: inhibit time"),
        ));
    }

    if od.is_writable(comm, 5) {
        let timer = match dir {
            Direction::Tx => msg.timeout_ms,
            Direction::Rx => msg.cycle_ms,
        };
        out.push(ConciseEntry::u16(
            comm,
            5,
            u16::try_from(timer).unwrap_or(u16::MAX),
            format!("{label}: event timer"),
        ));
    }

    out.push(ConciseEntry::u8(
        mapping,
        0,
        0,
        format!("{label}: clear mapping"),
    ));

    for (i, sig) in msg.signals.iter().enumerate() {
        let Some(obj) = sig.object else {
            return Err(CodegenError::config(format!(
                "Signal {i} of PDO message `{}` is not mapped to an object.",
                msg.name
            )));
        };

        let entry = (u32::from(obj.index) << 16)
            | (u32::from(obj.sub_index) << 8)
            | u32::from(sig.bit_length as u8);

        out.push(ConciseEntry::u32(
            mapping,
            (i + 1) as u8,
            entry,
            format!("{label}: map 0x{:04X}/{}", obj.index, obj.sub_index),
        ));
    }

    out.push(ConciseEntry::u8(
        mapping,
        0,
        msg.signals.len() as u8,
        format!("{label}: number of mapped objects"),
    ));

    out.push(ConciseEntry::u32(comm, 1, cob_id, format!("{label}: enable")));

    Ok(())
}

/// File name of the manager configuration on zero-based `interface`.
pub fn manager_basename(interface: u8) -> String {
    format!("osco_man_config_can{}", u16::from(interface) + 1)
}

const INIT_BASENAME: &str = "osco_man_config_init";

fn manager_config_ident(interface: u8) -> String {
    format!("gt_{}_ManagerConfiguration", manager_basename(interface))
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum StartBehavior {
    IndividualAndNmtStartAll,
    Individual,
    NmtStartAll,
}

impl StartBehavior {
    fn of(manager: &CanOpenManagerInfo) -> Option<Self> {
        match (manager.start_devices, manager.nmt_start_all) {
            (true, true) => Some(Self::IndividualAndNmtStartAll),
            (true, false) => Some(Self::Individual),
            (false, true) => Some(Self::NmtStartAll),
            (false, false) => None,
        }
    }

    fn define_suffix(self) -> &'static str {
        match self {
            Self::IndividualAndNmtStartAll => "START_DEVICES_INDIVIDUALLY_AND_NMT_START_ALL",
            Self::Individual => "START_DEVICES_INDIVIDUALLY",
            Self::NmtStartAll => "NMT_START_ALL",
        }
    }
}

fn error_behavior_suffix(behavior: NmtErrorBehavior) -> &'static str {
    match behavior {
        NmtErrorBehavior::RestartAllDevices => "ON_ERROR_RESTART_ALL_DEVICES",
        NmtErrorBehavior::RestartFailedDevice => "ON_ERROR_RESTART_FAILED_DEVICE",
        NmtErrorBehavior::StopAllDevices => "ON_ERROR_STOP_ALL_DEVICES",
    }
}

/// C array of a concise DCF, one line per entry.
fn concise_array(ident: &str, entries: &[ConciseEntry]) -> String {
    let bytes = |b: &[u8]| {
        b.iter()
            .map(|b| format!("0x{b:02X}U,"))
            .collect::<Vec<_>>()
            .join(" ")
    };

    let mut lines = vec![
        format!("/* number of entries: {} */", entries.len()),
        bytes(&(entries.len() as u32).to_le_bytes()),
    ];

    for e in entries {
        let mut encoded = Vec::new();
        e.encode_into(&mut encoded);
        lines.push(format!(
            "/* 0x{:04X}/0x{:02X}: {} */",
            e.index, e.sub_index, e.comment
        ));
        lines.push(bytes(&encoded));
    }

    formatdoc! {"
        static const uint8 {ident}[{n}] =
        {{
        {lines}
        }};
        ",
        n = concise_array_size(entries),
        lines = lines.join("\n").indent(3),
    }
}

impl<'n> Codegen<'n> {
    /// The CANopen protocol of the node, if this application owns it.
    pub(crate) fn local_canopen_protocol(&self) -> Option<&'n CanProtocol> {
        self.local_protocols()
            .into_iter()
            .map(|(_, p)| p)
            .find(|p| p.kind == CanProtocolKind::CanOpen)
    }

    /// Interfaces this application runs a CANopen manager on.
    pub fn manager_interfaces(&self) -> Vec<u8> {
        if self.local_canopen_protocol().is_none() {
            return Vec::new();
        }

        self.node.canopen_managers.keys().copied().collect()
    }

    /// PDO messages of `device` on `interface`, Tx first.
    fn device_pdos(&self, interface: u8, device: u8) -> Vec<(Direction, &'n CanMessage)> {
        let Some(container) = self
            .local_canopen_protocol()
            .and_then(|p| p.containers.get(usize::from(interface)))
        else {
            return Vec::new();
        };

        [Direction::Tx, Direction::Rx]
            .into_iter()
            .flat_map(|dir| {
                container
                    .messages(dir)
                    .iter()
                    .filter(move |m| m.pdo.is_some_and(|p| p.device == device))
                    .map(move |m| (dir, m))
            })
            .collect()
    }

    /// Generate the manager configuration of zero-based `interface`.
    pub fn canopen_manager_files(&self, interface: u8) -> Result<SourcePair, CodegenError> {
        if self.version < 6 {
            return Err(CodegenError::unsupported(format!(
                "CANopen manager configuration needs code format version 6 or newer, got {}.",
                self.version
            )));
        }

        let manager = self
            .node
            .canopen_managers
            .get(&interface)
            .ok_or(CodegenError::Range("CANopen manager interface", interface.into()))?;

        let start = StartBehavior::of(manager).ok_or_else(|| {
            CodegenError::config(format!(
                "CANopen manager on CAN{}: devices are neither started individually nor by NMT start all.",
                u16::from(interface) + 1
            ))
        })?;

        let mut h = DEFINITION_HASH.digest();
        manager.hash_into(&mut h);
        h.update(&[interface]);
        h.update(&self.version.to_le_bytes());

        let mut devices = Vec::new();
        for (&node_id, device) in &manager.devices {
            let pdos = self.device_pdos(interface, node_id);
            for (_, msg) in &pdos {
                msg.hash_into(&mut h);
            }
            devices.push((node_id, device, device_concise_entries(manager, device, &pdos)?));
        }
        let project_hash = h.finalize();

        let basename = manager_basename(interface);
        let upper = basename.to_uppercase();

        let buffer_size = devices
            .iter()
            .map(|(_, _, e)| concise_array_size(e))
            .max()
            .unwrap_or(0)
            + LEGACY_SERVER_BUFFER_COMPENSATION;

        let device_defines = devices
            .iter()
            .enumerate()
            .map(|(i, (_, d, _))| {
                format!("#define {upper}_DEVICE_INDEX_{} ({i}U)", d.name.to_uppercase())
            })
            .collect::<Vec<_>>()
            .join("\n");

        let header_body = formatdoc! {"
            {defines}
            {project_id}

            #define {upper}_NUMBER_OF_DEVICES ({n}U)
            #define {upper}_CONCISE_BUFFER_SIZE ({buffer_size}U)
            #define {upper}_{start}
            #define {upper}_{stop}

            {device_defines}

            {globals}
            extern const T_osco_man_manager_configuration {ident};
            ",
            defines = section("Defines"),
            project_id = project_id_define(&basename, project_hash),
            n = devices.len(),
            start = start.define_suffix(),
            stop = error_behavior_suffix(manager.nmt_error_behavior),
            globals = section("Global Variables"),
            ident = manager_config_ident(interface),
        };

        let mut source_body = formatdoc! {"
            {defines}
            {guard}

            {project_id}

            {module_globals}
            ",
            defines = section("Defines"),
            guard = version_guard("OSCO_MAN_CONFIG_DEFINITION_VERSION", self.version, project_hash),
            project_id = project_id_macro(&basename, project_hash),
            module_globals = section("Module Global Variables"),
        };

        for (node_id, device, entries) in &devices {
            if device.no_init {
                continue;
            }
            source_body += &format!("/* Device `{}` (node ID {node_id}) */\n", device.name);
            source_body += &concise_array(&format!("mau8_ConciseDevice{node_id}"), entries);
            source_body += "\n";
        }

        if !devices.is_empty() {
            let rows = devices
                .iter()
                .map(|(node_id, d, entries)| {
                    let (size, concise) = if d.no_init {
                        (0, "NULL".to_string())
                    } else {
                        (
                            concise_array_size(entries),
                            format!("&mau8_ConciseDevice{node_id}[0]"),
                        )
                    };
                    format!(
                        "{{ {node_id}U, {}U, {}U, {}U, {size}U, {concise} }}, ///< {}",
                        u8::from(d.optional),
                        u8::from(d.no_init),
                        d.heartbeat_producer_ms,
                        d.name
                    )
                })
                .collect::<Vec<_>>()
                .join("\n");

            source_body += &formatdoc! {"
                static const T_osco_man_device_settings mat_Devices[{n}] =
                {{
                {rows}
                }};

                ",
                n = devices.len(),
                rows = rows.indent(3),
            };
        }

        source_body += &formatdoc! {"
            {globals}
            const T_osco_man_manager_configuration {ident} =
            {{
               {interface}U, ///< CAN channel
               {node_id}U, ///< manager node ID
               {autostart}U, ///< autostart
               {hb}U, ///< heartbeat producer time
               {sdo}U, ///< SDO timeout
               {n}U, ///< number of devices
               {table} ///< devices
            }};
            ",
            globals = section("Global Variables"),
            ident = manager_config_ident(interface),
            node_id = manager.node_id,
            autostart = u8::from(manager.autostart),
            hb = manager.heartbeat_producer_ms,
            sdo = manager.sdo_timeout_ms,
            n = devices.len(),
            table = if devices.is_empty() { "NULL" } else { "&mat_Devices[0]" },
        };

        let detail = format!(
            "CANopen manager on CAN{} for application `{}`.",
            u16::from(interface) + 1,
            self.app().name
        );
        let brief = "openSYDE CANopen manager configuration";

        Ok(SourcePair {
            header: header_file(
                &file_header(&format!("{basename}.h"), brief, &detail, &self.opts.exporter),
                &basename,
                &["stwtypes.h".into(), "osco_man_config.h".into()],
                &header_body,
            ),
            source: source_file(
                &file_header(&format!("{basename}.c"), brief, &detail, &self.opts.exporter),
                &basename,
                &source_body,
            ),
            basename,
        })
    }

    /// Generate the table of all manager configurations of the application.
    pub fn canopen_init_files(&self, interfaces: &[u8]) -> Result<SourcePair, CodegenError> {
        let mut h = DEFINITION_HASH.digest();
        for ifc in interfaces {
            let manager = self
                .node
                .canopen_managers
                .get(ifc)
                .ok_or(CodegenError::Range("CANopen manager interface", u32::from(*ifc)))?;
            h.update(&[*ifc]);
            manager.hash_into(&mut h);
        }
        h.update(&self.version.to_le_bytes());
        let project_hash = h.finalize();

        let upper = INIT_BASENAME.to_uppercase();
        let mut includes = vec!["stwtypes.h".to_string(), "osco_man_config.h".into()];
        includes.extend(interfaces.iter().map(|i| format!("{}.h", manager_basename(*i))));

        let mut header_body = formatdoc! {"
            {defines}
            {project_id}

            #define {upper}_NUMBER_OF_MANAGERS ({n}U)
            ",
            defines = section("Defines"),
            project_id = project_id_define(INIT_BASENAME, project_hash),
            n = interfaces.len(),
        };

        let mut source_body = formatdoc! {"
            {defines}
            {project_id}

            ",
            defines = section("Defines"),
            project_id = project_id_macro(INIT_BASENAME, project_hash),
        };

        if !interfaces.is_empty() {
            header_body += &formatdoc! {"

                {globals}
                extern const T_osco_man_manager_configuration * const gapt_{INIT_BASENAME}_Managers[{upper}_NUMBER_OF_MANAGERS];
                ",
                globals = section("Global Variables"),
            };

            let refs = interfaces
                .iter()
                .map(|i| format!("&{},", manager_config_ident(*i)))
                .collect::<Vec<_>>()
                .join("\n");

            source_body += &formatdoc! {"
                {globals}
                const T_osco_man_manager_configuration * const gapt_{INIT_BASENAME}_Managers[{upper}_NUMBER_OF_MANAGERS] =
                {{
                {refs}
                }};
                ",
                globals = section("Global Variables"),
                refs = refs.indent(3),
            };
        }

        let detail = format!("CANopen managers of application `{}`.", self.app().name);
        let brief = "openSYDE CANopen manager initialization";

        Ok(SourcePair {
            basename: INIT_BASENAME.into(),
            header: header_file(
                &file_header(&format!("{INIT_BASENAME}.h"), brief, &detail, &self.opts.exporter),
                INIT_BASENAME,
                &includes,
                &header_body,
            ),
            source: source_file(
                &file_header(&format!("{INIT_BASENAME}.c"), brief, &detail, &self.opts.exporter),
                INIT_BASENAME,
                &source_body,
            ),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn od(entries: &[(u16, u8, OdAccess)]) -> ObjectDictionary {
        ObjectDictionary::new(
            entries
                .iter()
                .map(|&(index, sub_index, access)| OdEntry {
                    index,
                    sub_index,
                    access,
                    default_value: None,
                })
                .collect(),
        )
    }

    fn manager() -> CanOpenManagerInfo {
        CanOpenManagerInfo {
            node_id: 1,
            autostart: true,
            start_devices: true,
            nmt_start_all: false,
            nmt_error_behavior: NmtErrorBehavior::RestartAllDevices,
            heartbeat_producer_ms: 100,
            sdo_timeout_ms: 500,
            devices: Default::default(),
        }
    }

    fn device(od: ObjectDictionary) -> CanOpenDevice {
        CanOpenDevice {
            name: "Sensor".into(),
            optional: false,
            no_init: false,
            factory_reset: false,
            heartbeat_producer_ms: 200,
            heartbeat_consumer: true,
            heartbeat_consumer_ms: 300,
            object_dictionary: od,
        }
    }

    fn pdo_msg() -> CanMessage {
        let sig = |start_bit, index| {
            CanSignal::builder()
                .element(ElementRef::new(1, 0))
                .start_bit(start_bit)
                .bit_length(16)
                .object(ObjectRef {
                    index,
                    sub_index: 0,
                })
                .build()
                .unwrap()
        };

        CanMessage::builder()
            .name("Pressure")
            .id(0x185)
            .cycle_ms(50)
            .add_signals([sig(0, 0x6000), sig(16, 0x6001)])
            .pdo(PdoInfo {
                device: 5,
                pdo_index: 0,
                inhibit_time: 10,
            })
            .build()
            .unwrap()
    }

    #[test]
    fn entry_encoding() {
        let e = ConciseEntry::u16(0x1017, 0, 0x1234, "hb");
        let mut out = Vec::new();
        e.encode_into(&mut out);
        assert_eq!(out, [0x17, 0x10, 0x00, 0x02, 0x00, 0x00, 0x00, 0x34, 0x12]);
        assert_eq!(e.encoded_len(), out.len());
    }

    #[test]
    fn size_law() {
        let entries = vec![
            ConciseEntry::u8(0x1600, 0, 0, "a"),
            ConciseEntry::u16(0x1017, 0, 100, "b"),
            ConciseEntry::u32(0x1400, 1, 0x8000_0200, "c"),
        ];

        assert_eq!(concise_array_size(&entries), 4 + 3 * 7 + 1 + 2 + 4);
        assert_eq!(encode_concise(&entries).len(), concise_array_size(&entries));
        assert_eq!(&encode_concise(&entries)[..4], &[3, 0, 0, 0]);
    }

    #[test]
    fn heartbeat_consumer_slots() {
        let mut entries = vec![OdEntry {
            index: OD_HEARTBEAT_CONSUMER,
            sub_index: 0,
            access: OdAccess::Ro,
            default_value: Some(3),
        }];
        entries.extend((1..=3).map(|sub_index| OdEntry {
            index: OD_HEARTBEAT_CONSUMER,
            sub_index,
            access: OdAccess::Rw,
            default_value: None,
        }));

        let dev = device(ObjectDictionary::new(entries));
        let out = device_concise_entries(&manager(), &dev, &[]).unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].payload, ((1u32 << 16) | 300).to_le_bytes());
        assert_eq!(out[1].payload, [0, 0, 0, 0]);
        assert_eq!(out[2].sub_index, 3);
    }

    #[test]
    fn pdo_sequence_respects_read_only_objects() {
        let dev = device(od(&[
            (OD_HEARTBEAT_PRODUCER, 0, OdAccess::Rw),
            (0x1800, 2, OdAccess::Rw),
            (0x1800, 3, OdAccess::Ro),
            (0x1800, 5, OdAccess::Rw),
        ]));
        let msg = pdo_msg();

        let out = device_concise_entries(&manager(), &dev, &[(Direction::Rx, &msg)]).unwrap();
        let addr: Vec<_> = out.iter().map(|e| (e.index, e.sub_index)).collect();

        assert_eq!(
            addr,
            [
                (0x1017, 0),
                (0x1800, 1),
                (0x1800, 2),
                (0x1800, 5),
                (0x1A00, 0),
                (0x1A00, 1),
                (0x1A00, 2),
                (0x1A00, 0),
                (0x1800, 1),
            ]
        );

        assert_eq!(out[1].payload, (0x185u32 | PDO_DISABLED).to_le_bytes());
        assert_eq!(out[3].payload, 50u16.to_le_bytes());
        assert_eq!(out[5].payload, 0x6000_0010u32.to_le_bytes());
        assert_eq!(out[7].payload, [2]);
        assert_eq!(out[8].payload, 0x185u32.to_le_bytes());
    }

    #[test]
    fn manager_tx_maps_to_device_rpdo() {
        let dev = device(ObjectDictionary::default());
        let mut msg = pdo_msg();
        msg.extended = true;
        msg.pdo = Some(PdoInfo {
            device: 5,
            pdo_index: 2,
            inhibit_time: 0,
        });

        let out = device_concise_entries(&manager(), &dev, &[(Direction::Tx, &msg)]).unwrap();
        assert_eq!(out[0].index, 0x1402);
        assert_eq!(out[0].payload, (0x185u32 | PDO_EXTENDED_ID | PDO_DISABLED).to_le_bytes());
        assert_eq!(out[1].index, 0x1602);
    }

    #[test]
    fn factory_reset_and_no_init() {
        let mut dev = device(ObjectDictionary::default());
        dev.factory_reset = true;
        let out = device_concise_entries(&manager(), &dev, &[]).unwrap();
        assert_eq!(out[0].payload, *b"load");

        dev.no_init = true;
        assert!(device_concise_entries(&manager(), &dev, &[]).unwrap().is_empty());
    }

    #[test]
    fn unmapped_signal_rejected() {
        let dev = device(ObjectDictionary::default());
        let mut msg = pdo_msg();
        msg.signals[1].object = None;

        assert!(matches!(
            device_concise_entries(&manager(), &dev, &[(Direction::Rx, &msg)]),
            Err(CodegenError::Config(_))
        ));
    }
}
