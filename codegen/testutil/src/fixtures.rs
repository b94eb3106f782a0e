//! Nodes shared by the integration tests.

use osy_core::*;

pub fn scalar(ty: ContentType, value: impl Into<Scalar>) -> Content {
    Content::scalar(ty, value).expect("fixture value in range")
}

pub fn element(
    name: &str,
    ty: ContentType,
    value: impl Into<Scalar>,
    min: impl Into<Scalar>,
    max: impl Into<Scalar>,
) -> DataPoolElement {
    DataPoolElement::builder()
        .name(name)
        .value(scalar(ty, value))
        .min(scalar(ty, min))
        .max(scalar(ty, max))
        .build()
        .expect("valid fixture element")
}

/// One programmable application (format version 4) owning one NVM data
/// pool with list `Config`: `u8_A` (0..10, dataset 5) and `u16_B`
/// (0..1000, dataset 500).
pub fn nvm_node() -> Node {
    let mut list = DataPoolList::new("Config");
    list.elements = vec![
        element("A", ContentType::U8, 5, 0, 10),
        element("B", ContentType::U16, 500, 0, 1000),
    ];
    list.datasets = vec![Dataset {
        name: "Default".into(),
        comment: String::new(),
        values: vec![scalar(ContentType::U8, 5), scalar(ContentType::U16, 500)],
    }];
    list.nvm_crc_active = true;
    list.elements[0].nvm_start_address = 2;
    list.elements[1].nvm_start_address = 3;
    list.nvm_size = 5;

    let mut pool = DataPool::new("Settings", DataPoolKind::Nvm);
    pool.owner = Some(ApplicationIndex::new(0));
    pool.nvm_size = 5;
    pool.lists.push(list);

    let mut app = Application::programmable("Main");
    app.code_format_version = 4;

    let mut node = Node::new("Ecu");
    node.applications.push(app);
    node.datapools.push(pool);
    node
}

fn signal(list: u32, element: u32, start_bit: u16, bit_length: u16) -> CanSignal {
    CanSignal::builder()
        .element(ElementRef::new(list, element))
        .start_bit(start_bit)
        .bit_length(bit_length)
        .build()
        .expect("valid fixture signal")
}

/// COM data pool with one Tx and one Rx list for interface 1.
fn com_pool(owner: u32) -> DataPool {
    let mut tx = DataPoolList::new("Tx");
    tx.elements = vec![
        element("Speed", ContentType::U16, 0, 0, 65535),
        element("Gear", ContentType::U8, 0, 0, 8),
    ];

    let mut rx = DataPoolList::new("Rx");
    rx.elements = vec![element("Temperature", ContentType::S16, 0, -400, 1500)];

    let mut pool = DataPool::new("Com", DataPoolKind::Com);
    pool.owner = Some(ApplicationIndex::new(owner));
    pool.lists = vec![tx, rx];
    pool
}

/// Application `Main` (format version 6) owning a COM data pool and a
/// protocol of `kind` on CAN1, with message `Status` sent and `Sensor`
/// received.
pub fn com_node(kind: CanProtocolKind) -> Node {
    let status = CanMessage::builder()
        .name("Status")
        .id(0x100)
        .cycle_ms(100)
        .delay_ms(10)
        .add_signals([signal(0, 0, 16, 16), signal(0, 1, 32, 8)])
        .build()
        .expect("valid fixture message");

    let sensor = CanMessage::builder()
        .name("Sensor")
        .id(0x200)
        .cycle_ms(50)
        .timeout_ms(200)
        .add_signal(signal(1, 0, 16, 16))
        .build()
        .expect("valid fixture message");

    let mut node = Node::new("Ecu");
    node.applications.push(Application::programmable("Main"));
    node.datapools.push(com_pool(0));
    node.protocols.push(CanProtocol {
        kind,
        datapool: DataPoolIndex::new(0),
        containers: vec![MessageContainer {
            active: true,
            tx: vec![status],
            rx: vec![sensor],
        }],
    });
    node
}

fn od_entry(index: u16, sub_index: u8, access: OdAccess) -> OdEntry {
    OdEntry {
        index,
        sub_index,
        access,
        default_value: None,
    }
}

fn pdo_signal(list: u32, element: u32, start_bit: u16, bit_length: u16, index: u16) -> CanSignal {
    CanSignal::builder()
        .element(ElementRef::new(list, element))
        .start_bit(start_bit)
        .bit_length(bit_length)
        .object(ObjectRef {
            index,
            sub_index: 1,
        })
        .build()
        .expect("valid fixture signal")
}

/// Application `Main` (format version 6) managing CANopen device 5
/// (`Sensor`) on CAN1 with one RPDO and one TPDO.
pub fn canopen_node() -> Node {
    let command = CanMessage::builder()
        .name("Command")
        .id(0x205)
        .trigger(TxTrigger::CanOpenType254)
        .timeout_ms(500)
        .add_signals([pdo_signal(0, 0, 0, 16, 0x6200), pdo_signal(0, 1, 16, 8, 0x6201)])
        .pdo(PdoInfo {
            device: 5,
            pdo_index: 0,
            inhibit_time: 0,
        })
        .build()
        .expect("valid fixture message");

    let measurement = CanMessage::builder()
        .name("Measurement")
        .id(0x185)
        .trigger(TxTrigger::CanOpenType255)
        .cycle_ms(100)
        .add_signal(pdo_signal(1, 0, 0, 16, 0x6000))
        .pdo(PdoInfo {
            device: 5,
            pdo_index: 0,
            inhibit_time: 20,
        })
        .build()
        .expect("valid fixture message");

    let mut hb_slots = od_entry(OD_HEARTBEAT_CONSUMER, 0, OdAccess::Ro);
    hb_slots.default_value = Some(2);

    let device = CanOpenDevice {
        name: "Sensor".into(),
        optional: false,
        no_init: false,
        factory_reset: true,
        heartbeat_producer_ms: 250,
        heartbeat_consumer: true,
        heartbeat_consumer_ms: 300,
        object_dictionary: ObjectDictionary::new(vec![
            hb_slots,
            od_entry(OD_HEARTBEAT_CONSUMER, 1, OdAccess::Rw),
            od_entry(OD_HEARTBEAT_CONSUMER, 2, OdAccess::Rw),
            od_entry(OD_HEARTBEAT_PRODUCER, 0, OdAccess::Rw),
            od_entry(0x1400, 2, OdAccess::Rw),
            od_entry(0x1800, 2, OdAccess::Rw),
            od_entry(0x1800, 3, OdAccess::Rw),
            od_entry(0x1800, 5, OdAccess::Rw),
        ]),
    };

    let manager = CanOpenManagerInfo {
        node_id: 1,
        autostart: true,
        start_devices: true,
        nmt_start_all: true,
        nmt_error_behavior: NmtErrorBehavior::RestartFailedDevice,
        heartbeat_producer_ms: 100,
        sdo_timeout_ms: 500,
        devices: [(5, device)].into(),
    };

    let mut node = Node::new("Ecu");
    node.applications.push(Application::programmable("Main"));
    node.datapools.push(com_pool(0));
    node.protocols.push(CanProtocol {
        kind: CanProtocolKind::CanOpen,
        datapool: DataPoolIndex::new(0),
        containers: vec![MessageContainer {
            active: true,
            tx: vec![command],
            rx: vec![measurement],
        }],
    });
    node.canopen_managers.insert(0, manager);
    node
}

/// HALC definition with a channel domain `DigitalInput` (DI0 safe, DI1
/// non-safe, DI2 safe) and a channelless domain `System`.
pub fn halc_config(mode: HalcSafetyMode) -> HalcConfig {
    let mut di = HalcDomain::new("DigitalInput", "DigitalInputs");
    di.channels = vec![
        HalcChannel::new("DI0", true),
        HalcChannel::new("DI1", false),
        HalcChannel::new("DI2", true),
    ];
    di.channels[2].use_case = 1;
    di.channels[2].parameters = vec![scalar(ContentType::U16, 50)];
    di.parameters = vec![HalcStructDef::scalar("Debounce", scalar(ContentType::U16, 10))];
    di.inputs = vec![HalcStructDef::scalar("Value", scalar(ContentType::U8, 0))];

    let mut system = HalcDomain::new("System", "System");
    system.parameters = vec![HalcStructDef::scalar("Watchdog", scalar(ContentType::U8, 1))];
    system.statuses = vec![HalcStructDef::scalar("Uptime", scalar(ContentType::U32, 0))];

    HalcConfig {
        mode,
        domains: vec![di, system],
    }
}

/// Programmable application `Firmware` (format version 6) owning the HALC
/// NVM data pools of every safety case of `mode`, and parameter set
/// application `Params`.
pub fn halc_node(mode: HalcSafetyMode) -> Node {
    halc_node_from(halc_config(mode))
}

/// [`halc_node`] for an arbitrary HALC definition.
pub fn halc_node_from(halc: HalcConfig) -> Node {
    let mode = halc.mode;

    let mut node = Node::new("Ecu");
    node.applications = vec![
        Application::programmable("Firmware"),
        Application::parameter_set("Params"),
    ];

    let mut nvm_start = 0;
    for case in mode.safety_cases() {
        let name = match case {
            SafetyCase::Safe => "HalcSafe",
            SafetyCase::NonSafe => "HalcNonSafe",
        };

        let mut pool = halc
            .derive_datapool(DataPoolKind::HalcNvm, *case, name)
            .expect("valid fixture HALC definition");
        pool.owner = Some(ApplicationIndex::new(0));
        pool.nvm_start_address = nvm_start;
        nvm_start += pool.nvm_size;

        node.datapools.push(pool);
    }

    node.halc = Some(halc);
    node
}
