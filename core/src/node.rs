use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::*;

/// Newest code format version this model describes. Newer formats add
/// fields to the generated tables; older ones stay supported for firmware
/// already in the field.
pub const LATEST_CODE_FORMAT_VERSION: u16 = 6;

fn latest_code_format_version() -> u16 {
    LATEST_CODE_FORMAT_VERSION
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationKind {
    /// Firmware application that gets C sources.
    Programmable,
    /// Parameter set that gets `.syde_psi` images.
    ParameterSet,
}

/// One application ("data block") of a node.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Application {
    pub name: String,

    pub kind: ApplicationKind,

    #[serde(default = "latest_code_format_version")]
    pub code_format_version: u16,
}

impl Application {
    pub fn programmable(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: ApplicationKind::Programmable,
            code_format_version: LATEST_CODE_FORMAT_VERSION,
        }
    }

    pub fn parameter_set(name: &str) -> Self {
        Self {
            name: name.into(),
            kind: ApplicationKind::ParameterSet,
            code_format_version: LATEST_CODE_FORMAT_VERSION,
        }
    }
}

/// A validated description of one device and everything that gets
/// generated for its applications.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Node {
    pub name: String,

    #[serde(default)]
    pub applications: Vec<Application>,

    #[serde(default)]
    pub datapools: Vec<DataPool>,

    #[serde(default)]
    pub protocols: Vec<CanProtocol>,

    #[serde(default)]
    pub halc: Option<HalcConfig>,

    /// CANopen managers by interface index.
    #[serde(default)]
    pub canopen_managers: BTreeMap<u8, CanOpenManagerInfo>,

    /// Application running the diagnostic server and the protocol drivers.
    /// It reaches data pools of other applications remotely.
    #[serde(default)]
    pub diagnostic_application: Option<ApplicationIndex>,
}

impl Node {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            applications: Vec::new(),
            datapools: Vec::new(),
            protocols: Vec::new(),
            halc: None,
            canopen_managers: BTreeMap::new(),
            diagnostic_application: None,
        }
    }

    pub fn application(&self, idx: ApplicationIndex) -> Option<&Application> {
        idx.lookup(&self.applications)
    }

    pub fn application_by_name(&self, name: &str) -> Option<(ApplicationIndex, &Application)> {
        self.applications
            .iter()
            .enumerate()
            .find(|(_, a)| a.name == name)
            .map(|(i, a)| (ApplicationIndex::from_position(i), a))
    }

    pub fn datapool(&self, idx: DataPoolIndex) -> Option<&DataPool> {
        idx.lookup(&self.datapools)
    }

    pub fn protocol(&self, idx: ProtocolIndex) -> Option<&CanProtocol> {
        idx.lookup(&self.protocols)
    }

    /// Protocols in node order, paired with their handles.
    pub fn iter_protocols(&self) -> impl Iterator<Item = (ProtocolIndex, &CanProtocol)> {
        self.protocols
            .iter()
            .enumerate()
            .map(|(i, p)| (ProtocolIndex::from_position(i), p))
    }

    /// Data pools in node order, paired with their handles.
    pub fn iter_datapools(&self) -> impl Iterator<Item = (DataPoolIndex, &DataPool)> {
        self.datapools
            .iter()
            .enumerate()
            .map(|(i, p)| (DataPoolIndex::from_position(i), p))
    }

    pub fn is_diagnostic_application(&self, app: ApplicationIndex) -> bool {
        self.diagnostic_application == Some(app)
    }

    /// Check the cross references of the node and validate every part.
    pub fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("Node", &self.name)?;
        check_unique_names("Application", self.applications.iter().map(|a| a.name.as_str()))?;
        check_unique_names("Data pool", self.datapools.iter().map(|p| p.name.as_str()))?;

        if let Some(app) = self.diagnostic_application {
            self.application(app)
                .ok_or(ModelError::DanglingIndex("Application", app.raw()))?;
        }

        for pool in &self.datapools {
            pool.validate()?;

            if let Some(owner) = pool.owner {
                self.application(owner)
                    .ok_or(ModelError::DanglingIndex("Application", owner.raw()))?;
            }
        }

        let mut kinds = Vec::new();
        for proto in &self.protocols {
            let pool = self
                .datapool(proto.datapool)
                .ok_or(ModelError::DanglingIndex("Data pool", proto.datapool.raw()))?;

            if pool.kind != DataPoolKind::Com {
                return Err(ModelError::ProtocolDataPoolNotCom(
                    proto.kind.tag().into(),
                    pool.name.clone(),
                ));
            }

            if kinds.contains(&proto.kind) {
                return Err(ModelError::ProtocolAlreadyExists(proto.kind.tag().into()));
            }
            kinds.push(proto.kind);

            proto.validate(pool)?;

            if proto.kind == CanProtocolKind::CanOpen {
                self.validate_pdo_devices(proto)?;
            }
        }

        if let Some(halc) = &self.halc {
            halc.validate()?;
        }

        Ok(())
    }

    fn validate_pdo_devices(&self, proto: &CanProtocol) -> Result<(), ModelError> {
        for (ifc, container) in proto.containers.iter().enumerate() {
            let ifc = u8::try_from(ifc).unwrap_or(u8::MAX);
            let manager = self.canopen_managers.get(&ifc);

            for dir in [Direction::Tx, Direction::Rx] {
                for msg in container.messages(dir) {
                    let Some(pdo) = &msg.pdo else {
                        continue;
                    };

                    if !manager.is_some_and(|m| m.devices.contains_key(&pdo.device)) {
                        return Err(ModelError::UnknownCanOpenDevice(
                            msg.name.clone(),
                            ifc,
                            pdo.device,
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datapool::tests::*;

    fn com_pool() -> DataPool {
        let mut pool = DataPool::new("Com", DataPoolKind::Com);
        let mut tx = DataPoolList::new("Can1Tx");
        tx.elements.push(u8_elem("Speed", 200));
        pool.lists = vec![tx, DataPoolList::new("Can1Rx")];
        pool
    }

    fn node() -> Node {
        let mut node = Node::new("Ecu");
        node.applications.push(Application::programmable("Main"));

        let mut nvm = config_pool();
        nvm.owner = Some(ApplicationIndex::new(0));
        node.datapools = vec![nvm, com_pool()];

        let msg = CanMessage::builder()
            .name("Status")
            .id(0x100)
            .add_signal(
                CanSignal::builder()
                    .element(ElementRef::new(0, 0))
                    .start_bit(0)
                    .bit_length(8)
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        node.protocols.push(CanProtocol {
            kind: CanProtocolKind::Layer2,
            datapool: DataPoolIndex::new(1),
            containers: vec![MessageContainer {
                active: true,
                tx: vec![msg],
                rx: vec![],
            }],
        });
        node
    }

    #[test]
    fn valid_node() {
        node().validate().unwrap();
    }

    #[test]
    fn dangling_owner() {
        let mut n = node();
        n.datapools[0].owner = Some(ApplicationIndex::new(4));
        assert!(matches!(
            n.validate(),
            Err(ModelError::DanglingIndex("Application", 4))
        ));
    }

    #[test]
    fn protocol_needs_com_pool() {
        let mut n = node();
        n.protocols[0].datapool = DataPoolIndex::new(0);
        assert!(matches!(
            n.validate(),
            Err(ModelError::ProtocolDataPoolNotCom(p, d)) if p == "l2" && d == "NVM"
        ));
    }

    #[test]
    fn one_protocol_per_kind() {
        let mut n = node();
        n.protocols.push(n.protocols[0].clone());
        assert!(matches!(
            n.validate(),
            Err(ModelError::ProtocolAlreadyExists(p)) if p == "l2"
        ));
    }

    #[test]
    fn pdo_device_must_exist() {
        let mut n = node();
        n.protocols[0].kind = CanProtocolKind::CanOpen;
        n.protocols[0].containers[0].tx[0].pdo = Some(PdoInfo {
            device: 5,
            pdo_index: 0,
            inhibit_time: 0,
        });

        assert!(matches!(
            n.validate(),
            Err(ModelError::UnknownCanOpenDevice(m, 0, 5)) if m == "Status"
        ));
    }

    #[test]
    fn lookup_by_name() {
        let n = node();
        let (idx, app) = n.application_by_name("Main").unwrap();
        assert_eq!(idx, ApplicationIndex::new(0));
        assert_eq!(app.code_format_version, LATEST_CODE_FORMAT_VERSION);
        assert!(n.application_by_name("Other").is_none());
    }
}
