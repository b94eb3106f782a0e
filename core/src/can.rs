use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::hash::*;
use crate::*;

const MAX_DLC: u8 = 8;
const MAX_STANDARD_ID: u32 = 0x7FF;
const MAX_EXTENDED_ID: u32 = 0x1FFF_FFFF;

/// Classic CAN communication protocols.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum CanProtocolKind {
    Layer2,
    Eces,
    Ecos,
    CanOpen,
}

impl CanProtocolKind {
    /// Short lower-case tag used in generated file names.
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Layer2 => "l2",
            Self::Eces => "eces",
            Self::Ecos => "ecos",
            Self::CanOpen => "canopen",
        }
    }

    const fn hash_tag(self) -> u8 {
        match self {
            Self::Layer2 => 0,
            Self::Eces => 1,
            Self::Ecos => 2,
            Self::CanOpen => 3,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrder {
    Little,
    Big,
}

/// When a message is transmitted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TxTrigger {
    Cyclic,
    OnChange,
    OnEvent,
    /// CANopen transmission type 254 (manufacturer specific event).
    CanOpenType254,
    /// CANopen transmission type 255 (device profile event).
    CanOpenType255,
}

impl TxTrigger {
    const fn hash_tag(self) -> u8 {
        match self {
            Self::Cyclic => 0,
            Self::OnChange => 1,
            Self::OnEvent => 2,
            Self::CanOpenType254 => 3,
            Self::CanOpenType255 => 4,
        }
    }
}

/// Direction of a message as seen by the node that owns the protocol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    Tx,
    Rx,
}

/// Reference to one element of a data pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementRef {
    pub list: ListIndex,
    pub element: ElementIndex,
}

impl ElementRef {
    pub fn new(list: u32, element: u32) -> Self {
        Self {
            list: ListIndex::new(list),
            element: ElementIndex::new(element),
        }
    }
}

/// CANopen object dictionary entry a PDO signal is mapped to.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectRef {
    pub index: u16,
    pub sub_index: u8,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(build_fn(name = "__build", error = "ModelError", private))]
#[builder(pattern = "owned")]
pub struct CanSignal {
    /// Data pool element holding this signal's value.
    pub element: ElementRef,

    #[builder(default = "ByteOrder::Little")]
    pub byte_order: ByteOrder,

    pub start_bit: u16,

    pub bit_length: u16,

    /// Device object this signal is mapped to (CANopen PDOs only).
    #[builder(setter(strip_option), default)]
    #[serde(default)]
    pub object: Option<ObjectRef>,
}

impl CanSignalBuilder {
    pub fn build(self) -> Result<CanSignal, ModelError> {
        self.__build()
    }
}

impl CanSignal {
    pub fn builder() -> CanSignalBuilder {
        CanSignalBuilder::default()
    }

    /// Whether the signal lies within `dlc` bytes.
    fn fits(&self, dlc: u8) -> bool {
        let bits = u16::from(dlc) * 8;

        if self.bit_length == 0 || self.bit_length > 64 {
            return false;
        }

        match self.byte_order {
            ByteOrder::Little => self.start_bit + self.bit_length <= bits,
            // Motorola signals continue from the start bit (MSB) into the following bytes
            ByteOrder::Big => {
                let start_byte = self.start_bit / 8;
                let bits_in_start_byte = (self.start_bit % 8) + 1;
                let further_bytes = self.bit_length.saturating_sub(bits_in_start_byte).div_ceil(8);
                start_byte + further_bytes < u16::from(dlc)
            }
        }
    }
}

impl DefinitionHash for CanSignal {
    fn hash_into(&self, h: &mut Hasher) {
        h.update(&self.element.list.raw().to_le_bytes());
        h.update(&self.element.element.raw().to_le_bytes());
        hash_bool(h, self.byte_order == ByteOrder::Big);
        h.update(&self.start_bit.to_le_bytes());
        h.update(&self.bit_length.to_le_bytes());
        if let Some(obj) = self.object {
            h.update(&obj.index.to_le_bytes());
            h.update(&[obj.sub_index]);
        }
    }
}

/// CANopen PDO settings of a message handled by a CANopen manager.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct PdoInfo {
    /// Node ID of the device on the other end of the PDO.
    pub device: u8,

    /// Zero-based PDO number on the device.
    pub pdo_index: u16,

    /// Inhibit time in multiples of 100 µs.
    #[serde(default)]
    pub inhibit_time: u16,
}

/// A CAN message of one interface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(build_fn(name = "__build", error = "ModelError", private))]
#[builder(pattern = "owned")]
pub struct CanMessage {
    #[builder(setter(into))]
    pub name: String,

    pub id: u32,

    #[builder(default)]
    #[serde(default)]
    pub extended: bool,

    #[builder(default = "8")]
    pub dlc: u8,

    #[builder(default = "TxTrigger::Cyclic")]
    pub trigger: TxTrigger,

    /// Cycle time in milliseconds.
    #[builder(default)]
    #[serde(default)]
    pub cycle_ms: u32,

    /// Minimum time between two transmissions in milliseconds.
    #[builder(default)]
    #[serde(default)]
    pub delay_ms: u16,

    /// Receive timeout in milliseconds, 0 disables monitoring.
    #[builder(default)]
    #[serde(default)]
    pub timeout_ms: u32,

    #[builder(setter(custom), field(type = "Vec<CanSignal>"))]
    #[serde(default)]
    pub signals: Vec<CanSignal>,

    #[builder(setter(strip_option), default)]
    #[serde(default)]
    pub pdo: Option<PdoInfo>,
}

impl CanMessageBuilder {
    /// Make a [`CanMessage`] from this builder.
    pub fn build(self) -> Result<CanMessage, ModelError> {
        let msg = self.__build()?;
        msg.validate()?;

        Ok(msg)
    }

    pub fn add_signal(mut self, sig: CanSignal) -> Self {
        self.signals.push(sig);
        self
    }

    pub fn add_signals(mut self, sigs: impl IntoIterator<Item = CanSignal>) -> Self {
        self.signals.extend(sigs);
        self
    }
}

impl CanMessage {
    pub fn builder() -> CanMessageBuilder {
        CanMessageBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("Message", &self.name)?;

        if self.dlc > MAX_DLC {
            return Err(ModelError::DlcTooLarge(self.name.clone(), self.dlc));
        }

        let max_id = if self.extended {
            MAX_EXTENDED_ID
        } else {
            MAX_STANDARD_ID
        };
        if self.id > max_id {
            return Err(ModelError::CanIdOutOfRange(self.name.clone(), self.id));
        }

        if let Some(sig) = self.signals.iter().find(|s| !s.fits(self.dlc)) {
            return Err(ModelError::SignalWillNotFitInMessage(
                self.name.clone(),
                sig.start_bit,
                sig.bit_length,
                self.dlc,
            ));
        }

        Ok(())
    }
}

impl DefinitionHash for CanMessage {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        h.update(&self.id.to_le_bytes());
        hash_bool(h, self.extended);
        h.update(&[self.dlc, self.trigger.hash_tag()]);
        h.update(&self.cycle_ms.to_le_bytes());
        h.update(&self.delay_ms.to_le_bytes());
        h.update(&self.timeout_ms.to_le_bytes());
        self.signals.hash_into(h);
        if let Some(pdo) = self.pdo {
            h.update(&[pdo.device]);
            h.update(&pdo.pdo_index.to_le_bytes());
            h.update(&pdo.inhibit_time.to_le_bytes());
        }
    }
}

/// Messages of one protocol on one CAN interface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct MessageContainer {
    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub tx: Vec<CanMessage>,

    #[serde(default)]
    pub rx: Vec<CanMessage>,
}

impl MessageContainer {
    pub fn messages(&self, dir: Direction) -> &[CanMessage] {
        match dir {
            Direction::Tx => &self.tx,
            Direction::Rx => &self.rx,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tx.is_empty() && self.rx.is_empty()
    }
}

impl DefinitionHash for MessageContainer {
    fn hash_into(&self, h: &mut Hasher) {
        hash_bool(h, self.active);
        self.tx.hash_into(h);
        self.rx.hash_into(h);
    }
}

/// A protocol bound to one COM data pool, with one message container per
/// CAN interface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CanProtocol {
    pub kind: CanProtocolKind,

    pub datapool: DataPoolIndex,

    #[serde(default)]
    pub containers: Vec<MessageContainer>,
}

impl CanProtocol {
    /// List of the COM data pool holding the signals of `interface` in
    /// direction `dir`: Tx and Rx lists alternate per interface.
    pub fn com_list_index(interface: usize, dir: Direction) -> ListIndex {
        let rx = match dir {
            Direction::Tx => 0,
            Direction::Rx => 1,
        };
        ListIndex::from_position(interface * 2 + rx)
    }

    /// Check that every signal points into the list of its interface and
    /// direction, and that the element exists.
    pub fn validate(&self, pool: &DataPool) -> Result<(), ModelError> {
        for (ifc, container) in self.containers.iter().enumerate() {
            check_unique_names(
                "Message",
                container.tx.iter().chain(&container.rx).map(|m| m.name.as_str()),
            )?;

            for dir in [Direction::Tx, Direction::Rx] {
                let expected = Self::com_list_index(ifc, dir);

                for msg in container.messages(dir) {
                    msg.validate()?;

                    for sig in &msg.signals {
                        if sig.element.list != expected {
                            return Err(ModelError::SignalListMismatch(
                                msg.name.clone(),
                                sig.element.list.raw(),
                                expected.raw(),
                            ));
                        }

                        if pool.element(sig.element).is_none() {
                            return Err(ModelError::DanglingIndex(
                                "Element",
                                sig.element.element.raw(),
                            ));
                        }
                    }
                }
            }
        }

        Ok(())
    }
}

impl DefinitionHash for CanProtocol {
    fn hash_into(&self, h: &mut Hasher) {
        h.update(&[self.kind.hash_tag()]);
        h.update(&self.datapool.raw().to_le_bytes());
        self.containers.hash_into(h);
    }
}
