use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::hash::*;

/// Heartbeat consumer time object.
pub const OD_HEARTBEAT_CONSUMER: u16 = 0x1016;
/// Heartbeat producer time object.
pub const OD_HEARTBEAT_PRODUCER: u16 = 0x1017;
/// Restore default parameters object.
pub const OD_RESTORE_DEFAULTS: u16 = 0x1011;

/// Access rights of an object dictionary entry, as read from the device's EDS.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OdAccess {
    Ro,
    Wo,
    Rw,
    Const,
}

impl OdAccess {
    const fn tag(self) -> u8 {
        match self {
            Self::Ro => 0,
            Self::Wo => 1,
            Self::Rw => 2,
            Self::Const => 3,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct OdEntry {
    pub index: u16,
    pub sub_index: u8,
    pub access: OdAccess,

    #[serde(default)]
    pub default_value: Option<u64>,
}

/// The subset of a device's EDS object dictionary the manager configuration
/// needs: which standard objects exist and which of them are writable.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct ObjectDictionary {
    entries: Vec<OdEntry>,
}

impl ObjectDictionary {
    pub fn new(entries: Vec<OdEntry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, index: u16, sub_index: u8) -> Option<&OdEntry> {
        self.entries
            .iter()
            .find(|e| e.index == index && e.sub_index == sub_index)
    }

    /// Present and neither read-only nor constant.
    pub fn is_writable(&self, index: u16, sub_index: u8) -> bool {
        self.entry(index, sub_index)
            .is_some_and(|e| matches!(e.access, OdAccess::Rw | OdAccess::Wo))
    }

    /// Number of heartbeat consumer slots (sub-indices 1..=n of 0x1016).
    ///
    /// Sub-index 0 carries the count when the EDS provides a default for it,
    /// otherwise the listed sub-indices are counted.
    pub fn heartbeat_consumer_slots(&self) -> u8 {
        if let Some(n) = self
            .entry(OD_HEARTBEAT_CONSUMER, 0)
            .and_then(|e| e.default_value)
        {
            return n.min(u64::from(u8::MAX)) as u8;
        }

        self.entries
            .iter()
            .filter(|e| e.index == OD_HEARTBEAT_CONSUMER && e.sub_index > 0)
            .count()
            .min(usize::from(u8::MAX)) as u8
    }
}

impl DefinitionHash for ObjectDictionary {
    fn hash_into(&self, h: &mut Hasher) {
        for e in &self.entries {
            h.update(&e.index.to_le_bytes());
            h.update(&[e.sub_index, e.access.tag()]);
            if let Some(v) = e.default_value {
                h.update(&v.to_le_bytes());
            }
        }
    }
}

/// A device configured by a CANopen manager.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CanOpenDevice {
    pub name: String,

    /// Manager may run without this device.
    #[serde(default)]
    pub optional: bool,

    /// Device is only started, not configured.
    #[serde(default)]
    pub no_init: bool,

    /// Restore the device's factory defaults before configuring it.
    #[serde(default)]
    pub factory_reset: bool,

    /// Heartbeat producer time of the device in ms, 0 disables.
    #[serde(default)]
    pub heartbeat_producer_ms: u16,

    /// Device monitors the manager's heartbeat.
    #[serde(default)]
    pub heartbeat_consumer: bool,

    /// Consumer time the device applies to the manager's heartbeat in ms.
    #[serde(default)]
    pub heartbeat_consumer_ms: u16,

    #[serde(default)]
    pub object_dictionary: ObjectDictionary,
}

impl DefinitionHash for CanOpenDevice {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        hash_bool(h, self.optional);
        hash_bool(h, self.no_init);
        hash_bool(h, self.factory_reset);
        h.update(&self.heartbeat_producer_ms.to_le_bytes());
        hash_bool(h, self.heartbeat_consumer);
        h.update(&self.heartbeat_consumer_ms.to_le_bytes());
        self.object_dictionary.hash_into(h);
    }
}

/// Reaction of the manager to a failed device.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum NmtErrorBehavior {
    #[default]
    RestartAllDevices,
    RestartFailedDevice,
    StopAllDevices,
}

impl NmtErrorBehavior {
    const fn tag(self) -> u8 {
        match self {
            Self::RestartAllDevices => 0,
            Self::RestartFailedDevice => 1,
            Self::StopAllDevices => 2,
        }
    }
}

/// CANopen manager settings of one interface.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct CanOpenManagerInfo {
    pub node_id: u8,

    #[serde(default)]
    pub autostart: bool,

    /// Start each device with an individual NMT command.
    #[serde(default)]
    pub start_devices: bool,

    /// Start all devices with one NMT "start all" command.
    #[serde(default)]
    pub nmt_start_all: bool,

    #[serde(default)]
    pub nmt_error_behavior: NmtErrorBehavior,

    /// Heartbeat producer time of the manager in ms, 0 disables.
    #[serde(default)]
    pub heartbeat_producer_ms: u16,

    pub sdo_timeout_ms: u16,

    /// Devices by node ID.
    #[serde(default)]
    pub devices: BTreeMap<u8, CanOpenDevice>,
}

impl DefinitionHash for CanOpenManagerInfo {
    fn hash_into(&self, h: &mut Hasher) {
        h.update(&[self.node_id]);
        hash_bool(h, self.autostart);
        hash_bool(h, self.start_devices);
        hash_bool(h, self.nmt_start_all);
        h.update(&[self.nmt_error_behavior.tag()]);
        h.update(&self.heartbeat_producer_ms.to_le_bytes());
        h.update(&self.sdo_timeout_ms.to_le_bytes());
        for (id, dev) in &self.devices {
            h.update(&[*id]);
            dev.hash_into(h);
        }
    }
}
