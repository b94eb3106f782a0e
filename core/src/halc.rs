//! Hardware abstraction layer configuration (HALC).
//!
//! A HALC definition describes the I/O domains of a device, their channels
//! and the values each domain exposes. The data pools the firmware uses to
//! hold these values are derived from it with [`HalcConfig::derive_datapool`].

use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::hash::*;
use crate::*;

/// How HALC channels are partitioned between the safe and non-safe parts of
/// the firmware.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HalcSafetyMode {
    #[default]
    OneLevelAllSafe,
    OneLevelAllNonSafe,
    TwoLevelWithDropping,
    TwoLevelWithoutDropping,
}

impl HalcSafetyMode {
    /// Safety cases that get their own configuration, in output order.
    pub const fn safety_cases(self) -> &'static [SafetyCase] {
        match self {
            Self::OneLevelAllSafe => &[SafetyCase::Safe],
            Self::OneLevelAllNonSafe => &[SafetyCase::NonSafe],
            Self::TwoLevelWithDropping | Self::TwoLevelWithoutDropping => {
                &[SafetyCase::Safe, SafetyCase::NonSafe]
            }
        }
    }

    pub const fn is_two_level(self) -> bool {
        matches!(
            self,
            Self::TwoLevelWithDropping | Self::TwoLevelWithoutDropping
        )
    }

    /// Channels whose safety relevance does not match the emitted case are
    /// left out instead of being flagged.
    pub const fn drops_channels(self) -> bool {
        matches!(self, Self::TwoLevelWithDropping)
    }

    const fn tag(self) -> u8 {
        match self {
            Self::OneLevelAllSafe => 0,
            Self::OneLevelAllNonSafe => 1,
            Self::TwoLevelWithDropping => 2,
            Self::TwoLevelWithoutDropping => 3,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SafetyCase {
    Safe,
    NonSafe,
}

impl SafetyCase {
    pub const fn is_safe(self) -> bool {
        matches!(self, Self::Safe)
    }

    /// Lower case name used in file names.
    pub const fn file_tag(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::NonSafe => "non_safe",
        }
    }
}

/// Value category of a HALC domain; each maps to one list of the HALC pool.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum HalcCategory {
    Configuration,
    Inputs,
    Outputs,
    Status,
}

impl HalcCategory {
    /// In list order.
    pub const ALL: [HalcCategory; 4] = [
        Self::Configuration,
        Self::Inputs,
        Self::Outputs,
        Self::Status,
    ];

    pub const fn list_name(self) -> &'static str {
        match self {
            Self::Configuration => "Configuration",
            Self::Inputs => "Inputs",
            Self::Outputs => "Outputs",
            Self::Status => "Status",
        }
    }

    pub const fn list_index(self) -> ListIndex {
        ListIndex::new(match self {
            Self::Configuration => 0,
            Self::Inputs => 1,
            Self::Outputs => 2,
            Self::Status => 3,
        })
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HalcElementDef {
    pub name: String,

    /// Type and default value; always scalar.
    pub value: Content,
}

/// A HALC value, either a single value or a struct of sub-elements.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HalcStructDef {
    pub name: String,

    #[serde(default)]
    pub value: Option<Content>,

    #[serde(default)]
    pub elements: Vec<HalcElementDef>,
}

impl HalcStructDef {
    pub fn scalar(name: &str, value: Content) -> Self {
        Self {
            name: name.into(),
            value: Some(value),
            elements: Vec::new(),
        }
    }

    pub fn with_elements(name: &str, elements: Vec<HalcElementDef>) -> Self {
        Self {
            name: name.into(),
            value: None,
            elements,
        }
    }

    /// `(name suffix, default)` of every leaf value. The suffix is the struct
    /// name, extended by `_<element>` for sub-elements.
    pub fn leaves(&self) -> Vec<(String, &Content)> {
        match &self.value {
            Some(v) => vec![(self.name.clone(), v)],
            None => self
                .elements
                .iter()
                .map(|e| (format!("{}_{}", self.name, e.name), &e.value))
                .collect(),
        }
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("HALC struct", &self.name)?;
        check_unique_names("HALC element", self.elements.iter().map(|e| e.name.as_str()))?;

        let shape_ok = self.value.is_some() != !self.elements.is_empty();
        let scalar_ok = self.value.iter().all(|v| !v.is_array())
            && self.elements.iter().all(|e| !e.value.is_array());

        if !shape_ok || !scalar_ok {
            return Err(ModelError::HalcStructDefinition(self.name.clone()));
        }

        Ok(())
    }
}

impl DefinitionHash for HalcStructDef {
    fn hash_into(&self, h: &mut Hasher) {
        for (name, value) in self.leaves() {
            hash_str(h, &name);
            value.hash_into(h);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HalcChannel {
    pub name: String,

    #[serde(default)]
    pub safety_relevant: bool,

    /// Selected use case of the channel.
    #[serde(default)]
    pub use_case: u32,

    /// Configuration values, one per configuration leaf of the domain.
    /// Empty means all defaults.
    #[serde(default)]
    pub parameters: Vec<Content>,
}

impl HalcChannel {
    pub fn new(name: &str, safety_relevant: bool) -> Self {
        Self {
            name: name.into(),
            safety_relevant,
            use_case: 0,
            parameters: Vec::new(),
        }
    }
}

impl DefinitionHash for HalcChannel {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        hash_bool(h, self.safety_relevant);
        h.update(&self.use_case.to_le_bytes());
        self.parameters.hash_into(h);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct HalcDomain {
    /// Singular name, e.g. `DigitalInput`.
    pub name: String,

    /// Plural name, e.g. `DigitalInputs`.
    pub plural_name: String,

    /// No channels means a channelless domain with one set of values.
    #[serde(default)]
    pub channels: Vec<HalcChannel>,

    #[serde(default)]
    pub parameters: Vec<HalcStructDef>,

    #[serde(default)]
    pub inputs: Vec<HalcStructDef>,

    #[serde(default)]
    pub outputs: Vec<HalcStructDef>,

    #[serde(default)]
    pub statuses: Vec<HalcStructDef>,
}

impl HalcDomain {
    pub fn new(name: &str, plural_name: &str) -> Self {
        Self {
            name: name.into(),
            plural_name: plural_name.into(),
            channels: Vec::new(),
            parameters: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
            statuses: Vec::new(),
        }
    }

    pub fn has_channels(&self) -> bool {
        !self.channels.is_empty()
    }

    pub fn structs(&self, category: HalcCategory) -> &[HalcStructDef] {
        match category {
            HalcCategory::Configuration => &self.parameters,
            HalcCategory::Inputs => &self.inputs,
            HalcCategory::Outputs => &self.outputs,
            HalcCategory::Status => &self.statuses,
        }
    }

    /// Channels present in the configuration of `case`, with their position
    /// in [`HalcDomain::channels`].
    pub fn retained_channels(
        &self,
        mode: HalcSafetyMode,
        case: SafetyCase,
    ) -> Vec<(usize, &HalcChannel)> {
        self.channels
            .iter()
            .enumerate()
            .filter(|(_, ch)| !mode.drops_channels() || ch.safety_relevant == case.is_safe())
            .collect()
    }

    /// HALC pool element name of a leaf.
    pub fn element_name(&self, leaf: &str) -> String {
        format!("{}_{}", self.name, leaf)
    }

    fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("HALC domain", &self.name)?;
        check_name_validity("HALC domain", &self.plural_name)?;
        check_unique_names("HALC channel", self.channels.iter().map(|c| c.name.as_str()))?;

        for cat in HalcCategory::ALL {
            let structs = self.structs(cat);
            check_unique_names("HALC struct", structs.iter().map(|s| s.name.as_str()))?;
            for s in structs {
                s.validate()?;
            }
        }

        let leaves: Vec<_> = self
            .parameters
            .iter()
            .flat_map(HalcStructDef::leaves)
            .collect();

        for ch in self.channels.iter().filter(|c| !c.parameters.is_empty()) {
            if ch.parameters.len() != leaves.len() {
                return Err(ModelError::HalcParameterCount(
                    ch.name.clone(),
                    ch.parameters.len(),
                    leaves.len(),
                ));
            }

            for (param, (name, default)) in ch.parameters.iter().zip(&leaves) {
                if !param.same_layout(default) {
                    return Err(ModelError::ContentLayoutMismatch(Some(
                        self.element_name(name),
                    )));
                }
            }
        }

        Ok(())
    }
}

impl DefinitionHash for HalcDomain {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        hash_str(h, &self.plural_name);
        self.channels.hash_into(h);
        for cat in HalcCategory::ALL {
            self.structs(cat).hash_into(h);
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct HalcConfig {
    #[serde(default)]
    pub mode: HalcSafetyMode,

    #[serde(default)]
    pub domains: Vec<HalcDomain>,
}

impl HalcConfig {
    pub fn validate(&self) -> Result<(), ModelError> {
        check_unique_names("HALC domain", self.domains.iter().map(|d| d.name.as_str()))?;
        for d in &self.domains {
            d.validate()?;
        }

        Ok(())
    }

    /// Build the HALC data pool holding the values of safety case `case`.
    ///
    /// Every domain struct leaf becomes one element named
    /// `<Domain>_<Struct>[_<Element>]` in the list of its category; channel
    /// domains get an array with one entry per retained channel and are left
    /// out when no channel is retained. The configuration list carries one
    /// `Default` dataset with the channel parameters. For NVM pools, lists are
    /// placed back to back, each with a leading 2 byte CRC.
    pub fn derive_datapool(
        &self,
        kind: DataPoolKind,
        case: SafetyCase,
        name: &str,
    ) -> Result<DataPool, ModelError> {
        let mut pool = DataPool::new(name, kind);
        pool.safety = case.is_safe();

        for cat in HalcCategory::ALL {
            let mut list = DataPoolList::new(cat.list_name());

            for domain in &self.domains {
                let retained = domain.retained_channels(self.mode, case);
                if domain.has_channels() && retained.is_empty() {
                    continue;
                }

                let mut leaf_pos = 0;
                for s in domain.structs(cat) {
                    for (leaf, default) in s.leaves() {
                        let value = match (cat, domain.has_channels()) {
                            (HalcCategory::Configuration, false) => default.clone(),
                            (HalcCategory::Configuration, true) => Content::array(
                                default.ty(),
                                retained.iter().map(|(_, ch)| {
                                    ch.parameters
                                        .get(leaf_pos)
                                        .map_or(default.first(), Content::first)
                                }),
                            )?,
                            (_, false) => Content::zeroed(default.ty(), None),
                            (_, true) => Content::zeroed(default.ty(), Some(retained.len())),
                        };
                        leaf_pos += 1;

                        list.elements.push(
                            DataPoolElement::builder()
                                .name(domain.element_name(&leaf))
                                .value(value)
                                .access(if cat == HalcCategory::Configuration {
                                    Access::ReadOnly
                                } else {
                                    Access::ReadWrite
                                })
                                .build()?,
                        );
                    }
                }
            }

            if cat == HalcCategory::Configuration {
                list.datasets.push(Dataset {
                    name: "Default".into(),
                    comment: String::new(),
                    values: list.elements.iter().map(|e| e.value.clone()).collect(),
                });
            }

            pool.lists.push(list);
        }

        if kind.is_nvm() {
            let mut list_start = 0;
            for list in &mut pool.lists {
                let mut offset = 2;
                for elem in &mut list.elements {
                    elem.nvm_start_address = offset;
                    offset += elem.size_in_bytes();
                }
                list.nvm_crc_active = true;
                list.nvm_start_address = list_start;
                list.nvm_size = offset;
                list_start += offset;
            }
            pool.nvm_size = list_start;
        }

        pool.validate()?;
        Ok(pool)
    }
}

impl DefinitionHash for HalcConfig {
    fn hash_into(&self, h: &mut Hasher) {
        h.update(&[self.mode.tag()]);
        self.domains.hash_into(h);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn digital_inputs(safety: &[bool]) -> HalcDomain {
        let mut d = HalcDomain::new("DigitalInput", "DigitalInputs");
        d.channels = safety
            .iter()
            .enumerate()
            .map(|(i, s)| HalcChannel::new(&format!("DI{i}"), *s))
            .collect();
        d.parameters = vec![HalcStructDef::scalar(
            "Debounce",
            Content::scalar(ContentType::U16, 10).unwrap(),
        )];
        d.inputs = vec![HalcStructDef::with_elements(
            "Value",
            vec![
                HalcElementDef {
                    name: "State".into(),
                    value: Content::scalar(ContentType::U8, 0).unwrap(),
                },
                HalcElementDef {
                    name: "Time".into(),
                    value: Content::scalar(ContentType::U32, 0).unwrap(),
                },
            ],
        )];
        d
    }

    fn config(mode: HalcSafetyMode) -> HalcConfig {
        let mut system = HalcDomain::new("System", "System");
        system.parameters = vec![HalcStructDef::scalar(
            "Watchdog",
            Content::scalar(ContentType::U8, 1).unwrap(),
        )];

        HalcConfig {
            mode,
            domains: vec![digital_inputs(&[true, false, true]), system],
        }
    }

    #[test]
    fn retained_channels_follow_mode() {
        let d = digital_inputs(&[true, false, true]);

        let safe = d.retained_channels(HalcSafetyMode::TwoLevelWithDropping, SafetyCase::Safe);
        assert_eq!(safe.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [0, 2]);

        let non_safe =
            d.retained_channels(HalcSafetyMode::TwoLevelWithDropping, SafetyCase::NonSafe);
        assert_eq!(non_safe.iter().map(|(i, _)| *i).collect::<Vec<_>>(), [1]);

        let all =
            d.retained_channels(HalcSafetyMode::TwoLevelWithoutDropping, SafetyCase::NonSafe);
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn derived_pool_layout() {
        let mut cfg = config(HalcSafetyMode::TwoLevelWithDropping);
        cfg.domains[0].channels[2].parameters =
            vec![Content::scalar(ContentType::U16, 50).unwrap()];

        let pool = cfg
            .derive_datapool(DataPoolKind::HalcNvm, SafetyCase::Safe, "HalcSafe")
            .unwrap();

        assert!(pool.safety);
        assert_eq!(
            pool.lists.iter().map(|l| l.name.as_str()).collect::<Vec<_>>(),
            ["Configuration", "Inputs", "Outputs", "Status"]
        );

        let conf = &pool.lists[0];
        assert_eq!(conf.elements[0].name, "DigitalInput_Debounce");
        assert_eq!(
            conf.elements[0].value,
            Content::array(ContentType::U16, [10u16, 50]).unwrap()
        );
        assert_eq!(conf.elements[1].name, "System_Watchdog");
        assert!(!conf.elements[1].value.is_array());
        assert_eq!(conf.datasets.len(), 1);
        assert_eq!(conf.datasets[0].values.len(), 2);

        let inputs = &pool.lists[1];
        assert_eq!(inputs.elements[0].name, "DigitalInput_Value_State");
        assert_eq!(inputs.elements[1].name, "DigitalInput_Value_Time");
        assert_eq!(inputs.elements[1].value.len(), 2);

        // 2 byte CRC + u16[2] + u8
        assert_eq!(conf.nvm_size, 7);
        assert_eq!(conf.elements[1].nvm_start_address, 6);
        assert_eq!(inputs.nvm_start_address, 7);
        assert_eq!(pool.nvm_size, 7 + 2 + 2 + 8 + 2 + 2);
    }

    #[test]
    fn domain_without_retained_channels_is_left_out() {
        let cfg = HalcConfig {
            mode: HalcSafetyMode::TwoLevelWithDropping,
            domains: vec![digital_inputs(&[true, true])],
        };

        let pool = cfg
            .derive_datapool(DataPoolKind::Halc, SafetyCase::NonSafe, "HalcNonSafe")
            .unwrap();
        assert!(pool.lists.iter().all(|l| l.elements.is_empty()));
        assert_eq!(pool.nvm_size, 0);
    }

    #[test]
    fn parameter_count_checked() {
        let mut cfg = config(HalcSafetyMode::OneLevelAllSafe);
        assert!(cfg.validate().is_ok());

        cfg.domains[0].channels[0].parameters = vec![
            Content::scalar(ContentType::U16, 1).unwrap(),
            Content::scalar(ContentType::U16, 2).unwrap(),
        ];
        assert!(matches!(
            cfg.validate(),
            Err(ModelError::HalcParameterCount(c, 2, 1)) if c == "DI0"
        ));
    }

    #[test]
    fn hash_tracks_channel_safety() {
        let base = config(HalcSafetyMode::TwoLevelWithDropping);
        let mut changed = base.clone();
        changed.domains[0].channels[1].safety_relevant = true;

        assert_eq!(
            base.definition_hash(),
            config(HalcSafetyMode::TwoLevelWithDropping).definition_hash()
        );
        assert_ne!(base.definition_hash(), changed.definition_hash());
    }

    #[test]
    fn hash_separates_adjacent_names() {
        let a = HalcDomain::new("DigitalInpu", "tsX");
        let b = HalcDomain::new("DigitalInput", "sX");

        assert_ne!(a.definition_hash(), b.definition_hash());
    }
}
