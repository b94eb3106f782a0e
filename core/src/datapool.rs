use derive_builder::Builder;
use serde::{Deserialize, Serialize};

use crate::error::*;
use crate::hash::*;
use crate::*;

/// Kind of a data pool, which decides where its values live and which
/// emitters consume it.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataPoolKind {
    Diag,
    Nvm,
    Com,
    Halc,
    HalcNvm,
}

impl DataPoolKind {
    /// Values of this pool are placed in non-volatile memory.
    pub const fn is_nvm(self) -> bool {
        matches!(self, Self::Nvm | Self::HalcNvm)
    }

    pub const fn is_halc(self) -> bool {
        matches!(self, Self::Halc | Self::HalcNvm)
    }

    const fn tag(self) -> u8 {
        match self {
            Self::Diag => 0,
            Self::Nvm => 1,
            Self::Com => 2,
            Self::Halc => 3,
            Self::HalcNvm => 4,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
}

/// Linear scaling `phys = raw * factor + offset`.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct Scaling {
    pub factor: f64,
    #[serde(default)]
    pub offset: f64,
}

impl Default for Scaling {
    fn default() -> Self {
        Self {
            factor: 1.0,
            offset: 0.0,
        }
    }
}

impl Scaling {
    pub fn is_identity(&self) -> bool {
        self.factor == 1.0 && self.offset == 0.0
    }
}

/// One value of a data pool list.
///
/// `value` fixes the element's type and array size and carries the initial
/// value used when no dataset applies.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Builder)]
#[builder(build_fn(name = "__build", error = "ModelError", private))]
#[builder(pattern = "owned")]
pub struct DataPoolElement {
    #[builder(setter(into))]
    pub name: String,

    #[builder(setter(into), default)]
    #[serde(default)]
    pub comment: String,

    pub value: Content,

    /// Lower bound, defaults to the type's smallest value.
    #[builder(setter(custom))]
    pub min: Content,

    /// Upper bound, defaults to the type's largest value.
    #[builder(setter(custom))]
    pub max: Content,

    #[builder(default)]
    #[serde(default)]
    pub scaling: Scaling,

    #[builder(setter(into), default)]
    #[serde(default)]
    pub unit: String,

    #[builder(default)]
    #[serde(default)]
    pub access: Access,

    /// Start address relative to the list's NVM block (NVM pools only).
    #[builder(default)]
    #[serde(default)]
    pub nvm_start_address: u32,

    #[builder(default)]
    #[serde(default)]
    pub diag_event_call: bool,
}

impl DataPoolElementBuilder {
    /// Make a [`DataPoolElement`] from this builder.
    ///
    /// Missing bounds are filled with the type range of `value`.
    pub fn build(mut self) -> Result<DataPoolElement, ModelError> {
        if let Some(value) = &self.value {
            let len = value.is_array().then_some(value.len());
            self.min = Some(self.min.unwrap_or_else(|| Content::type_min(value.ty(), len)));
            self.max = Some(self.max.unwrap_or_else(|| Content::type_max(value.ty(), len)));
        }

        let elem = self.__build()?;
        elem.validate()?;

        Ok(elem)
    }

    pub fn min(mut self, min: Content) -> Self {
        self.min = Some(min);
        self
    }

    pub fn max(mut self, max: Content) -> Self {
        self.max = Some(max);
        self
    }
}

impl DataPoolElement {
    pub fn builder() -> DataPoolElementBuilder {
        DataPoolElementBuilder::default()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("Element", &self.name)?;

        if !self.value.same_layout(&self.min) || !self.value.same_layout(&self.max) {
            return Err(ModelError::ContentLayoutMismatch(Some(self.name.clone())));
        }

        if !self.value.within(&self.min, &self.max) {
            return Err(ModelError::ValueOutOfBounds(self.name.clone()));
        }

        if !self.scaling.factor.is_finite() || !self.scaling.offset.is_finite() {
            return Err(ModelError::ScalingNotFinite(self.name.clone()));
        }

        Ok(())
    }

    pub fn ty(&self) -> ContentType {
        self.value.ty()
    }

    pub fn size_in_bytes(&self) -> u32 {
        self.value.size_in_bytes()
    }
}

impl DefinitionHash for DataPoolElement {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        self.value.hash_into(h);
        self.min.hash_into(h);
        self.max.hash_into(h);
        h.update(&self.scaling.factor.to_le_bytes());
        h.update(&self.scaling.offset.to_le_bytes());
        hash_bool(h, self.access == Access::ReadOnly);
        h.update(&self.nvm_start_address.to_le_bytes());
        hash_bool(h, self.diag_event_call);
    }
}

/// One parallel initializer vector of a list, one value per element.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Dataset {
    pub name: String,

    #[serde(default)]
    pub comment: String,

    pub values: Vec<Content>,
}

impl DefinitionHash for Dataset {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        self.values.hash_into(h);
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
pub struct DataPoolList {
    pub name: String,

    #[serde(default)]
    pub comment: String,

    #[serde(default)]
    pub elements: Vec<DataPoolElement>,

    #[serde(default)]
    pub datasets: Vec<Dataset>,

    /// Start address relative to the pool's NVM block (NVM pools only).
    #[serde(default)]
    pub nvm_start_address: u32,

    #[serde(default)]
    pub nvm_size: u32,

    #[serde(default)]
    pub nvm_crc_active: bool,
}

impl DataPoolList {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn element(&self, idx: ElementIndex) -> Option<&DataPoolElement> {
        idx.lookup(&self.elements)
    }

    /// Sum of the element sizes.
    pub fn values_size(&self) -> u32 {
        self.elements.iter().map(DataPoolElement::size_in_bytes).sum()
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("List", &self.name)?;
        check_unique_names("Element", self.elements.iter().map(|e| e.name.as_str()))?;
        check_unique_names("Dataset", self.datasets.iter().map(|d| d.name.as_str()))?;

        for elem in &self.elements {
            elem.validate()?;
        }

        for ds in &self.datasets {
            if ds.values.len() != self.elements.len() {
                return Err(ModelError::DatasetLengthMismatch(
                    self.name.clone(),
                    ds.name.clone(),
                    self.elements.len(),
                    ds.values.len(),
                ));
            }

            for (value, elem) in ds.values.iter().zip(&self.elements) {
                if !value.same_layout(&elem.value) {
                    return Err(ModelError::ContentLayoutMismatch(Some(elem.name.clone())));
                }
            }
        }

        Ok(())
    }
}

impl DefinitionHash for DataPoolList {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        h.update(&self.nvm_start_address.to_le_bytes());
        h.update(&self.nvm_size.to_le_bytes());
        hash_bool(h, self.nvm_crc_active);
        self.elements.hash_into(h);
        self.datasets.hash_into(h);
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DataPoolVersion {
    pub major: u8,
    pub minor: u8,
    pub release: u8,
}

impl Default for DataPoolVersion {
    fn default() -> Self {
        Self {
            major: 1,
            minor: 0,
            release: 0,
        }
    }
}

/// A named, typed collection of lists.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct DataPool {
    pub name: String,

    #[serde(default)]
    pub comment: String,

    pub kind: DataPoolKind,

    #[serde(default)]
    pub version: DataPoolVersion,

    /// Safety relevant pool.
    #[serde(default)]
    pub safety: bool,

    /// Visible to applications that do not own it.
    #[serde(default)]
    pub public: bool,

    /// Application owning the pool's storage; `None` for pools that no
    /// application of this node owns.
    #[serde(default)]
    pub owner: Option<ApplicationIndex>,

    #[serde(default)]
    pub nvm_start_address: u32,

    #[serde(default)]
    pub nvm_size: u32,

    #[serde(default)]
    pub lists: Vec<DataPoolList>,
}

impl DataPool {
    pub fn new(name: &str, kind: DataPoolKind) -> Self {
        Self {
            name: name.into(),
            comment: String::new(),
            kind,
            version: DataPoolVersion::default(),
            safety: false,
            public: false,
            owner: None,
            nvm_start_address: 0,
            nvm_size: 0,
            lists: Vec::new(),
        }
    }

    pub fn list(&self, idx: ListIndex) -> Option<&DataPoolList> {
        idx.lookup(&self.lists)
    }

    pub fn element(&self, r: ElementRef) -> Option<&DataPoolElement> {
        self.list(r.list)?.element(r.element)
    }

    pub fn validate(&self) -> Result<(), ModelError> {
        check_name_validity("Data pool", &self.name)?;
        check_unique_names("List", self.lists.iter().map(|l| l.name.as_str()))?;

        for list in &self.lists {
            list.validate()?;
        }

        Ok(())
    }
}

impl DefinitionHash for DataPool {
    fn hash_into(&self, h: &mut Hasher) {
        hash_str(h, &self.name);
        h.update(&[self.kind.tag()]);
        h.update(&[self.version.major, self.version.minor, self.version.release]);
        hash_bool(h, self.safety);
        hash_bool(h, self.public);
        h.update(&self.nvm_start_address.to_le_bytes());
        h.update(&self.nvm_size.to_le_bytes());
        self.lists.hash_into(h);
    }
}
