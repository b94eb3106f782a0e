//! Typed values of data pool elements: one of ten primitive types, either a
//! scalar or a fixed-size array.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::*;

/// Primitive type of an element value.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    U8,
    U16,
    U32,
    U64,
    S8,
    S16,
    S32,
    S64,
    F32,
    F64,
}

impl ContentType {
    pub const ALL: [ContentType; 10] = [
        Self::U8,
        Self::U16,
        Self::U32,
        Self::U64,
        Self::S8,
        Self::S16,
        Self::S32,
        Self::S64,
        Self::F32,
        Self::F64,
    ];

    /// Size of one value in bytes.
    pub const fn size(self) -> u32 {
        match self {
            Self::U8 | Self::S8 => 1,
            Self::U16 | Self::S16 => 2,
            Self::U32 | Self::S32 | Self::F32 => 4,
            Self::U64 | Self::S64 | Self::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, Self::S8 | Self::S16 | Self::S32 | Self::S64)
    }

    /// Stable numeric tag, used in hashes and parameter set images.
    pub const fn tag(self) -> u8 {
        match self {
            Self::U8 => 0,
            Self::U16 => 1,
            Self::U32 => 2,
            Self::U64 => 3,
            Self::S8 => 4,
            Self::S16 => 5,
            Self::S32 => 6,
            Self::S64 => 7,
            Self::F32 => 8,
            Self::F64 => 9,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.tag() == tag)
    }

    /// Smallest representable value.
    pub fn min_scalar(self) -> Scalar {
        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => Scalar::Unsigned(0),
            Self::S8 => Scalar::Signed(i8::MIN.into()),
            Self::S16 => Scalar::Signed(i16::MIN.into()),
            Self::S32 => Scalar::Signed(i32::MIN.into()),
            Self::S64 => Scalar::Signed(i64::MIN),
            Self::F32 => Scalar::Float(f32::MIN.into()),
            Self::F64 => Scalar::Float(f64::MIN),
        }
    }

    /// Largest representable value.
    pub fn max_scalar(self) -> Scalar {
        match self {
            Self::U8 => Scalar::Unsigned(u8::MAX.into()),
            Self::U16 => Scalar::Unsigned(u16::MAX.into()),
            Self::U32 => Scalar::Unsigned(u32::MAX.into()),
            Self::U64 => Scalar::Unsigned(u64::MAX),
            Self::S8 => Scalar::Signed(i8::MAX.into()),
            Self::S16 => Scalar::Signed(i16::MAX.into()),
            Self::S32 => Scalar::Signed(i32::MAX.into()),
            Self::S64 => Scalar::Signed(i64::MAX),
            Self::F32 => Scalar::Float(f32::MAX.into()),
            Self::F64 => Scalar::Float(f64::MAX),
        }
    }

    /// Bring a scalar into the canonical variant for this type and check its
    /// range. `f32` values are rounded to `f32` precision.
    fn normalize(self, value: Scalar) -> Result<Scalar, ModelError> {
        let out_of_range = || ModelError::ValueOutOfRange(self, value.to_string());

        match self {
            Self::U8 | Self::U16 | Self::U32 | Self::U64 => {
                let v = match value {
                    Scalar::Unsigned(v) => v,
                    Scalar::Signed(v) => u64::try_from(v).map_err(|_| out_of_range())?,
                    Scalar::Float(_) => return Err(out_of_range()),
                };
                if v > self.max_scalar().as_u64() {
                    return Err(out_of_range());
                }
                Ok(Scalar::Unsigned(v))
            }
            Self::S8 | Self::S16 | Self::S32 | Self::S64 => {
                let v = match value {
                    Scalar::Unsigned(v) => i64::try_from(v).map_err(|_| out_of_range())?,
                    Scalar::Signed(v) => v,
                    Scalar::Float(_) => return Err(out_of_range()),
                };
                if v < self.min_scalar().as_i64() || v > self.max_scalar().as_i64() {
                    return Err(out_of_range());
                }
                Ok(Scalar::Signed(v))
            }
            Self::F32 => {
                let v = value.as_f64();
                if !v.is_finite() || v.abs() > f64::from(f32::MAX) {
                    return Err(out_of_range());
                }
                Ok(Scalar::Float(f64::from(v as f32)))
            }
            Self::F64 => {
                let v = value.as_f64();
                if !v.is_finite() {
                    return Err(out_of_range());
                }
                Ok(Scalar::Float(v))
            }
        }
    }
}

/// One numeric value. Inside a [`Content`] the variant always matches the
/// content's type class.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
#[serde(untagged)]
pub enum Scalar {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
}

impl Scalar {
    pub fn as_u64(self) -> u64 {
        match self {
            Self::Unsigned(v) => v,
            Self::Signed(v) => v as u64,
            Self::Float(v) => v as u64,
        }
    }

    pub fn as_i64(self) -> i64 {
        match self {
            Self::Unsigned(v) => v as i64,
            Self::Signed(v) => v,
            Self::Float(v) => v as i64,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Self::Unsigned(v) => v as f64,
            Self::Signed(v) => v as f64,
            Self::Float(v) => v,
        }
    }

    /// Little-endian encoding as a value of type `ty`.
    pub fn to_le_bytes(self, ty: ContentType) -> Vec<u8> {
        match ty {
            ContentType::U8 => vec![self.as_u64() as u8],
            ContentType::U16 => (self.as_u64() as u16).to_le_bytes().to_vec(),
            ContentType::U32 => (self.as_u64() as u32).to_le_bytes().to_vec(),
            ContentType::U64 => self.as_u64().to_le_bytes().to_vec(),
            ContentType::S8 => (self.as_i64() as i8).to_le_bytes().to_vec(),
            ContentType::S16 => (self.as_i64() as i16).to_le_bytes().to_vec(),
            ContentType::S32 => (self.as_i64() as i32).to_le_bytes().to_vec(),
            ContentType::S64 => self.as_i64().to_le_bytes().to_vec(),
            ContentType::F32 => (self.as_f64() as f32).to_le_bytes().to_vec(),
            ContentType::F64 => self.as_f64().to_le_bytes().to_vec(),
        }
    }

    /// Decode a little-endian value of type `ty`. `None` if `bytes` is not
    /// exactly one value long.
    pub fn from_le_bytes(ty: ContentType, bytes: &[u8]) -> Option<Self> {
        let v = match ty {
            ContentType::U8 => Self::Unsigned(u8::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::U16 => Self::Unsigned(u16::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::U32 => Self::Unsigned(u32::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::U64 => Self::Unsigned(u64::from_le_bytes(bytes.try_into().ok()?)),
            ContentType::S8 => Self::Signed(i8::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::S16 => Self::Signed(i16::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::S32 => Self::Signed(i32::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::S64 => Self::Signed(i64::from_le_bytes(bytes.try_into().ok()?)),
            ContentType::F32 => Self::Float(f32::from_le_bytes(bytes.try_into().ok()?).into()),
            ContentType::F64 => Self::Float(f64::from_le_bytes(bytes.try_into().ok()?)),
        };
        Some(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unsigned(v) => write!(f, "{v}"),
            Self::Signed(v) => write!(f, "{v}"),
            // Debug keeps a decimal point and round-trips exactly
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

macro_rules! scalar_from {
    ($variant:ident, $as:ty, $($t:ty),+) => {
        $(
            impl From<$t> for Scalar {
                fn from(v: $t) -> Self {
                    Self::$variant(<$as>::from(v))
                }
            }
        )+
    };
}

scalar_from!(Unsigned, u64, u8, u16, u32, u64);
scalar_from!(Signed, i64, i8, i16, i32, i64);
scalar_from!(Float, f64, f32, f64);

/// A typed scalar or fixed-size array value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(try_from = "RawContent", into = "RawContent")]
pub struct Content {
    ty: ContentType,
    array: bool,
    values: Vec<Scalar>,
}

impl Content {
    pub fn scalar(ty: ContentType, value: impl Into<Scalar>) -> Result<Self, ModelError> {
        Ok(Self {
            ty,
            array: false,
            values: vec![ty.normalize(value.into())?],
        })
    }

    pub fn array<S: Into<Scalar>>(
        ty: ContentType,
        values: impl IntoIterator<Item = S>,
    ) -> Result<Self, ModelError> {
        let values = values
            .into_iter()
            .map(|v| ty.normalize(v.into()))
            .collect::<Result<Vec<_>, _>>()?;

        if values.is_empty() {
            return Err(ModelError::EmptyArray(ty));
        }

        Ok(Self {
            ty,
            array: true,
            values,
        })
    }

    fn filled(ty: ContentType, array_len: Option<usize>, value: Scalar) -> Self {
        match array_len {
            Some(n) => Self {
                ty,
                array: true,
                values: vec![value; n.max(1)],
            },
            None => Self {
                ty,
                array: false,
                values: vec![value],
            },
        }
    }

    /// All-zero content; `array_len` of `None` gives a scalar.
    pub fn zeroed(ty: ContentType, array_len: Option<usize>) -> Self {
        let zero = match ty.min_scalar() {
            Scalar::Unsigned(_) => Scalar::Unsigned(0),
            Scalar::Signed(_) => Scalar::Signed(0),
            Scalar::Float(_) => Scalar::Float(0.0),
        };
        Self::filled(ty, array_len, zero)
    }

    /// Content holding the smallest representable value of `ty`.
    pub fn type_min(ty: ContentType, array_len: Option<usize>) -> Self {
        Self::filled(ty, array_len, ty.min_scalar())
    }

    /// Content holding the largest representable value of `ty`.
    pub fn type_max(ty: ContentType, array_len: Option<usize>) -> Self {
        Self::filled(ty, array_len, ty.max_scalar())
    }

    /// Same type and array layout, every entry set to `value`.
    pub fn with_layout_of(layout: &Content, value: Scalar) -> Result<Self, ModelError> {
        let value = layout.ty.normalize(value)?;
        Ok(Self::filled(
            layout.ty,
            layout.array.then_some(layout.len()),
            value,
        ))
    }

    pub fn ty(&self) -> ContentType {
        self.ty
    }

    pub fn is_array(&self) -> bool {
        self.array
    }

    /// Number of values (1 for scalars).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    /// First (for scalars: the only) value.
    pub fn first(&self) -> Scalar {
        self.values[0]
    }

    pub fn size_in_bytes(&self) -> u32 {
        self.ty.size() * self.values.len() as u32
    }

    pub fn to_le_bytes(&self) -> Vec<u8> {
        self.values
            .iter()
            .flat_map(|v| v.to_le_bytes(self.ty))
            .collect()
    }

    /// Whether `other` has the same type, arrayness and array size.
    pub fn same_layout(&self, other: &Content) -> bool {
        self.ty == other.ty && self.array == other.array && self.len() == other.len()
    }

    /// Whether every value lies within the matching `min` and `max` values.
    /// Contents of another layout are never within.
    pub fn within(&self, min: &Content, max: &Content) -> bool {
        if !self.same_layout(min) || !self.same_layout(max) {
            return false;
        }

        let le = |a: Scalar, b: Scalar| match self.ty {
            ty if ty.is_float() => a.as_f64() <= b.as_f64(),
            ty if ty.is_signed() => a.as_i64() <= b.as_i64(),
            _ => a.as_u64() <= b.as_u64(),
        };

        self.values
            .iter()
            .zip(min.values.iter().zip(&max.values))
            .all(|(&v, (&lo, &hi))| le(lo, v) && le(v, hi))
    }
}

#[derive(Serialize, Deserialize)]
struct RawContent {
    #[serde(rename = "type")]
    ty: ContentType,
    value: RawValue,
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawValue {
    Scalar(Scalar),
    Array(Vec<Scalar>),
}

impl TryFrom<RawContent> for Content {
    type Error = ModelError;

    fn try_from(raw: RawContent) -> Result<Self, Self::Error> {
        match raw.value {
            RawValue::Scalar(v) => Content::scalar(raw.ty, v),
            RawValue::Array(v) => Content::array(raw.ty, v),
        }
    }
}

impl From<Content> for RawContent {
    fn from(c: Content) -> Self {
        let value = if c.array {
            RawValue::Array(c.values)
        } else {
            RawValue::Scalar(c.values[0])
        };

        RawContent { ty: c.ty, value }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_checks() {
        assert!(Content::scalar(ContentType::U8, 255).is_ok());
        assert!(matches!(
            Content::scalar(ContentType::U8, 256),
            Err(ModelError::ValueOutOfRange(ContentType::U8, _))
        ));
        assert!(matches!(
            Content::scalar(ContentType::U16, -1),
            Err(ModelError::ValueOutOfRange(..))
        ));
        assert!(Content::scalar(ContentType::S8, -128).is_ok());
        assert!(Content::scalar(ContentType::S8, -129).is_err());
        assert!(Content::scalar(ContentType::U32, 0.5).is_err());
        assert!(Content::scalar(ContentType::F64, f64::NAN).is_err());
        assert!(Content::scalar(ContentType::F32, 1e39).is_err());
    }

    #[test]
    fn bounds_per_value() {
        let min = Content::array(ContentType::S8, [-5, 0]).unwrap();
        let max = Content::array(ContentType::S8, [5, 10]).unwrap();

        assert!(Content::array(ContentType::S8, [-5, 10]).unwrap().within(&min, &max));
        assert!(!Content::array(ContentType::S8, [0, -1]).unwrap().within(&min, &max));
        assert!(!Content::scalar(ContentType::S8, 0).unwrap().within(&min, &max));
    }

    #[test]
    fn f32_values_are_rounded_on_entry() {
        let c = Content::scalar(ContentType::F32, 0.1f64).unwrap();
        assert_eq!(c.first(), Scalar::Float(f64::from(0.1f32)));
    }

    #[test]
    fn little_endian_layout() {
        let c = Content::array(ContentType::U16, [0x1234u16, 0xABCD]).unwrap();
        assert_eq!(c.to_le_bytes(), vec![0x34, 0x12, 0xCD, 0xAB]);
        assert_eq!(c.size_in_bytes(), 4);

        let s = Content::scalar(ContentType::S32, -2).unwrap();
        assert_eq!(s.to_le_bytes(), vec![0xFE, 0xFF, 0xFF, 0xFF]);
        assert_eq!(
            Scalar::from_le_bytes(ContentType::S32, &s.to_le_bytes()),
            Some(Scalar::Signed(-2))
        );
    }

    #[test]
    fn empty_array_rejected() {
        assert!(matches!(
            Content::array(ContentType::U8, Vec::<u8>::new()),
            Err(ModelError::EmptyArray(ContentType::U8))
        ));
    }

    #[test]
    fn serde_shapes() {
        let scalar: Content = serde_json::from_str(r#"{"type":"s16","value":-3}"#).unwrap();
        assert_eq!(scalar, Content::scalar(ContentType::S16, -3).unwrap());
        assert!(!scalar.is_array());

        let array: Content = serde_json::from_str(r#"{"type":"f64","value":[1, 2.5]}"#).unwrap();
        assert!(array.is_array());
        assert_eq!(array.values(), &[Scalar::Float(1.0), Scalar::Float(2.5)]);

        assert!(serde_json::from_str::<Content>(r#"{"type":"u8","value":300}"#).is_err());
    }

    #[test]
    fn layout_comparison() {
        let a = Content::array(ContentType::U8, [1u8, 2]).unwrap();
        let b = Content::type_max(ContentType::U8, Some(2));
        let c = Content::type_max(ContentType::U8, None);

        assert!(a.same_layout(&b));
        assert!(!a.same_layout(&c));
    }
}
