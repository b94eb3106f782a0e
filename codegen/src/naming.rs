//! C naming and literal formatting shared by the emitters.

use osy_core::{Content, ContentType, Scalar};

use crate::ScalingSupport;

/// Width of separator lines in generated files.
const LINE_WIDTH: usize = 120;

/// `//---...` line spanning the full width.
pub(crate) fn separator() -> String {
    format!("//{}", "-".repeat(LINE_WIDTH - 2))
}

/// `/* -- Title ---...--- */` section header spanning the full width.
pub(crate) fn section(title: &str) -> String {
    let head = format!("/* -- {title} ");
    let fill = LINE_WIDTH.saturating_sub(head.len() + 3);
    format!("{head}{} */", "-".repeat(fill))
}

pub(crate) fn c_type(ty: ContentType) -> &'static str {
    match ty {
        ContentType::U8 => "uint8",
        ContentType::U16 => "uint16",
        ContentType::U32 => "uint32",
        ContentType::U64 => "uint64",
        ContentType::S8 => "sint8",
        ContentType::S16 => "sint16",
        ContentType::S32 => "sint32",
        ContentType::S64 => "sint64",
        ContentType::F32 => "float32",
        ContentType::F64 => "float64",
    }
}

/// Hungarian type prefix, e.g. `u8`.
pub(crate) fn type_prefix(ty: ContentType) -> &'static str {
    match ty {
        ContentType::U8 => "u8",
        ContentType::U16 => "u16",
        ContentType::U32 => "u32",
        ContentType::U64 => "u64",
        ContentType::S8 => "s8",
        ContentType::S16 => "s16",
        ContentType::S32 => "s32",
        ContentType::S64 => "s64",
        ContentType::F32 => "f32",
        ContentType::F64 => "f64",
    }
}

/// Struct member name of a value, e.g. `u8_Speed` or `au16_Limits`.
pub(crate) fn member_name(value: &Content, name: &str) -> String {
    let array = if value.is_array() { "a" } else { "" };
    format!("{array}{}_{name}", type_prefix(value.ty()))
}

/// Struct member name of a pointer to a value, e.g. `pu16_Debounce`.
pub(crate) fn pointer_member_name(ty: ContentType, name: &str) -> String {
    format!("p{}_{name}", type_prefix(ty))
}

/// Enum constant of a data pool element type.
pub(crate) fn element_type_constant(ty: ContentType) -> String {
    format!("OSY_DPA_ELEMENT_TYPE_{}", c_type(ty).to_uppercase())
}

/// C literal of `value` as type `ty`.
///
/// The smallest 32 and 64 bit signed values are written as `MIN+1 - 1`, as
/// their plain literal is the negation of an out-of-range positive value.
pub(crate) fn c_literal(ty: ContentType, value: Scalar) -> String {
    match ty {
        ContentType::U8 | ContentType::U16 | ContentType::U32 | ContentType::U64 => {
            format!("{}U", value.as_u64())
        }
        ContentType::S8 | ContentType::S16 => format!("{}", value.as_i64()),
        ContentType::S32 => match value.as_i64() {
            v if v == i64::from(i32::MIN) => "(-2147483647L - 1L)".into(),
            v => format!("{v}L"),
        },
        ContentType::S64 => match value.as_i64() {
            i64::MIN => "(-9223372036854775807LL - 1LL)".into(),
            v => format!("{v}LL"),
        },
        ContentType::F32 => format!("{:?}F", value.as_f64() as f32),
        ContentType::F64 => format!("{:?}", value.as_f64()),
    }
}

/// Initializer of a whole value: a literal, or a braced list for arrays.
pub(crate) fn c_initializer(value: &Content) -> String {
    if !value.is_array() {
        return c_literal(value.ty(), value.first());
    }

    let items = value
        .values()
        .iter()
        .map(|v| c_literal(value.ty(), *v))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{{ {items} }}")
}

/// Floating point literal in the precision of the scaling mode; `None` when
/// scaling is disabled.
pub(crate) fn scaling_literal(mode: ScalingSupport, value: f64) -> Option<String> {
    match mode {
        ScalingSupport::Float32 => Some(format!("{:?}F", value as f32)),
        ScalingSupport::Float64 => Some(format!("{value:?}")),
        ScalingSupport::None => None,
    }
}

/// `DigitalInputs` -> `DIGITAL_INPUTS`.
pub(crate) fn upper_snake(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 4);
    let mut prev: Option<char> = None;

    for c in name.chars() {
        if c.is_ascii_uppercase()
            && prev.is_some_and(|p| p.is_ascii_lowercase() || p.is_ascii_digit())
        {
            out.push('_');
        }
        out.push(c.to_ascii_uppercase());
        prev = Some(c);
    }

    out
}

/// `DigitalInput` -> `digital_input`.
pub(crate) fn lower_snake(name: &str) -> String {
    upper_snake(name).to_ascii_lowercase()
}

/// Hash as an unsigned long C literal, e.g. `0x0000ABCDUL`.
pub(crate) fn hash_literal(hash: u32) -> String {
    format!("0x{hash:08X}UL")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sections_span_line() {
        assert_eq!(separator().len(), 120);
        assert_eq!(section("Includes").len(), 120);
        assert!(section("Includes").starts_with("/* -- Includes ---"));
        assert!(section("Includes").ends_with("- */"));
    }

    #[test]
    fn literals() {
        assert_eq!(c_literal(ContentType::U8, Scalar::from(5u8)), "5U");
        assert_eq!(c_literal(ContentType::S8, Scalar::from(-5i8)), "-5");
        assert_eq!(c_literal(ContentType::S32, Scalar::from(-5i32)), "-5L");
        assert_eq!(
            c_literal(ContentType::S32, Scalar::from(i32::MIN)),
            "(-2147483647L - 1L)"
        );
        assert_eq!(
            c_literal(ContentType::S64, Scalar::from(i64::MIN)),
            "(-9223372036854775807LL - 1LL)"
        );
        assert_eq!(c_literal(ContentType::S64, Scalar::from(7i64)), "7LL");
        assert_eq!(c_literal(ContentType::F32, Scalar::from(0.5f32)), "0.5F");
        assert_eq!(c_literal(ContentType::F64, Scalar::from(2.0f64)), "2.0");
    }

    #[test]
    fn initializers() {
        let arr = Content::array(ContentType::U16, [1u16, 2, 3]).unwrap();
        assert_eq!(c_initializer(&arr), "{ 1U, 2U, 3U }");
        assert_eq!(member_name(&arr, "Limits"), "au16_Limits");

        let s = Content::scalar(ContentType::S16, -4).unwrap();
        assert_eq!(c_initializer(&s), "-4");
        assert_eq!(member_name(&s, "Offset"), "s16_Offset");
    }

    #[test]
    fn snake_case() {
        assert_eq!(upper_snake("DigitalInputs"), "DIGITAL_INPUTS");
        assert_eq!(upper_snake("DI0"), "DI0");
        assert_eq!(upper_snake("Can1Tx"), "CAN1_TX");
        assert_eq!(lower_snake("DigitalInput"), "digital_input");
    }

    #[test]
    fn scaling_precision() {
        assert_eq!(
            scaling_literal(ScalingSupport::Float32, 0.1).as_deref(),
            Some("0.1F")
        );
        assert_eq!(
            scaling_literal(ScalingSupport::Float32, 1e-50).as_deref(),
            Some("0.0F")
        );
        assert_eq!(
            scaling_literal(ScalingSupport::Float64, 1e-50).as_deref(),
            Some("1e-50")
        );
        assert_eq!(scaling_literal(ScalingSupport::None, 1.0), None);
    }
}
