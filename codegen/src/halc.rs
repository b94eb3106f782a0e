//! HAL configuration (`hal_configuration.h/.c`, or one pair per safety case).
//!
//! For every HALC domain the files define a struct of pointers into the HALC
//! data pool, one struct per retained channel, so the HAL can reach the
//! values of a channel without knowing the pool layout.

use indoc::formatdoc;
use osy_core::hash::DEFINITION_HASH;
use osy_core::*;

use crate::datapool::{value_path, DataPoolCodegen};
use crate::naming::*;
use crate::text::*;
use crate::{Codegen, CodegenError, Indent};

/// File name of the HAL configuration of `case`.
pub fn hal_basename(mode: HalcSafetyMode, case: SafetyCase) -> String {
    if mode.is_two_level() {
        format!("hal_{}_configuration", case.file_tag())
    } else {
        "hal_configuration".into()
    }
}

/// One pointer member of a domain struct.
struct Member<'a> {
    ty: ContentType,
    ident: String,
    list: &'a DataPoolList,
    elem: &'a DataPoolElement,
    read_only: bool,
}

/// Everything emitted for one domain.
struct DomainLayout<'a> {
    domain: &'a HalcDomain,
    retained: Vec<(usize, &'a HalcChannel)>,
    members: Vec<Member<'a>>,
}

impl DomainLayout<'_> {
    fn struct_ty(&self) -> String {
        format!("T_hal_{}", lower_snake(&self.domain.name))
    }

    fn define_prefix(&self) -> String {
        format!("HAL_{}", upper_snake(&self.domain.plural_name))
    }

    fn global_ident(&self) -> String {
        if self.domain.has_channels() {
            format!("gpt_hal_{}", self.domain.plural_name)
        } else {
            format!("gpt_hal_{}", self.domain.name)
        }
    }

    fn table_ident(&self) -> String {
        if self.domain.has_channels() {
            format!("mat_{}", self.domain.plural_name)
        } else {
            format!("mt_{}", self.domain.name)
        }
    }

    fn is_empty(&self) -> bool {
        self.domain.has_channels() && self.retained.is_empty()
    }
}

struct HalFiles<'a> {
    cg: &'a Codegen<'a>,
    pool: &'a DataPool,
    mode: HalcSafetyMode,
    domains: Vec<DomainLayout<'a>>,
    basename: String,
    project_hash: u32,
}

impl<'n> Codegen<'n> {
    /// HALC data pools of this application, one per safety case of the
    /// node's HALC mode, in case order.
    pub(crate) fn hal_pools(&self) -> Result<Vec<(SafetyCase, &'n DataPool)>, CodegenError> {
        let Some(halc) = &self.node.halc else {
            return Ok(Vec::new());
        };

        let local: Vec<&DataPool> = self
            .node
            .iter_datapools()
            .filter(|(_, p)| p.kind.is_halc() && p.owner == Some(self.app_index))
            .map(|(_, p)| p)
            .collect();

        if local.is_empty() {
            return Ok(Vec::new());
        }

        let cases = halc.mode.safety_cases();
        if local.len() != cases.len() {
            return Err(CodegenError::config(format!(
                "Application `{}` owns {} HALC data pools, HALC mode {:?} needs {}.",
                self.app().name,
                local.len(),
                halc.mode,
                cases.len()
            )));
        }

        cases
            .iter()
            .map(|&case| {
                local
                    .iter()
                    .find(|p| p.safety == case.is_safe())
                    .map(|p| (case, *p))
                    .ok_or_else(|| {
                        CodegenError::config(format!(
                            "Application `{}` has no {} HALC data pool.",
                            self.app().name,
                            case.file_tag()
                        ))
                    })
            })
            .collect()
    }

    /// Generate the HAL configuration of `case` from HALC pool `pool`.
    pub fn hal_files(&self, case: SafetyCase, pool: &DataPool) -> Result<SourcePair, CodegenError> {
        if self.version < 5 {
            return Err(CodegenError::unsupported(format!(
                "HAL configuration needs code format version 5 or newer, got {}.",
                self.version
            )));
        }

        let halc = self
            .node
            .halc
            .as_ref()
            .ok_or_else(|| CodegenError::config("Node has no HALC definition."))?;

        let domains = halc
            .domains
            .iter()
            .map(|d| domain_layout(halc.mode, case, d, pool))
            .collect::<Result<Vec<_>, _>>()?;

        let mut h = DEFINITION_HASH.digest();
        halc.hash_into(&mut h);
        pool.hash_into(&mut h);
        h.update(&[u8::from(case.is_safe())]);
        h.update(&self.version.to_le_bytes());

        let files = HalFiles {
            cg: self,
            pool,
            mode: halc.mode,
            domains,
            basename: hal_basename(halc.mode, case),
            project_hash: h.finalize(),
        };

        Ok(SourcePair {
            basename: files.basename.clone(),
            header: files.header(),
            source: files.source(),
        })
    }
}

/// Resolve every leaf of `domain` to its element in the HALC pool.
fn domain_layout<'a>(
    mode: HalcSafetyMode,
    case: SafetyCase,
    domain: &'a HalcDomain,
    pool: &'a DataPool,
) -> Result<DomainLayout<'a>, CodegenError> {
    let retained = domain.retained_channels(mode, case);
    let mut layout = DomainLayout {
        domain,
        retained,
        members: Vec::new(),
    };

    if layout.is_empty() {
        return Ok(layout);
    }

    for cat in HalcCategory::ALL {
        let list = pool.list(cat.list_index()).ok_or_else(|| {
            CodegenError::config(format!(
                "HALC data pool `{}` has no `{}` list.",
                pool.name,
                cat.list_name()
            ))
        })?;

        for s in domain.structs(cat) {
            for (leaf, default) in s.leaves() {
                let name = domain.element_name(&leaf);
                let elem = list.elements.iter().find(|e| e.name == name).ok_or_else(|| {
                    CodegenError::config(format!(
                        "HALC data pool `{}` has no element `{}.{name}`.",
                        pool.name, list.name
                    ))
                })?;

                let layout_ok = elem.ty() == default.ty()
                    && if domain.has_channels() {
                        elem.value.is_array() && elem.value.len() == layout.retained.len()
                    } else {
                        !elem.value.is_array()
                    };

                if !layout_ok {
                    return Err(CodegenError::config(format!(
                        "HALC element `{}.{}.{name}` does not match the layout of domain `{}`.",
                        pool.name, list.name, domain.name
                    )));
                }

                layout.members.push(Member {
                    ty: default.ty(),
                    ident: pointer_member_name(default.ty(), &leaf),
                    list,
                    elem,
                    read_only: cat == HalcCategory::Configuration,
                });
            }
        }
    }

    Ok(layout)
}

impl<'a> HalFiles<'a> {
    fn brief(&self) -> &'static str {
        "openSYDE HAL configuration"
    }

    fn detail(&self) -> String {
        format!(
            "HAL channel configuration of application `{}`, based on data pool `{}`.",
            self.cg.app().name,
            self.pool.name
        )
    }

    /// Channel fields precede the pointers; the safety flag only exists when
    /// channels of both kinds end up in one configuration.
    fn has_safety_flag(&self) -> bool {
        !self.mode.drops_channels()
    }

    fn header(&self) -> String {
        let mut body = formatdoc! {"
            {defines}
            {project_id}
            ",
            defines = section("Defines"),
            project_id = project_id_define(&self.basename, self.project_hash),
        };

        for d in self.domains.iter().filter(|d| d.domain.has_channels()) {
            let prefix = d.define_prefix();
            body += "\n";
            for (i, (_, ch)) in d.retained.iter().enumerate() {
                body += &format!("#define {prefix}_CH_{} ({i}U)\n", upper_snake(&ch.name));
            }
            body += &format!(
                "#define {prefix}_NUMBER_OF_CHANNELS ({}U)\n",
                d.retained.len()
            );
        }

        body += &format!("\n{}\n", section("Types"));
        for d in &self.domains {
            body += &self.struct_typedef(d);
            body += "\n";
        }

        body += &format!("{}\n", section("Global Variables"));
        for d in &self.domains {
            body += &format!(
                "extern const {} * const {};\n",
                d.struct_ty(),
                d.global_ident()
            );
        }

        header_file(
            &file_header(
                &format!("{}.h", self.basename),
                self.brief(),
                &self.detail(),
                &self.cg.opts.exporter,
            ),
            &self.basename,
            &["stwtypes.h".into(), format!("{}.h", self.pool.basename())],
            &body,
        )
    }

    fn struct_typedef(&self, d: &DomainLayout) -> String {
        let mut fields = Vec::new();
        if d.domain.has_channels() {
            fields.push("uint8 u8_ChannelNumber;".to_string());
            fields.push("uint32 u32_UseCase;".into());
            if self.has_safety_flag() {
                fields.push("uint8 u8_SafetyRelevant;".into());
            }
        }

        for m in &d.members {
            let qualifier = if m.read_only { "const " } else { "" };
            fields.push(format!("{qualifier}{} * {};", c_type(m.ty), m.ident));
        }

        if fields.is_empty() {
            // C does not allow empty structs
            fields.push("uint8 u8_Reserved;".into());
        }

        formatdoc! {"
            typedef struct
            {{
            {fields}
            }} {ty};
            ",
            fields = fields.join("\n").indent(3),
            ty = d.struct_ty(),
        }
    }

    /// Initializer of one struct, `slot` is the channel position in the
    /// pool arrays.
    fn initializer(&self, d: &DomainLayout, slot: Option<(usize, &HalcChannel)>) -> String {
        let mut values = Vec::new();
        if let Some((number, ch)) = slot.map(|(i, ch)| (d.retained[i].0, ch)) {
            values.push(format!("{number}U"));
            values.push(format!("{}U", ch.use_case));
            if self.has_safety_flag() {
                values.push(format!("{}U", u8::from(ch.safety_relevant)));
            }
        }

        let values_ident = self.pool.values_ident();
        for m in &d.members {
            let path = value_path(m.list, m.elem);
            values.push(match slot {
                Some((i, _)) => format!("&{values_ident}.{path}[{i}]"),
                None => format!("&{values_ident}.{path}"),
            });
        }

        if values.is_empty() {
            values.push("0U".into());
        }

        format!("{{ {} }}", values.join(", "))
    }

    fn source(&self) -> String {
        let mut body = formatdoc! {"
            {defines}
            {guard}

            {project_id}

            {module_globals}
            ",
            defines = section("Defines"),
            guard = version_guard("OSY_HAL_DEFINITION_VERSION", self.cg.version, self.project_hash),
            project_id = project_id_macro(&self.basename, self.project_hash),
            module_globals = section("Module Global Variables"),
        };

        for d in self.domains.iter().filter(|d| !d.is_empty()) {
            if d.domain.has_channels() {
                let rows = d
                    .retained
                    .iter()
                    .enumerate()
                    .map(|(i, (_, ch))| {
                        format!("{}, ///< {}", self.initializer(d, Some((i, ch))), ch.name)
                    })
                    .collect::<Vec<_>>()
                    .join("\n");

                body += &formatdoc! {"
                    static const {ty} {ident}[{n}] =
                    {{
                    {rows}
                    }};

                    ",
                    ty = d.struct_ty(),
                    ident = d.table_ident(),
                    n = d.retained.len(),
                    rows = rows.indent(3),
                };
            } else {
                body += &format!(
                    "static const {} {} = {};\n\n",
                    d.struct_ty(),
                    d.table_ident(),
                    self.initializer(d, None)
                );
            }
        }

        body += &format!("{}\n", section("Global Variables"));
        for d in &self.domains {
            let target = match (d.is_empty(), d.domain.has_channels()) {
                (true, _) => "NULL".to_string(),
                (false, true) => format!("&{}[0]", d.table_ident()),
                (false, false) => format!("&{}", d.table_ident()),
            };
            body += &format!(
                "const {} * const {} = {target};\n",
                d.struct_ty(),
                d.global_ident()
            );
        }

        source_file(
            &file_header(
                &format!("{}.c", self.basename),
                self.brief(),
                &self.detail(),
                &self.cg.opts.exporter,
            ),
            &self.basename,
            &body,
        )
    }
}
