//! Data pool definition files (`<pool>_data_pool.h/.c`).

use indoc::formatdoc;
use osy_core::hash::DEFINITION_HASH;
use osy_core::*;

use crate::naming::*;
use crate::text::*;
use crate::{Codegen, CodegenError, Indent, ScalingSupport};

/// How an application reaches a data pool.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Linkage {
    /// The application owns the pool's storage.
    Local,
    /// Owned elsewhere; the owner publishes a pointer to its storage.
    RemotePublic,
    /// Owned elsewhere; only described, accessed through the diagnostic
    /// protocol.
    Remote,
}

impl Linkage {
    pub(crate) fn c_constant(self) -> &'static str {
        match self {
            Self::Local => "OSY_DPA_LINKAGE_LOCAL",
            Self::RemotePublic => "OSY_DPA_LINKAGE_REMOTE_PUBLIC",
            Self::Remote => "OSY_DPA_LINKAGE_REMOTE",
        }
    }

    pub(crate) fn tag(self) -> u8 {
        match self {
            Self::Local => 0,
            Self::RemotePublic => 1,
            Self::Remote => 2,
        }
    }

    /// Pool has generated types and values in this application.
    fn has_types(self) -> bool {
        !matches!(self, Self::Remote)
    }
}

/// C identifiers of a data pool.
pub(crate) trait DataPoolCodegen {
    /// Lower case name used in identifiers.
    fn c_name(&self) -> String;
    /// File name without extension.
    fn basename(&self) -> String;
    /// Value struct type of one list.
    fn list_struct_ty(&self, list: &DataPoolList) -> String;
    /// Aggregate value struct type spanning all lists.
    fn values_struct_ty(&self) -> String;
    /// Global holding the pool's values (local linkage).
    fn values_ident(&self) -> String;
    /// Global pointer to the pool's values (remote-public linkage).
    fn values_ptr_ident(&self) -> String;
    /// Global descriptor of the pool.
    fn descriptor_ident(&self) -> String;
    /// Lists that get a value struct.
    fn typed_lists(&self) -> Vec<&DataPoolList>;
}

impl DataPoolCodegen for DataPool {
    fn c_name(&self) -> String {
        self.name.to_lowercase()
    }

    fn basename(&self) -> String {
        format!("{}_data_pool", self.c_name())
    }

    fn list_struct_ty(&self, list: &DataPoolList) -> String {
        format!("T_{}_{}_values", self.c_name(), list.name.to_lowercase())
    }

    fn values_struct_ty(&self) -> String {
        format!("T_{}_data_pool_values", self.c_name())
    }

    fn values_ident(&self) -> String {
        format!("gt_{}_DataPoolValues", self.c_name())
    }

    fn values_ptr_ident(&self) -> String {
        format!("gpt_{}_DataPoolValues", self.c_name())
    }

    fn descriptor_ident(&self) -> String {
        format!("gt_{}_DataPool", self.c_name())
    }

    fn typed_lists(&self) -> Vec<&DataPoolList> {
        self.lists.iter().filter(|l| !l.elements.is_empty()).collect()
    }
}

/// Path of an element inside the pool's aggregate value struct, e.g.
/// `t_Config.u8_Speed`.
pub(crate) fn value_path(list: &DataPoolList, elem: &DataPoolElement) -> String {
    format!("t_{}.{}", list.name, member_name(&elem.value, &elem.name))
}

fn kind_constant(kind: DataPoolKind) -> &'static str {
    match kind {
        DataPoolKind::Diag => "OSY_DPA_DATA_POOL_TYPE_DIAG",
        DataPoolKind::Nvm => "OSY_DPA_DATA_POOL_TYPE_NVM",
        DataPoolKind::Com => "OSY_DPA_DATA_POOL_TYPE_COM",
        DataPoolKind::Halc => "OSY_DPA_DATA_POOL_TYPE_HALC",
        DataPoolKind::HalcNvm => "OSY_DPA_DATA_POOL_TYPE_HALC_NVM",
    }
}

fn access_constant(access: Access) -> &'static str {
    match access {
        Access::ReadWrite => "OSY_DPA_ACCESS_RW",
        Access::ReadOnly => "OSY_DPA_ACCESS_RO",
    }
}

/// Data pool emission for one pool.
struct DataPoolFiles<'a> {
    cg: &'a Codegen<'a>,
    pool: &'a DataPool,
    /// Index of the pool among the data pools of the application.
    index: usize,
    linkage: Linkage,
    definition_hash: u32,
    project_hash: u32,
}

impl<'n> Codegen<'n> {
    /// Generate the files of one data pool.
    ///
    /// `pool` is what gets emitted (for COM pools the name-qualified copy),
    /// `source` is the pool as defined in the node; its definition hash goes
    /// into the descriptor.
    pub fn datapool_files(
        &self,
        index: usize,
        pool: &DataPool,
        source: &DataPool,
        linkage: Linkage,
    ) -> Result<SourcePair, CodegenError> {
        if linkage == Linkage::RemotePublic && self.version < 4 {
            return Err(CodegenError::unsupported(format!(
                "Data pool `{}`: remote-public linkage needs code format version 4 or newer, got {}.",
                pool.name, self.version
            )));
        }

        self.check_scaling(pool, linkage)?;

        let mut h = DEFINITION_HASH.digest();
        pool.hash_into(&mut h);
        h.update(&self.version.to_le_bytes());
        h.update(&[linkage.tag(), self.opts.scaling.tag()]);

        let files = DataPoolFiles {
            cg: self,
            pool,
            index,
            linkage,
            definition_hash: source.definition_hash(),
            project_hash: h.finalize(),
        };

        Ok(SourcePair {
            basename: pool.basename(),
            header: files.header(),
            source: files.source(),
        })
    }

    /// Every element needs a positive factor. Where types are emitted it
    /// must also stay positive in the generated precision.
    fn check_scaling(&self, pool: &DataPool, linkage: Linkage) -> Result<(), CodegenError> {
        for list in &pool.lists {
            for elem in &list.elements {
                let factor = elem.scaling.factor;
                let vanishes = linkage.has_types()
                    && scaling_literal(self.opts.scaling, factor)
                        .is_some_and(|lit| lit.trim_end_matches('F') == "0.0");

                if factor <= 0.0 || vanishes {
                    return Err(CodegenError::config(format!(
                        "Element `{}.{}.{}` has scale factor {:?}, which is not positive in the generated code.",
                        pool.name, list.name, elem.name, factor
                    )));
                }
            }
        }

        Ok(())
    }
}

impl<'a> DataPoolFiles<'a> {
    fn upper(&self) -> String {
        self.pool.name.to_uppercase()
    }

    fn header(&self) -> String {
        let pool = self.pool;
        let basename = pool.basename();

        let mut body = formatdoc! {"
            {defines}
            {project_id}
            ",
            defines = section("Defines"),
            project_id = project_id_define(&basename, self.project_hash),
        };

        if self.linkage.has_types() {
            body += "\n";
            body += &self.index_defines();
            body += &self.scaling_defines();
            body += "\n";
            body += &section("Types");
            body += "\n";
            body += &self.type_defs();
        }

        body += "\n";
        body += &formatdoc! {"
            {globals}
            extern const T_osy_dpa_data_pool {descriptor};
            ",
            globals = section("Global Variables"),
            descriptor = pool.descriptor_ident(),
        };

        if !pool.typed_lists().is_empty() {
            match self.linkage {
                Linkage::Local => {
                    body += &format!(
                        "extern {} {};\n",
                        pool.values_struct_ty(),
                        pool.values_ident()
                    )
                }
                Linkage::RemotePublic => {
                    body += &format!(
                        "extern {} * {};\n",
                        pool.values_struct_ty(),
                        pool.values_ptr_ident()
                    )
                }
                Linkage::Remote => {}
            }
        }

        let top = file_header(
            &format!("{basename}.h"),
            "openSYDE data pool definition",
            &format!(
                "Header of data pool `{}` for application `{}`.",
                pool.name,
                self.cg.app().name
            ),
            &self.cg.opts.exporter,
        );

        header_file(
            &top,
            &basename,
            &["stwtypes.h".into(), "osy_dpa_data_pool.h".into()],
            &body,
        )
    }

    fn index_defines(&self) -> String {
        let up = self.upper();
        let mut out = format!("#define {up}_DATA_POOL_INDEX ({}U)\n", self.index);

        out += "\n";
        for (i, list) in self.pool.lists.iter().enumerate() {
            out += &format!("#define {up}_LIST_INDEX_{} ({i}U)\n", list.name.to_uppercase());
        }

        for list in &self.pool.lists {
            if list.elements.is_empty() {
                continue;
            }

            out += "\n";
            for (i, elem) in list.elements.iter().enumerate() {
                out += &format!(
                    "#define {up}_{}_INDEX_{} ({i}U)\n",
                    list.name.to_uppercase(),
                    elem.name.to_uppercase()
                );
            }
        }

        out
    }

    fn scaling_defines(&self) -> String {
        let scaling = self.cg.opts.scaling;
        let float = match scaling {
            ScalingSupport::Float32 => "float32",
            ScalingSupport::Float64 => "float64",
            ScalingSupport::None => return String::new(),
        };

        let mut out = String::new();
        for list in &self.pool.lists {
            for elem in list.elements.iter().filter(|e| !e.scaling.is_identity()) {
                let (Some(factor), Some(offset)) = (
                    scaling_literal(scaling, elem.scaling.factor),
                    scaling_literal(scaling, elem.scaling.offset),
                ) else {
                    continue;
                };

                let prefix = format!(
                    "{}_{}_{}",
                    self.upper(),
                    list.name.to_uppercase(),
                    elem.name.to_uppercase()
                );

                out += "\n";
                out += &formatdoc! {"
                    #define {prefix}_FACTOR ({factor})
                    #define {prefix}_OFFSET ({offset})
                    #define {prefix}_GET_SCALED(raw) ((({float})(raw) * {prefix}_FACTOR) + {prefix}_OFFSET)
                    #define {prefix}_SET_SCALED(phys) (({ty})(((phys) - {prefix}_OFFSET) / {prefix}_FACTOR))
                    ",
                    ty = c_type(elem.ty()),
                };
            }
        }

        out
    }

    fn type_defs(&self) -> String {
        let pool = self.pool;
        let lists = pool.typed_lists();
        if lists.is_empty() {
            return String::new();
        }

        let mut out = String::new();
        for list in &lists {
            let members = list
                .elements
                .iter()
                .map(|e| {
                    let dim = if e.value.is_array() {
                        format!("[{}]", e.value.len())
                    } else {
                        String::new()
                    };
                    format!("{} {}{dim};", c_type(e.ty()), member_name(&e.value, &e.name))
                })
                .collect::<Vec<_>>()
                .join("\n");

            out += &formatdoc! {"
                typedef struct
                {{
                {members}
                }} {ty};

                ",
                members = members.indent(3),
                ty = pool.list_struct_ty(list),
            };
        }

        let members = lists
            .iter()
            .map(|l| format!("{} t_{};", pool.list_struct_ty(l), l.name))
            .collect::<Vec<_>>()
            .join("\n");

        out += &formatdoc! {"
            typedef struct
            {{
            {members}
            }} {ty};
            ",
            members = members.indent(3),
            ty = pool.values_struct_ty(),
        };

        out
    }

    fn source(&self) -> String {
        let pool = self.pool;
        let basename = pool.basename();

        let mut body = formatdoc! {"
            {defines}
            {guard}

            {project_id}

            ",
            defines = section("Defines"),
            guard = version_guard(
                "OSY_DPA_DATA_POOL_DEFINITION_VERSION",
                self.cg.version,
                self.project_hash
            ),
            project_id = project_id_macro(&basename, self.project_hash),
        };

        let typed = !pool.typed_lists().is_empty() && self.linkage.has_types();
        if typed {
            body += &section("Global Variables");
            body += "\n";
            body += &match self.linkage {
                Linkage::Local => format!("{} {};\n\n", pool.values_struct_ty(), pool.values_ident()),
                _ => format!(
                    "{} * {} = NULL;\n\n",
                    pool.values_struct_ty(),
                    pool.values_ptr_ident()
                ),
            };
        }

        body += &section("Module Global Variables");
        body += "\n";
        body += &formatdoc! {"
            static OSY_DPA_DEFINITION_INSTANCE_DATA(mt_InstanceData, {}U);

            ",
            pool.lists.len(),
        };

        for list in &pool.lists {
            body += &self.list_tables(list);
        }

        if !pool.lists.is_empty() {
            body += &self.list_table();
        }

        body += &section("Data Pool Definition");
        body += "\n";
        body += &self.descriptor();

        let top = file_header(
            &format!("{basename}.c"),
            "openSYDE data pool definition",
            &format!(
                "Implementation of data pool `{}` for application `{}`.",
                pool.name,
                self.cg.app().name
            ),
            &self.cg.opts.exporter,
        );

        source_file(&top, &basename, &body)
    }

    /// Value struct initializer with one entry per element.
    fn values_initializer(values: impl Iterator<Item = String>) -> String {
        let items = values.collect::<Vec<_>>().join(",\n");
        formatdoc! {"
            {{
            {items}
            }}",
            items = items.indent(3),
        }
    }

    /// Min/max/dataset tables and element table of one list.
    fn list_tables(&self, list: &DataPoolList) -> String {
        if list.elements.is_empty() {
            return String::new();
        }

        let pool = self.pool;
        let ty = pool.list_struct_ty(list);
        let mut out = String::new();

        if self.linkage.has_types() {
            out += &formatdoc! {"
                static const {ty} mt_{name}MinValues =
                {min};

                static const {ty} mt_{name}MaxValues =
                {max};

                ",
                name = list.name,
                min = Self::values_initializer(list.elements.iter().map(|e| c_initializer(&e.min))),
                max = Self::values_initializer(list.elements.iter().map(|e| c_initializer(&e.max))),
            };

            if self.cg.version >= 2 && !list.datasets.is_empty() {
                for ds in &list.datasets {
                    out += &formatdoc! {"
                        static const {ty} mt_{name}Dataset{ds} =
                        {values};

                        ",
                        name = list.name,
                        ds = ds.name,
                        values = Self::values_initializer(ds.values.iter().map(c_initializer)),
                    };
                }

                let refs = list
                    .datasets
                    .iter()
                    .map(|ds| format!("&mt_{}Dataset{}", list.name, ds.name))
                    .collect::<Vec<_>>()
                    .join(",\n");

                out += &formatdoc! {"
                    static const void * const mapv_{name}Datasets[{n}] =
                    {{
                    {refs}
                    }};

                    ",
                    name = list.name,
                    n = list.datasets.len(),
                    refs = refs.indent(3),
                };
            }
        }

        let entries = list
            .elements
            .iter()
            .map(|e| {
                let member = member_name(&e.value, &e.name);
                let (value, min, max) = match self.linkage {
                    Linkage::Local => (
                        format!("&{}.{}", pool.values_ident(), value_path(list, e)),
                        format!("&mt_{}MinValues.{member}", list.name),
                        format!("&mt_{}MaxValues.{member}", list.name),
                    ),
                    Linkage::RemotePublic => (
                        "NULL".into(),
                        format!("&mt_{}MinValues.{member}", list.name),
                        format!("&mt_{}MaxValues.{member}", list.name),
                    ),
                    Linkage::Remote => ("NULL".into(), "NULL".into(), "NULL".into()),
                };

                format!(
                    "{{ {}, {}U, {}U, {}U, {}, {}U, {value}, {min}, {max} }}, ///< {}",
                    element_type_constant(e.ty()),
                    e.value.len(),
                    e.size_in_bytes(),
                    e.nvm_start_address,
                    access_constant(e.access),
                    u8::from(e.diag_event_call),
                    e.name,
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        out += &formatdoc! {"
            static const T_osy_dpa_element_definition mat_{name}Elements[{n}] =
            {{
            {entries}
            }};

            ",
            name = list.name,
            n = list.elements.len(),
            entries = entries.indent(3),
        };

        out
    }

    fn list_table(&self) -> String {
        let entries = self
            .pool
            .lists
            .iter()
            .map(|list| {
                let elements = if list.elements.is_empty() {
                    "NULL".into()
                } else {
                    format!("&mat_{}Elements[0]", list.name)
                };

                let datasets = if self.cg.version < 2 {
                    String::new()
                } else if list.datasets.is_empty() || !self.linkage.has_types() {
                    "0U, NULL, ".into()
                } else {
                    format!(
                        "{}U, &mapv_{}Datasets[0], ",
                        list.datasets.len(),
                        list.name
                    )
                };

                format!(
                    "{{ {}U, {}U, {}U, {}U, {}U, {datasets}{elements} }}, ///< {}",
                    list.elements.len(),
                    list.values_size(),
                    list.nvm_start_address,
                    list.nvm_size,
                    u8::from(list.nvm_crc_active),
                    list.name,
                )
            })
            .collect::<Vec<_>>()
            .join("\n");

        formatdoc! {"
            static const T_osy_dpa_list_definition mat_Lists[{n}] =
            {{
            {entries}
            }};

            ",
            n = self.pool.lists.len(),
            entries = entries.indent(3),
        }
    }

    fn descriptor(&self) -> String {
        let pool = self.pool;
        let typed = !pool.typed_lists().is_empty();

        let mut fields = vec![
            "OSY_DPA_DATA_POOL_MAGIC".to_string(),
            format!(
                "{{ {}U, {}U, {}U }}",
                pool.version.major, pool.version.minor, pool.version.release
            ),
            kind_constant(pool.kind).into(),
            format!("\"{}\"", pool.name),
            format!("{}U", pool.lists.len()),
            hash_literal(self.definition_hash),
        ];

        if self.cg.version >= 4 {
            fields.push(self.linkage.c_constant().into());
        }

        fields.push(match self.linkage {
            Linkage::Local if typed => format!("&{}", pool.values_ident()),
            Linkage::RemotePublic if typed => format!("&{}", pool.values_ptr_ident()),
            _ => "NULL".into(),
        });

        fields.push(if pool.lists.is_empty() {
            "NULL".into()
        } else {
            "&mat_Lists[0]".into()
        });

        fields.push("&mt_InstanceData".into());

        if pool.kind.is_nvm() {
            fields.push(format!("{}U", pool.nvm_start_address));
            fields.push(format!("{}U", pool.nvm_size));
        }

        formatdoc! {"
            const T_osy_dpa_data_pool {ident} =
            {{
            {fields}
            }};
            ",
            ident = pool.descriptor_ident(),
            fields = fields.join(",\n").indent(3),
        }
    }
}
